use axum::body::Body;
use axum::extract::{Path as AxumPath, State};
use axum::http::header::{self, HeaderValue};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tokio_util::io::ReaderStream;

use crate::downloader::manager::DownloadManager;
use crate::downloader::{MediaFormat, TaskStatus};
use crate::errors::{AppError, Result};
use crate::utils::sanitize_filename;

// State management
#[derive(Clone)]
pub struct AppState {
    pub manager: DownloadManager,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/downloads", post(submit_download))
        .route("/api/downloads/{task_id}", get(download_status))
        .route("/api/downloads/{task_id}/file", get(retrieve_file))
        .route("/api/clear", post(clear_workspace))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub format: Option<MediaFormat>,
}

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub task_id: String,
}

/// Wire-level view of a task's state. `Unknown` exists only here: the
/// registry never stores it, the polling surface reports it for absent ids.
#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PollStatus {
    Processing,
    Success,
    Error,
    Unknown,
}

impl From<TaskStatus> for PollStatus {
    fn from(status: TaskStatus) -> Self {
        match status {
            TaskStatus::Processing => PollStatus::Processing,
            TaskStatus::Success => PollStatus::Success,
            TaskStatus::Error => PollStatus::Error,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: PollStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

async fn index() -> Html<&'static str> {
    Html(include_str!("../static/index.html"))
}

/// A missing or invalid URL still answers with a task id; the record behind
/// it is already terminal, so the client's first poll reports the failure.
async fn submit_download(
    State(state): State<AppState>,
    Json(payload): Json<SubmitRequest>,
) -> Json<SubmitResponse> {
    let url = payload.url.unwrap_or_default();
    let format = payload.format.unwrap_or_default();
    let task_id = state.manager.submit(&url, format).await;
    Json(SubmitResponse { task_id })
}

/// Unrecognized ids are an answer, not an error.
async fn download_status(
    State(state): State<AppState>,
    AxumPath(task_id): AxumPath<String>,
) -> Json<StatusResponse> {
    match state.manager.registry().get(&task_id).await {
        Some(task) => {
            let file = matches!(task.status, TaskStatus::Success)
                .then(|| format!("/api/downloads/{}/file", task.id));
            Json(StatusResponse {
                status: task.status.into(),
                message: task.message,
                file,
            })
        }
        None => Json(StatusResponse {
            status: PollStatus::Unknown,
            message: "Task not found".to_string(),
            file: None,
        }),
    }
}

async fn retrieve_file(
    State(state): State<AppState>,
    AxumPath(task_id): AxumPath<String>,
) -> Result<Response> {
    let task = state
        .manager
        .registry()
        .get(&task_id)
        .await
        .ok_or_else(|| AppError::NotFound("unknown task".to_string()))?;

    if task.status != TaskStatus::Success {
        return Err(AppError::NotFound("file is not ready".to_string()));
    }
    let path = task
        .result_path
        .ok_or_else(|| AppError::NotFound("task has no file".to_string()))?;

    let file = tokio::fs::File::open(&path)
        .await
        .map_err(|_| AppError::NotFound("file is no longer available".to_string()))?;

    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .map(sanitize_filename)
        .unwrap_or_else(|| format!("download.{}", task.format.extension()));

    let mut response = Body::from_stream(ReaderStream::new(file)).into_response();
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(task.format.mime_type()),
    );
    let disposition = format!("attachment; filename=\"{}\"", filename)
        .parse()
        .unwrap_or_else(|_| HeaderValue::from_static("attachment"));
    response
        .headers_mut()
        .insert(header::CONTENT_DISPOSITION, disposition);

    Ok(response)
}

async fn clear_workspace(State(state): State<AppState>) -> Result<Json<serde_json::Value>> {
    state.manager.clear_workspace().await?;
    Ok(Json(serde_json::json!({
        "status": "ok",
        "message": "All temporary files removed",
    })))
}
