use super::{DownloadTask, MediaFormat, TaskStatus};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;

/// In-memory task registry. One instance per server, cloned into every
/// handler and job; all task state dies with the process.
///
/// Exactly one job ever writes a given id, so last-writer-wins under the
/// single mutex is enough. The one hard rule lives in `apply`: a record
/// that has reached a terminal state is never modified again.
#[derive(Clone)]
pub struct TaskRegistry {
    tasks: Arc<Mutex<HashMap<String, DownloadTask>>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self {
            tasks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub async fn create(&self, id: &str, url: &str, format: MediaFormat) {
        let task = DownloadTask {
            id: id.to_string(),
            url: url.to_string(),
            format,
            status: TaskStatus::Processing,
            message: "Download queued".to_string(),
            result_path: None,
            created_at: chrono::Utc::now(),
            started_at: None,
            completed_at: None,
        };

        let mut tasks = self.tasks.lock().await;
        tasks.insert(id.to_string(), task);
    }

    /// Overwrites status and message. Inserts a fresh record when the id is
    /// absent so a late-starting job never panics on a missing entry.
    pub async fn update(&self, id: &str, status: TaskStatus, message: impl Into<String>) {
        self.apply(id, status, message.into(), None).await;
    }

    /// Terminal success, recording where the artifact landed.
    pub async fn complete(&self, id: &str, result_path: PathBuf, message: impl Into<String>) {
        self.apply(id, TaskStatus::Success, message.into(), Some(result_path))
            .await;
    }

    pub async fn get(&self, id: &str) -> Option<DownloadTask> {
        let tasks = self.tasks.lock().await;
        tasks.get(id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.tasks.lock().await.len()
    }

    /// Drops every record. Used by the working-directory clear so that no
    /// stale `success` entry can reference a deleted file.
    pub async fn clear(&self) {
        self.tasks.lock().await.clear();
    }

    async fn apply(
        &self,
        id: &str,
        status: TaskStatus,
        message: String,
        result_path: Option<PathBuf>,
    ) {
        let mut tasks = self.tasks.lock().await;
        let task = tasks.entry(id.to_string()).or_insert_with(|| DownloadTask {
            id: id.to_string(),
            url: String::new(),
            format: MediaFormat::default(),
            status: TaskStatus::Processing,
            message: String::new(),
            result_path: None,
            created_at: chrono::Utc::now(),
            started_at: None,
            completed_at: None,
        });

        if task.status.is_terminal() {
            log::debug!("ignoring update for terminal task {}: {}", id, message);
            return;
        }

        if task.started_at.is_none() && status == TaskStatus::Processing {
            task.started_at = Some(chrono::Utc::now());
        }

        task.status = status;
        task.message = message;
        if let Some(path) = result_path {
            task.result_path = Some(path);
        }
        if status.is_terminal() {
            task.completed_at = Some(chrono::Utc::now());
        }
    }
}

impl Default for TaskRegistry {
    fn default() -> Self {
        Self::new()
    }
}
