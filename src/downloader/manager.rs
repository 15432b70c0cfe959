use crate::config::{AppConfig, CoverArtPolicy};
use crate::downloader::registry::TaskRegistry;
use crate::downloader::{DownloadTask, MediaFetcher, MediaFormat, TaskStatus};
use crate::errors::{AppError, Result};
use crate::metadata::CoverArtEmbedder;
use crate::security::InputValidator;
use crate::utils::{ensure_dir_exists, generate_task_id};
use log::{error, info, warn};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

/// Runs the validate, fetch, embed sequence for one task and writes every
/// transition into the registry. Cloning is cheap; all shared pieces sit
/// behind `Arc`.
#[derive(Clone)]
pub struct DownloadManager {
    registry: TaskRegistry,
    fetcher: Arc<dyn MediaFetcher>,
    embedder: Arc<dyn CoverArtEmbedder>,
    download_dir: PathBuf,
    cover_art: CoverArtPolicy,
    fetch_timeout: Duration,
    semaphore: Arc<Semaphore>,
}

impl DownloadManager {
    pub fn new(
        config: &AppConfig,
        fetcher: Arc<dyn MediaFetcher>,
        embedder: Arc<dyn CoverArtEmbedder>,
    ) -> Self {
        Self {
            registry: TaskRegistry::new(),
            fetcher,
            embedder,
            download_dir: config.download_path.clone(),
            cover_art: config.cover_art,
            fetch_timeout: config.fetch_timeout(),
            semaphore: Arc::new(Semaphore::new(config.max_concurrent_downloads.max(1))),
        }
    }

    pub fn registry(&self) -> &TaskRegistry {
        &self.registry
    }

    /// Registers a task and runs it detached. Always returns a task id: bad
    /// input yields an id whose record is already in a terminal error state,
    /// so the client's first poll reports the failure. The fetcher is never
    /// invoked for input that fails validation.
    pub async fn submit(&self, url: &str, format: MediaFormat) -> String {
        let task_id = generate_task_id();
        self.registry.create(&task_id, url, format).await;

        if let Err(e) = InputValidator::new().validate_url(url) {
            warn!("rejected submission {}: {}", task_id, e);
            self.registry
                .update(&task_id, TaskStatus::Error, invalid_url_message(&e))
                .await;
            return task_id;
        }

        let manager = self.clone();
        let url = url.to_string();
        let job_id = task_id.clone();
        tokio::spawn(async move {
            manager.run_job(job_id, url, format).await;
        });

        task_id
    }

    /// Same sequence, run to completion on the caller's task. Used by the
    /// CLI, where there is nobody to poll.
    pub async fn run_inline(&self, url: &str, format: MediaFormat) -> Result<DownloadTask> {
        let task_id = generate_task_id();
        self.registry.create(&task_id, url, format).await;

        if let Err(e) = InputValidator::new().validate_url(url) {
            self.registry
                .update(&task_id, TaskStatus::Error, invalid_url_message(&e))
                .await;
            return Err(e);
        }
        self.run_job(task_id.clone(), url.to_string(), format).await;

        let task = self
            .registry
            .get(&task_id)
            .await
            .ok_or_else(|| AppError::NotFound(format!("task {} vanished", task_id)))?;

        match task.status {
            TaskStatus::Success => Ok(task),
            _ => Err(AppError::Fetch(task.message.clone())),
        }
    }

    /// Deletes the whole working directory, recreates it empty, and purges
    /// the registry so no stale success can point at a removed file.
    pub async fn clear_workspace(&self) -> Result<()> {
        if self.download_dir.exists() {
            tokio::fs::remove_dir_all(&self.download_dir)
                .await
                .map_err(|e| {
                    AppError::Filesystem(format!(
                        "failed to clear {:?}: {}",
                        self.download_dir, e
                    ))
                })?;
        }
        tokio::fs::create_dir_all(&self.download_dir)
            .await
            .map_err(|e| {
                AppError::Filesystem(format!(
                    "failed to recreate {:?}: {}",
                    self.download_dir, e
                ))
            })?;

        self.registry.clear().await;
        info!("Cleared working directory {:?}", self.download_dir);
        Ok(())
    }

    async fn run_job(&self, task_id: String, url: String, format: MediaFormat) {
        let _permit = match self.semaphore.acquire().await {
            Ok(permit) => permit,
            Err(_) => {
                self.registry
                    .update(&task_id, TaskStatus::Error, "Server is shutting down")
                    .await;
                return;
            }
        };

        // Defensive re-check; `submit` already filtered bad input.
        if let Err(e) = InputValidator::new().validate_url(&url) {
            self.registry
                .update(&task_id, TaskStatus::Error, invalid_url_message(&e))
                .await;
            return;
        }

        self.registry
            .update(
                &task_id,
                TaskStatus::Processing,
                format!("Downloading as {}", format),
            )
            .await;

        // Every task downloads into its own subdirectory, so concurrent
        // tasks with identical titles cannot clobber each other.
        let task_dir = self.download_dir.join(&task_id);
        if let Err(e) = ensure_dir_exists(&task_dir).await {
            self.registry
                .update(
                    &task_id,
                    TaskStatus::Error,
                    format!("Could not create task directory: {}", e),
                )
                .await;
            return;
        }

        let fetched = tokio::time::timeout(
            self.fetch_timeout,
            self.fetcher.fetch(&url, format, &task_dir),
        )
        .await;

        let media_path = match fetched {
            Err(_) => {
                error!("task {} timed out", task_id);
                self.fail_and_discard(
                    &task_id,
                    &task_dir,
                    format!(
                        "Download timed out after {} seconds",
                        self.fetch_timeout.as_secs()
                    ),
                )
                .await;
                return;
            }
            Ok(Err(e)) => {
                error!("task {} failed: {}", task_id, e);
                self.fail_and_discard(&task_id, &task_dir, format!("Download failed: {}", e))
                    .await;
                return;
            }
            Ok(Ok(path)) => path,
        };

        if !media_path.is_file() {
            self.fail_and_discard(
                &task_id,
                &task_dir,
                "Downloader reported success but produced no file".to_string(),
            )
            .await;
            return;
        }

        if format.is_audio() {
            self.registry
                .update(&task_id, TaskStatus::Processing, "Embedding cover art")
                .await;

            let thumbnail = media_path.with_extension("jpg");
            if let Err(e) = self.embedder.embed_cover_art(&media_path, &thumbnail).await {
                match self.cover_art {
                    CoverArtPolicy::Required => {
                        self.registry
                            .update(
                                &task_id,
                                TaskStatus::Error,
                                format!("Cover art embedding failed: {}", e),
                            )
                            .await;
                        return;
                    }
                    CoverArtPolicy::BestEffort => {
                        warn!("cover art embedding failed for task {}: {}", task_id, e);
                    }
                }
            }
        }

        info!("task {} finished: {:?}", task_id, media_path);
        self.registry
            .complete(&task_id, media_path, "File ready for download")
            .await;
    }

    async fn fail_and_discard(&self, task_id: &str, task_dir: &std::path::Path, message: String) {
        // Partial output is never referenced again; remove it best-effort.
        let _ = tokio::fs::remove_dir_all(task_dir).await;
        self.registry
            .update(task_id, TaskStatus::Error, message)
            .await;
    }
}

fn invalid_url_message(err: &AppError) -> String {
    match err {
        AppError::Validation(msg) | AppError::InvalidInput(msg) => format!("Invalid URL: {}", msg),
        other => format!("Invalid URL: {}", other),
    }
}
