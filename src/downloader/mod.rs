pub mod manager;
pub mod registry;
pub mod strategies;

use crate::errors::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadTask {
    pub id: String,
    pub url: String,
    pub format: MediaFormat,
    pub status: TaskStatus,
    pub message: String,
    pub result_path: Option<PathBuf>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub started_at: Option<chrono::DateTime<chrono::Utc>>,
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Processing,
    Success,
    Error,
}

impl TaskStatus {
    /// Terminal states are never overwritten by later updates.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Success | TaskStatus::Error)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MediaFormat {
    Mp3,
    Mp4,
}

impl MediaFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            MediaFormat::Mp3 => "mp3",
            MediaFormat::Mp4 => "mp4",
        }
    }

    pub fn is_audio(&self) -> bool {
        matches!(self, MediaFormat::Mp3)
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            MediaFormat::Mp3 => "audio/mpeg",
            MediaFormat::Mp4 => "video/mp4",
        }
    }
}

impl Default for MediaFormat {
    fn default() -> Self {
        MediaFormat::Mp3
    }
}

impl std::str::FromStr for MediaFormat {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "mp3" => Ok(MediaFormat::Mp3),
            "mp4" => Ok(MediaFormat::Mp4),
            other => Err(AppError::InvalidInput(format!(
                "unsupported format: {} (expected mp3 or mp4)",
                other
            ))),
        }
    }
}

impl std::fmt::Display for MediaFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

/// Retrieves remote media into `dest_dir` and returns the path of the
/// produced file. Implementations are opaque collaborators; everything they
/// raise is converted to a terminal task error by the manager.
#[async_trait::async_trait]
pub trait MediaFetcher: Send + Sync {
    async fn fetch(&self, url: &str, format: MediaFormat, dest_dir: &Path) -> Result<PathBuf>;
    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_parses_case_insensitively() {
        assert_eq!("mp3".parse::<MediaFormat>().unwrap(), MediaFormat::Mp3);
        assert_eq!("MP4".parse::<MediaFormat>().unwrap(), MediaFormat::Mp4);
        assert!("flac".parse::<MediaFormat>().is_err());
    }

    #[test]
    fn only_audio_formats_get_cover_art() {
        assert!(MediaFormat::Mp3.is_audio());
        assert!(!MediaFormat::Mp4.is_audio());
    }

    #[test]
    fn terminal_states() {
        assert!(!TaskStatus::Processing.is_terminal());
        assert!(TaskStatus::Success.is_terminal());
        assert!(TaskStatus::Error.is_terminal());
    }

    #[test]
    fn status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&TaskStatus::Processing).unwrap(),
            "\"processing\""
        );
        assert_eq!(serde_json::to_string(&MediaFormat::Mp3).unwrap(), "\"mp3\"");
    }
}
