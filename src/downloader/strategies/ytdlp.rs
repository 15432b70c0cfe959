use crate::downloader::{MediaFetcher, MediaFormat};
use crate::errors::{AppError, Result};
use log::{debug, error, info};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;

/// Fetcher backed by an external `yt-dlp` subprocess. Transcoding to mp3 and
/// thumbnail conversion are delegated to yt-dlp's own postprocessors (which
/// in turn require ffmpeg on the PATH).
pub struct YtDlpFetcher {
    binary: String,
}

impl YtDlpFetcher {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    fn build_args(&self, url: &str, format: MediaFormat, dest_dir: &Path) -> Vec<String> {
        let output_template = dest_dir.join("%(title)s.%(ext)s");
        let mut args: Vec<String> = vec![
            "--newline".to_string(),
            "--no-playlist".to_string(),
            "-o".to_string(),
            output_template.to_string_lossy().into_owned(),
        ];

        match format {
            MediaFormat::Mp3 => {
                args.extend(
                    [
                        "--extract-audio",
                        "--audio-format",
                        "mp3",
                        "--audio-quality",
                        "192K",
                        "--write-thumbnail",
                        "--convert-thumbnails",
                        "jpg",
                    ]
                    .iter()
                    .map(|s| s.to_string()),
                );
            }
            MediaFormat::Mp4 => {
                args.extend(
                    [
                        "-f",
                        "bestvideo+bestaudio/best",
                        "--merge-output-format",
                        "mp4",
                    ]
                    .iter()
                    .map(|s| s.to_string()),
                );
            }
        }

        args.push(url.to_string());
        args
    }
}

#[async_trait::async_trait]
impl MediaFetcher for YtDlpFetcher {
    async fn fetch(&self, url: &str, format: MediaFormat, dest_dir: &Path) -> Result<PathBuf> {
        let args = self.build_args(url, format, dest_dir);
        info!("🚀 Starting {} for {}", self.binary, url);
        debug!("{} {:?}", self.binary, args);

        let mut child = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                AppError::Subprocess(format!("failed to start {}: {}", self.binary, e))
            })?;

        // yt-dlp emits one "[download]  42.3% ..." line per tick with
        // --newline; everything else is surfaced at debug level.
        let progress_re = Regex::new(r"\[download\]\s+(\d+(?:\.\d+)?)%").ok();
        if let Some(stdout) = child.stdout.take() {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                match progress_re.as_ref().and_then(|re| re.captures(&line)) {
                    Some(caps) => debug!("{} progress: {}%", self.binary, &caps[1]),
                    None => debug!("{}: {}", self.binary, line),
                }
            }
        }

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            error!("{} failed: {}", self.binary, stderr.trim());
            return Err(AppError::Subprocess(format!(
                "{} exited with {}: {}",
                self.binary,
                output.status,
                last_line(&stderr)
            )));
        }

        let produced = find_output_file(dest_dir, format).await?;
        info!("✅ {} produced {:?}", self.binary, produced);
        Ok(produced)
    }

    fn name(&self) -> &str {
        "yt-dlp"
    }
}

/// yt-dlp names the output after the video title, so the concrete path is
/// only known after the fact: take the first file matching the requested
/// extension in the (per-task) destination directory.
async fn find_output_file(dir: &Path, format: MediaFormat) -> Result<PathBuf> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) == Some(format.extension()) {
            return Ok(path);
        }
    }
    Err(AppError::Fetch(
        "downloader produced no output file".to_string(),
    ))
}

fn last_line(text: &str) -> &str {
    text.lines()
        .rev()
        .find(|line| !line.trim().is_empty())
        .unwrap_or("no error output")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audio_args_request_extraction_and_thumbnail() {
        let fetcher = YtDlpFetcher::new("yt-dlp");
        let args = fetcher.build_args(
            "https://youtu.be/abc",
            MediaFormat::Mp3,
            Path::new("/tmp/task"),
        );

        assert!(args.contains(&"--extract-audio".to_string()));
        assert!(args.contains(&"--write-thumbnail".to_string()));
        assert!(args.contains(&"--no-playlist".to_string()));
        assert!(args
            .iter()
            .any(|a| a.starts_with("/tmp/task") && a.contains("%(title)s")));
        assert_eq!(args.last().unwrap(), "https://youtu.be/abc");
    }

    #[test]
    fn video_args_request_merged_mp4() {
        let fetcher = YtDlpFetcher::new("yt-dlp");
        let args = fetcher.build_args(
            "https://youtu.be/abc",
            MediaFormat::Mp4,
            Path::new("/tmp/task"),
        );

        assert!(args.contains(&"--merge-output-format".to_string()));
        assert!(args.contains(&"mp4".to_string()));
        assert!(!args.contains(&"--extract-audio".to_string()));
    }

    #[tokio::test]
    async fn find_output_file_picks_matching_extension() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join("My Video.jpg"), b"thumb")
            .await
            .unwrap();
        tokio::fs::write(dir.path().join("My Video.mp3"), b"audio")
            .await
            .unwrap();

        let found = find_output_file(dir.path(), MediaFormat::Mp3).await.unwrap();
        assert_eq!(found.file_name().unwrap(), "My Video.mp3");

        let missing = find_output_file(dir.path(), MediaFormat::Mp4).await;
        assert!(missing.is_err());
    }

    #[test]
    fn last_line_skips_trailing_blanks() {
        assert_eq!(last_line("a\nb\n\n"), "b");
        assert_eq!(last_line(""), "no error output");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn fetch_with_stub_binary_returns_produced_file() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("task");
        tokio::fs::create_dir_all(&dest).await.unwrap();

        let stub = dir.path().join("fake-ytdlp");
        let script = format!(
            "#!/bin/sh\necho '[download]  50.0% of 1.0MiB'\ntouch '{}/My Video.mp3'\n",
            dest.display()
        );
        tokio::fs::write(&stub, script).await.unwrap();
        let mut perms = tokio::fs::metadata(&stub).await.unwrap().permissions();
        perms.set_mode(0o755);
        tokio::fs::set_permissions(&stub, perms).await.unwrap();

        let fetcher = YtDlpFetcher::new(stub.to_string_lossy().into_owned());
        let produced = fetcher
            .fetch("https://youtu.be/abc", MediaFormat::Mp3, &dest)
            .await
            .unwrap();
        assert_eq!(produced.file_name().unwrap(), "My Video.mp3");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn fetch_surfaces_subprocess_failure() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("task");
        tokio::fs::create_dir_all(&dest).await.unwrap();

        let stub = dir.path().join("fake-ytdlp");
        tokio::fs::write(&stub, "#!/bin/sh\necho 'ERROR: no video' >&2\nexit 1\n")
            .await
            .unwrap();
        let mut perms = tokio::fs::metadata(&stub).await.unwrap().permissions();
        perms.set_mode(0o755);
        tokio::fs::set_permissions(&stub, perms).await.unwrap();

        let fetcher = YtDlpFetcher::new(stub.to_string_lossy().into_owned());
        let err = fetcher
            .fetch("https://youtu.be/abc", MediaFormat::Mp3, &dest)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no video"));
    }
}
