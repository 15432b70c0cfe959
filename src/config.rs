use crate::errors::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    pub download_path: PathBuf,
    pub bind_address: String,
    pub max_concurrent_downloads: usize,
    pub fetch_timeout_secs: u64,
    pub cover_art: CoverArtPolicy,
    pub ytdlp_binary: String,
}

/// What happens to a job whose download succeeded but whose cover-art
/// embedding failed.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub enum CoverArtPolicy {
    /// Log the failure and keep the job successful.
    BestEffort,
    /// Downgrade the job to an error.
    Required,
}

impl std::str::FromStr for CoverArtPolicy {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "best-effort" | "best_effort" => Ok(CoverArtPolicy::BestEffort),
            "required" => Ok(CoverArtPolicy::Required),
            other => Err(AppError::InvalidInput(format!(
                "unknown cover art policy: {} (expected best-effort or required)",
                other
            ))),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            download_path: PathBuf::from("./downloads"),
            bind_address: "127.0.0.1:8080".to_string(),
            max_concurrent_downloads: 3,
            fetch_timeout_secs: 1800,
            cover_art: CoverArtPolicy::BestEffort,
            ytdlp_binary: "yt-dlp".to_string(),
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        let config_path = Self::get_config_path()?;

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            serde_json::from_str(&content)?
        } else {
            let config = AppConfig::default();
            config.save()?;
            config
        };

        config.apply_env_overrides();
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::get_config_path()?;
        let config_dir = config_path
            .parent()
            .ok_or_else(|| AppError::Filesystem("config path has no parent".to_string()))?;

        if !config_dir.exists() {
            std::fs::create_dir_all(config_dir)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }

    fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| AppError::Filesystem("could not find config directory".to_string()))?;

        Ok(config_dir.join("tubedrop").join("config.json"))
    }

    /// Environment variables win over the config file.
    fn apply_env_overrides(&mut self) {
        if let Ok(value) = std::env::var("TUBEDROP_DOWNLOAD_DIR") {
            if !value.trim().is_empty() {
                self.download_path = PathBuf::from(value);
            }
        }
        if let Ok(value) = std::env::var("TUBEDROP_BIND_ADDR") {
            if !value.trim().is_empty() {
                self.bind_address = value;
            }
        }
        if let Ok(value) = std::env::var("TUBEDROP_MAX_CONCURRENT") {
            if let Ok(parsed) = value.parse::<usize>() {
                self.max_concurrent_downloads = parsed.max(1);
            }
        }
        if let Ok(value) = std::env::var("TUBEDROP_FETCH_TIMEOUT_SECS") {
            if let Ok(parsed) = value.parse::<u64>() {
                self.fetch_timeout_secs = parsed;
            }
        }
        if let Ok(value) = std::env::var("TUBEDROP_COVER_ART") {
            if let Ok(parsed) = value.parse::<CoverArtPolicy>() {
                self.cover_art = parsed;
            }
        }
        if let Ok(value) = std::env::var("TUBEDROP_YTDLP_BIN") {
            if !value.trim().is_empty() {
                self.ytdlp_binary = value;
            }
        }
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_sensible() {
        let config = AppConfig::default();
        assert_eq!(config.max_concurrent_downloads, 3);
        assert_eq!(config.cover_art, CoverArtPolicy::BestEffort);
        assert_eq!(config.ytdlp_binary, "yt-dlp");
    }

    #[test]
    fn cover_art_policy_parses_both_spellings() {
        assert_eq!(
            "best-effort".parse::<CoverArtPolicy>().unwrap(),
            CoverArtPolicy::BestEffort
        );
        assert_eq!(
            "Required".parse::<CoverArtPolicy>().unwrap(),
            CoverArtPolicy::Required
        );
        assert!("mandatory".parse::<CoverArtPolicy>().is_err());
    }

    #[test]
    fn config_round_trips_through_json() {
        let config = AppConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: AppConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.bind_address, config.bind_address);
        assert_eq!(parsed.cover_art, config.cover_art);
    }
}
