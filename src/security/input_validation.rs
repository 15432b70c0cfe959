use crate::errors::{AppError, Result};
use url::Url;

/// Domains the media fetcher is allowed to be pointed at. Subdomains
/// (www, music, m, ...) are accepted.
const SUPPORTED_DOMAINS: [&str; 2] = ["youtube.com", "youtu.be"];

pub struct InputValidator;

impl InputValidator {
    pub fn new() -> Self {
        Self
    }

    /// Syntactic pre-filter only: a URL that passes here can still fail at
    /// download time.
    pub fn validate_url(&self, url: &str) -> Result<()> {
        if url.trim().is_empty() {
            return Err(AppError::Validation("URL cannot be empty".to_string()));
        }

        // The scheme is optional; a bare "youtube.com/watch?v=..." is fine.
        let normalized = if url.contains("://") {
            url.to_string()
        } else {
            format!("https://{}", url)
        };

        let parsed_url = Url::parse(&normalized)
            .map_err(|e| AppError::Validation(format!("Invalid URL: {}", e)))?;

        match parsed_url.scheme() {
            "http" | "https" => {}
            other => {
                return Err(AppError::Validation(format!(
                    "Unsupported URL scheme: {}",
                    other
                )));
            }
        }

        let host = parsed_url
            .host_str()
            .ok_or_else(|| AppError::Validation("URL must have a host".to_string()))?;

        let is_supported = SUPPORTED_DOMAINS.iter().any(|domain| {
            host == *domain || host.ends_with(&format!(".{}", domain))
        });

        if !is_supported {
            return Err(AppError::Validation(format!(
                "Unsupported host: {}. Supported: YouTube",
                host
            )));
        }

        // The original regex required something after the domain; a bare
        // homepage link is not a downloadable item.
        if parsed_url.path().trim_matches('/').is_empty() && parsed_url.query().is_none() {
            return Err(AppError::Validation(
                "URL does not point at a video or track".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for InputValidator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_standard_watch_urls() {
        let validator = InputValidator::new();
        assert!(validator
            .validate_url("https://www.youtube.com/watch?v=abc")
            .is_ok());
        assert!(validator.validate_url("https://youtu.be/abc").is_ok());
        assert!(validator
            .validate_url("http://youtube.com/watch?v=abc")
            .is_ok());
        assert!(validator
            .validate_url("https://music.youtube.com/watch?v=abc")
            .is_ok());
    }

    #[test]
    fn accepts_urls_without_scheme() {
        let validator = InputValidator::new();
        assert!(validator.validate_url("youtube.com/watch?v=abc").is_ok());
        assert!(validator.validate_url("www.youtube.com/watch?v=abc").is_ok());
        assert!(validator.validate_url("youtu.be/abc").is_ok());
    }

    #[test]
    fn rejects_garbage_and_empty_input() {
        let validator = InputValidator::new();
        assert!(validator.validate_url("").is_err());
        assert!(validator.validate_url("   ").is_err());
        assert!(validator.validate_url("not a url").is_err());
    }

    #[test]
    fn rejects_untrusted_hosts() {
        let validator = InputValidator::new();
        assert!(validator
            .validate_url("http://evil.example/watch?v=x")
            .is_err());
        assert!(validator
            .validate_url("https://notyoutube.com/watch?v=abc")
            .is_err());
        // Suffix tricks must not pass the allowlist.
        assert!(validator
            .validate_url("https://evilyoutube.com/watch?v=abc")
            .is_err());
    }

    #[test]
    fn rejects_non_http_schemes() {
        let validator = InputValidator::new();
        assert!(validator.validate_url("ftp://youtube.com/watch?v=abc").is_err());
        assert!(validator.validate_url("file:///etc/passwd").is_err());
    }

    #[test]
    fn rejects_bare_homepage_links() {
        let validator = InputValidator::new();
        assert!(validator.validate_url("https://youtube.com").is_err());
        assert!(validator.validate_url("https://www.youtube.com/").is_err());
    }
}
