pub mod ytdlp;

// Re-export for easy access
pub use ytdlp::YtDlpFetcher;
