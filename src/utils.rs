use crate::errors::Result;
use log::info;

/// Sanitizes a filename by replacing reserved characters
pub fn sanitize_filename(filename: &str) -> String {
    filename
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            c => c,
        })
        .collect()
}

/// Creates a directory if it doesn't exist
pub async fn ensure_dir_exists(path: &std::path::Path) -> Result<()> {
    if !path.exists() {
        tokio::fs::create_dir_all(path).await?;
        info!("Created directory: {:?}", path);
    }
    Ok(())
}

/// Generates a unique ID for download tasks
pub fn generate_task_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_replaces_reserved_characters() {
        assert_eq!(sanitize_filename("My:Video/Title*?"), "My_Video_Title__");
        assert_eq!(sanitize_filename(r#"a<b>c:d"e/f\g|h?i*j"#), "a_b_c_d_e_f_g_h_i_j");
    }

    #[test]
    fn sanitize_passes_other_characters_through() {
        assert_eq!(sanitize_filename(""), "");
        assert_eq!(sanitize_filename("plain name.mp3"), "plain name.mp3");
        assert_eq!(sanitize_filename("héllo wörld – ビデオ"), "héllo wörld – ビデオ");
    }

    #[test]
    fn sanitize_is_idempotent() {
        let once = sanitize_filename("My:Video/Title*?");
        assert_eq!(sanitize_filename(&once), once);
    }

    #[test]
    fn task_ids_are_unique() {
        assert_ne!(generate_task_id(), generate_task_id());
    }
}
