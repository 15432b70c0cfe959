use super::CoverArtEmbedder;
use crate::errors::{AppError, Result};
use id3::TagLike;
use log::info;
use std::path::Path;

/// Embeds thumbnails as ID3v2.4 APIC frames.
pub struct Id3CoverEmbedder;

impl Id3CoverEmbedder {
    pub fn new() -> Self {
        Self
    }
}

impl Default for Id3CoverEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl CoverArtEmbedder for Id3CoverEmbedder {
    async fn embed_cover_art(&self, audio_path: &Path, image_path: &Path) -> Result<()> {
        if !image_path.exists() {
            info!("No thumbnail at {:?}, skipping cover art", image_path);
            return Ok(());
        }

        let data = tokio::fs::read(image_path).await?;
        let audio_path = audio_path.to_path_buf();

        // The id3 crate is synchronous; keep the tag rewrite off the runtime.
        tokio::task::spawn_blocking(move || write_cover(&audio_path, data))
            .await
            .map_err(|e| AppError::CoverArt(format!("embed task panicked: {}", e)))?
    }
}

fn write_cover(audio_path: &Path, data: Vec<u8>) -> Result<()> {
    let mut tag = match id3::Tag::read_from_path(audio_path) {
        Ok(tag) => tag,
        Err(id3::Error {
            kind: id3::ErrorKind::NoTag,
            ..
        }) => id3::Tag::new(),
        Err(e) => {
            return Err(AppError::CoverArt(format!(
                "failed to read existing tags: {}",
                e
            )));
        }
    };

    tag.add_frame(id3::frame::Picture {
        mime_type: sniff_mime(&data).to_string(),
        picture_type: id3::frame::PictureType::CoverFront,
        description: "Cover".to_string(),
        data,
    });

    tag.write_to_path(audio_path, id3::Version::Id3v24)
        .map_err(|e| AppError::CoverArt(format!("failed to write tags: {}", e)))?;

    info!("Cover art embedded into {:?}", audio_path);
    Ok(())
}

fn sniff_mime(data: &[u8]) -> &'static str {
    if data.len() > 3 && data[0..3] == [0x89, 0x50, 0x4E] {
        "image/png"
    } else {
        "image/jpeg"
    }
}
