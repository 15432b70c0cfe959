pub mod id3_embedder;

use crate::errors::Result;
use std::path::Path;

/// Writes an image into an audio file's metadata container.
#[async_trait::async_trait]
pub trait CoverArtEmbedder: Send + Sync {
    /// Embeds the file at `image_path` as front-cover art of `audio_path`.
    /// A missing image is not an error: the audio file is left untouched.
    async fn embed_cover_art(&self, audio_path: &Path, image_path: &Path) -> Result<()>;
}
