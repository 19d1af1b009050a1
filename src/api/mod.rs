pub mod auth;
pub mod gemini;
pub mod storage;
pub mod vertex;

use crate::cast::Cast;
use crate::error::Result;
use async_trait::async_trait;
use std::path::PathBuf;

pub use vertex::VertexClient;

/// Everything needed to render one scene.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SceneRequest {
    pub prompt: String,
    pub duration_seconds: u32,
    pub reference_image: Option<PathBuf>,
    /// A previously generated clip to extend instead of starting from text alone.
    pub input_video: Option<PathBuf>,
}

#[async_trait]
pub trait SceneRenderer: Send + Sync {
    /// Runs one generation end to end and returns the MP4 bytes.
    async fn render(&self, request: &SceneRequest) -> Result<Vec<u8>>;

    /// Asks for a descriptive `EVO_...mp4` filename. `None` means fall back to the slug name.
    async fn suggest_filename(&self, raw_line: &str, scene_id: u32, cast: &Cast) -> Option<String>;
}
