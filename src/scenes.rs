use crate::cast::load_cast;
use crate::error::Result;
use crate::storyboard::{SceneGroup, load_storyboard};
use std::path::{Path, PathBuf};

/// Image values that explicitly clear any reference image for a scene.
const CLEAR_IMAGE_VALUES: &[&str] = &["none", "clear", "null"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scene {
    /// 1-indexed position across all storyboard groups.
    pub id: u32,
    pub prompt: String,
    pub raw_line: String,
    pub image: Option<String>,
    pub effective_image: Option<PathBuf>,
}

fn resolve_effective_image(inline: Option<&str>, global: Option<&Path>) -> Option<PathBuf> {
    let chosen = match inline {
        Some(path) => PathBuf::from(path),
        None => global?.to_path_buf(),
    };
    let as_text = chosen.to_string_lossy().to_lowercase();
    if as_text.is_empty() || CLEAR_IMAGE_VALUES.contains(&as_text.as_str()) {
        return None;
    }
    Some(chosen)
}

pub fn flatten(groups: Vec<SceneGroup>, global_ref_image: Option<&Path>) -> Vec<Scene> {
    groups
        .into_iter()
        .flatten()
        .zip(1u32..)
        .map(|(line, id)| {
            let effective_image = resolve_effective_image(line.image.as_deref(), global_ref_image);
            Scene {
                id,
                prompt: line.prompt,
                raw_line: line.raw_line,
                image: line.image,
                effective_image,
            }
        })
        .collect()
}

/// Reads both files from disk and returns the numbered scene list.
pub async fn load_scenes(
    cast_path: &Path,
    storyboard_path: &Path,
    global_ref_image: Option<&Path>,
) -> Result<Vec<Scene>> {
    let cast = load_cast(cast_path).await?;
    let groups = load_storyboard(storyboard_path, &cast).await?;
    Ok(flatten(groups, global_ref_image))
}

pub fn find_scene(scenes: &[Scene], id: u32) -> Option<&Scene> {
    scenes.iter().find(|s| s.id == id)
}

pub fn format_scene_list(scenes: &[Scene]) -> Vec<String> {
    let mut lines = Vec::with_capacity(scenes.len() + 1);
    lines.push(format!("--- Scene List ({} total) ---", scenes.len()));
    for scene in scenes {
        let reference = scene
            .effective_image
            .as_ref()
            .map(|p| format!(" [Ref: {}]", p.display()))
            .unwrap_or_default();
        lines.push(format!("Scene {}: {}{}", scene.id, scene.prompt, reference));
    }
    lines
}
