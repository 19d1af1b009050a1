//! Output filenames for rendered scenes.
//!
//! Two conventions coexist in an output directory:
//!
//! - `EVO_{NNN}_{ACTION}_{CAST}.mp4`, suggested by a language model, where
//!   `NNN` is the scene id times ten, zero-padded (`EVO_010_...` for scene 1)
//! - `scene_{id}_{slug}.mp4`, built locally from the first words of the prompt
//!
//! A scene counts as rendered when a file in either form exists.

use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub const FILENAME_PREFIX: &str = "EVO_";

static BRACED_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{.*?\}").expect("valid regex"));
static NON_ALNUM_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-zA-Z0-9\s]").expect("valid regex"));

pub fn scene_number_padded(id: u32) -> String {
    format!("{:03}", u64::from(id) * 10)
}

/// First three words of the prompt, lowercased and joined with `_`.
pub fn prompt_slug(prompt: &str) -> String {
    let cleaned = BRACED_RE.replace_all(prompt, "");
    let cleaned = NON_ALNUM_RE.replace_all(&cleaned, "");
    cleaned
        .to_lowercase()
        .split_whitespace()
        .take(3)
        .collect::<Vec<_>>()
        .join("_")
}

pub fn slug_filename(id: u32, prompt: &str) -> String {
    format!("scene_{}_{}.mp4", id, prompt_slug(prompt))
}

/// Cleans a model-suggested filename into `EVO_NNN_....mp4` form.
///
/// `NNN` always comes from `id`; an index the model wrote itself is replaced, so
/// the existing-output check stays keyed to the scene.
pub fn normalize_suggested_filename(suggestion: &str, id: u32) -> Option<String> {
    let mut name: String = suggestion
        .trim()
        .trim_matches(|c| c == '`' || c == '"' || c == '\'')
        .trim()
        .chars()
        .map(|c| match c {
            ' ' | '/' | '\\' | ':' => '_',
            other => other,
        })
        .collect();

    if name.is_empty() || name.contains('\n') {
        return None;
    }
    if !name.to_lowercase().ends_with(".mp4") {
        name.push_str(".mp4");
    }
    let is_index = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    let rest = match name.strip_prefix(FILENAME_PREFIX) {
        Some(rest) => match rest.split_once('_') {
            Some((index, tail)) if is_index(index) => tail,
            _ => rest,
        },
        None => name.as_str(),
    };
    Some(format!("{}{}_{}", FILENAME_PREFIX, scene_number_padded(id), rest))
}

/// First existing render for the scene, if any.
pub fn find_existing_output(output_dir: &Path, id: u32, prompt: &str) -> Option<PathBuf> {
    let prefix = format!("{}{}_", FILENAME_PREFIX, scene_number_padded(id));

    let mut suggested: Vec<PathBuf> = WalkDir::new(output_dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            let name = entry.file_name().to_string_lossy();
            name.starts_with(&prefix) && name.ends_with(".mp4")
        })
        .map(|entry| entry.into_path())
        .collect();
    suggested.sort();

    if let Some(first) = suggested.into_iter().next() {
        return Some(first);
    }

    let slug_path = output_dir.join(slug_filename(id, prompt));
    slug_path.is_file().then_some(slug_path)
}
