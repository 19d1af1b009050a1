//! Storyboard parsing and cast placeholder substitution.
//!
//! A storyboard is a markdown file where each `- ` bullet is one scene prompt
//! and `#` headings separate groups of scenes. Prompts reference cast members
//! with `{KEY}` placeholders and may carry an inline `[IMAGE: path]` reference.

use crate::cast::Cast;
use crate::error::Result;
use crate::logw;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::path::Path;
use tokio::fs;

static PLACEHOLDER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{([^{}]+)\}").expect("valid regex"));

static IMAGE_TAG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\[IMAGE:\s*(.*?)\]").expect("valid regex"));

/// One `- ` line of the storyboard after image extraction and substitution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoryboardLine {
    pub prompt: String,
    pub raw_line: String,
    pub image: Option<String>,
}

pub type SceneGroup = Vec<StoryboardLine>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Substitution {
    pub text: String,
    /// Placeholder names with no cast entry, in order of appearance.
    pub unresolved: Vec<String>,
}

/// Replaces every `{KEY}` that has a cast entry. Unknown placeholders stay verbatim.
///
/// The template is scanned once, so descriptions inserted from the cast are
/// never expanded again.
pub fn substitute_placeholders(template: &str, cast: &Cast) -> Substitution {
    let mut unresolved = Vec::new();
    let text = PLACEHOLDER_RE
        .replace_all(template, |caps: &Captures| {
            let key = &caps[1];
            match cast.get(key) {
                Some(description) => description.to_string(),
                None => {
                    if !unresolved.iter().any(|k| k == key) {
                        unresolved.push(key.to_string());
                    }
                    caps[0].to_string()
                }
            }
        })
        .into_owned();
    Substitution { text, unresolved }
}

/// Splits an `[IMAGE: path]` tag out of a storyboard line.
pub fn extract_image_reference(raw: &str) -> (String, Option<String>) {
    let Some(caps) = IMAGE_TAG_RE.captures(raw) else {
        return (raw.to_string(), None);
    };
    let path = caps[1].trim().trim_matches('"').trim_matches('\'').to_string();
    let stripped = raw.replace(&caps[0], "").trim().to_string();
    (stripped, Some(path))
}

pub fn parse_storyboard(text: &str, cast: &Cast) -> Vec<SceneGroup> {
    let mut groups = Vec::new();
    let mut current: SceneGroup = Vec::new();

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if line.starts_with('#') {
            if !current.is_empty() {
                groups.push(std::mem::take(&mut current));
            }
        } else if let Some(rest) = line.strip_prefix('-') {
            let (raw_line, image) = extract_image_reference(rest.trim());
            let substitution = substitute_placeholders(&raw_line, cast);
            if !substitution.unresolved.is_empty() {
                logw(format!(
                    "Unknown cast placeholder(s) {} in storyboard line: {}",
                    substitution.unresolved.join(", "),
                    line
                ));
            }
            current.push(StoryboardLine {
                prompt: substitution.text,
                raw_line,
                image,
            });
        }
    }

    if !current.is_empty() {
        groups.push(current);
    }
    groups
}

pub async fn load_storyboard(path: &Path, cast: &Cast) -> Result<Vec<SceneGroup>> {
    if fs::metadata(path).await.is_err() {
        logw(format!("Storyboard file '{}' not found. Using empty list.", path.display()));
        return Ok(Vec::new());
    }
    let text = fs::read_to_string(path).await?;
    Ok(parse_storyboard(&text, cast))
}
