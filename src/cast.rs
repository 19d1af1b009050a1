use crate::error::Result;
use crate::logw;
use std::collections::HashMap;
use std::path::Path;
use tokio::fs;

/// Character placeholders and their descriptions, in file order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cast {
    entries: Vec<(String, String)>,
    index: HashMap<String, usize>,
}

impl Cast {
    pub fn insert(&mut self, key: impl Into<String>, description: impl Into<String>) {
        let key = key.into();
        let description = description.into();
        match self.index.get(&key) {
            Some(&slot) => self.entries[slot].1 = description,
            None => {
                self.index.insert(key.clone(), self.entries.len());
                self.entries.push((key, description));
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.index.get(key).map(|&slot| self.entries[slot].1.as_str())
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Parses `KEY: Description` lines. Blank lines, `#` lines and lines without a colon are skipped.
pub fn parse_cast(text: &str) -> Cast {
    let mut cast = Cast::default();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((key, value)) = line.split_once(':') {
            let key = key.trim();
            if key.is_empty() {
                continue;
            }
            cast.insert(key, value.trim());
        }
    }
    cast
}

pub async fn load_cast(path: &Path) -> Result<Cast> {
    if fs::metadata(path).await.is_err() {
        logw(format!("Cast file '{}' not found. Using empty cast.", path.display()));
        return Ok(Cast::default());
    }
    let text = fs::read_to_string(path).await?;
    Ok(parse_cast(&text))
}
