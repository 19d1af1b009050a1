use crate::error::{GenerationError, Result};
use std::time::Duration;

pub const DEFAULT_VEO_MODEL: &str = "veo-3.1-fast-generate-preview";
pub const DEFAULT_FILENAME_MODEL: &str = "gemini-2.0-flash-exp";
pub const DEFAULT_LOCATION: &str = "us-central1";
pub const DEFAULT_STORAGE_BASE: &str = "https://storage.googleapis.com";
pub const DEFAULT_CAST_FILE: &str = "cast.md";
pub const DEFAULT_STORYBOARD_FILE: &str = "storyboard.md";

#[derive(Debug, Clone)]
pub struct Config {
    pub project_id: Option<String>,
    pub location: String,
    pub bucket_uri: Option<String>,
    pub veo_model: String,
    pub filename_model: String,
    pub access_token: Option<String>,
    /// Overrides `https://{location}-aiplatform.googleapis.com`.
    pub api_base: Option<String>,
    pub storage_base: String,
    pub timings: Timings,
}

#[derive(Debug, Clone)]
pub struct Timings {
    pub poll_interval: Duration,
    pub submit_attempts: u32,
    pub retry_delay: Duration,
    pub max_poll_failures: u32,
    pub cooldown: Duration,
    pub filename_delay: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(10),
            submit_attempts: 3,
            retry_delay: Duration::from_secs(5),
            max_poll_failures: 6,
            cooldown: Duration::from_secs(30),
            filename_delay: Duration::from_secs(2),
        }
    }
}

impl Timings {
    /// No waiting anywhere. Used by tests and dry runs against local mocks.
    pub fn immediate() -> Self {
        Self {
            poll_interval: Duration::ZERO,
            retry_delay: Duration::ZERO,
            cooldown: Duration::ZERO,
            filename_delay: Duration::ZERO,
            ..Self::default()
        }
    }
}

fn env_nonempty(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl Config {
    /// Reads the process environment. Call `dotenvy::dotenv()` first to pick up a `.env` file.
    pub fn from_env() -> Self {
        Self {
            project_id: env_nonempty("GOOGLE_CLOUD_PROJECT"),
            location: env_nonempty("GOOGLE_CLOUD_LOCATION")
                .unwrap_or_else(|| DEFAULT_LOCATION.to_string()),
            bucket_uri: env_nonempty("GCS_BUCKET_URI"),
            veo_model: env_nonempty("VEO_MODEL").unwrap_or_else(|| DEFAULT_VEO_MODEL.to_string()),
            filename_model: env_nonempty("VEO_FILENAME_MODEL")
                .unwrap_or_else(|| DEFAULT_FILENAME_MODEL.to_string()),
            access_token: env_nonempty("GOOGLE_ACCESS_TOKEN"),
            api_base: env_nonempty("VERTEX_API_BASE"),
            storage_base: env_nonempty("GCS_API_BASE")
                .unwrap_or_else(|| DEFAULT_STORAGE_BASE.to_string()),
            timings: Timings::default(),
        }
    }

    pub fn validate_for_generation(&self) -> Result<()> {
        let mut missing = Vec::new();
        if self.project_id.is_none() {
            missing.push("GOOGLE_CLOUD_PROJECT");
        }
        if self.bucket_uri.is_none() {
            missing.push("GCS_BUCKET_URI");
        }
        if !missing.is_empty() {
            return Err(GenerationError::Config(format!(
                "Ensure {} {} set.",
                missing.join(" and "),
                if missing.len() == 1 { "is" } else { "are" }
            )));
        }
        if let Some(bucket) = &self.bucket_uri {
            if !bucket.starts_with("gs://") {
                return Err(GenerationError::Config(format!(
                    "GCS_BUCKET_URI must start with gs:// (got {bucket})"
                )));
            }
        }
        Ok(())
    }

    pub fn api_base(&self) -> String {
        match &self.api_base {
            Some(base) => base.trim_end_matches('/').to_string(),
            None => format!("https://{}-aiplatform.googleapis.com", self.location),
        }
    }

    pub fn model_url(&self, model: &str, method: &str) -> Result<String> {
        let project = self.project_id.as_deref().ok_or_else(|| {
            GenerationError::Config("GOOGLE_CLOUD_PROJECT is not set.".to_string())
        })?;
        Ok(format!(
            "{}/v1/projects/{}/locations/{}/publishers/google/models/{}:{}",
            self.api_base(),
            project,
            self.location,
            model,
            method
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Config {
        Config {
            project_id: Some("demo".into()),
            location: DEFAULT_LOCATION.into(),
            bucket_uri: Some("gs://demo-bucket/out".into()),
            veo_model: DEFAULT_VEO_MODEL.into(),
            filename_model: DEFAULT_FILENAME_MODEL.into(),
            access_token: None,
            api_base: None,
            storage_base: DEFAULT_STORAGE_BASE.into(),
            timings: Timings::default(),
        }
    }

    #[test]
    fn builds_regional_model_url() {
        let url = base().model_url(DEFAULT_VEO_MODEL, "predictLongRunning").unwrap();
        assert_eq!(
            url,
            "https://us-central1-aiplatform.googleapis.com/v1/projects/demo/locations/us-central1/publishers/google/models/veo-3.1-fast-generate-preview:predictLongRunning"
        );
    }

    #[test]
    fn api_base_override_drops_trailing_slash() {
        let mut cfg = base();
        cfg.api_base = Some("http://127.0.0.1:9000/".into());
        assert_eq!(cfg.api_base(), "http://127.0.0.1:9000");
    }

    #[test]
    fn reports_every_missing_variable() {
        let mut cfg = base();
        cfg.project_id = None;
        cfg.bucket_uri = None;
        let err = cfg.validate_for_generation().unwrap_err();
        assert!(err.to_string().contains("GOOGLE_CLOUD_PROJECT and GCS_BUCKET_URI are set"));
        assert!(err.is_fatal());
    }

    #[test]
    fn rejects_bucket_without_scheme() {
        let mut cfg = base();
        cfg.bucket_uri = Some("demo-bucket".into());
        assert!(cfg.validate_for_generation().is_err());
    }

    #[test]
    fn complete_config_validates() {
        assert!(base().validate_for_generation().is_ok());
    }
}
