use crate::config::Config;
use crate::error::{GenerationError, Result};
use crate::platform;
use async_trait::async_trait;
use tokio::process::Command;

const LOGIN_HINT: &str =
    "Run 'gcloud auth application-default login' in your terminal, or set GOOGLE_ACCESS_TOKEN.";

/// Where bearer tokens for Vertex AI and Cloud Storage come from.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn fetch(&self) -> Result<String>;

    /// Whether fetching again can produce a different token after a 401.
    fn refreshable(&self) -> bool;
}

/// A token handed in through `GOOGLE_ACCESS_TOKEN`. Never refreshed.
pub struct StaticToken(pub String);

#[async_trait]
impl TokenSource for StaticToken {
    async fn fetch(&self) -> Result<String> {
        Ok(self.0.clone())
    }

    fn refreshable(&self) -> bool {
        false
    }
}

/// Application-default credentials printed by the gcloud CLI.
pub struct GcloudToken;

#[async_trait]
impl TokenSource for GcloudToken {
    async fn fetch(&self) -> Result<String> {
        gcloud_print_access_token().await
    }

    fn refreshable(&self) -> bool {
        true
    }
}

pub fn token_source(cfg: &Config) -> Box<dyn TokenSource> {
    match &cfg.access_token {
        Some(token) => Box::new(StaticToken(token.clone())),
        None => Box::new(GcloudToken),
    }
}

async fn gcloud_print_access_token() -> Result<String> {
    let program = platform::gcloud_program();
    tracing::debug!(
        os = platform::os_label(),
        program,
        "requesting application-default access token"
    );

    let output = Command::new(program)
        .args(["auth", "application-default", "print-access-token"])
        .output()
        .await
        .map_err(|e| {
            GenerationError::Auth(format!("could not run {program}: {e}. {LOGIN_HINT}"))
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        return Err(GenerationError::Auth(format!(
            "{program} exited with {}: {stderr}. {LOGIN_HINT}",
            output.status
        )));
    }

    let token = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if token.is_empty() {
        return Err(GenerationError::Auth(format!(
            "{program} printed an empty token. {LOGIN_HINT}"
        )));
    }
    Ok(token)
}

pub fn permission_hint() -> &'static str {
    LOGIN_HINT
}
