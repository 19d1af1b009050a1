use crate::error::Result;
use crate::platform;
use std::path::Path;
use tokio::fs;

pub async fn ensure_output_dir(dir: &Path) -> Result<()> {
    if !dir.exists() {
        fs::create_dir_all(dir).await?;
        tracing::info!("Created directory: {}", dir.display());
    }
    Ok(())
}

pub async fn check_gcloud() -> bool {
    match tokio::process::Command::new(platform::gcloud_program())
        .arg("--version")
        .output()
        .await
    {
        Ok(output) => output.status.success(),
        Err(_) => false,
    }
}
