use crate::api::{SceneRenderer, SceneRequest, VertexClient};
use crate::cast::{Cast, load_cast};
use crate::config::Config;
use crate::error::{FailureKind, GenerationError};
use crate::init;
use crate::naming::{find_existing_output, slug_filename};
use crate::scenes::{Scene, find_scene, flatten, format_scene_list, load_scenes};
use crate::storyboard::load_storyboard;
use crate::{logi, logok, logw};
use anyhow::Context;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    List,
    All,
    Single(u32),
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub mode: RunMode,
    pub cast_path: PathBuf,
    pub storyboard_path: PathBuf,
    pub output_dir: PathBuf,
    pub reference_image: Option<PathBuf>,
    pub input_video: Option<PathBuf>,
    pub duration_seconds: u32,
    pub overwrite: bool,
    pub cooldown: Duration,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub successful: Vec<u32>,
    pub skipped: Vec<u32>,
    pub failed_file_not_found: Vec<u32>,
    pub failed_safety_filter: Vec<u32>,
    pub failed_other: Vec<u32>,
}

fn id_list(ids: &[u32]) -> String {
    ids.iter().map(u32::to_string).collect::<Vec<_>>().join(", ")
}

impl RunSummary {
    fn record_failure(&mut self, id: u32, kind: FailureKind) {
        match kind {
            FailureKind::FileNotFound => self.failed_file_not_found.push(id),
            FailureKind::SafetyFilter => self.failed_safety_filter.push(id),
            FailureKind::Other => self.failed_other.push(id),
        }
    }

    pub fn lines(&self) -> Vec<String> {
        let rows = [
            ("Successful", &self.successful),
            ("Skipped (already existed)", &self.skipped),
            ("Failed (File Not Found)", &self.failed_file_not_found),
            ("Failed (Safety Filter)", &self.failed_safety_filter),
            ("Failed (Other Error)", &self.failed_other),
        ];
        let mut lines = vec!["--- Run Summary ---".to_string()];
        for (label, ids) in rows {
            lines.push(format!("{}: {} ({})", label, ids.len(), id_list(ids)));
        }
        lines.push("---------------------".to_string());
        lines
    }
}

#[derive(Error, Debug)]
pub enum RunError {
    #[error("{0}")]
    Usage(String),

    #[error("Unrecoverable error during Scene {scene_id}: {error}")]
    Aborted {
        scene_id: u32,
        error: GenerationError,
        summary: RunSummary,
    },

    #[error(transparent)]
    Generation(#[from] GenerationError),
}

impl RunError {
    pub fn exit_code(&self) -> i32 {
        match self {
            RunError::Usage(_) => 2,
            _ => 1,
        }
    }
}

pub fn select_scenes(mode: RunMode, scenes: &[Scene]) -> Result<Vec<Scene>, RunError> {
    match mode {
        RunMode::List | RunMode::All => Ok(scenes.to_vec()),
        RunMode::Single(id) => match find_scene(scenes, id) {
            Some(scene) => Ok(vec![scene.clone()]),
            None => Err(RunError::Usage(format!(
                "Scene number '{}' not found. Valid numbers are 1 to {}.",
                id,
                scenes.len()
            ))),
        },
    }
}

/// Scene listing. Reads local files only.
pub async fn list_scenes(opts: &RunOptions) -> Result<Vec<String>, RunError> {
    let scenes = load_scenes(
        &opts.cast_path,
        &opts.storyboard_path,
        opts.reference_image.as_deref(),
    )
    .await?;
    Ok(format_scene_list(&scenes))
}

async fn save_video(path: &Path, bytes: Vec<u8>) -> std::io::Result<()> {
    let target = path.to_path_buf();
    let dir = target.parent().map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from("."));
    tokio::task::spawn_blocking(move || {
        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        tmp.write_all(&bytes)?;
        tmp.flush()?;
        tmp.persist(&target).map_err(|e| e.error)?;
        Ok(())
    })
    .await
    .map_err(std::io::Error::other)?
}

async fn render_with_fallback<R: SceneRenderer + ?Sized>(
    renderer: &R,
    request: &SceneRequest,
) -> crate::Result<Vec<u8>> {
    match renderer.render(request).await {
        Err(err) if request.input_video.is_some() && err.is_rejected_input_video() => {
            logw(format!("The input video was rejected by the Veo API. Reason: {err}"));
            logi("    Falling back to text-to-video generation (ignoring input video)...");
            let plain = SceneRequest {
                input_video: None,
                ..request.clone()
            };
            renderer.render(&plain).await
        }
        other => other,
    }
}

async fn reload_scene(opts: &RunOptions, id: u32) -> Result<(Option<Scene>, Cast), RunError> {
    let cast = load_cast(&opts.cast_path).await?;
    let groups = load_storyboard(&opts.storyboard_path, &cast).await?;
    let scenes = flatten(groups, opts.reference_image.as_deref());
    Ok((find_scene(&scenes, id).cloned(), cast))
}

/// Renders the selected scenes one at a time.
///
/// Storyboard and cast are re-read before every scene so edits made during a
/// long run take effect. Per-scene failures are tallied and the run continues;
/// configuration, auth and permission errors abort it.
pub async fn run_scenes<R: SceneRenderer + ?Sized>(
    renderer: &R,
    opts: &RunOptions,
) -> Result<RunSummary, RunError> {
    let initial = load_scenes(
        &opts.cast_path,
        &opts.storyboard_path,
        opts.reference_image.as_deref(),
    )
    .await?;
    let targets = select_scenes(opts.mode, &initial)?;
    if opts.mode == RunMode::List {
        return Ok(RunSummary::default());
    }

    init::ensure_output_dir(&opts.output_dir).await?;

    logi(format!("--- Processing {} scenes ---", targets.len()));
    let last_id = targets.last().map(|s| s.id);
    let mut summary = RunSummary::default();

    for target in &targets {
        let id = target.id;
        if opts.mode == RunMode::All {
            logi(format!("Reloading storyboard and cast files for Scene {id}..."));
        }

        let (scene, cast) = reload_scene(opts, id).await?;
        let Some(scene) = scene else {
            logw(format!("    - Scene {id} no longer found in storyboard. Skipping."));
            summary.skipped.push(id);
            continue;
        };

        if !opts.overwrite {
            if let Some(existing) = find_existing_output(&opts.output_dir, id, &scene.prompt) {
                let name = existing
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                logok(format!("File '{name}' already exists for Scene {id}. Skipping generation."));
                summary.skipped.push(id);
                continue;
            }
        }

        let filename = match renderer.suggest_filename(&scene.raw_line, id, &cast).await {
            Some(name) => name,
            None => slug_filename(id, &scene.prompt),
        };
        let output = opts.output_dir.join(filename);

        logi(format!("Generating Scene {id}..."));
        logi(format!("    - Prompt: \"{}\"", scene.prompt));
        if let Some(image) = &scene.effective_image {
            logi(format!("    - Reference Image: {}", image.display()));
        }
        logi(format!("    - Output file: {}", output.display()));

        let request = SceneRequest {
            prompt: scene.prompt.clone(),
            duration_seconds: opts.duration_seconds,
            reference_image: scene.effective_image.clone(),
            input_video: opts.input_video.clone(),
        };

        let bytes = match render_with_fallback(renderer, &request).await {
            Ok(bytes) => bytes,
            Err(error) if error.is_fatal() => {
                return Err(RunError::Aborted {
                    scene_id: id,
                    error,
                    summary,
                });
            }
            Err(error) => {
                let kind = error.failure_kind();
                match kind {
                    FailureKind::SafetyFilter => {
                        logw(format!("WARNING: Scene {id} was blocked by safety filters."))
                    }
                    FailureKind::FileNotFound => {
                        logw(format!("WARNING: Skipping Scene {id} because a file was not found."))
                    }
                    FailureKind::Other => {
                        logw(format!("An error occurred during generation for Scene {id}:"))
                    }
                }
                logw(format!("   Error: {error}"));
                summary.record_failure(id, kind);
                continue;
            }
        };

        logi(format!("    - Saving video to '{}'...", output.display()));
        if let Err(e) = save_video(&output, bytes).await {
            return Err(RunError::Aborted {
                scene_id: id,
                error: GenerationError::Io(e),
                summary,
            });
        }
        summary.successful.push(id);
        logok(format!("Scene {id} generated successfully!"));

        if opts.mode == RunMode::All && Some(id) != last_id && !opts.cooldown.is_zero() {
            logi(format!("    - Cooling down for {} seconds...", opts.cooldown.as_secs()));
            tokio::time::sleep(opts.cooldown).await;
        }
    }

    Ok(summary)
}

/// CLI entry: lists scenes or renders them with Veo, printing the outcome. Returns the exit code.
pub async fn run_generation(cfg: Config, opts: RunOptions) -> anyhow::Result<i32> {
    if opts.mode == RunMode::List {
        let code = match list_scenes(&opts).await {
            Ok(lines) => {
                for line in lines {
                    println!("{line}");
                }
                0
            }
            Err(err) => {
                eprintln!("Error: {err}");
                err.exit_code()
            }
        };
        return Ok(code);
    }

    if let Err(err) = cfg.validate_for_generation() {
        eprintln!("Error: {err}");
        return Ok(1);
    }
    if cfg.access_token.is_none() && !init::check_gcloud().await {
        logw("gcloud not found in PATH and GOOGLE_ACCESS_TOKEN is not set; auth will fail.");
    }

    let client = VertexClient::new(cfg).context("Failed to build HTTP client")?;

    let code = match run_scenes(&client, &opts).await {
        Ok(summary) => {
            println!();
            for line in summary.lines() {
                println!("{line}");
            }
            0
        }
        Err(RunError::Aborted { scene_id, error, summary }) => {
            eprintln!("An unrecoverable error occurred during generation for Scene {scene_id}:");
            eprintln!("{error}");
            println!();
            for line in summary.lines() {
                println!("{line}");
            }
            1
        }
        Err(err) => {
            eprintln!("Error: {err}");
            err.exit_code()
        }
    };
    Ok(code)
}
