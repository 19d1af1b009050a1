use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;
use tempfile::TempDir;
use veo_storyboard::GenerationError;
use veo_storyboard::api::{SceneRenderer, SceneRequest};
use veo_storyboard::cast::Cast;
use veo_storyboard::generator::{
    RunError, RunMode, RunOptions, RunSummary, list_scenes, run_scenes,
};

type Responder =
    Box<dyn Fn(&SceneRequest, usize) -> veo_storyboard::Result<Vec<u8>> + Send + Sync>;

struct FakeRenderer {
    respond: Responder,
    suggestion: Option<String>,
    requests: Mutex<Vec<SceneRequest>>,
    suggestions_asked: Mutex<Vec<u32>>,
}

impl FakeRenderer {
    fn new(respond: Responder) -> Self {
        Self {
            respond,
            suggestion: None,
            requests: Mutex::new(Vec::new()),
            suggestions_asked: Mutex::new(Vec::new()),
        }
    }

    fn ok() -> Self {
        Self::new(Box::new(|req, _| Ok(format!("video for {}", req.prompt).into_bytes())))
    }

    fn requests(&self) -> Vec<SceneRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl SceneRenderer for FakeRenderer {
    async fn render(&self, request: &SceneRequest) -> veo_storyboard::Result<Vec<u8>> {
        let call = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(request.clone());
            requests.len()
        };
        (self.respond)(request, call)
    }

    async fn suggest_filename(
        &self,
        _raw_line: &str,
        scene_id: u32,
        _cast: &Cast,
    ) -> Option<String> {
        self.suggestions_asked.lock().unwrap().push(scene_id);
        self.suggestion.clone()
    }
}

const CAST: &str = "HERO: the knight\n";
const BOARD: &str = "\
# Act one
- {HERO} at the gate
- {HERO} crosses the bridge
# Act two
- {HERO} rests by the fire
";

struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("cast.md"), CAST).unwrap();
        std::fs::write(dir.path().join("storyboard.md"), BOARD).unwrap();
        Self { dir }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn options(&self, mode: RunMode) -> RunOptions {
        RunOptions {
            mode,
            cast_path: self.path("cast.md"),
            storyboard_path: self.path("storyboard.md"),
            output_dir: self.path("out"),
            reference_image: None,
            input_video: None,
            duration_seconds: 8,
            overwrite: false,
            cooldown: Duration::ZERO,
        }
    }
}

fn out_files(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[tokio::test]
async fn run_all_renders_every_scene_with_slug_names() {
    let ws = Workspace::new();
    let renderer = FakeRenderer::ok();

    let summary = run_scenes(&renderer, &ws.options(RunMode::All)).await.unwrap();

    assert_eq!(summary.successful, vec![1, 2, 3]);
    assert_eq!(
        out_files(&ws.path("out")),
        vec![
            "scene_1_the_knight_at.mp4",
            "scene_2_the_knight_crosses.mp4",
            "scene_3_the_knight_rests.mp4",
        ]
    );
    let saved = std::fs::read_to_string(ws.path("out").join("scene_1_the_knight_at.mp4")).unwrap();
    assert_eq!(saved, "video for the knight at the gate");
    assert_eq!(renderer.requests()[2].prompt, "the knight rests by the fire");
}

#[tokio::test]
async fn existing_outputs_are_skipped_unless_overwrite() {
    let ws = Workspace::new();
    std::fs::create_dir_all(ws.path("out")).unwrap();
    std::fs::write(ws.path("out").join("EVO_020_BRIDGE_HER.mp4"), b"old").unwrap();

    let renderer = FakeRenderer::ok();
    let summary = run_scenes(&renderer, &ws.options(RunMode::All)).await.unwrap();
    assert_eq!(summary.skipped, vec![2]);
    assert_eq!(summary.successful, vec![1, 3]);
    assert_eq!(renderer.requests().len(), 2);

    let mut opts = ws.options(RunMode::Single(2));
    opts.overwrite = true;
    let renderer = FakeRenderer::ok();
    let summary = run_scenes(&renderer, &opts).await.unwrap();
    assert_eq!(summary.successful, vec![2]);
    assert_eq!(renderer.requests().len(), 1);
}

#[tokio::test]
async fn suggested_filenames_are_used_when_available() {
    let ws = Workspace::new();
    let mut renderer = FakeRenderer::ok();
    renderer.suggestion = Some("EVO_010_GATE_HER.mp4".to_string());

    run_scenes(&renderer, &ws.options(RunMode::Single(1))).await.unwrap();

    assert_eq!(out_files(&ws.path("out")), vec!["EVO_010_GATE_HER.mp4"]);
    assert_eq!(*renderer.suggestions_asked.lock().unwrap(), vec![1]);
}

#[tokio::test]
async fn per_scene_failures_are_tallied_and_the_run_continues() {
    let ws = Workspace::new();
    let renderer = FakeRenderer::new(Box::new(|_, call| match call {
        1 => Err(GenerationError::Blocked("Dangerous content".into())),
        2 => Err(GenerationError::FileNotFound("refs/missing.png".into())),
        _ => Err(GenerationError::Operation {
            code: 13,
            message: "internal".into(),
        }),
    }));

    let summary = run_scenes(&renderer, &ws.options(RunMode::All)).await.unwrap();

    assert!(summary.successful.is_empty());
    assert_eq!(summary.failed_safety_filter, vec![1]);
    assert_eq!(summary.failed_file_not_found, vec![2]);
    assert_eq!(summary.failed_other, vec![3]);
}

#[tokio::test]
async fn fatal_errors_abort_with_partial_summary() {
    let ws = Workspace::new();
    let renderer = FakeRenderer::new(Box::new(|req, call| match call {
        1 => Ok(req.prompt.clone().into_bytes()),
        _ => Err(GenerationError::PermissionDenied("PERMISSION_DENIED".into())),
    }));

    let err = run_scenes(&renderer, &ws.options(RunMode::All)).await.unwrap_err();

    match err {
        RunError::Aborted { scene_id, error, summary } => {
            assert_eq!(scene_id, 2);
            assert!(matches!(error, GenerationError::PermissionDenied(_)));
            assert_eq!(summary.successful, vec![1]);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(renderer.requests().len(), 2);
}

#[tokio::test]
async fn unknown_scene_number_is_a_usage_error() {
    let ws = Workspace::new();
    let renderer = FakeRenderer::ok();

    let err = run_scenes(&renderer, &ws.options(RunMode::Single(7))).await.unwrap_err();

    assert_eq!(err.to_string(), "Scene number '7' not found. Valid numbers are 1 to 3.");
    assert_eq!(err.exit_code(), 2);
    assert!(renderer.requests().is_empty());
}

#[tokio::test]
async fn list_mode_never_renders() {
    let ws = Workspace::new();
    let renderer = FakeRenderer::ok();
    let opts = ws.options(RunMode::List);

    let lines = list_scenes(&opts).await.unwrap();
    let summary = run_scenes(&renderer, &opts).await.unwrap();

    assert_eq!(lines[0], "--- Scene List (3 total) ---");
    assert_eq!(lines[2], "Scene 2: the knight crosses the bridge");
    assert!(renderer.requests().is_empty());
    assert!(renderer.suggestions_asked.lock().unwrap().is_empty());
    assert_eq!(summary, RunSummary::default());
    assert!(!ws.path("out").exists());
}

#[tokio::test]
async fn storyboard_edits_apply_to_later_scenes() {
    let ws = Workspace::new();
    let board = ws.path("storyboard.md");
    let cast = ws.path("cast.md");
    let renderer = FakeRenderer::new(Box::new(move |req, call| {
        if call == 1 {
            std::fs::write(&cast, "HERO: the queen\n").unwrap();
            std::fs::write(&board, "- {HERO} at the gate\n- {HERO} sails away\n").unwrap();
        }
        Ok(req.prompt.clone().into_bytes())
    }));

    let summary = run_scenes(&renderer, &ws.options(RunMode::All)).await.unwrap();

    let prompts: Vec<String> = renderer.requests().into_iter().map(|r| r.prompt).collect();
    assert_eq!(prompts, vec!["the knight at the gate", "the queen sails away"]);
    assert_eq!(summary.successful, vec![1, 2]);
    // scene 3 disappeared from the storyboard mid-run
    assert_eq!(summary.skipped, vec![3]);
}

#[tokio::test]
async fn rejected_extension_falls_back_to_text_to_video() {
    let ws = Workspace::new();
    let renderer = FakeRenderer::new(Box::new(|req, _| {
        if req.input_video.is_some() {
            Err(GenerationError::Api {
                status: 400,
                message: "Input video must be a video that was generated by VEO".into(),
            })
        } else {
            Ok(b"plain".to_vec())
        }
    }));
    let mut opts = ws.options(RunMode::Single(1));
    opts.input_video = Some(ws.path("previous.mp4"));

    let summary = run_scenes(&renderer, &opts).await.unwrap();

    assert_eq!(summary.successful, vec![1]);
    let requests = renderer.requests();
    assert_eq!(requests.len(), 2);
    assert!(requests[0].input_video.is_some());
    assert!(requests[1].input_video.is_none());
}

#[tokio::test]
async fn global_reference_image_reaches_the_renderer() {
    let ws = Workspace::new();
    std::fs::write(
        ws.path("storyboard.md"),
        "- first\n- second [IMAGE: none]\n- third [IMAGE: refs/own.png]\n",
    )
    .unwrap();
    let renderer = FakeRenderer::ok();
    let mut opts = ws.options(RunMode::All);
    opts.reference_image = Some(PathBuf::from("refs/global.png"));

    run_scenes(&renderer, &opts).await.unwrap();

    let images: Vec<Option<PathBuf>> =
        renderer.requests().into_iter().map(|r| r.reference_image).collect();
    assert_eq!(
        images,
        vec![
            Some(PathBuf::from("refs/global.png")),
            None,
            Some(PathBuf::from("refs/own.png")),
        ]
    );
}

const COOLDOWN: Duration = Duration::from_secs(30);

async fn timed_run(renderer: &FakeRenderer, opts: &RunOptions) -> (RunSummary, Duration) {
    let started = tokio::time::Instant::now();
    let summary = run_scenes(renderer, opts).await.unwrap();
    (summary, started.elapsed())
}

#[tokio::test(start_paused = true)]
async fn run_all_cools_down_between_successful_scenes() {
    let ws = Workspace::new();
    let renderer = FakeRenderer::ok();
    let mut opts = ws.options(RunMode::All);
    opts.cooldown = COOLDOWN;

    let (summary, elapsed) = timed_run(&renderer, &opts).await;

    assert_eq!(summary.successful, vec![1, 2, 3]);
    // none after the last scene
    assert_eq!(elapsed, COOLDOWN * 2);
}

#[tokio::test(start_paused = true)]
async fn single_scene_runs_skip_the_cooldown() {
    let ws = Workspace::new();
    let renderer = FakeRenderer::ok();
    let mut opts = ws.options(RunMode::Single(1));
    opts.cooldown = COOLDOWN;

    let (summary, elapsed) = timed_run(&renderer, &opts).await;

    assert_eq!(summary.successful, vec![1]);
    assert_eq!(elapsed, Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn failed_and_skipped_scenes_do_not_cool_down() {
    let ws = Workspace::new();
    let board = "- first\n- second fails\n- third\n- fourth\n";
    std::fs::write(ws.path("storyboard.md"), board).unwrap();
    std::fs::create_dir_all(ws.path("out")).unwrap();
    std::fs::write(ws.path("out").join("scene_3_third.mp4"), b"old").unwrap();
    let renderer = FakeRenderer::new(Box::new(|req, _| {
        if req.prompt.contains("fails") {
            Err(GenerationError::Operation {
                code: 13,
                message: "internal".into(),
            })
        } else {
            Ok(req.prompt.clone().into_bytes())
        }
    }));
    let mut opts = ws.options(RunMode::All);
    opts.cooldown = COOLDOWN;

    let (summary, elapsed) = timed_run(&renderer, &opts).await;

    assert_eq!(summary.successful, vec![1, 4]);
    assert_eq!(summary.failed_other, vec![2]);
    assert_eq!(summary.skipped, vec![3]);
    // only scene 1 is followed by a cooldown
    assert_eq!(elapsed, COOLDOWN);
}
