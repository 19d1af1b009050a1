use crate::config::{DEFAULT_CAST_FILE, DEFAULT_STORYBOARD_FILE};
use crate::generator::{RunMode, RunOptions};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Parser)]
#[command(name = "veo-storyboard")]
#[command(about = "Render storyboard scenes with Veo on Vertex AI")]
pub struct Args {
    /// Run all scenes sequentially
    #[arg(long, conflicts_with_all = ["scene_number", "list_scenes"])]
    pub run_all: bool,

    /// The specific scene number to generate
    #[arg(long, value_name = "N", conflicts_with = "list_scenes")]
    pub scene_number: Option<u32>,

    /// List all scenes and exit
    #[arg(long)]
    pub list_scenes: bool,

    /// Path to the storyboard markdown file
    #[arg(long, env = "STORYBOARD_FILE", default_value = DEFAULT_STORYBOARD_FILE)]
    pub storyboard: PathBuf,

    /// Path to the cast markdown file
    #[arg(long, env = "CAST_FILE", default_value = DEFAULT_CAST_FILE)]
    pub cast: PathBuf,

    /// Directory to save the rendered video clips
    #[arg(long, default_value = "rendered_clips")]
    pub output_dir: PathBuf,

    /// Reference image used for scenes without their own [IMAGE: ...] tag
    #[arg(long)]
    pub reference_image: Option<PathBuf>,

    /// Duration of the generated video in seconds
    #[arg(long, default_value_t = 8)]
    pub duration: u32,

    /// Overwrite existing video files
    #[arg(long)]
    pub overwrite: bool,

    /// Resolution (ignored, always 720p)
    #[arg(long, default_value = "720p")]
    pub resolution: String,

    /// Extend a previously generated Veo clip instead of starting from text
    #[arg(long, value_name = "PATH", requires = "scene_number")]
    pub extend_video: Option<PathBuf>,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,
}

impl Args {
    pub fn run_mode(&self) -> Option<RunMode> {
        if self.list_scenes {
            Some(RunMode::List)
        } else if self.run_all {
            Some(RunMode::All)
        } else {
            self.scene_number.map(RunMode::Single)
        }
    }

    pub fn run_options(&self, cooldown: Duration) -> Option<RunOptions> {
        Some(RunOptions {
            mode: self.run_mode()?,
            cast_path: self.cast.clone(),
            storyboard_path: self.storyboard.clone(),
            output_dir: self.output_dir.clone(),
            reference_image: self.reference_image.clone(),
            input_video: self.extend_video.clone(),
            duration_seconds: self.duration,
            overwrite: self.overwrite,
            cooldown,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Args, clap::Error> {
        Args::try_parse_from(std::iter::once("veo-storyboard").chain(args.iter().copied()))
    }

    #[test]
    fn picks_mode_from_flags() {
        assert_eq!(parse(&["--list-scenes"]).unwrap().run_mode(), Some(RunMode::List));
        assert_eq!(parse(&["--run-all"]).unwrap().run_mode(), Some(RunMode::All));
        assert_eq!(
            parse(&["--scene-number", "4"]).unwrap().run_mode(),
            Some(RunMode::Single(4))
        );
        assert_eq!(parse(&[]).unwrap().run_mode(), None);
    }

    #[test]
    fn modes_are_mutually_exclusive() {
        assert!(parse(&["--run-all", "--scene-number", "2"]).is_err());
        assert!(parse(&["--list-scenes", "--run-all"]).is_err());
    }

    #[test]
    fn extension_requires_a_single_scene() {
        assert!(parse(&["--run-all", "--extend-video", "a.mp4"]).is_err());
        let args = parse(&["--scene-number", "1", "--extend-video", "a.mp4"]).unwrap();
        assert_eq!(args.extend_video, Some(PathBuf::from("a.mp4")));
    }

    #[test]
    fn defaults_match_documented_values() {
        let args = parse(&["--run-all", "--cast", "c.md", "--storyboard", "s.md"]).unwrap();
        assert_eq!(args.duration, 8);
        assert_eq!(args.output_dir, PathBuf::from("rendered_clips"));
        assert!(!args.overwrite);
        let opts = args.run_options(Duration::from_secs(30)).unwrap();
        assert_eq!(opts.cast_path, PathBuf::from("c.md"));
        assert_eq!(opts.storyboard_path, PathBuf::from("s.md"));
        assert_eq!(opts.cooldown, Duration::from_secs(30));
    }
}
