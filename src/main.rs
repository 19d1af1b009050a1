use anyhow::Result;
use clap::Parser;
use veo_storyboard::api::vertex::RESOLUTION;
use veo_storyboard::cli::Args;
use veo_storyboard::config::Config;
use veo_storyboard::generator::run_generation;
use veo_storyboard::init_logger;

#[tokio::main]
async fn main() -> Result<()> {
    // a missing .env is fine
    let _ = dotenvy::dotenv();
    let args = Args::parse();
    init_logger(args.verbose);

    if args.resolution != RESOLUTION {
        tracing::warn!(
            "--resolution {} is ignored; renders are always {}",
            args.resolution,
            RESOLUTION
        );
    }

    let cfg = Config::from_env();
    let Some(opts) = args.run_options(cfg.timings.cooldown) else {
        eprintln!("Error: You must specify --scene-number <N>, --run-all, or --list-scenes");
        std::process::exit(2);
    };

    let code = run_generation(cfg, opts).await?;
    std::process::exit(code);
}
