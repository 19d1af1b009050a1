use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

pub mod api;
pub mod cast;
pub mod cli;
pub mod config;
pub mod error;
pub mod generator;
pub mod init;
pub mod naming;
pub mod platform;
pub mod reference_image;
pub mod scenes;
pub mod storyboard;

pub use error::{GenerationError, Result};

pub fn init_logger(verbose: bool) {
    let fallback = if verbose {
        "veo_storyboard=debug,info"
    } else {
        "veo_storyboard=info,warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .without_time()
                .compact(),
        )
        .init();
}

pub(crate) fn logi(message: impl AsRef<str>) {
    tracing::info!("{}", message.as_ref());
}

pub(crate) fn logok(message: impl AsRef<str>) {
    tracing::info!(status = "ok", "{}", message.as_ref());
}

pub(crate) fn logw(message: impl AsRef<str>) {
    tracing::warn!("{}", message.as_ref());
}
