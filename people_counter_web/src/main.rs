use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use ort_common::DetrDetector;
use people_counter_web::analyzer::PipelineAnalyzer;
use people_counter_web::api::{AppState, create_router};
use people_counter_web::settings::Settings;
use tokio::signal;
use tracing::info;
use tracing_subscriber::prelude::*;

#[derive(Debug, Parser)]
pub struct Args {
    /// Optional configuration file (.toml/.yaml/.json).
    #[arg(long, short)]
    config: Option<PathBuf>,
    /// Address to listen on, overrides the configuration.
    #[arg(long)]
    bind: Option<String>,
    /// DETR onnx model file or hub repository id, overrides the configuration.
    #[arg(long, short)]
    model: Option<String>,
    /// Whether to attempt to use `cuda` hw acceleration.
    #[arg(long, action, default_value = "false")]
    cuda: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "warn,people_counter_web=info,ffmpeg_ort=info,ort_common=info,tower_http=info"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let mut settings = Settings::load(args.config.as_deref())?;
    if let Some(bind) = args.bind {
        settings.bind = bind;
    }
    if let Some(model) = args.model {
        settings.model = model;
    }
    settings.cuda |= args.cuda;
    settings.validate()?;
    info!("Configuration loaded: {settings:?}");

    for dir in [&settings.upload_dir, &settings.results_dir] {
        std::fs::create_dir_all(dir).with_context(|| format!("Failed to create {dir:?}"))?;
    }

    // Model is loaded once and shared by every request.
    let (model, cuda) = (settings.model.clone(), settings.cuda);
    let detector = tokio::task::spawn_blocking(move || DetrDetector::load(&model, cuda)).await??;
    let analyzer = PipelineAnalyzer::new(Arc::new(detector), settings.frames_to_process);

    let bind = settings.bind.clone();
    let state = AppState {
        analyzer: Arc::new(analyzer),
        settings: Arc::new(settings),
    };
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("Failed to bind {bind}"))?;
    info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            signal::ctrl_c().await.ok();
            info!("Received shutdown signal");
        })
        .await?;

    Ok(())
}
