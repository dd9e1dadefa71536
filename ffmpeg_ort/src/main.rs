use std::path::PathBuf;

use clap::Parser;
use ffmpeg_ort::count_people_in_video;
use inference_common::video_meta::VideoMeta;
use ort_common::model::DEFAULT_DETR_REPO;
use ort_common::DetrDetector;
use tracing_subscriber::prelude::*;

#[derive(Debug, Parser)]
pub struct Args {
    /// Path to input video file (.mp4/.mkv).
    input: PathBuf,
    /// Whether to attempt to use `cuda` hw acceleration.
    /// This may silently fail and fallback to cpu acceleration presently.
    #[arg(long, action, default_value = "false")]
    cuda: bool,
    /// DETR onnx model file, or hub repository id to fetch it from.
    #[arg(long, short, default_value = DEFAULT_DETR_REPO)]
    model: String,
    /// Number of evenly spaced frames to run inference on.
    #[arg(long, short, default_value = "3", value_parser = clap::value_parser!(u64).range(1..))]
    frames: u64,
}

fn main() -> anyhow::Result<()> {
    // Initialize logging.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn,ffmpeg_ort=info,inference_common=info,ort_common=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let detector = DetrDetector::load(&args.model, args.cuda)?;

    let count = count_people_in_video(&args.input, &detector, args.frames)?;

    // Save output: annotated last frame & per-frame report.
    let img_output_path = args.input.with_extension("out.jpg");
    count.annotated.save(&img_output_path)?;

    let video_meta = VideoMeta::new(
        args.input.clone(),
        Some(img_output_path.clone()),
        args.frames,
        &count,
    );
    let output_json_path = args.input.with_extension("json");
    log::info!(
        "Writing output json file, {} frames: {output_json_path:?}",
        video_meta.frames.len()
    );
    video_meta.save_json(&output_json_path)?;

    println!("{}", count.people);
    log::info!("Annotated frame saved to {img_output_path:?}");

    Ok(())
}
