// This file is an example of how to use the `motion_vision` library.
// The main library entry point is `src/lib.rs`.
//
// It replays a directory of still frames through a `MotionPipeline`, forwards
// zone changes to an async logging task and can dump every threshold image.

use anyhow::{Context, Result};
use clap::Parser;
use motion_vision::core_modules::utils::image_helper::save_buffer;
use motion_vision::logging::init_logging;
use motion_vision::{Frame, FrameStamp, MotionPipeline, NormRect, VisionConfig, ZoneEvent};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Replay still frames through the motion detection engine",
    long_about = None
)]
struct Args {
    /// Directory of PNG/JPEG frames, processed in file name order
    frames_dir: PathBuf,

    /// JSON configuration file (defaults enable zones, blobs and tracking)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write each frame's threshold image here
    #[arg(short, long)]
    dump_dir: Option<PathBuf>,

    /// Number of evenly spaced active zones across the middle of the frame
    #[arg(short, long, default_value_t = 4)]
    zones: usize,

    /// Frame rate used to derive timestamps
    #[arg(long, default_value_t = 30)]
    fps: u64,
}

fn frame_paths(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("cannot list {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| matches!(ext.to_ascii_lowercase().as_str(), "png" | "jpg" | "jpeg"))
                .unwrap_or(false)
        })
        .collect();
    paths.sort();
    Ok(paths)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => VisionConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => VisionConfig {
            handle_active_zones: true,
            handle_blobs: true,
            track_blobs: true,
            ..VisionConfig::default()
        },
    };
    if !init_logging(&config.logging) {
        warn!("a tracing subscriber was already installed");
    }

    let paths = frame_paths(&args.frames_dir)?;
    if paths.is_empty() {
        anyhow::bail!("no frames found in {}", args.frames_dir.display());
    }
    if let Some(dir) = &args.dump_dir {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("cannot create {}", dir.display()))?;
    }

    let (tx, mut rx) = mpsc::unbounded_channel::<ZoneEvent>();
    let listener = tokio::spawn(async move {
        let mut flips = 0usize;
        while let Some(event) = rx.recv().await {
            flips += 1;
            info!(
                zone = %event.id,
                occupied = event.occupied,
                fill_ratio = event.fill_ratio,
                millis = event.stamp.millis,
                "zone event"
            );
        }
        flips
    });

    let mut pipeline = MotionPipeline::new(config);
    let zone_count = args.zones.max(1);
    for i in 0..args.zones {
        let width = 1.0 / zone_count as f64;
        let rect = NormRect::new(i as f64 * width, 0.4, width, 0.2);
        pipeline.add_zone_with_handler(i, rect, tx.clone());
    }
    drop(tx);

    let frame_millis = 1000 / args.fps.max(1);
    let mut processed = 0u64;
    for (index, path) in paths.iter().enumerate() {
        let image = image::open(path)
            .with_context(|| format!("cannot decode {}", path.display()))?
            .to_rgba8();
        let frame = Frame::from(&image);
        let stamp = FrameStamp::new(index as u64 * frame_millis, index as u64);

        let report = match pipeline.update(&frame, stamp) {
            Ok(report) => report,
            Err(err) => {
                warn!(%err, path = %path.display(), "frame skipped");
                continue;
            }
        };
        processed += 1;

        for blob in pipeline.blobs() {
            info!(
                frame = index,
                id = ?blob.id,
                x = blob.centroid.x,
                y = blob.centroid.y,
                mass = blob.mass,
                is_new = blob.is_new,
                "blob"
            );
        }
        if !report.zone_events.is_empty() {
            info!(frame = index, flips = report.zone_events.len(), "zones changed");
        }

        if let Some(dir) = &args.dump_dir {
            let target = dir.join(format!("threshold_{index:05}.png"));
            save_buffer(&target, pipeline.threshold_image())
                .with_context(|| format!("cannot write {}", target.display()))?;
        }
    }

    // The zones hold the remaining senders.
    drop(pipeline);
    let flips = listener.await.context("zone event listener failed")?;
    info!(frames = processed, zone_events = flips, "replay finished");
    Ok(())
}
