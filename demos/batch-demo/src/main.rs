use std::{sync::Arc, time::Duration};

use anyhow::Context;
use tracing::{info, warn};

use batchkit_core::prelude::*;
use batchkit_observe::{LogSubscriber, LoggerConfig, LoggerFormat, LoggerLevel, logger_init};

/// A pretend image on disk.
struct Image {
    name: String,
    bytes: Vec<u8>,
}

const JPEG_MAGIC: [u8; 2] = [0xFF, 0xD8];

fn images(count: usize) -> Vec<Arc<Image>> {
    (1..=count)
        .map(|n| {
            let mut bytes = vec![0u8; 1024 * n];
            // every seventh file has a broken header
            if n % 7 != 0 {
                bytes[..2].copy_from_slice(&JPEG_MAGIC);
            }
            Arc::new(Image {
                name: format!("IMG_{n:04}.jpg"),
                bytes,
            })
        })
        .collect()
}

/// "Resizes" an image: validates the header and returns the scaled byte count.
fn resizer() -> ProcessorRef<Image, usize> {
    ProcessorFn::arc(
        "resize",
        |img: Arc<Image>, opts: TaskOptions, ctx: CancellationToken| async move {
            if img.bytes[..2] != JPEG_MAGIC {
                return Err(TaskError::fail(format!("{}: not a jpeg", img.name)));
            }
            let scale: usize = opts.parse("scale").unwrap_or(2);
            let work = Duration::from_millis(50 + (img.bytes.len() / 64) as u64);

            tokio::select! {
                _ = tokio::time::sleep(work) => Ok(img.bytes.len() / scale.max(1)),
                _ = ctx.cancelled() => Err(TaskError::Canceled),
            }
        },
    )
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1) Logger
    let mut cfg = LoggerConfig::default();
    if let Ok(level) = std::env::var("BATCH_LOG_LEVEL") {
        cfg.level = LoggerLevel::new(level)?;
    }
    if let Ok(format) = std::env::var("BATCH_LOG_FORMAT") {
        cfg.format = format.parse::<LoggerFormat>()?;
    }
    logger_init(&cfg)?;
    info!(format = %cfg.format, level = %cfg.level, "logger initialized");

    // 2) Controller
    let max_concurrency = std::env::var("BATCH_MAX_CONCURRENCY")
        .ok()
        .map(|v| v.parse::<usize>())
        .transpose()
        .context("BATCH_MAX_CONCURRENCY must be a positive integer")?
        .unwrap_or(4);
    let config = BatchConfig::new(max_concurrency).with_task_timeout(Duration::from_secs(5));

    let callbacks = Callbacks::new()
        .on_progress(|p| {
            if p.is_complete() {
                info!("all {} files processed", p.total_tasks);
            } else {
                info!(
                    "progress {}% ({}/{})",
                    p.overall_progress, p.processed_tasks, p.total_tasks
                );
            }
        })
        .on_error(|task, err| warn!(task = %task.id, "skipping file: {err}"))
        .on_success(|stats| {
            info!(
                "finished: {} ok, {} failed, {} cancelled",
                stats.completed_tasks, stats.failed_tasks, stats.cancelled_tasks
            )
        });
    let subscribers: Vec<Arc<dyn Subscribe>> = vec![
        Arc::new(callbacks) as Arc<dyn Subscribe>,
        Arc::new(LogSubscriber::new()) as Arc<dyn Subscribe>,
    ];
    let batch: BatchController<Image, usize> = BatchController::new(config, subscribers)?;

    // 3) Enqueue
    let processor = resizer();
    for img in images(20) {
        let opts = TaskOptions::new().with("scale", "4");
        batch.add_task(img, Arc::clone(&processor), opts)?;
    }
    info!(batch = %batch.id(), "20 images queued");

    // 4) Run until done or Ctrl+C
    batch.start()?;
    let stats = tokio::select! {
        stats = batch.wait() => stats,
        res = tokio::signal::ctrl_c() => {
            res?;
            info!("stop requested, waiting for running tasks");
            batch.stop()?;
            batch.wait().await
        }
    };

    println!("{}", serde_json::to_string_pretty(&stats)?);
    for task in batch.take_completed_tasks()?.iter().take(3) {
        if let Some(size) = task.result.as_deref() {
            info!(task = %task.id, "{} -> {size} bytes", task.input.name);
        }
    }

    Ok(())
}
