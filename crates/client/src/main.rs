mod cli;
mod frames;
mod local;
mod remote;
mod summary;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use clap::Parser;
use specex_coordinator::{Deadline, OperatorConfig, SpeculativeOperator};
use specex_core::detection::DetectedObject;
use specex_core::wire::{DetectRequest, DetectResponse};
use tracing::warn;

use crate::cli::Cli;
use crate::frames::{Frame, FrameSource};
use crate::local::LocalDetector;
use crate::remote::HttpDetectionEndpoint;

/// Output of one speculative decision: the detections plus which side
/// produced them.
pub struct FrameResult {
    pub source: String,
    pub objects: Vec<DetectedObject>,
}

fn init_tracing(verbose: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(if verbose { "info" } else { "warn" }));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(60))
        .build()?;

    let local = Arc::new(LocalDetector::new(cli.local_delay));
    let mut operator: SpeculativeOperator<Frame, FrameResult> =
        SpeculativeOperator::new(local, OperatorConfig::default());

    for (idx, url) in cli.cloud_urls.iter().enumerate() {
        let endpoint = Arc::new(HttpDetectionEndpoint::new(http.clone(), url)?);
        let deadline = Deadline::relative(cli.deadline);
        let label = format!("cloud#{idx}");
        operator.register_cloud(
            endpoint,
            move |timestamp, frame: &Frame| {
                Ok(Some((
                    DetectRequest::new(frame.seq, timestamp.timestamp_millis(), &frame.data),
                    deadline,
                )))
            },
            move |response: DetectResponse| FrameResult {
                source: label.clone(),
                objects: response.objects,
            },
            idx as i32,
        );
    }

    let mut source = match &cli.frames_dir {
        Some(dir) => FrameSource::from_dir(cli.fps, dir)?,
        None => FrameSource::synthetic(cli.fps, cli.frame_bytes as usize),
    };

    println!(
        "specex {} clouds={} deadline={}ms fps={}",
        env!("CARGO_PKG_VERSION"),
        cli.cloud_urls.len(),
        cli.deadline.as_millis(),
        cli.fps
    );

    let mut processed = 0u64;
    let mut missed = 0u64;
    while processed < cli.frames {
        let frame = tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                eprintln!("Stop requested — exiting.");
                break;
            }
            frame = source.next_frame() => frame?,
        };

        let seq = frame.seq;
        let started = tokio::time::Instant::now();
        match operator.process_message(Utc::now(), frame).await {
            Ok(result) => {
                println!(
                    "frame {seq}: {} object(s) via {} in {} ms",
                    result.objects.len(),
                    result.source,
                    started.elapsed().as_millis()
                );
            }
            Err(err) => {
                missed += 1;
                warn!("frame {seq}: {err}");
                println!("frame {seq}: no result ({err})");
            }
        }
        processed += 1;
    }

    let snapshot = operator.telemetry();
    println!("--- {processed} frame(s), {missed} without result ---");
    println!("{}", summary::format_series("decision", &snapshot.decision));
    println!("{}", summary::format_series("local", &snapshot.local));
    for (priority, series) in &snapshot.cloud {
        println!("{}", summary::format_series(&format!("cloud#{priority}"), series));
    }

    Ok(())
}
