use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use reqwest::Url;

fn parse_duration_ms(input: &str) -> Result<Duration, String> {
    let ms: u64 = input
        .trim()
        .parse()
        .map_err(|_| format!("invalid millisecond value: {input:?}"))?;
    Ok(Duration::from_millis(ms))
}

fn parse_fps(input: &str) -> Result<f64, String> {
    let fps: f64 = input
        .trim()
        .parse()
        .map_err(|_| format!("invalid fps value: {input:?}"))?;
    if !fps.is_finite() || fps <= 0.0 {
        return Err(format!("fps must be positive: {input:?}"));
    }
    Ok(fps)
}

#[derive(Debug, Clone, Parser)]
#[command(name = "specex", version, about = "Speculative object detection client")]
pub struct Cli {
    /// Detection service base URL; repeat to register several cloud
    /// implementations at ascending priority (first = highest).
    #[arg(long = "cloud", env = "SPECEX_CLOUD_URLS", value_delimiter = ',')]
    pub cloud_urls: Vec<Url>,

    /// Relative deadline committed by every cloud request, in milliseconds.
    #[arg(
        long = "deadline-ms",
        env = "SPECEX_DEADLINE_MS",
        default_value = "500",
        value_parser = parse_duration_ms
    )]
    pub deadline: Duration,

    /// Frame rate of the source.
    #[arg(long, env = "SPECEX_FPS", default_value = "10", value_parser = parse_fps)]
    pub fps: f64,

    /// Number of frames to process before exiting.
    #[arg(
        long,
        env = "SPECEX_FRAMES",
        default_value_t = 100,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub frames: u64,

    /// Directory of image files to cycle through instead of synthetic frames.
    #[arg(long = "frames-dir", env = "SPECEX_FRAMES_DIR")]
    pub frames_dir: Option<PathBuf>,

    /// Size of each synthetic frame in bytes (ignored with `--frames-dir`).
    #[arg(
        long = "frame-bytes",
        env = "SPECEX_FRAME_BYTES",
        default_value_t = 64 * 1024,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub frame_bytes: u64,

    /// Artificial delay added to the local fallback, in milliseconds.
    ///
    /// Stands in for real local model inference time when demoing against
    /// fast mock services.
    #[arg(
        long = "local-delay-ms",
        env = "SPECEX_LOCAL_DELAY_MS",
        default_value = "0",
        value_parser = parse_duration_ms
    )]
    pub local_delay: Duration,

    /// Log at info level instead of warn.
    #[arg(short = 'v', long, default_value_t = false)]
    pub verbose: bool,
}
