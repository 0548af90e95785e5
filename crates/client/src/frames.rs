use std::path::{Path, PathBuf};
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use tracing::warn;

/// One input frame handed to the operator.
#[derive(Debug, Clone)]
pub struct Frame {
    pub seq: u64,
    pub data: Vec<u8>,
}

enum FramePayloads {
    Synthetic { bytes: usize },
    Directory { files: Vec<PathBuf>, next: usize },
}

/// Paced frame source: synthetic noise frames, or files cycled from a
/// directory, emitted at a fixed rate.
pub struct FrameSource {
    interval: tokio::time::Interval,
    period: Duration,
    last_tick: Option<tokio::time::Instant>,
    payloads: FramePayloads,
    seq: u64,
}

impl FrameSource {
    pub fn synthetic(fps: f64, bytes: usize) -> Self {
        Self::new(fps, FramePayloads::Synthetic { bytes })
    }

    pub fn from_dir(fps: f64, dir: &Path) -> anyhow::Result<Self> {
        let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_file())
            .collect();
        files.sort();
        if files.is_empty() {
            anyhow::bail!("no frame files found in {}", dir.display());
        }
        Ok(Self::new(fps, FramePayloads::Directory { files, next: 0 }))
    }

    fn new(fps: f64, payloads: FramePayloads) -> Self {
        let period = Duration::from_secs_f64(1.0 / fps);
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        Self {
            interval,
            period,
            last_tick: None,
            payloads,
            seq: 0,
        }
    }

    pub async fn next_frame(&mut self) -> anyhow::Result<Frame> {
        let tick = self.interval.tick().await;
        if let Some(last) = self.last_tick {
            let gap = tick.duration_since(last);
            if gap > self.period * 3 / 2 {
                warn!(
                    behind_ms = (gap - self.period).as_millis() as u64,
                    "frame source falling behind the configured rate"
                );
            }
        }
        self.last_tick = Some(tick);

        let seq = self.seq;
        self.seq += 1;

        let data = match &mut self.payloads {
            FramePayloads::Synthetic { bytes } => {
                // Seed per frame so a given sequence number always produces
                // the same payload.
                let mut rng = StdRng::seed_from_u64(seq);
                let mut data = vec![0u8; *bytes];
                rng.fill_bytes(&mut data);
                data
            }
            FramePayloads::Directory { files, next } => {
                let path = &files[*next];
                *next = (*next + 1) % files.len();
                std::fs::read(path)?
            }
        };

        Ok(Frame { seq, data })
    }
}
