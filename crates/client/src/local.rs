use std::time::Duration;

use async_trait::async_trait;
use specex_coordinator::LocalExecutor;
use specex_core::detector;

use crate::FrameResult;
use crate::frames::Frame;

/// Local fallback: runs the reference detector in-process.
pub struct LocalDetector {
    delay: Duration,
}

impl LocalDetector {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl LocalExecutor<Frame, FrameResult> for LocalDetector {
    async fn execute_local(&self, input: &Frame) -> anyhow::Result<FrameResult> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let data = input.data.clone();
        let objects = tokio::task::spawn_blocking(move || detector::detect(&data))
            .await
            .map_err(|err| anyhow::anyhow!("local detector task join error: {err:#}"))?;

        Ok(FrameResult {
            source: "local".to_string(),
            objects,
        })
    }
}
