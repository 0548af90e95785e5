use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::deadline::Deadline;
use crate::operator::{BuildFn, InvokeFuture, LocalExecutor};
use crate::telemetry::Telemetry;

/// Ordering key for published results.
///
/// Any cloud result outranks the local fallback; cloud results order by
/// priority, then by registration order. The derived `Ord` encodes exactly
/// that (variant order, then field order).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum Rank {
    Cloud { priority: i32, slot: usize },
    Local,
}

/// Deadline reported by one cloud worker after its build phase.
///
/// `deadline: None` means the implementation abstained for this message and
/// must not constrain the effective deadline.
pub(crate) struct DeadlineReport {
    pub(crate) priority: i32,
    pub(crate) deadline: Option<Deadline>,
}

pub(crate) enum ResultSlot<Out> {
    Completed { rank: Rank, output: Out },
    Failed,
    Cancelled,
}

pub(crate) async fn run_local_worker<In, Out>(
    local: Arc<dyn LocalExecutor<In, Out>>,
    input: Arc<In>,
    results_tx: mpsc::Sender<ResultSlot<Out>>,
    telemetry: Arc<Telemetry>,
    cancel: CancellationToken,
) where
    In: Send + Sync + 'static,
    Out: Send + 'static,
{
    let started_at = Instant::now();
    tokio::select! {
        _ = cancel.cancelled() => {
            let _ = results_tx.try_send(ResultSlot::Cancelled);
        }
        res = local.execute_local(input.as_ref()) => {
            let elapsed = started_at.elapsed();
            telemetry.record_local(elapsed);
            match res {
                Ok(output) => {
                    info!(elapsed_ms = elapsed.as_millis() as u64, "local execution finished");
                    let _ = results_tx
                        .send(ResultSlot::Completed { rank: Rank::Local, output })
                        .await;
                }
                Err(err) => {
                    warn!("local execution failed: {err:#}");
                    let _ = results_tx.send(ResultSlot::Failed).await;
                }
            }
        }
    }
}

pub(crate) async fn run_cloud_worker<In, Out>(
    build: BuildFn<In, Out>,
    priority: i32,
    slot: usize,
    timestamp: DateTime<Utc>,
    input: Arc<In>,
    reports_tx: mpsc::Sender<DeadlineReport>,
    results_tx: mpsc::Sender<ResultSlot<Out>>,
    telemetry: Arc<Telemetry>,
    cancel: CancellationToken,
) where
    In: Send + Sync + 'static,
    Out: Send + 'static,
{
    let rank = Rank::Cloud { priority, slot };
    let started_at = Instant::now();

    // Build phase. The deadline report must be released before the endpoint
    // is invoked: the coordinator aggregates the effective deadline while
    // requests are in flight and must never see a request without one.
    let invoke: InvokeFuture<Out> = match (*build)(timestamp, input.as_ref()) {
        Ok(Some((deadline, invoke))) => {
            let _ = reports_tx
                .send(DeadlineReport { priority, deadline: Some(deadline) })
                .await;
            invoke
        }
        Ok(None) => {
            debug!(priority, "builder produced no request; abstaining");
            let _ = reports_tx
                .send(DeadlineReport { priority, deadline: None })
                .await;
            return;
        }
        Err(err) => {
            warn!(priority, "request builder failed, abstaining: {err:#}");
            let _ = reports_tx
                .send(DeadlineReport { priority, deadline: None })
                .await;
            return;
        }
    };

    // Invoke and publish phases.
    tokio::select! {
        _ = cancel.cancelled() => {
            let _ = results_tx.try_send(ResultSlot::Cancelled);
        }
        res = invoke => {
            let elapsed = started_at.elapsed();
            telemetry.record_cloud(priority, elapsed);
            match res {
                Ok(output) => {
                    info!(
                        priority,
                        elapsed_ms = elapsed.as_millis() as u64,
                        "cloud implementation responded"
                    );
                    let _ = results_tx
                        .send(ResultSlot::Completed { rank, output })
                        .await;
                }
                Err(err) => {
                    warn!(priority, "cloud implementation failed: {err:#}");
                    let _ = results_tx.send(ResultSlot::Failed).await;
                }
            }
        }
    }
}
