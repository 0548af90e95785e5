use std::sync::Arc;
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::api::ProcessError;
use crate::operator::SpeculativeOperator;
use crate::worker::{self, DeadlineReport, Rank, ResultSlot};

/// Per-message orchestration: fan out, aggregate deadlines, race, tear down.
///
/// All mutable message state lives in this call frame; nothing outlives it.
pub(crate) async fn process_message<In, Out>(
    operator: &SpeculativeOperator<In, Out>,
    timestamp: DateTime<Utc>,
    input: In,
) -> Result<Out, ProcessError>
where
    In: Send + Sync + 'static,
    Out: Send + 'static,
{
    let input = Arc::new(input);
    let telemetry = operator.telemetry_handle();
    let cancel = CancellationToken::new();

    let n_cloud = operator.implementations().len();
    let start_wall = SystemTime::now();
    let started_at = Instant::now();

    // Each worker deposits at most one slot, so the capacities below let
    // every send complete even after the coordinator stops receiving.
    let (reports_tx, mut reports_rx) = mpsc::channel::<DeadlineReport>(n_cloud.max(1));
    let (results_tx, mut results_rx) = mpsc::channel::<ResultSlot<Out>>(n_cloud + 1);

    // Fan out: the local fallback plus one worker per cloud implementation,
    // in ascending priority (stable for equal priorities).
    let mut workers = JoinSet::new();
    workers.spawn(worker::run_local_worker(
        operator.local(),
        input.clone(),
        results_tx.clone(),
        telemetry.clone(),
        cancel.clone(),
    ));

    let mut order: Vec<usize> = (0..n_cloud).collect();
    order.sort_by_key(|&idx| operator.implementations()[idx].priority);
    for (slot, idx) in order.into_iter().enumerate() {
        let imp = &operator.implementations()[idx];
        workers.spawn(worker::run_cloud_worker(
            imp.build.clone(),
            imp.priority,
            slot,
            timestamp,
            input.clone(),
            reports_tx.clone(),
            results_tx.clone(),
            telemetry.clone(),
            cancel.clone(),
        ));
    }
    drop(reports_tx);
    drop(results_tx);

    // Deadline aggregation: every cloud worker reports exactly once, before
    // its endpoint call starts, so the minimum below cannot race a request
    // already in flight. Abstentions report no deadline and never pull the
    // minimum down; with no constraining deadline at all the race below is
    // unbounded and only worker completion can end it.
    let mut effective: Option<SystemTime> = None;
    for _ in 0..n_cloud {
        let Some(report) = reports_rx.recv().await else {
            break;
        };
        debug!(priority = report.priority, reported = report.deadline.is_some(), "deadline reported");
        if let Some(deadline) = report.deadline {
            let at = deadline.to_absolute(start_wall);
            effective = Some(match effective {
                Some(current) => current.min(at),
                None => at,
            });
        }
    }

    let deadline_sleep = async {
        match effective {
            Some(at) => {
                let remaining = at
                    .duration_since(SystemTime::now())
                    .unwrap_or(Duration::ZERO);
                tokio::time::sleep(remaining).await;
            }
            None => std::future::pending::<()>().await,
        }
    };
    tokio::pin!(deadline_sleep);

    // Race: first completion wins, ties inside the simultaneity window go to
    // the best rank. A deadline firing here is final; late arrivals cannot
    // override it.
    let outcome = loop {
        tokio::select! {
            biased;
            slot = results_rx.recv() => match slot {
                Some(ResultSlot::Completed { rank, output }) => {
                    let tie_window = operator.config().tie_window;
                    break Ok(select_winner(rank, output, &mut results_rx, tie_window).await);
                }
                Some(ResultSlot::Failed) => {
                    debug!("worker failed before producing a result; waiting for the rest");
                }
                Some(ResultSlot::Cancelled) => {}
                None => {
                    warn!("all workers failed before the effective deadline");
                    break Err(ProcessError::AllFailed);
                }
            },
            _ = &mut deadline_sleep => {
                warn!("no result before the effective deadline");
                break Err(ProcessError::DeadlineMissed);
            }
        }
    };

    // Tear down: cancel surviving workers and join every task so nothing
    // outlives the message. Remaining slots are discarded with the channel.
    cancel.cancel();
    while workers.join_next().await.is_some() {}

    telemetry.record_decision(started_at.elapsed());
    outcome
}

/// Collect results landing within the simultaneity window of the first
/// completion and pick the best-ranked one.
async fn select_winner<Out>(
    first_rank: Rank,
    first_output: Out,
    results_rx: &mut mpsc::Receiver<ResultSlot<Out>>,
    tie_window: Duration,
) -> Out {
    let mut best_rank = first_rank;
    let mut best_output = first_output;

    let window = tokio::time::sleep(tie_window);
    tokio::pin!(window);
    loop {
        tokio::select! {
            biased;
            slot = results_rx.recv() => match slot {
                Some(ResultSlot::Completed { rank, output }) => {
                    if rank < best_rank {
                        best_rank = rank;
                        best_output = output;
                    }
                }
                Some(_) => {}
                None => break,
            },
            _ = &mut window => break,
        }
    }

    match best_rank {
        Rank::Cloud { priority, .. } => debug!(priority, "selected cloud result"),
        Rank::Local => debug!("selected local fallback result"),
    }
    best_output
}
