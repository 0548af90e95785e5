//! Public API types for the speculative execution coordinator.

use std::collections::BTreeMap;
use std::time::Duration;

/// Configuration for a [`SpeculativeOperator`](crate::SpeculativeOperator).
#[derive(Debug, Clone)]
pub struct OperatorConfig {
    /// Simultaneity window for the per-message result race.
    ///
    /// Results arriving within this window of the first completion count as
    /// having arrived at the same time and are ranked by priority instead of
    /// by arrival order.
    pub tie_window: Duration,

    /// Number of samples retained per rolling telemetry series.
    pub telemetry_window: usize,
}

impl OperatorConfig {
    /// Default simultaneity window (~1 ms scheduling resolution).
    pub const DEFAULT_TIE_WINDOW: Duration = Duration::from_millis(1);

    /// Default size of each rolling telemetry series.
    pub const DEFAULT_TELEMETRY_WINDOW: usize = 100;

    pub(crate) fn normalized(mut self) -> Self {
        if self.tie_window == Duration::ZERO {
            self.tie_window = Self::DEFAULT_TIE_WINDOW;
        }
        if self.telemetry_window == 0 {
            self.telemetry_window = Self::DEFAULT_TELEMETRY_WINDOW;
        }
        self
    }
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            tie_window: Self::DEFAULT_TIE_WINDOW,
            telemetry_window: Self::DEFAULT_TELEMETRY_WINDOW,
        }
    }
}

/// Failure of a single `process_message` call.
///
/// Worker-level failures (a builder, an endpoint or the local computation
/// erroring) are contained and never surface here on their own; a message
/// fails only when no worker produced a usable result.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProcessError {
    /// No result arrived before the effective deadline.
    #[error("no result arrived before the effective deadline")]
    DeadlineMissed,
    /// Every worker failed or abstained before the effective deadline.
    #[error("all workers failed before the effective deadline")]
    AllFailed,
}

/// Point-in-time copy of an operator's rolling telemetry.
#[derive(Debug, Clone, Default)]
pub struct TelemetrySnapshot {
    /// RPC round-trip times per cloud implementation, keyed by priority
    /// (newest last).
    pub cloud: BTreeMap<i32, Vec<Duration>>,
    /// Local execution times (newest last).
    pub local: Vec<Duration>,
    /// Whole speculative decision times, one per processed message
    /// (newest last).
    pub decision: Vec<Duration>,
}
