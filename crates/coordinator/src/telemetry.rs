use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use crate::api::TelemetrySnapshot;

/// Rolling timing series shared between an operator and its workers.
#[derive(Debug)]
pub(crate) struct Telemetry {
    window: usize,
    inner: Mutex<TelemetryInner>,
}

#[derive(Debug, Default)]
struct TelemetryInner {
    cloud: BTreeMap<i32, VecDeque<Duration>>,
    local: VecDeque<Duration>,
    decision: VecDeque<Duration>,
}

fn push_capped(series: &mut VecDeque<Duration>, sample: Duration, cap: usize) {
    series.push_back(sample);
    while series.len() > cap {
        series.pop_front();
    }
}

impl Telemetry {
    pub(crate) fn new(window: usize) -> Self {
        Self {
            window: window.max(1),
            inner: Mutex::new(TelemetryInner::default()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, TelemetryInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub(crate) fn record_cloud(&self, priority: i32, elapsed: Duration) {
        let mut inner = self.lock();
        let series = inner.cloud.entry(priority).or_default();
        push_capped(series, elapsed, self.window);
    }

    pub(crate) fn record_local(&self, elapsed: Duration) {
        let window = self.window;
        push_capped(&mut self.lock().local, elapsed, window);
    }

    pub(crate) fn record_decision(&self, elapsed: Duration) {
        let window = self.window;
        push_capped(&mut self.lock().decision, elapsed, window);
    }

    pub(crate) fn snapshot(&self) -> TelemetrySnapshot {
        let inner = self.lock();
        TelemetrySnapshot {
            cloud: inner
                .cloud
                .iter()
                .map(|(priority, series)| (*priority, series.iter().copied().collect()))
                .collect(),
            local: inner.local.iter().copied().collect(),
            decision: inner.decision.iter().copied().collect(),
        }
    }
}
