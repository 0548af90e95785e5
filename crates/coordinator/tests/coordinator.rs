//! End-to-end tests for the speculative coordinator, driven through the
//! public operator API against mock endpoints under a paused clock (the
//! multi-second scenarios run instantly and deterministically).

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use specex_coordinator::{
    Deadline, LocalExecutor, OperatorConfig, ProcessError, RpcEndpoint, SpeculativeOperator,
};

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

struct SleepLocal {
    delay: Duration,
    reply: &'static str,
    fail: bool,
}

impl SleepLocal {
    fn replying(delay: Duration, reply: &'static str) -> Arc<Self> {
        Arc::new(Self { delay, reply, fail: false })
    }

    fn failing(delay: Duration) -> Arc<Self> {
        Arc::new(Self { delay, reply: "", fail: true })
    }
}

#[async_trait]
impl LocalExecutor<u64, String> for SleepLocal {
    async fn execute_local(&self, _input: &u64) -> anyhow::Result<String> {
        tokio::time::sleep(self.delay).await;
        if self.fail {
            anyhow::bail!("local computation crashed");
        }
        Ok(self.reply.to_string())
    }
}

struct EchoEndpoint {
    delay: Duration,
    reply: &'static str,
    fail: bool,
    started: AtomicBool,
    completed: AtomicBool,
}

impl EchoEndpoint {
    fn replying(delay: Duration, reply: &'static str) -> Arc<Self> {
        Arc::new(Self {
            delay,
            reply,
            fail: false,
            started: AtomicBool::new(false),
            completed: AtomicBool::new(false),
        })
    }

    fn failing(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay,
            reply: "",
            fail: true,
            started: AtomicBool::new(false),
            completed: AtomicBool::new(false),
        })
    }

    fn started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    fn completed(&self) -> bool {
        self.completed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RpcEndpoint<u64, String> for EchoEndpoint {
    async fn invoke(&self, _request: u64) -> anyhow::Result<String> {
        self.started.store(true, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.completed.store(true, Ordering::SeqCst);
        if self.fail {
            anyhow::bail!("endpoint unavailable");
        }
        Ok(self.reply.to_string())
    }
}

fn operator(local: Arc<SleepLocal>) -> SpeculativeOperator<u64, String> {
    SpeculativeOperator::new(local, OperatorConfig::default())
}

fn register(
    op: &mut SpeculativeOperator<u64, String>,
    endpoint: &Arc<EchoEndpoint>,
    deadline: Deadline,
    priority: i32,
) {
    op.register_cloud(
        endpoint.clone(),
        move |_timestamp, input: &u64| anyhow::Ok(Some((*input, deadline))),
        |response| response,
        priority,
    );
}

#[tokio::test(start_paused = true)]
async fn local_wins_when_cloud_is_slow() {
    let mut op = operator(SleepLocal::replying(ms(100), "local"));
    let cloud = EchoEndpoint::replying(ms(2_000), "cloud-0");
    register(&mut op, &cloud, Deadline::relative(ms(500)), 0);

    let started = tokio::time::Instant::now();
    let result = op.process_message(Utc::now(), 1).await;
    let elapsed = started.elapsed();

    assert_eq!(result.as_deref(), Ok("local"));
    assert!(elapsed >= ms(100) && elapsed < ms(200), "elapsed = {elapsed:?}");
}

#[tokio::test(start_paused = true)]
async fn cloud_wins_when_local_is_slow() {
    let mut op = operator(SleepLocal::replying(ms(1_000), "local"));
    let cloud = EchoEndpoint::replying(ms(200), "cloud-0");
    register(&mut op, &cloud, Deadline::relative(ms(500)), 0);

    let started = tokio::time::Instant::now();
    let result = op.process_message(Utc::now(), 1).await;
    let elapsed = started.elapsed();

    assert_eq!(result.as_deref(), Ok("cloud-0"));
    assert!(elapsed >= ms(200) && elapsed < ms(300), "elapsed = {elapsed:?}");
}

#[tokio::test(start_paused = true)]
async fn deadline_miss_when_nobody_finishes_in_time() {
    let mut op = operator(SleepLocal::replying(ms(2_000), "local"));
    let cloud = EchoEndpoint::replying(ms(2_000), "cloud-0");
    register(&mut op, &cloud, Deadline::relative(ms(500)), 0);

    let started = tokio::time::Instant::now();
    let result = op.process_message(Utc::now(), 1).await;
    let elapsed = started.elapsed();

    assert_eq!(result, Err(ProcessError::DeadlineMissed));
    assert!(elapsed >= ms(490) && elapsed < ms(600), "elapsed = {elapsed:?}");
}

#[tokio::test(start_paused = true)]
async fn lower_priority_number_wins_simultaneous_arrivals() {
    let mut op = operator(SleepLocal::replying(ms(5_000), "local"));
    let first = EchoEndpoint::replying(ms(100), "cloud-0");
    let second = EchoEndpoint::replying(ms(100), "cloud-1");
    register(&mut op, &first, Deadline::relative(ms(1_000)), 0);
    register(&mut op, &second, Deadline::relative(ms(1_000)), 1);

    let result = op.process_message(Utc::now(), 1).await;
    assert_eq!(result.as_deref(), Ok("cloud-0"));
}

#[tokio::test(start_paused = true)]
async fn priority_beats_registration_order() {
    let mut op = operator(SleepLocal::replying(ms(5_000), "local"));
    let second = EchoEndpoint::replying(ms(100), "cloud-1");
    let first = EchoEndpoint::replying(ms(100), "cloud-0");
    register(&mut op, &second, Deadline::relative(ms(1_000)), 1);
    register(&mut op, &first, Deadline::relative(ms(1_000)), 0);

    let result = op.process_message(Utc::now(), 1).await;
    assert_eq!(result.as_deref(), Ok("cloud-0"));
}

#[tokio::test(start_paused = true)]
async fn equal_priorities_tie_break_by_registration_order() {
    let mut op = operator(SleepLocal::replying(ms(5_000), "local"));
    let first = EchoEndpoint::replying(ms(100), "first");
    let second = EchoEndpoint::replying(ms(100), "second");
    register(&mut op, &first, Deadline::relative(ms(1_000)), 0);
    register(&mut op, &second, Deadline::relative(ms(1_000)), 0);

    let result = op.process_message(Utc::now(), 1).await;
    assert_eq!(result.as_deref(), Ok("first"));
}

#[tokio::test(start_paused = true)]
async fn abstaining_builder_skips_the_implementation() {
    let mut op = operator(SleepLocal::replying(ms(5_000), "local"));
    let abstainer = EchoEndpoint::replying(ms(10), "cloud-0");
    op.register_cloud(
        abstainer.clone(),
        |_timestamp, _input: &u64| anyhow::Ok(None::<(u64, Deadline)>),
        |response| response,
        0,
    );
    let cloud = EchoEndpoint::replying(ms(300), "cloud-1");
    register(&mut op, &cloud, Deadline::relative(ms(500)), 1);

    let started = tokio::time::Instant::now();
    let result = op.process_message(Utc::now(), 1).await;
    let elapsed = started.elapsed();

    assert_eq!(result.as_deref(), Ok("cloud-1"));
    assert!(elapsed >= ms(300) && elapsed < ms(400), "elapsed = {elapsed:?}");
    assert!(!abstainer.started(), "abstaining implementation must not be invoked");
}

#[tokio::test(start_paused = true)]
async fn failing_builder_is_treated_as_abstention() {
    let mut op = operator(SleepLocal::replying(ms(5_000), "local"));
    let broken = EchoEndpoint::replying(ms(10), "cloud-0");
    op.register_cloud(
        broken.clone(),
        |_timestamp, _input: &u64| -> anyhow::Result<Option<(u64, Deadline)>> {
            anyhow::bail!("builder exploded")
        },
        |response| response,
        0,
    );
    let cloud = EchoEndpoint::replying(ms(300), "cloud-1");
    register(&mut op, &cloud, Deadline::relative(ms(500)), 1);

    let result = op.process_message(Utc::now(), 1).await;
    assert_eq!(result.as_deref(), Ok("cloud-1"));
    assert!(!broken.started());
}

#[tokio::test(start_paused = true)]
async fn abstention_does_not_bound_the_race() {
    // A lone abstaining implementation must behave as if it were never
    // registered: no deadline, so even a slow local fallback gets through.
    let mut op = operator(SleepLocal::replying(ms(2_000), "local"));
    let abstainer = EchoEndpoint::replying(ms(10), "cloud-0");
    op.register_cloud(
        abstainer.clone(),
        |_timestamp, _input: &u64| anyhow::Ok(None::<(u64, Deadline)>),
        |response| response,
        0,
    );

    let started = tokio::time::Instant::now();
    let result = op.process_message(Utc::now(), 1).await;
    let elapsed = started.elapsed();

    assert_eq!(result.as_deref(), Ok("local"));
    assert!(elapsed >= ms(2_000), "elapsed = {elapsed:?}");
}

#[tokio::test(start_paused = true)]
async fn local_fallback_covers_cloud_failure() {
    let mut op = operator(SleepLocal::replying(ms(200), "local"));
    let cloud = EchoEndpoint::failing(ms(10));
    register(&mut op, &cloud, Deadline::relative(ms(1_000)), 0);

    let started = tokio::time::Instant::now();
    let result = op.process_message(Utc::now(), 1).await;
    let elapsed = started.elapsed();

    assert_eq!(result.as_deref(), Ok("local"));
    assert!(elapsed >= ms(200) && elapsed < ms(300), "elapsed = {elapsed:?}");
}

#[tokio::test(start_paused = true)]
async fn no_cloud_registered_waits_for_local() {
    let op = operator(SleepLocal::replying(ms(3_000), "local"));

    let started = tokio::time::Instant::now();
    let result = op.process_message(Utc::now(), 1).await;
    let elapsed = started.elapsed();

    assert_eq!(result.as_deref(), Ok("local"));
    assert!(elapsed >= ms(3_000), "elapsed = {elapsed:?}");
}

#[tokio::test(start_paused = true)]
async fn all_failed_when_every_worker_errors() {
    let mut op = operator(SleepLocal::failing(ms(100)));
    let cloud = EchoEndpoint::failing(ms(10));
    register(&mut op, &cloud, Deadline::relative(ms(1_000)), 0);

    let started = tokio::time::Instant::now();
    let result = op.process_message(Utc::now(), 1).await;
    let elapsed = started.elapsed();

    assert_eq!(result, Err(ProcessError::AllFailed));
    assert!(elapsed >= ms(100) && elapsed < ms(200), "elapsed = {elapsed:?}");
}

#[tokio::test(start_paused = true)]
async fn effective_deadline_is_the_minimum_report() {
    let mut op = operator(SleepLocal::replying(ms(10_000), "local"));
    let tight = EchoEndpoint::replying(ms(10_000), "cloud-0");
    let loose = EchoEndpoint::replying(ms(10_000), "cloud-1");
    register(&mut op, &tight, Deadline::relative(ms(300)), 0);
    register(&mut op, &loose, Deadline::relative(ms(5_000)), 1);

    let started = tokio::time::Instant::now();
    let result = op.process_message(Utc::now(), 1).await;
    let elapsed = started.elapsed();

    assert_eq!(result, Err(ProcessError::DeadlineMissed));
    assert!(elapsed >= ms(290) && elapsed < ms(400), "elapsed = {elapsed:?}");
}

#[tokio::test(start_paused = true)]
async fn late_result_cannot_override_a_missed_deadline() {
    let mut op = operator(SleepLocal::replying(ms(2_000), "local"));
    let cloud = EchoEndpoint::replying(ms(600), "cloud-0");
    register(&mut op, &cloud, Deadline::relative(ms(500)), 0);

    let started = tokio::time::Instant::now();
    let result = op.process_message(Utc::now(), 1).await;
    let elapsed = started.elapsed();

    assert_eq!(result, Err(ProcessError::DeadlineMissed));
    assert!(elapsed >= ms(490) && elapsed < ms(590), "elapsed = {elapsed:?}");
    assert!(!cloud.completed(), "the in-flight call must be torn down with the message");
}

#[tokio::test(start_paused = true)]
async fn outstanding_workers_are_cancelled_after_selection() {
    let mut op = operator(SleepLocal::replying(ms(100), "local"));
    let cloud = EchoEndpoint::replying(ms(60_000), "cloud-0");
    register(&mut op, &cloud, Deadline::relative(ms(500)), 0);

    let result = op.process_message(Utc::now(), 1).await;
    assert_eq!(result.as_deref(), Ok("local"));

    // Workers are joined before process_message returns, so the endpoint
    // call must have been started and then dropped, never finished.
    assert!(cloud.started());
    assert!(!cloud.completed());
}

#[tokio::test(start_paused = true)]
async fn telemetry_records_the_winning_sides() {
    let mut local_win = operator(SleepLocal::replying(ms(100), "local"));
    let slow_cloud = EchoEndpoint::replying(ms(2_000), "cloud-0");
    register(&mut local_win, &slow_cloud, Deadline::relative(ms(500)), 0);
    local_win.process_message(Utc::now(), 1).await.unwrap();

    let snapshot = local_win.telemetry();
    assert_eq!(snapshot.local.len(), 1);
    assert_eq!(snapshot.decision.len(), 1);
    assert!(snapshot.cloud.is_empty(), "cancelled cloud call must not record a sample");

    let mut cloud_win = operator(SleepLocal::replying(ms(1_000), "local"));
    let fast_cloud = EchoEndpoint::replying(ms(200), "cloud-0");
    register(&mut cloud_win, &fast_cloud, Deadline::relative(ms(500)), 0);
    cloud_win.process_message(Utc::now(), 1).await.unwrap();

    let snapshot = cloud_win.telemetry();
    assert_eq!(snapshot.cloud[&0].len(), 1);
    assert!(snapshot.local.is_empty(), "cancelled local run must not record a sample");
    assert_eq!(snapshot.decision.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn outcome_depends_only_on_registered_implementations() {
    let mut op = operator(SleepLocal::replying(ms(1_000), "local"));
    let cloud = EchoEndpoint::replying(ms(200), "cloud-0");
    register(&mut op, &cloud, Deadline::relative(ms(500)), 0);

    let first = op.process_message(Utc::now(), 1).await;
    let second = op.process_message(Utc::now(), 2).await;
    assert_eq!(first.as_deref(), Ok("cloud-0"));
    assert_eq!(second.as_deref(), Ok("cloud-0"));
    assert_eq!(op.telemetry().decision.len(), 2);
}
