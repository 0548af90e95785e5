use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::api::{OperatorConfig, ProcessError, TelemetrySnapshot};
use crate::coordinator;
use crate::deadline::Deadline;
use crate::endpoint::RpcEndpoint;
use crate::telemetry::Telemetry;

/// The in-process computation run for every message as a correctness floor.
///
/// The local result is a fallback: it is always computed, but a cloud result
/// arriving in the same simultaneity window outranks it.
#[async_trait]
pub trait LocalExecutor<In, Out>: Send + Sync {
    /// Compute the output locally.
    ///
    /// Failures are contained by the coordinator; they can only surface as
    /// [`ProcessError::AllFailed`] when no cloud result arrives either.
    async fn execute_local(&self, input: &In) -> anyhow::Result<Out>;
}

pub(crate) type InvokeFuture<Out> = Pin<Box<dyn Future<Output = anyhow::Result<Out>> + Send>>;

/// Build closure of one registered implementation: runs the request builder
/// and, when a request was produced, yields the reported deadline together
/// with the not-yet-started endpoint call.
pub(crate) type BuildFn<In, Out> = Arc<
    dyn Fn(DateTime<Utc>, &In) -> anyhow::Result<Option<(Deadline, InvokeFuture<Out>)>>
        + Send
        + Sync,
>;

pub(crate) struct Implementation<In, Out> {
    pub(crate) build: BuildFn<In, Out>,
    pub(crate) priority: i32,
}

/// Speculatively executes a logical function in the cloud and locally as a
/// fallback, returning the first acceptable result per message.
///
/// Cloud implementations are registered up front with [`register_cloud`]
/// (`&mut self`), so the implementation table cannot change while a message
/// is in flight (`process_message` borrows `&self`).
///
/// [`register_cloud`]: SpeculativeOperator::register_cloud
pub struct SpeculativeOperator<In, Out> {
    local: Arc<dyn LocalExecutor<In, Out>>,
    implementations: Vec<Implementation<In, Out>>,
    config: OperatorConfig,
    telemetry: Arc<Telemetry>,
}

impl<In, Out> SpeculativeOperator<In, Out>
where
    In: Send + Sync + 'static,
    Out: Send + 'static,
{
    /// Create an operator around a local fallback.
    pub fn new(local: Arc<dyn LocalExecutor<In, Out>>, config: OperatorConfig) -> Self {
        let config = config.normalized();
        let telemetry = Arc::new(Telemetry::new(config.telemetry_window));
        Self {
            local,
            implementations: Vec::new(),
            config,
            telemetry,
        }
    }

    /// Register a cloud implementation.
    ///
    /// `build_request` converts the message timestamp and input into a
    /// request plus the deadline this implementation commits to; returning
    /// `Ok(None)` makes the implementation abstain for that message.
    /// `decode_response` converts the endpoint response into the output type.
    /// `priority` orders implementations when several respond at the same
    /// time: the lowest number wins, and equal priorities fall back to
    /// registration order. Registering the same endpoint several times with
    /// different builders is allowed; nothing is de-duplicated.
    pub fn register_cloud<Req, Resp, E, B, D>(
        &mut self,
        endpoint: Arc<E>,
        build_request: B,
        decode_response: D,
        priority: i32,
    ) where
        Req: Send + 'static,
        Resp: Send + 'static,
        E: RpcEndpoint<Req, Resp> + 'static,
        B: Fn(DateTime<Utc>, &In) -> anyhow::Result<Option<(Req, Deadline)>>
            + Send
            + Sync
            + 'static,
        D: Fn(Resp) -> Out + Send + Sync + 'static,
    {
        let decode = Arc::new(decode_response);
        let build: BuildFn<In, Out> = Arc::new(move |timestamp: DateTime<Utc>, input: &In| {
            let Some((request, deadline)) = build_request(timestamp, input)? else {
                return Ok(None);
            };
            let endpoint = endpoint.clone();
            let decode = decode.clone();
            let invoke: InvokeFuture<Out> = Box::pin(async move {
                let response = endpoint.invoke(request).await?;
                Ok((*decode)(response))
            });
            Ok(Some((deadline, invoke)))
        });
        self.implementations.push(Implementation { build, priority });
    }

    /// Process one message speculatively.
    ///
    /// Launches the local fallback and one worker per registered cloud
    /// implementation, waits until every cloud builder has reported its
    /// deadline, then returns the first result arriving before the earliest
    /// of those deadlines. All outstanding workers are cancelled and joined
    /// before this returns, on every exit path.
    pub async fn process_message(
        &self,
        timestamp: DateTime<Utc>,
        input: In,
    ) -> Result<Out, ProcessError> {
        coordinator::process_message(self, timestamp, input).await
    }

    /// Copy of the rolling telemetry series.
    pub fn telemetry(&self) -> TelemetrySnapshot {
        self.telemetry.snapshot()
    }

    pub(crate) fn local(&self) -> Arc<dyn LocalExecutor<In, Out>> {
        self.local.clone()
    }

    pub(crate) fn implementations(&self) -> &[Implementation<In, Out>] {
        &self.implementations
    }

    pub(crate) fn config(&self) -> &OperatorConfig {
        &self.config
    }

    pub(crate) fn telemetry_handle(&self) -> Arc<Telemetry> {
        self.telemetry.clone()
    }
}
