use async_trait::async_trait;

/// An opaque remote callable: takes a request, returns a response.
///
/// The coordinator never assumes an endpoint honors any deadline. A call may
/// block arbitrarily long and may fail; slow calls are raced against the
/// per-message effective deadline and cancelled once the message is decided.
///
/// Implementations must tolerate concurrent invocations for distinct
/// requests: a single endpoint value may back several registered
/// implementations with different request builders.
#[async_trait]
pub trait RpcEndpoint<Req, Resp>: Send + Sync {
    /// Perform the remote call.
    async fn invoke(&self, request: Req) -> anyhow::Result<Resp>;
}
