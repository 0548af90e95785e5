#![forbid(unsafe_code)]
#![deny(unreachable_pub)]
#![deny(missing_docs)]

//! Speculative execution coordinator for latency-sensitive pipelines.
//!
//! For each message, a [`SpeculativeOperator`] races an always-on local
//! fallback against every registered cloud implementation of the same logical
//! function and returns the first acceptable result that arrives before the
//! earliest deadline the cloud request builders reported.

/// Public API types for the coordinator crate.
pub mod api;

mod coordinator;
mod deadline;
mod endpoint;
mod operator;
mod telemetry;
mod worker;

pub use api::{OperatorConfig, ProcessError, TelemetrySnapshot};
pub use deadline::Deadline;
pub use endpoint::RpcEndpoint;
pub use operator::{LocalExecutor, SpeculativeOperator};
