//! Service layer module
//!
//! Contains the gateway HTTP client, SSE decoding, task polling and the
//! stress load generator

pub mod client;
pub mod poller;
pub mod sse;
pub mod stress;

pub use client::{GatewayClient, RawResponse};
pub use poller::{poll_task, PollConfig, PollOutcome, TaskState};
pub use sse::{SseDecoder, SseStream};
pub use stress::{StressConfig, StressMode, StressReport};
