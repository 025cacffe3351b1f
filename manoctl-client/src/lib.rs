//! This crate provides the core logic of manoctl, a command-line client for
//! NFV orchestration platforms exposing the ETSI SOL005 northbound interface:
//! - the status-wait polling engine behind the `--wait` option
//! - SOL005 resource clients (network services, PDU descriptors)
//! - a thin HTTP transport wrapper with token authentication
//!

mod client;
mod error;
pub mod http;
pub mod sol005;
pub mod wait;

// Re-exports for a small, focused public API
pub use client::ManoClient;
pub use error::{ClientError, ClientResult};
pub use sol005::ns::{NsClient, NsCreateParams};
pub use sol005::pdu::PduClient;
pub use sol005::DeleteStatus;
pub use wait::{
    classify, wait_for_status, wait_for_status_with, EntityKind, PollOutcome, ProgressSink,
    StatusFetcher, StderrProgress, MAX_DELETE_ATTEMPTS, POLLING_TIME_INTERVAL,
    TIMEOUT_GENERIC_OPERATION, TIMEOUT_NS_OPERATION,
};
