//! SOL005 northbound resource clients.
//!
//! Thin CRUD collaborators over [`HttpClient`](crate::http::HttpClient); the
//! asynchronous operations hand off to the wait module when the caller asked
//! to block until completion.

pub mod ns;
pub mod pdu;

use uuid::Uuid;

/// Outcome of a delete request as reported by the server.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeleteStatus {
    /// 202: deletion accepted and proceeding in the background.
    InProgress,
    /// 204, or a waited-for deletion that completed.
    Deleted,
}

/// Whether a name argument is really an id. Lookups by id hit `_id` directly;
/// anything else is matched against the `name` member.
pub(crate) fn is_uuid(name: &str) -> bool {
    Uuid::parse_str(name).is_ok()
}
