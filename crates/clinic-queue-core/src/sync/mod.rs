//! Synchronization client.
//!
//! Keeps a local mirror of every patient record and refetches the whole
//! collection whenever the store's change feed reports anything.
//!
//! ```text
//!   start() ── full read ──▶ mirror ──▶ snapshots (watch)
//!      │                        ▲
//!      ├── feed task ───────────┤  any notification → full read
//!      │     └ on error: wait, resubscribe, full read
//!      └── clock task ── every tick: refresh "now" ──▶ snapshots
//! ```

mod client;
mod clock;
mod workflow;

pub use client::*;
pub use clock::*;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::PatientStatus;
use crate::store::StoreError;

/// Queue operation errors.
#[derive(Error, Debug)]
pub enum QueueError {
    #[error("Missing required field: {0}")]
    Validation(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Patient not in queue: {0}")]
    UnknownPatient(String),

    #[error("Cannot move patient {id} from {from} to {to}")]
    InvalidTransition {
        id: String,
        from: PatientStatus,
        to: PatientStatus,
    },

    #[error("Already in consultation: {0}")]
    ConsultationInProgress(String),
}

pub type QueueResult<T> = Result<T, QueueError>;

/// Client lifecycle. There is no error state: failed reads leave the
/// client `Ready` with the last good mirror.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClientState {
    Uninitialized,
    Loading,
    Ready,
}

/// Non-fatal notices for the UI layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ClientEvent {
    /// Mirror replaced with a fresh full read
    Refreshed { patients: usize },
    /// Full read failed; mirror left as it was
    RefreshFailed { message: String },
    /// Change feed entered an error state or could not be opened
    FeedError { message: String },
    /// Change feed reopened after an error
    Resubscribed,
}
