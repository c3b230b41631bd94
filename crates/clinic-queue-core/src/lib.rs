//! Clinic Queue Core Library
//!
//! Patient queue ordering, wait estimation and live synchronization against
//! an external store.
//!
//! # Architecture
//!
//! ```text
//!  Check-in kiosk        Live display        Staff dashboard
//!        │                     ▲                    │
//!        │ check_in            │ snapshots          │ call_next / start /
//!        ▼                     │                    ▼ complete / remove
//!  ┌─────────────────────────────────────────────────────────────┐
//!  │                        QueueClient                          │
//!  │   mirror ──▶ ordering policy ──▶ projection (QueueSnapshot) │
//!  └───────┬──────────────────────────────────────────▲──────────┘
//!          │ write-through                            │ full refetch
//!          ▼                                          │ on any change
//!  ┌─────────────────────────────────────────────────────────────┐
//!  │              PatientStore (+ change feed)                   │
//!  │            MemoryStore │ SqliteStore │ hosted              │
//!  └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Core Principle
//!
//! **The store is the only source of truth.** The client never edits its
//! mirror in place; every change is read back from the store.
//!
//! # Modules
//!
//! - [`models`]: Domain types (Patient, PatientStatus, Priority)
//! - [`estimator`]: Wait-time estimate at check-in
//! - [`queue`]: Ordering policy and read-only projections
//! - [`store`]: Store trait, change feed, memory and SQLite adapters
//! - [`db`]: SQLite database layer
//! - [`sync`]: Synchronization client and staff workflow
//! - [`config`]: Tunables

pub mod config;
pub mod db;
pub mod estimator;
pub mod models;
pub mod queue;
pub mod store;
pub mod sync;

// Re-export commonly used types
pub use config::QueueConfig;
pub use estimator::{estimate, WaitEstimator};
pub use models::{CheckIn, NewPatient, Patient, PatientStatus, Priority};
pub use queue::{QueueSnapshot, QueueStats};
pub use store::{MemoryStore, PatientStore, SqliteStore};
pub use sync::{ClientEvent, ClientState, QueueClient, QueueError};

// UniFFI setup - using proc macros
uniffi::setup_scaffolding!();

use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Runtime;

// =========================================================================
// FFI Error Type
// =========================================================================

#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum ClinicQueueError {
    #[error("Store error: {0}")]
    StoreError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Workflow error: {0}")]
    WorkflowError(String),

    #[error("Runtime error: {0}")]
    RuntimeError(String),
}

impl From<QueueError> for ClinicQueueError {
    fn from(e: QueueError) -> Self {
        match e {
            QueueError::Validation(field) => {
                ClinicQueueError::InvalidInput(format!("{} is required", field))
            }
            QueueError::Store(store::StoreError::NotFound(id)) => ClinicQueueError::NotFound(id),
            QueueError::Store(other) => ClinicQueueError::StoreError(other.to_string()),
            QueueError::UnknownPatient(id) => ClinicQueueError::NotFound(id),
            other @ (QueueError::InvalidTransition { .. }
            | QueueError::ConsultationInProgress(_)) => {
                ClinicQueueError::WorkflowError(other.to_string())
            }
        }
    }
}

impl From<store::StoreError> for ClinicQueueError {
    fn from(e: store::StoreError) -> Self {
        ClinicQueueError::StoreError(e.to_string())
    }
}

impl From<config::ConfigError> for ClinicQueueError {
    fn from(e: config::ConfigError) -> Self {
        ClinicQueueError::InvalidInput(e.to_string())
    }
}

impl From<models::ParseModelError> for ClinicQueueError {
    fn from(e: models::ParseModelError) -> Self {
        ClinicQueueError::InvalidInput(e.to_string())
    }
}

impl From<std::io::Error> for ClinicQueueError {
    fn from(e: std::io::Error) -> Self {
        ClinicQueueError::RuntimeError(e.to_string())
    }
}

// =========================================================================
// Factory Functions (exported to FFI)
// =========================================================================

/// Open or create a queue backed by a SQLite file, and start syncing.
///
/// `config_json` may be empty for defaults.
#[uniffi::export]
pub fn open_queue(path: String, config_json: String) -> Result<Arc<ClinicQueueCore>, ClinicQueueError> {
    let store = SqliteStore::open(&path)?;
    ClinicQueueCore::start(Arc::new(store), parse_config(&config_json)?)
}

/// Create an in-memory queue (for testing and demos).
#[uniffi::export]
pub fn open_queue_in_memory() -> Result<Arc<ClinicQueueCore>, ClinicQueueError> {
    ClinicQueueCore::start(Arc::new(MemoryStore::new()), QueueConfig::default())
}

/// Estimated wait for a check-in behind `queue_length` waiting patients.
#[uniffi::export]
pub fn estimate_wait_minutes(queue_length: u32, priority: String) -> Result<u32, ClinicQueueError> {
    let priority: Priority = priority.parse()?;
    Ok(estimate(queue_length as usize, priority))
}

/// Elapsed-wait label for the live display.
#[uniffi::export]
pub fn format_elapsed(minutes: i64) -> String {
    queue::format_elapsed(minutes)
}

/// Position label such as "1st" or "4th".
#[uniffi::export]
pub fn format_position(position: u32) -> String {
    queue::format_position(position as usize)
}

fn parse_config(json: &str) -> Result<QueueConfig, ClinicQueueError> {
    if json.trim().is_empty() {
        Ok(QueueConfig::default())
    } else {
        Ok(QueueConfig::from_json_str(json)?)
    }
}

// =========================================================================
// Main API Object
// =========================================================================

/// Blocking wrapper around [`QueueClient`] for foreign callers.
///
/// Owns its own Tokio runtime; methods must not be called from inside
/// another Tokio runtime.
#[derive(uniffi::Object)]
pub struct ClinicQueueCore {
    // Dropped before the runtime it was started on
    client: QueueClient,
    runtime: Runtime,
}

impl ClinicQueueCore {
    fn start(store: Arc<dyn PatientStore>, config: QueueConfig) -> Result<Arc<Self>, ClinicQueueError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("clinic-queue")
            .enable_all()
            .build()?;
        let client = QueueClient::new(store, config);
        runtime.block_on(client.start())?;
        Ok(Arc::new(Self { client, runtime }))
    }
}

#[uniffi::export]
impl ClinicQueueCore {
    // =========================================================================
    // Check-in
    // =========================================================================

    /// Check a patient in. Returns the stored record.
    pub fn check_in(
        &self,
        name: String,
        phone: String,
        priority: String,
    ) -> Result<FfiPatient, ClinicQueueError> {
        let priority: Priority = priority.parse()?;
        let patient = self
            .runtime
            .block_on(self.client.check_in(CheckIn::new(name, phone, priority)))?;
        Ok(patient.into())
    }

    // =========================================================================
    // Staff Operations
    // =========================================================================

    /// Call the next patient. Returns nothing when the queue is empty.
    pub fn call_next(&self) -> Result<Option<FfiPatient>, ClinicQueueError> {
        let called = self.runtime.block_on(self.client.call_next())?;
        Ok(called.map(|p| p.into()))
    }

    pub fn start_consultation(&self, patient_id: String) -> Result<(), ClinicQueueError> {
        Ok(self.runtime.block_on(self.client.start_consultation(&patient_id))?)
    }

    pub fn complete_consultation(&self, patient_id: String) -> Result<(), ClinicQueueError> {
        Ok(self
            .runtime
            .block_on(self.client.complete_consultation(&patient_id))?)
    }

    /// Set a status directly, without workflow checks.
    pub fn update_status(&self, patient_id: String, status: String) -> Result<(), ClinicQueueError> {
        let status: PatientStatus = status.parse()?;
        Ok(self
            .runtime
            .block_on(self.client.update_status(&patient_id, status))?)
    }

    pub fn remove_patient(&self, patient_id: String) -> Result<(), ClinicQueueError> {
        Ok(self.runtime.block_on(self.client.remove(&patient_id))?)
    }

    // =========================================================================
    // Queue Views
    // =========================================================================

    /// Current projection of the queue.
    pub fn snapshot(&self) -> FfiQueueSnapshot {
        self.runtime.block_on(self.client.snapshot()).into()
    }

    /// Force a full reload from the store. Returns the record count.
    pub fn refresh(&self) -> Result<u32, ClinicQueueError> {
        let count = self.runtime.block_on(self.client.refresh())?;
        Ok(count as u32)
    }

    pub fn is_loading(&self) -> bool {
        self.runtime.block_on(self.client.is_loading())
    }

    /// Block until the queue view changes or the timeout passes.
    ///
    /// Returns true when a new snapshot is available.
    pub fn wait_for_change(&self, timeout_ms: u64) -> bool {
        let mut snapshots = self.client.subscribe_snapshots();
        self.runtime.block_on(async {
            matches!(
                tokio::time::timeout(Duration::from_millis(timeout_ms), snapshots.changed()).await,
                Ok(Ok(()))
            )
        })
    }

    /// Release the change feed and stop the clock.
    pub fn shutdown(&self) {
        self.runtime.block_on(self.client.stop());
    }
}

// =========================================================================
// FFI Types
// =========================================================================

/// FFI-safe patient.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiPatient {
    pub id: String,
    pub name: String,
    pub phone: String,
    pub check_in_time: String,
    pub check_in_clock: String,
    pub estimated_wait_time: u32,
    pub status: String,
    pub priority: String,
}

impl From<Patient> for FfiPatient {
    fn from(patient: Patient) -> Self {
        Self {
            check_in_time: patient.check_in_time.to_rfc3339(),
            check_in_clock: queue::format_clock(patient.check_in_time),
            estimated_wait_time: patient.estimated_wait_time,
            status: patient.status.to_string(),
            priority: patient.priority.to_string(),
            id: patient.id,
            name: patient.name,
            phone: patient.phone,
        }
    }
}

/// FFI-safe waiting-list entry with its display labels.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiQueueEntry {
    pub patient: FfiPatient,
    pub position: u32,
    pub position_label: String,
    pub waited_label: String,
}

/// FFI-safe queue statistics.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiQueueStats {
    pub total_patients: u32,
    pub average_wait_time: u32,
    pub currently_serving: Option<String>,
    pub next_patient: Option<String>,
}

impl From<QueueStats> for FfiQueueStats {
    fn from(stats: QueueStats) -> Self {
        Self {
            total_patients: stats.total_patients as u32,
            average_wait_time: stats.average_wait_time,
            currently_serving: stats.currently_serving,
            next_patient: stats.next_patient,
        }
    }
}

/// FFI-safe queue snapshot.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiQueueSnapshot {
    pub waiting: Vec<FfiQueueEntry>,
    pub current: Option<FfiPatient>,
    pub called: Vec<FfiPatient>,
    pub stats: FfiQueueStats,
    pub now: String,
}

impl From<QueueSnapshot> for FfiQueueSnapshot {
    fn from(snapshot: QueueSnapshot) -> Self {
        let waiting = snapshot
            .waiting
            .iter()
            .enumerate()
            .map(|(i, patient)| FfiQueueEntry {
                position: (i + 1) as u32,
                position_label: queue::format_position(i + 1),
                waited_label: snapshot.elapsed_label(patient),
                patient: patient.clone().into(),
            })
            .collect();

        Self {
            waiting,
            current: snapshot.current.map(|p| p.into()),
            called: snapshot.called.into_iter().map(|p| p.into()).collect(),
            stats: snapshot.stats.into(),
            now: snapshot.now.to_rfc3339(),
        }
    }
}
