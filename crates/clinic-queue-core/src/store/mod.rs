//! External store seam.
//!
//! The queue treats the store as the single source of truth. It needs a full
//! ordered read, three writes, and a change feed that says "something
//! changed" without promising anything about the payload.

mod feed;
mod memory;
mod sqlite;

pub use feed::*;
pub use memory::*;
pub use sqlite::*;

use async_trait::async_trait;
use thiserror::Error;

use crate::db::DbError;
use crate::models::{NewPatient, Patient, PatientStatus};

/// Store errors.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Patient not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Change feed error: {0}")]
    Feed(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Persistent patient collection with a change feed.
#[async_trait]
pub trait PatientStore: Send + Sync {
    /// Full read, earliest check-in first.
    async fn list_patients(&self) -> StoreResult<Vec<Patient>>;

    /// Insert a record. The store assigns the ID and bookkeeping timestamps.
    async fn insert_patient(&self, patient: NewPatient) -> StoreResult<Patient>;

    /// Overwrite a record's status.
    async fn update_status(&self, id: &str, status: PatientStatus) -> StoreResult<()>;

    async fn delete_patient(&self, id: &str) -> StoreResult<()>;

    /// Open a change-feed subscription covering inserts, updates and deletes.
    async fn subscribe(&self) -> StoreResult<ChangeSubscription>;
}
