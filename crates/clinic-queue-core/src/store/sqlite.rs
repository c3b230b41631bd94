//! SQLite-backed store.
//!
//! Wraps the [`Database`] behind a mutex and runs each statement on the
//! blocking pool. Writes are published to the change feed after they commit.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{SubsecRound, Utc};
use log::{debug, info};
use uuid::Uuid;

use super::{ChangeEvent, ChangeFeed, ChangeSubscription, PatientStore, StoreError, StoreResult};
use crate::db::{Database, DbResult};
use crate::models::{NewPatient, Patient, PatientStatus};

pub struct SqliteStore {
    db: Arc<Mutex<Database>>,
    feed: ChangeFeed,
}

impl SqliteStore {
    /// Open or create a store at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        info!("Opening patient store at {}", path.as_ref().display());
        Ok(Self::from_database(Database::open(path)?))
    }

    /// Create an in-memory store (for testing).
    pub fn open_in_memory() -> StoreResult<Self> {
        Ok(Self::from_database(Database::open_in_memory()?))
    }

    pub fn from_database(db: Database) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
            feed: ChangeFeed::new(),
        }
    }

    pub fn active_subscriptions(&self) -> usize {
        self.feed.active_subscriptions()
    }

    async fn with_db<T, F>(&self, op: F) -> StoreResult<T>
    where
        F: FnOnce(&Database) -> DbResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || {
            let guard = db
                .lock()
                .map_err(|e| StoreError::Unavailable(format!("Lock poisoned: {}", e)))?;
            op(&*guard).map_err(StoreError::from)
        })
        .await
        .map_err(|e| StoreError::Unavailable(format!("Database task failed: {}", e)))?
    }
}

#[async_trait]
impl PatientStore for SqliteStore {
    async fn list_patients(&self) -> StoreResult<Vec<Patient>> {
        self.with_db(|db| db.list_patients()).await
    }

    async fn insert_patient(&self, patient: NewPatient) -> StoreResult<Patient> {
        let mut patient = patient;
        // Stored precision is milliseconds; hand back what a read would return
        patient.check_in_time = patient.check_in_time.trunc_subsecs(3);
        let stored = patient.into_patient(Uuid::new_v4().to_string(), Utc::now().trunc_subsecs(3));

        let record = stored.clone();
        self.with_db(move |db| db.insert_patient(&record)).await?;

        debug!("Inserted patient {}", stored.id);
        self.feed.publish(ChangeEvent::insert(&stored.id));
        Ok(stored)
    }

    async fn update_status(&self, id: &str, status: PatientStatus) -> StoreResult<()> {
        let key = id.to_string();
        let updated = self
            .with_db(move |db| db.update_patient_status(&key, status, &Utc::now()))
            .await?;
        if !updated {
            return Err(StoreError::NotFound(id.to_string()));
        }

        self.feed.publish(ChangeEvent::update(id));
        Ok(())
    }

    async fn delete_patient(&self, id: &str) -> StoreResult<()> {
        let key = id.to_string();
        let deleted = self.with_db(move |db| db.delete_patient(&key)).await?;
        if !deleted {
            return Err(StoreError::NotFound(id.to_string()));
        }

        self.feed.publish(ChangeEvent::delete(id));
        Ok(())
    }

    async fn subscribe(&self) -> StoreResult<ChangeSubscription> {
        Ok(self.feed.subscribe())
    }
}
