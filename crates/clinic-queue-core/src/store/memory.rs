//! In-process store.
//!
//! Holds records in memory and publishes every write to its change feed.
//! Failures can be switched on per operation class so callers can exercise
//! their error paths.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{SubsecRound, Utc};
use log::debug;
use tokio::sync::Mutex as TokioMutex;
use uuid::Uuid;

use super::{ChangeEvent, ChangeFeed, ChangeSubscription, PatientStore, StoreError, StoreResult};
use crate::models::{NewPatient, Patient, PatientStatus};

#[derive(Default)]
pub struct MemoryStore {
    patients: TokioMutex<Vec<Patient>>,
    feed: ChangeFeed,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    fail_subscribe: AtomicBool,
    list_calls: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed records without publishing change events.
    pub async fn seed(&self, records: Vec<Patient>) {
        let mut patients = self.patients.lock().await;
        patients.extend(records);
        patients.sort_by(|a, b| a.check_in_time.cmp(&b.check_in_time));
    }

    pub fn set_reads_failing(&self, failing: bool) {
        self.fail_reads.store(failing, Ordering::SeqCst);
    }

    pub fn set_writes_failing(&self, failing: bool) {
        self.fail_writes.store(failing, Ordering::SeqCst);
    }

    pub fn set_subscribe_failing(&self, failing: bool) {
        self.fail_subscribe.store(failing, Ordering::SeqCst);
    }

    /// Put every open subscription's channel into the error state.
    pub fn disconnect_feed(&self) {
        self.feed.disconnect_all();
    }

    pub fn active_subscriptions(&self) -> usize {
        self.feed.active_subscriptions()
    }

    /// Number of full reads served, failed ones included.
    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    fn check(&self, flag: &AtomicBool, operation: &str) -> StoreResult<()> {
        if flag.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(format!("{} rejected", operation)));
        }
        Ok(())
    }
}

#[async_trait]
impl PatientStore for MemoryStore {
    async fn list_patients(&self) -> StoreResult<Vec<Patient>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.check(&self.fail_reads, "list")?;
        let patients = self.patients.lock().await;
        Ok(patients.clone())
    }

    async fn insert_patient(&self, patient: NewPatient) -> StoreResult<Patient> {
        self.check(&self.fail_writes, "insert")?;
        let id = Uuid::new_v4().to_string();
        let stored = patient.into_patient(id, Utc::now().trunc_subsecs(3));

        {
            let mut patients = self.patients.lock().await;
            // Keep check-in order; equal times stay in insertion order
            let at = patients.partition_point(|p| p.check_in_time <= stored.check_in_time);
            patients.insert(at, stored.clone());
        }

        debug!("Inserted patient {}", stored.id);
        self.feed.publish(ChangeEvent::insert(&stored.id));
        Ok(stored)
    }

    async fn update_status(&self, id: &str, status: PatientStatus) -> StoreResult<()> {
        self.check(&self.fail_writes, "update")?;
        {
            let mut patients = self.patients.lock().await;
            let patient = patients
                .iter_mut()
                .find(|p| p.id == id)
                .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
            patient.status = status;
            patient.updated_at = Utc::now().trunc_subsecs(3);
        }

        self.feed.publish(ChangeEvent::update(id));
        Ok(())
    }

    async fn delete_patient(&self, id: &str) -> StoreResult<()> {
        self.check(&self.fail_writes, "delete")?;
        {
            let mut patients = self.patients.lock().await;
            let before = patients.len();
            patients.retain(|p| p.id != id);
            if patients.len() == before {
                return Err(StoreError::NotFound(id.to_string()));
            }
        }

        self.feed.publish(ChangeEvent::delete(id));
        Ok(())
    }

    async fn subscribe(&self) -> StoreResult<ChangeSubscription> {
        if self.fail_subscribe.load(Ordering::SeqCst) {
            return Err(StoreError::Feed("subscribe rejected".into()));
        }
        Ok(self.feed.subscribe())
    }
}
