//! Staff dashboard actions.
//!
//! With `strict_workflow` on, these check the mirror before writing: status
//! only moves forward and only one patient is in consultation at a time.
//! The checks run against the local mirror, so two staff clients acting at
//! the same moment can still both pass them.

use log::{info, warn};

use super::{QueueClient, QueueError, QueueResult};
use crate::models::{Patient, PatientStatus};
use crate::queue::next_waiting;

impl QueueClient {
    /// Call the patient at the head of the queue.
    ///
    /// Returns `None` without touching the store when nobody is waiting.
    /// When strict, refuses while another patient is in consultation.
    pub async fn call_next(&self) -> QueueResult<Option<Patient>> {
        let next = {
            let patients = self.patients().await;
            if self.config().strict_workflow {
                if let Some(current) = in_consultation(&patients, None) {
                    warn!("Refusing to call next while {} is being seen", current.name);
                    return Err(QueueError::ConsultationInProgress(current.name.clone()));
                }
            }
            next_waiting(&patients).cloned()
        };

        match next {
            Some(patient) => {
                self.update_status(&patient.id, PatientStatus::Called).await?;
                info!("{} has been called for consultation", patient.name);
                Ok(Some(patient))
            }
            None => Ok(None),
        }
    }

    pub async fn start_consultation(&self, id: &str) -> QueueResult<()> {
        if self.config().strict_workflow {
            let patients = self.patients().await;
            if let Some(current) = in_consultation(&patients, Some(id)) {
                warn!("Refusing to start consultation while {} is being seen", current.name);
                return Err(QueueError::ConsultationInProgress(current.name.clone()));
            }
        }
        self.advance(id, PatientStatus::InConsultation).await
    }

    pub async fn complete_consultation(&self, id: &str) -> QueueResult<()> {
        self.advance(id, PatientStatus::Completed).await
    }

    /// Remove a patient at any point in the visit.
    pub async fn remove(&self, id: &str) -> QueueResult<()> {
        self.delete(id).await
    }

    /// Move a patient forward, checking the transition when strict.
    pub async fn advance(&self, id: &str, to: PatientStatus) -> QueueResult<()> {
        if self.config().strict_workflow {
            let patient = self
                .find(id)
                .await
                .ok_or_else(|| QueueError::UnknownPatient(id.to_string()))?;
            if !patient.status.can_advance_to(to) {
                return Err(QueueError::InvalidTransition {
                    id: id.to_string(),
                    from: patient.status,
                    to,
                });
            }
        }
        self.update_status(id, to).await
    }
}

/// Patient in consultation, other than `except`.
fn in_consultation<'a>(patients: &'a [Patient], except: Option<&str>) -> Option<&'a Patient> {
    patients
        .iter()
        .find(|p| p.status == PatientStatus::InConsultation && Some(p.id.as_str()) != except)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Duration, TimeZone, Utc};

    use super::*;
    use crate::config::QueueConfig;
    use crate::models::{CheckIn, NewPatient, Priority};
    use crate::store::{MemoryStore, PatientStore};
    use crate::sync::ManualClock;

    async fn seeded_client(strict: bool) -> (Arc<MemoryStore>, QueueClient, Vec<Patient>) {
        let store = Arc::new(MemoryStore::new());
        let t0 = Utc.with_ymd_and_hms(2024, 1, 15, 9, 0, 0).unwrap();
        let mut seeded = Vec::new();
        for (i, (name, priority)) in [("Ada", Priority::Normal), ("Alan", Priority::Urgent)]
            .into_iter()
            .enumerate()
        {
            let record = NewPatient::waiting(
                CheckIn::new(name, "555-0100", priority),
                0,
                t0 + Duration::minutes(i as i64),
            );
            seeded.push(store.insert_patient(record).await.unwrap());
        }

        let config = QueueConfig {
            strict_workflow: strict,
            ..QueueConfig::default()
        };
        let client = QueueClient::with_clock(store.clone(), config, Arc::new(ManualClock::new(t0)));
        client.refresh().await.unwrap();
        (store, client, seeded)
    }

    #[tokio::test]
    async fn test_call_next_picks_urgent_first() {
        let (store, client, _) = seeded_client(true).await;

        let called = client.call_next().await.unwrap().unwrap();
        assert_eq!(called.name, "Alan");

        let stored = store.list_patients().await.unwrap();
        let alan = stored.iter().find(|p| p.name == "Alan").unwrap();
        assert_eq!(alan.status, PatientStatus::Called);
    }

    #[tokio::test]
    async fn test_call_next_on_empty_queue_is_noop() {
        let store = Arc::new(MemoryStore::new());
        let client = QueueClient::new(store.clone(), QueueConfig::default());
        client.refresh().await.unwrap();
        let mut sub = store.subscribe().await.unwrap();

        assert!(client.call_next().await.unwrap().is_none());
        assert!(store.list_patients().await.unwrap().is_empty());
        // No write means no change notification
        assert!(tokio::time::timeout(std::time::Duration::from_millis(50), sub.recv())
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_single_consultation_enforced_when_strict() {
        let (_store, client, seeded) = seeded_client(true).await;
        let (ada, alan) = (&seeded[0], &seeded[1]);

        client.start_consultation(&ada.id).await.unwrap();
        client.refresh().await.unwrap();

        let err = client.start_consultation(&alan.id).await.unwrap_err();
        assert!(matches!(err, QueueError::ConsultationInProgress(ref name) if name == "Ada"));

        client.complete_consultation(&ada.id).await.unwrap();
        client.refresh().await.unwrap();
        client.start_consultation(&alan.id).await.unwrap();
    }

    #[tokio::test]
    async fn test_call_next_waits_for_current_consultation() {
        let (store, client, seeded) = seeded_client(true).await;
        let ada = &seeded[0];

        client.start_consultation(&ada.id).await.unwrap();
        client.refresh().await.unwrap();

        let err = client.call_next().await.unwrap_err();
        assert!(matches!(err, QueueError::ConsultationInProgress(ref name) if name == "Ada"));
        let alan = store
            .list_patients()
            .await
            .unwrap()
            .into_iter()
            .find(|p| p.name == "Alan")
            .unwrap();
        assert_eq!(alan.status, PatientStatus::Waiting);

        client.complete_consultation(&ada.id).await.unwrap();
        client.refresh().await.unwrap();
        let called = client.call_next().await.unwrap().unwrap();
        assert_eq!(called.name, "Alan");
    }

    #[tokio::test]
    async fn test_lenient_call_next_ignores_consultation() {
        let (_store, client, seeded) = seeded_client(false).await;

        client.start_consultation(&seeded[0].id).await.unwrap();
        client.refresh().await.unwrap();

        let called = client.call_next().await.unwrap().unwrap();
        assert_eq!(called.name, "Alan");
    }

    #[tokio::test]
    async fn test_backward_transition_rejected_when_strict() {
        let (_store, client, seeded) = seeded_client(true).await;
        let ada = &seeded[0];

        client.advance(&ada.id, PatientStatus::Completed).await.unwrap();
        client.refresh().await.unwrap();

        let err = client.advance(&ada.id, PatientStatus::Waiting).await.unwrap_err();
        assert!(matches!(
            err,
            QueueError::InvalidTransition {
                from: PatientStatus::Completed,
                to: PatientStatus::Waiting,
                ..
            }
        ));
        assert!(matches!(
            client.advance("missing", PatientStatus::Called).await,
            Err(QueueError::UnknownPatient(_))
        ));
    }

    #[tokio::test]
    async fn test_lenient_workflow_allows_anything() {
        let (store, client, seeded) = seeded_client(false).await;
        let (ada, alan) = (&seeded[0], &seeded[1]);

        client.start_consultation(&ada.id).await.unwrap();
        client.start_consultation(&alan.id).await.unwrap();
        client.advance(&ada.id, PatientStatus::Waiting).await.unwrap();

        let stored = store.list_patients().await.unwrap();
        assert_eq!(stored[0].status, PatientStatus::Waiting);
        assert_eq!(stored[1].status, PatientStatus::InConsultation);
    }

    #[tokio::test]
    async fn test_raw_update_status_is_unvalidated() {
        let (store, client, seeded) = seeded_client(true).await;
        let ada = &seeded[0];

        client
            .update_status(&ada.id, PatientStatus::Completed)
            .await
            .unwrap();
        client
            .update_status(&ada.id, PatientStatus::Waiting)
            .await
            .unwrap();

        assert_eq!(store.list_patients().await.unwrap()[0].status, PatientStatus::Waiting);
    }

    #[tokio::test]
    async fn test_remove_deletes_from_store() {
        let (store, client, seeded) = seeded_client(true).await;

        client.remove(&seeded[0].id).await.unwrap();
        assert_eq!(store.list_patients().await.unwrap().len(), 1);
        assert!(client.remove(&seeded[0].id).await.is_err());
    }
}
