//! Queue client: mirror, change-feed task, clock task and write-through
//! operations.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use tokio::sync::{broadcast, watch, Mutex as TokioMutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::{ClientEvent, ClientState, Clock, QueueError, QueueResult, SystemClock};
use crate::config::QueueConfig;
use crate::estimator::WaitEstimator;
use crate::models::{CheckIn, NewPatient, Patient, PatientStatus, Priority};
use crate::queue::QueueSnapshot;
use crate::store::{ChangeSubscription, PatientStore};

const EVENT_CAPACITY: usize = 64;

/// Background tasks owned by a started client.
struct Tasks {
    feed: JoinHandle<()>,
    clock: JoinHandle<()>,
}

impl Tasks {
    fn abort(&self) {
        self.feed.abort();
        self.clock.abort();
    }
}

/// State shared between the client handle and its background tasks.
struct Shared {
    store: Arc<dyn PatientStore>,
    config: QueueConfig,
    estimator: WaitEstimator,
    clock: Arc<dyn Clock>,
    mirror: RwLock<Vec<Patient>>,
    state: RwLock<ClientState>,
    now: RwLock<DateTime<Utc>>,
    /// Serializes full reads so a slow, older read never lands after a newer one
    refresh_lock: TokioMutex<()>,
    snapshots: watch::Sender<QueueSnapshot>,
    events: broadcast::Sender<ClientEvent>,
}

impl Shared {
    fn emit(&self, event: ClientEvent) {
        // No listeners is fine
        let _ = self.events.send(event);
    }

    async fn publish_snapshot(&self) {
        let snapshot = {
            let mirror = self.mirror.read().await;
            QueueSnapshot::project(&mirror, *self.now.read().await)
        };
        self.snapshots.send_replace(snapshot);
    }

    /// Replace the mirror with a full read of the store.
    async fn refresh(&self) -> QueueResult<usize> {
        let _serial = self.refresh_lock.lock().await;
        *self.state.write().await = ClientState::Loading;

        match self.store.list_patients().await {
            Ok(patients) => {
                let count = patients.len();
                *self.mirror.write().await = patients;
                *self.state.write().await = ClientState::Ready;
                debug!("Mirror refreshed with {} patients", count);
                self.publish_snapshot().await;
                self.emit(ClientEvent::Refreshed { patients: count });
                Ok(count)
            }
            Err(e) => {
                *self.state.write().await = ClientState::Ready;
                error!("Failed to fetch patients: {}", e);
                self.emit(ClientEvent::RefreshFailed {
                    message: e.to_string(),
                });
                Err(e.into())
            }
        }
    }

    /// Refresh from a background task; the failure is already reported.
    async fn refresh_in_background(&self) {
        let _ = self.refresh().await;
    }

    async fn tick(&self) {
        *self.now.write().await = self.clock.now();
        self.publish_snapshot().await;
    }
}

/// Live mirror of the patient collection with write-through operations.
///
/// Call [`QueueClient::start`] inside a Tokio runtime to load the mirror and
/// begin listening for changes; [`QueueClient::stop`] (or dropping the
/// client) releases the subscription.
pub struct QueueClient {
    shared: Arc<Shared>,
    tasks: TokioMutex<Option<Tasks>>,
}

impl QueueClient {
    pub fn new(store: Arc<dyn PatientStore>, config: QueueConfig) -> Self {
        Self::with_clock(store, config, Arc::new(SystemClock))
    }

    pub fn with_clock(
        store: Arc<dyn PatientStore>,
        config: QueueConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let now = clock.now();
        let (snapshots, _) = watch::channel(QueueSnapshot::project(&[], now));
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Self {
            shared: Arc::new(Shared {
                store,
                estimator: WaitEstimator::from_config(&config),
                config,
                clock,
                mirror: RwLock::new(Vec::new()),
                state: RwLock::new(ClientState::Uninitialized),
                now: RwLock::new(now),
                refresh_lock: TokioMutex::new(()),
                snapshots,
                events,
            }),
            tasks: TokioMutex::new(None),
        }
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Open the change feed, load the mirror and start the clock.
    ///
    /// A failed initial read or subscribe is reported through
    /// [`QueueClient::events`] and retried by the feed task; it does not fail
    /// startup. Calling `start` on a running client does nothing.
    pub async fn start(&self) -> QueueResult<()> {
        let mut tasks = self.tasks.lock().await;
        if tasks.is_some() {
            return Ok(());
        }

        info!("Starting queue client");
        // Subscribe before the first read so no write falls between them
        let subscription = match self.shared.store.subscribe().await {
            Ok(subscription) => {
                info!("Subscribed to patient changes");
                Some(subscription)
            }
            Err(e) => {
                warn!("Subscribe failed, will retry: {}", e);
                self.shared.emit(ClientEvent::FeedError {
                    message: e.to_string(),
                });
                None
            }
        };
        self.shared.refresh_in_background().await;

        *tasks = Some(Tasks {
            feed: tokio::spawn(run_feed(Arc::clone(&self.shared), subscription)),
            clock: tokio::spawn(run_clock(Arc::clone(&self.shared))),
        });
        Ok(())
    }

    /// Release the subscription and stop the clock.
    ///
    /// In-flight reads and writes are left to finish on their own. Safe to
    /// call more than once; only the first call after a start has an effect.
    pub async fn stop(&self) {
        let tasks = self.tasks.lock().await.take();
        if let Some(tasks) = tasks {
            info!("Cleaning up subscription");
            tasks.abort();
            // Wait for the tasks to drop the subscription they hold
            let _ = tasks.feed.await;
            let _ = tasks.clock.await;
        }
    }

    pub async fn is_running(&self) -> bool {
        self.tasks.lock().await.is_some()
    }

    // =========================================================================
    // Reads
    // =========================================================================

    pub async fn state(&self) -> ClientState {
        *self.shared.state.read().await
    }

    pub async fn is_loading(&self) -> bool {
        self.state().await != ClientState::Ready
    }

    /// Full mirror, earliest check-in first.
    pub async fn patients(&self) -> Vec<Patient> {
        self.shared.mirror.read().await.clone()
    }

    pub async fn find(&self, id: &str) -> Option<Patient> {
        self.shared
            .mirror
            .read()
            .await
            .iter()
            .find(|p| p.id == id)
            .cloned()
    }

    /// Reference time used for elapsed-wait values.
    pub async fn now(&self) -> DateTime<Utc> {
        *self.shared.now.read().await
    }

    /// Projection of the current mirror at the current reference time.
    pub async fn snapshot(&self) -> QueueSnapshot {
        let mirror = self.shared.mirror.read().await;
        QueueSnapshot::project(&mirror, self.now().await)
    }

    /// Receiver that sees a new snapshot after every refresh and clock tick.
    pub fn subscribe_snapshots(&self) -> watch::Receiver<QueueSnapshot> {
        self.shared.snapshots.subscribe()
    }

    pub fn events(&self) -> broadcast::Receiver<ClientEvent> {
        self.shared.events.subscribe()
    }

    pub fn config(&self) -> &QueueConfig {
        &self.shared.config
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Force a full read of the store.
    pub async fn refresh(&self) -> QueueResult<usize> {
        self.shared.refresh().await
    }

    /// Check a patient in and return the new record's ID.
    pub async fn create(&self, name: &str, phone: &str, priority: Priority) -> QueueResult<String> {
        let patient = self.check_in(CheckIn::new(name, phone, priority)).await?;
        Ok(patient.id)
    }

    /// Check a patient in.
    ///
    /// The wait estimate uses the mirror's current waiting count, so two
    /// near-simultaneous check-ins can get the same estimate.
    pub async fn check_in(&self, check_in: CheckIn) -> QueueResult<Patient> {
        let check_in = check_in
            .normalized()
            .map_err(|field| QueueError::Validation(field.to_string()))?;

        let queue_length = self
            .shared
            .mirror
            .read()
            .await
            .iter()
            .filter(|p| p.is_waiting())
            .count();
        let estimated_wait_time = self.shared.estimator.estimate(queue_length, check_in.priority);
        debug!(
            "Adding patient {} ({}), estimated wait {} minutes",
            check_in.name, check_in.priority, estimated_wait_time
        );

        let record = NewPatient::waiting(check_in, estimated_wait_time, self.shared.clock.now());
        let created = self.shared.store.insert_patient(record).await.map_err(|e| {
            error!("Error adding patient: {}", e);
            QueueError::from(e)
        })?;
        info!("Patient {} added to queue", created.id);

        // The insert stands even if this read fails; the failure is reported
        self.shared.refresh_in_background().await;
        Ok(created)
    }

    /// Write a new status through to the store.
    ///
    /// No transition rules are checked here and the mirror is not touched;
    /// it converges through the change feed.
    pub async fn update_status(&self, id: &str, status: PatientStatus) -> QueueResult<()> {
        debug!("Updating patient {} to {}", id, status);
        self.shared
            .store
            .update_status(id, status)
            .await
            .map_err(|e| {
                error!("Error updating patient status: {}", e);
                QueueError::from(e)
            })?;
        info!("Patient {} status updated to {}", id, status);
        Ok(())
    }

    /// Delete a record from the store. The mirror converges through the feed.
    pub async fn delete(&self, id: &str) -> QueueResult<()> {
        debug!("Removing patient {}", id);
        self.shared.store.delete_patient(id).await.map_err(|e| {
            error!("Error removing patient: {}", e);
            QueueError::from(e)
        })?;
        info!("Patient {} removed", id);
        Ok(())
    }
}

impl Drop for QueueClient {
    fn drop(&mut self) {
        if let Some(tasks) = self.tasks.get_mut().take() {
            tasks.abort();
        }
    }
}

/// Refetch on every notification; reopen the feed after a fixed delay when
/// it errors.
async fn run_feed(shared: Arc<Shared>, initial: Option<ChangeSubscription>) {
    let delay = shared.config.resubscribe_delay();
    let mut pending = initial;

    loop {
        let mut subscription = match pending.take() {
            Some(subscription) => subscription,
            None => {
                tokio::time::sleep(delay).await;
                match shared.store.subscribe().await {
                    Ok(subscription) => {
                        info!("Resubscribed to patient changes");
                        shared.emit(ClientEvent::Resubscribed);
                        // Catch up on anything written while disconnected
                        shared.refresh_in_background().await;
                        subscription
                    }
                    Err(e) => {
                        warn!("Resubscribe failed: {}", e);
                        shared.emit(ClientEvent::FeedError {
                            message: e.to_string(),
                        });
                        continue;
                    }
                }
            }
        };

        loop {
            match subscription.recv().await {
                Ok(event) => {
                    debug!("Change received: {:?}", event);
                    shared.refresh_in_background().await;
                }
                Err(e) => {
                    error!("Channel error, attempting to resubscribe: {}", e);
                    shared.emit(ClientEvent::FeedError {
                        message: e.to_string(),
                    });
                    break;
                }
            }
        }
    }
}

async fn run_clock(shared: Arc<Shared>) {
    let mut ticker = tokio::time::interval(shared.config.clock_tick());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately
    ticker.tick().await;

    loop {
        ticker.tick().await;
        shared.tick().await;
    }
}
