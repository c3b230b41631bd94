//! Wait-time estimation at check-in.
//!
//! The estimate is a snapshot taken once when the record is created. It is
//! stored on the record and never recomputed as the queue moves.

use crate::config::QueueConfig;
use crate::models::Priority;

/// Estimate the wait for a new check-in with the default tunables.
///
/// `round(queue_length × 15 × multiplier)`, multiplier 0.5 for urgent.
pub fn estimate(queue_length: usize, priority: Priority) -> u32 {
    WaitEstimator::default().estimate(queue_length, priority)
}

/// Configurable wait estimator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WaitEstimator {
    base_minutes: f64,
    urgent_multiplier: f64,
}

impl Default for WaitEstimator {
    fn default() -> Self {
        Self::from_config(&QueueConfig::default())
    }
}

impl WaitEstimator {
    pub fn new(base_minutes: f64, urgent_multiplier: f64) -> Self {
        Self {
            base_minutes,
            urgent_multiplier,
        }
    }

    pub fn from_config(config: &QueueConfig) -> Self {
        Self::new(config.base_minutes_per_patient, config.urgent_multiplier)
    }

    fn multiplier(&self, priority: Priority) -> f64 {
        match priority {
            Priority::Urgent => self.urgent_multiplier,
            Priority::Normal => 1.0,
        }
    }

    /// Minutes of wait for a patient joining behind `queue_length` others.
    pub fn estimate(&self, queue_length: usize, priority: Priority) -> u32 {
        let minutes = queue_length as f64 * self.base_minutes * self.multiplier(priority);
        // Half rounds up for non-negative inputs
        minutes.round() as u32
    }
}
