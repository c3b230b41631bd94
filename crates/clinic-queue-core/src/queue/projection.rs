//! Read-only views derived from the full record set.
//!
//! Everything here is recomputed from scratch on each call; nothing is
//! maintained incrementally.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ordering::order_waiting;
use crate::models::{Patient, PatientStatus};

/// Aggregate numbers for the live display.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct QueueStats {
    /// Patients currently waiting
    pub total_patients: usize,
    /// Mean minutes waited so far across the waiting list, rounded
    pub average_wait_time: u32,
    /// Name of the patient in consultation
    pub currently_serving: Option<String>,
    /// Name of the patient at the head of the queue
    pub next_patient: Option<String>,
}

/// Everything a queue surface renders, computed against one `now`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueueSnapshot {
    /// Waiting patients in service order
    pub waiting: Vec<Patient>,
    /// Patient in consultation
    pub current: Option<Patient>,
    /// Patients called but not yet seen, in store order
    pub called: Vec<Patient>,
    pub stats: QueueStats,
    /// Reference time for elapsed-wait values
    pub now: DateTime<Utc>,
}

impl QueueSnapshot {
    /// Project `patients` as seen at `now`.
    pub fn project(patients: &[Patient], now: DateTime<Utc>) -> Self {
        let waiting = waiting_list(patients);
        let current = current_patient(patients).cloned();
        let called = called_patients(patients).into_iter().cloned().collect();
        let stats = stats_for(&waiting, current.as_ref(), now);

        Self {
            waiting,
            current,
            called,
            stats,
            now,
        }
    }

    /// 1-based queue position of a waiting patient.
    pub fn position_of(&self, id: &str) -> Option<usize> {
        self.waiting.iter().position(|p| p.id == id).map(|i| i + 1)
    }

    pub fn next(&self) -> Option<&Patient> {
        self.waiting.first()
    }

    /// Elapsed-wait label for a patient at this snapshot's `now`.
    pub fn elapsed_label(&self, patient: &Patient) -> String {
        format_elapsed(elapsed_minutes(patient.check_in_time, self.now))
    }
}

/// Waiting patients in service order.
pub fn waiting_list(patients: &[Patient]) -> Vec<Patient> {
    order_waiting(patients)
}

/// The patient in consultation, if any.
///
/// Should more than one record be in consultation, the first in store
/// order wins.
pub fn current_patient(patients: &[Patient]) -> Option<&Patient> {
    patients
        .iter()
        .find(|p| p.status == PatientStatus::InConsultation)
}

pub fn called_patients(patients: &[Patient]) -> Vec<&Patient> {
    patients
        .iter()
        .filter(|p| p.status == PatientStatus::Called)
        .collect()
}

/// Stats over an already ordered waiting list.
pub fn stats_for(
    waiting: &[Patient],
    current: Option<&Patient>,
    now: DateTime<Utc>,
) -> QueueStats {
    QueueStats {
        total_patients: waiting.len(),
        average_wait_time: average_wait_minutes(waiting, now),
        currently_serving: current.map(|p| p.name.clone()),
        next_patient: waiting.first().map(|p| p.name.clone()),
    }
}

/// Stats straight from the full record set.
pub fn queue_stats(patients: &[Patient], now: DateTime<Utc>) -> QueueStats {
    let waiting = waiting_list(patients);
    stats_for(&waiting, current_patient(patients), now)
}

/// Rounded mean of fractional minutes waited. 0 for an empty list.
pub fn average_wait_minutes(waiting: &[Patient], now: DateTime<Utc>) -> u32 {
    if waiting.is_empty() {
        return 0;
    }
    let total: f64 = waiting
        .iter()
        .map(|p| (now - p.check_in_time).num_milliseconds() as f64 / 60_000.0)
        .sum();
    let mean = (total / waiting.len() as f64).round();
    // Check-ins stamped ahead of the local clock would go negative
    mean.max(0.0) as u32
}

/// Whole minutes since `check_in_time`, floored.
pub fn elapsed_minutes(check_in_time: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (now - check_in_time).num_milliseconds().div_euclid(60_000)
}

/// Live display label: "Just arrived", "1 minute ago", "N minutes ago".
pub fn format_elapsed(minutes: i64) -> String {
    match minutes {
        m if m < 1 => "Just arrived".to_string(),
        1 => "1 minute ago".to_string(),
        m => format!("{} minutes ago", m),
    }
}

/// Compact staff label: "Just arrived" or "Nm".
pub fn format_elapsed_short(minutes: i64) -> String {
    if minutes < 1 {
        "Just arrived".to_string()
    } else {
        format!("{}m", minutes)
    }
}

/// Ordinal suffix for a 1-based position.
///
/// Only 1, 2 and 3 get "st", "nd", "rd"; every other position gets "th",
/// including 21, 22 and 23.
pub fn ordinal_suffix(position: usize) -> &'static str {
    match position {
        1 => "st",
        2 => "nd",
        3 => "rd",
        _ => "th",
    }
}

pub fn format_position(position: usize) -> String {
    format!("{}{}", position, ordinal_suffix(position))
}

/// Check-in time as a 24h `HH:MM` clock label.
pub fn format_clock(time: DateTime<Utc>) -> String {
    time.format("%H:%M").to_string()
}
