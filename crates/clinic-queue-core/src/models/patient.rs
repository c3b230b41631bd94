//! Patient models.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Unknown wire value for a status or priority.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Unknown {kind}: {value}")]
pub struct ParseModelError {
    pub kind: &'static str,
    pub value: String,
}

/// Where a patient is in the visit.
///
/// The lifecycle only moves forward:
/// `waiting → called → in-consultation → completed`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum PatientStatus {
    /// Checked in, in the queue
    Waiting,
    /// Called by staff, walking to the room
    Called,
    /// Being seen
    InConsultation,
    /// Visit finished
    Completed,
}

impl PatientStatus {
    /// Wire name used by the store.
    pub fn as_str(&self) -> &'static str {
        match self {
            PatientStatus::Waiting => "waiting",
            PatientStatus::Called => "called",
            PatientStatus::InConsultation => "in-consultation",
            PatientStatus::Completed => "completed",
        }
    }

    fn rank(&self) -> u8 {
        match self {
            PatientStatus::Waiting => 0,
            PatientStatus::Called => 1,
            PatientStatus::InConsultation => 2,
            PatientStatus::Completed => 3,
        }
    }

    /// Whether moving to `next` keeps the lifecycle moving forward.
    ///
    /// Skipping a step (e.g. waiting straight to in-consultation) counts as
    /// forward. Staying in the same status does not.
    pub fn can_advance_to(&self, next: PatientStatus) -> bool {
        next.rank() > self.rank()
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PatientStatus::Completed)
    }
}

impl fmt::Display for PatientStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PatientStatus {
    type Err = ParseModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "waiting" => Ok(PatientStatus::Waiting),
            "called" => Ok(PatientStatus::Called),
            "in-consultation" => Ok(PatientStatus::InConsultation),
            "completed" => Ok(PatientStatus::Completed),
            other => Err(ParseModelError {
                kind: "status",
                value: other.to_string(),
            }),
        }
    }
}

/// Priority class, decides queue precedence.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    #[default]
    Normal,
    Urgent,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Normal => "normal",
            Priority::Urgent => "urgent",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = ParseModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "normal" => Ok(Priority::Normal),
            "urgent" => Ok(Priority::Urgent),
            other => Err(ParseModelError {
                kind: "priority",
                value: other.to_string(),
            }),
        }
    }
}

/// A patient record as held by the store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Patient {
    /// Store-assigned ID, immutable
    pub id: String,
    /// Patient name as entered at check-in
    pub name: String,
    /// Contact phone as entered at check-in
    pub phone: String,
    /// Check-in timestamp (ordering tie-break, basis of elapsed wait)
    pub check_in_time: DateTime<Utc>,
    /// Estimated wait in minutes, computed once at check-in
    pub estimated_wait_time: u32,
    /// Visit status
    pub status: PatientStatus,
    /// Priority class
    pub priority: Priority,
    /// Creation timestamp (store bookkeeping)
    pub created_at: DateTime<Utc>,
    /// Last update timestamp (store bookkeeping)
    pub updated_at: DateTime<Utc>,
}

impl Patient {
    pub fn is_waiting(&self) -> bool {
        self.status == PatientStatus::Waiting
    }

    pub fn is_urgent(&self) -> bool {
        self.priority == Priority::Urgent
    }
}

/// Insert payload. The store assigns `id`, `created_at` and `updated_at`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewPatient {
    pub name: String,
    pub phone: String,
    pub priority: Priority,
    pub estimated_wait_time: u32,
    pub status: PatientStatus,
    pub check_in_time: DateTime<Utc>,
}

impl NewPatient {
    /// Build a waiting record checked in at `check_in_time`.
    pub fn waiting(
        check_in: CheckIn,
        estimated_wait_time: u32,
        check_in_time: DateTime<Utc>,
    ) -> Self {
        Self {
            name: check_in.name,
            phone: check_in.phone,
            priority: check_in.priority,
            estimated_wait_time,
            status: PatientStatus::Waiting,
            check_in_time,
        }
    }

    /// Materialize the stored record once the store has picked an ID.
    pub fn into_patient(self, id: String, stored_at: DateTime<Utc>) -> Patient {
        Patient {
            id,
            name: self.name,
            phone: self.phone,
            check_in_time: self.check_in_time,
            estimated_wait_time: self.estimated_wait_time,
            status: self.status,
            priority: self.priority,
            created_at: stored_at,
            updated_at: stored_at,
        }
    }
}

/// Check-in form input.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CheckIn {
    pub name: String,
    pub phone: String,
    #[serde(default)]
    pub priority: Priority,
}

impl CheckIn {
    pub fn new(name: impl Into<String>, phone: impl Into<String>, priority: Priority) -> Self {
        Self {
            name: name.into(),
            phone: phone.into(),
            priority,
        }
    }

    /// Trim both fields and reject blanks.
    ///
    /// Returns the name of the first missing field on failure.
    pub fn normalized(self) -> Result<Self, &'static str> {
        let name = self.name.trim().to_string();
        let phone = self.phone.trim().to_string();
        if name.is_empty() {
            return Err("name");
        }
        if phone.is_empty() {
            return Err("phone");
        }
        Ok(Self {
            name,
            phone,
            priority: self.priority,
        })
    }
}
