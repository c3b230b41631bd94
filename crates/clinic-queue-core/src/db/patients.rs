//! Patient database operations.

use chrono::{DateTime, Utc};
use rusqlite::{params, Row};

use super::{format_timestamp, parse_timestamp, Database, DbError, DbResult};
use crate::models::{Patient, PatientStatus};

const PATIENT_COLUMNS: &str = "id, name, phone, check_in_time, estimated_wait_time, \
                               status, priority, created_at, updated_at";

impl Database {
    /// Insert a new patient.
    pub fn insert_patient(&self, patient: &Patient) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO patients (
                id, name, phone, check_in_time, estimated_wait_time,
                status, priority, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
            params![
                patient.id,
                patient.name,
                patient.phone,
                format_timestamp(&patient.check_in_time),
                patient.estimated_wait_time,
                patient.status.as_str(),
                patient.priority.as_str(),
                format_timestamp(&patient.created_at),
                format_timestamp(&patient.updated_at),
            ],
        )?;
        Ok(())
    }

    /// List all patients, earliest check-in first.
    pub fn list_patients(&self) -> DbResult<Vec<Patient>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM patients ORDER BY check_in_time ASC, rowid ASC",
            PATIENT_COLUMNS
        ))?;

        let rows = stmt.query_map([], PatientRow::from_row)?;

        let mut patients = Vec::new();
        for row in rows {
            patients.push(row?.try_into()?);
        }
        Ok(patients)
    }

    /// Set a patient's status. Returns false when no row matched.
    pub fn update_patient_status(
        &self,
        id: &str,
        status: PatientStatus,
        updated_at: &DateTime<Utc>,
    ) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            "UPDATE patients SET status = ?2, updated_at = ?3 WHERE id = ?1",
            params![id, status.as_str(), format_timestamp(updated_at)],
        )?;
        Ok(rows_affected > 0)
    }

    /// Delete a patient. Returns false when no row matched.
    pub fn delete_patient(&self, id: &str) -> DbResult<bool> {
        let rows_affected = self
            .conn
            .execute("DELETE FROM patients WHERE id = ?", [id])?;
        Ok(rows_affected > 0)
    }
}

/// Raw row before status/priority/timestamp parsing.
struct PatientRow {
    id: String,
    name: String,
    phone: String,
    check_in_time: String,
    estimated_wait_time: u32,
    status: String,
    priority: String,
    created_at: String,
    updated_at: String,
}

impl PatientRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(PatientRow {
            id: row.get(0)?,
            name: row.get(1)?,
            phone: row.get(2)?,
            check_in_time: row.get(3)?,
            estimated_wait_time: row.get(4)?,
            status: row.get(5)?,
            priority: row.get(6)?,
            created_at: row.get(7)?,
            updated_at: row.get(8)?,
        })
    }
}

impl TryFrom<PatientRow> for Patient {
    type Error = DbError;

    fn try_from(row: PatientRow) -> Result<Self, Self::Error> {
        Ok(Patient {
            id: row.id,
            name: row.name,
            phone: row.phone,
            check_in_time: parse_timestamp(&row.check_in_time)?,
            estimated_wait_time: row.estimated_wait_time,
            status: row
                .status
                .parse()
                .map_err(|e| DbError::InvalidData(format!("{}", e)))?,
            priority: row
                .priority
                .parse()
                .map_err(|e| DbError::InvalidData(format!("{}", e)))?,
            created_at: parse_timestamp(&row.created_at)?,
            updated_at: parse_timestamp(&row.updated_at)?,
        })
    }
}
