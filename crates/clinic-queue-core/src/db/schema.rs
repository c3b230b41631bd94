//! SQLite schema definition.

/// Complete database schema for the clinic queue.
///
/// Timestamps are RFC 3339 UTC strings with millisecond precision
/// (`2024-01-15T09:00:00.000Z`), so text order equals time order.
pub const SCHEMA: &str = r#"
-- ============================================================================
-- Patients
-- ============================================================================

CREATE TABLE IF NOT EXISTS patients (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL CHECK (length(trim(name)) > 0),
    phone TEXT NOT NULL CHECK (length(trim(phone)) > 0),
    check_in_time TEXT NOT NULL,
    estimated_wait_time INTEGER NOT NULL DEFAULT 0 CHECK (estimated_wait_time >= 0),
    status TEXT NOT NULL DEFAULT 'waiting'
        CHECK (status IN ('waiting', 'called', 'in-consultation', 'completed')),
    priority TEXT NOT NULL DEFAULT 'normal'
        CHECK (priority IN ('normal', 'urgent')),
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_patients_check_in ON patients(check_in_time);
CREATE INDEX IF NOT EXISTS idx_patients_status ON patients(status);
"#;
