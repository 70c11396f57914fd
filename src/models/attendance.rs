// src/models/attendance.rs

use serde::Serialize;
use sqlx::prelude::FromRow;

/// Represents one row of the 'attendance_records' table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AttendanceRecord {
    pub attended_on: chrono::NaiveDate,

    /// 'present', 'absent' or 'late'.
    pub status: String,
}

/// Counts over the student's full attendance history.
#[derive(Debug, Default, Serialize)]
pub struct AttendanceSummary {
    pub present: i64,
    pub absent: i64,
    pub late: i64,
    pub total: i64,
}
