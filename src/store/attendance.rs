//! Daily student attendance.
//!
//! A save replaces the stored rows for one date and a set of students in a
//! single transaction: delete the existing rows for those students, then insert
//! one row per entry. Readers never see a half-applied save.

use chrono::{Datelike, NaiveDate};
use rusqlite::{params, params_from_iter, types::Value, Connection};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;

use super::StoreResult;

/// Bound parameters per `IN (...)` chunk; well under SQLite's variable limit.
const DELETE_CHUNK: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttendanceStatus {
    Present,
    Absent,
}

impl AttendanceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Present => "Present",
            Self::Absent => "Absent",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "present" => Some(Self::Present),
            "absent" => Some(Self::Absent),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttendanceEntry {
    pub status: AttendanceStatus,
    pub reason: Option<String>,
}

impl AttendanceEntry {
    /// The reason as stored: only for absences, blank treated as none.
    fn stored_reason(&self) -> Option<&str> {
        match self.status {
            AttendanceStatus::Absent => self
                .reason
                .as_deref()
                .map(str::trim)
                .filter(|r| !r.is_empty()),
            AttendanceStatus::Present => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    pub student_id: i64,
    pub attendance_date: String,
    pub status: AttendanceStatus,
    pub reason: Option<String>,
}

/// One roster row for a date; `status` is `None` when not yet taken.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterAttendance {
    pub student_id: i64,
    pub name: String,
    pub section: String,
    pub roll: i64,
    pub status: Option<AttendanceStatus>,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthSummaryRow {
    pub student_id: i64,
    pub name: String,
    pub section: String,
    pub roll: i64,
    pub present: i64,
    pub absent: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthSummary {
    pub month: String,
    pub marked_days: i64,
    pub rows: Vec<MonthSummaryRow>,
}

pub fn date_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn status_from_sql(s: &str) -> rusqlite::Result<AttendanceStatus> {
    AttendanceStatus::parse(s).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            0,
            rusqlite::types::Type::Text,
            format!("unknown attendance status {s:?}").into(),
        )
    })
}

/// Make stored attendance for `date` match `entries` exactly for those students.
/// Returns the number of rows written. An empty map touches nothing.
pub fn save(
    conn: &Connection,
    date: NaiveDate,
    entries: &BTreeMap<i64, AttendanceEntry>,
) -> StoreResult<usize> {
    if entries.is_empty() {
        return Ok(0);
    }
    let day = date_key(date);
    let ids: Vec<i64> = entries.keys().copied().collect();

    // Dropping the transaction without commit rolls it back.
    let tx = conn.unchecked_transaction()?;
    let mut removed = 0;
    for chunk in ids.chunks(DELETE_CHUNK) {
        let placeholders = vec!["?"; chunk.len()].join(", ");
        let mut binds: Vec<Value> = Vec::with_capacity(chunk.len() + 1);
        binds.push(Value::Text(day.clone()));
        binds.extend(chunk.iter().map(|id| Value::Integer(*id)));
        removed += tx.execute(
            &format!(
                "DELETE FROM student_attendance
                 WHERE attendance_date = ? AND student_id IN ({placeholders})"
            ),
            params_from_iter(binds.iter()),
        )?;
    }
    {
        let mut insert = tx.prepare(
            "INSERT INTO student_attendance(student_id, attendance_date, status, reason)
             VALUES(?, ?, ?, ?)",
        )?;
        for (student_id, entry) in entries {
            insert.execute(params![
                student_id,
                day,
                entry.status.as_str(),
                entry.stored_reason()
            ])?;
        }
    }
    tx.commit()?;
    info!(date = %day, written = entries.len(), replaced = removed, "attendance saved");
    Ok(entries.len())
}

/// Stored records for `date` restricted to `student_ids`, ordered by student id.
pub fn for_students(conn: &Connection, date: NaiveDate, student_ids: &[i64]) -> StoreResult<Vec<AttendanceRecord>> {
    let mut out = Vec::new();
    for chunk in student_ids.chunks(DELETE_CHUNK) {
        let placeholders = vec!["?"; chunk.len()].join(", ");
        let mut binds: Vec<Value> = Vec::with_capacity(chunk.len() + 1);
        binds.push(Value::Text(date_key(date)));
        binds.extend(chunk.iter().map(|id| Value::Integer(*id)));
        let mut stmt = conn.prepare(&format!(
            "SELECT student_id, attendance_date, status, reason
             FROM student_attendance
             WHERE attendance_date = ? AND student_id IN ({placeholders})"
        ))?;
        let rows = stmt
            .query_map(params_from_iter(binds.iter()), |r| {
                let status: String = r.get(2)?;
                Ok(AttendanceRecord {
                    student_id: r.get(0)?,
                    attendance_date: r.get(1)?,
                    status: status_from_sql(&status)?,
                    reason: r.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        out.extend(rows);
    }
    out.sort_by_key(|r| r.student_id);
    Ok(out)
}

/// The class roster joined with the attendance taken on `date`.
pub fn for_class(
    conn: &Connection,
    date: NaiveDate,
    class_name: &str,
    section: Option<&str>,
) -> StoreResult<Vec<RosterAttendance>> {
    let mut binds: Vec<Value> = vec![
        Value::Text(date_key(date)),
        Value::Text(class_name.to_string()),
    ];
    let section_sql = match section {
        Some(s) => {
            binds.push(Value::Text(s.to_string()));
            "AND s.section = ?"
        }
        None => "",
    };
    let mut stmt = conn.prepare(&format!(
        "SELECT s.id, s.name, s.section, s.roll, a.status, a.reason
         FROM students s
         LEFT JOIN student_attendance a
           ON a.student_id = s.id AND a.attendance_date = ?
         WHERE s.class_name = ? {section_sql}
         ORDER BY s.section, s.roll"
    ))?;
    let rows = stmt
        .query_map(params_from_iter(binds.iter()), |r| {
            let status: Option<String> = r.get(4)?;
            Ok(RosterAttendance {
                student_id: r.get(0)?,
                name: r.get(1)?,
                section: r.get(2)?,
                roll: r.get(3)?,
                status: status.as_deref().map(status_from_sql).transpose()?,
                reason: r.get(5)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Present/absent counts per student for the calendar month containing `any_day`.
pub fn month_summary(
    conn: &Connection,
    any_day: NaiveDate,
    class_name: &str,
    section: Option<&str>,
) -> StoreResult<MonthSummary> {
    let month = format!("{:04}-{:02}", any_day.year(), any_day.month());
    let prefix = format!("{month}-%");
    let mut binds: Vec<Value> = vec![
        Value::Text(prefix),
        Value::Text(class_name.to_string()),
    ];
    let section_sql = match section {
        Some(s) => {
            binds.push(Value::Text(s.to_string()));
            "AND s.section = ?"
        }
        None => "",
    };
    let mut stmt = conn.prepare(&format!(
        "SELECT s.id, s.name, s.section, s.roll,
                COALESCE(SUM(CASE WHEN a.status = 'Present' THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN a.status = 'Absent' THEN 1 ELSE 0 END), 0)
         FROM students s
         LEFT JOIN student_attendance a
           ON a.student_id = s.id AND a.attendance_date LIKE ?
         WHERE s.class_name = ? {section_sql}
         GROUP BY s.id, s.name, s.section, s.roll
         ORDER BY s.section, s.roll"
    ))?;
    let rows = stmt
        .query_map(params_from_iter(binds.iter()), |r| {
            Ok(MonthSummaryRow {
                student_id: r.get(0)?,
                name: r.get(1)?,
                section: r.get(2)?,
                roll: r.get(3)?,
                present: r.get(4)?,
                absent: r.get(5)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let marked_days: i64 = conn.query_row(
        &format!(
            "SELECT COUNT(DISTINCT a.attendance_date)
             FROM student_attendance a
             JOIN students s ON s.id = a.student_id
             WHERE a.attendance_date LIKE ? AND s.class_name = ? {section_sql}"
        ),
        params_from_iter(binds.iter()),
        |r| r.get(0),
    )?;

    Ok(MonthSummary {
        month,
        marked_days,
        rows,
    })
}
