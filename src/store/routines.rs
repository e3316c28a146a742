//! Class routines (one file per class) and exam routines.

use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;

use super::{now_rfc3339, Blob, StoreError, StoreResult};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Routine {
    pub id: i64,
    pub class_name: String,
    pub title: String,
    pub file_name: String,
    pub file_mime: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamRoutine {
    pub id: i64,
    pub exam_name: String,
    pub class_name: String,
    pub year: i64,
    pub file_name: String,
    pub file_mime: String,
    pub published_on: String,
}

#[derive(Debug, Clone)]
pub struct ExamRoutineInput {
    pub exam_name: String,
    pub class_name: String,
    pub year: i64,
    pub published_on: String,
    pub file: Option<Blob>,
}

fn row_to_routine(r: &Row<'_>) -> rusqlite::Result<Routine> {
    Ok(Routine {
        id: r.get(0)?,
        class_name: r.get(1)?,
        title: r.get(2)?,
        file_name: r.get(3)?,
        file_mime: r.get(4)?,
        updated_at: r.get(5)?,
    })
}

fn row_to_exam_routine(r: &Row<'_>) -> rusqlite::Result<ExamRoutine> {
    Ok(ExamRoutine {
        id: r.get(0)?,
        exam_name: r.get(1)?,
        class_name: r.get(2)?,
        year: r.get(3)?,
        file_name: r.get(4)?,
        file_mime: r.get(5)?,
        published_on: r.get(6)?,
    })
}

pub fn list(conn: &Connection) -> StoreResult<Vec<Routine>> {
    let mut stmt = conn.prepare(
        "SELECT id, class_name, title, file_name, file_mime, updated_at
         FROM routines
         ORDER BY class_name",
    )?;
    let rows = stmt
        .query_map([], row_to_routine)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Insert or replace the routine of a class. Returns the row id.
pub fn upsert(conn: &Connection, class_name: &str, title: &str, file: &Blob) -> StoreResult<i64> {
    let file_name = file.file_name.as_deref().unwrap_or("routine");
    let id: i64 = conn.query_row(
        "INSERT INTO routines(class_name, title, file, file_name, file_mime, updated_at)
         VALUES(?, ?, ?, ?, ?, ?)
         ON CONFLICT(class_name) DO UPDATE SET
           title = excluded.title,
           file = excluded.file,
           file_name = excluded.file_name,
           file_mime = excluded.file_mime,
           updated_at = excluded.updated_at
         RETURNING id",
        params![class_name, title, file.bytes, file_name, file.mime, now_rfc3339()],
        |r| r.get(0),
    )?;
    Ok(id)
}

pub fn delete(conn: &Connection, id: i64) -> StoreResult<()> {
    if conn.execute("DELETE FROM routines WHERE id = ?", [id])? == 0 {
        return Err(StoreError::NotFound { entity: "routine" });
    }
    Ok(())
}

pub fn file(conn: &Connection, id: i64) -> StoreResult<Option<Blob>> {
    super::media::blob_column(conn, "routines", "file", "file_mime", Some("file_name"), id, "routine")
}

/// Newest year first, then by exam and class.
pub fn exam_list(conn: &Connection) -> StoreResult<Vec<ExamRoutine>> {
    let mut stmt = conn.prepare(
        "SELECT id, exam_name, class_name, year, file_name, file_mime, published_on
         FROM exam_routines
         ORDER BY year DESC, exam_name, class_name",
    )?;
    let rows = stmt
        .query_map([], row_to_exam_routine)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn exam_get(conn: &Connection, id: i64) -> StoreResult<ExamRoutine> {
    conn.query_row(
        "SELECT id, exam_name, class_name, year, file_name, file_mime, published_on
         FROM exam_routines WHERE id = ?",
        [id],
        row_to_exam_routine,
    )
    .optional()?
    .ok_or(StoreError::NotFound { entity: "exam routine" })
}

pub fn exam_create(conn: &Connection, input: &ExamRoutineInput) -> StoreResult<i64> {
    let Some(file) = &input.file else {
        return Err(StoreError::Rejected("an exam routine needs a file".to_string()));
    };
    conn.execute(
        "INSERT INTO exam_routines(exam_name, class_name, year, file, file_name, file_mime, published_on)
         VALUES(?, ?, ?, ?, ?, ?, ?)",
        params![
            input.exam_name,
            input.class_name,
            input.year,
            file.bytes,
            file.file_name.as_deref().unwrap_or("exam-routine"),
            file.mime,
            input.published_on,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn exam_update(conn: &Connection, id: i64, input: &ExamRoutineInput) -> StoreResult<()> {
    let changed = conn.execute(
        "UPDATE exam_routines SET exam_name = ?, class_name = ?, year = ?, published_on = ?
         WHERE id = ?",
        params![input.exam_name, input.class_name, input.year, input.published_on, id],
    )?;
    if changed == 0 {
        return Err(StoreError::NotFound { entity: "exam routine" });
    }
    if let Some(file) = &input.file {
        conn.execute(
            "UPDATE exam_routines SET file = ?, file_name = ?, file_mime = ? WHERE id = ?",
            params![
                file.bytes,
                file.file_name.as_deref().unwrap_or("exam-routine"),
                file.mime,
                id
            ],
        )?;
    }
    Ok(())
}

pub fn exam_delete(conn: &Connection, id: i64) -> StoreResult<()> {
    if conn.execute("DELETE FROM exam_routines WHERE id = ?", [id])? == 0 {
        return Err(StoreError::NotFound { entity: "exam routine" });
    }
    Ok(())
}

pub fn exam_file(conn: &Connection, id: i64) -> StoreResult<Option<Blob>> {
    super::media::blob_column(
        conn,
        "exam_routines",
        "file",
        "file_mime",
        Some("file_name"),
        id,
        "exam routine",
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_in_memory;

    fn pdf(name: &str) -> Blob {
        Blob {
            bytes: b"%PDF-1.7".to_vec(),
            mime: "application/pdf".to_string(),
            file_name: Some(name.to_string()),
        }
    }

    #[test]
    fn upsert_replaces_the_class_routine() {
        let conn = open_in_memory().expect("open");
        let first = upsert(&conn, "Six", "Routine 2024", &pdf("a.pdf")).expect("first");
        let second = upsert(&conn, "Six", "Routine 2025", &pdf("b.pdf")).expect("second");
        assert_eq!(first, second);
        let all = list(&conn).expect("list");
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].title, "Routine 2025");
        assert_eq!(all[0].file_name, "b.pdf");
    }

    #[test]
    fn exam_create_requires_file() {
        let conn = open_in_memory().expect("open");
        let input = ExamRoutineInput {
            exam_name: "Half Yearly".to_string(),
            class_name: "Six".to_string(),
            year: 2024,
            published_on: "2024-05-01".to_string(),
            file: None,
        };
        assert!(matches!(
            exam_create(&conn, &input),
            Err(StoreError::Rejected(_))
        ));
    }
}
