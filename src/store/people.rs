//! Teachers and non-teaching staff. Both render as ordered directories with photos.

use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;

use super::students::split_blob;
use super::{optional_data_uri, Blob, StoreError, StoreResult};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Teacher {
    pub id: i64,
    pub name: String,
    pub designation: String,
    pub subject: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub joined_on: Option<String>,
    pub photo: Option<String>,
    pub sort_order: i64,
}

#[derive(Debug, Clone, Default)]
pub struct TeacherInput {
    pub name: String,
    pub designation: String,
    pub subject: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub joined_on: Option<String>,
    pub photo: Option<Blob>,
    pub sort_order: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StaffMember {
    pub id: i64,
    pub name: String,
    pub designation: String,
    pub phone: Option<String>,
    pub photo: Option<String>,
    pub sort_order: i64,
}

#[derive(Debug, Clone, Default)]
pub struct StaffInput {
    pub name: String,
    pub designation: String,
    pub phone: Option<String>,
    pub photo: Option<Blob>,
    pub sort_order: i64,
}

fn row_to_teacher(r: &Row<'_>) -> rusqlite::Result<Teacher> {
    Ok(Teacher {
        id: r.get(0)?,
        name: r.get(1)?,
        designation: r.get(2)?,
        subject: r.get(3)?,
        phone: r.get(4)?,
        email: r.get(5)?,
        joined_on: r.get(6)?,
        photo: optional_data_uri(r.get(7)?, r.get(8)?),
        sort_order: r.get(9)?,
    })
}

fn row_to_staff(r: &Row<'_>) -> rusqlite::Result<StaffMember> {
    Ok(StaffMember {
        id: r.get(0)?,
        name: r.get(1)?,
        designation: r.get(2)?,
        phone: r.get(3)?,
        photo: optional_data_uri(r.get(4)?, r.get(5)?),
        sort_order: r.get(6)?,
    })
}

const TEACHER_COLUMNS: &str =
    "id, name, designation, subject, phone, email, joined_on, photo, photo_mime, sort_order";
const STAFF_COLUMNS: &str = "id, name, designation, phone, photo, photo_mime, sort_order";

pub fn teachers_list(conn: &Connection) -> StoreResult<Vec<Teacher>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {TEACHER_COLUMNS} FROM teachers ORDER BY sort_order, name"
    ))?;
    let rows = stmt
        .query_map([], row_to_teacher)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn teacher_get(conn: &Connection, id: i64) -> StoreResult<Teacher> {
    conn.query_row(
        &format!("SELECT {TEACHER_COLUMNS} FROM teachers WHERE id = ?"),
        [id],
        row_to_teacher,
    )
    .optional()?
    .ok_or(StoreError::NotFound { entity: "teacher" })
}

pub fn teacher_create(conn: &Connection, input: &TeacherInput) -> StoreResult<i64> {
    let (photo, mime) = split_blob(input.photo.as_ref());
    conn.execute(
        "INSERT INTO teachers(name, designation, subject, phone, email, joined_on, photo, photo_mime, sort_order)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?)",
        params![
            input.name,
            input.designation,
            input.subject,
            input.phone,
            input.email,
            input.joined_on,
            photo,
            mime,
            input.sort_order,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn teacher_update(conn: &Connection, id: i64, input: &TeacherInput) -> StoreResult<()> {
    let changed = conn.execute(
        "UPDATE teachers SET name = ?, designation = ?, subject = ?, phone = ?, email = ?,
                joined_on = ?, sort_order = ?
         WHERE id = ?",
        params![
            input.name,
            input.designation,
            input.subject,
            input.phone,
            input.email,
            input.joined_on,
            input.sort_order,
            id,
        ],
    )?;
    if changed == 0 {
        return Err(StoreError::NotFound { entity: "teacher" });
    }
    if let Some(p) = &input.photo {
        conn.execute(
            "UPDATE teachers SET photo = ?, photo_mime = ? WHERE id = ?",
            params![p.bytes, p.mime, id],
        )?;
    }
    Ok(())
}

pub fn teacher_delete(conn: &Connection, id: i64) -> StoreResult<()> {
    if conn.execute("DELETE FROM teachers WHERE id = ?", [id])? == 0 {
        return Err(StoreError::NotFound { entity: "teacher" });
    }
    Ok(())
}

pub fn teacher_photo(conn: &Connection, id: i64) -> StoreResult<Option<Blob>> {
    super::media::blob_column(conn, "teachers", "photo", "photo_mime", None, id, "teacher")
}

pub fn staff_list(conn: &Connection) -> StoreResult<Vec<StaffMember>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {STAFF_COLUMNS} FROM staff ORDER BY sort_order, name"
    ))?;
    let rows = stmt
        .query_map([], row_to_staff)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn staff_get(conn: &Connection, id: i64) -> StoreResult<StaffMember> {
    conn.query_row(
        &format!("SELECT {STAFF_COLUMNS} FROM staff WHERE id = ?"),
        [id],
        row_to_staff,
    )
    .optional()?
    .ok_or(StoreError::NotFound { entity: "staff member" })
}

pub fn staff_create(conn: &Connection, input: &StaffInput) -> StoreResult<i64> {
    let (photo, mime) = split_blob(input.photo.as_ref());
    conn.execute(
        "INSERT INTO staff(name, designation, phone, photo, photo_mime, sort_order)
         VALUES(?, ?, ?, ?, ?, ?)",
        params![input.name, input.designation, input.phone, photo, mime, input.sort_order],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn staff_update(conn: &Connection, id: i64, input: &StaffInput) -> StoreResult<()> {
    let changed = conn.execute(
        "UPDATE staff SET name = ?, designation = ?, phone = ?, sort_order = ? WHERE id = ?",
        params![input.name, input.designation, input.phone, input.sort_order, id],
    )?;
    if changed == 0 {
        return Err(StoreError::NotFound { entity: "staff member" });
    }
    if let Some(p) = &input.photo {
        conn.execute(
            "UPDATE staff SET photo = ?, photo_mime = ? WHERE id = ?",
            params![p.bytes, p.mime, id],
        )?;
    }
    Ok(())
}

pub fn staff_delete(conn: &Connection, id: i64) -> StoreResult<()> {
    if conn.execute("DELETE FROM staff WHERE id = ?", [id])? == 0 {
        return Err(StoreError::NotFound { entity: "staff member" });
    }
    Ok(())
}

pub fn staff_photo(conn: &Connection, id: i64) -> StoreResult<Option<Blob>> {
    super::media::blob_column(conn, "staff", "photo", "photo_mime", None, id, "staff member")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_in_memory;

    #[test]
    fn teachers_come_back_in_sort_order() {
        let conn = open_in_memory().expect("open");
        for (name, order) in [("Zaman", 1), ("Akter", 2), ("Bose", 0)] {
            teacher_create(
                &conn,
                &TeacherInput {
                    name: name.to_string(),
                    designation: "Assistant Teacher".to_string(),
                    sort_order: order,
                    ..TeacherInput::default()
                },
            )
            .expect("create");
        }
        let names: Vec<String> = teachers_list(&conn)
            .expect("list")
            .into_iter()
            .map(|t| t.name)
            .collect();
        assert_eq!(names, vec!["Bose", "Zaman", "Akter"]);
    }

    #[test]
    fn staff_update_missing_row_is_not_found() {
        let conn = open_in_memory().expect("open");
        let err = staff_update(&conn, 9, &StaffInput::default()).expect_err("missing");
        assert_eq!(err.to_string(), "staff member not found");
    }
}
