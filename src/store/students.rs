use rusqlite::{params, params_from_iter, types::Value, Connection, OptionalExtension, Row};
use serde::Serialize;

use super::{count, like_pattern, now_rfc3339, on, optional_data_uri, Blob, Page, PageRequest, StoreError, StoreResult};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: i64,
    pub name: String,
    pub class_name: String,
    pub section: String,
    pub roll: i64,
    pub gender: Option<String>,
    pub guardian_name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub date_of_birth: Option<String>,
    pub admission_year: Option<i64>,
    pub photo: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Default)]
pub struct StudentInput {
    pub name: String,
    pub class_name: String,
    pub section: String,
    pub roll: i64,
    pub gender: Option<String>,
    pub guardian_name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub date_of_birth: Option<String>,
    pub admission_year: Option<i64>,
    pub photo: Option<Blob>,
}

#[derive(Debug, Clone, Default)]
pub struct StudentFilter {
    pub class_name: Option<String>,
    pub section: Option<String>,
    pub search: Option<String>,
}

const COLUMNS: &str = "id, name, class_name, section, roll, gender, guardian_name, phone,
     address, date_of_birth, admission_year, photo, photo_mime, created_at";

fn row_to_student(r: &Row<'_>) -> rusqlite::Result<Student> {
    Ok(Student {
        id: r.get(0)?,
        name: r.get(1)?,
        class_name: r.get(2)?,
        section: r.get(3)?,
        roll: r.get(4)?,
        gender: r.get(5)?,
        guardian_name: r.get(6)?,
        phone: r.get(7)?,
        address: r.get(8)?,
        date_of_birth: r.get(9)?,
        admission_year: r.get(10)?,
        photo: optional_data_uri(r.get(11)?, r.get(12)?),
        created_at: r.get(13)?,
    })
}

fn filter_clause(filter: &StudentFilter) -> (String, Vec<Value>) {
    let mut clauses: Vec<&str> = Vec::new();
    let mut binds: Vec<Value> = Vec::new();
    if let Some(c) = &filter.class_name {
        clauses.push("class_name = ?");
        binds.push(Value::Text(c.clone()));
    }
    if let Some(s) = &filter.section {
        clauses.push("section = ?");
        binds.push(Value::Text(s.clone()));
    }
    if let Some(q) = filter.search.as_deref().filter(|q| !q.is_empty()) {
        clauses.push("name LIKE ? ESCAPE '\\'");
        binds.push(Value::Text(like_pattern(q)));
    }
    if clauses.is_empty() {
        (String::new(), binds)
    } else {
        (format!("WHERE {}", clauses.join(" AND ")), binds)
    }
}

pub fn list(conn: &Connection, filter: &StudentFilter, page: PageRequest) -> StoreResult<Page<Student>> {
    let (where_sql, mut binds) = filter_clause(filter);
    let total = count(
        conn,
        &format!("SELECT COUNT(*) FROM students {where_sql}"),
        params_from_iter(binds.iter()),
    )?;
    binds.push(Value::Integer(page.limit()));
    binds.push(Value::Integer(page.offset()));
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM students {where_sql}
         ORDER BY class_name, section, roll
         LIMIT ? OFFSET ?"
    ))?;
    let items = stmt
        .query_map(params_from_iter(binds.iter()), row_to_student)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Page::new(items, total, page))
}

pub fn get(conn: &Connection, id: i64) -> StoreResult<Student> {
    conn.query_row(
        &format!("SELECT {COLUMNS} FROM students WHERE id = ?"),
        [id],
        row_to_student,
    )
    .optional()?
    .ok_or(StoreError::NotFound { entity: "student" })
}

pub fn photo(conn: &Connection, id: i64) -> StoreResult<Option<Blob>> {
    super::media::blob_column(conn, "students", "photo", "photo_mime", None, id, "student")
}

pub fn create(conn: &Connection, input: &StudentInput) -> StoreResult<i64> {
    let (photo, mime) = split_blob(input.photo.as_ref());
    conn.execute(
        "INSERT INTO students(name, class_name, section, roll, gender, guardian_name, phone,
                              address, date_of_birth, admission_year, photo, photo_mime, created_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        params![
            input.name,
            input.class_name,
            input.section,
            input.roll,
            input.gender,
            input.guardian_name,
            input.phone,
            input.address,
            input.date_of_birth,
            input.admission_year,
            photo,
            mime,
            now_rfc3339(),
        ],
    )
    .map_err(on("student with this class, section and roll"))?;
    Ok(conn.last_insert_rowid())
}

/// Updates every field; the stored photo is kept unless a new one is given.
pub fn update(conn: &Connection, id: i64, input: &StudentInput) -> StoreResult<()> {
    let changed = conn
        .execute(
            "UPDATE students SET name = ?, class_name = ?, section = ?, roll = ?, gender = ?,
                    guardian_name = ?, phone = ?, address = ?, date_of_birth = ?, admission_year = ?
             WHERE id = ?",
            params![
                input.name,
                input.class_name,
                input.section,
                input.roll,
                input.gender,
                input.guardian_name,
                input.phone,
                input.address,
                input.date_of_birth,
                input.admission_year,
                id,
            ],
        )
        .map_err(on("student with this class, section and roll"))?;
    if changed == 0 {
        return Err(StoreError::NotFound { entity: "student" });
    }
    if let Some(p) = &input.photo {
        conn.execute(
            "UPDATE students SET photo = ?, photo_mime = ? WHERE id = ?",
            params![p.bytes, p.mime, id],
        )?;
    }
    Ok(())
}

/// Fee collections and attendance go with the student (ON DELETE CASCADE).
pub fn delete(conn: &Connection, id: i64) -> StoreResult<()> {
    let changed = conn.execute("DELETE FROM students WHERE id = ?", [id])?;
    if changed == 0 {
        return Err(StoreError::NotFound { entity: "student" });
    }
    Ok(())
}

/// Ids from `ids` that have no student row.
pub fn missing_ids(conn: &Connection, ids: &[i64]) -> StoreResult<Vec<i64>> {
    let mut stmt = conn.prepare("SELECT 1 FROM students WHERE id = ?")?;
    let mut missing = Vec::new();
    for id in ids {
        if !stmt.exists([id])? {
            missing.push(*id);
        }
    }
    Ok(missing)
}

/// Distinct class names, for filter dropdowns.
pub fn classes(conn: &Connection) -> StoreResult<Vec<String>> {
    let mut stmt = conn.prepare("SELECT DISTINCT class_name FROM students ORDER BY class_name")?;
    let rows = stmt
        .query_map([], |r| r.get(0))?
        .collect::<Result<Vec<String>, _>>()?;
    Ok(rows)
}

pub(crate) fn split_blob(blob: Option<&Blob>) -> (Option<&[u8]>, Option<&str>) {
    match blob {
        Some(b) => (Some(b.bytes.as_slice()), Some(b.mime.as_str())),
        None => (None, None),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::db::open_in_memory;

    pub(crate) fn sample(name: &str, roll: i64) -> StudentInput {
        StudentInput {
            name: name.to_string(),
            class_name: "Six".to_string(),
            section: "A".to_string(),
            roll,
            ..StudentInput::default()
        }
    }

    #[test]
    fn duplicate_roll_is_rejected_with_domain_message() {
        let conn = open_in_memory().expect("open");
        create(&conn, &sample("Rahim", 1)).expect("first");
        let err = create(&conn, &sample("Karim", 1)).expect_err("dup");
        assert_eq!(
            err.to_string(),
            "student with this class, section and roll already exists"
        );
    }

    #[test]
    fn list_filters_and_paginates() {
        let conn = open_in_memory().expect("open");
        for i in 1..=5 {
            create(&conn, &sample(&format!("Student {i}"), i)).expect("create");
        }
        let mut other = sample("Nadia", 1);
        other.class_name = "Seven".to_string();
        create(&conn, &other).expect("create other");

        let filter = StudentFilter {
            class_name: Some("Six".to_string()),
            ..StudentFilter::default()
        };
        let page = list(&conn, &filter, PageRequest::new(2, 2)).expect("list");
        assert_eq!(page.total, 5);
        assert_eq!(page.total_pages, 3);
        let rolls: Vec<i64> = page.items.iter().map(|s| s.roll).collect();
        assert_eq!(rolls, vec![3, 4]);

        let search = StudentFilter {
            search: Some("nad".to_string()),
            ..StudentFilter::default()
        };
        let found = list(&conn, &search, PageRequest::new(1, 10)).expect("search");
        assert_eq!(found.total, 1);
        assert_eq!(found.items[0].name, "Nadia");
    }

    #[test]
    fn update_keeps_photo_when_none_given() {
        let conn = open_in_memory().expect("open");
        let mut input = sample("Rahim", 1);
        input.photo = Some(Blob {
            bytes: vec![1, 2, 3],
            mime: "image/png".to_string(),
            file_name: None,
        });
        let id = create(&conn, &input).expect("create");
        let mut changed = sample("Rahim Uddin", 1);
        changed.photo = None;
        update(&conn, id, &changed).expect("update");
        let s = get(&conn, id).expect("get");
        assert_eq!(s.name, "Rahim Uddin");
        assert!(s.photo.expect("photo").starts_with("data:image/png;base64,"));
    }

    #[test]
    fn delete_missing_student_is_not_found() {
        let conn = open_in_memory().expect("open");
        assert!(matches!(
            delete(&conn, 42),
            Err(StoreError::NotFound { entity: "student" })
        ));
    }
}
