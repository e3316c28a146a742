//! Public application forms: admission, admit card, stipend.

use rusqlite::{params, params_from_iter, types::Value, Connection, OptionalExtension, Row};
use serde::Serialize;

use super::students::split_blob;
use super::{count, now_rfc3339, optional_data_uri, Blob, Page, PageRequest, StoreError, StoreResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Pending,
    Approved,
    Rejected,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }
}

/// Which application table a request targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Admission,
    AdmitCard,
    Stipend,
}

impl Kind {
    fn table(self) -> &'static str {
        match self {
            Self::Admission => "admission_applications",
            Self::AdmitCard => "admit_card_applications",
            Self::Stipend => "stipend_applications",
        }
    }

    pub fn entity(self) -> &'static str {
        match self {
            Self::Admission => "admission application",
            Self::AdmitCard => "admit card application",
            Self::Stipend => "stipend application",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionApplication {
    pub id: i64,
    pub applicant_name: String,
    pub guardian_name: String,
    pub date_of_birth: String,
    pub desired_class: String,
    pub previous_school: Option<String>,
    pub phone: String,
    pub address: Option<String>,
    pub photo: Option<String>,
    pub status: String,
    pub submitted_at: String,
}

#[derive(Debug, Clone, Default)]
pub struct AdmissionInput {
    pub applicant_name: String,
    pub guardian_name: String,
    pub date_of_birth: String,
    pub desired_class: String,
    pub previous_school: Option<String>,
    pub phone: String,
    pub address: Option<String>,
    pub photo: Option<Blob>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmitCardApplication {
    pub id: i64,
    pub student_name: String,
    pub class_name: String,
    pub roll: i64,
    pub exam_name: String,
    pub phone: String,
    pub status: String,
    pub submitted_at: String,
}

#[derive(Debug, Clone, Default)]
pub struct AdmitCardInput {
    pub student_name: String,
    pub class_name: String,
    pub roll: i64,
    pub exam_name: String,
    pub phone: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StipendApplication {
    pub id: i64,
    pub student_name: String,
    pub class_name: String,
    pub roll: i64,
    pub guardian_income_cents: i64,
    pub reason: String,
    pub phone: String,
    pub status: String,
    pub submitted_at: String,
}

#[derive(Debug, Clone, Default)]
pub struct StipendInput {
    pub student_name: String,
    pub class_name: String,
    pub roll: i64,
    pub guardian_income_cents: i64,
    pub reason: String,
    pub phone: String,
}

const ADMISSION_COLUMNS: &str = "id, applicant_name, guardian_name, date_of_birth, desired_class,
     previous_school, phone, address, photo, photo_mime, status, submitted_at";
const ADMIT_CARD_COLUMNS: &str =
    "id, student_name, class_name, roll, exam_name, phone, status, submitted_at";
const STIPEND_COLUMNS: &str = "id, student_name, class_name, roll, guardian_income_cents, reason,
     phone, status, submitted_at";

fn row_to_admission(r: &Row<'_>) -> rusqlite::Result<AdmissionApplication> {
    Ok(AdmissionApplication {
        id: r.get(0)?,
        applicant_name: r.get(1)?,
        guardian_name: r.get(2)?,
        date_of_birth: r.get(3)?,
        desired_class: r.get(4)?,
        previous_school: r.get(5)?,
        phone: r.get(6)?,
        address: r.get(7)?,
        photo: optional_data_uri(r.get(8)?, r.get(9)?),
        status: r.get(10)?,
        submitted_at: r.get(11)?,
    })
}

fn row_to_admit_card(r: &Row<'_>) -> rusqlite::Result<AdmitCardApplication> {
    Ok(AdmitCardApplication {
        id: r.get(0)?,
        student_name: r.get(1)?,
        class_name: r.get(2)?,
        roll: r.get(3)?,
        exam_name: r.get(4)?,
        phone: r.get(5)?,
        status: r.get(6)?,
        submitted_at: r.get(7)?,
    })
}

fn row_to_stipend(r: &Row<'_>) -> rusqlite::Result<StipendApplication> {
    Ok(StipendApplication {
        id: r.get(0)?,
        student_name: r.get(1)?,
        class_name: r.get(2)?,
        roll: r.get(3)?,
        guardian_income_cents: r.get(4)?,
        reason: r.get(5)?,
        phone: r.get(6)?,
        status: r.get(7)?,
        submitted_at: r.get(8)?,
    })
}

fn list_rows<T>(
    conn: &Connection,
    kind: Kind,
    columns: &str,
    status: Option<Status>,
    page: PageRequest,
    map: fn(&Row<'_>) -> rusqlite::Result<T>,
) -> StoreResult<Page<T>> {
    let table = kind.table();
    let mut binds: Vec<Value> = Vec::new();
    let where_sql = match status {
        Some(s) => {
            binds.push(Value::Text(s.as_str().to_string()));
            "WHERE status = ?"
        }
        None => "",
    };
    let total = count(
        conn,
        &format!("SELECT COUNT(*) FROM {table} {where_sql}"),
        params_from_iter(binds.iter()),
    )?;
    binds.push(Value::Integer(page.limit()));
    binds.push(Value::Integer(page.offset()));
    let mut stmt = conn.prepare(&format!(
        "SELECT {columns} FROM {table} {where_sql}
         ORDER BY submitted_at DESC, id DESC
         LIMIT ? OFFSET ?"
    ))?;
    let items = stmt
        .query_map(params_from_iter(binds.iter()), map)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Page::new(items, total, page))
}

pub fn admissions_list(conn: &Connection, status: Option<Status>, page: PageRequest) -> StoreResult<Page<AdmissionApplication>> {
    list_rows(conn, Kind::Admission, ADMISSION_COLUMNS, status, page, row_to_admission)
}

pub fn admit_cards_list(conn: &Connection, status: Option<Status>, page: PageRequest) -> StoreResult<Page<AdmitCardApplication>> {
    list_rows(conn, Kind::AdmitCard, ADMIT_CARD_COLUMNS, status, page, row_to_admit_card)
}

pub fn stipends_list(conn: &Connection, status: Option<Status>, page: PageRequest) -> StoreResult<Page<StipendApplication>> {
    list_rows(conn, Kind::Stipend, STIPEND_COLUMNS, status, page, row_to_stipend)
}

pub fn admission_get(conn: &Connection, id: i64) -> StoreResult<AdmissionApplication> {
    conn.query_row(
        &format!("SELECT {ADMISSION_COLUMNS} FROM admission_applications WHERE id = ?"),
        [id],
        row_to_admission,
    )
    .optional()?
    .ok_or(StoreError::NotFound { entity: Kind::Admission.entity() })
}

pub fn admit_card_get(conn: &Connection, id: i64) -> StoreResult<AdmitCardApplication> {
    conn.query_row(
        &format!("SELECT {ADMIT_CARD_COLUMNS} FROM admit_card_applications WHERE id = ?"),
        [id],
        row_to_admit_card,
    )
    .optional()?
    .ok_or(StoreError::NotFound { entity: Kind::AdmitCard.entity() })
}

pub fn stipend_get(conn: &Connection, id: i64) -> StoreResult<StipendApplication> {
    conn.query_row(
        &format!("SELECT {STIPEND_COLUMNS} FROM stipend_applications WHERE id = ?"),
        [id],
        row_to_stipend,
    )
    .optional()?
    .ok_or(StoreError::NotFound { entity: Kind::Stipend.entity() })
}

pub fn admission_submit(conn: &Connection, input: &AdmissionInput) -> StoreResult<i64> {
    let (photo, mime) = split_blob(input.photo.as_ref());
    conn.execute(
        "INSERT INTO admission_applications(applicant_name, guardian_name, date_of_birth,
             desired_class, previous_school, phone, address, photo, photo_mime, submitted_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        params![
            input.applicant_name,
            input.guardian_name,
            input.date_of_birth,
            input.desired_class,
            input.previous_school,
            input.phone,
            input.address,
            photo,
            mime,
            now_rfc3339(),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn admit_card_submit(conn: &Connection, input: &AdmitCardInput) -> StoreResult<i64> {
    conn.execute(
        "INSERT INTO admit_card_applications(student_name, class_name, roll, exam_name, phone, submitted_at)
         VALUES(?, ?, ?, ?, ?, ?)",
        params![
            input.student_name,
            input.class_name,
            input.roll,
            input.exam_name,
            input.phone,
            now_rfc3339(),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn stipend_submit(conn: &Connection, input: &StipendInput) -> StoreResult<i64> {
    conn.execute(
        "INSERT INTO stipend_applications(student_name, class_name, roll, guardian_income_cents,
             reason, phone, submitted_at)
         VALUES(?, ?, ?, ?, ?, ?, ?)",
        params![
            input.student_name,
            input.class_name,
            input.roll,
            input.guardian_income_cents,
            input.reason,
            input.phone,
            now_rfc3339(),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn set_status(conn: &Connection, kind: Kind, id: i64, status: Status) -> StoreResult<()> {
    let changed = conn.execute(
        &format!("UPDATE {} SET status = ? WHERE id = ?", kind.table()),
        params![status.as_str(), id],
    )?;
    if changed == 0 {
        return Err(StoreError::NotFound { entity: kind.entity() });
    }
    Ok(())
}

pub fn delete(conn: &Connection, kind: Kind, id: i64) -> StoreResult<()> {
    let changed = conn.execute(&format!("DELETE FROM {} WHERE id = ?", kind.table()), [id])?;
    if changed == 0 {
        return Err(StoreError::NotFound { entity: kind.entity() });
    }
    Ok(())
}

pub fn admission_photo(conn: &Connection, id: i64) -> StoreResult<Option<Blob>> {
    super::media::blob_column(
        conn,
        "admission_applications",
        "photo",
        "photo_mime",
        None,
        id,
        Kind::Admission.entity(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_in_memory;

    #[test]
    fn status_parsing_is_case_insensitive() {
        assert_eq!(Status::parse(" Approved "), Some(Status::Approved));
        assert_eq!(Status::parse("done"), None);
    }

    #[test]
    fn submitted_applications_start_pending_and_filter_by_status() {
        let conn = open_in_memory().expect("open");
        let a = admit_card_submit(
            &conn,
            &AdmitCardInput {
                student_name: "Rahim".to_string(),
                class_name: "Ten".to_string(),
                roll: 4,
                exam_name: "SSC Test".to_string(),
                phone: "01700000000".to_string(),
            },
        )
        .expect("submit a");
        admit_card_submit(
            &conn,
            &AdmitCardInput {
                student_name: "Karim".to_string(),
                class_name: "Ten".to_string(),
                roll: 5,
                exam_name: "SSC Test".to_string(),
                phone: "01700000001".to_string(),
            },
        )
        .expect("submit b");
        assert_eq!(admit_card_get(&conn, a).expect("get").status, "pending");

        set_status(&conn, Kind::AdmitCard, a, Status::Approved).expect("approve");
        let approved =
            admit_cards_list(&conn, Some(Status::Approved), PageRequest::new(1, 10)).expect("list");
        assert_eq!(approved.total, 1);
        assert_eq!(approved.items[0].student_name, "Rahim");
    }

    #[test]
    fn set_status_on_missing_row_names_the_kind() {
        let conn = open_in_memory().expect("open");
        let err = set_status(&conn, Kind::Stipend, 3, Status::Rejected).expect_err("missing");
        assert_eq!(err.to_string(), "stipend application not found");
    }
}
