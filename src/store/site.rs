//! The single `school_info` row and free-form `site_settings`.

use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

use super::{optional_data_uri, Blob, StoreError, StoreResult};

const SCHOOL_ROW: i64 = 1;

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchoolInfo {
    pub name: String,
    pub code: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub established_year: Option<i64>,
    pub about: Option<String>,
    pub principal_name: Option<String>,
    pub principal_message: Option<String>,
    pub principal_photo: Option<String>,
    pub logo: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct SchoolInfoInput {
    pub name: String,
    pub code: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub established_year: Option<i64>,
    pub about: Option<String>,
    pub principal_name: Option<String>,
    pub principal_message: Option<String>,
    /// `None` keeps the stored image.
    pub principal_photo: Option<Blob>,
    pub logo: Option<Blob>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Setting {
    pub key: String,
    pub value: String,
}

/// `None` until the school has been configured.
pub fn school_info(conn: &Connection) -> StoreResult<Option<SchoolInfo>> {
    let info = conn
        .query_row(
            "SELECT name, code, address, phone, email, established_year, about,
                    principal_name, principal_message, principal_photo, principal_photo_mime,
                    logo, logo_mime
             FROM school_info WHERE id = ?",
            [SCHOOL_ROW],
            |r| {
                Ok(SchoolInfo {
                    name: r.get(0)?,
                    code: r.get(1)?,
                    address: r.get(2)?,
                    phone: r.get(3)?,
                    email: r.get(4)?,
                    established_year: r.get(5)?,
                    about: r.get(6)?,
                    principal_name: r.get(7)?,
                    principal_message: r.get(8)?,
                    principal_photo: optional_data_uri(r.get(9)?, r.get(10)?),
                    logo: optional_data_uri(r.get(11)?, r.get(12)?),
                })
            },
        )
        .optional()?;
    Ok(info)
}

pub fn save_school_info(conn: &Connection, input: &SchoolInfoInput) -> StoreResult<()> {
    let (photo, photo_mime) = super::students::split_blob(input.principal_photo.as_ref());
    let (logo, logo_mime) = super::students::split_blob(input.logo.as_ref());
    conn.execute(
        "INSERT INTO school_info(id, name, code, address, phone, email, established_year, about,
                                 principal_name, principal_message,
                                 principal_photo, principal_photo_mime, logo, logo_mime)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(id) DO UPDATE SET
           name = excluded.name,
           code = excluded.code,
           address = excluded.address,
           phone = excluded.phone,
           email = excluded.email,
           established_year = excluded.established_year,
           about = excluded.about,
           principal_name = excluded.principal_name,
           principal_message = excluded.principal_message,
           principal_photo = COALESCE(excluded.principal_photo, school_info.principal_photo),
           principal_photo_mime = COALESCE(excluded.principal_photo_mime, school_info.principal_photo_mime),
           logo = COALESCE(excluded.logo, school_info.logo),
           logo_mime = COALESCE(excluded.logo_mime, school_info.logo_mime)",
        params![
            SCHOOL_ROW,
            input.name,
            input.code,
            input.address,
            input.phone,
            input.email,
            input.established_year,
            input.about,
            input.principal_name,
            input.principal_message,
            photo,
            photo_mime,
            logo,
            logo_mime,
        ],
    )?;
    Ok(())
}

pub fn logo(conn: &Connection) -> StoreResult<Option<Blob>> {
    super::media::blob_column(conn, "school_info", "logo", "logo_mime", None, SCHOOL_ROW, "school info")
}

pub fn principal_photo(conn: &Connection) -> StoreResult<Option<Blob>> {
    super::media::blob_column(
        conn,
        "school_info",
        "principal_photo",
        "principal_photo_mime",
        None,
        SCHOOL_ROW,
        "school info",
    )
}

pub fn settings_list(conn: &Connection) -> StoreResult<Vec<Setting>> {
    let mut stmt = conn.prepare("SELECT key, value FROM site_settings ORDER BY key")?;
    let rows = stmt
        .query_map([], |r| {
            Ok(Setting {
                key: r.get(0)?,
                value: r.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn setting(conn: &Connection, key: &str) -> StoreResult<Option<String>> {
    Ok(conn
        .query_row("SELECT value FROM site_settings WHERE key = ?", [key], |r| r.get(0))
        .optional()?)
}

/// Admissions are open unless the `admission_open` setting says otherwise.
pub fn admission_open(conn: &Connection) -> StoreResult<bool> {
    Ok(setting(conn, "admission_open")?
        .map(|v| !matches!(v.trim().to_ascii_lowercase().as_str(), "false" | "0" | "no"))
        .unwrap_or(true))
}

pub fn set_setting(conn: &Connection, key: &str, value: &str) -> StoreResult<()> {
    conn.execute(
        "INSERT INTO site_settings(key, value) VALUES(?, ?)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        params![key, value],
    )?;
    Ok(())
}

pub fn delete_setting(conn: &Connection, key: &str) -> StoreResult<()> {
    if conn.execute("DELETE FROM site_settings WHERE key = ?", [key])? == 0 {
        return Err(StoreError::NotFound { entity: "setting" });
    }
    Ok(())
}
