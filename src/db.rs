use anyhow::Context;
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

use crate::store::StoreError;

pub const DB_FILE_NAME: &str = "school.sqlite3";

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS students(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        class_name TEXT NOT NULL,
        section TEXT NOT NULL DEFAULT '',
        roll INTEGER NOT NULL,
        gender TEXT,
        guardian_name TEXT,
        phone TEXT,
        address TEXT,
        date_of_birth TEXT,
        admission_year INTEGER,
        photo BLOB,
        photo_mime TEXT,
        created_at TEXT NOT NULL,
        UNIQUE(class_name, section, roll)
    )",
    "CREATE INDEX IF NOT EXISTS idx_students_class ON students(class_name, section, roll)",
    "CREATE TABLE IF NOT EXISTS teachers(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        designation TEXT NOT NULL,
        subject TEXT,
        phone TEXT,
        email TEXT,
        joined_on TEXT,
        photo BLOB,
        photo_mime TEXT,
        sort_order INTEGER NOT NULL DEFAULT 0
    )",
    "CREATE TABLE IF NOT EXISTS staff(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        designation TEXT NOT NULL,
        phone TEXT,
        photo BLOB,
        photo_mime TEXT,
        sort_order INTEGER NOT NULL DEFAULT 0
    )",
    "CREATE TABLE IF NOT EXISTS notices(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        title TEXT NOT NULL,
        body TEXT NOT NULL DEFAULT '',
        published_on TEXT NOT NULL,
        is_marquee INTEGER NOT NULL DEFAULT 0,
        attachment BLOB,
        attachment_name TEXT,
        attachment_mime TEXT,
        created_at TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_notices_published ON notices(published_on DESC, id DESC)",
    "CREATE TABLE IF NOT EXISTS routines(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        class_name TEXT NOT NULL UNIQUE,
        title TEXT NOT NULL,
        file BLOB NOT NULL,
        file_name TEXT NOT NULL,
        file_mime TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS exam_routines(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        exam_name TEXT NOT NULL,
        class_name TEXT NOT NULL,
        year INTEGER NOT NULL,
        file BLOB NOT NULL,
        file_name TEXT NOT NULL,
        file_mime TEXT NOT NULL,
        published_on TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS fee_types(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE,
        amount_cents INTEGER NOT NULL,
        description TEXT
    )",
    "CREATE TABLE IF NOT EXISTS fee_collections(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        student_id INTEGER NOT NULL,
        fee_type_id INTEGER NOT NULL,
        amount_cents INTEGER NOT NULL,
        paid_on TEXT NOT NULL,
        receipt_no TEXT UNIQUE,
        note TEXT,
        FOREIGN KEY(student_id) REFERENCES students(id) ON DELETE CASCADE,
        FOREIGN KEY(fee_type_id) REFERENCES fee_types(id) ON DELETE CASCADE
    )",
    "CREATE INDEX IF NOT EXISTS idx_fee_collections_student ON fee_collections(student_id)",
    "CREATE INDEX IF NOT EXISTS idx_fee_collections_paid_on ON fee_collections(paid_on)",
    // `RCPT-20240110-000042` for a payment on 2024-01-10 with row id 42.
    "CREATE TRIGGER IF NOT EXISTS fee_collections_receipt_no
     AFTER INSERT ON fee_collections
     WHEN NEW.receipt_no IS NULL
     BEGIN
        UPDATE fee_collections
        SET receipt_no = 'RCPT-' || replace(NEW.paid_on, '-', '') || '-' || printf('%06d', NEW.id)
        WHERE id = NEW.id;
     END",
    "CREATE TABLE IF NOT EXISTS admission_applications(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        applicant_name TEXT NOT NULL,
        guardian_name TEXT NOT NULL,
        date_of_birth TEXT NOT NULL,
        desired_class TEXT NOT NULL,
        previous_school TEXT,
        phone TEXT NOT NULL,
        address TEXT,
        photo BLOB,
        photo_mime TEXT,
        status TEXT NOT NULL DEFAULT 'pending'
            CHECK(status IN ('pending', 'approved', 'rejected')),
        submitted_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS admit_card_applications(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        student_name TEXT NOT NULL,
        class_name TEXT NOT NULL,
        roll INTEGER NOT NULL,
        exam_name TEXT NOT NULL,
        phone TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'pending'
            CHECK(status IN ('pending', 'approved', 'rejected')),
        submitted_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS stipend_applications(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        student_name TEXT NOT NULL,
        class_name TEXT NOT NULL,
        roll INTEGER NOT NULL,
        guardian_income_cents INTEGER NOT NULL,
        reason TEXT NOT NULL,
        phone TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'pending'
            CHECK(status IN ('pending', 'approved', 'rejected')),
        submitted_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS student_attendance(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        student_id INTEGER NOT NULL,
        attendance_date TEXT NOT NULL,
        status TEXT NOT NULL CHECK(status IN ('Present', 'Absent')),
        reason TEXT,
        FOREIGN KEY(student_id) REFERENCES students(id) ON DELETE CASCADE,
        UNIQUE(student_id, attendance_date)
    )",
    "CREATE INDEX IF NOT EXISTS idx_student_attendance_date ON student_attendance(attendance_date)",
    "CREATE TABLE IF NOT EXISTS nav_links(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        title TEXT NOT NULL,
        href TEXT,
        parent_id INTEGER,
        sort_order INTEGER NOT NULL DEFAULT 0,
        icon TEXT,
        FOREIGN KEY(parent_id) REFERENCES nav_links(id) ON DELETE CASCADE
    )",
    "CREATE INDEX IF NOT EXISTS idx_nav_links_parent ON nav_links(parent_id)",
    "CREATE TABLE IF NOT EXISTS admin_users(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        username TEXT NOT NULL UNIQUE,
        password_hash TEXT NOT NULL,
        role TEXT NOT NULL CHECK(role IN ('admin', 'moderator', 'visitor')),
        created_at TEXT NOT NULL,
        last_login_at TEXT
    )",
    "CREATE TABLE IF NOT EXISTS sidebar_widgets(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        title TEXT NOT NULL,
        kind TEXT NOT NULL CHECK(kind IN ('html', 'image', 'links')),
        content TEXT NOT NULL DEFAULT '',
        image BLOB,
        image_mime TEXT,
        sort_order INTEGER NOT NULL DEFAULT 0,
        is_active INTEGER NOT NULL DEFAULT 1
    )",
    "CREATE TABLE IF NOT EXISTS important_link_groups(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        title TEXT NOT NULL,
        sort_order INTEGER NOT NULL DEFAULT 0
    )",
    "CREATE TABLE IF NOT EXISTS important_links(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        group_id INTEGER NOT NULL,
        title TEXT NOT NULL,
        url TEXT NOT NULL,
        sort_order INTEGER NOT NULL DEFAULT 0,
        FOREIGN KEY(group_id) REFERENCES important_link_groups(id) ON DELETE CASCADE
    )",
    "CREATE INDEX IF NOT EXISTS idx_important_links_group ON important_links(group_id)",
    "CREATE TABLE IF NOT EXISTS gallery_images(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        caption TEXT NOT NULL DEFAULT '',
        image BLOB NOT NULL,
        image_mime TEXT NOT NULL,
        created_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS videos(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        title TEXT NOT NULL,
        url TEXT NOT NULL,
        sort_order INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS school_info(
        id INTEGER PRIMARY KEY AUTOINCREMENT CHECK(id = 1),
        name TEXT NOT NULL,
        code TEXT,
        address TEXT,
        phone TEXT,
        email TEXT,
        established_year INTEGER,
        about TEXT,
        principal_name TEXT,
        principal_message TEXT,
        principal_photo BLOB,
        principal_photo_mime TEXT,
        logo BLOB,
        logo_mime TEXT
    )",
    "CREATE TABLE IF NOT EXISTS site_settings(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        key TEXT NOT NULL UNIQUE,
        value TEXT NOT NULL
    )",
];

/// Open (creating if needed) the site database inside a workspace directory.
pub fn open_workspace(workspace: &Path) -> anyhow::Result<(Connection, PathBuf)> {
    std::fs::create_dir_all(workspace).with_context(|| {
        format!(
            "failed to create workspace {}",
            workspace.to_string_lossy()
        )
    })?;
    let db_path = workspace.join(DB_FILE_NAME);
    let conn = open_db(&db_path)?;
    Ok((conn, db_path))
}

pub fn open_db(db_path: &Path) -> anyhow::Result<Connection> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create directory {}", parent.to_string_lossy())
            })?;
        }
    }
    debug!(path = %db_path.display(), "opening database");
    let conn = Connection::open(db_path)
        .with_context(|| format!("failed to open database {}", db_path.to_string_lossy()))?;
    init_schema(&conn)?;
    Ok(conn)
}

#[cfg(test)]
pub fn open_in_memory() -> anyhow::Result<Connection> {
    let conn = Connection::open_in_memory().context("failed to open in-memory database")?;
    init_schema(&conn)?;
    Ok(conn)
}

fn init_schema(conn: &Connection) -> anyhow::Result<()> {
    conn.execute("PRAGMA foreign_keys = ON", [])?;
    conn.busy_timeout(Duration::from_millis(250))?;
    for statement in SCHEMA {
        conn.execute(statement, [])
            .with_context(|| format!("schema statement failed: {}", first_line(statement)))?;
    }
    Ok(())
}

fn first_line(sql: &str) -> &str {
    sql.lines().next().unwrap_or(sql)
}

/// Fixed-count, fixed-delay retry applied to read queries.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            delay: Duration::from_millis(50),
        }
    }
}

impl RetryPolicy {
    pub fn run<T>(&self, mut op: impl FnMut() -> Result<T, StoreError>) -> Result<T, StoreError> {
        let attempts = self.attempts.max(1);
        let mut attempt = 1;
        loop {
            match op() {
                Err(e) if e.is_transient() && attempt < attempts => {
                    warn!(attempt, error = %e, "transient database error, retrying");
                    std::thread::sleep(self.delay);
                    attempt += 1;
                }
                other => return other,
            }
        }
    }
}
