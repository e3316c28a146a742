//! Back-office accounts. Passwords arrive here already hashed.

use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use super::{now_rfc3339, on, StoreError, StoreResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Moderator,
    Visitor,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Moderator => "moderator",
            Role::Visitor => "visitor",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "admin" => Some(Role::Admin),
            "moderator" => Some(Role::Moderator),
            "visitor" => Some(Role::Visitor),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub username: String,
    pub role: Role,
    pub created_at: String,
    pub last_login_at: Option<String>,
    #[serde(skip)]
    pub password_hash: String,
}

fn row_to_user(r: &Row<'_>) -> rusqlite::Result<User> {
    let role: String = r.get(2)?;
    Ok(User {
        id: r.get(0)?,
        username: r.get(1)?,
        // The CHECK constraint keeps unknown roles out; fall back to the weakest.
        role: Role::parse(&role).unwrap_or(Role::Visitor),
        created_at: r.get(3)?,
        last_login_at: r.get(4)?,
        password_hash: r.get(5)?,
    })
}

const USER_COLUMNS: &str = "id, username, role, created_at, last_login_at, password_hash";

pub fn list(conn: &Connection) -> StoreResult<Vec<User>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {USER_COLUMNS} FROM admin_users ORDER BY username"
    ))?;
    let rows = stmt
        .query_map([], row_to_user)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn get(conn: &Connection, id: i64) -> StoreResult<User> {
    conn.query_row(
        &format!("SELECT {USER_COLUMNS} FROM admin_users WHERE id = ?"),
        [id],
        row_to_user,
    )
    .optional()?
    .ok_or(StoreError::NotFound { entity: "user" })
}

/// Usernames compare case-insensitively.
pub fn by_username(conn: &Connection, username: &str) -> StoreResult<Option<User>> {
    Ok(conn
        .query_row(
            &format!("SELECT {USER_COLUMNS} FROM admin_users WHERE lower(username) = lower(?)"),
            [username.trim()],
            row_to_user,
        )
        .optional()?)
}

pub fn create(conn: &Connection, username: &str, password_hash: &str, role: Role) -> StoreResult<i64> {
    if by_username(conn, username)?.is_some() {
        return Err(StoreError::Duplicate { entity: "user with this username" });
    }
    conn.execute(
        "INSERT INTO admin_users(username, password_hash, role, created_at) VALUES(?, ?, ?, ?)",
        params![username.trim(), password_hash, role.as_str(), now_rfc3339()],
    )
    .map_err(on("user with this username"))?;
    Ok(conn.last_insert_rowid())
}

pub fn count_admins(conn: &Connection) -> StoreResult<i64> {
    super::count(conn, "SELECT COUNT(*) FROM admin_users WHERE role = 'admin'", [])
}

pub fn count(conn: &Connection) -> StoreResult<i64> {
    super::count(conn, "SELECT COUNT(*) FROM admin_users", [])
}

/// Demoting the last admin is refused.
pub fn set_role(conn: &Connection, id: i64, role: Role) -> StoreResult<()> {
    let user = get(conn, id)?;
    if user.role == Role::Admin && role != Role::Admin && count_admins(conn)? <= 1 {
        return Err(StoreError::Rejected("the last admin cannot be demoted".to_string()));
    }
    conn.execute(
        "UPDATE admin_users SET role = ? WHERE id = ?",
        params![role.as_str(), id],
    )?;
    Ok(())
}

pub fn set_password_hash(conn: &Connection, id: i64, password_hash: &str) -> StoreResult<()> {
    let changed = conn.execute(
        "UPDATE admin_users SET password_hash = ? WHERE id = ?",
        params![password_hash, id],
    )?;
    if changed == 0 {
        return Err(StoreError::NotFound { entity: "user" });
    }
    Ok(())
}

pub fn touch_last_login(conn: &Connection, id: i64) -> StoreResult<()> {
    conn.execute(
        "UPDATE admin_users SET last_login_at = ? WHERE id = ?",
        params![now_rfc3339(), id],
    )?;
    Ok(())
}

/// `acting_user` cannot delete themselves, and the last admin stays.
pub fn delete(conn: &Connection, id: i64, acting_user: i64) -> StoreResult<()> {
    if id == acting_user {
        return Err(StoreError::Rejected("you cannot delete your own account".to_string()));
    }
    let user = get(conn, id)?;
    if user.role == Role::Admin && count_admins(conn)? <= 1 {
        return Err(StoreError::Rejected("the last admin cannot be deleted".to_string()));
    }
    conn.execute("DELETE FROM admin_users WHERE id = ?", [id])?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_in_memory;

    #[test]
    fn usernames_are_unique_case_insensitively() {
        let conn = open_in_memory().expect("open");
        create(&conn, "Head", "hash", Role::Admin).expect("first");
        let err = create(&conn, "head ", "hash", Role::Moderator).expect_err("dup");
        assert!(matches!(err, StoreError::Duplicate { .. }));
        assert_eq!(by_username(&conn, "HEAD").expect("lookup").map(|u| u.role), Some(Role::Admin));
    }

    #[test]
    fn last_admin_is_protected() {
        let conn = open_in_memory().expect("open");
        let admin = create(&conn, "admin", "hash", Role::Admin).expect("admin");
        let moderator = create(&conn, "mod", "hash", Role::Moderator).expect("mod");

        assert!(matches!(
            set_role(&conn, admin, Role::Visitor),
            Err(StoreError::Rejected(_))
        ));
        assert!(matches!(
            delete(&conn, admin, moderator),
            Err(StoreError::Rejected(_))
        ));
        assert!(matches!(delete(&conn, admin, admin), Err(StoreError::Rejected(_))));

        set_role(&conn, moderator, Role::Admin).expect("promote");
        delete(&conn, admin, moderator).expect("delete former admin");
        assert_eq!(count_admins(&conn).expect("count"), 1);
    }

    #[test]
    fn password_hash_is_not_serialized() {
        let conn = open_in_memory().expect("open");
        let id = create(&conn, "admin", "$argon2id$secret", Role::Admin).expect("admin");
        touch_last_login(&conn, id).expect("touch");
        let user = get(&conn, id).expect("get");
        assert!(user.last_login_at.is_some());
        let json = serde_json::to_value(&user).expect("json");
        assert!(json.get("passwordHash").is_none());
        assert_eq!(json["role"], "admin");
    }
}
