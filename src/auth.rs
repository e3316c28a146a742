//! Password hashing, role permissions and in-memory sessions.

use argon2::password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use tracing::debug;

use crate::store::users::Role;

pub const MIN_PASSWORD_LEN: usize = 8;

pub fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("failed to hash password: {e}"))?;
    Ok(hash.to_string())
}

/// A malformed stored hash verifies as false.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored_hash) else {
        debug!("stored password hash is not a PHC string");
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    /// Back-office lists and detail views.
    ReadRecords,
    /// Notices, routines, media, widgets, navigation, applications.
    ManageContent,
    /// Students, fees, attendance.
    ManageRecords,
    ManageUsers,
    /// School info and site settings.
    ManageSite,
    ManageBackups,
}

impl Permission {
    pub fn granted_to(self, role: Role) -> bool {
        match role {
            Role::Admin => true,
            Role::Moderator => matches!(
                self,
                Permission::ReadRecords | Permission::ManageContent | Permission::ManageRecords
            ),
            Role::Visitor => self == Permission::ReadRecords,
        }
    }
}

#[derive(Debug, Clone)]
struct Session {
    user_id: i64,
    expires_at: DateTime<Utc>,
}

/// Opaque uuid tokens mapped to user ids. Sessions die with the process.
pub struct SessionStore {
    ttl: Duration,
    sessions: HashMap<String, Session>,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            sessions: HashMap::new(),
        }
    }

    pub fn issue(&mut self, user_id: i64) -> (String, DateTime<Utc>) {
        self.issue_at(user_id, Utc::now())
    }

    fn issue_at(&mut self, user_id: i64, now: DateTime<Utc>) -> (String, DateTime<Utc>) {
        self.purge_expired(now);
        let token = uuid::Uuid::new_v4().to_string();
        let expires_at = now + self.ttl;
        self.sessions.insert(
            token.clone(),
            Session {
                user_id,
                expires_at,
            },
        );
        (token, expires_at)
    }

    /// The user id behind a live token. Expired tokens are dropped.
    pub fn resolve(&mut self, token: &str) -> Option<i64> {
        self.resolve_at(token, Utc::now())
    }

    fn resolve_at(&mut self, token: &str, now: DateTime<Utc>) -> Option<i64> {
        let session = self.sessions.get(token)?;
        if session.expires_at <= now {
            self.sessions.remove(token);
            return None;
        }
        Some(session.user_id)
    }

    pub fn revoke(&mut self, token: &str) -> bool {
        self.sessions.remove(token).is_some()
    }

    /// Drop every session of a user except `keep`.
    pub fn revoke_user(&mut self, user_id: i64, keep: Option<&str>) {
        self.sessions
            .retain(|token, s| s.user_id != user_id || Some(token.as_str()) == keep);
    }

    /// Forget everything, e.g. after the database is swapped.
    pub fn clear(&mut self) {
        self.sessions.clear();
    }

    fn purge_expired(&mut self, now: DateTime<Utc>) {
        self.sessions.retain(|_, s| s.expires_at > now);
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.sessions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_round_trip_and_rejects_wrong_password() {
        let hash = hash_password("correct horse").expect("hash");
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("correct horse", &hash));
        assert!(!verify_password("wrong horse", &hash));
        assert!(!verify_password("correct horse", "plain-text"));
    }

    #[test]
    fn moderators_cannot_touch_users_or_site() {
        assert!(Permission::ManageContent.granted_to(Role::Moderator));
        assert!(Permission::ManageRecords.granted_to(Role::Moderator));
        assert!(!Permission::ManageUsers.granted_to(Role::Moderator));
        assert!(!Permission::ManageSite.granted_to(Role::Moderator));
        assert!(!Permission::ManageBackups.granted_to(Role::Moderator));
        assert!(Permission::ReadRecords.granted_to(Role::Visitor));
        assert!(!Permission::ManageContent.granted_to(Role::Visitor));
        assert!(Permission::ManageBackups.granted_to(Role::Admin));
    }

    #[test]
    fn sessions_expire_after_ttl() {
        let mut store = SessionStore::new(Duration::minutes(30));
        let start = Utc::now();
        let (token, expires_at) = store.issue_at(7, start);
        assert_eq!(expires_at, start + Duration::minutes(30));
        assert_eq!(store.resolve_at(&token, start + Duration::minutes(29)), Some(7));
        assert_eq!(store.resolve_at(&token, start + Duration::minutes(30)), None);
        assert_eq!(store.resolve_at(&token, start), None);
    }

    #[test]
    fn revoke_user_keeps_current_token() {
        let mut store = SessionStore::new(Duration::minutes(30));
        let (a, _) = store.issue(1);
        let (b, _) = store.issue(1);
        let (c, _) = store.issue(2);
        store.revoke_user(1, Some(&a));
        assert_eq!(store.resolve(&a), Some(1));
        assert_eq!(store.resolve(&b), None);
        assert_eq!(store.resolve(&c), Some(2));
        assert!(store.revoke(&c));
        assert_eq!(store.len(), 1);
    }
}
