use std::path::PathBuf;

use rusqlite::Connection;
use serde::Deserialize;

use crate::auth::SessionStore;
use crate::config::Config;
use crate::db::RetryPolicy;
use crate::pages::PageCache;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
    /// Session token from `auth.login`; back-office methods require it.
    #[serde(default)]
    pub session: Option<String>,
}

pub struct AppState {
    pub config: Config,
    pub db: Option<Connection>,
    pub db_path: Option<PathBuf>,
    pub retry: RetryPolicy,
    pub sessions: SessionStore,
    pub pages: PageCache,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let retry = RetryPolicy {
            attempts: config.database.retry_attempts,
            delay: config.retry_delay(),
        };
        let sessions = SessionStore::new(config.session_ttl());
        let pages = PageCache::new(config.cache_ttl(), config.pages.cache_max_entries);
        Self {
            config,
            db: None,
            db_path: None,
            retry,
            sessions,
            pages,
        }
    }

    /// Swap in a database. Sessions and cached pages belong to the old one.
    pub fn attach(&mut self, conn: Connection, path: PathBuf) {
        self.db = Some(conn);
        self.db_path = Some(path);
        self.sessions.clear();
        self.pages.clear();
    }
}
