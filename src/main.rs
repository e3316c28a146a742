mod auth;
mod backup;
mod config;
mod db;
mod ipc;
mod logging;
mod pages;
mod store;
mod validate;

use std::io::{self, BufRead, Write};

use serde_json::json;
use tracing::{error, info, warn};

fn main() {
    logging::init_logging();

    let (config, problems) = config::Config::load();
    for problem in &problems {
        error!(error = %problem, "configuration problem; affected settings use defaults");
    }
    let db_path = config.database.path.clone();
    let mut state = ipc::AppState::new(config);

    match db_path {
        Some(path) => match db::open_db(&path) {
            Ok(conn) => {
                info!(path = %path.display(), "database attached");
                state.attach(conn, path);
            }
            Err(e) => error!(error = ?e, path = %path.display(), "failed to open database"),
        },
        None => warn!("no database configured; reads return empty results until workspace.select"),
    }

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    info!(version = env!("CARGO_PKG_VERSION"), "schoold ready");

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(e) => {
                error!(error = %e, "stdin read failed");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let resp = match serde_json::from_str::<ipc::Request>(&line) {
            Ok(req) => ipc::handle_request(&mut state, req),
            Err(e) => {
                // Can't reply without id; echo it when the line still has one.
                let id = serde_json::from_str::<serde_json::Value>(&line)
                    .ok()
                    .and_then(|v| v.get("id").and_then(|id| id.as_str()).map(str::to_string));
                warn!(error = %e, "malformed request line");
                json!({
                    "id": id,
                    "ok": false,
                    "error": { "code": "bad_json", "message": e.to_string() },
                })
            }
        };
        let _ = writeln!(
            stdout,
            "{}",
            serde_json::to_string(&resp).unwrap_or_else(|_| "{\"ok\":false}".to_string())
        );
        let _ = stdout.flush();
    }
    info!("stdin closed; shutting down");
}
