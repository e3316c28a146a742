use std::path::PathBuf;

use crate::auth::Permission;
use crate::backup;
use crate::db;
use crate::ipc::error::{HandlerErr, HandlerResult};
use crate::ipc::helpers::{authorize, conn, respond};
use crate::ipc::types::{AppState, Request};
use crate::validate::Form;
use serde_json::json;
use tracing::{error, info, warn};

fn path_param(req: &Request, key: &str) -> Result<PathBuf, HandlerErr> {
    let mut form = Form::new(&req.params);
    let raw = form.required_str(key, 4096);
    form.finish()?;
    Ok(PathBuf::from(raw))
}

fn io_failed(e: anyhow::Error, path: &std::path::Path) -> HandlerErr {
    warn!(error = ?e, path = %path.display(), "backup file operation failed");
    HandlerErr {
        code: "io_failed",
        message: format!("{e:#}"),
        details: Some(json!({ "path": path.to_string_lossy() })),
    }
}

fn export(state: &mut AppState, req: &Request) -> HandlerResult {
    let out_path = path_param(req, "outPath")?;
    conn(state)?;
    let actor = authorize(state, req, Permission::ManageBackups)?;
    let summary =
        backup::export_site_bundle(conn(state)?, &out_path).map_err(|e| io_failed(e, &out_path))?;
    info!(path = %out_path.display(), bytes = summary.db_bytes, by = actor.id, "site bundle exported");
    Ok(json!({
        "path": out_path.to_string_lossy(),
        "bundleFormat": summary.bundle_format,
        "dbSha256": summary.db_sha256,
        "dbBytes": summary.db_bytes,
    }))
}

/// Replace the attached database with a bundle's. Every session is dropped
/// afterwards since the accounts may differ.
fn import(state: &mut AppState, req: &Request) -> HandlerResult {
    let in_path = path_param(req, "inPath")?;
    conn(state)?;
    let actor = authorize(state, req, Permission::ManageBackups)?;
    if !in_path.is_file() {
        return Err(HandlerErr {
            code: "not_found",
            message: "bundle file not found".to_string(),
            details: Some(json!({ "path": in_path.to_string_lossy() })),
        });
    }
    let Some(db_path) = state.db_path.clone() else {
        return Err(HandlerErr::no_database());
    };

    // Release the file before it is replaced.
    state.db = None;
    let imported = backup::import_site_bundle(&in_path, &db_path);

    let reopened = match db::open_db(&db_path) {
        Ok(conn) => conn,
        Err(e) => {
            error!(error = ?e, path = %db_path.display(), "failed to reopen database after import");
            state.db_path = None;
            return Err(HandlerErr::new("db_open_failed", format!("{e:#}")));
        }
    };
    match imported {
        Ok(summary) => {
            state.attach(reopened, db_path.clone());
            info!(path = %in_path.display(), by = actor.id, "database replaced from bundle");
            Ok(json!({
                "bundleFormat": summary.bundle_format,
                "dbBytes": summary.db_bytes,
                "databasePath": db_path.to_string_lossy(),
            }))
        }
        Err(e) => {
            // The bundle was rejected before the file changed; keep serving it.
            state.db = Some(reopened);
            Err(io_failed(e, &in_path))
        }
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "backup.export" => export(state, req),
        "backup.import" => import(state, req),
        _ => return None,
    };
    Some(respond(req, result))
}
