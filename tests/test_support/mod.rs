#![allow(dead_code)]

use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

pub const ADMIN_USER: &str = "principal";
pub const ADMIN_PASSWORD: &str = "correct-horse-battery";

pub fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

/// One running daemon plus its pipes. Request ids are generated.
pub struct Sidecar {
    child: Child,
    stdin: Option<ChildStdin>,
    reader: BufReader<ChildStdout>,
    next_id: u64,
    pub session: Option<String>,
}

impl Sidecar {
    /// Start without a database; `workspace.select` attaches one.
    pub fn spawn() -> Self {
        Self::spawn_with_env(&[])
    }

    pub fn spawn_with_database(db_path: &Path) -> Self {
        let path = db_path.to_string_lossy().to_string();
        Self::spawn_with_env(&[("SCHOOLD_DATABASE__PATH", path.as_str())])
    }

    pub fn spawn_with_env(vars: &[(&str, &str)]) -> Self {
        let exe = env!("CARGO_BIN_EXE_schoold");
        let cwd = temp_dir("schoold-cwd");
        let mut cmd = Command::new(exe);
        cmd.current_dir(&cwd)
            .env_remove("SCHOOLD_DATABASE__PATH")
            .env("SCHOOLD_CONFIG", cwd.join("absent.toml"))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null());
        for (k, v) in vars {
            cmd.env(k, v);
        }
        let mut child = cmd.spawn().expect("spawn schoold");
        let stdin = child.stdin.take().expect("child stdin");
        let stdout = child.stdout.take().expect("child stdout");
        Self {
            child,
            stdin: Some(stdin),
            reader: BufReader::new(stdout),
            next_id: 0,
            session: None,
        }
    }

    pub fn send_raw(&mut self, line: &str) -> serde_json::Value {
        let stdin = self.stdin.as_mut().expect("stdin open");
        writeln!(stdin, "{}", line).expect("write request");
        stdin.flush().expect("flush request");

        let mut out = String::new();
        self.reader.read_line(&mut out).expect("read response line");
        assert!(!out.trim().is_empty(), "empty response for {}", line);
        serde_json::from_str(out.trim()).expect("parse response json")
    }

    /// Send with the current session (if any) and return the whole response.
    pub fn request(&mut self, method: &str, params: serde_json::Value) -> serde_json::Value {
        let session = self.session.clone();
        self.request_as(session.as_deref(), method, params)
    }

    pub fn request_as(
        &mut self,
        session: Option<&str>,
        method: &str,
        params: serde_json::Value,
    ) -> serde_json::Value {
        self.next_id += 1;
        let id = self.next_id.to_string();
        let mut payload = json!({
            "id": id,
            "method": method,
            "params": params,
        });
        if let Some(token) = session {
            payload["session"] = json!(token);
        }
        let value = self.send_raw(&payload.to_string());
        assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id.as_str()));
        value
    }

    pub fn request_ok(&mut self, method: &str, params: serde_json::Value) -> serde_json::Value {
        let value = self.request(method, params);
        assert_eq!(
            value.get("ok").and_then(|v| v.as_bool()),
            Some(true),
            "{} failed: {}",
            method,
            value
        );
        value.get("result").cloned().unwrap_or(serde_json::Value::Null)
    }

    /// The error code of a response that must have failed.
    pub fn request_err(&mut self, method: &str, params: serde_json::Value) -> serde_json::Value {
        let value = self.request(method, params);
        assert_eq!(
            value.get("ok").and_then(|v| v.as_bool()),
            Some(false),
            "{} unexpectedly succeeded: {}",
            method,
            value
        );
        value.get("error").cloned().expect("error object")
    }

    pub fn login(&mut self, username: &str, password: &str) -> String {
        let result = self.request_ok(
            "auth.login",
            json!({ "username": username, "password": password }),
        );
        result
            .get("session")
            .and_then(|v| v.as_str())
            .expect("session token")
            .to_string()
    }
}

impl Drop for Sidecar {
    fn drop(&mut self) {
        drop(self.stdin.take());
        let _ = self.child.wait();
    }
}

/// Attach a fresh workspace, create the first admin and sign in as them.
pub fn admin_sidecar(prefix: &str) -> (Sidecar, PathBuf) {
    let workspace = temp_dir(prefix);
    let mut sc = Sidecar::spawn();
    sc.request_ok(
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    sc.request_ok(
        "setup.createAdmin",
        json!({ "username": ADMIN_USER, "password": ADMIN_PASSWORD }),
    );
    let token = sc.login(ADMIN_USER, ADMIN_PASSWORD);
    sc.session = Some(token);
    (sc, workspace)
}

pub fn upload(file_name: &str, content_type: &str, bytes: &[u8]) -> serde_json::Value {
    use base64::Engine;
    json!({
        "fileName": file_name,
        "contentType": content_type,
        "dataBase64": base64::engine::general_purpose::STANDARD.encode(bytes),
    })
}

/// A 1x1 PNG.
pub const PNG_PIXEL: &[u8] = &[
    0x89, 0x50, 0x4e, 0x47, 0x0d, 0x0a, 0x1a, 0x0a, 0x00, 0x00, 0x00, 0x0d, 0x49, 0x48, 0x44,
    0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1f,
    0x15, 0xc4, 0x89, 0x00, 0x00, 0x00, 0x0a, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9c, 0x63, 0x00,
    0x01, 0x00, 0x00, 0x05, 0x00, 0x01, 0x0d, 0x0a, 0x2d, 0xb4, 0x00, 0x00, 0x00, 0x00, 0x49,
    0x45, 0x4e, 0x44, 0xae, 0x42, 0x60, 0x82,
];
