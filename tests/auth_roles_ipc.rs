mod test_support;

use serde_json::json;
use test_support::{admin_sidecar, Sidecar, ADMIN_PASSWORD, ADMIN_USER};

#[test]
fn first_admin_bootstrap_happens_once() {
    let workspace = test_support::temp_dir("schoold-setup");
    let mut sc = Sidecar::spawn();
    sc.request_ok("workspace.select", json!({ "path": workspace.to_string_lossy() }));

    let status = sc.request_ok("setup.status", json!({}));
    assert_eq!(status, json!({ "databaseAttached": true, "hasAdmin": false }));

    let err = sc.request_err(
        "setup.createAdmin",
        json!({ "username": "head", "password": "short" }),
    );
    assert_eq!(err["code"], "validation_failed");
    assert!(err["details"]["fields"]["password"].is_array());

    let created = sc.request_ok(
        "setup.createAdmin",
        json!({ "username": ADMIN_USER, "password": ADMIN_PASSWORD }),
    );
    assert_eq!(created["role"], "admin");
    assert_eq!(sc.request_ok("setup.status", json!({}))["hasAdmin"], true);

    let err = sc.request_err(
        "setup.createAdmin",
        json!({ "username": "intruder", "password": "another-password" }),
    );
    assert_eq!(err["code"], "rejected");

    drop(sc);
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn login_issues_sessions_and_rejects_bad_credentials() {
    let (mut sc, workspace) = admin_sidecar("schoold-login");

    let err = sc.request_err(
        "auth.login",
        json!({ "username": ADMIN_USER, "password": "wrong-password" }),
    );
    assert_eq!(err["code"], "invalid_credentials");
    let err = sc.request_err(
        "auth.login",
        json!({ "username": "nobody", "password": ADMIN_PASSWORD }),
    );
    assert_eq!(err["code"], "invalid_credentials");

    // Usernames match case-insensitively.
    let token = sc.login("PRINCIPAL", ADMIN_PASSWORD);
    let me = sc.request_as(Some(&token), "auth.whoami", json!({}));
    assert_eq!(me["result"]["username"], ADMIN_USER);
    assert_eq!(me["result"]["role"], "admin");
    assert!(me["result"]["lastLoginAt"].is_string());
    assert!(me["result"].get("passwordHash").is_none());

    let out = sc.request_as(Some(&token), "auth.logout", json!({}));
    assert_eq!(out["result"]["signedOut"], true);
    let after = sc.request_as(Some(&token), "auth.whoami", json!({}));
    assert_eq!(after["error"]["code"], "unauthorized");

    let anonymous = sc.request_as(None, "students.list", json!({}));
    assert_eq!(anonymous["error"]["code"], "unauthorized");
    let forged = sc.request_as(Some("not-a-token"), "students.list", json!({}));
    assert_eq!(forged["error"]["code"], "unauthorized");

    drop(sc);
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn roles_gate_back_office_actions() {
    let (mut sc, workspace) = admin_sidecar("schoold-roles");

    sc.request_ok(
        "users.create",
        json!({ "username": "editor", "password": "editor-password", "role": "moderator" }),
    );
    sc.request_ok(
        "users.create",
        json!({ "username": "viewer", "password": "viewer-password", "role": "visitor" }),
    );
    let dup = sc.request_err(
        "users.create",
        json!({ "username": "Editor", "password": "editor-password", "role": "visitor" }),
    );
    assert_eq!(dup["code"], "duplicate");

    let moderator = sc.login("editor", "editor-password");
    let visitor = sc.login("viewer", "viewer-password");

    // Moderators manage content and records but not users or site settings.
    let notice = sc.request_as(
        Some(&moderator),
        "notices.create",
        json!({ "title": "Sports day", "publishedOn": "2024-03-01" }),
    );
    assert_eq!(notice["ok"], true);
    let student = sc.request_as(
        Some(&moderator),
        "students.create",
        json!({ "name": "Rahim", "className": "Six", "section": "A", "roll": 1 }),
    );
    assert_eq!(student["ok"], true);
    let users = sc.request_as(Some(&moderator), "users.list", json!({}));
    assert_eq!(users["error"]["code"], "forbidden");
    let setting = sc.request_as(
        Some(&moderator),
        "settings.set",
        json!({ "key": "footer_text", "value": "hello" }),
    );
    assert_eq!(setting["error"]["code"], "forbidden");

    // Visitors only read.
    let listed = sc.request_as(Some(&visitor), "students.list", json!({}));
    assert_eq!(listed["result"]["total"], 1);
    let write = sc.request_as(
        Some(&visitor),
        "students.create",
        json!({ "name": "Karim", "className": "Six", "section": "A", "roll": 2 }),
    );
    assert_eq!(write["error"]["code"], "forbidden");

    // Role changes apply to live sessions.
    let users = sc.request_ok("users.list", json!({}));
    let viewer_id = users
        .as_array()
        .expect("users array")
        .iter()
        .find(|u| u["username"] == "viewer")
        .and_then(|u| u["id"].as_i64())
        .expect("viewer id");
    sc.request_ok("users.updateRole", json!({ "id": viewer_id, "role": "moderator" }));
    let write = sc.request_as(
        Some(&visitor),
        "students.create",
        json!({ "name": "Karim", "className": "Six", "section": "A", "roll": 2 }),
    );
    assert_eq!(write["ok"], true);

    // Deleting a user ends their sessions.
    sc.request_ok("users.delete", json!({ "id": viewer_id }));
    let gone = sc.request_as(Some(&visitor), "auth.whoami", json!({}));
    assert_eq!(gone["error"]["code"], "unauthorized");

    drop(sc);
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn the_last_admin_is_protected() {
    let (mut sc, workspace) = admin_sidecar("schoold-last-admin");
    let me = sc.request_ok("auth.whoami", json!({}));
    let my_id = me["id"].as_i64().expect("id");

    let err = sc.request_err("users.delete", json!({ "id": my_id }));
    assert_eq!(err["code"], "rejected");
    let err = sc.request_err("users.updateRole", json!({ "id": my_id, "role": "visitor" }));
    assert_eq!(err["code"], "rejected");

    drop(sc);
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn changing_password_keeps_only_the_current_session() {
    let (mut sc, workspace) = admin_sidecar("schoold-change-password");
    let other = sc.login(ADMIN_USER, ADMIN_PASSWORD);

    let err = sc.request_err(
        "auth.changePassword",
        json!({ "currentPassword": "not-it-at-all", "newPassword": "brand-new-secret" }),
    );
    assert_eq!(err["code"], "validation_failed");
    assert!(err["details"]["fields"]["currentPassword"].is_array());

    sc.request_ok(
        "auth.changePassword",
        json!({ "currentPassword": ADMIN_PASSWORD, "newPassword": "brand-new-secret" }),
    );
    sc.request_ok("auth.whoami", json!({}));
    let stale = sc.request_as(Some(&other), "auth.whoami", json!({}));
    assert_eq!(stale["error"]["code"], "unauthorized");

    let err = sc.request_err(
        "auth.login",
        json!({ "username": ADMIN_USER, "password": ADMIN_PASSWORD }),
    );
    assert_eq!(err["code"], "invalid_credentials");
    sc.login(ADMIN_USER, "brand-new-secret");

    drop(sc);
    let _ = std::fs::remove_dir_all(workspace);
}
