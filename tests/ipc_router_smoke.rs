mod test_support;

use serde_json::json;
use test_support::{admin_sidecar, Sidecar};

#[test]
fn router_dispatch_smoke_covers_handler_families() {
    let (mut sc, workspace) = admin_sidecar("schoold-router-smoke");
    let bundle_out = workspace.join("smoke-backup.zip");

    let methods: Vec<(&str, serde_json::Value)> = vec![
        ("health", json!({})),
        ("setup.status", json!({})),
        ("auth.whoami", json!({})),
        ("users.list", json!({})),
        ("students.list", json!({})),
        ("students.classes", json!({})),
        ("students.get", json!({ "id": 999 })),
        ("attendance.get", json!({ "date": "2024-01-10", "className": "Six" })),
        ("attendance.monthSummary", json!({ "month": "2024-01", "className": "Six" })),
        ("feeTypes.list", json!({})),
        ("feeCollections.list", json!({})),
        ("feeCollections.summary", json!({})),
        ("teachers.list", json!({})),
        ("staff.list", json!({})),
        ("notices.list", json!({})),
        ("routines.list", json!({})),
        ("examRoutines.list", json!({})),
        ("applications.list", json!({ "kind": "admission" })),
        ("nav.tree", json!({})),
        ("nav.list", json!({})),
        ("widgets.list", json!({})),
        ("linkGroups.list", json!({})),
        ("gallery.list", json!({})),
        ("videos.list", json!({})),
        ("school.get", json!({})),
        ("settings.list", json!({})),
        ("pages.home", json!({})),
        ("pages.notices", json!({ "page": 1 })),
        ("pages.teachers", json!({})),
        ("pages.staff", json!({})),
        ("pages.routines", json!({})),
        ("pages.examRoutines", json!({})),
        ("pages.admission", json!({})),
        ("pages.gallery", json!({})),
        ("pages.videos", json!({})),
        ("pages.about", json!({})),
        ("assets.download", json!({ "kind": "school-logo" })),
        ("backup.export", json!({ "outPath": bundle_out.to_string_lossy() })),
    ];
    for (method, params) in methods {
        let value = sc.request(method, params);
        if value.get("ok").and_then(|v| v.as_bool()) == Some(false) {
            let code = value["error"]["code"].as_str().unwrap_or("unknown");
            assert_ne!(code, "not_implemented", "unexpected unknown method for {}", method);
            assert_ne!(code, "internal", "internal error for {}: {}", method, value);
        }
    }

    drop(sc);
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn unknown_methods_and_bad_lines_get_error_replies() {
    let mut sc = Sidecar::spawn();

    let err = sc.request_err("grades.compute", json!({}));
    assert_eq!(err["code"], "not_implemented");
    assert_eq!(err["message"], "unknown method: grades.compute");

    let reply = sc.send_raw("{not json");
    assert_eq!(reply["ok"], false);
    assert_eq!(reply["error"]["code"], "bad_json");
    assert!(reply["id"].is_null());

    // A line that parses as JSON but is not a request still echoes its id.
    let reply = sc.send_raw(r#"{"id":"x1","params":{}}"#);
    assert_eq!(reply["id"], "x1");
    assert_eq!(reply["error"]["code"], "bad_json");

    // The loop keeps serving after malformed input.
    let health = sc.request_ok("health", json!({}));
    assert!(health["databasePath"].is_null());
    assert!(health["version"].is_string());
}
