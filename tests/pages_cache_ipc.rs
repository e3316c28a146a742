mod test_support;

use serde_json::json;
use test_support::admin_sidecar;

#[test]
fn public_pages_follow_content_writes() {
    let (mut sc, workspace) = admin_sidecar("schoold-pages");

    let before = sc.request_as(None, "pages.notices", json!({ "page": 1 }));
    assert_eq!(before["result"]["page"], "pages.notices");
    assert_eq!(before["result"]["content"]["total"], 0);

    let created = sc.request_ok(
        "notices.create",
        json!({ "title": "Exam schedule", "body": "See attached", "publishedOn": "2024-04-01" }),
    );
    let notice_id = created["id"].as_i64().expect("notice id");

    // The cached listing is dropped by the write.
    let after = sc.request_as(None, "pages.notices", json!({ "page": 1 }));
    let content = &after["result"]["content"];
    assert_eq!(content["total"], 1);
    assert_eq!(content["items"][0]["title"], "Exam schedule");
    assert!(content["items"][0]["attachment"].is_null());

    let home = sc.request_as(None, "pages.home", json!({}));
    assert_eq!(home["result"]["content"]["latestNotices"][0]["id"], notice_id);
    assert_eq!(home["result"]["layout"]["marquee"], json!([]));

    sc.request_ok(
        "notices.create",
        json!({ "title": "School closed Friday", "publishedOn": "2024-04-02", "isMarquee": true }),
    );
    // Marquee notices sit in the shared layout of every page.
    let about = sc.request_as(None, "pages.about", json!({}));
    assert_eq!(about["result"]["layout"]["marquee"][0]["title"], "School closed Friday");

    let one = sc.request_as(None, "pages.notice", json!({ "id": notice_id }));
    assert_eq!(one["result"]["content"]["title"], "Exam schedule");
    let missing = sc.request_as(None, "pages.notice", json!({ "id": 4040 }));
    assert_eq!(missing["error"]["code"], "not_found");

    let bad = sc.request_as(None, "pages.gallery", json!({ "page": 0 }));
    assert_eq!(bad["error"]["code"], "validation_failed");

    drop(sc);
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn admission_page_reflects_the_admission_setting() {
    let (mut sc, workspace) = admin_sidecar("schoold-pages-admission");

    let page = sc.request_as(None, "pages.admission", json!({}));
    assert_eq!(page["result"]["content"]["admissionOpen"], true);

    sc.request_ok("settings.set", json!({ "key": "admission_open", "value": false }));
    let page = sc.request_as(None, "pages.admission", json!({}));
    assert_eq!(page["result"]["content"]["admissionOpen"], false);
    assert_eq!(page["result"]["layout"]["settings"]["admission_open"], "false");

    drop(sc);
    let _ = std::fs::remove_dir_all(workspace);
}
