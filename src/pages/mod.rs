//! Public page models.
//!
//! Every page is a JSON document with a `layout` block shared by the whole
//! site and a page-specific `content` block. Images are inlined as data URIs;
//! documents are referenced by download descriptors for `assets.download`.

mod cache;

pub use cache::{Invalidation, PageCache};

use rusqlite::Connection;
use serde_json::{json, Map, Value};

use crate::config::PagesConfig;
use crate::store::notices::Notice;
use crate::store::{media, nav_links, notices, people, routines, site, students, widgets};
use crate::store::{PageRequest, StoreResult};
use crate::validate::IMAGE_MIMES;

pub const HOME: &str = "pages.home";
pub const NOTICES: &str = "pages.notices";
pub const NOTICE: &str = "pages.notice";
pub const TEACHERS: &str = "pages.teachers";
pub const STAFF: &str = "pages.staff";
pub const ROUTINES: &str = "pages.routines";
pub const EXAM_ROUTINES: &str = "pages.examRoutines";
pub const ADMISSION: &str = "pages.admission";
pub const GALLERY: &str = "pages.gallery";
pub const VIDEOS: &str = "pages.videos";
pub const ABOUT: &str = "pages.about";

/// Cache key for a page with an argument, e.g. `pages.notices:2`.
pub fn key(page: &str, arg: impl std::fmt::Display) -> String {
    format!("{page}:{arg}")
}

fn model(page: &str, layout: Value, content: Value) -> Value {
    json!({
        "page": page,
        "layout": layout,
        "content": content,
    })
}

/// The model served when no database is attached.
pub fn empty(page: &str) -> Value {
    model(
        page,
        json!({
            "school": Value::Null,
            "nav": [],
            "marquee": [],
            "widgets": [],
            "linkGroups": [],
            "settings": {},
        }),
        Value::Null,
    )
}

pub fn download(kind: &str, id: i64, file_name: Option<&str>) -> Value {
    json!({
        "kind": kind,
        "id": id,
        "fileName": file_name,
    })
}

fn to_value<T: serde::Serialize>(value: T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

pub fn layout(conn: &Connection) -> StoreResult<Value> {
    let school = site::school_info(conn)?.map(|info| {
        json!({
            "name": info.name,
            "code": info.code,
            "address": info.address,
            "phone": info.phone,
            "email": info.email,
            "establishedYear": info.established_year,
            "logo": info.logo,
        })
    });
    let marquee: Vec<Value> = notices::marquee(conn)?
        .into_iter()
        .map(|n| json!({ "id": n.id, "title": n.title, "publishedOn": n.published_on }))
        .collect();
    let settings: Map<String, Value> = site::settings_list(conn)?
        .into_iter()
        .map(|s| (s.key, Value::String(s.value)))
        .collect();
    Ok(json!({
        "school": school,
        "nav": nav_links::tree(conn),
        "marquee": marquee,
        "widgets": to_value(widgets::list(conn, true)?),
        "linkGroups": to_value(widgets::link_groups(conn)?),
        "settings": settings,
    }))
}

fn notice_json(notice: Notice) -> Value {
    let attachment = notice
        .attachment_mime
        .is_some()
        .then(|| download("notice-attachment", notice.id, notice.attachment_name.as_deref()));
    let mut value = to_value(&notice);
    if let Some(obj) = value.as_object_mut() {
        obj.remove("attachmentName");
        obj.remove("attachmentMime");
        obj.insert("attachment".to_string(), attachment.unwrap_or(Value::Null));
    }
    value
}

pub fn home(conn: &Connection, cfg: &PagesConfig) -> StoreResult<Value> {
    let info = site::school_info(conn)?.unwrap_or_default();
    let latest: Vec<Value> = notices::latest(conn, cfg.home_notice_count)?
        .into_iter()
        .map(notice_json)
        .collect();
    let gallery = media::gallery_list(conn, PageRequest::new(1, 6))?;
    Ok(model(
        HOME,
        layout(conn)?,
        json!({
            "latestNotices": latest,
            "principal": {
                "name": info.principal_name,
                "message": info.principal_message,
                "photo": info.principal_photo,
            },
            "about": info.about,
            "gallery": to_value(gallery.items),
        }),
    ))
}

pub fn notices(conn: &Connection, cfg: &PagesConfig, page: u32) -> StoreResult<Value> {
    let listing = notices::list(conn, None, PageRequest::new(page, cfg.page_size))?;
    let items: Vec<Value> = listing.items.into_iter().map(notice_json).collect();
    Ok(model(
        NOTICES,
        layout(conn)?,
        json!({
            "items": items,
            "total": listing.total,
            "page": listing.page,
            "pageSize": listing.page_size,
            "totalPages": listing.total_pages,
        }),
    ))
}

pub fn notice(conn: &Connection, id: i64) -> StoreResult<Value> {
    let notice = notices::get(conn, id)?;
    Ok(model(NOTICE, layout(conn)?, notice_json(notice)))
}

pub fn teachers(conn: &Connection) -> StoreResult<Value> {
    let teachers = people::teachers_list(conn)?;
    Ok(model(TEACHERS, layout(conn)?, json!({ "teachers": to_value(teachers) })))
}

pub fn staff(conn: &Connection) -> StoreResult<Value> {
    let staff = people::staff_list(conn)?;
    Ok(model(STAFF, layout(conn)?, json!({ "staff": to_value(staff) })))
}

pub fn routines(conn: &Connection) -> StoreResult<Value> {
    let items: Vec<Value> = routines::list(conn)?
        .into_iter()
        .map(|r| {
            json!({
                "id": r.id,
                "className": r.class_name,
                "title": r.title,
                "updatedAt": r.updated_at,
                "file": download("routine", r.id, Some(&r.file_name)),
            })
        })
        .collect();
    Ok(model(ROUTINES, layout(conn)?, json!({ "routines": items })))
}

pub fn exam_routines(conn: &Connection) -> StoreResult<Value> {
    let items: Vec<Value> = routines::exam_list(conn)?
        .into_iter()
        .map(|r| {
            json!({
                "id": r.id,
                "examName": r.exam_name,
                "className": r.class_name,
                "year": r.year,
                "publishedOn": r.published_on,
                "file": download("exam-routine", r.id, Some(&r.file_name)),
            })
        })
        .collect();
    Ok(model(EXAM_ROUTINES, layout(conn)?, json!({ "examRoutines": items })))
}

pub fn admission(conn: &Connection, max_upload_bytes: usize) -> StoreResult<Value> {
    let open = site::admission_open(conn)?;
    Ok(model(
        ADMISSION,
        layout(conn)?,
        json!({
            "admissionOpen": open,
            "classes": students::classes(conn)?,
            "photoTypes": IMAGE_MIMES,
            "maxUploadBytes": max_upload_bytes,
        }),
    ))
}

pub fn gallery(conn: &Connection, cfg: &PagesConfig, page: u32) -> StoreResult<Value> {
    let listing = media::gallery_list(conn, PageRequest::new(page, cfg.page_size))?;
    Ok(model(GALLERY, layout(conn)?, to_value(listing)))
}

pub fn videos(conn: &Connection) -> StoreResult<Value> {
    let videos = media::videos_list(conn)?;
    Ok(model(VIDEOS, layout(conn)?, json!({ "videos": to_value(videos) })))
}

pub fn about(conn: &Connection) -> StoreResult<Value> {
    let info = site::school_info(conn)?;
    Ok(model(ABOUT, layout(conn)?, to_value(info)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_in_memory;
    use crate::store::notices::NoticeInput;
    use crate::store::Blob;

    fn cfg() -> PagesConfig {
        PagesConfig::default()
    }

    #[test]
    fn empty_database_still_renders_layout() {
        let conn = open_in_memory().expect("open");
        let page = home(&conn, &cfg()).expect("home");
        assert_eq!(page["page"], HOME);
        assert!(page["layout"]["school"].is_null());
        assert_eq!(page["layout"]["nav"], json!([]));
        assert_eq!(page["content"]["latestNotices"], json!([]));
    }

    #[test]
    fn notices_carry_download_descriptors() {
        let conn = open_in_memory().expect("open");
        let id = notices::create(
            &conn,
            &NoticeInput {
                title: "Exam schedule".to_string(),
                published_on: "2024-03-01".to_string(),
                is_marquee: true,
                attachment: Some(Blob {
                    bytes: b"%PDF".to_vec(),
                    mime: "application/pdf".to_string(),
                    file_name: Some("schedule.pdf".to_string()),
                }),
                ..NoticeInput::default()
            },
        )
        .expect("notice");

        let page = notices(&conn, &cfg(), 1).expect("page");
        let item = &page["content"]["items"][0];
        assert_eq!(item["attachment"], download("notice-attachment", id, Some("schedule.pdf")));
        assert!(item.get("attachmentMime").is_none());
        assert_eq!(page["layout"]["marquee"][0]["title"], "Exam schedule");

        let detail = notice(&conn, id).expect("detail");
        assert_eq!(detail["content"]["title"], "Exam schedule");
    }

    #[test]
    fn admission_closed_by_setting() {
        let conn = open_in_memory().expect("open");
        site::set_setting(&conn, "admission_open", "false").expect("setting");
        let page = admission(&conn, 1024).expect("admission");
        assert_eq!(page["content"]["admissionOpen"], false);
        assert_eq!(page["layout"]["settings"]["admission_open"], "false");
    }

    #[test]
    fn empty_model_has_layout_shape() {
        let page = empty(GALLERY);
        assert_eq!(page["layout"]["widgets"], json!([]));
        assert!(page["content"].is_null());
    }
}
