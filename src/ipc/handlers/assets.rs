use base64::Engine;
use rusqlite::Connection;
use serde_json::json;
use tracing::debug;

use crate::auth::Permission;
use crate::backup::sha256_hex;
use crate::ipc::error::{HandlerErr, HandlerResult};
use crate::ipc::helpers::{authorize, conn, respond};
use crate::ipc::types::{AppState, Request};
use crate::store::{applications, media, notices, people, routines, site, students, widgets};
use crate::store::{Blob, StoreResult};
use crate::validate::{FieldErrors, Form};

const KINDS: &str = "student-photo, teacher-photo, staff-photo, notice-attachment, routine, \
exam-routine, gallery-image, school-logo, principal-photo, admission-photo, widget-image";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AssetKind {
    StudentPhoto,
    TeacherPhoto,
    StaffPhoto,
    NoticeAttachment,
    Routine,
    ExamRoutine,
    GalleryImage,
    SchoolLogo,
    PrincipalPhoto,
    AdmissionPhoto,
    WidgetImage,
}

impl AssetKind {
    fn parse(raw: &str) -> Option<Self> {
        Some(match raw {
            "student-photo" => Self::StudentPhoto,
            "teacher-photo" => Self::TeacherPhoto,
            "staff-photo" => Self::StaffPhoto,
            "notice-attachment" => Self::NoticeAttachment,
            "routine" => Self::Routine,
            "exam-routine" => Self::ExamRoutine,
            "gallery-image" => Self::GalleryImage,
            "school-logo" => Self::SchoolLogo,
            "principal-photo" => Self::PrincipalPhoto,
            "admission-photo" => Self::AdmissionPhoto,
            "widget-image" => Self::WidgetImage,
            _ => return None,
        })
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::StudentPhoto => "student-photo",
            Self::TeacherPhoto => "teacher-photo",
            Self::StaffPhoto => "staff-photo",
            Self::NoticeAttachment => "notice-attachment",
            Self::Routine => "routine",
            Self::ExamRoutine => "exam-routine",
            Self::GalleryImage => "gallery-image",
            Self::SchoolLogo => "school-logo",
            Self::PrincipalPhoto => "principal-photo",
            Self::AdmissionPhoto => "admission-photo",
            Self::WidgetImage => "widget-image",
        }
    }

    /// Student and applicant photos are personal data.
    fn needs_session(self) -> bool {
        matches!(self, Self::StudentPhoto | Self::AdmissionPhoto)
    }

    /// The school logo and principal photo live on the single school row.
    fn takes_id(self) -> bool {
        !matches!(self, Self::SchoolLogo | Self::PrincipalPhoto)
    }

    fn load(self, conn: &Connection, id: i64) -> StoreResult<Option<Blob>> {
        match self {
            Self::StudentPhoto => students::photo(conn, id),
            Self::TeacherPhoto => people::teacher_photo(conn, id),
            Self::StaffPhoto => people::staff_photo(conn, id),
            Self::NoticeAttachment => notices::attachment(conn, id),
            Self::Routine => routines::file(conn, id),
            Self::ExamRoutine => routines::exam_file(conn, id),
            Self::GalleryImage => media::gallery_image(conn, id),
            Self::SchoolLogo => site::logo(conn),
            Self::PrincipalPhoto => site::principal_photo(conn),
            Self::AdmissionPhoto => applications::admission_photo(conn, id),
            Self::WidgetImage => widgets::image(conn, id),
        }
    }
}

fn extension_for(mime: &str) -> &'static str {
    match mime {
        "application/pdf" => "pdf",
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        _ => "bin",
    }
}

/// Images open in the browser; everything else downloads.
fn content_disposition(mime: &str, file_name: &str) -> String {
    let mode = if mime.starts_with("image/") { "inline" } else { "attachment" };
    let safe: String = file_name
        .chars()
        .map(|c| if c == '"' || c == '\\' || c.is_control() { '_' } else { c })
        .collect();
    format!("{mode}; filename=\"{safe}\"")
}

fn describe(kind: AssetKind, id: i64, blob: Blob) -> serde_json::Value {
    let file_name = blob
        .file_name
        .clone()
        .unwrap_or_else(|| format!("{}-{id}.{}", kind.as_str(), extension_for(&blob.mime)));
    json!({
        "fileName": file_name,
        "contentType": blob.mime,
        "contentDisposition": content_disposition(&blob.mime, &file_name),
        "byteLength": blob.bytes.len(),
        "etag": sha256_hex(&blob.bytes),
        "dataBase64": base64::engine::general_purpose::STANDARD.encode(&blob.bytes),
    })
}

fn download(state: &mut AppState, req: &Request) -> HandlerResult {
    let mut form = Form::new(&req.params);
    let kind = form.required_choice("kind", KINDS, AssetKind::parse);
    let id = match kind {
        Some(k) if !k.takes_id() => form.optional_id("id").unwrap_or(1),
        _ => form.id("id"),
    };
    form.finish()?;
    let Some(kind) = kind else {
        return Err(FieldErrors::single("kind", "is required").into());
    };

    conn(state)?;
    if kind.needs_session() {
        authorize(state, req, Permission::ReadRecords)?;
    }
    let conn = conn(state)?;
    let blob = state.retry.run(|| kind.load(conn, id))?;
    let Some(blob) = blob else {
        return Err(HandlerErr::new("not_found", format!("no {} stored", kind.as_str())));
    };
    debug!(kind = kind.as_str(), id, bytes = blob.bytes.len(), "asset served");
    Ok(describe(kind, id, blob))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "assets.download" => download(state, req),
        _ => return None,
    };
    Some(respond(req, result))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_listed_kind_parses() {
        for raw in KINDS.split(", ") {
            let kind = AssetKind::parse(raw).expect(raw);
            assert_eq!(kind.as_str(), raw);
        }
        assert_eq!(AssetKind::parse("Student-Photo"), None);
    }

    #[test]
    fn descriptor_carries_hash_and_default_name() {
        let blob = Blob {
            bytes: b"%PDF-1.4".to_vec(),
            mime: "application/pdf".to_string(),
            file_name: None,
        };
        let value = describe(AssetKind::Routine, 4, blob);
        assert_eq!(value["fileName"], "routine-4.pdf");
        assert_eq!(value["contentDisposition"], "attachment; filename=\"routine-4.pdf\"");
        assert_eq!(value["byteLength"], 8);
        assert_eq!(value["etag"], sha256_hex(b"%PDF-1.4"));
        assert_eq!(value["dataBase64"], "JVBERi0xLjQ=");
    }

    #[test]
    fn images_render_inline_and_quotes_are_escaped() {
        assert_eq!(
            content_disposition("image/png", "a\"b.png"),
            "inline; filename=\"a_b.png\""
        );
    }
}
