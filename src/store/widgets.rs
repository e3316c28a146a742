//! Sidebar widgets and the grouped "important links" lists shown on every page.

use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{optional_data_uri, Blob, StoreError, StoreResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WidgetKind {
    Html,
    Image,
    Links,
}

impl WidgetKind {
    pub fn as_str(self) -> &'static str {
        match self {
            WidgetKind::Html => "html",
            WidgetKind::Image => "image",
            WidgetKind::Links => "links",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "html" => Some(WidgetKind::Html),
            "image" => Some(WidgetKind::Image),
            "links" => Some(WidgetKind::Links),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Widget {
    pub id: i64,
    pub title: String,
    pub kind: WidgetKind,
    pub content: String,
    pub image: Option<String>,
    pub sort_order: i64,
    pub is_active: bool,
}

#[derive(Debug, Clone)]
pub struct WidgetInput {
    pub title: String,
    pub kind: WidgetKind,
    pub content: String,
    /// `None` keeps the stored image.
    pub image: Option<Blob>,
    pub sort_order: i64,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportantLink {
    pub id: i64,
    pub group_id: i64,
    pub title: String,
    pub url: String,
    pub sort_order: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkGroup {
    pub id: i64,
    pub title: String,
    pub sort_order: i64,
    pub links: Vec<ImportantLink>,
}

fn row_to_widget(r: &Row<'_>) -> rusqlite::Result<Widget> {
    let kind: String = r.get(2)?;
    Ok(Widget {
        id: r.get(0)?,
        title: r.get(1)?,
        kind: WidgetKind::parse(&kind).unwrap_or(WidgetKind::Html),
        content: r.get(3)?,
        image: optional_data_uri(r.get(4)?, r.get(5)?),
        sort_order: r.get(6)?,
        is_active: r.get::<_, i64>(7)? != 0,
    })
}

const WIDGET_COLUMNS: &str = "id, title, kind, content, image, image_mime, sort_order, is_active";

pub fn list(conn: &Connection, active_only: bool) -> StoreResult<Vec<Widget>> {
    let filter = if active_only { "WHERE is_active = 1" } else { "" };
    let mut stmt = conn.prepare(&format!(
        "SELECT {WIDGET_COLUMNS} FROM sidebar_widgets {filter} ORDER BY sort_order, id"
    ))?;
    let rows = stmt
        .query_map([], row_to_widget)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn get(conn: &Connection, id: i64) -> StoreResult<Widget> {
    conn.query_row(
        &format!("SELECT {WIDGET_COLUMNS} FROM sidebar_widgets WHERE id = ?"),
        [id],
        row_to_widget,
    )
    .optional()?
    .ok_or(StoreError::NotFound { entity: "widget" })
}

pub fn create(conn: &Connection, input: &WidgetInput) -> StoreResult<i64> {
    let (image, mime) = super::students::split_blob(input.image.as_ref());
    conn.execute(
        "INSERT INTO sidebar_widgets(title, kind, content, image, image_mime, sort_order, is_active)
         VALUES(?, ?, ?, ?, ?, ?, ?)",
        params![
            input.title,
            input.kind.as_str(),
            input.content,
            image,
            mime,
            input.sort_order,
            input.is_active
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn update(conn: &Connection, id: i64, input: &WidgetInput) -> StoreResult<()> {
    let changed = conn.execute(
        "UPDATE sidebar_widgets SET title = ?, kind = ?, content = ?, sort_order = ?, is_active = ?
         WHERE id = ?",
        params![
            input.title,
            input.kind.as_str(),
            input.content,
            input.sort_order,
            input.is_active,
            id
        ],
    )?;
    if changed == 0 {
        return Err(StoreError::NotFound { entity: "widget" });
    }
    if let Some(image) = &input.image {
        conn.execute(
            "UPDATE sidebar_widgets SET image = ?, image_mime = ? WHERE id = ?",
            params![image.bytes, image.mime, id],
        )?;
    }
    Ok(())
}

pub fn delete(conn: &Connection, id: i64) -> StoreResult<()> {
    if conn.execute("DELETE FROM sidebar_widgets WHERE id = ?", [id])? == 0 {
        return Err(StoreError::NotFound { entity: "widget" });
    }
    Ok(())
}

pub fn image(conn: &Connection, id: i64) -> StoreResult<Option<Blob>> {
    super::media::blob_column(conn, "sidebar_widgets", "image", "image_mime", None, id, "widget")
}

/// Groups ordered by sort_order, each with its links in sort order.
pub fn link_groups(conn: &Connection) -> StoreResult<Vec<LinkGroup>> {
    let mut stmt =
        conn.prepare("SELECT id, title, sort_order FROM important_link_groups ORDER BY sort_order, id")?;
    let mut groups = stmt
        .query_map([], |r| {
            Ok(LinkGroup {
                id: r.get(0)?,
                title: r.get(1)?,
                sort_order: r.get(2)?,
                links: Vec::new(),
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut stmt = conn.prepare(
        "SELECT id, group_id, title, url, sort_order
         FROM important_links
         ORDER BY sort_order, id",
    )?;
    let mut by_group: BTreeMap<i64, Vec<ImportantLink>> = BTreeMap::new();
    for link in stmt.query_map([], |r| {
        Ok(ImportantLink {
            id: r.get(0)?,
            group_id: r.get(1)?,
            title: r.get(2)?,
            url: r.get(3)?,
            sort_order: r.get(4)?,
        })
    })? {
        let link = link?;
        by_group.entry(link.group_id).or_default().push(link);
    }
    for group in &mut groups {
        group.links = by_group.remove(&group.id).unwrap_or_default();
    }
    Ok(groups)
}

pub fn group_create(conn: &Connection, title: &str, sort_order: i64) -> StoreResult<i64> {
    conn.execute(
        "INSERT INTO important_link_groups(title, sort_order) VALUES(?, ?)",
        params![title, sort_order],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn group_update(conn: &Connection, id: i64, title: &str, sort_order: i64) -> StoreResult<()> {
    let changed = conn.execute(
        "UPDATE important_link_groups SET title = ?, sort_order = ? WHERE id = ?",
        params![title, sort_order, id],
    )?;
    if changed == 0 {
        return Err(StoreError::NotFound { entity: "link group" });
    }
    Ok(())
}

/// Links of the group go with it.
pub fn group_delete(conn: &Connection, id: i64) -> StoreResult<()> {
    if conn.execute("DELETE FROM important_link_groups WHERE id = ?", [id])? == 0 {
        return Err(StoreError::NotFound { entity: "link group" });
    }
    Ok(())
}

pub fn link_create(
    conn: &Connection,
    group_id: i64,
    title: &str,
    url: &str,
    sort_order: i64,
) -> StoreResult<i64> {
    conn.execute(
        "INSERT INTO important_links(group_id, title, url, sort_order) VALUES(?, ?, ?, ?)",
        params![group_id, title, url, sort_order],
    )
    .map_err(|e| match StoreError::from(e) {
        StoreError::InUse { .. } => StoreError::NotFound { entity: "link group" },
        other => other,
    })?;
    Ok(conn.last_insert_rowid())
}

pub fn link_delete(conn: &Connection, id: i64) -> StoreResult<()> {
    if conn.execute("DELETE FROM important_links WHERE id = ?", [id])? == 0 {
        return Err(StoreError::NotFound { entity: "link" });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_in_memory;

    fn widget(title: &str, sort_order: i64, is_active: bool) -> WidgetInput {
        WidgetInput {
            title: title.to_string(),
            kind: WidgetKind::Html,
            content: "<p>hello</p>".to_string(),
            image: None,
            sort_order,
            is_active,
        }
    }

    #[test]
    fn inactive_widgets_are_hidden_from_public_listing() {
        let conn = open_in_memory().expect("open");
        create(&conn, &widget("Second", 2, true)).expect("second");
        create(&conn, &widget("Hidden", 0, false)).expect("hidden");
        create(&conn, &widget("First", 1, true)).expect("first");

        let public: Vec<String> = list(&conn, true)
            .expect("public")
            .into_iter()
            .map(|w| w.title)
            .collect();
        assert_eq!(public, vec!["First", "Second"]);
        assert_eq!(list(&conn, false).expect("all").len(), 3);
    }

    #[test]
    fn image_survives_update_without_upload() {
        let conn = open_in_memory().expect("open");
        let mut input = widget("Banner", 0, true);
        input.kind = WidgetKind::Image;
        input.image = Some(Blob {
            bytes: vec![1, 2, 3],
            mime: "image/jpeg".to_string(),
            file_name: None,
        });
        let id = create(&conn, &input).expect("create");
        input.image = None;
        input.title = "Banner 2".to_string();
        update(&conn, id, &input).expect("update");
        assert_eq!(image(&conn, id).expect("image").map(|b| b.bytes), Some(vec![1, 2, 3]));
        assert_eq!(get(&conn, id).expect("get").title, "Banner 2");
    }

    #[test]
    fn links_are_grouped_and_cascade() {
        let conn = open_in_memory().expect("open");
        let gov = group_create(&conn, "Government", 1).expect("group");
        let edu = group_create(&conn, "Education boards", 0).expect("group");
        link_create(&conn, gov, "Portal", "https://gov.example", 2).expect("link");
        link_create(&conn, gov, "Ministry", "https://moe.example", 1).expect("link");
        link_create(&conn, edu, "Board", "https://board.example", 0).expect("link");

        let groups = link_groups(&conn).expect("groups");
        assert_eq!(groups[0].title, "Education boards");
        let gov_titles: Vec<&str> = groups[1].links.iter().map(|l| l.title.as_str()).collect();
        assert_eq!(gov_titles, vec!["Ministry", "Portal"]);

        assert!(matches!(
            link_create(&conn, 999, "x", "https://x", 0),
            Err(StoreError::NotFound { entity: "link group" })
        ));

        group_delete(&conn, gov).expect("delete");
        let links: i64 = conn
            .query_row("SELECT COUNT(*) FROM important_links", [], |r| r.get(0))
            .expect("count");
        assert_eq!(links, 1);
    }
}
