//! Site navigation: flat `nav_links` rows and the menu tree built from them.

use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::{debug, error};

use super::{StoreError, StoreResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NavLink {
    pub id: i64,
    pub title: String,
    pub href: Option<String>,
    pub parent_id: Option<i64>,
    pub sort_order: i64,
    pub icon: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NavNode {
    pub id: i64,
    pub title: String,
    pub href: Option<String>,
    pub icon: Option<String>,
    pub sort_order: i64,
    pub children: Vec<NavNode>,
}

#[derive(Debug, Clone, Default)]
pub struct NavLinkInput {
    pub title: String,
    pub href: Option<String>,
    pub parent_id: Option<i64>,
    pub sort_order: i64,
    pub icon: Option<String>,
}

fn row_to_link(r: &Row<'_>) -> rusqlite::Result<NavLink> {
    Ok(NavLink {
        id: r.get(0)?,
        title: r.get(1)?,
        href: r.get(2)?,
        parent_id: r.get(3)?,
        sort_order: r.get(4)?,
        icon: r.get(5)?,
    })
}

/// Assemble flat rows into a tree.
///
/// Roots are rows without a parent, ordered by `sort_order` (ties keep input
/// order). Children keep input order. Rows whose parent id matches no row are
/// dropped, as is anything only reachable through them.
pub fn build_tree(rows: Vec<NavLink>) -> Vec<NavNode> {
    let ids: HashSet<i64> = rows.iter().map(|r| r.id).collect();
    let mut children: HashMap<i64, Vec<NavLink>> = HashMap::new();
    let mut roots: Vec<NavLink> = Vec::new();

    for row in rows {
        match row.parent_id {
            None => roots.push(row),
            Some(parent) if ids.contains(&parent) => {
                children.entry(parent).or_default().push(row);
            }
            Some(parent) => {
                debug!(id = row.id, parent_id = parent, "dropping nav link with unknown parent");
            }
        }
    }

    roots.sort_by_key(|r| r.sort_order);
    roots
        .into_iter()
        .map(|root| attach(root, &mut children))
        .collect()
}

fn attach(link: NavLink, children: &mut HashMap<i64, Vec<NavLink>>) -> NavNode {
    let kids = children.remove(&link.id).unwrap_or_default();
    NavNode {
        id: link.id,
        title: link.title,
        href: link.href,
        icon: link.icon,
        sort_order: link.sort_order,
        children: kids.into_iter().map(|k| attach(k, children)).collect(),
    }
}

pub fn list(conn: &Connection) -> StoreResult<Vec<NavLink>> {
    let mut stmt = conn.prepare(
        "SELECT id, title, href, parent_id, sort_order, icon
         FROM nav_links
         ORDER BY sort_order, id",
    )?;
    let rows = stmt
        .query_map([], row_to_link)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// The menu tree. A failed fetch is logged and yields an empty menu.
pub fn tree(conn: &Connection) -> Vec<NavNode> {
    match list(conn) {
        Ok(rows) => build_tree(rows),
        Err(e) => {
            error!(error = %e, "failed to load navigation links");
            Vec::new()
        }
    }
}

pub fn get(conn: &Connection, id: i64) -> StoreResult<NavLink> {
    conn.query_row(
        "SELECT id, title, href, parent_id, sort_order, icon FROM nav_links WHERE id = ?",
        [id],
        row_to_link,
    )
    .optional()?
    .ok_or(StoreError::NotFound { entity: "nav link" })
}

/// Menus are two levels deep: a parent must itself be top level.
fn check_parent(conn: &Connection, id: Option<i64>, parent_id: Option<i64>) -> StoreResult<()> {
    let Some(parent_id) = parent_id else {
        return Ok(());
    };
    if Some(parent_id) == id {
        return Err(StoreError::Rejected("a nav link cannot be its own parent".to_string()));
    }
    let parent = get(conn, parent_id).map_err(|e| e.on("parent nav link"))?;
    if parent.parent_id.is_some() {
        return Err(StoreError::Rejected(
            "submenu items cannot have children".to_string(),
        ));
    }
    if let Some(id) = id {
        let has_children: bool = conn
            .prepare("SELECT 1 FROM nav_links WHERE parent_id = ?")?
            .exists([id])?;
        if has_children {
            return Err(StoreError::Rejected(
                "a nav link with children cannot become a submenu item".to_string(),
            ));
        }
    }
    Ok(())
}

pub fn create(conn: &Connection, input: &NavLinkInput) -> StoreResult<i64> {
    check_parent(conn, None, input.parent_id)?;
    conn.execute(
        "INSERT INTO nav_links(title, href, parent_id, sort_order, icon) VALUES(?, ?, ?, ?, ?)",
        params![input.title, input.href, input.parent_id, input.sort_order, input.icon],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn update(conn: &Connection, id: i64, input: &NavLinkInput) -> StoreResult<()> {
    get(conn, id)?;
    check_parent(conn, Some(id), input.parent_id)?;
    conn.execute(
        "UPDATE nav_links SET title = ?, href = ?, parent_id = ?, sort_order = ?, icon = ?
         WHERE id = ?",
        params![input.title, input.href, input.parent_id, input.sort_order, input.icon, id],
    )?;
    Ok(())
}

/// Children are removed with their parent (ON DELETE CASCADE).
pub fn delete(conn: &Connection, id: i64) -> StoreResult<()> {
    if conn.execute("DELETE FROM nav_links WHERE id = ?", [id])? == 0 {
        return Err(StoreError::NotFound { entity: "nav link" });
    }
    Ok(())
}
