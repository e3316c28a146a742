use rusqlite::{params, params_from_iter, types::Value, Connection, OptionalExtension, Row};
use serde::Serialize;

use super::{count, on, Page, PageRequest, StoreError, StoreResult};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeType {
    pub id: i64,
    pub name: String,
    pub amount_cents: i64,
    pub description: Option<String>,
}

#[derive(Debug, Clone)]
pub struct FeeTypeInput {
    pub name: String,
    pub amount_cents: i64,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeCollection {
    pub id: i64,
    pub student_id: i64,
    pub student_name: String,
    pub class_name: String,
    pub roll: i64,
    pub fee_type_id: i64,
    pub fee_type_name: String,
    pub amount_cents: i64,
    pub paid_on: String,
    pub receipt_no: Option<String>,
    pub note: Option<String>,
}

#[derive(Debug, Clone)]
pub struct FeeCollectionInput {
    pub student_id: i64,
    pub fee_type_id: i64,
    /// Defaults to the fee type's amount.
    pub amount_cents: Option<i64>,
    pub paid_on: String,
    pub note: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct CollectionFilter {
    pub student_id: Option<i64>,
    pub fee_type_id: Option<i64>,
    pub from: Option<String>,
    pub to: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeTotal {
    pub fee_type_id: i64,
    pub fee_type_name: String,
    pub collections: i64,
    pub total_cents: i64,
}

fn row_to_fee_type(r: &Row<'_>) -> rusqlite::Result<FeeType> {
    Ok(FeeType {
        id: r.get(0)?,
        name: r.get(1)?,
        amount_cents: r.get(2)?,
        description: r.get(3)?,
    })
}

pub fn types_list(conn: &Connection) -> StoreResult<Vec<FeeType>> {
    let mut stmt =
        conn.prepare("SELECT id, name, amount_cents, description FROM fee_types ORDER BY name")?;
    let rows = stmt
        .query_map([], row_to_fee_type)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn type_get(conn: &Connection, id: i64) -> StoreResult<FeeType> {
    conn.query_row(
        "SELECT id, name, amount_cents, description FROM fee_types WHERE id = ?",
        [id],
        row_to_fee_type,
    )
    .optional()?
    .ok_or(StoreError::NotFound { entity: "fee type" })
}

pub fn type_create(conn: &Connection, input: &FeeTypeInput) -> StoreResult<i64> {
    conn.execute(
        "INSERT INTO fee_types(name, amount_cents, description) VALUES(?, ?, ?)",
        params![input.name, input.amount_cents, input.description],
    )
    .map_err(on("fee type with this name"))?;
    Ok(conn.last_insert_rowid())
}

pub fn type_update(conn: &Connection, id: i64, input: &FeeTypeInput) -> StoreResult<()> {
    let changed = conn
        .execute(
            "UPDATE fee_types SET name = ?, amount_cents = ?, description = ? WHERE id = ?",
            params![input.name, input.amount_cents, input.description, id],
        )
        .map_err(on("fee type with this name"))?;
    if changed == 0 {
        return Err(StoreError::NotFound { entity: "fee type" });
    }
    Ok(())
}

/// Collections recorded against the type are removed with it.
pub fn type_delete(conn: &Connection, id: i64) -> StoreResult<()> {
    if conn.execute("DELETE FROM fee_types WHERE id = ?", [id])? == 0 {
        return Err(StoreError::NotFound { entity: "fee type" });
    }
    Ok(())
}

fn collection_where(filter: &CollectionFilter) -> (String, Vec<Value>) {
    let mut clauses: Vec<&str> = Vec::new();
    let mut binds: Vec<Value> = Vec::new();
    if let Some(id) = filter.student_id {
        clauses.push("fc.student_id = ?");
        binds.push(Value::Integer(id));
    }
    if let Some(id) = filter.fee_type_id {
        clauses.push("fc.fee_type_id = ?");
        binds.push(Value::Integer(id));
    }
    if let Some(from) = &filter.from {
        clauses.push("fc.paid_on >= ?");
        binds.push(Value::Text(from.clone()));
    }
    if let Some(to) = &filter.to {
        clauses.push("fc.paid_on <= ?");
        binds.push(Value::Text(to.clone()));
    }
    if clauses.is_empty() {
        (String::new(), binds)
    } else {
        (format!("WHERE {}", clauses.join(" AND ")), binds)
    }
}

pub fn collections_list(
    conn: &Connection,
    filter: &CollectionFilter,
    page: PageRequest,
) -> StoreResult<Page<FeeCollection>> {
    let (where_sql, mut binds) = collection_where(filter);
    let total = count(
        conn,
        &format!("SELECT COUNT(*) FROM fee_collections fc {where_sql}"),
        params_from_iter(binds.iter()),
    )?;
    binds.push(Value::Integer(page.limit()));
    binds.push(Value::Integer(page.offset()));
    let mut stmt = conn.prepare(&format!(
        "SELECT fc.id, fc.student_id, s.name, s.class_name, s.roll, fc.fee_type_id, ft.name,
                fc.amount_cents, fc.paid_on, fc.receipt_no, fc.note
         FROM fee_collections fc
         JOIN students s ON s.id = fc.student_id
         JOIN fee_types ft ON ft.id = fc.fee_type_id
         {where_sql}
         ORDER BY fc.paid_on DESC, fc.id DESC
         LIMIT ? OFFSET ?"
    ))?;
    let items = stmt
        .query_map(params_from_iter(binds.iter()), |r| {
            Ok(FeeCollection {
                id: r.get(0)?,
                student_id: r.get(1)?,
                student_name: r.get(2)?,
                class_name: r.get(3)?,
                roll: r.get(4)?,
                fee_type_id: r.get(5)?,
                fee_type_name: r.get(6)?,
                amount_cents: r.get(7)?,
                paid_on: r.get(8)?,
                receipt_no: r.get(9)?,
                note: r.get(10)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Page::new(items, total, page))
}

/// Record a payment. The receipt number is stamped by the insert trigger in
/// the same statement. Returns `(id, receipt_no)`.
pub fn collection_create(conn: &Connection, input: &FeeCollectionInput) -> StoreResult<(i64, String)> {
    let fee_type = type_get(conn, input.fee_type_id)?;
    let amount = input.amount_cents.unwrap_or(fee_type.amount_cents);

    conn.execute(
        "INSERT INTO fee_collections(student_id, fee_type_id, amount_cents, paid_on, note)
         VALUES(?, ?, ?, ?, ?)",
        params![input.student_id, input.fee_type_id, amount, input.paid_on, input.note],
    )
    .map_err(|e| match StoreError::from(e) {
        StoreError::InUse { .. } => StoreError::NotFound { entity: "student" },
        other => other,
    })?;
    let id = conn.last_insert_rowid();
    let receipt_no: String = conn.query_row(
        "SELECT receipt_no FROM fee_collections WHERE id = ?",
        [id],
        |r| r.get(0),
    )?;
    Ok((id, receipt_no))
}

pub fn collection_delete(conn: &Connection, id: i64) -> StoreResult<()> {
    if conn.execute("DELETE FROM fee_collections WHERE id = ?", [id])? == 0 {
        return Err(StoreError::NotFound { entity: "fee collection" });
    }
    Ok(())
}

/// Totals per fee type over the same filters as the listing.
pub fn totals(conn: &Connection, filter: &CollectionFilter) -> StoreResult<Vec<FeeTotal>> {
    let (where_sql, binds) = collection_where(filter);
    let mut stmt = conn.prepare(&format!(
        "SELECT ft.id, ft.name, COUNT(fc.id), COALESCE(SUM(fc.amount_cents), 0)
         FROM fee_collections fc
         JOIN fee_types ft ON ft.id = fc.fee_type_id
         {where_sql}
         GROUP BY ft.id, ft.name
         ORDER BY ft.name"
    ))?;
    let rows = stmt
        .query_map(params_from_iter(binds.iter()), |r| {
            Ok(FeeTotal {
                fee_type_id: r.get(0)?,
                fee_type_name: r.get(1)?,
                collections: r.get(2)?,
                total_cents: r.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_in_memory;
    use crate::store::students;

    fn tuition(conn: &Connection) -> i64 {
        type_create(
            conn,
            &FeeTypeInput {
                name: "Tuition".to_string(),
                amount_cents: 50_000,
                description: None,
            },
        )
        .expect("fee type")
    }

    #[test]
    fn collection_defaults_amount_and_stamps_receipt() {
        let conn = open_in_memory().expect("open");
        let student = students::create(&conn, &students::tests::sample("Rahim", 1)).expect("student");
        let fee = tuition(&conn);
        let (id, receipt) = collection_create(
            &conn,
            &FeeCollectionInput {
                student_id: student,
                fee_type_id: fee,
                amount_cents: None,
                paid_on: "2024-01-10".to_string(),
                note: None,
            },
        )
        .expect("collect");
        assert_eq!(receipt, format!("RCPT-20240110-{id:06}"));

        let page = collections_list(&conn, &CollectionFilter::default(), PageRequest::new(1, 10))
            .expect("list");
        assert_eq!(page.items[0].amount_cents, 50_000);
        assert_eq!(page.items[0].student_name, "Rahim");
    }

    #[test]
    fn receipts_are_stamped_per_row_without_a_transaction() {
        let conn = open_in_memory().expect("open");
        let student = students::create(&conn, &students::tests::sample("Rahim", 1)).expect("student");
        let fee = tuition(&conn);
        let mut receipts = Vec::new();
        for day in ["2024-03-01", "2024-03-02"] {
            let (id, receipt) = collection_create(
                &conn,
                &FeeCollectionInput {
                    student_id: student,
                    fee_type_id: fee,
                    amount_cents: Some(100),
                    paid_on: day.to_string(),
                    note: None,
                },
            )
            .expect("collect");
            assert!(conn.is_autocommit());
            receipts.push((id, receipt));
        }
        let (first, second) = (&receipts[0], &receipts[1]);
        assert_eq!(first.1, format!("RCPT-20240301-{:06}", first.0));
        assert_eq!(second.1, format!("RCPT-20240302-{:06}", second.0));

        let stored: String = conn
            .query_row(
                "SELECT receipt_no FROM fee_collections WHERE id = ?",
                [second.0],
                |r| r.get(0),
            )
            .expect("stored receipt");
        assert_eq!(stored, second.1);
    }

    #[test]
    fn unknown_student_is_not_found() {
        let conn = open_in_memory().expect("open");
        let fee = tuition(&conn);
        let err = collection_create(
            &conn,
            &FeeCollectionInput {
                student_id: 999,
                fee_type_id: fee,
                amount_cents: Some(10),
                paid_on: "2024-01-10".to_string(),
                note: None,
            },
        )
        .expect_err("fk");
        assert!(matches!(err, StoreError::NotFound { entity: "student" }));
    }

    #[test]
    fn totals_respect_date_range_and_cascade_on_type_delete() {
        let conn = open_in_memory().expect("open");
        let student = students::create(&conn, &students::tests::sample("Rahim", 1)).expect("student");
        let fee = tuition(&conn);
        for (day, amount) in [("2024-01-05", 100), ("2024-01-20", 200), ("2024-02-01", 400)] {
            collection_create(
                &conn,
                &FeeCollectionInput {
                    student_id: student,
                    fee_type_id: fee,
                    amount_cents: Some(amount),
                    paid_on: day.to_string(),
                    note: None,
                },
            )
            .expect("collect");
        }
        let january = CollectionFilter {
            from: Some("2024-01-01".to_string()),
            to: Some("2024-01-31".to_string()),
            ..CollectionFilter::default()
        };
        let totals = totals(&conn, &january).expect("totals");
        assert_eq!(totals.len(), 1);
        assert_eq!(totals[0].collections, 2);
        assert_eq!(totals[0].total_cents, 300);

        type_delete(&conn, fee).expect("delete type");
        let remaining: i64 = conn
            .query_row("SELECT COUNT(*) FROM fee_collections", [], |r| r.get(0))
            .expect("count");
        assert_eq!(remaining, 0);
    }
}
