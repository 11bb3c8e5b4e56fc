//! Row-level CRUD against user tables.
//!
//! Field values are submitted as `(column, value)` pairs and must name
//! exactly the table's editable columns, in any order. Values are always
//! bound as parameters; only catalog-sourced column names are interpolated.

use crate::schema::{ensure_table, list_columns, quote_ident};
use crate::DbError;
use explorer_types::{Ident, Row, TableData, IDENTITY_COLUMN};
use rusqlite::types::ValueRef;
use rusqlite::{params_from_iter, Connection, OptionalExtension};

/// Orders submitted values to match `columns`.
///
/// Fails unless every column appears exactly once and nothing else does.
fn align_values<'a>(
    columns: &[String],
    values: &'a [(String, String)],
) -> Result<Vec<&'a str>, DbError> {
    let mismatch = || DbError::ColumnMismatch {
        expected: columns.to_vec(),
        submitted: values.iter().map(|(k, _)| k.clone()).collect(),
    };

    if values.len() != columns.len() {
        return Err(mismatch());
    }

    columns
        .iter()
        .map(|column| {
            let mut matches = values.iter().filter(|(k, _)| k == column);
            match (matches.next(), matches.next()) {
                (Some((_, v)), None) => Ok(v.as_str()),
                _ => Err(mismatch()),
            }
        })
        .collect()
}

fn cell_to_string(value: ValueRef<'_>) -> Option<String> {
    match value {
        ValueRef::Null => None,
        ValueRef::Integer(i) => Some(i.to_string()),
        ValueRef::Real(f) => Some(f.to_string()),
        ValueRef::Text(t) | ValueRef::Blob(t) => Some(String::from_utf8_lossy(t).into_owned()),
    }
}

fn select_clause(table: &Ident, columns: &[String]) -> String {
    let mut select = vec![IDENTITY_COLUMN.to_string()];
    select.extend(columns.iter().map(|c| quote_ident(c)));
    format!("SELECT {} FROM {}", select.join(", "), table.quoted())
}

fn map_row(row: &rusqlite::Row<'_>, width: usize) -> rusqlite::Result<Row> {
    let id = row.get(0)?;
    let mut values = Vec::with_capacity(width);
    for i in 1..=width {
        values.push(cell_to_string(row.get_ref(i)?));
    }
    Ok(Row { id, values })
}

/// Returns every row of `table` ordered by identity ascending.
///
/// # Errors
///
/// Returns `DbError::TableNotFound` if the table does not exist.
pub fn list_rows(conn: &Connection, table: &Ident) -> Result<TableData, DbError> {
    let columns = list_columns(conn, table)?;
    let sql = format!("{} ORDER BY {}", select_clause(table, &columns), IDENTITY_COLUMN);

    let mut stmt = conn.prepare(&sql)?;
    let width = columns.len();
    let mapped = stmt.query_map([], |row| map_row(row, width))?;
    let mut rows = Vec::new();
    for row in mapped {
        rows.push(row?);
    }
    Ok(TableData { columns, rows })
}

/// Fetches one row by identity, or `None` if there is no such row.
pub fn get_row(conn: &Connection, table: &Ident, row_id: i64) -> Result<Option<Row>, DbError> {
    let columns = list_columns(conn, table)?;
    let sql = format!(
        "{} WHERE {} = ?1",
        select_clause(table, &columns),
        IDENTITY_COLUMN
    );
    let width = columns.len();
    let row = conn
        .query_row(&sql, [row_id], |row| map_row(row, width))
        .optional()?;
    Ok(row)
}

/// Inserts one row and returns its engine-assigned identity.
///
/// # Errors
///
/// - `DbError::TableNotFound` if the table does not exist.
/// - `DbError::ColumnMismatch` if `values` does not name exactly the
///   editable columns.
pub fn insert_row(
    conn: &Connection,
    table: &Ident,
    values: &[(String, String)],
) -> Result<i64, DbError> {
    let columns = list_columns(conn, table)?;
    let ordered = align_values(&columns, values)?;

    let sql = if columns.is_empty() {
        format!("INSERT INTO {} DEFAULT VALUES", table.quoted())
    } else {
        let names = columns.iter().map(|c| quote_ident(c)).collect::<Vec<_>>();
        let placeholders = (1..=columns.len())
            .map(|i| format!("?{i}"))
            .collect::<Vec<_>>();
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            table.quoted(),
            names.join(", "),
            placeholders.join(", ")
        )
    };

    conn.execute(&sql, params_from_iter(ordered))?;
    let id = conn.last_insert_rowid();
    tracing::debug!(table = %table, row_id = id, "inserted row");
    Ok(id)
}

/// Overwrites every editable column of the row with identity `row_id`.
///
/// Returns the number of rows changed; an unknown identity changes nothing
/// and is not an error.
///
/// # Errors
///
/// Same as [`insert_row`].
pub fn update_row(
    conn: &Connection,
    table: &Ident,
    row_id: i64,
    values: &[(String, String)],
) -> Result<usize, DbError> {
    let columns = list_columns(conn, table)?;
    let ordered = align_values(&columns, values)?;
    if columns.is_empty() {
        // Nothing to overwrite; report whether the row exists.
        let sql = format!(
            "UPDATE {} SET {id} = {id} WHERE {id} = ?1",
            table.quoted(),
            id = IDENTITY_COLUMN
        );
        return Ok(conn.execute(&sql, [row_id])?);
    }

    let assignments = columns
        .iter()
        .enumerate()
        .map(|(i, c)| format!("{} = ?{}", quote_ident(c), i + 1))
        .collect::<Vec<_>>();
    let sql = format!(
        "UPDATE {} SET {} WHERE {} = ?{}",
        table.quoted(),
        assignments.join(", "),
        IDENTITY_COLUMN,
        columns.len() + 1
    );

    let mut params: Vec<rusqlite::types::Value> = ordered
        .into_iter()
        .map(|v| rusqlite::types::Value::Text(v.to_string()))
        .collect();
    params.push(rusqlite::types::Value::Integer(row_id));

    let changed = conn.execute(&sql, params_from_iter(params))?;
    tracing::debug!(table = %table, row_id, changed, "updated row");
    Ok(changed)
}

/// Deletes the row with identity `row_id`.
///
/// Returns the number of rows removed; an unknown identity is a no-op.
///
/// # Errors
///
/// Returns `DbError::TableNotFound` if the table does not exist.
pub fn delete_row(conn: &Connection, table: &Ident, row_id: i64) -> Result<usize, DbError> {
    ensure_table(conn, table)?;
    let sql = format!(
        "DELETE FROM {} WHERE {} = ?1",
        table.quoted(),
        IDENTITY_COLUMN
    );
    let removed = conn.execute(&sql, [row_id])?;
    tracing::debug!(table = %table, row_id, removed, "deleted row");
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::create_table;

    fn ident(s: &str) -> Ident {
        Ident::parse(s).unwrap()
    }

    fn fields(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn setup() -> (Connection, Ident) {
        let conn = Connection::open_in_memory().unwrap();
        let table = ident("T");
        create_table(&conn, &table, &[ident("a"), ident("b")]).unwrap();
        (conn, table)
    }

    #[test]
    fn insert_list_delete() {
        let (conn, table) = setup();

        let id = insert_row(&conn, &table, &fields(&[("a", "x"), ("b", "y")])).unwrap();

        let data = list_rows(&conn, &table).unwrap();
        assert_eq!(data.columns, vec!["a", "b"]);
        assert_eq!(
            data.rows,
            vec![Row {
                id,
                values: vec![Some("x".into()), Some("y".into())],
            }]
        );

        assert_eq!(delete_row(&conn, &table, id).unwrap(), 1);
        assert!(list_rows(&conn, &table).unwrap().rows.is_empty());
    }

    #[test]
    fn insert_accepts_any_field_order() {
        let (conn, table) = setup();
        let id = insert_row(&conn, &table, &fields(&[("b", "second"), ("a", "first")])).unwrap();
        let row = get_row(&conn, &table, id).unwrap().unwrap();
        assert_eq!(row.values, vec![Some("first".into()), Some("second".into())]);
    }

    #[test]
    fn insert_rejects_mismatched_fields() {
        let (conn, table) = setup();

        for submitted in [
            fields(&[("a", "x")]),
            fields(&[("a", "x"), ("b", "y"), ("c", "z")]),
            fields(&[("a", "x"), ("a", "y")]),
            fields(&[("a", "x"), ("B", "y")]),
        ] {
            let err = insert_row(&conn, &table, &submitted).unwrap_err();
            assert!(
                matches!(err, DbError::ColumnMismatch { .. }),
                "{submitted:?} should be rejected"
            );
        }
        assert!(list_rows(&conn, &table).unwrap().rows.is_empty());
    }

    #[test]
    fn update_without_editable_columns_reports_existing_row() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE bare (id INTEGER PRIMARY KEY AUTOINCREMENT)")
            .unwrap();
        let table = ident("bare");

        let id = insert_row(&conn, &table, &[]).unwrap();
        assert_eq!(update_row(&conn, &table, id, &[]).unwrap(), 1);
        assert_eq!(update_row(&conn, &table, id + 1, &[]).unwrap(), 0);
        assert_eq!(list_rows(&conn, &table).unwrap().rows.len(), 1);
    }

    #[test]
    fn values_are_bound_not_interpolated() {
        let (conn, table) = setup();
        let nasty = "'); DROP TABLE T; --";
        let id = insert_row(&conn, &table, &fields(&[("a", nasty), ("b", "<b>")])).unwrap();
        let row = get_row(&conn, &table, id).unwrap().unwrap();
        assert_eq!(row.value_or_empty(0), nasty);
        assert_eq!(row.value_or_empty(1), "<b>");
    }

    #[test]
    fn update_overwrites_and_keeps_identity() {
        let (conn, table) = setup();
        let id = insert_row(&conn, &table, &fields(&[("a", "x"), ("b", "y")])).unwrap();

        let changed = update_row(&conn, &table, id, &fields(&[("a", "x2"), ("b", "y2")])).unwrap();
        assert_eq!(changed, 1);

        let data = list_rows(&conn, &table).unwrap();
        assert_eq!(data.rows.len(), 1);
        assert_eq!(data.rows[0].id, id);
        assert_eq!(data.rows[0].values, vec![Some("x2".into()), Some("y2".into())]);
    }

    #[test]
    fn update_and_delete_of_unknown_identity_are_noops() {
        let (conn, table) = setup();
        insert_row(&conn, &table, &fields(&[("a", "x"), ("b", "y")])).unwrap();

        assert_eq!(
            update_row(&conn, &table, 999, &fields(&[("a", "q"), ("b", "q")])).unwrap(),
            0
        );
        assert_eq!(delete_row(&conn, &table, 999).unwrap(), 0);

        let data = list_rows(&conn, &table).unwrap();
        assert_eq!(data.rows.len(), 1);
        assert_eq!(data.rows[0].value_or_empty(0), "x");
    }

    #[test]
    fn rows_come_back_in_identity_order() {
        let (conn, table) = setup();
        for v in ["1", "2", "3"] {
            insert_row(&conn, &table, &fields(&[("a", v), ("b", v)])).unwrap();
        }
        let ids: Vec<i64> = list_rows(&conn, &table)
            .unwrap()
            .rows
            .iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn identities_are_not_reused_after_delete() {
        let (conn, table) = setup();
        let first = insert_row(&conn, &table, &fields(&[("a", "x"), ("b", "y")])).unwrap();
        delete_row(&conn, &table, first).unwrap();
        let second = insert_row(&conn, &table, &fields(&[("a", "x"), ("b", "y")])).unwrap();
        assert!(second > first, "AUTOINCREMENT never reuses identities");
    }

    #[test]
    fn get_row_missing_returns_none() {
        let (conn, table) = setup();
        assert!(get_row(&conn, &table, 42).unwrap().is_none());
    }

    #[test]
    fn operations_on_missing_table_fail() {
        let conn = Connection::open_in_memory().unwrap();
        let ghost = ident("ghost");
        assert!(matches!(
            list_rows(&conn, &ghost),
            Err(DbError::TableNotFound(_))
        ));
        assert!(matches!(
            insert_row(&conn, &ghost, &[]),
            Err(DbError::TableNotFound(_))
        ));
        assert!(matches!(
            delete_row(&conn, &ghost, 1),
            Err(DbError::TableNotFound(_))
        ));
        assert!(matches!(
            update_row(&conn, &ghost, 1, &[]),
            Err(DbError::TableNotFound(_))
        ));
    }

    #[test]
    fn null_and_non_text_cells_render() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE mixed (id INTEGER PRIMARY KEY, n, r, t);
             INSERT INTO mixed (id, n, r, t) VALUES (1, 42, 1.5, NULL);",
        )
        .unwrap();
        let data = list_rows(&conn, &ident("mixed")).unwrap();
        assert_eq!(data.columns, vec!["n", "r", "t"]);
        assert_eq!(
            data.rows[0].values,
            vec![Some("42".into()), Some("1.5".into()), None]
        );
    }

    #[test]
    fn align_values_orders_by_columns() {
        let columns = vec!["a".to_string(), "b".to_string()];
        let submitted = fields(&[("b", "2"), ("a", "1")]);
        assert_eq!(align_values(&columns, &submitted).unwrap(), vec!["1", "2"]);
    }
}
