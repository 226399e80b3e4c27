//! Record store gateway
//!
//! Generic single-field primitives against one table: find-one, find-all,
//! delete-one, update-one, insert. Every operation takes an explicit
//! `PgConnection`, so callers decide transaction participation: inside a
//! coordinator transaction the connection is the transaction's, otherwise a
//! plain pool connection. Nothing written through a transaction connection is
//! durable until that transaction commits.
//!
//! Lookups report absence through `Option` / an empty `Vec`; only the
//! operations that target a row (update-one, delete-one) yield a typed
//! not-found error.

use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::{Query, QueryAs};
use sqlx::{FromRow, PgConnection, Postgres};
use thiserror::Error;
use uuid::Uuid;

/// Gateway-level failures
#[derive(Error, Debug)]
pub enum StoreError {
    /// The row targeted by update-one / delete-one does not exist
    #[error("no {table} row matches the targeted {field}")]
    NotFound {
        table: &'static str,
        field: &'static str,
    },

    /// Error surfaced by the database driver
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Type alias for Result with StoreError
pub type StoreResult<T> = Result<T, StoreError>;

/// A record type persisted in one table
pub trait Stored: for<'r> FromRow<'r, PgRow> + Send + Unpin {
    /// Table backing this record type
    const TABLE: &'static str;
    /// Column list used for SELECT and RETURNING
    const COLUMNS: &'static str;
}

/// A bindable field value
///
/// Carries every value shape the two collections store, so callers can pass
/// heterogeneous field lists without generics leaking into call sites.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Id(Uuid),
    Text(String),
    IdList(Vec<Uuid>),
    TextList(Vec<String>),
}

impl From<Uuid> for FieldValue {
    fn from(value: Uuid) -> Self {
        FieldValue::Id(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<Vec<Uuid>> for FieldValue {
    fn from(value: Vec<Uuid>) -> Self {
        FieldValue::IdList(value)
    }
}

impl From<Vec<String>> for FieldValue {
    fn from(value: Vec<String>) -> Self {
        FieldValue::TextList(value)
    }
}

fn bind_as<'q, R>(
    query: QueryAs<'q, Postgres, R, PgArguments>,
    value: &FieldValue,
) -> QueryAs<'q, Postgres, R, PgArguments>
where
    R: for<'r> FromRow<'r, PgRow>,
{
    match value {
        FieldValue::Id(v) => query.bind(*v),
        FieldValue::Text(v) => query.bind(v.clone()),
        FieldValue::IdList(v) => query.bind(v.clone()),
        FieldValue::TextList(v) => query.bind(v.clone()),
    }
}

fn bind_plain<'q>(
    query: Query<'q, Postgres, PgArguments>,
    value: &FieldValue,
) -> Query<'q, Postgres, PgArguments> {
    match value {
        FieldValue::Id(v) => query.bind(*v),
        FieldValue::Text(v) => query.bind(v.clone()),
        FieldValue::IdList(v) => query.bind(v.clone()),
        FieldValue::TextList(v) => query.bind(v.clone()),
    }
}

fn select_sql(table: &str, columns: &str, field: &str) -> String {
    format!("SELECT {columns} FROM {table} WHERE {field} = $1")
}

fn delete_sql(table: &str, field: &str) -> String {
    format!("DELETE FROM {table} WHERE {field} = $1")
}

fn update_sql(table: &str, columns: &str, field: &str, changed: &[&str]) -> String {
    let assignments: Vec<String> = changed
        .iter()
        .enumerate()
        .map(|(i, column)| format!("{column} = ${}", i + 2))
        .collect();
    format!(
        "UPDATE {table} SET {}, updated_at = now() WHERE {field} = $1 RETURNING {columns}",
        assignments.join(", ")
    )
}

fn insert_sql(table: &str, columns: &str, fields: &[&str]) -> String {
    let placeholders: Vec<String> = (1..=fields.len()).map(|i| format!("${i}")).collect();
    format!(
        "INSERT INTO {table} ({}) VALUES ({}) RETURNING {columns}",
        fields.join(", "),
        placeholders.join(", ")
    )
}

/// Find at most one row whose `field` equals `value`
pub async fn find_one_by<R: Stored>(
    conn: &mut PgConnection,
    field: &'static str,
    value: &FieldValue,
) -> StoreResult<Option<R>> {
    let sql = select_sql(R::TABLE, R::COLUMNS, field);
    let query = bind_as(sqlx::query_as::<_, R>(&sql), value);
    Ok(query.fetch_optional(conn).await?)
}

/// Find every row whose `field` equals `value`; no match is an empty vec
pub async fn find_all_by<R: Stored>(
    conn: &mut PgConnection,
    field: &'static str,
    value: &FieldValue,
) -> StoreResult<Vec<R>> {
    let sql = select_sql(R::TABLE, R::COLUMNS, field);
    let query = bind_as(sqlx::query_as::<_, R>(&sql), value);
    Ok(query.fetch_all(conn).await?)
}

/// Delete the row targeted by a unique `field`
pub async fn delete_one_by<R: Stored>(
    conn: &mut PgConnection,
    field: &'static str,
    value: &FieldValue,
) -> StoreResult<()> {
    let sql = delete_sql(R::TABLE, field);
    let result = bind_plain(sqlx::query(&sql), value).execute(conn).await?;
    if result.rows_affected() == 0 {
        return Err(StoreError::NotFound {
            table: R::TABLE,
            field,
        });
    }
    Ok(())
}

/// Apply `changes` to the row targeted by a unique `field`
///
/// An empty change set reads the row back unchanged. `updated_at` is
/// refreshed on every write.
pub async fn update_one_by<R: Stored>(
    conn: &mut PgConnection,
    field: &'static str,
    value: &FieldValue,
    changes: &[(&'static str, FieldValue)],
) -> StoreResult<R> {
    if changes.is_empty() {
        return find_one_by(conn, field, value)
            .await?
            .ok_or(StoreError::NotFound {
                table: R::TABLE,
                field,
            });
    }

    let columns: Vec<&str> = changes.iter().map(|(column, _)| *column).collect();
    let sql = update_sql(R::TABLE, R::COLUMNS, field, &columns);
    let mut query = bind_as(sqlx::query_as::<_, R>(&sql), value);
    for (_, change) in changes {
        query = bind_as(query, change);
    }
    query
        .fetch_optional(conn)
        .await?
        .ok_or(StoreError::NotFound {
            table: R::TABLE,
            field,
        })
}

/// Insert a new row built from `fields`
pub async fn insert_one<R: Stored>(
    conn: &mut PgConnection,
    fields: &[(&'static str, FieldValue)],
) -> StoreResult<R> {
    let columns: Vec<&str> = fields.iter().map(|(column, _)| *column).collect();
    let sql = insert_sql(R::TABLE, R::COLUMNS, &columns);
    let mut query = sqlx::query_as::<_, R>(&sql);
    for (_, value) in fields {
        query = bind_as(query, value);
    }
    Ok(query.fetch_one(conn).await?)
}

/// True when the driver reported a unique-constraint violation
pub fn is_unique_violation(error: &StoreError) -> bool {
    match error {
        StoreError::Database(source) => source
            .as_database_error()
            .and_then(|db| db.code())
            .is_some_and(|code| code == "23505"),
        StoreError::NotFound { .. } => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_sql_targets_single_field() {
        assert_eq!(
            select_sql("devices", "id, mac_address", "mac_address"),
            "SELECT id, mac_address FROM devices WHERE mac_address = $1"
        );
    }

    #[test]
    fn test_delete_sql_targets_single_field() {
        assert_eq!(
            delete_sql("devices", "id"),
            "DELETE FROM devices WHERE id = $1"
        );
    }

    #[test]
    fn test_update_sql_numbers_placeholders_after_key() {
        assert_eq!(
            update_sql("devices", "id, battery", "mac_address", &["device_name", "battery"]),
            "UPDATE devices SET device_name = $2, battery = $3, updated_at = now() \
             WHERE mac_address = $1 RETURNING id, battery"
        );
    }

    #[test]
    fn test_insert_sql_lists_all_fields() {
        assert_eq!(
            insert_sql("users", "id, user_name", &["user_name", "user_email"]),
            "INSERT INTO users (user_name, user_email) VALUES ($1, $2) RETURNING id, user_name"
        );
    }

    #[test]
    fn test_field_value_conversions() {
        assert_eq!(
            FieldValue::from("aa:bb"),
            FieldValue::Text("aa:bb".to_string())
        );
        let id = Uuid::new_v4();
        assert_eq!(FieldValue::from(id), FieldValue::Id(id));
        assert_eq!(
            FieldValue::from(vec!["default_group".to_string()]),
            FieldValue::TextList(vec!["default_group".to_string()])
        );
    }
}
