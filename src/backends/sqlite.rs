//! SQLite backend
//!
//! Driver glue over `rusqlite` with the bundled engine. The primary key is
//! modeled as a named unique index `{table}_pkey` so key transitions can be
//! expressed as independent DROP and CREATE statements, which SQLite's
//! ALTER TABLE cannot do for a table-level key.

use crate::core::convert::format_datetime;
use crate::core::database::{Backend, QueryOutput};
use crate::core::error::{DbError, Result};
use crate::core::schema::{ColumnInfo, FieldDescriptor, SqlType};
use crate::core::value::SqlValue;
use rusqlite::types::Value;
use rusqlite::Connection;

/// `rusqlite`-backed driver
pub struct SqliteBackend;

impl SqliteBackend {
    fn pkey_index(table: &str) -> String {
        format!("{table}_pkey")
    }
}

/// Serialize a wire value into a driver parameter
fn bind_value(value: &SqlValue) -> Value {
    match value {
        SqlValue::Null => Value::Null,
        SqlValue::Bool(b) => Value::Integer(*b as i64),
        SqlValue::Int(i) => Value::Integer(*i as i64),
        SqlValue::Long(i) => Value::Integer(*i),
        SqlValue::Float(f) => Value::Real(*f as f64),
        SqlValue::Double(d) => Value::Real(*d),
        SqlValue::Text(s) => Value::Text(s.clone()),
        SqlValue::Bytes(b) => Value::Blob(b.clone()),
        SqlValue::DateTime(dt) => Value::Text(format_datetime(dt)),
        // Whole microseconds, saturating on overflow
        SqlValue::TimeSpan(d) => {
            Value::Integer(i64::try_from(d.as_micros()).unwrap_or(i64::MAX))
        }
    }
}

/// Lift a driver value into the wire representation.
///
/// SQLite only distinguishes the storage classes, so integers come back as
/// `Long` and reals as `Double`; inbound coercion narrows them per field.
fn from_driver(value: Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Integer(i) => SqlValue::Long(i),
        Value::Real(r) => SqlValue::Double(r),
        Value::Text(s) => SqlValue::Text(s),
        Value::Blob(b) => SqlValue::Bytes(b),
    }
}

impl Backend for SqliteBackend {
    type Conn = Connection;

    fn open(conn_string: &str) -> Result<Connection> {
        let path = conn_string
            .split(';')
            .find_map(|part| part.strip_prefix("database="))
            .unwrap_or(conn_string);
        let conn = if path == ":memory:" {
            Connection::open_in_memory()?
        } else {
            Connection::open(path)?
        };
        Ok(conn)
    }

    fn execute(conn: &mut Connection, sql: &str, params: &[SqlValue]) -> Result<u64> {
        let mut stmt = conn.prepare(sql)?;
        let bound: Vec<Value> = params.iter().map(bind_value).collect();
        let affected = stmt.execute(rusqlite::params_from_iter(bound))?;
        Ok(affected as u64)
    }

    fn query(conn: &mut Connection, sql: &str, params: &[SqlValue]) -> Result<QueryOutput> {
        let mut stmt = conn.prepare(sql)?;
        let column_count = stmt.column_count();
        // Result metadata carries neither a declared type nor nullability,
        // so matching falls back to column names
        let columns: Vec<ColumnInfo> = stmt
            .column_names()
            .into_iter()
            .map(|name| ColumnInfo {
                name: name.to_string(),
                decl_type: None,
                nullable: false,
            })
            .collect();

        let bound: Vec<Value> = params.iter().map(bind_value).collect();
        let mut driver_rows = stmt.query(rusqlite::params_from_iter(bound))?;
        let mut rows = Vec::new();
        while let Some(row) = driver_rows.next()? {
            let mut cells = Vec::with_capacity(column_count);
            for i in 0..column_count {
                let value: Value = row.get(i)?;
                cells.push(from_driver(value));
            }
            rows.push(cells);
        }

        Ok(QueryOutput { columns, rows })
    }

    fn table_exists(conn: &mut Connection, table: &str) -> Result<bool> {
        let mut stmt = conn
            .prepare("SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1")?;
        let count: i64 = stmt.query_row([table], |row| row.get(0))?;
        Ok(count > 0)
    }

    fn table_columns(conn: &mut Connection, table: &str) -> Result<Vec<ColumnInfo>> {
        let sql = format!("PRAGMA table_info(`{table}`)");
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query([])?;
        let mut columns = Vec::new();
        while let Some(row) = rows.next()? {
            let name: String = row.get("name")?;
            let decl_type: String = row.get("type")?;
            let notnull: i64 = row.get("notnull")?;
            columns.push(ColumnInfo {
                name,
                decl_type: Some(decl_type),
                nullable: notnull == 0,
            });
        }
        Ok(columns)
    }

    fn primary_key_column(conn: &mut Connection, table: &str) -> Result<Option<String>> {
        let index = Self::pkey_index(table);
        let mut stmt = conn
            .prepare("SELECT COUNT(*) FROM sqlite_master WHERE type = 'index' AND name = ?1")?;
        let count: i64 = stmt.query_row([index.as_str()], |row| row.get(0))?;
        if count > 0 {
            let sql = format!("PRAGMA index_info(`{index}`)");
            let mut stmt = conn.prepare(&sql)?;
            let mut rows = stmt.query([])?;
            if let Some(row) = rows.next()? {
                let name: String = row.get("name")?;
                return Ok(Some(name));
            }
        }

        // Fall back to a column declared PRIMARY KEY in the table itself
        let sql = format!("PRAGMA table_info(`{table}`)");
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let pk: i64 = row.get("pk")?;
            if pk > 0 {
                let name: String = row.get("name")?;
                return Ok(Some(name));
            }
        }
        Ok(None)
    }

    fn is_connection_error(err: &DbError) -> bool {
        match err {
            DbError::ConnectionFailure(_) => true,
            DbError::Driver(rusqlite::Error::SqliteFailure(e, _)) => matches!(
                e.code,
                rusqlite::ErrorCode::CannotOpen
                    | rusqlite::ErrorCode::NotADatabase
                    | rusqlite::ErrorCode::DatabaseCorrupt
            ),
            _ => false,
        }
    }

    fn collation_token(case_sensitive: bool) -> Option<&'static str> {
        if case_sensitive {
            Some("BINARY")
        } else {
            None
        }
    }

    fn add_primary_key_sql(table: &str, column: &str) -> String {
        format!(
            "CREATE UNIQUE INDEX `{}` ON `{table}` (`{column}`)",
            Self::pkey_index(table)
        )
    }

    fn drop_primary_key_sql(table: &str) -> String {
        format!("DROP INDEX `{}`", Self::pkey_index(table))
    }

    fn default_literal(field: &FieldDescriptor) -> &'static str {
        match field.sql_type {
            SqlType::Text | SqlType::Custom(_) => "''",
            SqlType::Bytes => "x''",
            SqlType::DateTime => "'1970-01-01 00:00:00'",
            _ => "0",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_bind_value() {
        assert_eq!(bind_value(&SqlValue::Null), Value::Null);
        assert_eq!(bind_value(&SqlValue::Bool(true)), Value::Integer(1));
        assert_eq!(bind_value(&SqlValue::Int(7)), Value::Integer(7));
        assert_eq!(
            bind_value(&SqlValue::Text("a".into())),
            Value::Text("a".to_string())
        );
        assert_eq!(
            bind_value(&SqlValue::TimeSpan(Duration::from_millis(1500))),
            Value::Integer(1_500_000)
        );
    }

    #[test]
    fn test_from_driver_storage_classes() {
        assert_eq!(from_driver(Value::Integer(5)), SqlValue::Long(5));
        assert_eq!(from_driver(Value::Real(1.5)), SqlValue::Double(1.5));
        assert_eq!(from_driver(Value::Null), SqlValue::Null);
        assert_eq!(
            from_driver(Value::Blob(vec![1, 2])),
            SqlValue::Bytes(vec![1, 2])
        );
    }

    #[test]
    fn test_pkey_statements() {
        assert_eq!(
            SqliteBackend::add_primary_key_sql("Account", "id"),
            "CREATE UNIQUE INDEX `Account_pkey` ON `Account` (`id`)"
        );
        assert_eq!(
            SqliteBackend::drop_primary_key_sql("Account"),
            "DROP INDEX `Account_pkey`"
        );
    }
}
