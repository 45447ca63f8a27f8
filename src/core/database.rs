//! Command executor over a single locked connection
//!
//! All SQL funnels through one connection guarded by an async mutex, so
//! operations serialize in arrival order. Blocking driver work runs on the
//! blocking pool. When the driver reports a connection-level failure the
//! executor reopens from the stored connection string and retries the
//! command exactly once.

use super::condition::{build_where, Condition};
use super::convert::FromSqlValue;
use super::error::{DbError, Result};
use super::schema::{
    declared_fields, result_fields, select_fields, ColumnInfo, FieldDescriptor, Record,
};
use super::value::SqlValue;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Columns and rows returned by a query
#[derive(Debug, Clone)]
pub struct QueryOutput {
    /// Result columns with whatever type information the driver exposes
    pub columns: Vec<ColumnInfo>,
    /// Rows in wire representation
    pub rows: Vec<Vec<SqlValue>>,
}

/// Driver seam between the executor and one SQL dialect
pub trait Backend: Send + Sync + 'static {
    /// Driver connection handle
    type Conn: Send;

    /// Open a connection from an opaque connection string
    fn open(conn_string: &str) -> Result<Self::Conn>;

    /// Run a statement, returning the affected row count
    fn execute(conn: &mut Self::Conn, sql: &str, params: &[SqlValue]) -> Result<u64>;

    /// Run a query, returning columns and rows
    fn query(conn: &mut Self::Conn, sql: &str, params: &[SqlValue]) -> Result<QueryOutput>;

    /// Whether a table exists in the live database
    fn table_exists(conn: &mut Self::Conn, table: &str) -> Result<bool>;

    /// Live column snapshot of a table
    fn table_columns(conn: &mut Self::Conn, table: &str) -> Result<Vec<ColumnInfo>>;

    /// Current primary key column of a table, if any
    fn primary_key_column(conn: &mut Self::Conn, table: &str) -> Result<Option<String>>;

    /// Classify an error as connection loss, triggering the retry path
    fn is_connection_error(err: &DbError) -> bool;

    /// Collation token applied to text columns of case-sensitive tables
    fn collation_token(case_sensitive: bool) -> Option<&'static str>;

    /// Statement installing the primary key on a column
    fn add_primary_key_sql(table: &str, column: &str) -> String;

    /// Statement removing the current primary key
    fn drop_primary_key_sql(table: &str) -> String;

    /// Default literal required when adding a NOT NULL column to a
    /// populated table
    fn default_literal(field: &FieldDescriptor) -> &'static str;
}

struct State<B: Backend> {
    conn: Option<B::Conn>,
    conn_string: Option<String>,
}

static NEXT_DATABASE_ID: AtomicU64 = AtomicU64::new(1);

/// Row-limit and projection options for [`Database::get_data_with`]
#[derive(Debug, Clone, Copy)]
pub struct SelectOptions<'a> {
    /// Select-head expression used when no field projection is given
    pub filter: &'a str,
    /// ORDER BY expression, empty for none
    pub order_by: &'a str,
    /// Explicit field projection by name
    pub fields: Option<&'a [&'a str]>,
    /// Maximum row count, zero or negative for unlimited
    pub limit: i64,
}

impl Default for SelectOptions<'_> {
    fn default() -> Self {
        SelectOptions {
            filter: "*",
            order_by: "",
            fields: None,
            limit: -1,
        }
    }
}

/// A raw SQL command bound to the executor that created it
#[derive(Debug, Clone)]
pub struct RawCommand {
    /// Statement text with `?c0`-style placeholders
    pub sql: String,
    /// Positional arguments
    pub args: Vec<SqlValue>,
    origin: u64,
}

/// Async executor over a single locked driver connection
pub struct Database<B: Backend> {
    id: u64,
    state: Arc<Mutex<State<B>>>,
}

impl<B: Backend> Clone for Database<B> {
    fn clone(&self) -> Self {
        Database {
            id: self.id,
            state: Arc::clone(&self.state),
        }
    }
}

impl<B: Backend> Default for Database<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: Backend> Database<B> {
    /// Create a disconnected executor
    pub fn new() -> Self {
        Database {
            id: NEXT_DATABASE_ID.fetch_add(1, Ordering::Relaxed),
            state: Arc::new(Mutex::new(State {
                conn: None,
                conn_string: None,
            })),
        }
    }

    /// Open the connection and remember the connection string for
    /// reconnects
    pub async fn connect(&self, conn_string: &str) -> Result<()> {
        let state = Arc::clone(&self.state);
        let cs = conn_string.to_string();
        tokio::task::spawn_blocking(move || {
            let conn = B::open(&cs)?;
            let mut guard = state.blocking_lock();
            guard.conn = Some(conn);
            guard.conn_string = Some(cs);
            Ok(())
        })
        .await
        .map_err(|e| DbError::other(format!("Blocking task failed: {e}")))?
    }

    /// Whether a connection is currently open
    pub async fn is_alive(&self) -> bool {
        self.state.lock().await.conn.is_some()
    }

    /// Drop the connection, keeping the connection string
    pub async fn disconnect(&self) {
        self.state.lock().await.conn = None;
    }

    /// Run a closure against the locked connection, reconnecting and
    /// retrying once on connection loss.
    async fn with_conn<R, F>(&self, f: F) -> Result<R>
    where
        R: Send + 'static,
        F: Fn(&mut B::Conn) -> Result<R> + Send + 'static,
    {
        let state = Arc::clone(&self.state);
        tokio::task::spawn_blocking(move || {
            let mut guard = state.blocking_lock();
            if guard.conn.is_none() {
                let cs = guard
                    .conn_string
                    .clone()
                    .ok_or_else(|| DbError::connection("Not connected"))?;
                guard.conn = Some(B::open(&cs)?);
            }
            let conn = match guard.conn.as_mut() {
                Some(c) => c,
                None => return Err(DbError::connection("Not connected")),
            };
            match f(conn) {
                Ok(v) => Ok(v),
                Err(e) if B::is_connection_error(&e) => {
                    log::error!("Connection lost, reconnecting: {e}");
                    guard.conn = None;
                    let cs = match guard.conn_string.clone() {
                        Some(cs) => cs,
                        None => return Err(e),
                    };
                    let mut fresh = B::open(&cs)?;
                    let out = f(&mut fresh);
                    guard.conn = Some(fresh);
                    out
                }
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(|e| DbError::other(format!("Blocking task failed: {e}")))?
    }

    /// Count rows of an arbitrary table matching the conditions
    pub async fn count_where(&self, table: &str, conditions: &[Condition]) -> Result<i64> {
        let (where_sql, params) = build_where(conditions);
        let sql = format!("SELECT COUNT(*) FROM `{}`{}", escape_sql(table), where_sql);
        let output = self.with_conn(move |conn| B::query(conn, &sql, &params)).await?;
        output
            .rows
            .first()
            .and_then(|r| r.first())
            .and_then(|v| v.as_long())
            .ok_or_else(|| DbError::schema_mismatch("COUNT query returned no value"))
    }

    /// Count rows of a record's table matching the conditions
    pub async fn count<T: Record>(&self, conditions: &[Condition]) -> Result<i64> {
        self.count_where(T::schema().record, conditions).await
    }

    /// Delete matching rows, returning the affected count
    pub async fn delete<T: Record>(&self, conditions: &[Condition]) -> Result<u64> {
        let (where_sql, params) = build_where(conditions);
        let sql = format!("DELETE FROM `{}`{}", T::schema().record, where_sql);
        self.with_conn(move |conn| B::execute(conn, &sql, &params))
            .await
    }

    /// Update the named fields of matching rows from a record's current
    /// values. An empty field list updates every persisted field.
    pub async fn update<T: Record>(
        &self,
        record: &T,
        fields: &[&str],
        conditions: &[Condition],
    ) -> Result<u64> {
        let schema = T::schema();
        let fields = if fields.is_empty() {
            declared_fields(schema)
        } else {
            select_fields(schema, fields)?
        };
        if fields.is_empty() {
            return Err(DbError::configuration(format!(
                "No persisted fields in {}",
                schema.record
            )));
        }

        let assignments: Vec<String> = fields.iter().map(|f| format!("`{}` = ?", f.name)).collect();
        let (where_sql, where_params) = build_where(conditions);
        let sql = format!(
            "UPDATE `{}` SET {}{}",
            schema.record,
            assignments.join(", "),
            where_sql
        );

        // SET parameters precede WHERE parameters
        let mut params: Vec<SqlValue> = fields.iter().map(|f| record.get(f.name)).collect();
        params.extend(where_params);

        self.with_conn(move |conn| B::execute(conn, &sql, &params))
            .await
    }

    /// Insert one record
    pub async fn insert_data<T: Record>(&self, record: &T) -> Result<u64> {
        self.insert_array(std::slice::from_ref(record)).await
    }

    /// Insert an array of records in a single statement.
    ///
    /// An empty array is a no-op with zero round-trips.
    pub async fn insert_array<T: Record>(&self, records: &[T]) -> Result<u64> {
        if records.is_empty() {
            return Ok(0);
        }
        let schema = T::schema();
        let fields = declared_fields(schema);
        if fields.is_empty() {
            return Err(DbError::configuration(format!(
                "No persisted fields in {}",
                schema.record
            )));
        }

        let columns: Vec<String> = fields.iter().map(|f| format!("`{}`", f.name)).collect();
        let group = format!(
            "({})",
            std::iter::repeat("?")
                .take(fields.len())
                .collect::<Vec<_>>()
                .join(", ")
        );
        let groups: Vec<&str> = std::iter::repeat(group.as_str()).take(records.len()).collect();
        let sql = format!(
            "INSERT INTO `{}` ({}) VALUES {}",
            schema.record,
            columns.join(", "),
            groups.join(", ")
        );

        let mut params = Vec::with_capacity(records.len() * fields.len());
        for record in records {
            for field in &fields {
                params.push(record.get(field.name));
            }
        }

        self.with_conn(move |conn| B::execute(conn, &sql, &params))
            .await
    }

    /// Fetch matching records with default options
    pub async fn get_data<T: Record>(&self, conditions: &[Condition]) -> Result<Vec<T>> {
        self.get_data_with(SelectOptions::default(), conditions).await
    }

    /// Fetch matching records with projection, ordering and limit options
    pub async fn get_data_with<T: Record>(
        &self,
        options: SelectOptions<'_>,
        conditions: &[Condition],
    ) -> Result<Vec<T>> {
        let schema = T::schema();
        let head = match options.fields {
            Some(names) => {
                let fields = select_fields(schema, names)?;
                fields
                    .iter()
                    .map(|f| format!("`{}`", f.name))
                    .collect::<Vec<_>>()
                    .join(", ")
            }
            None => escape_sql(options.filter),
        };

        let (where_sql, params) = build_where(conditions);
        let mut sql = format!("SELECT {} FROM `{}`{}", head, schema.record, where_sql);
        if !options.order_by.is_empty() {
            sql.push_str(" ORDER BY ");
            sql.push_str(&escape_sql(options.order_by));
        }
        if options.limit > 0 {
            sql.push_str(&format!(" LIMIT {}", options.limit));
        }

        let output = self.with_conn(move |conn| B::query(conn, &sql, &params)).await?;
        materialize(output)
    }

    /// Create a raw command bound to this executor
    pub fn command(&self, sql: &str, args: Vec<SqlValue>) -> RawCommand {
        RawCommand {
            sql: sql.to_string(),
            args,
            origin: self.id,
        }
    }

    /// Run a raw command created by this executor, materializing the rows
    pub async fn run_command<T: Record>(&self, cmd: RawCommand) -> Result<Vec<T>> {
        if cmd.origin != self.id {
            return Err(DbError::Unauthorized);
        }
        self.run_sql(&cmd.sql, cmd.args).await
    }

    /// Run raw SQL with `?c0`-style placeholders, materializing the rows.
    ///
    /// Placeholders are validated against the argument list before the
    /// connection is touched.
    pub async fn run_sql<T: Record>(&self, sql: &str, args: Vec<SqlValue>) -> Result<Vec<T>> {
        let sql = prepare_placeholders(sql, args.len())?;
        let output = self.with_conn(move |conn| B::query(conn, &sql, &args)).await?;
        materialize(output)
    }

    /// Run raw SQL returning the first column of each row as a scalar
    pub async fn run_sql_scalars<T: FromSqlValue>(
        &self,
        sql: &str,
        args: Vec<SqlValue>,
    ) -> Result<Vec<T>> {
        let sql = prepare_placeholders(sql, args.len())?;
        let output = self.with_conn(move |conn| B::query(conn, &sql, &args)).await?;
        output
            .rows
            .into_iter()
            .map(|mut row| {
                if row.is_empty() {
                    return Err(DbError::schema_mismatch("Scalar query returned no column"));
                }
                T::from_sql_value(row.swap_remove(0))
            })
            .collect()
    }

    /// Run a raw statement with `?c0`-style placeholders, returning the
    /// affected row count
    pub async fn execute_raw(&self, sql: &str, args: Vec<SqlValue>) -> Result<u64> {
        let sql = prepare_placeholders(sql, args.len())?;
        self.with_conn(move |conn| B::execute(conn, &sql, &args))
            .await
    }

    /// Whether a table exists in the live database
    pub async fn table_exists(&self, table: &str) -> Result<bool> {
        let table = table.to_string();
        self.with_conn(move |conn| B::table_exists(conn, &table)).await
    }

    /// Live column snapshot of a table, read fresh on every call
    pub async fn table_columns(&self, table: &str) -> Result<Vec<ColumnInfo>> {
        let table = table.to_string();
        self.with_conn(move |conn| B::table_columns(conn, &table)).await
    }

    /// Current primary key column of a table, if any
    pub async fn primary_key_column(&self, table: &str) -> Result<Option<String>> {
        let table = table.to_string();
        self.with_conn(move |conn| B::primary_key_column(conn, &table))
            .await
    }
}

/// Turn a query result into records in result-shape mode.
///
/// Columns are matched to fields by name and type compatibility. A result
/// shape with columns that resolve to no field cannot be read back and is a
/// schema mismatch.
fn materialize<T: Record>(output: QueryOutput) -> Result<Vec<T>> {
    let schema = T::schema();
    let mapping = result_fields(schema, &output.columns);
    if mapping.len() != output.columns.len() {
        return Err(DbError::schema_mismatch(format!(
            "Result shape does not match fields of {}: {} columns resolved to {} fields",
            schema.record,
            output.columns.len(),
            mapping.len()
        )));
    }

    let mut out = Vec::with_capacity(output.rows.len());
    for row in output.rows {
        let mut record = T::default();
        for &(i, field) in &mapping {
            let value = row.get(i).cloned().unwrap_or(SqlValue::Null);
            record.set(field.name, value)?;
        }
        out.push(record);
    }
    Ok(out)
}

/// Neutralize quote, backslash, wildcard and control characters in text
/// that is embedded directly into statement text.
///
/// Parameterized values never pass through here.
pub fn escape_sql(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '\'' => out.push_str("\\'"),
            '"' => out.push_str("\\\""),
            '\u{8}' => out.push_str("\\b"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\\' => out.push_str("\\\\"),
            '%' => out.push_str("\\%"),
            _ => out.push(c),
        }
    }
    out
}

/// Validate `?c0`-style placeholders against the argument count and rewrite
/// them to driver-native positional placeholders.
///
/// Every argument must be referenced at least once and every referenced
/// index must have an argument, otherwise the statement is rejected before
/// it reaches the connection.
pub fn prepare_placeholders(sql: &str, arg_count: usize) -> Result<String> {
    let mut out = String::with_capacity(sql.len());
    let mut seen = vec![false; arg_count];
    let mut rest = sql;

    while let Some(pos) = rest.find("?c") {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 2..];
        let digits = after.chars().take_while(|c| c.is_ascii_digit()).count();
        if digits == 0 {
            return Err(DbError::configuration(format!(
                "Malformed placeholder in `{sql}`"
            )));
        }
        let index: usize = after[..digits]
            .parse()
            .map_err(|_| DbError::configuration(format!("Malformed placeholder in `{sql}`")))?;
        if index >= arg_count {
            return Err(DbError::configuration(format!(
                "Placeholder ?c{index} has no matching argument"
            )));
        }
        seen[index] = true;
        out.push('?');
        out.push_str(&(index + 1).to_string());
        rest = &after[digits..];
    }
    out.push_str(rest);

    for (index, referenced) in seen.iter().enumerate() {
        if !referenced {
            return Err(DbError::configuration(format!(
                "Argument {index} is never referenced"
            )));
        }
    }
    Ok(out)
}

/// Builder for opaque connection strings
#[derive(Debug, Clone, Default)]
pub struct ConnectionBuilder {
    host: Option<String>,
    port: Option<u16>,
    username: Option<String>,
    password: Option<String>,
    database: Option<String>,
}

impl ConnectionBuilder {
    /// Create an empty builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the server host
    pub fn host(mut self, host: &str) -> Self {
        self.host = Some(host.to_string());
        self
    }

    /// Set the server port
    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Set the user name
    pub fn username(mut self, username: &str) -> Self {
        self.username = Some(username.to_string());
        self
    }

    /// Set the password
    pub fn password(mut self, password: &str) -> Self {
        self.password = Some(password.to_string());
        self
    }

    /// Set the database name or file path
    pub fn database(mut self, database: &str) -> Self {
        self.database = Some(database.to_string());
        self
    }

    /// Build the connection string
    pub fn build(&self) -> String {
        let mut parts = Vec::new();
        if let Some(host) = &self.host {
            parts.push(format!("host={host}"));
        }
        if let Some(port) = self.port {
            parts.push(format!("port={port}"));
        }
        if let Some(username) = &self.username {
            parts.push(format!("user={username}"));
        }
        if let Some(password) = &self.password {
            parts.push(format!("password={password}"));
        }
        if let Some(database) = &self.database {
            parts.push(format!("database={database}"));
        }
        parts.join(";")
    }
}
