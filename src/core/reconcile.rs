//! Schema reconciler
//!
//! Drives the live database toward the registered record schemas. Tables
//! are created when missing, existing tables gain missing columns, and a
//! moved primary key is dropped and re-added as two separate statements.
//! Columns are never dropped or retyped.

use super::database::{Backend, Database};
use super::error::{DbError, Result};
use super::schema::{column_definition, declared_fields, is_type_equal, TableSchema};
use super::Record;

/// One record type registered for reconciliation
#[derive(Debug, Clone, Copy)]
pub struct TableRegistration {
    schema: &'static TableSchema,
}

impl TableRegistration {
    /// Register a record type
    pub fn new<T: Record>() -> Self {
        TableRegistration { schema: T::schema() }
    }

    /// The registered schema
    pub fn schema(&self) -> &'static TableSchema {
        self.schema
    }
}

/// Reconcile the live database with the registered schemas.
///
/// Returns the DDL statements that were executed, in order. A second pass
/// over an already reconciled database returns an empty list.
pub async fn create_db_struct<B: Backend>(
    db: &Database<B>,
    registrations: &[TableRegistration],
) -> Result<Vec<String>> {
    let mut executed = Vec::new();

    for registration in registrations {
        let schema = registration.schema;
        let fields = declared_fields(schema);
        if fields.is_empty() {
            continue;
        }

        let table = schema.record;
        let collation = B::collation_token(schema.case_sensitive);
        let primary = fields.iter().find(|f| f.primary).map(|f| f.name);

        if !db.table_exists(table).await? {
            let mut defs = Vec::with_capacity(fields.len());
            for field in &fields {
                defs.push(format!("`{}` {}", field.name, column_definition(field, collation)?));
            }
            let sql = format!("CREATE TABLE `{}` ({})", table, defs.join(", "));
            run_ddl(db, sql, &mut executed).await?;

            // Primary key is installed as a follow-up statement
            if let Some(column) = primary {
                let sql = B::add_primary_key_sql(table, column);
                run_ddl(db, sql, &mut executed).await?;
            }
            continue;
        }

        let live = db.table_columns(table).await?;
        for field in &fields {
            // A live column counts as present only when both the name and
            // the type shape agree. An incompatibly typed column of the
            // same name falls through to ADD COLUMN, whose failure aborts
            // this table's reconciliation.
            let present = live.iter().any(|c| {
                c.name == field.name && is_type_equal(c.decl_type.as_deref(), field, c.nullable)
            });
            if !present {
                let mut sql = format!(
                    "ALTER TABLE `{}` ADD COLUMN `{}` {}",
                    table,
                    field.name,
                    column_definition(field, collation)?
                );
                if !field.nullable {
                    sql.push_str(" DEFAULT ");
                    sql.push_str(B::default_literal(field));
                }
                run_ddl(db, sql, &mut executed).await?;
            }
        }

        let current = db.primary_key_column(table).await?;
        if current.as_deref() != primary {
            // Two independent statements, never a combined rewrite
            if current.is_some() {
                run_ddl(db, B::drop_primary_key_sql(table), &mut executed).await?;
            }
            if let Some(column) = primary {
                run_ddl(db, B::add_primary_key_sql(table, column), &mut executed).await?;
            }
        }
    }

    Ok(executed)
}

/// Drop exactly the tables the registrations would have created.
///
/// Types with no persisted fields are skipped; missing tables are not an
/// error. Returns the executed statements.
pub async fn drop_structure<B: Backend>(
    db: &Database<B>,
    registrations: &[TableRegistration],
) -> Result<Vec<String>> {
    let mut executed = Vec::new();

    for registration in registrations {
        let schema = registration.schema;
        if declared_fields(schema).is_empty() {
            continue;
        }
        if db.table_exists(schema.record).await? {
            let sql = format!("DROP TABLE `{}`", schema.record);
            run_ddl(db, sql, &mut executed).await?;
        }
    }

    Ok(executed)
}

async fn run_ddl<B: Backend>(
    db: &Database<B>,
    sql: String,
    executed: &mut Vec<String>,
) -> Result<()> {
    log::info!("Schema: {sql}");
    db.execute_raw(&sql, Vec::new()).await.map_err(|e| {
        DbError::schema_mismatch(format!("Failed to apply `{sql}`: {e}"))
    })?;
    executed.push(sql);
    Ok(())
}
