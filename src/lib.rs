//! Record-oriented SQL persistence layer
//!
//! Record types declare their persisted fields once as a static schema.
//! From that single declaration the crate generates DDL, reconciles live
//! tables, and builds parameterized SELECT, INSERT, UPDATE and DELETE
//! statements executed over a single locked async connection.
//!
//! # Example
//!
//! ```no_run
//! use recdb::prelude::*;
//!
//! #[derive(Default)]
//! struct Account {
//!     id: i32,
//!     name: String,
//! }
//!
//! static ACCOUNT_FIELDS: &[FieldDescriptor] = &[
//!     FieldDescriptor::new("id", SqlType::Integer).primary_key(),
//!     FieldDescriptor::new("name", SqlType::Text).with_size(64),
//! ];
//!
//! static ACCOUNT_SCHEMA: TableSchema = TableSchema {
//!     record: "Account",
//!     case_sensitive: false,
//!     fields: ACCOUNT_FIELDS,
//! };
//!
//! impl Record for Account {
//!     fn schema() -> &'static TableSchema {
//!         &ACCOUNT_SCHEMA
//!     }
//!
//!     fn get(&self, field: &str) -> SqlValue {
//!         match field {
//!             "id" => self.id.into(),
//!             "name" => self.name.clone().into(),
//!             _ => SqlValue::Null,
//!         }
//!     }
//!
//!     fn set(&mut self, field: &str, value: SqlValue) -> Result<()> {
//!         match field {
//!             "id" => self.id = i32::from_sql_value(value)?,
//!             "name" => self.name = String::from_sql_value(value)?,
//!             _ => {}
//!         }
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let db: Database<SqliteBackend> = Database::new();
//!     db.connect("accounts.db").await?;
//!     create_db_struct(&db, &[TableRegistration::new::<Account>()]).await?;
//!
//!     let account = Account { id: 1, name: "alice".to_string() };
//!     db.insert_data(&account).await?;
//!
//!     let found: Vec<Account> = db.get_data(&[Condition::eq("name", "alice")]).await?;
//!     println!("{} account(s)", found.len());
//!     Ok(())
//! }
//! ```

pub mod backends;
pub mod core;

pub use backends::SqliteBackend;
pub use crate::core::{
    build_where, column_definition, convert, create_db_struct, drop_structure, escape_sql,
    generate_unique_id, generate_unique_string_id, prepare_placeholders, register_conversion,
    storage_type, Backend, ColumnInfo,
    Condition, ConditionOp, ConnectionBuilder, CustomSqlType, Database, DbError, FieldDescriptor,
    FromSqlValue, Junction, QueryOutput, RawCommand, Record, Result, SelectOptions, SqlEnum,
    SqlType, SqlValue, StringId, TableRegistration, TableSchema,
};

/// Common imports for working with the persistence layer
pub mod prelude {
    pub use crate::backends::SqliteBackend;
    pub use crate::core::{
        create_db_struct, drop_structure, generate_unique_id, generate_unique_string_id,
        register_conversion, Backend, Condition, ConditionOp, ConnectionBuilder, CustomSqlType,
        Database, DbError, FieldDescriptor, FromSqlValue, Junction, RawCommand, Record, Result,
        SelectOptions, SqlEnum, SqlType, SqlValue, StringId, TableRegistration, TableSchema,
    };
}
