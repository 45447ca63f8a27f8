//! Core persistence machinery

pub mod condition;
pub mod convert;
pub mod database;
pub mod error;
pub mod reconcile;
pub mod schema;
pub mod unique;
pub mod value;

pub use condition::{build_where, Condition, ConditionOp, Junction};
pub use convert::{
    convert, register_conversion, ConvertFn, CustomSqlType, FromSqlValue, SqlEnum, StringId,
};
pub use database::{
    escape_sql, prepare_placeholders, Backend, ConnectionBuilder, Database, QueryOutput,
    RawCommand, SelectOptions,
};
pub use error::{DbError, Result};
pub use reconcile::{create_db_struct, drop_structure, TableRegistration};
pub use schema::{
    column_definition, declared_fields, is_type_equal, result_fields, select_fields,
    storage_type, ColumnInfo, FieldDescriptor, Record, SqlType, TableSchema,
};
pub use unique::{
    generate_unique_id, generate_unique_id_with, generate_unique_string_id,
    generate_unique_string_id_with, DEFAULT_ID_TRIES,
};
pub use value::SqlValue;
