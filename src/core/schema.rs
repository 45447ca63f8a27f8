//! Declarative record schemas
//!
//! A record type declares its persisted fields once as a static
//! [`TableSchema`]. The resolver turns that declaration into the ordered
//! field set used for SQL generation, either from the declaration alone or
//! shaped by the columns a query actually returned.

use super::error::{DbError, Result};
use super::value::SqlValue;
use serde::Serialize;

/// Logical type of a persisted field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SqlType {
    /// 32-bit integer
    Integer,
    /// 64-bit integer
    BigInt,
    /// 32-bit floating point
    Float,
    /// 64-bit floating point
    Double,
    /// Text, sized or unbounded
    Text,
    /// Byte sequence, size annotation required
    Bytes,
    /// Boolean
    Bool,
    /// Calendar date and time
    DateTime,
    /// Elapsed time
    TimeSpan,
    /// Enum persisted as its integer discriminant
    Enum,
    /// User-declared wire type name, used verbatim in DDL
    Custom(&'static str),
}

/// Resolved metadata about one persisted attribute of a record type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FieldDescriptor {
    /// Column name
    pub name: &'static str,
    /// Logical type
    pub sql_type: SqlType,
    /// Explicit storage size
    pub size: Option<u32>,
    /// Primary key marker
    pub primary: bool,
    /// Whether the column accepts NULL
    pub nullable: bool,
    /// Excluded from generated SQL in both directions
    pub ignored: bool,
}

impl FieldDescriptor {
    /// Declare a field with the given name and logical type
    pub const fn new(name: &'static str, sql_type: SqlType) -> Self {
        Self {
            name,
            sql_type,
            size: None,
            primary: false,
            nullable: false,
            ignored: false,
        }
    }

    /// Set an explicit storage size
    pub const fn with_size(mut self, size: u32) -> Self {
        self.size = Some(size);
        self
    }

    /// Mark this field as the primary key
    pub const fn primary_key(mut self) -> Self {
        self.primary = true;
        self
    }

    /// Allow NULL in this column
    pub const fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Exclude this field from persistence
    pub const fn ignored(mut self) -> Self {
        self.ignored = true;
        self
    }
}

/// Static schema declaration of a record type
#[derive(Debug, Clone, Copy, Serialize)]
pub struct TableSchema {
    /// Record type name, used in diagnostics
    pub record: &'static str,
    /// Apply a binary collation to text columns of this table
    pub case_sensitive: bool,
    /// Declared fields, persisted and ignored alike
    pub fields: &'static [FieldDescriptor],
}

/// A data record that can be persisted and materialized by the executor
pub trait Record: Default + Send + Sync + 'static {
    /// Static schema declaration for this type
    fn schema() -> &'static TableSchema;

    /// Outbound: current value of a field as a bindable wire value
    fn get(&self, field: &str) -> SqlValue;

    /// Inbound: assign a wire value to a field, coercing as needed
    fn set(&mut self, field: &str, value: SqlValue) -> Result<()>;
}

/// One column of a live table or result set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    /// Column name
    pub name: String,
    /// Declared wire type, absent for computed result columns
    pub decl_type: Option<String>,
    /// Whether the column accepts NULL
    pub nullable: bool,
}

/// Storage type name for a field, without the nullability modifier
pub fn storage_type(field: &FieldDescriptor) -> Result<String> {
    if let SqlType::Custom(name) = field.sql_type {
        return Ok(name.to_string());
    }

    let sized = |base: &str| match field.size {
        Some(n) => format!("{base}({n})"),
        None => base.to_string(),
    };

    match field.sql_type {
        SqlType::Text => Ok(match field.size {
            Some(n) => format!("VARCHAR({n})"),
            None => "TEXT".to_string(),
        }),
        SqlType::Bytes => match field.size {
            Some(n) => Ok(format!("VARBINARY({n})")),
            None => Err(DbError::configuration(format!(
                "Size attribute is required for byte sequence field `{}`",
                field.name
            ))),
        },
        SqlType::Integer | SqlType::Enum => Ok(sized("INT")),
        SqlType::BigInt => Ok(sized("BIGINT")),
        SqlType::Float => Ok(sized("FLOAT")),
        SqlType::Double => Ok(sized("DOUBLE")),
        SqlType::TimeSpan => Ok(sized("TIME")),
        SqlType::DateTime => Ok(sized("DATETIME")),
        SqlType::Bool => Ok("BOOLEAN".to_string()),
        SqlType::Custom(_) => unreachable!(),
    }
}

/// Full column definition: storage type, optional collation, nullability
pub fn column_definition(field: &FieldDescriptor, collation: Option<&str>) -> Result<String> {
    let mut def = storage_type(field)?;
    if let Some(coll) = collation {
        if matches!(field.sql_type, SqlType::Text | SqlType::Custom(_)) {
            def.push_str(" COLLATE ");
            def.push_str(coll);
        }
    }
    def.push_str(if field.nullable { " NULL" } else { " NOT NULL" });
    Ok(def)
}

/// Compatibility between a live column and a declared field.
///
/// A custom storage type matches on its declared wire name alone. Otherwise
/// nullability must agree on both sides, an integer column accepts an enum
/// field, and anything else must match the field's storage type name.
/// Columns with no declared type (computed result columns) are treated as
/// compatible.
pub fn is_type_equal(decl_type: Option<&str>, field: &FieldDescriptor, wire_nullable: bool) -> bool {
    let Some(decl) = decl_type else {
        return true;
    };

    if let SqlType::Custom(name) = field.sql_type {
        return decl.eq_ignore_ascii_case(name);
    }

    if wire_nullable != field.nullable {
        return false;
    }

    if field.sql_type == SqlType::Enum && decl.to_ascii_uppercase().starts_with("INT") {
        return true;
    }

    match storage_type(field) {
        Ok(expected) => decl.eq_ignore_ascii_case(&expected),
        Err(_) => false,
    }
}

/// Declaration mode: every non-ignored field, in declared order
pub fn declared_fields(schema: &'static TableSchema) -> Vec<&'static FieldDescriptor> {
    schema.fields.iter().filter(|f| !f.ignored).collect()
}

/// Result-shape mode: fields matched to returned wire columns, paired with
/// the column index they came from.
///
/// Columns with no matching field are logged at warning level and skipped;
/// ignored fields are skipped silently even when they match.
pub fn result_fields(
    schema: &'static TableSchema,
    columns: &[ColumnInfo],
) -> Vec<(usize, &'static FieldDescriptor)> {
    let mut fields = Vec::with_capacity(columns.len());
    for (index, col) in columns.iter().enumerate() {
        let found = schema
            .fields
            .iter()
            .find(|f| f.name == col.name && is_type_equal(col.decl_type.as_deref(), f, col.nullable));
        match found {
            Some(f) if f.ignored => {}
            Some(f) => fields.push((index, f)),
            None => {
                log::warn!("Cannot find field `{}` in {}", col.name, schema.record);
            }
        }
    }
    fields
}

/// Resolve an explicit field subset by name.
///
/// Unknown or ignored names are a configuration error.
pub fn select_fields(
    schema: &'static TableSchema,
    names: &[&str],
) -> Result<Vec<&'static FieldDescriptor>> {
    let mut fields = Vec::with_capacity(names.len());
    for name in names {
        let field = schema
            .fields
            .iter()
            .find(|f| f.name == *name && !f.ignored)
            .ok_or_else(|| {
                DbError::configuration(format!(
                    "No persisted field `{}` in {}",
                    name, schema.record
                ))
            })?;
        fields.push(field);
    }
    Ok(fields)
}
