//! Value coercion between wire values and native field types
//!
//! Inbound coercion first tries a direct variant match, then consults the
//! process-wide conversion registry. The registry is populated with the
//! standard conversions on first use and can be extended at startup with
//! [`register_conversion`].

use super::error::{DbError, Result};
use super::value::SqlValue;
use chrono::NaiveDateTime;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::OnceLock;
use std::time::Duration;

/// Conversion function between two wire representations
pub type ConvertFn = fn(SqlValue) -> Result<SqlValue>;

static REGISTRY: OnceLock<RwLock<HashMap<(&'static str, &'static str), ConvertFn>>> =
    OnceLock::new();

/// Canonical text form of a date-time, written to the database
pub(crate) fn format_datetime(dt: &NaiveDateTime) -> String {
    dt.format("%Y-%m-%d %H:%M:%S%.6f").to_string()
}

/// Parse the canonical date-time text form, with or without fractional seconds
pub(crate) fn parse_datetime(text: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f")
        .map_err(|_| DbError::type_coercion("datetime", "text"))
}

fn standard_conversions() -> HashMap<(&'static str, &'static str), ConvertFn> {
    let mut map: HashMap<(&'static str, &'static str), ConvertFn> = HashMap::new();
    map.insert(("long", "int"), |v| match v.as_int() {
        Some(i) => Ok(SqlValue::Int(i)),
        None => Err(DbError::type_coercion("int", "long")),
    });
    map.insert(("int", "long"), |v| match v.as_long() {
        Some(i) => Ok(SqlValue::Long(i)),
        None => Err(DbError::type_coercion("long", "int")),
    });
    map.insert(("long", "bool"), |v| match v.as_bool() {
        Some(b) => Ok(SqlValue::Bool(b)),
        None => Err(DbError::type_coercion("bool", "long")),
    });
    map.insert(("int", "bool"), |v| match v.as_bool() {
        Some(b) => Ok(SqlValue::Bool(b)),
        None => Err(DbError::type_coercion("bool", "int")),
    });
    map.insert(("long", "double"), |v| match v.as_double() {
        Some(d) => Ok(SqlValue::Double(d)),
        None => Err(DbError::type_coercion("double", "long")),
    });
    map.insert(("long", "float"), |v| match v.as_float() {
        Some(f) => Ok(SqlValue::Float(f)),
        None => Err(DbError::type_coercion("float", "long")),
    });
    map.insert(("double", "float"), |v| match v.as_float() {
        Some(f) => Ok(SqlValue::Float(f)),
        None => Err(DbError::type_coercion("float", "double")),
    });
    map.insert(("float", "double"), |v| match v.as_double() {
        Some(d) => Ok(SqlValue::Double(d)),
        None => Err(DbError::type_coercion("double", "float")),
    });
    map.insert(("text", "int"), |v| match v.as_int() {
        Some(i) => Ok(SqlValue::Int(i)),
        None => Err(DbError::type_coercion("int", "text")),
    });
    map.insert(("text", "long"), |v| match v.as_long() {
        Some(i) => Ok(SqlValue::Long(i)),
        None => Err(DbError::type_coercion("long", "text")),
    });
    map.insert(("text", "datetime"), |v| match v {
        SqlValue::Text(s) => Ok(SqlValue::DateTime(parse_datetime(&s)?)),
        _ => Err(DbError::type_coercion("datetime", "text")),
    });
    map.insert(("datetime", "text"), |v| match v {
        SqlValue::DateTime(dt) => Ok(SqlValue::Text(format_datetime(&dt))),
        _ => Err(DbError::type_coercion("text", "datetime")),
    });
    // Time-spans are stored as whole microseconds
    map.insert(("long", "timespan"), |v| match v {
        SqlValue::Long(micros) => match u64::try_from(micros) {
            Ok(m) => Ok(SqlValue::TimeSpan(Duration::from_micros(m))),
            Err(_) => Err(DbError::type_coercion("timespan", "long")),
        },
        _ => Err(DbError::type_coercion("timespan", "long")),
    });
    map
}

fn registry() -> &'static RwLock<HashMap<(&'static str, &'static str), ConvertFn>> {
    REGISTRY.get_or_init(|| RwLock::new(standard_conversions()))
}

/// Register a conversion between two wire type names.
///
/// Intended to be called once at startup; later registrations replace
/// earlier ones for the same type pair.
pub fn register_conversion(from: &'static str, to: &'static str, f: ConvertFn) {
    registry().write().insert((from, to), f);
}

/// Convert a value between two wire type names via the registry.
///
/// Fails with a type coercion error naming both types when no conversion
/// is registered.
pub fn convert(from: &'static str, to: &'static str, value: SqlValue) -> Result<SqlValue> {
    let f = registry()
        .read()
        .get(&(from, to))
        .copied()
        .ok_or_else(|| DbError::type_coercion(to, from))?;
    f(value)
}

/// Inbound coercion from a wire value into a native field type
pub trait FromSqlValue: Sized {
    /// Wire type name this type coerces from, used as the registry key
    const TYPE_NAME: &'static str;

    /// Coerce a wire value into this type
    fn from_sql_value(value: SqlValue) -> Result<Self>;
}

macro_rules! impl_from_sql_value {
    ($ty:ty, $name:literal, $variant:ident) => {
        impl FromSqlValue for $ty {
            const TYPE_NAME: &'static str = $name;

            fn from_sql_value(value: SqlValue) -> Result<Self> {
                match value {
                    SqlValue::$variant(v) => Ok(v),
                    other => {
                        let from = other.type_name();
                        match convert(from, Self::TYPE_NAME, other)? {
                            SqlValue::$variant(v) => Ok(v),
                            unexpected => Err(DbError::type_coercion(
                                Self::TYPE_NAME,
                                unexpected.type_name(),
                            )),
                        }
                    }
                }
            }
        }
    };
}

impl_from_sql_value!(bool, "bool", Bool);
impl_from_sql_value!(i32, "int", Int);
impl_from_sql_value!(i64, "long", Long);
impl_from_sql_value!(f32, "float", Float);
impl_from_sql_value!(f64, "double", Double);
impl_from_sql_value!(String, "text", Text);
impl_from_sql_value!(Vec<u8>, "bytes", Bytes);
impl_from_sql_value!(NaiveDateTime, "datetime", DateTime);
impl_from_sql_value!(Duration, "timespan", TimeSpan);

impl<T: FromSqlValue> FromSqlValue for Option<T> {
    const TYPE_NAME: &'static str = T::TYPE_NAME;

    fn from_sql_value(value: SqlValue) -> Result<Self> {
        if value.is_null() {
            Ok(None)
        } else {
            Ok(Some(T::from_sql_value(value)?))
        }
    }
}

/// Enum fields are persisted as their integer discriminant
pub trait SqlEnum: Sized {
    /// Reconstruct the enum from its stored discriminant
    fn from_i32(value: i32) -> Result<Self>;

    /// Discriminant written to the database
    fn to_i32(&self) -> i32;
}

/// A native type stored under a caller-declared wire type name.
///
/// Values are written as their canonical text form and parsed back on read.
pub trait CustomSqlType: Sized {
    /// Wire type name used verbatim in DDL
    const SQL_TYPE: &'static str;

    /// Canonical text representation written to the database
    fn to_sql_text(&self) -> String;

    /// Parse the canonical text representation
    fn from_sql_text(text: &str) -> Result<Self>;
}

/// 36-character string identifier stored as `VARCHAR(36)`
#[derive(
    Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
pub struct StringId(String);

impl StringId {
    /// Create an empty identifier
    pub fn empty() -> Self {
        StringId(String::new())
    }

    /// Generate a fresh random identifier
    pub fn random() -> Self {
        StringId(uuid::Uuid::new_v4().to_string())
    }

    /// Get the identifier text
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl CustomSqlType for StringId {
    const SQL_TYPE: &'static str = "VARCHAR(36)";

    fn to_sql_text(&self) -> String {
        self.0.clone()
    }

    fn from_sql_text(text: &str) -> Result<Self> {
        Ok(StringId(text.to_string()))
    }
}

impl From<String> for StringId {
    fn from(s: String) -> Self {
        StringId(s)
    }
}

impl From<&str> for StringId {
    fn from(s: &str) -> Self {
        StringId(s.to_string())
    }
}

impl std::fmt::Display for StringId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direct_match() {
        assert_eq!(i32::from_sql_value(SqlValue::Int(5)).unwrap(), 5);
        assert_eq!(
            String::from_sql_value(SqlValue::Text("a".into())).unwrap(),
            "a"
        );
    }

    #[test]
    fn test_standard_conversions() {
        assert_eq!(i32::from_sql_value(SqlValue::Long(5)).unwrap(), 5);
        assert_eq!(i64::from_sql_value(SqlValue::Int(5)).unwrap(), 5);
        assert!(bool::from_sql_value(SqlValue::Long(1)).unwrap());
        assert!(!bool::from_sql_value(SqlValue::Long(0)).unwrap());
        assert_eq!(
            Duration::from_sql_value(SqlValue::Long(1_500_000)).unwrap(),
            Duration::from_micros(1_500_000)
        );
    }

    #[test]
    fn test_missing_conversion_names_both_types() {
        let err = NaiveDateTime::from_sql_value(SqlValue::Bytes(vec![1])).unwrap_err();
        match err {
            DbError::TypeCoercion { expected, actual } => {
                assert_eq!(expected, "datetime");
                assert_eq!(actual, "bytes");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_null_into_option() {
        assert_eq!(Option::<i32>::from_sql_value(SqlValue::Null).unwrap(), None);
        assert_eq!(
            Option::<i32>::from_sql_value(SqlValue::Long(3)).unwrap(),
            Some(3)
        );
    }

    #[test]
    fn test_null_into_scalar_fails() {
        let err = i32::from_sql_value(SqlValue::Null).unwrap_err();
        assert!(matches!(err, DbError::TypeCoercion { .. }));
    }

    #[test]
    fn test_datetime_round_trip() {
        let dt = parse_datetime("2023-06-01 10:20:30.000123").unwrap();
        assert_eq!(format_datetime(&dt), "2023-06-01 10:20:30.000123");

        let plain = parse_datetime("2023-06-01 10:20:30").unwrap();
        assert_eq!(format_datetime(&plain), "2023-06-01 10:20:30.000000");
    }

    #[test]
    fn test_registered_conversion() {
        register_conversion("bytes", "int", |v| match v {
            SqlValue::Bytes(b) => Ok(SqlValue::Int(b.len() as i32)),
            _ => Err(DbError::type_coercion("int", "bytes")),
        });

        assert_eq!(i32::from_sql_value(SqlValue::Bytes(vec![1, 2, 3])).unwrap(), 3);
    }

    #[test]
    fn test_string_id() {
        let id = StringId::random();
        assert_eq!(id.as_str().len(), 36);

        let back = StringId::from_sql_text(&id.to_sql_text()).unwrap();
        assert_eq!(id, back);
        assert_eq!(StringId::SQL_TYPE, "VARCHAR(36)");
    }
}
