//! Predicate builder for WHERE clauses
//!
//! Conditions are collected into an ordered list and emitted as positional
//! `?` placeholders with a matching parameter vector. Each condition carries
//! the junction used to join it to the previous one, so mixed AND/OR chains
//! come out exactly in declaration order.

use super::value::SqlValue;
use serde::Serialize;

/// Comparison operator of one condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConditionOp {
    /// Equality comparison
    Equals,
    /// SQL LIKE pattern match
    Like,
    /// Negated LIKE pattern match
    NotLike,
    /// Null check, takes no operand
    IsNull,
    /// Non-null check, takes no operand
    IsNotNull,
    /// Strictly greater
    GreaterThan,
    /// Greater or equal
    GreaterOrEqual,
    /// Strictly less
    LessThan,
    /// Less or equal
    LessOrEqual,
}

impl ConditionOp {
    /// SQL token for this operator
    pub fn sql_token(&self) -> &'static str {
        match self {
            ConditionOp::Equals => " = ",
            ConditionOp::Like => " LIKE ",
            ConditionOp::NotLike => " NOT LIKE ",
            ConditionOp::IsNull => " IS NULL",
            ConditionOp::IsNotNull => " IS NOT NULL",
            ConditionOp::GreaterThan => " > ",
            ConditionOp::GreaterOrEqual => " >= ",
            ConditionOp::LessThan => " < ",
            ConditionOp::LessOrEqual => " <= ",
        }
    }

    /// Whether this operator compares against an operand
    pub fn takes_operand(&self) -> bool {
        !matches!(self, ConditionOp::IsNull | ConditionOp::IsNotNull)
    }
}

/// Junction joining a condition to the one before it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum Junction {
    /// Logical conjunction
    #[default]
    And,
    /// Logical disjunction
    Or,
}

impl std::fmt::Display for Junction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Junction::And => write!(f, " AND "),
            Junction::Or => write!(f, " OR "),
        }
    }
}

/// One predicate over a named column
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    /// Column name
    pub name: String,
    /// Comparison operator
    pub op: ConditionOp,
    /// Operand value, absent for null checks
    pub value: Option<SqlValue>,
    /// How this condition joins to the previous one
    pub junction: Junction,
}

impl Condition {
    fn with_operand(name: &str, op: ConditionOp, value: impl Into<SqlValue>) -> Self {
        Condition {
            name: name.to_string(),
            op,
            value: Some(value.into()),
            junction: Junction::And,
        }
    }

    fn without_operand(name: &str, op: ConditionOp) -> Self {
        Condition {
            name: name.to_string(),
            op,
            value: None,
            junction: Junction::And,
        }
    }

    /// Equality condition
    pub fn eq(name: &str, value: impl Into<SqlValue>) -> Self {
        Self::with_operand(name, ConditionOp::Equals, value)
    }

    /// LIKE pattern condition
    pub fn like(name: &str, pattern: impl Into<SqlValue>) -> Self {
        Self::with_operand(name, ConditionOp::Like, pattern)
    }

    /// NOT LIKE pattern condition
    pub fn not_like(name: &str, pattern: impl Into<SqlValue>) -> Self {
        Self::with_operand(name, ConditionOp::NotLike, pattern)
    }

    /// Strictly-greater condition
    pub fn gt(name: &str, value: impl Into<SqlValue>) -> Self {
        Self::with_operand(name, ConditionOp::GreaterThan, value)
    }

    /// Greater-or-equal condition
    pub fn ge(name: &str, value: impl Into<SqlValue>) -> Self {
        Self::with_operand(name, ConditionOp::GreaterOrEqual, value)
    }

    /// Strictly-less condition
    pub fn lt(name: &str, value: impl Into<SqlValue>) -> Self {
        Self::with_operand(name, ConditionOp::LessThan, value)
    }

    /// Less-or-equal condition
    pub fn le(name: &str, value: impl Into<SqlValue>) -> Self {
        Self::with_operand(name, ConditionOp::LessOrEqual, value)
    }

    /// Null-check condition, no operand
    pub fn is_null(name: &str) -> Self {
        Self::without_operand(name, ConditionOp::IsNull)
    }

    /// Non-null-check condition, no operand
    pub fn is_not_null(name: &str) -> Self {
        Self::without_operand(name, ConditionOp::IsNotNull)
    }

    /// Join this condition to the previous one with OR instead of AND
    pub fn or(mut self) -> Self {
        self.junction = Junction::Or;
        self
    }
}

/// Render a condition list as a WHERE fragment with its parameter vector.
///
/// Returns an empty string for an empty list. The leading ` WHERE ` is
/// included so callers can append the fragment directly.
pub fn build_where(conditions: &[Condition]) -> (String, Vec<SqlValue>) {
    if conditions.is_empty() {
        return (String::new(), Vec::new());
    }

    let mut sql = String::from(" WHERE ");
    let mut params = Vec::new();

    for (i, cond) in conditions.iter().enumerate() {
        if i > 0 {
            sql.push_str(&cond.junction.to_string());
        }
        sql.push('`');
        sql.push_str(&cond.name);
        sql.push('`');
        sql.push_str(cond.op.sql_token());
        if cond.op.takes_operand() {
            sql.push('?');
            params.push(cond.value.clone().unwrap_or(SqlValue::Null));
        }
    }

    (sql, params)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_condition_list() {
        let (sql, params) = build_where(&[]);
        assert!(sql.is_empty());
        assert!(params.is_empty());
    }

    #[test]
    fn test_single_equality() {
        let (sql, params) = build_where(&[Condition::eq("name", "alice")]);
        assert_eq!(sql, " WHERE `name` = ?");
        assert_eq!(params, vec![SqlValue::Text("alice".to_string())]);
    }

    #[test]
    fn test_and_chain() {
        let conds = vec![Condition::eq("a", 1), Condition::gt("b", 2)];
        let (sql, params) = build_where(&conds);
        assert_eq!(sql, " WHERE `a` = ? AND `b` > ?");
        assert_eq!(params, vec![SqlValue::Int(1), SqlValue::Int(2)]);
    }

    #[test]
    fn test_or_junction() {
        let conds = vec![
            Condition::eq("a", 1),
            Condition::eq("b", 2).or(),
            Condition::le("c", 3),
        ];
        let (sql, _) = build_where(&conds);
        assert_eq!(sql, " WHERE `a` = ? OR `b` = ? AND `c` <= ?");
    }

    #[test]
    fn test_null_checks_take_no_parameter() {
        let conds = vec![
            Condition::is_null("number"),
            Condition::is_not_null("name"),
        ];
        let (sql, params) = build_where(&conds);
        assert_eq!(sql, " WHERE `number` IS NULL AND `name` IS NOT NULL");
        assert!(params.is_empty());
    }

    #[test]
    fn test_like_operators() {
        let conds = vec![
            Condition::like("name", "item_%"),
            Condition::not_like("name", "%tmp%"),
        ];
        let (sql, params) = build_where(&conds);
        assert_eq!(sql, " WHERE `name` LIKE ? AND `name` NOT LIKE ?");
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn test_comparison_operators() {
        let conds = vec![
            Condition::ge("n", 10),
            Condition::lt("n", 20),
        ];
        let (sql, _) = build_where(&conds);
        assert_eq!(sql, " WHERE `n` >= ? AND `n` < ?");
    }
}
