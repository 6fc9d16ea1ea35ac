use std::collections::BTreeMap;

use crate::{
    error::{Error, Result},
    sql::types::{DataType, Value},
};

/// Abstract Syntax Tree (AST) node definitions for SQL statements
#[derive(Debug, PartialEq)]
pub enum Statement {
    /// CREATE TABLE statement
    CreateTable {
        name: String,
        columns: Vec<Column>,
        if_not_exists: bool,
    },
    /// INSERT statement
    Insert {
        table_name: String,
        columns: Option<Vec<String>>,
        values: Vec<Vec<Expression>>,
    },
    /// SELECT statement
    Select {
        /// Column expressions with optional aliases; empty means `*`
        select: Vec<(Expression, Option<String>)>,
        from: FromItem,
        where_clause: Option<Expression>,
        group_by: Vec<String>,
        having: Option<Expression>,
        order_by: Vec<(String, OrderDirection)>,
        limit: Option<Expression>,
        offset: Option<Expression>,
    },
    /// UPDATE statement
    Update {
        table_name: String,
        columns: BTreeMap<String, Expression>,
        where_clause: Option<Expression>,
    },
    /// DELETE statement
    Delete {
        table_name: String,
        where_clause: Option<Expression>,
    },
}

/// FROM clause item - represents a table or join expression
#[derive(Debug, PartialEq)]
pub enum FromItem {
    /// Single table reference
    Table {
        name: String,
    },

    /// Inner join of two items on an equality predicate
    Join {
        left: Box<FromItem>,
        right: Box<FromItem>,
        predicate: Expression,
    },
}

/// Sort direction (ascending or descending)
#[derive(Debug, PartialEq)]
pub enum OrderDirection {
    Asc,
    Desc,
}

/// Column definition for CREATE TABLE statements
#[derive(Debug, PartialEq)]
pub struct Column {
    pub name: String,
    pub datatype: DataType,
    pub nullable: Option<bool>,
    pub default: Option<Expression>,
    pub primary_key: bool,
    pub unique: bool,
    /// REFERENCES target, kept as written
    pub references: Option<String>,
}

/// Expression types (column refs, constants, comparisons, aggregate functions)
#[derive(Debug, PartialEq, Clone)]
pub enum Expression {
    /// Column reference, optionally table-qualified (`user.role_id`)
    Field(String),
    /// Constant value (literals and bound parameters)
    Consts(Value),
    /// Binary operation
    Operation(Operation),
    /// Aggregate function: Function(name, column) e.g., Function("count", "*")
    Function(String, String),
}

impl From<Value> for Expression {
    fn from(value: Value) -> Self {
        Self::Consts(value)
    }
}

impl Expression {
    /// Label a function expression produces in a result set, e.g. `COUNT(*)`
    pub fn label(&self) -> Option<String> {
        match self {
            Expression::Field(name) => Some(name.clone()),
            Expression::Function(func, col) => Some(format!("{}({})", func.to_uppercase(), col)),
            _ => None,
        }
    }
}

/// Binary operations
#[derive(Debug, PartialEq, Clone)]
pub enum Operation {
    And(Box<Expression>, Box<Expression>),
    Equal(Box<Expression>, Box<Expression>),
    NotEqual(Box<Expression>, Box<Expression>),
    GreaterThan(Box<Expression>, Box<Expression>),
    GreaterThanOrEqual(Box<Expression>, Box<Expression>),
    LessThan(Box<Expression>, Box<Expression>),
    LessThanOrEqual(Box<Expression>, Box<Expression>),
}

/// Finds the position of a column label, resolving unqualified names
/// against qualified labels (`role_id` matches `user.role_id`).
pub fn resolve_column(columns: &[String], name: &str) -> Result<usize> {
    if let Some(pos) = columns.iter().position(|c| c == name) {
        return Ok(pos);
    }
    if name.contains('.') {
        // A qualified reference also matches an unqualified label
        let short = name.rsplit('.').next().unwrap_or(name);
        let matches: Vec<usize> = columns
            .iter()
            .enumerate()
            .filter(|(_, c)| c.as_str() == short)
            .map(|(i, _)| i)
            .collect();
        return match matches.as_slice() {
            [pos] => Ok(*pos),
            _ => Err(Error::Internal(format!("column {} not found", name))),
        };
    }

    let suffix = format!(".{}", name);
    let matches: Vec<usize> = columns
        .iter()
        .enumerate()
        .filter(|(_, c)| c.ends_with(&suffix))
        .map(|(i, _)| i)
        .collect();
    match matches.as_slice() {
        [pos] => Ok(*pos),
        [] => Err(Error::Internal(format!("column {} not found", name))),
        _ => Err(Error::Internal(format!("column {} is ambiguous", name))),
    }
}

/// Evaluates an expression against one row
pub fn evaluate_expr(expr: &Expression, cols: &[String], row: &[Value]) -> Result<Value> {
    Ok(match expr {
        Expression::Field(name) => row[resolve_column(cols, name)?].clone(),
        Expression::Function(..) => {
            let label = expr.label().unwrap_or_default();
            row[resolve_column(cols, &label)?].clone()
        }
        Expression::Consts(value) => value.clone(),
        Expression::Operation(op) => {
            let (lhs, rhs) = match op {
                Operation::And(l, r)
                | Operation::Equal(l, r)
                | Operation::NotEqual(l, r)
                | Operation::GreaterThan(l, r)
                | Operation::GreaterThanOrEqual(l, r)
                | Operation::LessThan(l, r)
                | Operation::LessThanOrEqual(l, r) => {
                    (evaluate_expr(l, cols, row)?, evaluate_expr(r, cols, row)?)
                }
            };
            // Comparisons with NULL are unknown (NULL), which filters treat as false
            if lhs.is_null() || rhs.is_null() {
                return Ok(match op {
                    Operation::And(..)
                        if lhs == Value::Boolean(false) || rhs == Value::Boolean(false) =>
                    {
                        Value::Boolean(false)
                    }
                    _ => Value::Null,
                });
            }
            let compare = || {
                lhs.partial_cmp(&rhs).ok_or_else(|| {
                    Error::Internal(format!("cannot compare {:?} with {:?}", lhs, rhs))
                })
            };
            match op {
                Operation::And(..) => match (&lhs, &rhs) {
                    (Value::Boolean(a), Value::Boolean(b)) => Value::Boolean(*a && *b),
                    (l, r) => {
                        return Err(Error::Internal(format!("cannot AND {} and {}", l, r)));
                    }
                },
                Operation::Equal(..) => Value::Boolean(compare()?.is_eq()),
                Operation::NotEqual(..) => Value::Boolean(compare()?.is_ne()),
                Operation::GreaterThan(..) => Value::Boolean(compare()?.is_gt()),
                Operation::GreaterThanOrEqual(..) => Value::Boolean(compare()?.is_ge()),
                Operation::LessThan(..) => Value::Boolean(compare()?.is_lt()),
                Operation::LessThanOrEqual(..) => Value::Boolean(compare()?.is_le()),
            }
        }
    })
}

/// Evaluates a filter predicate; NULL counts as not matching
pub fn matches(expr: &Expression, cols: &[String], row: &[Value]) -> Result<bool> {
    match evaluate_expr(expr, cols, row)? {
        Value::Boolean(b) => Ok(b),
        Value::Null => Ok(false),
        v => Err(Error::Internal(format!("filter evaluated to non-boolean {}", v))),
    }
}

#[cfg(test)]
mod tests {
    use super::{matches, resolve_column, Expression, Operation};
    use crate::{error::Result, sql::types::Value};

    fn cols() -> Vec<String> {
        vec!["user.id".into(), "user.role_id".into(), "role.role_id".into(), "role.title".into()]
    }

    #[test]
    fn test_resolve_column() -> Result<()> {
        let cols = cols();
        assert_eq!(resolve_column(&cols, "title")?, 3);
        assert_eq!(resolve_column(&cols, "role.role_id")?, 2);
        assert!(resolve_column(&cols, "role_id").is_err());
        assert!(resolve_column(&cols, "missing").is_err());
        assert_eq!(resolve_column(&["id".to_string()], "user.id")?, 0);
        Ok(())
    }

    #[test]
    fn test_matches_with_null() -> Result<()> {
        let cols = cols();
        let row = vec![Value::Integer(1), Value::Null, Value::Integer(2), Value::from("admin")];
        let eq = |field: &str, value: Value| {
            Expression::Operation(Operation::Equal(
                Box::new(Expression::Field(field.into())),
                Box::new(value.into()),
            ))
        };

        assert!(matches(&eq("title", Value::from("admin")), &cols, &row)?);
        assert!(!matches(&eq("user.role_id", Value::Integer(2)), &cols, &row)?);
        let both = Expression::Operation(Operation::And(
            Box::new(eq("title", Value::from("admin"))),
            Box::new(eq("user.id", Value::Integer(1))),
        ));
        assert!(matches(&both, &cols, &row)?);
        Ok(())
    }
}
