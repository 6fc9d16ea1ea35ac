//! SQL fragment builders
//!
//! Every builder returns a [`Fragment`]: SQL text with `?` placeholders and
//! the values to bind to them, in order. Values never end up in the SQL
//! text. Identifiers cannot be bound, so they are checked instead.

use std::{fmt::Display, str::FromStr};

use crate::{
    error::{Error, Result},
    sql::types::Value,
};

/// SQL text plus its positional parameters
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fragment {
    pub sql: String,
    pub values: Vec<Value>,
}

impl Fragment {
    pub fn new(sql: impl Into<String>, values: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            values,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.sql.is_empty()
    }

    /// Appends `other` separated by one space; empty fragments add nothing
    pub fn push(&mut self, other: Fragment) {
        if other.is_empty() {
            return;
        }
        if !self.sql.is_empty() {
            self.sql.push(' ');
        }
        self.sql.push_str(&other.sql);
        self.values.extend(other.values);
    }
}

/// Comparison operators accepted in HAVING conditions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

impl Display for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Operator::Eq => "=",
            Operator::NotEq => "!=",
            Operator::Lt => "<",
            Operator::LtEq => "<=",
            Operator::Gt => ">",
            Operator::GtEq => ">=",
        })
    }
}

impl FromStr for Operator {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s.trim() {
            "=" => Operator::Eq,
            "!=" | "<>" => Operator::NotEq,
            "<" => Operator::Lt,
            "<=" => Operator::LtEq,
            ">" => Operator::Gt,
            ">=" => Operator::GtEq,
            other => return Err(Error::construction(format!("unsupported operator {:?}", other))),
        })
    }
}

/// One HAVING predicate: `column operator ?`
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub column: String,
    pub operator: Operator,
    pub value: Value,
}

impl Condition {
    pub fn new(column: impl Into<String>, operator: Operator, value: impl Into<Value>) -> Self {
        Self {
            column: column.into(),
            operator,
            value: value.into(),
        }
    }
}

/// Sort direction for [`Select::order_by`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

fn is_name(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn is_column_ref(s: &str) -> bool {
    match s.split_once('.') {
        Some((table, column)) => is_name(table) && is_name(column),
        None => is_name(s),
    }
}

fn is_aggregate(s: &str) -> bool {
    let Some(inner) = s.strip_suffix(')') else {
        return false;
    };
    match inner.split_once('(') {
        Some((func, arg)) => is_name(func) && (arg == "*" || is_column_ref(arg)),
        None => false,
    }
}

/// Checks a table name: letters, digits and underscores only
pub fn validate_name(name: &str) -> Result<()> {
    if is_name(name) {
        return Ok(());
    }
    Err(Error::construction(format!("invalid identifier {:?}", name)))
}

/// Checks a column reference: `name`, `table.name` or an aggregate such as `COUNT(*)`
pub fn validate_identifier(name: &str) -> Result<()> {
    if is_column_ref(name) || is_aggregate(name) {
        return Ok(());
    }
    Err(Error::construction(format!("invalid identifier {:?}", name)))
}

/// Checks a projection item: a column reference or aggregate, optionally
/// renamed with `AS name` so HAVING and ORDER BY can refer to it
fn projection_item(item: &str) -> Result<String> {
    let lowered = item.to_ascii_lowercase();
    match lowered.find(" as ") {
        Some(pos) => {
            let (expr, alias) = (item[..pos].trim(), item[pos + 4..].trim());
            validate_identifier(expr)?;
            validate_name(alias)?;
            Ok(format!("{} AS {}", expr, alias))
        }
        None => {
            validate_identifier(item)?;
            Ok(item.to_string())
        }
    }
}

/// `c1 = ? AND c2 = ?` without the WHERE keyword
fn conjunction<I, K, V>(filters: I) -> Result<Fragment>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: Into<Value>,
{
    let mut parts = Vec::new();
    let mut values = Vec::new();
    for (column, value) in filters {
        let column = column.as_ref();
        validate_identifier(column)?;
        parts.push(format!("{} = ?", column));
        values.push(value.into());
    }
    Ok(Fragment::new(parts.join(" AND "), values))
}

/// `WHERE c1 = ? AND c2 = ?`, one placeholder per filter in iteration order
pub fn where_clause<I, K, V>(filters: I) -> Result<Fragment>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: Into<Value>,
{
    let conditions = conjunction(filters)?;
    if conditions.is_empty() {
        return Ok(Fragment::default());
    }
    Ok(Fragment::new(format!("WHERE {}", conditions.sql), conditions.values))
}

/// `HAVING count > ? AND ...`
pub fn having(conditions: &[Condition]) -> Result<Fragment> {
    if conditions.is_empty() {
        return Ok(Fragment::default());
    }
    let mut parts = Vec::with_capacity(conditions.len());
    let mut values = Vec::with_capacity(conditions.len());
    for condition in conditions {
        validate_identifier(&condition.column)?;
        parts.push(format!("{} {} ?", condition.column, condition.operator));
        values.push(condition.value.clone());
    }
    Ok(Fragment::new(format!("HAVING {}", parts.join(" AND ")), values))
}

/// `GROUP BY c1, c2`
pub fn group_by<I, S>(columns: I) -> Result<Fragment>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut names = Vec::new();
    for column in columns {
        validate_identifier(column.as_ref())?;
        names.push(column.as_ref().to_string());
    }
    if names.is_empty() {
        return Ok(Fragment::default());
    }
    Ok(Fragment::new(format!("GROUP BY {}", names.join(", ")), Vec::new()))
}

/// `SELECT * FROM left JOIN right ON a = b [WHERE ...]`
///
/// `on` holds the two columns to equate, usually table-qualified.
pub fn join<I, K, V>(left: &str, right: &str, on: &[&str], filters: I) -> Result<Fragment>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: Into<Value>,
{
    let [a, b] = on else {
        return Err(Error::construction(format!(
            "join needs exactly two columns, got {}",
            on.len()
        )));
    };
    if a.is_empty() || b.is_empty() {
        return Err(Error::construction("join columns must not be empty"));
    }
    validate_name(left)?;
    validate_name(right)?;
    validate_identifier(a)?;
    validate_identifier(b)?;

    let mut fragment = Fragment::new(
        format!("SELECT * FROM {} JOIN {} ON {} = {}", left, right, a, b),
        Vec::new(),
    );
    fragment.push(where_clause(filters)?);
    Ok(fragment)
}

/// Composable SELECT over one table
///
/// ```
/// use tinyorm::{Condition, Operator, Select};
///
/// let query = Select::new()
///     .columns(["role_id", "COUNT(*)"])
///     .group_by(["role_id"])
///     .having(Condition::new("COUNT(*)", Operator::Gt, 5))
///     .build("user")
///     .unwrap();
/// assert_eq!(
///     query.sql,
///     "SELECT role_id, COUNT(*) FROM user GROUP BY role_id HAVING COUNT(*) > ?"
/// );
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Select {
    columns: Vec<String>,
    filters: Vec<(String, Value)>,
    group_by: Vec<String>,
    having: Vec<Condition>,
    order_by: Vec<(String, Direction)>,
    limit: Option<usize>,
    offset: Option<usize>,
}

impl Select {
    pub fn new() -> Self {
        Self::default()
    }

    /// Projection; `*` when never called. Items may carry an alias:
    /// `COUNT(*) AS count`
    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns.extend(columns.into_iter().map(Into::into));
        self
    }

    pub fn filter(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push((column.into(), value.into()));
        self
    }

    pub fn group_by<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.group_by.extend(columns.into_iter().map(Into::into));
        self
    }

    pub fn having(mut self, condition: Condition) -> Self {
        self.having.push(condition);
        self
    }

    pub fn order_by(mut self, column: impl Into<String>, direction: Direction) -> Self {
        self.order_by.push((column.into(), direction));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Renders the query against `table`
    pub fn build(&self, table: &str) -> Result<Fragment> {
        validate_name(table)?;
        let projection = if self.columns.is_empty() {
            "*".to_string()
        } else {
            self.columns
                .iter()
                .map(|column| projection_item(column))
                .collect::<Result<Vec<_>>>()?
                .join(", ")
        };

        let mut fragment =
            Fragment::new(format!("SELECT {} FROM {}", projection, table), Vec::new());
        fragment.push(where_clause(self.filters.iter().map(|(c, v)| (c.as_str(), v.clone())))?);
        fragment.push(group_by(&self.group_by)?);
        fragment.push(having(&self.having)?);

        if !self.order_by.is_empty() {
            let mut keys = Vec::with_capacity(self.order_by.len());
            for (column, direction) in &self.order_by {
                validate_identifier(column)?;
                keys.push(match direction {
                    Direction::Asc => format!("{} ASC", column),
                    Direction::Desc => format!("{} DESC", column),
                });
            }
            fragment.push(Fragment::new(format!("ORDER BY {}", keys.join(", ")), Vec::new()));
        }
        if let Some(limit) = self.limit {
            fragment.push(Fragment::new(format!("LIMIT {}", limit), Vec::new()));
        }
        if let Some(offset) = self.offset {
            fragment.push(Fragment::new(format!("OFFSET {}", offset), Vec::new()));
        }
        Ok(fragment)
    }
}

#[cfg(test)]
mod tests {
    use super::{group_by, having, join, where_clause, Condition, Direction, Fragment, Operator, Select};
    use crate::{
        error::{Error, Result},
        sql::types::Value,
    };

    #[test]
    fn test_where_clause() -> Result<()> {
        let fragment = where_clause([("email", Value::from("a@x")), ("role_id", Value::from(2))])?;
        assert_eq!(fragment.sql, "WHERE email = ? AND role_id = ?");
        assert_eq!(fragment.values, vec![Value::from("a@x"), Value::Integer(2)]);

        assert_eq!(where_clause(Vec::<(&str, Value)>::new())?, Fragment::default());
        Ok(())
    }

    #[test]
    fn test_where_rejects_injection() {
        let result = where_clause([("email = '' OR 1", Value::from(1))]);
        assert!(matches!(result, Err(Error::Construction(_))));
    }

    #[test]
    fn test_having_and_group_by() -> Result<()> {
        let fragment = having(&[Condition::new("count", Operator::Gt, 5)])?;
        assert_eq!(fragment.sql, "HAVING count > ?");
        assert_eq!(fragment.values, vec![Value::Integer(5)]);
        assert!(having(&[])?.is_empty());

        assert_eq!(group_by(["role_id", "organization_id"])?.sql, "GROUP BY role_id, organization_id");
        assert!(group_by(Vec::<String>::new())?.is_empty());
        assert_eq!(">=".parse::<Operator>()?, Operator::GtEq);
        assert!("LIKE".parse::<Operator>().is_err());
        Ok(())
    }

    #[test]
    fn test_join() -> Result<()> {
        let on = ["user.role_id", "role.role_id"];
        let plain = join("user", "role", &on, Vec::<(&str, Value)>::new())?;
        assert_eq!(plain.sql, "SELECT * FROM user JOIN role ON user.role_id = role.role_id");
        assert!(plain.values.is_empty());

        let filtered = join("user", "role", &on, [("title", "admin")])?;
        assert_eq!(
            filtered.sql,
            "SELECT * FROM user JOIN role ON user.role_id = role.role_id WHERE title = ?"
        );
        assert_eq!(filtered.values, vec![Value::from("admin")]);

        let bad_specs: [&[&str]; 3] = [&["user.role_id"], &["a", "b", "c"], &["a", ""]];
        for bad in bad_specs {
            let result = join("user", "role", bad, Vec::<(&str, Value)>::new());
            assert!(matches!(result, Err(Error::Construction(_))));
        }
        Ok(())
    }

    #[test]
    fn test_select_has_no_dangling_keywords() -> Result<()> {
        assert_eq!(Select::new().build("user")?.sql, "SELECT * FROM user");

        let query = Select::new()
            .filter("organization_id", 3)
            .having(Condition::new("COUNT(*)", Operator::GtEq, 2))
            .order_by("role_id", Direction::Desc)
            .limit(10)
            .build("user")?;
        assert_eq!(
            query.sql,
            "SELECT * FROM user WHERE organization_id = ? HAVING COUNT(*) >= ? ORDER BY role_id DESC LIMIT 10"
        );
        assert_eq!(query.values, vec![Value::Integer(3), Value::Integer(2)]);
        Ok(())
    }

    #[test]
    fn test_select_aliases() -> Result<()> {
        let query = Select::new()
            .columns(["role_id", "COUNT(*) as count"])
            .group_by(["role_id"])
            .having(Condition::new("count", Operator::Gt, 5))
            .build("user")?;
        assert_eq!(
            query.sql,
            "SELECT role_id, COUNT(*) AS count FROM user GROUP BY role_id HAVING count > ?"
        );

        for bad in ["COUNT(*) AS", "COUNT(*) AS two words", "1; DROP AS x"] {
            let result = Select::new().columns([bad]).build("user");
            assert!(matches!(result, Err(Error::Construction(_))));
        }
        Ok(())
    }
}

