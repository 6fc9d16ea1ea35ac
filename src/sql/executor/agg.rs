use std::cmp::Ordering;

use crate::{
    error::{Error, Result},
    sql::{
        engine::Transaction,
        parser::ast::{resolve_column, Expression},
        types::{Row, Value},
    },
};

use super::{Executor, ResultSet};

/// Aggregate executor - groups rows and computes aggregate functions
/// (COUNT, SUM, MIN, MAX, AVG)
///
/// Output columns are the GROUP BY columns followed by one column per
/// aggregate, labelled like `COUNT(*)`.
pub struct Aggregate<T: Transaction> {
    source: Box<dyn Executor<T>>,
    group_by: Vec<String>,
    aggregates: Vec<Expression>,
}

impl<T: Transaction> Aggregate<T> {
    pub fn new(
        source: Box<dyn Executor<T>>,
        group_by: Vec<String>,
        aggregates: Vec<Expression>,
    ) -> Box<Self> {
        Box::new(Self {
            source,
            group_by,
            aggregates,
        })
    }
}

impl<T: Transaction> Executor<T> for Aggregate<T> {
    fn execute(self: Box<Self>, txn: &mut T) -> Result<ResultSet> {
        let ResultSet::Scan { columns, rows } = self.source.execute(txn)? else {
            return Err(Error::Internal("Unexpected result set".into()));
        };

        let mut key_index = Vec::with_capacity(self.group_by.len());
        for name in &self.group_by {
            key_index.push(resolve_column(&columns, name)?);
        }

        // Groups keep first-seen order; without GROUP BY everything is one group
        let mut groups: Vec<(Row, Vec<Row>)> = Vec::new();
        if self.group_by.is_empty() {
            groups.push((Vec::new(), rows));
        } else {
            for row in rows {
                let key: Row = key_index.iter().map(|&i| row[i].clone()).collect();
                match groups.iter_mut().find(|(k, _)| *k == key) {
                    Some((_, members)) => members.push(row),
                    None => groups.push((key, vec![row])),
                }
            }
        }

        let mut calculators = Vec::with_capacity(self.aggregates.len());
        let mut new_cols = self.group_by.clone();
        for expr in &self.aggregates {
            let Expression::Function(func_name, col_name) = expr else {
                return Err(Error::Internal(format!("{:?} is not an aggregate", expr)));
            };
            calculators.push((<dyn Calculator>::build(func_name)?, col_name));
            new_cols.push(expr.label().unwrap_or_default());
        }

        let mut new_rows = Vec::with_capacity(groups.len());
        for (key, members) in groups {
            let mut row = key;
            for (calculator, col_name) in &calculators {
                row.push(calculator.calc(col_name, &columns, &members)?);
            }
            new_rows.push(row);
        }

        Ok(ResultSet::Scan {
            columns: new_cols,
            rows: new_rows,
        })
    }
}

/// Trait for aggregate function calculations
pub trait Calculator {
    fn calc(&self, col_name: &str, cols: &[String], rows: &[Row]) -> Result<Value>;
}

impl dyn Calculator {
    /// Runtime dispatch to appropriate calculator based on function name
    pub fn build(func_name: &str) -> Result<Box<dyn Calculator>> {
        Ok(match func_name.to_uppercase().as_ref() {
            "COUNT" => Count::new(),
            "SUM" => Sum::new(),
            "MIN" => Min::new(),
            "MAX" => Max::new(),
            "AVG" => Avg::new(),
            _ => {
                return Err(Error::Internal(format!(
                    "unknown aggregate function {}",
                    func_name
                )))
            }
        })
    }
}

/// Non-null values of a column across the rows
fn column_values<'a>(col_name: &str, cols: &[String], rows: &'a [Row]) -> Result<Vec<&'a Value>> {
    let pos = resolve_column(cols, col_name)?;
    Ok(rows.iter().map(|row| &row[pos]).filter(|v| !v.is_null()).collect())
}

/// COUNT - counts non-null values in a column, or all rows for `*`
pub struct Count;

impl Count {
    fn new() -> Box<Self> {
        Box::new(Self {})
    }
}

impl Calculator for Count {
    fn calc(&self, col_name: &str, cols: &[String], rows: &[Row]) -> Result<Value> {
        if col_name == "*" {
            return Ok(Value::Integer(rows.len() as i64));
        }
        Ok(Value::Integer(column_values(col_name, cols, rows)?.len() as i64))
    }
}

/// Picks the extreme value in a column; incomparable values are an error
fn extreme(col_name: &str, cols: &[String], rows: &[Row], keep: Ordering) -> Result<Value> {
    let mut best: Option<&Value> = None;
    for value in column_values(col_name, cols, rows)? {
        best = match best {
            None => Some(value),
            Some(current) => match value.partial_cmp(current) {
                Some(o) if o == keep => Some(value),
                Some(_) => Some(current),
                None => {
                    return Err(Error::Internal(format!(
                        "can not compare {} with {} in column {}",
                        value, current, col_name
                    )))
                }
            },
        };
    }
    Ok(best.cloned().unwrap_or(Value::Null))
}

/// MIN - finds minimum value in a column
pub struct Min;

impl Min {
    fn new() -> Box<Self> {
        Box::new(Self {})
    }
}

impl Calculator for Min {
    fn calc(&self, col_name: &str, cols: &[String], rows: &[Row]) -> Result<Value> {
        extreme(col_name, cols, rows, Ordering::Less)
    }
}

/// MAX - finds maximum value in a column
pub struct Max;

impl Max {
    fn new() -> Box<Self> {
        Box::new(Self {})
    }
}

impl Calculator for Max {
    fn calc(&self, col_name: &str, cols: &[String], rows: &[Row]) -> Result<Value> {
        extreme(col_name, cols, rows, Ordering::Greater)
    }
}

/// SUM - sums a column; stays an integer while every input is one
pub struct Sum;

impl Sum {
    fn new() -> Box<Self> {
        Box::new(Self {})
    }
}

impl Calculator for Sum {
    fn calc(&self, col_name: &str, cols: &[String], rows: &[Row]) -> Result<Value> {
        let mut sum: Option<Value> = None;
        for value in column_values(col_name, cols, rows)? {
            sum = Some(match (sum, value) {
                (None, Value::Integer(v)) => Value::Integer(*v),
                (None, Value::Float(v)) => Value::Float(*v),
                (Some(Value::Integer(s)), Value::Integer(v)) => match s.checked_add(*v) {
                    Some(total) => Value::Integer(total),
                    None => {
                        return Err(Error::Internal(format!(
                            "integer overflow in SUM({})",
                            col_name
                        )));
                    }
                },
                (Some(Value::Integer(s)), Value::Float(v)) => Value::Float(s as f64 + v),
                (Some(Value::Float(s)), Value::Integer(v)) => Value::Float(s + *v as f64),
                (Some(Value::Float(s)), Value::Float(v)) => Value::Float(s + v),
                _ => return Err(Error::Internal(format!("can not calc column {}", col_name))),
            });
        }
        Ok(sum.unwrap_or(Value::Null))
    }
}

/// AVG - calculates average of values in a column
pub struct Avg;

impl Avg {
    fn new() -> Box<Self> {
        Box::new(Self {})
    }
}

impl Calculator for Avg {
    fn calc(&self, col_name: &str, cols: &[String], rows: &[Row]) -> Result<Value> {
        // AVG = SUM / COUNT
        let sum = Sum::new().calc(col_name, cols, rows)?;
        let count = Count::new().calc(col_name, cols, rows)?;
        Ok(match (sum, count) {
            (_, Value::Integer(0)) => Value::Null,
            (Value::Integer(s), Value::Integer(c)) => Value::Float(s as f64 / c as f64),
            (Value::Float(s), Value::Integer(c)) => Value::Float(s / c as f64),
            _ => Value::Null,
        })
    }
}
