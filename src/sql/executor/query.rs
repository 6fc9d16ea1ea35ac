use std::cmp::Ordering;

use crate::{
    error::{Error, Result},
    sql::{
        engine::Transaction,
        executor::ResultSet,
        parser::ast::{evaluate_expr, matches, resolve_column, Expression, OrderDirection},
    },
};

use super::Executor;

/// Table scan executor (SELECT)
pub struct Scan {
    table_name: String,
    filter: Option<Expression>,
}

impl Scan {
    pub fn new(table_name: String, filter: Option<Expression>) -> Box<Self> {
        Box::new(Self { table_name, filter })
    }
}

impl<T: Transaction> Executor<T> for Scan {
    fn execute(self: Box<Self>, txn: &mut T) -> Result<ResultSet> {
        let table = txn.must_get_table(&self.table_name)?;
        let columns = table.qualified_columns();
        let mut rows = Vec::new();
        for (_, row) in txn.scan_table(&self.table_name)? {
            if let Some(filter) = &self.filter {
                if !matches(filter, &columns, &row)? {
                    continue;
                }
            }
            rows.push(row);
        }
        Ok(ResultSet::Scan { columns, rows })
    }
}

/// Filter executor - keeps rows matching a predicate
pub struct Filter<T: Transaction> {
    source: Box<dyn Executor<T>>,
    predicate: Expression,
}

impl<T: Transaction> Filter<T> {
    pub fn new(source: Box<dyn Executor<T>>, predicate: Expression) -> Box<Self> {
        Box::new(Self { source, predicate })
    }
}

impl<T: Transaction> Executor<T> for Filter<T> {
    fn execute(self: Box<Self>, txn: &mut T) -> Result<ResultSet> {
        match self.source.execute(txn)? {
            ResultSet::Scan { columns, rows } => {
                let mut kept = Vec::new();
                for row in rows {
                    if matches(&self.predicate, &columns, &row)? {
                        kept.push(row);
                    }
                }
                Ok(ResultSet::Scan {
                    columns,
                    rows: kept,
                })
            }
            _ => Err(Error::Internal("Unexpected result set".into())),
        }
    }
}

/// ORDER BY executor - sorts rows by specified columns
pub struct Order<T: Transaction> {
    source: Box<dyn Executor<T>>,
    order_by: Vec<(String, OrderDirection)>,
}

impl<T: Transaction> Order<T> {
    pub fn new(source: Box<dyn Executor<T>>, order_by: Vec<(String, OrderDirection)>) -> Box<Self> {
        Box::new(Self { source, order_by })
    }
}

impl<T: Transaction> Executor<T> for Order<T> {
    fn execute(self: Box<Self>, txn: &mut T) -> Result<ResultSet> {
        match self.source.execute(txn)? {
            ResultSet::Scan { columns, mut rows } => {
                // Map ORDER BY columns to positions in the source rows
                let mut keys = Vec::with_capacity(self.order_by.len());
                for (col_name, direction) in &self.order_by {
                    keys.push((resolve_column(&columns, col_name)?, direction));
                }

                // Multi-column sort: compare rows column by column according to ORDER BY clause
                // - If comparison is Equal, continue to next column
                // - If Less/Greater, apply ASC/DESC direction and return
                // - If types are incomparable (None), continue to next column
                rows.sort_by(|row1, row2| {
                    for (index, direction) in &keys {
                        match row1[*index].partial_cmp(&row2[*index]) {
                            Some(Ordering::Equal) | None => {}
                            Some(o) => {
                                return if **direction == OrderDirection::Asc {
                                    o
                                } else {
                                    o.reverse()
                                }
                            }
                        }
                    }
                    Ordering::Equal
                });

                Ok(ResultSet::Scan { columns, rows })
            }
            _ => Err(Error::Internal("Unexpected result set".into())),
        }
    }
}

/// LIMIT executor - restricts the number of rows returned
pub struct Limit<T: Transaction> {
    source: Box<dyn Executor<T>>,
    limit: usize,
}

impl<T: Transaction> Limit<T> {
    pub fn new(source: Box<dyn Executor<T>>, limit: usize) -> Box<Self> {
        Box::new(Self { source, limit })
    }
}

impl<T: Transaction> Executor<T> for Limit<T> {
    fn execute(self: Box<Self>, txn: &mut T) -> Result<ResultSet> {
        match self.source.execute(txn)? {
            ResultSet::Scan { columns, rows } => Ok(ResultSet::Scan {
                columns,
                rows: rows.into_iter().take(self.limit).collect(),
            }),
            _ => Err(Error::Internal("Unexpected result set".into())),
        }
    }
}

/// OFFSET executor - skips the first N rows
pub struct Offset<T: Transaction> {
    source: Box<dyn Executor<T>>,
    offset: usize,
}

impl<T: Transaction> Offset<T> {
    pub fn new(source: Box<dyn Executor<T>>, offset: usize) -> Box<Self> {
        Box::new(Self { source, offset })
    }
}

impl<T: Transaction> Executor<T> for Offset<T> {
    fn execute(self: Box<Self>, txn: &mut T) -> Result<ResultSet> {
        match self.source.execute(txn)? {
            ResultSet::Scan { columns, rows } => Ok(ResultSet::Scan {
                columns,
                rows: rows.into_iter().skip(self.offset).collect(),
            }),
            _ => Err(Error::Internal("Unexpected result set".into())),
        }
    }
}

/// Projection executor - evaluates the select list
pub struct Projection<T: Transaction> {
    source: Box<dyn Executor<T>>,
    exprs: Vec<(Expression, Option<String>)>,
}

impl<T: Transaction> Projection<T> {
    pub fn new(
        source: Box<dyn Executor<T>>,
        exprs: Vec<(Expression, Option<String>)>,
    ) -> Box<Self> {
        Box::new(Self { source, exprs })
    }
}

impl<T: Transaction> Executor<T> for Projection<T> {
    fn execute(self: Box<Self>, txn: &mut T) -> Result<ResultSet> {
        match self.source.execute(txn)? {
            ResultSet::Scan { columns, rows } => {
                let new_cols = self
                    .exprs
                    .iter()
                    .map(|(expr, alias)| match alias {
                        Some(alias) => alias.clone(),
                        None => expr.label().unwrap_or_else(|| "?".into()),
                    })
                    .collect();

                let mut new_rows = Vec::with_capacity(rows.len());
                for row in rows {
                    let mut new_row = Vec::with_capacity(self.exprs.len());
                    for (expr, _) in &self.exprs {
                        new_row.push(evaluate_expr(expr, &columns, &row)?);
                    }
                    new_rows.push(new_row);
                }

                Ok(ResultSet::Scan {
                    columns: new_cols,
                    rows: new_rows,
                })
            }
            _ => Err(Error::Internal("Unexpected result set".into())),
        }
    }
}
