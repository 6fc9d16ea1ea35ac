use std::collections::{BTreeMap, HashMap};

use crate::{
    error::{Error, Result},
    sql::{
        engine::Transaction,
        parser::ast::{evaluate_expr, matches, Expression},
        schema::Table,
        types::{Row, Value},
    },
};

use super::{Executor, ResultSet};

/// INSERT executor
pub struct Insert {
    table_name: String,
    columns: Vec<String>,
    values: Vec<Vec<Expression>>,
}

impl Insert {
    pub fn new(
        table_name: String,
        columns: Vec<String>,
        values: Vec<Vec<Expression>>,
    ) -> Box<Self> {
        Box::new(Self {
            table_name,
            columns,
            values,
        })
    }
}

/// Value for a column the statement leaves out
fn default_for(table: &Table, index: usize) -> Result<Value> {
    let column = &table.columns[index];
    match &column.default {
        Some(default) => Ok(default.clone()),
        // The row id column is assigned by the engine
        None if table.rowid_index() == Some(index) => Ok(Value::Null),
        None => Err(Error::Internal(format!(
            "No value given for column {}",
            column.name
        ))),
    }
}

// Pads a positional row with column defaults:
// insert into tbl values(1, 2, 3);
//   a   b   c   d
//   1   2   3   default
fn pad_row(table: &Table, row: Row) -> Result<Row> {
    if row.len() > table.columns.len() {
        return Err(Error::Internal(format!(
            "table {} has {} columns but {} values were given",
            table.name,
            table.columns.len(),
            row.len()
        )));
    }
    let mut results = row;
    for i in results.len()..table.columns.len() {
        results.push(default_for(table, i)?);
    }
    Ok(results)
}

// Places named values and fills the rest with defaults:
// insert into tbl(d, c) values(1, 2);
//   a         b         c   d
//   default   default   2   1
fn make_row(table: &Table, columns: &[String], values: Row) -> Result<Row> {
    if columns.len() != values.len() {
        return Err(Error::Internal("columns and values num mismatch".into()));
    }

    let mut inputs = HashMap::new();
    for (col_name, value) in columns.iter().zip(values) {
        table.get_col_index(col_name)?;
        inputs.insert(col_name.as_str(), value);
    }

    let mut results = Vec::with_capacity(table.columns.len());
    for (i, col) in table.columns.iter().enumerate() {
        match inputs.remove(col.name.as_str()) {
            Some(value) => results.push(value),
            None => results.push(default_for(table, i)?),
        }
    }
    Ok(results)
}

impl<T: Transaction> Executor<T> for Insert {
    fn execute(self: Box<Self>, txn: &mut T) -> Result<ResultSet> {
        let table = txn.must_get_table(&self.table_name)?;
        let mut count = 0;
        let mut last_insert_id = None;
        for exprs in self.values {
            let row = exprs
                .iter()
                .map(|e| evaluate_expr(e, &[], &[]))
                .collect::<Result<Row>>()?;

            // Without a column list the values line up with the table's columns
            let insert_row = if self.columns.is_empty() {
                pad_row(&table, row)?
            } else {
                make_row(&table, &self.columns, row)?
            };

            last_insert_id = Some(txn.create_row(&self.table_name, insert_row)?);
            count += 1;
        }
        Ok(ResultSet::Insert {
            count,
            last_insert_id,
        })
    }
}

/// UPDATE executor
pub struct Update {
    table_name: String,
    filter: Option<Expression>,
    columns: BTreeMap<String, Expression>,
}

impl Update {
    pub fn new(
        table_name: String,
        filter: Option<Expression>,
        columns: BTreeMap<String, Expression>,
    ) -> Box<Self> {
        Box::new(Self {
            table_name,
            filter,
            columns,
        })
    }
}

impl<T: Transaction> Executor<T> for Update {
    fn execute(self: Box<Self>, txn: &mut T) -> Result<ResultSet> {
        let table = txn.must_get_table(&self.table_name)?;
        let cols = table.qualified_columns();
        let mut targets = Vec::with_capacity(self.columns.len());
        for (name, expr) in &self.columns {
            targets.push((table.get_col_index(name)?, expr));
        }

        let mut count = 0;
        for (id, row) in txn.scan_table(&self.table_name)? {
            if let Some(filter) = &self.filter {
                if !matches(filter, &cols, &row)? {
                    continue;
                }
            }
            let mut new_row = row.clone();
            for (index, expr) in &targets {
                new_row[*index] = evaluate_expr(expr, &cols, &row)?;
            }
            txn.update_row(&table, id, new_row)?;
            count += 1;
        }
        Ok(ResultSet::Update { count })
    }
}

/// DELETE executor
pub struct Delete {
    table_name: String,
    filter: Option<Expression>,
}

impl Delete {
    pub fn new(table_name: String, filter: Option<Expression>) -> Box<Self> {
        Box::new(Self { table_name, filter })
    }
}

impl<T: Transaction> Executor<T> for Delete {
    fn execute(self: Box<Self>, txn: &mut T) -> Result<ResultSet> {
        let table = txn.must_get_table(&self.table_name)?;
        let cols = table.qualified_columns();
        let mut count = 0;
        for (id, row) in txn.scan_table(&self.table_name)? {
            if let Some(filter) = &self.filter {
                if !matches(filter, &cols, &row)? {
                    continue;
                }
            }
            txn.delete_row(&table, id)?;
            count += 1;
        }
        Ok(ResultSet::Delete { count })
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        error::Result,
        sql::{engine::{Engine, KVEngine}, executor::ResultSet, types::Value},
        storage::memory::MemoryEngine,
    };

    #[test]
    fn test_update_and_delete() -> Result<()> {
        let kvengine = KVEngine::new(MemoryEngine::new());
        let mut s = kvengine.session()?;
        s.execute("create table t (id integer primary key, name text, age integer)", &[])?;
        s.execute("insert into t (name, age) values ('a', 10), ('b', 20), ('c', 30)", &[])?;

        let updated = s.execute(
            "update t set age = ? where name = ?",
            &[Value::Integer(21), Value::from("b")],
        )?;
        assert_eq!(updated, ResultSet::Update { count: 1 });

        let deleted = s.execute("delete from t where age > 20", &[])?;
        assert_eq!(deleted, ResultSet::Delete { count: 2 });

        match s.execute("select name, age from t", &[])? {
            ResultSet::Scan { rows, .. } => {
                assert_eq!(rows, vec![vec![Value::from("a"), Value::Integer(10)]]);
            }
            rs => panic!("unexpected result {:?}", rs),
        }
        Ok(())
    }

    #[test]
    fn test_insert_unknown_column() -> Result<()> {
        let kvengine = KVEngine::new(MemoryEngine::new());
        let mut s = kvengine.session()?;
        s.execute("create table t (id integer primary key, name text)", &[])?;
        assert!(s.execute("insert into t (nope) values (1)", &[]).is_err());
        assert!(s.execute("insert into t values (1, 'a', 'extra')", &[]).is_err());
        Ok(())
    }
}
