use tracing::debug;

use crate::{error::{Error, Result}, sql::types::Value};

use super::{executor::ResultSet, parser::Parser, plan::Plan, schema::Table, types::Row};

mod kv;

pub use kv::{KVEngine, KVTransaction};

/// SQL engine trait
pub trait Engine: Clone {
    type Transaction: Transaction;

    fn begin(&self) -> Result<Self::Transaction>;

    /// Opens a session holding one transaction until commit or rollback
    fn session(&self) -> Result<Session<Self>> {
        Ok(Session { txn: self.begin()? })
    }
}

/// SQL transaction trait (DDL and DML operations)
///
/// Can be backed by KV storage or distributed storage.
pub trait Transaction {
    fn commit(&mut self) -> Result<()>;
    fn rollback(&mut self) -> Result<()>;

    /// Inserts a row and returns its row id
    fn create_row(&mut self, table_name: &str, row: Row) -> Result<i64>;
    /// Replaces the row stored under `id`
    fn update_row(&mut self, table: &Table, id: i64, row: Row) -> Result<()>;
    /// Deletes a row by row id
    fn delete_row(&mut self, table: &Table, id: i64) -> Result<()>;
    /// Scans a table, returning (row id, row) pairs in row id order
    fn scan_table(&self, table_name: &str) -> Result<Vec<(i64, Row)>>;

    // DDL operations
    fn create_table(&mut self, table: Table) -> Result<()>;
    fn get_table(&self, table_name: &str) -> Result<Option<Table>>;
    /// Returns table info, returns error if table doesn't exist
    fn must_get_table(&self, table_name: &str) -> Result<Table> {
        self.get_table(table_name)?
            .ok_or(Error::Internal(format!(
                "table {} does not exist",
                table_name
            )))
    }
}

/// SQL session for executing statements inside one transaction
pub struct Session<E: Engine> {
    txn: E::Transaction,
}

impl<E: Engine> Session<E>
where
    E::Transaction: 'static,
{
    /// Executes a SQL statement, binding `params` to its placeholders
    pub fn execute(&mut self, sql: &str, params: &[Value]) -> Result<ResultSet> {
        debug!(sql, params = params.len(), "executing statement");
        let stmt = Parser::with_params(sql, params).parse()?;
        Plan::build(stmt)?.execute(&mut self.txn)
    }

    pub fn commit(&mut self) -> Result<()> {
        self.txn.commit()
    }

    pub fn rollback(&mut self) -> Result<()> {
        self.txn.rollback()
    }
}
