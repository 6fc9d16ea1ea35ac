use tracing::debug;

use crate::{
    error::{Error, Result},
    sql::{engine::Transaction, schema::Table},
};

use super::{Executor, ResultSet};

/// CREATE TABLE executor
pub struct CreateTable {
    schema: Table,
    if_not_exists: bool,
}

impl CreateTable {
    pub fn new(schema: Table, if_not_exists: bool) -> Box<Self> {
        Box::new(Self {
            schema,
            if_not_exists,
        })
    }
}

impl<T: Transaction> Executor<T> for CreateTable {
    fn execute(self: Box<Self>, txn: &mut T) -> Result<ResultSet> {
        let table_name = self.schema.name.clone();
        if txn.get_table(&table_name)?.is_some() {
            if self.if_not_exists {
                debug!(table = %table_name, "table exists, skipping create");
                return Ok(ResultSet::CreateTable {
                    table_name,
                    created: false,
                });
            }
            return Err(Error::Internal(format!(
                "table {} already exists",
                table_name
            )));
        }
        txn.create_table(self.schema)?;
        Ok(ResultSet::CreateTable {
            table_name,
            created: true,
        })
    }
}
