use crate::{
    error::{Error, Result},
    sql::{
        engine::Transaction,
        parser::ast::{matches, Expression},
    },
};

use super::{Executor, ResultSet};

/// Nested Loop Join executor - inner join of two sources on a predicate
pub struct NestedLoopJoin<T: Transaction> {
    left: Box<dyn Executor<T>>,
    right: Box<dyn Executor<T>>,
    predicate: Expression,
}

impl<T: Transaction> NestedLoopJoin<T> {
    pub fn new(
        left: Box<dyn Executor<T>>,
        right: Box<dyn Executor<T>>,
        predicate: Expression,
    ) -> Box<Self> {
        Box::new(Self {
            left,
            right,
            predicate,
        })
    }
}

impl<T: Transaction> Executor<T> for NestedLoopJoin<T> {
    fn execute(self: Box<Self>, txn: &mut T) -> Result<ResultSet> {
        let (
            ResultSet::Scan {
                columns: lcols,
                rows: lrows,
            },
            ResultSet::Scan {
                columns: rcols,
                rows: rrows,
            },
        ) = (self.left.execute(txn)?, self.right.execute(txn)?)
        else {
            return Err(Error::Internal("Unexpected result set".into()));
        };

        // Labels stay table-qualified, so `user.id` and `role.id` remain distinct
        let mut new_cols = lcols;
        new_cols.extend(rcols);

        // Nested loop: for each left row, iterate through all right rows
        let mut new_rows = Vec::new();
        for lrow in &lrows {
            for rrow in &rrows {
                let mut row = lrow.clone();
                row.extend(rrow.iter().cloned());
                if matches(&self.predicate, &new_cols, &row)? {
                    new_rows.push(row);
                }
            }
        }

        Ok(ResultSet::Scan {
            columns: new_cols,
            rows: new_rows,
        })
    }
}
