//! Connection lifecycle
//!
//! The ORM never opens a database itself. Every operation asks a
//! [`Connector`] for a fresh connection, runs one unit of work through a
//! [`Cursor`] and commits or rolls back before releasing both.

use tracing::{debug, error};

use crate::{
    error::Result,
    sql::types::{Record, Value},
};

mod memory;

pub use memory::{MemoryConnection, MemoryConnector, MemoryCursor};

/// Hands out connections to one database
pub trait Connector {
    type Connection: Connection;

    fn connect(&self) -> Result<Self::Connection>;
}

/// A single database connection
pub trait Connection {
    type Cursor: Cursor;

    fn cursor(&mut self) -> Result<Self::Cursor>;
    fn commit(&mut self) -> Result<()>;
    fn rollback(&mut self) -> Result<()>;
    fn close(&mut self) -> Result<()>;
}

/// Executes statements and walks their result rows
pub trait Cursor {
    /// Executes one statement, binding `params` to its `?` placeholders
    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<()>;
    /// Next row of the last query, `None` once exhausted
    fn fetch_one(&mut self) -> Result<Option<Record>>;
    /// All remaining rows of the last query
    fn fetch_all(&mut self) -> Result<Vec<Record>>;
    /// Rows affected (or returned) by the last statement
    fn rowcount(&self) -> usize;
    /// Id the database assigned to the last inserted row
    fn last_insert_id(&self) -> Option<i64>;
    fn close(&mut self) -> Result<()>;
}

/// Runs `work` inside one transaction.
///
/// Commits when `work` succeeds. On failure the error is logged, the
/// transaction is rolled back once and the original error is returned.
/// Cursor and connection are closed on every path.
pub fn with_transaction<C, T, F>(connector: &C, work: F) -> Result<T>
where
    C: Connector,
    F: FnOnce(&mut <C::Connection as Connection>::Cursor) -> Result<T>,
{
    let mut conn = connector.connect()?;
    let mut cursor = match conn.cursor() {
        Ok(cursor) => cursor,
        Err(err) => {
            close_quietly(&mut conn);
            return Err(err);
        }
    };

    let outcome = work(&mut cursor).and_then(|value| conn.commit().map(|_| value));
    if let Err(err) = &outcome {
        error!(%err, "operation failed, rolling back");
        if let Err(rollback_err) = conn.rollback() {
            error!(%rollback_err, "rollback failed");
        }
    }

    if let Err(err) = cursor.close() {
        debug!(%err, "closing cursor failed");
    }
    close_quietly(&mut conn);
    outcome
}

fn close_quietly<C: Connection>(conn: &mut C) {
    if let Err(err) = conn.close() {
        debug!(%err, "closing connection failed");
    }
}
