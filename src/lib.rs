//! tinyorm - a small active-record ORM
//!
//! This crate provides:
//! - Typed entity schemas rendered to `CREATE TABLE` DDL
//! - Parameterized query fragments (WHERE, GROUP BY, HAVING, JOIN)
//! - CRUD over any `Connector`, one transaction per operation
//! - Migrations
//! - An embedded SQL engine (parser, planner, executor, KV storage)
//!   behind `MemoryConnector`

pub mod config;
pub mod connection;
pub mod error;
pub mod orm;
pub mod sql;
pub mod storage;

pub use config::{Config, DatabaseConfig};
pub use connection::{with_transaction, Connection, Connector, Cursor, MemoryConnector};
pub use error::{Error, Result};
pub use orm::{
    column::{ColumnDescription, ColumnDescriptor, ReferentialAction},
    datatype::LogicalType,
    migration::{Constraint, Migration, Migrator},
    query::{Condition, Direction, Fragment, Operator, Select},
    record::Entity,
    schema::{EntitySchema, SchemaBuilder},
};
pub use sql::types::{FromValue, Record, Value};
