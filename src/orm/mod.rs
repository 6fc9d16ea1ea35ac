//! Object-relational mapping layer
//!
//! - `datatype`: logical column types
//! - `column`: column descriptors and their DDL rendering
//! - `schema`: per-entity schemas and the process-wide registry
//! - `query`: parameterized SQL fragments
//! - `record`: the `Entity` trait and its CRUD operations
//! - `migration`: DDL migrations and migration files

pub mod column;
pub mod datatype;
pub mod migration;
pub mod query;
pub mod record;
pub mod schema;
