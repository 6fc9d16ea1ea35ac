//! Embedded SQL engine behind the bundled connector
//!
//! This module provides:
//! - `parser`: SQL lexer and parser
//! - `types`: SQL data types and values
//! - `schema`: Table and column schema definitions
//! - `plan`: Execution plan generation
//! - `executor`: Query and mutation execution
//! - `engine`: Sessions and transactions over key-value storage

pub mod engine;
pub mod executor;
pub mod parser;
pub mod plan;
pub mod schema;
pub mod types;
