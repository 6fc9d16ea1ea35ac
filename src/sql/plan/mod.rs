use std::collections::BTreeMap;

use crate::{
    error::Result,
    sql::{
        engine::Transaction,
        executor::{Executor, ResultSet},
        parser::ast::{self, Expression, OrderDirection},
        schema::Table,
    },
};

mod planner;

use planner::Planner;

/// Execution plan node types
#[derive(Debug, PartialEq)]
pub enum Node {
    /// CREATE TABLE node
    CreateTable {
        schema: Table,
        if_not_exists: bool,
    },

    /// INSERT node
    Insert {
        table_name: String,
        columns: Vec<String>,
        values: Vec<Vec<Expression>>,
    },

    /// Full table scan with an optional filter
    Scan {
        table_name: String,
        filter: Option<Expression>,
    },

    /// UPDATE node; scans the table itself to keep row ids
    Update {
        table_name: String,
        filter: Option<Expression>,
        columns: BTreeMap<String, Expression>,
    },

    /// DELETE node
    Delete {
        table_name: String,
        filter: Option<Expression>,
    },

    /// Inner join of two sources
    NestedLoopJoin {
        left: Box<Node>,
        right: Box<Node>,
        predicate: Expression,
    },

    /// Row filter (WHERE over joins, HAVING over aggregates)
    Filter {
        source: Box<Node>,
        predicate: Expression,
    },

    /// GROUP BY and aggregate functions
    Aggregate {
        source: Box<Node>,
        group_by: Vec<String>,
        aggregates: Vec<Expression>,
    },

    /// ORDER BY node
    Order {
        source: Box<Node>,
        order_by: Vec<(String, OrderDirection)>,
    },

    /// LIMIT node
    Limit {
        source: Box<Node>,
        limit: usize,
    },

    /// OFFSET node
    Offset {
        source: Box<Node>,
        offset: usize,
    },

    /// Column projection
    Projection {
        source: Box<Node>,
        exprs: Vec<(Expression, Option<String>)>,
    },
}

/// Execution plan - wraps the root node
#[derive(Debug, PartialEq)]
pub struct Plan(pub Node);

impl Plan {
    pub fn build(stmt: ast::Statement) -> Result<Self> {
        Planner::new().build(stmt)
    }

    /// Runs the plan and strips table qualifiers from result labels
    pub fn execute<T: Transaction + 'static>(self, txn: &mut T) -> Result<ResultSet> {
        Ok(match <dyn Executor<T>>::build(self.0).execute(txn)? {
            ResultSet::Scan { columns, rows } => ResultSet::Scan {
                columns: columns.into_iter().map(plain_label).collect(),
                rows,
            },
            result => result,
        })
    }
}

/// `user.name` becomes `name`; aggregate labels such as `COUNT(*)` are kept
fn plain_label(label: String) -> String {
    if label.contains('(') {
        return label;
    }
    match label.rsplit_once('.') {
        Some((_, name)) => name.to_string(),
        None => label,
    }
}
