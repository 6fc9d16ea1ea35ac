use crate::{
    error::Result,
    sql::{
        engine::Transaction,
        executor::{
            agg::Aggregate,
            join::NestedLoopJoin,
            mutation::{Delete, Insert, Update},
            query::{Filter, Limit, Offset, Order, Projection, Scan},
            schema::CreateTable,
        },
        plan::Node,
        types::Row,
    },
};

mod agg;
mod join;
mod mutation;
mod query;
mod schema;

/// SQL executor trait
pub trait Executor<T: Transaction> {
    fn execute(self: Box<Self>, txn: &mut T) -> Result<ResultSet>;
}

/// Builds an executor from a plan node
///
/// The `'static` bound is required for trait object usage in recursive executor building.
impl<T: Transaction + 'static> dyn Executor<T> {
    pub fn build(node: Node) -> Box<dyn Executor<T>> {
        match node {
            Node::CreateTable {
                schema,
                if_not_exists,
            } => CreateTable::new(schema, if_not_exists),
            Node::Insert {
                table_name,
                columns,
                values,
            } => Insert::new(table_name, columns, values),
            Node::Scan { table_name, filter } => Scan::new(table_name, filter),
            Node::Update {
                table_name,
                filter,
                columns,
            } => Update::new(table_name, filter, columns),
            Node::Delete { table_name, filter } => Delete::new(table_name, filter),
            Node::NestedLoopJoin {
                left,
                right,
                predicate,
            } => NestedLoopJoin::new(Self::build(*left), Self::build(*right), predicate),
            Node::Filter { source, predicate } => Filter::new(Self::build(*source), predicate),
            Node::Aggregate {
                source,
                group_by,
                aggregates,
            } => Aggregate::new(Self::build(*source), group_by, aggregates),
            Node::Order { source, order_by } => Order::new(Self::build(*source), order_by),
            Node::Limit { source, limit } => Limit::new(Self::build(*source), limit),
            Node::Offset { source, offset } => Offset::new(Self::build(*source), offset),
            Node::Projection { source, exprs } => Projection::new(Self::build(*source), exprs),
        }
    }
}

/// Execution result set
#[derive(Debug, Clone, PartialEq)]
pub enum ResultSet {
    CreateTable {
        table_name: String,
        /// False when IF NOT EXISTS found the table already present
        created: bool,
    },
    Insert {
        count: usize,
        /// Row id of the last inserted row
        last_insert_id: Option<i64>,
    },
    Scan {
        columns: Vec<String>,
        rows: Vec<Row>,
    },
    Update {
        count: usize,
    },
    Delete {
        count: usize,
    },
}

impl ResultSet {
    /// Number of rows produced or affected
    pub fn row_count(&self) -> usize {
        match self {
            ResultSet::CreateTable { .. } => 0,
            ResultSet::Insert { count, .. }
            | ResultSet::Update { count }
            | ResultSet::Delete { count } => *count,
            ResultSet::Scan { rows, .. } => rows.len(),
        }
    }
}
