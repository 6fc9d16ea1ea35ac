use crate::{
    error::{Error, Result},
    sql::{
        parser::ast::{self, evaluate_expr, Expression, Operation},
        plan::{Node, Plan},
        schema::{self, Table},
        types::Value,
    },
};

/// Query planner - converts AST into execution plan nodes
pub struct Planner;

impl Planner {
    pub fn new() -> Self {
        Self {}
    }

    /// Builds an execution plan from an AST statement
    pub fn build(&mut self, stmt: ast::Statement) -> Result<Plan> {
        Ok(Plan(self.build_statement(stmt)?))
    }

    pub fn build_statement(&self, stmt: ast::Statement) -> Result<Node> {
        Ok(match stmt {
            ast::Statement::CreateTable {
                name,
                columns,
                if_not_exists,
            } => Node::CreateTable {
                schema: Table {
                    name,
                    columns: columns
                        .into_iter()
                        .map(|c| {
                            let nullable = c.nullable.unwrap_or(!c.primary_key);
                            let default = match c.default {
                                Some(expr) => Some(constant(&expr)?),
                                None if nullable => Some(Value::Null),
                                None => None,
                            };

                            Ok(schema::Column {
                                name: c.name,
                                datatype: c.datatype,
                                nullable,
                                default,
                                primary_key: c.primary_key,
                                unique: c.unique,
                                references: c.references,
                            })
                        })
                        .collect::<Result<_>>()?,
                },
                if_not_exists,
            },
            ast::Statement::Insert {
                table_name,
                columns,
                values,
            } => Node::Insert {
                table_name,
                columns: columns.unwrap_or_default(),
                values,
            },
            ast::Statement::Select {
                select,
                from,
                where_clause,
                group_by,
                having,
                order_by,
                limit,
                offset,
            } => {
                // Build scan node from FROM clause (single table or join result)
                let mut node = self.build_from_item(from)?;

                // WHERE - pushed into the scan when reading a single table
                if let Some(predicate) = where_clause {
                    node = match node {
                        Node::Scan {
                            table_name,
                            filter: None,
                        } => Node::Scan {
                            table_name,
                            filter: Some(predicate),
                        },
                        source => Node::Filter {
                            source: Box::new(source),
                            predicate,
                        },
                    };
                }

                // HAVING and ORDER BY may name a select alias
                let aliases: Vec<(String, Expression)> = select
                    .iter()
                    .filter_map(|(expr, alias)| alias.clone().map(|a| (a, expr.clone())))
                    .collect();
                let having = having.map(|expr| substitute_aliases(expr, &aliases));

                let mut aggregates = Vec::new();
                for (expr, _) in &select {
                    collect_aggregates(expr, &mut aggregates);
                }
                if let Some(expr) = &having {
                    collect_aggregates(expr, &mut aggregates);
                }

                if !group_by.is_empty() || !aggregates.is_empty() {
                    node = Node::Aggregate {
                        source: Box::new(node),
                        group_by,
                        aggregates,
                    };
                }

                if let Some(predicate) = having {
                    node = Node::Filter {
                        source: Box::new(node),
                        predicate,
                    };
                }

                if !order_by.is_empty() {
                    node = Node::Order {
                        source: Box::new(node),
                        order_by: order_by
                            .into_iter()
                            .map(|(name, direction)| {
                                let name = aliases
                                    .iter()
                                    .find(|(alias, _)| *alias == name)
                                    .and_then(|(_, expr)| expr.label())
                                    .unwrap_or(name);
                                (name, direction)
                            })
                            .collect(),
                    }
                }

                // OFFSET - must be processed before LIMIT when both are present
                if let Some(expr) = offset {
                    node = Node::Offset {
                        source: Box::new(node),
                        offset: match constant(&expr)? {
                            Value::Integer(i) if i >= 0 => i as usize,
                            _ => return Err(Error::Internal("invalid offset".into())),
                        },
                    }
                }

                // LIMIT
                if let Some(expr) = limit {
                    node = Node::Limit {
                        source: Box::new(node),
                        limit: match constant(&expr)? {
                            Value::Integer(i) if i >= 0 => i as usize,
                            _ => return Err(Error::Internal("invalid limit".into())),
                        },
                    }
                }

                // projection
                if !select.is_empty() {
                    node = Node::Projection {
                        source: Box::new(node),
                        exprs: select,
                    }
                }

                node
            }
            ast::Statement::Update {
                table_name,
                columns,
                where_clause,
            } => Node::Update {
                table_name,
                filter: where_clause,
                columns,
            },
            ast::Statement::Delete {
                table_name,
                where_clause,
            } => Node::Delete {
                table_name,
                filter: where_clause,
            },
        })
    }

    fn build_from_item(&self, item: ast::FromItem) -> Result<Node> {
        Ok(match item {
            ast::FromItem::Table { name } => Node::Scan {
                table_name: name,
                filter: None,
            },
            ast::FromItem::Join {
                left,
                right,
                predicate,
            } => Node::NestedLoopJoin {
                // Recursively build join nodes (base case: single table)
                left: Box::new(self.build_from_item(*left)?),
                right: Box::new(self.build_from_item(*right)?),
                predicate,
            },
        })
    }
}

/// Evaluates an expression that must not reference any column
fn constant(expr: &Expression) -> Result<Value> {
    evaluate_expr(expr, &[], &[])
}

fn collect_aggregates(expr: &Expression, out: &mut Vec<Expression>) {
    match expr {
        Expression::Function(..) => {
            if !out.contains(expr) {
                out.push(expr.clone());
            }
        }
        Expression::Operation(op) => {
            let (l, r) = operands(op);
            collect_aggregates(l, out);
            collect_aggregates(r, out);
        }
        Expression::Field(_) | Expression::Consts(_) => {}
    }
}

fn substitute_aliases(expr: Expression, aliases: &[(String, Expression)]) -> Expression {
    match expr {
        Expression::Field(name) => match aliases.iter().find(|(alias, _)| *alias == name) {
            Some((_, aliased)) => aliased.clone(),
            None => Expression::Field(name),
        },
        Expression::Operation(op) => {
            let sub = |e: Box<Expression>| Box::new(substitute_aliases(*e, aliases));
            Expression::Operation(match op {
                Operation::And(l, r) => Operation::And(sub(l), sub(r)),
                Operation::Equal(l, r) => Operation::Equal(sub(l), sub(r)),
                Operation::NotEqual(l, r) => Operation::NotEqual(sub(l), sub(r)),
                Operation::GreaterThan(l, r) => Operation::GreaterThan(sub(l), sub(r)),
                Operation::GreaterThanOrEqual(l, r) => {
                    Operation::GreaterThanOrEqual(sub(l), sub(r))
                }
                Operation::LessThan(l, r) => Operation::LessThan(sub(l), sub(r)),
                Operation::LessThanOrEqual(l, r) => Operation::LessThanOrEqual(sub(l), sub(r)),
            })
        }
        expr => expr,
    }
}

fn operands(op: &Operation) -> (&Expression, &Expression) {
    match op {
        Operation::And(l, r)
        | Operation::Equal(l, r)
        | Operation::NotEqual(l, r)
        | Operation::GreaterThan(l, r)
        | Operation::GreaterThanOrEqual(l, r)
        | Operation::LessThan(l, r)
        | Operation::LessThanOrEqual(l, r) => (l, r),
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        error::Result,
        sql::{
            parser::{ast::Expression, Parser},
            plan::{Node, Plan},
            types::Value,
        },
    };

    #[test]
    fn test_plan_group_having() -> Result<()> {
        let params = [Value::Integer(1)];
        let stmt = Parser::with_params(
            "SELECT role_id, COUNT(*) AS total FROM user GROUP BY role_id HAVING total > ?",
            &params,
        )
        .parse()?;
        let Plan(node) = Plan::build(stmt)?;

        let Node::Projection { source, .. } = node else {
            panic!("expected projection, got {:?}", node);
        };
        let Node::Filter { source, .. } = *source else {
            panic!("expected having filter");
        };
        match *source {
            Node::Aggregate { group_by, aggregates, .. } => {
                assert_eq!(group_by, vec!["role_id".to_string()]);
                assert_eq!(aggregates, vec![Expression::Function("count".into(), "*".into())]);
            }
            n => panic!("expected aggregate, got {:?}", n),
        }
        Ok(())
    }

    #[test]
    fn test_plan_where_pushdown() -> Result<()> {
        let params = [Value::Integer(7)];
        let stmt = Parser::with_params("SELECT * FROM user WHERE id = ?", &params).parse()?;
        match Plan::build(stmt)?.0 {
            Node::Scan { table_name, filter } => {
                assert_eq!(table_name, "user");
                assert!(filter.is_some());
            }
            n => panic!("expected scan, got {:?}", n),
        }
        Ok(())
    }
}
