//! Schema migrations
//!
//! [`Migrator`] issues DDL through a connector, one transaction per call.
//! Migration files are plain SQL statements separated by `;`. A file may
//! carry `-- migrate:up` and `-- migrate:down` markers; without them the
//! whole file is the up section.

use std::{fs, path::Path};

use tracing::info;

use crate::{
    connection::{with_transaction, Connector, Cursor},
    error::{Error, Result},
    orm::{
        column::{ColumnDescriptor, ReferentialAction},
        datatype::LogicalType,
        query::validate_name,
        record::Entity,
    },
};

const UP_MARKER: &str = "-- migrate:up";
const DOWN_MARKER: &str = "-- migrate:down";

/// Table-level constraint for [`Migrator::add_constraint`]
#[derive(Debug, Clone, PartialEq)]
pub enum Constraint {
    PrimaryKey(Vec<String>),
    Unique(Vec<String>),
    ForeignKey {
        columns: Vec<String>,
        /// Target as written: `role(role_id)`
        references: String,
        on_delete: Option<ReferentialAction>,
        on_update: Option<ReferentialAction>,
    },
}

impl Constraint {
    fn to_sql(&self) -> Result<String> {
        fn column_list(columns: &[String]) -> Result<String> {
            if columns.is_empty() {
                return Err(Error::construction("constraint needs at least one column"));
            }
            for column in columns {
                validate_name(column)?;
            }
            Ok(columns.join(", "))
        }
        Ok(match self {
            Constraint::PrimaryKey(columns) => format!("PRIMARY KEY ({})", column_list(columns)?),
            Constraint::Unique(columns) => format!("UNIQUE ({})", column_list(columns)?),
            Constraint::ForeignKey {
                columns,
                references,
                on_delete,
                on_update,
            } => {
                let mut sql = format!(
                    "FOREIGN KEY ({}) REFERENCES {}",
                    column_list(columns)?,
                    references
                );
                if let Some(action) = on_delete {
                    sql.push_str(&format!(" ON DELETE {}", action));
                }
                if let Some(action) = on_update {
                    sql.push_str(&format!(" ON UPDATE {}", action));
                }
                sql
            }
        })
    }
}

/// Statements of one migration file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Migration {
    pub up: Vec<String>,
    pub down: Vec<String>,
}

impl Migration {
    /// Splits a migration script into its up and down statements
    pub fn parse(script: &str) -> Migration {
        let mut in_down = false;
        let mut up = String::new();
        let mut down = String::new();

        for line in script.lines() {
            let trimmed = line.trim();
            if trimmed.eq_ignore_ascii_case(UP_MARKER) {
                in_down = false;
                continue;
            }
            if trimmed.eq_ignore_ascii_case(DOWN_MARKER) {
                in_down = true;
                continue;
            }
            if trimmed.starts_with("--") {
                continue;
            }
            let target = if in_down { &mut down } else { &mut up };
            target.push_str(line);
            target.push('\n');
        }

        Migration {
            up: split_statements(&up),
            down: split_statements(&down),
        }
    }
}

/// Splits on `;` outside single-quoted strings
fn split_statements(sql: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut in_string = false;
    for c in sql.chars() {
        match c {
            '\'' => {
                in_string = !in_string;
                current.push(c);
            }
            ';' if !in_string => statements.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    statements.push(current);
    statements
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Issues schema changes against one database
pub struct Migrator<'a, C: Connector> {
    db: &'a C,
}

impl<'a, C: Connector> Migrator<'a, C> {
    pub fn new(db: &'a C) -> Self {
        Self { db }
    }

    fn run(&self, statements: &[String]) -> Result<()> {
        with_transaction(self.db, |cursor| {
            for statement in statements {
                cursor.execute(statement, &[])?;
            }
            Ok(())
        })
        .map_err(Error::into_execution)
    }

    fn alter(&self, table: &str, action: String) -> Result<()> {
        validate_name(table)?;
        let sql = format!("ALTER TABLE {} {}", table, action);
        info!(sql = %sql, "altering table");
        self.run(&[sql])
    }

    pub fn create_table<E: Entity>(&self) -> Result<()> {
        E::create_table(self.db)
    }

    pub fn add_column(
        &self,
        table: &str,
        column: &str,
        descriptor: &ColumnDescriptor,
    ) -> Result<()> {
        validate_name(column)?;
        self.alter(table, format!("ADD COLUMN {} {}", column, descriptor.render()))
    }

    pub fn remove_column(&self, table: &str, column: &str) -> Result<()> {
        validate_name(column)?;
        self.alter(table, format!("DROP COLUMN {}", column))
    }

    pub fn rename_column(&self, table: &str, from: &str, to: &str) -> Result<()> {
        validate_name(from)?;
        validate_name(to)?;
        self.alter(table, format!("RENAME COLUMN {} TO {}", from, to))
    }

    pub fn change_column_type(
        &self,
        table: &str,
        column: &str,
        logical_type: &LogicalType,
    ) -> Result<()> {
        validate_name(column)?;
        self.alter(table, format!("ALTER COLUMN {} TYPE {}", column, logical_type.sql_type()))
    }

    pub fn add_constraint(&self, table: &str, name: &str, constraint: &Constraint) -> Result<()> {
        validate_name(name)?;
        self.alter(table, format!("ADD CONSTRAINT {} {}", name, constraint.to_sql()?))
    }

    pub fn remove_constraint(&self, table: &str, name: &str) -> Result<()> {
        validate_name(name)?;
        self.alter(table, format!("DROP CONSTRAINT {}", name))
    }

    pub fn rename_table(&self, from: &str, to: &str) -> Result<()> {
        validate_name(to)?;
        self.alter(from, format!("RENAME TO {}", to))
    }

    /// Runs the up section of a migration file
    pub fn apply_migration(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let migration = Migration::parse(&fs::read_to_string(path)?);
        if migration.up.is_empty() {
            return Err(Error::construction(format!("{} has no statements", path.display())));
        }
        self.run(&migration.up)?;
        info!(path = %path.display(), statements = migration.up.len(), "applied migration");
        Ok(())
    }

    /// Runs the down section of a migration file
    pub fn rollback_migration(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let migration = Migration::parse(&fs::read_to_string(path)?);
        if migration.down.is_empty() {
            return Err(Error::construction(format!(
                "{} has no down section",
                path.display()
            )));
        }
        self.run(&migration.down)?;
        info!(path = %path.display(), statements = migration.down.len(), "rolled back migration");
        Ok(())
    }
}
