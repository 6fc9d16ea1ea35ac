use std::fmt::Display;

use serde::Serialize;

use crate::{orm::datatype::LogicalType, sql::types::Value};

/// Action taken on referencing rows when the referenced row changes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ReferentialAction {
    Cascade,
    Restrict,
    SetNull,
    SetDefault,
    NoAction,
}

impl Display for ReferentialAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ReferentialAction::Cascade => "CASCADE",
            ReferentialAction::Restrict => "RESTRICT",
            ReferentialAction::SetNull => "SET NULL",
            ReferentialAction::SetDefault => "SET DEFAULT",
            ReferentialAction::NoAction => "NO ACTION",
        })
    }
}

/// A declared column: logical type plus constraints
///
/// Built with consuming setters and read-only afterwards:
///
/// ```
/// use tinyorm::{ColumnDescriptor, LogicalType};
///
/// let email = ColumnDescriptor::new(LogicalType::varchar(100)).not_null().unique();
/// assert_eq!(email.render(), "VARCHAR(100) NOT NULL UNIQUE");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDescriptor {
    logical_type: LogicalType,
    primary_key: bool,
    nullable: bool,
    unique: bool,
    foreign_key: Option<String>,
    on_delete: Option<ReferentialAction>,
    on_update: Option<ReferentialAction>,
    default: Option<Value>,
}

impl ColumnDescriptor {
    pub fn new(logical_type: LogicalType) -> Self {
        Self {
            logical_type,
            primary_key: false,
            nullable: true,
            unique: false,
            foreign_key: None,
            on_delete: None,
            on_update: None,
            default: None,
        }
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    pub fn not_null(self) -> Self {
        self.nullable(false)
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// REFERENCES target, written as it should appear: `role(role_id)`
    pub fn references(mut self, target: impl Into<String>) -> Self {
        self.foreign_key = Some(target.into());
        self
    }

    pub fn on_delete(mut self, action: ReferentialAction) -> Self {
        self.on_delete = Some(action);
        self
    }

    pub fn on_update(mut self, action: ReferentialAction) -> Self {
        self.on_update = Some(action);
        self
    }

    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn logical_type(&self) -> &LogicalType {
        &self.logical_type
    }

    pub fn is_primary_key(&self) -> bool {
        self.primary_key
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    pub fn is_unique(&self) -> bool {
        self.unique
    }

    pub fn is_foreign_key(&self) -> bool {
        self.foreign_key.is_some()
    }

    pub fn foreign_key(&self) -> Option<&str> {
        self.foreign_key.as_deref()
    }

    pub fn default_value(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    pub fn validate_type(&self) -> bool {
        self.logical_type.validate()
    }

    /// Constraint keywords in a fixed order: NOT NULL, UNIQUE, PRIMARY KEY,
    /// REFERENCES, ON DELETE, ON UPDATE, DEFAULT
    pub fn constraints_clause(&self) -> String {
        let mut constraints = Vec::new();
        if !self.nullable {
            constraints.push("NOT NULL".to_string());
        }
        if self.unique {
            constraints.push("UNIQUE".to_string());
        }
        if self.primary_key {
            constraints.push("PRIMARY KEY".to_string());
        }
        if let Some(target) = &self.foreign_key {
            constraints.push(format!("REFERENCES {}", target));
        }
        if let Some(action) = self.on_delete {
            constraints.push(format!("ON DELETE {}", action));
        }
        if let Some(action) = self.on_update {
            constraints.push(format!("ON UPDATE {}", action));
        }
        if let Some(default) = &self.default {
            constraints.push(format!("DEFAULT {}", default.to_sql_literal()));
        }
        constraints.join(" ")
    }

    /// Column definition as used in CREATE TABLE, without the name
    pub fn render(&self) -> String {
        format!("{} {}", self.logical_type.sql_type(), self.constraints_clause())
            .trim()
            .to_string()
    }

    pub fn describe(&self) -> ColumnDescription {
        ColumnDescription {
            sql_type: self.logical_type.sql_type(),
            primary_key: self.primary_key,
            nullable: self.nullable,
            unique: self.unique,
            foreign_key: self.foreign_key.clone(),
            on_delete: self.on_delete.map(|a| a.to_string()),
            on_update: self.on_update.map(|a| a.to_string()),
            default: self.default.as_ref().map(Value::to_sql_literal),
        }
    }
}

/// Serializable snapshot of a column's configuration
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnDescription {
    #[serde(rename = "type")]
    pub sql_type: String,
    pub primary_key: bool,
    pub nullable: bool,
    pub unique: bool,
    pub foreign_key: Option<String>,
    pub on_delete: Option<String>,
    pub on_update: Option<String>,
    pub default: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::{ColumnDescriptor, ReferentialAction};
    use crate::orm::datatype::LogicalType;

    #[test]
    fn test_render() {
        let id = ColumnDescriptor::new(LogicalType::integer()).primary_key();
        assert_eq!(id.render(), "INTEGER PRIMARY KEY");

        let name = ColumnDescriptor::new(LogicalType::varchar(100)).nullable(false);
        assert_eq!(name.render(), "VARCHAR(100) NOT NULL");

        let plain = ColumnDescriptor::new(LogicalType::text());
        assert_eq!(plain.constraints_clause(), "");
        assert_eq!(plain.render(), "TEXT");
    }

    #[test]
    fn test_constraint_order() {
        let role = ColumnDescriptor::new(LogicalType::integer())
            .default(1)
            .on_update(ReferentialAction::NoAction)
            .on_delete(ReferentialAction::SetNull)
            .references("role(role_id)")
            .unique()
            .not_null();
        assert_eq!(
            role.render(),
            "INTEGER NOT NULL UNIQUE REFERENCES role(role_id) ON DELETE SET NULL ON UPDATE NO ACTION DEFAULT 1"
        );
        assert!(role.is_foreign_key());
        assert!(!role.is_primary_key());
        assert!(role.is_unique());
        assert!(!role.is_nullable());
        assert_eq!(role.foreign_key(), Some("role(role_id)"));
        assert_eq!(role.default_value(), Some(&crate::sql::types::Value::Integer(1)));
    }

    #[test]
    fn test_describe() {
        let title = ColumnDescriptor::new(LogicalType::varchar(50)).default("draft");
        let description = title.describe();
        assert_eq!(description.sql_type, "VARCHAR(50)");
        assert!(description.nullable);
        assert_eq!(description.default.as_deref(), Some("'draft'"));
        assert_eq!(description.on_delete, None);
    }
}
