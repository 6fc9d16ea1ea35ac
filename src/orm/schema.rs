use std::{
    any::TypeId,
    collections::HashMap,
    sync::{LazyLock, RwLock},
};

use tracing::debug;

use crate::{
    error::{Error, Result},
    orm::{column::ColumnDescriptor, query::validate_name},
};

/// Declared columns of an entity, in declaration order
#[derive(Debug, Clone, PartialEq)]
pub struct EntitySchema {
    columns: Vec<(String, ColumnDescriptor)>,
}

/// Collects column declarations; [`SchemaBuilder::build`] checks them
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    columns: Vec<(String, ColumnDescriptor)>,
}

impl SchemaBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn column(mut self, name: impl Into<String>, descriptor: ColumnDescriptor) -> Self {
        self.columns.push((name.into(), descriptor));
        self
    }

    pub fn build(self) -> Result<EntitySchema> {
        if self.columns.is_empty() {
            return Err(Error::construction("schema declares no columns"));
        }
        for (i, (name, _)) in self.columns.iter().enumerate() {
            validate_name(name)?;
            if self.columns[..i].iter().any(|(other, _)| other == name) {
                return Err(Error::construction(format!("duplicate column {}", name)));
            }
        }
        let keys: Vec<&str> = self
            .columns
            .iter()
            .filter(|(_, c)| c.is_primary_key())
            .map(|(name, _)| name.as_str())
            .collect();
        if keys.len() > 1 {
            return Err(Error::construction(format!(
                "multiple primary keys: {}",
                keys.join(", ")
            )));
        }
        Ok(EntitySchema {
            columns: self.columns,
        })
    }
}

impl EntitySchema {
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::new()
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|(n, _)| n == name).map(|(_, c)| c)
    }

    pub fn columns(&self) -> impl Iterator<Item = (&str, &ColumnDescriptor)> {
        self.columns.iter().map(|(name, c)| (name.as_str(), c))
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Name of the column declared as primary key
    pub fn primary_key(&self) -> Option<&str> {
        self.columns
            .iter()
            .find(|(_, c)| c.is_primary_key())
            .map(|(name, _)| name.as_str())
    }

    /// Columns whose declared type keyword is not valid for its family
    pub fn invalid_columns(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|(_, c)| !c.validate_type())
            .map(|(name, _)| name.as_str())
            .collect()
    }

    pub fn generate_create_table(&self, table: &str) -> String {
        let columns: Vec<String> = self
            .columns
            .iter()
            .map(|(name, c)| format!("{} {}", name, c.render()))
            .collect();
        format!("CREATE TABLE IF NOT EXISTS {} ({})", table, columns.join(", "))
    }
}

/// Schemas built so far, one per entity type. Entries are never removed.
static REGISTRY: LazyLock<RwLock<HashMap<TypeId, &'static EntitySchema>>> =
    LazyLock::new(|| RwLock::new(HashMap::new()));

/// Returns the schema registered for `T`, building it with `define` on first use
pub fn registered<T: 'static>(
    define: impl FnOnce(SchemaBuilder) -> SchemaBuilder,
) -> Result<&'static EntitySchema> {
    let key = TypeId::of::<T>();
    let cached = REGISTRY.read()?.get(&key).copied();
    if let Some(schema) = cached {
        return Ok(schema);
    }

    let mut registry = REGISTRY.write()?;
    // Another thread may have registered it between the two locks
    if let Some(schema) = registry.get(&key).copied() {
        return Ok(schema);
    }
    let schema: &'static EntitySchema = Box::leak(Box::new(define(SchemaBuilder::new()).build()?));
    debug!(entity = std::any::type_name::<T>(), columns = schema.len(), "registered entity schema");
    registry.insert(key, schema);
    Ok(schema)
}

#[cfg(test)]
mod tests {
    use super::{registered, EntitySchema};
    use crate::{
        error::{Error, Result},
        orm::{column::ColumnDescriptor, datatype::LogicalType},
    };

    fn user_schema() -> Result<EntitySchema> {
        EntitySchema::builder()
            .column("user_id", ColumnDescriptor::new(LogicalType::integer()).primary_key())
            .column("email", ColumnDescriptor::new(LogicalType::varchar(100)).not_null())
            .column("tracking_id", ColumnDescriptor::new(LogicalType::integer()).unique())
            .column("role_id", ColumnDescriptor::new(LogicalType::integer()).references("role(role_id)"))
            .build()
    }

    #[test]
    fn test_generate_create_table() -> Result<()> {
        let schema = user_schema()?;
        assert_eq!(
            schema.generate_create_table("user"),
            "CREATE TABLE IF NOT EXISTS user (user_id INTEGER PRIMARY KEY, email VARCHAR(100) NOT NULL, \
             tracking_id INTEGER UNIQUE, role_id INTEGER REFERENCES role(role_id))"
        );
        assert_eq!(schema.primary_key(), Some("user_id"));
        assert_eq!(schema.column_names(), vec!["user_id", "email", "tracking_id", "role_id"]);
        assert!(schema.invalid_columns().is_empty());
        Ok(())
    }

    #[test]
    fn test_primary_key_is_explicit() -> Result<()> {
        // `_id` columns are not keys unless declared so
        let schema = EntitySchema::builder()
            .column("role_id", ColumnDescriptor::new(LogicalType::integer()))
            .column("title", ColumnDescriptor::new(LogicalType::varchar(50)))
            .build()?;
        assert_eq!(schema.primary_key(), None);
        Ok(())
    }

    #[test]
    fn test_build_errors() {
        let duplicate = EntitySchema::builder()
            .column("a", ColumnDescriptor::new(LogicalType::integer()))
            .column("a", ColumnDescriptor::new(LogicalType::text()))
            .build();
        assert!(matches!(duplicate, Err(Error::Construction(_))));

        let two_keys = EntitySchema::builder()
            .column("a", ColumnDescriptor::new(LogicalType::integer()).primary_key())
            .column("b", ColumnDescriptor::new(LogicalType::integer()).primary_key())
            .build();
        assert!(matches!(two_keys, Err(Error::Construction(_))));

        let bad_name = EntitySchema::builder()
            .column("a b", ColumnDescriptor::new(LogicalType::integer()))
            .build();
        assert!(matches!(bad_name, Err(Error::Construction(_))));
    }

    #[test]
    fn test_registry_builds_once() -> Result<()> {
        struct Marker;
        let first = registered::<Marker>(|s| s.column("id", ColumnDescriptor::new(LogicalType::integer()).primary_key()))?;
        let second = registered::<Marker>(|_| panic!("schema rebuilt"))?;
        assert!(std::ptr::eq(first, second));
        Ok(())
    }
}
