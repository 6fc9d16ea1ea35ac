//! Active-record operations over any [`Connector`]
//!
//! Each operation runs in its own transaction through
//! [`with_transaction`]. Backend failures come back as
//! [`Error::Execution`] after the transaction has been rolled back;
//! requests that cannot be turned into SQL fail with
//! [`Error::Construction`] before a connection is opened.

use tracing::{info, warn};

use crate::{
    connection::{with_transaction, Connector, Cursor},
    error::{Error, Result},
    orm::{
        query::{self, Select},
        schema::{self, EntitySchema, SchemaBuilder},
    },
    sql::types::{Record, Value},
};

/// A struct persisted as one table row
///
/// Only columns declared in [`Entity::define`] are read, written or
/// rehydrated; other struct fields are left alone.
///
/// ```
/// use tinyorm::{ColumnDescriptor, Entity, FromValue, LogicalType, Result, SchemaBuilder, Value};
///
/// #[derive(Default)]
/// struct Role {
///     role_id: Option<i64>,
///     title: String,
/// }
///
/// impl Entity for Role {
///     fn table_name() -> &'static str {
///         "role"
///     }
///
///     fn define(schema: SchemaBuilder) -> SchemaBuilder {
///         schema
///             .column("role_id", ColumnDescriptor::new(LogicalType::integer()).primary_key())
///             .column("title", ColumnDescriptor::new(LogicalType::varchar(50)))
///     }
///
///     fn field(&self, column: &str) -> Value {
///         match column {
///             "role_id" => self.role_id.into(),
///             "title" => self.title.as_str().into(),
///             _ => Value::Null,
///         }
///     }
///
///     fn set_field(&mut self, column: &str, value: Value) -> Result<()> {
///         match column {
///             "role_id" => self.role_id = FromValue::from_value(value)?,
///             "title" => self.title = FromValue::from_value(value)?,
///             _ => {}
///         }
///         Ok(())
///     }
/// }
/// ```
pub trait Entity: Default + 'static {
    fn table_name() -> &'static str;

    /// Declares the table's columns
    fn define(schema: SchemaBuilder) -> SchemaBuilder;

    /// Current value of a declared column
    fn field(&self, column: &str) -> Value;

    /// Stores a fetched value into a declared column
    fn set_field(&mut self, column: &str, value: Value) -> Result<()>;

    /// The entity's schema, built on first use and cached for the process
    fn schema() -> Result<&'static EntitySchema> {
        schema::registered::<Self>(Self::define)
    }

    /// Builds an instance from a fetched row; columns missing from the row
    /// keep their default
    fn from_record(record: &Record) -> Result<Self> {
        let mut entity = Self::default();
        for name in Self::schema()?.column_names() {
            if let Some(value) = record.get(name) {
                entity.set_field(name, value.clone())?;
            }
        }
        Ok(entity)
    }

    /// Updates the row when the primary key is set, inserts otherwise
    fn save<C: Connector>(&mut self, db: &C) -> Result<()> {
        let has_key = match Self::schema()?.primary_key() {
            Some(pk) => !self.field(pk).is_null(),
            None => false,
        };
        if has_key {
            self.update(db)
        } else {
            self.insert(db)
        }
    }

    /// Inserts the declared columns. A null primary key is left to the
    /// database and written back from the assigned id.
    fn insert<C: Connector>(&mut self, db: &C) -> Result<()> {
        let schema = Self::schema()?;
        let table = Self::table_name();
        let pk = schema.primary_key();
        let pk_missing = pk.is_some_and(|pk| self.field(pk).is_null());

        let mut columns = Vec::with_capacity(schema.len());
        let mut values = Vec::with_capacity(schema.len());
        for name in schema.column_names() {
            let value = self.field(name);
            if Some(name) == pk && pk_missing && schema.len() > 1 {
                continue;
            }
            columns.push(name);
            values.push(value);
        }
        let placeholders = vec!["?"; columns.len()].join(", ");
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            table,
            columns.join(", "),
            placeholders
        );

        let assigned = with_transaction(db, |cursor| {
            cursor.execute(&sql, &values)?;
            Ok(cursor.last_insert_id())
        })
        .map_err(Error::into_execution)?;

        if let (Some(pk), true, Some(id)) = (pk, pk_missing, assigned) {
            self.set_field(pk, Value::Integer(id))?;
        }
        Ok(())
    }

    /// Writes every declared column back to the row identified by the
    /// primary key. Fails when no row has that key.
    fn update<C: Connector>(&self, db: &C) -> Result<()> {
        let schema = Self::schema()?;
        let table = Self::table_name();
        let pk = schema
            .primary_key()
            .ok_or_else(|| Error::construction(format!("{} declares no primary key", table)))?;
        let id = self.field(pk);
        if id.is_null() {
            return Err(Error::construction(format!(
                "cannot update {} without a value for {}",
                table, pk
            )));
        }

        let mut assignments = Vec::with_capacity(schema.len());
        let mut values = Vec::with_capacity(schema.len() + 1);
        for name in schema.column_names() {
            if name == pk {
                continue;
            }
            assignments.push(format!("{} = ?", name));
            values.push(self.field(name));
        }
        if assignments.is_empty() {
            assignments.push(format!("{} = ?", pk));
            values.push(id.clone());
        }
        let sql = format!(
            "UPDATE {} SET {} WHERE {} = ?",
            table,
            assignments.join(", "),
            pk
        );
        values.push(id.clone());

        with_transaction(db, |cursor| {
            cursor.execute(&sql, &values)?;
            if cursor.rowcount() == 0 {
                return Err(Error::execution(format!("no {} row with {} = {}", table, pk, id)));
            }
            Ok(())
        })
        .map_err(Error::into_execution)
    }

    fn get<C: Connector>(db: &C, id: impl Into<Value>) -> Result<Option<Self>> {
        Self::get_from(db, Self::table_name(), id)
    }

    /// Fetches by primary key from `table`, which shares this entity's layout
    fn get_from<C: Connector>(db: &C, table: &str, id: impl Into<Value>) -> Result<Option<Self>> {
        query::validate_name(table)?;
        let pk = primary_key::<Self>()?;
        let sql = format!("SELECT * FROM {} WHERE {} = ?", table, pk);
        let id = id.into();
        let record = with_transaction(db, |cursor| {
            cursor.execute(&sql, std::slice::from_ref(&id))?;
            cursor.fetch_one()
        })
        .map_err(Error::into_execution)?;
        record.as_ref().map(Self::from_record).transpose()
    }

    /// Deletes by primary key; `Ok(false)` when no row matched
    fn delete<C: Connector>(db: &C, id: impl Into<Value>) -> Result<bool> {
        Self::delete_from(db, Self::table_name(), id)
    }

    fn delete_from<C: Connector>(db: &C, table: &str, id: impl Into<Value>) -> Result<bool> {
        query::validate_name(table)?;
        let pk = primary_key::<Self>()?;
        let sql = format!("DELETE FROM {} WHERE {} = ?", table, pk);
        let id = id.into();
        let deleted = with_transaction(db, |cursor| {
            cursor.execute(&sql, std::slice::from_ref(&id))?;
            Ok(cursor.rowcount())
        })
        .map_err(Error::into_execution)?;
        info!(table, %id, deleted, "deleted rows");
        Ok(deleted > 0)
    }

    fn get_all<C: Connector>(db: &C) -> Result<Vec<Self>> {
        Self::get_all_from(db, Self::table_name())
    }

    fn get_all_from<C: Connector>(db: &C, table: &str) -> Result<Vec<Self>> {
        query::validate_name(table)?;
        fetch_entities(db, &format!("SELECT * FROM {}", table), &[])
    }

    /// Rows matching every `column = value` filter
    fn query<C, I, K, V>(db: &C, filters: I) -> Result<Vec<Self>>
    where
        C: Connector,
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        let mut fragment =
            query::Fragment::new(format!("SELECT * FROM {}", Self::table_name()), Vec::new());
        fragment.push(query::where_clause(filters)?);
        fetch_entities(db, &fragment.sql, &fragment.values)
    }

    /// Runs a composed SELECT against this entity's table. Rows stay raw
    /// since projections and aggregates rarely match the entity.
    fn select<C: Connector>(db: &C, select: &Select) -> Result<Vec<Record>> {
        let fragment = select.build(Self::table_name())?;
        fetch_records(db, &fragment.sql, &fragment.values)
    }

    /// Inner join with `Other` on two columns, e.g.
    /// `["user.role_id", "role.role_id"]`. Rows hold both tables' columns.
    fn join<Other, C, I, K, V>(db: &C, on: &[&str], filters: I) -> Result<Vec<Record>>
    where
        Other: Entity,
        C: Connector,
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        let fragment = query::join(Self::table_name(), Other::table_name(), on, filters)?;
        fetch_records(db, &fragment.sql, &fragment.values)
    }

    /// Issues `CREATE TABLE IF NOT EXISTS`; columns with an unknown type
    /// keyword are reported and still sent
    fn create_table<C: Connector>(db: &C) -> Result<()> {
        let schema = Self::schema()?;
        let table = Self::table_name();
        for column in schema.invalid_columns() {
            warn!(table, column, "column declares an unsupported type");
        }
        let ddl = schema.generate_create_table(table);
        with_transaction(db, |cursor| cursor.execute(&ddl, &[])).map_err(Error::into_execution)?;
        info!(table, "created table");
        Ok(())
    }
}

fn primary_key<E: Entity>() -> Result<&'static str> {
    E::schema()?
        .primary_key()
        .ok_or_else(|| Error::construction(format!("{} declares no primary key", E::table_name())))
}

fn fetch_records<C: Connector>(db: &C, sql: &str, values: &[Value]) -> Result<Vec<Record>> {
    with_transaction(db, |cursor| {
        cursor.execute(sql, values)?;
        cursor.fetch_all()
    })
    .map_err(Error::into_execution)
}

fn fetch_entities<E: Entity, C: Connector>(db: &C, sql: &str, values: &[Value]) -> Result<Vec<E>> {
    fetch_records(db, sql, values)?
        .iter()
        .map(E::from_record)
        .collect()
}
