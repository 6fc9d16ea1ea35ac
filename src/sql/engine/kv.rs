use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    sql::{
        schema::Table,
        types::{Row, Value},
    },
    storage::{self, engine::Engine as StorageEngine},
};

use super::{Engine, Transaction};

/// Key-value store backed SQL engine
pub struct KVEngine<E: StorageEngine> {
    pub kv: storage::transaction::Store<E>,
}

impl<E: StorageEngine> Clone for KVEngine<E> {
    fn clone(&self) -> Self {
        Self {
            kv: self.kv.clone(),
        }
    }
}

impl<E: StorageEngine> KVEngine<E> {
    pub fn new(engine: E) -> Self {
        Self {
            kv: storage::transaction::Store::new(engine),
        }
    }
}

impl<E: StorageEngine> Engine for KVEngine<E> {
    type Transaction = KVTransaction<E>;

    fn begin(&self) -> Result<Self::Transaction> {
        Ok(Self::Transaction::new(self.kv.begin()))
    }
}

/// Key-value transaction (wrapper around a buffered storage transaction)
pub struct KVTransaction<E: StorageEngine> {
    txn: storage::transaction::StoreTransaction<E>,
}

impl<E: StorageEngine> KVTransaction<E> {
    pub fn new(txn: storage::transaction::StoreTransaction<E>) -> Self {
        Self { txn }
    }

    /// Last row id handed out for a table
    fn sequence(&self, table_name: &str) -> Result<i64> {
        let key = bincode::serialize(&Key::Sequence(table_name.to_string()))?;
        Ok(self
            .txn
            .get(key)?
            .map(|v| bincode::deserialize(&v))
            .transpose()?
            .unwrap_or(0))
    }

    /// Id for a row inserted without one
    fn next_id(&self, table_name: &str) -> Result<i64> {
        self.sequence(table_name)?.checked_add(1).ok_or_else(|| {
            Error::Internal(format!("row id space exhausted for table {}", table_name))
        })
    }

    fn bump_sequence(&mut self, table_name: &str, id: i64) -> Result<()> {
        if id > self.sequence(table_name)? {
            let key = bincode::serialize(&Key::Sequence(table_name.to_string()))?;
            self.txn.set(key, bincode::serialize(&id)?)?;
        }
        Ok(())
    }

    /// Coerces each value against its column's declared type
    fn check_row(table: &Table, row: Row) -> Result<Row> {
        if row.len() != table.columns.len() {
            return Err(Error::Internal(format!(
                "table {} expects {} values, got {}",
                table.name,
                table.columns.len(),
                row.len()
            )));
        }
        table
            .columns
            .iter()
            .zip(row)
            .map(|(col, value)| col.coerce(value))
            .collect()
    }

    /// Enforces PRIMARY KEY and UNIQUE constraints; NULLs never conflict
    fn check_unique(&self, table: &Table, row: &Row, skip: Option<i64>) -> Result<()> {
        let constrained: Vec<usize> = table
            .columns
            .iter()
            .enumerate()
            .filter(|(i, c)| (c.unique || c.primary_key) && !row[*i].is_null())
            .map(|(i, _)| i)
            .collect();
        if constrained.is_empty() {
            return Ok(());
        }

        for (id, existing) in self.scan_table(&table.name)? {
            if Some(id) == skip {
                continue;
            }
            for &i in &constrained {
                if existing[i].sql_eq(&row[i]) {
                    return Err(Error::Internal(format!(
                        "UNIQUE constraint failed: {}.{}",
                        table.name, table.columns[i].name
                    )));
                }
            }
        }
        Ok(())
    }

    fn write_row(&mut self, table_name: &str, id: i64, row: &Row) -> Result<()> {
        let key = Key::Row(table_name.to_string(), id);
        self.txn.set(bincode::serialize(&key)?, bincode::serialize(row)?)?;
        self.bump_sequence(table_name, id)
    }
}

impl<E: StorageEngine> Transaction for KVTransaction<E> {
    fn commit(&mut self) -> Result<()> {
        self.txn.commit()
    }

    fn rollback(&mut self) -> Result<()> {
        self.txn.rollback()
    }

    fn create_row(&mut self, table_name: &str, row: Row) -> Result<i64> {
        let table = self.must_get_table(table_name)?;
        let mut row = Self::check_row(&table, row)?;

        // An INTEGER PRIMARY KEY is the row id; NULL asks for the next one
        let id = match table.rowid_index() {
            Some(i) => match row[i] {
                Value::Integer(id) => id,
                _ => {
                    let id = self.next_id(table_name)?;
                    row[i] = Value::Integer(id);
                    id
                }
            },
            None => self.next_id(table_name)?,
        };
        if let Some(i) = table.primary_key_index() {
            if row[i].is_null() {
                return Err(Error::Internal(format!(
                    "primary key {}.{} cannot be null",
                    table.name, table.columns[i].name
                )));
            }
        }

        self.check_unique(&table, &row, None)?;
        self.write_row(table_name, id, &row)?;
        Ok(id)
    }

    fn update_row(&mut self, table: &Table, id: i64, row: Row) -> Result<()> {
        let row = Self::check_row(table, row)?;
        let new_id = match table.rowid_index() {
            Some(i) => match row[i] {
                Value::Integer(new_id) => new_id,
                _ => {
                    return Err(Error::Internal(format!(
                        "primary key {}.{} cannot be null",
                        table.name, table.columns[i].name
                    )))
                }
            },
            None => id,
        };

        self.check_unique(table, &row, Some(id))?;
        if new_id != id {
            self.delete_row(table, id)?;
        }
        self.write_row(&table.name, new_id, &row)
    }

    fn delete_row(&mut self, table: &Table, id: i64) -> Result<()> {
        let key = Key::Row(table.name.clone(), id);
        self.txn.delete(bincode::serialize(&key)?)
    }

    fn scan_table(&self, table_name: &str) -> Result<Vec<(i64, Row)>> {
        // Use prefix scan to find all rows in the table
        let prefix = KeyPrefix::Row(table_name.to_string());
        let results = self.txn.scan_prefix(bincode::serialize(&prefix)?)?;

        let mut rows = Vec::new();
        for result in results {
            let id = match bincode::deserialize(&result.key)? {
                Key::Row(_, id) => id,
                key => return Err(Error::Internal(format!("unexpected key {:?}", key))),
            };
            let row: Row = bincode::deserialize(&result.value)?;
            rows.push((id, row));
        }
        // Keys hold the id little-endian, so byte order is not id order
        rows.sort_by_key(|(id, _)| *id);
        Ok(rows)
    }

    fn create_table(&mut self, table: Table) -> Result<()> {
        // Check if table already exists
        if self.get_table(&table.name)?.is_some() {
            return Err(Error::Internal(format!(
                "table {} already exists",
                table.name
            )));
        }
        table.validate()?;

        // Store table schema: key = table name, value = serialized table schema
        let key = Key::Table(table.name.clone());
        let value = bincode::serialize(&table)?;
        self.txn.set(bincode::serialize(&key)?, value)?;

        Ok(())
    }

    fn get_table(&self, table_name: &str) -> Result<Option<Table>> {
        let key = Key::Table(table_name.to_string());
        Ok(self
            .txn
            .get(bincode::serialize(&key)?)?
            .map(|v| bincode::deserialize(&v))
            .transpose()?)
    }
}

/// Key types for KV storage operations
#[derive(Debug, Serialize, Deserialize)]
enum Key {
    Table(String),
    Row(String, i64),
    Sequence(String),
}

/// Key prefix types for prefix scanning
///
/// In bincode, enums are serialized as [variant_index][variant_data...].
/// Variant indices start from 0 in definition order and must line up with `Key`.
#[derive(Debug, Serialize, Deserialize)]
enum KeyPrefix {
    Table,
    Row(String),
}

#[cfg(test)]
mod tests {
    use crate::{
        error::Result,
        sql::{engine::Engine, executor::ResultSet, types::Value},
        storage::memory::MemoryEngine,
    };

    use super::KVEngine;

    #[test]
    fn test_create_table_and_insert() -> Result<()> {
        let kvengine = KVEngine::new(MemoryEngine::new());
        let mut s = kvengine.session()?;

        s.execute("create table t1 (a int primary key, b text default 'vv', c integer default 100);", &[])?;
        s.execute("insert into t1 values(1, 'a', 1);", &[])?;
        s.execute("insert into t1 values(2, 'b');", &[])?;
        s.execute("insert into t1(c, a) values(200, 3);", &[])?;

        match s.execute("select * from t1;", &[])? {
            ResultSet::Scan { columns, rows } => {
                assert_eq!(columns, vec!["a", "b", "c"]);
                assert_eq!(rows.len(), 3);
                assert_eq!(rows[1], vec![Value::Integer(2), Value::from("b"), Value::Integer(100)]);
                assert_eq!(rows[2], vec![Value::Integer(3), Value::from("vv"), Value::Integer(200)]);
            }
            rs => panic!("unexpected result {:?}", rs),
        }
        Ok(())
    }

    #[test]
    fn test_autoincrement_and_unique() -> Result<()> {
        let kvengine = KVEngine::new(MemoryEngine::new());
        let mut s = kvengine.session()?;
        s.execute("create table u (id integer primary key, email varchar(50) unique)", &[])?;

        let first = s.execute("insert into u (email) values (?)", &[Value::from("a@x")])?;
        assert_eq!(first, ResultSet::Insert { count: 1, last_insert_id: Some(1) });
        let second = s.execute("insert into u (id, email) values (?, ?)", &[Value::Null, Value::from("b@x")])?;
        assert_eq!(second, ResultSet::Insert { count: 1, last_insert_id: Some(2) });

        assert!(s.execute("insert into u (email) values ('a@x')", &[]).is_err());
        assert!(s.execute("insert into u (id, email) values (2, 'c@x')", &[]).is_err());
        Ok(())
    }

    #[test]
    fn test_autoincrement_exhausted() -> Result<()> {
        let kvengine = KVEngine::new(MemoryEngine::new());
        let mut s = kvengine.session()?;
        s.execute("create table r (id integer primary key, v text)", &[])?;
        s.execute("insert into r (id, v) values (?, 'last')", &[Value::Integer(i64::MAX)])?;

        assert!(s.execute("insert into r (v) values ('next')", &[]).is_err());
        match s.execute("select * from r", &[])? {
            ResultSet::Scan { rows, .. } => assert_eq!(rows.len(), 1),
            rs => panic!("unexpected result {:?}", rs),
        }
        Ok(())
    }

    #[test]
    fn test_rollback_discards_session_writes() -> Result<()> {
        let kvengine = KVEngine::new(MemoryEngine::new());
        let mut setup = kvengine.session()?;
        setup.execute("create table t (id integer primary key, v text)", &[])?;
        setup.commit()?;

        let mut s = kvengine.session()?;
        s.execute("insert into t (v) values ('x')", &[])?;
        s.rollback()?;

        let mut check = kvengine.session()?;
        match check.execute("select * from t", &[])? {
            ResultSet::Scan { rows, .. } => assert!(rows.is_empty()),
            rs => panic!("unexpected result {:?}", rs),
        }
        Ok(())
    }
}
