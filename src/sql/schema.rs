use serde::{Deserialize, Serialize};

use crate::{error::{Error, Result}, sql::types::{DataType, Value}};

/// Table schema definition as stored in the engine's catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub name: String,
    pub columns: Vec<Column>,
}

impl Table {
    /// Validates table schema
    pub fn validate(&self) -> Result<()> {
        if self.columns.is_empty() {
            return Err(Error::Internal(format!(
                "table {} has no columns",
                self.name
            )));
        }

        if self.columns.iter().filter(|c| c.primary_key).count() > 1 {
            return Err(Error::Internal(format!(
                "Multiple primary keys for table {}",
                self.name
            )));
        }

        for (i, col) in self.columns.iter().enumerate() {
            if self.columns[..i].iter().any(|c| c.name == col.name) {
                return Err(Error::Internal(format!(
                    "duplicate column {} in table {}",
                    col.name, self.name
                )));
            }
        }

        Ok(())
    }

    /// Position of the primary key column, if the table declares one
    pub fn primary_key_index(&self) -> Option<usize> {
        self.columns.iter().position(|c| c.primary_key)
    }

    /// Position of an `INTEGER PRIMARY KEY` column, which doubles as the row id
    pub fn rowid_index(&self) -> Option<usize> {
        self.primary_key_index()
            .filter(|&i| self.columns[i].datatype == DataType::Integer)
    }

    /// Returns the column index for a given column name
    pub fn get_col_index(&self, col_name: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| c.name == col_name)
            .ok_or(Error::Internal(format!("column {} not found in table {}", col_name, self.name)))
    }

    /// Result-set labels, qualified with the table name
    pub fn qualified_columns(&self) -> Vec<String> {
        self.columns
            .iter()
            .map(|c| format!("{}.{}", self.name, c.name))
            .collect()
    }
}

/// Column schema definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub datatype: DataType,
    pub nullable: bool,
    pub default: Option<Value>,
    /// Whether this column is the primary key
    pub primary_key: bool,
    pub unique: bool,
    /// Foreign key target as declared; recorded, not enforced
    pub references: Option<String>,
}

impl Column {
    /// Checks a value against the column, widening integers into float columns
    pub fn coerce(&self, value: Value) -> Result<Value> {
        match (value.datatype(), self.datatype) {
            (None, _) if self.nullable || self.primary_key => Ok(value),
            (None, _) => Err(Error::Internal(format!("column {} cannot be null", self.name))),
            (Some(DataType::Integer), DataType::Float) => match value {
                Value::Integer(i) => Ok(Value::Float(i as f64)),
                v => Ok(v),
            },
            (Some(DataType::Integer), DataType::Boolean) => match value {
                Value::Integer(i) => Ok(Value::Boolean(i != 0)),
                v => Ok(v),
            },
            (Some(dt), expected) if dt == expected => Ok(value),
            (Some(dt), expected) => Err(Error::Internal(format!(
                "column {} type mismatch: expected {}, got {}",
                self.name, expected, dt
            ))),
        }
    }
}
