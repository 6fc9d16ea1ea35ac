use std::fmt::Display;

use serde::Serialize;

const INTEGER_KINDS: [&str; 4] = ["INTEGER", "SMALLINT", "TINYINT", "BIGINT"];
const TEXT_KINDS: [&str; 3] = ["TEXT", "VARCHAR", "CHAR"];
const FLOAT_KINDS: [&str; 4] = ["FLOAT", "DOUBLE", "REAL", "DECIMAL"];
const DATE_KINDS: [&str; 3] = ["DATE", "DATETIME", "TIMESTAMP"];

/// Column type as declared on an entity
///
/// Each family carries the SQL keyword it was configured with. The keyword
/// is kept as given; [`LogicalType::validate`] reports whether it belongs
/// to the family.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum LogicalType {
    Integer(String),
    Text { kind: String, length: Option<u32> },
    Float(String),
    Boolean,
    Date(String),
    Blob,
}

impl LogicalType {
    pub fn integer() -> Self {
        Self::Integer("INTEGER".into())
    }

    pub fn integer_kind(kind: &str) -> Self {
        Self::Integer(kind.into())
    }

    pub fn text() -> Self {
        Self::Text {
            kind: "TEXT".into(),
            length: None,
        }
    }

    pub fn varchar(length: u32) -> Self {
        Self::Text {
            kind: "VARCHAR".into(),
            length: Some(length),
        }
    }

    pub fn text_kind(kind: &str, length: Option<u32>) -> Self {
        Self::Text {
            kind: kind.into(),
            length,
        }
    }

    pub fn float() -> Self {
        Self::Float("FLOAT".into())
    }

    pub fn float_kind(kind: &str) -> Self {
        Self::Float(kind.into())
    }

    pub fn boolean() -> Self {
        Self::Boolean
    }

    pub fn date() -> Self {
        Self::Date("DATE".into())
    }

    pub fn datetime() -> Self {
        Self::Date("DATETIME".into())
    }

    pub fn timestamp() -> Self {
        Self::Date("TIMESTAMP".into())
    }

    pub fn date_kind(kind: &str) -> Self {
        Self::Date(kind.into())
    }

    pub fn blob() -> Self {
        Self::Blob
    }

    /// SQL spelling of the type, e.g. `VARCHAR(100)`
    pub fn sql_type(&self) -> String {
        match self {
            Self::Integer(kind) | Self::Float(kind) | Self::Date(kind) => kind.to_uppercase(),
            Self::Text {
                kind,
                length: Some(length),
            } => format!("{}({})", kind.to_uppercase(), length),
            Self::Text { kind, length: None } => kind.to_uppercase(),
            Self::Boolean => "BOOLEAN".into(),
            Self::Blob => "BLOB".into(),
        }
    }

    /// Whether the configured keyword is one the family allows
    pub fn validate(&self) -> bool {
        fn allowed(kinds: &[&str], kind: &str) -> bool {
            kinds.contains(&kind.to_uppercase().as_str())
        }
        match self {
            Self::Integer(kind) => allowed(&INTEGER_KINDS, kind),
            Self::Text { kind, length } => {
                allowed(&TEXT_KINDS, kind) && length.is_none_or(|l| l > 0)
            }
            Self::Float(kind) => allowed(&FLOAT_KINDS, kind),
            Self::Date(kind) => allowed(&DATE_KINDS, kind),
            Self::Boolean | Self::Blob => true,
        }
    }
}

impl Display for LogicalType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.sql_type())
    }
}

#[cfg(test)]
mod tests {
    use super::LogicalType;

    #[test]
    fn test_sql_type() {
        assert_eq!(LogicalType::integer().sql_type(), "INTEGER");
        assert_eq!(LogicalType::integer_kind("bigint").sql_type(), "BIGINT");
        assert_eq!(LogicalType::varchar(100).sql_type(), "VARCHAR(100)");
        assert_eq!(LogicalType::text_kind("char", Some(2)).sql_type(), "CHAR(2)");
        assert_eq!(LogicalType::text().sql_type(), "TEXT");
        assert_eq!(LogicalType::datetime().to_string(), "DATETIME");
        assert_eq!(LogicalType::blob().sql_type(), "BLOB");
    }

    #[test]
    fn test_validate() {
        assert!(LogicalType::integer_kind("tinyint").validate());
        assert!(!LogicalType::integer_kind("NUMBER").validate());
        assert!(LogicalType::float_kind("decimal").validate());
        assert!(!LogicalType::float_kind("MONEY").validate());
        assert!(LogicalType::timestamp().validate());
        assert!(!LogicalType::date_kind("TIME").validate());
        assert!(!LogicalType::varchar(0).validate());
        assert!(!LogicalType::text_kind("CLOB", None).validate());
        assert!(LogicalType::boolean().validate());
        assert!(LogicalType::blob().validate());
    }
}
