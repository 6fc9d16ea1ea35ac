#![allow(dead_code)]

use tinyorm::{
    ColumnDescriptor, Entity, FromValue, LogicalType, ReferentialAction, Result, SchemaBuilder, Value,
};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct User {
    pub user_id: Option<i64>,
    pub email: String,
    pub password: String,
    pub tracking_id: Option<i64>,
    pub role_id: Option<i64>,
    /// Not a column; never persisted
    pub session_note: String,
}

impl User {
    pub fn new(email: &str, role_id: i64) -> Self {
        Self {
            email: email.into(),
            password: "secret".into(),
            role_id: Some(role_id),
            ..Default::default()
        }
    }
}

impl Entity for User {
    fn table_name() -> &'static str {
        "user"
    }

    fn define(schema: SchemaBuilder) -> SchemaBuilder {
        schema
            .column("user_id", ColumnDescriptor::new(LogicalType::integer()).primary_key())
            .column("email", ColumnDescriptor::new(LogicalType::varchar(100)).not_null().unique())
            .column("password", ColumnDescriptor::new(LogicalType::varchar(100)).not_null())
            .column("tracking_id", ColumnDescriptor::new(LogicalType::integer()).unique())
            .column(
                "role_id",
                ColumnDescriptor::new(LogicalType::integer())
                    .references("role(role_id)")
                    .on_delete(ReferentialAction::SetNull),
            )
    }

    fn field(&self, column: &str) -> Value {
        match column {
            "user_id" => self.user_id.into(),
            "email" => self.email.as_str().into(),
            "password" => self.password.as_str().into(),
            "tracking_id" => self.tracking_id.into(),
            "role_id" => self.role_id.into(),
            _ => Value::Null,
        }
    }

    fn set_field(&mut self, column: &str, value: Value) -> Result<()> {
        match column {
            "user_id" => self.user_id = FromValue::from_value(value)?,
            "email" => self.email = FromValue::from_value(value)?,
            "password" => self.password = FromValue::from_value(value)?,
            "tracking_id" => self.tracking_id = FromValue::from_value(value)?,
            "role_id" => self.role_id = FromValue::from_value(value)?,
            _ => {}
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Role {
    pub role_id: Option<i64>,
    pub title: Option<String>,
    pub permissions: Option<String>,
}

impl Role {
    pub fn new(title: &str) -> Self {
        Self {
            title: Some(title.into()),
            ..Default::default()
        }
    }
}

impl Entity for Role {
    fn table_name() -> &'static str {
        "role"
    }

    fn define(schema: SchemaBuilder) -> SchemaBuilder {
        schema
            .column("role_id", ColumnDescriptor::new(LogicalType::integer()).primary_key())
            .column("title", ColumnDescriptor::new(LogicalType::varchar(50)))
            .column("permissions", ColumnDescriptor::new(LogicalType::varchar(100)).default("read"))
    }

    fn field(&self, column: &str) -> Value {
        match column {
            "role_id" => self.role_id.into(),
            "title" => self.title.clone().into(),
            "permissions" => self.permissions.clone().into(),
            _ => Value::Null,
        }
    }

    fn set_field(&mut self, column: &str, value: Value) -> Result<()> {
        match column {
            "role_id" => self.role_id = FromValue::from_value(value)?,
            "title" => self.title = FromValue::from_value(value)?,
            "permissions" => self.permissions = FromValue::from_value(value)?,
            _ => {}
        }
        Ok(())
    }
}

/// An entity without a primary key column
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuditLog {
    pub message: String,
}

impl Entity for AuditLog {
    fn table_name() -> &'static str {
        "audit_log"
    }

    fn define(schema: SchemaBuilder) -> SchemaBuilder {
        schema.column("message", ColumnDescriptor::new(LogicalType::text()))
    }

    fn field(&self, column: &str) -> Value {
        match column {
            "message" => self.message.as_str().into(),
            _ => Value::Null,
        }
    }

    fn set_field(&mut self, column: &str, value: Value) -> Result<()> {
        if column == "message" {
            self.message = FromValue::from_value(value)?;
        }
        Ok(())
    }
}

/// One column per type family
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    pub doc_id: Option<i64>,
    pub score: f64,
    pub signed: bool,
    pub created: String,
    pub body: Vec<u8>,
    pub copies: i32,
    pub views: i64,
}

impl Entity for Document {
    fn table_name() -> &'static str {
        "document"
    }

    fn define(schema: SchemaBuilder) -> SchemaBuilder {
        schema
            .column("doc_id", ColumnDescriptor::new(LogicalType::integer()).primary_key())
            .column("score", ColumnDescriptor::new(LogicalType::float_kind("DOUBLE")))
            .column("signed", ColumnDescriptor::new(LogicalType::boolean()).not_null())
            .column("created", ColumnDescriptor::new(LogicalType::datetime()))
            .column("body", ColumnDescriptor::new(LogicalType::blob()))
            .column("copies", ColumnDescriptor::new(LogicalType::integer_kind("SMALLINT")))
            .column("views", ColumnDescriptor::new(LogicalType::integer_kind("BIGINT")))
    }

    fn field(&self, column: &str) -> Value {
        match column {
            "doc_id" => self.doc_id.into(),
            "score" => self.score.into(),
            "signed" => self.signed.into(),
            "created" => self.created.as_str().into(),
            "body" => self.body.clone().into(),
            "copies" => self.copies.into(),
            "views" => self.views.into(),
            _ => Value::Null,
        }
    }

    fn set_field(&mut self, column: &str, value: Value) -> Result<()> {
        match column {
            "doc_id" => self.doc_id = FromValue::from_value(value)?,
            "score" => self.score = FromValue::from_value(value)?,
            "signed" => self.signed = FromValue::from_value(value)?,
            "created" => self.created = FromValue::from_value(value)?,
            "body" => self.body = FromValue::from_value(value)?,
            "copies" => self.copies = FromValue::from_value(value)?,
            "views" => self.views = FromValue::from_value(value)?,
            _ => {}
        }
        Ok(())
    }
}
