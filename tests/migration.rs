mod common;

use std::{
    fs,
    sync::{Arc, Mutex},
};

use common::User;
use tinyorm::{
    with_transaction, ColumnDescriptor, Connection, Connector, Constraint, Cursor, Error, LogicalType,
    MemoryConnector, Migrator, Record, ReferentialAction, Result, Value,
};

/// Keeps every statement it is asked to run; statements containing
/// `fail_on` are rejected
#[derive(Clone, Default)]
struct Recorder {
    statements: Arc<Mutex<Vec<String>>>,
    rollbacks: Arc<Mutex<usize>>,
    fail_on: Option<&'static str>,
}

impl Recorder {
    fn failing_on(pattern: &'static str) -> Self {
        Self {
            fail_on: Some(pattern),
            ..Default::default()
        }
    }

    fn statements(&self) -> Vec<String> {
        self.statements.lock().map(|s| s.clone()).unwrap_or_default()
    }

    fn rollbacks(&self) -> usize {
        self.rollbacks.lock().map(|r| *r).unwrap_or_default()
    }
}

impl Connector for Recorder {
    type Connection = Recorder;

    fn connect(&self) -> Result<Recorder> {
        Ok(self.clone())
    }
}

impl Connection for Recorder {
    type Cursor = Recorder;

    fn cursor(&mut self) -> Result<Recorder> {
        Ok(self.clone())
    }

    fn commit(&mut self) -> Result<()> {
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        *self.rollbacks.lock()? += 1;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

impl Cursor for Recorder {
    fn execute(&mut self, sql: &str, _params: &[Value]) -> Result<()> {
        if self.fail_on.is_some_and(|pattern| sql.contains(pattern)) {
            return Err(Error::Internal(format!("rejected: {}", sql)));
        }
        self.statements.lock()?.push(sql.to_string());
        Ok(())
    }

    fn fetch_one(&mut self) -> Result<Option<Record>> {
        Ok(None)
    }

    fn fetch_all(&mut self) -> Result<Vec<Record>> {
        Ok(Vec::new())
    }

    fn rowcount(&self) -> usize {
        0
    }

    fn last_insert_id(&self) -> Option<i64> {
        None
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

#[test]
fn test_alter_statements() -> Result<()> {
    let db = Recorder::default();
    let migrator = Migrator::new(&db);

    migrator.add_column("user", "nickname", &ColumnDescriptor::new(LogicalType::varchar(30)).not_null())?;
    migrator.remove_column("user", "nickname")?;
    migrator.rename_column("user", "email", "mail")?;
    migrator.change_column_type("user", "tracking_id", &LogicalType::integer_kind("BIGINT"))?;
    migrator.add_constraint(
        "user",
        "fk_user_role",
        &Constraint::ForeignKey {
            columns: vec!["role_id".into()],
            references: "role(role_id)".into(),
            on_delete: Some(ReferentialAction::Cascade),
            on_update: None,
        },
    )?;
    migrator.remove_constraint("user", "fk_user_role")?;
    migrator.rename_table("user", "account")?;

    assert_eq!(
        db.statements(),
        vec![
            "ALTER TABLE user ADD COLUMN nickname VARCHAR(30) NOT NULL",
            "ALTER TABLE user DROP COLUMN nickname",
            "ALTER TABLE user RENAME COLUMN email TO mail",
            "ALTER TABLE user ALTER COLUMN tracking_id TYPE BIGINT",
            "ALTER TABLE user ADD CONSTRAINT fk_user_role FOREIGN KEY (role_id) REFERENCES role(role_id) ON DELETE CASCADE",
            "ALTER TABLE user DROP CONSTRAINT fk_user_role",
            "ALTER TABLE user RENAME TO account",
        ]
    );
    assert_eq!(db.rollbacks(), 0);
    Ok(())
}

#[test]
fn test_create_table_through_migrator() -> Result<()> {
    let db = Recorder::default();
    Migrator::new(&db).create_table::<User>()?;
    let statements = db.statements();
    assert_eq!(statements.len(), 1);
    assert!(statements[0].starts_with("CREATE TABLE IF NOT EXISTS user (user_id INTEGER PRIMARY KEY, "));
    assert!(statements[0].contains("role_id INTEGER REFERENCES role(role_id) ON DELETE SET NULL"));
    Ok(())
}

#[test]
fn test_rejected_identifiers() {
    let db = Recorder::default();
    let migrator = Migrator::new(&db);
    assert!(matches!(
        migrator.remove_column("user; DROP TABLE user", "a"),
        Err(Error::Construction(_))
    ));
    assert!(matches!(migrator.rename_table("user", "bad name"), Err(Error::Construction(_))));
    assert!(matches!(
        migrator.add_constraint("user", "pk", &Constraint::PrimaryKey(Vec::new())),
        Err(Error::Construction(_))
    ));
    assert!(db.statements().is_empty());
}

#[test]
fn test_failed_alter_rolls_back() {
    let db = Recorder::failing_on("DROP");
    let result = Migrator::new(&db).remove_column("user", "email");
    assert!(matches!(result, Err(Error::Execution(_))));
    assert_eq!(db.rollbacks(), 1);
}

fn count_rows(db: &MemoryConnector, table: &str) -> Result<usize> {
    with_transaction(db, |cursor| {
        cursor.execute(&format!("SELECT * FROM {}", table), &[])?;
        Ok(cursor.fetch_all()?.len())
    })
}

#[test]
fn test_apply_and_rollback_migration() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("0001_tags.sql");
    fs::write(
        &path,
        "-- migrate:up\n\
         CREATE TABLE tag (tag_id INTEGER PRIMARY KEY, label VARCHAR(20) NOT NULL);\n\
         INSERT INTO tag (label) VALUES ('rust');\n\
         INSERT INTO tag (label) VALUES ('sql; orm');\n\
         -- migrate:down\n\
         DELETE FROM tag;\n",
    )?;

    let db = MemoryConnector::new();
    let migrator = Migrator::new(&db);
    migrator.apply_migration(&path)?;
    assert_eq!(count_rows(&db, "tag")?, 2);

    migrator.rollback_migration(&path)?;
    assert_eq!(count_rows(&db, "tag")?, 0);
    Ok(())
}

#[test]
fn test_failed_migration_is_atomic() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("0002_broken.sql");
    fs::write(
        &path,
        "CREATE TABLE tag (tag_id INTEGER PRIMARY KEY, label TEXT);\n\
         INSERT INTO tag (missing) VALUES (1);\n",
    )?;

    let db = MemoryConnector::new();
    let migrator = Migrator::new(&db);
    assert!(matches!(migrator.apply_migration(&path), Err(Error::Execution(_))));
    assert!(count_rows(&db, "tag").is_err());

    // no down section to run
    assert!(matches!(migrator.rollback_migration(&path), Err(Error::Construction(_))));
    Ok(())
}

#[test]
fn test_missing_migration_file() {
    let db = MemoryConnector::new();
    let dir = tempfile::tempdir().expect("tempdir");
    let result = Migrator::new(&db).apply_migration(dir.path().join("absent.sql"));
    assert!(result.is_err());
}
