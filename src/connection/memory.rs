use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
};

use tracing::info;

use crate::{
    config::DatabaseConfig,
    error::{Error, Result},
    sql::{
        engine::{Engine, KVEngine, Session},
        executor::ResultSet,
        types::{Record, Value},
    },
    storage::memory::MemoryEngine,
};

use super::{Connection, Connector, Cursor};

type SharedSession = Arc<Mutex<Session<KVEngine<MemoryEngine>>>>;

/// Connector for the bundled SQL engine
///
/// Clones share the same database.
#[derive(Clone)]
pub struct MemoryConnector {
    engine: KVEngine<MemoryEngine>,
}

impl MemoryConnector {
    /// A fresh, empty in-memory database
    pub fn new() -> Self {
        Self {
            engine: KVEngine::new(MemoryEngine::new()),
        }
    }

    /// Opens the database described by `config`, loading its snapshot
    /// file when a path is configured
    pub fn open(config: &DatabaseConfig) -> Result<Self> {
        let storage = match &config.path {
            Some(path) => MemoryEngine::open(path)?,
            None => MemoryEngine::new(),
        };
        info!(database = %config.name, path = ?config.path, "opened database");
        Ok(Self {
            engine: KVEngine::new(storage),
        })
    }
}

impl Default for MemoryConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl Connector for MemoryConnector {
    type Connection = MemoryConnection;

    fn connect(&self) -> Result<MemoryConnection> {
        Ok(MemoryConnection {
            session: Arc::new(Mutex::new(self.engine.session()?)),
            closed: false,
        })
    }
}

/// One session against the bundled engine; statements run in a single
/// transaction until commit or rollback
pub struct MemoryConnection {
    session: SharedSession,
    closed: bool,
}

impl MemoryConnection {
    fn check_open(&self) -> Result<()> {
        if self.closed {
            return Err(Error::Internal("connection is closed".into()));
        }
        Ok(())
    }
}

impl Connection for MemoryConnection {
    type Cursor = MemoryCursor;

    fn cursor(&mut self) -> Result<MemoryCursor> {
        self.check_open()?;
        Ok(MemoryCursor {
            session: self.session.clone(),
            pending: VecDeque::new(),
            rowcount: 0,
            last_insert_id: None,
            closed: false,
        })
    }

    fn commit(&mut self) -> Result<()> {
        self.check_open()?;
        self.session.lock()?.commit()
    }

    fn rollback(&mut self) -> Result<()> {
        self.check_open()?;
        self.session.lock()?.rollback()
    }

    /// Uncommitted work is discarded
    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.session.lock()?.rollback()
    }
}

/// Cursor over a [`MemoryConnection`]
pub struct MemoryCursor {
    session: SharedSession,
    pending: VecDeque<Record>,
    rowcount: usize,
    last_insert_id: Option<i64>,
    closed: bool,
}

impl Cursor for MemoryCursor {
    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<()> {
        if self.closed {
            return Err(Error::Internal("cursor is closed".into()));
        }
        let result = self.session.lock()?.execute(sql, params)?;

        self.pending.clear();
        self.rowcount = result.row_count();
        match result {
            ResultSet::Scan { columns, rows } => {
                self.pending = rows
                    .into_iter()
                    .map(|row| Record::new(columns.clone(), row))
                    .collect();
            }
            ResultSet::Insert { last_insert_id, .. } => self.last_insert_id = last_insert_id,
            ResultSet::CreateTable { .. }
            | ResultSet::Update { .. }
            | ResultSet::Delete { .. } => {}
        }
        Ok(())
    }

    fn fetch_one(&mut self) -> Result<Option<Record>> {
        Ok(self.pending.pop_front())
    }

    fn fetch_all(&mut self) -> Result<Vec<Record>> {
        Ok(self.pending.drain(..).collect())
    }

    fn rowcount(&self) -> usize {
        self.rowcount
    }

    fn last_insert_id(&self) -> Option<i64> {
        self.last_insert_id
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        self.pending.clear();
        Ok(())
    }
}
