//! In-memory fake backend shared by the integration tests.
//!
//! The store counts connection opens and closes, replays scripted query
//! results, and gives transactions staged-then-committed semantics so the
//! tests can observe exactly what would have reached a real database.

#![allow(dead_code)]

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use sqlbind::connection::{
    Connection, ConnectionConfig, ConnectionFactory, DatabaseType, RowStream, Transaction,
};
use sqlbind::error::{Error, Result};
use sqlbind::types::{Row, Value};

#[derive(Default)]
struct StoreState {
    results: Vec<Row>,
    statements: Vec<(String, Vec<Value>)>,
    committed: Vec<(String, Vec<Value>)>,
    fail_execute_with: Option<String>,
    opens: usize,
    closes: usize,
}

/// Shared state behind every connection the fake factory hands out
#[derive(Clone, Default)]
pub struct FakeStore {
    state: Arc<Mutex<StoreState>>,
}

impl FakeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the rows every query returns
    pub fn with_results(rows: Vec<Row>) -> Self {
        let store = Self::default();
        store.state.lock().unwrap().results = rows;
        store
    }

    /// Make the next transactional execute fail with a constraint violation
    pub fn fail_next_execute(&self, constraint: &str) {
        self.state.lock().unwrap().fail_execute_with = Some(constraint.to_owned());
    }

    pub fn opens(&self) -> usize {
        self.state.lock().unwrap().opens
    }

    pub fn closes(&self) -> usize {
        self.state.lock().unwrap().closes
    }

    /// Every statement executed, committed or not
    pub fn statements(&self) -> Vec<(String, Vec<Value>)> {
        self.state.lock().unwrap().statements.clone()
    }

    /// Statements whose transaction committed
    pub fn committed(&self) -> Vec<(String, Vec<Value>)> {
        self.state.lock().unwrap().committed.clone()
    }
}

/// Factory producing connections against one shared [`FakeStore`]
pub struct FakeFactory {
    store: FakeStore,
}

impl FakeFactory {
    pub fn new(store: FakeStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ConnectionFactory for FakeFactory {
    async fn connect(&self, _config: &ConnectionConfig) -> Result<Box<dyn Connection>> {
        self.store.state.lock().unwrap().opens += 1;
        Ok(Box::new(FakeConnection {
            store: self.store.clone(),
        }))
    }

    fn database_type(&self) -> DatabaseType {
        DatabaseType::Unknown
    }
}

struct FakeConnection {
    store: FakeStore,
}

#[async_trait]
impl Connection for FakeConnection {
    async fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        let mut state = self.store.state.lock().unwrap();
        state.statements.push((sql.to_owned(), params.to_vec()));
        Ok(state.results.clone())
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> Result<u64> {
        let mut state = self.store.state.lock().unwrap();
        state.statements.push((sql.to_owned(), params.to_vec()));
        Ok(0)
    }

    async fn begin(&self) -> Result<Box<dyn Transaction>> {
        Ok(Box::new(FakeTransaction {
            store: self.store.clone(),
            staged: Mutex::new(Vec::new()),
        }))
    }

    async fn query_stream(&self, sql: &str, params: &[Value]) -> Result<Pin<Box<dyn RowStream>>> {
        let rows = self.query(sql, params).await?;
        Ok(Box::pin(FakeRowStream {
            rows: rows.into_iter(),
        }))
    }

    async fn is_valid(&self) -> bool {
        true
    }

    async fn close(&self) -> Result<()> {
        self.store.state.lock().unwrap().closes += 1;
        Ok(())
    }
}

struct FakeRowStream {
    rows: std::vec::IntoIter<Row>,
}

impl RowStream for FakeRowStream {
    fn next(&mut self) -> Pin<Box<dyn Future<Output = Result<Option<Row>>> + Send + '_>> {
        Box::pin(async move { Ok(self.rows.next()) })
    }
}

struct FakeTransaction {
    store: FakeStore,
    staged: Mutex<Vec<(String, Vec<Value>)>>,
}

#[async_trait]
impl Transaction for FakeTransaction {
    async fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        let mut state = self.store.state.lock().unwrap();
        state.statements.push((sql.to_owned(), params.to_vec()));
        Ok(state.results.clone())
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> Result<u64> {
        {
            let mut state = self.store.state.lock().unwrap();
            state.statements.push((sql.to_owned(), params.to_vec()));
            if let Some(constraint) = state.fail_execute_with.take() {
                return Err(Error::constraint(constraint, "duplicate key value"));
            }
        }

        // One tuple per "(" opening a placeholder group in the VALUES list
        let rows = sql.matches("($").count() as u64;
        self.staged
            .lock()
            .unwrap()
            .push((sql.to_owned(), params.to_vec()));
        Ok(rows)
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let staged = std::mem::take(&mut *self.staged.lock().unwrap());
        self.store.state.lock().unwrap().committed.extend(staged);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.staged.lock().unwrap().clear();
        Ok(())
    }
}
