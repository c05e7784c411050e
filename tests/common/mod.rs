//! Test doubles shared by the integration suites.
//!
//! - [`ScriptedSource`]: a remote source whose calls follow a per-dataset script
//! - [`FailingStore`]: a store wrapper that injects write failures at chosen calls

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use resilient_sync::{
    RemoteSource, Snapshot, SnapshotStore, SourceError, StorageError, TransactionRecord, UserRecord,
};

/// What one scripted call does.
#[derive(Debug, Clone)]
pub enum Step {
    /// Return the default fixture after `latency`
    Succeed { latency: Duration },
    /// Return the given users / transactions after `latency`
    SucceedWith { latency: Duration, tag: &'static str },
    /// Return an error after `latency`
    Fail { latency: Duration },
    /// Never return
    Hang,
}

impl Step {
    pub fn ok() -> Self {
        Step::Succeed { latency: Duration::ZERO }
    }

    pub fn fail() -> Self {
        Step::Fail { latency: Duration::ZERO }
    }

    pub fn fail_after(ms: u64) -> Self {
        Step::Fail { latency: Duration::from_millis(ms) }
    }

    pub fn tagged(ms: u64, tag: &'static str) -> Self {
        Step::SucceedWith { latency: Duration::from_millis(ms), tag }
    }
}

/// Remote source driven by scripts. An exhausted script succeeds immediately.
#[derive(Default)]
pub struct ScriptedSource {
    primary: Mutex<VecDeque<Step>>,
    secondary: Mutex<VecDeque<Step>>,
    primary_calls: AtomicU64,
    secondary_calls: AtomicU64,
    /// Calls that ran their step to the end
    primary_completed: AtomicU64,
    secondary_completed: AtomicU64,
    /// Call log: "users" / "transactions", in start order
    log: Mutex<Vec<&'static str>>,
}

impl ScriptedSource {
    pub fn new(primary: Vec<Step>, secondary: Vec<Step>) -> Arc<Self> {
        Arc::new(Self {
            primary: Mutex::new(primary.into()),
            secondary: Mutex::new(secondary.into()),
            ..Default::default()
        })
    }

    pub fn reliable() -> Arc<Self> {
        Self::new(vec![], vec![])
    }

    pub fn primary_calls(&self) -> u64 {
        self.primary_calls.load(Ordering::SeqCst)
    }

    pub fn secondary_calls(&self) -> u64 {
        self.secondary_calls.load(Ordering::SeqCst)
    }

    pub fn primary_completed(&self) -> u64 {
        self.primary_completed.load(Ordering::SeqCst)
    }

    pub fn secondary_completed(&self) -> u64 {
        self.secondary_completed.load(Ordering::SeqCst)
    }

    pub fn log(&self) -> Vec<&'static str> {
        self.log.lock().clone()
    }

    pub fn users(tag: &str) -> Vec<UserRecord> {
        vec![
            UserRecord::new(1, format!("Ana{}", tag)).with_attr("role", "admin"),
            UserRecord::new(2, format!("Carlos{}", tag)).with_attr("role", "user"),
        ]
    }

    pub fn transactions(tag: &str) -> Vec<TransactionRecord> {
        let bump = tag.len() as f64;
        vec![
            TransactionRecord::new(101, 1, 50.0 + bump),
            TransactionRecord::new(102, 2, 120.0 + bump),
        ]
    }

    /// Play one step; `Ok(tag)` names the dataset variant to return.
    async fn play(step: Option<Step>) -> Result<&'static str, SourceError> {
        match step.unwrap_or_else(Step::ok) {
            Step::Succeed { latency } => {
                tokio::time::sleep(latency).await;
                Ok("")
            }
            Step::SucceedWith { latency, tag } => {
                tokio::time::sleep(latency).await;
                Ok(tag)
            }
            Step::Fail { latency } => {
                tokio::time::sleep(latency).await;
                Err(SourceError::Unavailable("scripted failure".into()))
            }
            Step::Hang => std::future::pending().await,
        }
    }
}

#[async_trait]
impl RemoteSource for ScriptedSource {
    async fn fetch_primary(&self) -> Result<Vec<UserRecord>, SourceError> {
        self.primary_calls.fetch_add(1, Ordering::SeqCst);
        self.log.lock().push("users");
        let step = self.primary.lock().pop_front();
        let played = Self::play(step).await;
        self.primary_completed.fetch_add(1, Ordering::SeqCst);
        played.map(Self::users)
    }

    async fn fetch_secondary(&self) -> Result<Vec<TransactionRecord>, SourceError> {
        self.secondary_calls.fetch_add(1, Ordering::SeqCst);
        self.log.lock().push("transactions");
        let step = self.secondary.lock().pop_front();
        let played = Self::play(step).await;
        self.secondary_completed.fetch_add(1, Ordering::SeqCst);
        played.map(Self::transactions)
    }
}

/// A wrapper that fails writes on specific call numbers (1-indexed).
pub struct FailingStore<S: SnapshotStore> {
    inner: S,
    call_count: AtomicU64,
    fail_on_calls: Vec<u64>,
}

impl<S: SnapshotStore> FailingStore<S> {
    pub fn new(inner: S, fail_on_calls: Vec<u64>) -> Self {
        Self { inner, call_count: AtomicU64::new(0), fail_on_calls }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn calls(&self) -> u64 {
        self.call_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<S: SnapshotStore> SnapshotStore for FailingStore<S> {
    async fn persist(&self, snapshot: &Snapshot) -> Result<(), StorageError> {
        let n = self.call_count.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_on_calls.contains(&n) {
            return Err(StorageError::Backend(format!("injected write failure #{}", n)));
        }
        self.inner.persist(snapshot).await
    }

    async fn load(&self) -> Result<Option<Snapshot>, StorageError> {
        self.inner.load().await
    }

    fn kind(&self) -> &'static str {
        "failing"
    }
}
