//! In-memory credential source and resource shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use rotaconn::database::{ConnectionFactory, ResourceError, Session};
use rotaconn::infra::secrets::{Credential, CredentialSource, FetchError};
use rotaconn::sessions::ActiveSession;
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub fn credential(identity: &str, secret: &str) -> Credential {
    Credential::new(identity, secret)
}

// ============================================================================
// Scripted credential source
// ============================================================================

/// Hands out scripted results in order; fails as unreachable once exhausted.
pub struct ScriptedSource {
    script: Mutex<VecDeque<Result<Credential, FetchError>>>,
    delay: Mutex<Duration>,
    calls: AtomicUsize,
}

impl ScriptedSource {
    pub fn new(script: Vec<Result<Credential, FetchError>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            delay: Mutex::new(Duration::ZERO),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn leases(pairs: &[(&str, &str)]) -> Arc<Self> {
        Self::new(pairs.iter().map(|(i, s)| Ok(credential(i, s))).collect())
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = delay;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CredentialSource for ScriptedSource {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn fetch(&self) -> Result<Credential, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        // Pop after the delay so a cancelled fetch consumes nothing.
        self.script
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(FetchError::BackendUnreachable("script exhausted".into())))
    }
}

// ============================================================================
// Fake resource
// ============================================================================

/// Server-side state of the fake database.
#[derive(Default)]
pub struct Backend {
    accepted: Mutex<HashSet<String>>,
    open_failures: Mutex<VecDeque<ResourceError>>,
    op_failures: Mutex<VecDeque<ResourceError>>,
    queries: Mutex<Vec<String>>,
    opens: AtomicUsize,
    live: AtomicUsize,
    max_live: AtomicUsize,
    next_id: AtomicUsize,
    healthy_floor: AtomicUsize,
}

impl Backend {
    pub fn accepting(secrets: &[&str]) -> Arc<Self> {
        let backend = Self::default();
        backend.accept_only(secrets);
        Arc::new(backend)
    }

    /// Replace the set of passwords the server accepts (a rotation at the backend).
    pub fn accept_only(&self, secrets: &[&str]) {
        *self.accepted.lock() = secrets.iter().map(|s| s.to_string()).collect();
    }

    pub fn fail_next_open(&self, err: ResourceError) {
        self.open_failures.lock().push_back(err);
    }

    pub fn fail_next_op(&self, err: ResourceError) {
        self.op_failures.lock().push_back(err);
    }

    /// Mark every session opened so far as unhealthy.
    pub fn break_open_sessions(&self) {
        self.healthy_floor
            .store(self.next_id.load(Ordering::SeqCst), Ordering::SeqCst);
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    pub fn max_live(&self) -> usize {
        self.max_live.load(Ordering::SeqCst)
    }

    /// Secrets of the sessions that ran queries, in order.
    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().clone()
    }

    fn accepts(&self, secret: &str) -> bool {
        self.accepted.lock().contains(secret)
    }
}

pub struct FakeFactory {
    backend: Arc<Backend>,
    open_delay: Duration,
}

impl FakeFactory {
    pub fn new(backend: Arc<Backend>) -> Self {
        Self {
            backend,
            open_delay: Duration::ZERO,
        }
    }

    pub fn with_open_delay(mut self, delay: Duration) -> Self {
        self.open_delay = delay;
        self
    }
}

#[async_trait]
impl ConnectionFactory for FakeFactory {
    type Session = FakeSession;

    async fn open(&self, credential: &Credential) -> Result<FakeSession, ResourceError> {
        self.backend.opens.fetch_add(1, Ordering::SeqCst);
        if !self.open_delay.is_zero() {
            tokio::time::sleep(self.open_delay).await;
        }
        if let Some(err) = self.backend.open_failures.lock().pop_front() {
            return Err(err);
        }
        if !self.backend.accepts(credential.secret()) {
            return Err(ResourceError::AuthRejected(format!(
                "password authentication failed for user \"{}\"",
                credential.identity()
            )));
        }

        let live = self.backend.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.backend.max_live.fetch_max(live, Ordering::SeqCst);
        Ok(FakeSession {
            id: self.backend.next_id.fetch_add(1, Ordering::SeqCst),
            identity: credential.identity().to_string(),
            secret: credential.secret().to_string(),
            backend: Arc::clone(&self.backend),
            closed: AtomicBool::new(false),
        })
    }
}

pub struct FakeSession {
    id: usize,
    identity: String,
    secret: String,
    backend: Arc<Backend>,
    closed: AtomicBool,
}

impl FakeSession {
    /// Returns `identity:secret` of the session that served the query.
    pub async fn query(&self) -> Result<String, ResourceError> {
        tokio::task::yield_now().await;
        if let Some(err) = self.backend.op_failures.lock().pop_front() {
            return Err(err);
        }
        if !self.backend.accepts(&self.secret) {
            return Err(ResourceError::AuthRejected(format!(
                "password authentication failed for user \"{}\"",
                self.identity
            )));
        }
        if self.closed.load(Ordering::SeqCst) {
            return Err(ResourceError::Unreachable("session is closed".into()));
        }
        self.backend.queries.lock().push(self.secret.clone());
        Ok(format!("{}:{}", self.identity, self.secret))
    }

    /// A statement on an already authenticated connection: only fails once
    /// the session has been closed, like a dropped `PgConnection`.
    pub async fn read(&self) -> Result<String, ResourceError> {
        tokio::task::yield_now().await;
        if self.closed.load(Ordering::SeqCst) {
            return Err(ResourceError::Unreachable("session is closed".into()));
        }
        self.backend.queries.lock().push(self.secret.clone());
        Ok(format!("{}:{}", self.identity, self.secret))
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Session for FakeSession {
    fn is_healthy(&self) -> bool {
        self.id >= self.backend.healthy_floor.load(Ordering::SeqCst)
    }

    async fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.backend.live.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

/// The operation used by most tests.
pub async fn query(session: ActiveSession<FakeSession>) -> Result<String, ResourceError> {
    session.query().await
}
