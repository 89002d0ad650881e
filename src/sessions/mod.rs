//! Rotation-aware sessions.
//!
//! [`RotationAwareSession`] owns at most one live session to the protected
//! resource. When the resource rejects the credential it closes the stale
//! session, fetches one new credential, opens one new session and retries the
//! operation once. Concurrent callers serialize on the rotation lock and then
//! run against whatever session the rotation produced, so a burst of
//! rejections against the same session triggers a single fetch.
//!
//! State machine:
//!
//! ```text
//!  NoSession ──fetch+open──▶ SessionLive ──AuthRejected──▶ Rotating
//!      ▲                        │   ▲                          │
//!      └──── Other / teardown ──┘   └──────── fetch+open ──────┘
//! ```

mod error;

pub use error::{ErrorKind, ExecuteError, FailureClassification};

use crate::database::{ConnectionFactory, ResourceError, Session};
use crate::infra::secrets::{Credential, CredentialSource};
use std::fmt;
use std::future::Future;
use std::ops::Deref;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

// ============================================================================
// Public types
// ============================================================================

/// Observable state of a [`RotationAwareSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SessionState {
    NoSession = 0,
    SessionLive = 1,
    Rotating = 2,
}

impl SessionState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => SessionState::SessionLive,
            2 => SessionState::Rotating,
            _ => SessionState::NoSession,
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionState::NoSession => "no-session",
            SessionState::SessionLive => "session-live",
            SessionState::Rotating => "rotating",
        };
        f.write_str(s)
    }
}

/// A session handed to an operation, tagged with the credential that opened it.
pub struct ActiveSession<S> {
    session: Arc<S>,
    credential: Arc<Credential>,
    generation: u64,
}

impl<S> ActiveSession<S> {
    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    /// Increments each time a new session is opened.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn session(&self) -> &Arc<S> {
        &self.session
    }
}

impl<S> Clone for ActiveSession<S> {
    fn clone(&self) -> Self {
        Self {
            session: Arc::clone(&self.session),
            credential: Arc::clone(&self.credential),
            generation: self.generation,
        }
    }
}

impl<S> Deref for ActiveSession<S> {
    type Target = S;

    fn deref(&self) -> &S {
        &self.session
    }
}

/// Counters over the lifetime of a [`RotationAwareSession`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Calls to the credential source.
    pub fetches: u64,
    /// Calls to the connection factory.
    pub opens: u64,
    /// Completed rotations.
    pub rotations: u64,
    /// Generation of the most recently opened session.
    pub generation: u64,
}

// ============================================================================
// RotationAwareSession
// ============================================================================

struct Slot<S> {
    credential: Option<Arc<Credential>>,
    live: Option<ActiveSession<S>>,
    generation: u64,
}

/// Keeps one session valid across credential rotation.
///
/// Safe to share between tasks behind an `Arc`. Callers that arrive while a
/// rotation is in progress wait for it (the lock is FIFO) and then run against
/// the rotated session.
pub struct RotationAwareSession<F: ConnectionFactory> {
    source: Arc<dyn CredentialSource>,
    factory: F,
    slot: Mutex<Slot<F::Session>>,
    state: AtomicU8,
    fetches: AtomicU64,
    opens: AtomicU64,
    rotations: AtomicU64,
    generation: AtomicU64,
}

impl<F: ConnectionFactory> RotationAwareSession<F> {
    pub fn new(source: Arc<dyn CredentialSource>, factory: F) -> Self {
        Self {
            source,
            factory,
            slot: Mutex::new(Slot {
                credential: None,
                live: None,
                generation: 0,
            }),
            state: AtomicU8::new(SessionState::NoSession as u8),
            fetches: AtomicU64::new(0),
            opens: AtomicU64::new(0),
            rotations: AtomicU64::new(0),
            generation: AtomicU64::new(0),
        }
    }

    pub fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn stats(&self) -> SessionStats {
        SessionStats {
            fetches: self.fetches.load(Ordering::Relaxed),
            opens: self.opens.load(Ordering::Relaxed),
            rotations: self.rotations.load(Ordering::Relaxed),
            generation: self.generation.load(Ordering::Relaxed),
        }
    }

    /// The credential currently held, if any.
    pub async fn credential(&self) -> Option<Arc<Credential>> {
        self.slot.lock().await.credential.clone()
    }

    /// Run `op` against the live session, rotating once on rejection.
    ///
    /// `op` is called at most twice. The second call runs against the session
    /// built from a freshly fetched credential, or against the session that
    /// replaced this one while `op` was in flight.
    pub async fn execute<T, Op, Fut>(&self, op: Op) -> Result<T, ExecuteError>
    where
        Op: Fn(ActiveSession<F::Session>) -> Fut,
        Fut: Future<Output = Result<T, ResourceError>>,
    {
        let active = self.acquire().await?;
        let generation = active.generation;

        let (retry, first) = match op(active).await {
            Ok(value) => return Ok(value),
            Err(ResourceError::AuthRejected(cause)) => {
                warn!(generation, cause = %cause, "Operation rejected by resource; rotating credential");
                (self.rotate_after(generation, &cause).await?, cause)
            }
            Err(err) => match self.superseded(generation).await {
                Some(current) => {
                    debug!(
                        generation,
                        current = current.generation,
                        "Session replaced while the operation ran; retrying on the new one: {err}"
                    );
                    (current, err.detail().to_string())
                }
                None => return Err(self.surface(generation, err).await),
            },
        };
        let retry_generation = retry.generation;

        match op(retry).await {
            Ok(value) => Ok(value),
            Err(ResourceError::AuthRejected(second)) => {
                error!(
                    generation = retry_generation,
                    cause = %second,
                    "Rotated credential was rejected as well"
                );
                self.discard(retry_generation, true).await;
                Err(ExecuteError::exhausted(&first, &second))
            }
            Err(err) => Err(self.surface(retry_generation, err).await),
        }
    }

    /// Close the live session, if any, and forget the held credential.
    pub async fn shutdown(&self) {
        let mut slot = self.slot.lock().await;
        slot.credential = None;
        self.close_live(&mut slot).await;
        debug!("Rotation-aware session shut down");
    }

    // ------------------------------------------------------------------------
    // Internals. Every method taking `&mut Slot` runs under the slot lock.
    // ------------------------------------------------------------------------

    async fn acquire(&self) -> Result<ActiveSession<F::Session>, ExecuteError> {
        let mut slot = self.slot.lock().await;
        if let Some(live) = slot.live.as_ref() {
            if live.session.is_healthy() {
                return Ok(live.clone());
            }
            debug!(generation = live.generation, "Session unhealthy; reopening");
            self.close_live(&mut slot).await;
        }
        self.connect(&mut slot).await
    }

    /// Open a session with the held credential, fetching one only if none is held.
    async fn connect(
        &self,
        slot: &mut Slot<F::Session>,
    ) -> Result<ActiveSession<F::Session>, ExecuteError> {
        let credential = match slot.credential.clone() {
            Some(credential) => credential,
            None => {
                let credential = self.fetch().await?;
                slot.credential = Some(Arc::clone(&credential));
                credential
            }
        };

        match self.open(slot, credential).await {
            Ok(active) => Ok(active),
            Err(ResourceError::AuthRejected(cause)) => {
                warn!(cause = %cause, "Resource refused the held credential; rotating");
                self.rotate(slot, &cause).await
            }
            Err(err) => Err(err.into()),
        }
    }

    /// The healthy session that replaced `generation`, if it has been replaced.
    ///
    /// Waits for an in-progress rotation to finish.
    async fn superseded(&self, generation: u64) -> Option<ActiveSession<F::Session>> {
        let slot = self.slot.lock().await;
        if slot.generation == generation {
            return None;
        }
        slot.live
            .as_ref()
            .filter(|live| live.session.is_healthy())
            .cloned()
    }

    /// Rotate unless another caller already replaced `stale_generation`.
    async fn rotate_after(
        &self,
        stale_generation: u64,
        cause: &str,
    ) -> Result<ActiveSession<F::Session>, ExecuteError> {
        let mut slot = self.slot.lock().await;
        if slot.generation != stale_generation {
            if let Some(live) = slot.live.as_ref() {
                debug!(
                    stale_generation,
                    generation = live.generation,
                    "Session already rotated by another caller"
                );
                return Ok(live.clone());
            }
            return self.connect(&mut slot).await;
        }
        self.rotate(&mut slot, cause).await
    }

    async fn rotate(
        &self,
        slot: &mut Slot<F::Session>,
        cause: &str,
    ) -> Result<ActiveSession<F::Session>, ExecuteError> {
        // Dropped without `complete()` (error or cancellation) leaves NoSession.
        let guard = StateGuard::enter(&self.state, SessionState::Rotating);

        slot.credential = None;
        if let Some(stale) = slot.live.take() {
            stale.session.close().await;
        }

        let credential = self.fetch().await?;
        slot.credential = Some(Arc::clone(&credential));

        match self.open(slot, credential).await {
            Ok(active) => {
                self.rotations.fetch_add(1, Ordering::Relaxed);
                guard.complete();
                info!(
                    generation = active.generation,
                    identity = %active.credential.identity(),
                    "Credential rotated"
                );
                Ok(active)
            }
            Err(ResourceError::AuthRejected(second)) => {
                slot.credential = None;
                error!(cause = %second, "Freshly fetched credential was rejected");
                Err(ExecuteError::exhausted(cause, &second))
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn fetch(&self) -> Result<Arc<Credential>, ExecuteError> {
        self.fetches.fetch_add(1, Ordering::Relaxed);
        match self.source.fetch().await {
            Ok(credential) => {
                info!(
                    source = self.source.name(),
                    identity = %credential.identity(),
                    expires_at = ?credential.expires_at(),
                    "Fetched credential"
                );
                Ok(Arc::new(credential))
            }
            Err(err) => {
                warn!(
                    source = self.source.name(),
                    kind = %err.kind(),
                    "Credential fetch failed: {err}"
                );
                Err(err.into())
            }
        }
    }

    async fn open(
        &self,
        slot: &mut Slot<F::Session>,
        credential: Arc<Credential>,
    ) -> Result<ActiveSession<F::Session>, ResourceError> {
        self.opens.fetch_add(1, Ordering::Relaxed);
        let session = self.factory.open(&credential).await?;

        slot.generation += 1;
        let active = ActiveSession {
            session: Arc::new(session),
            credential,
            generation: slot.generation,
        };
        slot.live = Some(active.clone());
        self.generation.store(slot.generation, Ordering::Relaxed);
        self.state
            .store(SessionState::SessionLive as u8, Ordering::Release);

        debug!(
            generation = active.generation,
            identity = %active.credential.identity(),
            "Session opened"
        );
        Ok(active)
    }

    /// Surface a non-authentication failure, dropping the session if it is fatal.
    async fn surface(&self, generation: u64, err: ResourceError) -> ExecuteError {
        if err.classification() == FailureClassification::Fatal {
            warn!(generation, "Fatal operation error; discarding session: {err}");
            self.discard(generation, false).await;
        }
        err.into()
    }

    async fn discard(&self, generation: u64, forget_credential: bool) {
        let mut slot = self.slot.lock().await;
        if slot.generation != generation {
            return;
        }
        if forget_credential {
            slot.credential = None;
        }
        self.close_live(&mut slot).await;
    }

    async fn close_live(&self, slot: &mut Slot<F::Session>) {
        if let Some(stale) = slot.live.take() {
            self.state
                .store(SessionState::NoSession as u8, Ordering::Release);
            stale.session.close().await;
            debug!(generation = stale.generation, "Session closed");
        }
    }
}

/// Publishes a transient state and restores `NoSession` on drop unless completed.
struct StateGuard<'a> {
    state: &'a AtomicU8,
    completed: bool,
}

impl<'a> StateGuard<'a> {
    fn enter(state: &'a AtomicU8, during: SessionState) -> Self {
        state.store(during as u8, Ordering::Release);
        Self {
            state,
            completed: false,
        }
    }

    fn complete(mut self) {
        self.completed = true;
    }
}

impl Drop for StateGuard<'_> {
    fn drop(&mut self) {
        if !self.completed {
            self.state
                .store(SessionState::NoSession as u8, Ordering::Release);
        }
    }
}
