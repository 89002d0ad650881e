//! The probe loop.
//!
//! [`Driver`] calls [`RotationAwareSession::execute`] on a fixed interval.
//! Retriable failures are handed to a [`RetryPolicy`]; fatal failures and
//! failed rotations stop the loop.

mod policy;

pub use policy::{BackoffPolicy, FailFast, RetryDecision, RetryPolicy};

use crate::config::ProbeConfig;
use crate::database::{ConnectionFactory, ResourceError};
use crate::infra::AbortHandle;
use crate::sessions::{ActiveSession, ExecuteError, RotationAwareSession, SessionStats};
use std::future::Future;
use std::time::Duration;
use tracing::{error, info, warn};

/// Why the driver stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// The configured number of iterations ran.
    Completed,
    /// The abort handle was tripped.
    Aborted,
    /// A fatal error or a failed rotation.
    Fatal(ExecuteError),
    /// The retry policy gave up on a retriable error.
    RetriesExhausted(ExecuteError),
}

impl StopReason {
    pub fn is_failure(&self) -> bool {
        matches!(self, StopReason::Fatal(_) | StopReason::RetriesExhausted(_))
    }
}

/// Summary of a driver run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverReport {
    pub iterations: u64,
    pub successes: u64,
    pub retriable_failures: u64,
    pub stats: SessionStats,
    pub stop: StopReason,
}

/// A successful probe, as seen by the report callback.
#[derive(Debug)]
pub struct ProbeSuccess<'a, T> {
    pub iteration: u64,
    pub value: &'a T,
    /// Credentials were rotated since the previous successful probe.
    pub rotated: bool,
    pub stats: SessionStats,
}

/// Runs a probe against a [`RotationAwareSession`] on a cadence.
pub struct Driver {
    interval: Duration,
    max_iterations: Option<u64>,
    policy: Box<dyn RetryPolicy>,
    abort: AbortHandle,
}

impl Driver {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            max_iterations: None,
            policy: Box::new(BackoffPolicy::default()),
            abort: AbortHandle::new(),
        }
    }

    pub fn from_config(config: &ProbeConfig) -> Self {
        Self::new(Duration::from_millis(config.interval_ms))
            .with_max_iterations(config.max_iterations)
            .with_policy(BackoffPolicy::from_config(&config.retry))
    }

    pub fn with_max_iterations(mut self, max_iterations: Option<u64>) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_policy(mut self, policy: impl RetryPolicy + 'static) -> Self {
        self.policy = Box::new(policy);
        self
    }

    pub fn with_abort_handle(mut self, abort: AbortHandle) -> Self {
        self.abort = abort;
        self
    }

    pub fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }

    /// Probe until the iteration budget is spent, the handle is aborted, or
    /// a failure stops the loop. `on_success` sees every successful probe.
    pub async fn run<F, T, Op, Fut, R>(
        &mut self,
        session: &RotationAwareSession<F>,
        probe: Op,
        mut on_success: R,
    ) -> DriverReport
    where
        F: ConnectionFactory,
        Op: Fn(ActiveSession<F::Session>) -> Fut,
        Fut: Future<Output = Result<T, ResourceError>>,
        R: FnMut(ProbeSuccess<'_, T>),
    {
        let mut iterations = 0u64;
        let mut successes = 0u64;
        let mut retriable_failures = 0u64;
        let mut consecutive = 0u32;
        let mut last_rotations = session.stats().rotations;

        let stop = loop {
            if self.abort.is_aborted() {
                break StopReason::Aborted;
            }
            if self.max_iterations.is_some_and(|max| iterations >= max) {
                break StopReason::Completed;
            }

            iterations += 1;
            let wait = match session.execute(&probe).await {
                Ok(value) => {
                    successes += 1;
                    consecutive = 0;
                    self.policy.reset();

                    let stats = session.stats();
                    let rotated = stats.rotations != last_rotations;
                    last_rotations = stats.rotations;
                    on_success(ProbeSuccess {
                        iteration: iterations,
                        value: &value,
                        rotated,
                        stats,
                    });
                    self.interval
                }
                Err(err) if err.is_retriable() => {
                    retriable_failures += 1;
                    consecutive = consecutive.saturating_add(1);
                    match self.policy.on_retriable(consecutive, &err) {
                        RetryDecision::RetryAfter(delay) => {
                            warn!(
                                iteration = iterations,
                                consecutive,
                                delay_ms = delay.as_millis() as u64,
                                "Probe failed, retrying: {err}"
                            );
                            delay
                        }
                        RetryDecision::Abort => {
                            error!(iteration = iterations, consecutive, "Giving up: {err}");
                            break StopReason::RetriesExhausted(err);
                        }
                    }
                }
                Err(err) => {
                    error!(iteration = iterations, kind = %err.kind(), "Probe failed: {err}");
                    break StopReason::Fatal(err);
                }
            };

            if self.max_iterations.is_some_and(|max| iterations >= max) {
                break StopReason::Completed;
            }
            if !self.abort.sleep(wait).await {
                break StopReason::Aborted;
            }
        };

        let report = DriverReport {
            iterations,
            successes,
            retriable_failures,
            stats: session.stats(),
            stop,
        };
        info!(
            iterations = report.iterations,
            successes = report.successes,
            retriable_failures = report.retriable_failures,
            fetches = report.stats.fetches,
            rotations = report.stats.rotations,
            "Driver stopped: {:?}",
            report.stop
        );
        report
    }
}
