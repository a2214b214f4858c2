//! Shared test helpers for `tripwire-core` integration tests.
//!
//! These helpers provide scripted breakers and domain errors so that the
//! dispatch tests can focus on behaviour instead of boilerplate.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tripwire_core::{AsyncProtectedCall, Breaker, ExecutionError, ProtectedCall, ProtectedFailure};

/// Retry hint reported by rejecting scripted breakers
pub const SCRIPTED_RETRY_AFTER: Duration = Duration::from_secs(1);

/// What a [`ScriptedBreaker`] does with each call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Script {
    /// Run the call and report its outcome honestly
    Run,
    /// Refuse to run the call
    Reject,
    /// Report success without running the call
    ClaimSuccess,
    /// Report a failure without running the call
    ClaimFailure,
}

/// Breaker double whose verdicts are fixed by a [`Script`]
#[derive(Debug)]
pub struct ScriptedBreaker {
    script: Mutex<Script>,
    calls: AtomicUsize,
    failures: Mutex<Vec<ProtectedFailure>>,
}

impl ScriptedBreaker {
    pub fn new(script: Script) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script),
            calls: AtomicUsize::new(0),
            failures: Mutex::new(Vec::new()),
        })
    }

    pub fn set_script(&self, script: Script) {
        *self.script.lock().expect("script lock") = script;
    }

    /// Number of calls handed to this breaker
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Failures observed from calls this breaker ran
    pub fn failures(&self) -> Vec<ProtectedFailure> {
        self.failures.lock().expect("failures lock").clone()
    }

    fn begin(&self) -> Script {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.script.lock().expect("script lock")
    }

    fn finish(&self, outcome: Result<(), ProtectedFailure>) -> Result<(), ExecutionError> {
        if let Err(failure) = &outcome {
            self.failures.lock().expect("failures lock").push(failure.clone());
        }
        outcome.map_err(ExecutionError::Failed)
    }
}

fn unexecuted(script: Script) -> Result<(), ExecutionError> {
    match script {
        Script::Reject => Err(ExecutionError::Rejected { retry_after: Some(SCRIPTED_RETRY_AFTER) }),
        Script::ClaimSuccess => Ok(()),
        Script::ClaimFailure => Err(ExecutionError::Failed(ProtectedFailure::Recoverable {
            message: "claimed without running".to_string(),
        })),
        Script::Run => unreachable!("run scripts execute the call"),
    }
}

#[async_trait]
impl Breaker for ScriptedBreaker {
    fn execute_protected(&self, call: ProtectedCall<'_>) -> Result<(), ExecutionError> {
        match self.begin() {
            Script::Run => self.finish(call.run()),
            other => unexecuted(other),
        }
    }

    async fn execute_protected_async(
        &self,
        call: AsyncProtectedCall<'_>,
    ) -> Result<(), ExecutionError> {
        match self.begin() {
            Script::Run => self.finish(call.run().await),
            other => unexecuted(other),
        }
    }
}

/// Recoverable domain error used by the payment scenarios
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("insufficient funds: balance {balance}, requested {requested}")]
pub struct InsufficientFundsError {
    pub balance: u64,
    pub requested: u64,
}

/// Fatal error used for unrecoverable failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("ledger corrupted at entry {entry}")]
pub struct LedgerCorrupted {
    pub entry: u64,
}

/// Counts how many times an action ran
#[derive(Debug, Default)]
pub struct CallCounter(AtomicUsize);

impl CallCounter {
    pub fn hit(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }

    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}
