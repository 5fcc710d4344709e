//! Issuance generations: a monotonic counter plus a CancellationToken per
//! request. Each new request advances the generation and cancels the token of
//! the one it supersedes, so stale responses can neither finish a debounce
//! wait nor overwrite a newer result.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

pub struct TaskGeneration {
    current_token: Mutex<CancellationToken>,
    generation: Arc<AtomicU64>,
}

impl Default for TaskGeneration {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskGeneration {
    pub fn new() -> Self {
        Self {
            current_token: Mutex::new(CancellationToken::new()),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Cancel the current request, advance the generation, and return a guard
    /// for the new one.
    pub fn advance(&self) -> GenerationGuard {
        let mut token = self.current_token.lock();
        token.cancel();
        *token = CancellationToken::new();
        let my_generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        GenerationGuard {
            generation: Arc::clone(&self.generation),
            my_generation,
            token: token.clone(),
        }
    }

    pub fn current_generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }
}

/// Snapshot of one issuance: the generation it was handed and the token the
/// next `advance` will cancel.
#[derive(Clone)]
pub struct GenerationGuard {
    generation: Arc<AtomicU64>,
    my_generation: u64,
    token: CancellationToken,
}

impl GenerationGuard {
    /// No later request has been issued.
    pub fn is_current(&self) -> bool {
        self.my_generation == self.generation.load(Ordering::SeqCst)
    }

    pub fn should_continue(&self) -> bool {
        self.is_current() && !self.token.is_cancelled()
    }

    /// Passed to the backend so a superseded call can abort early.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn my_generation(&self) -> u64 {
        self.my_generation
    }
}
