//! Write-once result cache keyed by problem fingerprint.
//!
//! Each fingerprint owns a `OnceLock` slot. The map lock is held only to
//! find or create the slot; the computation runs outside it, and concurrent
//! callers for the same fingerprint block on the slot until the first one
//! finishes. Inputs are immutable, so entries are never invalidated.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

use tracing::trace;

use crate::engine::SolutionResult;
use crate::error::{SolveError, SolveResult};
use crate::problem::Fingerprint;

type Slot = Arc<OnceLock<SolutionResult>>;

/// At-most-once computation per fingerprint.
#[derive(Debug, Default)]
pub struct ResultCache {
    slots: Mutex<HashMap<Fingerprint, Slot>>,
    computed: AtomicUsize,
}

impl ResultCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, fingerprint: Fingerprint) -> SolveResult<Slot> {
        let mut slots = self
            .slots
            .lock()
            .map_err(|_| SolveError::internal("result cache lock poisoned"))?;
        Ok(Arc::clone(slots.entry(fingerprint).or_default()))
    }

    /// Return the cached result for `fingerprint`, computing it with
    /// `compute` if this is the first request.
    ///
    /// # Errors
    ///
    /// Returns `SolveError::Internal` if the cache lock is poisoned.
    pub fn get_or_compute<F>(&self, fingerprint: Fingerprint, compute: F) -> SolveResult<SolutionResult>
    where
        F: FnOnce() -> SolutionResult,
    {
        let slot = self.slot(fingerprint)?;
        let result = slot.get_or_init(|| {
            self.computed.fetch_add(1, Ordering::Relaxed);
            trace!(%fingerprint, "computing uncached result");
            compute()
        });
        Ok(result.clone())
    }

    /// Cached result, if present.
    #[must_use]
    pub fn get(&self, fingerprint: &Fingerprint) -> Option<SolutionResult> {
        let slots = self.slots.lock().ok()?;
        slots.get(fingerprint).and_then(|s| s.get().cloned())
    }

    /// Number of completed entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots
            .lock()
            .map(|slots| slots.values().filter(|s| s.get().is_some()).count())
            .unwrap_or(0)
    }

    /// Returns true if nothing has been cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of times a computation actually ran.
    #[must_use]
    pub fn computations(&self) -> usize {
        self.computed.load(Ordering::Relaxed)
    }
}
