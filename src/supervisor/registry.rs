//! Registry of cancellation handles for in-flight invocations.
//!
//! Every invocation registers one [`CancellationToken`] for its running
//! lifetime through a [`CancellationGuard`]. Dropping the guard removes the
//! token, so removal happens on success, cancellation, error and panic
//! unwinding alike. [`CancellationRegistry::cancel_all`] signals everything
//! registered at the moment it is called. [`CancellationRegistry::close`]
//! does the same and also cancels every later registration, for shutdown.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Set of active cancellation handles.
///
/// Owned by whoever drives the operations (usually shared behind an `Arc`);
/// there is no process-wide instance.
#[derive(Debug, Default)]
pub struct CancellationRegistry {
    inner: Mutex<Handles>,
}

#[derive(Debug, Default)]
struct Handles {
    active: HashMap<Uuid, CancellationToken>,
    closed: bool,
}

impl CancellationRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Handles> {
        // The map is never left half-updated, so a poisoned lock is still usable.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a new handle and return its scoped owner.
    ///
    /// After [`CancellationRegistry::close`] the handle starts out cancelled.
    #[must_use = "dropping the guard immediately unregisters the handle"]
    pub fn begin(&self) -> CancellationGuard<'_> {
        let id = Uuid::new_v4();
        let token = CancellationToken::new();
        let mut handles = self.lock();
        if handles.closed {
            token.cancel();
        }
        handles.active.insert(id, token.clone());
        drop(handles);
        tracing::trace!(%id, "Cancellation handle registered");
        CancellationGuard {
            registry: self,
            id,
            token,
        }
    }

    /// Remove a handle. Returns `false` if it was not registered.
    pub fn end(&self, id: Uuid) -> bool {
        let removed = self.lock().active.remove(&id).is_some();
        if removed {
            tracing::trace!(%id, "Cancellation handle removed");
        }
        removed
    }

    /// Signal every handle registered right now.
    ///
    /// Handles registered after the snapshot is taken are not affected.
    /// Returns the number of handles signalled.
    pub fn cancel_all(&self) -> usize {
        let tokens: Vec<CancellationToken> = self.lock().active.values().cloned().collect();
        Self::signal(&tokens)
    }

    /// Signal every registered handle and cancel all future ones.
    ///
    /// The snapshot and the closed flag are taken under one lock, so a
    /// registration either lands in the snapshot or sees the flag.
    /// Returns the number of handles signalled.
    pub fn close(&self) -> usize {
        let tokens: Vec<CancellationToken> = {
            let mut handles = self.lock();
            handles.closed = true;
            handles.active.values().cloned().collect()
        };
        Self::signal(&tokens)
    }

    /// Whether [`CancellationRegistry::close`] has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    fn signal(tokens: &[CancellationToken]) -> usize {
        for token in tokens {
            token.cancel();
        }
        tracing::info!(count = tokens.len(), "Cancelled all active invocations");
        tokens.len()
    }

    /// Number of registered handles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().active.len()
    }

    /// Whether no handles are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().active.is_empty()
    }
}

/// Scoped registration of one cancellation handle.
#[derive(Debug)]
pub struct CancellationGuard<'a> {
    registry: &'a CancellationRegistry,
    id: Uuid,
    token: CancellationToken,
}

impl CancellationGuard<'_> {
    /// Identifier of this handle within the registry.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// The token observed by the supervised run.
    #[must_use]
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Request cancellation of this invocation only.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Check if cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Drop for CancellationGuard<'_> {
    fn drop(&mut self) {
        self.registry.end(self.id);
    }
}
