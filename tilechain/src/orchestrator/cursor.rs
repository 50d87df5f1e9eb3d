//! Request cursors: the handle a backend completes.

use std::fmt;
use std::sync::{Arc, Weak};

use tracing::warn;

use super::chain::{BackendId, ChainEntry};
use super::core::OrchestratorInner;
use super::in_flight::Ticket;
use crate::coord::TileKey;
use crate::tile::TileImage;

/// Result a backend reports for a cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// A fresh image was produced.
    Success(TileImage),
    /// This backend could not produce the tile; try the next one.
    Failure,
    /// The backend's queue is saturated; abandon the rest of the chain.
    QueueOverflow,
    /// A stale but usable image was found; show it and keep looking.
    ExpiredButUsable(TileImage),
}

/// Progress of one tile request through the backend chain.
///
/// A cursor is created when a request is dispatched and moved into the
/// backend that should fetch it. Completing it consumes it, so each backend
/// reports exactly once. If a backend drops a cursor without completing it
/// (for example because its worker shut down), the drop is reported as
/// [`Outcome::Failure`].
///
/// The cursor only holds a weak reference to the orchestrator: completions
/// arriving after the orchestrator is gone are discarded.
pub struct RequestCursor {
    key: TileKey,
    ticket: Ticket,
    chain: Arc<[ChainEntry]>,
    position: Option<usize>,
    orchestrator: Weak<OrchestratorInner>,
    /// Set while a backend owns the cursor and owes a completion.
    armed: bool,
}

impl RequestCursor {
    pub(crate) fn new(
        key: TileKey,
        ticket: Ticket,
        chain: Arc<[ChainEntry]>,
        orchestrator: Weak<OrchestratorInner>,
    ) -> Self {
        Self {
            key,
            ticket,
            chain,
            position: None,
            orchestrator,
            armed: false,
        }
    }

    /// The requested tile.
    pub fn key(&self) -> TileKey {
        self.key
    }

    /// Backend currently servicing the request, if the walk has started.
    pub fn current_backend(&self) -> Option<BackendId> {
        self.position
            .and_then(|p| self.chain.get(p))
            .map(|entry| entry.id)
    }

    /// Zero-based chain position, `None` before the first backend.
    pub fn position(&self) -> Option<usize> {
        self.position
    }

    /// Reports a fresh image.
    pub fn succeeded(self, image: TileImage) {
        self.complete(Outcome::Success(image));
    }

    /// Reports that this backend could not produce the tile.
    pub fn failed(self) {
        self.complete(Outcome::Failure);
    }

    /// Reports that the backend's queue rejected the request.
    pub fn queue_overflow(self) {
        self.complete(Outcome::QueueOverflow);
    }

    /// Reports a stale but usable image.
    pub fn expired(self, image: TileImage) {
        self.complete(Outcome::ExpiredButUsable(image));
    }

    /// Reports an outcome.
    pub fn complete(mut self, outcome: Outcome) {
        self.armed = false;
        if let Some(orchestrator) = self.orchestrator.upgrade() {
            orchestrator.on_result(self, outcome);
        }
    }

    pub(crate) fn ticket(&self) -> Ticket {
        self.ticket
    }

    pub(crate) fn walk_state(&mut self) -> (&[ChainEntry], &mut Option<usize>) {
        (&*self.chain, &mut self.position)
    }

    pub(crate) fn arm(&mut self) {
        self.armed = true;
    }
}

impl fmt::Debug for RequestCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestCursor")
            .field("key", &self.key)
            .field("ticket", &self.ticket)
            .field("position", &self.position)
            .field("chain_len", &self.chain.len())
            .finish()
    }
}

impl Drop for RequestCursor {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        self.armed = false;
        warn!(tile = %self.key, "Cursor dropped without completion, treating as failure");
        let orphan = RequestCursor {
            key: self.key,
            ticket: self.ticket,
            chain: Arc::clone(&self.chain),
            position: self.position,
            orchestrator: self.orchestrator.clone(),
            armed: false,
        };
        orphan.failed();
    }
}
