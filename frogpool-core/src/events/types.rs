//! Pool domain events.
//!
//! Events are published after the change they describe has been committed.
//! They carry identifiers plus whatever snapshot the subscribers push out
//! verbatim; anything else is re-read from the store.

use frogpool_sdk::objects::ParticipantSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PoolEventKind {
    PoolBecameActive,
    PoolParticipantsChanged,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PoolEvent {
    /// The pool just filled up and moved to `active`.
    PoolBecameActive { pool_id: i64 },
    /// A participant joined the pool.
    PoolParticipantsChanged {
        pool_id: i64,
        participants: Vec<ParticipantSnapshot>,
    },
}

impl PoolEvent {
    pub fn kind(&self) -> PoolEventKind {
        match self {
            PoolEvent::PoolBecameActive { .. } => PoolEventKind::PoolBecameActive,
            PoolEvent::PoolParticipantsChanged { .. } => PoolEventKind::PoolParticipantsChanged,
        }
    }

    pub fn pool_id(&self) -> i64 {
        match self {
            PoolEvent::PoolBecameActive { pool_id }
            | PoolEvent::PoolParticipantsChanged { pool_id, .. } => *pool_id,
        }
    }
}
