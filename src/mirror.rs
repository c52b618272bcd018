use crate::error::StoreError;
use crate::shot::{CoachAction, ShotRecord};
use crate::store::SessionStore;
use chrono::{DateTime, Local};
use std::collections::VecDeque;
use tracing::{debug, warn};

/// One write against the store, kept until it has been applied
#[derive(Debug, Clone, PartialEq)]
pub enum MirrorOp {
    CreateSession {
        session_id: String,
        player_id: i64,
        started_at: DateTime<Local>,
    },
    AppendShot {
        session_id: String,
        shot: ShotRecord,
    },
    DeleteShot {
        session_id: String,
        sequence_number: u64,
    },
    AppendEvent {
        session_id: String,
        action: CoachAction,
    },
    FinalizeSession {
        session_id: String,
        ended_at: DateTime<Local>,
        elapsed_ms: u64,
    },
    DeleteSession {
        session_id: String,
    },
}

impl MirrorOp {
    pub fn session_id(&self) -> &str {
        match self {
            MirrorOp::CreateSession { session_id, .. }
            | MirrorOp::AppendShot { session_id, .. }
            | MirrorOp::DeleteShot { session_id, .. }
            | MirrorOp::AppendEvent { session_id, .. }
            | MirrorOp::FinalizeSession { session_id, .. }
            | MirrorOp::DeleteSession { session_id } => session_id,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            MirrorOp::CreateSession { .. } => "create session",
            MirrorOp::AppendShot { .. } => "record shot",
            MirrorOp::DeleteShot { .. } => "undo shot",
            MirrorOp::AppendEvent { .. } => "log event",
            MirrorOp::FinalizeSession { .. } => "end session",
            MirrorOp::DeleteSession { .. } => "discard session",
        }
    }

    fn apply(&self, store: &dyn SessionStore) -> Result<(), StoreError> {
        match self {
            MirrorOp::CreateSession {
                session_id,
                player_id,
                started_at,
            } => store.create_session(session_id, *player_id, *started_at),
            MirrorOp::AppendShot { session_id, shot } => store.append_shot(session_id, shot),
            MirrorOp::DeleteShot {
                session_id,
                sequence_number,
            } => store.delete_shot(session_id, *sequence_number),
            MirrorOp::AppendEvent { session_id, action } => store.append_event(session_id, action),
            MirrorOp::FinalizeSession {
                session_id,
                ended_at,
                elapsed_ms,
            } => store.finalize_session(session_id, *ended_at, *elapsed_ms),
            MirrorOp::DeleteSession { session_id } => store.delete_session(session_id),
        }
    }
}

/// Remote write failure, reported to the user and never fatal
#[derive(Debug)]
pub struct MirrorWarning {
    pub op: &'static str,
    pub error: StoreError,
}

impl std::fmt::Display for MirrorWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "could not save {} (will retry): {}", self.op, self.error)
    }
}

/// Queued writes kept before the oldest are given up on
pub const OUTBOX_LIMIT: usize = 1_000;

/// Fire-and-forget writer in front of the store.
///
/// Writes that fail wait in an outbox and are retried, in order, before the
/// next write goes out, so a session's remote rows never apply out of order.
/// A head that keeps failing holds back everything behind it, for every
/// session, until it applies or is dropped. The outbox holds at most
/// `limit` ops; past that the oldest is discarded with a warning.
pub struct Mirror {
    store: Box<dyn SessionStore>,
    outbox: VecDeque<MirrorOp>,
    limit: usize,
    dropped: usize,
}

impl Mirror {
    pub fn new(store: Box<dyn SessionStore>) -> Self {
        Self::with_limit(store, OUTBOX_LIMIT)
    }

    pub fn with_limit(store: Box<dyn SessionStore>, limit: usize) -> Self {
        Self {
            store,
            outbox: VecDeque::new(),
            limit: limit.max(1),
            dropped: 0,
        }
    }

    pub fn store(&self) -> &dyn SessionStore {
        self.store.as_ref()
    }

    pub fn pending(&self) -> usize {
        self.outbox.len()
    }

    /// Writes given up on because the outbox was full
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    fn enqueue(&mut self, op: MirrorOp) {
        if self.outbox.len() >= self.limit {
            if let Some(oldest) = self.outbox.pop_front() {
                self.dropped += 1;
                warn!(
                    op = oldest.name(),
                    session_id = oldest.session_id(),
                    limit = self.limit,
                    "mirror outbox full, dropping oldest write"
                );
            }
        }
        self.outbox.push_back(op);
    }

    /// Retry queued writes until one fails.
    pub fn flush(&mut self) -> Result<(), MirrorWarning> {
        while let Some(op) = self.outbox.front() {
            if let Err(error) = op.apply(self.store.as_ref()) {
                warn!(op = op.name(), pending = self.outbox.len(), error = %error, "mirror retry failed");
                return Err(MirrorWarning {
                    op: op.name(),
                    error,
                });
            }
            debug!(op = op.name(), "mirror retry applied");
            self.outbox.pop_front();
        }
        Ok(())
    }

    pub fn submit(&mut self, op: MirrorOp) -> Result<(), MirrorWarning> {
        if let Err(warning) = self.flush() {
            self.enqueue(op);
            return Err(warning);
        }
        match op.apply(self.store.as_ref()) {
            Ok(()) => Ok(()),
            Err(error) => {
                warn!(op = op.name(), session_id = op.session_id(), error = %error, "mirror write failed");
                let name = op.name();
                self.enqueue(op);
                Err(MirrorWarning { op: name, error })
            }
        }
    }

    /// Forget queued writes for a session that is being thrown away
    pub fn drop_session(&mut self, session_id: &str) -> usize {
        let before = self.outbox.len();
        self.outbox.retain(|op| op.session_id() != session_id);
        before - self.outbox.len()
    }
}
