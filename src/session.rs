use crate::clock::SessionClock;
use crate::error::SessionError;
use crate::shot::{CoachAction, CoachActionKind, ShotRecord};
use crate::stats::{aggregate, SessionStats};
use crate::undo::UndoCache;
use crate::zone::Zone;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info};
use uuid::Uuid;

/// Hard cap on shots per session; reaching it ends the session.
pub const MAX_SHOTS: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum_macros::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SessionState {
    Idle,
    Active,
    Paused,
    Ended,
    Saved,
}

/// Who is shooting. Guest sessions are never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerRef {
    Guest,
    Player(i64),
}

impl PlayerRef {
    pub fn is_guest(&self) -> bool {
        matches!(self, PlayerRef::Guest)
    }

    pub fn id(&self) -> Option<i64> {
        match self {
            PlayerRef::Guest => None,
            PlayerRef::Player(id) => Some(*id),
        }
    }
}

impl fmt::Display for PlayerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlayerRef::Guest => write!(f, "guest"),
            PlayerRef::Player(id) => write!(f, "{id}"),
        }
    }
}

/// Shot removed by an undo, with the coach action logged for it
#[derive(Debug, Clone, PartialEq)]
pub struct Undone {
    pub shot: ShotRecord,
    pub action: CoachAction,
}

/// Final figures handed over at save time
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub player: PlayerRef,
    pub started_at: DateTime<Local>,
    pub ended_at: DateTime<Local>,
    pub elapsed_ms: u64,
    pub stats: SessionStats,
}

/// One timed shooting test for one player.
///
/// Owns the shot log and the coach action log. Every mutation goes through
/// the lifecycle methods below, which reject calls from states that do not
/// permit them and leave the session untouched when they do.
#[derive(Debug, Clone)]
pub struct Session {
    player: PlayerRef,
    session_id: Option<String>,
    state: SessionState,
    clock: SessionClock,
    started_at: Option<DateTime<Local>>,
    ended_at: Option<DateTime<Local>>,
    shots: Vec<ShotRecord>,
    coach_actions: Vec<CoachAction>,
    undo: UndoCache,
    next_sequence: u64,
}

impl Session {
    pub fn new(player: PlayerRef) -> Self {
        Self {
            player,
            session_id: None,
            state: SessionState::Idle,
            clock: SessionClock::default(),
            started_at: None,
            ended_at: None,
            shots: Vec::new(),
            coach_actions: Vec::new(),
            undo: UndoCache::default(),
            next_sequence: 1,
        }
    }

    pub fn player(&self) -> PlayerRef {
        self.player
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn shots(&self) -> &[ShotRecord] {
        &self.shots
    }

    pub fn coach_actions(&self) -> &[CoachAction] {
        &self.coach_actions
    }

    pub fn clock(&self) -> &SessionClock {
        &self.clock
    }

    pub fn started_at(&self) -> Option<DateTime<Local>> {
        self.started_at
    }

    pub fn ended_at(&self) -> Option<DateTime<Local>> {
        self.ended_at
    }

    pub fn pending_undo_ms(&self) -> Option<u64> {
        self.undo.peek()
    }

    pub fn elapsed(&self, now: DateTime<Local>) -> u64 {
        match self.state {
            SessionState::Idle => 0,
            _ => self.clock.elapsed(now.timestamp_millis()),
        }
    }

    pub fn stats(&self) -> SessionStats {
        aggregate(&self.shots)
    }

    fn expect_state(&self, op: &'static str, allowed: &[SessionState]) -> Result<(), SessionError> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(SessionError::InvalidTransition {
                op,
                state: self.state,
            })
        }
    }

    fn transition(&mut self, to: SessionState) {
        debug!(from = %self.state, to = %to, "session transition");
        self.state = to;
    }

    fn take_sequence(&mut self) -> u64 {
        let seq = self.next_sequence;
        self.next_sequence += 1;
        seq
    }

    fn log_action(&mut self, kind: CoachActionKind, now: DateTime<Local>) -> CoachAction {
        let action = CoachAction {
            kind,
            timestamp: now,
            session_elapsed_ms: self.clock.elapsed(now.timestamp_millis()),
            sequence_number: self.take_sequence(),
        };
        self.coach_actions.push(action.clone());
        action
    }

    /// Begin a new session and assign its identifier.
    pub fn start(&mut self, now: DateTime<Local>) -> Result<&str, SessionError> {
        self.expect_state("start", &[SessionState::Idle])?;
        let player = self.player;
        *self = Self::new(player);
        self.clock = SessionClock::start(now.timestamp_millis());
        self.started_at = Some(now);
        self.transition(SessionState::Active);
        let id = self.session_id.insert(Uuid::new_v4().to_string());
        info!(session_id = %id, player = %player, "session started");
        Ok(id.as_str())
    }

    pub fn pause(&mut self, now: DateTime<Local>) -> Result<CoachAction, SessionError> {
        self.expect_state("pause", &[SessionState::Active])?;
        self.clock.pause(now.timestamp_millis());
        let action = self.log_action(CoachActionKind::Pause, now);
        self.transition(SessionState::Paused);
        Ok(action)
    }

    pub fn resume(&mut self, now: DateTime<Local>) -> Result<CoachAction, SessionError> {
        self.expect_state("resume", &[SessionState::Paused])?;
        self.clock.resume(now.timestamp_millis());
        let action = self.log_action(CoachActionKind::Resume, now);
        self.transition(SessionState::Active);
        Ok(action)
    }

    /// Append a shot. The shot that fills the log ends the session.
    pub fn record_shot(
        &mut self,
        zone: Zone,
        made: bool,
        now: DateTime<Local>,
    ) -> Result<ShotRecord, SessionError> {
        if self.shots.len() >= MAX_SHOTS {
            return Err(SessionError::CapacityExceeded { cap: MAX_SHOTS });
        }
        self.expect_state("record shot", &[SessionState::Active])?;

        let previous = self.shots.last().map_or(0, |s| s.timer_value_ms);
        let timer_value_ms = self.clock.elapsed(now.timestamp_millis()).max(previous);
        let time_taken_ms = self
            .undo
            .take()
            .unwrap_or(timer_value_ms - previous);

        let shot = ShotRecord {
            zone,
            made,
            timestamp: now,
            timer_value_ms,
            time_taken_ms,
            sequence_number: self.take_sequence(),
        };
        self.shots.push(shot.clone());
        debug!(zone = %zone, made, seq = shot.sequence_number, "shot recorded");

        if self.shots.len() == MAX_SHOTS {
            info!(cap = MAX_SHOTS, "shot cap reached, ending session");
            self.finish(now);
        }
        Ok(shot)
    }

    fn finish(&mut self, now: DateTime<Local>) -> u64 {
        let elapsed = self.clock.freeze(now.timestamp_millis());
        self.ended_at = Some(now);
        self.undo.clear();
        self.transition(SessionState::Ended);
        elapsed
    }

    /// Stop the clock. Returns the final active time.
    pub fn end(&mut self, now: DateTime<Local>) -> Result<u64, SessionError> {
        self.expect_state("end", &[SessionState::Active, SessionState::Paused])?;
        Ok(self.finish(now))
    }

    /// Remove the most recent shot. `Ok(None)` when there is nothing to undo.
    pub fn undo_last(&mut self, now: DateTime<Local>) -> Result<Option<Undone>, SessionError> {
        self.expect_state("undo", &[SessionState::Active, SessionState::Paused])?;
        let Some(shot) = self.shots.pop() else {
            return Ok(None);
        };
        self.undo.remember(shot.time_taken_ms);
        let action = self.log_action(
            CoachActionKind::Undo {
                zone: shot.zone,
                made: shot.made,
            },
            now,
        );
        Ok(Some(Undone { shot, action }))
    }

    /// Drop everything and return to Idle. Returns the identifier the
    /// discarded session had, so mirrored data can be deleted.
    pub fn discard(&mut self) -> Result<Option<String>, SessionError> {
        if self.state == SessionState::Idle {
            return Err(SessionError::InvalidTransition {
                op: "discard",
                state: self.state,
            });
        }
        let session_id = self.session_id.take();
        info!(session_id = ?session_id, "session discarded");
        *self = Self::new(self.player);
        Ok(session_id)
    }

    pub fn save(&mut self) -> Result<SessionSummary, SessionError> {
        self.expect_state("save", &[SessionState::Ended])?;
        let (Some(session_id), Some(started_at), Some(ended_at)) =
            (self.session_id.clone(), self.started_at, self.ended_at)
        else {
            return Err(SessionError::InvalidTransition {
                op: "save",
                state: self.state,
            });
        };
        let summary = SessionSummary {
            session_id,
            player: self.player,
            started_at,
            ended_at,
            elapsed_ms: self.clock.elapsed(ended_at.timestamp_millis()),
            stats: self.stats(),
        };
        self.transition(SessionState::Saved);
        Ok(summary)
    }
}
