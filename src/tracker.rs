use crate::clock::format_clock;
use crate::error::{ReportError, SessionError};
use crate::mirror::{Mirror, MirrorOp};
use crate::report::{render, ReportContext, ReportMode};
use crate::runtime::{SystemTimeSource, TimeSource};
use crate::session::{PlayerRef, Session, SessionState, SessionSummary};
use crate::shot::ShotRecord;
use crate::stats::SessionStats;
use crate::zone::Zone;
use tracing::info;

/// Drives one player's sessions: the local model is updated first, then
/// the change is mirrored to the store without waiting on or reverting
/// for the outcome. Remote failures become warnings.
pub struct ShotTracker<T: TimeSource = SystemTimeSource> {
    session: Session,
    time: T,
    mirror: Option<Mirror>,
    warnings: Vec<String>,
}

impl<T: TimeSource> ShotTracker<T> {
    /// Guest sessions drop the mirror; nothing is persisted for them.
    pub fn new(player: PlayerRef, time: T, mirror: Option<Mirror>) -> Self {
        let mirror = if player.is_guest() { None } else { mirror };
        Self {
            session: Session::new(player),
            time,
            mirror,
            warnings: Vec::new(),
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    pub fn mirror(&self) -> Option<&Mirror> {
        self.mirror.as_ref()
    }

    pub fn take_warnings(&mut self) -> Vec<String> {
        std::mem::take(&mut self.warnings)
    }

    fn mirror_write(&mut self, op: MirrorOp) {
        if let Some(mirror) = self.mirror.as_mut() {
            if let Err(warning) = mirror.submit(op) {
                self.warnings.push(warning.to_string());
            }
        }
    }

    fn session_id(&self) -> String {
        self.session.session_id().unwrap_or_default().to_string()
    }

    pub fn start(&mut self) -> Result<String, SessionError> {
        let now = self.time.now();
        let session_id = self.session.start(now)?.to_string();
        if let Some(player_id) = self.session.player().id() {
            self.mirror_write(MirrorOp::CreateSession {
                session_id: session_id.clone(),
                player_id,
                started_at: now,
            });
        }
        Ok(session_id)
    }

    pub fn pause(&mut self) -> Result<(), SessionError> {
        let action = self.session.pause(self.time.now())?;
        let session_id = self.session_id();
        self.mirror_write(MirrorOp::AppendEvent { session_id, action });
        Ok(())
    }

    pub fn resume(&mut self) -> Result<(), SessionError> {
        let action = self.session.resume(self.time.now())?;
        let session_id = self.session_id();
        self.mirror_write(MirrorOp::AppendEvent { session_id, action });
        Ok(())
    }

    pub fn record_shot(&mut self, zone: Zone, made: bool) -> Result<ShotRecord, SessionError> {
        let shot = self.session.record_shot(zone, made, self.time.now())?;
        let session_id = self.session_id();
        self.mirror_write(MirrorOp::AppendShot {
            session_id,
            shot: shot.clone(),
        });
        if self.session.state() == SessionState::Ended {
            self.mirror_finalize();
        }
        Ok(shot)
    }

    /// `Ok(None)` when there was nothing to undo
    pub fn undo_last(&mut self) -> Result<Option<ShotRecord>, SessionError> {
        let Some(undone) = self.session.undo_last(self.time.now())? else {
            return Ok(None);
        };
        let session_id = self.session_id();
        self.mirror_write(MirrorOp::DeleteShot {
            session_id: session_id.clone(),
            sequence_number: undone.shot.sequence_number,
        });
        self.mirror_write(MirrorOp::AppendEvent {
            session_id,
            action: undone.action,
        });
        Ok(Some(undone.shot))
    }

    pub fn end(&mut self) -> Result<u64, SessionError> {
        let elapsed = self.session.end(self.time.now())?;
        self.mirror_finalize();
        Ok(elapsed)
    }

    fn mirror_finalize(&mut self) {
        if let Some(ended_at) = self.session.ended_at() {
            let op = MirrorOp::FinalizeSession {
                session_id: self.session_id(),
                ended_at,
                elapsed_ms: self.session.elapsed(ended_at),
            };
            self.mirror_write(op);
        }
    }

    /// Local discard always succeeds; the remote delete is best effort.
    pub fn discard(&mut self) -> Result<(), SessionError> {
        let Some(session_id) = self.session.discard()? else {
            return Ok(());
        };
        if let Some(mirror) = self.mirror.as_mut() {
            let dropped = mirror.drop_session(&session_id);
            if dropped > 0 {
                info!(session_id = %session_id, dropped, "dropped unsent writes for discarded session");
            }
        }
        self.mirror_write(MirrorOp::DeleteSession { session_id });
        Ok(())
    }

    /// Saved locally even when pending remote writes cannot be flushed.
    pub fn save(&mut self) -> Result<SessionSummary, SessionError> {
        let summary = self.session.save()?;
        if let Some(mirror) = self.mirror.as_mut() {
            if let Err(warning) = mirror.flush() {
                self.warnings.push(warning.to_string());
            }
        }
        info!(
            session_id = %summary.session_id,
            attempts = summary.stats.overall.attempts,
            made = summary.stats.overall.made,
            "session saved"
        );
        Ok(summary)
    }

    /// Replace a saved session with a fresh idle one for the same player
    pub fn next_session(&mut self) {
        self.session = Session::new(self.session.player());
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.session.elapsed(self.time.now())
    }

    /// The display timer only runs while the session is active
    pub fn timer_running(&self) -> bool {
        self.session.state() == SessionState::Active
    }

    pub fn display_clock(&self) -> Option<String> {
        self.timer_running()
            .then(|| format_clock(self.elapsed_ms()))
    }

    pub fn stats(&self) -> SessionStats {
        self.session.stats()
    }

    /// `None` before the session has started
    pub fn report(&self, mode: ReportMode) -> Result<Option<String>, ReportError> {
        ReportContext::from_session(&self.session, self.time.now())
            .map(|ctx| render(&ctx, mode))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::runtime::ManualTimeSource;
    use crate::shot::CoachAction;
    use crate::store::{NewPlayer, SessionRecord, SessionStore, SqliteStore, StoredSession, Player};
    use assert_matches::assert_matches;
    use chrono::{DateTime, Local, NaiveDate, TimeZone};
    use std::time::Duration;

    /// Every write fails, as if the database were unreachable
    struct OfflineStore;

    fn offline() -> StoreError {
        StoreError::NotFound {
            what: "connection",
            key: "offline".into(),
        }
    }

    impl SessionStore for OfflineStore {
        fn create_player(&self, _: &NewPlayer) -> Result<Player, StoreError> {
            Err(offline())
        }
        fn find_player(&self, _: &str) -> Result<Option<Player>, StoreError> {
            Err(offline())
        }
        fn list_players(&self, _: bool) -> Result<Vec<Player>, StoreError> {
            Err(offline())
        }
        fn set_player_active(&self, _: i64, _: bool) -> Result<(), StoreError> {
            Err(offline())
        }
        fn create_session(&self, _: &str, _: i64, _: DateTime<Local>) -> Result<(), StoreError> {
            Err(offline())
        }
        fn append_shot(&self, _: &str, _: &ShotRecord) -> Result<(), StoreError> {
            Err(offline())
        }
        fn delete_shot(&self, _: &str, _: u64) -> Result<(), StoreError> {
            Err(offline())
        }
        fn append_event(&self, _: &str, _: &CoachAction) -> Result<(), StoreError> {
            Err(offline())
        }
        fn finalize_session(&self, _: &str, _: DateTime<Local>, _: u64) -> Result<(), StoreError> {
            Err(offline())
        }
        fn delete_session(&self, _: &str) -> Result<(), StoreError> {
            Err(offline())
        }
        fn sessions_for_player(
            &self,
            _: i64,
            _: Option<NaiveDate>,
            _: Option<NaiveDate>,
        ) -> Result<Vec<SessionRecord>, StoreError> {
            Err(offline())
        }
        fn load_session(&self, _: &str) -> Result<StoredSession, StoreError> {
            Err(offline())
        }
    }

    fn clock() -> ManualTimeSource {
        ManualTimeSource::new(Local.timestamp_millis_opt(1_700_000_000_000).unwrap())
    }

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    fn sqlite_tracker(time: ManualTimeSource) -> ShotTracker<ManualTimeSource> {
        let store = SqliteStore::open_in_memory().unwrap();
        let player = store
            .create_player(&NewPlayer {
                name: "Jane".into(),
                ..NewPlayer::default()
            })
            .unwrap();
        ShotTracker::new(
            PlayerRef::Player(player.id),
            time,
            Some(Mirror::new(Box::new(store))),
        )
    }

    #[test]
    fn test_mirror_follows_local_log() {
        let time = clock();
        let mut tracker = sqlite_tracker(time.clone());
        let id = tracker.start().unwrap();
        time.advance(secs(2));
        tracker.record_shot(Zone::TopKey, true).unwrap();
        time.advance(secs(3));
        tracker.record_shot(Zone::TopKey, false).unwrap();
        time.advance(secs(1));
        tracker.undo_last().unwrap();
        tracker.pause().unwrap();
        time.advance(secs(10));
        tracker.resume().unwrap();
        tracker.end().unwrap();
        assert!(tracker.take_warnings().is_empty());

        let stored = tracker.mirror().unwrap().store().load_session(&id).unwrap();
        assert_eq!(stored.shots.len(), 1);
        assert_eq!(stored.coach_actions.len(), 3);
        assert_eq!(stored.elapsed_ms, Some(6_000));
    }

    #[test]
    fn test_remote_failure_never_blocks_local_state() {
        let time = clock();
        let mut tracker = ShotTracker::new(
            PlayerRef::Player(1),
            time.clone(),
            Some(Mirror::new(Box::new(OfflineStore))),
        );
        tracker.start().unwrap();
        time.advance(secs(1));
        tracker.record_shot(Zone::LeftWing, true).unwrap();
        tracker.end().unwrap();
        let summary = tracker.save().unwrap();

        assert_eq!(summary.stats.overall.made, 1);
        assert_eq!(tracker.state(), SessionState::Saved);
        let warnings = tracker.take_warnings();
        assert!(!warnings.is_empty());
        assert!(warnings[0].contains("will retry"));
        assert_eq!(tracker.mirror().unwrap().pending(), 3);
    }

    #[test]
    fn test_discard_drops_queued_writes_and_deletes_remote() {
        let time = clock();
        let mut tracker = ShotTracker::new(
            PlayerRef::Player(1),
            time.clone(),
            Some(Mirror::new(Box::new(OfflineStore))),
        );
        tracker.start().unwrap();
        tracker.record_shot(Zone::LeftWing, true).unwrap();
        assert_eq!(tracker.mirror().unwrap().pending(), 2);
        tracker.discard().unwrap();
        assert_eq!(tracker.state(), SessionState::Idle);
        // only the delete itself is left waiting
        assert_eq!(tracker.mirror().unwrap().pending(), 1);
    }

    #[test]
    fn test_discard_removes_mirrored_rows() {
        let time = clock();
        let mut tracker = sqlite_tracker(time.clone());
        let id = tracker.start().unwrap();
        tracker.record_shot(Zone::RightCorner, true).unwrap();
        tracker.discard().unwrap();
        assert_matches!(
            tracker.mirror().unwrap().store().load_session(&id),
            Err(StoreError::NotFound { .. })
        );
    }

    #[test]
    fn test_discard_after_end_removes_finalized_rows() {
        let time = clock();
        let mut tracker = sqlite_tracker(time.clone());
        let id = tracker.start().unwrap();
        time.advance(secs(2));
        tracker.record_shot(Zone::LeftCorner, true).unwrap();
        tracker.pause().unwrap();
        tracker.end().unwrap();
        let stored = tracker.mirror().unwrap().store().load_session(&id).unwrap();
        assert_eq!(stored.elapsed_ms, Some(2_000));

        tracker.discard().unwrap();
        assert_eq!(tracker.state(), SessionState::Idle);
        assert!(tracker.session().shots().is_empty());
        assert!(tracker.session().coach_actions().is_empty());
        assert!(tracker.take_warnings().is_empty());
        assert_eq!(tracker.mirror().unwrap().pending(), 0);
        assert_matches!(
            tracker.mirror().unwrap().store().load_session(&id),
            Err(StoreError::NotFound { .. })
        );
    }

    #[test]
    fn test_guest_sessions_are_not_mirrored() {
        let tracker = ShotTracker::new(
            PlayerRef::Guest,
            clock(),
            Some(Mirror::new(Box::new(OfflineStore))),
        );
        assert!(tracker.mirror().is_none());
    }

    #[test]
    fn test_display_clock_only_while_active() {
        let time = clock();
        let mut tracker = ShotTracker::new(PlayerRef::Guest, time.clone(), None);
        assert_eq!(tracker.display_clock(), None);
        tracker.start().unwrap();
        time.advance(Duration::from_millis(65_900));
        assert_eq!(tracker.display_clock().as_deref(), Some("01:05"));
        tracker.pause().unwrap();
        assert!(!tracker.timer_running());
        assert_eq!(tracker.display_clock(), None);
        time.advance(secs(30));
        tracker.resume().unwrap();
        assert_eq!(tracker.display_clock().as_deref(), Some("01:05"));
    }

    #[test]
    fn test_cap_reached_finalizes_remote() {
        let time = clock();
        let mut tracker = sqlite_tracker(time.clone());
        let id = tracker.start().unwrap();
        for i in 0..crate::session::MAX_SHOTS {
            time.advance(secs(2));
            tracker.record_shot(Zone::ALL[i % 5], true).unwrap();
        }
        assert_eq!(tracker.state(), SessionState::Ended);
        let stored = tracker.mirror().unwrap().store().load_session(&id).unwrap();
        assert_eq!(stored.shots.len(), crate::session::MAX_SHOTS);
        assert_eq!(stored.elapsed_ms, Some(200_000));
    }

    #[test]
    fn test_report_before_start_is_none() {
        let tracker = ShotTracker::new(PlayerRef::Guest, clock(), None);
        assert!(tracker.report(ReportMode::Audit).unwrap().is_none());
    }

    #[test]
    fn test_next_session_after_save() {
        let mut tracker = ShotTracker::new(PlayerRef::Guest, clock(), None);
        tracker.start().unwrap();
        tracker.end().unwrap();
        tracker.save().unwrap();
        assert!(tracker.start().is_err());
        tracker.next_session();
        assert!(tracker.start().is_ok());
    }
}
