use assert_matches::assert_matches;
use chrono::{DateTime, Local, TimeZone};
use courtside::report::{analytics_csv, audit_csv, ReportContext};
use courtside::stats::aggregate;
use courtside::{PlayerRef, Session, SessionError, SessionState, Zone, MAX_SHOTS};

fn at(ms: i64) -> DateTime<Local> {
    Local.timestamp_millis_opt(1_700_000_000_000 + ms).unwrap()
}

fn started() -> Session {
    let mut session = Session::new(PlayerRef::Player(1));
    session.start(at(0)).unwrap();
    session
}

#[test]
fn top_key_three_of_five() {
    let mut session = started();
    for (i, made) in [true, false, true, false, true].into_iter().enumerate() {
        session
            .record_shot(Zone::TopKey, made, at(1_000 * (i as i64 + 1)))
            .unwrap();
    }
    let stats = aggregate(session.shots());
    let top = stats.zone(Zone::TopKey);
    assert_eq!((top.made, top.attempts, top.percentage), (3, 5, 60));
    assert_eq!(
        (stats.overall.made, stats.overall.attempts, stats.overall.percentage),
        (3, 5, 60)
    );
}

#[test]
fn undo_then_immediate_reentry_keeps_cadence() {
    let mut session = started();
    let a = session.record_shot(Zone::LeftWing, true, at(5_000)).unwrap();
    assert_eq!(a.timer_value_ms, 5_000);
    session.undo_last(at(6_000)).unwrap();
    let b = session.record_shot(Zone::LeftWing, false, at(9_000)).unwrap();
    assert_eq!(b.time_taken_ms, a.time_taken_ms);
    assert_ne!(b.time_taken_ms, 9_000);
}

#[test]
fn pause_only_removes_the_paused_span() {
    let mut plain = started();
    let mut paused = started();
    paused.pause(at(3_000)).unwrap();
    paused.resume(at(7_000)).unwrap();
    let now = at(20_000);
    assert_eq!(plain.elapsed(now) - paused.elapsed(now), 4_000);
    plain.end(now).unwrap();
    paused.end(now).unwrap();
    assert_eq!(paused.clock().total_paused_ms, 4_000);
}

#[test]
fn cap_is_never_exceeded() {
    let mut session = started();
    let mut accepted = 0;
    for i in 0..(MAX_SHOTS + 20) {
        if session
            .record_shot(Zone::ALL[i % 5], i % 4 != 0, at(500 * (i as i64 + 1)))
            .is_ok()
        {
            accepted += 1;
        }
        assert!(session.shots().len() <= MAX_SHOTS);
    }
    assert_eq!(accepted, MAX_SHOTS);
    assert_eq!(session.state(), SessionState::Ended);
    let stats = aggregate(session.shots());
    let sum: u32 = stats.zones.iter().map(|(_, t)| t.attempts).sum();
    assert_eq!(sum, stats.overall.attempts);
    assert!(stats.overall.made <= stats.overall.attempts);
}

#[test]
fn paused_session_rejects_shots_and_second_pause() {
    let mut session = started();
    session.pause(at(1_000)).unwrap();
    assert_matches!(
        session.record_shot(Zone::TopKey, true, at(2_000)),
        Err(SessionError::InvalidTransition { .. })
    );
    assert_matches!(
        session.pause(at(2_000)),
        Err(SessionError::InvalidTransition { .. })
    );
    assert!(session.shots().is_empty());
    assert!(session.coach_actions().len() == 1);
}

#[test]
fn empty_session_save_end_and_report() {
    let mut session = started();
    assert_matches!(session.save(), Err(SessionError::InvalidTransition { .. }));
    session.end(at(3_000)).unwrap();

    let ctx = ReportContext::from_session(&session, at(3_000)).unwrap();
    assert_eq!(analytics_csv(&ctx).unwrap().lines().count(), 1);
    let audit = audit_csv(&ctx).unwrap();
    let rows: Vec<&str> = audit.lines().collect();
    assert_eq!(rows.len(), 3);
    assert!(rows[1].contains("session_start"));
    assert!(rows[2].contains("session_end"));

    assert!(session.save().is_ok());
}

#[test]
fn invalid_transition_message_names_state() {
    let mut session = Session::new(PlayerRef::Guest);
    let err = session.pause(at(0)).unwrap_err();
    assert_eq!(err.to_string(), "pause is not allowed while the session is idle");
}
