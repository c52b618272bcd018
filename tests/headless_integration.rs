use std::sync::mpsc;
use std::time::Duration;

use chrono::{Local, TimeZone};
use courtside::command::Command;
use courtside::runtime::{ChannelEventSource, CourtEvent, ManualTimeSource, Runner};
use courtside::{PlayerRef, SessionState, ShotTracker, Zone};

// Headless integration using the runtime + tracker without a terminal.
// Ticks advance the manual clock so timing is deterministic.
fn drive(events: Vec<CourtEvent>, time: &ManualTimeSource) -> ShotTracker<ManualTimeSource> {
    let mut tracker = ShotTracker::new(PlayerRef::Guest, time.clone(), None);
    tracker.start().unwrap();

    let (tx, rx) = mpsc::channel();
    for ev in events {
        tx.send(ev).unwrap();
    }
    drop(tx);

    let runner = Runner::new(ChannelEventSource::new(rx), 5);

    for _ in 0..1_000u32 {
        match runner.step(&tracker) {
            CourtEvent::Tick(_) => {}
            CourtEvent::Closed => break,
            CourtEvent::Invalid(_) => {}
            CourtEvent::Command(cmd) => {
                time.advance(Duration::from_secs(1));
                let _ = match cmd {
                    Command::Shot { zone, made } => tracker.record_shot(zone, made).map(|_| ()),
                    Command::Pause => tracker.pause(),
                    Command::Resume => tracker.resume(),
                    Command::Undo => tracker.undo_last().map(|_| ()),
                    Command::End => tracker.end().map(|_| ()),
                    Command::Save => tracker.save().map(|_| ()),
                    Command::Discard => tracker.discard(),
                    _ => Ok(()),
                };
            }
        }
    }
    tracker
}

fn clock() -> ManualTimeSource {
    ManualTimeSource::new(Local.timestamp_millis_opt(1_700_000_000_000).unwrap())
}

fn parsed(lines: &[&str]) -> Vec<CourtEvent> {
    lines.iter().filter_map(|l| CourtEvent::from_line(l)).collect()
}

#[test]
fn headless_session_flow_completes() {
    let time = clock();
    let tracker = drive(
        parsed(&[
            "make tk", "make tk", "make tk", "miss tk", "miss tk", "end", "save",
        ]),
        &time,
    );

    assert_eq!(tracker.state(), SessionState::Saved);
    let top = tracker.stats().zone(Zone::TopKey);
    assert_eq!((top.made, top.attempts, top.percentage), (3, 5, 60));
    assert_eq!(tracker.stats().overall.percentage, 60);
}

#[test]
fn headless_invalid_lines_are_ignored() {
    let time = clock();
    let tracker = drive(parsed(&["dunk", "make paint", "make rc"]), &time);
    assert_eq!(tracker.session().shots().len(), 1);
    assert_eq!(tracker.state(), SessionState::Active);
}

#[test]
fn headless_paused_shots_are_rejected() {
    let time = clock();
    let tracker = drive(parsed(&["make lw", "pause", "make lw", "resume", "miss lw"]), &time);
    let shots = tracker.session().shots();
    assert_eq!(shots.len(), 2);
    // one second per command; the two seconds between pause and resume don't count
    assert_eq!(shots[0].timer_value_ms, 1_000);
    assert_eq!(shots[1].timer_value_ms, 3_000);
    assert_eq!(shots[1].time_taken_ms, 2_000);
}

#[test]
fn headless_discard_returns_to_idle() {
    let time = clock();
    let tracker = drive(parsed(&["make lc", "discard"]), &time);
    assert_eq!(tracker.state(), SessionState::Idle);
    assert!(tracker.session().shots().is_empty());
}
