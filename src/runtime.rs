use std::io::BufRead;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Local, TimeDelta};

use crate::command::Command;
use crate::tracker::ShotTracker;

/// Wall clock used by the tracker
pub trait TimeSource {
    fn now(&self) -> DateTime<Local>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// Hand-advanced clock for tests and replays. Clones share the same time.
#[derive(Debug, Clone)]
pub struct ManualTimeSource {
    now: Arc<Mutex<DateTime<Local>>>,
}

impl ManualTimeSource {
    pub fn new(start: DateTime<Local>) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    pub fn advance(&self, by: Duration) {
        if let Ok(mut now) = self.now.lock() {
            *now += TimeDelta::from_std(by).unwrap_or(TimeDelta::zero());
        }
    }
}

impl TimeSource for ManualTimeSource {
    fn now(&self) -> DateTime<Local> {
        match self.now.lock() {
            Ok(now) => *now,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

/// Unified event type consumed by the session loop
#[derive(Clone, Debug, PartialEq)]
pub enum CourtEvent {
    Command(Command),
    /// A line that did not parse; carries the message to show
    Invalid(String),
    /// The running session clock, formatted for display
    Tick(String),
    /// Input closed
    Closed,
}

impl CourtEvent {
    /// Blank lines yield nothing
    pub fn from_line(line: &str) -> Option<Self> {
        if line.trim().is_empty() {
            return None;
        }
        Some(match line.parse::<Command>() {
            Ok(cmd) => CourtEvent::Command(cmd),
            Err(err) => CourtEvent::Invalid(err.to_string()),
        })
    }
}

/// Source of coach input
pub trait CourtEventSource: Send + 'static {
    /// Block for up to `timeout` waiting for an event.
    fn recv_timeout(&self, timeout: Duration) -> Result<CourtEvent, RecvTimeoutError>;
}

/// Coach input delivered over a channel
pub struct ChannelEventSource {
    rx: Receiver<CourtEvent>,
}

impl ChannelEventSource {
    pub fn new(rx: Receiver<CourtEvent>) -> Self {
        Self { rx }
    }

    /// Reads commands line by line from stdin on a background thread
    pub fn stdin() -> Self {
        let (tx, rx) = mpsc::channel();

        std::thread::spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                let Ok(line) = line else { break };
                let Some(event) = CourtEvent::from_line(&line) else {
                    continue;
                };
                if tx.send(event).is_err() {
                    return;
                }
            }
            let _ = tx.send(CourtEvent::Closed);
        });

        Self { rx }
    }
}

impl CourtEventSource for ChannelEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<CourtEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// Waits on coach input and refreshes the session clock between commands
pub struct Runner<E: CourtEventSource> {
    event_source: E,
    tick: Duration,
}

impl<E: CourtEventSource> Runner<E> {
    /// `tick_ms` is the display refresh period; zero is treated as 1ms.
    pub fn new(event_source: E, tick_ms: u64) -> Self {
        Self {
            event_source,
            tick: Duration::from_millis(tick_ms.max(1)),
        }
    }

    pub fn tick(&self) -> Duration {
        self.tick
    }

    /// Next coach event. While the tracker's clock runs, a quiet tick period
    /// yields the clock reading; otherwise the runner keeps waiting for input.
    pub fn step<T: TimeSource>(&self, tracker: &ShotTracker<T>) -> CourtEvent {
        loop {
            match self.event_source.recv_timeout(self.tick) {
                Ok(ev) => return ev,
                Err(RecvTimeoutError::Timeout) => {
                    if let Some(clock) = tracker.display_clock() {
                        return CourtEvent::Tick(clock);
                    }
                }
                Err(RecvTimeoutError::Disconnected) => return CourtEvent::Closed,
            }
        }
    }
}
