/// Elapsed active time across pause/resume cycles, in epoch milliseconds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionClock {
    pub started_at_ms: i64,
    pub total_paused_ms: u64,
    pub paused_at_ms: Option<i64>,
    frozen_ms: Option<u64>,
}

impl SessionClock {
    pub fn start(now_ms: i64) -> Self {
        Self {
            started_at_ms: now_ms,
            ..Self::default()
        }
    }

    /// Active time at `now_ms`. While paused the reading holds at the pause
    /// point; once frozen it never moves again.
    pub fn elapsed(&self, now_ms: i64) -> u64 {
        if let Some(frozen) = self.frozen_ms {
            return frozen;
        }
        let until = self.paused_at_ms.unwrap_or(now_ms);
        let raw = until.saturating_sub(self.started_at_ms).max(0) as u64;
        raw.saturating_sub(self.total_paused_ms)
    }

    pub fn pause(&mut self, now_ms: i64) {
        if self.paused_at_ms.is_none() {
            self.paused_at_ms = Some(now_ms);
        }
    }

    pub fn resume(&mut self, now_ms: i64) {
        if let Some(paused_at) = self.paused_at_ms.take() {
            self.total_paused_ms += now_ms.saturating_sub(paused_at).max(0) as u64;
        }
    }

    pub fn freeze(&mut self, now_ms: i64) -> u64 {
        let elapsed = self.elapsed(now_ms);
        self.frozen_ms = Some(elapsed);
        elapsed
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen_ms.is_some()
    }
}

/// `MM:SS`, truncating to whole seconds
pub fn format_clock(ms: u64) -> String {
    let secs = ms / 1000;
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elapsed_counts_from_start() {
        let clock = SessionClock::start(10_000);
        assert_eq!(clock.elapsed(10_000), 0);
        assert_eq!(clock.elapsed(12_500), 2_500);
    }

    #[test]
    fn pause_excludes_paused_span() {
        let mut clock = SessionClock::start(0);
        clock.pause(4_000);
        assert_eq!(clock.elapsed(9_000), 4_000);
        clock.resume(9_000);
        assert_eq!(clock.total_paused_ms, 5_000);
        assert_eq!(clock.elapsed(10_000), 5_000);
    }

    #[test]
    fn multiple_pause_cycles_accumulate() {
        let mut clock = SessionClock::start(0);
        clock.pause(1_000);
        clock.resume(2_000);
        clock.pause(3_000);
        clock.resume(6_000);
        assert_eq!(clock.total_paused_ms, 4_000);
        assert_eq!(clock.elapsed(7_000), 3_000);
    }

    #[test]
    fn frozen_clock_stops() {
        let mut clock = SessionClock::start(0);
        assert_eq!(clock.freeze(8_000), 8_000);
        assert!(clock.is_frozen());
        assert_eq!(clock.elapsed(60_000), 8_000);
    }

    #[test]
    fn format_clock_floors() {
        assert_eq!(format_clock(0), "00:00");
        assert_eq!(format_clock(999), "00:00");
        assert_eq!(format_clock(59_999), "00:59");
        assert_eq!(format_clock(61_000), "01:01");
        assert_eq!(format_clock(600_500), "10:00");
    }

    #[test]
    fn clock_before_start_reads_zero() {
        let clock = SessionClock::start(5_000);
        assert_eq!(clock.elapsed(1_000), 0);
    }
}
