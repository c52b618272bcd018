use crate::shot::ShotRecord;
use crate::zone::Zone;
use itertools::{Itertools, MinMaxResult};
use serde::Serialize;

/// Dwell credited to a zone with a single shot
pub const SINGLE_SHOT_ZONE_MS: u64 = 5_000;
/// Added to the first-to-last span of a zone
pub const ZONE_BUFFER_MS: u64 = 3_000;

/// Make/attempt counts with the derived field-goal percentage
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Tally {
    pub attempts: u32,
    pub made: u32,
    pub percentage: u32,
}

impl Tally {
    fn from_counts(attempts: u32, made: u32) -> Self {
        Self {
            attempts,
            made,
            percentage: percentage(made, attempts),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    /// Always all five zones, in court order
    pub zones: Vec<(Zone, Tally)>,
    pub overall: Tally,
}

impl SessionStats {
    pub fn zone(&self, zone: Zone) -> Tally {
        self.zones
            .iter()
            .find(|(z, _)| *z == zone)
            .map(|(_, t)| *t)
            .unwrap_or_default()
    }
}

/// FG% rounded half up; 0 when nothing was attempted.
pub fn percentage(made: u32, attempts: u32) -> u32 {
    if attempts == 0 {
        return 0;
    }
    let (made, attempts) = (u64::from(made), u64::from(attempts));
    ((200 * made + attempts) / (2 * attempts)) as u32
}

/// Recomputed from scratch on every call.
pub fn aggregate(shots: &[ShotRecord]) -> SessionStats {
    let zones: Vec<(Zone, Tally)> = Zone::ALL
        .iter()
        .map(|&zone| {
            let (attempts, made) = shots
                .iter()
                .filter(|s| s.zone == zone)
                .fold((0u32, 0u32), |(a, m), s| (a + 1, m + u32::from(s.made)));
            (zone, Tally::from_counts(attempts, made))
        })
        .collect();

    let attempts = zones.iter().map(|(_, t)| t.attempts).sum();
    let made = zones.iter().map(|(_, t)| t.made).sum();

    SessionStats {
        zones,
        overall: Tally::from_counts(attempts, made),
    }
}

/// Approximate time spent in a zone: first-to-last shot span plus a
/// buffer, never under five seconds. A lone shot counts five seconds.
pub fn time_in_zone_ms(shots: &[ShotRecord], zone: Zone) -> u64 {
    match shots
        .iter()
        .filter(|s| s.zone == zone)
        .map(|s| s.timer_value_ms)
        .minmax()
    {
        MinMaxResult::NoElements => 0,
        MinMaxResult::OneElement(_) => SINGLE_SHOT_ZONE_MS,
        MinMaxResult::MinMax(first, last) => {
            SINGLE_SHOT_ZONE_MS.max(last - first + ZONE_BUFFER_MS)
        }
    }
}

pub fn time_by_zone(shots: &[ShotRecord]) -> Vec<(Zone, u64)> {
    Zone::ALL
        .iter()
        .map(|&zone| (zone, time_in_zone_ms(shots, zone)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Local;

    fn shot(zone: Zone, made: bool, timer_value_ms: u64) -> ShotRecord {
        ShotRecord {
            zone,
            made,
            timestamp: Local::now(),
            timer_value_ms,
            time_taken_ms: 0,
            sequence_number: 0,
        }
    }

    #[test]
    fn test_percentage_rounds_half_up() {
        assert_eq!(percentage(0, 0), 0);
        assert_eq!(percentage(3, 5), 60);
        assert_eq!(percentage(1, 3), 33);
        assert_eq!(percentage(2, 3), 67);
        assert_eq!(percentage(1, 8), 13); // 12.5
        assert_eq!(percentage(5, 5), 100);
    }

    #[test]
    fn test_top_key_scenario() {
        let shots: Vec<ShotRecord> = [true, true, true, false, false]
            .iter()
            .enumerate()
            .map(|(i, &made)| shot(Zone::TopKey, made, i as u64 * 1_000))
            .collect();
        let stats = aggregate(&shots);
        let expected = Tally {
            attempts: 5,
            made: 3,
            percentage: 60,
        };
        assert_eq!(stats.zone(Zone::TopKey), expected);
        assert_eq!(stats.overall, expected);
        assert_eq!(stats.zone(Zone::LeftCorner), Tally::default());
    }

    #[test]
    fn test_empty_log() {
        let stats = aggregate(&[]);
        assert_eq!(stats.zones.len(), 5);
        assert_eq!(stats.overall, Tally::default());
    }

    #[test]
    fn test_zone_sums_match_overall() {
        let shots: Vec<ShotRecord> = (0..37)
            .map(|i| shot(Zone::ALL[i % 5], i % 3 == 0, i as u64 * 700))
            .collect();
        let stats = aggregate(&shots);
        let zone_attempts: u32 = stats.zones.iter().map(|(_, t)| t.attempts).sum();
        assert_eq!(zone_attempts, stats.overall.attempts);
        assert_eq!(stats.overall.attempts, 37);
        assert!(stats.overall.made <= stats.overall.attempts);
    }

    #[test]
    fn test_time_in_zone() {
        let shots = vec![
            shot(Zone::LeftWing, true, 10_000),
            shot(Zone::TopKey, true, 12_000),
            shot(Zone::TopKey, false, 13_000),
            shot(Zone::RightWing, false, 20_000),
            shot(Zone::RightWing, true, 40_000),
            shot(Zone::RightWing, true, 30_000),
        ];
        assert_eq!(time_in_zone_ms(&shots, Zone::LeftCorner), 0);
        assert_eq!(time_in_zone_ms(&shots, Zone::LeftWing), 5_000);
        // 1s span + 3s buffer is under the floor
        assert_eq!(time_in_zone_ms(&shots, Zone::TopKey), 5_000);
        assert_eq!(time_in_zone_ms(&shots, Zone::RightWing), 23_000);
    }

    #[test]
    fn test_time_by_zone_covers_all_zones() {
        let by_zone = time_by_zone(&[shot(Zone::RightCorner, true, 1)]);
        assert_eq!(by_zone.len(), 5);
        assert_eq!(by_zone[4], (Zone::RightCorner, 5_000));
        assert_eq!(by_zone[0], (Zone::LeftCorner, 0));
    }
}
