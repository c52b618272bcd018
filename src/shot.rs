use crate::zone::Zone;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum_macros::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ShotResult {
    Made,
    Missed,
}

impl ShotResult {
    pub fn is_made(self) -> bool {
        self == ShotResult::Made
    }
}

impl From<bool> for ShotResult {
    fn from(made: bool) -> Self {
        if made {
            ShotResult::Made
        } else {
            ShotResult::Missed
        }
    }
}

/// One recorded attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShotRecord {
    pub zone: Zone,
    pub made: bool,
    pub timestamp: DateTime<Local>,
    /// Active session time when the shot was captured
    pub timer_value_ms: u64,
    /// Gap since the previous shot, or the cached gap after an undo
    pub time_taken_ms: u64,
    pub sequence_number: u64,
}

impl ShotRecord {
    pub fn result(&self) -> ShotResult {
        ShotResult::from(self.made)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum_macros::Display)]
#[serde(rename_all = "snake_case", tag = "type")]
#[strum(serialize_all = "snake_case")]
pub enum CoachActionKind {
    Pause,
    Resume,
    Undo { zone: Zone, made: bool },
}

/// Lifecycle or correction event. Exported for audit, never counted in stats.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoachAction {
    pub kind: CoachActionKind,
    pub timestamp: DateTime<Local>,
    pub session_elapsed_ms: u64,
    pub sequence_number: u64,
}
