use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// One of the five fixed half-court regions shots are bucketed into.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
    strum_macros::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Zone {
    LeftCorner,
    LeftWing,
    TopKey,
    RightWing,
    RightCorner,
}

impl Zone {
    /// Court order, left baseline to right baseline
    pub const ALL: [Zone; 5] = [
        Zone::LeftCorner,
        Zone::LeftWing,
        Zone::TopKey,
        Zone::RightWing,
        Zone::RightCorner,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Zone::LeftCorner => "Left Corner",
            Zone::LeftWing => "Left Wing",
            Zone::TopKey => "Top of Key",
            Zone::RightWing => "Right Wing",
            Zone::RightCorner => "Right Corner",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown zone '{0}' (expected one of left_corner, left_wing, top_key, right_wing, right_corner)")]
pub struct UnknownZone(pub String);

impl FromStr for Zone {
    type Err = UnknownZone;

    /// Accepts the canonical snake_case names plus the short forms typed
    /// at the session prompt (`lc`, `lw`, `tk`, `rw`, `rc`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "left_corner" | "lc" => Ok(Zone::LeftCorner),
            "left_wing" | "lw" => Ok(Zone::LeftWing),
            "top_key" | "tk" | "top" => Ok(Zone::TopKey),
            "right_wing" | "rw" => Ok(Zone::RightWing),
            "right_corner" | "rc" => Ok(Zone::RightCorner),
            _ => Err(UnknownZone(s.to_string())),
        }
    }
}
