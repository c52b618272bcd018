use crate::error::ReportError;
use crate::session::Session;
use crate::shot::{CoachAction, CoachActionKind, ShotRecord, ShotResult};
use chrono::{DateTime, Local};
use itertools::Itertools;
use std::fs;
use std::path::{Path, PathBuf};

pub const ANALYTICS_HEADER: [&str; 7] = [
    "player_id",
    "session_id",
    "result",
    "zone_id",
    "time_taken_ms",
    "timestamp",
    "sequence_number",
];

pub const AUDIT_HEADER: [&str; 10] = [
    "player_id",
    "session_id",
    "sequence_number",
    "action_type",
    "action",
    "zone_id",
    "result",
    "time_taken_ms",
    "session_elapsed_ms",
    "timestamp",
];

#[derive(Debug, Copy, Clone, PartialEq, Eq, strum_macros::Display)]
#[strum(serialize_all = "lowercase")]
pub enum ReportMode {
    /// one row per shot
    Analytics,
    /// shots interleaved with coach actions
    Audit,
}

/// Everything a report needs, whether it comes from a live session or the store
#[derive(Debug, Clone)]
pub struct ReportContext<'a> {
    pub player_id: String,
    pub session_id: &'a str,
    pub started_at: DateTime<Local>,
    pub ended_at: DateTime<Local>,
    pub elapsed_ms: u64,
    pub shots: &'a [ShotRecord],
    pub coach_actions: &'a [CoachAction],
}

impl<'a> ReportContext<'a> {
    /// `None` for a session that was never started. A session still running
    /// is reported as if it ended at `now`.
    pub fn from_session(session: &'a Session, now: DateTime<Local>) -> Option<Self> {
        Some(Self {
            player_id: session.player().to_string(),
            session_id: session.session_id()?,
            started_at: session.started_at()?,
            ended_at: session.ended_at().unwrap_or(now),
            elapsed_ms: session.elapsed(now),
            shots: session.shots(),
            coach_actions: session.coach_actions(),
        })
    }
}

pub fn render(ctx: &ReportContext<'_>, mode: ReportMode) -> Result<String, ReportError> {
    match mode {
        ReportMode::Analytics => analytics_csv(ctx),
        ReportMode::Audit => audit_csv(ctx),
    }
}

fn finish(wtr: csv::Writer<Vec<u8>>) -> Result<String, ReportError> {
    let bytes = wtr.into_inner().map_err(|e| e.into_error())?;
    Ok(String::from_utf8(bytes)?)
}

pub fn analytics_csv(ctx: &ReportContext<'_>) -> Result<String, ReportError> {
    let mut wtr = csv::Writer::from_writer(Vec::new());
    wtr.write_record(ANALYTICS_HEADER)?;
    for shot in ctx.shots {
        wtr.write_record([
            ctx.player_id.clone(),
            ctx.session_id.to_string(),
            shot.result().to_string(),
            shot.zone.to_string(),
            shot.time_taken_ms.to_string(),
            shot.timestamp.to_rfc3339(),
            shot.sequence_number.to_string(),
        ])?;
    }
    finish(wtr)
}

enum AuditRow<'r> {
    Shot(&'r ShotRecord),
    Coach(&'r CoachAction),
}

impl AuditRow<'_> {
    fn sequence(&self) -> u64 {
        match self {
            AuditRow::Shot(s) => s.sequence_number,
            AuditRow::Coach(a) => a.sequence_number,
        }
    }
}

pub fn audit_csv(ctx: &ReportContext<'_>) -> Result<String, ReportError> {
    let mut wtr = csv::Writer::from_writer(Vec::new());
    wtr.write_record(AUDIT_HEADER)?;

    let coach_row = |seq: u64, action: &str, zone: String, result: String, elapsed: u64, at: DateTime<Local>| {
        [
            ctx.player_id.clone(),
            ctx.session_id.to_string(),
            seq.to_string(),
            "coach".to_string(),
            action.to_string(),
            zone,
            result,
            String::new(),
            elapsed.to_string(),
            at.to_rfc3339(),
        ]
    };

    wtr.write_record(coach_row(0, "session_start", String::new(), String::new(), 0, ctx.started_at))?;

    let rows = ctx
        .shots
        .iter()
        .map(AuditRow::Shot)
        .chain(ctx.coach_actions.iter().map(AuditRow::Coach))
        .sorted_by_key(AuditRow::sequence)
        .collect::<Vec<_>>();

    for row in &rows {
        let record = match row {
            AuditRow::Shot(shot) => [
                ctx.player_id.clone(),
                ctx.session_id.to_string(),
                shot.sequence_number.to_string(),
                "player".to_string(),
                "shot".to_string(),
                shot.zone.to_string(),
                shot.result().to_string(),
                shot.time_taken_ms.to_string(),
                shot.timer_value_ms.to_string(),
                shot.timestamp.to_rfc3339(),
            ],
            AuditRow::Coach(action) => {
                let (zone, result) = match action.kind {
                    CoachActionKind::Undo { zone, made } => {
                        (zone.to_string(), ShotResult::from(made).to_string())
                    }
                    _ => (String::new(), String::new()),
                };
                coach_row(
                    action.sequence_number,
                    &action.kind.to_string(),
                    zone,
                    result,
                    action.session_elapsed_ms,
                    action.timestamp,
                )
            }
        };
        wtr.write_record(record)?;
    }

    let end_seq = rows.last().map_or(0, AuditRow::sequence) + 1;
    wtr.write_record(coach_row(
        end_seq,
        "session_end",
        String::new(),
        String::new(),
        ctx.elapsed_ms,
        ctx.ended_at,
    ))?;
    finish(wtr)
}

/// `<player>_<YYYYmmdd_HHMMSS>_<mode>.csv`
pub fn export_file_name(player_name: &str, at: DateTime<Local>, mode: ReportMode) -> String {
    let name: String = player_name
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let name = if name.is_empty() { "player".to_string() } else { name };
    format!("{}_{}_{}.csv", name, at.format("%Y%m%d_%H%M%S"), mode)
}

/// Render and write a report into `dir`, returning the file path.
pub fn export_to_dir(
    dir: &Path,
    player_name: &str,
    ctx: &ReportContext<'_>,
    mode: ReportMode,
    at: DateTime<Local>,
) -> Result<PathBuf, ReportError> {
    let body = render(ctx, mode)?;
    fs::create_dir_all(dir)?;
    let path = dir.join(export_file_name(player_name, at, mode));
    fs::write(&path, body)?;
    Ok(path)
}
