use crate::app_dirs::AppDirs;
use crate::error::StoreError;
use crate::report::ReportContext;
use crate::shot::{CoachAction, CoachActionKind, ShotRecord, ShotResult};
use crate::zone::Zone;
use chrono::{DateTime, Local, NaiveDate};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Player {
    pub id: i64,
    pub name: String,
    pub jersey_number: Option<u32>,
    pub position: Option<String>,
    pub active: bool,
}

#[derive(Debug, Clone, Default)]
pub struct NewPlayer {
    pub name: String,
    pub jersey_number: Option<u32>,
    pub position: Option<String>,
}

/// History row: one session with counts recomputed from its shots
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionRecord {
    pub session_id: String,
    pub started_at: DateTime<Local>,
    pub ended_at: Option<DateTime<Local>>,
    pub duration_ms: u64,
    pub attempts: u32,
    pub made: u32,
}

/// A mirrored session read back for export
#[derive(Debug, Clone)]
pub struct StoredSession {
    pub session_id: String,
    pub player: Player,
    pub started_at: DateTime<Local>,
    pub ended_at: Option<DateTime<Local>>,
    pub elapsed_ms: Option<u64>,
    pub shots: Vec<ShotRecord>,
    pub coach_actions: Vec<CoachAction>,
}

impl StoredSession {
    pub fn report_context(&self) -> ReportContext<'_> {
        let last_timer = self.shots.last().map_or(0, |s| s.timer_value_ms);
        let ended_at = self
            .ended_at
            .or_else(|| self.shots.last().map(|s| s.timestamp))
            .unwrap_or(self.started_at);
        ReportContext {
            player_id: self.player.id.to_string(),
            session_id: &self.session_id,
            started_at: self.started_at,
            ended_at,
            elapsed_ms: self.elapsed_ms.unwrap_or(last_timer),
            shots: &self.shots,
            coach_actions: &self.coach_actions,
        }
    }
}

/// The persistence collaborator the session mirror writes through
pub trait SessionStore {
    fn create_player(&self, player: &NewPlayer) -> Result<Player, StoreError>;
    fn find_player(&self, name: &str) -> Result<Option<Player>, StoreError>;
    fn list_players(&self, active_only: bool) -> Result<Vec<Player>, StoreError>;
    fn set_player_active(&self, player_id: i64, active: bool) -> Result<(), StoreError>;

    fn create_session(
        &self,
        session_id: &str,
        player_id: i64,
        started_at: DateTime<Local>,
    ) -> Result<(), StoreError>;
    fn append_shot(&self, session_id: &str, shot: &ShotRecord) -> Result<(), StoreError>;
    fn delete_shot(&self, session_id: &str, sequence_number: u64) -> Result<(), StoreError>;
    fn append_event(&self, session_id: &str, action: &CoachAction) -> Result<(), StoreError>;
    fn finalize_session(
        &self,
        session_id: &str,
        ended_at: DateTime<Local>,
        elapsed_ms: u64,
    ) -> Result<(), StoreError>;
    /// Removes shots, events and the session row together
    fn delete_session(&self, session_id: &str) -> Result<(), StoreError>;

    fn sessions_for_player(
        &self,
        player_id: i64,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<Vec<SessionRecord>, StoreError>;
    fn load_session(&self, session_id: &str) -> Result<StoredSession, StoreError>;
}

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS players (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE COLLATE NOCASE,
    jersey_number INTEGER,
    position TEXT,
    active BOOLEAN NOT NULL DEFAULT 1,
    created_at DATETIME DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS sessions (
    id TEXT PRIMARY KEY,
    player_id INTEGER NOT NULL REFERENCES players(id),
    started_at TEXT NOT NULL,
    ended_at TEXT,
    elapsed_ms INTEGER
);

CREATE TABLE IF NOT EXISTS shots (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id TEXT NOT NULL,
    zone TEXT NOT NULL,
    result TEXT NOT NULL,
    time_taken_ms INTEGER NOT NULL,
    timer_value_ms INTEGER NOT NULL,
    sequence_number INTEGER NOT NULL,
    timestamp TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id TEXT NOT NULL,
    event_type TEXT NOT NULL,
    zone TEXT,
    result TEXT,
    session_elapsed_ms INTEGER NOT NULL,
    sequence_number INTEGER NOT NULL,
    timestamp TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_sessions_player ON sessions(player_id, started_at);
CREATE INDEX IF NOT EXISTS idx_shots_session ON shots(session_id, sequence_number);
CREATE INDEX IF NOT EXISTS idx_events_session ON events(session_id, sequence_number);
"#;

/// SQLite-backed store
#[derive(Debug)]
pub struct SqliteStore {
    conn: Connection,
    path: Option<PathBuf>,
}

impl SqliteStore {
    /// Open the database at the default state location
    pub fn open_default() -> Result<Self, StoreError> {
        let path = AppDirs::db_path().unwrap_or_else(|| PathBuf::from("courtside.db"));
        Self::open(path)
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(&path)?;
        conn.execute_batch(SCHEMA)?;
        debug!(path = %path.display(), "opened shot database");
        Ok(Self {
            conn,
            path: Some(path),
        })
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn, path: None })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn player_by_id(&self, player_id: i64) -> Result<Player, StoreError> {
        self.conn
            .query_row(
                "SELECT id, name, jersey_number, position, active FROM players WHERE id = ?1",
                [player_id],
                player_from_row,
            )
            .optional()?
            .ok_or_else(|| StoreError::NotFound {
                what: "player",
                key: player_id.to_string(),
            })
    }
}

fn player_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Player> {
    Ok(Player {
        id: row.get(0)?,
        name: row.get(1)?,
        jersey_number: row.get(2)?,
        position: row.get(3)?,
        active: row.get(4)?,
    })
}

fn parse_time(field: &'static str, value: &str) -> Result<DateTime<Local>, StoreError> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Local))
        .map_err(|_| StoreError::Corrupt {
            field,
            value: value.to_string(),
        })
}

/// Accepts the canonical zone names and the spellings older rows used.
pub fn normalize_zone(value: &str) -> Result<Zone, StoreError> {
    let key: String = value
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_lowercase();
    match key.as_str() {
        "leftcorner" | "lc" => Ok(Zone::LeftCorner),
        "leftwing" | "lw" => Ok(Zone::LeftWing),
        "topkey" | "topofkey" | "top" | "tk" => Ok(Zone::TopKey),
        "rightwing" | "rw" => Ok(Zone::RightWing),
        "rightcorner" | "rc" => Ok(Zone::RightCorner),
        _ => Err(StoreError::Corrupt {
            field: "zone",
            value: value.to_string(),
        }),
    }
}

pub fn normalize_result(value: &str) -> Result<bool, StoreError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "made" | "make" | "1" | "true" => Ok(true),
        "missed" | "miss" | "0" | "false" => Ok(false),
        _ => Err(StoreError::Corrupt {
            field: "result",
            value: value.to_string(),
        }),
    }
}

impl SessionStore for SqliteStore {
    fn create_player(&self, player: &NewPlayer) -> Result<Player, StoreError> {
        self.conn.execute(
            "INSERT INTO players (name, jersey_number, position) VALUES (?1, ?2, ?3)",
            params![player.name, player.jersey_number, player.position],
        )?;
        self.player_by_id(self.conn.last_insert_rowid())
    }

    fn find_player(&self, name: &str) -> Result<Option<Player>, StoreError> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, name, jersey_number, position, active FROM players WHERE name = ?1 COLLATE NOCASE",
                [name],
                player_from_row,
            )
            .optional()?)
    }

    fn list_players(&self, active_only: bool) -> Result<Vec<Player>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, jersey_number, position, active FROM players WHERE active = 1 OR ?1 = 0 ORDER BY name",
        )?;
        let players = stmt
            .query_map([active_only], player_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(players)
    }

    fn set_player_active(&self, player_id: i64, active: bool) -> Result<(), StoreError> {
        let changed = self.conn.execute(
            "UPDATE players SET active = ?2 WHERE id = ?1",
            params![player_id, active],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound {
                what: "player",
                key: player_id.to_string(),
            });
        }
        Ok(())
    }

    fn create_session(
        &self,
        session_id: &str,
        player_id: i64,
        started_at: DateTime<Local>,
    ) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO sessions (id, player_id, started_at) VALUES (?1, ?2, ?3)",
            params![session_id, player_id, started_at.to_rfc3339()],
        )?;
        Ok(())
    }

    fn append_shot(&self, session_id: &str, shot: &ShotRecord) -> Result<(), StoreError> {
        self.conn.execute(
            r#"
            INSERT INTO shots
            (session_id, zone, result, time_taken_ms, timer_value_ms, sequence_number, timestamp)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                session_id,
                shot.zone.to_string(),
                shot.result().to_string(),
                shot.time_taken_ms,
                shot.timer_value_ms,
                shot.sequence_number,
                shot.timestamp.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn delete_shot(&self, session_id: &str, sequence_number: u64) -> Result<(), StoreError> {
        self.conn.execute(
            "DELETE FROM shots WHERE session_id = ?1 AND sequence_number = ?2",
            params![session_id, sequence_number],
        )?;
        Ok(())
    }

    fn append_event(&self, session_id: &str, action: &CoachAction) -> Result<(), StoreError> {
        let (zone, result) = match action.kind {
            CoachActionKind::Undo { zone, made } => (
                Some(zone.to_string()),
                Some(ShotResult::from(made).to_string()),
            ),
            _ => (None, None),
        };
        self.conn.execute(
            r#"
            INSERT INTO events
            (session_id, event_type, zone, result, session_elapsed_ms, sequence_number, timestamp)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                session_id,
                action.kind.to_string(),
                zone,
                result,
                action.session_elapsed_ms,
                action.sequence_number,
                action.timestamp.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn finalize_session(
        &self,
        session_id: &str,
        ended_at: DateTime<Local>,
        elapsed_ms: u64,
    ) -> Result<(), StoreError> {
        let changed = self.conn.execute(
            "UPDATE sessions SET ended_at = ?2, elapsed_ms = ?3 WHERE id = ?1",
            params![session_id, ended_at.to_rfc3339(), elapsed_ms],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound {
                what: "session",
                key: session_id.to_string(),
            });
        }
        Ok(())
    }

    fn delete_session(&self, session_id: &str) -> Result<(), StoreError> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM shots WHERE session_id = ?1", [session_id])?;
        tx.execute("DELETE FROM events WHERE session_id = ?1", [session_id])?;
        tx.execute("DELETE FROM sessions WHERE id = ?1", [session_id])?;
        tx.commit()?;
        Ok(())
    }

    fn sessions_for_player(
        &self,
        player_id: i64,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<Vec<SessionRecord>, StoreError> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT
                s.id,
                s.started_at,
                s.ended_at,
                s.elapsed_ms,
                COUNT(sh.id),
                COALESCE(SUM(CASE WHEN lower(sh.result) IN ('made', 'make', '1', 'true') THEN 1 ELSE 0 END), 0),
                COALESCE(MAX(sh.timer_value_ms), 0)
            FROM sessions s
            LEFT JOIN shots sh ON sh.session_id = s.id
            WHERE s.player_id = ?1
            GROUP BY s.id
            ORDER BY s.started_at
            "#,
        )?;

        let rows = stmt
            .query_map([player_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, Option<u64>>(3)?,
                    row.get::<_, u32>(4)?,
                    row.get::<_, u32>(5)?,
                    row.get::<_, u64>(6)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut records = Vec::with_capacity(rows.len());
        for (session_id, started_at, ended_at, elapsed_ms, attempts, made, last_timer) in rows {
            let started_at = parse_time("started_at", &started_at)?;
            let day = started_at.date_naive();
            if from.is_some_and(|d| day < d) || to.is_some_and(|d| day > d) {
                continue;
            }
            records.push(SessionRecord {
                session_id,
                started_at,
                ended_at: ended_at
                    .as_deref()
                    .map(|t| parse_time("ended_at", t))
                    .transpose()?,
                duration_ms: elapsed_ms.unwrap_or(last_timer),
                attempts,
                made,
            });
        }
        Ok(records)
    }

    fn load_session(&self, session_id: &str) -> Result<StoredSession, StoreError> {
        let (player_id, started_at, ended_at, elapsed_ms) = self
            .conn
            .query_row(
                "SELECT player_id, started_at, ended_at, elapsed_ms FROM sessions WHERE id = ?1",
                [session_id],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, Option<String>>(2)?,
                        row.get::<_, Option<u64>>(3)?,
                    ))
                },
            )
            .optional()?
            .ok_or_else(|| StoreError::NotFound {
                what: "session",
                key: session_id.to_string(),
            })?;

        let mut stmt = self.conn.prepare(
            r#"
            SELECT zone, result, time_taken_ms, timer_value_ms, sequence_number, timestamp
            FROM shots WHERE session_id = ?1 ORDER BY sequence_number
            "#,
        )?;
        let shot_rows = stmt
            .query_map([session_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, u64>(2)?,
                    row.get::<_, u64>(3)?,
                    row.get::<_, u64>(4)?,
                    row.get::<_, String>(5)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        let shots = shot_rows
            .into_iter()
            .map(
                |(zone, result, time_taken_ms, timer_value_ms, sequence_number, ts)|
                 -> Result<ShotRecord, StoreError> {
                Ok(ShotRecord {
                    zone: normalize_zone(&zone)?,
                    made: normalize_result(&result)?,
                    timestamp: parse_time("timestamp", &ts)?,
                    timer_value_ms,
                    time_taken_ms,
                    sequence_number,
                })
            })
            .collect::<Result<Vec<_>, StoreError>>()?;

        let mut stmt = self.conn.prepare(
            r#"
            SELECT event_type, zone, result, session_elapsed_ms, sequence_number, timestamp
            FROM events WHERE session_id = ?1 ORDER BY sequence_number
            "#,
        )?;
        let event_rows = stmt
            .query_map([session_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, Option<String>>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, u64>(3)?,
                    row.get::<_, u64>(4)?,
                    row.get::<_, String>(5)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        let coach_actions = event_rows
            .into_iter()
            .map(
                |(event_type, zone, result, session_elapsed_ms, sequence_number, ts)|
                 -> Result<CoachAction, StoreError> {
                let kind = match event_type.to_ascii_lowercase().as_str() {
                    "pause" => CoachActionKind::Pause,
                    "resume" => CoachActionKind::Resume,
                    "undo" => CoachActionKind::Undo {
                        zone: normalize_zone(zone.as_deref().unwrap_or_default())?,
                        made: normalize_result(result.as_deref().unwrap_or_default())?,
                    },
                    _ => {
                        return Err(StoreError::Corrupt {
                            field: "event_type",
                            value: event_type,
                        })
                    }
                };
                Ok(CoachAction {
                    kind,
                    timestamp: parse_time("timestamp", &ts)?,
                    session_elapsed_ms,
                    sequence_number,
                })
            })
            .collect::<Result<Vec<_>, StoreError>>()?;

        Ok(StoredSession {
            session_id: session_id.to_string(),
            player: self.player_by_id(player_id)?,
            started_at: parse_time("started_at", &started_at)?,
            ended_at: ended_at
                .as_deref()
                .map(|t| parse_time("ended_at", t))
                .transpose()?,
            elapsed_ms,
            shots,
            coach_actions,
        })
    }
}
