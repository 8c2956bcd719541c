use chrono::{DateTime, Duration as ChronoDuration, Local, NaiveDate, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};

use crate::app_dirs::AppDirs;
use crate::error::Result;
use crate::summary::{ModalSummary, SessionSummary};

/// Accuracy (percent, both channels) a session needs to count as passing its level
pub const PASS_ACCURACY: u32 = 80;

/// Everything remembered across sessions
#[derive(Debug, Clone, PartialEq)]
pub struct GameStats {
    pub sessions: Vec<SessionSummary>,
    /// highest level passed so far, starts at 1
    pub high_score_n: u32,
    /// consecutive days played
    pub streak: u32,
    pub last_played_date: Option<NaiveDate>,
}

impl Default for GameStats {
    fn default() -> Self {
        Self {
            sessions: Vec::new(),
            high_score_n: 1,
            streak: 0,
            last_played_date: None,
        }
    }
}

impl GameStats {
    /// Merge a finished session played on `today`.
    pub fn record(mut self, session: SessionSummary, today: NaiveDate) -> Self {
        self.streak = next_streak(self.streak, self.last_played_date, today);
        if session.passed(PASS_ACCURACY) && session.n_level > self.high_score_n {
            self.high_score_n = session.n_level;
        }
        self.last_played_date = Some(today);
        self.sessions.push(session);
        self
    }

    /// Most recent `count` sessions, oldest first
    pub fn recent(&self, count: usize) -> &[SessionSummary] {
        let start = self.sessions.len().saturating_sub(count);
        &self.sessions[start..]
    }
}

/// Streak after playing on `today`: unchanged for a second game the same
/// day, extended after yesterday, otherwise restarted at 1.
pub fn next_streak(streak: u32, last_played: Option<NaiveDate>, today: NaiveDate) -> u32 {
    match last_played {
        Some(last) if last == today => streak,
        Some(last) if last + ChronoDuration::days(1) == today => streak + 1,
        _ => 1,
    }
}

/// Session history persistence
pub trait HistoryStore {
    fn load(&self) -> Result<GameStats>;
    /// Merge `summary` into the stored history and return the updated stats.
    fn persist(&mut self, summary: &SessionSummary) -> Result<GameStats>;
}

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS sessions (
        id TEXT PRIMARY KEY,
        timestamp TEXT NOT NULL,
        n_level INTEGER NOT NULL,
        score INTEGER NOT NULL,
        accuracy_position INTEGER NOT NULL,
        accuracy_audio INTEGER NOT NULL,
        total_mistakes INTEGER NOT NULL,
        visual_hits INTEGER NOT NULL,
        visual_misses INTEGER NOT NULL,
        visual_false_alarms INTEGER NOT NULL,
        visual_correct_rejections INTEGER NOT NULL,
        visual_avg_rt_ms INTEGER NOT NULL,
        audio_hits INTEGER NOT NULL,
        audio_misses INTEGER NOT NULL,
        audio_false_alarms INTEGER NOT NULL,
        audio_correct_rejections INTEGER NOT NULL,
        audio_avg_rt_ms INTEGER NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_sessions_timestamp ON sessions(timestamp);
    CREATE TABLE IF NOT EXISTS profile (
        id INTEGER PRIMARY KEY CHECK (id = 1),
        high_score_n INTEGER NOT NULL,
        streak INTEGER NOT NULL,
        last_played_date TEXT
    );
"#;

/// SQLite-backed history under the user's state directory
#[derive(Debug)]
pub struct SqliteHistory {
    conn: Connection,
}

impl SqliteHistory {
    /// Open (creating if needed) the default database.
    pub fn new() -> Result<Self> {
        let path = AppDirs::db_path().unwrap_or_else(|| PathBuf::from("nback_history.db"));
        Self::open(path)
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// Merge a session using `today` as the play date.
    pub fn persist_on(&mut self, summary: &SessionSummary, today: NaiveDate) -> Result<GameStats> {
        let stats = self.load()?.record(summary.clone(), today);

        let tx = self.conn.transaction()?;
        tx.execute(
            r#"
            INSERT INTO sessions (
                id, timestamp, n_level, score, accuracy_position, accuracy_audio, total_mistakes,
                visual_hits, visual_misses, visual_false_alarms, visual_correct_rejections, visual_avg_rt_ms,
                audio_hits, audio_misses, audio_false_alarms, audio_correct_rejections, audio_avg_rt_ms
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)
            "#,
            params![
                summary.id,
                summary
                    .timestamp
                    .with_timezone(&Utc)
                    .to_rfc3339_opts(SecondsFormat::Nanos, true),
                summary.n_level,
                summary.score,
                summary.accuracy_position,
                summary.accuracy_audio,
                summary.total_mistakes,
                summary.visual_stats.hits,
                summary.visual_stats.misses,
                summary.visual_stats.false_alarms,
                summary.visual_stats.correct_rejections,
                summary.visual_stats.avg_response_time_ms,
                summary.audio_stats.hits,
                summary.audio_stats.misses,
                summary.audio_stats.false_alarms,
                summary.audio_stats.correct_rejections,
                summary.audio_stats.avg_response_time_ms,
            ],
        )?;
        tx.execute(
            r#"
            INSERT INTO profile (id, high_score_n, streak, last_played_date)
            VALUES (1, ?1, ?2, ?3)
            ON CONFLICT(id) DO UPDATE SET
                high_score_n = excluded.high_score_n,
                streak = excluded.streak,
                last_played_date = excluded.last_played_date
            "#,
            params![
                stats.high_score_n,
                stats.streak,
                stats.last_played_date.map(|d| d.to_string()),
            ],
        )?;
        tx.commit()?;

        tracing::info!(
            id = %summary.id,
            streak = stats.streak,
            high_score_n = stats.high_score_n,
            "session saved"
        );
        Ok(stats)
    }

    fn load_sessions(&self) -> Result<Vec<SessionSummary>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, timestamp, n_level, score, accuracy_position, accuracy_audio, total_mistakes,
                visual_hits, visual_misses, visual_false_alarms, visual_correct_rejections, visual_avg_rt_ms,
                audio_hits, audio_misses, audio_false_alarms, audio_correct_rejections, audio_avg_rt_ms
            FROM sessions
            ORDER BY timestamp ASC
            "#,
        )?;

        let rows = stmt.query_map([], |row| {
            let timestamp_str: String = row.get(1)?;
            let timestamp = DateTime::parse_from_rfc3339(&timestamp_str)
                .map_err(|_| {
                    rusqlite::Error::InvalidColumnType(
                        1,
                        "timestamp".to_string(),
                        rusqlite::types::Type::Text,
                    )
                })?
                .with_timezone(&Local);

            Ok(SessionSummary {
                id: row.get(0)?,
                timestamp,
                n_level: row.get(2)?,
                score: row.get(3)?,
                accuracy_position: row.get(4)?,
                accuracy_audio: row.get(5)?,
                total_mistakes: row.get(6)?,
                visual_stats: ModalSummary {
                    hits: row.get(7)?,
                    misses: row.get(8)?,
                    false_alarms: row.get(9)?,
                    correct_rejections: row.get(10)?,
                    avg_response_time_ms: row.get(11)?,
                },
                audio_stats: ModalSummary {
                    hits: row.get(12)?,
                    misses: row.get(13)?,
                    false_alarms: row.get(14)?,
                    correct_rejections: row.get(15)?,
                    avg_response_time_ms: row.get(16)?,
                },
            })
        })?;

        let mut sessions = Vec::new();
        for session in rows {
            sessions.push(session?);
        }
        Ok(sessions)
    }
}

impl HistoryStore for SqliteHistory {
    fn load(&self) -> Result<GameStats> {
        let sessions = self.load_sessions()?;
        let profile = self
            .conn
            .query_row(
                "SELECT high_score_n, streak, last_played_date FROM profile WHERE id = 1",
                [],
                |row| {
                    Ok((
                        row.get::<_, u32>(0)?,
                        row.get::<_, u32>(1)?,
                        row.get::<_, Option<String>>(2)?,
                    ))
                },
            )
            .optional()?;

        let mut stats = GameStats {
            sessions,
            ..GameStats::default()
        };
        if let Some((high_score_n, streak, last_played)) = profile {
            stats.high_score_n = high_score_n;
            stats.streak = streak;
            stats.last_played_date = last_played.and_then(|s| s.parse::<NaiveDate>().ok());
        }
        Ok(stats)
    }

    fn persist(&mut self, summary: &SessionSummary) -> Result<GameStats> {
        self.persist_on(summary, Local::now().date_naive())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::scorer::ModalStats;
    use crate::error::Error;
    use crate::summary::finalize;
    use assert_matches::assert_matches;
    use chrono::{FixedOffset, TimeZone};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn summary(n_level: u32, correct: u32, at: DateTime<Local>) -> SessionSummary {
        let stats = ModalStats {
            hits: 2,
            correct_rejections: correct.saturating_sub(2),
            misses: 10 - correct,
            total_response_time_ms: 1200,
            hit_count: 2,
            ..ModalStats::default()
        };
        let settings = Settings {
            n_level,
            total_trials: 10,
            ..Settings::default()
        };
        finalize(&stats, &stats, 200, &settings, at)
    }

    fn at(h: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 3, 14, h, 0, 0).unwrap()
    }

    #[test]
    fn test_next_streak() {
        let today = date(2026, 3, 14);
        assert_eq!(next_streak(0, None, today), 1);
        assert_eq!(next_streak(4, Some(date(2026, 3, 13)), today), 5);
        assert_eq!(next_streak(4, Some(today), today), 4);
        assert_eq!(next_streak(4, Some(date(2026, 3, 11)), today), 1);
    }

    #[test]
    fn test_streak_across_month_boundary() {
        assert_eq!(next_streak(2, Some(date(2026, 2, 28)), date(2026, 3, 1)), 3);
    }

    #[test]
    fn test_record_raises_level_only_when_passed() {
        let today = date(2026, 3, 14);
        let stats = GameStats::default().record(summary(3, 8, at(9)), today);
        assert_eq!(stats.high_score_n, 3);

        let stats = stats.record(summary(4, 7, at(10)), today);
        assert_eq!(stats.high_score_n, 3);
        assert_eq!(stats.sessions.len(), 2);
    }

    #[test]
    fn test_record_never_lowers_level() {
        let today = date(2026, 3, 14);
        let stats = GameStats {
            high_score_n: 4,
            ..GameStats::default()
        }
        .record(summary(2, 10, at(9)), today);
        assert_eq!(stats.high_score_n, 4);
    }

    #[test]
    fn test_recent_returns_tail() {
        let today = date(2026, 3, 14);
        let mut stats = GameStats::default();
        for h in 1..=7 {
            stats = stats.record(summary(2, 9, at(h)), today);
        }
        let recent = stats.recent(5);
        assert_eq!(recent.len(), 5);
        assert_eq!(recent[0].timestamp, at(3));
        assert_eq!(GameStats::default().recent(5).len(), 0);
    }

    #[test]
    fn test_empty_store_loads_defaults() {
        let store = SqliteHistory::open_in_memory().unwrap();
        assert_eq!(store.load().unwrap(), GameStats::default());
    }

    #[test]
    fn test_persist_and_reload() {
        let mut store = SqliteHistory::open_in_memory().unwrap();
        let first = summary(2, 9, at(9));
        let second = summary(3, 10, at(11));

        store.persist_on(&first, date(2026, 3, 13)).unwrap();
        let returned = store.persist_on(&second, date(2026, 3, 14)).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded, returned);
        assert_eq!(loaded.sessions, vec![first, second]);
        assert_eq!(loaded.streak, 2);
        assert_eq!(loaded.high_score_n, 3);
        assert_eq!(loaded.last_played_date, Some(date(2026, 3, 14)));
    }

    #[test]
    fn test_duplicate_id_is_rejected() {
        let mut store = SqliteHistory::open_in_memory().unwrap();
        let first = summary(2, 9, at(9));
        store.persist_on(&first, date(2026, 3, 14)).unwrap();

        let clash = SessionSummary {
            score: 900,
            ..first.clone()
        };
        assert_matches!(
            store.persist_on(&clash, date(2026, 3, 14)),
            Err(Error::Storage(_))
        );
        // the original row and profile are untouched
        let loaded = store.load().unwrap();
        assert_eq!(loaded.sessions, vec![first]);
        assert_eq!(loaded.streak, 1);
    }

    #[test]
    fn test_sessions_load_in_instant_order_across_offsets() {
        // 01:30 EDT then 01:10 EST on the fall-back night: the second is later
        let edt = FixedOffset::west_opt(4 * 3600).unwrap();
        let est = FixedOffset::west_opt(5 * 3600).unwrap();
        let earlier = edt
            .with_ymd_and_hms(2026, 11, 1, 1, 30, 0)
            .unwrap()
            .with_timezone(&Local);
        let later = est
            .with_ymd_and_hms(2026, 11, 1, 1, 10, 0)
            .unwrap()
            .with_timezone(&Local);

        let mut store = SqliteHistory::open_in_memory().unwrap();
        let second = summary(2, 9, later);
        let first = summary(2, 9, earlier);
        store.persist_on(&second, date(2026, 11, 1)).unwrap();
        store.persist_on(&first, date(2026, 11, 1)).unwrap();

        let stored: String = store
            .conn
            .query_row("SELECT timestamp FROM sessions LIMIT 1", [], |row| row.get(0))
            .unwrap();
        assert!(stored.ends_with('Z'));
        assert_eq!(store.load().unwrap().sessions, vec![first, second]);
    }
}
