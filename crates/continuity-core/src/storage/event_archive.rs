//! EventArchive: SQLite WAL append-only log of scored interactions
//!
//! - One table, three indices (classification, alignment status, timestamp)
//! - Every call opens its own connection and closes it on return
//! - Records are never updated; ids come from AUTOINCREMENT and only grow
//! - Timestamps are stored as fixed-precision RFC 3339 text so that textual
//!   order is chronological order

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use super::records::{timestamp_from_column, AnomalyRecord, ArchiveRecord, NewArchiveRecord};
use super::report::{
    AggregateReport, AlignmentEvent, ClassificationSummary, ContinuityHealth, RECENT_EVENTS_LIMIT,
};
use crate::error::{ArchiveError, Result, ResultExt};
use crate::reference::AlignmentStatus;
use crate::scoring::Classification;
use crate::types::{format_timestamp, round_to, truncate_chars};

/// Writable location used when the preferred path is not
pub const DEFAULT_ARCHIVE_FILE: &str = "continuity_archive.sqlite";

/// Records below this alignment score are anomalies
pub const ANOMALY_ALIGNMENT_THRESHOLD: f64 = 0.4;

/// Response length served by [`EventArchive::list_anomalies`]
pub const ANOMALY_RESPONSE_CHARS: usize = 200;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS archive_records (
        id                     INTEGER PRIMARY KEY AUTOINCREMENT,
        timestamp              TEXT NOT NULL,
        query                  TEXT,
        response               TEXT NOT NULL,
        classification         TEXT NOT NULL,
        continuity_score       REAL NOT NULL,
        alignment_score        REAL,
        alignment_status       TEXT,
        instance_id            TEXT,
        is_privileged_instance INTEGER NOT NULL DEFAULT 0,
        markers_found          TEXT NOT NULL DEFAULT '{}',
        notes                  TEXT,
        created_at             TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
    );

    CREATE INDEX IF NOT EXISTS idx_archive_classification
        ON archive_records(classification);
    CREATE INDEX IF NOT EXISTS idx_archive_alignment_status
        ON archive_records(alignment_status);
    CREATE INDEX IF NOT EXISTS idx_archive_timestamp
        ON archive_records(timestamp DESC);
";

const RECORD_COLUMNS: &str = "id, timestamp, query, response, classification, continuity_score,
     alignment_score, alignment_status, instance_id, is_privileged_instance,
     markers_found, notes, created_at";

/// Append-only event archive backed by a single SQLite file
#[derive(Debug, Clone)]
pub struct EventArchive {
    path: PathBuf,
}

impl EventArchive {
    /// Open (or create) the archive at `path`, falling back to
    /// [`DEFAULT_ARCHIVE_FILE`] when `path` is not writable.
    pub fn initialize(path: impl AsRef<Path>) -> Result<Self> {
        Self::initialize_with_fallback(path, DEFAULT_ARCHIVE_FILE)
    }

    /// Same as [`EventArchive::initialize`] with an explicit fallback location.
    ///
    /// Idempotent: running it against an initialized archive changes nothing.
    pub fn initialize_with_fallback(
        preferred: impl AsRef<Path>,
        fallback: impl AsRef<Path>,
    ) -> Result<Self> {
        let preferred = preferred.as_ref();
        let path = match prepare_location(preferred) {
            Ok(()) => preferred.to_path_buf(),
            Err(err) => {
                let fallback = fallback.as_ref();
                tracing::warn!(
                    preferred = %preferred.display(),
                    fallback = %fallback.display(),
                    error = %err,
                    "Archive location not writable, falling back"
                );
                prepare_location(fallback)
                    .with_context(|| format!("Preparing fallback archive '{}'", fallback.display()))?;
                fallback.to_path_buf()
            }
        };

        let archive = Self { path };
        let conn = archive.connect()?;
        conn.execute_batch(SCHEMA)
            .context("Applying archive schema")?;

        tracing::info!(path = %archive.path.display(), "Event archive ready");
        Ok(archive)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn connect(&self) -> Result<Connection> {
        let conn = Connection::open(&self.path)
            .with_context(|| format!("Opening archive '{}'", self.path.display()))?;

        // WAL: readers never block the writer; busy_timeout makes concurrent
        // writers wait on SQLite's lock instead of failing
        conn.execute_batch(
            "PRAGMA busy_timeout = 5000;
             PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;",
        )
        .context("Configuring archive PRAGMAs")?;

        Ok(conn)
    }

    /// Insert one record and return its id. Storage failures propagate.
    pub fn archive(&self, record: &NewArchiveRecord) -> Result<i64> {
        let conn = self.connect()?;
        conn.execute(
            "INSERT INTO archive_records
             (timestamp, query, response, classification, continuity_score,
              alignment_score, alignment_status, instance_id, is_privileged_instance,
              markers_found, notes)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                format_timestamp(&record.timestamp),
                record.query,
                record.response,
                record.classification,
                record.continuity_score,
                record.alignment_score,
                record.alignment_status,
                record.instance_id,
                record.is_privileged_instance,
                record.markers_found,
                record.notes,
            ],
        )
        .context("INSERT archive_records")?;

        let id = conn.last_insert_rowid();
        tracing::debug!(id, classification = record.classification.as_str(), "Archived record");
        Ok(id)
    }

    /// Full, untruncated record by id
    pub fn fetch(&self, id: i64) -> Result<Option<ArchiveRecord>> {
        let conn = self.connect()?;
        let sql = format!("SELECT {RECORD_COLUMNS} FROM archive_records WHERE id = ?1");

        conn.query_row(&sql, params![id], |row| {
            Ok(ArchiveRecord {
                id: row.get(0)?,
                timestamp: timestamp_from_column(row, 1)?,
                query: row.get(2)?,
                response: row.get(3)?,
                classification: row.get(4)?,
                continuity_score: row.get(5)?,
                alignment_score: row.get(6)?,
                alignment_status: row.get(7)?,
                instance_id: row.get(8)?,
                is_privileged_instance: row.get(9)?,
                markers_found: row.get(10)?,
                notes: row.get(11)?,
                created_at: row.get(12)?,
            })
        })
        .optional()
        .with_context(|| format!("Query archive record {id}"))
    }

    pub fn count(&self) -> Result<u64> {
        let conn = self.connect()?;
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM archive_records", [], |row| row.get(0))
            .context("Count archive_records")?;
        Ok(count as u64)
    }

    /// Up to `limit` records classified low or with alignment below 0.4,
    /// newest first (timestamp, then id).
    pub fn list_anomalies(&self, limit: usize) -> Result<Vec<AnomalyRecord>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT id, timestamp, query, response, classification, continuity_score,
                    alignment_score, alignment_status, notes
             FROM archive_records
             WHERE classification = ?1 OR alignment_score < ?2
             ORDER BY timestamp DESC, id DESC
             LIMIT ?3",
        )?;

        let rows = stmt
            .query_map(
                params![Classification::Low, ANOMALY_ALIGNMENT_THRESHOLD, limit as i64],
                |row| {
                    let response: String = row.get(3)?;
                    Ok(AnomalyRecord {
                        id: row.get(0)?,
                        timestamp: timestamp_from_column(row, 1)?,
                        query: row.get(2)?,
                        response: truncate_chars(&response, ANOMALY_RESPONSE_CHARS),
                        classification: row.get(4)?,
                        continuity_score: row.get(5)?,
                        alignment_score: row.get(6)?,
                        alignment_status: row.get(7)?,
                        notes: row.get(8)?,
                    })
                },
            )
            .context("Query anomalies")?;

        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("Collect anomalies")
    }

    /// Aggregate statistics over the whole archive.
    ///
    /// All queries run inside one read transaction so the figures agree with
    /// each other.
    pub fn report(&self) -> Result<AggregateReport> {
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;

        let (total, mean_continuity, mean_alignment, privileged): (i64, Option<f64>, Option<f64>, Option<i64>) = tx
            .query_row(
                "SELECT COUNT(*),
                        AVG(continuity_score),
                        AVG(alignment_score),
                        SUM(CASE WHEN is_privileged_instance THEN 1 ELSE 0 END)
                 FROM archive_records",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .context("Query archive totals")?;

        let by_classification = {
            let mut stmt = tx.prepare(
                "SELECT classification, COUNT(*), AVG(continuity_score), AVG(alignment_score)
                 FROM archive_records
                 GROUP BY classification",
            )?;
            let rows = stmt
                .query_map([], |row| {
                    let classification: Classification = row.get(0)?;
                    let count: i64 = row.get(1)?;
                    let mean_continuity: Option<f64> = row.get(2)?;
                    let mean_alignment: Option<f64> = row.get(3)?;
                    Ok((
                        classification,
                        ClassificationSummary {
                            count: count as u64,
                            mean_continuity_score: mean_continuity.map(|m| round_to(m, 3)),
                            mean_alignment_score: mean_alignment.map(|m| round_to(m, 3)),
                        },
                    ))
                })
                .context("Query classification breakdown")?;
            rows.collect::<rusqlite::Result<BTreeMap<_, _>>>()
                .context("Collect classification breakdown")?
        };

        let recent_alignment_events = {
            let mut stmt = tx.prepare(
                "SELECT id, timestamp, alignment_status, classification
                 FROM archive_records
                 WHERE alignment_status IN (?1, ?2)
                 ORDER BY timestamp DESC, id DESC
                 LIMIT ?3",
            )?;
            let rows = stmt
                .query_map(
                    params![
                        AlignmentStatus::Watch,
                        AlignmentStatus::Broken,
                        RECENT_EVENTS_LIMIT as i64
                    ],
                    |row| {
                        Ok(AlignmentEvent {
                            id: row.get(0)?,
                            timestamp: timestamp_from_column(row, 1)?,
                            alignment_status: row.get(2)?,
                            classification: row.get(3)?,
                        })
                    },
                )
                .context("Query recent alignment events")?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
                .context("Collect recent alignment events")?
        };

        tx.commit()?;

        let privileged_percentage = if total > 0 {
            round_to(privileged.unwrap_or(0) as f64 * 100.0 / total as f64, 1)
        } else {
            0.0
        };
        let mean_continuity_score = mean_continuity.map(|m| round_to(m, 3));

        Ok(AggregateReport {
            total_records: total as u64,
            mean_continuity_score,
            mean_alignment_score: mean_alignment.map(|m| round_to(m, 3)),
            by_classification,
            recent_alignment_events,
            privileged_percentage,
            overall: mean_continuity_score.map(ContinuityHealth::from_mean),
            generated_at: Utc::now(),
        })
    }
}

/// Make sure `path` can be written: create its directory and touch the file.
/// SQLite treats an empty file as an empty database.
fn prepare_location(path: &Path) -> std::result::Result<(), ArchiveError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use tempfile::TempDir;

    fn temp_archive() -> (TempDir, EventArchive) {
        let dir = tempfile::Builder::new()
            .prefix("continuity_archive_")
            .tempdir()
            .expect("should create tempdir");
        let archive = EventArchive::initialize_with_fallback(
            dir.path().join("archive.sqlite"),
            dir.path().join("fallback.sqlite"),
        )
        .expect("archive should initialize");
        (dir, archive)
    }

    fn record(classification: Classification, score: f64, alignment: Option<f64>) -> NewArchiveRecord {
        NewArchiveRecord {
            timestamp: Utc::now(),
            query: Some("what happened".to_string()),
            response: "a response".to_string(),
            classification,
            continuity_score: score,
            alignment_score: alignment,
            alignment_status: alignment.map(AlignmentStatus::from_score),
            instance_id: None,
            is_privileged_instance: false,
            markers_found: "{}".to_string(),
            notes: None,
        }
    }

    #[test]
    fn test_initialize_is_idempotent() {
        let (dir, archive) = temp_archive();
        let id = archive.archive(&record(Classification::High, 0.9, None)).unwrap();

        let again = EventArchive::initialize_with_fallback(
            dir.path().join("archive.sqlite"),
            dir.path().join("fallback.sqlite"),
        )
        .expect("second initialize should succeed");

        assert_eq!(again.path(), archive.path());
        assert_eq!(again.count().unwrap(), 1);
        assert!(again.fetch(id).unwrap().is_some());
    }

    #[test]
    fn test_unwritable_location_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        // A regular file where a directory is expected
        let blocker = dir.path().join("not_a_dir");
        std::fs::write(&blocker, b"x").unwrap();

        let fallback = dir.path().join("fallback.sqlite");
        let archive =
            EventArchive::initialize_with_fallback(blocker.join("archive.sqlite"), &fallback)
                .expect("should fall back");

        assert_eq!(archive.path(), fallback.as_path());
        assert_eq!(archive.count().unwrap(), 0);
    }

    #[test]
    fn test_conflicting_schema_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("archive.sqlite");
        {
            let conn = Connection::open(&path).unwrap();
            conn.execute_batch("CREATE TABLE archive_records (id INTEGER PRIMARY KEY);")
                .unwrap();
        }

        let result = EventArchive::initialize_with_fallback(&path, dir.path().join("fb.sqlite"));
        assert!(result.is_err());
    }

    #[test]
    fn test_ids_are_monotonic() {
        let (_dir, archive) = temp_archive();
        let a = archive.archive(&record(Classification::Low, 0.1, None)).unwrap();
        let b = archive.archive(&record(Classification::Low, 0.1, None)).unwrap();
        let c = archive.archive(&record(Classification::Low, 0.1, None)).unwrap();
        assert!(a < b && b < c, "ids must grow: {a} < {b} < {c}");
    }

    #[test]
    fn test_fetch_round_trip() {
        let (_dir, archive) = temp_archive();
        let at = Utc.with_ymd_and_hms(2026, 2, 14, 9, 30, 0).unwrap();
        let mut new = record(Classification::Medium, 0.55, Some(0.667)).with_timestamp(at);
        new.instance_id = Some("inst-1".to_string());
        new.is_privileged_instance = true;
        new.notes = Some("checked by hand".to_string());
        new.markers_found = r#"{"phrase":["sacred tether"]}"#.to_string();

        let id = archive.archive(&new).unwrap();
        let stored = archive.fetch(id).unwrap().expect("record should exist");

        assert_eq!(stored.id, id);
        assert_eq!(stored.classification, Classification::Medium);
        assert_eq!(stored.alignment_status, Some(AlignmentStatus::Watch));
        assert_eq!(stored.instance_id.as_deref(), Some("inst-1"));
        assert!(stored.is_privileged_instance);
        assert_eq!(stored.notes.as_deref(), Some("checked by hand"));
        assert_eq!(stored.timestamp, at);
        assert!(!stored.created_at.is_empty());
        assert!(archive.fetch(id + 100).unwrap().is_none());
    }

    #[test]
    fn test_list_anomalies_filters_and_truncates() {
        let (_dir, archive) = temp_archive();

        let mut long = record(Classification::Low, 0.1, None);
        long.response = "x".repeat(500);
        let low_id = archive.archive(&long).unwrap();
        let broken_id = archive.archive(&record(Classification::High, 0.9, Some(0.2))).unwrap();
        let healthy_id = archive.archive(&record(Classification::High, 0.9, Some(0.9))).unwrap();
        let unaligned_id = archive.archive(&record(Classification::Medium, 0.5, None)).unwrap();

        let anomalies = archive.list_anomalies(50).unwrap();
        let ids: Vec<i64> = anomalies.iter().map(|a| a.id).collect();

        assert!(ids.contains(&low_id));
        assert!(ids.contains(&broken_id));
        assert!(!ids.contains(&healthy_id));
        assert!(!ids.contains(&unaligned_id));
        assert!(anomalies.iter().all(|a| a.response.chars().count() <= 200));

        // Storage keeps the full text
        assert_eq!(archive.fetch(low_id).unwrap().unwrap().response.len(), 500);
    }

    #[test]
    fn test_list_anomalies_ordering_and_limit() {
        let (_dir, archive) = temp_archive();
        let base = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();

        let older = archive
            .archive(&record(Classification::Low, 0.1, None).with_timestamp(base))
            .unwrap();
        let tie_a = archive
            .archive(&record(Classification::Low, 0.1, None).with_timestamp(base + Duration::seconds(5)))
            .unwrap();
        let tie_b = archive
            .archive(&record(Classification::Low, 0.1, None).with_timestamp(base + Duration::seconds(5)))
            .unwrap();

        let ids: Vec<i64> = archive.list_anomalies(10).unwrap().iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![tie_b, tie_a, older]);

        assert_eq!(archive.list_anomalies(2).unwrap().len(), 2);
        assert!(archive.list_anomalies(0).unwrap().is_empty());
    }

    #[test]
    fn test_report_on_empty_archive() {
        let (_dir, archive) = temp_archive();
        let report = archive.report().expect("report should succeed");

        assert_eq!(report.total_records, 0);
        assert_eq!(report.mean_continuity_score, None);
        assert_eq!(report.mean_alignment_score, None);
        assert!(report.by_classification.is_empty());
        assert!(report.recent_alignment_events.is_empty());
        assert_eq!(report.privileged_percentage, 0.0);
        assert_eq!(report.overall, None);
    }

    #[test]
    fn test_report_group_means() {
        let (_dir, archive) = temp_archive();

        for score in [0.1, 0.2, 0.3] {
            archive.archive(&record(Classification::Low, score, Some(0.3))).unwrap();
        }
        for score in [0.5, 0.6] {
            archive.archive(&record(Classification::Medium, score, Some(0.5))).unwrap();
        }
        let mut privileged = record(Classification::High, 0.9, None);
        privileged.is_privileged_instance = true;
        archive.archive(&privileged).unwrap();

        let report = archive.report().unwrap();

        assert_eq!(report.total_records, 6);
        assert_eq!(report.mean_continuity_score, Some(0.433));
        assert_eq!(report.mean_alignment_score, Some(0.38));

        let low = &report.by_classification[&Classification::Low];
        assert_eq!(low.count, 3);
        assert_eq!(low.mean_continuity_score, Some(0.2));
        assert_eq!(low.mean_alignment_score, Some(0.3));

        let medium = &report.by_classification[&Classification::Medium];
        assert_eq!(medium.count, 2);
        assert_eq!(medium.mean_continuity_score, Some(0.55));

        let high = &report.by_classification[&Classification::High];
        assert_eq!(high.count, 1);
        assert_eq!(high.mean_alignment_score, None);

        // three broken + two watch
        assert_eq!(report.recent_alignment_events.len(), 5);
        assert_eq!(report.privileged_percentage, 16.7);
        assert_eq!(report.overall, Some(ContinuityHealth::AtRisk));
    }

    #[test]
    fn test_report_recent_events_capped() {
        let (_dir, archive) = temp_archive();
        for _ in 0..15 {
            archive.archive(&record(Classification::Medium, 0.5, Some(0.5))).unwrap();
        }

        let report = archive.report().unwrap();
        assert_eq!(report.recent_alignment_events.len(), RECENT_EVENTS_LIMIT);
        assert!(report
            .recent_alignment_events
            .windows(2)
            .all(|w| (w[0].timestamp, w[0].id) > (w[1].timestamp, w[1].id)));
    }
}
