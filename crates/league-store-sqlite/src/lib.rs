use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use league_core::{
    date_for_week, format_date, parse_date, LeagueSetting, RaceTime, SettingName, Submission,
    SubmissionId, WeekNumber,
};
use rusqlite::{params, Connection, DatabaseName, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use time::{Date, OffsetDateTime};
use ulid::Ulid;

const LATEST_SCHEMA_VERSION: i64 = 2;

const CREATE_SCHEMA_MIGRATIONS_SQL: &str = r"
CREATE TABLE IF NOT EXISTS schema_migrations (
  version INTEGER PRIMARY KEY,
  applied_at TEXT NOT NULL
);
";

const MIGRATION_001_SQL: &str = r"
CREATE TABLE IF NOT EXISTS league_settings (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  week_number INTEGER NOT NULL CHECK (week_number >= 1),
  name TEXT NOT NULL,
  value TEXT NOT NULL
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_league_settings_week_name
  ON league_settings(week_number, name);
CREATE UNIQUE INDEX IF NOT EXISTS idx_league_settings_week_value
  ON league_settings(week_number, value);
";

const MIGRATION_002_CREATE_V2_TABLES_SQL: &str = r"
CREATE TABLE IF NOT EXISTS league_settings_v2 (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  date TEXT NOT NULL,
  name TEXT NOT NULL,
  value TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS runners (
  name TEXT PRIMARY KEY,
  registered_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS submissions (
  submission_id TEXT PRIMARY KEY,
  date TEXT NOT NULL,
  runner TEXT NOT NULL,
  finish_time TEXT NOT NULL,
  vod TEXT NOT NULL,
  submitted_at TEXT NOT NULL,
  UNIQUE(date, runner),
  FOREIGN KEY (runner) REFERENCES runners(name)
);
";

const MIGRATION_002_REPLACE_TABLES_SQL: &str = r"
DROP TABLE league_settings;
ALTER TABLE league_settings_v2 RENAME TO league_settings;
";

const MIGRATION_002_FINAL_INDEXES_SQL: &str = r"
CREATE UNIQUE INDEX IF NOT EXISTS idx_league_settings_date_name
  ON league_settings(date, name);
CREATE UNIQUE INDEX IF NOT EXISTS idx_league_settings_date_value
  ON league_settings(date, value);
CREATE INDEX IF NOT EXISTS idx_submissions_date ON submissions(date);
";

const UPSERT_SETTING_SQL: &str = r"
INSERT INTO league_settings(date, name, value) VALUES (?1, ?2, ?3)
ON CONFLICT(date, name) DO UPDATE SET value = excluded.value
ON CONFLICT(date, value) DO NOTHING
";

pub struct SqliteStore {
    conn: Connection,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SchemaStatus {
    pub current_version: i64,
    pub target_version: i64,
    pub pending_versions: Vec<i64>,
    pub inferred_from_legacy: bool,
}

/// One settings row as it appears in snapshots.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SettingRow {
    pub date: Date,
    pub name: SettingName,
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunnerRow {
    pub name: String,
    #[serde(with = "time::serde::rfc3339")]
    pub registered_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExportFileDigest {
    pub path: String,
    pub sha256: String,
    pub records: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExportManifest {
    pub schema_version: i64,
    pub exported_at: String,
    pub files: Vec<ExportFileDigest>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ImportSummary {
    pub imported_settings: usize,
    pub skipped_existing_settings: usize,
    pub imported_runners: usize,
    pub skipped_existing_runners: usize,
    pub imported_submissions: usize,
    pub skipped_existing_submissions: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ForeignKeyViolation {
    pub table: String,
    pub rowid: i64,
    pub parent: String,
    pub fk_index: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IntegrityReport {
    pub quick_check_ok: bool,
    pub quick_check_message: String,
    pub foreign_key_violations: Vec<ForeignKeyViolation>,
    pub schema_status: SchemaStatus,
}

impl SqliteStore {
    /// Open a SQLite-backed league store and configure required runtime pragmas.
    ///
    /// # Errors
    /// Returns an error when the database cannot be opened or pragmas cannot be applied.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open sqlite database at {}", path.display()))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;",
        )
        .context("failed to configure sqlite pragmas")?;

        Ok(Self { conn })
    }

    /// Report current and target schema versions plus pending migrations.
    ///
    /// # Errors
    /// Returns an error when schema metadata cannot be read or initialized.
    pub fn schema_status(&self) -> Result<SchemaStatus> {
        self.conn
            .execute_batch(CREATE_SCHEMA_MIGRATIONS_SQL)
            .context("failed to apply schema_migrations table")?;
        let (current_version, inferred_from_legacy) = detect_effective_schema_version(&self.conn)?;
        let pending_versions = if current_version < LATEST_SCHEMA_VERSION {
            ((current_version + 1)..=LATEST_SCHEMA_VERSION).collect::<Vec<_>>()
        } else {
            Vec::new()
        };

        Ok(SchemaStatus {
            current_version,
            target_version: LATEST_SCHEMA_VERSION,
            pending_versions,
            inferred_from_legacy,
        })
    }

    /// Apply all forward migrations up to the latest supported schema version.
    ///
    /// # Errors
    /// Returns an error when migration bootstrapping or any migration step fails.
    pub fn migrate(&mut self) -> Result<()> {
        self.conn
            .execute_batch(CREATE_SCHEMA_MIGRATIONS_SQL)
            .context("failed to apply schema_migrations table")?;

        let mut version = current_schema_version(&self.conn)?;

        if version == 0 {
            version = self.bootstrap_schema_version()?;
        }

        if version < 2 {
            self.apply_migration_2()?;
            version = current_schema_version(&self.conn)?;
        }

        if version != LATEST_SCHEMA_VERSION {
            return Err(anyhow!(
                "unsupported schema version {version}; expected {LATEST_SCHEMA_VERSION}"
            ));
        }

        Ok(())
    }

    fn bootstrap_schema_version(&self) -> Result<i64> {
        let has_settings = table_exists(&self.conn, "league_settings")?;

        if !has_settings {
            apply_migration_1(&self.conn)?;
            return Ok(1);
        }

        if table_has_column(&self.conn, "league_settings", "date")? {
            // Database already keyed by date (possibly created by an older
            // scaffold) but missing migration records. Mark version 1 so the
            // v2 step still creates the runners/submissions tables and indexes.
            record_schema_version(&self.conn, 1)?;
            return Ok(1);
        }

        if table_has_column(&self.conn, "league_settings", "week_number")? {
            // Legacy week-keyed table; mark version 1 and allow standard v2 upgrade.
            record_schema_version(&self.conn, 1)?;
            return Ok(1);
        }

        Err(anyhow!(
            "database schema is invalid: league_settings has neither week_number nor date"
        ))
    }

    fn apply_migration_2(&mut self) -> Result<()> {
        if table_has_column(&self.conn, "league_settings", "date")? {
            self.conn
                .execute_batch(MIGRATION_002_CREATE_V2_TABLES_SQL)
                .context("failed to create v2 side tables")?;
            self.conn
                .execute_batch("DROP TABLE league_settings_v2;")
                .context("failed to drop unused v2 staging table")?;
            self.conn
                .execute_batch(MIGRATION_002_FINAL_INDEXES_SQL)
                .context("failed to create v2 indexes")?;
            record_schema_version(&self.conn, 2)?;
            return Ok(());
        }

        if !table_has_column(&self.conn, "league_settings", "week_number")? {
            return Err(anyhow!(
                "cannot apply migration v2: legacy league_settings.week_number column is missing"
            ));
        }

        let tx = self.conn.transaction().context("failed to start migration v2 transaction")?;

        tx.execute_batch(MIGRATION_002_CREATE_V2_TABLES_SQL)
            .context("failed to create v2 staging tables")?;

        {
            let mut stmt = tx.prepare(
                "SELECT week_number, name, value
                 FROM league_settings
                 ORDER BY week_number ASC, name ASC",
            )?;

            let rows = stmt.query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?;

            for row in rows {
                let (week_raw, name, value) = row?;
                let week = u8::try_from(week_raw)
                    .map_err(|_| anyhow!("legacy week_number {week_raw} is out of range"))
                    .and_then(|week| {
                        WeekNumber::new(week)
                            .map_err(|err| anyhow!("legacy week_number {week_raw}: {err}"))
                    })?;
                let date = date_for_week(week);

                tx.execute(
                    "INSERT INTO league_settings_v2(date, name, value) VALUES (?1, ?2, ?3)",
                    params![format_date(date), name, value],
                )
                .context("failed to copy league_settings row into v2")?;
            }
        }

        tx.execute_batch(MIGRATION_002_REPLACE_TABLES_SQL)
            .context("failed to replace legacy league_settings with v2 table")?;
        tx.execute_batch(MIGRATION_002_FINAL_INDEXES_SQL).context("failed to create v2 indexes")?;

        let now = now_rfc3339()?;
        tx.execute(
            "INSERT OR IGNORE INTO schema_migrations(version, applied_at) VALUES (?1, ?2)",
            params![2_i64, now],
        )
        .context("failed to record migration version 2")?;

        tx.commit().context("failed to commit migration v2")?;
        Ok(())
    }

    /// Upsert a validated settings batch for one league period.
    ///
    /// A name collision replaces the value; a value collision within the
    /// period leaves the existing row in place.
    ///
    /// # Errors
    /// Returns an error when batch validation fails or any write fails.
    pub fn upsert_settings(&mut self, period: Date, settings: &[LeagueSetting]) -> Result<()> {
        league_core::validate_settings_batch(settings)
            .map_err(|err| anyhow!("settings validation failed: {err}"))?;

        let tx = self.conn.transaction().context("failed to start transaction")?;
        for setting in settings {
            tx.execute(
                UPSERT_SETTING_SQL,
                params![format_date(period), setting.name.as_str(), setting.value],
            )
            .with_context(|| format!("failed to upsert setting {}", setting.name))?;
        }
        tx.commit().context("failed to commit settings transaction")?;
        Ok(())
    }

    /// Load every setting stored for one league period.
    ///
    /// # Errors
    /// Returns an error when rows cannot be read or decoded.
    pub fn settings_for(&self, period: Date) -> Result<Vec<LeagueSetting>> {
        let mut stmt = self.conn.prepare(
            "SELECT name, value FROM league_settings WHERE date = ?1 ORDER BY name ASC",
        )?;
        let rows = stmt.query_map(params![format_date(period)], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut settings = Vec::new();
        for row in rows {
            let (name_raw, value) = row?;
            let name = SettingName::parse(&name_raw)
                .ok_or_else(|| anyhow!("unknown setting name in store: {name_raw}"))?;
            settings.push(LeagueSetting { name, value });
        }
        Ok(settings)
    }

    /// Delete every setting stored for one league period.
    ///
    /// # Errors
    /// Returns an error when the delete statement fails.
    pub fn clear_settings(&mut self, period: Date) -> Result<usize> {
        let deleted = self
            .conn
            .execute("DELETE FROM league_settings WHERE date = ?1", params![format_date(period)])
            .context("failed to clear league settings")?;
        Ok(deleted)
    }

    /// Register a runner. Re-registering an existing runner is a no-op.
    ///
    /// # Errors
    /// Returns an error when the name is empty or the insert fails.
    pub fn register_runner(&mut self, name: &str, registered_at: OffsetDateTime) -> Result<bool> {
        if name.trim().is_empty() {
            return Err(anyhow!("runner name MUST be provided"));
        }

        let inserted = self
            .conn
            .execute(
                "INSERT OR IGNORE INTO runners(name, registered_at) VALUES (?1, ?2)",
                params![name, rfc3339(registered_at)?],
            )
            .context("failed to register runner")?;
        Ok(inserted == 1)
    }

    /// # Errors
    /// Returns an error when rows cannot be read or decoded.
    pub fn list_runners(&self) -> Result<Vec<RunnerRow>> {
        let mut stmt =
            self.conn.prepare("SELECT name, registered_at FROM runners ORDER BY name ASC")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut runners = Vec::new();
        for row in rows {
            let (name, registered_at_raw) = row?;
            runners.push(RunnerRow { name, registered_at: parse_rfc3339(&registered_at_raw)? });
        }
        Ok(runners)
    }

    /// Persist one race submission.
    ///
    /// # Errors
    /// Returns an error when validation fails, the runner is unknown, or the
    /// runner already submitted for the period.
    pub fn insert_submission(&mut self, submission: &Submission) -> Result<()> {
        submission.validate().map_err(|err| anyhow!("submission validation failed: {err}"))?;

        if !self.runner_exists(&submission.runner)? {
            return Err(anyhow!("runner is not registered: {}", submission.runner));
        }
        if self.submission_exists(submission.date, &submission.runner)? {
            return Err(anyhow!(
                "runner {} already has a submission for {}",
                submission.runner,
                format_date(submission.date)
            ));
        }

        let tx = self.conn.transaction().context("failed to start transaction")?;
        insert_submission_row(&tx, submission)?;
        tx.commit().context("failed to commit submission transaction")?;
        Ok(())
    }

    /// Load every submission for one league period, ordered by runner.
    ///
    /// # Errors
    /// Returns an error when rows cannot be read or decoded.
    pub fn submissions_for(&self, period: Date) -> Result<Vec<Submission>> {
        let mut stmt = self.conn.prepare(
            "SELECT submission_id, date, runner, finish_time, vod, submitted_at
             FROM submissions
             WHERE date = ?1
             ORDER BY runner ASC",
        )?;

        let mut rows = stmt.query(params![format_date(period)])?;
        let mut submissions = Vec::new();

        while let Some(row) = rows.next()? {
            let submission_id_raw: String = row.get(0)?;
            let date_raw: String = row.get(1)?;
            let finish_time_raw: String = row.get(3)?;
            let submitted_at_raw: String = row.get(5)?;

            submissions.push(Submission {
                submission_id: parse_submission_id(&submission_id_raw)?,
                date: parse_date(&date_raw)
                    .map_err(|err| anyhow!("invalid stored period date: {err}"))?,
                runner: row.get(2)?,
                finish_time: finish_time_raw
                    .parse::<RaceTime>()
                    .map_err(|err| anyhow!("invalid stored finish time: {err}"))?,
                vod: row.get(4)?,
                submitted_at: parse_rfc3339(&submitted_at_raw)?,
            });
        }

        Ok(submissions)
    }

    /// Insert a DNF row for every registered runner without a submission on
    /// `period`. Returns the swept runner names.
    ///
    /// # Errors
    /// Returns an error when lookups or inserts fail.
    pub fn sweep_missing(&mut self, period: Date, now: OffsetDateTime) -> Result<Vec<String>> {
        let tx = self.conn.transaction().context("failed to start sweep transaction")?;

        let missing = {
            let mut stmt = tx.prepare(
                "SELECT name FROM runners
                 WHERE name NOT IN (SELECT runner FROM submissions WHERE date = ?1)
                 ORDER BY name ASC",
            )?;
            let rows = stmt.query_map(params![format_date(period)], |row| {
                row.get::<_, String>(0)
            })?;

            let mut names = Vec::new();
            for row in rows {
                names.push(row?);
            }
            names
        };

        for name in &missing {
            let submission = Submission {
                submission_id: SubmissionId::new(),
                date: period,
                runner: name.clone(),
                finish_time: RaceTime::Dnf,
                vod: "n/a".to_string(),
                submitted_at: now,
            };
            insert_submission_row(&tx, &submission)?;
        }

        tx.commit().context("failed to commit sweep transaction")?;
        Ok(missing)
    }

    /// Export settings, runners, and submissions as deterministic NDJSON plus manifest.
    ///
    /// # Errors
    /// Returns an error when export files cannot be created, written, or serialized.
    pub fn export_snapshot(&self, out_dir: &Path) -> Result<ExportManifest> {
        fs::create_dir_all(out_dir)
            .with_context(|| format!("failed to create export directory {}", out_dir.display()))?;

        let settings = self.list_setting_rows()?;
        let runners = self.list_runners()?;
        let submissions = self.list_all_submissions()?;

        let settings_path = out_dir.join("league_settings.ndjson");
        let settings_digest = write_ndjson_file(&settings_path, &settings)?;

        let runners_path = out_dir.join("runners.ndjson");
        let runners_digest = write_ndjson_file(&runners_path, &runners)?;

        let submissions_path = out_dir.join("submissions.ndjson");
        let submissions_digest = write_ndjson_file(&submissions_path, &submissions)?;

        let manifest = ExportManifest {
            schema_version: LATEST_SCHEMA_VERSION,
            exported_at: now_rfc3339()?,
            files: vec![
                ExportFileDigest {
                    path: "league_settings.ndjson".to_string(),
                    sha256: settings_digest.0,
                    records: settings_digest.1,
                },
                ExportFileDigest {
                    path: "runners.ndjson".to_string(),
                    sha256: runners_digest.0,
                    records: runners_digest.1,
                },
                ExportFileDigest {
                    path: "submissions.ndjson".to_string(),
                    sha256: submissions_digest.0,
                    records: submissions_digest.1,
                },
            ],
        };

        let manifest_path = out_dir.join("manifest.json");
        let manifest_json =
            serde_json::to_vec_pretty(&manifest).context("failed to serialize export manifest")?;
        fs::write(&manifest_path, manifest_json).with_context(|| {
            format!("failed to write export manifest {}", manifest_path.display())
        })?;

        Ok(manifest)
    }

    /// Import an exported snapshot directory into this database.
    ///
    /// # Errors
    /// Returns an error when migration, parsing, duplicate handling, or writes fail.
    pub fn import_snapshot(&mut self, in_dir: &Path, skip_existing: bool) -> Result<ImportSummary> {
        self.migrate()?;
        let manifest_path = in_dir.join("manifest.json");
        let manifest = read_export_manifest(&manifest_path)?;
        validate_import_manifest(in_dir, &manifest)?;

        let mut summary = ImportSummary::default();

        for row in read_ndjson_file::<SettingRow>(&in_dir.join("league_settings.ndjson"))? {
            if self.setting_exists(row.date, row.name)? {
                if skip_existing {
                    summary.skipped_existing_settings += 1;
                    continue;
                }
                return Err(anyhow!(
                    "setting already exists for {} on {}",
                    row.name,
                    format_date(row.date)
                ));
            }
            self.conn
                .execute(
                    "INSERT INTO league_settings(date, name, value) VALUES (?1, ?2, ?3)",
                    params![format_date(row.date), row.name.as_str(), row.value],
                )
                .context("failed to import league setting")?;
            summary.imported_settings += 1;
        }

        for row in read_ndjson_file::<RunnerRow>(&in_dir.join("runners.ndjson"))? {
            if self.runner_exists(&row.name)? {
                if skip_existing {
                    summary.skipped_existing_runners += 1;
                    continue;
                }
                return Err(anyhow!("runner already exists: {}", row.name));
            }
            self.register_runner(&row.name, row.registered_at)?;
            summary.imported_runners += 1;
        }

        for submission in read_ndjson_file::<Submission>(&in_dir.join("submissions.ndjson"))? {
            if self.submission_id_exists(submission.submission_id)? {
                if skip_existing {
                    summary.skipped_existing_submissions += 1;
                    continue;
                }
                return Err(anyhow!(
                    "submission already exists: {}",
                    submission.submission_id
                ));
            }
            self.insert_submission(&submission)?;
            summary.imported_submissions += 1;
        }

        Ok(summary)
    }

    /// Create a `SQLite` backup file of the current main database.
    ///
    /// # Errors
    /// Returns an error when backup directories cannot be created or backup fails.
    pub fn backup_database(&self, out_file: &Path) -> Result<()> {
        if let Some(parent) = out_file.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed to create parent directory for backup file {}", out_file.display())
            })?;
        }

        self.conn
            .backup(DatabaseName::Main, out_file, None)
            .with_context(|| format!("failed to create sqlite backup at {}", out_file.display()))
    }

    /// Restore this database from a `SQLite` backup file, then migrate to latest.
    ///
    /// # Errors
    /// Returns an error when the backup file is missing, restore fails, or migrations fail.
    pub fn restore_database(&mut self, in_file: &Path) -> Result<()> {
        if !in_file.exists() {
            return Err(anyhow!("backup file does not exist: {}", in_file.display()));
        }

        self.conn
            .restore(DatabaseName::Main, in_file, None::<fn(rusqlite::backup::Progress)>)
            .with_context(|| {
                format!("failed to restore sqlite backup from {}", in_file.display())
            })?;

        self.migrate()?;
        Ok(())
    }

    /// Run quick-check, foreign-key-check, and schema status health probes.
    ///
    /// # Errors
    /// Returns an error when any integrity probe query fails.
    pub fn integrity_check(&self) -> Result<IntegrityReport> {
        let quick_check_message: String = self
            .conn
            .query_row("PRAGMA quick_check", [], |row| row.get::<_, String>(0))
            .context("failed to run PRAGMA quick_check")?;

        let mut stmt = self
            .conn
            .prepare("PRAGMA foreign_key_check")
            .context("failed to prepare PRAGMA foreign_key_check")?;
        let rows = stmt.query_map([], |row| {
            Ok(ForeignKeyViolation {
                table: row.get(0)?,
                rowid: row.get(1)?,
                parent: row.get(2)?,
                fk_index: row.get(3)?,
            })
        })?;

        let mut foreign_key_violations = Vec::new();
        for row in rows {
            foreign_key_violations.push(row?);
        }

        let schema_status = self.schema_status()?;
        Ok(IntegrityReport {
            quick_check_ok: quick_check_message == "ok",
            quick_check_message,
            foreign_key_violations,
            schema_status,
        })
    }

    fn list_setting_rows(&self) -> Result<Vec<SettingRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT date, name, value FROM league_settings ORDER BY date ASC, name ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;

        let mut settings = Vec::new();
        for row in rows {
            let (date_raw, name_raw, value) = row?;
            let date = parse_date(&date_raw)
                .map_err(|err| anyhow!("invalid stored period date: {err}"))?;
            let name = SettingName::parse(&name_raw)
                .ok_or_else(|| anyhow!("unknown setting name in store: {name_raw}"))?;
            settings.push(SettingRow { date, name, value });
        }
        Ok(settings)
    }

    fn list_all_submissions(&self) -> Result<Vec<Submission>> {
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT date FROM submissions ORDER BY date ASC",
        )?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut dates = Vec::new();
        for row in rows {
            dates.push(row?);
        }

        let mut submissions = Vec::new();
        for date_raw in dates {
            let date = parse_date(&date_raw)
                .map_err(|err| anyhow!("invalid stored period date: {err}"))?;
            submissions.extend(self.submissions_for(date)?);
        }
        Ok(submissions)
    }

    fn setting_exists(&self, period: Date, name: SettingName) -> Result<bool> {
        let exists = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM league_settings WHERE date = ?1 AND name = ?2)",
            params![format_date(period), name.as_str()],
            |row| row.get::<_, i64>(0),
        )?;
        Ok(exists == 1)
    }

    fn runner_exists(&self, name: &str) -> Result<bool> {
        let exists = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM runners WHERE name = ?1)",
            params![name],
            |row| row.get::<_, i64>(0),
        )?;
        Ok(exists == 1)
    }

    fn submission_exists(&self, period: Date, runner: &str) -> Result<bool> {
        let exists = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM submissions WHERE date = ?1 AND runner = ?2)",
            params![format_date(period), runner],
            |row| row.get::<_, i64>(0),
        )?;
        Ok(exists == 1)
    }

    fn submission_id_exists(&self, submission_id: SubmissionId) -> Result<bool> {
        let exists = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM submissions WHERE submission_id = ?1)",
            params![submission_id.to_string()],
            |row| row.get::<_, i64>(0),
        )?;
        Ok(exists == 1)
    }
}

fn apply_migration_1(conn: &Connection) -> Result<()> {
    conn.execute_batch(MIGRATION_001_SQL).context("failed to apply migration v1")?;
    record_schema_version(conn, 1)?;
    Ok(())
}

fn insert_submission_row(tx: &rusqlite::Transaction<'_>, submission: &Submission) -> Result<()> {
    tx.execute(
        "INSERT INTO submissions(
            submission_id, date, runner, finish_time, vod, submitted_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            submission.submission_id.to_string(),
            format_date(submission.date),
            submission.runner,
            submission.finish_time.to_string(),
            submission.vod,
            rfc3339(submission.submitted_at)?,
        ],
    )
    .context("failed to insert submission")?;
    Ok(())
}

fn table_exists(conn: &Connection, table_name: &str) -> Result<bool> {
    let exists = conn
        .query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1)",
            params![table_name],
            |row| row.get::<_, i64>(0),
        )
        .with_context(|| format!("failed to check if table exists: {table_name}"))?;
    Ok(exists == 1)
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> Result<bool> {
    if !table_exists(conn, table)? {
        return Ok(false);
    }

    let mut stmt = conn
        .prepare(&format!("PRAGMA table_info({table})"))
        .with_context(|| format!("failed to inspect table_info for {table}"))?;
    let mut rows = stmt.query([])?;

    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }

    Ok(false)
}

fn current_schema_version(conn: &Connection) -> Result<i64> {
    let version = conn
        .query_row("SELECT COALESCE(MAX(version), 0) FROM schema_migrations", [], |row| {
            row.get::<_, i64>(0)
        })
        .context("failed to read current schema version")?;
    Ok(version)
}

fn detect_effective_schema_version(conn: &Connection) -> Result<(i64, bool)> {
    let recorded = current_schema_version(conn)?;
    if recorded > 0 {
        return Ok((recorded, false));
    }

    if !table_exists(conn, "league_settings")? {
        return Ok((0, false));
    }

    if table_has_column(conn, "league_settings", "date")? {
        // Only a full v2 schema counts; a date-keyed settings table alone
        // still needs the v2 step to create the operations tables.
        if table_exists(conn, "runners")? && table_exists(conn, "submissions")? {
            return Ok((2, true));
        }
        return Ok((1, true));
    }

    if table_has_column(conn, "league_settings", "week_number")? {
        return Ok((1, true));
    }

    Err(anyhow!("database schema is invalid: league_settings has neither week_number nor date"))
}

fn record_schema_version(conn: &Connection, version: i64) -> Result<()> {
    let now = now_rfc3339()?;
    conn.execute(
        "INSERT OR IGNORE INTO schema_migrations(version, applied_at) VALUES (?1, ?2)",
        params![version, now],
    )
    .with_context(|| format!("failed to record migration version {version}"))?;
    Ok(())
}

fn now_rfc3339() -> Result<String> {
    rfc3339(OffsetDateTime::now_utc())
}

fn rfc3339(value: OffsetDateTime) -> Result<String> {
    value
        .format(&time::format_description::well_known::Rfc3339)
        .context("failed to format RFC3339 timestamp")
}

fn parse_rfc3339(value: &str) -> Result<OffsetDateTime> {
    OffsetDateTime::parse(value, &time::format_description::well_known::Rfc3339)
        .with_context(|| format!("invalid RFC3339 timestamp: {value}"))
}

fn parse_submission_id(raw: &str) -> Result<SubmissionId> {
    let parsed = Ulid::from_string(raw).with_context(|| format!("invalid ULID: {raw}"))?;
    Ok(SubmissionId(parsed))
}

fn write_ndjson_file<T: Serialize>(path: &Path, values: &[T]) -> Result<(String, usize)> {
    let file = File::create(path)
        .with_context(|| format!("failed to create export file {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    let mut hasher = Sha256::new();

    for value in values {
        let line = serde_json::to_string(value).context("failed to serialize NDJSON row")?;
        writer
            .write_all(line.as_bytes())
            .with_context(|| format!("failed to write export file {}", path.display()))?;
        writer
            .write_all(b"\n")
            .with_context(|| format!("failed to write export file {}", path.display()))?;
        hasher.update(line.as_bytes());
        hasher.update(b"\n");
    }

    writer.flush().with_context(|| format!("failed to flush export file {}", path.display()))?;

    Ok((format!("{:x}", hasher.finalize()), values.len()))
}

fn read_ndjson_file<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let file = File::open(path)
        .with_context(|| format!("failed to open NDJSON file {}", path.display()))?;
    let reader = BufReader::new(file);
    let mut values = Vec::new();

    for (index, line) in reader.lines().enumerate() {
        let line = line.with_context(|| {
            format!("failed to read line {} from {}", index + 1, path.display())
        })?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let value = serde_json::from_str(trimmed).with_context(|| {
            format!("failed to parse NDJSON row {} from {}", index + 1, path.display())
        })?;
        values.push(value);
    }

    Ok(values)
}

fn read_export_manifest(path: &Path) -> Result<ExportManifest> {
    let bytes = fs::read(path)
        .with_context(|| format!("failed to read manifest file {}", path.display()))?;
    serde_json::from_slice(&bytes)
        .with_context(|| format!("failed to parse manifest JSON {}", path.display()))
}

fn ndjson_digest_and_records(path: &Path) -> Result<(String, usize)> {
    let file = File::open(path)
        .with_context(|| format!("failed to open NDJSON file {}", path.display()))?;
    let reader = BufReader::new(file);
    let mut hasher = Sha256::new();
    let mut records = 0_usize;

    for (index, line) in reader.lines().enumerate() {
        let line = line.with_context(|| {
            format!("failed to read line {} from {}", index + 1, path.display())
        })?;
        hasher.update(line.as_bytes());
        hasher.update(b"\n");
        if !line.trim().is_empty() {
            records += 1;
        }
    }

    Ok((format!("{:x}", hasher.finalize()), records))
}

fn validate_import_manifest(in_dir: &Path, manifest: &ExportManifest) -> Result<()> {
    if manifest.schema_version <= 0 || manifest.schema_version > LATEST_SCHEMA_VERSION {
        return Err(anyhow!(
            "unsupported export schema version {}; supported range is 1..={}",
            manifest.schema_version,
            LATEST_SCHEMA_VERSION
        ));
    }

    let mut by_path: BTreeMap<&str, &ExportFileDigest> = BTreeMap::new();
    for file in &manifest.files {
        if by_path.insert(file.path.as_str(), file).is_some() {
            return Err(anyhow!("manifest contains duplicate file entry: {}", file.path));
        }
    }

    for required in ["league_settings.ndjson", "runners.ndjson", "submissions.ndjson"] {
        let Some(expected) = by_path.get(required) else {
            return Err(anyhow!("manifest is missing required file entry: {required}"));
        };
        let file_path = in_dir.join(required);
        if !file_path.exists() {
            return Err(anyhow!("manifest references missing file {}", file_path.display()));
        }

        let (actual_sha256, actual_records) = ndjson_digest_and_records(&file_path)?;
        if actual_sha256 != expected.sha256 {
            return Err(anyhow!(
                "manifest digest mismatch for {required}: expected {}, got {}",
                expected.sha256,
                actual_sha256
            ));
        }
        if actual_records != expected.records {
            return Err(anyhow!(
                "manifest record count mismatch for {required}: expected {}, got {}",
                expected.records,
                actual_records
            ));
        }
    }

    Ok(())
}
