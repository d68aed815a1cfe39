use std::path::PathBuf;

use anyhow::{anyhow, Result};
use league_core::{
    current_period, derive_seed_name, previous_period, LeagueSetting, RaceTime, SettingName,
    Submission, SubmissionId,
};
use league_seedgen::{
    build_plan, GoalMode, ItemPool, KeyMode, LogicMode, SeedPlan, SeedRequest, Spawn, Variation,
    DEFAULT_BASE_URL,
};
use league_store_sqlite::{RunnerRow, SchemaStatus, SqliteStore};
use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};

pub const API_CONTRACT_VERSION: &str = "api.v1";

const MIN_RELIC_COUNT: u8 = 1;
const MAX_RELIC_COUNT: u8 = 11;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MigrateResult {
    pub dry_run: bool,
    pub current_version: i64,
    pub target_version: i64,
    pub would_apply_versions: Vec<i64>,
    pub inferred_from_legacy: bool,
    pub after_version: Option<i64>,
    pub up_to_date: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SetSettingsRequest {
    pub date: Option<Date>,
    pub settings: Vec<LeagueSetting>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SettingsView {
    pub date: Date,
    pub settings: Vec<LeagueSetting>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClearResult {
    pub date: Date,
    pub deleted: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SeedPlanRequest {
    pub date: Option<Date>,
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RegisterRunnerResult {
    pub name: String,
    pub newly_registered: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SubmitRequest {
    pub date: Option<Date>,
    pub runner: String,
    pub time: String,
    pub vod: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SweepReport {
    pub date: Date,
    pub swept: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct LeagueApi {
    db_path: PathBuf,
}

impl LeagueApi {
    #[must_use]
    pub fn new(db_path: PathBuf) -> Self {
        Self { db_path }
    }

    fn open_store(&self) -> Result<SqliteStore> {
        SqliteStore::open(&self.db_path)
    }

    fn open_migrated_store(&self) -> Result<SqliteStore> {
        let mut store = self.open_store()?;
        store.migrate()?;
        Ok(store)
    }

    /// Inspect schema status without mutating data.
    ///
    /// # Errors
    /// Returns an error when the `SQLite` database cannot be opened or queried.
    pub fn schema_status(&self) -> Result<SchemaStatus> {
        let store = self.open_store()?;
        store.schema_status()
    }

    /// Apply pending migrations, or return planned versions for dry-run mode.
    ///
    /// # Errors
    /// Returns an error when migration planning or execution fails.
    pub fn migrate(&self, dry_run: bool) -> Result<MigrateResult> {
        let mut store = self.open_store()?;
        let before = store.schema_status()?;
        if dry_run {
            return Ok(MigrateResult {
                dry_run: true,
                current_version: before.current_version,
                target_version: before.target_version,
                would_apply_versions: before.pending_versions,
                inferred_from_legacy: before.inferred_from_legacy,
                after_version: None,
                up_to_date: None,
            });
        }

        let planned_versions = before.pending_versions;
        store.migrate()?;
        let after = store.schema_status()?;
        Ok(MigrateResult {
            dry_run: false,
            current_version: before.current_version,
            target_version: before.target_version,
            would_apply_versions: planned_versions,
            inferred_from_legacy: before.inferred_from_legacy,
            after_version: Some(after.current_version),
            up_to_date: Some(after.pending_versions.is_empty()),
        })
    }

    /// Validate and upsert a settings batch for a league period.
    ///
    /// The period defaults to the current league week.
    ///
    /// # Errors
    /// Returns an error when a value is not part of the randomizer vocabulary
    /// or persistence fails.
    pub fn set_settings(&self, input: SetSettingsRequest) -> Result<SettingsView> {
        let period = resolve_period(input.date);
        for setting in &input.settings {
            validate_setting_value(setting)?;
        }

        let mut store = self.open_migrated_store()?;
        store.upsert_settings(period, &input.settings)?;
        Ok(SettingsView { date: period, settings: store.settings_for(period)? })
    }

    /// # Errors
    /// Returns an error when the store cannot be read.
    pub fn view_settings(&self, date: Option<Date>) -> Result<SettingsView> {
        let period = resolve_period(date);
        let store = self.open_migrated_store()?;
        Ok(SettingsView { date: period, settings: store.settings_for(period)? })
    }

    /// # Errors
    /// Returns an error when the delete fails.
    pub fn clear_settings(&self, date: Option<Date>) -> Result<ClearResult> {
        let period = resolve_period(date);
        let mut store = self.open_migrated_store()?;
        let deleted = store.clear_settings(period)?;
        Ok(ClearResult { date: period, deleted })
    }

    /// Build the generator plan for a period from its stored settings.
    ///
    /// Knobs without a stored setting use the league defaults; the seed name
    /// is derived deterministically from the period date.
    ///
    /// # Errors
    /// Returns an error when a stored value no longer parses or the store
    /// cannot be read.
    pub fn seed_plan(&self, input: SeedPlanRequest) -> Result<SeedPlan> {
        let period = resolve_period(input.date);
        let store = self.open_migrated_store()?;
        let settings = store.settings_for(period)?;
        let request = build_seed_request(period, &settings)?;
        let base_url = input.base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        Ok(build_plan(&base_url, &request))
    }

    /// # Errors
    /// Returns an error when the name is empty or persistence fails.
    pub fn register_runner(&self, name: &str) -> Result<RegisterRunnerResult> {
        let mut store = self.open_migrated_store()?;
        let newly_registered = store.register_runner(name, OffsetDateTime::now_utc())?;
        Ok(RegisterRunnerResult { name: name.to_string(), newly_registered })
    }

    /// # Errors
    /// Returns an error when the store cannot be read.
    pub fn list_runners(&self) -> Result<Vec<RunnerRow>> {
        let store = self.open_migrated_store()?;
        store.list_runners()
    }

    /// Record one race result for a period. The period defaults to the
    /// current league week.
    ///
    /// # Errors
    /// Returns an error when the time fails to parse, the runner is unknown,
    /// or the runner already submitted for the period.
    pub fn submit(&self, input: SubmitRequest) -> Result<Submission> {
        let period = resolve_period(input.date);
        let finish_time = input
            .time
            .parse::<RaceTime>()
            .map_err(|err| anyhow!("invalid race time: {err}"))?;

        let submission = Submission {
            submission_id: SubmissionId::new(),
            date: period,
            runner: input.runner,
            finish_time,
            vod: input.vod,
            submitted_at: OffsetDateTime::now_utc(),
        };

        let mut store = self.open_migrated_store()?;
        store.insert_submission(&submission)?;
        Ok(submission)
    }

    /// # Errors
    /// Returns an error when the store cannot be read.
    pub fn submissions(&self, date: Option<Date>) -> Result<Vec<Submission>> {
        let period = resolve_period(date);
        let store = self.open_migrated_store()?;
        store.submissions_for(period)
    }

    /// Insert DNF rows for registered runners who never submitted.
    ///
    /// Defaults to the previous league week, matching the weekly rollover
    /// task this replaces.
    ///
    /// # Errors
    /// Returns an error when lookups or inserts fail.
    pub fn sweep(&self, date: Option<Date>) -> Result<SweepReport> {
        let period = date
            .unwrap_or_else(|| previous_period(current_period(OffsetDateTime::now_utc())));
        let mut store = self.open_migrated_store()?;
        let swept = store.sweep_missing(period, OffsetDateTime::now_utc())?;
        Ok(SweepReport { date: period, swept })
    }
}

fn resolve_period(date: Option<Date>) -> Date {
    date.unwrap_or_else(|| current_period(OffsetDateTime::now_utc()))
}

fn validate_setting_value(setting: &LeagueSetting) -> Result<()> {
    let value = setting.value.as_str();
    let known = match setting.name {
        SettingName::LogicMode => LogicMode::parse(value).is_some(),
        SettingName::KeyMode => KeyMode::parse(value).is_some(),
        SettingName::GoalMode => GoalMode::parse(value).is_some(),
        SettingName::Spawn => Spawn::parse(value).is_some(),
        SettingName::Variation1 | SettingName::Variation2 | SettingName::Variation3 => {
            Variation::parse(value).is_some()
        }
        SettingName::ItemPool => ItemPool::parse(value).is_some(),
        SettingName::RelicCount => value
            .parse::<u8>()
            .is_ok_and(|count| (MIN_RELIC_COUNT..=MAX_RELIC_COUNT).contains(&count)),
    };

    if known {
        Ok(())
    } else {
        Err(anyhow!("invalid value {value:?} for setting {}", setting.name))
    }
}

fn build_seed_request(period: Date, settings: &[LeagueSetting]) -> Result<SeedRequest> {
    let mut request = SeedRequest::new(derive_seed_name(period));

    for setting in settings {
        let value = setting.value.as_str();
        let unknown = || anyhow!("stored value {value:?} for setting {} is unknown", setting.name);

        match setting.name {
            SettingName::LogicMode => {
                request.logic_mode = Some(LogicMode::parse(value).ok_or_else(unknown)?);
            }
            SettingName::KeyMode => {
                request.key_mode = Some(KeyMode::parse(value).ok_or_else(unknown)?);
            }
            SettingName::GoalMode => {
                request.goal_mode = Some(GoalMode::parse(value).ok_or_else(unknown)?);
            }
            SettingName::Spawn => {
                request.spawn = Some(Spawn::parse(value).ok_or_else(unknown)?);
            }
            SettingName::Variation1 | SettingName::Variation2 | SettingName::Variation3 => {
                request.variations.push(Variation::parse(value).ok_or_else(unknown)?);
            }
            SettingName::ItemPool => {
                request.item_pool = Some(ItemPool::parse(value).ok_or_else(unknown)?);
            }
            SettingName::RelicCount => {
                request.relic_count = Some(value.parse::<u8>().map_err(|_| unknown())?);
            }
        }
    }

    Ok(request)
}
