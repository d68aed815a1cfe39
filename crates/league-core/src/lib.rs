use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use time::macros::{date, format_description, offset, time};
use time::{Date, Duration, OffsetDateTime, Time, UtcOffset, Weekday};
use ulid::Ulid;

#[derive(Debug, Clone, thiserror::Error, Eq, PartialEq)]
pub enum LeagueError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("parse error: {0}")]
    Parse(String),
}

/// League weeks roll over on Friday at 21:00 Eastern. The league rules quote
/// the boundary in EST, so the offset is pinned rather than DST-aware.
pub const EASTERN_OFFSET: UtcOffset = offset!(-5);

const WEEK_ROLLOVER: Time = time!(21:00);

/// Weeks above this number belong to the season that started in 2023.
const SEASON_BOUNDARY_WEEK: u8 = 40;

const FIRST_SEASON_ANCHOR: Date = date!(2023 - 01 - 01);
const SECOND_SEASON_ANCHOR: Date = date!(2024 - 01 - 01);

/// Legacy period identifier from the original schema, valid range 1..=52.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct WeekNumber(u8);

impl WeekNumber {
    /// Build a validated week number.
    ///
    /// # Errors
    /// Returns [`LeagueError::Validation`] when the value is outside 1..=52.
    pub fn new(value: u8) -> Result<Self, LeagueError> {
        if !(1..=52).contains(&value) {
            return Err(LeagueError::Validation(format!(
                "week number MUST be in 1..=52 (got {value})"
            )));
        }
        Ok(Self(value))
    }

    #[must_use]
    pub fn get(self) -> u8 {
        self.0
    }
}

impl Display for WeekNumber {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Compute the period date a legacy week number maps to.
///
/// Each season anchors at January 1st of its year and the period date is
/// `anchor + (week - 1) * 7 - 3` days.
#[must_use]
pub fn date_for_week(week: WeekNumber) -> Date {
    let anchor = if week.get() > SEASON_BOUNDARY_WEEK {
        FIRST_SEASON_ANCHOR
    } else {
        SECOND_SEASON_ANCHOR
    };
    anchor + Duration::days(i64::from(week.get()) * 7 - 7 - 3)
}

/// The date of the most recent Friday 21:00 Eastern week rollover.
#[must_use]
pub fn current_period(now: OffsetDateTime) -> Date {
    let local = now.to_offset(EASTERN_OFFSET);
    let mut date = local.date();
    if date.weekday() != Weekday::Friday || local.time() < WEEK_ROLLOVER {
        date = date - Duration::days(1);
        while date.weekday() != Weekday::Friday {
            date = date - Duration::days(1);
        }
    }
    date
}

#[must_use]
pub fn previous_period(period: Date) -> Date {
    period - Duration::days(7)
}

/// Render a period date as `YYYY-MM-DD`, the on-disk and wire representation.
#[must_use]
pub fn format_date(date: Date) -> String {
    format!("{:04}-{:02}-{:02}", date.year(), u8::from(date.month()), date.day())
}

/// Parse a `YYYY-MM-DD` period date.
///
/// # Errors
/// Returns [`LeagueError::Parse`] when the input is not a valid calendar date.
pub fn parse_date(value: &str) -> Result<Date, LeagueError> {
    let format = format_description!("[year]-[month]-[day]");
    Date::parse(value, &format)
        .map_err(|err| LeagueError::Parse(format!("invalid period date {value:?}: {err}")))
}

/// Derive the deterministic seed name for a period.
///
/// Every runner racing the same week gets the same seed, so the name is a
/// stable function of the period date mapped into 1..=10^9.
#[must_use]
pub fn derive_seed_name(period: Date) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format_date(period).as_bytes());
    let digest = hasher.finalize();
    let mut prefix = [0_u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    let value = u64::from_be_bytes(prefix) % 1_000_000_000 + 1;
    value.to_string()
}

/// The randomizer knobs a league administrator can pin for a week.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SettingName {
    LogicMode,
    KeyMode,
    GoalMode,
    Spawn,
    Variation1,
    Variation2,
    Variation3,
    ItemPool,
    RelicCount,
}

impl SettingName {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::LogicMode => "logic_mode",
            Self::KeyMode => "key_mode",
            Self::GoalMode => "goal_mode",
            Self::Spawn => "spawn",
            Self::Variation1 => "variation1",
            Self::Variation2 => "variation2",
            Self::Variation3 => "variation3",
            Self::ItemPool => "item_pool",
            Self::RelicCount => "relic_count",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "logic_mode" => Some(Self::LogicMode),
            "key_mode" => Some(Self::KeyMode),
            "goal_mode" => Some(Self::GoalMode),
            "spawn" => Some(Self::Spawn),
            "variation1" => Some(Self::Variation1),
            "variation2" => Some(Self::Variation2),
            "variation3" => Some(Self::Variation3),
            "item_pool" => Some(Self::ItemPool),
            "relic_count" => Some(Self::RelicCount),
            _ => None,
        }
    }

    /// Variation slots carry extra seed variations rather than scalar knobs.
    #[must_use]
    pub fn is_variation(self) -> bool {
        matches!(self, Self::Variation1 | Self::Variation2 | Self::Variation3)
    }
}

impl Display for SettingName {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One key/value settings row scoped to a league period.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct LeagueSetting {
    pub name: SettingName,
    pub value: String,
}

impl LeagueSetting {
    /// Validate the row shape independent of the randomizer vocabulary.
    ///
    /// # Errors
    /// Returns [`LeagueError::Validation`] when the value is empty.
    pub fn validate(&self) -> Result<(), LeagueError> {
        if self.value.trim().is_empty() {
            return Err(LeagueError::Validation(format!(
                "setting {} MUST have a non-empty value",
                self.name
            )));
        }
        Ok(())
    }
}

/// Reject batches that would violate the per-period uniqueness invariants.
///
/// # Errors
/// Returns [`LeagueError::Validation`] on an empty value, a repeated setting
/// name, or a repeated value within the batch.
pub fn validate_settings_batch(settings: &[LeagueSetting]) -> Result<(), LeagueError> {
    let mut names = std::collections::BTreeSet::new();
    let mut values = std::collections::BTreeSet::new();
    for setting in settings {
        setting.validate()?;
        if !names.insert(setting.name) {
            return Err(LeagueError::Validation(format!(
                "setting {} appears more than once in the batch",
                setting.name
            )));
        }
        if !values.insert(setting.value.as_str()) {
            return Err(LeagueError::Validation(format!(
                "value {:?} appears more than once in the batch",
                setting.value
            )));
        }
    }
    Ok(())
}

/// A LiveSplit-style race result: either a finish time or a DNF.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[serde(try_from = "String", into = "String")]
pub enum RaceTime {
    Dnf,
    Time { hours: u32, minutes: u8, seconds: u8, millis: u16 },
}

impl RaceTime {
    #[must_use]
    pub fn is_dnf(self) -> bool {
        matches!(self, Self::Dnf)
    }
}

impl FromStr for RaceTime {
    type Err = LeagueError;

    /// Accepts `dnf` (any case) or `[H:]MM:SS[.mmm]`, e.g. `40:43`,
    /// `1:40:43` or `1:40:43.630`.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if value.eq_ignore_ascii_case("dnf") {
            return Ok(Self::Dnf);
        }

        let bad = || LeagueError::Parse(format!("invalid race time {value:?}"));

        let (clock, millis_raw) = match value.split_once('.') {
            Some((clock, millis)) => (clock, Some(millis)),
            None => (value, None),
        };

        let parts = clock.split(':').collect::<Vec<_>>();
        let (hours_raw, minutes_raw, seconds_raw) = match parts.as_slice() {
            [minutes, seconds] => ("0", *minutes, *seconds),
            [hours, minutes, seconds] => (*hours, *minutes, *seconds),
            _ => return Err(bad()),
        };

        if hours_raw.is_empty() || !hours_raw.bytes().all(|byte| byte.is_ascii_digit()) {
            return Err(bad());
        }
        for field in [minutes_raw, seconds_raw] {
            if field.len() != 2 || !field.bytes().all(|byte| byte.is_ascii_digit()) {
                return Err(bad());
            }
        }

        let hours = hours_raw.parse::<u32>().map_err(|_| bad())?;
        let minutes = minutes_raw.parse::<u8>().map_err(|_| bad())?;
        let seconds = seconds_raw.parse::<u8>().map_err(|_| bad())?;
        if minutes > 59 || seconds > 59 {
            return Err(bad());
        }

        let millis = match millis_raw {
            Some(digits) => {
                if digits.is_empty() || !digits.bytes().all(|byte| byte.is_ascii_digit()) {
                    return Err(bad());
                }
                let truncated = &digits[..digits.len().min(3)];
                truncated.parse::<u16>().map_err(|_| bad())?
            }
            None => 0,
        };

        Ok(Self::Time { hours, minutes, seconds, millis })
    }
}

impl Display for RaceTime {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Dnf => f.write_str("DNF"),
            Self::Time { hours, minutes, seconds, millis } => {
                write!(f, "{hours:02}:{minutes:02}:{seconds:02}.{millis:03}")
            }
        }
    }
}

impl From<RaceTime> for String {
    fn from(value: RaceTime) -> Self {
        value.to_string()
    }
}

impl TryFrom<String> for RaceTime {
    type Error = LeagueError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct SubmissionId(pub Ulid);

impl SubmissionId {
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for SubmissionId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for SubmissionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One runner's race result for a period.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct Submission {
    pub submission_id: SubmissionId,
    pub date: Date,
    pub runner: String,
    pub finish_time: RaceTime,
    pub vod: String,
    #[serde(with = "time::serde::rfc3339")]
    pub submitted_at: OffsetDateTime,
}

impl Submission {
    /// # Errors
    /// Returns [`LeagueError::Validation`] when the runner or vod is empty.
    pub fn validate(&self) -> Result<(), LeagueError> {
        if self.runner.trim().is_empty() {
            return Err(LeagueError::Validation("runner MUST be provided".to_string()));
        }
        if self.vod.trim().is_empty() {
            return Err(LeagueError::Validation("vod MUST be provided".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn week_number_rejects_out_of_range_values() {
        assert!(WeekNumber::new(0).is_err());
        assert!(WeekNumber::new(53).is_err());
        assert!(WeekNumber::new(1).is_ok());
        assert!(WeekNumber::new(52).is_ok());
    }

    #[test]
    fn date_for_week_matches_backfill_rule_above_boundary() -> Result<(), LeagueError> {
        let week = WeekNumber::new(41)?;
        assert_eq!(date_for_week(week), date!(2023 - 10 - 05));
        Ok(())
    }

    #[test]
    fn date_for_week_matches_backfill_rule_at_or_below_boundary() -> Result<(), LeagueError> {
        let week = WeekNumber::new(1)?;
        assert_eq!(date_for_week(week), date!(2023 - 12 - 29));
        let week = WeekNumber::new(40)?;
        assert_eq!(date_for_week(week), date!(2024 - 09 - 27));
        Ok(())
    }

    #[test]
    fn week_one_backfill_lands_on_a_friday() -> Result<(), LeagueError> {
        let week = WeekNumber::new(1)?;
        assert_eq!(date_for_week(week).weekday(), Weekday::Friday);
        Ok(())
    }

    #[test]
    fn current_period_rolls_over_friday_evening() {
        // 2024-01-05 is a Friday.
        let before = datetime!(2024 - 01 - 05 20:59 -5);
        assert_eq!(current_period(before), date!(2023 - 12 - 29));

        let after = datetime!(2024 - 01 - 05 21:00 -5);
        assert_eq!(current_period(after), date!(2024 - 01 - 05));
    }

    #[test]
    fn current_period_uses_eastern_not_utc() {
        // Friday 21:30 Eastern expressed in UTC (Saturday 02:30).
        let now = datetime!(2024 - 01 - 06 02:30 UTC);
        assert_eq!(current_period(now), date!(2024 - 01 - 05));
    }

    #[test]
    fn current_period_midweek_points_at_last_friday() {
        let wednesday = datetime!(2024 - 01 - 10 12:00 -5);
        assert_eq!(current_period(wednesday), date!(2024 - 01 - 05));
    }

    #[test]
    fn previous_period_steps_back_one_week() {
        assert_eq!(previous_period(date!(2024 - 01 - 05)), date!(2023 - 12 - 29));
    }

    #[test]
    fn format_and_parse_date_round_trip() -> Result<(), LeagueError> {
        let formatted = format_date(date!(2023 - 10 - 05));
        assert_eq!(formatted, "2023-10-05");
        assert_eq!(parse_date(&formatted)?, date!(2023 - 10 - 05));
        Ok(())
    }

    #[test]
    fn parse_date_rejects_garbage() {
        assert!(parse_date("not-a-date").is_err());
        assert!(parse_date("2023-13-01").is_err());
    }

    #[test]
    fn derive_seed_name_is_stable_and_bounded() {
        let first = derive_seed_name(date!(2024 - 01 - 05));
        let again = derive_seed_name(date!(2024 - 01 - 05));
        assert_eq!(first, again);

        let other = derive_seed_name(date!(2024 - 01 - 12));
        assert_ne!(first, other);

        for name in [first, other] {
            let value = name.parse::<u64>().unwrap_or(0);
            assert!((1..=1_000_000_000).contains(&value));
        }
    }

    #[test]
    fn race_time_parses_livesplit_formats() -> Result<(), LeagueError> {
        assert_eq!(
            "40:43".parse::<RaceTime>()?,
            RaceTime::Time { hours: 0, minutes: 40, seconds: 43, millis: 0 }
        );
        assert_eq!(
            "1:40:43".parse::<RaceTime>()?,
            RaceTime::Time { hours: 1, minutes: 40, seconds: 43, millis: 0 }
        );
        assert_eq!(
            "1:40:43.630".parse::<RaceTime>()?,
            RaceTime::Time { hours: 1, minutes: 40, seconds: 43, millis: 630 }
        );
        assert_eq!("dnf".parse::<RaceTime>()?, RaceTime::Dnf);
        assert_eq!("DNF".parse::<RaceTime>()?, RaceTime::Dnf);
        Ok(())
    }

    #[test]
    fn race_time_truncates_extra_millisecond_digits() -> Result<(), LeagueError> {
        assert_eq!(
            "1:40:43.630999".parse::<RaceTime>()?,
            RaceTime::Time { hours: 1, minutes: 40, seconds: 43, millis: 630 }
        );
        Ok(())
    }

    #[test]
    fn race_time_rejects_bad_input() {
        for input in ["", "40", "1:2:3", "60:00", "00:60", "40:43.", "40:43.x", "4O:43"] {
            assert!(input.parse::<RaceTime>().is_err(), "expected rejection for {input:?}");
        }
    }

    #[test]
    fn race_time_display_matches_leaderboard_format() {
        let time = RaceTime::Time { hours: 1, minutes: 4, seconds: 3, millis: 5 };
        assert_eq!(time.to_string(), "01:04:03.005");
        assert_eq!(RaceTime::Dnf.to_string(), "DNF");
    }

    #[test]
    fn race_time_serde_round_trips_as_string() {
        let time = RaceTime::Time { hours: 0, minutes: 40, seconds: 43, millis: 630 };
        let json = serde_json::to_string(&time).unwrap_or_default();
        assert_eq!(json, "\"00:40:43.630\"");
        let parsed: RaceTime = serde_json::from_str(&json).unwrap_or(RaceTime::Dnf);
        assert_eq!(parsed, time);
    }

    #[test]
    fn settings_batch_rejects_duplicate_names_and_values() {
        let duplicate_name = vec![
            LeagueSetting { name: SettingName::LogicMode, value: "Standard".to_string() },
            LeagueSetting { name: SettingName::LogicMode, value: "Expert".to_string() },
        ];
        assert!(validate_settings_batch(&duplicate_name).is_err());

        let duplicate_value = vec![
            LeagueSetting { name: SettingName::LogicMode, value: "Standard".to_string() },
            LeagueSetting { name: SettingName::ItemPool, value: "Standard".to_string() },
        ];
        assert!(validate_settings_batch(&duplicate_value).is_err());

        let valid = vec![
            LeagueSetting { name: SettingName::LogicMode, value: "Expert".to_string() },
            LeagueSetting { name: SettingName::ItemPool, value: "Standard".to_string() },
        ];
        assert!(validate_settings_batch(&valid).is_ok());
    }

    #[test]
    fn submission_requires_runner_and_vod() {
        let submission = Submission {
            submission_id: SubmissionId::new(),
            date: date!(2024 - 01 - 05),
            runner: String::new(),
            finish_time: RaceTime::Dnf,
            vod: "n/a".to_string(),
            submitted_at: OffsetDateTime::now_utc(),
        };
        assert!(submission.validate().is_err());

        let submission = Submission { runner: "fronkey".to_string(), ..submission };
        assert!(submission.validate().is_ok());
    }
}
