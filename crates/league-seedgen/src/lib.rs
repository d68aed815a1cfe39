use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

pub const DEFAULT_BASE_URL: &str = "https://orirando.com";

#[derive(Debug, thiserror::Error)]
pub enum SeedgenError {
    #[error("invalid request ({status}): {message}")]
    Client { status: u16, message: String },
    #[error("generator server error ({status}): {message}")]
    Server { status: u16, message: String },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("malformed generator response: {0}")]
    Malformed(String),
}

/// Randomizer logic mode, in increasing trick difficulty.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[serde(rename_all = "snake_case")]
pub enum LogicMode {
    Casual,
    Standard,
    Expert,
    Master,
    Glitched,
}

impl LogicMode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Casual => "Casual",
            Self::Standard => "Standard",
            Self::Expert => "Expert",
            Self::Master => "Master",
            Self::Glitched => "Glitched",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Casual" => Some(Self::Casual),
            "Standard" => Some(Self::Standard),
            "Expert" => Some(Self::Expert),
            "Master" => Some(Self::Master),
            "Glitched" => Some(Self::Glitched),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[serde(rename_all = "snake_case")]
pub enum KeyMode {
    None,
    Shards,
    Limitkeys,
    Clues,
    Free,
}

impl KeyMode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "None",
            Self::Shards => "Shards",
            Self::Limitkeys => "Limitkeys",
            Self::Clues => "Clues",
            Self::Free => "Free",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "None" => Some(Self::None),
            "Shards" => Some(Self::Shards),
            "Limitkeys" => Some(Self::Limitkeys),
            "Clues" => Some(Self::Clues),
            "Free" => Some(Self::Free),
            _ => None,
        }
    }

    fn api_value(self) -> &'static str {
        match self {
            Self::None => "Default",
            Self::Shards => "Shards",
            Self::Limitkeys => "Limitkeys",
            Self::Clues => "Clues",
            Self::Free => "Free",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[serde(rename_all = "snake_case")]
pub enum GoalMode {
    None,
    ForceTrees,
    WorldTour,
    ForceMaps,
    WarmthFrags,
    Bingo,
}

impl GoalMode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "None",
            Self::ForceTrees => "Force Trees",
            Self::WorldTour => "World Tour",
            Self::ForceMaps => "Force Maps",
            Self::WarmthFrags => "Warmth Frags",
            Self::Bingo => "Bingo",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "None" => Some(Self::None),
            "Force Trees" => Some(Self::ForceTrees),
            "World Tour" => Some(Self::WorldTour),
            "Force Maps" => Some(Self::ForceMaps),
            "Warmth Frags" => Some(Self::WarmthFrags),
            "Bingo" => Some(Self::Bingo),
            _ => None,
        }
    }

    fn api_value(self) -> &'static str {
        match self {
            Self::None => "",
            Self::ForceTrees => "ForceTrees",
            Self::WorldTour => "WorldTour",
            Self::ForceMaps => "ForceMaps",
            Self::WarmthFrags => "WarmthFrags",
            Self::Bingo => "Bingo",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Spawn {
    Random,
    Glades,
    Grove,
    Swamp,
    Grotto,
    Forlorn,
    Valley,
    Horu,
    Ginso,
    Sorrow,
    Blackroot,
}

impl Spawn {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Random => "Random",
            Self::Glades => "Glades",
            Self::Grove => "Grove",
            Self::Swamp => "Swamp",
            Self::Grotto => "Grotto",
            Self::Forlorn => "Forlorn",
            Self::Valley => "Valley",
            Self::Horu => "Horu",
            Self::Ginso => "Ginso",
            Self::Sorrow => "Sorrow",
            Self::Blackroot => "Blackroot",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Random" => Some(Self::Random),
            "Glades" => Some(Self::Glades),
            "Grove" => Some(Self::Grove),
            "Swamp" => Some(Self::Swamp),
            "Grotto" => Some(Self::Grotto),
            "Forlorn" => Some(Self::Forlorn),
            "Valley" => Some(Self::Valley),
            "Horu" => Some(Self::Horu),
            "Ginso" => Some(Self::Ginso),
            "Sorrow" => Some(Self::Sorrow),
            "Blackroot" => Some(Self::Blackroot),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Variation {
    Starved,
    Ohko,
    ZeroXp,
    ClosedDungeons,
    ExtraCopies,
    StrictMapstones,
    TpStarved,
    SkipFinalEscape,
    WallStarved,
    GrenadeStarved,
    InLogicWarps,
}

impl Variation {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Starved => "Starved",
            Self::Ohko => "OHKO",
            Self::ZeroXp => "0XP",
            Self::ClosedDungeons => "Closed Dungeons",
            Self::ExtraCopies => "Extra Copies",
            Self::StrictMapstones => "Strict Mapstones",
            Self::TpStarved => "TP Starved",
            Self::SkipFinalEscape => "Skip Final Escape",
            Self::WallStarved => "Wall Starved",
            Self::GrenadeStarved => "Grenade Starved",
            Self::InLogicWarps => "In-Logic Warps",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Starved" => Some(Self::Starved),
            "OHKO" => Some(Self::Ohko),
            "0XP" => Some(Self::ZeroXp),
            "Closed Dungeons" => Some(Self::ClosedDungeons),
            "Extra Copies" => Some(Self::ExtraCopies),
            "Strict Mapstones" => Some(Self::StrictMapstones),
            "TP Starved" => Some(Self::TpStarved),
            "Skip Final Escape" => Some(Self::SkipFinalEscape),
            "Wall Starved" => Some(Self::WallStarved),
            "Grenade Starved" => Some(Self::GrenadeStarved),
            "In-Logic Warps" => Some(Self::InLogicWarps),
            _ => None,
        }
    }

    fn api_value(self) -> &'static str {
        match self {
            Self::Starved => "Starved",
            Self::Ohko => "OHKO",
            Self::ZeroXp => "0XP",
            Self::ClosedDungeons => "ClosedDungeons",
            Self::ExtraCopies => "DoubleSkills",
            Self::StrictMapstones => "StrictMapstones",
            Self::TpStarved => "TPStarved",
            Self::SkipFinalEscape => "GoalModeFinish",
            Self::WallStarved => "WallStarved",
            Self::GrenadeStarved => "GrenadeStarved",
            Self::InLogicWarps => "InLogicWarps",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ItemPool {
    Standard,
    Competitive,
    BonusLite,
    ExtraBonus,
    Hard,
}

impl ItemPool {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Standard => "Standard",
            Self::Competitive => "Competitive",
            Self::BonusLite => "Bonus Lite",
            Self::ExtraBonus => "Extra Bonus",
            Self::Hard => "Hard",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Standard" => Some(Self::Standard),
            "Competitive" => Some(Self::Competitive),
            "Bonus Lite" => Some(Self::BonusLite),
            "Extra Bonus" => Some(Self::ExtraBonus),
            "Hard" => Some(Self::Hard),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
enum PathDifficulty {
    Hard,
}

impl PathDifficulty {
    fn api_value(self) -> &'static str {
        match self {
            Self::Hard => "Hard",
        }
    }
}

/// Individual logic paths the generator understands. Each logic mode expands
/// to the union of its own paths and everything easier.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum LogicPath {
    CasualCore,
    CasualDboost,
    StandardCore,
    StandardDboost,
    StandardLure,
    StandardAbilities,
    ExpertCore,
    ExpertDboost,
    ExpertLure,
    ExpertAbilities,
    MasterCore,
    MasterDboost,
    MasterLure,
    Dbash,
    Gjump,
    Glitched,
    TimedLevel,
    Insane,
}

impl LogicPath {
    #[must_use]
    pub fn api_value(self) -> &'static str {
        match self {
            Self::CasualCore => "casual-core",
            Self::CasualDboost => "casual-dboost",
            Self::StandardCore => "standard-core",
            Self::StandardDboost => "standard-dboost",
            Self::StandardLure => "standard-lure",
            Self::StandardAbilities => "standard-abilities",
            Self::ExpertCore => "expert-core",
            Self::ExpertDboost => "expert-dboost",
            Self::ExpertLure => "expert-lure",
            Self::ExpertAbilities => "expert-abilities",
            Self::MasterCore => "master-core",
            Self::MasterDboost => "master-dboost",
            Self::MasterLure => "master-lure",
            Self::Dbash => "dbash",
            Self::Gjump => "gjump",
            Self::Glitched => "glitched",
            Self::TimedLevel => "timed-level",
            Self::Insane => "insane",
        }
    }
}

const CASUAL_PATHS: &[LogicPath] = &[LogicPath::CasualCore, LogicPath::CasualDboost];
const STANDARD_PATHS: &[LogicPath] = &[
    LogicPath::StandardCore,
    LogicPath::StandardDboost,
    LogicPath::StandardLure,
    LogicPath::StandardAbilities,
];
const EXPERT_PATHS: &[LogicPath] = &[
    LogicPath::ExpertCore,
    LogicPath::ExpertDboost,
    LogicPath::ExpertLure,
    LogicPath::ExpertAbilities,
    LogicPath::Dbash,
];
const MASTER_PATHS: &[LogicPath] =
    &[LogicPath::MasterCore, LogicPath::MasterDboost, LogicPath::MasterLure];
const GLITCHED_PATHS: &[LogicPath] = &[LogicPath::Glitched, LogicPath::TimedLevel];

/// The full set of logic paths a logic mode implies.
#[must_use]
pub fn paths_for(mode: LogicMode) -> Vec<LogicPath> {
    let mut paths = Vec::new();
    paths.extend_from_slice(CASUAL_PATHS);
    if mode == LogicMode::Casual {
        return paths;
    }
    paths.extend_from_slice(STANDARD_PATHS);
    if mode == LogicMode::Standard {
        return paths;
    }
    paths.extend_from_slice(EXPERT_PATHS);
    match mode {
        LogicMode::Master => paths.extend_from_slice(MASTER_PATHS),
        LogicMode::Glitched => paths.extend_from_slice(GLITCHED_PATHS),
        LogicMode::Casual | LogicMode::Standard | LogicMode::Expert => {}
    }
    paths
}

/// One fully specified generator request. Unset knobs fall back to the
/// league defaults (Standard / Clues / Force Trees / Glades / Standard pool).
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct SeedRequest {
    pub seed_name: String,
    pub logic_mode: Option<LogicMode>,
    pub key_mode: Option<KeyMode>,
    pub goal_mode: Option<GoalMode>,
    pub spawn: Option<Spawn>,
    pub variations: Vec<Variation>,
    pub item_pool: Option<ItemPool>,
    pub relic_count: Option<u8>,
}

impl SeedRequest {
    #[must_use]
    pub fn new(seed_name: impl Into<String>) -> Self {
        Self {
            seed_name: seed_name.into(),
            logic_mode: None,
            key_mode: None,
            goal_mode: None,
            spawn: None,
            variations: Vec::new(),
            item_pool: None,
            relic_count: None,
        }
    }

    /// Render the request as sorted, deduplicated query pairs.
    ///
    /// The upstream generator treats repeated `path` and `var` keys as a set,
    /// so ordering only matters for reproducibility of the built URL.
    #[must_use]
    pub fn to_query_pairs(&self) -> Vec<(String, String)> {
        let logic_mode = self.logic_mode.unwrap_or(LogicMode::Standard);
        let key_mode = self.key_mode.unwrap_or(KeyMode::Clues);
        let goal_mode = self.goal_mode.unwrap_or(GoalMode::ForceTrees);
        let spawn = self.spawn.unwrap_or(Spawn::Glades);
        let item_pool = self.item_pool.unwrap_or(ItemPool::Standard);
        let relic_count = self.relic_count.unwrap_or(8);

        let mut pairs = BTreeSet::new();
        pairs.insert(("seed".to_string(), self.seed_name.clone()));

        for path in paths_for(logic_mode) {
            pairs.insert(("path".to_string(), path.api_value().to_string()));
        }

        pairs.insert(("key_mode".to_string(), key_mode.api_value().to_string()));
        if !goal_mode.api_value().is_empty() {
            pairs.insert(("var".to_string(), goal_mode.api_value().to_string()));
        }
        pairs.insert(("pool_preset".to_string(), item_pool.as_str().to_string()));
        pairs.insert(("spawn".to_string(), spawn.as_str().to_string()));

        if goal_mode == GoalMode::WorldTour {
            pairs.insert(("relics".to_string(), relic_count.to_string()));
        }

        for variation in &self.variations {
            pairs.insert(("var".to_string(), variation.api_value().to_string()));
        }

        // Preset-specific tuning mirrored from the generator frontend.
        match logic_mode {
            LogicMode::Casual => {
                pairs.insert(("cell_freq".to_string(), "20".to_string()));
            }
            LogicMode::Standard => {
                pairs.insert(("cell_freq".to_string(), "40".to_string()));
            }
            LogicMode::Expert => {}
            LogicMode::Master => {
                pairs.insert((
                    "path_diff".to_string(),
                    PathDifficulty::Hard.api_value().to_string(),
                ));
                pairs.insert(("var".to_string(), Variation::Starved.api_value().to_string()));
            }
            LogicMode::Glitched => {
                pairs.insert((
                    "path_diff".to_string(),
                    PathDifficulty::Hard.api_value().to_string(),
                ));
            }
        }

        pairs.into_iter().collect()
    }
}

/// A rendered generator request: the derived seed name plus the full URL.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct SeedPlan {
    pub seed_name: String,
    pub url: String,
}

/// Build the generator URL for a request against a base URL.
#[must_use]
pub fn build_plan(base_url: &str, request: &SeedRequest) -> SeedPlan {
    let query = request
        .to_query_pairs()
        .iter()
        .map(|(key, value)| format!("{}={}", percent_encode(key), percent_encode(value)))
        .collect::<Vec<_>>()
        .join("&");

    SeedPlan {
        seed_name: request.seed_name.clone(),
        url: format!("{}/generator/json?{query}", base_url.trim_end_matches('/')),
    }
}

fn percent_encode(value: &str) -> String {
    let mut encoded = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                encoded.push(char::from(byte));
            }
            b' ' => encoded.push('+'),
            other => {
                encoded.push('%');
                encoded.push_str(&format!("{other:02X}"));
            }
        }
    }
    encoded
}

#[derive(Debug, Clone, Deserialize)]
struct PlayerSeed {
    seed: String,
    spoiler_url: String,
}

#[derive(Debug, Clone, Deserialize)]
struct GeneratorResponse {
    players: Vec<PlayerSeed>,
    map_url: String,
    history_url: String,
}

/// The usable parts of a generator response for a single-player seed.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct SeedBundle {
    pub seed_header: String,
    pub seed_body: String,
    pub spoiler_url: String,
    pub map_url: String,
    pub history_url: String,
}

pub struct SeedgenClient {
    base_url: String,
    agent: ureq::Agent,
}

impl SeedgenClient {
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { base_url: base_url.into(), agent: ureq::agent() }
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch the seed a plan describes.
    ///
    /// # Errors
    /// Returns [`SeedgenError::Client`] on 4xx, [`SeedgenError::Server`] on
    /// 5xx, and [`SeedgenError::Transport`]/[`SeedgenError::Malformed`] for
    /// connection or decoding failures.
    pub fn fetch(&self, plan: &SeedPlan) -> Result<SeedBundle, SeedgenError> {
        let response = match self.agent.get(&plan.url).call() {
            Ok(response) => response,
            Err(ureq::Error::Status(status, response)) => {
                let message = response.into_string().unwrap_or_default();
                if (400..500).contains(&status) {
                    return Err(SeedgenError::Client { status, message });
                }
                return Err(SeedgenError::Server { status, message });
            }
            Err(err) => return Err(SeedgenError::Transport(err.to_string())),
        };

        let body: GeneratorResponse = response
            .into_json()
            .map_err(|err| SeedgenError::Malformed(err.to_string()))?;
        bundle_from_response(&self.base_url, &body)
    }
}

fn bundle_from_response(
    base_url: &str,
    response: &GeneratorResponse,
) -> Result<SeedBundle, SeedgenError> {
    let player = response
        .players
        .first()
        .ok_or_else(|| SeedgenError::Malformed("response contains no players".to_string()))?;
    let seed_header = player
        .seed
        .lines()
        .next()
        .ok_or_else(|| SeedgenError::Malformed("player seed is empty".to_string()))?
        .to_string();

    let base = base_url.trim_end_matches('/');
    Ok(SeedBundle {
        seed_header,
        seed_body: player.seed.clone(),
        spoiler_url: format!("{base}{}", player.spoiler_url),
        map_url: format!("{base}{}", response.map_url),
        history_url: format!("{base}{}", response.history_url),
    })
}

impl Display for SeedPlan {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -> {}", self.seed_name, self.url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair_values<'a>(pairs: &'a [(String, String)], key: &str) -> Vec<&'a str> {
        pairs
            .iter()
            .filter(|(pair_key, _)| pair_key == key)
            .map(|(_, value)| value.as_str())
            .collect()
    }

    #[test]
    fn standard_defaults_produce_expected_pairs() {
        let request = SeedRequest::new("12345");
        let pairs = request.to_query_pairs();

        assert_eq!(pair_values(&pairs, "seed"), vec!["12345"]);
        assert_eq!(pair_values(&pairs, "key_mode"), vec!["Clues"]);
        assert_eq!(pair_values(&pairs, "var"), vec!["ForceTrees"]);
        assert_eq!(pair_values(&pairs, "pool_preset"), vec!["Standard"]);
        assert_eq!(pair_values(&pairs, "spawn"), vec!["Glades"]);
        assert_eq!(pair_values(&pairs, "cell_freq"), vec!["40"]);
        assert!(pair_values(&pairs, "relics").is_empty());

        let paths = pair_values(&pairs, "path");
        assert!(paths.contains(&"casual-core"));
        assert!(paths.contains(&"standard-abilities"));
        assert!(!paths.contains(&"expert-core"));
    }

    #[test]
    fn master_adds_hard_paths_and_forced_starved() {
        let mut request = SeedRequest::new("777");
        request.logic_mode = Some(LogicMode::Master);
        let pairs = request.to_query_pairs();

        assert_eq!(pair_values(&pairs, "path_diff"), vec!["Hard"]);
        assert!(pair_values(&pairs, "var").contains(&"Starved"));

        let paths = pair_values(&pairs, "path");
        assert!(paths.contains(&"master-core"));
        assert!(paths.contains(&"dbash"));
        assert!(!paths.contains(&"glitched"));
    }

    #[test]
    fn glitched_inherits_expert_plus_glitched_paths() {
        let paths = paths_for(LogicMode::Glitched);
        assert!(paths.contains(&LogicPath::ExpertCore));
        assert!(paths.contains(&LogicPath::Glitched));
        assert!(paths.contains(&LogicPath::TimedLevel));
        assert!(!paths.contains(&LogicPath::MasterCore));
    }

    #[test]
    fn world_tour_includes_relic_count() {
        let mut request = SeedRequest::new("99");
        request.goal_mode = Some(GoalMode::WorldTour);
        request.relic_count = Some(11);
        let pairs = request.to_query_pairs();
        assert_eq!(pair_values(&pairs, "relics"), vec!["11"]);
        assert!(pair_values(&pairs, "var").contains(&"WorldTour"));
    }

    #[test]
    fn goal_mode_none_emits_no_goal_var() {
        let mut request = SeedRequest::new("99");
        request.goal_mode = Some(GoalMode::None);
        let pairs = request.to_query_pairs();
        assert!(pair_values(&pairs, "var").is_empty());
    }

    #[test]
    fn duplicate_variations_collapse() {
        let mut request = SeedRequest::new("99");
        request.variations = vec![Variation::Ohko, Variation::Ohko, Variation::ZeroXp];
        let pairs = request.to_query_pairs();
        let vars = pair_values(&pairs, "var");
        assert_eq!(vars.iter().filter(|value| **value == "OHKO").count(), 1);
        assert!(vars.contains(&"0XP"));
    }

    #[test]
    fn build_plan_renders_deterministic_url() {
        let mut request = SeedRequest::new("12345");
        request.item_pool = Some(ItemPool::BonusLite);
        let first = build_plan(DEFAULT_BASE_URL, &request);
        let second = build_plan("https://orirando.com/", &request);

        assert_eq!(first.url, second.url);
        assert!(first.url.starts_with("https://orirando.com/generator/json?"));
        assert!(first.url.contains("pool_preset=Bonus+Lite"));
        assert!(first.url.contains("seed=12345"));
    }

    #[test]
    fn display_names_round_trip_through_parse() {
        for mode in [
            LogicMode::Casual,
            LogicMode::Standard,
            LogicMode::Expert,
            LogicMode::Master,
            LogicMode::Glitched,
        ] {
            assert_eq!(LogicMode::parse(mode.as_str()), Some(mode));
        }
        for variation in [
            Variation::Starved,
            Variation::Ohko,
            Variation::ZeroXp,
            Variation::ClosedDungeons,
            Variation::ExtraCopies,
            Variation::StrictMapstones,
            Variation::TpStarved,
            Variation::SkipFinalEscape,
            Variation::WallStarved,
            Variation::GrenadeStarved,
            Variation::InLogicWarps,
        ] {
            assert_eq!(Variation::parse(variation.as_str()), Some(variation));
        }
        assert_eq!(ItemPool::parse("Bonus Lite"), Some(ItemPool::BonusLite));
        assert_eq!(GoalMode::parse("Force Trees"), Some(GoalMode::ForceTrees));
        assert_eq!(LogicMode::parse("casual"), None);
    }

    #[test]
    fn bundle_extracts_header_and_absolute_urls() -> Result<(), SeedgenError> {
        let response = GeneratorResponse {
            players: vec![PlayerSeed {
                seed: "Sync4.1,12345|...\nmore lines".to_string(),
                spoiler_url: "/generator/spoiler/abc".to_string(),
            }],
            map_url: "/generator/map/abc".to_string(),
            history_url: "/generator/history/abc".to_string(),
        };

        let bundle = bundle_from_response(DEFAULT_BASE_URL, &response)?;
        assert_eq!(bundle.seed_header, "Sync4.1,12345|...");
        assert_eq!(bundle.spoiler_url, "https://orirando.com/generator/spoiler/abc");
        assert_eq!(bundle.map_url, "https://orirando.com/generator/map/abc");
        Ok(())
    }

    #[test]
    fn bundle_rejects_empty_player_list() {
        let response = GeneratorResponse {
            players: Vec::new(),
            map_url: String::new(),
            history_url: String::new(),
        };
        assert!(bundle_from_response(DEFAULT_BASE_URL, &response).is_err());
    }
}
