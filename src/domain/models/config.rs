use serde::{Deserialize, Serialize};

use super::task::RuleKind;

/// Main configuration structure for squadforge
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Scoring tables: rule multipliers, AIM scale, capacity ceilings, reward factors
    #[serde(default)]
    pub scoring: ScoringConfig,

    /// Level curves, reputation decay and guild bands
    #[serde(default)]
    pub progression: ProgressionConfig,

    /// Sprint clock settings
    #[serde(default)]
    pub sprint: SprintConfig,

    /// Persistence queue and change feed settings
    #[serde(default)]
    pub sync: SyncConfig,
}

/// Database configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DatabaseConfig {
    /// Path to `SQLite` database file
    #[serde(default = "default_database_path")]
    pub path: String,

    /// Maximum number of database connections in pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_database_path() -> String {
    ".squadforge/squadforge.db".to_string()
}

const fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            max_connections: default_max_connections(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Directory for rolling log files; stdout only when unset
    #[serde(default)]
    pub log_dir: Option<String>,

    /// Number of days to retain logs
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
}

fn default_log_level() -> String {
    "warn".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

const fn default_retention_days() -> u32 {
    30
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
            retention_days: default_retention_days(),
        }
    }
}

/// Multiplier snapshotted onto a task when a collaboration rule is chosen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleMultipliers {
    #[serde(default = "default_multiplier")]
    pub integrated: f64,
    #[serde(default = "default_multiplier")]
    pub negotiated: f64,
    #[serde(default = "default_multiplier")]
    pub fixed: f64,
}

const fn default_multiplier() -> f64 {
    1.0
}

impl Default for RuleMultipliers {
    fn default() -> Self {
        Self {
            integrated: 1.0,
            negotiated: 1.0,
            fixed: 1.0,
        }
    }
}

impl RuleMultipliers {
    pub fn for_kind(&self, kind: RuleKind) -> f64 {
        match kind {
            RuleKind::Integrated => self.integrated,
            RuleKind::Negotiated => self.negotiated,
            RuleKind::Fixed => self.fixed,
        }
    }
}

/// One entry of the ordinal AIM rating scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AimOption {
    pub value: u8,
    pub label: String,
    pub multiplier: f64,
    /// Reputation stars (1-5) this rating contributes
    pub stars: u8,
}

impl AimOption {
    fn new(value: u8, label: &str, multiplier: f64, stars: u8) -> Self {
        Self {
            value,
            label: label.to_string(),
            multiplier,
            stars,
        }
    }
}

fn default_aim_scale() -> Vec<AimOption> {
    vec![
        AimOption::new(0, "Below expectations", 0.5, 1),
        AimOption::new(1, "Meets expectations", 1.0, 3),
        AimOption::new(2, "Above expectations", 1.2, 4),
        AimOption::new(3, "Outstanding", 1.5, 5),
    ]
}

const fn default_neutral_aim() -> u8 {
    1
}

/// PA ceiling for one building level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelCeiling {
    pub level: u32,
    pub max_points: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapacityConfig {
    #[serde(default = "default_ceilings")]
    pub ceilings: Vec<LevelCeiling>,

    /// Ceiling used for levels missing from `ceilings`
    #[serde(default = "default_fallback_ceiling")]
    pub fallback: u64,
}

fn default_ceilings() -> Vec<LevelCeiling> {
    [(1, 100), (2, 250), (3, 500), (4, 1000), (5, 2500)]
        .into_iter()
        .map(|(level, max_points)| LevelCeiling { level, max_points })
        .collect()
}

const fn default_fallback_ceiling() -> u64 {
    99_999
}

impl Default for CapacityConfig {
    fn default() -> Self {
        Self {
            ceilings: default_ceilings(),
            fallback: default_fallback_ceiling(),
        }
    }
}

impl CapacityConfig {
    pub fn ceiling_for(&self, level: u32) -> u64 {
        self.ceilings
            .iter()
            .find(|c| c.level == level)
            .map_or(self.fallback, |c| c.max_points)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ScoringConfig {
    #[serde(default)]
    pub rule_multipliers: RuleMultipliers,

    #[serde(default = "default_aim_scale")]
    pub aim_scale: Vec<AimOption>,

    /// Rating applied when the grader omits one
    #[serde(default = "default_neutral_aim")]
    pub neutral_aim: u8,

    #[serde(default)]
    pub capacity: CapacityConfig,

    #[serde(default = "default_xp_per_point")]
    pub xp_per_point: u64,

    #[serde(default = "default_coins_per_point")]
    pub coins_per_point: u64,

    /// Days a deadline moves forward when a routine is renewed
    #[serde(default = "default_renewal_extension_days")]
    pub renewal_extension_days: i64,
}

const fn default_xp_per_point() -> u64 {
    10
}

const fn default_coins_per_point() -> u64 {
    1
}

const fn default_renewal_extension_days() -> i64 {
    7
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            rule_multipliers: RuleMultipliers::default(),
            aim_scale: default_aim_scale(),
            neutral_aim: default_neutral_aim(),
            capacity: CapacityConfig::default(),
            xp_per_point: default_xp_per_point(),
            coins_per_point: default_coins_per_point(),
            renewal_extension_days: default_renewal_extension_days(),
        }
    }
}

/// Geometric level curve: threshold(level) = floor(base × growth^(level−1)).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LevelCurve {
    pub base_xp: u64,
    pub growth: f64,
}

impl LevelCurve {
    pub const fn new(base_xp: u64, growth: f64) -> Self {
        Self { base_xp, growth }
    }
}

/// Guild level band: total XP needed to reach `level`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuildBand {
    pub level: u32,
    pub min_xp: u64,
}

fn default_guild_bands() -> Vec<GuildBand> {
    [(1, 0), (2, 10_000), (3, 50_000), (4, 150_000)]
        .into_iter()
        .map(|(level, min_xp)| GuildBand { level, min_xp })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ProgressionConfig {
    #[serde(default = "default_player_curve")]
    pub player_curve: LevelCurve,

    #[serde(default = "default_squad_curve")]
    pub squad_curve: LevelCurve,

    /// Weight kept from the previous reputation on each update
    #[serde(default = "default_reputation_decay")]
    pub reputation_decay: f64,

    #[serde(default = "default_guild_bands")]
    pub guild_bands: Vec<GuildBand>,
}

const fn default_player_curve() -> LevelCurve {
    LevelCurve::new(1000, 1.2)
}

const fn default_squad_curve() -> LevelCurve {
    LevelCurve::new(2000, 1.5)
}

const fn default_reputation_decay() -> f64 {
    0.95
}

impl Default for ProgressionConfig {
    fn default() -> Self {
        Self {
            player_curve: default_player_curve(),
            squad_curve: default_squad_curve(),
            reputation_decay: default_reputation_decay(),
            guild_bands: default_guild_bands(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SprintConfig {
    #[serde(default = "default_sprint_duration_days")]
    pub duration_days: i64,

    /// How often a running session checks whether a sprint elapsed
    #[serde(default = "default_check_interval_secs")]
    pub check_interval_secs: u64,
}

const fn default_sprint_duration_days() -> i64 {
    14
}

const fn default_check_interval_secs() -> u64 {
    60
}

impl Default for SprintConfig {
    fn default() -> Self {
        Self {
            duration_days: default_sprint_duration_days(),
            check_interval_secs: default_check_interval_secs(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SyncConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// Window over which change notifications are coalesced into one reload
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

const fn default_max_retries() -> u32 {
    3
}

const fn default_initial_backoff_ms() -> u64 {
    100
}

const fn default_max_backoff_ms() -> u64 {
    5_000
}

const fn default_debounce_ms() -> u64 {
    1_000
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            debounce_ms: default_debounce_ms(),
        }
    }
}
