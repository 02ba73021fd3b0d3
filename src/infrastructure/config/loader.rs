use std::path::Path;

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::models::config::Config;

/// Project directory holding the config files and the default database.
pub const PROJECT_DIR: &str = ".squadforge";

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Database path cannot be empty")]
    EmptyDatabasePath,

    #[error("Invalid max_connections: {0}. Must be at least 1")]
    InvalidMaxConnections(u32),

    #[error(
        "Invalid backoff configuration: initial_backoff_ms ({0}) must be less than max_backoff_ms ({1})"
    )]
    InvalidBackoff(u64, u64),

    #[error("Invalid AIM scale: {0}")]
    InvalidAimScale(String),

    #[error("Invalid multiplier for {name}: {value}. Must be finite and positive")]
    InvalidMultiplier { name: String, value: f64 },

    #[error("Invalid level curve for {0}: base_xp must be positive and growth at least 1.0")]
    InvalidLevelCurve(&'static str),

    #[error("Invalid reputation_decay: {0}. Must be within 0.0..=1.0")]
    InvalidReputationDecay(f64),

    #[error("Invalid sprint duration: {0} days. Must be at least 1")]
    InvalidSprintDuration(i64),

    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .squadforge/config.yaml (project config, created by init)
    /// 3. .squadforge/local.yaml (local overrides, optional)
    /// 4. Environment variables (SQUADFORGE_* prefix, `__` separates sections)
    pub fn load() -> Result<Config> {
        Self::load_in(PROJECT_DIR)
    }

    /// Same as [`ConfigLoader::load`] with the project directory given explicitly.
    pub fn load_in(project_dir: impl AsRef<Path>) -> Result<Config> {
        let dir = project_dir.as_ref();
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(dir.join("config.yaml")))
            .merge(Yaml::file(dir.join("local.yaml")))
            .merge(Env::prefixed("SQUADFORGE_").split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file, without env overrides
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .context(format!("Failed to load config from {}", path.as_ref().display()))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.database.path.is_empty() {
            return Err(ConfigError::EmptyDatabasePath);
        }
        if config.database.max_connections == 0 {
            return Err(ConfigError::InvalidMaxConnections(config.database.max_connections));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }
        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        if config.sync.initial_backoff_ms >= config.sync.max_backoff_ms {
            return Err(ConfigError::InvalidBackoff(
                config.sync.initial_backoff_ms,
                config.sync.max_backoff_ms,
            ));
        }

        Self::validate_scoring(config)?;

        let progression = &config.progression;
        for (name, curve) in [("player_curve", progression.player_curve), ("squad_curve", progression.squad_curve)] {
            if curve.base_xp == 0 || !curve.growth.is_finite() || curve.growth < 1.0 {
                return Err(ConfigError::InvalidLevelCurve(name));
            }
        }
        if !(0.0..=1.0).contains(&progression.reputation_decay) {
            return Err(ConfigError::InvalidReputationDecay(progression.reputation_decay));
        }

        if config.sprint.duration_days < 1 {
            return Err(ConfigError::InvalidSprintDuration(config.sprint.duration_days));
        }

        Ok(())
    }

    fn validate_scoring(config: &Config) -> Result<(), ConfigError> {
        let scoring = &config.scoring;
        let rules = &scoring.rule_multipliers;
        for (name, value) in [
            ("integrated", rules.integrated),
            ("negotiated", rules.negotiated),
            ("fixed", rules.fixed),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::InvalidMultiplier {
                    name: format!("rule {name}"),
                    value,
                });
            }
        }

        if scoring.aim_scale.is_empty() {
            return Err(ConfigError::InvalidAimScale("scale has no options".to_string()));
        }
        let mut seen = std::collections::BTreeSet::new();
        for option in &scoring.aim_scale {
            if !seen.insert(option.value) {
                return Err(ConfigError::InvalidAimScale(format!("duplicate value {}", option.value)));
            }
            if !option.multiplier.is_finite() || option.multiplier < 0.0 {
                return Err(ConfigError::InvalidMultiplier {
                    name: format!("AIM {}", option.value),
                    value: option.multiplier,
                });
            }
            if !(1..=5).contains(&option.stars) {
                return Err(ConfigError::InvalidAimScale(format!(
                    "stars for {} must be 1-5, got {}",
                    option.value, option.stars
                )));
            }
        }
        if !seen.contains(&scoring.neutral_aim) {
            return Err(ConfigError::InvalidAimScale(format!(
                "neutral_aim {} is not on the scale",
                scoring.neutral_aim
            )));
        }

        if scoring.capacity.ceilings.iter().any(|c| c.level == 0) {
            return Err(ConfigError::ValidationFailed(
                "capacity ceilings start at level 1".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert_eq!(config.database.path, ".squadforge/squadforge.db");
        assert_eq!(config.logging.level, "warn");
        ConfigLoader::validate(&config).expect("Default config should be valid");
    }

    #[test]
    fn test_yaml_parsing() {
        let yaml = r"
database:
  path: /custom/board.db
  max_connections: 2
logging:
  level: debug
  format: json
scoring:
  rule_multipliers:
    negotiated: 1.1
  capacity:
    ceilings:
      - level: 1
        max_points: 40
sprint:
  duration_days: 7
";
        let config: Config = serde_yaml::from_str(yaml).expect("YAML should parse");

        assert_eq!(config.database.path, "/custom/board.db");
        assert_eq!(config.logging.format, "json");
        assert!((config.scoring.rule_multipliers.negotiated - 1.1).abs() < f64::EPSILON);
        assert!((config.scoring.rule_multipliers.fixed - 1.0).abs() < f64::EPSILON);
        assert_eq!(config.scoring.capacity.ceiling_for(1), 40);
        assert_eq!(config.sprint.duration_days, 7);
        ConfigLoader::validate(&config).expect("Parsed config should be valid");
    }

    #[test]
    fn test_validate_invalid_log_level() {
        let mut config = Config::default();
        config.logging.level = "loud".to_string();
        match ConfigLoader::validate(&config).unwrap_err() {
            ConfigError::InvalidLogLevel(level) => assert_eq!(level, "loud"),
            other => panic!("Expected InvalidLogLevel, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_empty_database_path() {
        let mut config = Config::default();
        config.database.path = String::new();
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::EmptyDatabasePath)
        ));
    }

    #[test]
    fn test_validate_invalid_backoff() {
        let mut config = Config::default();
        config.sync.initial_backoff_ms = 9000;
        config.sync.max_backoff_ms = 1000;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidBackoff(9000, 1000))
        ));
    }

    #[test]
    fn test_validate_neutral_aim_must_be_on_scale() {
        let mut config = Config::default();
        config.scoring.neutral_aim = 9;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidAimScale(_))
        ));
    }

    #[test]
    fn test_validate_rejects_non_positive_rule_multiplier() {
        let mut config = Config::default();
        config.scoring.rule_multipliers.fixed = 0.0;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidMultiplier { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_shrinking_curve() {
        let mut config = Config::default();
        config.progression.squad_curve.growth = 0.5;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidLevelCurve("squad_curve"))
        ));
    }

    #[test]
    fn test_validate_zero_sprint_duration() {
        let mut config = Config::default();
        config.sprint.duration_days = 0;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidSprintDuration(0))
        ));
    }

    #[test]
    fn test_hierarchical_merging_and_env_override() {
        let dir = tempfile::tempdir().unwrap();
        let mut base = std::fs::File::create(dir.path().join("config.yaml")).unwrap();
        writeln!(base, "logging:\n  level: info\n  format: json\nsprint:\n  duration_days: 10").unwrap();
        let mut local = std::fs::File::create(dir.path().join("local.yaml")).unwrap();
        writeln!(local, "logging:\n  level: debug").unwrap();

        let config = temp_env::with_vars(
            [("SQUADFORGE_SCORING__XP_PER_POINT", Some("25"))],
            || ConfigLoader::load_in(dir.path()).unwrap(),
        );

        assert_eq!(config.logging.level, "debug", "local overrides project config");
        assert_eq!(config.logging.format, "json", "project value persists");
        assert_eq!(config.sprint.duration_days, 10);
        assert_eq!(config.scoring.xp_per_point, 25, "env has highest priority");
    }

    #[test]
    fn test_load_from_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = ConfigLoader::load_from_file(dir.path().join("absent.yaml")).unwrap();
        assert_eq!(config, Config::default());
    }
}
