//! # Rules Configuration
//!
//! Season rules (match timing, point values, RP thresholds) live here so a
//! rule change between seasons is a config file, not a code change.
//!
//! ```rust
//! use scoring_core::config::RulesConfig;
//!
//! let rules = RulesConfig::default();
//! assert_eq!(rules.match_duration_secs, 135);
//! ```

mod env;
mod point_table;

pub use env::RULES_PATH_ENV;
pub use point_table::PointTable;

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ScoringError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    /// Full match length in seconds (2:15)
    pub match_duration_secs: u32,
    /// Endgame starts once time remaining drops to this value
    pub endgame_threshold_secs: u32,
    /// Length of one alliance bonus window
    pub bonus_duration_secs: u32,
    /// Endgame points needed for the climb RP
    pub climb_rp_threshold: u32,
    /// Wall-clock length of one clock tick. One tick always counts one second
    /// of match time; shorten this only for rehearsals.
    pub tick_interval_ms: u64,
    pub points: PointTable,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            match_duration_secs: 135,
            endgame_threshold_secs: 30,
            bonus_duration_secs: 15,
            climb_rp_threshold: 20,
            tick_interval_ms: 1000,
            points: PointTable::default(),
        }
    }
}

impl RulesConfig {
    pub fn season_2025() -> Self {
        Self::default()
    }

    /// Short practice matches for field testing.
    pub fn scrimmage() -> Self {
        Self { match_duration_secs: 60, endgame_threshold_secs: 15, ..Self::default() }
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        serde_json::from_str(content).map_err(|e| ScoringError::Config(format!("invalid JSON: {e}")))
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).map_err(|e| ScoringError::Config(format!("invalid YAML: {e}")))
    }

    /// Load and validate a rules file. `.yaml`/`.yml` files are read as YAML,
    /// everything else as JSON.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| ScoringError::Config(format!("failed to read {}: {e}", path.display())))?;

        let is_yaml = matches!(
            path.extension().and_then(|ext| ext.to_str()),
            Some("yaml") | Some("yml")
        );
        let rules = if is_yaml { Self::from_yaml(&content)? } else { Self::from_json(&content)? };

        rules.validate()?;
        Ok(rules)
    }

    /// Rules named by `SCORING_RULES_PATH`, defaults when unset.
    pub fn from_env() -> Result<Self> {
        env::rules_from_env()
    }

    pub fn validate(&self) -> Result<()> {
        if self.match_duration_secs == 0 {
            return Err(ScoringError::Config("match_duration_secs must be > 0".into()));
        }
        if self.endgame_threshold_secs >= self.match_duration_secs {
            return Err(ScoringError::Config(format!(
                "endgame_threshold_secs ({}) must be below match_duration_secs ({})",
                self.endgame_threshold_secs, self.match_duration_secs
            )));
        }
        if self.bonus_duration_secs == 0 {
            return Err(ScoringError::Config("bonus_duration_secs must be > 0".into()));
        }
        if self.tick_interval_ms == 0 {
            return Err(ScoringError::Config("tick_interval_ms must be > 0".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_rules() {
        let rules = RulesConfig::default();
        assert_eq!(rules.match_duration_secs, 135);
        assert_eq!(rules.endgame_threshold_secs, 30);
        assert_eq!(rules.bonus_duration_secs, 15);
        assert_eq!(rules.climb_rp_threshold, 20);
        assert_eq!(rules.tick_interval(), Duration::from_secs(1));
        assert!(rules.validate().is_ok());
    }

    #[test]
    fn test_scrimmage_is_valid_and_shorter() {
        let scrimmage = RulesConfig::scrimmage();
        assert!(scrimmage.validate().is_ok());
        assert!(scrimmage.match_duration_secs < RulesConfig::season_2025().match_duration_secs);
    }

    #[test]
    fn test_validate_rejects_bad_timing() {
        let rules = RulesConfig { endgame_threshold_secs: 135, ..RulesConfig::default() };
        assert!(matches!(rules.validate(), Err(ScoringError::Config(_))));

        let rules = RulesConfig { bonus_duration_secs: 0, ..RulesConfig::default() };
        assert!(rules.validate().is_err());

        let rules = RulesConfig { tick_interval_ms: 0, ..RulesConfig::default() };
        assert!(rules.validate().is_err());
    }

    #[test]
    fn test_partial_json_override() {
        let rules = RulesConfig::from_json(r#"{"match_duration_secs": 150, "points": {"climb": 16}}"#)
            .unwrap();
        assert_eq!(rules.match_duration_secs, 150);
        assert_eq!(rules.endgame_threshold_secs, 30);
        assert_eq!(rules.points.climb, 16);
        assert_eq!(rules.points.park, 2);
    }

    #[test]
    fn test_load_yaml_file() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "bonus_duration_secs: 20\nclimb_rp_threshold: 24").unwrap();

        let rules = RulesConfig::load(file.path()).unwrap();
        assert_eq!(rules.bonus_duration_secs, 20);
        assert_eq!(rules.climb_rp_threshold, 24);
    }

    #[test]
    fn test_load_rejects_invalid_file() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        writeln!(file, r#"{{"match_duration_secs": 10, "endgame_threshold_secs": 30}}"#).unwrap();
        assert!(matches!(RulesConfig::load(file.path()), Err(ScoringError::Config(_))));
    }

    #[test]
    fn test_rules_from_env() {
        std::env::remove_var(RULES_PATH_ENV);
        assert_eq!(RulesConfig::from_env().unwrap(), RulesConfig::default());

        std::env::set_var(RULES_PATH_ENV, "   ");
        assert_eq!(RulesConfig::from_env().unwrap(), RulesConfig::default());

        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        writeln!(file, r#"{{"match_duration_secs": 120}}"#).unwrap();
        std::env::set_var(RULES_PATH_ENV, file.path());
        assert_eq!(RulesConfig::from_env().unwrap().match_duration_secs, 120);

        std::env::set_var(RULES_PATH_ENV, "/nonexistent/rules.json");
        let err = RulesConfig::from_env().unwrap_err();
        assert!(err.to_string().contains(RULES_PATH_ENV));

        std::env::remove_var(RULES_PATH_ENV);
    }
}
