use std::env;
use std::path::Path;

use super::RulesConfig;
use crate::error::{Result, ScoringError};

pub const RULES_PATH_ENV: &str = "SCORING_RULES_PATH";

/// Rules from the file named by `SCORING_RULES_PATH`, or the defaults when the
/// variable is unset or blank.
pub(crate) fn rules_from_env() -> Result<RulesConfig> {
    let Ok(path) = env::var(RULES_PATH_ENV) else {
        return Ok(RulesConfig::default());
    };

    let path = path.trim();
    if path.is_empty() {
        return Ok(RulesConfig::default());
    }

    RulesConfig::load(Path::new(path)).map_err(|e| match e {
        ScoringError::Config(msg) => ScoringError::Config(format!("{RULES_PATH_ENV}='{path}': {msg}")),
        other => other,
    })
}
