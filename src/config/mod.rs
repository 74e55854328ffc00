//! Configuration module - environment variable parsing

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use serde::Deserialize;

use crate::util::time::secs_to_ticks;

/// Default match length: 20 minutes
pub const DEFAULT_TIME_LIMIT_TICKS: u32 = 20 * 60 * 20;
/// Kills needed to win
pub const DEFAULT_WIN_KILLS: u32 = 24;
/// Length of the end-of-match celebration
pub const DEFAULT_END_GRACE_TICKS: u32 = 10 * 20;

/// Per-match settings, fixed once the match is opened
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct MatchConfig {
    /// Arena identity, used for logging only
    pub arena_id: String,
    /// Match duration in ticks
    pub time_limit_ticks: u32,
    /// Kill count that wins the match
    pub win_kills: u32,
    /// Ticks between the end of play and closing the match
    pub end_grace_ticks: u32,
    /// Ticks a dead combatant waits before respawning (0 = immediate)
    pub respawn_delay_ticks: u32,
    /// Team keys; empty means free-for-all
    pub teams: Vec<String>,
    /// Seed for the match RNG (critical rolls, spawn fallback, waiting-room placement)
    pub seed: Option<u64>,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            arena_id: "arena".to_string(),
            time_limit_ticks: DEFAULT_TIME_LIMIT_TICKS,
            win_kills: DEFAULT_WIN_KILLS,
            end_grace_ticks: DEFAULT_END_GRACE_TICKS,
            respawn_delay_ticks: 0,
            teams: Vec::new(),
            seed: None,
        }
    }
}

impl MatchConfig {
    /// Whether the team with this key is configured
    pub fn has_team(&self, key: &str) -> bool {
        self.teams.iter().any(|team| team == key)
    }
}

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Path of the arena layout JSON file
    pub arena_path: PathBuf,
    /// Settings for the hosted match
    pub game: MatchConfig,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let arena_path = env::var("ARENA_PATH").map_err(|_| ConfigError::Missing("ARENA_PATH"))?;

        let defaults = MatchConfig::default();
        let game = MatchConfig {
            arena_id: env::var("ARENA_ID").unwrap_or(defaults.arena_id),
            time_limit_ticks: parse_secs("MATCH_TIME_SECS")?.unwrap_or(defaults.time_limit_ticks),
            win_kills: parse_var("WIN_KILLS")?.unwrap_or(defaults.win_kills),
            end_grace_ticks: parse_secs("END_GRACE_SECS")?.unwrap_or(defaults.end_grace_ticks),
            respawn_delay_ticks: parse_secs("RESPAWN_DELAY_SECS")?
                .unwrap_or(defaults.respawn_delay_ticks),
            teams: env::var("TEAMS").map(|raw| parse_teams(&raw)).unwrap_or_default(),
            seed: parse_var("MATCH_SEED")?,
        };

        if game.win_kills == 0 {
            return Err(ConfigError::Invalid("WIN_KILLS"));
        }

        Ok(Self {
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            arena_path: PathBuf::from(arena_path),
            game,
        })
    }
}

fn parse_var<T: FromStr>(key: &'static str) -> Result<Option<T>, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid(key)),
        Err(_) => Ok(None),
    }
}

fn parse_secs(key: &'static str) -> Result<Option<u32>, ConfigError> {
    Ok(parse_var::<u32>(key)?.map(secs_to_ticks))
}

/// Split a comma separated team list, dropping blanks and duplicates
pub fn parse_teams(raw: &str) -> Vec<String> {
    let mut teams: Vec<String> = Vec::new();
    for key in raw.split(',').map(str::trim).filter(|key| !key.is_empty()) {
        if !teams.iter().any(|team| team == key) {
            teams.push(key.to_string());
        }
    }
    teams
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn team_list_is_trimmed_and_deduplicated() {
        assert_eq!(parse_teams(" red, blue,,red "), vec!["red", "blue"]);
        assert!(parse_teams("").is_empty());
    }

    #[test]
    fn match_config_defaults_fill_missing_json_fields() {
        let config: MatchConfig = serde_json::from_str(r#"{"win_kills": 5, "teams": ["red"]}"#)
            .expect("valid config");
        assert_eq!(config.win_kills, 5);
        assert_eq!(config.time_limit_ticks, DEFAULT_TIME_LIMIT_TICKS);
        assert_eq!(config.end_grace_ticks, 200);
        assert!(config.has_team("red"));
        assert!(!config.has_team("blue"));
    }
}
