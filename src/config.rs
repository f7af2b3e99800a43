//! Arena configuration
//!
//! Everything needed to set up a season: the roster, the wagering actors and
//! the race parameters. Loaded from JSON; any missing field falls back to
//! its default.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::core::{Contestant, ContestantId, Gear, MovementPolicy, RaceSettings};
use crate::error::{validate_contestant_count, validate_distance, RaceError};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error(transparent)]
    Invalid(#[from] RaceError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContestantConfig {
    pub name: String,
    pub symbol: char,
    pub skill: f64,
    #[serde(default)]
    pub gear: Vec<Gear>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActorConfig {
    pub name: String,
    pub funds: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArenaConfig {
    pub distance: u32,
    pub contestants: Vec<ContestantConfig>,
    pub actors: Vec<ActorConfig>,
    pub movement: MovementPolicy,
    pub bonus_items: usize,
    /// How close (in distance units) a contestant must be to collect an item
    pub bonus_tolerance: f64,
    /// Seeds the generator that hands out per-race seeds
    pub seed: u64,
    /// Pause between ticks when a race is driven in the background
    pub tick_delay_ms: u64,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        let contestant = |name: &str, symbol: char, skill: f64| ContestantConfig {
            name: name.to_string(),
            symbol,
            skill,
            gear: Vec::new(),
        };
        Self {
            distance: 20,
            contestants: vec![
                contestant("Thunder", 'T', 0.6),
                contestant("Blaze", 'B', 0.7),
                contestant("Comet", 'C', 0.5),
            ],
            actors: vec![
                ActorConfig {
                    name: "alice".to_string(),
                    funds: 100.0,
                },
                ActorConfig {
                    name: "bob".to_string(),
                    funds: 100.0,
                },
            ],
            movement: MovementPolicy::Stepwise,
            bonus_items: 2,
            bonus_tolerance: 5.0,
            seed: 42,
            tick_delay_ms: 100,
        }
    }
}

impl ArenaConfig {
    /// Read and validate a JSON config file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        let config: ArenaConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), RaceError> {
        validate_distance(self.distance)?;
        validate_contestant_count(self.contestants.len())?;

        let mut names = HashSet::new();
        for c in &self.contestants {
            if c.name.trim().is_empty() {
                return Err(RaceError::Configuration("Contestant name is empty".to_string()));
            }
            if !names.insert(c.name.as_str()) {
                return Err(RaceError::Configuration(format!(
                    "Duplicate contestant name: {}",
                    c.name
                )));
            }
        }

        let mut actors = HashSet::new();
        for a in &self.actors {
            if !actors.insert(a.name.as_str()) {
                return Err(RaceError::Configuration(format!("Duplicate actor name: {}", a.name)));
            }
            if !(a.funds >= 0.0) || !a.funds.is_finite() {
                return Err(RaceError::Configuration(format!(
                    "Funds for {} must be a non-negative number, got {}",
                    a.name, a.funds
                )));
            }
        }

        if !(self.bonus_tolerance >= 0.0) || !self.bonus_tolerance.is_finite() {
            return Err(RaceError::Configuration(format!(
                "Bonus tolerance must be a finite non-negative number, got {}",
                self.bonus_tolerance
            )));
        }
        Ok(())
    }

    /// Fresh contestants in configuration order
    pub fn build_roster(&self) -> Vec<Contestant> {
        self.contestants
            .iter()
            .enumerate()
            .map(|(i, c)| {
                Contestant::new(ContestantId(i), c.name.clone(), c.symbol, c.skill)
                    .with_gear(c.gear.iter().copied())
            })
            .collect()
    }

    pub fn race_settings(&self, seed: u64) -> RaceSettings {
        RaceSettings {
            distance: self.distance,
            movement: self.movement,
            bonus_items: self.bonus_items,
            bonus_tolerance: self.bonus_tolerance,
            seed,
        }
    }

    pub fn tick_delay(&self) -> Duration {
        Duration::from_millis(self.tick_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = ArenaConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.distance, 20);
        assert_eq!(config.contestants.len(), 3);
        assert_eq!(config.tick_delay(), Duration::from_millis(100));
    }

    #[test]
    fn test_duplicate_contestant_rejected() {
        let mut config = ArenaConfig::default();
        config.contestants[1].name = config.contestants[0].name.clone();
        assert!(matches!(config.validate(), Err(RaceError::Configuration(_))));
    }

    #[test]
    fn test_too_few_contestants_rejected() {
        let mut config = ArenaConfig::default();
        config.contestants.truncate(1);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_negative_funds_rejected() {
        let mut config = ArenaConfig::default();
        config.actors[0].funds = -5.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_distance_rejected() {
        let config = ArenaConfig {
            distance: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let json = r#"{
            "distance": 50,
            "movement": "gallop",
            "contestants": [
                { "name": "Ace", "symbol": "A", "skill": 0.9, "gear": ["boots", "armor"] },
                { "name": "Bolt", "symbol": "B", "skill": 0.4 }
            ]
        }"#;
        let config: ArenaConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.distance, 50);
        assert_eq!(config.movement, MovementPolicy::Gallop);
        assert_eq!(config.contestants[0].gear, vec![Gear::Boots, Gear::Armor]);
        assert!(config.contestants[1].gear.is_empty());
        assert_eq!(config.actors.len(), 2);
        assert_eq!(config.seed, 42);
    }

    #[test]
    fn test_gear_and_policy_names_ignore_case() {
        let json = r#"{
            "movement": "Gallop",
            "contestants": [
                { "name": "Ace", "symbol": "A", "skill": 0.9, "gear": ["Boots", "GOGGLES"] },
                { "name": "Bolt", "symbol": "B", "skill": 0.4 }
            ]
        }"#;
        let config: ArenaConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.movement, MovementPolicy::Gallop);
        assert_eq!(config.contestants[0].gear, vec![Gear::Boots, Gear::Goggles]);
        assert_eq!("Boots".parse::<Gear>(), Ok(Gear::Boots));
    }

    #[test]
    fn test_gear_serializes_lowercase() {
        let json = serde_json::to_string(&vec![Gear::Armor, Gear::Boots]).unwrap();
        assert_eq!(json, r#"["armor","boots"]"#);
        let back: Vec<Gear> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, vec![Gear::Armor, Gear::Boots]);
    }

    #[test]
    fn test_infinite_tolerance_rejected() {
        let mut config = ArenaConfig::default();
        config.bonus_tolerance = f64::INFINITY;
        assert!(matches!(config.validate(), Err(RaceError::Configuration(_))));

        config.bonus_tolerance = f64::NAN;
        assert!(config.validate().is_err());

        config.bonus_tolerance = 0.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unknown_gear_fails_to_parse() {
        let json = r#"{ "contestants": [ { "name": "Ace", "symbol": "A", "skill": 0.9, "gear": ["saddle"] } ] }"#;
        assert!(serde_json::from_str::<ArenaConfig>(json).is_err());
    }

    #[test]
    fn test_build_roster() {
        let mut config = ArenaConfig::default();
        config.contestants[2].skill = 4.0;
        config.contestants[0].gear = vec![Gear::Goggles];

        let roster = config.build_roster();
        assert_eq!(roster.len(), 3);
        assert_eq!(roster[1].id(), ContestantId(1));
        assert_eq!(roster[1].name(), "Blaze");
        assert_eq!(roster[2].skill(), 1.0);
        assert!((roster[0].gear_bonus() - 1.05).abs() < 1e-12);
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!("derby_config_{}.json", std::process::id()));
        let config = ArenaConfig {
            distance: 30,
            seed: 7,
            ..Default::default()
        };
        std::fs::write(&path, serde_json::to_string_pretty(&config).unwrap()).unwrap();

        let loaded = ArenaConfig::load(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_missing_file() {
        let result = ArenaConfig::load("/nonexistent/derby.json");
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }
}
