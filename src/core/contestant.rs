//! Race contestants
//!
//! A contestant keeps its lifetime statistics across races and is reset
//! to the starting line before each new one.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Distance covered by one gallop before gear bonuses
pub const BASE_STEP: f64 = 5.0;

/// Chance of stumbling before each gallop
pub const STUMBLE_PROBABILITY: f64 = 0.02;

/// Skill lost on a fall under the stepwise policy
pub const FALL_PENALTY: f64 = 0.1;

/// Number of gallops granted by one bonus item
pub const BONUS_GALLOPS: usize = 3;

/// Stable index of a contestant within its roster
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ContestantId(pub usize);

impl fmt::Display for ContestantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Equipment that lengthens each gallop
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum Gear {
    Armor,
    Goggles,
    Boots,
}

impl Gear {
    pub const ALL: [Gear; 3] = [Gear::Armor, Gear::Goggles, Gear::Boots];

    /// Extra distance added to every gallop
    pub fn bonus(self) -> f64 {
        match self {
            Gear::Armor => 1.1,
            Gear::Goggles => 1.05,
            Gear::Boots => 1.03,
        }
    }
}

impl fmt::Display for Gear {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Gear::Armor => "Armor",
            Gear::Goggles => "Goggles",
            Gear::Boots => "Boots",
        };
        f.write_str(name)
    }
}

impl FromStr for Gear {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "armor" => Ok(Gear::Armor),
            "goggles" => Ok(Gear::Goggles),
            "boots" => Ok(Gear::Boots),
            other => Err(format!("Unknown gear: {}", other)),
        }
    }
}

impl TryFrom<String> for Gear {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// How a contestant moves each tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum MovementPolicy {
    /// One unit with probability `skill`, then a fall check of `0.1 * skill²`
    #[default]
    Stepwise,
    /// Fixed gallop of `BASE_STEP` plus gear, after a flat stumble check
    Gallop,
}

impl FromStr for MovementPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "stepwise" | "step" => Ok(MovementPolicy::Stepwise),
            "gallop" => Ok(MovementPolicy::Gallop),
            other => Err(format!("Unknown movement policy: {}", other)),
        }
    }
}

impl TryFrom<String> for MovementPolicy {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Lifetime statistics, carried across races
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContestantStats {
    pub triumphs: u32,
    pub races_run: u32,
    /// Running average of aptitude gains over races run
    pub aptitude: f64,
    pub aptitude_accumulator: f64,
    /// Best finishing time, `INFINITY` until the first win
    pub best_time: f64,
    pub total_track_length: f64,
}

impl Default for ContestantStats {
    fn default() -> Self {
        Self {
            triumphs: 0,
            races_run: 0,
            aptitude: 0.0,
            aptitude_accumulator: 0.0,
            best_time: f64::INFINITY,
            total_track_length: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contestant {
    id: ContestantId,
    name: String,
    symbol: char,
    skill: f64,
    progress: f64,
    fallen: bool,
    finished: bool,
    gear: BTreeSet<Gear>,
    pub stats: ContestantStats,
}

impl Contestant {
    pub fn new(id: ContestantId, name: impl Into<String>, symbol: char, skill: f64) -> Self {
        Self {
            id,
            name: name.into(),
            symbol,
            skill: clamp_skill(skill),
            progress: 0.0,
            fallen: false,
            finished: false,
            gear: BTreeSet::new(),
            stats: ContestantStats::default(),
        }
    }

    pub fn with_gear(mut self, gear: impl IntoIterator<Item = Gear>) -> Self {
        self.gear.extend(gear);
        self
    }

    pub fn id(&self) -> ContestantId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn symbol(&self) -> char {
        self.symbol
    }

    pub fn skill(&self) -> f64 {
        self.skill
    }

    pub fn progress(&self) -> f64 {
        self.progress
    }

    pub fn has_fallen(&self) -> bool {
        self.fallen
    }

    pub fn has_finished(&self) -> bool {
        self.finished
    }

    /// Still able to move this race
    pub fn is_active(&self) -> bool {
        !self.fallen && !self.finished
    }

    pub fn gear(&self) -> &BTreeSet<Gear> {
        &self.gear
    }

    /// Stores `value` clamped to [0, 1]
    pub fn set_skill(&mut self, value: f64) {
        self.skill = clamp_skill(value);
    }

    /// Sum of the bonuses of all equipped gear
    pub fn gear_bonus(&self) -> f64 {
        self.gear.iter().map(|g| g.bonus()).sum()
    }

    /// Length of one gallop including gear
    pub fn gallop_step(&self) -> f64 {
        BASE_STEP + self.gear_bonus()
    }

    /// Move for one tick under `policy`, drawing from `rng`
    pub fn advance<R: Rng + ?Sized>(&mut self, rng: &mut R, policy: MovementPolicy) {
        if !self.is_active() {
            return;
        }

        match policy {
            MovementPolicy::Stepwise => {
                let step_roll: f64 = rng.gen();
                if step_roll < self.skill {
                    self.progress += 1.0;
                }
                let fall_roll: f64 = rng.gen();
                if fall_roll < 0.1 * self.skill * self.skill {
                    self.fall();
                }
            }
            MovementPolicy::Gallop => {
                let stumble_roll: f64 = rng.gen();
                if stumble_roll < STUMBLE_PROBABILITY {
                    self.stumble();
                } else {
                    self.gallop();
                }
            }
        }
    }

    fn gallop(&mut self) {
        if self.is_active() {
            self.progress += self.gallop_step();
        }
    }

    /// Fall out of the race, losing `FALL_PENALTY` skill
    pub fn fall(&mut self) {
        self.fallen = true;
        self.set_skill(self.skill - FALL_PENALTY);
    }

    /// Stumble out of the race without a skill penalty
    pub fn stumble(&mut self) {
        self.fallen = true;
    }

    /// Take `BONUS_GALLOPS` extra gallops
    pub fn consume_bonus(&mut self) {
        if !self.is_active() {
            return;
        }
        for _ in 0..BONUS_GALLOPS {
            self.gallop();
        }
    }

    pub(crate) fn mark_finished(&mut self) {
        self.finished = true;
    }

    pub(crate) fn clear_finished(&mut self) {
        self.finished = false;
    }

    /// Back to the start line. Statistics are kept.
    pub fn reset(&mut self) {
        self.progress = 0.0;
        self.fallen = false;
        self.finished = false;
    }
}

fn clamp_skill(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 1.0)
}
