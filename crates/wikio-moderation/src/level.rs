//! Permission levels and lifetime bans.
//!
//! A ban on level L caps the user below L for good: once the demotion counter
//! for L reaches the configured limit, no level >= L is reachable again.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ModerationError;

/// A user's permission tier, 0 to 4.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Level(u8);

impl Level {
    /// Restricted: opinions only. Assigned by staff, never a default.
    pub const RESTRICTED: Level = Level(0);
    /// Every new account starts here.
    pub const NEW_USER: Level = Level(1);
    pub const TRUSTED: Level = Level(2);
    pub const MODERATOR: Level = Level(3);
    /// Staff appointment only.
    pub const STAFF: Level = Level(4);

    pub const MAX: u8 = 4;

    pub const fn value(&self) -> u8 {
        self.0
    }

    /// The next level down, if any.
    pub fn below(&self) -> Option<Level> {
        self.0.checked_sub(1).map(Level)
    }

    /// The next level up, if any.
    pub fn above(&self) -> Option<Level> {
        (self.0 < Self::MAX).then(|| Level(self.0 + 1))
    }

    /// Every level, lowest first.
    pub fn all() -> impl DoubleEndedIterator<Item = Level> {
        (0..=Self::MAX).map(Level)
    }
}

impl Default for Level {
    fn default() -> Self {
        Level::NEW_USER
    }
}

impl TryFrom<u8> for Level {
    type Error = ModerationError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        if value <= Self::MAX {
            Ok(Level(value))
        } else {
            Err(ModerationError::InvalidLevel(value))
        }
    }
}

impl From<Level> for u8 {
    fn from(level: Level) -> u8 {
        level.0
    }
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Demotions per level for one user.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BanCounts(BTreeMap<Level, u32>);

impl BanCounts {
    pub fn new() -> Self {
        Self::default()
    }

    /// How many times the user was demoted from `level`.
    pub fn demotions_from(&self, level: Level) -> u32 {
        self.0.get(&level).copied().unwrap_or(0)
    }

    /// Count a demotion from `level`; returns the new count.
    pub fn record_demotion(&mut self, level: Level) -> u32 {
        let count = self.0.entry(level).or_insert(0);
        *count += 1;
        *count
    }

    /// Lowest level the user is banned from, given the demotion limit.
    pub fn lowest_ban(&self, limit: u32) -> Option<Level> {
        self.0
            .iter()
            .find(|(_, &count)| count >= limit)
            .map(|(&level, _)| level)
    }

    /// Whether the user may hold `level`.
    pub fn allows(&self, level: Level, limit: u32) -> bool {
        match self.lowest_ban(limit) {
            Some(banned) => level < banned,
            None => true,
        }
    }

    /// Highest level the user may still hold.
    pub fn cap(&self, limit: u32) -> Option<Level> {
        Level::all().rev().find(|&level| self.allows(level, limit))
    }

    pub fn iter(&self) -> impl Iterator<Item = (Level, u32)> + '_ {
        self.0.iter().map(|(&level, &count)| (level, count))
    }
}

/// Everything the state machine tracks for one user.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LevelState {
    pub level: Level,
    pub ban_counts: BanCounts,
}

impl LevelState {
    pub fn at(level: Level) -> Self {
        Self {
            level,
            ban_counts: BanCounts::new(),
        }
    }
}
