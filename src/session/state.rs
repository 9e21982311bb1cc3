use serde::{Deserialize, Serialize};

use crate::constants::{
    BRONZE_EXPLORER_LEVELS, GOLD_COMMANDER_LEVELS, LEVEL_SCORE_BASE, SILVER_NAVIGATOR_LEVELS,
};
use crate::types::{BadgeId, BadgeView};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Badges {
    #[serde(rename = "bronzeExplorer")]
    pub bronze_explorer: bool,
    #[serde(rename = "silverNavigator")]
    pub silver_navigator: bool,
    #[serde(rename = "goldCommander")]
    pub gold_commander: bool,
}

impl Badges {
    /// Unlocked badges stay unlocked.
    pub fn evaluate(self, levels_completed: u32) -> Self {
        Self {
            bronze_explorer: self.bronze_explorer || levels_completed >= BRONZE_EXPLORER_LEVELS,
            silver_navigator: self.silver_navigator
                || levels_completed >= SILVER_NAVIGATOR_LEVELS,
            gold_commander: self.gold_commander || levels_completed >= GOLD_COMMANDER_LEVELS,
        }
    }

    pub fn is_unlocked(&self, badge: BadgeId) -> bool {
        match badge {
            BadgeId::BronzeExplorer => self.bronze_explorer,
            BadgeId::SilverNavigator => self.silver_navigator,
            BadgeId::GoldCommander => self.gold_commander,
        }
    }

    pub fn newly_unlocked(&self, previous: &Badges) -> Vec<BadgeId> {
        [
            BadgeId::BronzeExplorer,
            BadgeId::SilverNavigator,
            BadgeId::GoldCommander,
        ]
        .into_iter()
        .filter(|badge| self.is_unlocked(*badge) && !previous.is_unlocked(*badge))
        .collect()
    }

    pub fn views(&self) -> Vec<BadgeView> {
        vec![
            BadgeView {
                id: 1,
                badge: BadgeId::BronzeExplorer,
                name: "Bronze Explorer".to_string(),
                unlocked: self.bronze_explorer,
            },
            BadgeView {
                id: 2,
                badge: BadgeId::SilverNavigator,
                name: "Silver Navigator".to_string(),
                unlocked: self.silver_navigator,
            },
            BadgeView {
                id: 3,
                badge: BadgeId::GoldCommander,
                name: "Gold Commander".to_string(),
                unlocked: self.gold_commander,
            },
        ]
    }
}

/// Counters that outlive a single level. Transitions take the state by value
/// and hand back the next one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    pub score: u64,
    pub level: u32,
    #[serde(rename = "keysCollected")]
    pub keys_collected: u64,
    #[serde(rename = "highScore")]
    pub high_score: u64,
    #[serde(rename = "totalKeys")]
    pub total_keys: u64,
    #[serde(rename = "gameOver")]
    pub game_over: bool,
    #[serde(rename = "levelsCompleted")]
    pub levels_completed: u32,
    pub badges: Badges,
    /// Inventory level already credited to the ledger by this run.
    #[serde(rename = "keysSynced", default)]
    pub keys_synced: u64,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            score: 0,
            level: 1,
            keys_collected: 0,
            high_score: 0,
            total_keys: 0,
            game_over: false,
            levels_completed: 0,
            badges: Badges::default(),
            keys_synced: 0,
        }
    }
}

pub fn level_score(level: u32, difficulty_multiplier: f64) -> u64 {
    (LEVEL_SCORE_BASE * level as f64 * difficulty_multiplier)
        .round()
        .max(0.0) as u64
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn collect_key(self) -> Self {
        Self {
            keys_collected: self.keys_collected + 1,
            total_keys: self.total_keys + 1,
            ..self
        }
    }

    /// Spends `amount` key units. Running short ends the session.
    pub fn use_key(self, amount: u64) -> (Self, bool) {
        if self.total_keys >= amount {
            return (
                Self {
                    total_keys: self.total_keys - amount,
                    keys_synced: self.keys_synced.min(self.total_keys - amount),
                    ..self
                },
                true,
            );
        }
        (
            Self {
                game_over: true,
                ..self
            },
            false,
        )
    }

    pub fn lose_keys(self, amount: u64) -> Self {
        let total_keys = self.total_keys.saturating_sub(amount);
        Self {
            total_keys,
            game_over: self.game_over || total_keys == 0,
            keys_synced: self.keys_synced.min(total_keys),
            ..self
        }
    }

    /// Returns the next state and the score awarded for the finished level.
    /// Keys picked up during the level are credited to the inventory again.
    pub fn complete_level(self, difficulty_multiplier: f64) -> (Self, u64) {
        let gained = level_score(self.level, difficulty_multiplier);
        let score = self.score + gained;
        let levels_completed = self.levels_completed + 1;
        let next = Self {
            score,
            level: self.level + 1,
            total_keys: self.total_keys + self.keys_collected,
            keys_collected: 0,
            high_score: self.high_score.max(score),
            levels_completed,
            badges: self.badges.evaluate(levels_completed),
            ..self
        };
        (next, gained)
    }

    /// Keys gained since the last credited sync.
    pub fn unsynced_keys(&self) -> u64 {
        self.total_keys.saturating_sub(self.keys_synced)
    }

    pub fn mark_synced(self) -> Self {
        Self {
            keys_synced: self.total_keys,
            ..self
        }
    }

    /// Fresh run that keeps the high score and badges.
    pub fn reset(self) -> Self {
        Self {
            high_score: self.high_score,
            badges: self.badges,
            ..Self::default()
        }
    }
}
