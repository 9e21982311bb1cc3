use serde::{Deserialize, Serialize};

use crate::constants::{GRID_HEIGHT, GRID_WIDTH, HAZARD_MIN_LEVEL};
use crate::error::ConfigError;
use crate::grid::Grid;
use crate::types::LevelConfig;

/// `min(round(base + slope * x), cap)`, never below zero.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CountCurve {
    pub base: f64,
    pub slope: f64,
    pub cap: usize,
}

impl CountCurve {
    pub const fn new(base: f64, slope: f64, cap: usize) -> Self {
        Self { base, slope, cap }
    }

    pub fn count(&self, x: f64) -> usize {
        let raw = (self.base + self.slope * x).round().max(0.0) as usize;
        raw.min(self.cap)
    }

    fn validate(&self, field: &'static str) -> Result<(), ConfigError> {
        if !self.base.is_finite() || !self.slope.is_finite() {
            return Err(ConfigError::InvalidCurve {
                field,
                reason: "base and slope must be finite".to_string(),
            });
        }
        if self.slope < 0.0 {
            return Err(ConfigError::InvalidCurve {
                field,
                reason: format!("slope {} would make difficulty decrease", self.slope),
            });
        }
        Ok(())
    }
}

/// Maps a level number to entity counts. Counts follow `log2(level + 1)`
/// except hazards, which grow linearly from `hazard_min_level`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DifficultyCurve {
    pub keys: CountCurve,
    pub barriers: CountCurve,
    pub asteroids: CountCurve,
    pub teleporter_pairs: CountCurve,
    pub hazards: CountCurve,
    pub hazard_min_level: u32,
    pub multiplier_base: f64,
    pub multiplier_slope: f64,
    pub grid_width: i32,
    pub grid_height: i32,
}

impl Default for DifficultyCurve {
    fn default() -> Self {
        Self {
            keys: CountCurve::new(1.0, 0.5, 3),
            barriers: CountCurve::new(2.0, 1.0, 6),
            asteroids: CountCurve::new(3.0, 1.5, 10),
            teleporter_pairs: CountCurve::new(-1.0, 1.0, 3),
            hazards: CountCurve::new(1.0, 0.5, 3),
            hazard_min_level: HAZARD_MIN_LEVEL,
            multiplier_base: 1.0,
            multiplier_slope: 0.2,
            grid_width: GRID_WIDTH,
            grid_height: GRID_HEIGHT,
        }
    }
}

pub fn base_difficulty(level: u32) -> f64 {
    (level as f64 + 1.0).log2()
}

impl DifficultyCurve {
    pub fn validate(&self) -> Result<(), ConfigError> {
        Grid::check_dimensions(self.grid_width, self.grid_height)?;
        self.keys.validate("keys")?;
        self.barriers.validate("barriers")?;
        self.asteroids.validate("asteroids")?;
        self.teleporter_pairs.validate("teleporterPairs")?;
        self.hazards.validate("hazards")?;
        if !self.multiplier_base.is_finite()
            || !self.multiplier_slope.is_finite()
            || self.multiplier_base <= 0.0
            || self.multiplier_slope < 0.0
        {
            return Err(ConfigError::InvalidCurve {
                field: "multiplier",
                reason: "multiplier must be positive and non-decreasing".to_string(),
            });
        }
        Ok(())
    }

    pub fn config_for_level(&self, level: u32) -> LevelConfig {
        let difficulty = base_difficulty(level);
        let hazard_count = if level >= self.hazard_min_level {
            self.hazards
                .count((level - self.hazard_min_level) as f64)
        } else {
            0
        };

        LevelConfig {
            key_count: self.keys.count(difficulty),
            barrier_count: self.barriers.count(difficulty),
            asteroid_count: self.asteroids.count(difficulty),
            teleporter_pair_count: self.teleporter_pairs.count(difficulty),
            hazard_count,
            level,
            grid_width: self.grid_width,
            grid_height: self.grid_height,
            difficulty_multiplier: self.multiplier_base + difficulty * self.multiplier_slope,
        }
    }
}
