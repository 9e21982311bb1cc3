use serde::Serialize;

use crate::constants::{
    key_color, teleporter_color, HAZARD_MIN_LEVEL, MAX_GENERATION_ATTEMPTS, PLACEMENT_TRIES,
    SPACESHIP_VELOCITY,
};
use crate::error::ConfigError;
use crate::grid::{default_start, portal_position, Grid};
use crate::rng::Rng;
use crate::types::{
    Barrier, CellCode, GameObjects, KeyItem, LevelConfig, Portal, Position, Spaceship, Sprite,
    Teleporter,
};
use crate::validator::{build_teleporter_map, validate_level, TeleporterMap};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GeneratorOptions {
    /// Placement attempts per configuration before obstacles are reduced.
    pub max_attempts: usize,
    /// Random cell draws per entity before the entity is skipped.
    pub placement_tries: usize,
    /// Asteroid and teleporter counts are never reduced below this.
    pub reduction_floor: usize,
    pub hazard_min_level: u32,
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        Self {
            max_attempts: MAX_GENERATION_ATTEMPTS,
            placement_tries: PLACEMENT_TRIES,
            reduction_floor: 0,
            hazard_min_level: HAZARD_MIN_LEVEL,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct GeneratedLevel {
    /// Configuration the returned layout was built from; differs from the
    /// requested one when obstacles had to be reduced.
    pub config: LevelConfig,
    pub grid: Grid,
    pub objects: GameObjects,
    pub start: Position,
    pub portal: Position,
    pub attempts: usize,
    #[serde(rename = "terminalFallback")]
    pub terminal_fallback: bool,
}

impl GeneratedLevel {
    pub fn teleporter_map(&self) -> TeleporterMap {
        build_teleporter_map(&self.objects.teleporters)
    }

    pub fn is_solvable(&self) -> bool {
        layout_is_solvable(&self.grid, &self.objects, self.portal)
    }
}

struct Layout {
    grid: Grid,
    objects: GameObjects,
    start: Position,
    portal: Position,
}

impl Layout {
    fn is_solvable(&self) -> bool {
        layout_is_solvable(&self.grid, &self.objects, self.portal)
    }
}

fn layout_is_solvable(grid: &Grid, objects: &GameObjects, portal: Position) -> bool {
    validate_level(
        grid,
        &objects.key_positions(),
        portal,
        &build_teleporter_map(&objects.teleporters),
    )
}

#[derive(Clone, Debug, Default)]
pub struct LevelGenerator {
    options: GeneratorOptions,
}

pub fn generate_level(config: &LevelConfig, seed: u32) -> Result<GeneratedLevel, ConfigError> {
    let mut rng = Rng::new(seed);
    LevelGenerator::default().generate(config, &mut rng)
}

impl LevelGenerator {
    pub fn new(options: GeneratorOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &GeneratorOptions {
        &self.options
    }

    /// Always returns a layout that passes [`validate_level`]: random attempts
    /// first, then attempts with fewer obstacles, then an obstacle-free layout.
    pub fn generate(
        &self,
        config: &LevelConfig,
        rng: &mut Rng,
    ) -> Result<GeneratedLevel, ConfigError> {
        Grid::check_dimensions(config.grid_width, config.grid_height)?;

        let mut current = config.clone();
        let mut attempts = 0;
        loop {
            for _ in 0..self.options.max_attempts {
                attempts += 1;
                let mut layout = self.place_layout(&current, rng);
                if layout.is_solvable() {
                    self.seed_hazards(&mut layout, &current, rng);
                    return Ok(finish(layout, current, attempts, false));
                }
            }

            let reduced = self.reduce_obstacles(&current);
            if reduced == current {
                break;
            }
            tracing::debug!(
                level = current.level,
                attempts,
                asteroids = reduced.asteroid_count,
                teleporter_pairs = reduced.teleporter_pair_count,
                "attempt budget exhausted, reducing obstacles"
            );
            current = reduced;
        }

        tracing::warn!(
            level = config.level,
            attempts,
            "no solvable layout at reduction floor, using obstacle-free layout"
        );
        current.asteroid_count = 0;
        current.teleporter_pair_count = 0;
        let mut layout = self.place_layout(&current, rng);
        debug_assert!(layout.is_solvable());
        self.seed_hazards(&mut layout, &current, rng);
        Ok(finish(layout, current, attempts, true))
    }

    fn reduce_obstacles(&self, config: &LevelConfig) -> LevelConfig {
        let floor = self.options.reduction_floor;
        let step_down = |count: usize| if count > floor { count - 1 } else { count };
        LevelConfig {
            asteroid_count: step_down(config.asteroid_count),
            teleporter_pair_count: step_down(config.teleporter_pair_count),
            ..config.clone()
        }
    }

    fn place_layout(&self, config: &LevelConfig, rng: &mut Rng) -> Layout {
        let width = config.grid_width;
        let height = config.grid_height;
        let level = config.level as i32;
        let mut grid = Grid::new(width, height);

        let start = default_start(height);
        grid.set(start, CellCode::Start);
        let portal = portal_position(width, height, config.level);
        grid.set(portal, CellCode::Portal);

        let mut objects = GameObjects {
            spaceship: Spaceship {
                sprite: Sprite::at_cell(start),
                vel: SPACESHIP_VELOCITY,
            },
            keys: Vec::new(),
            portals: vec![Portal {
                sprite: Sprite::at_cell(portal),
                active: false,
            }],
            barriers: Vec::new(),
            asteroids: Vec::new(),
            teleporters: Vec::new(),
            hazards: Vec::new(),
        };

        // keys lean toward the start side, barriers toward the portal side
        let key_max_x = (3 + level / 2).min(width - 1);
        let barrier_max_x = width - 2;
        let barrier_min_x = (level / 2).max(2).min(barrier_max_x);
        for index in 0..config.key_count.max(config.barrier_count) {
            let color = key_color(index);
            if index < config.key_count {
                if let Some(pos) = self.find_empty_cell(&grid, rng, 1, key_max_x) {
                    grid.set(pos, CellCode::Key);
                    objects.keys.push(KeyItem {
                        sprite: Sprite::key_at_cell(pos),
                        collected: false,
                        color: color.to_string(),
                    });
                }
            }
            if index < config.barrier_count {
                if let Some(pos) = self.find_empty_cell(&grid, rng, barrier_min_x, barrier_max_x)
                {
                    grid.set(pos, CellCode::Barrier);
                    objects.barriers.push(Barrier {
                        sprite: Sprite::at_cell(pos),
                        color: color.to_string(),
                    });
                }
            }
        }

        let middle = width / 2;
        for pair_id in 0..config.teleporter_pair_count {
            let color = teleporter_color(pair_id);
            let Some(first) = self.find_empty_cell(&grid, rng, 1, middle) else {
                continue;
            };
            place_teleporter(&mut grid, &mut objects, first, pair_id, color);
            if let Some(second) = self.find_empty_cell(&grid, rng, middle, width - 2) {
                place_teleporter(&mut grid, &mut objects, second, pair_id, color);
            }
        }

        for _ in 0..config.asteroid_count {
            if let Some(pos) = self.find_empty_cell(&grid, rng, 2, width - 2) {
                grid.set(pos, CellCode::Asteroid);
                objects.asteroids.push(Sprite::at_cell(pos));
            }
        }

        Layout {
            grid,
            objects,
            start,
            portal,
        }
    }

    fn find_empty_cell(
        &self,
        grid: &Grid,
        rng: &mut Rng,
        min_x: i32,
        max_x: i32,
    ) -> Option<Position> {
        for _ in 0..self.options.placement_tries {
            let pos = Position::new(rng.int(min_x, max_x), rng.int(0, grid.height() - 1));
            if grid.is_empty_cell(pos) {
                return Some(pos);
            }
        }
        None
    }

    /// Hazards go on empty cells outside the start column and away from both
    /// portal rows of the far column.
    fn seed_hazards(&self, layout: &mut Layout, config: &LevelConfig, rng: &mut Rng) {
        if config.level < self.options.hazard_min_level || config.hazard_count == 0 {
            return;
        }
        let width = layout.grid.width();
        let height = layout.grid.height();
        let reserved = [
            layout.start,
            layout.portal,
            portal_position(width, height, 0),
            portal_position(width, height, 1),
        ];
        let mut candidates: Vec<Position> = layout
            .grid
            .positions()
            .filter(|pos| {
                pos.x >= 1 && layout.grid.is_empty_cell(*pos) && !reserved.contains(pos)
            })
            .collect();

        for _ in 0..config.hazard_count {
            if candidates.is_empty() {
                break;
            }
            let pos = candidates.swap_remove(rng.pick_index(candidates.len()));
            layout.grid.set(pos, CellCode::Marker);
            layout.objects.hazards.push(Sprite::at_cell(pos));
        }
    }
}

fn place_teleporter(
    grid: &mut Grid,
    objects: &mut GameObjects,
    pos: Position,
    pair_id: usize,
    color: &str,
) {
    grid.set(pos, CellCode::Marker);
    objects.teleporters.push(Teleporter {
        sprite: Sprite::at_cell(pos),
        pair_id,
        color: color.to_string(),
    });
}

fn finish(
    layout: Layout,
    config: LevelConfig,
    attempts: usize,
    terminal_fallback: bool,
) -> GeneratedLevel {
    GeneratedLevel {
        config,
        grid: layout.grid,
        objects: layout.objects,
        start: layout.start,
        portal: layout.portal,
        attempts,
        terminal_fallback,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{pixel_x, pixel_y, KEY_INSET};
    use crate::difficulty::DifficultyCurve;

    fn generate(level: u32, seed: u32) -> GeneratedLevel {
        let config = DifficultyCurve::default().config_for_level(level);
        generate_level(&config, seed).expect("default grid is valid")
    }

    #[test]
    fn every_generated_level_passes_its_own_validation() {
        for level in 1..=25u32 {
            for seed in 0..60u32 {
                let level_data = generate(level, seed);
                assert!(
                    level_data.is_solvable(),
                    "unsolvable level: level={level}, seed={seed}"
                );
            }
        }
    }

    #[test]
    fn start_cell_is_never_overwritten() {
        for seed in 0..200u32 {
            let level_data = generate(1 + seed % 20, seed);
            assert_eq!(level_data.start, Position::new(0, 2));
            assert_eq!(level_data.grid.get(level_data.start), Some(CellCode::Start));
            assert_eq!(level_data.grid.count(CellCode::Start), 1);
            assert!(level_data.objects.spaceship.sprite.is_at(level_data.start));
        }
    }

    #[test]
    fn grid_codes_match_entity_collections() {
        for seed in 0..200u32 {
            let level_data = generate(1 + seed % 12, seed);
            let grid = &level_data.grid;
            let objects = &level_data.objects;
            assert_eq!(grid.count(CellCode::Portal), 1);
            assert_eq!(grid.count(CellCode::Key), objects.keys.len());
            assert_eq!(grid.count(CellCode::Barrier), objects.barriers.len());
            assert_eq!(grid.count(CellCode::Asteroid), objects.asteroids.len());
            assert_eq!(
                grid.count(CellCode::Marker),
                objects.teleporters.len() + objects.hazards.len()
            );
            for key in &objects.keys {
                assert_eq!(grid.get(key.sprite.position()), Some(CellCode::Key));
            }
        }
    }

    #[test]
    fn counts_never_exceed_requested_config() {
        for seed in 0..100u32 {
            let config = DifficultyCurve::default().config_for_level(9);
            let level_data = generate_level(&config, seed).expect("valid grid");
            assert!(level_data.objects.keys.len() <= config.key_count);
            assert!(level_data.objects.barriers.len() <= config.barrier_count);
            assert!(level_data.objects.asteroids.len() <= config.asteroid_count);
            assert!(level_data.objects.teleporters.len() <= 2 * config.teleporter_pair_count);
            assert!(level_data.objects.hazards.len() <= config.hazard_count);
        }
    }

    #[test]
    fn same_seed_reproduces_level() {
        let a = generate(7, 1234);
        let b = generate(7, 1234);
        assert_eq!(a.grid, b.grid);
        assert_eq!(a.objects, b.objects);
    }

    #[test]
    fn portal_row_follows_level_parity() {
        assert_eq!(generate(2, 5).portal, Position::new(5, 1));
        assert_eq!(generate(3, 5).portal, Position::new(5, 3));
    }

    #[test]
    fn pixel_positions_derive_from_grid_positions() {
        let level_data = generate(12, 77);
        for asteroid in &level_data.objects.asteroids {
            assert_eq!(asteroid.x, pixel_x(asteroid.grid_x));
            assert_eq!(asteroid.y, pixel_y(asteroid.grid_y));
            assert_eq!((asteroid.width, asteroid.height), (64, 64));
        }
        for key in &level_data.objects.keys {
            assert_eq!(key.sprite.x, pixel_x(key.sprite.grid_x) + KEY_INSET);
            assert_eq!((key.sprite.width, key.sprite.height), (30, 30));
        }
    }

    #[test]
    fn hazards_only_from_threshold_and_away_from_start_column_and_portal() {
        for seed in 0..200u32 {
            let early = generate(3, seed);
            assert!(early.objects.hazards.is_empty());

            let late = generate(8, seed);
            for hazard in &late.objects.hazards {
                assert!(hazard.grid_x >= 1);
                assert!(!hazard.is_at(late.portal));
                assert!(!(hazard.grid_x == 5 && (hazard.grid_y == 1 || hazard.grid_y == 3)));
            }
        }
    }

    #[test]
    fn teleporter_pairs_have_at_most_two_ends() {
        for seed in 0..200u32 {
            let level_data = generate(15, seed);
            let config = &level_data.config;
            for pair_id in 0..config.teleporter_pair_count {
                let ends = level_data
                    .objects
                    .teleporters
                    .iter()
                    .filter(|t| t.pair_id == pair_id)
                    .count();
                assert!(ends <= 2);
            }
            let map = level_data.teleporter_map();
            for (from, to) in &map {
                assert_eq!(map.get(to), Some(from));
            }
        }
    }

    #[test]
    fn exhausted_budget_falls_back_to_obstacle_free_layout() {
        let generator = LevelGenerator::new(GeneratorOptions {
            max_attempts: 0,
            reduction_floor: 2,
            ..GeneratorOptions::default()
        });
        let config = DifficultyCurve::default().config_for_level(20);
        let mut rng = Rng::new(9);
        let level_data = generator.generate(&config, &mut rng).expect("valid grid");
        assert!(level_data.terminal_fallback);
        assert!(level_data.objects.asteroids.is_empty());
        assert!(level_data.objects.teleporters.is_empty());
        assert_eq!(level_data.config.asteroid_count, 0);
        assert!(level_data.is_solvable());
    }

    #[test]
    fn reduction_walks_down_to_floor() {
        let generator = LevelGenerator::new(GeneratorOptions {
            reduction_floor: 1,
            ..GeneratorOptions::default()
        });
        let mut config = DifficultyCurve::default().config_for_level(20);
        config.asteroid_count = 3;
        config.teleporter_pair_count = 0;
        let once = generator.reduce_obstacles(&config);
        assert_eq!(once.asteroid_count, 2);
        assert_eq!(once.teleporter_pair_count, 0);
        let twice = generator.reduce_obstacles(&once);
        assert_eq!(twice.asteroid_count, 1);
        assert_eq!(generator.reduce_obstacles(&twice), twice);
    }

    #[test]
    fn tiny_grid_is_rejected() {
        let mut config = DifficultyCurve::default().config_for_level(1);
        config.grid_width = 3;
        assert!(matches!(
            generate_level(&config, 1),
            Err(ConfigError::GridTooSmall { width: 3, .. })
        ));
    }

    #[test]
    fn larger_grids_generate_solvable_levels() {
        let mut config = DifficultyCurve::default().config_for_level(10);
        config.grid_width = 9;
        config.grid_height = 7;
        for seed in 0..50u32 {
            let level_data = generate_level(&config, seed).expect("valid grid");
            assert_eq!(level_data.start, Position::new(0, 3));
            assert!(level_data.is_solvable());
        }
    }
}
