use std::collections::{HashMap, HashSet, VecDeque};

use crate::grid::{default_start, Grid};
use crate::types::{CellCode, Direction, Position, Teleporter};

/// One-directional teleport edges: stepping on the key cell lands on the value.
pub type TeleporterMap = HashMap<Position, Position>;

/// In bounds and not an asteroid.
pub fn is_valid_move(x: i32, y: i32, grid: &Grid) -> bool {
    match grid.get(Position::new(x, y)) {
        Some(code) => code != CellCode::Asteroid,
        None => false,
    }
}

/// Destination of a single step from `from`, or `None` when the step is illegal.
pub fn legal_move_target(grid: &Grid, from: Position, dir: Direction) -> Option<Position> {
    let next = from.step(dir);
    is_valid_move(next.x, next.y, grid).then_some(next)
}

pub fn get_neighbors(x: i32, y: i32, grid: &Grid, teleporters: &TeleporterMap) -> Vec<Position> {
    let here = Position::new(x, y);
    let mut out = Vec::with_capacity(5);
    for dir in Direction::ALL {
        let next = here.step(dir);
        if is_valid_move(next.x, next.y, grid) {
            out.push(next);
        }
    }
    if let Some(dest) = teleporters.get(&here) {
        if is_valid_move(dest.x, dest.y, grid) {
            out.push(*dest);
        }
    }
    out
}

/// Breadth-first search from `start` that succeeds once every target cell has
/// been reached. Each cell is expanded at most once, so this proves that all
/// targets share the start's component; it does not produce a tour.
pub fn find_path_to_keys(
    start: Position,
    keys: &[Position],
    grid: &Grid,
    teleporters: &TeleporterMap,
) -> bool {
    let targets: HashSet<Position> = keys.iter().copied().collect();
    if targets.is_empty() {
        return true;
    }

    let mut reached = HashSet::new();
    let mut visited = HashSet::new();
    let mut queue = VecDeque::new();
    visited.insert(start);
    queue.push_back(start);

    while let Some(pos) = queue.pop_front() {
        if targets.contains(&pos) {
            reached.insert(pos);
            if reached.len() == targets.len() {
                return true;
            }
        }
        for next in get_neighbors(pos.x, pos.y, grid, teleporters) {
            if visited.insert(next) {
                queue.push_back(next);
            }
        }
    }

    false
}

/// Two-phase solvability check: every key reachable from the start cell, and
/// the portal reachable from the start cell once barriers are cleared.
/// Barrier consumption order and key-unit inventory are not simulated.
pub fn validate_level(
    grid: &Grid,
    keys: &[Position],
    portal: Position,
    teleporters: &TeleporterMap,
) -> bool {
    let start = grid
        .find(CellCode::Start)
        .unwrap_or_else(|| default_start(grid.height()));
    if !find_path_to_keys(start, keys, grid, teleporters) {
        return false;
    }

    let open_grid = grid.with_cleared(CellCode::Barrier);
    find_path_to_keys(start, &[portal], &open_grid, teleporters)
}

/// Registers both directions for every pair whose two ends were placed.
/// Orphan teleporters get no entry.
pub fn build_teleporter_map(teleporters: &[Teleporter]) -> TeleporterMap {
    let mut by_pair: HashMap<usize, Vec<Position>> = HashMap::new();
    for teleporter in teleporters {
        by_pair
            .entry(teleporter.pair_id)
            .or_default()
            .push(teleporter.sprite.position());
    }

    let mut out = TeleporterMap::new();
    for ends in by_pair.values() {
        if let [a, b] = ends.as_slice() {
            out.insert(*a, *b);
            out.insert(*b, *a);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Sprite;

    fn base_grid() -> Grid {
        let mut grid = Grid::new(6, 5);
        grid.set(Position::new(0, 2), CellCode::Start);
        grid
    }

    fn teleporter(pos: Position, pair_id: usize) -> Teleporter {
        Teleporter {
            sprite: Sprite::at_cell(pos),
            pair_id,
            color: "#00FFFF".to_string(),
        }
    }

    #[test]
    fn is_valid_move_rejects_out_of_bounds_and_asteroids() {
        let mut grid = Grid::new(6, 5);
        for (x, y) in [(-1, 0), (6, 0), (0, -1), (0, 5), (-3, 9)] {
            assert!(!is_valid_move(x, y, &grid));
        }
        for y in 0..5 {
            for x in 0..6 {
                assert!(is_valid_move(x, y, &grid));
            }
        }
        grid.set(Position::new(2, 3), CellCode::Asteroid);
        assert!(!is_valid_move(2, 3, &grid));
        grid.set(Position::new(2, 3), CellCode::Barrier);
        assert!(is_valid_move(2, 3, &grid));
    }

    #[test]
    fn neighbors_stay_inside_grid_even_with_bad_teleport_entries() {
        let grid = base_grid();
        let mut teleporters = TeleporterMap::new();
        teleporters.insert(Position::new(0, 0), Position::new(10, 10));
        teleporters.insert(Position::new(5, 4), Position::new(0, 0));
        for y in 0..5 {
            for x in 0..6 {
                for pos in get_neighbors(x, y, &grid, &teleporters) {
                    assert!(grid.in_bounds(pos), "({x},{y}) -> {pos:?}");
                }
            }
        }
        let corner = get_neighbors(0, 0, &grid, &teleporters);
        assert_eq!(corner.len(), 2);
        let far_corner = get_neighbors(5, 4, &grid, &teleporters);
        assert!(far_corner.contains(&Position::new(0, 0)));
    }

    #[test]
    fn teleport_edge_is_one_directional_per_entry() {
        let grid = base_grid();
        let mut teleporters = TeleporterMap::new();
        teleporters.insert(Position::new(1, 1), Position::new(4, 3));
        assert!(get_neighbors(1, 1, &grid, &teleporters).contains(&Position::new(4, 3)));
        assert!(!get_neighbors(4, 3, &grid, &teleporters).contains(&Position::new(1, 1)));
    }

    #[test]
    fn empty_target_set_is_vacuously_reachable() {
        let mut grid = Grid::new(6, 5);
        for y in 0..5 {
            for x in 0..6 {
                grid.set(Position::new(x, y), CellCode::Asteroid);
            }
        }
        assert!(find_path_to_keys(
            Position::new(0, 2),
            &[],
            &grid,
            &TeleporterMap::new()
        ));
    }

    #[test]
    fn open_grid_with_single_key_validates() {
        let mut grid = base_grid();
        grid.set(Position::new(5, 1), CellCode::Portal);
        grid.set(Position::new(2, 2), CellCode::Key);
        assert!(validate_level(
            &grid,
            &[Position::new(2, 2)],
            Position::new(5, 1),
            &TeleporterMap::new()
        ));
    }

    #[test]
    fn asteroid_wall_disconnects_portal() {
        let mut grid = base_grid();
        grid.set(Position::new(5, 1), CellCode::Portal);
        grid.set(Position::new(2, 2), CellCode::Key);
        for y in 0..5 {
            grid.set(Position::new(3, y), CellCode::Asteroid);
        }
        assert!(!validate_level(
            &grid,
            &[Position::new(2, 2)],
            Position::new(5, 1),
            &TeleporterMap::new()
        ));
    }

    #[test]
    fn teleporter_pair_bridges_asteroid_wall() {
        let mut grid = base_grid();
        grid.set(Position::new(1, 1), CellCode::Marker);
        grid.set(Position::new(4, 3), CellCode::Marker);
        for y in 0..5 {
            grid.set(Position::new(3, y), CellCode::Asteroid);
        }
        let map = build_teleporter_map(&[
            teleporter(Position::new(1, 1), 0),
            teleporter(Position::new(4, 3), 0),
        ]);
        assert!(find_path_to_keys(
            Position::new(0, 2),
            &[Position::new(4, 3)],
            &grid,
            &map
        ));
        assert!(!find_path_to_keys(
            Position::new(0, 2),
            &[Position::new(4, 3)],
            &grid,
            &TeleporterMap::new()
        ));
    }

    #[test]
    fn keys_on_separate_branches_are_all_reached() {
        let grid = base_grid();
        let keys = [Position::new(0, 0), Position::new(0, 4), Position::new(5, 2)];
        assert!(find_path_to_keys(
            Position::new(0, 2),
            &keys,
            &grid,
            &TeleporterMap::new()
        ));
    }

    #[test]
    fn key_inside_asteroid_ring_is_unreachable() {
        let mut grid = base_grid();
        for pos in [(1, 0), (0, 1), (2, 1), (1, 2)] {
            grid.set(Position::new(pos.0, pos.1), CellCode::Asteroid);
        }
        assert!(!find_path_to_keys(
            Position::new(0, 2),
            &[Position::new(1, 1)],
            &grid,
            &TeleporterMap::new()
        ));
    }

    #[test]
    fn barriers_do_not_block_portal_phase() {
        let mut grid = base_grid();
        grid.set(Position::new(5, 1), CellCode::Portal);
        for y in 0..5 {
            grid.set(Position::new(3, y), CellCode::Barrier);
        }
        assert!(validate_level(
            &grid,
            &[],
            Position::new(5, 1),
            &TeleporterMap::new()
        ));
    }

    #[test]
    fn orphan_teleporter_has_no_mapping() {
        let map = build_teleporter_map(&[
            teleporter(Position::new(1, 1), 0),
            teleporter(Position::new(4, 3), 0),
            teleporter(Position::new(2, 0), 1),
        ]);
        assert_eq!(map.len(), 2);
        assert_eq!(map.get(&Position::new(4, 3)), Some(&Position::new(1, 1)));
        assert!(!map.contains_key(&Position::new(2, 0)));
    }

    #[test]
    fn legal_move_target_blocks_edges_and_asteroids() {
        let mut grid = base_grid();
        grid.set(Position::new(1, 2), CellCode::Asteroid);
        let start = Position::new(0, 2);
        assert_eq!(legal_move_target(&grid, start, Direction::Left), None);
        assert_eq!(legal_move_target(&grid, start, Direction::Right), None);
        assert_eq!(
            legal_move_target(&grid, start, Direction::Up),
            Some(Position::new(0, 1))
        );
    }
}
