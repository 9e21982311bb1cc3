use serde::ser::{Serialize, SerializeStruct, Serializer};

use crate::error::ConfigError;
use crate::types::{CellCode, Position};

pub const MIN_GRID_WIDTH: i32 = 4;
pub const MIN_GRID_HEIGHT: i32 = 3;
pub const MAX_GRID_WIDTH: i32 = 64;
pub const MAX_GRID_HEIGHT: i32 = 64;

/// Row-major matrix of cell codes; one code per cell.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Grid {
    width: i32,
    height: i32,
    cells: Vec<CellCode>,
}

impl Grid {
    pub fn new(width: i32, height: i32) -> Self {
        let width = width.max(0);
        let height = height.max(0);
        Self {
            width,
            height,
            cells: vec![CellCode::Empty; width as usize * height as usize],
        }
    }

    /// Dimensions large enough for the fixed start column, the portal rows
    /// and the biased placement ranges.
    pub fn check_dimensions(width: i32, height: i32) -> Result<(), ConfigError> {
        if width < MIN_GRID_WIDTH || height < MIN_GRID_HEIGHT {
            return Err(ConfigError::GridTooSmall { width, height });
        }
        if width > MAX_GRID_WIDTH || height > MAX_GRID_HEIGHT {
            return Err(ConfigError::GridTooLarge { width, height });
        }
        Ok(())
    }

    pub fn from_rows(rows: &[Vec<u8>]) -> Option<Self> {
        let height = rows.len() as i32;
        let width = rows.first().map(|row| row.len()).unwrap_or(0) as i32;
        let mut grid = Self::new(width, height);
        for (y, row) in rows.iter().enumerate() {
            if row.len() as i32 != width {
                return None;
            }
            for (x, value) in row.iter().enumerate() {
                let code = CellCode::from_code(*value)?;
                grid.set(Position::new(x as i32, y as i32), code);
            }
        }
        Some(grid)
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn in_bounds(&self, pos: Position) -> bool {
        pos.x >= 0 && pos.y >= 0 && pos.x < self.width && pos.y < self.height
    }

    fn index(&self, pos: Position) -> Option<usize> {
        if !self.in_bounds(pos) {
            return None;
        }
        Some((pos.y * self.width + pos.x) as usize)
    }

    pub fn get(&self, pos: Position) -> Option<CellCode> {
        self.index(pos).map(|idx| self.cells[idx])
    }

    /// Returns false when `pos` is outside the grid.
    pub fn set(&mut self, pos: Position, code: CellCode) -> bool {
        match self.index(pos) {
            Some(idx) => {
                self.cells[idx] = code;
                true
            }
            None => false,
        }
    }

    pub fn is_empty_cell(&self, pos: Position) -> bool {
        self.get(pos) == Some(CellCode::Empty)
    }

    pub fn positions(&self) -> impl Iterator<Item = Position> + '_ {
        (0..self.height).flat_map(move |y| (0..self.width).map(move |x| Position::new(x, y)))
    }

    pub fn find(&self, code: CellCode) -> Option<Position> {
        self.positions().find(|pos| self.get(*pos) == Some(code))
    }

    pub fn count(&self, code: CellCode) -> usize {
        self.cells.iter().filter(|cell| **cell == code).count()
    }

    /// Copy with every `code` cell turned into an empty cell.
    pub fn with_cleared(&self, code: CellCode) -> Self {
        let mut out = self.clone();
        for cell in &mut out.cells {
            if *cell == code {
                *cell = CellCode::Empty;
            }
        }
        out
    }

    pub fn rows(&self) -> Vec<Vec<u8>> {
        self.cells
            .chunks(self.width.max(1) as usize)
            .take(self.height as usize)
            .map(|row| row.iter().map(|cell| cell.code()).collect())
            .collect()
    }
}

/// Start cell used when a grid carries no start marker.
pub fn default_start(height: i32) -> Position {
    Position::new(0, height / 2)
}

/// Portal row alternates with level parity on the far column.
pub fn portal_position(width: i32, height: i32, level: u32) -> Position {
    let row = if level % 2 == 0 { 1 } else { height - 2 };
    Position::new(width - 1, row)
}

impl Serialize for Grid {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Grid", 3)?;
        state.serialize_field("width", &self.width)?;
        state.serialize_field("height", &self.height)?;
        state.serialize_field("cells", &self.rows())?;
        state.end()
    }
}
