use serde::{Deserialize, Serialize};

use crate::constants::{pixel_x, pixel_y, ENTITY_SIZE, KEY_INSET, KEY_SIZE};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn step(self, dir: Direction) -> Self {
        let (dx, dy) = dir.delta();
        Self::new(self.x + dx, self.y + dy)
    }
}

/// Cell codes stored in a [`crate::grid::Grid`]. The numeric values are the
/// ones the rendering layer expects.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CellCode {
    Empty = 0,
    Start = 1,
    Portal = 2,
    Key = 3,
    Asteroid = 4,
    Barrier = 5,
    /// Teleporter, or hazard once hazards are seeded.
    Marker = 6,
}

impl CellCode {
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Empty),
            1 => Some(Self::Start),
            2 => Some(Self::Portal),
            3 => Some(Self::Key),
            4 => Some(Self::Asteroid),
            5 => Some(Self::Barrier),
            6 => Some(Self::Marker),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    pub const ALL: [Direction; 4] = [Self::Down, Self::Right, Self::Up, Self::Left];

    pub fn parse_move(value: &str) -> Option<Self> {
        match value {
            "up" => Some(Self::Up),
            "down" => Some(Self::Down),
            "left" => Some(Self::Left),
            "right" => Some(Self::Right),
            _ => None,
        }
    }

    pub fn delta(self) -> (i32, i32) {
        match self {
            Self::Up => (0, -1),
            Self::Down => (0, 1),
            Self::Left => (-1, 0),
            Self::Right => (1, 0),
        }
    }
}

/// Pixel rectangle plus the grid cell it was derived from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Sprite {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    #[serde(rename = "gridX")]
    pub grid_x: i32,
    #[serde(rename = "gridY")]
    pub grid_y: i32,
}

impl Sprite {
    pub fn at_cell(pos: Position) -> Self {
        Self {
            x: pixel_x(pos.x),
            y: pixel_y(pos.y),
            width: ENTITY_SIZE,
            height: ENTITY_SIZE,
            grid_x: pos.x,
            grid_y: pos.y,
        }
    }

    pub fn key_at_cell(pos: Position) -> Self {
        Self {
            x: pixel_x(pos.x) + KEY_INSET,
            y: pixel_y(pos.y) + KEY_INSET,
            width: KEY_SIZE,
            height: KEY_SIZE,
            grid_x: pos.x,
            grid_y: pos.y,
        }
    }

    pub fn position(&self) -> Position {
        Position::new(self.grid_x, self.grid_y)
    }

    pub fn is_at(&self, pos: Position) -> bool {
        self.grid_x == pos.x && self.grid_y == pos.y
    }

    pub fn move_to(&mut self, pos: Position) {
        self.grid_x = pos.x;
        self.grid_y = pos.y;
        self.x = pixel_x(pos.x);
        self.y = pixel_y(pos.y);
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Spaceship {
    #[serde(flatten)]
    pub sprite: Sprite,
    pub vel: i32,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct KeyItem {
    #[serde(flatten)]
    pub sprite: Sprite,
    pub collected: bool,
    pub color: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Portal {
    #[serde(flatten)]
    pub sprite: Sprite,
    pub active: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Barrier {
    #[serde(flatten)]
    pub sprite: Sprite,
    pub color: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Teleporter {
    #[serde(flatten)]
    pub sprite: Sprite,
    #[serde(rename = "pairId")]
    pub pair_id: usize,
    pub color: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GameObjects {
    pub spaceship: Spaceship,
    pub keys: Vec<KeyItem>,
    pub portals: Vec<Portal>,
    pub barriers: Vec<Barrier>,
    pub asteroids: Vec<Sprite>,
    pub teleporters: Vec<Teleporter>,
    pub hazards: Vec<Sprite>,
}

impl GameObjects {
    pub fn key_positions(&self) -> Vec<Position> {
        self.keys.iter().map(|key| key.sprite.position()).collect()
    }

    pub fn all_keys_collected(&self) -> bool {
        self.keys.iter().all(|key| key.collected)
    }

    /// The teleporter sharing `pair_id` with the one at `pos`, if it was placed.
    pub fn teleport_destination(&self, pos: Position) -> Option<Position> {
        let entry = self.teleporters.iter().find(|t| t.sprite.is_at(pos))?;
        self.teleporters
            .iter()
            .find(|t| t.pair_id == entry.pair_id && !t.sprite.is_at(pos))
            .map(|t| t.sprite.position())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LevelConfig {
    #[serde(rename = "keyCount")]
    pub key_count: usize,
    #[serde(rename = "barrierCount")]
    pub barrier_count: usize,
    #[serde(rename = "asteroidCount")]
    pub asteroid_count: usize,
    #[serde(rename = "teleporterPairCount")]
    pub teleporter_pair_count: usize,
    #[serde(rename = "hazardCount")]
    pub hazard_count: usize,
    pub level: u32,
    #[serde(rename = "gridWidth")]
    pub grid_width: i32,
    #[serde(rename = "gridHeight")]
    pub grid_height: i32,
    #[serde(rename = "difficultyMultiplier")]
    pub difficulty_multiplier: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GameOverReason {
    BarrierWithoutKeys,
    PortalWithoutKeys,
    KeysDepleted,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MoveRejection {
    GameOver,
    Paused,
    OutOfBounds,
    Asteroid,
    BarrierLocked,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MoveEvent {
    KeyCollected {
        color: String,
    },
    BarrierOpened {
        color: String,
    },
    Teleported {
        from: Position,
        to: Position,
    },
    PortalActivated,
    PortalLocked,
    LevelCompleted {
        level: u32,
        #[serde(rename = "levelScore")]
        level_score: u64,
    },
    HazardHit {
        #[serde(rename = "keysLost")]
        keys_lost: u64,
    },
    GameOver {
        reason: GameOverReason,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BadgeId {
    BronzeExplorer,
    SilverNavigator,
    GoldCommander,
}

#[derive(Clone, Debug, Serialize)]
pub struct BadgeView {
    pub id: u8,
    pub badge: BadgeId,
    pub name: String,
    pub unlocked: bool,
}

#[derive(Clone, Debug, Serialize)]
pub struct LeaderboardEntry {
    pub address: String,
    #[serde(rename = "highScore")]
    pub high_score: u64,
    #[serde(rename = "highestLevel")]
    pub highest_level: u32,
    #[serde(rename = "updatedAtMs")]
    pub updated_at_ms: u64,
}

#[derive(Clone, Debug, Serialize)]
pub struct LeaderboardResponse {
    #[serde(rename = "generatedAtIso")]
    pub generated_at_iso: String,
    pub entries: Vec<LeaderboardEntry>,
}
