pub const GRID_WIDTH: i32 = 6;
pub const GRID_HEIGHT: i32 = 5;

pub const CELL_SIZE: i32 = 80;
pub const GRID_OFFSET_X: i32 = 100;
pub const GRID_OFFSET_Y: i32 = 100;
pub const ENTITY_SIZE: i32 = 64;
pub const KEY_SIZE: i32 = 30;
pub const KEY_INSET: i32 = 20;
pub const SPACESHIP_VELOCITY: i32 = 5;

pub const MAX_GENERATION_ATTEMPTS: usize = 50;
pub const PLACEMENT_TRIES: usize = 20;

pub const HAZARD_MIN_LEVEL: u32 = 4;
pub const HAZARD_KEY_PENALTY: u64 = 5;

pub const KEY_COLORS: [&str; 6] = [
    "#FF0000", "#00FF00", "#0000FF", "#FFFF00", "#FF00FF", "#00FFFF",
];
pub const PRIMARY_TELEPORTER_COLOR: &str = "#00FFFF";
pub const SECONDARY_TELEPORTER_COLOR: &str = "#FF00FF";

pub const LEVEL_SCORE_BASE: f64 = 100.0;

pub const CLAIM_GRACE_SECS: u64 = 10;
pub const CLAIM_INTERVAL_SECS: u64 = 86_400;
pub const DAILY_CLAIM_POINTS: u64 = 1;
pub const KEYS_PER_CONVERSION: u64 = 50;
pub const POINTS_PER_CONVERSION: u64 = 10;

pub const BRONZE_EXPLORER_LEVELS: u32 = 5;
pub const SILVER_NAVIGATOR_LEVELS: u32 = 10;
pub const GOLD_COMMANDER_LEVELS: u32 = 20;

pub fn key_color(index: usize) -> &'static str {
    KEY_COLORS[index % KEY_COLORS.len()]
}

pub fn teleporter_color(pair_id: usize) -> &'static str {
    if pair_id == 0 {
        PRIMARY_TELEPORTER_COLOR
    } else {
        SECONDARY_TELEPORTER_COLOR
    }
}

pub fn pixel_x(grid_x: i32) -> i32 {
    GRID_OFFSET_X + grid_x * CELL_SIZE
}

pub fn pixel_y(grid_y: i32) -> i32 {
    GRID_OFFSET_Y + grid_y * CELL_SIZE
}
