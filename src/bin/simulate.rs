use std::collections::{BTreeMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};

use clap::Parser;
use serde::Serialize;
use space_puzzle_rust_core::config::load_curve;
use space_puzzle_rust_core::difficulty::DifficultyCurve;
use space_puzzle_rust_core::generator::{GeneratedLevel, LevelGenerator};
use space_puzzle_rust_core::grid::portal_position;
use space_puzzle_rust_core::rng::Rng;
use space_puzzle_rust_core::server_utils::normalize_seed;
use space_puzzle_rust_core::session::GameSession;
use space_puzzle_rust_core::types::{CellCode, Direction, LevelConfig, MoveEvent};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// Seeds generated per level.
    #[arg(long, default_value_t = 100)]
    seeds: u32,
    /// Base seed, reduced modulo 2^32; defaults to the current time.
    #[arg(long, allow_hyphen_values = true)]
    seed: Option<i64>,
    #[arg(long, default_value_t = 1)]
    from_level: u32,
    #[arg(long, default_value_t = 20)]
    to_level: u32,
    /// Random moves played through a session per seed; 0 disables.
    #[arg(long, default_value_t = 200)]
    walk_steps: usize,
    #[arg(long)]
    curve: Option<PathBuf>,
    #[arg(long)]
    match_id: Option<String>,
    #[arg(long)]
    summary_out: Option<PathBuf>,
}

#[derive(Clone, Debug, Serialize)]
struct LevelResultLine {
    level: u32,
    #[serde(rename = "baseSeed")]
    base_seed: u32,
    seeds: u32,
    solvable: u32,
    reduced: u32,
    #[serde(rename = "terminalFallbacks")]
    terminal_fallbacks: u32,
    #[serde(rename = "averageAttempts")]
    average_attempts: f64,
    #[serde(rename = "levelsCompletedInWalks")]
    levels_completed_in_walks: u32,
    anomalies: Vec<String>,
}

#[derive(Clone, Debug, Serialize)]
struct AnomalyRecord {
    seed: u32,
    message: String,
}

#[derive(Clone, Debug, Serialize)]
struct RunSummary {
    #[serde(rename = "matchId")]
    match_id: String,
    #[serde(rename = "startedAtMs")]
    started_at_ms: u64,
    #[serde(rename = "finishedAtMs")]
    finished_at_ms: u64,
    #[serde(rename = "levelCount")]
    level_count: usize,
    #[serde(rename = "generatedCount")]
    generated_count: u64,
    #[serde(rename = "anomalyCount")]
    anomaly_count: usize,
    #[serde(rename = "fallbackCounts")]
    fallback_counts: BTreeMap<String, u32>,
    levels: Vec<LevelResultLine>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let curve = match cli.curve.as_deref() {
        Some(path) => match load_curve(path) {
            Ok(curve) => curve,
            Err(error) => {
                tracing::error!(%error, "failed to load difficulty curve");
                std::process::exit(2);
            }
        },
        None => DifficultyCurve::default(),
    };
    if let Err(error) = curve.validate() {
        tracing::error!(%error, "difficulty curve rejected");
        std::process::exit(2);
    }

    let base_seed = normalize_seed(cli.seed.unwrap_or_else(|| now_ms() as i64));
    let started_at_ms = now_ms();
    let match_id = cli
        .match_id
        .clone()
        .unwrap_or_else(|| default_match_id(base_seed, started_at_ms));
    let generator = LevelGenerator::default();
    let from_level = cli.from_level.max(1);
    let to_level = cli.to_level.max(from_level);

    let mut results = Vec::new();
    let mut total_anomalies = 0usize;
    for level in from_level..=to_level {
        tracing::info!(match_id = %match_id, level, seeds = cli.seeds, "level sweep started");
        let config = curve.config_for_level(level);
        let (result, records) =
            run_level(&generator, &curve, &config, base_seed, cli.seeds, cli.walk_steps);
        for record in &records {
            tracing::warn!(
                match_id = %match_id,
                level,
                seed = record.seed,
                message = %record.message,
                "anomaly detected"
            );
        }
        total_anomalies += records.len();
        tracing::info!(
            match_id = %match_id,
            level,
            solvable = result.solvable,
            reduced = result.reduced,
            terminal_fallbacks = result.terminal_fallbacks,
            "level sweep finished"
        );
        match serde_json::to_string(&result) {
            Ok(line) => println!("{line}"),
            Err(error) => tracing::error!(%error, "failed to serialize level result"),
        }
        results.push(result);
    }

    let summary = build_run_summary(
        match_id.clone(),
        started_at_ms,
        now_ms(),
        results,
        total_anomalies,
    );

    if let Some(path) = cli.summary_out.as_ref() {
        if let Err(error) = write_summary(path, &summary) {
            tracing::error!(path = %path.display(), %error, "summary write failed");
            std::process::exit(2);
        }
    }

    tracing::info!(
        match_id = %match_id,
        levels = summary.level_count,
        generated = summary.generated_count,
        anomalies = summary.anomaly_count,
        "run finished"
    );

    if total_anomalies > 0 {
        std::process::exit(1);
    }
}

fn run_level(
    generator: &LevelGenerator,
    curve: &DifficultyCurve,
    config: &LevelConfig,
    base_seed: u32,
    seeds: u32,
    walk_steps: usize,
) -> (LevelResultLine, Vec<AnomalyRecord>) {
    let mut anomalies = Vec::new();
    let mut records = Vec::new();
    let mut seen = HashSet::new();
    let mut solvable = 0;
    let mut reduced = 0;
    let mut terminal_fallbacks = 0;
    let mut total_attempts = 0usize;
    let mut levels_completed_in_walks = 0;

    for offset in 0..seeds {
        let seed = base_seed.wrapping_add(offset);
        let level = match generator.generate(config, &mut Rng::new(seed)) {
            Ok(level) => level,
            Err(error) => {
                push_anomaly(
                    &mut anomalies,
                    &mut records,
                    &mut seen,
                    seed,
                    format!("generation failed: {error}"),
                );
                continue;
            }
        };
        total_attempts += level.attempts;
        if level.is_solvable() {
            solvable += 1;
        }
        if level.config != *config {
            reduced += 1;
        }
        if level.terminal_fallback {
            terminal_fallbacks += 1;
        }
        for message in collect_level_anomalies(config, &level) {
            push_anomaly(&mut anomalies, &mut records, &mut seen, seed, message);
        }
        match generator.generate(config, &mut Rng::new(seed)) {
            Ok(replay) if replay.grid == level.grid && replay.objects == level.objects => {}
            _ => push_anomaly(
                &mut anomalies,
                &mut records,
                &mut seen,
                seed,
                "same seed produced a different level".to_string(),
            ),
        }

        if walk_steps > 0 && config.level == 1 {
            match random_walk(curve, generator, seed, walk_steps) {
                Ok(completed) => levels_completed_in_walks += completed,
                Err(message) => {
                    push_anomaly(&mut anomalies, &mut records, &mut seen, seed, message)
                }
            }
        }
    }

    let average_attempts = if seeds == 0 {
        0.0
    } else {
        ((total_attempts as f64 / seeds as f64) * 100.0).round() / 100.0
    };
    (
        LevelResultLine {
            level: config.level,
            base_seed,
            seeds,
            solvable,
            reduced,
            terminal_fallbacks,
            average_attempts,
            levels_completed_in_walks,
            anomalies,
        },
        records,
    )
}

fn collect_level_anomalies(requested: &LevelConfig, level: &GeneratedLevel) -> Vec<String> {
    let mut anomalies = Vec::new();
    let grid = &level.grid;
    let objects = &level.objects;

    if !level.is_solvable() {
        anomalies.push("generated level fails validation".to_string());
    }
    if grid.get(level.start) != Some(CellCode::Start) || grid.count(CellCode::Start) != 1 {
        anomalies.push(format!("start cell overwritten at {:?}", level.start));
    }
    if grid.count(CellCode::Key) != objects.keys.len()
        || grid.count(CellCode::Barrier) != objects.barriers.len()
        || grid.count(CellCode::Asteroid) != objects.asteroids.len()
        || grid.count(CellCode::Marker) != objects.teleporters.len() + objects.hazards.len()
    {
        anomalies.push("grid codes disagree with entity collections".to_string());
    }
    if objects.keys.len() > requested.key_count
        || objects.barriers.len() > requested.barrier_count
        || objects.asteroids.len() > requested.asteroid_count
        || objects.teleporters.len() > 2 * requested.teleporter_pair_count
        || objects.hazards.len() > requested.hazard_count
    {
        anomalies.push("entity counts exceed the requested configuration".to_string());
    }

    let width = grid.width();
    let height = grid.height();
    let portal_rows = [
        portal_position(width, height, 0),
        portal_position(width, height, 1),
    ];
    for hazard in &objects.hazards {
        if hazard.grid_x == 0 || portal_rows.contains(&hazard.position()) {
            anomalies.push(format!("hazard in reserved cell {:?}", hazard.position()));
        }
    }
    let map = level.teleporter_map();
    for (from, to) in &map {
        if map.get(to) != Some(from) {
            anomalies.push(format!("teleporter {from:?} has no return edge"));
        }
    }
    anomalies
}

/// Plays random moves from level 1 and returns how many levels were cleared.
fn random_walk(
    curve: &DifficultyCurve,
    generator: &LevelGenerator,
    seed: u32,
    steps: usize,
) -> Result<u32, String> {
    let mut session = GameSession::new(curve.clone(), generator.clone(), seed)
        .map_err(|error| format!("session failed to start: {error}"))?;
    let mut rng = Rng::new(seed ^ 0x9e37_79b9);
    let mut completed = 0;
    let mut last_score = 0;

    for _ in 0..steps {
        if session.state().game_over {
            session
                .restart()
                .map_err(|error| format!("restart failed: {error}"))?;
            last_score = 0;
        }
        let dir = Direction::ALL[rng.pick_index(Direction::ALL.len())];
        let outcome = session.attempt_move(dir);
        if !session.level().grid.in_bounds(outcome.position) {
            return Err(format!("ship left the grid at {:?}", outcome.position));
        }
        for event in &outcome.events {
            if let MoveEvent::LevelCompleted { .. } = event {
                completed += 1;
                if !session.level().is_solvable() {
                    return Err("next level fails validation".to_string());
                }
            }
        }
        let state = session.state();
        if state.score < last_score {
            return Err(format!("score decreased to {}", state.score));
        }
        if state.high_score < state.score {
            return Err("high score below current score".to_string());
        }
        last_score = state.score;
    }
    Ok(completed)
}

fn push_anomaly(
    anomalies: &mut Vec<String>,
    records: &mut Vec<AnomalyRecord>,
    seen: &mut HashSet<String>,
    seed: u32,
    message: String,
) {
    records.push(AnomalyRecord {
        seed,
        message: message.clone(),
    });
    if seen.insert(message.clone()) {
        anomalies.push(message);
    }
}

fn default_match_id(seed: u32, timestamp_ms: u64) -> String {
    format!("sim-{seed}-{timestamp_ms}")
}

fn build_run_summary(
    match_id: String,
    started_at_ms: u64,
    finished_at_ms: u64,
    levels: Vec<LevelResultLine>,
    anomaly_count: usize,
) -> RunSummary {
    let generated_count = levels.iter().map(|level| level.seeds as u64).sum();
    let mut fallback_counts = BTreeMap::new();
    fallback_counts.insert(
        "reduced".to_string(),
        levels.iter().map(|level| level.reduced).sum(),
    );
    fallback_counts.insert(
        "terminal".to_string(),
        levels.iter().map(|level| level.terminal_fallbacks).sum(),
    );
    RunSummary {
        match_id,
        started_at_ms,
        finished_at_ms,
        level_count: levels.len(),
        generated_count,
        anomaly_count,
        fallback_counts,
        levels,
    }
}

fn now_ms() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}

fn write_summary(path: &Path, summary: &RunSummary) -> io::Result<()> {
    let summary_text = serde_json::to_string_pretty(summary).map_err(io::Error::other)?;
    std::fs::write(path, summary_text)
}
