use std::fs;
use std::path::{Path, PathBuf};

use crate::difficulty::DifficultyCurve;
use crate::error::ConfigError;

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_PROGRESS_DB_PATH: &str = ".data/progress.json";

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub port: u16,
    pub progress_db_path: PathBuf,
    pub static_dir: Option<PathBuf>,
    pub curve: DifficultyCurve,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// `lookup` stands in for the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let port = lookup("PORT")
            .and_then(|value| value.parse::<u16>().ok())
            .unwrap_or(DEFAULT_PORT);
        let progress_db_path = lookup("PROGRESS_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_PROGRESS_DB_PATH));
        let static_dir = resolve_static_dir(lookup("STATIC_DIR").map(PathBuf::from));
        let curve = match lookup("DIFFICULTY_CURVE_PATH") {
            Some(path) => load_curve(Path::new(&path))?,
            None => DifficultyCurve::default(),
        };
        curve.validate()?;

        Ok(Self {
            port,
            progress_db_path,
            static_dir,
            curve,
        })
    }
}

pub fn load_curve(path: &Path) -> Result<DifficultyCurve, ConfigError> {
    let text = fs::read_to_string(path).map_err(|error| ConfigError::CurveFile {
        path: path.display().to_string(),
        reason: error.to_string(),
    })?;
    parse_curve(&text, path)
}

/// Missing fields fall back to the built-in curve.
pub fn parse_curve(text: &str, path: &Path) -> Result<DifficultyCurve, ConfigError> {
    let curve: DifficultyCurve =
        serde_json::from_str(text).map_err(|error| ConfigError::CurveFile {
            path: path.display().to_string(),
            reason: error.to_string(),
        })?;
    curve.validate()?;
    Ok(curve)
}

pub fn resolve_static_dir(explicit: Option<PathBuf>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        if path.join("index.html").is_file() {
            return Some(path);
        }
    }

    let candidates = [PathBuf::from("dist"), PathBuf::from("public")];
    candidates
        .into_iter()
        .find(|path| path.join("index.html").is_file())
}
