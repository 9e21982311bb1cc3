use std::fmt;

#[derive(Clone, Debug, PartialEq)]
pub enum ConfigError {
    GridTooSmall { width: i32, height: i32 },
    GridTooLarge { width: i32, height: i32 },
    InvalidCurve { field: &'static str, reason: String },
    CurveFile { path: String, reason: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GridTooSmall { width, height } => write!(
                f,
                "grid {width}x{height} is too small: need at least 4 columns and 3 rows"
            ),
            Self::GridTooLarge { width, height } => write!(
                f,
                "grid {width}x{height} is too large: at most 64 columns and 64 rows"
            ),
            Self::InvalidCurve { field, reason } => {
                write!(f, "invalid difficulty curve field `{field}`: {reason}")
            }
            Self::CurveFile { path, reason } => {
                write!(f, "failed to load difficulty curve from {path}: {reason}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Debug)]
pub enum StoreError {
    Io(std::io::Error),
    Parse(serde_json::Error),
    UnsupportedVersion { found: u8 },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(error) => write!(f, "progress store io error: {error}"),
            Self::Parse(error) => write!(f, "progress store parse error: {error}"),
            Self::UnsupportedVersion { found } => {
                write!(f, "unsupported progress store version: {found}")
            }
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(error) => Some(error),
            Self::Parse(error) => Some(error),
            Self::UnsupportedVersion { .. } => None,
        }
    }
}

impl From<std::io::Error> for StoreError {
    fn from(error: std::io::Error) -> Self {
        Self::Io(error)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(error: serde_json::Error) -> Self {
        Self::Parse(error)
    }
}
