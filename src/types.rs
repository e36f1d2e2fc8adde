use serde::{Deserialize, Serialize};

/// Output convention shared by every sub-indicator and the final map.
///
/// 0 is reserved for nodata and never appears as a variant: a pixel that
/// cannot be classified stays at the raster's background value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DegradationClass {
    Degraded,
    Stable,
    Improved,
}

impl DegradationClass {
    /// Byte code written to rasters: 1 degraded, 2 stable, 3 improved.
    pub fn code(self) -> u8 {
        match self {
            DegradationClass::Degraded => 1,
            DegradationClass::Stable => 2,
            DegradationClass::Improved => 3,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(DegradationClass::Degraded),
            2 => Some(DegradationClass::Stable),
            3 => Some(DegradationClass::Improved),
            _ => None,
        }
    }
}

impl std::fmt::Display for DegradationClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DegradationClass::Degraded => write!(f, "degraded"),
            DegradationClass::Stable => write!(f, "stable"),
            DegradationClass::Improved => write!(f, "improved"),
        }
    }
}

/// Error types for the indicator pipeline
#[derive(Debug, thiserror::Error)]
pub enum DegradError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("wrong year order: start year {start} must be before end year {end}")]
    WrongYearOrder { start: i32, end: i32 },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("vegetation index '{index}' is not supported by sensor '{sensor}'")]
    UnsupportedIndex { index: String, sensor: String },

    #[error("unrecognized sensor selection: {0}")]
    UnrecognizedSensor(String),

    #[error("method not supported: {0}")]
    NotSupported(String),

    #[error("land cover class codes {missing:?} are not present in the transition matrix")]
    ClassMismatch { missing: Vec<i64> },

    #[error("asset not found: {0}")]
    AssetNotFound(String),

    #[error("band not found: {0}")]
    MissingBand(String),

    #[error("engine error: {0}")]
    Engine(String),
}

/// Result type for pipeline operations
pub type DegradResult<T> = Result<T, DegradError>;
