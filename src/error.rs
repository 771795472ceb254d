use std::path::PathBuf;

/// Errors produced by the calibration library.
#[derive(thiserror::Error, Debug)]
pub enum CalibError {
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse yaml {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("failed to read image {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Invalid ArUco dictionary: {0}")]
    UnknownDictionary(String),

    #[error("invalid board: {0}")]
    InvalidBoard(String),

    #[error("failed to render board: {0}")]
    Render(String),

    #[error("intrinsics for {0} not found")]
    MissingIntrinsics(String),

    #[error("extrinsics key '{key}' not found in {path}")]
    MissingExtrinsics { key: String, path: PathBuf },

    #[error("Number of images in both cameras do not match ({base} vs {sub}).")]
    ImageCountMismatch { base: usize, sub: usize },

    #[error("Not enough valid image pairs for calibration. Need at least {needed}, got {got}.")]
    NotEnoughPairs { needed: usize, got: usize },

    #[error("huber scale must be a positive number of pixels, got {0}")]
    InvalidHuberScale(f64),

    #[error("stereo calibration failed: {0}")]
    CalibrationFailed(String),

    #[error("camera error: {0}")]
    Camera(String),
}

impl CalibError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CalibError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, CalibError>;
