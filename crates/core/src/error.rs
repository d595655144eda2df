//! Error types for landshift

use crate::bands::BandRole;
use thiserror::Error;

/// Main error type for landshift operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid raster dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("Index out of bounds: ({row}, {col}) in raster of size ({rows}, {cols})")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    /// Two grids entering a binary operation do not share width/height.
    #[error(
        "Shape mismatch between '{left}' ({}x{}) and '{right}' ({}x{}); align the grids first",
        expected.0, expected.1, actual.0, actual.1
    )]
    ShapeMismatch {
        left: &'static str,
        right: &'static str,
        expected: (usize, usize),
        actual: (usize, usize),
    },

    /// A band role required by a formula is absent from the band-role mapping.
    #[error("Missing band: no layer is mapped to the {role} role")]
    MissingBand { role: BandRole },

    #[error("Insufficient classes: training data contains {found} distinct class(es), at least 2 are required")]
    InsufficientClasses { found: usize },

    #[error("Classifier has not been trained")]
    NotTrained,

    #[error("Empty label set: no non-background pixels remain for {context}")]
    EmptyLabelSet { context: &'static str },

    #[error("CRS mismatch: {0} vs {1}")]
    CrsMismatch(String, String),

    #[error("Feature mismatch: model expects {expected:?}, got {found:?}")]
    FeatureMismatch {
        expected: Vec<String>,
        found: Vec<String>,
    },

    #[error("Invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Thread pool error: {0}")]
    ThreadPool(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Shape mismatch between two named grids
    pub fn shape_mismatch(
        left: &'static str,
        right: &'static str,
        expected: (usize, usize),
        actual: (usize, usize),
    ) -> Self {
        Error::ShapeMismatch {
            left,
            right,
            expected,
            actual,
        }
    }
}

/// Result type alias for landshift operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shape_mismatch_names_the_grid_pair() {
        let err = Error::shape_mismatch("predicted", "ground_truth", (100, 100), (50, 50));
        let msg = err.to_string();
        assert!(msg.contains("predicted"));
        assert!(msg.contains("ground_truth"));
        assert!(msg.contains("100x100"));
        assert!(msg.contains("50x50"));
    }

    #[test]
    fn missing_band_names_the_role() {
        let err = Error::MissingBand { role: BandRole::Swir1 };
        assert!(err.to_string().contains("SWIR1"));
    }
}
