//! Imagery analysis algorithms
//!
//! - Spectral indices: NDVI, NDWI, NDBI, SAVI, MSAVI, EVI, BSI
//! - Feature stacks: all indices stacked for classification
//! - Band math: cell-wise raster algebra
//! - Preprocessing: min/max scaling and resampling

mod band_math;
mod features;
mod indices;
mod preprocess;

pub use band_math::{band_math, band_math_binary, BandMathOp};
pub(crate) use band_math::is_no_value;
pub use features::{build_feature_stack, FeatureParams, FeatureStackBuilder};
pub use indices::{
    bsi, compute_index, evi, msavi, ndbi, ndbi_blue_fallback, ndbi_source, ndvi, ndwi,
    normalized_difference, savi, ComputedIndex, DenominatorPolicy, EviParams, IndexParams,
    NdbiSource, SaviParams, SpectralIndex,
};
pub use preprocess::{normalize_min_max, preprocess, resample_to_resolution, PreprocessParams};
