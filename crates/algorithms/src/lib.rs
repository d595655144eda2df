//! # landshift algorithms
//!
//! Land-cover change analysis over multi-band satellite imagery.
//!
//! ## Algorithm categories
//!
//! - **imagery**: Spectral indices, feature stacks, band math, preprocessing
//! - **alignment**: Resampling one grid onto another's pixel grid
//! - **classification**: Random forest land-cover classifier
//! - **change**: Index differencing and class-transition matrices
//! - **validation**: Confusion matrix and per-class accuracy
//! - **config**: Serializable parameters of the whole pipeline

pub mod alignment;
pub mod change;
pub mod classification;
pub mod config;
pub mod imagery;
pub mod validation;

pub(crate) mod maybe_rayon;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::alignment::{
        align_raster, align_raster_to_shape, align_stack, align_stack_to_shape, is_aligned,
        GridSpec, Resampling,
    };
    pub use crate::change::{
        detect_class_change, detect_index_change, detect_scene_change, AreaStatistics,
        ChangeParams, ClassChange, IndexChange,
    };
    pub use crate::classification::{
        prepare_training_data, ForestParams, LandCoverClassifier, SplitParams, TrainedModel,
        TrainingSet,
    };
    pub use crate::config::AnalysisConfig;
    pub use crate::imagery::{
        band_math, band_math_binary, bsi, build_feature_stack, compute_index, evi, msavi, ndbi,
        ndvi, ndwi, normalized_difference, savi, BandMathOp, DenominatorPolicy, FeatureParams,
        FeatureStackBuilder, IndexParams, SpectralIndex,
    };
    pub use crate::validation::{validate, validate_labels, ClassMetrics, ValidationReport};
    pub use landshift_core::prelude::*;
}
