//! Analysis configuration
//!
//! Aggregates the parameters of every pipeline stage. Loaded from JSON;
//! any field left out falls back to its default.

use crate::change::ChangeParams;
use crate::classification::{ForestParams, SplitParams};
use crate::imagery::{FeatureParams, IndexParams, PreprocessParams, SpectralIndex};
use landshift_core::bands::BandMap;
use landshift_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::io::Read;

/// Parameters of a full land-cover change analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Role of each layer in the raw scenes (default: Sentinel-2 B2..B12)
    pub bands: BandMap,
    pub preprocess: PreprocessParams,
    /// Classifier input features (stabilized denominators)
    pub features: FeatureParams,
    pub split: SplitParams,
    pub forest: ForestParams,
    /// Indices differenced between dates (default: NDVI, NDWI, NDBI)
    pub change_indices: Vec<SpectralIndex>,
    /// Index parameters for differencing (strict masking by default)
    pub change_index_params: IndexParams,
    pub change: ChangeParams,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            bands: BandMap::sentinel2(),
            preprocess: PreprocessParams::default(),
            features: FeatureParams::default(),
            split: SplitParams::default(),
            forest: ForestParams::default(),
            change_indices: vec![SpectralIndex::Ndvi, SpectralIndex::Ndwi, SpectralIndex::Ndbi],
            change_index_params: IndexParams::default(),
            change: ChangeParams::default(),
        }
    }
}

impl AnalysisConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Serialization(e.to_string()))
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        serde_json::from_reader(reader).map_err(|e| Error::Serialization(e.to_string()))
    }

    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::Serialization(e.to_string()))
    }
}
