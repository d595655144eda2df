//! Feature stack assembly
//!
//! Computes a fixed, ordered set of spectral indices from a multi-band grid
//! and stacks them into one named [`RasterStack`] for classification. Index
//! denominators are epsilon-stabilized so the classifier sees a dense tensor.

use super::indices::{
    compute_index, ndbi_source, DenominatorPolicy, EviParams, IndexParams, NdbiSource,
    SaviParams, SpectralIndex,
};
use landshift_core::bands::{BandMap, BandRole};
use landshift_core::raster::RasterStack;
use landshift_core::{Error, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Parameters for feature stack construction
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureParams {
    /// Denominator stabilizer (default: 1e-6)
    pub epsilon: f64,
    pub savi: SaviParams,
    pub evi: EviParams,
    /// Allow the approximate blue-band NDBI when SWIR1 is unavailable.
    /// The layer is then named `NDBI_APPROX`.
    pub allow_ndbi_fallback: bool,
}

impl Default for FeatureParams {
    fn default() -> Self {
        Self {
            epsilon: DenominatorPolicy::DEFAULT_EPSILON,
            savi: SaviParams::default(),
            evi: EviParams::default(),
            allow_ndbi_fallback: false,
        }
    }
}

impl FeatureParams {
    fn index_params(&self) -> IndexParams {
        IndexParams {
            policy: DenominatorPolicy::Stabilized {
                epsilon: self.epsilon,
            },
            savi: self.savi,
            evi: self.evi,
            allow_ndbi_fallback: self.allow_ndbi_fallback,
        }
    }
}

/// Builds feature stacks from raw multi-band grids
#[derive(Debug, Clone)]
pub struct FeatureStackBuilder {
    bands: BandMap,
    params: FeatureParams,
    indices: Vec<SpectralIndex>,
}

impl FeatureStackBuilder {
    /// Builder producing every index in [`SpectralIndex::FEATURE_ORDER`]
    pub fn new(bands: BandMap) -> Self {
        Self {
            bands,
            params: FeatureParams::default(),
            indices: SpectralIndex::FEATURE_ORDER.to_vec(),
        }
    }

    pub fn with_params(mut self, params: FeatureParams) -> Self {
        self.params = params;
        self
    }

    /// Restrict the stack to `indices`, in the given order
    pub fn with_indices(mut self, indices: &[SpectralIndex]) -> Self {
        self.indices = indices.to_vec();
        self
    }

    pub fn indices(&self) -> &[SpectralIndex] {
        &self.indices
    }

    /// Band roles the configured indices read, deduplicated and sorted
    pub fn required_roles(&self) -> Vec<BandRole> {
        let mut roles: Vec<BandRole> = self
            .indices
            .iter()
            .flat_map(|index| index.operands().iter().copied())
            .collect();
        roles.sort();
        roles.dedup();
        roles
    }

    /// Compute all configured indices from `stack`.
    ///
    /// The result keeps `stack`'s transform and CRS, has one layer per index
    /// and NaN as nodata. Fails with `MissingBand` before any computation
    /// if a required role is not mapped.
    pub fn build(&self, stack: &RasterStack) -> Result<RasterStack> {
        if self.indices.is_empty() {
            return Err(Error::InvalidParameter {
                name: "indices",
                value: "[]".into(),
                reason: "a feature stack needs at least one index".into(),
            });
        }
        self.check_roles()?;

        let params = self.params.index_params();
        let mut layers = Vec::with_capacity(self.indices.len());
        let mut names = Vec::with_capacity(self.indices.len());
        for &index in &self.indices {
            let computed = compute_index(index, stack, &self.bands, &params)?;
            names.push(computed.name());
            layers.push(computed.raster);
        }

        debug!(layers = ?names, rows = stack.rows(), cols = stack.cols(), "built feature stack");

        Ok(RasterStack::from_layers(&layers)?
            .with_layer_names(names)?
            .with_transform(*stack.transform())
            .with_crs(stack.crs().cloned())
            .with_nodata(Some(f64::NAN)))
    }

    fn check_roles(&self) -> Result<()> {
        let params = self.params.index_params();
        for index in &self.indices {
            for &role in index.operands() {
                if *index == SpectralIndex::Ndbi && role == BandRole::Swir1 {
                    // NDBI may substitute blue when allowed
                    if ndbi_source(&self.bands, &params)? == NdbiSource::BlueFallback {
                        self.bands.resolve(BandRole::Blue)?;
                    }
                    continue;
                }
                self.bands.resolve(role)?;
            }
        }
        Ok(())
    }
}

/// Feature stack with every index, in the standard order
pub fn build_feature_stack(
    stack: &RasterStack,
    bands: &BandMap,
    params: FeatureParams,
) -> Result<RasterStack> {
    FeatureStackBuilder::new(bands.clone())
        .with_params(params)
        .build(stack)
}
