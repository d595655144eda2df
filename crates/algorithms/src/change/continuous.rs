//! Continuous change: index differencing with thresholded area statistics

use crate::imagery::{compute_index, is_no_value, IndexParams, SpectralIndex};
use crate::maybe_rayon::*;
use landshift_core::bands::BandMap;
use landshift_core::raster::{Raster, RasterStack};
use landshift_core::{Error, Result};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Change categories of [`IndexChange::categories`]
pub const CHANGE_DECREASE: f64 = 1.0;
pub const CHANGE_NO_CHANGE: f64 = 2.0;
pub const CHANGE_INCREASE: f64 = 3.0;

/// Parameters for index change detection
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChangeParams {
    /// Minimum absolute difference counted as change (default: 0.1).
    /// A difference exactly at the threshold is not significant.
    pub threshold: f64,
}

impl Default for ChangeParams {
    fn default() -> Self {
        Self { threshold: 0.1 }
    }
}

/// Pixel counts and areas of significant change
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AreaStatistics {
    pub positive_pixels: usize,
    pub negative_pixels: usize,
    pub unchanged_pixels: usize,
    /// Cells where either input had no value
    pub nodata_pixels: usize,
    pub pixel_area_km2: f64,
    pub positive_area_km2: f64,
    pub negative_area_km2: f64,
}

/// Result of differencing two index grids
#[derive(Debug, Clone)]
pub struct IndexChange {
    /// `after - before`, NaN where either input has no value
    pub difference: Raster<f64>,
    /// 1 = decrease, 2 = no significant change, 3 = increase, NaN = no value
    pub categories: Raster<f64>,
    pub stats: AreaStatistics,
}

/// Difference two aligned index grids and summarize significant change.
///
/// `difference = after - before`. A cell is an increase when the difference
/// exceeds `threshold`, a decrease when it is below `-threshold`. Areas use
/// the ground area of one `before` cell.
pub fn detect_index_change(
    before: &Raster<f64>,
    after: &Raster<f64>,
    params: &ChangeParams,
) -> Result<IndexChange> {
    if !(params.threshold.is_finite() && params.threshold >= 0.0) {
        return Err(Error::InvalidParameter {
            name: "threshold",
            value: params.threshold.to_string(),
            reason: "must be a non-negative number".into(),
        });
    }
    before.ensure_same_shape(after, "before", "after")?;
    if !before.transform().approx_eq(after.transform(), 1e-9) {
        warn!("index grids share a shape but not a transform; differencing cell by cell");
    }

    let (rows, cols) = before.shape();
    let nodata_before = before.nodata();
    let nodata_after = after.nodata();
    let threshold = params.threshold;

    let (diff_data, cat_data): (Vec<f64>, Vec<f64>) = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut cells = Vec::with_capacity(cols);
            for col in 0..cols {
                let b = unsafe { before.get_unchecked(row, col) };
                let a = unsafe { after.get_unchecked(row, col) };

                if is_no_value(b, nodata_before) || is_no_value(a, nodata_after) {
                    cells.push((f64::NAN, f64::NAN));
                    continue;
                }
                let d = a - b;
                let category = if d > threshold {
                    CHANGE_INCREASE
                } else if d < -threshold {
                    CHANGE_DECREASE
                } else {
                    CHANGE_NO_CHANGE
                };
                cells.push((d, category));
            }
            cells
        })
        .unzip();

    let stats = area_statistics(&cat_data, before.pixel_area_km2());

    let difference = before.derive(
        Array2::from_shape_vec((rows, cols), diff_data).map_err(|e| Error::Other(e.to_string()))?,
        Some(f64::NAN),
    );
    let categories = before.derive(
        Array2::from_shape_vec((rows, cols), cat_data).map_err(|e| Error::Other(e.to_string()))?,
        Some(f64::NAN),
    );

    info!(
        positive_km2 = stats.positive_area_km2,
        negative_km2 = stats.negative_area_km2,
        nodata = stats.nodata_pixels,
        threshold,
        "index change"
    );

    Ok(IndexChange {
        difference,
        categories,
        stats,
    })
}

fn area_statistics(categories: &[f64], pixel_area_km2: f64) -> AreaStatistics {
    let mut stats = AreaStatistics {
        positive_pixels: 0,
        negative_pixels: 0,
        unchanged_pixels: 0,
        nodata_pixels: 0,
        pixel_area_km2,
        positive_area_km2: 0.0,
        negative_area_km2: 0.0,
    };
    for &c in categories {
        if c == CHANGE_INCREASE {
            stats.positive_pixels += 1;
        } else if c == CHANGE_DECREASE {
            stats.negative_pixels += 1;
        } else if c == CHANGE_NO_CHANGE {
            stats.unchanged_pixels += 1;
        } else {
            stats.nodata_pixels += 1;
        }
    }
    stats.positive_area_km2 = stats.positive_pixels as f64 * pixel_area_km2;
    stats.negative_area_km2 = stats.negative_pixels as f64 * pixel_area_km2;
    stats
}

/// Compute `indices` on two aligned scenes and difference each pair.
///
/// Results are returned in the order of `indices`, labelled with the
/// index layer name (`NDBI_APPROX` when the blue fallback was used).
pub fn detect_scene_change(
    before: &RasterStack,
    after: &RasterStack,
    bands: &BandMap,
    indices: &[SpectralIndex],
    index_params: &IndexParams,
    params: &ChangeParams,
) -> Result<Vec<(String, IndexChange)>> {
    if before.shape() != after.shape() {
        return Err(Error::shape_mismatch(
            "before",
            "after",
            before.shape(),
            after.shape(),
        ));
    }
    indices
        .iter()
        .map(|&index| {
            let t1 = compute_index(index, before, bands, index_params)?;
            let t2 = compute_index(index, after, bands, index_params)?;
            let change = detect_index_change(&t1.raster, &t2.raster, params)?;
            Ok((t2.name(), change))
        })
        .collect()
}
