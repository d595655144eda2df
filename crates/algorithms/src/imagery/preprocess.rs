//! Scene preprocessing: value scaling and resampling to a target resolution

use crate::alignment::{align_stack, GridSpec, Resampling};
use landshift_core::raster::RasterStack;
use landshift_core::{Error, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::band_math::is_no_value;

/// Parameters for [`preprocess`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessParams {
    /// Rescale all bands to [0, 1] with the scene's global min/max
    pub normalize: bool,
    /// Target ground resolution in map units; `None` keeps the native grid
    pub resolution: Option<f64>,
    pub resampling: Resampling,
}

impl Default for PreprocessParams {
    fn default() -> Self {
        Self {
            normalize: true,
            resolution: Some(10.0),
            resampling: Resampling::Bilinear,
        }
    }
}

/// Rescale every layer to [0, 1] using the minimum and maximum over all
/// valid cells of all layers. A constant scene maps to 0; no-value cells
/// stay NaN.
pub fn normalize_min_max(stack: &RasterStack) -> Result<RasterStack> {
    let nodata = stack.nodata();
    let (min, max) = stack
        .data()
        .iter()
        .filter(|&&v| !is_no_value(v, nodata) && v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });

    if min > max {
        return Err(Error::InvalidParameter {
            name: "stack",
            value: format!("{} layers", stack.num_bands()),
            reason: "no valid cells to normalize".into(),
        });
    }

    let range = max - min;
    let data = stack.data().mapv(|v| {
        if is_no_value(v, nodata) {
            f64::NAN
        } else if range > 0.0 {
            (v - min) / range
        } else {
            0.0
        }
    });

    debug!(min, max, "normalized scene to [0, 1]");

    let mut out = RasterStack::from_array(data)?
        .with_transform(*stack.transform())
        .with_crs(stack.crs().cloned())
        .with_nodata(None);
    if stack.has_layer_names() {
        out = out.with_layer_names(stack.layer_names())?;
    }
    Ok(out)
}

/// Resample a scene onto a grid with square cells of `resolution` map
/// units covering the same extent
pub fn resample_to_resolution(
    stack: &RasterStack,
    resolution: f64,
    method: Resampling,
) -> Result<RasterStack> {
    let target = GridSpec::of_stack(stack).with_resolution(resolution)?;
    align_stack(stack, &target, method)
}

/// Normalize, then resample, as configured
pub fn preprocess(stack: &RasterStack, params: &PreprocessParams) -> Result<RasterStack> {
    let scaled = if params.normalize {
        normalize_min_max(stack)?
    } else {
        stack.clone()
    };
    match params.resolution {
        Some(resolution) => resample_to_resolution(&scaled, resolution, params.resampling),
        None => Ok(scaled),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use landshift_core::GeoTransform;
    use ndarray::Array3;

    fn scene(values: Vec<f64>, bands: usize, rows: usize, cols: usize) -> RasterStack {
        let data = Array3::from_shape_vec((bands, rows, cols), values).unwrap();
        RasterStack::from_array(data)
            .unwrap()
            .with_transform(GeoTransform::new(0.0, rows as f64 * 20.0, 20.0, -20.0))
    }

    #[test]
    fn test_normalize_uses_global_range() {
        let stack = scene(vec![0.0, 500.0, 1000.0, 2000.0, f64::NAN, 4000.0, 3000.0, 1000.0], 2, 2, 2);
        let out = normalize_min_max(&stack).unwrap();
        let data = out.data();
        assert_relative_eq!(data[(0, 0, 1)], 0.125, epsilon = 1e-12);
        assert_relative_eq!(data[(1, 0, 1)], 1.0, epsilon = 1e-12);
        assert_relative_eq!(data[(0, 0, 0)], 0.0, epsilon = 1e-12);
        assert!(data[(1, 0, 0)].is_nan());
    }

    #[test]
    fn test_normalize_constant_scene() {
        let stack = scene(vec![7.0; 4], 1, 2, 2);
        let out = normalize_min_max(&stack).unwrap();
        assert!(out.data().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_resample_to_finer_resolution() {
        let stack = scene((0..8).map(f64::from).collect(), 2, 2, 2);
        let out = resample_to_resolution(&stack, 10.0, Resampling::Nearest).unwrap();
        assert_eq!(out.shape(), (4, 4));
        assert_eq!(out.num_bands(), 2);
        assert_eq!(out.transform().pixel_width, 10.0);
        assert_eq!(out.data()[(1, 3, 3)], 7.0);
    }

    #[test]
    fn test_preprocess_defaults() {
        let stack = scene((0..4).map(f64::from).collect(), 1, 2, 2);
        let out = preprocess(&stack, &PreprocessParams::default()).unwrap();
        assert_eq!(out.shape(), (4, 4));
        assert!(out.data().iter().all(|v| (0.0..=1.0).contains(v)));
    }
}
