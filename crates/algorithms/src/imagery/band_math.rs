//! Band math operations
//!
//! Cell-wise raster algebra over one or more same-shape layers. Every
//! kernel here propagates no-value: a cell that is NaN or equal to its
//! layer's nodata value in any input is NaN in the output.

use super::indices::DenominatorPolicy;
use crate::maybe_rayon::*;
use landshift_core::raster::Raster;
use landshift_core::{Error, Result};
use ndarray::Array2;

/// Binary operations for band math
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BandMathOp {
    Add,
    Subtract,
    Multiply,
    /// Strict division: a zero divisor gives NaN
    Divide,
    Min,
    Max,
}

/// Apply a unary function to every cell in a raster.
///
/// # Example
/// ```ignore
/// let reflectance = band_math(&digital_numbers, |v| v * 1e-4)?;
/// ```
pub fn band_math<F>(raster: &Raster<f64>, f: F) -> Result<Raster<f64>>
where
    F: Fn(f64) -> f64 + Sync + Send,
{
    zip_cells([raster], ["raster"], |[v]| f(v))
}

/// Apply a binary operation between two rasters element-wise.
///
/// Both rasters must have the same dimensions (`ShapeMismatch` otherwise).
pub fn band_math_binary(a: &Raster<f64>, b: &Raster<f64>, op: BandMathOp) -> Result<Raster<f64>> {
    zip_cells([a, b], ["a", "b"], |[va, vb]| match op {
        BandMathOp::Add => va + vb,
        BandMathOp::Subtract => va - vb,
        BandMathOp::Multiply => va * vb,
        BandMathOp::Divide => DenominatorPolicy::Strict.divide(va, vb),
        BandMathOp::Min => va.min(vb),
        BandMathOp::Max => va.max(vb),
    })
}

/// Apply `f` to every cell of `N` same-shape layers.
///
/// `names` label the layers in a `ShapeMismatch` error. Spatial metadata
/// is taken from the first layer and the output nodata is NaN.
pub(crate) fn zip_cells<const N: usize, F>(
    layers: [&Raster<f64>; N],
    names: [&'static str; N],
    f: F,
) -> Result<Raster<f64>>
where
    F: Fn([f64; N]) -> f64 + Sync + Send,
{
    let first = layers[0];
    for i in 1..N {
        first.ensure_same_shape(layers[i], names[0], names[i])?;
    }

    let (rows, cols) = first.shape();
    let nodata: [Option<f64>; N] = std::array::from_fn(|i| layers[i].nodata());

    let data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![f64::NAN; cols];
            'cells: for (col, out) in row_data.iter_mut().enumerate() {
                let mut values = [0.0; N];
                for i in 0..N {
                    let v = unsafe { layers[i].get_unchecked(row, col) };
                    if is_no_value(v, nodata[i]) {
                        continue 'cells;
                    }
                    values[i] = v;
                }
                *out = f(values);
            }
            row_data
        })
        .collect();

    let array =
        Array2::from_shape_vec((rows, cols), data).map_err(|e| Error::Other(e.to_string()))?;
    Ok(first.derive(array, Some(f64::NAN)))
}

/// NaN or equal to the layer's nodata sentinel
#[inline]
pub(crate) fn is_no_value(value: f64, nodata: Option<f64>) -> bool {
    value.is_nan() || nodata.map_or(false, |nd| value == nd)
}
