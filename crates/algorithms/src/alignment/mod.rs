//! Grid alignment
//!
//! Resamples a source grid onto a reference pixel grid so that two rasters
//! become cell-wise comparable. Each target cell centre is mapped through
//! the reference transform to map coordinates and back through the inverse
//! of the source transform; the source is then sampled there.
//!
//! - [`Resampling::Nearest`] for categorical data (label grids)
//! - [`Resampling::Bilinear`] and [`Resampling::Average`] for continuous data
//!
//! Aligning a grid onto its own pixel grid returns an exact copy.
//!
//! When only a reference shape is known, or the grids are not
//! georeferenced, [`align_raster_to_shape`] and [`align_stack_to_shape`]
//! stretch the source's whole extent over the requested shape instead.

mod sampling;

use crate::maybe_rayon::*;
use landshift_core::raster::{GeoTransform, Raster, RasterElement, RasterStack};
use landshift_core::{Error, Result, CRS};
use ndarray::{Array2, Array3};
use serde::{Deserialize, Serialize};
use tracing::debug;

use sampling::SourceGrid;

/// Interpolation used when resampling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Resampling {
    /// Value of the source cell containing the target centre
    Nearest,
    /// Distance-weighted mean of the four nearest source centres
    #[default]
    Bilinear,
    /// Mean of source cells whose centres fall in the target footprint;
    /// bilinear when none do (upsampling)
    Average,
}

/// Shape, transform and CRS of a pixel grid
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridSpec {
    pub rows: usize,
    pub cols: usize,
    pub transform: GeoTransform,
    pub crs: Option<CRS>,
}

impl GridSpec {
    pub fn new(rows: usize, cols: usize, transform: GeoTransform, crs: Option<CRS>) -> Self {
        Self {
            rows,
            cols,
            transform,
            crs,
        }
    }

    /// Pixel grid of a single-layer raster
    pub fn of<T: RasterElement>(raster: &Raster<T>) -> Self {
        Self::new(
            raster.rows(),
            raster.cols(),
            *raster.transform(),
            raster.crs().cloned(),
        )
    }

    /// Pixel grid of a multi-band stack
    pub fn of_stack(stack: &RasterStack) -> Self {
        Self::new(
            stack.rows(),
            stack.cols(),
            *stack.transform(),
            stack.crs().cloned(),
        )
    }

    /// Grid of `rows` x `cols` cells stretched over the source's own extent.
    ///
    /// Aligning onto it matches a reference shape without consulting the
    /// reference transform, so ungeoreferenced grids and grids of differing
    /// extent still cover every output cell.
    pub fn from_shape<T: RasterElement>(source: &Raster<T>, rows: usize, cols: usize) -> Result<Self> {
        Self::stretched(source.shape(), source.transform(), source.crs(), rows, cols)
    }

    /// [`GridSpec::from_shape`] for a multi-band stack
    pub fn from_stack_shape(source: &RasterStack, rows: usize, cols: usize) -> Result<Self> {
        Self::stretched(source.shape(), source.transform(), source.crs(), rows, cols)
    }

    fn stretched(
        (src_rows, src_cols): (usize, usize),
        transform: &GeoTransform,
        crs: Option<&CRS>,
        rows: usize,
        cols: usize,
    ) -> Result<Self> {
        if rows == 0 || cols == 0 {
            return Err(Error::InvalidDimensions {
                width: cols,
                height: rows,
            });
        }
        Ok(Self::new(
            rows,
            cols,
            transform.rescaled(src_rows, src_cols, rows, cols),
            crs.cloned(),
        ))
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Grid covering the same extent with square cells of `resolution` map
    /// units. Partial edge cells are kept, so the extent may grow by less
    /// than one cell.
    pub fn with_resolution(&self, resolution: f64) -> Result<Self> {
        if !(resolution.is_finite() && resolution > 0.0) {
            return Err(Error::InvalidParameter {
                name: "resolution",
                value: resolution.to_string(),
                reason: "must be a positive number of map units".into(),
            });
        }
        let t = &self.transform;
        let sx = resolution / t.pixel_width.abs();
        let sy = resolution / t.pixel_height.abs();
        let cols = cells_covering(self.cols as f64 / sx);
        let rows = cells_covering(self.rows as f64 / sy);

        let mut transform = *t;
        transform.pixel_width *= sx;
        transform.pixel_height *= sy;
        transform.row_rotation *= sy;
        transform.col_rotation *= sx;

        Ok(Self::new(rows, cols, transform, self.crs.clone()))
    }

    /// Same shape and (within a small fraction of a pixel) the same transform
    pub fn is_aligned_with(&self, other: &GridSpec) -> bool {
        let pixel = self
            .transform
            .pixel_width
            .abs()
            .min(self.transform.pixel_height.abs());
        self.shape() == other.shape()
            && self.transform.approx_eq(&other.transform, pixel * 1e-9)
    }

    fn check_crs(&self, source: Option<&CRS>) -> Result<()> {
        if let (Some(target), Some(source)) = (self.crs.as_ref(), source) {
            if !target.is_equivalent(source) {
                return Err(Error::CrsMismatch(
                    source.identifier(),
                    target.identifier(),
                ));
            }
        }
        Ok(())
    }
}

fn cells_covering(extent_in_cells: f64) -> usize {
    // tolerate representation error so an exact fit does not gain a cell
    ((extent_in_cells - 1e-9).ceil() as usize).max(1)
}

/// Whether two grids share shape and transform
pub fn is_aligned(a: &GridSpec, b: &GridSpec) -> bool {
    a.is_aligned_with(b)
}

/// Resample a single-layer raster onto `target`.
///
/// Cells outside the source extent, or whose samples are all no-value,
/// receive NaN for float rasters and the source nodata value (or 0) for
/// integer rasters. Integer results of bilinear/average sampling are rounded.
pub fn align_raster<T: RasterElement>(
    source: &Raster<T>,
    target: &GridSpec,
    method: Resampling,
) -> Result<Raster<T>> {
    target.check_crs(source.crs())?;
    let fill = if T::is_float() {
        T::default_nodata()
    } else {
        source.nodata().unwrap_or_else(T::default_nodata)
    };

    if GridSpec::of(source).is_aligned_with(target) {
        debug!("grids already aligned; copying source");
        let mut out = source.clone();
        out.set_transform(target.transform);
        if target.crs.is_some() {
            out.set_crs(target.crs.clone());
        }
        return Ok(out);
    }

    let grid = SourceGrid::new(source.rows(), source.cols(), *source.transform(), |r, c| {
        let v = unsafe { source.get_unchecked(r, c) };
        if source.is_nodata(v) {
            None
        } else {
            v.to_f64()
        }
    });
    let values = resample_layer(&grid, target, method);

    let data: Vec<T> = values
        .into_iter()
        .map(|v| {
            if v.is_nan() {
                fill
            } else {
                T::from_f64(v).unwrap_or(fill)
            }
        })
        .collect();

    let array = Array2::from_shape_vec(target.shape(), data)
        .map_err(|e| Error::Other(e.to_string()))?;
    let mut out = Raster::from_array(array);
    out.set_transform(target.transform);
    out.set_crs(target.crs.clone().or_else(|| source.crs().cloned()));
    out.set_nodata(Some(fill));

    debug!(
        from = ?source.shape(),
        to = ?target.shape(),
        ?method,
        "aligned raster"
    );
    Ok(out)
}

/// Resample a single-layer raster to `shape`, stretching its full extent
/// over the new grid. The result keeps the source's extent and CRS.
pub fn align_raster_to_shape<T: RasterElement>(
    source: &Raster<T>,
    shape: (usize, usize),
    method: Resampling,
) -> Result<Raster<T>> {
    let target = GridSpec::from_shape(source, shape.0, shape.1)?;
    align_raster(source, &target, method)
}

/// Resample every layer of a stack to `shape` over the stack's own extent
pub fn align_stack_to_shape(
    source: &RasterStack,
    shape: (usize, usize),
    method: Resampling,
) -> Result<RasterStack> {
    let target = GridSpec::from_stack_shape(source, shape.0, shape.1)?;
    align_stack(source, &target, method)
}

/// Resample every layer of a stack onto `target`. Layer names are kept.
pub fn align_stack(
    source: &RasterStack,
    target: &GridSpec,
    method: Resampling,
) -> Result<RasterStack> {
    target.check_crs(source.crs())?;

    let aligned = GridSpec::of_stack(source).is_aligned_with(target);
    let (rows, cols) = target.shape();
    let mut data = if aligned {
        source.data().clone()
    } else {
        Array3::<f64>::from_elem((source.num_bands(), rows, cols), f64::NAN)
    };

    if !aligned {
        let nodata = source.nodata();
        for b in 0..source.num_bands() {
            let band = source.band_view(b)?;
            let grid = SourceGrid::new(source.rows(), source.cols(), *source.transform(), |r, c| {
                let v = band[(r, c)];
                if crate::imagery::is_no_value(v, nodata) {
                    None
                } else {
                    Some(v)
                }
            });
            let values = resample_layer(&grid, target, method);
            let layer = Array2::from_shape_vec((rows, cols), values)
                .map_err(|e| Error::Other(e.to_string()))?;
            data.index_axis_mut(ndarray::Axis(0), b).assign(&layer);
        }
        debug!(
            bands = source.num_bands(),
            from = ?source.shape(),
            to = ?target.shape(),
            ?method,
            "aligned stack"
        );
    }

    let mut out = RasterStack::from_array(data)?
        .with_transform(target.transform)
        .with_crs(target.crs.clone().or_else(|| source.crs().cloned()))
        .with_nodata(source.nodata());
    if source.has_layer_names() {
        out = out.with_layer_names(source.layer_names())?;
    }
    Ok(out)
}

/// Sample `grid` at every cell centre of `target`, row-major, NaN for no value
fn resample_layer<F>(grid: &SourceGrid<F>, target: &GridSpec, method: Resampling) -> Vec<f64>
where
    F: Fn(usize, usize) -> Option<f64> + Sync,
{
    let (rows, cols) = target.shape();
    let dst = &target.transform;

    (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![f64::NAN; cols];
            for (col, out) in row_data.iter_mut().enumerate() {
                let value = match method {
                    Resampling::Nearest => grid.nearest_at(dst, row, col),
                    Resampling::Bilinear => grid.bilinear_at(dst, row, col),
                    Resampling::Average => grid
                        .average_at(dst, row, col)
                        .or_else(|| grid.bilinear_at(dst, row, col)),
                };
                if let Some(v) = value {
                    *out = v;
                }
            }
            row_data
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn ramp(rows: usize, cols: usize, transform: GeoTransform) -> Raster<f64> {
        let data: Vec<f64> = (0..rows * cols).map(|i| i as f64).collect();
        let mut r = Raster::from_vec(data, rows, cols).unwrap();
        r.set_transform(transform);
        r.set_crs(Some(CRS::from_epsg(32640)));
        r
    }

    #[test]
    fn test_align_identity_is_exact_copy() {
        let src = ramp(4, 5, GeoTransform::new(0.0, 40.0, 10.0, -10.0));
        let spec = GridSpec::of(&src);
        for method in [Resampling::Nearest, Resampling::Bilinear, Resampling::Average] {
            let out = align_raster(&src, &spec, method).unwrap();
            assert_eq!(out.data(), src.data());
        }
    }

    #[test]
    fn test_align_is_idempotent() {
        let src = ramp(6, 6, GeoTransform::new(0.0, 60.0, 10.0, -10.0));
        let target = GridSpec::new(
            3,
            3,
            GeoTransform::new(0.0, 60.0, 20.0, -20.0),
            Some(CRS::from_epsg(32640)),
        );
        let once = align_raster(&src, &target, Resampling::Bilinear).unwrap();
        let twice = align_raster(&once, &target, Resampling::Bilinear).unwrap();
        assert_eq!(once.shape(), (3, 3));
        for (a, b) in once.data().iter().zip(twice.data().iter()) {
            assert_relative_eq!(*a, *b, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_nearest_downsample_labels() {
        let mut labels: Raster<u8> =
            Raster::from_vec(vec![1, 1, 2, 2, 1, 1, 2, 2, 3, 3, 4, 4, 3, 3, 4, 4], 4, 4).unwrap();
        labels.set_transform(GeoTransform::new(0.0, 4.0, 1.0, -1.0));

        let target = GridSpec::new(2, 2, GeoTransform::new(0.0, 4.0, 2.0, -2.0), None);
        let out = align_raster(&labels, &target, Resampling::Nearest).unwrap();
        assert_eq!(out.data().iter().copied().collect::<Vec<u8>>(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_average_downsample() {
        let src = ramp(2, 2, GeoTransform::new(0.0, 2.0, 1.0, -1.0));
        let target = GridSpec::new(1, 1, GeoTransform::new(0.0, 2.0, 2.0, -2.0), None);
        let out = align_raster(&src, &target, Resampling::Average).unwrap();
        assert_relative_eq!(out.get(0, 0).unwrap(), 1.5, epsilon = 1e-12);
    }

    #[test]
    fn test_bilinear_upsample_interpolates() {
        // columns 0 and 1 hold 0 and 1; a 1-unit-wide target column centred on
        // the shared edge sees the mean of both
        let src = ramp(1, 2, GeoTransform::new(0.0, 1.0, 1.0, -1.0));
        let target = GridSpec::new(1, 1, GeoTransform::new(0.5, 1.0, 1.0, -1.0), None);
        let out = align_raster(&src, &target, Resampling::Bilinear).unwrap();
        assert_relative_eq!(out.get(0, 0).unwrap(), 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_outside_source_is_nodata() {
        let src = ramp(2, 2, GeoTransform::new(0.0, 2.0, 1.0, -1.0));
        let target = GridSpec::new(2, 2, GeoTransform::new(100.0, 2.0, 1.0, -1.0), None);
        let out = align_raster(&src, &target, Resampling::Bilinear).unwrap();
        assert!(out.data().iter().all(|v| v.is_nan()));

        let mut labels: Raster<u8> = Raster::filled(2, 2, 3);
        labels.set_transform(GeoTransform::new(0.0, 2.0, 1.0, -1.0));
        let out = align_raster(&labels, &target, Resampling::Nearest).unwrap();
        assert!(out.data().iter().all(|&v| v == 0));
    }

    #[test]
    fn test_crs_mismatch() {
        let src = ramp(2, 2, GeoTransform::new(0.0, 2.0, 1.0, -1.0));
        let target = GridSpec::new(
            2,
            2,
            GeoTransform::new(0.0, 2.0, 1.0, -1.0),
            Some(CRS::from_epsg(4326)),
        );
        let err = align_raster(&src, &target, Resampling::Nearest).unwrap_err();
        assert!(matches!(err, Error::CrsMismatch(..)));
    }

    #[test]
    fn test_align_stack_keeps_names() {
        let t = GeoTransform::new(0.0, 4.0, 1.0, -1.0);
        let stack = RasterStack::from_layers(&[ramp(4, 4, t), ramp(4, 4, t)])
            .unwrap()
            .with_layer_names(["NDVI", "NDWI"])
            .unwrap();
        let target = GridSpec::new(2, 2, GeoTransform::new(0.0, 4.0, 2.0, -2.0), None);
        let out = align_stack(&stack, &target, Resampling::Average).unwrap();
        assert_eq!(out.shape(), (2, 2));
        assert_eq!(out.layer_names(), vec!["NDVI", "NDWI"]);
        // top-left 2x2 block of the ramp: 0, 1, 4, 5
        assert_relative_eq!(out.band(1).unwrap().get(0, 0).unwrap(), 2.5, epsilon = 1e-12);
        assert!(is_aligned(&GridSpec::of_stack(&out), &target));
    }

    #[test]
    fn test_shape_alignment_stretches_ungeoreferenced_labels() {
        // default transforms: a pure transform mapping would leave 12 of 16
        // cells outside the 2x2 source
        let labels: Raster<u8> = Raster::from_vec(vec![1, 2, 3, 4], 2, 2).unwrap();
        let out = align_raster_to_shape(&labels, (4, 4), Resampling::Nearest).unwrap();
        assert_eq!(
            out.data().iter().copied().collect::<Vec<u8>>(),
            vec![1, 1, 2, 2, 1, 1, 2, 2, 3, 3, 4, 4, 3, 3, 4, 4]
        );
        assert_eq!(out.transform().pixel_width, 0.5);
    }

    #[test]
    fn test_shape_alignment_50_to_100() {
        let values: Vec<u8> = (0..50 * 50).map(|i| (i % 4) as u8 + 1).collect();
        let labels: Raster<u8> = Raster::from_vec(values, 50, 50).unwrap();
        let out = align_raster_to_shape(&labels, (100, 100), Resampling::Nearest).unwrap();

        assert_eq!(out.shape(), (100, 100));
        assert!(out.data().iter().all(|&v| v != 0));
        for row in 0..100 {
            for col in 0..100 {
                assert_eq!(
                    out.get(row, col).unwrap(),
                    labels.get(row / 2, col / 2).unwrap()
                );
            }
        }

        // same shape is an exact copy
        let same = align_raster_to_shape(&labels, (50, 50), Resampling::Nearest).unwrap();
        assert_eq!(same.data(), labels.data());
    }

    #[test]
    fn test_shape_alignment_of_stack_keeps_extent() {
        let t = GeoTransform::new(100.0, 40.0, 10.0, -10.0);
        let stack = RasterStack::from_layers(&[ramp(4, 4, t)])
            .unwrap()
            .with_layer_names(["NDVI"])
            .unwrap();
        let out = align_stack_to_shape(&stack, (2, 2), Resampling::Average).unwrap();
        assert_eq!(out.shape(), (2, 2));
        assert_eq!(out.layer_names(), vec!["NDVI"]);
        assert_eq!(out.transform().bounds(2, 2), t.bounds(4, 4));
        assert_relative_eq!(out.band(0).unwrap().get(0, 0).unwrap(), 2.5, epsilon = 1e-12);

        assert!(matches!(
            align_stack_to_shape(&stack, (0, 2), Resampling::Nearest),
            Err(Error::InvalidDimensions { .. })
        ));
    }

    #[test]
    fn test_with_resolution() {
        let spec = GridSpec::new(100, 50, GeoTransform::new(0.0, 0.0, 20.0, -20.0), None);
        let fine = spec.with_resolution(10.0).unwrap();
        assert_eq!(fine.shape(), (200, 100));
        assert_eq!(fine.transform.pixel_width, 10.0);
        assert_eq!(fine.transform.pixel_height, -10.0);
        assert!(spec.with_resolution(0.0).is_err());
    }
}
