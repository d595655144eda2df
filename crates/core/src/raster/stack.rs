//! Multi-band raster stack

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::{GeoTransform, Raster};
use ndarray::{s, Array2, Array3, ArrayView2, Axis};

/// An ordered sequence of equally-shaped `f64` layers on one pixel grid.
///
/// This is the exchange format with the raster I/O collaborator: band
/// arrays plus transform, CRS, nodata and optional per-layer names. A
/// feature stack is a `RasterStack` whose layers are named derived indices.
///
/// Data is stored band-major as `(bands, rows, cols)`.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterStack {
    data: Array3<f64>,
    names: Vec<Option<String>>,
    transform: GeoTransform,
    crs: Option<CRS>,
    nodata: Option<f64>,
}

impl RasterStack {
    /// Build from a band-major array
    pub fn from_array(data: Array3<f64>) -> Result<Self> {
        let (bands, rows, cols) = data.dim();
        if bands == 0 {
            return Err(Error::InvalidParameter {
                name: "bands",
                value: "0".into(),
                reason: "a raster stack needs at least one layer".into(),
            });
        }
        if rows == 0 || cols == 0 {
            return Err(Error::InvalidDimensions {
                width: cols,
                height: rows,
            });
        }
        Ok(Self {
            data,
            names: vec![None; bands],
            transform: GeoTransform::default(),
            crs: None,
            nodata: None,
        })
    }

    /// Stack single-layer rasters. Spatial metadata comes from the first layer.
    pub fn from_layers(layers: &[Raster<f64>]) -> Result<Self> {
        let first = layers.first().ok_or_else(|| Error::InvalidParameter {
            name: "layers",
            value: "[]".into(),
            reason: "a raster stack needs at least one layer".into(),
        })?;
        let (rows, cols) = first.shape();

        let mut data = Array3::<f64>::zeros((layers.len(), rows, cols));
        for (i, layer) in layers.iter().enumerate() {
            first.ensure_same_shape(layer, "first layer", "stacked layer")?;
            data.slice_mut(s![i, .., ..]).assign(layer.data());
        }

        let mut stack = Self::from_array(data)?;
        stack.transform = *first.transform();
        stack.crs = first.crs().cloned();
        stack.nodata = first.nodata().filter(|nd| !nd.is_nan());
        Ok(stack)
    }

    /// Replace layer names; the count must equal the number of layers
    pub fn with_layer_names<S: Into<String>>(
        mut self,
        names: impl IntoIterator<Item = S>,
    ) -> Result<Self> {
        let names: Vec<Option<String>> = names.into_iter().map(|n| Some(n.into())).collect();
        if names.len() != self.num_bands() {
            return Err(Error::InvalidParameter {
                name: "names",
                value: names.len().to_string(),
                reason: format!("stack has {} layers", self.num_bands()),
            });
        }
        self.names = names;
        Ok(self)
    }

    pub fn with_transform(mut self, transform: GeoTransform) -> Self {
        self.transform = transform;
        self
    }

    pub fn with_crs(mut self, crs: Option<CRS>) -> Self {
        self.crs = crs;
        self
    }

    pub fn with_nodata(mut self, nodata: Option<f64>) -> Self {
        self.nodata = nodata;
        self
    }

    // Dimensions

    pub fn num_bands(&self) -> usize {
        self.data.len_of(Axis(0))
    }

    pub fn rows(&self) -> usize {
        self.data.len_of(Axis(1))
    }

    pub fn cols(&self) -> usize {
        self.data.len_of(Axis(2))
    }

    /// Spatial dimensions as (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        (self.rows(), self.cols())
    }

    // Layers

    /// View of layer `index`
    pub fn band_view(&self, index: usize) -> Result<ArrayView2<'_, f64>> {
        self.check_band(index)?;
        Ok(self.data.index_axis(Axis(0), index))
    }

    /// Layer `index` as a standalone raster carrying the stack's metadata
    pub fn band(&self, index: usize) -> Result<Raster<f64>> {
        let view = self.band_view(index)?;
        let mut raster = Raster::from_array(view.to_owned());
        raster.set_transform(self.transform);
        raster.set_crs(self.crs.clone());
        raster.set_nodata(self.nodata);
        Ok(raster)
    }

    /// First layer whose name equals `name`
    pub fn band_by_name(&self, name: &str) -> Option<Raster<f64>> {
        let index = self
            .names
            .iter()
            .position(|n| n.as_deref() == Some(name))?;
        self.band(index).ok()
    }

    /// Layer names; unnamed layers are reported as `band_<n>` (1-based)
    pub fn layer_names(&self) -> Vec<String> {
        self.names
            .iter()
            .enumerate()
            .map(|(i, n)| n.clone().unwrap_or_else(|| format!("band_{}", i + 1)))
            .collect()
    }

    /// Whether every layer carries an explicit name
    pub fn has_layer_names(&self) -> bool {
        self.names.iter().all(Option::is_some)
    }

    /// Underlying `(bands, rows, cols)` array
    pub fn data(&self) -> &Array3<f64> {
        &self.data
    }

    /// Flatten to one row per pixel (row-major pixel order), one column per layer
    pub fn to_rows(&self) -> Array2<f64> {
        let (bands, rows, cols) = self.data.dim();
        let mut out = Array2::<f64>::zeros((rows * cols, bands));
        for (b, layer) in self.data.outer_iter().enumerate() {
            for (i, &v) in layer.iter().enumerate() {
                out[(i, b)] = v;
            }
        }
        out
    }

    // Metadata

    pub fn transform(&self) -> &GeoTransform {
        &self.transform
    }

    pub fn crs(&self) -> Option<&CRS> {
        self.crs.as_ref()
    }

    pub fn nodata(&self) -> Option<f64> {
        self.nodata
    }

    /// Ground area of one cell in km²
    pub fn pixel_area_km2(&self) -> f64 {
        self.transform.pixel_area_km2()
    }

    /// Fail with [`Error::ShapeMismatch`] unless `other` has the same width/height
    pub fn ensure_same_shape<T: crate::raster::RasterElement>(
        &self,
        other: &Raster<T>,
        left: &'static str,
        right: &'static str,
    ) -> Result<()> {
        if self.shape() != other.shape() {
            return Err(Error::shape_mismatch(left, right, self.shape(), other.shape()));
        }
        Ok(())
    }

    fn check_band(&self, index: usize) -> Result<()> {
        if index >= self.num_bands() {
            return Err(Error::InvalidParameter {
                name: "band",
                value: index.to_string(),
                reason: format!("stack has {} layers", self.num_bands()),
            });
        }
        Ok(())
    }
}
