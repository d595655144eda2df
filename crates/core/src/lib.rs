//! # landshift core
//!
//! Data model shared by every landshift component.
//!
//! This crate provides:
//! - `Raster<T>`: a georeferenced single-layer grid (index layers, label grids)
//! - `RasterStack`: ordered, named multi-band grids (raw imagery, feature stacks)
//! - `GeoTransform` and `CRS` spatial metadata
//! - Band roles (`BandRole`, `BandMap`) and land-cover classes
//! - `ClassMatrix` for change and confusion matrices
//! - The error taxonomy used across the workspace

pub mod bands;
pub mod crs;
pub mod error;
pub mod landcover;
pub mod raster;

pub use bands::{BandMap, BandRole};
pub use crs::CRS;
pub use error::{Error, Result};
pub use landcover::{
    class_distribution, ChangeMatrix, ClassMatrix, ClassShare, ConfusionMatrix, LabelGrid,
    LandCoverClass, BACKGROUND, NUM_CLASSES,
};
pub use raster::{GeoTransform, Raster, RasterElement, RasterStack};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::bands::{BandMap, BandRole};
    pub use crate::crs::CRS;
    pub use crate::error::{Error, Result};
    pub use crate::landcover::{LabelGrid, LandCoverClass, BACKGROUND, NUM_CLASSES};
    pub use crate::raster::{GeoTransform, Raster, RasterElement, RasterStack};
}
