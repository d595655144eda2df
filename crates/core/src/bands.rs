//! Band roles and band-to-layer mapping
//!
//! Index formulas address bands by their physical role (red, near-infrared, ...)
//! rather than by position. A [`BandMap`] resolves each role to a layer index
//! within a [`RasterStack`](crate::raster::RasterStack).

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Spectral role of a sensor band
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BandRole {
    Blue,
    Green,
    Red,
    /// Near-infrared
    Nir,
    /// Short-wave infrared 1 (~1.6 µm)
    Swir1,
    /// Short-wave infrared 2 (~2.2 µm)
    Swir2,
}

impl BandRole {
    /// All roles in canonical sensor order
    pub const ALL: [BandRole; 6] = [
        BandRole::Blue,
        BandRole::Green,
        BandRole::Red,
        BandRole::Nir,
        BandRole::Swir1,
        BandRole::Swir2,
    ];

    /// Short display name
    pub fn name(self) -> &'static str {
        match self {
            BandRole::Blue => "Blue",
            BandRole::Green => "Green",
            BandRole::Red => "Red",
            BandRole::Nir => "NIR",
            BandRole::Swir1 => "SWIR1",
            BandRole::Swir2 => "SWIR2",
        }
    }
}

impl fmt::Display for BandRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Mapping from band role to layer index within a multi-band grid.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BandMap {
    entries: Vec<(BandRole, usize)>,
}

impl BandMap {
    /// Empty mapping
    pub fn new() -> Self {
        Self::default()
    }

    /// Sentinel-2 L2A stack ordered B2, B3, B4, B8, B11, B12
    pub fn sentinel2() -> Self {
        Self::new()
            .with(BandRole::Blue, 0)
            .with(BandRole::Green, 1)
            .with(BandRole::Red, 2)
            .with(BandRole::Nir, 3)
            .with(BandRole::Swir1, 4)
            .with(BandRole::Swir2, 5)
    }

    /// Four-band visible + near-infrared stack ordered B2, B3, B4, B8.
    ///
    /// Has no short-wave infrared; NDBI on such a stack is only available
    /// through the approximate blue-band fallback.
    pub fn rgbn() -> Self {
        Self::new()
            .with(BandRole::Blue, 0)
            .with(BandRole::Green, 1)
            .with(BandRole::Red, 2)
            .with(BandRole::Nir, 3)
    }

    /// Builder-style insert; replaces an existing entry for the same role
    pub fn with(mut self, role: BandRole, layer: usize) -> Self {
        self.insert(role, layer);
        self
    }

    /// Map `role` to `layer`
    pub fn insert(&mut self, role: BandRole, layer: usize) {
        match self.entries.iter_mut().find(|(r, _)| *r == role) {
            Some(entry) => entry.1 = layer,
            None => self.entries.push((role, layer)),
        }
    }

    /// Layer index for `role`, if mapped
    pub fn get(&self, role: BandRole) -> Option<usize> {
        self.entries
            .iter()
            .find(|(r, _)| *r == role)
            .map(|&(_, layer)| layer)
    }

    /// Layer index for `role`, failing with [`Error::MissingBand`]
    pub fn resolve(&self, role: BandRole) -> Result<usize> {
        self.get(role).ok_or(Error::MissingBand { role })
    }

    /// Whether `role` is mapped
    pub fn contains(&self, role: BandRole) -> bool {
        self.get(role).is_some()
    }

    /// Largest mapped layer index
    pub fn max_layer(&self) -> Option<usize> {
        self.entries.iter().map(|&(_, layer)| layer).max()
    }

    /// Iterate over (role, layer) pairs
    pub fn iter(&self) -> impl Iterator<Item = (BandRole, usize)> + '_ {
        self.entries.iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinel2_mapping() {
        let map = BandMap::sentinel2();
        assert_eq!(map.get(BandRole::Blue), Some(0));
        assert_eq!(map.get(BandRole::Nir), Some(3));
        assert_eq!(map.get(BandRole::Swir2), Some(5));
        assert_eq!(map.max_layer(), Some(5));
    }

    #[test]
    fn test_resolve_missing_role() {
        let map = BandMap::rgbn();
        assert!(matches!(
            map.resolve(BandRole::Swir1),
            Err(Error::MissingBand { role: BandRole::Swir1 })
        ));
    }

    #[test]
    fn test_insert_replaces() {
        let mut map = BandMap::rgbn();
        map.insert(BandRole::Red, 7);
        assert_eq!(map.get(BandRole::Red), Some(7));
        assert_eq!(map.iter().count(), 4);
    }
}
