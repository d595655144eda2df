//! Spectral vegetation, water, built-up and soil indices
//!
//! Every index is a per-cell formula over same-shape `f64` layers and yields a
//! same-shape layer. Cells whose denominator vanishes are handled by a
//! [`DenominatorPolicy`]: strict masking writes NaN (no value) so that
//! NaN-aware aggregation skips them, while the stabilized policy adds a small
//! epsilon so classification gets a dense numeric tensor. Input cells that are
//! NaN or equal to a layer's nodata value are NaN under both policies.

use super::band_math::zip_cells;
use landshift_core::bands::{BandMap, BandRole};
use landshift_core::raster::{Raster, RasterStack};
use landshift_core::{Error, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Spectral indices supported by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpectralIndex {
    /// Normalized Difference Vegetation Index
    Ndvi,
    /// Normalized Difference Water Index (McFeeters)
    Ndwi,
    /// Normalized Difference Built-up Index
    Ndbi,
    /// Soil Adjusted Vegetation Index
    Savi,
    /// Modified (self-adjusting) Soil Adjusted Vegetation Index
    Msavi,
    /// Enhanced Vegetation Index
    Evi,
    /// Bare Soil Index
    Bsi,
}

impl SpectralIndex {
    /// Layer order of a feature stack
    pub const FEATURE_ORDER: [SpectralIndex; 7] = [
        SpectralIndex::Ndvi,
        SpectralIndex::Ndwi,
        SpectralIndex::Ndbi,
        SpectralIndex::Savi,
        SpectralIndex::Msavi,
        SpectralIndex::Evi,
        SpectralIndex::Bsi,
    ];

    /// Layer name used in feature stacks
    pub fn name(self) -> &'static str {
        match self {
            SpectralIndex::Ndvi => "NDVI",
            SpectralIndex::Ndwi => "NDWI",
            SpectralIndex::Ndbi => "NDBI",
            SpectralIndex::Savi => "SAVI",
            SpectralIndex::Msavi => "MSAVI",
            SpectralIndex::Evi => "EVI",
            SpectralIndex::Bsi => "BSI",
        }
    }

    /// Band roles the formula reads, in argument order
    pub fn operands(self) -> &'static [BandRole] {
        use BandRole::*;
        match self {
            SpectralIndex::Ndvi => &[Nir, Red],
            SpectralIndex::Ndwi => &[Green, Nir],
            SpectralIndex::Ndbi => &[Swir1, Nir],
            SpectralIndex::Savi => &[Nir, Red],
            SpectralIndex::Msavi => &[Nir, Red],
            SpectralIndex::Evi => &[Nir, Red, Blue],
            SpectralIndex::Bsi => &[Swir1, Nir, Red, Blue],
        }
    }
}

/// Handling of zero denominators in ratio formulas
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum DenominatorPolicy {
    /// Exactly-zero denominator gives NaN
    Strict,
    /// `epsilon` is added to every denominator
    Stabilized { epsilon: f64 },
}

impl DenominatorPolicy {
    pub const DEFAULT_EPSILON: f64 = 1e-6;

    /// Stabilized policy with the default epsilon
    pub fn stabilized() -> Self {
        DenominatorPolicy::Stabilized {
            epsilon: Self::DEFAULT_EPSILON,
        }
    }

    /// `num / den` under this policy
    #[inline]
    pub fn divide(self, num: f64, den: f64) -> f64 {
        let den = match self {
            DenominatorPolicy::Strict => den,
            DenominatorPolicy::Stabilized { epsilon } => den + epsilon,
        };
        if den == 0.0 {
            f64::NAN
        } else {
            num / den
        }
    }
}

impl Default for DenominatorPolicy {
    fn default() -> Self {
        DenominatorPolicy::Strict
    }
}

// ---------------------------------------------------------------------------
// Parameters
// ---------------------------------------------------------------------------

/// Parameters for SAVI
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SaviParams {
    /// Soil brightness correction factor (0 = dense vegetation, 1 = sparse).
    /// Default: 0.5
    pub l_factor: f64,
}

impl Default for SaviParams {
    fn default() -> Self {
        Self { l_factor: 0.5 }
    }
}

/// Parameters for EVI
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EviParams {
    /// Gain factor (default: 2.5)
    pub g: f64,
    /// Aerosol coefficient for red band (default: 6.0)
    pub c1: f64,
    /// Aerosol coefficient for blue band (default: 7.5)
    pub c2: f64,
    /// Canopy background adjustment (default: 1.0)
    pub l: f64,
}

impl Default for EviParams {
    fn default() -> Self {
        Self {
            g: 2.5,
            c1: 6.0,
            c2: 7.5,
            l: 1.0,
        }
    }
}

/// Parameters for [`compute_index`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexParams {
    pub policy: DenominatorPolicy,
    pub savi: SaviParams,
    pub evi: EviParams,
    /// Substitute the blue band for SWIR1 in NDBI when SWIR1 is not mapped.
    /// The result is flagged approximate; it is not a true built-up index.
    pub allow_ndbi_fallback: bool,
}

impl Default for IndexParams {
    fn default() -> Self {
        Self {
            policy: DenominatorPolicy::Strict,
            savi: SaviParams::default(),
            evi: EviParams::default(),
            allow_ndbi_fallback: false,
        }
    }
}

/// Band that supplied the short-wave-infrared operand of NDBI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NdbiSource {
    ShortWaveInfrared,
    /// Degraded mode: blue stands in for SWIR1
    BlueFallback,
}

/// An index layer together with how it was derived
#[derive(Debug, Clone)]
pub struct ComputedIndex {
    pub index: SpectralIndex,
    pub raster: Raster<f64>,
    /// True when a substitute band was used (NDBI blue fallback)
    pub approximate: bool,
}

impl ComputedIndex {
    /// Layer name; approximate results carry an `_APPROX` suffix
    pub fn name(&self) -> String {
        if self.approximate {
            format!("{}_APPROX", self.index.name())
        } else {
            self.index.name().to_string()
        }
    }
}

// ---------------------------------------------------------------------------
// Generic normalized difference
// ---------------------------------------------------------------------------

/// `(band_a - band_b) / (band_a + band_b)`
///
/// Result is in [-1, 1] for non-negative reflectances.
pub fn normalized_difference(
    band_a: &Raster<f64>,
    band_b: &Raster<f64>,
    policy: DenominatorPolicy,
) -> Result<Raster<f64>> {
    zip_cells([band_a, band_b], ["band_a", "band_b"], |[a, b]| {
        policy.divide(a - b, a + b)
    })
}

/// Normalized Difference Vegetation Index
///
/// `NDVI = (NIR - Red) / (NIR + Red)`
///
/// - Dense vegetation: 0.6 to 0.9
/// - Bare soil: 0.1 to 0.2
/// - Water: below 0
pub fn ndvi(nir: &Raster<f64>, red: &Raster<f64>, policy: DenominatorPolicy) -> Result<Raster<f64>> {
    zip_cells([nir, red], ["nir", "red"], |[n, r]| policy.divide(n - r, n + r))
}

/// Normalized Difference Water Index (McFeeters, 1996)
///
/// `NDWI = (Green - NIR) / (Green + NIR)`; positive over open water.
pub fn ndwi(green: &Raster<f64>, nir: &Raster<f64>, policy: DenominatorPolicy) -> Result<Raster<f64>> {
    zip_cells([green, nir], ["green", "nir"], |[g, n]| policy.divide(g - n, g + n))
}

/// Normalized Difference Built-up Index (Zha et al., 2003)
///
/// `NDBI = (SWIR1 - NIR) / (SWIR1 + NIR)`; positive over built-up surfaces.
pub fn ndbi(swir: &Raster<f64>, nir: &Raster<f64>, policy: DenominatorPolicy) -> Result<Raster<f64>> {
    zip_cells([swir, nir], ["swir1", "nir"], |[s, n]| policy.divide(s - n, s + n))
}

/// Approximate NDBI with blue in place of SWIR1: `(Blue - NIR) / (Blue + NIR)`.
///
/// For four-band (visible + NIR) products only. This is not a true
/// built-up index and callers should report it as approximate.
pub fn ndbi_blue_fallback(
    blue: &Raster<f64>,
    nir: &Raster<f64>,
    policy: DenominatorPolicy,
) -> Result<Raster<f64>> {
    zip_cells([blue, nir], ["blue", "nir"], |[b, n]| policy.divide(b - n, b + n))
}

/// Soil Adjusted Vegetation Index (Huete, 1988)
///
/// `SAVI = ((NIR - Red) * (1 + L)) / (NIR + Red + L)`
pub fn savi(
    nir: &Raster<f64>,
    red: &Raster<f64>,
    params: SaviParams,
    policy: DenominatorPolicy,
) -> Result<Raster<f64>> {
    let l = params.l_factor;
    zip_cells([nir, red], ["nir", "red"], |[n, r]| {
        policy.divide((n - r) * (1.0 + l), n + r + l)
    })
}

/// Modified Soil Adjusted Vegetation Index (Qi et al., 1994)
///
/// `MSAVI = (2·NIR + 1 - sqrt((2·NIR + 1)² - 8·(NIR - Red))) / 2`
///
/// The soil factor adjusts itself, so there is no free parameter and the
/// denominator is the constant 2. A negative radicand is undefined and
/// yields NaN.
pub fn msavi(nir: &Raster<f64>, red: &Raster<f64>) -> Result<Raster<f64>> {
    zip_cells([nir, red], ["nir", "red"], |[n, r]| {
        let a = 2.0 * n + 1.0;
        let radicand = a * a - 8.0 * (n - r);
        if radicand < 0.0 {
            f64::NAN
        } else {
            (a - radicand.sqrt()) / 2.0
        }
    })
}

/// Enhanced Vegetation Index (Huete et al., 2002)
///
/// `EVI = G * (NIR - Red) / (NIR + C1 * Red - C2 * Blue + L)`
pub fn evi(
    nir: &Raster<f64>,
    red: &Raster<f64>,
    blue: &Raster<f64>,
    params: EviParams,
    policy: DenominatorPolicy,
) -> Result<Raster<f64>> {
    zip_cells([nir, red, blue], ["nir", "red", "blue"], |[n, r, b]| {
        policy.divide(
            params.g * (n - r),
            n + params.c1 * r - params.c2 * b + params.l,
        )
    })
}

/// Bare Soil Index
///
/// `BSI = ((SWIR1 + Red) - (NIR + Blue)) / ((SWIR1 + Red) + (NIR + Blue))`
pub fn bsi(
    swir: &Raster<f64>,
    nir: &Raster<f64>,
    red: &Raster<f64>,
    blue: &Raster<f64>,
    policy: DenominatorPolicy,
) -> Result<Raster<f64>> {
    zip_cells(
        [swir, nir, red, blue],
        ["swir1", "nir", "red", "blue"],
        |[s, n, r, b]| {
            let soil = s + r;
            let veg = n + b;
            policy.divide(soil - veg, soil + veg)
        },
    )
}

// ---------------------------------------------------------------------------
// Dispatch over a multi-band grid
// ---------------------------------------------------------------------------

/// Compute `index` from the layers of `stack` selected by `bands`.
///
/// Fails with [`Error::MissingBand`] when an operand role is not mapped,
/// except for NDBI with `allow_ndbi_fallback`, which then reads the blue band.
pub fn compute_index(
    index: SpectralIndex,
    stack: &RasterStack,
    bands: &BandMap,
    params: &IndexParams,
) -> Result<ComputedIndex> {
    let policy = params.policy;
    let layer = |role: BandRole| -> Result<Raster<f64>> { stack.band(bands.resolve(role)?) };

    let mut approximate = false;
    let raster = match index {
        SpectralIndex::Ndvi => ndvi(&layer(BandRole::Nir)?, &layer(BandRole::Red)?, policy)?,
        SpectralIndex::Ndwi => ndwi(&layer(BandRole::Green)?, &layer(BandRole::Nir)?, policy)?,
        SpectralIndex::Ndbi => match ndbi_source(bands, params)? {
            NdbiSource::ShortWaveInfrared => {
                ndbi(&layer(BandRole::Swir1)?, &layer(BandRole::Nir)?, policy)?
            }
            NdbiSource::BlueFallback => {
                warn!("SWIR1 not mapped; computing approximate NDBI from the blue band");
                approximate = true;
                ndbi_blue_fallback(&layer(BandRole::Blue)?, &layer(BandRole::Nir)?, policy)?
            }
        },
        SpectralIndex::Savi => savi(
            &layer(BandRole::Nir)?,
            &layer(BandRole::Red)?,
            params.savi,
            policy,
        )?,
        SpectralIndex::Msavi => msavi(&layer(BandRole::Nir)?, &layer(BandRole::Red)?)?,
        SpectralIndex::Evi => evi(
            &layer(BandRole::Nir)?,
            &layer(BandRole::Red)?,
            &layer(BandRole::Blue)?,
            params.evi,
            policy,
        )?,
        SpectralIndex::Bsi => bsi(
            &layer(BandRole::Swir1)?,
            &layer(BandRole::Nir)?,
            &layer(BandRole::Red)?,
            &layer(BandRole::Blue)?,
            policy,
        )?,
    };

    debug!(index = index.name(), approximate, ?policy, "computed spectral index");
    Ok(ComputedIndex {
        index,
        raster,
        approximate,
    })
}

/// Which band supplies NDBI's short-wave-infrared operand under `params`
pub fn ndbi_source(bands: &BandMap, params: &IndexParams) -> Result<NdbiSource> {
    if bands.contains(BandRole::Swir1) {
        Ok(NdbiSource::ShortWaveInfrared)
    } else if params.allow_ndbi_fallback && bands.contains(BandRole::Blue) {
        Ok(NdbiSource::BlueFallback)
    } else {
        Err(Error::MissingBand {
            role: BandRole::Swir1,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use landshift_core::GeoTransform;

    fn make_band(rows: usize, cols: usize, value: f64) -> Raster<f64> {
        let mut r = Raster::filled(rows, cols, value);
        r.set_transform(GeoTransform::new(0.0, rows as f64, 1.0, -1.0));
        r
    }

    fn row_band(values: &[f64]) -> Raster<f64> {
        Raster::from_vec(values.to_vec(), 1, values.len()).unwrap()
    }

    #[test]
    fn test_ndvi_zero_denominator_policies() {
        let nir = row_band(&[10.0, 0.0]);
        let red = row_band(&[2.0, 0.0]);

        let strict = ndvi(&nir, &red, DenominatorPolicy::Strict).unwrap();
        assert_relative_eq!(strict.get(0, 0).unwrap(), 8.0 / 12.0, epsilon = 1e-12);
        assert!(strict.get(0, 1).unwrap().is_nan());

        let stable = ndvi(&nir, &red, DenominatorPolicy::stabilized()).unwrap();
        assert_relative_eq!(stable.get(0, 0).unwrap(), 8.0 / 12.0, epsilon = 1e-6);
        assert_eq!(stable.get(0, 1).unwrap(), 0.0);
    }

    #[test]
    fn test_policies_agree_away_from_singularity() {
        let eps = DenominatorPolicy::DEFAULT_EPSILON;
        let nir_vals: Vec<f64> = (1..=20).map(|i| i as f64 * 0.05).collect();
        let red_vals: Vec<f64> = (1..=20).rev().map(|i| i as f64 * 0.03).collect();
        let nir = row_band(&nir_vals);
        let red = row_band(&red_vals);

        let strict = ndvi(&nir, &red, DenominatorPolicy::Strict).unwrap();
        let stable = ndvi(&nir, &red, DenominatorPolicy::stabilized()).unwrap();

        for col in 0..nir_vals.len() {
            let den = nir_vals[col] + red_vals[col];
            let diff = (strict.get(0, col).unwrap() - stable.get(0, col).unwrap()).abs();
            assert!(diff <= eps / den, "col {}: diff {} exceeds {}", col, diff, eps / den);
        }
    }

    #[test]
    fn test_ndwi_water_positive() {
        let green = make_band(5, 5, 0.3);
        let nir = make_band(5, 5, 0.1);
        let result = ndwi(&green, &nir, DenominatorPolicy::Strict).unwrap();
        assert_relative_eq!(result.get(2, 2).unwrap(), 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_ndbi_and_fallback() {
        let swir = make_band(3, 3, 0.4);
        let nir = make_band(3, 3, 0.2);
        let blue = make_band(3, 3, 0.1);

        let true_ndbi = ndbi(&swir, &nir, DenominatorPolicy::Strict).unwrap();
        assert_relative_eq!(true_ndbi.get(1, 1).unwrap(), 0.2 / 0.6, epsilon = 1e-12);

        let approx = ndbi_blue_fallback(&blue, &nir, DenominatorPolicy::Strict).unwrap();
        assert_relative_eq!(approx.get(1, 1).unwrap(), -0.1 / 0.3, epsilon = 1e-12);
    }

    #[test]
    fn test_savi() {
        let nir = make_band(5, 5, 0.5);
        let red = make_band(5, 5, 0.1);
        let result = savi(&nir, &red, SaviParams::default(), DenominatorPolicy::Strict).unwrap();
        let expected = ((0.5 - 0.1) * 1.5) / (0.5 + 0.1 + 0.5);
        assert_relative_eq!(result.get(2, 2).unwrap(), expected, epsilon = 1e-12);
    }

    #[test]
    fn test_msavi() {
        let nir = make_band(2, 2, 0.5);
        let red = make_band(2, 2, 0.1);
        let result = msavi(&nir, &red).unwrap();
        let a: f64 = 2.0 * 0.5 + 1.0;
        let expected = (a - (a * a - 8.0 * 0.4).sqrt()) / 2.0;
        assert_relative_eq!(result.get(0, 0).unwrap(), expected, epsilon = 1e-12);
    }

    #[test]
    fn test_msavi_negative_radicand_is_nan() {
        // (2n+1)^2 - 8(n-r) = (2n-1)^2 + 8r < 0 requires r < 0
        let nir = row_band(&[0.5]);
        let red = row_band(&[-0.1]);
        let result = msavi(&nir, &red).unwrap();
        assert!(result.get(0, 0).unwrap().is_nan());
    }

    #[test]
    fn test_evi() {
        let nir = make_band(5, 5, 0.5);
        let red = make_band(5, 5, 0.1);
        let blue = make_band(5, 5, 0.05);
        let params = EviParams::default();
        let result = evi(&nir, &red, &blue, params, DenominatorPolicy::Strict).unwrap();
        let expected = 2.5 * (0.5 - 0.1) / (0.5 + 6.0 * 0.1 - 7.5 * 0.05 + 1.0);
        assert_relative_eq!(result.get(2, 2).unwrap(), expected, epsilon = 1e-12);
    }

    #[test]
    fn test_bsi() {
        let swir = make_band(5, 5, 0.4);
        let nir = make_band(5, 5, 0.2);
        let red = make_band(5, 5, 0.3);
        let blue = make_band(5, 5, 0.1);
        let result = bsi(&swir, &nir, &red, &blue, DenominatorPolicy::Strict).unwrap();
        // ((0.4+0.3) - (0.2+0.1)) / 1.0
        assert_relative_eq!(result.get(2, 2).unwrap(), 0.4, epsilon = 1e-12);
    }

    #[test]
    fn test_nodata_handling() {
        let mut nir = make_band(5, 5, 0.5);
        nir.set_nodata(Some(-9999.0));
        nir.set(2, 2, -9999.0).unwrap();
        let red = make_band(5, 5, 0.1);

        for policy in [DenominatorPolicy::Strict, DenominatorPolicy::stabilized()] {
            let result = ndvi(&nir, &red, policy).unwrap();
            assert!(result.get(2, 2).unwrap().is_nan());
            assert!(!result.get(0, 0).unwrap().is_nan());
        }
    }

    #[test]
    fn test_dimension_mismatch() {
        let a = make_band(5, 5, 1.0);
        let b = make_band(5, 10, 1.0);
        let err = normalized_difference(&a, &b, DenominatorPolicy::Strict).unwrap_err();
        assert!(matches!(err, Error::ShapeMismatch { .. }));
    }

    #[test]
    fn test_operands_match_formulas() {
        assert_eq!(SpectralIndex::Ndvi.operands(), &[BandRole::Nir, BandRole::Red]);
        assert_eq!(SpectralIndex::Bsi.operands().len(), 4);
        assert_eq!(SpectralIndex::FEATURE_ORDER.len(), 7);
    }

    #[test]
    fn test_compute_index_missing_swir() {
        let stack = RasterStack::from_layers(&[
            make_band(2, 2, 0.1),
            make_band(2, 2, 0.2),
            make_band(2, 2, 0.3),
            make_band(2, 2, 0.6),
        ])
        .unwrap();
        let bands = BandMap::rgbn();

        let err = compute_index(SpectralIndex::Ndbi, &stack, &bands, &IndexParams::default())
            .unwrap_err();
        assert!(matches!(err, Error::MissingBand { role: BandRole::Swir1 }));

        let params = IndexParams {
            allow_ndbi_fallback: true,
            ..Default::default()
        };
        let result = compute_index(SpectralIndex::Ndbi, &stack, &bands, &params).unwrap();
        assert!(result.approximate);
        assert_eq!(result.name(), "NDBI_APPROX");
        assert_relative_eq!(result.raster.get(0, 0).unwrap(), -0.5 / 0.7, epsilon = 1e-12);

        // BSI has no fallback
        assert!(compute_index(SpectralIndex::Bsi, &stack, &bands, &params).is_err());
    }
}
