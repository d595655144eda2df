//! Training data extraction and train/test splitting

use landshift_core::landcover::{is_class_label, LabelGrid};
use landshift_core::raster::RasterStack;
use landshift_core::{Error, Result};
use ndarray::{Array2, Axis};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Parameters for the train/test partition
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitParams {
    /// Fraction of rows held out for evaluation (default: 0.2)
    pub test_fraction: f64,
    /// Shuffle seed (default: 42)
    pub seed: u64,
}

impl Default for SplitParams {
    fn default() -> Self {
        Self {
            test_fraction: 0.2,
            seed: 42,
        }
    }
}

/// Per-pixel feature rows with their class labels
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingSet {
    /// One row per sample, one column per feature
    pub features: Array2<f64>,
    /// Class label per row, each in 1..=K
    pub labels: Vec<u8>,
    pub feature_names: Vec<String>,
}

impl TrainingSet {
    pub fn new(features: Array2<f64>, labels: Vec<u8>, feature_names: Vec<String>) -> Result<Self> {
        if features.nrows() != labels.len() {
            return Err(Error::InvalidParameter {
                name: "labels",
                value: labels.len().to_string(),
                reason: format!("expected one label per feature row ({})", features.nrows()),
            });
        }
        if features.ncols() != feature_names.len() {
            return Err(Error::InvalidParameter {
                name: "feature_names",
                value: feature_names.len().to_string(),
                reason: format!("expected one name per feature column ({})", features.ncols()),
            });
        }
        Ok(Self {
            features,
            labels,
            feature_names,
        })
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn num_features(&self) -> usize {
        self.features.ncols()
    }

    /// Distinct labels, ascending
    pub fn classes(&self) -> Vec<u8> {
        let mut classes = self.labels.clone();
        classes.sort_unstable();
        classes.dedup();
        classes
    }

    /// Rows at `indices`, in that order
    pub fn select(&self, indices: &[usize]) -> Self {
        Self {
            features: self.features.select(Axis(0), indices),
            labels: indices.iter().map(|&i| self.labels[i]).collect(),
            feature_names: self.feature_names.clone(),
        }
    }
}

/// Training and held-out evaluation subsets
#[derive(Debug, Clone)]
pub struct TrainTestSplit {
    pub train: TrainingSet,
    pub test: TrainingSet,
}

/// Flatten a feature stack and label grid into labelled rows.
///
/// Background (label 0) pixels are dropped, as are pixels whose label is not
/// a known class and pixels with any non-finite feature.
pub fn labelled_pixels(features: &RasterStack, labels: &LabelGrid) -> Result<TrainingSet> {
    features.ensure_same_shape(labels, "features", "labels")?;

    let rows = features.to_rows();
    let mut keep = Vec::new();
    let mut unknown = 0usize;
    let mut non_finite = 0usize;
    for (i, &label) in labels.data().iter().enumerate() {
        if label == 0 {
            continue;
        }
        if !is_class_label(label) {
            unknown += 1;
            continue;
        }
        if rows.row(i).iter().any(|v| !v.is_finite()) {
            non_finite += 1;
            continue;
        }
        keep.push(i);
    }

    if unknown > 0 {
        warn!(pixels = unknown, "dropped pixels with labels outside the class set");
    }
    if non_finite > 0 {
        warn!(pixels = non_finite, "dropped labelled pixels with non-finite features");
    }
    if keep.is_empty() {
        return Err(Error::EmptyLabelSet {
            context: "training data preparation",
        });
    }

    let flat_labels: Vec<u8> = labels.data().iter().copied().collect();
    debug!(
        samples = keep.len(),
        pixels = labels.len(),
        "extracted labelled pixels"
    );
    Ok(TrainingSet {
        features: rows.select(Axis(0), &keep),
        labels: keep.iter().map(|&i| flat_labels[i]).collect(),
        feature_names: features.layer_names(),
    })
}

/// Shuffle `set` with `params.seed` and hold out `ceil(n * test_fraction)` rows.
///
/// At least one row always stays in the training subset.
pub fn train_test_split(set: &TrainingSet, params: &SplitParams) -> Result<TrainTestSplit> {
    if !(0.0..1.0).contains(&params.test_fraction) {
        return Err(Error::InvalidParameter {
            name: "test_fraction",
            value: params.test_fraction.to_string(),
            reason: "must be in [0, 1)".into(),
        });
    }
    if set.is_empty() {
        return Err(Error::EmptyLabelSet {
            context: "train/test split",
        });
    }

    let n = set.len();
    let n_test = ((n as f64 * params.test_fraction).ceil() as usize).min(n - 1);

    let mut order: Vec<usize> = (0..n).collect();
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(params.seed);
    order.shuffle(&mut rng);

    let (test_idx, train_idx) = order.split_at(n_test);
    debug!(train = train_idx.len(), test = test_idx.len(), "split training data");
    Ok(TrainTestSplit {
        train: set.select(train_idx),
        test: set.select(test_idx),
    })
}

/// Extract labelled pixels and partition them into training and test rows.
///
/// Fails with `ShapeMismatch` if the grids differ in width/height; align
/// them first.
pub fn prepare_training_data(
    features: &RasterStack,
    labels: &LabelGrid,
    params: &SplitParams,
) -> Result<TrainTestSplit> {
    let set = labelled_pixels(features, labels)?;
    train_test_split(&set, params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use landshift_core::raster::Raster;

    fn stack(rows: usize, cols: usize) -> RasterStack {
        let a: Vec<f64> = (0..rows * cols).map(|i| i as f64).collect();
        let b: Vec<f64> = (0..rows * cols).map(|i| -(i as f64)).collect();
        RasterStack::from_layers(&[
            Raster::from_vec(a, rows, cols).unwrap(),
            Raster::from_vec(b, rows, cols).unwrap(),
        ])
        .unwrap()
        .with_layer_names(["NDVI", "NDWI"])
        .unwrap()
    }

    #[test]
    fn test_background_rows_dropped() {
        let labels = Raster::from_vec(vec![0, 1, 2, 0, 3, 4], 2, 3).unwrap();
        let set = labelled_pixels(&stack(2, 3), &labels).unwrap();
        assert_eq!(set.labels, vec![1, 2, 3, 4]);
        assert_eq!(set.features.row(0).to_vec(), vec![1.0, -1.0]);
        assert_eq!(set.feature_names, vec!["NDVI", "NDWI"]);
    }

    #[test]
    fn test_non_finite_rows_dropped() {
        let mut features = Raster::from_vec(vec![0.1, f64::NAN, 0.3, 0.4], 2, 2).unwrap();
        features.set_nodata(None);
        let stack = RasterStack::from_layers(&[features]).unwrap();
        let labels = Raster::from_vec(vec![1, 2, 7, 2], 2, 2).unwrap();
        let set = labelled_pixels(&stack, &labels).unwrap();
        assert_eq!(set.labels, vec![1, 2]);
    }

    #[test]
    fn test_shape_mismatch() {
        let labels: LabelGrid = Raster::filled(3, 3, 1);
        let err = prepare_training_data(&stack(2, 3), &labels, &SplitParams::default()).unwrap_err();
        match err {
            Error::ShapeMismatch { left, right, .. } => {
                assert_eq!((left, right), ("features", "labels"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_all_background_is_empty_label_set() {
        let labels: LabelGrid = Raster::filled(2, 3, 0);
        let err = labelled_pixels(&stack(2, 3), &labels).unwrap_err();
        assert!(matches!(err, Error::EmptyLabelSet { .. }));
    }

    #[test]
    fn test_split_sizes_and_reproducibility() {
        let labels = Raster::from_vec(vec![1u8; 100], 10, 10).unwrap();
        let split = prepare_training_data(&stack(10, 10), &labels, &SplitParams::default()).unwrap();
        assert_eq!(split.test.len(), 20);
        assert_eq!(split.train.len(), 80);

        let again = prepare_training_data(&stack(10, 10), &labels, &SplitParams::default()).unwrap();
        assert_eq!(split.test.features, again.test.features);

        let other = SplitParams {
            seed: 7,
            ..Default::default()
        };
        let different = prepare_training_data(&stack(10, 10), &labels, &other).unwrap();
        assert_ne!(split.test.features, different.test.features);
    }

    #[test]
    fn test_split_keeps_one_training_row() {
        let set = TrainingSet::new(
            Array2::from_shape_vec((1, 1), vec![0.5]).unwrap(),
            vec![2],
            vec!["NDVI".into()],
        )
        .unwrap();
        let split = train_test_split(&set, &SplitParams::default()).unwrap();
        assert_eq!(split.train.len(), 1);
        assert!(split.test.is_empty());
    }
}
