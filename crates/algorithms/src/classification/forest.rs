//! Bagged ensemble of CART trees (random forest)

use super::tree::{DecisionTree, TreeLimits};
use landshift_core::landcover::NUM_CLASSES;
use landshift_core::{Error, Result};
use landshift_parallel::{ParallelStrategy, ProcessingMode};
use ndarray::{Array2, ArrayView1};
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};

/// Number of features tried at each split
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MaxFeatures {
    /// `ceil(sqrt(n_features))`
    #[default]
    Sqrt,
    /// `ceil(log2(n_features))`, at least 1
    Log2,
    /// Every feature
    All,
    /// A fixed count, capped at the number of features
    Count(usize),
}

impl MaxFeatures {
    pub fn resolve(self, num_features: usize) -> usize {
        let n = num_features.max(1);
        let k = match self {
            MaxFeatures::Sqrt => (n as f64).sqrt().ceil() as usize,
            MaxFeatures::Log2 => (n as f64).log2().ceil() as usize,
            MaxFeatures::All => n,
            MaxFeatures::Count(k) => k,
        };
        k.clamp(1, n)
    }
}

/// Parameters for random forest training
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestParams {
    /// Number of trees (default: 100)
    pub n_trees: usize,
    /// Maximum tree depth; `None` grows until leaves are pure
    pub max_depth: Option<usize>,
    /// Minimum samples required to split a node (default: 2)
    pub min_samples_split: usize,
    /// Minimum samples in each child (default: 1)
    pub min_samples_leaf: usize,
    pub max_features: MaxFeatures,
    /// Draw a bootstrap resample per tree (default: true)
    pub bootstrap: bool,
    /// Base seed; tree `i` derives its own seed from this and `i` (default: 42)
    pub seed: u64,
    /// Where trees are fitted. The ensemble does not depend on it.
    pub mode: ProcessingMode,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_trees: 100,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::Sqrt,
            bootstrap: true,
            seed: 42,
            mode: ProcessingMode::Parallel,
        }
    }
}

impl ForestParams {
    fn validate(&self) -> Result<()> {
        if self.n_trees == 0 {
            return Err(Error::InvalidParameter {
                name: "n_trees",
                value: "0".into(),
                reason: "the ensemble needs at least one tree".into(),
            });
        }
        if self.min_samples_split < 2 {
            return Err(Error::InvalidParameter {
                name: "min_samples_split",
                value: self.min_samples_split.to_string(),
                reason: "must be at least 2".into(),
            });
        }
        if self.min_samples_leaf == 0 {
            return Err(Error::InvalidParameter {
                name: "min_samples_leaf",
                value: "0".into(),
                reason: "must be at least 1".into(),
            });
        }
        Ok(())
    }
}

/// Seed of tree `index`
fn tree_seed(seed: u64, index: usize) -> u64 {
    seed.wrapping_add((index as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15))
}

/// Fitted ensemble
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    trees: Vec<DecisionTree>,
    num_features: usize,
}

impl RandomForest {
    /// Fit on feature rows and labels in 1..=K.
    ///
    /// Each tree draws its bootstrap sample and split columns from its own
    /// generator, so the result is identical in any processing mode.
    pub fn fit(features: &Array2<f64>, labels: &[u8], params: &ForestParams) -> Result<Self> {
        params.validate()?;
        let n = features.nrows();
        if n == 0 || n != labels.len() {
            return Err(Error::InvalidParameter {
                name: "labels",
                value: labels.len().to_string(),
                reason: format!("expected one label per feature row ({n})"),
            });
        }

        let limits = TreeLimits {
            max_depth: params.max_depth,
            min_samples_split: params.min_samples_split,
            min_samples_leaf: params.min_samples_leaf,
            max_features: params.max_features.resolve(features.ncols()),
        };

        let trees = params.mode.par_map(0..params.n_trees, |i| {
            let mut rng = Xoshiro256PlusPlus::seed_from_u64(tree_seed(params.seed, i));
            let samples: Vec<usize> = if params.bootstrap {
                (0..n).map(|_| rng.gen_range(0..n)).collect()
            } else {
                (0..n).collect()
            };
            DecisionTree::fit(features, labels, samples, &limits, &mut rng)
        })?;

        Ok(Self {
            trees,
            num_features: features.ncols(),
        })
    }

    /// Majority vote over all trees; ties go to the lowest label
    pub fn predict_row(&self, row: ArrayView1<'_, f64>) -> u8 {
        let mut votes = [0usize; NUM_CLASSES];
        for tree in &self.trees {
            let class = tree.predict_row(row);
            votes[(class - 1) as usize] += 1;
        }
        let mut best = 0;
        for k in 1..NUM_CLASSES {
            if votes[k] > votes[best] {
                best = k;
            }
        }
        best as u8 + 1
    }

    /// Mean of per-tree normalized impurity decrease, renormalized to sum 1.
    ///
    /// Uniform when no tree made a split.
    pub fn feature_importance(&self) -> Vec<f64> {
        let mut total = vec![0.0; self.num_features];
        for tree in &self.trees {
            for (acc, v) in total.iter_mut().zip(tree.feature_importance()) {
                *acc += v;
            }
        }
        let sum: f64 = total.iter().sum();
        if sum > 0.0 {
            total.iter().map(|v| v / sum).collect()
        } else {
            vec![1.0 / self.num_features.max(1) as f64; self.num_features]
        }
    }

    pub fn trees(&self) -> &[DecisionTree] {
        &self.trees
    }

    pub fn num_features(&self) -> usize {
        self.num_features
    }
}
