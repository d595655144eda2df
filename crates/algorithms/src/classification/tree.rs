//! CART decision tree with Gini impurity
//!
//! Trees are grown depth-first from an explicit work stack, so pathological
//! inputs cannot exhaust the call stack. Each internal node stores a feature
//! column and a threshold; samples with `value <= threshold` go left.

use landshift_core::landcover::NUM_CLASSES;
use ndarray::{Array2, ArrayView1};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Growth limits for one tree
#[derive(Debug, Clone, Copy)]
pub(crate) struct TreeLimits {
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Features tried per split before falling back to the rest
    pub max_features: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) enum Node {
    Leaf {
        class: u8,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// A fitted classification tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    nodes: Vec<Node>,
    /// Weighted impurity decrease per feature, unnormalized
    impurity_decrease: Vec<f64>,
}

type ClassCounts = [usize; NUM_CLASSES];

impl DecisionTree {
    /// Grow a tree on `samples` (row indices, repeats allowed).
    ///
    /// `labels` must hold class labels in 1..=K.
    pub(crate) fn fit<R: Rng>(
        features: &Array2<f64>,
        labels: &[u8],
        samples: Vec<usize>,
        limits: &TreeLimits,
        rng: &mut R,
    ) -> Self {
        let num_features = features.ncols();
        let mut tree = DecisionTree {
            nodes: vec![Node::Leaf { class: 0 }],
            impurity_decrease: vec![0.0; num_features],
        };
        let mut columns: Vec<usize> = (0..num_features).collect();
        let mut work = vec![(0usize, samples, 0usize)];

        while let Some((node, samples, depth)) = work.pop() {
            let counts = class_counts(labels, &samples);
            let class = majority(&counts);
            let impurity = gini(&counts, samples.len());

            let can_split = impurity > 0.0
                && samples.len() >= limits.min_samples_split
                && samples.len() >= 2 * limits.min_samples_leaf
                && limits.max_depth.map_or(true, |d| depth < d);
            if !can_split {
                tree.nodes[node] = Node::Leaf { class };
                continue;
            }

            columns.shuffle(rng);
            let best = find_split(features, labels, &samples, &counts, &columns, limits);
            let Some(split) = best else {
                tree.nodes[node] = Node::Leaf { class };
                continue;
            };

            let n = samples.len() as f64;
            tree.impurity_decrease[split.feature] +=
                (n * impurity - split.left_weighted - split.right_weighted).max(0.0);

            let (left_samples, right_samples): (Vec<usize>, Vec<usize>) = samples
                .into_iter()
                .partition(|&i| features[(i, split.feature)] <= split.threshold);

            let left = tree.nodes.len();
            tree.nodes.push(Node::Leaf { class });
            let right = tree.nodes.len();
            tree.nodes.push(Node::Leaf { class });
            tree.nodes[node] = Node::Split {
                feature: split.feature,
                threshold: split.threshold,
                left,
                right,
            };
            work.push((right, right_samples, depth + 1));
            work.push((left, left_samples, depth + 1));
        }

        tree
    }

    /// Class label for one feature row
    pub fn predict_row(&self, row: ArrayView1<'_, f64>) -> u8 {
        let mut index = 0;
        loop {
            match self.nodes[index] {
                Node::Leaf { class } => return class,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    index = if row[feature] <= threshold { left } else { right };
                }
            }
        }
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Length of the longest root-to-leaf path
    pub fn depth(&self) -> usize {
        let mut max_depth = 0;
        let mut stack = vec![(0usize, 0usize)];
        while let Some((index, depth)) = stack.pop() {
            max_depth = max_depth.max(depth);
            if let Node::Split { left, right, .. } = self.nodes[index] {
                stack.push((left, depth + 1));
                stack.push((right, depth + 1));
            }
        }
        max_depth
    }

    /// Impurity decrease per feature, normalized to sum 1 (all zero for a stump)
    pub fn feature_importance(&self) -> Vec<f64> {
        let total: f64 = self.impurity_decrease.iter().sum();
        if total > 0.0 {
            self.impurity_decrease.iter().map(|v| v / total).collect()
        } else {
            vec![0.0; self.impurity_decrease.len()]
        }
    }
}

struct Split {
    feature: usize,
    threshold: f64,
    /// n_left * gini_left
    left_weighted: f64,
    /// n_right * gini_right
    right_weighted: f64,
}

/// Best Gini split over `columns`.
///
/// The first `max_features` columns are searched; if none of them can
/// separate the samples the search continues through the rest.
fn find_split(
    features: &Array2<f64>,
    labels: &[u8],
    samples: &[usize],
    counts: &ClassCounts,
    columns: &[usize],
    limits: &TreeLimits,
) -> Option<Split> {
    let n = samples.len();
    let min_leaf = limits.min_samples_leaf.max(1);
    let mut best: Option<Split> = None;
    let mut best_score = f64::INFINITY;
    let mut values: Vec<(f64, u8)> = Vec::with_capacity(n);

    for (tried, &feature) in columns.iter().enumerate() {
        if tried >= limits.max_features && best.is_some() {
            break;
        }

        values.clear();
        values.extend(samples.iter().map(|&i| (features[(i, feature)], labels[i])));
        values.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut left: ClassCounts = [0; NUM_CLASSES];
        for i in 0..n - 1 {
            left[(values[i].1 - 1) as usize] += 1;
            let n_left = i + 1;
            let n_right = n - n_left;
            if n_left < min_leaf || n_right < min_leaf || values[i].0 >= values[i + 1].0 {
                continue;
            }

            let mut right = *counts;
            for k in 0..NUM_CLASSES {
                right[k] -= left[k];
            }
            let left_weighted = n_left as f64 * gini(&left, n_left);
            let right_weighted = n_right as f64 * gini(&right, n_right);
            let score = left_weighted + right_weighted;
            if score < best_score {
                best_score = score;
                best = Some(Split {
                    feature,
                    threshold: midpoint(values[i].0, values[i + 1].0),
                    left_weighted,
                    right_weighted,
                });
            }
        }
    }
    best
}

/// Midpoint that still separates `lo` from `hi`
fn midpoint(lo: f64, hi: f64) -> f64 {
    let mid = lo + (hi - lo) / 2.0;
    if mid >= hi {
        lo
    } else {
        mid
    }
}

fn class_counts(labels: &[u8], samples: &[usize]) -> ClassCounts {
    let mut counts = [0; NUM_CLASSES];
    for &i in samples {
        counts[(labels[i] - 1) as usize] += 1;
    }
    counts
}

/// Most frequent class; ties go to the lowest label
fn majority(counts: &ClassCounts) -> u8 {
    let mut best = 0;
    for k in 1..NUM_CLASSES {
        if counts[k] > counts[best] {
            best = k;
        }
    }
    best as u8 + 1
}

fn gini(counts: &ClassCounts, n: usize) -> f64 {
    if n == 0 {
        return 0.0;
    }
    let n = n as f64;
    1.0 - counts
        .iter()
        .map(|&c| {
            let p = c as f64 / n;
            p * p
        })
        .sum::<f64>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;

    fn limits(max_features: usize) -> TreeLimits {
        TreeLimits {
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features,
        }
    }

    #[test]
    fn test_gini() {
        assert_eq!(gini(&[4, 0, 0, 0], 4), 0.0);
        assert!((gini(&[2, 2, 0, 0], 4) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_majority_tie_goes_to_lowest() {
        assert_eq!(majority(&[0, 3, 3, 1]), 2);
        assert_eq!(majority(&[0, 0, 0, 0]), 1);
    }

    #[test]
    fn test_midpoint() {
        assert_eq!(midpoint(0.0, 1.0), 0.5);
        let lo: f64 = 1.0;
        let hi = f64::from_bits(lo.to_bits() + 1);
        assert_eq!(midpoint(lo, hi), lo);
    }

    #[test]
    fn test_separable_data_fits_exactly() {
        // feature 0 is noise, feature 1 separates the classes
        let features = Array2::from_shape_vec(
            (6, 2),
            vec![0.3, 0.1, 0.9, 0.2, 0.1, 0.15, 0.5, 0.8, 0.2, 0.9, 0.7, 0.85],
        )
        .unwrap();
        let labels = vec![1, 1, 1, 3, 3, 3];
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(1);
        let tree = DecisionTree::fit(&features, &labels, (0..6).collect(), &limits(2), &mut rng);

        for (i, &label) in labels.iter().enumerate() {
            assert_eq!(tree.predict_row(features.row(i)), label);
        }
        assert_eq!(tree.depth(), 1);
        assert_eq!(tree.feature_importance(), vec![0.0, 1.0]);
    }

    #[test]
    fn test_constant_features_give_majority_leaf() {
        let features = Array2::from_elem((5, 3), 1.0);
        let labels = vec![2, 2, 4, 4, 4];
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(0);
        let tree = DecisionTree::fit(&features, &labels, (0..5).collect(), &limits(1), &mut rng);
        assert_eq!(tree.num_nodes(), 1);
        assert_eq!(tree.predict_row(features.row(0)), 4);
        assert_eq!(tree.feature_importance(), vec![0.0; 3]);
    }

    #[test]
    fn test_max_depth_limits_growth() {
        let features =
            Array2::from_shape_vec((4, 1), vec![0.0, 1.0, 2.0, 3.0]).unwrap();
        let labels = vec![1, 2, 1, 2];
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(0);
        let shallow = TreeLimits {
            max_depth: Some(1),
            ..limits(1)
        };
        let tree = DecisionTree::fit(&features, &labels, (0..4).collect(), &shallow, &mut rng);
        assert!(tree.depth() <= 1);
    }
}
