//! Accuracy assessment of a predicted label grid against ground truth
//!
//! Background (0) truth pixels are skipped. Every remaining pixel lands in
//! one cell of a K×(K+1) table: rows are ground truth, columns are the
//! predicted class or, for predictions outside 1..=K (such as the 0 given
//! to pixels with non-finite features), an "unclassified" column.

use landshift_core::landcover::{
    is_class_label, ConfusionMatrix, LabelGrid, LandCoverClass, BACKGROUND, NUM_CLASSES,
};
use landshift_core::{Error, Result};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Precision, recall and F1 of one class
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub class: LandCoverClass,
    /// TP / (TP + FP), 0 when the class was never predicted
    pub precision: f64,
    /// TP / (TP + FN), 0 when the class is absent from ground truth
    pub recall: f64,
    pub f1: f64,
    /// Ground-truth pixels of this class
    pub support: u64,
}

/// Averaged precision/recall/F1 over the classes present in ground truth
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AverageMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidationReport {
    /// Truth class × predicted class counts
    pub confusion: ConfusionMatrix,
    /// Per truth class, pixels whose prediction is not a class label
    pub unclassified: [u64; NUM_CLASSES],
    /// One entry per class, in class order
    pub per_class: Vec<ClassMetrics>,
    /// Correct pixels over all evaluated pixels
    pub overall_accuracy: f64,
    /// Unweighted mean over classes with support
    pub macro_avg: AverageMetrics,
    /// Support-weighted mean
    pub weighted_avg: AverageMetrics,
    /// Truth pixels carrying a class label
    pub evaluated: u64,
    /// Evaluated pixels whose prediction is not a class label
    pub unmatched: u64,
    /// Truth pixels with a label above K, skipped like background
    pub ignored: u64,
}

impl ValidationReport {
    pub fn metrics(&self, class: LandCoverClass) -> &ClassMetrics {
        &self.per_class[class.index()]
    }

    /// K×(K+1) table: column 0 counts unclassified predictions, column `j`
    /// counts predictions of class label `j`. Its sum is `evaluated`.
    pub fn full_matrix(&self) -> Array2<u64> {
        let mut table = Array2::zeros((NUM_CLASSES, NUM_CLASSES + 1));
        for i in 0..NUM_CLASSES {
            table[(i, 0)] = self.unclassified[i];
            for j in 0..NUM_CLASSES {
                table[(i, j + 1)] = self.confusion.counts()[(i, j)];
            }
        }
        table
    }

    /// Cohen's kappa, with unclassified predictions as their own category
    pub fn kappa(&self) -> f64 {
        let n = self.evaluated as f64;
        if n == 0.0 {
            return 0.0;
        }
        // the unclassified column has no truth marginal, so only the class
        // columns contribute to chance agreement
        let predicted = self.confusion.col_sums();
        let expected = self
            .per_class
            .iter()
            .zip(predicted.iter())
            .map(|(m, &p)| m.support as f64 * p as f64)
            .sum::<f64>()
            / (n * n);
        if (1.0 - expected).abs() < f64::EPSILON {
            return 0.0;
        }
        (self.overall_accuracy - expected) / (1.0 - expected)
    }
}

/// Compare a predicted grid against ground truth of the same shape.
pub fn validate(predicted: &LabelGrid, ground_truth: &LabelGrid) -> Result<ValidationReport> {
    predicted.ensure_same_shape(ground_truth, "predicted", "ground truth")?;
    let predicted: Vec<u8> = predicted.data().iter().copied().collect();
    let truth: Vec<u8> = ground_truth.data().iter().copied().collect();
    validate_labels(&predicted, &truth)
}

/// Compare flat label sequences, e.g. held-out rows of a training split.
pub fn validate_labels(predicted: &[u8], ground_truth: &[u8]) -> Result<ValidationReport> {
    if predicted.len() != ground_truth.len() {
        return Err(Error::shape_mismatch(
            "predicted",
            "ground truth",
            (predicted.len(), 1),
            (ground_truth.len(), 1),
        ));
    }

    let mut confusion = ConfusionMatrix::zeros();
    let mut unclassified = [0u64; NUM_CLASSES];
    let mut ignored = 0u64;
    for (&p, &t) in predicted.iter().zip(ground_truth) {
        if t == BACKGROUND {
            continue;
        }
        if !is_class_label(t) {
            ignored += 1;
            continue;
        }
        if !confusion.record(t, p) {
            unclassified[t as usize - 1] += 1;
        }
    }

    if ignored > 0 {
        warn!(pixels = ignored, "skipped ground-truth labels outside the class set");
    }
    let unmatched: u64 = unclassified.iter().sum();
    let evaluated = confusion.total() + unmatched;
    if evaluated == 0 {
        return Err(Error::EmptyLabelSet {
            context: "validation",
        });
    }
    if unmatched > 0 {
        debug!(unmatched, "predictions outside the class range counted as unclassified");
    }

    let truth_totals = confusion.row_sums();
    let predicted_totals = confusion.col_sums();
    let per_class: Vec<ClassMetrics> = LandCoverClass::ALL
        .iter()
        .map(|&class| {
            let k = class.index();
            let tp = confusion.counts()[(k, k)] as f64;
            let support = truth_totals[k] + unclassified[k];
            let precision = ratio(tp, predicted_totals[k] as f64);
            let recall = ratio(tp, support as f64);
            ClassMetrics {
                class,
                precision,
                recall,
                f1: ratio(2.0 * precision * recall, precision + recall),
                support,
            }
        })
        .collect();

    let overall_accuracy = confusion.trace() as f64 / evaluated as f64;
    let (macro_avg, weighted_avg) = averages(&per_class, evaluated);

    info!(
        evaluated,
        overall_accuracy,
        macro_f1 = macro_avg.f1,
        "validation"
    );

    Ok(ValidationReport {
        confusion,
        unclassified,
        per_class,
        overall_accuracy,
        macro_avg,
        weighted_avg,
        evaluated,
        unmatched,
        ignored,
    })
}

fn ratio(num: f64, den: f64) -> f64 {
    if den > 0.0 {
        num / den
    } else {
        0.0
    }
}

fn averages(per_class: &[ClassMetrics], evaluated: u64) -> (AverageMetrics, AverageMetrics) {
    let present: Vec<&ClassMetrics> = per_class.iter().filter(|m| m.support > 0).collect();
    let n = present.len() as f64;

    let mut macro_avg = AverageMetrics::default();
    let mut weighted_avg = AverageMetrics::default();
    for m in &present {
        let w = m.support as f64 / evaluated as f64;
        macro_avg.precision += m.precision / n;
        macro_avg.recall += m.recall / n;
        macro_avg.f1 += m.f1 / n;
        weighted_avg.precision += m.precision * w;
        weighted_avg.recall += m.recall * w;
        weighted_avg.f1 += m.f1 * w;
    }
    (macro_avg, weighted_avg)
}
