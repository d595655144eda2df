//! Land-cover classes, label grids and class-count matrices

use crate::raster::Raster;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of land-cover classes (K)
pub const NUM_CLASSES: usize = 4;

/// Label value meaning "unlabeled / background"
pub const BACKGROUND: u8 = 0;

/// Single-layer grid of class identifiers, 0 = background, 1..=K = class
pub type LabelGrid = Raster<u8>;

/// Land-cover classes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum LandCoverClass {
    Water = 1,
    Vegetation = 2,
    BuiltUp = 3,
    Barren = 4,
}

impl LandCoverClass {
    pub const ALL: [LandCoverClass; NUM_CLASSES] = [
        LandCoverClass::Water,
        LandCoverClass::Vegetation,
        LandCoverClass::BuiltUp,
        LandCoverClass::Barren,
    ];

    /// Class from its label value; `None` for background or unknown ids
    pub fn from_label(label: u8) -> Option<Self> {
        match label {
            1 => Some(LandCoverClass::Water),
            2 => Some(LandCoverClass::Vegetation),
            3 => Some(LandCoverClass::BuiltUp),
            4 => Some(LandCoverClass::Barren),
            _ => None,
        }
    }

    /// Label value stored in a [`LabelGrid`]
    pub fn label(self) -> u8 {
        self as u8
    }

    /// Zero-based row/column index in a [`ClassMatrix`]
    pub fn index(self) -> usize {
        self as usize - 1
    }

    pub fn name(self) -> &'static str {
        match self {
            LandCoverClass::Water => "Water",
            LandCoverClass::Vegetation => "Vegetation",
            LandCoverClass::BuiltUp => "Built-up",
            LandCoverClass::Barren => "Barren",
        }
    }
}

impl fmt::Display for LandCoverClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Whether `label` is one of the K class identifiers
#[inline]
pub fn is_class_label(label: u8) -> bool {
    (1..=NUM_CLASSES as u8).contains(&label)
}

/// K×K matrix of pixel counts between two class assignments.
///
/// Rows index the first assignment (time T1, or ground truth), columns the
/// second (time T2, or prediction).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassMatrix {
    counts: Array2<u64>,
}

/// Class transitions between two dates: row = class at T1, column = class at T2
pub type ChangeMatrix = ClassMatrix;

/// Classification agreement: row = ground truth, column = prediction
pub type ConfusionMatrix = ClassMatrix;

impl ClassMatrix {
    /// All-zero K×K matrix
    pub fn zeros() -> Self {
        Self {
            counts: Array2::zeros((NUM_CLASSES, NUM_CLASSES)),
        }
    }

    /// Build from a row-major K×K count table
    pub fn from_counts(counts: [[u64; NUM_CLASSES]; NUM_CLASSES]) -> Self {
        let mut m = Self::zeros();
        for (i, row) in counts.iter().enumerate() {
            for (j, &c) in row.iter().enumerate() {
                m.counts[(i, j)] = c;
            }
        }
        m
    }

    /// Count one pixel; labels outside 1..=K are ignored and return `false`
    pub fn record(&mut self, from: u8, to: u8) -> bool {
        if !is_class_label(from) || !is_class_label(to) {
            return false;
        }
        self.counts[(from as usize - 1, to as usize - 1)] += 1;
        true
    }

    /// Add the counts of another matrix
    pub fn merge(&mut self, other: &ClassMatrix) {
        self.counts += &other.counts;
    }

    /// Count for a pair of classes
    pub fn count(&self, from: LandCoverClass, to: LandCoverClass) -> u64 {
        self.counts[(from.index(), to.index())]
    }

    /// Underlying counts
    pub fn counts(&self) -> &Array2<u64> {
        &self.counts
    }

    /// Sum of all cells
    pub fn total(&self) -> u64 {
        self.counts.sum()
    }

    /// Sum of the diagonal (unchanged / correctly classified pixels)
    pub fn trace(&self) -> u64 {
        self.counts.diag().sum()
    }

    /// Per-row totals
    pub fn row_sums(&self) -> [u64; NUM_CLASSES] {
        let mut sums = [0; NUM_CLASSES];
        for (i, row) in self.counts.rows().into_iter().enumerate() {
            sums[i] = row.sum();
        }
        sums
    }

    /// Per-column totals
    pub fn col_sums(&self) -> [u64; NUM_CLASSES] {
        let mut sums = [0; NUM_CLASSES];
        for (j, col) in self.counts.columns().into_iter().enumerate() {
            sums[j] = col.sum();
        }
        sums
    }

    /// Non-zero off-diagonal entries as (from, to, count)
    pub fn transitions(&self) -> Vec<(LandCoverClass, LandCoverClass, u64)> {
        let mut out = Vec::new();
        for from in LandCoverClass::ALL {
            for to in LandCoverClass::ALL {
                let c = self.count(from, to);
                if from != to && c > 0 {
                    out.push((from, to, c));
                }
            }
        }
        out
    }
}

impl Default for ClassMatrix {
    fn default() -> Self {
        Self::zeros()
    }
}

/// Pixel share of one class in a label grid
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassShare {
    pub class: LandCoverClass,
    pub pixels: u64,
    /// Percentage of all classified (non-background) pixels
    pub percent: f64,
}

/// Per-class pixel counts of a label grid, background excluded.
pub fn class_distribution(grid: &LabelGrid) -> Vec<ClassShare> {
    let mut counts = [0u64; NUM_CLASSES];
    for &v in grid.data().iter() {
        if is_class_label(v) {
            counts[v as usize - 1] += 1;
        }
    }
    let total: u64 = counts.iter().sum();

    LandCoverClass::ALL
        .iter()
        .map(|&class| {
            let pixels = counts[class.index()];
            let percent = if total > 0 {
                pixels as f64 / total as f64 * 100.0
            } else {
                0.0
            };
            ClassShare {
                class,
                pixels,
                percent,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_round_trip() {
        for class in LandCoverClass::ALL {
            assert_eq!(LandCoverClass::from_label(class.label()), Some(class));
        }
        assert_eq!(LandCoverClass::from_label(BACKGROUND), None);
        assert_eq!(LandCoverClass::from_label(5), None);
    }

    #[test]
    fn test_matrix_record_and_sums() {
        let mut m = ClassMatrix::zeros();
        assert!(m.record(1, 1));
        assert!(m.record(1, 3));
        assert!(m.record(2, 2));
        assert!(!m.record(0, 2));
        assert!(!m.record(2, 9));

        assert_eq!(m.total(), 3);
        assert_eq!(m.trace(), 2);
        assert_eq!(m.row_sums(), [2, 1, 0, 0]);
        assert_eq!(m.col_sums(), [1, 1, 1, 0]);
        assert_eq!(
            m.transitions(),
            vec![(LandCoverClass::Water, LandCoverClass::BuiltUp, 1)]
        );
    }

    #[test]
    fn test_class_distribution_skips_background() {
        let grid = LabelGrid::from_vec(vec![0, 1, 1, 2, 0, 4], 2, 3).unwrap();
        let dist = class_distribution(&grid);
        assert_eq!(dist[0].pixels, 2);
        assert_eq!(dist[1].pixels, 1);
        assert_eq!(dist[2].pixels, 0);
        assert_eq!(dist[3].pixels, 1);
        assert!((dist[0].percent - 50.0).abs() < 1e-12);
    }
}
