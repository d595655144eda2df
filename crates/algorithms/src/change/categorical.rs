//! Categorical change: class-transition matrix between two label grids

use crate::maybe_rayon::*;
use landshift_core::landcover::{
    class_distribution, ChangeMatrix, ClassMatrix, ClassShare, LabelGrid, LandCoverClass,
    NUM_CLASSES,
};
use landshift_core::{Error, Result};
use ndarray::Array2;
use tracing::info;

/// Class transitions between two dates
#[derive(Debug, Clone)]
pub struct ClassChange {
    /// Row = class at T1, column = class at T2
    pub matrix: ChangeMatrix,
    /// 1 where both dates are classified and the classes differ, else 0
    pub change_map: LabelGrid,
    /// `(total - trace) / total * 100`; 0 when no pixel is comparable
    pub percent_changed: f64,
    pub pixel_area_km2: f64,
}

impl ClassChange {
    /// Pixels classified at both dates
    pub fn compared_pixels(&self) -> u64 {
        self.matrix.total()
    }

    pub fn changed_pixels(&self) -> u64 {
        self.matrix.total() - self.matrix.trace()
    }

    pub fn changed_area_km2(&self) -> f64 {
        self.changed_pixels() as f64 * self.pixel_area_km2
    }

    /// Non-zero off-diagonal entries as (from, to, pixels)
    pub fn transitions(&self) -> Vec<(LandCoverClass, LandCoverClass, u64)> {
        self.matrix.transitions()
    }

    /// Pixels gained minus pixels lost per class
    pub fn net_change(&self) -> [(LandCoverClass, i64); NUM_CLASSES] {
        let before = self.matrix.row_sums();
        let after = self.matrix.col_sums();
        LandCoverClass::ALL.map(|class| {
            let i = class.index();
            (class, after[i] as i64 - before[i] as i64)
        })
    }
}

/// Build the change matrix and change map of two aligned label grids.
///
/// Background (0) and labels outside 1..=K at either date exclude a pixel
/// from the matrix and leave it 0 in the change map.
pub fn detect_class_change(t1: &LabelGrid, t2: &LabelGrid) -> Result<ClassChange> {
    t1.ensure_same_shape(t2, "t1", "t2")?;
    let (rows, cols) = t1.shape();

    let per_row: Vec<(Vec<u8>, ClassMatrix)> = (0..rows)
        .into_par_iter()
        .map(|row| {
            let mut map_row = vec![0u8; cols];
            let mut matrix = ClassMatrix::zeros();
            for (col, out) in map_row.iter_mut().enumerate() {
                let a = unsafe { t1.get_unchecked(row, col) };
                let b = unsafe { t2.get_unchecked(row, col) };
                if matrix.record(a, b) && a != b {
                    *out = 1;
                }
            }
            (map_row, matrix)
        })
        .collect();

    let mut matrix = ClassMatrix::zeros();
    let mut map_data = Vec::with_capacity(rows * cols);
    for (map_row, row_matrix) in per_row {
        matrix.merge(&row_matrix);
        map_data.extend(map_row);
    }

    let total = matrix.total();
    let percent_changed = if total > 0 {
        (total - matrix.trace()) as f64 / total as f64 * 100.0
    } else {
        0.0
    };

    let change_map = t1.derive(
        Array2::from_shape_vec((rows, cols), map_data).map_err(|e| Error::Other(e.to_string()))?,
        None,
    );

    info!(
        compared = total,
        changed = total - matrix.trace(),
        percent_changed,
        "class change"
    );

    Ok(ClassChange {
        matrix,
        change_map,
        percent_changed,
        pixel_area_km2: t1.pixel_area_km2(),
    })
}

/// Class shares at both dates, background excluded
pub fn class_distributions(t1: &LabelGrid, t2: &LabelGrid) -> (Vec<ClassShare>, Vec<ClassShare>) {
    (class_distribution(t1), class_distribution(t2))
}
