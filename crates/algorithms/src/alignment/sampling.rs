//! Point and area samplers over a georeferenced source layer

use landshift_core::raster::GeoTransform;

/// Read-only source layer: shape, transform and a cell reader that returns
/// `None` for no-value cells. The reader is only called with in-bounds indices.
pub struct SourceGrid<F> {
    rows: usize,
    cols: usize,
    transform: GeoTransform,
    read: F,
}

impl<F> SourceGrid<F>
where
    F: Fn(usize, usize) -> Option<f64> + Sync,
{
    pub fn new(rows: usize, cols: usize, transform: GeoTransform, read: F) -> Self {
        Self {
            rows,
            cols,
            transform,
            read,
        }
    }

    /// Fractional source pixel position (corner-based) of a target cell centre
    fn locate(&self, dst: &GeoTransform, row: usize, col: usize) -> (f64, f64) {
        let (x, y) = dst.pixel_to_geo(col, row);
        self.transform.geo_to_pixel(x, y)
    }

    fn contains(&self, col_f: f64, row_f: f64) -> bool {
        col_f >= 0.0 && row_f >= 0.0 && col_f < self.cols as f64 && row_f < self.rows as f64
    }

    pub fn nearest_at(&self, dst: &GeoTransform, row: usize, col: usize) -> Option<f64> {
        let (col_f, row_f) = self.locate(dst, row, col);
        if !self.contains(col_f, row_f) {
            return None;
        }
        (self.read)(row_f.floor() as usize, col_f.floor() as usize)
    }

    /// Bilinear interpolation between the four nearest source centres.
    ///
    /// Neighbours beyond the edge are clamped; no-value neighbours are
    /// dropped and the remaining weights renormalized.
    pub fn bilinear_at(&self, dst: &GeoTransform, row: usize, col: usize) -> Option<f64> {
        let (col_f, row_f) = self.locate(dst, row, col);
        if !self.contains(col_f, row_f) {
            return None;
        }

        let fx = col_f - 0.5;
        let fy = row_f - 0.5;
        let x0 = fx.floor();
        let y0 = fy.floor();
        let tx = fx - x0;
        let ty = fy - y0;

        let clamp_c = |c: f64| c.clamp(0.0, (self.cols - 1) as f64) as usize;
        let clamp_r = |r: f64| r.clamp(0.0, (self.rows - 1) as f64) as usize;
        let (c0, c1) = (clamp_c(x0), clamp_c(x0 + 1.0));
        let (r0, r1) = (clamp_r(y0), clamp_r(y0 + 1.0));

        let taps = [
            (r0, c0, (1.0 - ty) * (1.0 - tx)),
            (r0, c1, (1.0 - ty) * tx),
            (r1, c0, ty * (1.0 - tx)),
            (r1, c1, ty * tx),
        ];

        let mut sum = 0.0;
        let mut weight = 0.0;
        for (r, c, w) in taps {
            if w <= 0.0 {
                continue;
            }
            if let Some(v) = (self.read)(r, c) {
                sum += w * v;
                weight += w;
            }
        }
        (weight > 0.0).then(|| sum / weight)
    }

    /// Mean of valid source cells whose centres lie inside the target cell
    pub fn average_at(&self, dst: &GeoTransform, row: usize, col: usize) -> Option<f64> {
        let (ax, ay) = dst.pixel_to_geo_corner(col, row);
        let (bx, by) = dst.pixel_to_geo_corner(col + 1, row + 1);
        let (ac, ar) = self.transform.geo_to_pixel(ax, ay);
        let (bc, br) = self.transform.geo_to_pixel(bx, by);

        let (c_lo, c_hi) = centre_range(ac.min(bc), ac.max(bc), self.cols)?;
        let (r_lo, r_hi) = centre_range(ar.min(br), ar.max(br), self.rows)?;

        let mut sum = 0.0;
        let mut count = 0usize;
        for r in r_lo..r_hi {
            for c in c_lo..c_hi {
                if let Some(v) = (self.read)(r, c) {
                    sum += v;
                    count += 1;
                }
            }
        }
        (count > 0).then(|| sum / count as f64)
    }
}

/// Index range of cells whose centre `i + 0.5` lies in `[lo, hi)`, clipped to `0..n`
fn centre_range(lo: f64, hi: f64, n: usize) -> Option<(usize, usize)> {
    if !(lo.is_finite() && hi.is_finite()) {
        return None;
    }
    let start = (lo - 0.5).ceil().max(0.0);
    let end = (hi - 0.5).ceil().min(n as f64);
    (start < end).then(|| (start as usize, end as usize))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_centre_range() {
        assert_eq!(centre_range(0.0, 2.0, 4), Some((0, 2)));
        assert_eq!(centre_range(0.6, 1.4, 4), None);
        assert_eq!(centre_range(-3.0, 10.0, 4), Some((0, 4)));
        assert_eq!(centre_range(f64::NAN, 1.0, 4), None);
    }

    #[test]
    fn test_bilinear_skips_no_value_neighbours() {
        let values = [[1.0, f64::NAN], [3.0, 5.0]];
        let grid = SourceGrid::new(2, 2, GeoTransform::new(0.0, 2.0, 1.0, -1.0), |r, c| {
            let v: f64 = values[r][c];
            (!v.is_nan()).then_some(v)
        });
        // centre of the whole 2x2 grid: equal weights on the three valid cells
        let dst = GeoTransform::new(0.5, 1.5, 1.0, -1.0);
        let v = grid.bilinear_at(&dst, 0, 0).unwrap();
        assert!((v - 3.0).abs() < 1e-12);
    }
}
