//! Uniform bucket grid over projected screen positions.
//!
//! Points are bucketed once per geometry change; queries return every point
//! in the cells overlapping a search radius and may over-include, so callers
//! filter by exact distance.

use crate::catalog::ProjectedPoint;

/// Upper bound on cells in any screen-space bucket grid.
pub const MAX_CELLS: usize = 1 << 24;

/// Columns and rows covering a `width x height` canvas with square cells.
///
/// `None` when a dimension is not finite and positive or the grid would
/// exceed [`MAX_CELLS`].
pub fn cell_dims(width: f64, height: f64, cell_size: f64) -> Option<(usize, usize)> {
    let usable = |v: f64| v.is_finite() && v > 0.0;
    if !(usable(width) && usable(height) && usable(cell_size)) {
        return None;
    }
    let cols = (width / cell_size).ceil();
    let rows = (height / cell_size).ceil();
    if cols * rows > MAX_CELLS as f64 {
        return None;
    }
    Some((cols as usize, rows as usize))
}

/// Result of a nearest-point search: position in the projected slice and
/// squared pixel distance.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub index: usize,
    pub dist_sq: f64,
}

#[derive(Debug, Clone, Default)]
pub struct SpatialGrid {
    cell_size: f64,
    cols: usize,
    rows: usize,
    /// Row-major buckets of positions into the projected slice.
    bins: Vec<Vec<usize>>,
}

impl SpatialGrid {
    /// Bucket `points` into `ceil(width/cell) x ceil(height/cell)` cells.
    ///
    /// Points falling outside the canvas are dropped. Unusable geometry
    /// yields an empty grid.
    pub fn build(points: &[ProjectedPoint], width: f64, height: f64, cell_size: f64) -> Self {
        let Some((cols, rows)) = cell_dims(width, height, cell_size) else {
            log::warn!("spatial grid: unusable geometry {width}x{height} with cell {cell_size}");
            return Self::default();
        };
        let mut grid = Self {
            cell_size,
            cols,
            rows,
            bins: vec![Vec::new(); cols * rows],
        };

        let mut dropped = 0usize;
        for (i, p) in points.iter().enumerate() {
            match grid.cell_of(p.x, p.y) {
                Some(cell) => grid.bins[cell].push(i),
                None => dropped += 1,
            }
        }
        if dropped > 0 {
            log::debug!("spatial grid: dropped {dropped} off-canvas points");
        }
        grid
    }

    fn cell_of(&self, x: f64, y: f64) -> Option<usize> {
        let c = (x / self.cell_size).floor();
        let r = (y / self.cell_size).floor();
        if c >= 0.0 && r >= 0.0 && (c as usize) < self.cols && (r as usize) < self.rows {
            Some(r as usize * self.cols + c as usize)
        } else {
            None
        }
    }

    /// Indices of all points in cells within `ceil(radius/cell)` rings of
    /// the cell containing (x, y).
    pub fn query(&self, x: f64, y: f64, radius: f64) -> Vec<usize> {
        let mut results = Vec::new();
        if self.bins.is_empty() {
            return results;
        }

        let reach = (radius / self.cell_size).ceil().max(0.0) as i64;
        let center_col = (x / self.cell_size).floor() as i64;
        let center_row = (y / self.cell_size).floor() as i64;

        let r0 = center_row.saturating_sub(reach).max(0);
        let r1 = center_row.saturating_add(reach).min(self.rows as i64 - 1);
        let c0 = center_col.saturating_sub(reach).max(0);
        let c1 = center_col.saturating_add(reach).min(self.cols as i64 - 1);

        for r in r0..=r1 {
            let row = r as usize * self.cols;
            for c in c0..=c1 {
                results.extend_from_slice(&self.bins[row + c as usize]);
            }
        }
        results
    }

    /// Closest point strictly within `radius` of (x, y).
    ///
    /// Ties keep the first candidate found.
    pub fn nearest(
        &self,
        points: &[ProjectedPoint],
        x: f64,
        y: f64,
        radius: f64,
    ) -> Option<SearchResult> {
        self.nearest_where(points, x, y, radius, |_| true)
    }

    /// Like [`nearest`](Self::nearest) but only among points passing `keep`.
    pub fn nearest_where(
        &self,
        points: &[ProjectedPoint],
        x: f64,
        y: f64,
        radius: f64,
        keep: impl Fn(&ProjectedPoint) -> bool,
    ) -> Option<SearchResult> {
        let mut best: Option<SearchResult> = None;
        let mut best_dsq = radius * radius;
        for i in self.query(x, y, radius) {
            let p = &points[i];
            let dsq = (p.x - x) * (p.x - x) + (p.y - y) * (p.y - y);
            if dsq < best_dsq && keep(p) {
                best_dsq = dsq;
                best = Some(SearchResult {
                    index: i,
                    dist_sq: dsq,
                });
            }
        }
        best
    }

    /// Number of bucketed points.
    pub fn len(&self) -> usize {
        self.bins.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.bins.iter().all(Vec::is_empty)
    }

    pub fn dims(&self) -> (usize, usize) {
        (self.cols, self.rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pt(index: usize, x: f64, y: f64) -> ProjectedPoint {
        ProjectedPoint {
            index,
            x,
            y,
            lon: 0.0,
            lat: 0.0,
        }
    }

    /// Deterministic scatter over an 800x400 canvas.
    fn scatter(n: usize) -> Vec<ProjectedPoint> {
        let mut state = 0x2545_f491_4f6c_dd1du64;
        let mut next = || {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            (state >> 11) as f64 / (1u64 << 53) as f64
        };
        (0..n).map(|i| pt(i, next() * 800.0, next() * 400.0)).collect()
    }

    #[test]
    fn dimensions_round_up() {
        let grid = SpatialGrid::build(&[], 810.0, 400.0, 20.0);
        assert_eq!(grid.dims(), (41, 20));
        assert!(grid.is_empty());
    }

    #[test]
    fn off_canvas_points_dropped() {
        let points = vec![pt(0, 10.0, 10.0), pt(1, -5.0, 10.0), pt(2, 10.0, 400.0)];
        let grid = SpatialGrid::build(&points, 800.0, 400.0, 20.0);
        assert_eq!(grid.len(), 1);
    }

    #[test]
    fn query_is_superset_of_exact() {
        let points = scatter(3000);
        let grid = SpatialGrid::build(&points, 800.0, 400.0, 20.0);
        for &(qx, qy, r) in &[
            (400.0, 200.0, 15.0),
            (0.0, 0.0, 30.0),
            (799.0, 399.0, 5.0),
            (123.4, 321.0, 47.0),
        ] {
            let candidates = grid.query(qx, qy, r);
            for (i, p) in points.iter().enumerate() {
                let d = ((p.x - qx).powi(2) + (p.y - qy).powi(2)).sqrt();
                if d <= r {
                    assert!(
                        candidates.contains(&i),
                        "point {i} at distance {d} missing from query ({qx}, {qy}, {r})"
                    );
                }
            }
        }
    }

    #[test]
    fn nearest_matches_brute_force() {
        let points = scatter(2000);
        let grid = SpatialGrid::build(&points, 800.0, 400.0, 20.0);
        for &(qx, qy) in &[(400.0, 200.0), (50.0, 380.0), (700.0, 20.0)] {
            let brute = points
                .iter()
                .enumerate()
                .map(|(i, p)| (i, (p.x - qx).powi(2) + (p.y - qy).powi(2)))
                .filter(|&(_, d)| d < 225.0)
                .min_by(|a, b| a.1.total_cmp(&b.1));
            let found = grid.nearest(&points, qx, qy, 15.0);
            assert_eq!(found.map(|r| r.index), brute.map(|b| b.0));
        }
    }

    #[test]
    fn nearest_respects_radius() {
        let points = vec![pt(0, 100.0, 100.0)];
        let grid = SpatialGrid::build(&points, 800.0, 400.0, 20.0);
        assert!(grid.nearest(&points, 100.0, 116.0, 15.0).is_none());
        let hit = grid.nearest(&points, 100.0, 110.0, 15.0).unwrap();
        assert_eq!(hit.index, 0);
        assert_eq!(hit.dist_sq, 100.0);
    }

    #[test]
    fn nearest_where_filters() {
        let points = vec![pt(0, 100.0, 100.0), pt(1, 105.0, 100.0)];
        let grid = SpatialGrid::build(&points, 800.0, 400.0, 20.0);
        let hit = grid
            .nearest_where(&points, 100.0, 100.0, 15.0, |p| p.index != 0)
            .unwrap();
        assert_eq!(hit.index, 1);
    }

    #[test]
    fn unusable_cell_size_gives_empty_grid() {
        let points = vec![pt(0, 10.0, 10.0)];
        for cell in [0.0, -20.0, f64::NAN, f64::INFINITY, 1e-9] {
            let grid = SpatialGrid::build(&points, 800.0, 400.0, cell);
            assert!(grid.is_empty(), "cell {cell}");
            assert!(grid.nearest(&points, 10.0, 10.0, 15.0).is_none());
        }
    }

    #[test]
    fn huge_radius_is_clamped_to_grid() {
        let points = scatter(100);
        let grid = SpatialGrid::build(&points, 800.0, 400.0, 20.0);
        let mut all = grid.query(400.0, 200.0, 1e300);
        all.sort_unstable();
        assert_eq!(all, (0..100).collect::<Vec<_>>());
        assert!(grid.query(-1e12, 1e12, 10.0).is_empty());
    }

    #[test]
    fn empty_grid_queries() {
        let grid = SpatialGrid::default();
        assert!(grid.query(10.0, 10.0, 50.0).is_empty());
        assert!(grid.nearest(&[], 10.0, 10.0, 50.0).is_none());
    }
}
