use serde::{Deserialize, Serialize};

use super::point::{cross, Point};
use crate::error::{EnvelopeError, Result};

// ---------------------------------------------------------------------------
// Recomputation strategy
// ---------------------------------------------------------------------------

/// How hull vertices are recomputed after a batch of points is appended.
///
/// Both strategies produce the same vertex set. `Incremental` only looks at
/// the previous vertices plus the new batch, since a point that is interior
/// to the current hull stays interior once more points arrive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HullStrategy {
    #[default]
    Incremental,
    FullRebuild,
}

// ---------------------------------------------------------------------------
// ConvexHullEngine
// ---------------------------------------------------------------------------

/// 2D convex hull over an append-only point buffer.
///
/// Points are never removed. `vertices()` returns buffer indices of the hull
/// boundary in counter-clockwise order, starting at the lowest (x, y) vertex.
#[derive(Debug, Clone)]
pub struct ConvexHullEngine {
    points: Vec<Point>,
    vertices: Vec<usize>,
    strategy: HullStrategy,
    closed: bool,
}

impl ConvexHullEngine {
    /// Build a hull from an initial, non-empty point set.
    pub fn new(points: &[Point]) -> Result<Self> {
        if points.is_empty() {
            return Err(EnvelopeError::EmptyInput(
                "a hull needs at least one point".into(),
            ));
        }
        let mut engine = Self::with_strategy(HullStrategy::default());
        engine.add_points(points)?;
        Ok(engine)
    }

    /// An empty, open engine.
    pub fn with_strategy(strategy: HullStrategy) -> Self {
        Self {
            points: Vec::new(),
            vertices: Vec::new(),
            strategy,
            closed: false,
        }
    }

    /// Append points and recompute the hull.
    ///
    /// Non-finite points are buffered so indices stay aligned with the
    /// caller's bookkeeping, but they never become vertices.
    pub fn add_points(&mut self, points: &[Point]) -> Result<()> {
        if self.closed {
            return Err(EnvelopeError::ClosedEngine);
        }
        if points.is_empty() {
            return Ok(());
        }

        let skipped = points.iter().filter(|p| !p.is_finite()).count();
        if skipped > 0 {
            log::warn!("{skipped} non-finite point(s) buffered but excluded from the hull");
        }

        let start = self.points.len();
        self.points.extend_from_slice(points);
        self.vertices = match self.strategy {
            HullStrategy::Incremental => {
                let candidates: Vec<usize> = self
                    .vertices
                    .iter()
                    .copied()
                    .chain(start..self.points.len())
                    .collect();
                monotone_chain(&self.points, candidates)
            }
            HullStrategy::FullRebuild => monotone_chain(&self.points, (0..self.points.len()).collect()),
        };

        log::debug!(
            "hull recomputed: {} point(s) buffered, {} vertices",
            self.points.len(),
            self.vertices.len()
        );
        Ok(())
    }

    /// Finalize the engine. Later `add_points` calls fail.
    pub fn close(&mut self) {
        self.closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn strategy(&self) -> HullStrategy {
        self.strategy
    }

    pub fn vertices(&self) -> &[usize] {
        &self.vertices
    }

    /// Vertices with the first one repeated at the end, for drawing a
    /// closed polygon.
    pub fn closed_vertices(&self) -> Vec<usize> {
        let mut closed = self.vertices.clone();
        if let Some(&first) = self.vertices.first() {
            closed.push(first);
        }
        closed
    }

    pub fn is_vertex(&self, index: usize) -> bool {
        self.vertices.contains(&index)
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn point(&self, index: usize) -> Option<Point> {
        self.points.get(index).copied()
    }

    /// Number of buffered points.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Andrew's monotone chain over a subset of buffer indices.
///
/// Exact duplicates collapse onto their lowest buffer index. Collinear
/// boundary points are dropped, so a collinear input yields its two ends.
fn monotone_chain(points: &[Point], mut candidates: Vec<usize>) -> Vec<usize> {
    candidates.retain(|&i| points[i].is_finite());
    candidates.sort_by(|&a, &b| points[a].lexicographic(&points[b]).then(a.cmp(&b)));
    candidates.dedup_by(|later, kept| points[*later] == points[*kept]);

    if candidates.len() < 3 {
        return candidates;
    }

    let mut hull: Vec<usize> = Vec::with_capacity(candidates.len() + 1);

    // Lower chain
    for &i in &candidates {
        while hull.len() >= 2
            && cross(points[hull[hull.len() - 2]], points[hull[hull.len() - 1]], points[i]) <= 0.0
        {
            hull.pop();
        }
        hull.push(i);
    }

    // Upper chain
    let lower_len = hull.len() + 1;
    for &i in candidates.iter().rev().skip(1) {
        while hull.len() >= lower_len
            && cross(points[hull[hull.len() - 2]], points[hull[hull.len() - 1]], points[i]) <= 0.0
        {
            hull.pop();
        }
        hull.push(i);
    }

    // The last point pushed is the starting vertex again.
    hull.pop();
    hull
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pts(coords: &[(f64, f64)]) -> Vec<Point> {
        coords.iter().copied().map(Point::from).collect()
    }

    #[test]
    fn empty_input_is_rejected() {
        assert!(matches!(
            ConvexHullEngine::new(&[]),
            Err(EnvelopeError::EmptyInput(_))
        ));
    }

    #[test]
    fn square_with_interior_point() {
        let engine = ConvexHullEngine::new(&pts(&[
            (0.0, 0.0),
            (0.5, 0.5),
            (1.0, 1.0),
            (1.0, 0.0),
            (0.0, 1.0),
        ]))
        .unwrap();
        // Counter-clockwise from the lowest (x, y) vertex.
        assert_eq!(engine.vertices(), &[0, 3, 2, 4]);
        assert_eq!(engine.closed_vertices(), vec![0, 3, 2, 4, 0]);
        assert!(!engine.is_vertex(1));
    }

    #[test]
    fn single_and_pair_are_degenerate_hulls() {
        let one = ConvexHullEngine::new(&pts(&[(3.0, 4.0)])).unwrap();
        assert_eq!(one.vertices(), &[0]);
        assert_eq!(one.closed_vertices(), vec![0, 0]);

        let two = ConvexHullEngine::new(&pts(&[(1.0, 1.0), (0.0, 0.0)])).unwrap();
        assert_eq!(two.vertices(), &[1, 0]);
    }

    #[test]
    fn collinear_points_keep_their_ends() {
        let engine =
            ConvexHullEngine::new(&pts(&[(1.0, 1.0), (0.0, 0.0), (2.0, 2.0)])).unwrap();
        assert_eq!(engine.vertices(), &[1, 2]);
    }

    #[test]
    fn duplicates_collapse_to_lowest_index() {
        let engine = ConvexHullEngine::new(&pts(&[
            (0.0, 0.0),
            (1.0, 0.0),
            (0.0, 1.0),
            (1.0, 0.0),
        ]))
        .unwrap();
        assert_eq!(engine.len(), 4);
        assert_eq!(engine.vertices(), &[0, 1, 2]);

        let all_same = ConvexHullEngine::new(&pts(&[(2.0, 2.0); 5])).unwrap();
        assert_eq!(all_same.vertices(), &[0]);
    }

    #[test]
    fn later_duplicate_of_a_vertex_is_not_promoted() {
        let mut engine =
            ConvexHullEngine::new(&pts(&[(0.0, 0.0), (1.0, 0.0), (0.0, 1.0)])).unwrap();
        engine.add_points(&pts(&[(1.0, 0.0)])).unwrap();
        assert_eq!(engine.vertices(), &[0, 1, 2]);
    }

    #[test]
    fn non_finite_points_are_buffered_but_ignored() {
        let engine = ConvexHullEngine::new(&pts(&[
            (0.0, 0.0),
            (f64::NAN, 5.0),
            (1.0, 0.0),
            (f64::INFINITY, f64::INFINITY),
            (0.0, 1.0),
        ]))
        .unwrap();
        assert_eq!(engine.len(), 5);
        assert_eq!(engine.vertices(), &[0, 2, 4]);
    }

    #[test]
    fn closed_engine_rejects_points() {
        let mut engine = ConvexHullEngine::new(&pts(&[(0.0, 0.0)])).unwrap();
        engine.close();
        assert!(matches!(
            engine.add_points(&pts(&[(1.0, 1.0)])),
            Err(EnvelopeError::ClosedEngine)
        ));
        assert_eq!(engine.len(), 1);
    }

    #[test]
    fn strategies_agree() {
        let batches = [
            pts(&[(0.0, 0.0), (4.0, 0.0), (2.0, 1.0)]),
            pts(&[(2.0, 5.0), (1.0, 1.0)]),
            pts(&[(-1.0, 2.0), (4.0, 4.0), (2.0, 2.0)]),
        ];
        let mut incremental = ConvexHullEngine::with_strategy(HullStrategy::Incremental);
        let mut rebuild = ConvexHullEngine::with_strategy(HullStrategy::FullRebuild);
        for batch in &batches {
            incremental.add_points(batch).unwrap();
            rebuild.add_points(batch).unwrap();
            assert_eq!(incremental.vertices(), rebuild.vertices());
        }
        assert_eq!(incremental.vertices(), &[5, 0, 1, 6, 3]);
    }

    #[test]
    fn growing_hull_drops_swallowed_vertices() {
        let mut engine =
            ConvexHullEngine::new(&pts(&[(0.0, 0.0), (1.0, 0.0), (0.0, 1.0)])).unwrap();
        engine
            .add_points(&pts(&[(-1.0, -1.0), (3.0, -1.0), (-1.0, 3.0)]))
            .unwrap();
        assert_eq!(engine.vertices(), &[3, 4, 5]);
    }
}
