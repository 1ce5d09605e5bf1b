/// Planar geometry: points and the convex hull engine.
///
/// ```text
///   append-only point buffer
///   ┌───┬───┬───┬───┬───┬───┐
///   │ 0 │ 1 │ 2 │ 3 │ 4 │ … │
///   └───┴───┴───┴───┴───┴───┘
///        │       │       │
///        ▼       ▼       ▼
///   hull vertices: buffer indices, counter-clockwise
/// ```

pub mod hull;
pub mod point;
