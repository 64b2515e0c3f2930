pub mod bounds;
pub mod point;

/// Geometric precision
const EPS: f64 = 1e-13;
