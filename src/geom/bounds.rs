use crate::geom::EPS;
use crate::geom::point::Point;
use serde::{Deserialize, Serialize};

/// Cartesian axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    pub fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }
}

/// Axis-aligned box given by its min and max corners.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub lo: Point,
    pub hi: Point,
}

impl Bounds {
    pub fn new(lo: Point, hi: Point) -> Self {
        Self { lo, hi }
    }

    /// Box spanning `[0, x] × [0, y] × [0, z]`.
    pub fn from_extent(x: f64, y: f64, z: f64) -> Self {
        Self::new(Point::new(0., 0., 0.), Point::new(x, y, z))
    }

    pub fn extent(&self, axis: Axis) -> f64 {
        self.hi.coord(axis) - self.lo.coord(axis)
    }

    /// Area of the horizontal (x-y) cross-section.
    pub fn cross_section_area(&self) -> f64 {
        self.extent(Axis::X) * self.extent(Axis::Y)
    }

    pub fn volume(&self) -> f64 {
        self.cross_section_area() * self.extent(Axis::Z)
    }

    /// Checks whether a point lies inside the box (boundary included).
    pub fn contains(&self, p: Point) -> bool {
        Axis::ALL.iter().all(|&a| {
            p.coord(a) >= self.lo.coord(a) - EPS && p.coord(a) <= self.hi.coord(a) + EPS
        })
    }

    /// Checks whether `other` lies entirely inside this box.
    pub fn encloses(&self, other: &Bounds) -> bool {
        self.contains(other.lo) && self.contains(other.hi)
    }
}

/// Global simulation box as reported by the particle domain.
///
/// Skewed (triclinic) domains report their orthogonal bounding box separately;
/// the grid is laid over that bounding box instead of the skewed box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DomainGeometry {
    pub bounds: Bounds,
    #[serde(default)]
    pub bound_box: Option<Bounds>,
    #[serde(default)]
    pub triclinic: bool,
    /// Sub-domain owned by the calling worker.
    pub sub_domain: Bounds,
}

impl DomainGeometry {
    /// Orthogonal single-worker domain.
    pub fn orthogonal(bounds: Bounds) -> Self {
        Self {
            bounds,
            bound_box: None,
            triclinic: false,
            sub_domain: bounds,
        }
    }

    /// Bounds the grid is laid over.
    pub fn grid_bounds(&self) -> Bounds {
        match (self.triclinic, self.bound_box) {
            (true, Some(bb)) => bb,
            _ => self.bounds,
        }
    }
}
