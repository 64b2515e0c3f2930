use std::ops::Range;

use anyhow::Result;

use crate::geom::bounds::{Axis, Bounds};
use crate::sim::kinetics::error::ConfigError;
use crate::Point;

/// Maximum allowed difference between per-axis step sizes.
pub const CUBIC_TOLERANCE: f64 = 1e-10;

/// Direction towards one of the six face-adjacent neighbors of a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    XMinus,
    XPlus,
    YMinus,
    YPlus,
    ZMinus,
    ZPlus,
}

impl Direction {
    pub const ALL: [Direction; 6] = [
        Direction::XMinus,
        Direction::XPlus,
        Direction::YMinus,
        Direction::YPlus,
        Direction::ZMinus,
        Direction::ZPlus,
    ];

    pub fn axis(self) -> Axis {
        match self {
            Direction::XMinus | Direction::XPlus => Axis::X,
            Direction::YMinus | Direction::YPlus => Axis::Y,
            Direction::ZMinus | Direction::ZPlus => Axis::Z,
        }
    }

    pub fn is_plus(self) -> bool {
        matches!(self, Direction::XPlus | Direction::YPlus | Direction::ZPlus)
    }
}

/// One of the six faces of the global domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Face {
    ZLow,
    ZHigh,
    YLow,
    YHigh,
    XLow,
    XHigh,
}

impl Face {
    /// Order in which a ghost cell is matched against the faces.
    pub const PRIORITY: [Face; 6] = [
        Face::ZLow,
        Face::ZHigh,
        Face::YLow,
        Face::YHigh,
        Face::XLow,
        Face::XHigh,
    ];

    pub fn axis(self) -> Axis {
        match self {
            Face::XLow | Face::XHigh => Axis::X,
            Face::YLow | Face::YHigh => Axis::Y,
            Face::ZLow | Face::ZHigh => Axis::Z,
        }
    }

    pub fn is_low(self) -> bool {
        matches!(self, Face::XLow | Face::YLow | Face::ZLow)
    }

    /// Direction pointing from a ghost cell beyond this face into the domain.
    pub fn inward(self) -> Direction {
        match self {
            Face::XLow => Direction::XPlus,
            Face::XHigh => Direction::XMinus,
            Face::YLow => Direction::YPlus,
            Face::YHigh => Direction::YMinus,
            Face::ZLow => Direction::ZPlus,
            Face::ZHigh => Direction::ZMinus,
        }
    }
}

/// Static partition of the global box across workers.
#[derive(Debug, Clone)]
pub struct Decomposition {
    pub domain: Bounds,
    /// Global cell count per axis.
    pub cells: [usize; 3],
    /// Sub-domain owned by each worker, indexed by rank.
    pub sub_domains: Vec<Bounds>,
}

impl Decomposition {
    /// A single worker owning the whole box.
    pub fn single(domain: Bounds, cells: [usize; 3]) -> Self {
        Self {
            domain,
            cells,
            sub_domains: vec![domain],
        }
    }

    /// Splits each axis into `parts[axis]` contiguous slabs of whole cells.
    ///
    /// Remainder cells go to the lower slabs. Ranks are numbered with x varying
    /// fastest.
    pub fn split(domain: Bounds, cells: [usize; 3], parts: [usize; 3]) -> Result<Self> {
        let step = cubic_step(&domain, cells)?;
        let mut cuts: Vec<Vec<Range<usize>>> = Vec::with_capacity(3);
        for axis in Axis::ALL {
            let (n, p) = (cells[axis.index()], parts[axis.index()]);
            if p == 0 || p > n {
                return Err(ConfigError::invalid(
                    "parts",
                    format!("cannot split {n} cells along {axis:?} into {p} parts"),
                )
                .into());
            }
            let base = n / p;
            let rem = n % p;
            let mut ranges = Vec::with_capacity(p);
            let mut cursor = 0;
            for i in 0..p {
                let len = base + usize::from(i < rem);
                ranges.push(cursor..cursor + len);
                cursor += len;
            }
            cuts.push(ranges);
        }

        let mut sub_domains = Vec::with_capacity(parts.iter().product());
        for rz in &cuts[2] {
            for ry in &cuts[1] {
                for rx in &cuts[0] {
                    let lo = Point::new(
                        domain.lo.x + rx.start as f64 * step,
                        domain.lo.y + ry.start as f64 * step,
                        domain.lo.z + rz.start as f64 * step,
                    );
                    let hi = Point::new(
                        domain.lo.x + rx.end as f64 * step,
                        domain.lo.y + ry.end as f64 * step,
                        domain.lo.z + rz.end as f64 * step,
                    );
                    sub_domains.push(Bounds::new(lo, hi));
                }
            }
        }

        Ok(Self {
            domain,
            cells,
            sub_domains,
        })
    }

    pub fn workers(&self) -> usize {
        self.sub_domains.len()
    }

    /// Converts every sub-domain into per-axis global cell ranges.
    fn owned_ranges(&self, step: f64) -> Result<Vec<[Range<usize>; 3]>> {
        let mut out = Vec::with_capacity(self.sub_domains.len());
        for (rank, sub) in self.sub_domains.iter().enumerate() {
            if !self.domain.encloses(sub) {
                return Err(ConfigError::invalid(
                    "sub_domain",
                    format!("sub-domain of worker {rank} lies outside the domain"),
                )
                .into());
            }
            let mut ranges: [Range<usize>; 3] = [0..0, 0..0, 0..0];
            for axis in Axis::ALL {
                let a = axis.index();
                let origin = self.domain.lo.coord(axis);
                let lo = ((sub.lo.coord(axis) - origin) / step).round() as usize;
                let hi = ((sub.hi.coord(axis) - origin) / step).round() as usize;
                if hi <= lo || hi > self.cells[a] {
                    return Err(ConfigError::invalid(
                        "sub_domain",
                        format!("sub-domain of worker {rank} holds no cells along {axis:?}"),
                    )
                    .into());
                }
                ranges[a] = lo..hi;
            }
            out.push(ranges);
        }
        Ok(out)
    }
}

/// Uniform cell size of a box split into `cells`, which must be equal on all axes.
pub fn cubic_step(domain: &Bounds, cells: [usize; 3]) -> Result<f64> {
    if cells.contains(&0) {
        return Err(ConfigError::invalid("cells", "cell count must be positive on every axis").into());
    }
    let dx = domain.extent(Axis::X) / cells[0] as f64;
    let dy = domain.extent(Axis::Y) / cells[1] as f64;
    let dz = domain.extent(Axis::Z) / cells[2] as f64;
    if (dx - dy).abs() > CUBIC_TOLERANCE
        || (dx - dz).abs() > CUBIC_TOLERANCE
        || (dy - dz).abs() > CUBIC_TOLERANCE
    {
        return Err(ConfigError::NonCubicGrid {
            dx,
            dy,
            dz,
            tolerance: CUBIC_TOLERANCE,
        }
        .into());
    }
    if dx <= 0.0 {
        return Err(ConfigError::invalid("domain", "domain extent must be positive").into());
    }
    Ok(dx)
}

/// Per-worker padded mesh: the owned cells plus one ghost layer on every face.
///
/// Cells are addressed by a flat index with x varying fastest. Ghost cells are
/// cells outside the worker's owned sub-volume or above the active top layer.
#[derive(Debug, Clone)]
pub struct GridPartition {
    rank: usize,
    domain: Bounds,
    cells: [usize; 3],
    step: f64,
    owned: Vec<[Range<usize>; 3]>,
    dims: [usize; 3],
    active_layers: usize,
    pending_layers: Option<usize>,
    tracked: usize,
    centers: Vec<Point>,
    ghost: Vec<bool>,
}

impl GridPartition {
    /// Builds the padded mesh of worker `rank`.
    ///
    /// Fails with [`ConfigError::NonCubicGrid`] before allocating anything if
    /// the step sizes differ between axes.
    pub fn new(decomposition: &Decomposition, rank: usize) -> Result<Self> {
        let step = cubic_step(&decomposition.domain, decomposition.cells)?;
        anyhow::ensure!(
            rank < decomposition.workers(),
            "rank {rank} out of range ({} workers)",
            decomposition.workers()
        );
        let owned = decomposition.owned_ranges(step)?;
        let own = &owned[rank];
        let dims = [own[0].len() + 2, own[1].len() + 2, own[2].len() + 2];
        let n = dims[0] * dims[1] * dims[2];

        let domain = decomposition.domain;
        let mut centers = Vec::with_capacity(n);
        for iz in 0..dims[2] {
            for iy in 0..dims[1] {
                for ix in 0..dims[0] {
                    let g = [
                        own[0].start as f64 + ix as f64 - 1.0,
                        own[1].start as f64 + iy as f64 - 1.0,
                        own[2].start as f64 + iz as f64 - 1.0,
                    ];
                    centers.push(Point::new(
                        domain.lo.x + (g[0] + 0.5) * step,
                        domain.lo.y + (g[1] + 0.5) * step,
                        domain.lo.z + (g[2] + 0.5) * step,
                    ));
                }
            }
        }

        let mut grid = Self {
            rank,
            domain,
            cells: decomposition.cells,
            step,
            owned,
            dims,
            active_layers: decomposition.cells[2],
            pending_layers: None,
            tracked: n,
            centers,
            ghost: vec![true; n],
        };
        grid.classify();
        Ok(grid)
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn workers(&self) -> usize {
        self.owned.len()
    }

    pub fn step(&self) -> f64 {
        self.step
    }

    pub fn cell_volume(&self) -> f64 {
        self.step * self.step * self.step
    }

    pub fn domain(&self) -> &Bounds {
        &self.domain
    }

    /// Global cell count per axis.
    pub fn global_cells(&self) -> [usize; 3] {
        self.cells
    }

    /// Padded local size per axis.
    pub fn dims(&self) -> [usize; 3] {
        self.dims
    }

    /// Total number of padded cells.
    pub fn cell_count(&self) -> usize {
        self.centers.len()
    }

    /// Number of leading cells covering the active sub-volume plus its halo.
    ///
    /// Cells at or beyond this index lie more than one layer above the active
    /// top and take no part in the solve.
    pub fn tracked_cells(&self) -> usize {
        self.tracked
    }

    pub fn index(&self, ix: usize, iy: usize, iz: usize) -> usize {
        assert!(
            ix < self.dims[0] && iy < self.dims[1] && iz < self.dims[2],
            "cell ({ix}, {iy}, {iz}) out of padded bounds {:?}",
            self.dims
        );
        (iz * self.dims[1] + iy) * self.dims[0] + ix
    }

    pub fn local_coords(&self, idx: usize) -> [usize; 3] {
        let ix = idx % self.dims[0];
        let iy = (idx / self.dims[0]) % self.dims[1];
        let iz = idx / (self.dims[0] * self.dims[1]);
        [ix, iy, iz]
    }

    /// Global cell coordinates; ghost cells may be `-1` or `cells[axis]`.
    pub fn global_coords(&self, idx: usize) -> [isize; 3] {
        local_to_global(&self.owned[self.rank], self.local_coords(idx))
    }

    /// Flat index of the face-adjacent cell in `dir`, if it lies inside the padded mesh.
    pub fn neighbor(&self, idx: usize, dir: Direction) -> Option<usize> {
        let c = self.local_coords(idx);
        let a = dir.axis().index();
        let stride = self.stride(dir.axis());
        if dir.is_plus() {
            (c[a] + 1 < self.dims[a]).then_some(idx + stride)
        } else {
            (c[a] > 0).then(|| idx - stride)
        }
    }

    pub(crate) fn stride(&self, axis: Axis) -> usize {
        match axis {
            Axis::X => 1,
            Axis::Y => self.dims[0],
            Axis::Z => self.dims[0] * self.dims[1],
        }
    }

    pub fn center(&self, idx: usize) -> Point {
        self.centers[idx]
    }

    pub fn is_ghost(&self, idx: usize) -> bool {
        self.ghost[idx]
    }

    pub fn ghost_flags(&self) -> &[bool] {
        &self.ghost
    }

    /// Non-ghost cells within the tracked range.
    pub fn interior_cells(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.tracked).filter(|&i| !self.ghost[i])
    }

    pub fn interior_count(&self) -> usize {
        self.interior_cells().count()
    }

    /// Number of z layers (from the bottom of the box) currently holding active material.
    pub fn active_layers(&self) -> usize {
        self.active_layers
    }

    /// Requests a new active height in layers.
    ///
    /// The change is recorded and only applied by [`Self::apply_pending_layers`].
    /// Returns `true` if a rebuild is now pending.
    pub fn set_active_layers(&mut self, layers: usize) -> bool {
        let layers = layers.clamp(1, self.cells[2]);
        if layers == self.active_layers {
            self.pending_layers = None;
            return false;
        }
        self.pending_layers = Some(layers);
        true
    }

    pub fn has_pending_layers(&self) -> bool {
        self.pending_layers.is_some()
    }

    /// Applies a pending active-height change and reclassifies ghost cells.
    ///
    /// Returns `true` if the classification changed.
    pub fn apply_pending_layers(&mut self) -> bool {
        let Some(layers) = self.pending_layers.take() else {
            return false;
        };
        self.active_layers = layers;
        self.classify();
        true
    }

    /// Checks whether the cell lies beyond `face` of the global domain.
    ///
    /// The high-z face tracks the active top rather than the box top.
    pub fn is_beyond(&self, idx: usize, face: Face) -> bool {
        let g = self.global_coords(idx);
        let a = face.axis().index();
        let top = match face.axis() {
            Axis::Z => self.active_layers as isize,
            _ => self.cells[a] as isize,
        };
        if face.is_low() { g[a] < 0 } else { g[a] >= top }
    }

    /// For a ghost cell beyond `face`, the interior cell at the opposite end of
    /// the periodic axis. Only meaningful when this worker spans the whole axis.
    pub fn periodic_image(&self, idx: usize, face: Face) -> Option<usize> {
        let axis = face.axis();
        let a = axis.index();
        let span = match axis {
            Axis::Z => self.active_layers,
            _ => self.cells[a],
        };
        let offset = span * self.stride(axis);
        let c = self.local_coords(idx);
        if face.is_low() {
            (c[a] + span < self.dims[a]).then_some(idx + offset)
        } else {
            (c[a] >= span).then(|| idx - offset)
        }
    }

    pub(crate) fn owned_ranges(&self) -> &[[Range<usize>; 3]] {
        &self.owned
    }

    fn classify(&mut self) {
        let own = self.owned[self.rank].clone();
        let top = self.active_layers as isize;
        for idx in 0..self.centers.len() {
            let g = local_to_global(&own, self.local_coords(idx));
            let outside = (0..3).any(|a| g[a] < own[a].start as isize || g[a] >= own[a].end as isize);
            self.ghost[idx] = outside || g[2] >= top;
        }

        let local_active = (top - own[2].start as isize).clamp(0, own[2].len() as isize) as usize;
        self.tracked = self.dims[0] * self.dims[1] * (local_active + 2);
    }
}

pub(crate) fn local_to_global(own: &[Range<usize>; 3], local: [usize; 3]) -> [isize; 3] {
    [
        own[0].start as isize + local[0] as isize - 1,
        own[1].start as isize + local[1] as isize - 1,
        own[2].start as isize + local[2] as isize - 1,
    ]
}
