use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::Point;
use crate::geom::bounds::{Axis, Bounds};
use crate::sim::kinetics::comm::Communicator;

/// A spherical particle as seen by the height estimate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Particle {
    pub position: Point,
    pub radius: f64,
}

impl Particle {
    pub fn new(position: Point, radius: f64) -> Self {
        Self { position, radius }
    }
}

/// Highest particle top per horizontal column of `columns[0] x columns[1]`,
/// measured from the bottom of `domain`. Particles outside the footprint are ignored.
pub fn column_maxima(particles: &[Particle], domain: &Bounds, columns: [usize; 2]) -> Vec<f64> {
    let mut maxh = vec![0.0; columns[0] * columns[1]];
    let step = [
        domain.extent(Axis::X) / columns[0] as f64,
        domain.extent(Axis::Y) / columns[1] as f64,
    ];
    let column = |coord: f64, axis: Axis| -> Option<usize> {
        let (lo, hi) = (domain.lo.coord(axis), domain.hi.coord(axis));
        if coord < lo || coord > hi {
            return None;
        }
        let a = axis.index();
        Some((((coord - lo) / step[a]) as usize).min(columns[a] - 1))
    };
    for p in particles {
        let (Some(ix), Some(iy)) = (column(p.position.x, Axis::X), column(p.position.y, Axis::Y)) else {
            continue;
        };
        let top = p.position.z + p.radius - domain.lo.z;
        let cell = &mut maxh[iy * columns[0] + ix];
        *cell = f64::max(*cell, top);
    }
    maxh
}

/// Mean biofilm height over the domain footprint.
///
/// Every worker passes its own particles; column maxima are combined across
/// workers so all of them return the same value.
pub fn mean_biofilm_height(
    particles: &[Particle],
    domain: &Bounds,
    columns: [usize; 2],
    comm: &mut dyn Communicator,
) -> Result<f64> {
    anyhow::ensure!(
        columns[0] > 0 && columns[1] > 0,
        "height grid needs at least one column per axis"
    );
    let mut maxh = column_maxima(particles, domain, columns);
    comm.all_max(&mut maxh)?;
    let column_area =
        domain.extent(Axis::X) / columns[0] as f64 * domain.extent(Axis::Y) / columns[1] as f64;
    let total: f64 = maxh.iter().map(|h| h * column_area).sum();
    Ok(total / domain.cross_section_area())
}

/// Number of grid layers covering the biofilm plus its boundary layer, in `1..=nz`.
pub fn active_layers_for_height(height: f64, boundary_layer: f64, step: f64, nz: usize) -> usize {
    let layers = ((height + boundary_layer) / step).ceil();
    if layers.is_nan() || layers < 1.0 {
        1
    } else {
        (layers as usize).min(nz)
    }
}
