use anyhow::Result;
use rayon::prelude::*;

use crate::sim::kinetics::boundary::{BoundaryPlan, floor};
use crate::sim::kinetics::bulk::update_reservoirs;
use crate::sim::kinetics::comm::Communicator;
use crate::sim::kinetics::config::DiffusionConfig;
use crate::sim::kinetics::grid::{Direction, GridPartition};
use crate::sim::kinetics::halo::HaloPlan;
use crate::sim::kinetics::state::KineticsState;

/// Staging buffers grow in multiples of this many values.
pub const BUFMIN: usize = 1000;

/// One diffusion sub-step of the outer nonlinear iteration.
#[derive(Debug, Clone, Copy)]
pub struct SubStep {
    /// 1-based outer iteration index.
    pub iteration: usize,
    /// Diffusion time step.
    pub dt: f64,
    /// Simulated time covered by the whole solve, used by the reservoir balance.
    pub interval: f64,
}

/// Finite-difference stencil of one interior cell.
#[derive(Debug, Clone, Copy)]
struct Stencil {
    cell: usize,
    /// Neighbors in [`Direction::ALL`] order.
    neighbors: [usize; 6],
    /// Distance from the active top down to the cell centre.
    depth: f64,
}

/// Explicit finite-difference diffusion-reaction solver of one worker.
pub struct DiffusionSolver {
    config: DiffusionConfig,
    comm: Box<dyn Communicator>,
    halo: HaloPlan,
    boundary: BoundaryPlan,
    interior: Vec<Stencil>,
    prev: Vec<f64>,
    send_buf: Vec<f64>,
    recv_buf: Vec<f64>,
}

impl DiffusionSolver {
    pub fn new(
        config: DiffusionConfig,
        state: &KineticsState,
        comm: Box<dyn Communicator>,
    ) -> Result<Self> {
        config.validate()?;
        let grid = state.grid();
        anyhow::ensure!(
            comm.size() == grid.workers() && comm.rank() == grid.rank(),
            "communicator (rank {} of {}) does not match the grid partition (rank {} of {})",
            comm.rank(),
            comm.size(),
            grid.rank(),
            grid.workers()
        );
        let mut solver = Self {
            config,
            comm,
            halo: HaloPlan::empty(),
            boundary: BoundaryPlan::default(),
            interior: Vec::new(),
            prev: vec![0.0; grid.cell_count()],
            send_buf: Vec::new(),
            recv_buf: Vec::new(),
        };
        solver.rebuild(grid);
        Ok(solver)
    }

    pub fn config(&self) -> &DiffusionConfig {
        &self.config
    }

    pub fn halo(&self) -> &HaloPlan {
        &self.halo
    }

    /// Current `(send, receive)` staging buffer sizes.
    pub fn buffer_sizes(&self) -> (usize, usize) {
        (self.send_buf.len(), self.recv_buf.len())
    }

    /// Recomputes stencils, boundary rules and the halo table from `grid`.
    fn rebuild(&mut self, grid: &GridPartition) {
        self.halo = HaloPlan::build(grid, self.config.boundaries.periodic());
        self.boundary = BoundaryPlan::build(grid, &self.config.boundaries);
        let step = grid.step();
        let top = grid.active_layers() as isize;
        self.interior = grid
            .interior_cells()
            .filter_map(|cell| {
                let mut neighbors = [0; 6];
                for (n, dir) in neighbors.iter_mut().zip(Direction::ALL) {
                    *n = grid.neighbor(cell, dir)?;
                }
                let layers_to_top = (top - grid.global_coords(cell)[2]) as f64;
                Some(Stencil {
                    cell,
                    neighbors,
                    depth: layers_to_top * step - step / 2.0,
                })
            })
            .collect();
    }

    /// Advances every unconverged liquid species by one sub-step and updates
    /// `converged` (indexed by species, entry 0 unused) with the flags agreed
    /// by all workers.
    pub fn diffuse(
        &mut self,
        state: &mut KineticsState,
        converged: &mut [bool],
        sub: SubStep,
    ) -> Result<()> {
        let n = state.species().len();
        anyhow::ensure!(
            converged.len() == n + 1,
            "expected {} convergence flags, got {}",
            n + 1,
            converged.len()
        );

        if sub.iteration == 1 && state.grid_mut().apply_pending_layers() {
            log::debug!(
                "active height changed to {} layers, rebuilding grid",
                state.grid().active_layers()
            );
            self.rebuild(state.grid());
        }

        self.exchange_halo(state)?;

        if sub.iteration == 1 {
            if let Some(reactor) = self.config.reactor.filter(|r| r.is_active()) {
                update_reservoirs(
                    &reactor,
                    &self.config.bulk_exempt,
                    state,
                    self.comm.as_mut(),
                    sub.interval,
                )?;
            }
        }

        let step = state.grid().step();
        let tracked = state.grid().tracked_cells();
        let mut conv = vec![true; n + 1];
        for i in state.species().indices() {
            if !state.species().get(i).is_liquid() || converged[i] {
                continue;
            }
            let diffusivity = state.species().get(i).diffusivity;
            let faces = *state.faces(i);
            let bulk = state.bulk(i);
            let (conc, rate) = state.species_fields_mut(i)?;

            // Explicit scheme: every update reads the snapshot only.
            self.prev[..tracked].copy_from_slice(&conc[..tracked]);
            let prev = &self.prev;
            let shear_rate = self.config.shear_rate;
            let updated: Vec<f64> = self
                .interior
                .par_iter()
                .map(|s| {
                    let c = prev[s.cell];
                    let [xm, xp, ym, yp, zm, zp] = s.neighbors.map(|nb| prev[nb]);
                    let lap = |minus: f64, plus: f64| {
                        let j_plus = diffusivity * (plus - c) / step;
                        let j_minus = diffusivity * (c - minus) / step;
                        (j_plus - j_minus) / step
                    };
                    let shear = if shear_rate != 0.0 {
                        shear_rate * s.depth * (xp - xm) / (2.0 * step)
                    } else {
                        0.0
                    };
                    let net = lap(xm, xp) + lap(ym, yp) + lap(zm, zp) + rate[s.cell] - shear;
                    floor(c + net * sub.dt)
                })
                .collect();

            for (s, &v) in self.interior.iter().zip(&updated) {
                conc[s.cell] = v;
            }
            self.boundary.apply(prev, &faces, bulk, conc);

            let mut max = [updated.par_iter().copied().reduce(|| 0.0, f64::max)];
            self.comm.all_max(&mut max)?;
            let scale = if max[0] == 0.0 { 1.0 } else { max[0] };
            let tolerance = self.config.tolerance;
            conv[i] = self
                .interior
                .par_iter()
                .zip(updated.par_iter())
                .all(|(s, &v)| (v / scale - prev[s.cell] / scale).abs() < tolerance);

            state.clear_reaction_rate(i);
        }

        self.comm.all_and(&mut conv[1..])?;
        converged[1..].copy_from_slice(&conv[1..]);
        Ok(())
    }

    /// Sends owned boundary cells to their peers and fills the ghost cells
    /// they mirror, for all species at once.
    fn exchange_halo(&mut self, state: &mut KineticsState) -> Result<()> {
        if self.halo.is_empty() {
            return Ok(());
        }
        let n = state.species().len();
        grow_buffer(&mut self.send_buf, self.halo.send_cells().len() * n);
        grow_buffer(&mut self.recv_buf, self.halo.recv_cells().len() * n);

        let conc = state.concentration_mut();
        for (c, &cell) in self.halo.send_cells().iter().enumerate() {
            for i in 1..=n {
                self.send_buf[c * n + i - 1] = conc[[i, cell]];
            }
        }
        let scale = |ranges: &[(usize, std::ops::Range<usize>)]| -> Vec<(usize, std::ops::Range<usize>)> {
            ranges
                .iter()
                .map(|(p, r)| (*p, r.start * n..r.end * n))
                .collect()
        };
        let sends = scale(self.halo.send_ranges());
        let recvs = scale(self.halo.recv_ranges());
        self.comm
            .exchange(&self.send_buf, &sends, &mut self.recv_buf, &recvs)?;

        for (c, &cell) in self.halo.recv_cells().iter().enumerate() {
            for i in 1..=n {
                conc[[i, cell]] = self.recv_buf[c * n + i - 1];
            }
        }
        for &(ghost, owned) in self.halo.local_copies() {
            for i in 1..=n {
                conc[[i, ghost]] = conc[[i, owned]];
            }
        }
        Ok(())
    }
}

/// Grows `buf` in [`BUFMIN`] increments until it holds `needed` values. Never shrinks.
fn grow_buffer(buf: &mut Vec<f64>, needed: usize) {
    if buf.len() < needed {
        let size = buf.len() + (needed / BUFMIN + 1) * BUFMIN;
        log::debug!("growing halo buffer from {} to {}", buf.len(), size);
        buf.resize(size, 0.0);
    }
}
