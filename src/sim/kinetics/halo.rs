use std::ops::Range;

use crate::sim::kinetics::grid::{GridPartition, local_to_global};

/// Halo exchange table of one worker.
///
/// For every peer it lists a contiguous range of owned cells to send and a
/// contiguous range of ghost cells to receive. Both sides derive the lists from
/// the same global decomposition, so the i-th cell sent by one worker lands in
/// the i-th ghost cell received by its peer.
#[derive(Debug, Clone, Default)]
pub struct HaloPlan {
    send_cells: Vec<usize>,
    send_ranges: Vec<(usize, Range<usize>)>,
    recv_cells: Vec<usize>,
    recv_ranges: Vec<(usize, Range<usize>)>,
    /// `(ghost, owned)` pairs where a periodic axis wraps onto this worker itself.
    local_copies: Vec<(usize, usize)>,
}

struct GhostSource {
    /// Ghost cell index on the receiving worker.
    ghost: usize,
    /// Worker owning the source cell.
    owner: usize,
    /// Global coordinates of the source cell.
    global: [usize; 3],
}

impl HaloPlan {
    /// No halo traffic (before the first build).
    pub fn empty() -> Self {
        Self::default()
    }

    /// Builds the table for `grid`'s worker. `periodic[axis]` marks axes whose
    /// opposite faces are joined through the halo. A single worker only gets
    /// local copies for its periodic axes.
    pub fn build(grid: &GridPartition, periodic: [bool; 3]) -> Self {
        let me = grid.rank();
        let own = &grid.owned_ranges()[me];

        let mut plan = Self::empty();

        let mut incoming = ghost_sources(grid, me, periodic);
        incoming.sort_by_key(|s| s.owner);
        for src in &incoming {
            if src.owner == me {
                plan.local_copies.push((src.ghost, local_index(own, src.global)));
            }
        }
        for peer in (0..grid.workers()).filter(|&p| p != me) {
            let start = plan.recv_cells.len();
            plan.recv_cells
                .extend(incoming.iter().filter(|s| s.owner == peer).map(|s| s.ghost));
            if plan.recv_cells.len() > start {
                plan.recv_ranges.push((peer, start..plan.recv_cells.len()));
            }

            let start = plan.send_cells.len();
            plan.send_cells.extend(
                ghost_sources(grid, peer, periodic)
                    .into_iter()
                    .filter(|s| s.owner == me)
                    .map(|s| local_index(own, s.global)),
            );
            if plan.send_cells.len() > start {
                plan.send_ranges.push((peer, start..plan.send_cells.len()));
            }
        }
        plan
    }

    pub fn send_cells(&self) -> &[usize] {
        &self.send_cells
    }

    pub fn recv_cells(&self) -> &[usize] {
        &self.recv_cells
    }

    /// Per-peer ranges into [`Self::send_cells`].
    pub fn send_ranges(&self) -> &[(usize, Range<usize>)] {
        &self.send_ranges
    }

    /// Per-peer ranges into [`Self::recv_cells`].
    pub fn recv_ranges(&self) -> &[(usize, Range<usize>)] {
        &self.recv_ranges
    }

    pub fn local_copies(&self) -> &[(usize, usize)] {
        &self.local_copies
    }

    pub fn is_empty(&self) -> bool {
        self.send_cells.is_empty() && self.recv_cells.is_empty() && self.local_copies.is_empty()
    }
}

/// Ghost cells of worker `rank` that mirror an owned cell of some worker.
///
/// Ghosts beyond a non-periodic face, and ghosts above the active top, are
/// left to the boundary-condition stage.
fn ghost_sources(grid: &GridPartition, rank: usize, periodic: [bool; 3]) -> Vec<GhostSource> {
    let owned = grid.owned_ranges();
    let own = &owned[rank];
    let cells = grid.global_cells();
    let top = grid.active_layers();
    let dims = [own[0].len() + 2, own[1].len() + 2, own[2].len() + 2];
    let spans = [cells[0], cells[1], top];

    let mut out = Vec::new();
    for iz in 0..dims[2] {
        for iy in 0..dims[1] {
            for ix in 0..dims[0] {
                let g = local_to_global(own, [ix, iy, iz]);
                let inside_own = (0..3).all(|a| g[a] >= own[a].start as isize && g[a] < own[a].end as isize);
                if inside_own && g[2] < top as isize {
                    continue;
                }
                let Some(global) = wrap(g, spans, periodic) else {
                    continue;
                };
                let Some(owner) = owned.iter().position(|r| (0..3).all(|a| r[a].contains(&global[a])))
                else {
                    continue;
                };
                out.push(GhostSource {
                    ghost: (iz * dims[1] + iy) * dims[0] + ix,
                    owner,
                    global,
                });
            }
        }
    }
    out
}

fn wrap(g: [isize; 3], spans: [usize; 3], periodic: [bool; 3]) -> Option<[usize; 3]> {
    let mut out = [0usize; 3];
    for a in 0..3 {
        let n = spans[a] as isize;
        if g[a] >= 0 && g[a] < n {
            out[a] = g[a] as usize;
        } else if periodic[a] && g[a] >= -1 && g[a] <= n {
            out[a] = g[a].rem_euclid(n) as usize;
        } else {
            return None;
        }
    }
    Some(out)
}

fn local_index(own: &[Range<usize>; 3], global: [usize; 3]) -> usize {
    let dims = [own[0].len() + 2, own[1].len() + 2];
    let l = [
        global[0] - own[0].start + 1,
        global[1] - own[1].start + 1,
        global[2] - own[2].start + 1,
    ];
    (l[2] * dims[1] + l[1]) * dims[0] + l[0]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::bounds::Bounds;
    use crate::sim::kinetics::grid::Decomposition;
    use anyhow::Result;

    fn two_slabs_along_x() -> Result<(GridPartition, GridPartition)> {
        let d = Decomposition::split(Bounds::from_extent(4., 2., 2.), [4, 2, 2], [2, 1, 1])?;
        Ok((GridPartition::new(&d, 0)?, GridPartition::new(&d, 1)?))
    }

    #[test]
    fn test_single_worker_plan_has_only_local_copies() -> Result<()> {
        let d = Decomposition::single(Bounds::from_extent(2., 2., 2.), [2, 2, 2]);
        let g = GridPartition::new(&d, 0)?;
        assert!(HaloPlan::build(&g, [false; 3]).is_empty());

        let p = HaloPlan::build(&g, [true, false, false]);
        assert!(p.send_cells().is_empty() && p.recv_cells().is_empty());
        assert_eq!(p.local_copies().len(), 2 * 2 * 2);
        for &(ghost, owned) in p.local_copies() {
            assert!(g.is_ghost(ghost));
            let (gg, go) = (g.global_coords(ghost), g.global_coords(owned));
            assert_eq!(go[0], gg[0].rem_euclid(2));
            assert_eq!(go[1..], gg[1..]);
        }
        Ok(())
    }

    #[test]
    fn test_non_periodic_plan_pairs_sends_and_receives() -> Result<()> {
        let (g0, g1) = two_slabs_along_x()?;
        let p0 = HaloPlan::build(&g0, [false; 3]);
        let p1 = HaloPlan::build(&g1, [false; 3]);

        // One face of 2x2 cells in each direction.
        assert_eq!(p0.send_cells().len(), 4);
        assert_eq!(p0.recv_cells().len(), 4);
        assert_eq!(p0.send_ranges(), &[(1, 0..4)]);
        assert_eq!(p1.recv_ranges(), &[(0, 0..4)]);

        // What worker 0 sends is what worker 1 expects in its ghost cells.
        for (&s, &r) in p0.send_cells().iter().zip(p1.recv_cells()) {
            assert!(!g0.is_ghost(s));
            assert!(g1.is_ghost(r));
            assert_eq!(g0.global_coords(s), g1.global_coords(r));
        }
        Ok(())
    }

    #[test]
    fn test_periodic_axis_wraps_between_workers() -> Result<()> {
        let (g0, g1) = two_slabs_along_x()?;
        let p0 = HaloPlan::build(&g0, [true, false, false]);
        // Both x faces of worker 0 now mirror worker 1.
        assert_eq!(p0.recv_cells().len(), 8);
        assert_eq!(p0.send_cells().len(), 8);
        assert!(p0.local_copies().is_empty());
        Ok(())
    }

    #[test]
    fn test_periodic_axis_owned_by_one_worker_copies_locally() -> Result<()> {
        let (g0, _) = two_slabs_along_x()?;
        let p0 = HaloPlan::build(&g0, [false, true, false]);
        // y spans a single worker, so the y ghosts wrap onto worker 0 itself.
        assert_eq!(p0.local_copies().len(), 2 * 2 * 2);
        for &(ghost, owned) in p0.local_copies() {
            assert!(g0.is_ghost(ghost));
            assert!(!g0.is_ghost(owned));
        }
        Ok(())
    }
}
