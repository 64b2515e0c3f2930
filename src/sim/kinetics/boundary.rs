use std::fmt;

use crate::geom::bounds::Axis;
use crate::sim::kinetics::error::ConfigError;
use crate::sim::kinetics::grid::{Face, GridPartition};
use crate::sim::kinetics::species::FaceValues;

/// Smallest concentration a cell may hold after an update.
pub const CONCENTRATION_FLOOR: f64 = 1e-20;

/// Condition applied at a single domain face.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaceRule {
    /// Joined with the opposite face.
    Periodic,
    /// Fixed value: the ghost reflects the face value, `2*bc - neighbor`.
    Dirichlet,
    /// Zero flux: the ghost copies its inward neighbor.
    Neumann,
}

/// Boundary regime of one axis, named after its low and high faces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisBoundary {
    /// `pp`
    PeriodicPeriodic,
    /// `dd`
    DirichletDirichlet,
    /// `nd`
    NeumannDirichlet,
    /// `nn`
    NeumannNeumann,
    /// `dn`
    DirichletNeumann,
    /// `db`: zero flux at the substratum, fixed value from the bulk reservoir
    /// at the top. Vertical axis only.
    NeumannBulk,
}

impl AxisBoundary {
    /// Parses a two-letter boundary code for `axis`.
    pub fn parse(axis: Axis, code: &str) -> Result<Self, ConfigError> {
        let regime = match code {
            "pp" => AxisBoundary::PeriodicPeriodic,
            "dd" => AxisBoundary::DirichletDirichlet,
            "nd" => AxisBoundary::NeumannDirichlet,
            "nn" => AxisBoundary::NeumannNeumann,
            "dn" => AxisBoundary::DirichletNeumann,
            "db" if axis == Axis::Z => AxisBoundary::NeumannBulk,
            _ => {
                return Err(ConfigError::UnknownBoundaryCode {
                    axis: axis_letter(axis),
                    code: code.to_string(),
                });
            }
        };
        Ok(regime)
    }

    pub fn code(self) -> &'static str {
        match self {
            AxisBoundary::PeriodicPeriodic => "pp",
            AxisBoundary::DirichletDirichlet => "dd",
            AxisBoundary::NeumannDirichlet => "nd",
            AxisBoundary::NeumannNeumann => "nn",
            AxisBoundary::DirichletNeumann => "dn",
            AxisBoundary::NeumannBulk => "db",
        }
    }

    pub fn low(self) -> FaceRule {
        match self {
            AxisBoundary::PeriodicPeriodic => FaceRule::Periodic,
            AxisBoundary::DirichletDirichlet | AxisBoundary::DirichletNeumann => FaceRule::Dirichlet,
            AxisBoundary::NeumannDirichlet
            | AxisBoundary::NeumannNeumann
            | AxisBoundary::NeumannBulk => FaceRule::Neumann,
        }
    }

    pub fn high(self) -> FaceRule {
        match self {
            AxisBoundary::PeriodicPeriodic => FaceRule::Periodic,
            AxisBoundary::DirichletDirichlet
            | AxisBoundary::NeumannDirichlet
            | AxisBoundary::NeumannBulk => FaceRule::Dirichlet,
            AxisBoundary::NeumannNeumann | AxisBoundary::DirichletNeumann => FaceRule::Neumann,
        }
    }

    pub fn is_periodic(self) -> bool {
        self == AxisBoundary::PeriodicPeriodic
    }
}

impl fmt::Display for AxisBoundary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

fn axis_letter(axis: Axis) -> char {
    match axis {
        Axis::X => 'x',
        Axis::Y => 'y',
        Axis::Z => 'z',
    }
}

/// Boundary regimes of the three axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundarySet {
    pub x: AxisBoundary,
    pub y: AxisBoundary,
    pub z: AxisBoundary,
}

impl Default for BoundarySet {
    /// Laterally periodic biofilm on an impermeable substratum under a bulk liquid.
    fn default() -> Self {
        Self {
            x: AxisBoundary::PeriodicPeriodic,
            y: AxisBoundary::PeriodicPeriodic,
            z: AxisBoundary::NeumannDirichlet,
        }
    }
}

impl BoundarySet {
    pub fn new(x: AxisBoundary, y: AxisBoundary, z: AxisBoundary) -> Self {
        Self { x, y, z }
    }

    /// Parses the three per-axis codes, e.g. `("pp", "pp", "nd")`.
    pub fn from_codes(x: &str, y: &str, z: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            x: AxisBoundary::parse(Axis::X, x)?,
            y: AxisBoundary::parse(Axis::Y, y)?,
            z: AxisBoundary::parse(Axis::Z, z)?,
        })
    }

    pub fn axis(&self, axis: Axis) -> AxisBoundary {
        match axis {
            Axis::X => self.x,
            Axis::Y => self.y,
            Axis::Z => self.z,
        }
    }

    pub fn rule(&self, face: Face) -> FaceRule {
        let regime = self.axis(face.axis());
        if face.is_low() { regime.low() } else { regime.high() }
    }

    /// Per-axis periodicity flags, in axis order.
    pub fn periodic(&self) -> [bool; 3] {
        [self.x.is_periodic(), self.y.is_periodic(), self.z.is_periodic()]
    }
}

/// Update applied to one ghost cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GhostRule {
    Dirichlet { face: Face, neighbor: usize },
    Neumann { neighbor: usize },
    /// Copy from the opposite end of a periodic axis owned by this worker alone.
    Periodic { source: usize },
}

/// Resolved boundary rules for every ghost cell of a grid that touches a
/// domain face. Rebuilt whenever ghost classification changes.
#[derive(Debug, Clone, Default)]
pub struct BoundaryPlan {
    rules: Vec<(usize, GhostRule)>,
}

impl BoundaryPlan {
    pub fn build(grid: &GridPartition, boundaries: &BoundarySet) -> Self {
        Self::build_with_flags(grid, grid.ghost_flags(), boundaries)
    }

    /// Like [`Self::build`] but against an explicit ghost classification.
    pub(crate) fn build_with_flags(
        grid: &GridPartition,
        ghost: &[bool],
        boundaries: &BoundarySet,
    ) -> Self {
        let single = grid.workers() == 1;
        let rules = (0..grid.tracked_cells())
            .filter(|&idx| ghost[idx])
            .filter_map(|idx| resolve(grid, ghost, boundaries, single, idx).map(|r| (idx, r)))
            .collect();
        Self { rules }
    }

    pub fn rules(&self) -> &[(usize, GhostRule)] {
        &self.rules
    }

    pub fn rule_for(&self, cell: usize) -> Option<GhostRule> {
        self.rules.iter().find(|(c, _)| *c == cell).map(|(_, r)| *r)
    }

    /// Writes boundary values of one species into `conc` from the snapshot `prev`.
    ///
    /// `top` replaces the high-z face value; it is the bulk reservoir value.
    /// Copied values are floored like interior concentrations. Reflected
    /// Dirichlet values are not: they only place the face value midway between
    /// the ghost and its neighbor, and may be negative for a zero face value.
    pub fn apply(&self, prev: &[f64], faces: &FaceValues, top: f64, conc: &mut [f64]) {
        for &(cell, rule) in &self.rules {
            conc[cell] = match rule {
                GhostRule::Dirichlet { face, neighbor } => {
                    let bc = if face == Face::ZHigh { top } else { faces.get(face) };
                    2.0 * bc - prev[neighbor]
                }
                GhostRule::Neumann { neighbor } => floor(prev[neighbor]),
                GhostRule::Periodic { source } => floor(prev[source]),
            };
        }
    }
}

/// Clamps non-positive concentrations to [`CONCENTRATION_FLOOR`].
pub fn floor(value: f64) -> f64 {
    if value <= 0.0 { CONCENTRATION_FLOOR } else { value }
}

/// First face, in [`Face::PRIORITY`] order, that the cell lies beyond while
/// its inward neighbor is interior. A matching periodic face on a split axis
/// yields no rule: the halo exchange fills the cell.
fn resolve(
    grid: &GridPartition,
    ghost: &[bool],
    boundaries: &BoundarySet,
    single: bool,
    idx: usize,
) -> Option<GhostRule> {
    for face in Face::PRIORITY {
        if !grid.is_beyond(idx, face) {
            continue;
        }
        let Some(neighbor) = grid.neighbor(idx, face.inward()) else {
            continue;
        };
        if ghost[neighbor] {
            continue;
        }
        return match boundaries.rule(face) {
            FaceRule::Dirichlet => Some(GhostRule::Dirichlet { face, neighbor }),
            FaceRule::Neumann => Some(GhostRule::Neumann { neighbor }),
            FaceRule::Periodic if single => grid
                .periodic_image(idx, face)
                .map(|source| GhostRule::Periodic { source }),
            FaceRule::Periodic => None,
        };
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::bounds::Bounds;
    use crate::sim::kinetics::grid::Decomposition;
    use anyhow::Result;

    fn grid(n: [usize; 3]) -> Result<GridPartition> {
        let d = Decomposition::single(Bounds::from_extent(n[0] as f64, n[1] as f64, n[2] as f64), n);
        GridPartition::new(&d, 0)
    }

    #[test]
    fn test_codes_map_to_face_rules() {
        use FaceRule::*;
        let cases = [
            ("pp", Periodic, Periodic),
            ("dd", Dirichlet, Dirichlet),
            ("nd", Neumann, Dirichlet),
            ("nn", Neumann, Neumann),
            ("dn", Dirichlet, Neumann),
            ("db", Neumann, Dirichlet),
        ];
        for (code, low, high) in cases {
            let b = AxisBoundary::parse(Axis::Z, code).unwrap();
            assert_eq!((b.low(), b.high()), (low, high), "code {code}");
            assert_eq!(b.to_string(), code);
        }
    }

    #[test]
    fn test_unknown_and_misplaced_codes_are_rejected() {
        assert_eq!(
            AxisBoundary::parse(Axis::X, "xx"),
            Err(ConfigError::UnknownBoundaryCode {
                axis: 'x',
                code: "xx".to_string()
            })
        );
        assert!(AxisBoundary::parse(Axis::Y, "db").is_err());
        assert!(BoundarySet::from_codes("pp", "pp", "db").is_ok());
    }

    #[test]
    fn test_dirichlet_pair_on_z() -> Result<()> {
        let g = grid([1, 1, 3])?;
        let b = BoundarySet::from_codes("nn", "nn", "dd")?;
        let plan = BoundaryPlan::build(&g, &b);

        let below = g.index(1, 1, 0);
        let above = g.index(1, 1, 4);
        assert_eq!(
            plan.rule_for(below),
            Some(GhostRule::Dirichlet {
                face: Face::ZLow,
                neighbor: g.index(1, 1, 1)
            })
        );
        assert_eq!(
            plan.rule_for(above),
            Some(GhostRule::Dirichlet {
                face: Face::ZHigh,
                neighbor: g.index(1, 1, 3)
            })
        );
        // Lateral ghosts of the column are zero-flux.
        assert_eq!(
            plan.rule_for(g.index(0, 1, 2)),
            Some(GhostRule::Neumann {
                neighbor: g.index(1, 1, 2)
            })
        );

        let mut prev = vec![0.25; g.cell_count()];
        prev[g.index(1, 1, 1)] = 0.2;
        prev[g.index(1, 1, 2)] = -1.0;
        let mut conc = prev.clone();
        plan.apply(&prev, &FaceValues::uniform(0.0), 1.0, &mut conc);
        // The reflection keeps the face value at zero between ghost and neighbor.
        assert_eq!(conc[below], -0.2);
        assert!((conc[above] - 1.75).abs() < 1e-15);
        // A zero-flux copy of a non-positive value is floored.
        assert_eq!(conc[g.index(0, 1, 2)], CONCENTRATION_FLOOR);
        Ok(())
    }

    #[test]
    fn test_single_worker_periodic_copies_opposite_face() -> Result<()> {
        let g = grid([3, 1, 1])?;
        let plan = BoundaryPlan::build(&g, &BoundarySet::from_codes("pp", "nn", "nn")?);
        assert_eq!(
            plan.rule_for(g.index(0, 1, 1)),
            Some(GhostRule::Periodic {
                source: g.index(3, 1, 1)
            })
        );

        let mut prev = vec![0.0; g.cell_count()];
        prev[g.index(3, 1, 1)] = 7.0;
        let mut conc = prev.clone();
        plan.apply(&prev, &FaceValues::default(), 0.0, &mut conc);
        assert_eq!(conc[g.index(0, 1, 1)], 7.0);
        Ok(())
    }

    #[test]
    fn test_corner_ghost_resolves_by_priority() -> Result<()> {
        let g = grid([1, 1, 1])?;
        let b = BoundarySet::from_codes("nn", "dd", "nn")?;
        // Ghost below the domain and in front of it at the same time.
        let corner = g.index(1, 0, 0);
        let above_corner = g.index(1, 0, 1);
        let behind_corner = g.index(1, 1, 0);

        // With the real classification both inward neighbors are ghosts too,
        // so no face applies.
        assert_eq!(BoundaryPlan::build(&g, &b).rule_for(corner), None);

        let mut ghost = g.ghost_flags().to_vec();
        ghost[above_corner] = false;
        ghost[behind_corner] = false;
        let plan = BoundaryPlan::build_with_flags(&g, &ghost, &b);
        // Low z is checked before low y.
        assert_eq!(
            plan.rule_for(corner),
            Some(GhostRule::Neumann {
                neighbor: above_corner
            })
        );

        ghost[above_corner] = true;
        let plan = BoundaryPlan::build_with_flags(&g, &ghost, &b);
        assert_eq!(
            plan.rule_for(corner),
            Some(GhostRule::Dirichlet {
                face: Face::YLow,
                neighbor: behind_corner
            })
        );
        Ok(())
    }

    #[test]
    fn test_floor() {
        assert_eq!(floor(-3.0), CONCENTRATION_FLOOR);
        assert_eq!(floor(0.0), CONCENTRATION_FLOOR);
        assert_eq!(floor(2.0), 2.0);
    }
}
