use anyhow::Result;

use crate::sim::kinetics::comm::Communicator;
use crate::sim::kinetics::config::{DiffusionConfig, KineticsConfig};
use crate::sim::kinetics::diffusion::{DiffusionSolver, SubStep};
use crate::sim::kinetics::grid::GridPartition;
use crate::sim::kinetics::speciation::{FixedPhSpeciation, equilibrium_constants};
use crate::sim::kinetics::species::{SpeciesKind, SpeciesTable};
use crate::sim::kinetics::state::KineticsState;

/// pH solver: distributes total concentrations over protonation forms.
pub trait Speciation: Send {
    fn solve(&mut self, state: &mut KineticsState) -> Result<()>;
}

/// Free-energy model filling the catabolic/anabolic ΔG fields.
pub trait Thermodynamics: Send {
    fn update(&mut self, state: &mut KineticsState) -> Result<()>;
}

/// Growth kinetics: adds net reaction rates to the state and advances
/// particle biomass over `dt`.
pub trait Growth: Send {
    fn grow(&mut self, state: &mut KineticsState, dt: f64) -> Result<()>;
}

/// Outcome of the nonlinear iteration.
#[derive(Debug, Clone, PartialEq)]
pub enum Convergence {
    Converged,
    /// The iteration ceiling was hit; lists the species that had not converged.
    ForcedAfterCeiling { unconverged: Vec<String> },
}

impl Convergence {
    pub fn is_forced(&self) -> bool {
        matches!(self, Convergence::ForcedAfterCeiling { .. })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SolveReport {
    /// Outer iterations actually performed.
    pub iterations: usize,
    pub convergence: Convergence,
}

/// Drives speciation, thermodynamics, growth and diffusion to a joint fixed point.
pub struct KineticsOrchestrator {
    config: KineticsConfig,
    state: KineticsState,
    builtin: FixedPhSpeciation,
    speciation: Option<Box<dyn Speciation>>,
    thermodynamics: Option<Box<dyn Thermodynamics>>,
    growth: Option<Box<dyn Growth>>,
    diffusion: Option<DiffusionSolver>,
    converged: Vec<bool>,
}

impl KineticsOrchestrator {
    /// Allocates the state, computes equilibrium constants and the initial
    /// activities at the configured pH.
    pub fn initialize(
        config: KineticsConfig,
        species: SpeciesTable,
        grid: GridPartition,
        particle_yields: Vec<f64>,
    ) -> Result<Self> {
        config.validate()?;
        let mut state = KineticsState::new(species, grid, config.unit, particle_yields)?;
        let constants: Vec<(usize, [f64; 4])> = state
            .species()
            .iter()
            .map(|(i, s)| {
                (
                    i,
                    equilibrium_constants(&s.free_energy, config.gas_constant, config.temperature),
                )
            })
            .collect();
        for (i, k) in constants {
            state.set_keq(i, k);
        }

        let mut builtin = FixedPhSpeciation::new(config.initial_ph);
        builtin.solve(&mut state)?;

        let converged = vec![false; state.species().len() + 1];
        Ok(Self {
            config,
            state,
            builtin,
            speciation: None,
            thermodynamics: None,
            growth: None,
            diffusion: None,
            converged,
        })
    }

    pub fn with_speciation(mut self, speciation: Box<dyn Speciation>) -> Self {
        self.speciation = Some(speciation);
        self
    }

    pub fn with_thermodynamics(mut self, thermodynamics: Box<dyn Thermodynamics>) -> Self {
        self.thermodynamics = Some(thermodynamics);
        self
    }

    pub fn with_growth(mut self, growth: Box<dyn Growth>) -> Self {
        self.growth = Some(growth);
        self
    }

    /// Attaches a diffusion stage communicating through `comm`.
    pub fn with_diffusion(
        mut self,
        config: DiffusionConfig,
        comm: Box<dyn Communicator>,
    ) -> Result<Self> {
        self.diffusion = Some(DiffusionSolver::new(config, &self.state, comm)?);
        Ok(self)
    }

    pub fn config(&self) -> &KineticsConfig {
        &self.config
    }

    pub fn state(&self) -> &KineticsState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut KineticsState {
        &mut self.state
    }

    pub fn diffusion(&self) -> Option<&DiffusionSolver> {
        self.diffusion.as_ref()
    }

    /// Requests a new active height; applied on the next solve's first iteration.
    pub fn set_active_layers(&mut self, layers: usize) -> bool {
        self.state.grid_mut().set_active_layers(layers)
    }

    /// Re-derives the per-cell yield fields after a change of particle yields.
    /// Concentrations are left untouched.
    pub fn grow(&mut self, particle_yields: &[f64]) -> Result<()> {
        self.state.set_particle_yields(particle_yields)?;
        self.state.seed_yields();
        Ok(())
    }

    /// Runs the solver if `timestep` falls on the cadence, then realizes
    /// biomass growth over the whole cadence interval.
    ///
    /// Returns `None` off-cadence, or always when the cadence is 0.
    pub fn step(&mut self, timestep: u64, dt: f64) -> Result<Option<SolveReport>> {
        let nevery = self.config.nevery;
        if nevery == 0 || timestep % nevery != 0 {
            return Ok(None);
        }
        let interval = dt * nevery as f64;
        let report = self.solve(interval)?;
        if let Some(growth) = self.growth.as_mut() {
            self.state.clear_reaction_rates();
            growth.grow(&mut self.state, interval)?;
        }
        Ok(Some(report))
    }

    /// Nonlinear iteration: speciation, thermodynamics, growth, diffusion,
    /// repeated until every species has converged or the ceiling is exceeded.
    pub fn solve(&mut self, interval: f64) -> Result<SolveReport> {
        for i in self.state.species().indices() {
            self.converged[i] = matches!(
                self.state.species().kind(i),
                SpeciesKind::Water | SpeciesKind::Proton
            );
        }
        let dt = self.config.diffusion_dt;

        let mut iteration = 0;
        let convergence = loop {
            iteration += 1;

            match self.speciation.as_mut() {
                Some(sp) => sp.solve(&mut self.state)?,
                None => self.builtin.solve(&mut self.state)?,
            }
            if let Some(thermo) = self.thermodynamics.as_mut() {
                thermo.update(&mut self.state)?;
            }
            self.state.clear_reaction_rates();
            if let Some(growth) = self.growth.as_mut() {
                growth.grow(&mut self.state, dt)?;
            }
            let Some(diffusion) = self.diffusion.as_mut() else {
                break Convergence::Converged;
            };
            diffusion.diffuse(
                &mut self.state,
                &mut self.converged,
                SubStep {
                    iteration,
                    dt,
                    interval,
                },
            )?;

            if self.converged[1..].iter().all(|&c| c) {
                break Convergence::Converged;
            }
            if iteration > self.config.max_iterations {
                let unconverged: Vec<String> = self
                    .state
                    .species()
                    .iter()
                    .filter(|(i, _)| !self.converged[*i])
                    .map(|(_, s)| s.name.clone())
                    .collect();
                self.converged.fill(true);
                log::warn!(
                    "no convergence after {iteration} iterations: {}",
                    unconverged.join(", ")
                );
                break Convergence::ForcedAfterCeiling { unconverged };
            }
        };

        log::info!("number of iterations: {iteration}");
        Ok(SolveReport {
            iterations: iteration,
            convergence,
        })
    }
}
