use std::str::FromStr;

use anyhow::Result;

use crate::sim::kinetics::boundary::BoundarySet;
use crate::sim::kinetics::error::ConfigError;

/// Hard ceiling on outer nonlinear iterations.
pub const MAX_ITERATIONS: usize = 10_000;

/// Unit in which concentrations are tracked internally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Unit {
    /// Mass units; externally supplied values are scaled by 1000.
    Mass,
    #[default]
    Molar,
}

impl Unit {
    /// Factor converting externally supplied values into internal units.
    pub fn factor(self) -> f64 {
        match self {
            Unit::Mass => 1000.0,
            Unit::Molar => 1.0,
        }
    }
}

impl FromStr for Unit {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "kg" => Ok(Unit::Mass),
            "mol" => Ok(Unit::Molar),
            other => Err(ConfigError::UnknownUnitCode(other.to_string())),
        }
    }
}

/// Runtime parameters of the kinetics orchestrator.
#[derive(Debug, Clone)]
pub struct KineticsConfig {
    /// Run every `nevery` simulation steps; 0 disables the solver.
    pub nevery: u64,
    /// Temperature [K].
    pub temperature: f64,
    /// Ideal gas constant [kJ/(mol*K)].
    pub gas_constant: f64,
    /// Gas transfer volume.
    pub gas_volume: f64,
    /// Gas transfer coefficient.
    pub gas_transfer: f64,
    /// pH used by the built-in speciation and at initialization.
    pub initial_ph: f64,
    /// Diffusion sub-step size.
    pub diffusion_dt: f64,
    /// Iteration ceiling of the nonlinear loop.
    pub max_iterations: usize,
    pub unit: Unit,
}

impl Default for KineticsConfig {
    fn default() -> Self {
        Self {
            nevery: 1,
            temperature: 298.15,
            gas_constant: 0.0083144,
            gas_volume: 0.1,
            gas_transfer: 0.0,
            initial_ph: 7.0,
            diffusion_dt: 1e-4,
            max_iterations: MAX_ITERATIONS,
            unit: Unit::Molar,
        }
    }
}

impl KineticsConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.temperature > 0.0) {
            return Err(ConfigError::invalid("temperature", format!("must be positive, got {}", self.temperature)).into());
        }
        if !(self.gas_constant > 0.0) {
            return Err(ConfigError::invalid("gas_constant", format!("must be positive, got {}", self.gas_constant)).into());
        }
        if !(self.diffusion_dt > 0.0) {
            return Err(ConfigError::invalid("diffusion_dt", format!("must be positive, got {}", self.diffusion_dt)).into());
        }
        if !self.initial_ph.is_finite() {
            return Err(ConfigError::invalid("initial_ph", "must be finite").into());
        }
        Ok(())
    }
}

/// Well-mixed bulk reactor feeding the top boundary.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BulkReactor {
    /// Volumetric inflow rate.
    pub flow_rate: f64,
    pub reactor_volume: f64,
    /// Biofilm area exchanging mass with the reactor.
    pub exchange_area: f64,
}

impl BulkReactor {
    /// Reservoir updates run only when both control parameters are non-negative.
    pub fn is_active(&self) -> bool {
        self.flow_rate >= 0.0 && self.exchange_area >= 0.0
    }
}

/// Runtime parameters of the diffusion-reaction solver.
#[derive(Debug, Clone)]
pub struct DiffusionConfig {
    pub boundaries: BoundarySet,
    /// Relative convergence tolerance.
    pub tolerance: f64,
    /// Shear (advection) rate; 0 disables the correction.
    pub shear_rate: f64,
    pub reactor: Option<BulkReactor>,
    /// Species whose reservoir value is never updated (instantaneous equilibrium).
    pub bulk_exempt: Vec<String>,
}

impl Default for DiffusionConfig {
    fn default() -> Self {
        Self {
            boundaries: BoundarySet::default(),
            tolerance: 1e-6,
            shear_rate: 0.0,
            reactor: None,
            bulk_exempt: vec!["o2".to_string()],
        }
    }
}

impl DiffusionConfig {
    pub fn new(boundaries: BoundarySet) -> Self {
        Self {
            boundaries,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.tolerance > 0.0) {
            return Err(ConfigError::invalid("tolerance", format!("must be positive, got {}", self.tolerance)).into());
        }
        Ok(())
    }
}
