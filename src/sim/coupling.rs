//! Payloads exchanged between kinetics-related modules via the
//! [`crate::sim::framework::Bus`].
//!
//! Concentrations are reported in the state's unit system, i.e. already scaled
//! by the configured unit factor.

use crate::sim::kinetics::height::Particle;
use crate::sim::kinetics::orchestrator::SolveReport;

/// Particles owned by this worker at the current step.
#[derive(Debug, Clone, Default)]
pub struct ParticleSnapshot(pub Vec<Particle>);

/// Requested number of active grid layers counted from the bottom.
///
/// Taken (consumed) by the kinetics module; applied on the next solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveLayers(pub usize);

/// Mean biofilm height from the last height estimate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BiofilmHeight(pub f64);

/// Outcome of the last kinetics solve, with the step it ran on.
#[derive(Debug, Clone, PartialEq)]
pub struct KineticsReport {
    pub step: u64,
    pub report: SolveReport,
}

/// Bulk (reservoir) concentration of every species, keyed by species name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BulkConcentrations {
    pub by_species: Vec<(String, f64)>,
}

impl BulkConcentrations {
    pub fn get(&self, name: &str) -> Option<f64> {
        self.by_species
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| *v)
    }
}
