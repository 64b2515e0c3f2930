//! Reaction-diffusion kinetics on a uniform grid laid over the particle domain.
//!
//! A [`KineticsOrchestrator`] iterates speciation, thermodynamics, growth and
//! diffusion until every species has converged. Diffusion is an explicit
//! finite-difference update on a [`GridPartition`] padded with one ghost layer;
//! ghosts are filled either by the halo exchange between workers or by the
//! boundary stage, and the bulk reservoir feeds the top boundary.
//!
//! Concentrations live in [`KineticsState`] as 2-D arrays indexed
//! `[species, cell]`, with species numbered from 1.

pub mod boundary;
pub mod bulk;
pub mod comm;
pub mod config;
pub mod diffusion;
pub mod error;
pub mod gas_liquid;
pub mod grid;
pub mod halo;
pub mod height;
pub mod module;
pub mod orchestrator;
pub mod speciation;
pub mod species;
pub mod state;

pub use boundary::{AxisBoundary, BoundarySet};
pub use comm::{Communicator, LocalCluster, SingleWorker};
pub use config::{BulkReactor, DiffusionConfig, KineticsConfig, Unit};
pub use diffusion::DiffusionSolver;
pub use error::ConfigError;
pub use grid::{Decomposition, GridPartition};
pub use module::{BiofilmHeightModule, KineticsModule};
pub use orchestrator::{Convergence, KineticsOrchestrator, SolveReport};
pub use species::{FaceValues, Phase, Species, SpeciesTable};
pub use state::KineticsState;
