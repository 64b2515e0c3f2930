pub mod geom;
pub mod io;
pub mod sim;

// Prelude
pub use geom::bounds::{Axis, Bounds, DomainGeometry};
pub use geom::point::Point;
pub use sim::kinetics::{
    ConfigError, Convergence, DiffusionConfig, KineticsConfig, KineticsOrchestrator, SolveReport,
};
