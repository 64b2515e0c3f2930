pub mod coupling;
pub mod framework;
pub mod kinetics;
