//! Step-driven module runtime.
//!
//! The kinetics solver and its helpers run as [`SimModule`]s inside a
//! [`Pipeline`]; they never call each other directly but exchange typed
//! payloads through the [`Bus`].

pub mod bus;
pub mod context;
pub mod module;
pub mod pipeline;

pub use bus::Bus;
pub use context::SimContext;
pub use module::SimModule;
pub use pipeline::Pipeline;
