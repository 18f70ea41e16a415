//! External collaborators of the scheduler core: random process shaping,
//! the fixed-budget simulation harness, and snapshot tracing.

pub mod factory;
pub mod sim;
pub mod trace;

pub use factory::{ProcessFactory, RoleCounts};
pub use sim::{SimConfig, SimSummary, Simulation};
