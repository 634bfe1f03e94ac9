//! Eviction planning and execution.

pub mod executor;
pub mod planner;

pub use executor::{EvictionExecutor, EvictionFailure, EvictionReport};
pub use planner::{EvictionPlan, plan};
