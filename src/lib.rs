#![forbid(unsafe_code)]

//! dircap — keeps watched directories under their size budgets.
//!
//! A small daemon plus CLI: directories are registered with a byte budget,
//! and a periodic monitor cycle measures each one and evicts files
//! (oldest-first by default) until it fits again.
//!
//! # Library usage
//!
//! Use the [`prelude`] for convenient access to the most common types:
//!
//! ```rust,no_run
//! use dircap::prelude::*;
//! ```
//!
//! Individual modules can also be imported directly:
//!
//! ```rust,no_run
//! use dircap::core::config::Config;
//! use dircap::registry::{EvictionPolicy, Registry};
//! ```

pub mod prelude;

pub mod core;
#[cfg(feature = "daemon")]
pub mod daemon;
pub mod evict;
pub mod logger;
pub mod probe;
pub mod registry;
