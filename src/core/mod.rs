//! Core primitives: configuration, errors, byte-size parsing.

pub mod bytesize;
pub mod config;
pub mod errors;
