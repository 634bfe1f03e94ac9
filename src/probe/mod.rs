//! Filesystem size probing.

pub mod measure;

pub use measure::{DirectoryMeasurement, FileCandidate, measure};
