//! Configuration management.

pub mod settings;

pub use settings::{Paths, ScanSettings};
