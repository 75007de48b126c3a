//! Distributed test scenarios, run under `mpirun`.
//!
//! Unit tests of the sequential building blocks live in the `wavelet`
//! crate; everything that needs more than one worker is asserted here.

/// Deterministic input generation.
pub mod data;

/// Stable distributed sort scenarios.
pub mod sorting;

/// Construction strategy agreement and round-trip scenarios.
pub mod strategies;
