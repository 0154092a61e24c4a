//! Event generators.
pub mod phase_space;

pub use phase_space::{DecayConfig, PhaseSpace, Weighting};
