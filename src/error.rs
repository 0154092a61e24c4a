//! Error types.
//!
//! Configuration problems are detected once, when a generator or engine is constructed, and
//! reported as [`ConfigError`]. Allocation failures of the storage containers are reported as
//! [`StorageError`]. Nothing in the per-event path returns an error.

use std::collections::TryReserveError;
use thiserror::Error;

/// Errors detected while constructing a generator or an engine.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum ConfigError {
    /// A decay needs at least two daughters.
    #[error("a decay needs at least two daughters, got {0}")]
    TooFewDaughters(usize),

    /// A daughter mass is negative or not finite.
    #[error("mass of daughter {index} is invalid: {mass}")]
    InvalidMass {
        /// Position of the daughter.
        index: usize,
        /// The offending mass.
        mass: f64,
    },

    /// The mother four-momentum is not time-like with positive energy.
    #[error("mother four-momentum ({0}, {1}, {2}, {3}) is not time-like with positive energy")]
    InvalidMother(f64, f64, f64, f64),

    /// The daughters are too heavy for the mother. A decay exactly at threshold is rejected as
    /// well: its phase space has zero volume and the weight normalisation would be infinite.
    #[error("sum of daughter masses {daughters} leaves no phase space for mother mass {mother}")]
    MassesExceedMother {
        /// Invariant mass of the mother.
        mother: f64,
        /// Sum of the daughter masses.
        daughters: f64,
    },

    /// A configuration lists a different number of daughters than the generator expects.
    #[error("expected {expected} daughter masses, got {found}")]
    DaughterCount {
        /// Number of daughters of the generator.
        expected: usize,
        /// Number of masses in the configuration.
        found: usize,
    },

    /// The exponent of the RANLUX++ multiplier is too small to decorrelate the output.
    #[error("the RANLUX++ exponent must be at least 24, got {0}")]
    InvalidExponent(u64),
}

/// Errors raised by the storage containers.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StorageError {
    /// Growing the columns failed. No column length was changed.
    #[error("failed to allocate storage for {requested} events")]
    Allocation {
        /// The requested number of events.
        requested: usize,
        /// The error of the column that failed first.
        #[source]
        source: TryReserveError,
    },
}

/// Any error produced by this crate.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum Error {
    /// See [`ConfigError`].
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// See [`StorageError`].
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Shorthand for results with the crate's [`Error`].
pub type Result<T, E = Error> = std::result::Result<T, E>;
