#![warn(clippy::all, clippy::cargo, clippy::nursery, clippy::pedantic)]
#![warn(missing_docs)]

//! The crate `genbod` generates weighted [phase-space] events for the decay of a mother particle
//! into $N$ daughters, following the GENBOD algorithm of F. James. Events are stored in
//! structure-of-arrays containers that can hold several decay chains per event, and all work on
//! them is distributed by an exchangeable execution backend.
//!
//! # Features
//!
//! This library was designed with the following features as essential in mind:
//!
//! - **Counter-based random numbers**. The engines in [`random`] (Squares3, Squares4 and
//! RANLUX++) are functions of a seed and a position. Skipping ahead is cheap, so every event owns
//! a disjoint, fixed block of the random stream.
//! - **Reproducibility**. As a consequence, event $i$ is the same no matter which thread
//! generates it, how many threads there are or in which order the events are produced. The
//! sequential backend and all parallel backends produce bit-identical events.
//! - **Exchangeable backends**. Containers and generators are generic over a [`Backend`]:
//! [`Sequential`], [`Threads`] (scoped threads with balanced contiguous chunks) and [`Rayon`]
//! (recursive work stealing).
//! - **Zipped storage**. [`Decays`] and [`Chains`] keep weights and daughters in separate columns
//! but hand them out as zipped rows, so that iteration yields `(weight, daughters)` without
//! copying.
//! - **Cascades**. A daughter of one chain can be decayed further into the next chain of the
//! same container, multiplying the weights.
//! - **Non-finite number filtering**. The estimators count non-finite weights and events with
//! zero weight separately, which gives the efficiency of a sample.
//! - **Batches**. Long runs can be split into batches with a [`Callback`] after each batch, which
//! can log progress or stop the generation early.
//!
//! # What is ...?
//!
//! Given a mother with four-momentum $P$ and mass $M$ decaying into daughters with masses
//! $m_0, \ldots, m_{N-1}$, the GENBOD algorithm generates the daughter four-momenta $p_i$ with
//! $\sum_i p_i = P$ and $p_i^2 = m_i^2$, together with a weight
//!
//! $$ w = w_\mathrm{max} \prod_{n=0}^{N-2} \mathrm{pdk}(M_{n+1}, M_n, m_{n+1}) $$
//!
//! where the $M_n$ are the invariant masses of the intermediate systems and $\mathrm{pdk}$ is
//! the two-body breakup momentum. We use the following terms:
//!
//! - an *event* is one set of daughters together with its weight,
//! - a *chain* is one decay step, i.e. one column of daughters in a container,
//! - the *backend* decides where the columns live and how work on them is distributed,
//! - the *stride* is the number of engine words every event consumes,
//! - *unweighting* turns weighted events into events with unit weight by accept-reject.
//!
//! [phase-space]: https://en.wikipedia.org/wiki/Phase_space

pub mod backend;
pub mod callbacks;
pub mod chains;
pub mod decays;
pub mod error;
pub mod estimators;
pub mod generators;
pub mod histograms;
pub mod kinematics;
pub mod random;

pub use backend::{Backend, Rayon, Sequential, Threads};
pub use callbacks::{BatchReport, Callback};
pub use chains::Chains;
pub use decays::Decays;
pub use error::{ConfigError, Error, Result, StorageError};
pub use generators::{DecayConfig, PhaseSpace, Weighting};
pub use kinematics::{Particles, Vector3, Vector4};
pub use random::{CounterEngine, Ranluxpp, Squares3, Squares4};
