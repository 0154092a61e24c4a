//! Storage for weighted decays with a single chain.
use crate::backend::{Backend, Buffer, Sequential};
use crate::error::StorageError;
use crate::estimators::{SampleEstimators, WeightedEstimators};
use crate::histograms::{HistogramEstimators, HistogramSpecification};
use crate::kinematics::{Particles, Vector4};
use crate::random::CounterEngine;
use std::iter::Zip;
use std::slice;
use tracing::debug;

/// Weighted decays of one mother into `N` daughters, stored as a weight column and a column of
/// daughter arrays living on the backend `B`.
///
/// Both columns always have the same length. Iteration yields `(weight, daughters)` pairs
/// without copying.
#[derive(Clone, Debug)]
pub struct Decays<const N: usize, B: Backend = Sequential> {
    backend: B,
    weights: B::Buffer<f64>,
    particles: B::Buffer<Particles<N>>,
}

impl<const N: usize, B: Backend> Default for Decays<N, B> {
    fn default() -> Self {
        Self::new(B::default())
    }
}

impl<const N: usize, B: Backend> Decays<N, B> {
    /// Creates empty storage on `backend`.
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            weights: Default::default(),
            particles: Default::default(),
        }
    }

    /// Creates storage with `len` default-initialised events.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Allocation`] if the columns cannot be allocated.
    pub fn with_len(backend: B, len: usize) -> Result<Self, StorageError> {
        let mut decays = Self::new(backend);
        decays.resize(len)?;
        Ok(decays)
    }

    /// Returns the backend.
    pub const fn backend(&self) -> &B {
        &self.backend
    }

    /// Number of events.
    pub fn len(&self) -> usize {
        self.weights.len()
    }

    /// Whether there are no events.
    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    /// Number of events the storage can hold without reallocating any column.
    pub fn capacity(&self) -> usize {
        self.weights.capacity().min(self.particles.capacity())
    }

    /// Makes sure every column can hold `capacity` events without reallocating.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Allocation`] if a column cannot grow. The length is unchanged.
    pub fn reserve(&mut self, capacity: usize) -> Result<(), StorageError> {
        let allocation = |source| StorageError::Allocation {
            requested: capacity,
            source,
        };
        self.weights.try_reserve_len(capacity).map_err(allocation)?;
        self.particles.try_reserve_len(capacity).map_err(allocation)?;
        Ok(())
    }

    /// Resizes every column to `len`. New events have weight zero and default daughters;
    /// shrinking keeps the first `len` events.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Allocation`] if a column cannot grow. In that case no column
    /// length has changed.
    pub fn resize(&mut self, len: usize) -> Result<(), StorageError> {
        self.reserve(len)?;
        self.weights.resize_default(len);
        self.particles.resize_default(len);
        debug!(len, backend = self.backend.name(), "resized decays");
        Ok(())
    }

    /// Removes all events.
    pub fn clear(&mut self) {
        self.weights.clear();
        self.particles.clear();
    }

    /// Releases unused capacity of every column.
    pub fn shrink_to_fit(&mut self) {
        self.weights.shrink_to_fit();
        self.particles.shrink_to_fit();
    }

    /// The weight column.
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// The weight column, mutably.
    pub fn weights_mut(&mut self) -> &mut [f64] {
        &mut self.weights
    }

    /// The daughter column.
    pub fn particles(&self) -> &[Particles<N>] {
        &self.particles
    }

    /// The daughter column, mutably.
    pub fn particles_mut(&mut self) -> &mut [Particles<N>] {
        &mut self.particles
    }

    /// Both columns.
    pub fn columns(&self) -> (&[f64], &[Particles<N>]) {
        (&self.weights, &self.particles)
    }

    /// Both columns, mutably.
    pub fn columns_mut(&mut self) -> (&mut [f64], &mut [Particles<N>]) {
        (&mut self.weights, &mut self.particles)
    }

    /// The backend together with both mutable columns.
    pub fn parts_mut(&mut self) -> (&B, &mut [f64], &mut [Particles<N>]) {
        (&self.backend, &mut self.weights, &mut self.particles)
    }

    /// Iterates over the four-momenta of daughter `index` of every event.
    ///
    /// # Panics
    ///
    /// Panics if `index >= N`.
    pub fn daughters(
        &self,
        index: usize,
    ) -> impl DoubleEndedIterator<Item = &Vector4> + ExactSizeIterator + '_ {
        assert!(index < N, "daughter index {index} out of range for {N} daughters");
        self.particles.iter().map(move |particles| &particles[index])
    }

    /// Returns event `index`, or `None` if it is out of range.
    pub fn get(&self, index: usize) -> Option<(&f64, &Particles<N>)> {
        Some((self.weights.get(index)?, self.particles.get(index)?))
    }

    /// Returns event `index` mutably, or `None` if it is out of range.
    pub fn get_mut(&mut self, index: usize) -> Option<(&mut f64, &mut Particles<N>)> {
        Some((self.weights.get_mut(index)?, self.particles.get_mut(index)?))
    }

    /// Returns event `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of range.
    pub fn event(&self, index: usize) -> (&f64, &Particles<N>) {
        (&self.weights[index], &self.particles[index])
    }

    /// Iterates over `(weight, daughters)`.
    pub fn iter(&self) -> Zip<slice::Iter<'_, f64>, slice::Iter<'_, Particles<N>>> {
        self.weights.iter().zip(self.particles.iter())
    }

    /// Iterates mutably over `(weight, daughters)`.
    pub fn iter_mut(&mut self) -> Zip<slice::IterMut<'_, f64>, slice::IterMut<'_, Particles<N>>> {
        self.weights.iter_mut().zip(self.particles.iter_mut())
    }

    /// Copies the events element by element into storage on `backend`.
    pub fn to_backend<B2: Backend>(&self, backend: B2) -> Decays<N, B2> {
        Decays {
            backend,
            weights: self.weights.iter().copied().collect(),
            particles: self.particles.iter().copied().collect(),
        }
    }

    /// Estimators of the weights.
    pub fn weight_estimators(&self) -> SampleEstimators<f64> {
        self.backend.fold_rows(
            &self.weights[..],
            SampleEstimators::default,
            |mut acc, _, &weight| {
                acc.push(weight);
                acc
            },
            |a, b| a + b,
        )
    }

    /// Weighted mean and variance of `functor` over all stored events.
    pub fn average_on<F>(&self, functor: F) -> WeightedEstimators<f64>
    where
        F: Fn(&Particles<N>) -> f64 + Sync,
    {
        self.backend.fold_rows(
            (&self.weights[..], &self.particles[..]),
            WeightedEstimators::default,
            |mut acc, _, (&weight, particles)| {
                acc.push(weight, functor(particles));
                acc
            },
            |a, b| a + b,
        )
    }

    /// Fills the `D`-dimensional histogram `specification` with the weights of all events,
    /// binned by `observable`.
    pub fn histogram<const D: usize, F>(
        &self,
        specification: &HistogramSpecification<f64>,
        observable: F,
    ) -> HistogramEstimators<f64>
    where
        F: Fn(&Particles<N>) -> [f64; D] + Sync,
    {
        debug_assert_eq!(specification.dimensions(), D);

        self.backend
            .fold_rows(
                (&self.weights[..], &self.particles[..]),
                || specification.accumulator(),
                |mut acc, _, (&weight, particles)| {
                    acc.fill(&observable(particles), weight);
                    acc
                },
                |a, b| a + b,
            )
            .to_histogram_estimators(self.len())
    }

    /// Accept-reject unweighting. Event `i` is accepted if $u_i \cdot w_\mathrm{max} < w_i$,
    /// where $u_i$ is the first uniform number of the engine `E` positioned for event `i` of the
    /// stream `seed`. Accepted events are moved to the front, keeping their order, and their
    /// number is returned. Weights are left unchanged.
    ///
    /// If `max_weight` is `None` the largest finite weight in the storage is used.
    pub fn unweight<E: CounterEngine>(&mut self, seed: u64, max_weight: Option<f64>) -> usize {
        let max_weight = max_weight.unwrap_or_else(|| {
            self.weights
                .iter()
                .copied()
                .filter(|w| w.is_finite())
                .fold(0.0, f64::max)
        });

        let engine = E::with_seed(seed);
        let mut accepted = vec![false; self.len()];

        self.backend.for_each_row(
            (&mut accepted[..], &self.weights[..]),
            |index, (accept, &weight)| {
                let mut engine = engine.clone();
                engine.discard(index as u64 * E::WORDS_PER_F64);
                *accept = engine.uniform_f64() * max_weight < weight;
            },
        );

        let mut front = 0;
        for (index, accept) in accepted.into_iter().enumerate() {
            if accept {
                self.weights.swap(front, index);
                self.particles.swap(front, index);
                front += 1;
            }
        }

        debug!(accepted = front, events = self.len(), max_weight, "unweighted decays");

        front
    }
}

impl<'a, const N: usize, B: Backend> IntoIterator for &'a Decays<N, B> {
    type Item = (&'a f64, &'a Particles<N>);
    type IntoIter = Zip<slice::Iter<'a, f64>, slice::Iter<'a, Particles<N>>>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a, const N: usize, B: Backend> IntoIterator for &'a mut Decays<N, B> {
    type Item = (&'a mut f64, &'a mut Particles<N>);
    type IntoIter = Zip<slice::IterMut<'a, f64>, slice::IterMut<'a, Particles<N>>>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter_mut()
    }
}

impl<const N: usize, B1: Backend, B2: Backend> From<&Decays<N, B1>> for Decays<N, B2> {
    fn from(decays: &Decays<N, B1>) -> Self {
        decays.to_backend(B2::default())
    }
}

impl<const N: usize, B: Backend> Extend<(f64, Particles<N>)> for Decays<N, B> {
    fn extend<I: IntoIterator<Item = (f64, Particles<N>)>>(&mut self, iter: I) {
        let iter = iter.into_iter();
        // the pushes grow the columns if the hint cannot be reserved
        let _ = self.reserve(self.len().saturating_add(iter.size_hint().0));
        for (weight, particles) in iter {
            self.weights.push(weight);
            self.particles.push(particles);
        }
    }
}
