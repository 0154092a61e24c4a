//! Storage for weighted events with several decay chains.
//!
//! A [`Chains`] container holds one weight column and one column per decay chain. The chains
//! are given as a tuple of record types, usually [`Particles`](crate::kinematics::Particles)
//! arrays of different sizes, for instance `(Particles<3>, Particles<2>)` for a decay
//! $B \to J/\psi K \pi$ followed by $J/\psi \to \mu \mu$.

use crate::backend::{Backend, Buffer, Element, Rows, Sequential};
use crate::error::StorageError;
use crate::estimators::{SampleEstimators, WeightedEstimators};
use std::collections::TryReserveError;
use std::fmt::Debug;
use std::iter::Zip;
use std::slice;
use tracing::debug;

/// A tuple of chain record types. Implemented for tuples of one to four [`Element`]s.
pub trait ChainRecords: Element {
    /// Number of chains.
    const CHAINS: usize;

    /// One column per chain.
    type Columns<B: Backend>: Clone + Debug + Default + Send + Sync;

    /// Shared slices of all columns, which zip into rows of references.
    type Slices<'a>: Rows
    where
        Self: 'a;

    /// Mutable slices of all columns.
    type SlicesMut<'a>: Rows
    where
        Self: 'a;

    /// Length of every column, in chain order.
    fn lens<B: Backend>(columns: &Self::Columns<B>) -> Vec<usize>;

    /// Smallest capacity of all columns.
    fn capacity<B: Backend>(columns: &Self::Columns<B>) -> usize;

    /// Reserves room for `len` records in every column, without changing any length.
    ///
    /// # Errors
    ///
    /// Returns the error of the first column that could not grow.
    fn try_reserve_len<B: Backend>(
        columns: &mut Self::Columns<B>,
        len: usize,
    ) -> Result<(), TryReserveError>;

    /// Resizes every column, filling new slots with default records.
    fn resize<B: Backend>(columns: &mut Self::Columns<B>, len: usize);

    /// Clears every column.
    fn clear<B: Backend>(columns: &mut Self::Columns<B>);

    /// Shrinks every column.
    fn shrink_to_fit<B: Backend>(columns: &mut Self::Columns<B>);

    /// Borrows every column.
    fn slices<B: Backend>(columns: &Self::Columns<B>) -> Self::Slices<'_>;

    /// Borrows every column mutably.
    fn slices_mut<B: Backend>(columns: &mut Self::Columns<B>) -> Self::SlicesMut<'_>;

    /// Copies every column element-wise to another backend.
    fn transfer<B1: Backend, B2: Backend>(columns: &Self::Columns<B1>) -> Self::Columns<B2>;
}

macro_rules! impl_chain_records {
    ($chains:expr; $($name:ident $idx:tt),+) => {
        impl<$($name: Element),+> ChainRecords for ($($name,)+) {
            const CHAINS: usize = $chains;

            type Columns<B: Backend> = ($(B::Buffer<$name>,)+);
            type Slices<'a> = ($(&'a [$name],)+) where Self: 'a;
            type SlicesMut<'a> = ($(&'a mut [$name],)+) where Self: 'a;

            fn lens<B: Backend>(columns: &Self::Columns<B>) -> Vec<usize> {
                vec![$(columns.$idx.len()),+]
            }

            fn capacity<B: Backend>(columns: &Self::Columns<B>) -> usize {
                let mut capacity = usize::MAX;
                $(capacity = capacity.min(columns.$idx.capacity());)+
                capacity
            }

            fn try_reserve_len<B: Backend>(
                columns: &mut Self::Columns<B>,
                len: usize,
            ) -> Result<(), TryReserveError> {
                $(columns.$idx.try_reserve_len(len)?;)+
                Ok(())
            }

            fn resize<B: Backend>(columns: &mut Self::Columns<B>, len: usize) {
                $(columns.$idx.resize_default(len);)+
            }

            fn clear<B: Backend>(columns: &mut Self::Columns<B>) {
                $(columns.$idx.clear();)+
            }

            fn shrink_to_fit<B: Backend>(columns: &mut Self::Columns<B>) {
                $(columns.$idx.shrink_to_fit();)+
            }

            fn slices<B: Backend>(columns: &Self::Columns<B>) -> Self::Slices<'_> {
                ($(&columns.$idx[..],)+)
            }

            fn slices_mut<B: Backend>(columns: &mut Self::Columns<B>) -> Self::SlicesMut<'_> {
                ($(&mut columns.$idx[..],)+)
            }

            fn transfer<B1: Backend, B2: Backend>(
                columns: &Self::Columns<B1>,
            ) -> Self::Columns<B2> {
                ($(columns.$idx.iter().cloned().collect(),)+)
            }
        }
    };
}

impl_chain_records!(1; T0 0);
impl_chain_records!(2; T0 0, T1 1);
impl_chain_records!(3; T0 0, T1 1, T2 2);
impl_chain_records!(4; T0 0, T1 1, T2 2, T3 3);

/// Row of references to the records of one event.
pub type Records<'a, C> = <<C as ChainRecords>::Slices<'a> as Rows>::Row;

/// Row of mutable references to the records of one event.
pub type RecordsMut<'a, C> = <<C as ChainRecords>::SlicesMut<'a> as Rows>::Row;

/// Iterator over `(weight, records)` of a [`Chains`] container.
pub type Iter<'a, C> = Zip<slice::Iter<'a, f64>, <<C as ChainRecords>::Slices<'a> as Rows>::Iter>;

/// Mutable iterator over `(weight, records)` of a [`Chains`] container.
pub type IterMut<'a, C> =
    Zip<slice::IterMut<'a, f64>, <<C as ChainRecords>::SlicesMut<'a> as Rows>::Iter>;

/// Weighted events with one record per decay chain, stored column-wise on the backend `B`.
///
/// All columns always have the same length. Iteration presents every event as a pair of its
/// weight and a tuple of references to its records, without copying.
#[derive(Clone, Debug)]
pub struct Chains<C: ChainRecords, B: Backend = Sequential> {
    backend: B,
    weights: B::Buffer<f64>,
    columns: C::Columns<B>,
}

impl<C: ChainRecords, B: Backend> Default for Chains<C, B> {
    fn default() -> Self {
        Self::new(B::default())
    }
}

impl<C: ChainRecords, B: Backend> Chains<C, B> {
    /// Number of decay chains.
    pub const CHAINS: usize = C::CHAINS;

    /// Creates empty storage on `backend`.
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            weights: Default::default(),
            columns: Default::default(),
        }
    }

    /// Creates storage with `len` default-initialised events.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Allocation`] if the columns cannot be allocated.
    pub fn with_len(backend: B, len: usize) -> Result<Self, StorageError> {
        let mut chains = Self::new(backend);
        chains.resize(len)?;
        Ok(chains)
    }

    /// Returns the backend.
    pub const fn backend(&self) -> &B {
        &self.backend
    }

    /// Number of events.
    pub fn len(&self) -> usize {
        debug_assert!(C::lens(&self.columns)
            .into_iter()
            .all(|len| len == self.weights.len()));
        self.weights.len()
    }

    /// Whether there are no events.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of events the storage can hold without reallocating any column.
    pub fn capacity(&self) -> usize {
        self.weights.capacity().min(C::capacity(&self.columns))
    }

    /// Makes sure every column can hold `capacity` events without reallocating.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Allocation`] if a column cannot grow. The length is unchanged.
    pub fn reserve(&mut self, capacity: usize) -> Result<(), StorageError> {
        self.weights
            .try_reserve_len(capacity)
            .and_then(|()| C::try_reserve_len(&mut self.columns, capacity))
            .map_err(|source| StorageError::Allocation {
                requested: capacity,
                source,
            })
    }

    /// Resizes all columns to `len`. New events have weight zero and default records;
    /// shrinking keeps the first `len` events.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Allocation`] if a column cannot grow. In that case no column
    /// length has changed.
    pub fn resize(&mut self, len: usize) -> Result<(), StorageError> {
        self.reserve(len)?;
        self.weights.resize_default(len);
        C::resize(&mut self.columns, len);
        debug!(
            len,
            chains = C::CHAINS,
            backend = self.backend.name(),
            "resized chains"
        );
        Ok(())
    }

    /// Removes all events.
    pub fn clear(&mut self) {
        self.weights.clear();
        C::clear(&mut self.columns);
    }

    /// Releases unused capacity of every column.
    pub fn shrink_to_fit(&mut self) {
        self.weights.shrink_to_fit();
        C::shrink_to_fit(&mut self.columns);
    }

    /// The weight column.
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// The weight column, mutably.
    pub fn weights_mut(&mut self) -> &mut [f64] {
        &mut self.weights
    }

    /// The chain columns as a tuple of slices.
    pub fn columns(&self) -> C::Slices<'_> {
        C::slices(&self.columns)
    }

    /// The weight column and the chain columns, mutably.
    pub fn columns_mut(&mut self) -> (&mut [f64], C::SlicesMut<'_>) {
        (&mut self.weights, C::slices_mut(&mut self.columns))
    }

    /// The backend together with all mutable columns, so that generators can fill the
    /// columns on the backend of this container.
    pub fn parts_mut(&mut self) -> (&B, &mut [f64], C::SlicesMut<'_>) {
        (
            &self.backend,
            &mut self.weights,
            C::slices_mut(&mut self.columns),
        )
    }

    /// Returns event `index`, or `None` if it is out of range.
    pub fn get(&self, index: usize) -> Option<(&f64, Records<'_, C>)> {
        let weight = self.weights.get(index)?;
        let (_, tail) = self.columns().split_at(index);
        Some((weight, tail.into_rows().next()?))
    }

    /// Returns event `index` mutably, or `None` if it is out of range.
    pub fn get_mut(&mut self, index: usize) -> Option<(&mut f64, RecordsMut<'_, C>)> {
        if index >= self.len() {
            return None;
        }
        let (weights, columns) = self.columns_mut();
        let (_, tail) = columns.split_at(index);
        Some((&mut weights[index], tail.into_rows().next()?))
    }

    /// Returns event `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of range.
    pub fn event(&self, index: usize) -> (&f64, Records<'_, C>) {
        let len = self.len();
        self.get(index)
            .unwrap_or_else(|| panic!("event index {index} out of range for {len} events"))
    }

    /// Iterates over `(weight, records)`.
    pub fn iter(&self) -> Iter<'_, C> {
        self.weights.iter().zip(self.columns().into_rows())
    }

    /// Iterates mutably over `(weight, records)`.
    pub fn iter_mut(&mut self) -> IterMut<'_, C> {
        let (weights, columns) = self.columns_mut();
        weights.iter_mut().zip(columns.into_rows())
    }

    /// Copies the events element by element into storage on `backend`.
    pub fn to_backend<B2: Backend>(&self, backend: B2) -> Chains<C, B2> {
        Chains {
            backend,
            weights: self.weights.iter().copied().collect(),
            columns: C::transfer::<B, B2>(&self.columns),
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
        F: for<'a> Fn(Records<'a, C>) -> f64 + Sync,
    {
        self.backend.fold_rows(
            (&self.weights[..], self.columns()),
            WeightedEstimators::default,
            |mut acc, _, (&weight, records)| {
                acc.push(weight, functor(records));
                acc
            },
            |a, b| a + b,
        )
    }
}

impl<'a, C: ChainRecords, B: Backend> IntoIterator for &'a Chains<C, B> {
    type Item = (&'a f64, Records<'a, C>);
    type IntoIter = Iter<'a, C>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a, C: ChainRecords, B: Backend> IntoIterator for &'a mut Chains<C, B> {
    type Item = (&'a mut f64, RecordsMut<'a, C>);
    type IntoIter = IterMut<'a, C>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter_mut()
    }
}

impl<C: ChainRecords, B1: Backend, B2: Backend> From<&Chains<C, B1>> for Chains<C, B2> {
    fn from(chains: &Chains<C, B1>) -> Self {
        chains.to_backend(B2::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{Rayon, Threads};
    use crate::estimators::{BasicEstimators, Estimators};
    use crate::kinematics::{Particles, Vector4};

    type Cascade = (Particles<3>, Particles<2>);

    fn sample() -> Chains<Cascade> {
        let mut chains: Chains<Cascade> = Chains::with_len(Sequential, 6).unwrap();
        for (i, (w, (a, b))) in chains.iter_mut().enumerate() {
            let x = i as f64;
            *w = 1.0 + x;
            a[0] = Vector4::at_rest(x);
            b[1] = Vector4::new(0.0, 0.0, 0.0, x);
        }
        chains
    }

    #[test]
    fn resize_applies_to_every_column() {
        let mut chains: Chains<(f64, u32, Particles<2>)> = Chains::default();
        assert_eq!(<Chains<(f64, u32, Particles<2>)>>::CHAINS, 3);
        assert!(chains.is_empty());

        chains.resize(7).unwrap();
        assert_eq!(chains.len(), 7);
        let (a, b, c) = chains.columns();
        assert_eq!((a.len(), b.len(), c.len()), (7, 7, 7));
        assert!(chains.capacity() >= 7);

        chains.reserve(50).unwrap();
        assert!(chains.capacity() >= 50);
        assert_eq!(chains.len(), 7);

        chains.resize(3).unwrap();
        assert_eq!(chains.weights().len(), 3);
        assert_eq!(chains.columns().2.len(), 3);

        chains.clear();
        chains.shrink_to_fit();
        assert_eq!(chains.len(), 0);
    }

    #[test]
    fn failed_resize_changes_nothing() {
        let mut chains = sample();
        let err = chains.resize(usize::MAX / 2).unwrap_err();
        assert!(matches!(err, StorageError::Allocation { .. }));
        assert_eq!(chains.len(), 6);
        let (a, b) = chains.columns();
        assert_eq!((a.len(), b.len()), (6, 6));
    }

    #[test]
    fn zipped_iteration_matches_columns() {
        let chains = sample();
        let (a, b) = chains.columns();

        for (i, (w, (ra, rb))) in chains.iter().enumerate() {
            assert_eq!(*w, chains.weights()[i]);
            assert!(std::ptr::eq(ra, &a[i]));
            assert!(std::ptr::eq(rb, &b[i]));
            assert_eq!(chains.event(i), (w, (ra, rb)));
        }

        let reversed: Vec<f64> = chains.iter().rev().map(|(w, _)| *w).collect();
        assert_eq!(reversed, [6.0, 5.0, 4.0, 3.0, 2.0, 1.0]);
        assert_eq!(chains.iter().len(), 6);
        assert_eq!((&chains).into_iter().count(), 6);

        assert!(chains.get(6).is_none());
        let (_, (ra, _)) = chains.get(2).unwrap();
        assert_eq!(ra[0].e(), 2.0);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn event_out_of_range_panics() {
        let _ = sample().event(6);
    }

    #[test]
    fn mutable_access() {
        let mut chains = sample();
        {
            let (w, (_, b)) = chains.get_mut(4).unwrap();
            *w = -1.0;
            b[0] = Vector4::at_rest(9.0);
        }
        assert_eq!(chains.weights()[4], -1.0);
        assert_eq!(chains.columns().1[4][0].e(), 9.0);
        assert!(chains.get_mut(6).is_none());

        for (w, _) in &mut chains {
            *w = 0.5;
        }
        assert!(chains.weights().iter().all(|&w| w == 0.5));
    }

    #[test]
    fn cross_backend_round_trip() {
        let chains = sample();
        let threads: Chains<Cascade, Threads> = chains.to_backend(Threads::new(2));
        let rayon = Chains::<Cascade, Rayon>::from(&threads);
        let back: Chains<Cascade> = Chains::from(&rayon);

        assert_eq!(back.weights(), chains.weights());
        assert_eq!(back.columns(), chains.columns());
        assert_eq!(rayon.backend(), &Rayon::default());
    }

    #[test]
    fn reductions() {
        let chains = sample().to_backend(Threads::new(3));

        let estimators = chains.weight_estimators();
        assert_eq!(estimators.events(), 6);
        assert_eq!(estimators.mean(), 3.5);

        // sum (1 + i) * i / sum (1 + i)
        let average = chains.average_on(|(a, _): (&Particles<3>, &Particles<2>)| a[0].e());
        assert!((average.mean() - 70.0 / 21.0).abs() < 1e-12);
    }
}
