//! Execution backends.
//!
//! A [`Backend`] decides two things: the buffer type the storage containers keep their columns in,
//! and how a function is applied to every row of a set of zipped columns. The containers and
//! generators of this crate never spawn threads themselves; all parallelism goes through
//! [`Backend::fold_rows`].
//!
//! Reductions are combined in an order that only depends on the number of rows and the
//! configuration of the backend, so results are reproducible for a given backend.

use std::collections::TryReserveError;
use std::fmt::Debug;
use std::ops::{DerefMut, Range};

/// Types that can be stored in the columns of a container.
pub trait Element: Clone + Debug + Default + Send + Sync + 'static {}

impl<T: Clone + Debug + Default + Send + Sync + 'static> Element for T {}

/// A growable column.
pub trait Buffer<T>:
    Clone + Debug + Default + DerefMut<Target = [T]> + FromIterator<T> + Send + Sync
{
    /// Number of elements the buffer can hold without reallocating.
    fn capacity(&self) -> usize;

    /// Makes sure the buffer can hold `len` elements without reallocating. The length of the
    /// buffer is not changed, also not if an error is returned.
    ///
    /// # Errors
    ///
    /// Returns an error if the allocation fails.
    fn try_reserve_len(&mut self, len: usize) -> Result<(), TryReserveError>;

    /// Resizes the buffer to `len`, filling new slots with default values.
    fn resize_default(&mut self, len: usize);

    /// Appends `value` at the end.
    fn push(&mut self, value: T);

    /// Removes all elements, keeping the capacity.
    fn clear(&mut self);

    /// Releases unused capacity.
    fn shrink_to_fit(&mut self);
}

impl<T: Element> Buffer<T> for Vec<T> {
    fn capacity(&self) -> usize {
        Self::capacity(self)
    }

    fn try_reserve_len(&mut self, len: usize) -> Result<(), TryReserveError> {
        if len > self.len() {
            self.try_reserve(len - self.len())
        } else {
            Ok(())
        }
    }

    fn resize_default(&mut self, len: usize) {
        self.resize_with(len, T::default);
    }

    fn push(&mut self, value: T) {
        Self::push(self, value);
    }

    fn clear(&mut self) {
        Self::clear(self);
    }

    fn shrink_to_fit(&mut self) {
        Self::shrink_to_fit(self);
    }
}

/// A set of rows that can be split into disjoint halves and iterated.
///
/// Implemented for shared and mutable slices, for index ranges and for tuples of one to four of
/// these, which zips them row by row.
pub trait Rows: Sized + Send {
    /// What a single row yields.
    type Row;

    /// Iterator over the rows.
    type Iter: DoubleEndedIterator<Item = Self::Row> + ExactSizeIterator;

    /// Number of rows.
    fn len(&self) -> usize;

    /// Whether there are no rows.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Splits into the rows `[0, mid)` and `[mid, len)`.
    fn split_at(self, mid: usize) -> (Self, Self);

    /// Converts into an iterator over the rows.
    fn into_rows(self) -> Self::Iter;
}

impl<'a, T: Sync> Rows for &'a [T] {
    type Row = &'a T;
    type Iter = std::slice::Iter<'a, T>;

    fn len(&self) -> usize {
        <[T]>::len(self)
    }

    fn split_at(self, mid: usize) -> (Self, Self) {
        <[T]>::split_at(self, mid)
    }

    fn into_rows(self) -> Self::Iter {
        self.iter()
    }
}

impl<'a, T: Send> Rows for &'a mut [T] {
    type Row = &'a mut T;
    type Iter = std::slice::IterMut<'a, T>;

    fn len(&self) -> usize {
        <[T]>::len(self)
    }

    fn split_at(self, mid: usize) -> (Self, Self) {
        self.split_at_mut(mid)
    }

    fn into_rows(self) -> Self::Iter {
        self.iter_mut()
    }
}

impl Rows for Range<usize> {
    type Row = usize;
    type Iter = Self;

    fn len(&self) -> usize {
        ExactSizeIterator::len(self)
    }

    fn split_at(self, mid: usize) -> (Self, Self) {
        let mid = self.start + mid;
        debug_assert!(mid <= self.end);
        (self.start..mid, mid..self.end)
    }

    fn into_rows(self) -> Self {
        self
    }
}

/// Iterator over zipped rows, yielding tuples.
#[derive(Clone, Debug)]
pub struct ZipRows<I>(I);

macro_rules! impl_rows_for_tuple {
    ($($name:ident $idx:tt),+) => {
        impl<$($name: Rows),+> Rows for ($($name,)+) {
            type Row = ($($name::Row,)+);
            type Iter = ZipRows<($($name::Iter,)+)>;

            fn len(&self) -> usize {
                let len = self.0.len();
                $(debug_assert_eq!(self.$idx.len(), len);)+
                len
            }

            fn split_at(self, mid: usize) -> (Self, Self) {
                let parts = ($(self.$idx.split_at(mid),)+);
                (($(parts.$idx.0,)+), ($(parts.$idx.1,)+))
            }

            fn into_rows(self) -> Self::Iter {
                ZipRows(($(self.$idx.into_rows(),)+))
            }
        }

        impl<$($name: ExactSizeIterator),+> Iterator for ZipRows<($($name,)+)> {
            type Item = ($($name::Item,)+);

            fn next(&mut self) -> Option<Self::Item> {
                Some(($(self.0.$idx.next()?,)+))
            }

            fn size_hint(&self) -> (usize, Option<usize>) {
                let len = self.len();
                (len, Some(len))
            }
        }

        impl<$($name: ExactSizeIterator),+> ExactSizeIterator for ZipRows<($($name,)+)> {
            fn len(&self) -> usize {
                let mut len = usize::MAX;
                $(len = len.min(self.0.$idx.len());)+
                len
            }
        }

        impl<$($name: DoubleEndedIterator + ExactSizeIterator),+> DoubleEndedIterator
            for ZipRows<($($name,)+)>
        {
            fn next_back(&mut self) -> Option<Self::Item> {
                // zipped columns always have the same length
                Some(($(self.0.$idx.next_back()?,)+))
            }
        }
    };
}

impl_rows_for_tuple!(A 0);
impl_rows_for_tuple!(A 0, B 1);
impl_rows_for_tuple!(A 0, B 1, C 2);
impl_rows_for_tuple!(A 0, B 1, C 2, D 3);

/// A strategy to apply functions to rows, and the buffer type belonging to it.
pub trait Backend: Clone + Debug + Default + Send + Sync + 'static {
    /// The column type of the containers living on this backend.
    type Buffer<T: Element>: Buffer<T>;

    /// A short name used in log messages.
    fn name(&self) -> &'static str;

    /// Folds every row of `rows` with `fold(accumulator, index, row)`, starting each
    /// independent chunk from `identity()` and merging chunk results with `combine`. `index` is
    /// the position of the row within `rows`.
    fn fold_rows<R, A, I, F, C>(&self, rows: R, identity: I, fold: F, combine: C) -> A
    where
        R: Rows,
        A: Send,
        I: Fn() -> A + Sync,
        F: Fn(A, usize, R::Row) -> A + Sync,
        C: Fn(A, A) -> A + Sync;

    /// Calls `f(index, row)` for every row.
    fn for_each_row<R, F>(&self, rows: R, f: F)
    where
        R: Rows,
        F: Fn(usize, R::Row) + Sync,
    {
        self.fold_rows(rows, || (), |(), index, row| f(index, row), |(), ()| ());
    }
}

fn fold_chunk<R, A, F>(rows: R, offset: usize, init: A, fold: &F) -> A
where
    R: Rows,
    F: Fn(A, usize, R::Row) -> A,
{
    rows.into_rows()
        .enumerate()
        .fold(init, |acc, (index, row)| fold(acc, offset + index, row))
}

/// Runs everything on the calling thread.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Sequential;

impl Backend for Sequential {
    type Buffer<T: Element> = Vec<T>;

    fn name(&self) -> &'static str {
        "sequential"
    }

    fn fold_rows<R, A, I, F, C>(&self, rows: R, identity: I, fold: F, _: C) -> A
    where
        R: Rows,
        A: Send,
        I: Fn() -> A + Sync,
        F: Fn(A, usize, R::Row) -> A + Sync,
        C: Fn(A, A) -> A + Sync,
    {
        fold_chunk(rows, 0, identity(), &fold)
    }
}

/// Compute the number of rows on a given core, given the total number of cores `n_cores`, the
/// index `core` (zero-based) of the current thread as well as the total number of rows `total`.
/// The first `total % n_cores` cores get one row more than the others.
pub(crate) fn compute_rows_for_core(core: usize, n_cores: usize, total: usize) -> usize {
    debug_assert!(core < n_cores);
    total / n_cores + usize::from(core < total % n_cores)
}

/// Distributes contiguous, balanced chunks of rows over scoped threads.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Threads {
    cores: usize,
}

impl Threads {
    /// Uses `cores` threads; zero is treated as one.
    pub fn new(cores: usize) -> Self {
        Self {
            cores: cores.max(1),
        }
    }

    /// Number of threads.
    pub const fn cores(&self) -> usize {
        self.cores
    }
}

impl Default for Threads {
    fn default() -> Self {
        Self::new(num_cpus::get())
    }
}

impl Backend for Threads {
    type Buffer<T: Element> = Vec<T>;

    fn name(&self) -> &'static str {
        "threads"
    }

    fn fold_rows<R, A, I, F, C>(&self, rows: R, identity: I, fold: F, combine: C) -> A
    where
        R: Rows,
        A: Send,
        I: Fn() -> A + Sync,
        F: Fn(A, usize, R::Row) -> A + Sync,
        C: Fn(A, A) -> A + Sync,
    {
        let total = rows.len();
        let n_cores = self.cores.min(total).max(1);

        if n_cores == 1 {
            return fold_chunk(rows, 0, identity(), &fold);
        }

        // cut the rows into one contiguous chunk per core
        let mut chunks = Vec::with_capacity(n_cores);
        let mut rest = rows;
        let mut offset = 0;
        for core in 0..n_cores {
            let len = compute_rows_for_core(core, n_cores, total);
            let (chunk, tail) = rest.split_at(len);
            chunks.push((offset, chunk));
            rest = tail;
            offset += len;
        }

        let identity = &identity;
        let fold = &fold;

        let results = crossbeam::thread::scope(|s| {
            let handles: Vec<_> = chunks
                .into_iter()
                .map(|(offset, chunk)| s.spawn(move |_| fold_chunk(chunk, offset, identity(), fold)))
                .collect();

            // wait for the threads to finish
            handles
                .into_iter()
                .map(|handle| handle.join())
                .collect::<Vec<_>>()
        });

        let results = match results {
            Ok(results) => results,
            Err(payload) => std::panic::resume_unwind(payload),
        };

        results
            .into_iter()
            .map(|result| result.unwrap_or_else(|payload| std::panic::resume_unwind(payload)))
            .reduce(&combine)
            .unwrap_or_else(identity)
    }
}

/// Splits the rows recursively with `rayon::join` until chunks are at most `grain` rows long.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Rayon {
    grain: usize,
}

impl Rayon {
    /// Default number of rows below which a chunk is processed sequentially.
    pub const DEFAULT_GRAIN: usize = 1024;

    /// Uses chunks of at most `grain` rows; zero is treated as one.
    pub fn new(grain: usize) -> Self {
        Self {
            grain: grain.max(1),
        }
    }

    /// The grain size.
    pub const fn grain(&self) -> usize {
        self.grain
    }
}

impl Default for Rayon {
    fn default() -> Self {
        Self::new(Self::DEFAULT_GRAIN)
    }
}

fn fold_recursive<R, A, I, F, C>(
    rows: R,
    offset: usize,
    grain: usize,
    identity: &I,
    fold: &F,
    combine: &C,
) -> A
where
    R: Rows,
    A: Send,
    I: Fn() -> A + Sync,
    F: Fn(A, usize, R::Row) -> A + Sync,
    C: Fn(A, A) -> A + Sync,
{
    let len = rows.len();
    if len <= grain {
        return fold_chunk(rows, offset, identity(), fold);
    }

    let mid = len / 2;
    let (left, right) = rows.split_at(mid);
    let (a, b) = rayon::join(
        || fold_recursive(left, offset, grain, identity, fold, combine),
        || fold_recursive(right, offset + mid, grain, identity, fold, combine),
    );
    combine(a, b)
}

impl Backend for Rayon {
    type Buffer<T: Element> = Vec<T>;

    fn name(&self) -> &'static str {
        "rayon"
    }

    fn fold_rows<R, A, I, F, C>(&self, rows: R, identity: I, fold: F, combine: C) -> A
    where
        R: Rows,
        A: Send,
        I: Fn() -> A + Sync,
        F: Fn(A, usize, R::Row) -> A + Sync,
        C: Fn(A, A) -> A + Sync,
    {
        fold_recursive(rows, 0, self.grain, &identity, &fold, &combine)
    }
}
