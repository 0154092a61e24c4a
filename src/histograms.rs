//! Weighted histograms of event observables, filled per worker and merged afterwards.
use crate::estimators::{BasicEstimators, MeanVar};
use num_traits::{Float, FromPrimitive};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::ops::{Add, AddAssign};

/// Binning of a `d`-dimensional distribution, e.g. a Dalitz plot of two invariant masses squared.
///
/// Every axis has a half-open range `[left, right)` split into equally wide bins and a label.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct HistogramSpecification<T>
where
    T: Copy,
{
    left: Vec<T>,
    right: Vec<T>,
    bins: Vec<usize>,
    labels: Vec<String>,
    name: String,
}

impl<T> HistogramSpecification<T>
where
    T: Copy + Float + FromPrimitive + Debug,
{
    /// Binning with one entry per axis in `left`, `right`, `bins` and `labels`. All four must have
    /// the same length, which is the number of dimensions.
    ///
    /// # Panics
    ///
    /// Panics if the lengths differ or an axis has no bins.
    pub fn new(
        left: Vec<T>,
        right: Vec<T>,
        bins: Vec<usize>,
        labels: Vec<String>,
        name: String,
    ) -> Self {
        assert_eq!(left.len(), right.len());
        assert_eq!(left.len(), bins.len());
        assert_eq!(left.len(), labels.len());
        assert!(bins.iter().all(|&b| b > 0), "every axis needs at least one bin");
        Self {
            left,
            right,
            bins,
            labels,
            name,
        }
    }

    /// One-dimensional histogram with `bins` bins between `left` and `right`.
    ///
    /// # Panics
    ///
    /// Panics if `bins` is zero.
    pub fn one_dimensional(left: T, right: T, bins: usize, label: &str, name: &str) -> Self {
        Self::new(
            vec![left],
            vec![right],
            vec![bins],
            vec![label.to_owned()],
            name.to_owned(),
        )
    }

    /// Lower edges of the axes.
    pub fn left(&self) -> &[T] {
        &self.left
    }

    /// Upper edges of the axes, excluded from the ranges.
    pub fn right(&self) -> &[T] {
        &self.right
    }

    /// Number of bins per axis.
    pub fn bins(&self) -> &[usize] {
        &self.bins
    }

    /// Axis labels.
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Name of the distribution.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the number of dimensions.
    pub fn dimensions(&self) -> usize {
        self.bins.len()
    }

    /// Get an empty accumulator for the histogram. Each worker fills its own accumulator;
    /// afterwards they are combined with `+`.
    pub fn accumulator(&self) -> HistogramAccumulator<T> {
        HistogramAccumulator {
            sums: vec![(T::zero(), T::zero()); self.bins.iter().product()],
            specification: self.clone(),
            strides: [1]
                .iter()
                .chain(self.bins[..self.bins.len().saturating_sub(1)].iter())
                .scan(1, |acc, b| {
                    *acc *= b;
                    Some(*acc)
                })
                .collect(),
        }
    }

    /// Bin of `x` along axis `dim`.
    fn compute_bin_in_1d(&self, dim: usize, x: T) -> Option<usize> {
        let left = self.left[dim];
        let right = self.right[dim];

        // also rejects NaN
        if !(x >= left && x < right) {
            return None;
        }

        let bins = T::from_usize(self.bins[dim])?;
        let index = ((x - left) / (right - left) * bins).to_usize()?;

        // rounding can push values just below `right` into the overflow
        Some(index.min(self.bins[dim].checked_sub(1)?))
    }

    /// Flattened index of the bin the `observables` fall into, if any.
    fn compute_bin(&self, observables: &[T], strides: &[usize]) -> Option<usize> {
        observables
            .iter()
            .enumerate()
            .zip(strides)
            .try_fold(0, |bin, ((dim, &x), stride)| {
                Some(bin + self.compute_bin_in_1d(dim, x)? * stride)
            })
    }
}

/// Per-bin sums of weights and squared weights.
///
/// Every worker of a backend fills its own accumulator; partial accumulators are merged with `+`
/// and turned into [`HistogramEstimators`] once all events are seen.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct HistogramAccumulator<T>
where
    T: Copy,
{
    // flattened, first axis fastest
    sums: Vec<(T, T)>,
    specification: HistogramSpecification<T>,
    strides: Vec<usize>,
}

impl<T> HistogramAccumulator<T>
where
    T: Copy + Float + FromPrimitive + AddAssign + Debug,
{
    /// Adds the event weight `value` to the bin of `observables`. Zero and non-finite weights
    /// and observables outside the ranges are skipped.
    pub fn fill(&mut self, observables: &[T], value: T) {
        debug_assert_eq!(observables.len(), self.specification.dimensions());
        if !value.is_finite() || value == T::zero() {
            return;
        }

        if let Some(bin) = self
            .specification
            .compute_bin(observables, &self.strides)
        {
            self.sums[bin].0 += value;
            self.sums[bin].1 += value * value;
        }
    }

    /// The binning this accumulator was created from.
    pub const fn specification(&self) -> &HistogramSpecification<T> {
        &self.specification
    }

    /// Per-bin estimators, normalised to the total number of generated `events`, including
    /// events that fell outside the ranges.
    pub fn to_histogram_estimators(self, events: usize) -> HistogramEstimators<T> {
        HistogramEstimators::new(events, self)
    }
}

impl<T> Add for HistogramAccumulator<T>
where
    T: Copy + PartialEq + AddAssign,
{
    type Output = Self;

    fn add(mut self, other: Self) -> Self {
        self += other;
        self
    }
}

impl<T> AddAssign for HistogramAccumulator<T>
where
    T: Copy + AddAssign + PartialEq,
{
    fn add_assign(&mut self, other: Self) {
        debug_assert!(self.specification == other.specification);

        for (lhs, rhs) in self.sums.iter_mut().zip(other.sums) {
            lhs.0 += rhs.0;
            lhs.1 += rhs.1;
        }
    }
}

/// Mean and variance of the weight sum in every bin.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HistogramEstimators<T: Copy> {
    specification: HistogramSpecification<T>,
    events: usize,
    bins: Vec<MeanVar<T>>,
}

impl<T: Copy> HistogramEstimators<T> {
    /// Estimators of all bins, flattened like the accumulator.
    pub fn bins(&self) -> &[MeanVar<T>] {
        &self.bins
    }

    /// The binning.
    pub const fn specification(&self) -> &HistogramSpecification<T> {
        &self.specification
    }

    /// Number of events the estimators are normalised to.
    pub const fn events(&self) -> usize {
        self.events
    }
}

impl<T> HistogramEstimators<T>
where
    T: AddAssign + Float + FromPrimitive,
{
    fn new(events: usize, accumulator: HistogramAccumulator<T>) -> Self {
        let n = T::from_usize(events).unwrap_or_else(T::nan);
        Self {
            events,
            specification: accumulator.specification,
            bins: accumulator
                .sums
                .into_iter()
                .map(|(sum, sumsq)| {
                    MeanVar::new(sum / n, (sumsq - sum * sum / n) / n / (n - T::one()))
                })
                .collect(),
        }
    }
}

impl<T> BasicEstimators<T> for HistogramEstimators<T>
where
    T: Float,
{
    fn mean(&self) -> T {
        self.bins.iter().fold(T::zero(), |mean, x| mean + x.mean())
    }

    fn var(&self) -> T {
        self.bins.iter().fold(T::zero(), |var, x| var + x.var())
    }
}
