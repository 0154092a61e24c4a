//! This module contains everything related to estimators.
use num_traits::{Float, FromPrimitive};
use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign};

/// Basic estimators, like the mean, variance, and the standard deviation.
pub trait BasicEstimators<T: Float> {
    /// Returns the mean value.
    fn mean(&self) -> T;

    /// Returns the variance, $V$.
    fn var(&self) -> T;

    /// Returns the standard deviation, $\sigma = \sqrt{V}$.
    fn std(&self) -> T {
        self.var().sqrt()
    }
}

/// More estimators.
pub trait Estimators<T: Float>: BasicEstimators<T> {
    /// Returns the number of events $N$ that entered the estimate.
    fn events(&self) -> usize;

    /// Returns the number of events, $N_\mathrm{nf}$, whose value was non-finite. These events
    /// count as zero.
    fn non_finite_events(&self) -> usize;

    /// Returns the number of events, $N_\mathrm{nz}$, whose value was non-zero.
    fn non_zero_events(&self) -> usize;

    /// Returns the fraction of non-zero events.
    fn efficiency(&self) -> T {
        let non_zero: Option<T> = num_traits::cast(self.non_zero_events());
        let events: Option<T> = num_traits::cast(self.events());
        non_zero.unwrap_or_else(T::nan) / events.unwrap_or_else(T::nan)
    }
}

/// A struct implementing the `BasicEstimator<T>` trait.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct MeanVar<T> {
    mean: T,
    var: T,
}

impl<T: Add<Output = T>> Add for MeanVar<T> {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self {
            mean: self.mean + other.mean,
            var: self.var + other.var,
        }
    }
}

impl<T: Add<Output = T> + AddAssign> AddAssign for MeanVar<T> {
    fn add_assign(&mut self, other: Self) {
        self.mean += other.mean;
        self.var += other.var;
    }
}

impl<T> MeanVar<T> {
    /// Constructor.
    pub const fn new(mean: T, var: T) -> Self {
        Self { mean, var }
    }
}

impl<T: Float> BasicEstimators<T> for MeanVar<T> {
    fn mean(&self) -> T {
        self.mean
    }

    fn var(&self) -> T {
        self.var
    }
}

/// Sum and sum of squares of a sample, for instance the event weights of a batch.
///
/// The variance is the variance of the mean, $V = \left( \sum w^2 - (\sum w)^2 / N \right) / N /
/// (N - 1)$.
#[derive(Debug, Clone, Deserialize, PartialEq, Serialize)]
pub struct SampleEstimators<T> {
    sum: T,
    sumsq: T,
    events: usize,
    non_finite_events: usize,
    non_zero_events: usize,
}

impl<T: Float> Default for SampleEstimators<T> {
    fn default() -> Self {
        Self {
            sum: T::zero(),
            sumsq: T::zero(),
            events: 0,
            non_finite_events: 0,
            non_zero_events: 0,
        }
    }
}

impl<T: Float> SampleEstimators<T> {
    /// Adds one event with `value`.
    pub fn push(&mut self, value: T) {
        self.events += 1;

        if value != T::zero() {
            self.non_zero_events += 1;

            if value.is_finite() {
                self.sum = self.sum + value;
                self.sumsq = self.sumsq + value * value;
            } else {
                self.non_finite_events += 1;
            }
        }
    }

    /// Returns the sum of all finite values.
    pub const fn sum(&self) -> T {
        self.sum
    }

    /// Returns the sum of squares of all finite values.
    pub const fn sumsq(&self) -> T {
        self.sumsq
    }
}

impl<T: Float> FromIterator<T> for SampleEstimators<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        iter.into_iter().fold(Self::default(), |mut acc, value| {
            acc.push(value);
            acc
        })
    }
}

impl<T: Float> Add for SampleEstimators<T> {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self {
            sum: self.sum + other.sum,
            sumsq: self.sumsq + other.sumsq,
            events: self.events + other.events,
            non_finite_events: self.non_finite_events + other.non_finite_events,
            non_zero_events: self.non_zero_events + other.non_zero_events,
        }
    }
}

impl<T> BasicEstimators<T> for SampleEstimators<T>
where
    T: Float + FromPrimitive,
{
    fn mean(&self) -> T {
        T::from_usize(self.events).map_or_else(T::nan, |events| self.sum / events)
    }

    fn var(&self) -> T {
        T::from_usize(self.events).map_or_else(T::nan, |events| {
            (self.sumsq - self.sum * self.sum / events) / events / (events - T::one())
        })
    }
}

impl<T> Estimators<T> for SampleEstimators<T>
where
    T: Float + FromPrimitive,
{
    fn events(&self) -> usize {
        self.events
    }

    fn non_finite_events(&self) -> usize {
        self.non_finite_events
    }

    fn non_zero_events(&self) -> usize {
        self.non_zero_events
    }
}

/// Weighted mean and second central moment of a quantity, merged pairwise.
///
/// The mean is $\bar{x} = \sum w x / \sum w$ and the variance is the weighted variance of the
/// quantity, $\sum w (x - \bar{x})^2 / \sum w$. Events with a non-finite value or weight are
/// counted and skipped.
#[derive(Debug, Clone, Deserialize, PartialEq, Serialize)]
pub struct WeightedEstimators<T> {
    mean: T,
    m2: T,
    sum_weights: T,
    events: usize,
    non_finite_events: usize,
    non_zero_events: usize,
}

impl<T: Float> Default for WeightedEstimators<T> {
    fn default() -> Self {
        Self {
            mean: T::zero(),
            m2: T::zero(),
            sum_weights: T::zero(),
            events: 0,
            non_finite_events: 0,
            non_zero_events: 0,
        }
    }
}

impl<T: Float> WeightedEstimators<T> {
    /// Adds `value` with weight `weight`.
    pub fn push(&mut self, weight: T, value: T) {
        self.events += 1;

        if !weight.is_finite() || !value.is_finite() {
            self.non_finite_events += 1;
            return;
        }

        if weight == T::zero() {
            return;
        }

        self.non_zero_events += 1;
        self.sum_weights = self.sum_weights + weight;
        let delta = value - self.mean;
        self.mean = self.mean + delta * weight / self.sum_weights;
        self.m2 = self.m2 + weight * delta * (value - self.mean);
    }

    /// Returns the sum of the weights.
    pub const fn sum_weights(&self) -> T {
        self.sum_weights
    }
}

impl<T: Float> Add for WeightedEstimators<T> {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        let sum_weights = self.sum_weights + other.sum_weights;
        let (mean, m2) = if other.sum_weights == T::zero() {
            (self.mean, self.m2)
        } else if self.sum_weights == T::zero() {
            (other.mean, other.m2)
        } else {
            let delta = other.mean - self.mean;
            (
                self.mean + delta * other.sum_weights / sum_weights,
                self.m2
                    + other.m2
                    + delta * delta * self.sum_weights * other.sum_weights / sum_weights,
            )
        };

        Self {
            mean,
            m2,
            sum_weights,
            events: self.events + other.events,
            non_finite_events: self.non_finite_events + other.non_finite_events,
            non_zero_events: self.non_zero_events + other.non_zero_events,
        }
    }
}

impl<T: Float> BasicEstimators<T> for WeightedEstimators<T> {
    fn mean(&self) -> T {
        if self.sum_weights == T::zero() {
            T::nan()
        } else {
            self.mean
        }
    }

    fn var(&self) -> T {
        self.m2 / self.sum_weights
    }
}

impl<T: Float> Estimators<T> for WeightedEstimators<T> {
    fn events(&self) -> usize {
        self.events
    }

    fn non_finite_events(&self) -> usize {
        self.non_finite_events
    }

    fn non_zero_events(&self) -> usize {
        self.non_zero_events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn sample_estimators_filter_non_finite() {
        let estimators: SampleEstimators<f64> =
            [1.0, 2.0, 0.0, f64::NAN, 3.0, f64::INFINITY].into_iter().collect();

        assert_eq!(estimators.events(), 6);
        assert_eq!(estimators.non_zero_events(), 5);
        assert_eq!(estimators.non_finite_events(), 2);
        assert_approx_eq!(estimators.sum(), 6.0);
        assert_approx_eq!(estimators.sumsq(), 14.0);
        assert_approx_eq!(estimators.mean(), 1.0);
        // (14 - 36 / 6) / 6 / 5
        assert_approx_eq!(estimators.var(), 8.0 / 30.0);
        assert_approx_eq!(estimators.efficiency(), 5.0 / 6.0);
    }

    #[test]
    fn sample_estimators_add_up() {
        let a: SampleEstimators<f64> = [1.0, 2.0].into_iter().collect();
        let b: SampleEstimators<f64> = [3.0, 4.0, 5.0].into_iter().collect();
        let all: SampleEstimators<f64> = [1.0, 2.0, 3.0, 4.0, 5.0].into_iter().collect();
        assert_eq!(a + b.clone(), all);

        let mut pushed = SampleEstimators::default();
        pushed.push(1.0);
        pushed.push(2.0);
        assert_eq!(pushed + b, all);
    }

    #[test]
    fn weighted_estimators_match_direct_computation() {
        let data = [(0.5, 1.0), (2.0, 3.0), (1.0, -2.0), (0.25, 4.0), (1.5, 0.5)];

        let sum_w: f64 = data.iter().map(|(w, _)| w).sum();
        let mean = data.iter().map(|(w, x)| w * x).sum::<f64>() / sum_w;
        let var = data.iter().map(|(w, x)| w * (x - mean).powi(2)).sum::<f64>() / sum_w;

        let mut sequential = WeightedEstimators::default();
        for &(w, x) in &data {
            sequential.push(w, x);
        }
        assert_approx_eq!(sequential.mean(), mean, 1e-14);
        assert_approx_eq!(sequential.var(), var, 1e-14);
        assert_approx_eq!(sequential.sum_weights(), sum_w);

        // merging partial results gives the same moments
        let mut left = WeightedEstimators::default();
        let mut right = WeightedEstimators::default();
        for &(w, x) in &data[..2] {
            left.push(w, x);
        }
        for &(w, x) in &data[2..] {
            right.push(w, x);
        }
        let merged = left + right;
        assert_approx_eq!(merged.mean(), mean, 1e-14);
        assert_approx_eq!(merged.var(), var, 1e-14);
        assert_eq!(merged.events(), 5);
    }

    #[test]
    fn weighted_estimators_skip_zero_and_non_finite() {
        let mut estimators = WeightedEstimators::default();
        estimators.push(0.0, 100.0);
        estimators.push(1.0, f64::NAN);
        estimators.push(f64::INFINITY, 1.0);
        assert!(estimators.mean().is_nan());
        estimators.push(2.0, 3.0);

        assert_eq!(estimators.events(), 4);
        assert_eq!(estimators.non_finite_events(), 2);
        assert_eq!(estimators.non_zero_events(), 1);
        assert_eq!(estimators.mean(), 3.0);
        assert_eq!(estimators.var(), 0.0);

        let empty = WeightedEstimators::<f64>::default();
        assert_eq!((empty.clone() + estimators.clone()).mean(), 3.0);
        assert_eq!((estimators + empty).mean(), 3.0);
    }

    #[test]
    fn mean_var_adds_componentwise() {
        let mut a = MeanVar::new(1.0, 0.5);
        a += MeanVar::new(2.0, 0.25);
        assert_eq!(a.clone() + MeanVar::new(0.0, 0.25), MeanVar::new(3.0, 1.0));
        assert_approx_eq!(a.std(), 0.75_f64.sqrt());
    }
}
