//! Implementation of different callback functions for batched generation.
use crate::estimators::{BasicEstimators, Estimators, SampleEstimators};
use std::ops::{ControlFlow, Range};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::info;

/// Summary of one finished batch.
#[derive(Clone, Debug, PartialEq)]
pub struct BatchReport {
    /// Zero-based number of the batch.
    pub batch: usize,
    /// Indices of the events generated in this batch.
    pub events: Range<usize>,
    /// Estimators of the event weights of this batch.
    pub estimators: SampleEstimators<f64>,
    /// Estimators of the event weights of all batches so far, including this one.
    pub cumulative: SampleEstimators<f64>,
}

/// Trait for callbacks invoked after each batch of events.
pub trait Callback {
    /// Called after each successfully finished batch. Returning `ControlFlow::Break` stops the
    /// generation after this batch.
    fn after_batch(&self, report: &BatchReport) -> ControlFlow<()>;
}

impl<F> Callback for F
where
    F: Fn(&BatchReport) -> ControlFlow<()>,
{
    fn after_batch(&self, report: &BatchReport) -> ControlFlow<()> {
        self(report)
    }
}

/// A callback function that does nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct SinkCallback;

impl Callback for SinkCallback {
    fn after_batch(&self, _: &BatchReport) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }
}

/// Logs the estimate of each batch together with the cumulative estimate, at `info` level.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogCallback;

impl Callback for LogCallback {
    fn after_batch(&self, report: &BatchReport) -> ControlFlow<()> {
        let it = &report.estimators;
        let cu = &report.cumulative;

        info!(
            "[batch {}: N={} E={} \u{b1} {}] [cumulative: N={} E={} \u{b1} {} eff={}]",
            report.batch,
            it.events(),
            it.mean(),
            it.std(),
            cu.events(),
            cu.mean(),
            cu.std(),
            cu.efficiency(),
        );

        ControlFlow::Continue(())
    }
}

/// Stops the generation as soon as the flag is set, for instance from a signal handler or
/// another thread.
#[derive(Clone, Copy, Debug)]
pub struct CancelFlag<'a>(pub &'a AtomicBool);

impl Callback for CancelFlag<'_> {
    fn after_batch(&self, _: &BatchReport) -> ControlFlow<()> {
        if self.0.load(Ordering::Relaxed) {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report() -> BatchReport {
        let estimators: SampleEstimators<f64> = [0.5, 0.25].into_iter().collect();
        BatchReport {
            batch: 0,
            events: 0..2,
            estimators: estimators.clone(),
            cumulative: estimators,
        }
    }

    #[test]
    fn sink_and_log_continue() {
        assert_eq!(SinkCallback.after_batch(&report()), ControlFlow::Continue(()));
        assert_eq!(LogCallback.after_batch(&report()), ControlFlow::Continue(()));
    }

    #[test]
    fn cancel_flag_breaks() {
        let flag = AtomicBool::new(false);
        let callback = CancelFlag(&flag);
        assert_eq!(callback.after_batch(&report()), ControlFlow::Continue(()));
        flag.store(true, Ordering::Relaxed);
        assert_eq!(callback.after_batch(&report()), ControlFlow::Break(()));
    }

    #[test]
    fn closures_are_callbacks() {
        let callback = |report: &BatchReport| {
            if report.cumulative.events() >= 2 {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        };
        assert_eq!(callback.after_batch(&report()), ControlFlow::Break(()));
    }
}
