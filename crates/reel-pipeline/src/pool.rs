//! Bounded fan-out for per-item work within a stage.
//!
//! The pool bound is sized by resource class: CPU-bound work scales with
//! the processor count, externally-bound work (model inference, media
//! probes) uses the conservative configured bound so the external tool's
//! own limits are respected. Whatever order items complete in, results
//! come back in input order, so persisted artifacts are byte-identical
//! across worker counts.

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use futures::stream::{self, StreamExt};

use crate::cancel::CancelToken;

/// What bounds a batch's concurrency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceClass {
    /// CPU-bound: scales with available processor count.
    Cpu,
    /// Externally-bound: fixed conservative bound from configuration.
    External(usize),
}

impl ResourceClass {
    pub fn permits(&self) -> usize {
        match self {
            ResourceClass::Cpu => std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            ResourceClass::External(n) => (*n).max(1),
        }
    }
}

/// Outcome of a fanned-out batch.
#[derive(Debug)]
pub struct BatchOutcome<R> {
    /// One slot per input item, in input order. `None` marks an item that
    /// failed or was skipped by cancellation.
    pub results: Vec<Option<R>>,
    /// Whether cancellation was observed while the batch ran.
    pub cancelled: bool,
    /// Items skipped because cancellation had already been observed.
    pub skipped: usize,
}

impl<R> BatchOutcome<R> {
    pub fn missing(&self) -> usize {
        self.results.iter().filter(|r| r.is_none()).count()
    }

    pub fn missing_fraction(&self) -> f64 {
        if self.results.is_empty() {
            return 0.0;
        }
        self.missing() as f64 / self.results.len() as f64
    }

    /// Completed results in input order.
    pub fn into_completed(self) -> Vec<R> {
        self.results.into_iter().flatten().collect()
    }
}

/// Run one future per item with bounded concurrency.
///
/// The worker returns `None` for an item whose work failed; the caller
/// has already recorded why. Cancellation is checked before each item
/// starts, never mid-item.
pub async fn run_batch<T, R, Fut, F>(
    items: Vec<T>,
    class: ResourceClass,
    cancel: &CancelToken,
    worker: F,
) -> BatchOutcome<R>
where
    F: Fn(usize, T) -> Fut,
    Fut: Future<Output = Option<R>>,
{
    let permits = class.permits();
    let cancelled = AtomicBool::new(false);
    let skipped = AtomicUsize::new(0);

    let mut indexed: Vec<(usize, Option<R>)> = stream::iter(
        items
            .into_iter()
            .enumerate()
            .map(|(index, item)| {
                let worker = &worker;
                let cancelled = &cancelled;
                let skipped = &skipped;
                async move {
                    if cancel.is_cancelled() {
                        cancelled.store(true, Ordering::SeqCst);
                        skipped.fetch_add(1, Ordering::SeqCst);
                        return (index, None);
                    }
                    (index, worker(index, item).await)
                }
            }),
    )
    .buffer_unordered(permits)
    .collect()
    .await;

    indexed.sort_by_key(|(index, _)| *index);

    BatchOutcome {
        results: indexed.into_iter().map(|(_, r)| r).collect(),
        cancelled: cancelled.load(Ordering::SeqCst),
        skipped: skipped.load(Ordering::SeqCst),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::cancel_pair;
    use std::time::Duration;

    #[tokio::test]
    async fn test_results_come_back_in_input_order() {
        // Later items finish first; order must still be input order.
        let outcome = run_batch(
            vec![30u64, 20, 10],
            ResourceClass::External(3),
            &CancelToken::never(),
            |_, delay| async move {
                tokio::time::sleep(Duration::from_millis(delay)).await;
                Some(delay)
            },
        )
        .await;

        assert_eq!(
            outcome.results,
            vec![Some(30), Some(20), Some(10)]
        );
        assert!(!outcome.cancelled);
    }

    #[tokio::test]
    async fn test_failed_items_leave_holes() {
        let outcome = run_batch(
            vec![1, 2, 3, 4],
            ResourceClass::External(2),
            &CancelToken::never(),
            |_, n| async move { (n % 2 == 0).then_some(n) },
        )
        .await;

        assert_eq!(outcome.missing(), 2);
        assert!((outcome.missing_fraction() - 0.5).abs() < 1e-9);
        assert_eq!(outcome.into_completed(), vec![2, 4]);
    }

    #[tokio::test]
    async fn test_cancellation_between_items() {
        let (handle, token) = cancel_pair();
        handle.cancel();

        let outcome = run_batch(
            vec![1, 2, 3],
            ResourceClass::External(1),
            &token,
            |_, n| async move { Some(n) },
        )
        .await;

        assert!(outcome.cancelled);
        assert_eq!(outcome.skipped, 3);
        assert_eq!(outcome.missing(), 3);
    }

    #[test]
    fn test_resource_class_permits() {
        assert!(ResourceClass::Cpu.permits() >= 1);
        assert_eq!(ResourceClass::External(3).permits(), 3);
        assert_eq!(ResourceClass::External(0).permits(), 1);
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let outcome: BatchOutcome<u64> = run_batch(
            Vec::<u64>::new(),
            ResourceClass::Cpu,
            &CancelToken::never(),
            |_, n| async move { Some(n) },
        )
        .await;
        assert!(outcome.results.is_empty());
        assert_eq!(outcome.missing_fraction(), 0.0);
    }
}
