use std::collections::{HashMap, HashSet};
use std::fmt::Display;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;

use futures_util::stream::{self, StreamExt};
use tracing::{debug, warn};

use crate::errors::{AppError, AppResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchProgress {
    pub total: usize,
    pub processed: usize,
}

pub type ProgressObserver = Arc<dyn Fn(DispatchProgress) + Send + Sync>;

/// Maps `work` over `items` with at most `workers` calls in flight and
/// collects the results keyed by item.
///
/// With fewer than two workers the items run one after another in input
/// order. Otherwise results are recorded in completion order. Items must be
/// unique, and the first failing call aborts the whole batch.
pub async fn parallel_map<T, R, F, Fut>(
    items: Vec<T>,
    workers: usize,
    work: F,
    observer: Option<ProgressObserver>,
) -> AppResult<HashMap<T, R>>
where
    T: Eq + Hash + Clone + Display,
    F: Fn(T) -> Fut,
    Fut: Future<Output = AppResult<R>>,
{
    ensure_unique(&items)?;

    let total = items.len();
    let mut results = HashMap::with_capacity(total);
    let report = |processed: usize| {
        if let Some(callback) = &observer {
            callback(DispatchProgress { total, processed });
        }
    };

    if workers < 2 {
        debug!(target: "dispatch", total, "running sequentially");
        for item in items {
            let value = work(item.clone()).await?;
            results.insert(item, value);
            report(results.len());
        }
        return Ok(results);
    }

    debug!(target: "dispatch", total, workers, "running with bounded concurrency");
    let mut pending = stream::iter(items.into_iter().map(|item| {
        let call = work(item.clone());
        async move { call.await.map(|value| (item, value)) }
    }))
    .buffer_unordered(workers);

    while let Some(outcome) = pending.next().await {
        let (item, value) = match outcome {
            Ok(done) => done,
            Err(err) => {
                warn!(
                    target: "dispatch",
                    ?err,
                    processed = results.len(),
                    total,
                    "work item failed; aborting batch"
                );
                return Err(err);
            }
        };
        results.insert(item, value);
        report(results.len());
    }

    Ok(results)
}

fn ensure_unique<T: Eq + Hash + Display>(items: &[T]) -> AppResult<()> {
    let mut seen = HashSet::with_capacity(items.len());
    for item in items {
        if !seen.insert(item) {
            return Err(AppError::DuplicateItem(item.to_string()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use parking_lot::Mutex;
    use tokio::time::sleep;

    use super::*;

    async fn square(value: u64) -> AppResult<u64> {
        // Later items finish first so completion order differs from input order.
        sleep(Duration::from_millis(20 - value)).await;
        Ok(value * value)
    }

    #[tokio::test]
    async fn collects_every_item_once() {
        let items: Vec<u64> = (0..12).collect();
        let results = parallel_map(items.clone(), 4, square, None).await.unwrap();

        assert_eq!(results.len(), items.len());
        for item in items {
            assert_eq!(results[&item], item * item);
        }
    }

    #[tokio::test]
    async fn sequential_and_parallel_agree() {
        let items: Vec<u64> = (0..10).collect();
        let sequential = parallel_map(items.clone(), 1, square, None).await.unwrap();
        let parallel = parallel_map(items.clone(), 5, square, None).await.unwrap();
        let wide = parallel_map(items, 64, square, None).await.unwrap();

        assert_eq!(sequential, parallel);
        assert_eq!(sequential, wide);
    }

    #[tokio::test]
    async fn sequential_mode_preserves_call_order() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let items = vec!["c".to_string(), "a".to_string(), "b".to_string()];
        let recorder = Arc::clone(&calls);
        parallel_map(
            items.clone(),
            0,
            move |item: String| {
                let recorder = Arc::clone(&recorder);
                async move {
                    recorder.lock().push(item.clone());
                    Ok(item.len())
                }
            },
            None,
        )
        .await
        .unwrap();

        assert_eq!(*calls.lock(), items);
    }

    #[tokio::test]
    async fn never_exceeds_worker_count() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let (in_flight_ref, peak_ref) = (Arc::clone(&in_flight), Arc::clone(&peak));

        let results = parallel_map(
            (0..20u32).collect(),
            3,
            move |item| {
                let in_flight = Arc::clone(&in_flight_ref);
                let peak = Arc::clone(&peak_ref);
                async move {
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    sleep(Duration::from_millis(5)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    Ok(item)
                }
            },
            None,
        )
        .await
        .unwrap();

        assert_eq!(results.len(), 20);
        assert!(peak.load(Ordering::SeqCst) <= 3);
        assert_eq!(in_flight.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn reports_progress_per_completed_item() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let observer: ProgressObserver = Arc::new(move |progress| sink.lock().push(progress));

        parallel_map((0..6u64).collect(), 2, square, Some(observer))
            .await
            .unwrap();

        let seen = seen.lock();
        assert_eq!(seen.len(), 6);
        assert!(seen.iter().all(|p| p.total == 6));
        let processed: Vec<usize> = seen.iter().map(|p| p.processed).collect();
        assert_eq!(processed, vec![1, 2, 3, 4, 5, 6]);
    }

    #[tokio::test]
    async fn rejects_duplicate_items_before_running() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let outcome = parallel_map(
            vec![1u32, 2, 1],
            2,
            move |item| {
                counter.fetch_add(1, Ordering::SeqCst);
                async move { Ok(item) }
            },
            None,
        )
        .await;

        assert!(matches!(outcome, Err(AppError::DuplicateItem(ref item)) if item == "1"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn first_failure_aborts_the_batch() {
        for workers in [1, 4] {
            let outcome = parallel_map(
                (0..8u32).collect(),
                workers,
                |item| async move {
                    if item == 5 {
                        Err(AppError::Config(format!("boom on {item}")))
                    } else {
                        Ok(item)
                    }
                },
                None,
            )
            .await;

            match outcome {
                Err(AppError::Config(message)) => assert_eq!(message, "boom on 5"),
                other => panic!("expected failure, got {other:?}"),
            }
        }
    }
}
