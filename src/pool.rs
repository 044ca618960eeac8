//! Bounded-concurrency task pool for per-symbol fetch work.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};

use futures_util::future::join_all;

/// Run `task` over every item with at most `max_concurrent` tasks in flight.
/// Output order matches input order regardless of completion order.
///
/// Workers share an atomic cursor and each repeatedly claims the next
/// unclaimed index until the input is exhausted. Results are accumulated
/// per-worker and merged once all workers finish, so no shared collection is
/// mutated concurrently. The pool itself does not catch failures — a `task`
/// that should tolerate partial failure must return its own outcome value.
pub async fn run_pool<T, R, F, Fut>(items: Vec<T>, max_concurrent: usize, task: F) -> Vec<R>
where
    T: Clone,
    F: Fn(T) -> Fut,
    Fut: Future<Output = R>,
{
    let cursor = AtomicUsize::new(0);
    let worker_count = max_concurrent.max(1).min(items.len());

    let workers = (0..worker_count).map(|_| {
        let cursor = &cursor;
        let items = &items;
        let task = &task;
        async move {
            let mut claimed: Vec<(usize, R)> = Vec::new();
            loop {
                let idx = cursor.fetch_add(1, Ordering::Relaxed);
                if idx >= items.len() {
                    break;
                }
                let result = task(items[idx].clone()).await;
                claimed.push((idx, result));
            }
            claimed
        }
    });

    let per_worker = join_all(workers).await;

    let mut out: Vec<Option<R>> = (0..items.len()).map(|_| None).collect();
    for (idx, result) in per_worker.into_iter().flatten() {
        out[idx] = Some(result);
    }
    // Every index below len was claimed by exactly one worker.
    out.into_iter().flatten().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn invokes_task_exactly_once_per_item_in_order() {
        let calls = Arc::new(AtomicUsize::new(0));
        let items: Vec<u64> = (0..37).collect();

        let calls_ref = Arc::clone(&calls);
        let out = run_pool(items.clone(), 5, move |n| {
            let calls = Arc::clone(&calls_ref);
            async move {
                calls.fetch_add(1, Ordering::Relaxed);
                n * 2
            }
        })
        .await;

        assert_eq!(calls.load(Ordering::Relaxed), items.len());
        let expected: Vec<u64> = items.iter().map(|n| n * 2).collect();
        assert_eq!(out, expected);
    }

    #[tokio::test]
    async fn empty_input_completes_with_empty_output() {
        let out = run_pool(Vec::<u32>::new(), 4, |n| async move { n }).await;
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn limit_larger_than_input_still_runs_everything() {
        let out = run_pool(vec![1, 2, 3], 100, |n| async move { n + 1 }).await;
        assert_eq!(out, vec![2, 3, 4]);
    }

    #[tokio::test]
    async fn in_flight_tasks_never_exceed_limit() {
        let current = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let limit = 3usize;

        let current_ref = Arc::clone(&current);
        let peak_ref = Arc::clone(&peak);
        let out = run_pool((0..20).collect::<Vec<u32>>(), limit, move |n| {
            let current = Arc::clone(&current_ref);
            let peak = Arc::clone(&peak_ref);
            async move {
                let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(2)).await;
                current.fetch_sub(1, Ordering::SeqCst);
                n
            }
        })
        .await;

        assert_eq!(out.len(), 20);
        assert!(
            peak.load(Ordering::SeqCst) <= limit,
            "peak={} exceeded limit={limit}",
            peak.load(Ordering::SeqCst),
        );
    }

    #[tokio::test]
    async fn output_order_is_input_order_despite_uneven_completion() {
        // Earlier items sleep longer, so later items finish first.
        let out = run_pool(vec![30u64, 20, 10, 0], 4, |ms| async move {
            tokio::time::sleep(Duration::from_millis(ms)).await;
            ms
        })
        .await;
        assert_eq!(out, vec![30, 20, 10, 0]);
    }
}
