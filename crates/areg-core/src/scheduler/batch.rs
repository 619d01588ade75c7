use std::future::Future;
use std::time::Duration;

use tokio::task::JoinError;

/// Batch size and inter-batch pause.
#[derive(Debug, Clone, Copy)]
pub struct BatchPlan {
    pub batch_size: usize,
    pub delay: Duration,
}

impl BatchPlan {
    pub fn new(batch_size: usize, delay: Duration) -> Self {
        Self {
            batch_size: batch_size.max(1),
            delay,
        }
    }

    /// Number of batches needed for `items` items.
    pub fn batch_count(&self, items: usize) -> usize {
        items.div_ceil(self.batch_size.max(1))
    }
}

/// One item and how its task ended. `Err` means the task panicked or was cancelled.
pub type Settled<I, T> = (I, Result<T, JoinError>);

/// Everything that settled in one batch, in input order.
#[derive(Debug)]
pub struct BatchReport<I, T> {
    /// 0-based batch index.
    pub index: usize,
    pub total: usize,
    pub items: Vec<Settled<I, T>>,
}

/// Runs `work` for every item, `plan.batch_size` at a time.
///
/// `on_settled` is called once per batch after all its tasks finished. A panicking item
/// shows up as an `Err` for that item only; the batch and the remaining batches still run.
/// Returns the number of batches run.
pub async fn run_batches<I, T, W, Fut, S>(
    items: Vec<I>,
    plan: &BatchPlan,
    mut work: W,
    mut on_settled: S,
) -> usize
where
    I: Clone,
    W: FnMut(I) -> Fut,
    Fut: Future<Output = T> + Send + 'static,
    T: Send + 'static,
    S: FnMut(BatchReport<I, T>),
{
    let size = plan.batch_size.max(1);
    let total = plan.batch_count(items.len());

    for (index, chunk) in items.chunks(size).enumerate() {
        if index > 0 && !plan.delay.is_zero() {
            tracing::debug!("waiting {:?} before batch {} of {}", plan.delay, index + 1, total);
            tokio::time::sleep(plan.delay).await;
        }
        tracing::debug!(batch = index + 1, of = total, items = chunk.len(), "starting batch");

        let handles: Vec<_> = chunk
            .iter()
            .map(|item| (item.clone(), tokio::spawn(work(item.clone()))))
            .collect();

        let mut settled = Vec::with_capacity(handles.len());
        for (item, handle) in handles {
            settled.push((item, handle.await));
        }

        tracing::info!("completed batch {} of {}", index + 1, total);
        on_settled(BatchReport {
            index,
            total,
            items: settled,
        });
    }

    total
}
