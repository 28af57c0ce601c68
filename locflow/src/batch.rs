//! Chunked, cancellable processing of large write sets.
//!
//! Work is split into sub-chunks. After every sub-chunk the progress callback
//! sees the running count, the task yields to the runtime, and the
//! cancellation token is checked. A cancelled run therefore always leaves a
//! whole number of sub-chunks processed.

use tokio_util::sync::CancellationToken;

use crate::error::Error;

/// Sub-chunk size used when none is configured.
pub const DEFAULT_CHUNK_SIZE: usize = 100;

/// How a chunked run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchOutcome {
    Completed { processed: usize },
    Cancelled { processed: usize },
}

impl BatchOutcome {
    pub fn processed(&self) -> usize {
        match self {
            BatchOutcome::Completed { processed } | BatchOutcome::Cancelled { processed } => *processed,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, BatchOutcome::Cancelled { .. })
    }
}

/// Runs `process` over `items` in sub-chunks of `chunk_size`.
///
/// `progress` receives the number of items processed so far. An error from
/// `process` stops the run; sub-chunks committed before it stay committed.
pub async fn run_chunked<T, P, G>(
    items: &[T],
    chunk_size: usize,
    cancel: &CancellationToken,
    mut process: P,
    mut progress: G,
) -> Result<BatchOutcome, Error>
where
    P: FnMut(&[T]) -> Result<(), Error>,
    G: FnMut(usize),
{
    let chunk_size = chunk_size.max(1);
    let mut processed = 0;
    for chunk in items.chunks(chunk_size) {
        if cancel.is_cancelled() {
            tracing::info!(processed, total = items.len(), "chunked run cancelled");
            return Ok(BatchOutcome::Cancelled { processed });
        }
        process(chunk)?;
        processed += chunk.len();
        progress(processed);
        tracing::trace!(processed, total = items.len(), "sub-chunk committed");
        tokio::task::yield_now().await;
    }
    Ok(BatchOutcome::Completed { processed })
}
