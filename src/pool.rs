//! Bounded worker pool shared by local reads and remote blob fetches.

use crate::error::SnapcubeError;
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Cooperative cancellation shared between the caller and every worker.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Fails with [`SnapcubeError::Cancelled`] once cancellation was requested.
    pub fn check(&self) -> Result<(), SnapcubeError> {
        if self.is_cancelled() {
            Err(SnapcubeError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Runs `task` over `items` on at most `workers` threads.
///
/// Results come back in no particular order. Once `cancel` is set no new item
/// is started and the whole batch fails with [`SnapcubeError::Cancelled`].
#[cfg(feature = "parallel")]
pub(crate) fn run_bounded<T, R, F>(
    items: Vec<T>,
    workers: usize,
    cancel: &CancellationFlag,
    task: F,
) -> Result<Vec<R>, SnapcubeError>
where
    T: Send,
    R: Send,
    F: Fn(T) -> R + Send + Sync,
{
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers.max(1))
        .thread_name(|i| format!("snapcube-worker-{}", i))
        .build()
        .map_err(|e| SnapcubeError::Pool(e.to_string()))?;
    let results: Vec<R> = pool.install(|| {
        items
            .into_par_iter()
            .filter_map(|item| {
                if cancel.is_cancelled() {
                    None
                } else {
                    Some(task(item))
                }
            })
            .collect()
    });
    cancel.check()?;
    Ok(results)
}

#[cfg(not(feature = "parallel"))]
pub(crate) fn run_bounded<T, R, F>(
    items: Vec<T>,
    _workers: usize,
    cancel: &CancellationFlag,
    task: F,
) -> Result<Vec<R>, SnapcubeError>
where
    T: Send,
    R: Send,
    F: Fn(T) -> R + Send + Sync,
{
    let mut results = Vec::with_capacity(items.len());
    for item in items {
        cancel.check()?;
        results.push(task(item));
    }
    Ok(results)
}
