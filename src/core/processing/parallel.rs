//! Bounded, order-preserving fan-out of per-volume work.
//!
//! Every stage builds its own rayon pool from an explicit [`Workers`] value, so there is
//! no process-wide concurrency default to leak between callers.
use std::num::NonZeroUsize;

use rayon::ThreadPoolBuilder;
use rayon::prelude::*;
use tracing::debug;

use crate::error::{Error, Result};

/// How many OS threads a stage may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Workers {
    /// Run in the calling thread, one item after another
    #[default]
    Sequential,
    /// One thread per available processing unit
    All,
    Fixed(NonZeroUsize),
}

impl Workers {
    /// Parse a user-facing worker count: absent means sequential, `-1` means all
    /// processing units, `n >= 1` means `n` threads. Anything else is rejected.
    pub fn from_count(count: Option<i64>) -> Result<Self> {
        match count {
            None => Ok(Workers::Sequential),
            Some(-1) => Ok(Workers::All),
            Some(n) if n >= 1 => usize::try_from(n)
                .ok()
                .and_then(NonZeroUsize::new)
                .map(Workers::Fixed)
                .ok_or(Error::InvalidConcurrency { count: n }),
            Some(n) => Err(Error::InvalidConcurrency { count: n }),
        }
    }

    /// Pool size, or `None` for in-thread execution. Fixed counts are clamped to the
    /// number of available processing units.
    pub fn threads(self) -> Option<usize> {
        let available = std::thread::available_parallelism()
            .map(NonZeroUsize::get)
            .unwrap_or(1);
        match self {
            Workers::Sequential => None,
            Workers::All => Some(available),
            Workers::Fixed(n) if n.get() > available => {
                debug!(
                    "Requested {} workers but only {} processing units are available; clamping",
                    n, available
                );
                Some(available)
            }
            Workers::Fixed(n) => Some(n.get()),
        }
    }
}

impl std::fmt::Display for Workers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Workers::Sequential => write!(f, "sequential"),
            Workers::All => write!(f, "all"),
            Workers::Fixed(n) => write!(f, "{}", n),
        }
    }
}

/// Apply `f(index, item)` to every item and return the results in input order.
///
/// All items run even when some fail; the error then names the lowest failing index
/// together with the number of failures.
pub fn map_parallel<T, R, F>(items: Vec<T>, workers: Workers, f: F) -> Result<Vec<R>>
where
    T: Send,
    R: Send,
    F: Fn(usize, T) -> Result<R> + Sync,
{
    if items.is_empty() {
        return Ok(Vec::new());
    }

    let results: Vec<Result<R>> = match workers.threads() {
        None => items
            .into_iter()
            .enumerate()
            .map(|(i, item)| f(i, item))
            .collect(),
        Some(threads) => {
            debug!("Dispatching {} items on {} threads", items.len(), threads);
            let pool = ThreadPoolBuilder::new()
                .num_threads(threads)
                .thread_name(|i| format!("volprep-worker-{}", i))
                .build()?;
            pool.install(|| {
                items
                    .into_par_iter()
                    .enumerate()
                    .map(|(i, item)| f(i, item))
                    .collect()
            })
        }
    };

    collect_ordered(results)
}

fn collect_ordered<R>(results: Vec<Result<R>>) -> Result<Vec<R>> {
    let mut out = Vec::with_capacity(results.len());
    let mut first_failure = None;
    let mut failed = 0;
    for (index, result) in results.into_iter().enumerate() {
        match result {
            Ok(value) => out.push(value),
            Err(e) => {
                failed += 1;
                first_failure.get_or_insert((index, e));
            }
        }
    }
    match first_failure {
        Some((index, source)) => Err(Error::Worker {
            index,
            failed,
            source: Box::new(source),
        }),
        None => Ok(out),
    }
}
