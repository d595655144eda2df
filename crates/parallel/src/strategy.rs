//! Parallel processing strategies

use landshift_core::Result;
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Processing mode for data-parallel work
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ProcessingMode {
    /// Single-threaded processing
    Sequential,
    /// Parallel processing on rayon's global pool
    #[default]
    Parallel,
    /// Parallel on a dedicated pool of `n` threads, built for one call and
    /// torn down when it returns
    ParallelWith(usize),
}

/// Strategy for parallel execution over an index range.
///
/// Results of `par_map` are always returned in index order, whatever the
/// scheduling, so callers can rely on deterministic output.
pub trait ParallelStrategy {
    /// Execute a function over indices
    fn par_for_each<F>(&self, range: Range<usize>, f: F) -> Result<()>
    where
        F: Fn(usize) + Sync + Send;

    /// Map a function over indices and collect results in index order
    fn par_map<T, F>(&self, range: Range<usize>, f: F) -> Result<Vec<T>>
    where
        T: Send,
        F: Fn(usize) -> T + Sync + Send;
}

impl ProcessingMode {
    /// Number of worker threads this mode will use
    pub fn threads(&self) -> usize {
        match self {
            ProcessingMode::Sequential => 1,
            ProcessingMode::Parallel => num_cpus(),
            ProcessingMode::ParallelWith(n) => (*n).max(1),
        }
    }

    #[cfg(feature = "parallel")]
    fn scoped_pool(threads: usize) -> Result<rayon::ThreadPool> {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads.max(1))
            .build()
            .map_err(|e| landshift_core::Error::ThreadPool(e.to_string()))
    }
}

impl ParallelStrategy for ProcessingMode {
    fn par_for_each<F>(&self, range: Range<usize>, f: F) -> Result<()>
    where
        F: Fn(usize) + Sync + Send,
    {
        match self {
            #[cfg(feature = "parallel")]
            ProcessingMode::Parallel => {
                range.into_par_iter().for_each(f);
            }
            #[cfg(feature = "parallel")]
            ProcessingMode::ParallelWith(threads) => {
                let pool = Self::scoped_pool(*threads)?;
                pool.install(|| range.into_par_iter().for_each(f));
            }
            _ => range.for_each(f),
        }
        Ok(())
    }

    fn par_map<T, F>(&self, range: Range<usize>, f: F) -> Result<Vec<T>>
    where
        T: Send,
        F: Fn(usize) -> T + Sync + Send,
    {
        match self {
            #[cfg(feature = "parallel")]
            ProcessingMode::Parallel => Ok(range.into_par_iter().map(f).collect()),
            #[cfg(feature = "parallel")]
            ProcessingMode::ParallelWith(threads) => {
                let pool = Self::scoped_pool(*threads)?;
                Ok(pool.install(|| range.into_par_iter().map(f).collect()))
            }
            _ => Ok(range.map(f).collect()),
        }
    }
}

/// Get the number of available worker threads
pub fn num_cpus() -> usize {
    #[cfg(feature = "parallel")]
    {
        rayon::current_num_threads()
    }
    #[cfg(not(feature = "parallel"))]
    {
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_par_map_preserves_order() {
        for mode in [
            ProcessingMode::Sequential,
            ProcessingMode::Parallel,
            ProcessingMode::ParallelWith(3),
        ] {
            let out = mode.par_map(0..100, |i| i * 2).unwrap();
            let expected: Vec<usize> = (0..100).map(|i| i * 2).collect();
            assert_eq!(out, expected, "mode {:?}", mode);
        }
    }

    #[test]
    fn test_par_for_each_visits_all() {
        let counter = AtomicUsize::new(0);
        ProcessingMode::ParallelWith(2)
            .par_for_each(0..50, |_| {
                counter.fetch_add(1, Ordering::Relaxed);
            })
            .unwrap();
        assert_eq!(counter.load(Ordering::Relaxed), 50);
    }

    #[test]
    fn test_threads() {
        assert_eq!(ProcessingMode::Sequential.threads(), 1);
        assert_eq!(ProcessingMode::ParallelWith(0).threads(), 1);
        assert_eq!(ProcessingMode::ParallelWith(4).threads(), 4);
    }

    #[cfg(not(feature = "parallel"))]
    #[test]
    fn test_without_rayon_every_mode_runs_inline() {
        assert_eq!(num_cpus(), 1);
        assert_eq!(ProcessingMode::Parallel.threads(), 1);
        let out = ProcessingMode::ParallelWith(4).par_map(0..5, |i| i + 1).unwrap();
        assert_eq!(out, vec![1, 2, 3, 4, 5]);
    }
}
