//! Rayon thread pool for stepping the host simulation.
//!
//! Background pool merges always run on rayon's global pool; this only decides
//! where ship physics runs. Zero workers means "use the global pool".

use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::error::Result;

#[derive(Debug, Default)]
pub struct WorkerPool {
    pool: Option<ThreadPool>,
}

impl WorkerPool {
    /// Use rayon's global pool (all CPU cores).
    pub fn global() -> Self {
        Self::default()
    }

    /// Dedicated pool with exactly `n` threads; `0` falls back to [WorkerPool::global].
    pub fn with_workers(n: usize) -> Result<Self> {
        if n == 0 {
            return Ok(Self::global());
        }
        let pool = ThreadPoolBuilder::new()
            .num_threads(n)
            .thread_name(|index| format!("podium-sim-{index}"))
            .build()?;
        Ok(Self { pool: Some(pool) })
    }

    pub fn workers(&self) -> usize {
        match &self.pool {
            Some(pool) => pool.current_num_threads(),
            None => rayon::current_num_threads(),
        }
    }

    /// Run `f` inside this pool so its rayon iterators use these workers.
    pub fn install<F, R>(&self, f: F) -> R
    where
        F: FnOnce() -> R + Send,
        R: Send,
    {
        match &self.pool {
            Some(pool) => pool.install(f),
            None => f(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rayon::prelude::*;

    #[test]
    fn dedicated_pool_reports_its_size() {
        let pool = WorkerPool::with_workers(2).unwrap();
        assert_eq!(pool.workers(), 2);
        let inside = pool.install(rayon::current_num_threads);
        assert_eq!(inside, 2);
    }

    #[test]
    fn zero_workers_is_global() {
        let pool = WorkerPool::with_workers(0).unwrap();
        let sum: u64 = pool.install(|| (1..=100_u64).into_par_iter().sum());
        assert_eq!(sum, 5050);
        assert!(pool.workers() >= 1);
    }
}
