//! FILENAME: core/connect/src/pool.rs
//! Crate-local rayon pool for chunked CSV parsing.

use std::sync::OnceLock;

use rayon::ThreadPool;

static WORKER_POOL: OnceLock<Option<ThreadPool>> = OnceLock::new();

/// One thread per core, leaving one for the caller.
pub fn worker_threads() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get().saturating_sub(1))
        .unwrap_or(1)
        .max(1)
}

fn build_worker_pool() -> Option<ThreadPool> {
    let threads = worker_threads();
    let build = |n: usize| {
        rayon::ThreadPoolBuilder::new()
            .num_threads(n)
            .thread_name(|i| format!("pivot-connect-{}", i))
            .build()
    };
    match build(threads) {
        Ok(pool) => Some(pool),
        Err(err) => {
            log::warn!("worker pool with {} threads failed to start: {}", threads, err);
            build(1).ok()
        }
    }
}

/// The shared pool, or `None` when no pool could be started. Callers fall
/// back to parsing on the current thread.
pub fn worker_pool() -> Option<&'static ThreadPool> {
    WORKER_POOL.get_or_init(build_worker_pool).as_ref()
}
