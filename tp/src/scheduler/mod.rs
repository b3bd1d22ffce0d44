//! Bounded worker pool for specialist tasks
//!
//! A semaphore caps how many tasks run at once. Waiting for a slot and
//! running the task both abort promptly when the caller's cancellation token
//! fires.

mod pool;

pub use pool::{PoolError, PoolStats, WorkerPool};
