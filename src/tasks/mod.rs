//! Background Tasks Module
//!
//! Contains the tasks that run for the lifetime of a cache.
//!
//! # Tasks
//! - Eviction worker: sole consumer of the mutation queue
//! - Expiration sweeper: schedules expired-entry sweeps at a fixed interval

mod cleanup;
mod worker;

pub(crate) use cleanup::spawn_cleanup_task;
pub(crate) use worker::spawn_eviction_worker;
