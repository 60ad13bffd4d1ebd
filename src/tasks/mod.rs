//! Background Tasks Module
//!
//! Contains the background tasks the cache spawns on the tokio runtime.
//!
//! # Tasks
//! - Entry expiration: removes a single entry once its deadline passes

mod expiry;

pub(crate) use expiry::spawn_expiry_task;
