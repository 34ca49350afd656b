//! Background Tasks Module
//!
//! Contains background tasks that run periodically during server operation.
//!
//! # Tasks
//! - Expiry sweep: reclaims expired cache entries and idle client windows

mod sweeper;

pub use sweeper::{spawn_sweeper, sweep_once, SweeperHandle};
