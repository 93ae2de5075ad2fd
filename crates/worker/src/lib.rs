//! Shared runtime primitives for the crosslink engine.
//!
//! - [`EpochClock`] marks the current navigation context and lets suspended
//!   work detect that it has been superseded.
//! - [`TaskScheduler`] owns named, replaceable, rate-limited deferred slots.
//! - [`spawn`] and friends attach worker classification to spawned tasks.

mod class;
mod epoch;
pub mod scheduler;
mod spawn;

pub use class::TaskClass;
pub use epoch::{EpochClock, EpochGuard, Superseded};
pub use scheduler::TaskScheduler;
pub use spawn::{spawn, spawn_blocking};
