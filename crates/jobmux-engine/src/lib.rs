#![forbid(unsafe_code)]
#![deny(unreachable_pub)]

//! The job coordination manager: an id-keyed registry, three bounded
//! queues, a concurrency-capped dispatcher, and the per-job lifecycle
//! state machine tying them together.
//!
//! Construct a [`Manager`] with [`ManagerConfig`], `submit` or `tap` jobs
//! built from [`jobmux_core::Job`] (or [`jobmux_core::job_from_stream`]),
//! and drain the shared [`Manager::notifications`]/[`Manager::events`]
//! streams. See `jobmux-core` for the vocabulary this crate operates on.

mod cancel;
mod dispatcher;
mod error;
mod lifecycle;
mod manager;
mod queue;
mod registry;

pub use error::ManagerError;
pub use manager::{Manager, ManagerConfig};

pub use jobmux_core::{job_from_stream, BoxStream, Clock, Event, FixedClock, Job, JobItem, Status, SystemClock};
