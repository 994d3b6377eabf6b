//! Pelorus Environment Abstraction Layer
//!
//! This crate provides the "Sans-IO" abstraction that lets the fusion
//! engines run in both **Production** (tokio, wall clock) and
//! **Simulation** (virtual clock, seeded entropy) environments.
//!
//! # Core Concept
//!
//! The fusion cycle must be a single-threaded critical section: sensor
//! consumers only ever hand detections over through bounded queues, and the
//! cycle loop is the sole mutator of track state. This crate owns that
//! boundary:
//!
//! - Time (`now()`, `sleep()`) via [`FusionContext`]
//! - Detection hand-off via [`DetectionQueue`] (bounded, backpressure;
//!   detections are never dropped under overload)
//! - Output publication via [`EventSink`] (buffered, fire-and-forget
//!   relative to the cycle)
//!
//! # Example
//!
//! ```ignore
//! use pelorus_env::{FusionContext, DetectionQueue};
//!
//! async fn fusion_loop<Ctx: FusionContext>(ctx: &Ctx, queue: &mut DetectionQueue<Det>) {
//!     loop {
//!         let batch = queue.drain(256);
//!         run_cycle(batch);
//!         ctx.sleep(Duration::from_millis(500)).await;
//!     }
//! }
//! ```

mod context;
mod error;
mod queue;
mod sink;
mod tokio_impl;

pub use context::FusionContext;
pub use error::EnvError;
pub use queue::{DetectionQueue, QueueSender};
pub use sink::{EventSink, MemorySink};
pub use tokio_impl::TokioContext;
