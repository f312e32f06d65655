//! Rate-limited worker-pool pipeline stages connected by bounded queues.
//!
//! This crate provides three stage kinds sharing one execution pattern: a
//! [`Source`] generating payloads, any number of [`Pipe`]s transforming them,
//! and a [`Sink`] consuming them. Stages are linked by bounded queues and
//! each fans its input out to a fixed pool of worker threads throttled by a
//! shared rate limiter, so a slow or throttled stage slows its upstream
//! through blocking queue writes rather than unbounded buffering.
//!
//! # Features
//!
//! - Bounded MPMC queues (crossbeam channels) connecting stages
//! - Fixed-size worker pool per stage with an aggregate ops/sec ceiling
//! - End-to-end backpressure via blocking pushes
//! - Per-item failure isolation: a bad payload is dropped and logged, the
//!   stage keeps running
//! - Per-stage metrics: throughput, failure counts, latency percentiles
//! - Payload-generic stages; plain closures accepted as callbacks
//!
//! # Example
//!
//! ```ignore
//! use conveyor::{Config, Emitter, Pipeline};
//!
//! let cfg = Config::new(10, 3, 5, 5);
//!
//! let done = Pipeline::source(cfg, |out: &Emitter<u64>| {
//!     for i in 1..=10 {
//!         out.emit(i);
//!     }
//! })?
//! .pipe(cfg, |x: u64| Ok(x * x))?
//! .sink(cfg, |x: u64| {
//!     println!("{x}");
//!     Ok(())
//! })?;
//!
//! done.wait()?;
//! ```
//!
//! Output order is not guaranteed once a stage runs more than one worker;
//! with a single worker, input order is preserved.

pub mod config;
pub mod error;
pub mod job;
pub mod limit;
pub mod metrics;
pub mod pipe;
pub mod pipeline;
pub mod sink;
pub mod source;

// Re-exports for convenience
pub use config::Config;
pub use error::{PipelineError, Result};
pub use job::Job;
pub use limit::{Pacer, RateLimiter};
pub use metrics::{MetricsSnapshot, StageMetrics};
pub use pipe::{Pipe, Processor};
pub use pipeline::Pipeline;
pub use sink::{Completion, Handler, Sink};
pub use source::{Emitter, Generator, Source};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
