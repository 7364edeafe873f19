//! # Pull-based Stream Combinators for Rust
//!
//! This crate provides a small set of composable asynchronous stream
//! combinators on top of a pull-based, backpressure-aware streaming
//! substrate built on tokio.
//!
//! ## Core Concepts
//!
//! - **ReadableStream**: a source of values, consumed through one exclusive reader
//! - **TransformStream**: a stage with a writable input and a readable output
//! - **Controller**: the push side of a readable stream, exposing downstream demand
//! - **Pipe**: connects a readable stream to a stage, propagating end, errors and cancellation
//!
//! ## Combinators
//!
//! - [`from_event`]: bridges an event target into a stream
//! - [`interval`]: a timer stage emitting the current instant
//! - [`map`]: element-wise transform
//! - [`switch_map`]: stream-valued transform
//! - [`take_until`]: truncates a stream at a notifier's first value
//! - [`race`]: merges streams by arrival order
//!
//! Stages and merged streams run on spawned tasks, so they must be created
//! inside a tokio runtime.
//!
//! ## Example
//!
//! ```rust
//! use pullweld::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let out = from_iter(vec![1, 2, 3])?
//!         .pipe_through(map(|x: i32| x * 2)?)?
//!         .pipe_through(switch_map(|x: &i32| from_iter(vec![*x, x + 1]))?)?;
//!
//!     assert_eq!(
//!         out.collect().await?,
//!         vec![(2, 2), (2, 3), (4, 4), (4, 5), (6, 6), (6, 7)]
//!     );
//!     Ok(())
//! }
//! ```

pub mod clock;
pub mod config;
pub mod core;
pub mod event;
pub mod pipeline;
pub mod processors;
pub mod sources;
pub mod streams;

#[cfg(test)]
mod test_support;

// Re-export commonly used items
pub mod prelude {
    pub use crate::clock::{Clock, TokioClock};
    pub use crate::config::StreamConfig;
    pub use crate::core::{Controller, Error, Result, Transformer, UnderlyingSource};
    pub use crate::event::{EventBus, EventTarget};
    pub use crate::processors::{
        interval, interval_with_clock, map, map_async, switch_map, switch_map_with, take_until,
        try_map, SwitchMapOptions, SwitchMode,
    };
    pub use crate::sources::{from_event, from_iter, from_stream, race, race_with_config};
    pub use crate::streams::{ReadableStream, Reader, TransformStream, WritableStream, Writer};
}

// Re-export the combinators and the main error type
pub use crate::core::{Error, Result};
pub use processors::{interval, map, switch_map, take_until};
pub use sources::{from_event, race};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
