//! Source implementations for the pullweld library.
//!
//! This module provides the streams that start a pipeline: event bridges,
//! iterator and async-stream adapters, and the arrival-order merge of
//! several streams.

pub mod from_event;
pub mod iter;
pub mod race;

pub use from_event::{from_event, EventSource};
pub use iter::{from_iter, from_stream, IterSource, StreamSource};
pub use race::{race, race_with_config, RaceSource};
