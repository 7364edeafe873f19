//! Core traits for the stream system.
//!
//! Streams are pull-based: a reader asks for the next value and the
//! underlying source is only pulled when the stream's queue is empty.
//! Sources that are driven from outside (events, timers, other streams)
//! push into their [`Controller`] instead and let the reader wait.

use async_trait::async_trait;

use crate::core::controller::Controller;
use crate::core::error::Result;

/// The producer behind a [`ReadableStream`](crate::streams::ReadableStream).
///
/// # Examples
///
/// ```rust
/// use async_trait::async_trait;
/// use pullweld::core::{Controller, Result, UnderlyingSource};
///
/// struct Countdown(u32);
///
/// #[async_trait]
/// impl UnderlyingSource for Countdown {
///     type Item = u32;
///
///     async fn pull(&mut self, controller: &Controller<u32>) -> Result<()> {
///         if self.0 == 0 {
///             controller.close();
///             return Ok(());
///         }
///         self.0 -= 1;
///         controller.enqueue(self.0)
///     }
/// }
/// ```
#[async_trait]
pub trait UnderlyingSource: Send {
    /// The type of items this source produces
    type Item: Send + 'static;

    /// Called once when the stream is constructed.
    ///
    /// Acquire external resources here. An error aborts construction.
    fn start(&mut self, _controller: &Controller<Self::Item>) -> Result<()> {
        Ok(())
    }

    /// Called when the reader finds the queue empty.
    ///
    /// Implementations enqueue zero or more items, or close the controller
    /// once exhausted. Push-driven sources leave this as a no-op.
    async fn pull(&mut self, _controller: &Controller<Self::Item>) -> Result<()> {
        Ok(())
    }

    /// Called at most once when the consumer cancels the stream.
    ///
    /// Release everything acquired in `start` here.
    async fn cancel(&mut self) -> Result<()> {
        Ok(())
    }
}

/// The processing logic behind a
/// [`TransformStream`](crate::streams::TransformStream).
///
/// # Examples
///
/// ```rust
/// use async_trait::async_trait;
/// use pullweld::core::{Controller, Result, Transformer};
///
/// struct Double;
///
/// #[async_trait]
/// impl Transformer for Double {
///     type Input = i32;
///     type Output = i32;
///
///     async fn transform(&mut self, chunk: i32, controller: &Controller<i32>) -> Result<()> {
///         controller.enqueue(chunk * 2)
///     }
/// }
/// ```
#[async_trait]
pub trait Transformer: Send + 'static {
    /// The type of items written to the stage
    type Input: Send + 'static;
    /// The type of items read from the stage
    type Output: Send + 'static;

    /// Called once when the stage is constructed.
    fn start(&mut self, _controller: &Controller<Self::Output>) -> Result<()> {
        Ok(())
    }

    /// Process one input chunk, enqueueing any number of outputs.
    ///
    /// The next chunk is not delivered until this returns. Returning an
    /// error aborts the stage. Cancelling the output waits for a running
    /// call, so long waits should also watch `controller.closed()`.
    async fn transform(
        &mut self,
        chunk: Self::Input,
        controller: &Controller<Self::Output>,
    ) -> Result<()>;

    /// Called when the input side is closed, before the output closes.
    async fn flush(&mut self, _controller: &Controller<Self::Output>) -> Result<()> {
        Ok(())
    }

    /// Called once when the stage stops, after its output has closed,
    /// failed or been cancelled.
    ///
    /// Cancel every stream and task attached in `start` or `transform`
    /// here. The output's cancellation does not return before this does.
    async fn cancel(&mut self) -> Result<()> {
        Ok(())
    }
}
