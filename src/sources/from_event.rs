//! Bridging event targets into streams.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use crate::core::{Controller, Resource, Result, UnderlyingSource};
use crate::event::{EventTarget, Listener};
use crate::streams::ReadableStream;

/// A source that emits the payload of every event fired on a target.
///
/// The target is not pulled, so there is no backpressure: events are queued
/// without bound while the reader lags behind.
pub struct EventSource<T: EventTarget + ?Sized> {
    target: Arc<T>,
    event: String,
    registration: Option<Resource>,
}

impl<T: EventTarget + ?Sized + 'static> EventSource<T> {
    /// Create a source for `event` on `target`. Nothing is registered until
    /// the stream starts.
    pub fn new(target: Arc<T>, event: impl Into<String>) -> Self {
        Self {
            target,
            event: event.into(),
            registration: None,
        }
    }
}

#[async_trait]
impl<T: EventTarget + ?Sized + 'static> UnderlyingSource for EventSource<T> {
    type Item = T::Event;

    fn start(&mut self, controller: &Controller<T::Event>) -> Result<()> {
        let controller = controller.clone();
        let listener: Listener<T::Event> = Arc::new(move |payload: T::Event| {
            // Rejected only after cancellation, when the payload has no reader.
            let _ = controller.enqueue(payload);
        });
        let id = self.target.add_listener(&self.event, listener)?;
        debug!(event = %self.event, ?id, "event listener registered");

        let target = self.target.clone();
        let event = self.event.clone();
        self.registration = Some(Resource::new("from_event.listener", move || {
            target.remove_listener(&event, id);
            debug!(event = %event, ?id, "event listener removed");
        }));
        Ok(())
    }

    async fn cancel(&mut self) -> Result<()> {
        if let Some(registration) = self.registration.as_mut() {
            registration.release();
        }
        Ok(())
    }
}

/// A stream of the payloads of every `event` fired on `target`.
///
/// The listener is registered before this returns; a registration failure is
/// returned as an error. The stream never ends on its own. Cancelling or
/// dropping it removes the listener.
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use pullweld::event::EventBus;
/// use pullweld::sources::from_event;
///
/// # #[tokio::main]
/// # async fn main() -> pullweld::Result<()> {
/// let bus = Arc::new(EventBus::<(i32, i32)>::new());
/// let clicks = from_event(bus.clone(), "click")?;
/// let mut reader = clicks.get_reader()?;
///
/// bus.emit("click", (10, 20));
/// assert_eq!(reader.read().await?, Some((10, 20)));
///
/// reader.cancel().await?;
/// assert_eq!(bus.listener_count("click"), 0);
/// # Ok(())
/// # }
/// ```
pub fn from_event<T>(target: Arc<T>, event: impl Into<String>) -> Result<ReadableStream<T::Event>>
where
    T: EventTarget + ?Sized + 'static,
{
    ReadableStream::new(EventSource::new(target, event))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Error;
    use crate::event::EventBus;

    #[tokio::test]
    async fn test_emits_events_in_order() {
        let bus = Arc::new(EventBus::<&str>::new());
        let stream = from_event(bus.clone(), "x").unwrap();
        assert_eq!(bus.listener_count("x"), 1);

        let mut reader = stream.get_reader().unwrap();
        bus.emit("x", "e1");
        bus.emit("x", "e2");
        bus.emit("x", "e3");

        assert_eq!(reader.read().await.unwrap(), Some("e1"));
        assert_eq!(reader.read().await.unwrap(), Some("e2"));
        assert_eq!(reader.read().await.unwrap(), Some("e3"));
    }

    #[tokio::test]
    async fn test_cancel_removes_listener() {
        let bus = Arc::new(EventBus::<i32>::new());
        let stream = from_event(bus.clone(), "x").unwrap();
        let mut reader = stream.get_reader().unwrap();

        bus.emit("x", 1);
        reader.cancel().await.unwrap();
        assert_eq!(bus.listener_count("x"), 0);

        assert_eq!(bus.emit("x", 2), 0);
        assert_eq!(reader.read().await.unwrap(), None);
        reader.cancel().await.unwrap();
        assert_eq!(bus.listener_count("x"), 0);
    }

    #[tokio::test]
    async fn test_drop_removes_listener() {
        let bus = Arc::new(EventBus::<u8>::new());
        let stream = from_event(bus.clone(), "x").unwrap();
        assert_eq!(bus.listener_count("x"), 1);

        drop(stream);
        assert_eq!(bus.listener_count("x"), 0);
    }

    #[tokio::test]
    async fn test_registration_failure_surfaces_at_construction() {
        let bus = Arc::new(EventBus::<u8>::with_max_listeners(0));
        let result = from_event(bus.clone(), "x");

        assert!(matches!(result, Err(Error::Listener { .. })));
        assert_eq!(bus.listener_count("x"), 0);
    }

    #[tokio::test]
    async fn test_read_is_pending_until_event() {
        let bus = Arc::new(EventBus::<i32>::new());
        let stream = from_event(bus.clone(), "x").unwrap();
        let mut reader = stream.get_reader().unwrap();

        let mut read = tokio_test::task::spawn(reader.read());
        tokio_test::assert_pending!(read.poll());

        bus.emit("x", 5);
        assert!(read.is_woken());
        assert_eq!(tokio_test::assert_ready!(read.poll()).unwrap(), Some(5));
    }

    #[tokio::test]
    async fn test_reader_waits_for_next_event() {
        let bus = Arc::new(EventBus::<i32>::new());
        let stream = from_event(bus.clone(), "x").unwrap();
        let mut reader = stream.get_reader().unwrap();

        let read = tokio::spawn(async move { reader.read().await });
        tokio::task::yield_now().await;
        bus.emit("x", 42);

        assert_eq!(read.await.unwrap().unwrap(), Some(42));
    }
}
