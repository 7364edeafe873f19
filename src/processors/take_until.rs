//! Truncating a stream at a notifier's first value.

use async_trait::async_trait;
use std::marker::PhantomData;
use tracing::debug;

use crate::core::{Controller, Result, TaskGuard, Transformer};
use crate::streams::{ReadableStream, Reader, TransformStream};

/// A transformer that forwards chunks until a notifier stream fires.
pub struct TakeUntil<T> {
    notifier: Option<Reader<T>>,
    watcher: Option<TaskGuard>,
    _item: PhantomData<fn(T)>,
}

impl<T: Send + 'static> TakeUntil<T> {
    /// Create a transformer watching `notifier`, locking it immediately.
    pub fn new(notifier: &ReadableStream<T>) -> Result<Self> {
        Ok(Self {
            notifier: Some(notifier.get_reader()?),
            watcher: None,
            _item: PhantomData,
        })
    }
}

#[async_trait]
impl<T: Send + 'static> Transformer for TakeUntil<T> {
    type Input = T;
    type Output = T;

    fn start(&mut self, controller: &Controller<T>) -> Result<()> {
        if let Some(notifier) = self.notifier.take() {
            self.watcher = Some(TaskGuard::spawn(
                "take_until.watcher",
                watch(notifier, controller.clone()),
            ));
        }
        Ok(())
    }

    async fn transform(&mut self, chunk: T, controller: &Controller<T>) -> Result<()> {
        controller.enqueue(chunk)
    }

    async fn cancel(&mut self) -> Result<()> {
        // The output has ended, so the watcher is on its way out and
        // cancels the notifier.
        if let Some(mut watcher) = self.watcher.take() {
            watcher.join().await?;
        }
        Ok(())
    }
}

async fn watch<T: Send + 'static>(mut notifier: Reader<T>, controller: Controller<T>) {
    let first = tokio::select! {
        biased;
        _ = controller.closed() => None,
        first = notifier.read() => Some(first),
    };

    match first {
        Some(Ok(Some(value))) => {
            debug!("notifier fired; closing stage");
            if controller.enqueue(value).is_ok() {
                controller.close();
            }
        }
        // An exhausted notifier never ends the stage.
        Some(Ok(None)) => debug!("notifier ended without a value"),
        Some(Err(e)) => {
            debug!(error = %e, "notifier failed; aborting stage");
            controller.error(e);
        }
        None => {}
    }

    if let Err(e) = notifier.cancel().await {
        debug!(error = %e, "failed to cancel notifier");
    }
}

/// A stage that passes chunks through unchanged until `notifier` yields its
/// first value, then emits that value and closes.
///
/// Once closed, no further input is forwarded, including chunks already
/// written, and the input side stops accepting chunks. If `notifier` ends
/// without a value the stage keeps passing input through. The notifier is
/// locked here; a notifier that already has a reader is an error.
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use pullweld::event::EventBus;
/// use pullweld::processors::take_until;
/// use pullweld::sources::from_event;
///
/// # #[tokio::main]
/// # async fn main() -> pullweld::Result<()> {
/// let bus = Arc::new(EventBus::<&str>::new());
/// let stage = take_until(&from_event(bus.clone(), "stop")?)?;
/// let mut writer = stage.writable().get_writer()?;
/// let mut reader = stage.readable().get_reader()?;
///
/// writer.write("a").await?;
/// assert_eq!(reader.read().await?, Some("a"));
///
/// bus.emit("stop", "done");
/// assert_eq!(reader.read().await?, Some("done"));
/// assert_eq!(reader.read().await?, None);
/// # Ok(())
/// # }
/// ```
pub fn take_until<T: Send + 'static>(notifier: &ReadableStream<T>) -> Result<TransformStream<T, T>> {
    TransformStream::new(TakeUntil::new(notifier)?)
}
