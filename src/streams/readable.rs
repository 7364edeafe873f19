//! Readable streams and their exclusive readers.

use futures::stream::{self, Stream};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

use crate::config::StreamConfig;
use crate::core::controller::{Controller, Take};
use crate::core::{Error, Result, UnderlyingSource};

/// A pull-based stream of values.
///
/// Values are consumed through a [`Reader`]; only one reader can be
/// attached at a time.
pub struct ReadableStream<T> {
    inner: Arc<Inner<T>>,
}

struct Inner<T> {
    controller: Controller<T>,
    source: Mutex<Box<dyn UnderlyingSource<Item = T>>>,
    locked: AtomicBool,
    cancelled: AtomicBool,
}

impl<T: Send + 'static> ReadableStream<T> {
    /// Create a stream over `source` with the default configuration.
    pub fn new<S>(source: S) -> Result<Self>
    where
        S: UnderlyingSource<Item = T> + 'static,
    {
        Self::with_config(source, StreamConfig::default())
    }

    /// Create a stream over `source`.
    ///
    /// The source's `start` runs before this returns; its error is returned
    /// here and no stream is created.
    pub fn with_config<S>(mut source: S, config: StreamConfig) -> Result<Self>
    where
        S: UnderlyingSource<Item = T> + 'static,
    {
        let controller = Controller::new(config.high_water_mark);
        source.start(&controller)?;

        Ok(Self {
            inner: Arc::new(Inner {
                controller,
                source: Mutex::new(Box::new(source)),
                locked: AtomicBool::new(false),
                cancelled: AtomicBool::new(false),
            }),
        })
    }

    /// Attach the exclusive reader.
    ///
    /// Fails with [`Error::Locked`] while another reader is attached.
    pub fn get_reader(&self) -> Result<Reader<T>> {
        if self.inner.locked.swap(true, Ordering::AcqRel) {
            return Err(Error::Locked);
        }
        Ok(Reader {
            inner: self.inner.clone(),
        })
    }

    /// Whether a reader is attached.
    pub fn is_locked(&self) -> bool {
        self.inner.locked.load(Ordering::Acquire)
    }

    /// Remaining demand before the stream's queue reaches its high-water mark.
    pub fn desired_size(&self) -> isize {
        self.inner.controller.desired_size()
    }

    /// Cancel an unlocked stream, releasing its source.
    pub async fn cancel(&self) -> Result<()> {
        if self.is_locked() {
            return Err(Error::Locked);
        }
        self.inner.cancel().await
    }

    /// Read the stream to its end.
    pub async fn collect(self) -> Result<Vec<T>> {
        let mut reader = self.get_reader()?;
        let mut items = Vec::new();
        while let Some(item) = reader.read().await? {
            items.push(item);
        }
        Ok(items)
    }
}

impl<T: Send + 'static> Inner<T> {
    async fn cancel(&self) -> Result<()> {
        if self.cancelled.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let was_open = self.controller.is_open();
        self.controller.discard();
        if !was_open {
            return Ok(());
        }
        debug!("cancelling readable stream");
        self.source.lock().await.cancel().await
    }
}

impl<T> fmt::Debug for ReadableStream<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadableStream")
            .field("controller", &self.inner.controller)
            .field("locked", &self.inner.locked.load(Ordering::Acquire))
            .finish()
    }
}

/// The exclusive reader of a [`ReadableStream`].
///
/// Dropping the reader releases the lock without cancelling the stream.
pub struct Reader<T> {
    inner: Arc<Inner<T>>,
}

impl<T: Send + 'static> Reader<T> {
    /// Read the next value, or `None` once the stream has ended.
    ///
    /// Suspends until a value is available. After the end every further
    /// call returns `None` again; after a failure every call returns the
    /// same error.
    pub async fn read(&mut self) -> Result<Option<T>> {
        let controller = &self.inner.controller;
        let mut pulled = false;

        loop {
            match controller.take() {
                Take::Item(item) => return Ok(Some(item)),
                Take::Done => return Ok(None),
                Take::Failed(e) => return Err(e),
                Take::Empty if !pulled => {
                    pulled = true;
                    let mut source = self.inner.source.lock().await;
                    if let Err(e) = source.pull(controller).await {
                        debug!(error = %e, "source pull failed");
                        controller.error(e);
                    }
                }
                Take::Empty => {
                    let _pending = PendingRead::new(controller);
                    controller.wait_readable().await;
                    pulled = false;
                }
            }
        }
    }

    /// Cancel the stream, discarding queued values and releasing its
    /// source. Idempotent; a no-op on a stream that already ended.
    pub async fn cancel(&mut self) -> Result<()> {
        self.inner.cancel().await
    }

    /// Resolves once the stream is closed, errored or cancelled.
    pub async fn closed(&self) {
        self.inner.controller.closed().await
    }

    /// Detach from the stream so that another reader can be attached.
    pub fn release_lock(self) {}

    /// Adapt the reader into a [`futures::Stream`].
    ///
    /// The adapter ends after the first error.
    pub fn into_stream(self) -> impl Stream<Item = Result<T>> + Send {
        stream::unfold(Some(self), |state| async move {
            let mut reader = state?;
            match reader.read().await {
                Ok(Some(item)) => Some((Ok(item), Some(reader))),
                Ok(None) => None,
                Err(e) => Some((Err(e), None)),
            }
        })
    }
}

impl<T> Drop for Reader<T> {
    fn drop(&mut self) {
        self.inner.locked.store(false, Ordering::Release);
    }
}

impl<T> fmt::Debug for Reader<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reader")
            .field("controller", &self.inner.controller)
            .finish()
    }
}

/// Marks a read parked on an empty queue for as long as it waits.
struct PendingRead<'a, T> {
    controller: &'a Controller<T>,
}

impl<'a, T> PendingRead<'a, T> {
    fn new(controller: &'a Controller<T>) -> Self {
        controller.set_read_pending(true);
        Self { controller }
    }
}

impl<T> Drop for PendingRead<'_, T> {
    fn drop(&mut self) {
        self.controller.set_read_pending(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::from_iter;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;

    struct Cancellable {
        cancels: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl UnderlyingSource for Cancellable {
        type Item = u8;

        async fn cancel(&mut self) -> Result<()> {
            self.cancels.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct Failing;

    #[async_trait]
    impl UnderlyingSource for Failing {
        type Item = u8;

        fn start(&mut self, _controller: &Controller<u8>) -> Result<()> {
            Err(Error::custom("refused"))
        }
    }

    #[tokio::test]
    async fn test_read_until_exhausted() {
        let stream = from_iter(vec![1, 2, 3]).unwrap();
        let mut reader = stream.get_reader().unwrap();

        assert_eq!(reader.read().await.unwrap(), Some(1));
        assert_eq!(reader.read().await.unwrap(), Some(2));
        assert_eq!(reader.read().await.unwrap(), Some(3));
        assert_eq!(reader.read().await.unwrap(), None);
        assert_eq!(reader.read().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_second_reader_is_rejected() {
        let stream = from_iter(vec![1]).unwrap();
        let reader = stream.get_reader().unwrap();

        assert!(stream.is_locked());
        assert!(matches!(stream.get_reader(), Err(Error::Locked)));

        reader.release_lock();
        assert!(!stream.is_locked());
        assert!(stream.get_reader().is_ok());
    }

    #[tokio::test]
    async fn test_cancel_runs_source_cancel_once() {
        let cancels = Arc::new(AtomicUsize::new(0));
        let stream = ReadableStream::new(Cancellable {
            cancels: cancels.clone(),
        })
        .unwrap();
        let mut reader = stream.get_reader().unwrap();

        reader.cancel().await.unwrap();
        reader.cancel().await.unwrap();

        assert_eq!(cancels.load(Ordering::SeqCst), 1);
        assert_eq!(reader.read().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_cancel_locked_stream_fails() {
        let stream = from_iter(vec![1]).unwrap();
        let _reader = stream.get_reader().unwrap();

        assert!(matches!(stream.cancel().await, Err(Error::Locked)));
    }

    #[tokio::test]
    async fn test_start_error_surfaces_at_construction() {
        let result = ReadableStream::new(Failing);
        assert!(matches!(result, Err(Error::Custom(_))));
    }

    #[tokio::test]
    async fn test_into_stream() {
        use futures::StreamExt;

        let stream = from_iter(vec!["a", "b"]).unwrap();
        let items: Vec<_> = stream
            .get_reader()
            .unwrap()
            .into_stream()
            .map(|item| item.unwrap())
            .collect()
            .await;

        assert_eq!(items, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_collect() {
        let stream = from_iter(1..=4).unwrap();
        assert_eq!(stream.collect().await.unwrap(), vec![1, 2, 3, 4]);
    }
}
