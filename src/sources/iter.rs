//! Sources over iterators and async streams.

use async_trait::async_trait;
use futures::stream::{BoxStream, Stream, StreamExt};

use crate::core::{Controller, Result, UnderlyingSource};
use crate::streams::ReadableStream;

/// A source that yields the items of an iterator, one per pull
pub struct IterSource<I> {
    iter: I,
}

impl<I> IterSource<I> {
    /// Create a new iterator source
    pub fn new(iter: I) -> Self {
        Self { iter }
    }
}

#[async_trait]
impl<I> UnderlyingSource for IterSource<I>
where
    I: Iterator + Send,
    I::Item: Send + 'static,
{
    type Item = I::Item;

    async fn pull(&mut self, controller: &Controller<Self::Item>) -> Result<()> {
        match self.iter.next() {
            Some(item) => controller.enqueue(item),
            None => {
                controller.close();
                Ok(())
            }
        }
    }
}

/// A source that forwards the items of a [`futures::Stream`]
pub struct StreamSource<T> {
    stream: BoxStream<'static, T>,
}

impl<T> StreamSource<T> {
    /// Create a new stream source
    pub fn new<S>(stream: S) -> Self
    where
        S: Stream<Item = T> + Send + 'static,
    {
        Self {
            stream: stream.boxed(),
        }
    }
}

#[async_trait]
impl<T: Send + 'static> UnderlyingSource for StreamSource<T> {
    type Item = T;

    async fn pull(&mut self, controller: &Controller<T>) -> Result<()> {
        match self.stream.next().await {
            Some(item) => controller.enqueue(item),
            None => {
                controller.close();
                Ok(())
            }
        }
    }
}

/// A readable stream over the items of `items`.
pub fn from_iter<I>(items: I) -> Result<ReadableStream<I::Item>>
where
    I: IntoIterator,
    I::IntoIter: Send + 'static,
    I::Item: Send + 'static,
{
    ReadableStream::new(IterSource::new(items.into_iter()))
}

/// A readable stream over an async stream.
pub fn from_stream<S>(stream: S) -> Result<ReadableStream<S::Item>>
where
    S: Stream + Send + 'static,
    S::Item: Send + 'static,
{
    ReadableStream::new(StreamSource::new(stream))
}
