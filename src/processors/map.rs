//! Element-wise transforms.

use async_trait::async_trait;
use std::future::Future;
use std::marker::PhantomData;

use crate::core::{Controller, Error, Result, Transformer};
use crate::streams::TransformStream;

/// A transformer that applies a function to each chunk.
pub struct Map<F, I, O> {
    f: F,
    _types: PhantomData<fn(I) -> O>,
}

impl<F, I, O> Map<F, I, O> {
    /// Create a new map transformer
    pub fn new(f: F) -> Self {
        Self {
            f,
            _types: PhantomData,
        }
    }
}

#[async_trait]
impl<F, I, O> Transformer for Map<F, I, O>
where
    F: FnMut(I) -> O + Send + 'static,
    I: Send + 'static,
    O: Send + 'static,
{
    type Input = I;
    type Output = O;

    async fn transform(&mut self, chunk: I, controller: &Controller<O>) -> Result<()> {
        controller.enqueue((self.f)(chunk))
    }
}

/// A transformer that applies a fallible function to each chunk.
pub struct TryMap<F, I, O, E> {
    f: F,
    _types: PhantomData<fn(I) -> std::result::Result<O, E>>,
}

impl<F, I, O, E> TryMap<F, I, O, E> {
    /// Create a new fallible map transformer
    pub fn new(f: F) -> Self {
        Self {
            f,
            _types: PhantomData,
        }
    }
}

#[async_trait]
impl<F, I, O, E> Transformer for TryMap<F, I, O, E>
where
    F: FnMut(I) -> std::result::Result<O, E> + Send + 'static,
    I: Send + 'static,
    O: Send + 'static,
    E: Into<Error> + 'static,
{
    type Input = I;
    type Output = O;

    async fn transform(&mut self, chunk: I, controller: &Controller<O>) -> Result<()> {
        let item = (self.f)(chunk).map_err(Into::into)?;
        controller.enqueue(item)
    }
}

/// A transformer that awaits an asynchronous function for each chunk.
///
/// Chunks are processed one at a time; the next call starts after the
/// previous future resolved.
pub struct MapAsync<F, I> {
    f: F,
    _input: PhantomData<fn(I)>,
}

impl<F, I> MapAsync<F, I> {
    /// Create a new async map transformer
    pub fn new(f: F) -> Self {
        Self {
            f,
            _input: PhantomData,
        }
    }
}

#[async_trait]
impl<F, Fut, I, O> Transformer for MapAsync<F, I>
where
    F: FnMut(I) -> Fut + Send + 'static,
    Fut: Future<Output = Result<O>> + Send + 'static,
    I: Send + 'static,
    O: Send + 'static,
{
    type Input = I;
    type Output = O;

    async fn transform(&mut self, chunk: I, controller: &Controller<O>) -> Result<()> {
        let item = tokio::select! {
            biased;
            _ = controller.closed() => return Ok(()),
            item = (self.f)(chunk) => item?,
        };
        controller.enqueue(item)
    }
}

/// A stage that emits `f(x)` for every chunk `x`, in order.
///
/// A panic in `f` is not caught; use [`try_map`] for functions that can
/// fail.
///
/// # Examples
///
/// ```rust
/// use pullweld::processors::map;
/// use pullweld::sources::from_iter;
///
/// # #[tokio::main]
/// # async fn main() -> pullweld::Result<()> {
/// let doubled = from_iter(vec![1, 2, 3])?.pipe_through(map(|x: i32| x * 2)?)?;
/// assert_eq!(doubled.collect().await?, vec![2, 4, 6]);
/// # Ok(())
/// # }
/// ```
pub fn map<I, O, F>(f: F) -> Result<TransformStream<I, O>>
where
    F: FnMut(I) -> O + Send + 'static,
    I: Send + 'static,
    O: Send + 'static,
{
    TransformStream::new(Map::new(f))
}

/// A stage that emits the `Ok` value of `f(x)` for every chunk `x`.
///
/// The first `Err` aborts the stage: the reader gets the error and a pipe
/// feeding the stage cancels its source.
pub fn try_map<I, O, E, F>(f: F) -> Result<TransformStream<I, O>>
where
    F: FnMut(I) -> std::result::Result<O, E> + Send + 'static,
    I: Send + 'static,
    O: Send + 'static,
    E: Into<Error> + 'static,
{
    TransformStream::new(TryMap::new(f))
}

/// A stage that emits the resolved value of `f(x)` for every chunk `x`.
pub fn map_async<I, O, F, Fut>(f: F) -> Result<TransformStream<I, O>>
where
    F: FnMut(I) -> Fut + Send + 'static,
    Fut: Future<Output = Result<O>> + Send + 'static,
    I: Send + 'static,
    O: Send + 'static,
{
    TransformStream::new(MapAsync::new(f))
}
