//! Stream-valued transforms.
//!
//! [`switch_map`] turns every input chunk into an inner stream and forwards
//! what that stream yields. By default inner streams are drained one after
//! the other: the stage does not take the next chunk until the current inner
//! stream is exhausted, which makes it behave like a sequential flat-map.
//! [`SwitchMode::CancelPrevious`] gives the conventional switch behavior,
//! where a new chunk cancels the inner stream still being drained.

use async_trait::async_trait;
use std::marker::PhantomData;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::core::{Controller, Error, Result, TaskGuard, Transformer};
use crate::streams::{ReadableStream, Reader, TransformStream};

/// How an input chunk and an inner value are combined into an output.
pub trait Pairing<I, U>: Clone + Send + 'static {
    /// The type of items the stage emits
    type Output: Send + 'static;

    fn pair(&self, chunk: &I, value: U) -> Self::Output;
}

/// Emit `(chunk, value)` tuples.
#[derive(Debug, Clone, Copy, Default)]
pub struct Pairwise;

impl<I, U> Pairing<I, U> for Pairwise
where
    I: Clone + Send + 'static,
    U: Send + 'static,
{
    type Output = (I, U);

    fn pair(&self, chunk: &I, value: U) -> (I, U) {
        (chunk.clone(), value)
    }
}

/// Emit inner values alone.
#[derive(Debug, Clone, Copy, Default)]
pub struct InnerOnly;

impl<I, U: Send + 'static> Pairing<I, U> for InnerOnly {
    type Output = U;

    fn pair(&self, _chunk: &I, value: U) -> U {
        value
    }
}

/// What happens to an inner stream when the next chunk arrives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SwitchMode {
    /// Drain every inner stream to its end before taking the next chunk
    #[default]
    Sequential,
    /// Cancel the inner stream being drained and switch to the new one
    CancelPrevious,
}

/// Options for [`switch_map_with`].
#[derive(Debug, Clone, Copy)]
pub struct SwitchMapOptions<P> {
    pairing: P,
    mode: SwitchMode,
}

impl SwitchMapOptions<Pairwise> {
    /// Emit `(chunk, value)` tuples
    pub fn pairwise() -> Self {
        Self {
            pairing: Pairwise,
            mode: SwitchMode::default(),
        }
    }
}

impl SwitchMapOptions<InnerOnly> {
    /// Emit inner values without their chunk
    pub fn inner_only() -> Self {
        Self {
            pairing: InnerOnly,
            mode: SwitchMode::default(),
        }
    }
}

impl<P> SwitchMapOptions<P> {
    /// Set the switch mode
    pub fn mode(mut self, mode: SwitchMode) -> Self {
        self.mode = mode;
        self
    }
}

impl Default for SwitchMapOptions<Pairwise> {
    fn default() -> Self {
        Self::pairwise()
    }
}

struct ActiveDrain {
    stop: CancellationToken,
    task: TaskGuard,
}

/// A transformer that drains one inner stream per input chunk.
pub struct SwitchMap<I, U, F, P> {
    f: F,
    pairing: P,
    mode: SwitchMode,
    active: Option<ActiveDrain>,
    _types: PhantomData<fn(I) -> U>,
}

impl<I, U, F, P> SwitchMap<I, U, F, P> {
    /// Create a new switch-map transformer
    pub fn new(f: F, options: SwitchMapOptions<P>) -> Self {
        Self {
            f,
            pairing: options.pairing,
            mode: options.mode,
            active: None,
            _types: PhantomData,
        }
    }

    /// Stop the running drain, if any. The drain cancels its inner stream
    /// before this returns.
    async fn stop_active(&mut self) -> Result<()> {
        if let Some(mut previous) = self.active.take() {
            previous.stop.cancel();
            previous.task.join().await?;
        }
        Ok(())
    }
}

#[async_trait]
impl<I, U, F, P> Transformer for SwitchMap<I, U, F, P>
where
    I: Send + 'static,
    U: Send + 'static,
    F: FnMut(&I) -> Result<ReadableStream<U>> + Send + 'static,
    P: Pairing<I, U>,
{
    type Input = I;
    type Output = P::Output;

    async fn transform(&mut self, chunk: I, controller: &Controller<P::Output>) -> Result<()> {
        if self.active.is_some() {
            trace!("switching to a new inner stream");
            self.stop_active().await?;
        }

        let inner = (self.f)(&chunk)?.get_reader()?;
        let stop = CancellationToken::new();
        let pairing = self.pairing.clone();

        match self.mode {
            SwitchMode::Sequential => drain(chunk, inner, pairing, controller.clone(), stop).await,
            SwitchMode::CancelPrevious => {
                let controller = controller.clone();
                let task = TaskGuard::spawn("switch_map.drain", {
                    let stop = stop.clone();
                    async move {
                        if let Err(e) = drain(chunk, inner, pairing, controller.clone(), stop).await {
                            debug!(error = %e, "inner stream failed; aborting stage");
                            controller.error(e);
                        }
                    }
                });
                self.active = Some(ActiveDrain { stop, task });
                Ok(())
            }
        }
    }

    async fn flush(&mut self, _controller: &Controller<P::Output>) -> Result<()> {
        if let Some(mut active) = self.active.take() {
            active.task.join().await?;
        }
        Ok(())
    }

    async fn cancel(&mut self) -> Result<()> {
        self.stop_active().await
    }
}

/// Forward every value of `inner` until it ends, the output ends, or `stop`
/// fires. Stopping early cancels `inner`.
async fn drain<I, U, P>(
    chunk: I,
    mut inner: Reader<U>,
    pairing: P,
    controller: Controller<P::Output>,
    stop: CancellationToken,
) -> Result<()>
where
    I: Send + 'static,
    U: Send + 'static,
    P: Pairing<I, U>,
{
    loop {
        let next = tokio::select! {
            biased;
            _ = stop.cancelled() => break,
            _ = controller.closed() => break,
            next = read_when_ready(&mut inner, &controller) => next,
        };

        match next {
            Some(Ok(Some(value))) => {
                if controller.enqueue(pairing.pair(&chunk, value)).is_err() {
                    break;
                }
            }
            Some(Ok(None)) => return Ok(()),
            Some(Err(e)) => return Err(Error::transform(e)),
            None => break,
        }
    }

    trace!("inner drain stopped early; cancelling inner stream");
    inner.cancel().await
}

async fn read_when_ready<U, O>(
    inner: &mut Reader<U>,
    controller: &Controller<O>,
) -> Option<Result<Option<U>>>
where
    U: Send + 'static,
{
    if controller.ready().await {
        Some(inner.read().await)
    } else {
        None
    }
}

/// A stage that maps each chunk to an inner stream and emits
/// `(chunk, value)` for every value of that stream.
///
/// Inner streams are drained sequentially; see [`switch_map_with`] for the
/// other modes.
///
/// # Examples
///
/// ```rust
/// use pullweld::processors::switch_map;
/// use pullweld::sources::from_iter;
///
/// # #[tokio::main]
/// # async fn main() -> pullweld::Result<()> {
/// let out = from_iter(vec![1, 2])?
///     .pipe_through(switch_map(|x: &i32| from_iter(vec![x * 10]))?)?;
/// assert_eq!(out.collect().await?, vec![(1, 10), (2, 20)]);
/// # Ok(())
/// # }
/// ```
pub fn switch_map<I, U, F>(f: F) -> Result<TransformStream<I, (I, U)>>
where
    I: Clone + Send + 'static,
    U: Send + 'static,
    F: FnMut(&I) -> Result<ReadableStream<U>> + Send + 'static,
{
    switch_map_with(f, SwitchMapOptions::pairwise())
}

/// [`switch_map`] with explicit pairing and switch mode.
///
/// An error returned by `f`, or a failure reading an inner stream, aborts
/// the stage. When the input closes, the inner stream being drained is
/// finished before the output closes.
pub fn switch_map_with<I, U, F, P>(
    f: F,
    options: SwitchMapOptions<P>,
) -> Result<TransformStream<I, P::Output>>
where
    I: Send + 'static,
    U: Send + 'static,
    F: FnMut(&I) -> Result<ReadableStream<U>> + Send + 'static,
    P: Pairing<I, U>,
{
    TransformStream::new(SwitchMap::new(f, options))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::from_iter;
    use crate::test_support::{Probe, Tracked};
    use parking_lot::Mutex;
    use std::sync::atomic::Ordering;
    use std::sync::Arc;
    use std::time::Duration;

    /// Endless inner streams whose probes land in `probes`.
    fn endless_inner(
        probes: Arc<Mutex<Vec<Probe>>>,
    ) -> impl FnMut(&u64) -> Result<ReadableStream<u64>> + Send + 'static {
        move |_: &u64| {
            let inner = Tracked::endless();
            probes.lock().push(inner.probe());
            inner.into_readable()
        }
    }

    #[tokio::test]
    async fn test_pairwise_by_default() {
        let out = from_iter(vec![1, 2])
            .unwrap()
            .pipe_through(switch_map(|x: &i32| from_iter(vec![x * 10])).unwrap())
            .unwrap();

        assert_eq!(out.collect().await.unwrap(), vec![(1, 10), (2, 20)]);
    }

    #[tokio::test]
    async fn test_inner_only() {
        let out = from_iter(vec![1, 2])
            .unwrap()
            .pipe_through(
                switch_map_with(
                    |x: &i32| from_iter(vec![x * 10]),
                    SwitchMapOptions::inner_only(),
                )
                .unwrap(),
            )
            .unwrap();

        assert_eq!(out.collect().await.unwrap(), vec![10, 20]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_inner_streams_drain_in_sequence() {
        let out = from_iter(vec![1u64, 2])
            .unwrap()
            .pipe_through(
                switch_map(|x: &u64| {
                    let delay = if *x == 1 { 10 } else { 1 };
                    Tracked::new(vec![x * 10, x * 10 + 1])
                        .with_delay(Duration::from_millis(delay))
                        .into_readable()
                })
                .unwrap(),
            )
            .unwrap();

        assert_eq!(
            out.collect().await.unwrap(),
            vec![(1, 10), (1, 11), (2, 20), (2, 21)]
        );
    }

    #[tokio::test]
    async fn test_empty_inner_stream_emits_nothing() {
        let out = from_iter(vec![1, 2, 3])
            .unwrap()
            .pipe_through(
                switch_map(|x: &i32| {
                    let items = if x % 2 == 0 { vec![] } else { vec![*x] };
                    from_iter(items)
                })
                .unwrap(),
            )
            .unwrap();

        assert_eq!(out.collect().await.unwrap(), vec![(1, 1), (3, 3)]);
    }

    #[tokio::test]
    async fn test_inner_failure_aborts_stage() {
        let out = from_iter(vec![1, 2])
            .unwrap()
            .pipe_through(
                switch_map(|x: &i32| {
                    Tracked::failing_after(vec![x * 10], Error::custom("inner broke")).into_readable()
                })
                .unwrap(),
            )
            .unwrap();
        let mut reader = out.get_reader().unwrap();

        assert_eq!(reader.read().await.unwrap(), Some((1, 10)));
        assert!(matches!(reader.read().await, Err(Error::Transform(_))));
    }

    #[tokio::test]
    async fn test_function_error_aborts_stage() {
        let source = Tracked::new(vec![1, 2, 3]);
        let probe = source.probe();
        let out = source
            .into_readable()
            .unwrap()
            .pipe_through(
                switch_map(|x: &i32| {
                    if *x == 2 {
                        return Err(Error::custom("no stream for 2"));
                    }
                    from_iter(vec![*x])
                })
                .unwrap(),
            )
            .unwrap();

        assert!(matches!(out.collect().await, Err(Error::Custom(_))));
        probe.cancelled().await;
        assert_eq!(probe.cancels.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancel_previous_switches_inner_stream() {
        let probes: Arc<Mutex<Vec<Probe>>> = Arc::default();
        let registry = probes.clone();
        let stage = switch_map_with(
            move |x: &u64| {
                let base = x * 1000;
                let mut k = 0;
                let inner = Tracked::from_fn(move || {
                    k += 1;
                    Some(Ok(base + k))
                });
                registry.lock().push(inner.probe());
                inner.into_readable()
            },
            SwitchMapOptions::inner_only().mode(SwitchMode::CancelPrevious),
        )
        .unwrap();
        let mut writer = stage.writable().get_writer().unwrap();
        let mut reader = stage.readable().get_reader().unwrap();

        writer.write(1).await.unwrap();
        assert_eq!(reader.read().await.unwrap(), Some(1001));

        writer.write(2).await.unwrap();
        let mut switched = None;
        for _ in 0..100 {
            let value = reader.read().await.unwrap().unwrap();
            if value > 2000 {
                switched = Some(value);
                break;
            }
            assert!(value < 2000);
        }
        assert!(switched.is_some(), "never switched to the second inner stream");

        let first = probes.lock()[0].clone();
        assert_eq!(first.cancels.load(Ordering::SeqCst), 1);
        for _ in 0..3 {
            assert!(reader.read().await.unwrap().unwrap() > 2000);
        }

        reader.cancel().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_previous_finishes_last_inner_on_close() {
        let out = from_iter(vec![1u64])
            .unwrap()
            .pipe_through(
                switch_map_with(
                    |x: &u64| {
                        Tracked::new(vec![*x, x + 1])
                            .with_delay(Duration::from_millis(5))
                            .into_readable()
                    },
                    SwitchMapOptions::pairwise().mode(SwitchMode::CancelPrevious),
                )
                .unwrap(),
            )
            .unwrap();

        assert_eq!(out.collect().await.unwrap(), vec![(1, 1), (1, 2)]);
    }

    #[tokio::test]
    async fn test_cancel_mid_drain_cancels_inner_stream() {
        for mode in [SwitchMode::Sequential, SwitchMode::CancelPrevious] {
            let probes: Arc<Mutex<Vec<Probe>>> = Arc::default();
            let stage = switch_map_with(
                endless_inner(probes.clone()),
                SwitchMapOptions::inner_only().mode(mode),
            )
            .unwrap();
            let mut writer = stage.writable().get_writer().unwrap();
            let mut reader = stage.readable().get_reader().unwrap();

            writer.write(1).await.unwrap();
            assert_eq!(reader.read().await.unwrap(), Some(0));

            reader.cancel().await.unwrap();
            let inner = probes.lock()[0].clone();
            assert_eq!(inner.cancels.load(Ordering::SeqCst), 1, "{:?}", mode);
            assert!(writer.is_closed());
        }
    }
}
