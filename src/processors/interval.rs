//! Timer-driven output.

use async_trait::async_trait;
use std::marker::PhantomData;
use std::time::Duration;
use tracing::trace;

use crate::clock::{Clock, TokioClock};
use crate::core::{Controller, Error, Result, TaskGuard, Transformer};
use crate::streams::TransformStream;

/// A transformer that ignores its input and emits the time on every tick.
pub struct Interval<I, C: Clock> {
    period: Duration,
    clock: C,
    ticker: Option<TaskGuard>,
    _input: PhantomData<fn(I)>,
}

impl<I, C: Clock> Interval<I, C> {
    /// Create an interval transformer. Fails if `period` is zero.
    pub fn new(period: Duration, clock: C) -> Result<Self> {
        if period.is_zero() {
            return Err(Error::InvalidInterval { period });
        }
        Ok(Self {
            period,
            clock,
            ticker: None,
            _input: PhantomData,
        })
    }
}

#[async_trait]
impl<I, C> Transformer for Interval<I, C>
where
    I: Send + 'static,
    C: Clock,
{
    type Input = I;
    type Output = C::Instant;

    fn start(&mut self, controller: &Controller<C::Instant>) -> Result<()> {
        self.ticker = Some(TaskGuard::spawn(
            "interval.ticker",
            tick(self.period, self.clock.clone(), controller.clone()),
        ));
        Ok(())
    }

    async fn transform(&mut self, _chunk: I, _controller: &Controller<C::Instant>) -> Result<()> {
        Ok(())
    }

    async fn cancel(&mut self) -> Result<()> {
        if let Some(mut ticker) = self.ticker.take() {
            ticker.stop().await;
        }
        Ok(())
    }
}

/// Emits `clock.now()` at `start + n * period` until the output ends.
async fn tick<C: Clock>(period: Duration, clock: C, controller: Controller<C::Instant>) {
    let mut deadline = clock.now() + period;
    loop {
        let now = clock.now();
        let wait = if deadline > now {
            deadline - now
        } else {
            Duration::ZERO
        };

        tokio::select! {
            biased;
            _ = controller.closed() => break,
            _ = clock.sleep(wait) => {}
        }

        if controller.enqueue(clock.now()).is_err() {
            break;
        }
        deadline = deadline + period;
    }
    trace!("interval ticker stopped");
}

/// A stage that emits the current instant every `period`.
///
/// Whatever is written to the input is ignored; only its end matters:
/// closing the input closes the output. With the input left alone (for
/// example after [`TransformStream::into_readable`]) the stage is a clock
/// source that never ends. Ticks are not held back by a slow reader; they
/// queue up. A zero `period` fails with [`Error::InvalidInterval`].
///
/// # Examples
///
/// ```rust
/// use std::time::Duration;
/// use pullweld::processors::interval;
///
/// # #[tokio::main]
/// # async fn main() -> pullweld::Result<()> {
/// let ticks = interval::<()>(Duration::from_millis(10))?.into_readable();
/// let mut reader = ticks.get_reader()?;
///
/// let first = reader.read().await?.unwrap();
/// let second = reader.read().await?.unwrap();
/// assert!(second > first);
///
/// reader.cancel().await?;
/// # Ok(())
/// # }
/// ```
pub fn interval<I: Send + 'static>(
    period: Duration,
) -> Result<TransformStream<I, tokio::time::Instant>> {
    interval_with_clock(period, TokioClock)
}

/// [`interval`] driven by `clock`.
pub fn interval_with_clock<I, C>(period: Duration, clock: C) -> Result<TransformStream<I, C::Instant>>
where
    I: Send + 'static,
    C: Clock,
{
    TransformStream::new(Interval::new(period, clock)?)
}
