//! Instrumented sources shared by the unit tests.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

use crate::core::{Controller, Error, Result, UnderlyingSource};
use crate::streams::ReadableStream;

/// Counters observed from outside a [`Tracked`] source.
#[derive(Clone, Default)]
pub(crate) struct Probe {
    pub pulls: Arc<AtomicUsize>,
    pub cancels: Arc<AtomicUsize>,
    cancel_signal: Arc<Notify>,
}

impl Probe {
    /// Wait until the source has been cancelled.
    pub async fn cancelled(&self) {
        while self.cancels.load(Ordering::SeqCst) == 0 {
            self.cancel_signal.notified().await;
        }
    }
}

/// A pull source that records pulls and cancellations.
pub(crate) struct Tracked<T> {
    next: Box<dyn FnMut() -> Option<Result<T>> + Send>,
    delay: Option<Duration>,
    probe: Probe,
}

impl<T: Send + 'static> Tracked<T> {
    pub fn new(items: Vec<T>) -> Self {
        let mut items: VecDeque<T> = items.into();
        Self::from_fn(move || items.pop_front().map(Ok))
    }

    pub fn failing_after(items: Vec<T>, error: Error) -> Self {
        let mut items: VecDeque<T> = items.into();
        let mut error = Some(error);
        Self::from_fn(move || match items.pop_front() {
            Some(item) => Some(Ok(item)),
            None => error.take().map(Err),
        })
    }

    pub fn from_fn<F>(next: F) -> Self
    where
        F: FnMut() -> Option<Result<T>> + Send + 'static,
    {
        Self {
            next: Box::new(next),
            delay: None,
            probe: Probe::default(),
        }
    }

    /// Sleep for `delay` before producing each value.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn probe(&self) -> Probe {
        self.probe.clone()
    }

    pub fn into_readable(self) -> Result<ReadableStream<T>> {
        ReadableStream::new(self)
    }
}

impl Tracked<u64> {
    /// Counts up from zero forever.
    pub fn endless() -> Self {
        let mut n = 0;
        Self::from_fn(move || {
            let item = n;
            n += 1;
            Some(Ok(item))
        })
    }
}

#[async_trait]
impl<T: Send + 'static> UnderlyingSource for Tracked<T> {
    type Item = T;

    async fn pull(&mut self, controller: &Controller<T>) -> Result<()> {
        self.probe.pulls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match (self.next)() {
            Some(Ok(item)) => controller.enqueue(item),
            Some(Err(e)) => Err(e),
            None => {
                controller.close();
                Ok(())
            }
        }
    }

    async fn cancel(&mut self) -> Result<()> {
        self.probe.cancels.fetch_add(1, Ordering::SeqCst);
        self.probe.cancel_signal.notify_one();
        Ok(())
    }
}
