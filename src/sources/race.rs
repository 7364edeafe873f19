//! Merging several streams by arrival order.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};

use crate::config::StreamConfig;
use crate::core::{Controller, Error, Result, TaskGuard, UnderlyingSource};
use crate::streams::{ReadableStream, Reader};

/// A source that forwards values from every input as they arrive.
///
/// Each input is read by its own pump task. A pump waits for downstream
/// demand before every read, so a consumer that stops reading stops the
/// inputs from being pulled. The merged stream closes once every input has
/// ended and fails as soon as any input fails.
pub struct RaceSource<T> {
    readers: Vec<Reader<T>>,
    pumps: Vec<TaskGuard>,
}

impl<T: Send + 'static> RaceSource<T> {
    /// Create a race over `streams`, locking every one of them.
    pub fn new<I>(streams: I) -> Result<Self>
    where
        I: IntoIterator<Item = ReadableStream<T>>,
    {
        let readers = streams
            .into_iter()
            .map(|stream| stream.get_reader())
            .collect::<Result<Vec<_>>>()?;
        if readers.is_empty() {
            return Err(Error::EmptyRace);
        }
        Ok(Self {
            readers,
            pumps: Vec::new(),
        })
    }
}

#[async_trait]
impl<T: Send + 'static> UnderlyingSource for RaceSource<T> {
    type Item = T;

    fn start(&mut self, controller: &Controller<T>) -> Result<()> {
        let remaining = Arc::new(AtomicUsize::new(self.readers.len()));
        self.pumps = self
            .readers
            .drain(..)
            .enumerate()
            .map(|(index, reader)| {
                TaskGuard::spawn(
                    "race.pump",
                    pump(index, reader, controller.clone(), remaining.clone()),
                )
            })
            .collect();
        Ok(())
    }

    async fn cancel(&mut self) -> Result<()> {
        // The controller is already closed, so every pump is on its way out.
        for pump in &mut self.pumps {
            pump.join().await?;
        }
        Ok(())
    }
}

async fn pump<T: Send + 'static>(
    index: usize,
    mut reader: Reader<T>,
    controller: Controller<T>,
    remaining: Arc<AtomicUsize>,
) {
    loop {
        if !controller.ready().await {
            break;
        }
        let next = tokio::select! {
            biased;
            _ = controller.closed() => break,
            next = reader.read() => next,
        };

        match next {
            Ok(Some(item)) => {
                if controller.enqueue(item).is_err() {
                    break;
                }
            }
            Ok(None) => {
                trace!(input = index, "race input exhausted");
                break;
            }
            Err(e) => {
                debug!(input = index, error = %e, "race input failed; aborting merged stream");
                controller.error(e);
                break;
            }
        }
    }

    if let Err(e) = reader.cancel().await {
        debug!(input = index, error = %e, "failed to cancel race input");
    }
    if remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
        trace!("every race input ended; closing merged stream");
        controller.close();
    }
}

/// Merge `streams` into one stream that yields values in arrival order.
///
/// Fails with [`Error::EmptyRace`] when no streams are given and with
/// [`Error::Locked`] when one of them already has a reader.
///
/// # Examples
///
/// ```rust
/// use pullweld::sources::{from_iter, race};
///
/// # #[tokio::main]
/// # async fn main() -> pullweld::Result<()> {
/// let merged = race(vec![from_iter(vec![1, 2])?, from_iter(vec![3])?])?;
/// let mut values = merged.collect().await?;
/// values.sort();
/// assert_eq!(values, vec![1, 2, 3]);
/// # Ok(())
/// # }
/// ```
pub fn race<T, I>(streams: I) -> Result<ReadableStream<T>>
where
    T: Send + 'static,
    I: IntoIterator<Item = ReadableStream<T>>,
{
    race_with_config(streams, StreamConfig::default())
}

/// [`race`] with an explicit configuration for the merged stream.
pub fn race_with_config<T, I>(streams: I, config: StreamConfig) -> Result<ReadableStream<T>>
where
    T: Send + 'static,
    I: IntoIterator<Item = ReadableStream<T>>,
{
    ReadableStream::with_config(RaceSource::new(streams)?, config)
}
