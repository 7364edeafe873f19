//! Transform stages: a writable input feeding a readable output.

use async_trait::async_trait;
use std::fmt;
use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::config::StreamConfig;
use crate::core::{Controller, Result, TaskGuard, Transformer, UnderlyingSource};
use crate::streams::readable::ReadableStream;
use crate::streams::writable::{Signal, WritableStream};

/// A stage with a [`WritableStream`] input and a [`ReadableStream`] output.
///
/// A driver task runs the [`Transformer`]: it waits until the output wants
/// more values, takes one input chunk, transforms it, and repeats. Closing
/// the input flushes the transformer and closes the output. Cancelling the
/// output winds the driver down and waits for the transformer's `cancel`
/// hook.
pub struct TransformStream<I, O> {
    writable: WritableStream<I>,
    readable: ReadableStream<O>,
}

impl<I, O> TransformStream<I, O>
where
    I: Send + 'static,
    O: Send + 'static,
{
    /// Create a stage with the default configuration.
    pub fn new<X>(transformer: X) -> Result<Self>
    where
        X: Transformer<Input = I, Output = O>,
    {
        Self::with_config(transformer, StreamConfig::default())
    }

    /// Create a stage. The transformer's `start` runs before this returns.
    pub fn with_config<X>(transformer: X, config: StreamConfig) -> Result<Self>
    where
        X: Transformer<Input = I, Output = O>,
    {
        let (sender, receiver) = mpsc::channel(config.write_buffer.max(1));
        let output = TransformOutput {
            pending: Some((transformer, receiver)),
            driver: None,
        };
        let readable = ReadableStream::with_config(output, config)?;

        Ok(Self {
            writable: WritableStream::new(sender),
            readable,
        })
    }

    /// The input side.
    pub fn writable(&self) -> &WritableStream<I> {
        &self.writable
    }

    /// The output side.
    pub fn readable(&self) -> &ReadableStream<O> {
        &self.readable
    }

    /// Split the stage into its input and output.
    pub fn into_parts(self) -> (WritableStream<I>, ReadableStream<O>) {
        (self.writable, self.readable)
    }

    /// Keep only the output. The input is abandoned, not closed.
    pub fn into_readable(self) -> ReadableStream<O> {
        self.readable
    }
}

impl<I, O> fmt::Debug for TransformStream<I, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransformStream")
            .field("writable", &self.writable)
            .field("readable", &self.readable)
            .finish()
    }
}

/// The underlying source of a transform stage's output.
struct TransformOutput<X: Transformer> {
    pending: Option<(X, mpsc::Receiver<Signal<X::Input>>)>,
    driver: Option<TaskGuard>,
}

#[async_trait]
impl<X: Transformer> UnderlyingSource for TransformOutput<X> {
    type Item = X::Output;

    fn start(&mut self, controller: &Controller<X::Output>) -> Result<()> {
        if let Some((mut transformer, input)) = self.pending.take() {
            transformer.start(controller)?;
            self.driver = Some(TaskGuard::spawn(
                "transform.driver",
                drive(transformer, input, controller.clone()),
            ));
        }
        Ok(())
    }

    async fn cancel(&mut self) -> Result<()> {
        // The output is already closed, which the driver observes.
        if let Some(mut driver) = self.driver.take() {
            driver.join().await?;
        }
        Ok(())
    }
}

async fn drive<X: Transformer>(
    mut transformer: X,
    mut input: mpsc::Receiver<Signal<X::Input>>,
    controller: Controller<X::Output>,
) {
    loop {
        if !controller.ready().await {
            break;
        }
        let signal = tokio::select! {
            biased;
            _ = controller.closed() => break,
            signal = input.recv() => signal,
        };

        match signal {
            Some(Signal::Chunk(chunk)) => {
                if let Err(e) = transformer.transform(chunk, &controller).await {
                    if controller.is_open() {
                        debug!(error = %e, "transform failed; aborting stage");
                        controller.error(e);
                    }
                    break;
                }
            }
            Some(Signal::Close) => {
                match transformer.flush(&controller).await {
                    Ok(()) => controller.close(),
                    Err(e) => controller.error(e),
                }
                break;
            }
            Some(Signal::Abort(reason)) => {
                debug!(error = %reason, "input aborted; aborting stage");
                controller.error(reason);
                break;
            }
            None => {
                trace!("input abandoned; output stays open");
                controller.closed().await;
                break;
            }
        }
    }
    input.close();
    if let Err(e) = transformer.cancel().await {
        debug!(error = %e, "transformer cancel failed");
    }
    trace!("transform driver finished");
}
