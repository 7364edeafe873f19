//! Piping streams into writable inputs and through transform stages.

use tokio::task::JoinHandle;
use tracing::debug;

use crate::core::Result;
use crate::streams::{ReadableStream, Reader, TransformStream, WritableStream, Writer};

impl<T: Send + 'static> ReadableStream<T> {
    /// Pipe this stream into a transform stage and return the stage's
    /// output.
    ///
    /// The pipe runs as a background task. When this stream ends the stage's
    /// input is closed; when it fails the stage is aborted; when the stage
    /// stops accepting input this stream is cancelled.
    pub fn pipe_through<O>(self, transform: TransformStream<T, O>) -> Result<ReadableStream<O>>
    where
        O: Send + 'static,
    {
        let (writable, readable) = transform.into_parts();
        // Detached: the pipe ends on its own when either side ends.
        let _pipe = self.pipe_to(&writable)?;
        Ok(readable)
    }

    /// Pipe this stream into `writable`.
    ///
    /// Locks both sides immediately. The returned handle resolves when the
    /// pipe finishes.
    pub fn pipe_to(self, writable: &WritableStream<T>) -> Result<JoinHandle<Result<()>>> {
        let reader = self.get_reader()?;
        let writer = writable.get_writer()?;
        Ok(tokio::spawn(pipe(reader, writer)))
    }
}

async fn pipe<T: Send + 'static>(mut reader: Reader<T>, mut writer: Writer<T>) -> Result<()> {
    loop {
        let next = tokio::select! {
            biased;
            _ = writer.closed() => {
                debug!("pipe destination closed; cancelling source");
                return reader.cancel().await;
            }
            next = reader.read() => next,
        };

        match next {
            Ok(Some(chunk)) => {
                if writer.write(chunk).await.is_err() {
                    debug!("pipe destination closed; cancelling source");
                    return reader.cancel().await;
                }
            }
            Ok(None) => {
                // The destination may already have stopped on its own.
                let _ = writer.close().await;
                return Ok(());
            }
            Err(e) => {
                debug!(error = %e, "pipe source failed; aborting destination");
                let _ = writer.abort(e.clone()).await;
                return Err(e);
            }
        }
    }
}
