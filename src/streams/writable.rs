//! The input side of a transform stage.

use parking_lot::Mutex;
use std::fmt;
use tokio::sync::mpsc;

use crate::core::{Error, Result};

/// Messages from a writer to the stage consuming its input.
pub(crate) enum Signal<T> {
    Chunk(T),
    Close,
    Abort(Error),
}

/// A stream that accepts chunks through an exclusive [`Writer`].
pub struct WritableStream<T> {
    sender: Mutex<Option<mpsc::Sender<Signal<T>>>>,
}

impl<T: Send + 'static> WritableStream<T> {
    pub(crate) fn new(sender: mpsc::Sender<Signal<T>>) -> Self {
        Self {
            sender: Mutex::new(Some(sender)),
        }
    }

    /// Attach the exclusive writer.
    ///
    /// A writable stream hands out a single writer over its lifetime;
    /// later calls fail with [`Error::Locked`].
    pub fn get_writer(&self) -> Result<Writer<T>> {
        self.sender
            .lock()
            .take()
            .map(|sender| Writer { sender })
            .ok_or(Error::Locked)
    }

    /// Whether the writer has been handed out.
    pub fn is_locked(&self) -> bool {
        self.sender.lock().is_none()
    }
}

impl<T> fmt::Debug for WritableStream<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WritableStream")
            .field("locked", &self.sender.lock().is_none())
            .finish()
    }
}

/// The exclusive writer of a [`WritableStream`].
///
/// Dropping a writer without calling [`close`](Writer::close) abandons the
/// input: the stage receives no more chunks, but its output is not closed.
pub struct Writer<T> {
    sender: mpsc::Sender<Signal<T>>,
}

impl<T: Send + 'static> Writer<T> {
    /// Write one chunk, waiting while the stage's input buffer is full.
    ///
    /// Fails with [`Error::Closed`] once the stage stopped accepting input.
    pub async fn write(&mut self, chunk: T) -> Result<()> {
        self.sender
            .send(Signal::Chunk(chunk))
            .await
            .map_err(|_| Error::Closed)
    }

    /// Signal the end of input. The stage flushes and closes its output.
    pub async fn close(self) -> Result<()> {
        self.sender
            .send(Signal::Close)
            .await
            .map_err(|_| Error::Closed)
    }

    /// Abort the stage with `reason`.
    pub async fn abort(self, reason: Error) -> Result<()> {
        self.sender
            .send(Signal::Abort(reason))
            .await
            .map_err(|_| Error::Closed)
    }

    /// Resolves once the stage stops accepting input.
    pub async fn closed(&self) {
        self.sender.closed().await
    }

    /// Whether the stage has stopped accepting input.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

impl<T> fmt::Debug for Writer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Writer")
            .field("closed", &self.sender.is_closed())
            .finish()
    }
}
