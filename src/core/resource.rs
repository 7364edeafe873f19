//! Guards for resources owned by a stream.
//!
//! Every external resource a stream acquires (a listener registration, a
//! timer task, a pump reading another stream) is held by one of these
//! guards. A guard releases its resource exactly once: explicitly from a
//! cancellation hook, or implicitly when the owning stream is dropped.

use std::fmt;
use std::future::Future;
use tokio::task::JoinHandle;
use tracing::trace;

use crate::core::error::Result;

/// A resource released by running a closure, at most once.
pub struct Resource {
    label: &'static str,
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl Resource {
    /// Wrap the release action for a resource that has just been acquired.
    pub fn new<F>(label: &'static str, release: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            label,
            release: Some(Box::new(release)),
        }
    }

    /// Release the resource. Returns `false` if it was already released.
    pub fn release(&mut self) -> bool {
        match self.release.take() {
            Some(release) => {
                trace!(resource = self.label, "releasing resource");
                release();
                true
            }
            None => false,
        }
    }

    /// Whether the resource has been released.
    pub fn is_released(&self) -> bool {
        self.release.is_none()
    }
}

impl Drop for Resource {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("label", &self.label)
            .field("released", &self.is_released())
            .finish()
    }
}

/// A spawned task owned by a stream.
///
/// The task is aborted if the guard is dropped while it is still running.
pub struct TaskGuard {
    label: &'static str,
    handle: Option<JoinHandle<()>>,
}

impl TaskGuard {
    /// Spawn `future` on the current tokio runtime.
    pub fn spawn<F>(label: &'static str, future: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        trace!(task = label, "spawning stream task");
        Self {
            label,
            handle: Some(tokio::spawn(future)),
        }
    }

    /// Abort the task and wait until it has been dropped.
    pub async fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            trace!(task = self.label, "stopping stream task");
            handle.abort();
            let _ = handle.await;
        }
    }

    /// Wait for the task to finish on its own.
    pub async fn join(&mut self) -> Result<()> {
        match self.handle.take() {
            Some(handle) => Ok(handle.await?),
            None => Ok(()),
        }
    }

    /// Whether the task has completed, been stopped or been joined.
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, JoinHandle::is_finished)
    }
}

impl Drop for TaskGuard {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            trace!(task = self.label, "aborting stream task on drop");
            handle.abort();
        }
    }
}

impl fmt::Debug for TaskGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskGuard")
            .field("label", &self.label)
            .field("finished", &self.is_finished())
            .finish()
    }
}
