//! The push side of a readable stream.
//!
//! A [`Controller`] owns the queue between whatever produces values for a
//! stream (an underlying source, a transform driver, a pump task) and the
//! stream's single reader. Producers push with [`Controller::enqueue`] and
//! end the stream with [`Controller::close`] or [`Controller::error`]; they
//! learn about downstream demand from [`Controller::desired_size`] and
//! [`Controller::ready`].

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use crate::core::error::{Error, Result};

/// Handle used to push values into a readable stream.
pub struct Controller<T> {
    shared: Arc<Shared<T>>,
}

struct Shared<T> {
    state: Mutex<State<T>>,
    /// Wakes the reader parked on an empty queue.
    readable: Notify,
    /// Wakes producers waiting for demand.
    demand: Notify,
    /// Cancelled once the stream leaves the open state.
    closed: CancellationToken,
    high_water_mark: usize,
}

struct State<T> {
    queue: VecDeque<T>,
    /// Items at the front of `queue` already promised to a parked read.
    reserved: usize,
    read_pending: bool,
    status: Status,
}

enum Status {
    Open,
    Closed,
    Errored(Error),
}

/// Outcome of taking from the queue.
pub(crate) enum Take<T> {
    Item(T),
    Empty,
    Done,
    Failed(Error),
}

impl<T> State<T> {
    fn is_open(&self) -> bool {
        matches!(self.status, Status::Open)
    }

    fn desired_size(&self, high_water_mark: usize) -> isize {
        match self.status {
            Status::Open => high_water_mark as isize - (self.queue.len() - self.reserved) as isize,
            _ => 0,
        }
    }
}

impl<T> Controller<T> {
    pub(crate) fn new(high_water_mark: usize) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State {
                    queue: VecDeque::new(),
                    reserved: 0,
                    read_pending: false,
                    status: Status::Open,
                }),
                readable: Notify::new(),
                demand: Notify::new(),
                closed: CancellationToken::new(),
                high_water_mark,
            }),
        }
    }

    /// Push a value to the reader.
    ///
    /// Fails with [`Error::Closed`] once the stream was closed, or with the
    /// stored error once it was errored. The queue is unbounded: callers that
    /// care about backpressure check [`desired_size`](Self::desired_size) or
    /// await [`ready`](Self::ready) first.
    pub fn enqueue(&self, item: T) -> Result<()> {
        let mut state = self.shared.state.lock();
        match &state.status {
            Status::Open => {}
            Status::Closed => return Err(Error::Closed),
            Status::Errored(e) => return Err(e.clone()),
        }
        if state.read_pending {
            state.read_pending = false;
            state.reserved += 1;
        }
        state.queue.push_back(item);
        drop(state);

        self.shared.readable.notify_one();
        Ok(())
    }

    /// Terminate the stream. Values already queued are still delivered.
    ///
    /// Does nothing if the stream is no longer open.
    pub fn close(&self) {
        {
            let mut state = self.shared.state.lock();
            if !state.is_open() {
                return;
            }
            state.status = Status::Closed;
        }
        self.settled();
    }

    /// Abort the stream. Queued values nobody is waiting for are discarded
    /// and every later read returns `error`.
    ///
    /// Does nothing if the stream is no longer open.
    pub fn error(&self, error: Error) {
        {
            let mut state = self.shared.state.lock();
            if !state.is_open() {
                return;
            }
            // Values already handed to a parked read are still delivered.
            let reserved = state.reserved;
            state.queue.truncate(reserved);
            state.status = Status::Errored(error);
        }
        self.settled();
    }

    /// Remaining downstream demand: the high-water mark minus the number of
    /// queued values nobody is waiting for. Zero once the stream has ended.
    pub fn desired_size(&self) -> isize {
        self.shared
            .state
            .lock()
            .desired_size(self.shared.high_water_mark)
    }

    /// The high-water mark this stream was created with.
    pub fn high_water_mark(&self) -> usize {
        self.shared.high_water_mark
    }

    /// Whether values can still be enqueued.
    pub fn is_open(&self) -> bool {
        self.shared.state.lock().is_open()
    }

    /// Wait until the downstream wants more values.
    ///
    /// Resolves to `true` when the desired size is positive or a reader is
    /// parked on an empty queue, and to `false` once the stream has ended.
    pub async fn ready(&self) -> bool {
        loop {
            let notified = self.shared.demand.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let state = self.shared.state.lock();
                if !state.is_open() {
                    return false;
                }
                if state.read_pending || state.desired_size(self.shared.high_water_mark) > 0 {
                    return true;
                }
            }

            notified.await;
        }
    }

    /// Resolves once the stream is closed, errored or cancelled.
    pub async fn closed(&self) {
        self.shared.closed.cancelled().await
    }

    pub(crate) fn take(&self) -> Take<T> {
        let mut state = self.shared.state.lock();
        if let Some(item) = state.queue.pop_front() {
            if state.reserved > 0 {
                state.reserved -= 1;
            }
            drop(state);
            self.shared.demand.notify_waiters();
            return Take::Item(item);
        }
        match &state.status {
            Status::Open => Take::Empty,
            Status::Closed => Take::Done,
            Status::Errored(e) => Take::Failed(e.clone()),
        }
    }

    pub(crate) fn set_read_pending(&self, pending: bool) {
        self.shared.state.lock().read_pending = pending;
        if pending {
            self.shared.demand.notify_waiters();
        }
    }

    /// Wait for the next enqueue or termination.
    pub(crate) async fn wait_readable(&self) {
        self.shared.readable.notified().await
    }

    /// Drop queued values and close. Used when the consumer cancels.
    pub(crate) fn discard(&self) {
        {
            let mut state = self.shared.state.lock();
            state.queue.clear();
            state.reserved = 0;
            if state.is_open() {
                state.status = Status::Closed;
            }
        }
        self.settled();
    }

    fn settled(&self) {
        self.shared.closed.cancel();
        self.shared.readable.notify_one();
        self.shared.demand.notify_waiters();
    }
}

impl<T> Clone for Controller<T> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<T> fmt::Debug for Controller<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.state.lock();
        let status = match &state.status {
            Status::Open => "open",
            Status::Closed => "closed",
            Status::Errored(_) => "errored",
        };
        f.debug_struct("Controller")
            .field("status", &status)
            .field("queued", &state.queue.len())
            .field("high_water_mark", &self.shared.high_water_mark)
            .finish()
    }
}
