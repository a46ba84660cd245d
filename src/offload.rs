//! Running blocking native calls off the async executor.
//!
//! Native waits and captures block for up to their timeout. The `*_async`
//! methods validate their inputs on the calling thread, then hand a closure
//! that owns everything it needs to Tokio's blocking pool via
//! [`tokio::task::spawn_blocking`]. The returned [`BlockingTask`] resolves with
//! the closure's result.

use std::{
    fmt,
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};

use tokio::{runtime::Handle, task::JoinHandle};

use crate::{Error, Result};

/// A blocking native call running on Tokio's blocking pool.
///
/// Dropping the task detaches it; the work still runs to completion.
#[must_use = "the result of the offloaded call is only observable by awaiting the task"]
pub struct BlockingTask<T> {
    handle: JoinHandle<T>,
}

impl<T> BlockingTask<T> {
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl<T> Future for BlockingTask<T> {
    type Output = Result<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.get_mut().handle)
            .poll(cx)
            .map(|joined| joined.map_err(|e| Error::TaskFailed(e.to_string())))
    }
}

impl<T> fmt::Debug for BlockingTask<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockingTask")
            .field("finished", &self.is_finished())
            .finish()
    }
}

/// Schedules `work` on the current Tokio runtime's blocking pool.
///
/// # Errors
///
/// Returns [`Error::NoAsyncRuntime`] when called outside a Tokio runtime.
pub(crate) fn spawn<F, T>(work: F) -> Result<BlockingTask<T>>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let runtime = Handle::try_current().map_err(|_| Error::NoAsyncRuntime)?;
    Ok(BlockingTask {
        handle: runtime.spawn_blocking(work),
    })
}
