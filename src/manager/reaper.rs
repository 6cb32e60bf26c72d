//! Background idle teardown.

use tokio::task::JoinHandle;

/// Periodically releases the manager's connection once it has been idle.
///
/// Returned by [`super::ConnectionManager::spawn_idle_reaper`]. The task
/// holds only a weak reference to the manager and exits when the manager
/// is dropped. Dropping the reaper stops it.
#[derive(Debug)]
pub struct IdleReaper {
    task: JoinHandle<()>,
}

impl IdleReaper {
    pub(crate) fn new(task: JoinHandle<()>) -> Self {
        Self { task }
    }

    /// Stops the reaper. The current connection is left as is.
    pub fn stop(self) {
        // Drop aborts the task.
    }

    /// Returns `true` while the background task is running.
    #[inline]
    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for IdleReaper {
    fn drop(&mut self) {
        self.task.abort();
    }
}
