use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use tokio::task::JoinHandle;

/// Collapses a burst of calls into one trailing invocation.
///
/// Every [`call`](Debounce::call) cancels the pending invocation, if any, and
/// schedules a new one on the local task set: on the next scheduling tick for
/// a zero delay, otherwise after `delay`. Calls made within one tick therefore
/// run the callback once.
///
/// Scheduling uses [`tokio::task::spawn_local`], so inside a tokio runtime
/// `call` must happen within a [`tokio::task::LocalSet`]. On a thread with no
/// runtime at all the callback runs inline instead and nothing coalesces.
pub struct Debounce {
    delay: Duration,
    callback: Rc<dyn Fn()>,
    slot: RefCell<Option<JoinHandle<()>>>,
    warned: Cell<bool>,
}

/// Whether this thread has a tokio runtime to spawn deferred work on.
///
/// Tokio offers no check for an active `LocalSet`, so this only rules out the
/// plain synchronous caller.
pub(crate) fn has_runtime() -> bool {
    tokio::runtime::Handle::try_current().is_ok()
}

impl Debounce {
    pub fn new(delay: Duration, callback: impl Fn() + 'static) -> Self {
        Self {
            delay,
            callback: Rc::new(callback),
            slot: RefCell::new(None),
            warned: Cell::new(false),
        }
    }

    /// Schedule the callback, replacing any invocation not yet run.
    pub fn call(&self) {
        self.cancel();
        if !has_runtime() {
            if !self.warned.replace(true) {
                tracing::warn!("no tokio runtime on this thread, running debounced callback inline");
            }
            (self.callback)();
            return;
        }
        let callback = Rc::clone(&self.callback);
        let delay = self.delay;
        let handle = tokio::task::spawn_local(async move {
            if delay.is_zero() {
                tokio::task::yield_now().await;
            } else {
                tokio::time::sleep(delay).await;
            }
            callback();
        });
        *self.slot.borrow_mut() = Some(handle);
    }

    /// Drop the pending invocation without running it.
    pub fn cancel(&self) {
        if let Some(pending) = self.slot.borrow_mut().take() {
            pending.abort();
        }
    }

    /// Whether an invocation is scheduled and has not finished.
    pub fn is_pending(&self) -> bool {
        self.slot
            .borrow()
            .as_ref()
            .is_some_and(|pending| !pending.is_finished())
    }
}

impl Drop for Debounce {
    fn drop(&mut self) {
        self.cancel();
    }
}
