//! Subscriber list with tombstoned release and per-pass dedup.

use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;

use crate::runtime::ReactiveRuntime;
use crate::value::Value;

/// A state callback with a unique identity.
///
/// The identity is drawn from the current runtime when the listener is
/// created and is unique across runtimes. Subscribing one listener several times (aliases) still delivers
/// each state once per notification pass.
#[derive(Clone)]
pub struct Listener {
    id: usize,
    callback: Rc<dyn Fn(&Value)>,
}

impl Listener {
    pub fn new(callback: impl Fn(&Value) + 'static) -> Self {
        Self {
            id: ReactiveRuntime::current().next_id(),
            callback: Rc::new(callback),
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    /// Run the callback. Observables call this to deliver a value.
    pub fn call(&self, state: &Value) {
        (self.callback)(state)
    }
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener").field("id", &self.id).finish()
    }
}

/// Releaser returned by `subscribe`.
///
/// Releasing marks the entry as a tombstone. The entry is never called again
/// and is physically removed by the next notification pass.
#[derive(Clone, Debug)]
pub struct Subscription {
    released: Rc<Cell<bool>>,
}

impl Subscription {
    pub fn unsubscribe(&self) {
        self.released.set(true);
    }

    pub fn is_active(&self) -> bool {
        !self.released.get()
    }
}

struct Entry {
    listener: Listener,
    released: Rc<Cell<bool>>,
}

/// Ordered subscriber entries of one store (or binding instance).
#[derive(Default)]
pub(crate) struct Subscribers {
    entries: RefCell<Vec<Entry>>,
    depth: Cell<usize>,
}

/// Tracks pass nesting so only the outermost pass compacts the list.
struct PassGuard<'a> {
    depth: &'a Cell<usize>,
}

impl<'a> PassGuard<'a> {
    fn enter(depth: &'a Cell<usize>) -> Self {
        depth.set(depth.get() + 1);
        Self { depth }
    }

    fn is_outermost(&self) -> bool {
        self.depth.get() == 1
    }
}

impl Drop for PassGuard<'_> {
    fn drop(&mut self) {
        self.depth.set(self.depth.get() - 1);
    }
}

impl Subscribers {
    pub(crate) fn add(&self, listener: Listener) -> Subscription {
        let released = Rc::new(Cell::new(false));
        self.entries.borrow_mut().push(Entry {
            listener,
            released: Rc::clone(&released),
        });
        Subscription { released }
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    /// Entries not yet released.
    pub(crate) fn live(&self) -> usize {
        self.entries
            .borrow()
            .iter()
            .filter(|entry| !entry.released.get())
            .count()
    }

    /// Deliver `state()` to every live listener once.
    ///
    /// The pass is bounded by the length seen on entry; listeners added while
    /// it runs wait for the next pass. No borrow of the list is held while a
    /// callback runs, so callbacks may subscribe, release or dispatch.
    pub(crate) fn notify(&self, state: &dyn Fn() -> Value) {
        let pass = PassGuard::enter(&self.depth);
        let len = self.len();
        let mut notified = HashSet::new();
        let mut released = Vec::new();

        for index in 0..len {
            let entry = {
                let entries = self.entries.borrow();
                entries
                    .get(index)
                    .map(|entry| (entry.listener.clone(), Rc::clone(&entry.released)))
            };
            let Some((listener, flag)) = entry else {
                break;
            };
            if flag.get() {
                released.push(index);
                continue;
            }
            if !notified.insert(listener.id) {
                continue;
            }
            listener.call(&state());
        }

        if pass.is_outermost() {
            let mut entries = self.entries.borrow_mut();
            while let Some(index) = released.pop() {
                entries.remove(index);
            }
        }
    }
}
