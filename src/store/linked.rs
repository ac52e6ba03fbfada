//! Fields kept in sync with another store.
//!
//! Local writes are pushed to the remote synchronously inside the dispatch
//! that made them. Remote writes are pulled on a later tick through a
//! debounced listener. A per-store guard keeps the two directions from
//! feeding each other when stores are linked both ways.
//!
//! A link does not keep its remote alive. Once every handle to the remote is
//! gone the linked field keeps its last value.

use std::cell::Cell;
use std::rc::{Rc, Weak};
use std::sync::Arc;

use super::notify::Listener;
use super::store::{Store, StoreInner};
use crate::util::Debounce;
use crate::value::Value;

/// Which part of the remote store a linked field mirrors.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LinkSource {
    /// One field of the remote state.
    Field(Arc<str>),
    /// The remote's entire state.
    Whole,
}

pub(crate) struct LinkedProp {
    pub(crate) dest: Arc<str>,
    remote: Weak<StoreInner>,
    pub(crate) source: LinkSource,
}

impl LinkedProp {
    pub(crate) fn new(dest: Arc<str>, remote: &Store, source: LinkSource) -> Self {
        Self {
            dest,
            remote: Rc::downgrade(&remote.inner),
            source,
        }
    }

    fn remote(&self) -> Option<Store> {
        self.remote.upgrade().map(Store::from_inner)
    }

    fn value_of(&self, remote: &Store) -> Value {
        let state = remote.state();
        match &self.source {
            LinkSource::Field(field) => state.get(field),
            LinkSource::Whole => state,
        }
    }
}

/// Held while a link sync runs; clears the flag on every exit path.
pub(crate) struct SyncGuard<'a> {
    flag: &'a Cell<bool>,
}

impl<'a> SyncGuard<'a> {
    /// `None` when a sync is already running on this store.
    pub(crate) fn acquire(flag: &'a Cell<bool>) -> Option<Self> {
        if flag.replace(true) {
            None
        } else {
            Some(Self { flag })
        }
    }
}

impl Drop for SyncGuard<'_> {
    fn drop(&mut self) {
        self.flag.set(false);
    }
}

/// A listener that defers its work through a debounce. Each store keeps one
/// for its links and one for its observables.
pub(crate) struct Deferred {
    pub(crate) debounce: Rc<Debounce>,
    pub(crate) listener: Listener,
}

impl Store {
    /// Push linked fields whose local value differs to their remote stores.
    pub(super) fn push_upstream(&self) {
        let links = self.inner.links.borrow().clone();
        if links.is_empty() {
            return;
        }
        let Some(_guard) = SyncGuard::acquire(&self.inner.syncing) else {
            return;
        };

        let state = self.state();
        for link in links {
            let Some(remote) = link.remote() else {
                continue;
            };
            let next = state.get(&link.dest);
            if next.same(&link.value_of(&remote)) {
                continue;
            }
            tracing::trace!(
                store = %self.label(),
                remote = %remote.label(),
                field = %link.dest,
                "pushing linked field upstream"
            );
            let remote_next = match &link.source {
                LinkSource::Field(field) => remote.state().with_field(field, next),
                LinkSource::Whole => next,
            };
            remote.force_set(remote_next);
        }
    }

    /// Pull every linked field from its remote; recompute and notify on change.
    pub(super) fn pull_downstream(&self) {
        if self.pull_links() {
            self.recompute();
            self.notify();
        }
    }

    /// Copy remote values into the linked fields. Returns whether the state
    /// changed.
    pub(super) fn pull_links(&self) -> bool {
        let links = self.inner.links.borrow().clone();
        if links.is_empty() {
            return false;
        }
        let Some(_guard) = SyncGuard::acquire(&self.inner.syncing) else {
            return false;
        };

        let previous = self.state();
        let mut next = previous.clone();
        for link in &links {
            let Some(remote) = link.remote() else {
                continue;
            };
            let value = link.value_of(&remote);
            if !next.get(&link.dest).same(&value) {
                next.set_field(&link.dest, value);
            }
        }
        if next.same(&previous) {
            return false;
        }
        tracing::trace!(store = %self.label(), "pulled linked fields downstream");
        self.replace_state(next);
        true
    }

    /// Subscribe the downstream handler to every remote not yet wired.
    pub(super) fn wire_downstream(&self) {
        let links = self.inner.links.borrow().clone();
        for link in links {
            let Some(remote) = link.remote() else {
                continue;
            };
            if !self.inner.wired.borrow_mut().insert(remote.id()) {
                continue;
            }
            let listener = self.downstream_listener();
            tracing::debug!(
                store = %self.label(),
                remote = %remote.label(),
                "wiring linked store"
            );
            let subscription = remote.subscribe_listener(&listener);
            self.inner.remote_subscriptions.borrow_mut().push(subscription);
        }
    }

    fn downstream_listener(&self) -> Listener {
        let downstream = self.inner.downstream.get_or_init(|| {
            let weak = Rc::downgrade(&self.inner);
            let debounce = Rc::new(Debounce::new(self.inner.config.link_delay, move || {
                if let Some(inner) = weak.upgrade() {
                    Store::from_inner(inner).pull_downstream();
                }
            }));
            let trigger = Rc::clone(&debounce);
            Deferred {
                debounce,
                listener: Listener::new(move |_| trigger.call()),
            }
        });
        downstream.listener.clone()
    }

    /// Whether a downstream pull is scheduled and has not run yet.
    pub fn has_pending_sync(&self) -> bool {
        self.inner
            .downstream
            .get()
            .is_some_and(|downstream| downstream.debounce.is_pending())
    }
}
