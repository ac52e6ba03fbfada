use std::cell::RefCell;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Identities are unique across every runtime in the process.
static NEXT_ID: AtomicUsize = AtomicUsize::new(1);

/// Kernel instance context.
///
/// Hands out the identities of listeners, stores and binding instances.
/// Ids start at 1 and only grow, so "first subscribed" is "smallest id".
/// They are drawn from one process-wide counter: a listener created in one
/// scope never collides with a listener created in another.
///
/// A process-wide runtime is used by default. Scoped runtimes keep their own
/// count of the identities they issued.
///
/// # Examples
///
/// ```
/// use trellis::runtime::ReactiveRuntime;
/// use trellis::{compose, store, Value};
///
/// ReactiveRuntime::scope(|| {
///     let counter = compose(store(Value::from(0)), []).unwrap();
///     assert_eq!(counter.state(), Value::from(0));
/// });
/// ```
pub struct ReactiveRuntime {
    issued: AtomicUsize,
}

thread_local! {
    static RUNTIME_STACK: RefCell<Vec<Arc<ReactiveRuntime>>> = RefCell::new(vec![]);
}

impl ReactiveRuntime {
    /// Create a new isolated runtime.
    pub fn new() -> Arc<Self> {
        Arc::new(ReactiveRuntime {
            issued: AtomicUsize::new(0),
        })
    }

    /// Run `f` with a fresh runtime as the current context.
    pub fn scope<F, R>(f: F) -> R
    where
        F: FnOnce() -> R,
    {
        Self::with_runtime(Self::new(), f)
    }

    /// The process-wide runtime used when no scope is active.
    pub fn global() -> Arc<Self> {
        use std::sync::OnceLock;
        static RUNTIME: OnceLock<Arc<ReactiveRuntime>> = OnceLock::new();
        Arc::clone(RUNTIME.get_or_init(Self::new))
    }

    /// The innermost scoped runtime, or the global one.
    pub fn current() -> Arc<Self> {
        RUNTIME_STACK.with(|stack| stack.borrow().last().cloned().unwrap_or_else(Self::global))
    }

    /// Run `f` with `runtime` pushed as the current context.
    ///
    /// The runtime is popped again even if `f` panics.
    pub fn with_runtime<F, R>(runtime: Arc<Self>, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        RUNTIME_STACK.with(|stack| {
            stack.borrow_mut().push(runtime);
        });

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(f));

        RUNTIME_STACK.with(|stack| {
            stack.borrow_mut().pop();
        });

        match result {
            Ok(r) => r,
            Err(e) => std::panic::resume_unwind(e),
        }
    }

    /// Hand out the next identity.
    pub fn next_id(&self) -> usize {
        self.issued.fetch_add(1, Ordering::SeqCst);
        NEXT_ID.fetch_add(1, Ordering::SeqCst)
    }

    /// Number of identities this runtime handed out so far.
    pub fn issued(&self) -> usize {
        self.issued.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique_across_scopes() {
        ReactiveRuntime::scope(|| {
            let runtime = ReactiveRuntime::current();
            let first = runtime.next_id();
            let second = runtime.next_id();
            assert!(second > first);
            assert_eq!(runtime.issued(), 2);

            let nested = ReactiveRuntime::scope(|| {
                let nested = ReactiveRuntime::current();
                let id = nested.next_id();
                assert_eq!(nested.issued(), 1);
                id
            });
            assert!(nested > second);

            let third = ReactiveRuntime::current().next_id();
            assert!(third > nested);
            assert_eq!(runtime.issued(), 3);
        });
    }

    #[test]
    fn scope_is_popped_after_panic() {
        let outer = ReactiveRuntime::current();
        let caught = std::panic::catch_unwind(|| {
            ReactiveRuntime::scope(|| panic!("boom"));
        });
        assert!(caught.is_err());
        assert!(Arc::ptr_eq(&outer, &ReactiveRuntime::current()));
    }
}
