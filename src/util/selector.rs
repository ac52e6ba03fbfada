use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use super::equal::shallow_equal_slices;
use crate::value::Value;

/// A combiner from an input tuple to a derived value.
pub type Combiner = Rc<dyn Fn(&[Value]) -> Value>;

/// Memoizes a combiner on its last input tuple.
///
/// When the inputs are pairwise [`same`](Value::same) as the previous call the
/// cached result is returned without running the combiner. Each selector owns
/// its own cache; two selectors never invalidate each other.
pub struct Selector {
    combiner: Combiner,
    last: RefCell<Option<(Vec<Value>, Value)>>,
}

impl Selector {
    pub fn new(combiner: Combiner) -> Self {
        Self {
            combiner,
            last: RefCell::new(None),
        }
    }

    /// Wrap a closure.
    pub fn from_fn(combiner: impl Fn(&[Value]) -> Value + 'static) -> Self {
        Self::new(Rc::new(combiner))
    }

    /// Feed `combiner` from argument selectors.
    ///
    /// Each argument selector sees the full input tuple and is memoized on
    /// its own; `combiner` sees their results and runs only when one of them
    /// changed.
    pub fn compose(
        arguments: impl IntoIterator<Item = Selector>,
        combiner: impl Fn(&[Value]) -> Value + 'static,
    ) -> Self {
        let arguments: Vec<Selector> = arguments.into_iter().collect();
        let combine = Selector::from_fn(combiner);
        Self::from_fn(move |inputs| {
            let selected = arguments
                .iter()
                .map(|argument| argument.select(inputs.to_vec()))
                .collect();
            combine.select(selected)
        })
    }

    /// Return the combined value for `inputs`, recomputing only on change.
    pub fn select(&self, inputs: Vec<Value>) -> Value {
        if let Some((last_inputs, last_result)) = self.last.borrow().as_ref() {
            if shallow_equal_slices(last_inputs, &inputs) {
                return last_result.clone();
            }
        }
        // The cache borrow is released before the combiner runs.
        let result = (self.combiner)(&inputs);
        *self.last.borrow_mut() = Some((inputs, result.clone()));
        result
    }
}

impl fmt::Debug for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Selector")
            .field("cached", &self.last.borrow().is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn skips_combiner_for_same_inputs() {
        let calls = Rc::new(Cell::new(0));
        let calls_clone = Rc::clone(&calls);
        let selector = Selector::from_fn(move |inputs| {
            calls_clone.set(calls_clone.get() + 1);
            Value::from(inputs[0].as_i64().unwrap_or(0) * 2)
        });

        assert_eq!(selector.select(vec![2.into()]), Value::from(4));
        assert_eq!(selector.select(vec![2.into()]), Value::from(4));
        assert_eq!(calls.get(), 1);

        assert_eq!(selector.select(vec![3.into()]), Value::from(6));
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn rebuilt_containers_are_new_inputs() {
        let calls = Rc::new(Cell::new(0));
        let calls_clone = Rc::clone(&calls);
        let selector = Selector::from_fn(move |_| {
            calls_clone.set(calls_clone.get() + 1);
            Value::Null
        });

        let list = Value::list([1, 2]);
        selector.select(vec![list.clone()]);
        selector.select(vec![list]);
        assert_eq!(calls.get(), 1);

        selector.select(vec![Value::list([1, 2])]);
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn composed_combiner_skips_unchanged_arguments() {
        let calls = Rc::new(Cell::new(0));
        let calls_clone = Rc::clone(&calls);
        let total = Selector::compose(
            [
                Selector::from_fn(|inputs| inputs[0].get("a")),
                Selector::from_fn(|inputs| inputs[0].get("b")),
            ],
            move |selected| {
                calls_clone.set(calls_clone.get() + 1);
                Value::from(selected[0].as_i64().unwrap_or(0) + selected[1].as_i64().unwrap_or(0))
            },
        );

        let state = Value::record([("a", 1), ("b", 2), ("noise", 0)]);
        assert_eq!(total.select(vec![state.clone()]), Value::from(3));

        let noisy = state.with_field("noise", Value::from(1));
        assert_eq!(total.select(vec![noisy.clone()]), Value::from(3));
        assert_eq!(calls.get(), 1);

        assert_eq!(total.select(vec![noisy.with_field("b", Value::from(5))]), Value::from(6));
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn caches_are_independent() {
        let a = Selector::from_fn(|inputs| inputs[0].clone());
        let b = Selector::from_fn(|inputs| inputs[0].clone());
        assert_eq!(a.select(vec![1.into()]), Value::from(1));
        assert_eq!(b.select(vec![2.into()]), Value::from(2));
        assert_eq!(a.select(vec![1.into()]), Value::from(1));
    }
}
