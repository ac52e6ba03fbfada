//! Derived fields recomputed after every commit.

use std::rc::Rc;
use std::sync::Arc;

use crate::describe::{Description, Evaluator};
use crate::util::Selector;
use crate::value::Value;

/// A derived field: evaluator feeding a memoizing selector.
pub(crate) struct ComputedProp {
    pub(crate) name: Arc<str>,
    pub(crate) evaluator: Evaluator,
    pub(crate) selector: Selector,
}

/// Recompute every derived field in registration order.
///
/// The first field that changes clones the state; later fields write into the
/// same clone. When no field changes the returned value is `same` as `state`.
/// Evaluators read the working state, so a field can depend on fields
/// registered before it.
pub(crate) fn recompute(state: &Value, props: &[Rc<ComputedProp>]) -> Value {
    let mut working = state.clone();
    for prop in props {
        let inputs = (prop.evaluator)(&Description::new(working.clone(), Arc::clone(&prop.name)));
        let next = prop.selector.select(inputs);
        if !working.get(&prop.name).same(&next) {
            working.set_field(&prop.name, next);
        }
    }
    working
}
