use crate::value::Value;

/// One level of structural comparison.
///
/// Values that are [`same`](Value::same) are equal. Two lists are equal when
/// they have the same length and their elements are pairwise `same`; two
/// records when they have the same fields and each field's values are
/// `same`. Nothing deeper is compared.
pub fn shallow_equal(a: &Value, b: &Value) -> bool {
    if a.same(b) {
        return true;
    }
    match (a, b) {
        (Value::List(left), Value::List(right)) => shallow_equal_slices(left, right),
        (Value::Record(left), Value::Record(right)) => {
            left.len() == right.len()
                && left
                    .iter()
                    .all(|(key, value)| right.get(key).is_some_and(|other| value.same(other)))
        }
        _ => false,
    }
}

/// Pairwise `same` over two input tuples.
pub fn shallow_equal_slices(a: &[Value], b: &[Value]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(left, right)| left.same(right))
}
