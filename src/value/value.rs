use std::sync::Arc;

/// A persistent record: field name to value, with structural sharing.
pub type Record = im::OrdMap<Arc<str>, Value>;

/// A dynamically shaped state value.
///
/// Scalars are compared by value. Lists and records are shared behind
/// pointers and compared by identity through [`Value::same`], which is the
/// only change test the kernel ever uses.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Value {
    /// Absent value. Reading a missing field yields `Null`.
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Arc<str>),
    List(Arc<Vec<Value>>),
    Record(Record),
}

impl Value {
    /// Build a record from `(field, value)` pairs.
    pub fn record<K, V, I>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<Arc<str>>,
        V: Into<Value>,
    {
        Value::Record(
            fields
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }

    /// A fresh empty record. Two calls never return the `same` value.
    pub fn empty_record() -> Self {
        Value::Record(Record::new())
    }

    /// Build a list from values.
    pub fn list<V, I>(items: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Value::List(Arc::new(items.into_iter().map(Into::into).collect()))
    }

    /// Identity test used for every "did it change" decision.
    ///
    /// A clone of a list or record is the same value; a rebuilt one with equal
    /// contents is not.
    pub fn same(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => Arc::ptr_eq(a, b),
            (Value::Record(a), Value::Record(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(n) => Some(*n),
            Value::Int(n) => Some(*n as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items.as_slice()),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Value::Record(record) => Some(record),
            _ => None,
        }
    }

    /// Borrow a field of a record. `None` for missing fields and non-records.
    pub fn field(&self, name: &str) -> Option<&Value> {
        match self {
            Value::Record(record) => record.get(name),
            _ => None,
        }
    }

    /// Read a field, yielding `Null` when it is missing.
    pub fn get(&self, name: &str) -> Value {
        self.field(name).cloned().unwrap_or_default()
    }

    /// Return a value with `name` set to `value`.
    ///
    /// When the field already holds the `same` value this returns a clone of
    /// `self`, which is itself the `same` value.
    pub fn with_field(&self, name: &str, value: Value) -> Value {
        if self.get(name).same(&value) {
            return self.clone();
        }
        let mut next = self.clone();
        next.set_field(name, value);
        next
    }

    /// Assign a field in place.
    ///
    /// On a shared record this copies the path to the field first, so other
    /// holders of the old snapshot are unaffected. A non-record becomes a
    /// record holding only this field.
    pub fn set_field(&mut self, name: &str, value: Value) {
        match self {
            Value::Record(record) => {
                record.insert(Arc::from(name), value);
            }
            other => *other = Value::record([(name, value)]),
        }
    }

    /// Return a record without `name`. Non-records are returned unchanged.
    pub fn without_field(&self, name: &str) -> Value {
        match self {
            Value::Record(record) => Value::Record(record.without(name)),
            other => other.clone(),
        }
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Null
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(n.into())
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Int(n.into())
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Float(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(Arc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(Arc::from(s))
    }
}

impl From<Arc<str>> for Value {
    fn from(s: Arc<str>) -> Self {
        Value::Str(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(Arc::new(items))
    }
}

impl From<Record> for Value {
    fn from(record: Record) -> Self {
        Value::Record(record)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalars_are_same_by_value() {
        assert!(Value::from(1).same(&Value::from(1)));
        assert!(Value::from("a").same(&Value::from("a")));
        assert!(Value::Null.same(&Value::Null));
        assert!(!Value::from(1).same(&Value::from(1.0)));
        assert!(!Value::Float(f64::NAN).same(&Value::Float(f64::NAN)));
    }

    #[test]
    fn containers_are_same_by_identity() {
        let a = Value::record([("x", 1)]);
        let b = Value::record([("x", 1)]);
        assert_eq!(a, b);
        assert!(!a.same(&b));
        assert!(a.same(&a.clone()));

        let list = Value::list([1, 2, 3]);
        assert!(list.same(&list.clone()));
        assert!(!list.same(&Value::list([1, 2, 3])));
    }

    #[test]
    fn with_field_keeps_identity_when_unchanged() {
        let state = Value::record([("counter", 1)]);
        assert!(state.with_field("counter", 1.into()).same(&state));
        assert!(state.with_field("missing", Value::Null).same(&state));

        let next = state.with_field("counter", 2.into());
        assert!(!next.same(&state));
        assert_eq!(next.get("counter"), Value::from(2));
        assert_eq!(state.get("counter"), Value::from(1));
    }

    #[test]
    fn set_field_copies_shared_records() {
        let original = Value::record([("a", 1), ("b", 2)]);
        let mut copy = original.clone();
        copy.set_field("a", 10.into());
        copy.set_field("c", 3.into());

        assert_eq!(original, Value::record([("a", 1), ("b", 2)]));
        assert_eq!(copy, Value::record([("a", 10), ("b", 2), ("c", 3)]));
    }

    #[test]
    fn set_field_on_scalar_makes_a_record() {
        let mut value = Value::Null;
        value.set_field("counter", 1.into());
        assert_eq!(value, Value::record([("counter", 1)]));
    }

    #[test]
    fn without_field_drops_only_that_field() {
        let action = Value::record([("type", Value::from("add")), ("by", 2.into())]);
        assert_eq!(action.without_field("type"), Value::record([("by", 2)]));
        assert_eq!(action.get("type").as_str(), Some("add"));
    }
}
