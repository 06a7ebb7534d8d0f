//! Property access abstraction for predicate and comparator evaluation.

use crate::value::Value;

/// Read access to an item's named properties.
///
/// Compiled cursors evaluate predicates and comparators through this trait so
/// the query crate stays independent of how the reactive runtime stores
/// records. A property that is absent, or whose slot does not hold a literal
/// value (for example a nested collection), reads as `None`.
pub trait FieldAccess {
    /// Returns the literal value of the named property, if any.
    fn field_value(&self, property: &str) -> Option<Value>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::String;
    use alloc::vec::Vec;

    struct Item(Vec<(String, Value)>);

    impl FieldAccess for Item {
        fn field_value(&self, property: &str) -> Option<Value> {
            self.0
                .iter()
                .find(|(name, _)| name == property)
                .map(|(_, v)| v.clone())
        }
    }

    #[test]
    fn test_field_access() {
        let item = Item(alloc::vec![("id".into(), Value::Int(7))]);
        assert_eq!(item.field_value("id"), Some(Value::Int(7)));
        assert_eq!(item.field_value("name"), None);
    }
}
