//! Override merge law for container fields.
//!
//! Pure functions only. Templates rely on "append for lists, merge for maps,
//! replace otherwise", so the rule is kept in one total function.

use serde_json::{Map, Value};

/// How an override value combines with the template value it lands on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeStrategy {
    /// Template value is a sequence: override items are appended.
    Append,
    /// Template value and override are both mappings: keys are overwritten.
    Merge,
    /// Anything else: the override replaces the template value.
    Replace,
}

/// Pick the strategy for an existing template value and an override.
#[must_use]
pub fn strategy(existing: Option<&Value>, overlay: &Value) -> MergeStrategy {
    match (existing, overlay) {
        (Some(Value::Array(_)), _) => MergeStrategy::Append,
        (Some(Value::Object(_)), Value::Object(_)) => MergeStrategy::Merge,
        _ => MergeStrategy::Replace,
    }
}

/// Combine `overlay` into `existing` and return the merged value.
///
/// A non-sequence override on a sequence is appended as a single item.
#[must_use]
pub fn merge_value(existing: Option<Value>, overlay: Value) -> Value {
    match strategy(existing.as_ref(), &overlay) {
        MergeStrategy::Append => {
            let mut items = match existing {
                Some(Value::Array(items)) => items,
                _ => Vec::new(),
            };
            match overlay {
                Value::Array(extra) => items.extend(extra),
                item => items.push(item),
            }
            Value::Array(items)
        }
        MergeStrategy::Merge => {
            let mut map = match existing {
                Some(Value::Object(map)) => map,
                _ => Map::new(),
            };
            if let Value::Object(extra) = overlay {
                map.extend(extra);
            }
            Value::Object(map)
        }
        MergeStrategy::Replace => overlay,
    }
}
