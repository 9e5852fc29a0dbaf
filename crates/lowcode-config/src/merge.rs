//! Recursive merging of raw configuration values.

use serde_json::Value;

/// Merge `update` into `target`.
///
/// Objects merge key by key, recursively. Arrays and scalars in `update`
/// replace whatever `target` held.
pub fn merge_values(target: &mut Value, update: &Value) {
    match (target, update) {
        (Value::Object(target_map), Value::Object(update_map)) => {
            for (key, value) in update_map {
                merge_values(target_map.entry(key.clone()).or_insert(Value::Null), value);
            }
        }
        (target_slot, _) => {
            *target_slot = update.clone();
        }
    }
}

/// JSON kind name used in type errors.
pub fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn objects_merge_recursively() {
        let mut target = json!({ "npmInfo": { "destructuring": true }, "groups": ["a"] });
        merge_values(&mut target, &json!({ "npmInfo": { "package": "ui" } }));
        assert_eq!(
            target,
            json!({ "npmInfo": { "destructuring": true, "package": "ui" }, "groups": ["a"] })
        );
    }

    #[test]
    fn arrays_replace() {
        let mut target = json!({ "groups": ["a", "b"] });
        merge_values(&mut target, &json!({ "groups": ["c"] }));
        assert_eq!(target, json!({ "groups": ["c"] }));
    }

    #[test]
    fn differing_kinds_replace() {
        let mut target = json!({ "baseUrl": { "production": "x" } });
        merge_values(&mut target, &json!({ "baseUrl": "y" }));
        assert_eq!(target, json!({ "baseUrl": "y" }));

        merge_values(&mut target, &json!({ "baseUrl": { "development": "z" } }));
        assert_eq!(target, json!({ "baseUrl": { "development": "z" } }));
    }

    #[test]
    fn kind_names() {
        assert_eq!(kind_of(&json!(1)), "number");
        assert_eq!(kind_of(&json!([])), "array");
        assert_eq!(kind_of(&Value::Null), "null");
    }
}
