//! JSON merge helpers for layered configuration.

use serde_json::{Map, Value};

/// Recursively merge `overlay` into `base`; non-object values replace.
pub(super) fn merge_json_values(base: &mut Value, overlay: &Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(key) {
                    Some(existing) => merge_json_values(existing, value),
                    None => {
                        base_map.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (slot, value) => *slot = value.clone(),
    }
}

/// Merge `overlay` into `base`, skipping every leaf that `locks` defines.
pub(super) fn merge_json_with_constraints(base: &mut Value, overlay: &Value, locks: Option<&Value>) {
    let lock_map = match locks {
        None => {
            merge_json_values(base, overlay);
            return;
        }
        Some(Value::Object(map)) => map,
        // A non-object lock pins the whole subtree.
        Some(_) => return,
    };
    let (Value::Object(base_map), Value::Object(overlay_map)) = (base, overlay) else {
        return;
    };
    for (key, value) in overlay_map {
        let entry = base_map
            .entry(key.clone())
            .or_insert_with(|| empty_like(value));
        merge_json_with_constraints(entry, value, lock_map.get(key));
    }
}

fn empty_like(value: &Value) -> Value {
    if value.is_object() {
        Value::Object(Map::new())
    } else {
        Value::Null
    }
}

#[cfg(test)]
mod tests {
    use super::{merge_json_values, merge_json_with_constraints};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn overlay_replaces_leaves_and_keeps_siblings() {
        let mut base = json!({ "engine": { "activity_log_capacity": 50, "handler_failures": "isolate" } });
        merge_json_values(&mut base, &json!({ "engine": { "activity_log_capacity": 10 } }));
        assert_eq!(
            base,
            json!({ "engine": { "activity_log_capacity": 10, "handler_failures": "isolate" } })
        );
    }

    #[test]
    fn locked_leaves_survive_overlays() {
        let locks = json!({ "engine": { "handler_failures": "halt" } });
        let mut base = locks.clone();
        merge_json_with_constraints(
            &mut base,
            &json!({ "engine": { "handler_failures": "isolate", "activity_log_capacity": 5 } }),
            Some(&locks),
        );
        assert_eq!(
            base,
            json!({ "engine": { "handler_failures": "halt", "activity_log_capacity": 5 } })
        );
    }
}
