use serde_json::Value;

/// Drop every object entry whose value is `null`, at any depth.
///
/// Array elements are left in place (even `null` ones) so indices keep their
/// meaning; objects nested inside arrays are still pruned. watsonx rejects
/// some explicit `null` parameters, so request bodies go through this first.
pub fn prune_null_fields(value: &mut Value) {
    match value {
        Value::Object(map) => {
            map.retain(|_, v| !v.is_null());
            map.values_mut().for_each(prune_null_fields);
        }
        Value::Array(items) => items.iter_mut().for_each(prune_null_fields),
        _ => {}
    }
}

/// Pruned copy of `value`; see [`prune_null_fields`].
pub fn without_null_fields(value: &Value) -> Value {
    let mut cloned = value.clone();
    prune_null_fields(&mut cloned);
    cloned
}
