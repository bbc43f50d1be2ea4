//! Conversion between JSON shape records and Loro values.

use base64::{Engine, engine::general_purpose::STANDARD};
use loro::LoroValue;
use serde_json::{Map, Number, Value};
use std::collections::HashMap;

/// Convert a JSON value to a plain (non-container) Loro value.
pub fn json_to_loro(value: &Value) -> LoroValue {
    match value {
        Value::Null => LoroValue::Null,
        Value::Bool(b) => LoroValue::from(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => LoroValue::from(i),
            None => LoroValue::from(n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => LoroValue::from(s.as_str()),
        Value::Array(items) => LoroValue::from(items.iter().map(json_to_loro).collect::<Vec<_>>()),
        Value::Object(map) => LoroValue::from(
            map.iter()
                .map(|(k, v)| (k.clone(), json_to_loro(v)))
                .collect::<HashMap<String, LoroValue>>(),
        ),
    }
}

/// Convert a Loro value back to JSON. Containers have no JSON form and
/// become null; binary payloads become base64 strings.
pub fn loro_to_json(value: &LoroValue) -> Value {
    match value {
        LoroValue::Null | LoroValue::Container(_) => Value::Null,
        LoroValue::Bool(b) => Value::Bool(*b),
        LoroValue::I64(i) => Value::from(*i),
        LoroValue::Double(d) => Number::from_f64(*d).map_or(Value::Null, Value::Number),
        LoroValue::String(s) => Value::String(s.to_string()),
        LoroValue::Binary(bytes) => Value::String(STANDARD.encode(bytes.as_slice())),
        LoroValue::List(items) => Value::Array(items.iter().map(loro_to_json).collect()),
        LoroValue::Map(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.to_string(), loro_to_json(v)))
                .collect::<Map<String, Value>>(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_nested_record_survives() {
        let record = json!({
            "type": "path",
            "path": [{"x": 1.5, "y": 2.0}, {"x": 3, "y": -4}],
            "fill": null,
            "visible": true,
            "text": "ok",
        });
        assert_eq!(loro_to_json(&json_to_loro(&record)), record);
    }

    #[test]
    fn test_number_kinds_preserved() {
        assert!(matches!(json_to_loro(&json!(7)), LoroValue::I64(7)));
        assert!(matches!(json_to_loro(&json!(7.0)), LoroValue::Double(_)));
        assert_eq!(loro_to_json(&LoroValue::Double(f64::NAN)), Value::Null);
    }
}
