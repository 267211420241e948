//! Wire-format translation.
//!
//! The domain crates (`pos-core`, `pos-stock`, ...) serialize with
//! `snake_case` field names because those same `Serialize` impls double as
//! the BSON encoding stored in MongoDB (`pos-storage`'s collections use the
//! Rust field names verbatim as document keys). Spec §6 requires camelCase
//! bodies on the HTTP surface. Rather than fork the domain types into a
//! parallel camelCase DTO for every struct, handlers serialize the domain
//! value to a `serde_json::Value` and run it through [`to_camel_case`],
//! which recursively renames object keys. `ItemRecord`/`Terminal`/`Stock`
//! and friends already derive `#[serde(rename_all = "camelCase")]` and pass
//! through unchanged.

use serde::Serialize;
use serde_json::{Map, Value};

pub fn to_camel_value<T: Serialize>(value: &T) -> Value {
    let raw = serde_json::to_value(value).unwrap_or(Value::Null);
    to_camel_case(raw)
}

fn to_camel_case(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut out = Map::with_capacity(map.len());
            for (key, v) in map {
                out.insert(snake_to_camel(&key), to_camel_case(v));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(to_camel_case).collect()),
        other => other,
    }
}

fn snake_to_camel(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    let mut capitalize_next = false;
    for c in key.chars() {
        if c == '_' {
            capitalize_next = true;
        } else if capitalize_next {
            out.extend(c.to_uppercase());
            capitalize_next = false;
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn renames_nested_object_keys() {
        let input = json!({ "cart_id": "c1", "line_items": [{ "unit_price": 100 }] });
        let out = to_camel_case(input);
        assert_eq!(out["cartId"], json!("c1"));
        assert_eq!(out["lineItems"][0]["unitPrice"], json!(100));
    }

    #[test]
    fn leaves_already_camel_keys_untouched() {
        assert_eq!(snake_to_camel("businessDate"), "businessDate");
        assert_eq!(snake_to_camel("business_date"), "businessDate");
    }
}
