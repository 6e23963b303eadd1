//! Canonical cache keys for read coalescing.
//!
//! Two concurrent reads with structurally-equal arguments must map to the
//! same key (a miss silently disables deduplication) and two different
//! calls must never collide (a hit would hand one caller the other's
//! result). `serde_json` keeps object keys in insertion order, so plain
//! `to_string` is not canonical — keys are sorted recursively here.
//!
//! Binary and big-integer arguments are normalized at construction time by
//! [`crate::request::bytes_param`] / [`crate::request::bigint_param`], which
//! keeps this function total over `Value`.

use serde_json::Value;

/// Derive the coalescing key for `method` invoked with `params`.
pub fn coalesce_key(method: &str, params: &[Value]) -> String {
    let mut out = String::with_capacity(method.len() + 32);
    out.push_str(method);
    out.push(':');
    out.push('[');
    for (i, param) in params.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        write_canonical(param, &mut out);
    }
    out.push(']');
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort_unstable();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                // Object keys are plain strings; reuse serde's escaping.
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(&map[key], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        leaf => out.push_str(&leaf.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::{bigint_param, bytes_param};
    use serde_json::json;

    #[test]
    fn equal_buffers_yield_equal_keys() {
        let buf_a = vec![1u8, 2, 3, 4];
        let buf_b = buf_a.clone();
        let a = bytes_param(&buf_a);
        let b = bytes_param(&buf_b);
        assert_eq!(
            coalesce_key("getAccountInfo", &[a]),
            coalesce_key("getAccountInfo", &[b]),
        );
    }

    #[test]
    fn differing_args_yield_differing_keys() {
        let a = coalesce_key("getAccountInfo", &[bytes_param(&[1, 2, 3])]);
        let b = coalesce_key("getAccountInfo", &[bytes_param(&[1, 2, 4])]);
        assert_ne!(a, b);

        let c = coalesce_key("getBalance", &[bytes_param(&[1, 2, 3])]);
        assert_ne!(a, c);
    }

    #[test]
    fn object_key_order_does_not_matter() {
        let a = json!({"commitment": "finalized", "encoding": "base64"});
        let b = json!({"encoding": "base64", "commitment": "finalized"});
        assert_eq!(
            coalesce_key("getAccountInfo", &[a]),
            coalesce_key("getAccountInfo", &[b]),
        );
    }

    #[test]
    fn nested_structures_are_canonicalized() {
        let a = json!([{"b": 1, "a": [true, null]}]);
        let b = json!([{"a": [true, null], "b": 1}]);
        assert_eq!(coalesce_key("m", &[a]), coalesce_key("m", &[b]));
    }

    #[test]
    fn bigint_and_method_prefix_are_unambiguous() {
        let key = coalesce_key("getBlock", &[bigint_param(250_000_000)]);
        assert_eq!(key, "getBlock:[\"250000000n\"]");
        // A numeric argument is distinct from its bigint-string form.
        assert_ne!(key, coalesce_key("getBlock", &[json!(250_000_000)]));
    }

    #[test]
    fn empty_params() {
        assert_eq!(coalesce_key("getSlot", &[]), "getSlot:[]");
    }
}
