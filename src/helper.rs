//! Small predicates shared by the extractor, registrar and facade.

use serde_json::Value;

/// Prefix marking keys reserved for the store itself (`$name`, `$state`, ...).
pub const RESERVED_MARKER: char = '$';

/// Whether a value carries nothing (`null`).
pub fn is_nil(value: &Value) -> bool {
    value.is_null()
}

/// Whether a value is a plain key/value object.
pub fn is_plain_object(value: &Value) -> bool {
    value.is_object()
}

/// Whether a key uses the reserved marker.
pub fn is_reserved_key(key: &str) -> bool {
    key.starts_with(RESERVED_MARKER)
}

/// Address a module member as `module/member`.
pub fn namespaced_key(module: &str, member: &str) -> String {
    format!("{module}/{member}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn predicates() {
        assert!(is_nil(&Value::Null));
        assert!(!is_nil(&json!(0)));
        assert!(is_plain_object(&json!({ "count": 0 })));
        assert!(!is_plain_object(&json!([1, 2])));
        assert!(is_reserved_key("$state"));
        assert!(!is_reserved_key("state"));
        assert_eq!(namespaced_key("counter", "double"), "counter/double");
    }
}
