use serde_json::Value;

/// Field-name fragments that mark a value as sensitive. Matching is
/// case-insensitive and by substring, so `hashed_password`, `user_ssn`, and
/// `apiKey` are all caught by one entry.
const SENSITIVE_NAME_FRAGMENTS: &[&str] = &[
    "password",
    "token",
    "secret",
    "key",
    "ssn",
    "card",
    "cvv",
    "auth",
    "session",
    "cookie",
    "phone",
    "address",
    "dob",
    "birth",
    "private",
];

const REDACTED: &str = "[REDACTED]";

fn is_sensitive_field(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    SENSITIVE_NAME_FRAGMENTS.iter().any(|fragment| lower.contains(fragment))
}

/// Walk a before/after state value and replace every sensitive field's
/// value with a fixed redaction marker, recursing into nested objects and
/// arrays. Idempotent: redacting an already-redacted value changes
/// nothing, since the marker's field name never itself flags the field
/// and the marker is a plain string, not an object or array to descend
/// into.
pub fn redact(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, val)| {
                    if is_sensitive_field(&key) {
                        (key, Value::String(REDACTED.to_string()))
                    } else {
                        (key, redact(val))
                    }
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(redact).collect()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn redacts_sensitive_top_level_fields() {
        let input = json!({"email": "u@x", "password": "p@ss"});
        let output = redact(input);
        assert_eq!(output["email"], json!("u@x"));
        assert_eq!(output["password"], json!(REDACTED));
    }

    #[test]
    fn redacts_nested_fields() {
        let input = json!({"profile": {"name": "Ada", "ssn": "123-45-6789"}});
        let output = redact(input);
        assert_eq!(output["profile"]["name"], json!("Ada"));
        assert_eq!(output["profile"]["ssn"], json!(REDACTED));
    }

    #[test]
    fn redacts_within_arrays() {
        let input = json!([{"token": "abc"}, {"name": "ok"}]);
        let output = redact(input);
        assert_eq!(output[0]["token"], json!(REDACTED));
        assert_eq!(output[1]["name"], json!("ok"));
    }

    #[test]
    fn is_idempotent() {
        let input = json!({"api_key": "sk-live-abc", "bio": "hi"});
        let once = redact(input);
        let twice = redact(once.clone());
        assert_eq!(once, twice);
    }
}
