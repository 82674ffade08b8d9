//!
//! Field by field reading of direct invocation payloads, so a field of the wrong shape can be
//! answered with a 400 instead of failing in the runtime before the handler runs
//!
use finlake::{LakeError, LakeResult};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// The fields of an invocation payload, which must be a JSON object
pub fn fields(payload: &Value) -> LakeResult<&Map<String, Value>> {
    payload
        .as_object()
        .ok_or_else(|| LakeError::InvalidEvent(format!("expected a JSON object, got {payload}")))
}

/// Read `key` out of `fields`. An absent or `null` field is `Ok(None)`
pub fn field<T: DeserializeOwned>(
    fields: &Map<String, Value>,
    key: &str,
) -> Result<Option<T>, serde_json::Error> {
    match fields.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => T::deserialize(value).map(Some),
    }
}

/// The raw JSON of `key`, for error messages
pub fn raw_field(fields: &Map<String, Value>, key: &str) -> String {
    fields.get(key).map(Value::to_string).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_fields_requires_object() {
        assert!(fields(&json!({"ticker": "MSFT"})).is_ok());
        for payload in [json!("MSFT"), json!(["MSFT"]), Value::Null] {
            assert!(matches!(fields(&payload), Err(LakeError::InvalidEvent(_))));
        }
    }

    #[test]
    fn test_field() {
        let payload = json!({"ticker": "MSFT", "dates": "2024-01-02", "backfill": null});
        let map = fields(&payload).expect("payload is an object");

        assert_eq!(
            field::<String>(map, "ticker").expect("ticker is a string"),
            Some("MSFT".to_string())
        );
        assert_eq!(field::<bool>(map, "backfill").expect("null is absent"), None);
        assert_eq!(field::<bool>(map, "missing").expect("absent"), None);
        assert!(field::<Vec<String>>(map, "dates").is_err());
        assert_eq!(raw_field(map, "dates"), "\"2024-01-02\"");
        assert_eq!(raw_field(map, "missing"), "");
    }
}
