//! Value encoding for the cache store.
//!
//! Every value is stored as JSON text. A string is therefore stored quoted,
//! which keeps `"123"` (text) and `123` (number) apart on decode.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use super::CacheError;

/// A decoded cache value.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheValue {
    Number(serde_json::Number),
    Text(String),
    Json(Value),
}

impl CacheValue {
    /// Wire text for this value.
    pub fn encode(&self) -> String {
        match self {
            CacheValue::Number(n) => n.to_string(),
            CacheValue::Text(s) => Value::String(s.clone()).to_string(),
            CacheValue::Json(v) => v.to_string(),
        }
    }

    /// Decode wire text. Anything that is not JSON is legacy raw text.
    pub fn decode(raw: &str) -> Self {
        match serde_json::from_str::<Value>(raw) {
            Ok(Value::Number(n)) => CacheValue::Number(n),
            Ok(Value::String(s)) => CacheValue::Text(s),
            Ok(other) => CacheValue::Json(other),
            Err(_) => CacheValue::Text(raw.to_string()),
        }
    }

    pub fn into_json(self) -> Value {
        match self {
            CacheValue::Number(n) => Value::Number(n),
            CacheValue::Text(s) => Value::String(s),
            CacheValue::Json(v) => v,
        }
    }
}

impl From<Value> for CacheValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Number(n) => CacheValue::Number(n),
            Value::String(s) => CacheValue::Text(s),
            other => CacheValue::Json(other),
        }
    }
}

/// Encode a serializable value to wire text.
pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<String, CacheError> {
    Ok(serde_json::to_string(value)?)
}

/// Decode wire text into `T`, accepting legacy unquoted text for string-like targets.
pub fn decode<T: DeserializeOwned>(raw: &str) -> Result<T, CacheError> {
    Ok(serde_json::from_value(CacheValue::decode(raw).into_json())?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[test]
    fn test_numeric_text_stays_text() {
        let text = CacheValue::Text("123".into());
        let number = CacheValue::Number(123.into());
        assert_eq!(text.encode(), "\"123\"");
        assert_eq!(number.encode(), "123");
        assert_eq!(CacheValue::decode(&text.encode()), text);
        assert_eq!(CacheValue::decode(&number.encode()), number);
    }

    #[test]
    fn test_legacy_raw_text() {
        assert_eq!(CacheValue::decode("active"), CacheValue::Text("active".into()));
        let status: String = decode("active").unwrap();
        assert_eq!(status, "active");
    }

    #[test]
    fn test_typed_round_trip() {
        #[derive(Debug, PartialEq, serde::Serialize, Deserialize)]
        struct Player {
            uno: String,
            count: u64,
        }
        let player = Player {
            uno: "007".into(),
            count: 3,
        };
        let raw = encode(&player).unwrap();
        assert!(matches!(CacheValue::decode(&raw), CacheValue::Json(_)));
        let back: Player = decode(&raw).unwrap();
        assert_eq!(back, player);
    }

    #[test]
    fn test_decode_type_mismatch_is_error() {
        let raw = encode(&"abc").unwrap();
        assert!(decode::<u64>(&raw).is_err());
    }
}
