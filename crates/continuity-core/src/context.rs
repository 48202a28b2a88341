//! Caller-supplied request context
//!
//! Context arrives as an arbitrary JSON object. Only `instance_id` (and
//! `signature` for identity checks) carries meaning; anything else is kept
//! untouched for callers that want to echo it back.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RequestContext {
    pub fn with_instance_id(instance_id: impl Into<String>) -> Self {
        Self {
            instance_id: Some(instance_id.into()),
            ..Self::default()
        }
    }

    /// Lenient conversion: non-objects become an empty context and
    /// non-string `instance_id`/`signature` values are dropped.
    pub fn from_value(value: Option<&Value>) -> Self {
        let Some(Value::Object(map)) = value else {
            return Self::default();
        };

        let mut extra = map.clone();
        let instance_id = take_string(&mut extra, "instance_id");
        let signature = take_string(&mut extra, "signature");

        Self {
            instance_id,
            signature,
            extra,
        }
    }

    pub fn instance_id(&self) -> Option<&str> {
        self.instance_id.as_deref()
    }
}

fn take_string(map: &mut Map<String, Value>, key: &str) -> Option<String> {
    match map.remove(key) {
        Some(Value::String(s)) => Some(s),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_object() {
        let value = json!({ "instance_id": "abc", "session": 4 });
        let ctx = RequestContext::from_value(Some(&value));

        assert_eq!(ctx.instance_id(), Some("abc"));
        assert_eq!(ctx.extra.get("session"), Some(&json!(4)));
    }

    #[test]
    fn test_malformed_context_is_empty() {
        assert_eq!(RequestContext::from_value(None), RequestContext::default());
        assert_eq!(
            RequestContext::from_value(Some(&json!("not an object"))),
            RequestContext::default()
        );

        let ctx = RequestContext::from_value(Some(&json!({ "instance_id": 12 })));
        assert_eq!(ctx.instance_id(), None);
    }
}
