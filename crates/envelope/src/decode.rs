use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{EnvelopeError, Result};

/// The broker's wrapper around an application payload.
#[derive(Debug, Deserialize)]
struct PushMessage {
    data: Option<String>,
    #[serde(rename = "messageId")]
    message_id: Option<String>,
    #[allow(dead_code)]
    #[serde(rename = "publishTime")]
    publish_time: Option<String>,
    #[allow(dead_code)]
    #[serde(default)]
    attributes: std::collections::HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct PushEnvelope {
    message: PushMessage,
}

/// Result of decoding an inbound webhook body: the decoded JSON payload
/// plus the broker's `messageId`, if this was a push invocation.
#[derive(Debug, Clone)]
pub struct DecodedEnvelope {
    pub payload: Value,
    pub message_id: Option<String>,
}

/// Accepts either a direct payload (a bare JSON object) or a push envelope
/// (`{"message": {"data": base64(json), ...}}`) and returns the decoded
/// payload. Never mutates state; purely a parse.
pub fn decode_body(body: &[u8]) -> Result<DecodedEnvelope> {
    let raw: Value = serde_json::from_slice(body)
        .map_err(|e| EnvelopeError::MalformedEnvelope(format!("body is not valid JSON: {e}")))?;

    if let Some(message) = raw.get("message") {
        let envelope: PushEnvelope = serde_json::from_value(
            serde_json::json!({ "message": message }),
        )
        .map_err(|e| EnvelopeError::MalformedEnvelope(format!("invalid push envelope: {e}")))?;

        let data = envelope
            .message
            .data
            .ok_or_else(|| EnvelopeError::MalformedEnvelope("message.data is missing".into()))?;

        let decoded_bytes = BASE64
            .decode(data.as_bytes())
            .map_err(|e| EnvelopeError::MalformedEnvelope(format!("message.data is not valid base64: {e}")))?;

        let payload: Value = serde_json::from_slice(&decoded_bytes).map_err(|e| {
            EnvelopeError::MalformedEnvelope(format!(
                "decoded message.data is not valid JSON: {e}"
            ))
        })?;

        return Ok(DecodedEnvelope {
            payload,
            message_id: envelope.message.message_id,
        });
    }

    Ok(DecodedEnvelope {
        payload: raw,
        message_id: None,
    })
}

/// Require a set of top-level string-keyed fields to be present on a
/// decoded payload, for event types whose required-field set the decoder
/// itself doesn't know about (that's the webhook handler's job per §4.8).
pub fn require_fields(payload: &Value, fields: &[&str]) -> Result<()> {
    let obj = payload
        .as_object()
        .ok_or_else(|| EnvelopeError::MissingField("payload is not a JSON object".into()))?;

    for field in fields {
        if !obj.contains_key(*field) {
            return Err(EnvelopeError::MissingField((*field).to_string()));
        }
    }

    Ok(())
}

/// Base64-encode a JSON payload into a push envelope, the inverse of
/// [`decode_body`] for the push path. Used by tests and by the producer
/// side of the event bus client.
pub fn encode_push(payload: &Value, message_id: impl Into<String>) -> Value {
    let json = serde_json::to_vec(payload).expect("payload must serialize");
    let data = BASE64.encode(json);

    serde_json::json!({
        "message": {
            "data": data,
            "messageId": message_id.into(),
            "publishTime": chrono::Utc::now().to_rfc3339(),
            "attributes": {},
        }
    })
}

/// Encode a payload as a direct invocation body (no envelope).
pub fn encode_direct(payload: &Value) -> Value {
    payload.clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direct_payload_round_trips() {
        let payload = serde_json::json!({"a": 1, "b": "two"});
        let body = encode_direct(&payload);
        let decoded = decode_body(body.to_string().as_bytes()).unwrap();
        assert_eq!(decoded.payload, payload);
        assert!(decoded.message_id.is_none());
    }

    #[test]
    fn push_payload_round_trips() {
        let payload = serde_json::json!({"a": 1, "b": "two"});
        let body = encode_push(&payload, "msg-1");
        let decoded = decode_body(body.to_string().as_bytes()).unwrap();
        assert_eq!(decoded.payload, payload);
        assert_eq!(decoded.message_id.as_deref(), Some("msg-1"));
    }

    #[test]
    fn missing_data_is_malformed() {
        let body = serde_json::json!({"message": {"messageId": "x"}});
        let err = decode_body(body.to_string().as_bytes()).unwrap_err();
        assert!(matches!(err, EnvelopeError::MalformedEnvelope(_)));
    }

    #[test]
    fn invalid_base64_is_malformed() {
        let body = serde_json::json!({"message": {"data": "not-base64!!", "messageId": "x"}});
        let err = decode_body(body.to_string().as_bytes()).unwrap_err();
        assert!(matches!(err, EnvelopeError::MalformedEnvelope(_)));
    }

    #[test]
    fn non_json_decoded_payload_is_malformed() {
        let data = BASE64.encode(b"not json");
        let body = serde_json::json!({"message": {"data": data, "messageId": "x"}});
        let err = decode_body(body.to_string().as_bytes()).unwrap_err();
        assert!(matches!(err, EnvelopeError::MalformedEnvelope(_)));
    }

    #[test]
    fn non_json_body_is_malformed() {
        let err = decode_body(b"not json at all").unwrap_err();
        assert!(matches!(err, EnvelopeError::MalformedEnvelope(_)));
    }

    #[test]
    fn require_fields_detects_missing() {
        let payload = serde_json::json!({"a": 1});
        assert!(require_fields(&payload, &["a"]).is_ok());
        let err = require_fields(&payload, &["a", "b"]).unwrap_err();
        assert!(matches!(err, EnvelopeError::MissingField(ref f) if f == "b"));
    }
}
