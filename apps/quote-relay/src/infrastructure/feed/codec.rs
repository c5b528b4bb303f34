//! Feed Frame Codec
//!
//! Decodes text frames from the upstream feed into typed messages. The
//! feed sends either a single JSON object or a JSON array of objects
//! (ticks are batched during bursts); both shapes decode to a flat list.
//!
//! A frame that fails to decode is reported as a `CodecError` so the
//! caller can log and drop it; malformed input is never fatal to the
//! connection.

use serde_json::Value;

use super::messages::{
    ErrorMessage, FeedMessage, SubscriptionMessage, SuccessMessage, TickMessage,
};

/// Codec errors.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// JSON parsing failed.
    #[error("JSON codec error: {0}")]
    Json(#[from] serde_json::Error),

    /// The `t` discriminator was missing or unrecognized.
    #[error("unknown message type: {0}")]
    UnknownMessageType(String),

    /// The frame was neither a JSON object nor an array.
    #[error("invalid frame: {0}")]
    InvalidFrame(String),
}

/// JSON codec for feed frames.
#[derive(Debug, Default, Clone)]
pub struct FeedCodec;

impl FeedCodec {
    /// Create a new codec.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Decode a text frame into the messages it contains.
    ///
    /// # Errors
    ///
    /// Returns an error when the frame is not valid JSON, is not an
    /// object/array, or carries an unknown `t` discriminator.
    pub fn decode(&self, text: &str) -> Result<Vec<FeedMessage>, CodecError> {
        let trimmed = text.trim();

        if trimmed.starts_with('[') {
            let values: Vec<Value> = serde_json::from_str(trimmed)?;
            values.into_iter().map(Self::decode_value).collect()
        } else if trimmed.starts_with('{') {
            let value: Value = serde_json::from_str(trimmed)?;
            Ok(vec![Self::decode_value(value)?])
        } else {
            Err(CodecError::InvalidFrame(format!(
                "expected JSON object or array, got: {}",
                &trimmed[..trimmed.len().min(40)]
            )))
        }
    }

    /// Encode a request for sending to the feed.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn encode<T: serde::Serialize>(&self, value: &T) -> Result<String, CodecError> {
        Ok(serde_json::to_string(value)?)
    }

    fn decode_value(value: Value) -> Result<FeedMessage, CodecError> {
        let msg_type = value
            .get("t")
            .and_then(Value::as_str)
            .map(ToString::to_string);

        match msg_type.as_deref() {
            Some("success") => {
                let msg: SuccessMessage = serde_json::from_value(value)?;
                Ok(FeedMessage::Success(msg))
            }
            Some("error") => {
                let msg: ErrorMessage = serde_json::from_value(value)?;
                Ok(FeedMessage::Error(msg))
            }
            Some("subscription") => {
                let msg: SubscriptionMessage = serde_json::from_value(value)?;
                Ok(FeedMessage::Subscription(msg))
            }
            Some("tick") => {
                let msg: TickMessage = serde_json::from_value(value)?;
                Ok(FeedMessage::Tick(msg))
            }
            Some(other) => Err(CodecError::UnknownMessageType(other.to_string())),
            None => Err(CodecError::UnknownMessageType(
                "missing 't' field".to_string(),
            )),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use rust_decimal::Decimal;

    use super::*;
    use crate::infrastructure::feed::messages::SuccessKind;

    #[test]
    fn decode_single_success() {
        let codec = FeedCodec::new();
        let messages = codec.decode(r#"{"t":"success","msg":"connected"}"#).unwrap();

        assert_eq!(messages.len(), 1);
        match &messages[0] {
            FeedMessage::Success(msg) => assert_eq!(msg.msg, SuccessKind::Connected),
            other => panic!("expected Success, got {other:?}"),
        }
    }

    #[test]
    fn decode_tick_batch() {
        let codec = FeedCodec::new();
        let frame = r#"[
            {"t":"tick","token":"99926000","ltp":22500.0,"ts":"2026-08-07T09:15:00Z"},
            {"t":"tick","token":"99926037","ltp":48210.25,"ts":"2026-08-07T09:15:00Z"}
        ]"#;

        let messages = codec.decode(frame).unwrap();
        assert_eq!(messages.len(), 2);

        match &messages[1] {
            FeedMessage::Tick(tick) => {
                assert_eq!(tick.token, "99926037");
                assert_eq!(tick.ltp, Decimal::from_str("48210.25").unwrap());
            }
            other => panic!("expected Tick, got {other:?}"),
        }
    }

    #[test]
    fn decode_error_message() {
        let codec = FeedCodec::new();
        let messages = codec
            .decode(r#"{"t":"error","code":402,"msg":"invalid credentials"}"#)
            .unwrap();

        match &messages[0] {
            FeedMessage::Error(err) => assert_eq!(err.code, 402),
            other => panic!("expected Error, got {other:?}"),
        }
    }

    #[test]
    fn unknown_type_is_an_error() {
        let codec = FeedCodec::new();
        let result = codec.decode(r#"{"t":"depth","token":"1"}"#);
        assert!(matches!(result, Err(CodecError::UnknownMessageType(_))));
    }

    #[test]
    fn missing_discriminator_is_an_error() {
        let codec = FeedCodec::new();
        let result = codec.decode(r#"{"token":"99926000","ltp":1.0}"#);
        assert!(matches!(result, Err(CodecError::UnknownMessageType(_))));
    }

    #[test]
    fn non_json_frame_is_an_error() {
        let codec = FeedCodec::new();
        assert!(codec.decode("pong").is_err());
        assert!(codec.decode("").is_err());
    }

    #[test]
    fn empty_array_decodes_to_nothing() {
        let codec = FeedCodec::new();
        let messages = codec.decode("[]").unwrap();
        assert!(messages.is_empty());
    }

    #[test]
    fn encode_subscribe_request() {
        let codec = FeedCodec::new();
        let request =
            crate::infrastructure::feed::messages::SubscribeRequest::ltp(vec!["1".to_string()]);
        let json = codec.encode(&request).unwrap();
        assert!(json.contains(r#""action":"subscribe""#));
    }
}
