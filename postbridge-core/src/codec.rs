use crate::frame::{Frame, FrameKind};
use crate::ids::CorrelationId;
use serde_json::Value;
use thiserror::Error;

/// Field separator on the wire.
pub const DELIMITER: char = '|';

/// Default upper bound for a single inbound frame (1MB).
pub const DEFAULT_MAX_FRAME_LEN: usize = 1024 * 1024;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Frame too large: {0} bytes")]
    FrameTooLarge(usize),
    #[error("Expected 4 fields, found {0}")]
    FieldCount(usize),
    #[error("Unknown frame type: {0:?}")]
    UnknownType(String),
    #[error("Empty correlation id")]
    MissingCorrelationId,
    #[error("Field {field} contains the frame delimiter")]
    DelimiterInField { field: &'static str },
    #[error("Invalid JSON payload: {0}")]
    Payload(#[from] serde_json::Error),
}

impl From<CodecError> for crate::BridgeError {
    fn from(err: CodecError) -> Self {
        crate::BridgeError::bad_request(err.to_string())
    }
}

/// Encode a frame as `<type>|<correlationId>|<method>|<jsonPayload>`.
pub fn encode_frame(frame: &Frame) -> Result<String, CodecError> {
    if frame.correlation_id.as_str().is_empty() {
        return Err(CodecError::MissingCorrelationId);
    }
    if frame.correlation_id.as_str().contains(DELIMITER) {
        return Err(CodecError::DelimiterInField {
            field: "correlationId",
        });
    }
    if frame.method.contains(DELIMITER) {
        return Err(CodecError::DelimiterInField { field: "method" });
    }

    let payload = serde_json::to_string(&frame.payload)?;
    let mut out = String::with_capacity(
        frame.correlation_id.as_str().len() + frame.method.len() + payload.len() + 6,
    );
    out.push_str(frame.kind.tag());
    out.push(DELIMITER);
    out.push_str(frame.correlation_id.as_str());
    out.push(DELIMITER);
    out.push_str(&frame.method);
    out.push(DELIMITER);
    out.push_str(&payload);
    Ok(out)
}

/// Decode a frame produced by [`encode_frame`].
///
/// Only the first three delimiters split fields; the JSON payload is the
/// remainder and may itself contain `|`.
pub fn decode_frame(raw: &str) -> Result<Frame, CodecError> {
    let mut parts = raw.splitn(4, DELIMITER);
    let (Some(kind), Some(id), Some(method), Some(payload)) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(CodecError::FieldCount(raw.split(DELIMITER).count()));
    };

    let kind: FrameKind = kind.parse().map_err(CodecError::UnknownType)?;
    if id.is_empty() {
        return Err(CodecError::MissingCorrelationId);
    }
    let payload: Value = serde_json::from_str(payload)?;

    Ok(Frame {
        kind,
        correlation_id: CorrelationId::new(id),
        method: method.to_string(),
        payload,
    })
}

/// Frame codec with an inbound size limit.
#[derive(Debug, Clone)]
pub struct FrameCodec {
    max_frame_len: usize,
}

impl FrameCodec {
    pub fn new() -> Self {
        Self {
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
        }
    }

    pub fn with_max_frame_len(max_frame_len: usize) -> Self {
        Self { max_frame_len }
    }

    pub fn max_frame_len(&self) -> usize {
        self.max_frame_len
    }

    pub fn encode(&self, frame: &Frame) -> Result<String, CodecError> {
        encode_frame(frame)
    }

    pub fn decode(&self, raw: &str) -> Result<Frame, CodecError> {
        if raw.len() > self.max_frame_len {
            return Err(CodecError::FrameTooLarge(raw.len()));
        }
        decode_frame(raw)
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{AckOutcome, AckPayload};
    use serde_json::json;

    #[test]
    fn test_encode_request_layout() {
        let frame = Frame::request(
            CorrelationId::new("c-1"),
            "room.setScenePath",
            vec![json!("/x")],
        );
        let encoded = encode_frame(&frame).unwrap();
        assert_eq!(encoded, r#"req|c-1|room.setScenePath|["/x"]"#);
    }

    #[test]
    fn test_encode_ack_layout() {
        let frame = Frame::ack(
            CorrelationId::new("c-2"),
            AckOutcome::Finish,
            AckPayload {
                data: json!(100),
                action_id: "download".into(),
                complete: true,
            },
        );
        let encoded = encode_frame(&frame).unwrap();
        assert!(encoded.starts_with("ack|c-2|finish|{"));
        let decoded = decode_frame(&encoded).unwrap();
        assert_eq!(decoded, frame);
    }

    #[test]
    fn test_payload_may_contain_delimiter() {
        let frame = Frame::event(CorrelationId::new("e"), "log", vec![json!("a|b|c")]);
        let encoded = encode_frame(&frame).unwrap();
        let decoded = decode_frame(&encoded).unwrap();
        assert_eq!(decoded.args(), vec![json!("a|b|c")]);
    }

    #[test]
    fn test_payload_newlines_are_escaped() {
        let frame = Frame::event(CorrelationId::new("e"), "log", vec![json!("line1\nline2")]);
        let encoded = encode_frame(&frame).unwrap();
        assert!(!encoded.contains('\n'));
    }

    #[test]
    fn test_delimiter_in_method_rejected() {
        let frame = Frame::request(CorrelationId::new("c"), "a|b", vec![]);
        assert!(matches!(
            encode_frame(&frame),
            Err(CodecError::DelimiterInField { field: "method" })
        ));
    }

    #[test]
    fn test_delimiter_in_id_rejected() {
        let frame = Frame::request(CorrelationId::new("c|d"), "m", vec![]);
        assert!(matches!(
            encode_frame(&frame),
            Err(CodecError::DelimiterInField {
                field: "correlationId"
            })
        ));
    }

    #[test]
    fn test_malformed_frames() {
        assert!(matches!(decode_frame("req|c|m"), Err(CodecError::FieldCount(3))));
        assert!(matches!(decode_frame(""), Err(CodecError::FieldCount(1))));
        assert!(matches!(
            decode_frame("call|c|m|[]"),
            Err(CodecError::UnknownType(t)) if t == "call"
        ));
        assert!(matches!(
            decode_frame("req||m|[]"),
            Err(CodecError::MissingCorrelationId)
        ));
        assert!(matches!(decode_frame("req|c|m|{oops"), Err(CodecError::Payload(_))));
    }

    #[test]
    fn test_codec_size_limit() {
        let codec = FrameCodec::with_max_frame_len(16);
        assert_eq!(codec.max_frame_len(), 16);
        let result = codec.decode(r#"req|c|m|["aaaaaaaaaaaaaaaa"]"#);
        assert!(matches!(result, Err(CodecError::FrameTooLarge(_))));
        assert!(codec.decode("req|c|m|[]").is_ok());
    }
}
