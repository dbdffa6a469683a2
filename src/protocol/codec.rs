use bytes::{BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::protocol::{ProtocolError, Request, Response};

/// Maximum frame length in bytes, excluding the newline (64 KB).
pub const DEFAULT_MAX_FRAME_LENGTH: usize = 64 * 1024;

/// Codec for newline-delimited JSON frames.
/// Decodes `Request` (in request.rs) and encodes `Response` (in response.rs).
///
/// A trailing `\r` and surrounding whitespace are ignored. The frame length
/// is bounded so that a peer that never sends a newline cannot grow the read
/// buffer without limit.
pub struct JsonLineCodec {
    pub(crate) max_frame_length: usize,
    /// Index in the read buffer up to which no newline was found.
    next_index: usize,
}

impl JsonLineCodec {
    /// Creates a new JsonLineCodec with the default maximum frame length.
    pub fn new() -> Self {
        Self::with_max_frame_length(DEFAULT_MAX_FRAME_LENGTH)
    }

    pub fn with_max_frame_length(max_frame_length: usize) -> Self {
        Self {
            max_frame_length,
            next_index: 0,
        }
    }

    pub fn max_frame_length(&self) -> usize {
        self.max_frame_length
    }

    fn parse_frame(frame: &[u8]) -> Result<Request, ProtocolError> {
        let text = std::str::from_utf8(frame).map_err(|_| ProtocolError::InvalidUtf8)?;
        let text = text.trim();
        if text.is_empty() {
            return Err(ProtocolError::EmptyFrame);
        }
        let value: serde_json::Value = serde_json::from_str(text)?;
        if !value.is_object() {
            return Err(ProtocolError::NotAnObject);
        }
        Ok(serde_json::from_value(value)?)
    }
}

impl Default for JsonLineCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for JsonLineCodec {
    type Item = Request;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        // Never scan past the longest frame we would accept
        let read_to = src.len().min(self.max_frame_length.saturating_add(1));

        let Some(offset) = src[self.next_index..read_to]
            .iter()
            .position(|&b| b == b'\n')
        else {
            if src.len() > self.max_frame_length {
                return Err(ProtocolError::FrameTooLong {
                    limit: self.max_frame_length,
                });
            }
            self.next_index = read_to;
            return Ok(None);
        };

        let newline = self.next_index + offset;
        self.next_index = 0;

        let frame = src.split_to(newline + 1);
        Self::parse_frame(&frame[..newline]).map(Some)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(src)? {
            Some(request) => Ok(Some(request)),
            None if src.is_empty() => Ok(None),
            None => Err(ProtocolError::UnterminatedFrame),
        }
    }
}

impl Encoder<Response> for JsonLineCodec {
    type Error = ProtocolError;

    fn encode(&mut self, item: Response, dst: &mut BytesMut) -> Result<(), Self::Error> {
        // serde_json escapes newlines inside strings, so the frame stays on one line
        let json = serde_json::to_vec(&item)?;
        dst.reserve(json.len() + 1);
        dst.extend_from_slice(&json);
        dst.put_u8(b'\n');
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// Helper to decode one request from bytes
    fn decode_request(buf: &[u8]) -> Result<Option<Request>, ProtocolError> {
        let mut codec = JsonLineCodec::new();
        let mut bytes = BytesMut::from(buf);
        codec.decode(&mut bytes)
    }

    #[test]
    fn test_decode_request() {
        let request = decode_request(b"{\"command\":\"auth\",\"data\":{\"vm_id\":1}}\n")
            .unwrap()
            .unwrap();
        assert_eq!(request.command.as_deref(), Some("auth"));
        assert_eq!(request.data, Some(json!({"vm_id": 1})));
    }

    #[test]
    fn test_decode_crlf() {
        let request = decode_request(b"{\"command\":\"list_vms\"}\r\n")
            .unwrap()
            .unwrap();
        assert_eq!(request.command.as_deref(), Some("list_vms"));
    }

    #[test]
    fn test_decode_incomplete() {
        assert!(decode_request(b"{\"command\":").unwrap().is_none());
    }

    #[test]
    fn test_decode_split_frames() {
        let mut codec = JsonLineCodec::new();
        let mut buf = BytesMut::from(&b"{\"command\":"[..]);
        assert!(codec.decode(&mut buf).unwrap().is_none());

        buf.extend_from_slice(b"\"logout\"}\n{\"command\":\"list_disks\"}\n");
        let first = codec.decode(&mut buf).unwrap().unwrap();
        let second = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(first.command.as_deref(), Some("logout"));
        assert_eq!(second.command.as_deref(), Some("list_disks"));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_decode_empty_frame() {
        assert!(matches!(decode_request(b"\n"), Err(ProtocolError::EmptyFrame)));
        assert!(matches!(decode_request(b"   \r\n"), Err(ProtocolError::EmptyFrame)));
    }

    #[test]
    fn test_decode_invalid_json() {
        assert!(matches!(decode_request(b"not json\n"), Err(ProtocolError::Json(_))));
    }

    #[test]
    fn test_decode_non_string_command() {
        // Answered by the dispatcher, not a protocol fault
        let request = decode_request(b"{\"command\":5}\n").unwrap().unwrap();
        assert_eq!(request.command, None);
    }

    #[test]
    fn test_decode_not_an_object() {
        assert!(matches!(
            decode_request(b"[\"list_vms\"]\n"),
            Err(ProtocolError::NotAnObject)
        ));
        assert!(matches!(decode_request(b"42\n"), Err(ProtocolError::NotAnObject)));
    }

    #[test]
    fn test_decode_invalid_utf8() {
        assert!(matches!(
            decode_request(&[0xff, 0xfe, b'\n']),
            Err(ProtocolError::InvalidUtf8)
        ));
    }

    #[test]
    fn test_decode_frame_too_long() {
        let mut codec = JsonLineCodec::with_max_frame_length(8);
        let mut buf = BytesMut::from(&b"{\"command\":\"list_vms\"}\n"[..]);
        assert!(matches!(
            codec.decode(&mut buf),
            Err(ProtocolError::FrameTooLong { limit: 8 })
        ));
    }

    #[test]
    fn test_decode_eof_unterminated() {
        let mut codec = JsonLineCodec::new();
        let mut buf = BytesMut::from(&b"{\"command\":\"list_vms\"}"[..]);
        assert!(matches!(
            codec.decode_eof(&mut buf),
            Err(ProtocolError::UnterminatedFrame)
        ));

        let mut buf = BytesMut::new();
        assert!(codec.decode_eof(&mut buf).unwrap().is_none());
    }

    #[test]
    fn test_encode_response() {
        let mut codec = JsonLineCodec::new();
        let mut buf = BytesMut::new();
        codec
            .encode(Response::error("line\nbreak"), &mut buf)
            .unwrap();

        assert_eq!(buf.iter().filter(|&&b| b == b'\n').count(), 1);
        assert_eq!(buf.last(), Some(&b'\n'));
        let value: serde_json::Value = serde_json::from_slice(&buf[..buf.len() - 1]).unwrap();
        assert_eq!(value, json!({"error": "line\nbreak"}));
    }
}
