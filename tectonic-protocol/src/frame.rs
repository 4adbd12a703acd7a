//! Frame format.
//!
//! Outbound frames are a single line of UTF-8 command text terminated by `\n`.
//! Inbound frames carry a fixed 9-byte header followed by the body:
//!
//! ```text
//! +---------+---------------------+---------------------+
//! | success |      body_len       |        body         |
//! | 1 byte  | 8 bytes, big-endian |   body_len bytes    |
//! +---------+---------------------+---------------------+
//! ```
//!
//! There is no request ID anywhere in the frame; the Nth response on a
//! connection answers the Nth command.

use crate::error::ProtocolError;
use bytes::{BufMut, Bytes, BytesMut};
use serde::de::DeserializeOwned;

/// Size of the fixed response header in bytes (1 + 8 = 9).
pub const HEADER_SIZE: usize = 9;

/// Body the server sends in reply to a poll when no event is pending.
pub const POLL_NONE: &[u8] = b"NONE";

/// Decoded response header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseHeader {
    /// Application-level success flag. Any non-zero byte is success.
    pub success: bool,
    /// Number of body bytes that follow the header.
    pub body_len: u64,
}

impl ResponseHeader {
    pub fn new(success: bool, body_len: u64) -> Self {
        Self { success, body_len }
    }

    /// Decodes a complete header.
    pub fn decode(buf: &[u8; HEADER_SIZE]) -> Self {
        let mut len = [0u8; 8];
        len.copy_from_slice(&buf[1..]);
        Self {
            success: buf[0] != 0,
            body_len: u64::from_be_bytes(len),
        }
    }

    /// Encodes the header into its wire form.
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0] = u8::from(self.success);
        buf[1..].copy_from_slice(&self.body_len.to_be_bytes());
        buf
    }
}

/// A complete response: the success flag and exactly `body_len` body bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub success: bool,
    pub body: Bytes,
}

impl Response {
    pub fn new(success: bool, body: impl Into<Bytes>) -> Self {
        Self {
            success,
            body: body.into(),
        }
    }

    pub fn ok(body: impl Into<Bytes>) -> Self {
        Self::new(true, body)
    }

    pub fn error(body: impl Into<Bytes>) -> Self {
        Self::new(false, body)
    }

    pub fn is_ok(&self) -> bool {
        self.success
    }

    /// Returns whether the body is the poll sentinel meaning "no event yet".
    ///
    /// The match is on the exact bytes `NONE`. An event whose body happens to
    /// be those four bytes is indistinguishable from the sentinel.
    pub fn is_none(&self) -> bool {
        self.body.as_ref() == POLL_NONE
    }

    /// Returns the header that describes this response.
    pub fn header(&self) -> ResponseHeader {
        ResponseHeader::new(self.success, self.body.len() as u64)
    }

    /// Interprets the body as UTF-8 text.
    pub fn body_str(&self) -> Result<&str, ProtocolError> {
        std::str::from_utf8(&self.body).map_err(|_| ProtocolError::InvalidUtf8)
    }

    /// Parses the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ProtocolError> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// Encodes the response as the server would put it on the wire.
    pub fn encode(&self) -> BytesMut {
        let mut buf = BytesMut::with_capacity(HEADER_SIZE + self.body.len());
        buf.put_slice(&self.header().encode());
        buf.put_slice(&self.body);
        buf
    }
}

/// Encodes command text as an outbound frame: the text plus one trailing newline.
pub fn encode_command(text: &str) -> BytesMut {
    let mut buf = BytesMut::with_capacity(text.len() + 1);
    buf.put_slice(text.as_bytes());
    buf.put_u8(b'\n');
    buf
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_header_layout() {
        let header = ResponseHeader::new(true, 0x0102_0304_0506_0708);
        let encoded = header.encode();
        assert_eq!(
            encoded,
            [0x01, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08]
        );
        assert_eq!(ResponseHeader::decode(&encoded), header);
    }

    #[test]
    fn test_header_any_nonzero_flag_is_success() {
        let mut raw = [0u8; HEADER_SIZE];
        raw[0] = 0x02;
        raw[8] = 5;
        let header = ResponseHeader::decode(&raw);
        assert!(header.success);
        assert_eq!(header.body_len, 5);

        raw[0] = 0x00;
        assert!(!ResponseHeader::decode(&raw).success);
    }

    #[test]
    fn test_header_max_length() {
        let raw = [0x00, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF];
        let header = ResponseHeader::decode(&raw);
        assert_eq!(header.body_len, u64::MAX);
    }

    #[test]
    fn test_encode_command_appends_single_newline() {
        assert_eq!(&encode_command("PING")[..], b"PING\n");
        assert_eq!(&encode_command("")[..], b"\n");
    }

    #[test]
    fn test_response_encode() {
        let response = Response::ok("1, 2;");
        let encoded = response.encode();
        assert_eq!(encoded.len(), HEADER_SIZE + 5);
        assert_eq!(encoded[0], 1);
        assert_eq!(&encoded[1..HEADER_SIZE], &5u64.to_be_bytes());
        assert_eq!(&encoded[HEADER_SIZE..], b"1, 2;");

        let empty = Response::error(Bytes::new()).encode();
        assert_eq!(&empty[..], &[0u8; HEADER_SIZE]);
    }

    #[test]
    fn test_poll_sentinel_is_exact() {
        assert!(Response::ok("NONE").is_none());
        assert!(!Response::ok("NONE\n").is_none());
        assert!(!Response::ok("none").is_none());
        assert!(!Response::ok(r#"{"ts":1}"#).is_none());
        assert!(!Response::ok(Bytes::new()).is_none());
    }

    #[test]
    fn test_response_json() {
        let response = Response::ok(r#"[{"seq":1},{"seq":2}]"#);
        let value: serde_json::Value = response.json().unwrap();
        assert_eq!(value[1]["seq"], 2);

        let bad = Response::ok("not json");
        assert!(matches!(
            bad.json::<serde_json::Value>(),
            Err(ProtocolError::Json(_))
        ));
    }

    #[test]
    fn test_body_str_rejects_invalid_utf8() {
        let response = Response::ok(vec![0xFF, 0xFE]);
        assert!(matches!(response.body_str(), Err(ProtocolError::InvalidUtf8)));
        assert_eq!(Response::ok("1.0.0").body_str().unwrap(), "1.0.0");
    }

    proptest! {
        #[test]
        fn prop_header_fields_match_raw_bytes(raw in any::<[u8; HEADER_SIZE]>()) {
            let header = ResponseHeader::decode(&raw);
            prop_assert_eq!(header.success, raw[0] != 0);
            let mut expected = 0u64;
            for b in &raw[1..] {
                expected = (expected << 8) | u64::from(*b);
            }
            prop_assert_eq!(header.body_len, expected);
        }

        #[test]
        fn prop_encoded_response_length(body in proptest::collection::vec(any::<u8>(), 0..512)) {
            let encoded = Response::ok(body.clone()).encode();
            prop_assert_eq!(encoded.len(), HEADER_SIZE + body.len());
            let mut raw = [0u8; HEADER_SIZE];
            raw.copy_from_slice(&encoded[..HEADER_SIZE]);
            prop_assert_eq!(ResponseHeader::decode(&raw).body_len, body.len() as u64);
        }
    }
}
