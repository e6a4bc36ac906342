//! Newline-delimited JSON codec for datacenter links.

use bytes::{BufMut, BytesMut};
use std::borrow::Borrow;
use tokio_util::codec::{Decoder, Encoder};

use crate::error::{ProtocolError, Result};
use crate::line::LineCodec;
use crate::message::Message;

/// Frames one JSON-encoded [`Message`] per line.
///
/// Blank lines are skipped. Anything else that fails to decode is an error;
/// the link carrying it is expected to be torn down.
#[derive(Debug, Clone, Default)]
pub struct WireCodec {
    lines: LineCodec,
}

impl WireCodec {
    /// Create a codec with the default line limit.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a codec with a custom line limit.
    pub fn with_max_len(max_len: usize) -> Self {
        Self {
            lines: LineCodec::with_max_len(max_len),
        }
    }
}

impl Decoder for WireCodec {
    type Item = Message;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Message>> {
        while let Some(line) = self.lines.decode(src)? {
            if line.trim().is_empty() {
                continue;
            }
            return Message::from_json(&line).map(Some);
        }
        Ok(None)
    }
}

impl<M: Borrow<Message>> Encoder<M> for WireCodec {
    type Error = ProtocolError;

    fn encode(&mut self, msg: M, dst: &mut BytesMut) -> Result<()> {
        let json = serde_json::to_vec(msg.borrow())?;
        dst.reserve(json.len() + 1);
        dst.put_slice(&json);
        dst.put_u8(b'\n');
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{MessageId, VectorClock};

    fn sample() -> Message {
        let mut deps = VectorClock::new();
        deps.observe(&MessageId::new("A", 0));
        Message::new(MessageId::new("A", 1), "world", deps)
    }

    #[test]
    fn test_encode_then_decode_stream() {
        let mut codec = WireCodec::new();
        let mut buf = BytesMut::new();
        codec.encode(sample(), &mut buf).unwrap();
        codec.encode(&sample(), &mut buf).unwrap();
        assert_eq!(buf.iter().filter(|b| **b == b'\n').count(), 2);

        assert_eq!(codec.decode(&mut buf).unwrap(), Some(sample()));
        assert_eq!(codec.decode(&mut buf).unwrap(), Some(sample()));
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
    }

    #[test]
    fn test_decode_waits_for_full_line() {
        let mut codec = WireCodec::new();
        let json = sample().to_json().unwrap();
        let (head, tail) = json.split_at(json.len() / 2);

        let mut buf = BytesMut::from(head);
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
        buf.extend_from_slice(tail.as_bytes());
        buf.extend_from_slice(b"\n");
        assert_eq!(codec.decode(&mut buf).unwrap(), Some(sample()));
    }

    #[test]
    fn test_blank_lines_skipped() {
        let mut codec = WireCodec::new();
        let mut buf = BytesMut::from("\n\r\n");
        buf.extend_from_slice(sample().to_json().unwrap().as_bytes());
        buf.extend_from_slice(b"\n");
        assert_eq!(codec.decode(&mut buf).unwrap(), Some(sample()));
    }

    #[test]
    fn test_garbage_is_an_error() {
        let mut codec = WireCodec::new();
        let mut buf = BytesMut::from("{\"MessageID\": 12}\n");
        assert!(matches!(codec.decode(&mut buf), Err(ProtocolError::Json(_))));
    }
}
