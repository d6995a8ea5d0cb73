//! Message fragmentation for outgoing WebSocket messages (RFC 6455).

use bytes::Bytes;

use crate::protocol::{Frame, OpCode};

/// Iterator that produces frames from a (possibly compressed) message payload.
///
/// Splits large payloads into multiple frames according to the configured
/// fragment size. The first frame uses the original opcode and carries RSV1
/// when the payload is compressed; continuation frames never do (RFC 7692
/// §6.1).
pub struct MessageFragmenter {
    payload: Bytes,
    opcode: OpCode,
    fragment_size: usize,
    offset: usize,
    is_first: bool,
    compressed: bool,
}

impl MessageFragmenter {
    /// Create a new fragmenter for the given payload.
    #[inline]
    #[must_use]
    pub fn new(payload: impl Into<Bytes>, opcode: OpCode, fragment_size: usize) -> Self {
        Self {
            payload: payload.into(),
            opcode,
            fragment_size: fragment_size.max(1),
            offset: 0,
            is_first: true,
            compressed: false,
        }
    }

    /// Mark the payload as compressed so the first frame carries RSV1.
    #[inline]
    #[must_use]
    pub fn compressed(mut self, compressed: bool) -> Self {
        self.compressed = compressed;
        self
    }

    /// Check if fragmentation is needed (payload exceeds fragment_size).
    #[inline]
    #[must_use]
    pub fn needs_fragmentation(&self) -> bool {
        self.payload.len() > self.fragment_size
    }

    /// Get remaining bytes to send.
    #[inline]
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.payload.len().saturating_sub(self.offset)
    }
}

impl Iterator for MessageFragmenter {
    type Item = Frame;

    fn next(&mut self) -> Option<Self::Item> {
        if self.offset >= self.payload.len() {
            // An empty message is still one frame.
            if self.is_first && self.payload.is_empty() {
                self.is_first = false;
                return Some(Frame::new(true, self.opcode, Bytes::new()).with_rsv1(self.compressed));
            }
            return None;
        }

        let chunk_size = self.remaining().min(self.fragment_size);
        let end = self.offset + chunk_size;
        let is_final = end >= self.payload.len();
        let chunk = self.payload.slice(self.offset..end);
        self.offset = end;

        let frame = if self.is_first {
            self.is_first = false;
            Frame::new(is_final, self.opcode, chunk).with_rsv1(self.compressed)
        } else {
            Frame::continuation(is_final, chunk)
        };
        Some(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_fragmentation_needed() {
        let frag = MessageFragmenter::new(&b"Hello"[..], OpCode::Text, 1024);
        assert!(!frag.needs_fragmentation());

        let frames: Vec<_> = frag.collect();
        assert_eq!(frames.len(), 1);
        assert!(frames[0].fin);
        assert!(!frames[0].rsv1);
        assert_eq!(frames[0].opcode, OpCode::Text);
        assert_eq!(frames[0].payload(), b"Hello");
    }

    #[test]
    fn test_compressed_sets_rsv1_on_first_frame_only() {
        let payload = vec![0xAB; 30];
        let frames: Vec<_> = MessageFragmenter::new(payload, OpCode::Binary, 10)
            .compressed(true)
            .collect();
        assert_eq!(frames.len(), 3);

        assert!(frames[0].rsv1);
        assert!(!frames[0].fin);
        assert_eq!(frames[0].opcode, OpCode::Binary);

        assert!(!frames[1].rsv1);
        assert_eq!(frames[1].opcode, OpCode::Continuation);

        assert!(!frames[2].rsv1);
        assert!(frames[2].fin);
        assert_eq!(frames[2].opcode, OpCode::Continuation);
    }

    #[test]
    fn test_uneven_fragmentation() {
        let payload = vec![0xCD; 25];
        let frames: Vec<_> = MessageFragmenter::new(payload, OpCode::Binary, 10).collect();
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0].payload().len(), 10);
        assert_eq!(frames[1].payload().len(), 10);
        assert_eq!(frames[2].payload().len(), 5);
        assert!(frames[2].fin);
    }

    #[test]
    fn test_empty_payload() {
        let frames: Vec<_> = MessageFragmenter::new(Bytes::new(), OpCode::Text, 1024)
            .compressed(true)
            .collect();
        assert_eq!(frames.len(), 1);
        assert!(frames[0].fin);
        assert!(frames[0].rsv1);
        assert!(frames[0].payload().is_empty());
    }

    #[test]
    fn test_remaining_bytes() {
        let mut frag = MessageFragmenter::new(vec![0xAB; 30], OpCode::Binary, 10);
        assert_eq!(frag.remaining(), 30);
        frag.next();
        assert_eq!(frag.remaining(), 20);
        frag.next();
        frag.next();
        assert_eq!(frag.remaining(), 0);
        assert!(frag.next().is_none());
    }
}
