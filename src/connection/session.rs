//! Glue between the compression [`Processor`] and a framing layer.
//!
//! [`MessageWriter`] turns application messages into frames, compressing
//! and setting RSV1 when an extension was negotiated. [`MessageReader`]
//! reassembles data frames, enforces the RSV1 rules of RFC 7692 §6 and
//! decompresses. Wire encoding, masking and control-frame handling stay with
//! the framing layer.

use bytes::Bytes;

use crate::compression::{MessageCompressor, MessageDecompressor, Processor};
use crate::config::{Config, Limits};
use crate::connection::fragmenter::MessageFragmenter;
use crate::connection::role::Role;
use crate::connection::stats::{OctetCounter, TrafficStats};
use crate::error::{Error, Result};
use crate::message::Message;
use crate::protocol::{Frame, MAX_CONTROL_FRAME_PAYLOAD, OpCode};

/// Outbound half of a [`Session`].
#[derive(Debug)]
pub struct MessageWriter {
    compressor: Option<MessageCompressor>,
    fragment_size: usize,
    stats: OctetCounter,
}

impl MessageWriter {
    /// Create a writer; `compressor` is `None` when no extension was negotiated.
    #[must_use]
    pub fn new(compressor: Option<MessageCompressor>, config: &Config) -> Self {
        Self {
            compressor,
            fragment_size: config.fragment_size,
            stats: OctetCounter::default(),
        }
    }

    /// Frame `message`, compressing it unless `do_not_compress` is set or no
    /// extension was negotiated.
    ///
    /// # Errors
    ///
    /// Returns the compressor's error; see [`MessageCompressor::compress`].
    pub fn send(&mut self, message: &Message, do_not_compress: bool) -> Result<Vec<Frame>> {
        let data = message.as_bytes();
        let (payload, compressed) = match self.compressor.as_mut() {
            Some(compressor) if !do_not_compress => {
                (Bytes::from(compressor.compress_message(data)?), true)
            }
            _ => (Bytes::copy_from_slice(data), false),
        };

        let wire_len = payload.len();
        let frames: Vec<Frame> =
            MessageFragmenter::new(payload, message.opcode(), self.fragment_size)
                .compressed(compressed)
                .collect();
        self.stats.record(data.len(), wire_len, frames.len());
        Ok(frames)
    }

    /// Whether an extension is active on this writer.
    #[must_use]
    pub fn is_compressing(&self) -> bool {
        self.compressor.is_some()
    }

    /// Outgoing counters.
    #[must_use]
    pub const fn stats(&self) -> &OctetCounter {
        &self.stats
    }

    /// Zero outgoing counters.
    pub fn reset_stats(&mut self) {
        self.stats = OctetCounter::default();
    }
}

#[derive(Debug)]
struct Partial {
    opcode: OpCode,
    compressed: bool,
    payload: Vec<u8>,
    wire_octets: usize,
    frames: usize,
}

/// Inbound half of a [`Session`].
#[derive(Debug)]
pub struct MessageReader {
    decompressor: Option<MessageDecompressor>,
    limits: Limits,
    partial: Option<Partial>,
    stats: OctetCounter,
}

impl MessageReader {
    /// Create a reader; `decompressor` is `None` when no extension was negotiated.
    #[must_use]
    pub fn new(decompressor: Option<MessageDecompressor>, config: &Config) -> Self {
        Self {
            decompressor,
            limits: config.limits.clone(),
            partial: None,
            stats: OctetCounter::default(),
        }
    }

    /// Feed one received frame.
    ///
    /// Returns the message once its final frame has arrived. Control frames
    /// are checked and otherwise ignored.
    ///
    /// # Errors
    ///
    /// - [`Error::ProtocolViolation`] for RSV1 on a control or continuation
    ///   frame, RSV1 without a negotiated extension, or broken fragmentation.
    /// - [`Error::InvalidPayload`] for a corrupt compressed payload or
    ///   non-UTF-8 text.
    /// - [`Error::MessageTooLarge`] when the message exceeds the ceiling.
    ///
    /// After an error the partial message is discarded; the connection is
    /// expected to close.
    pub fn receive(&mut self, frame: Frame) -> Result<Option<Message>> {
        if frame.is_control() {
            return check_control(&frame).map(|()| None);
        }

        let result = self.receive_data(frame);
        if result.is_err() {
            self.partial = None;
            if let Some(decompressor) = self.decompressor.as_mut() {
                decompressor.abort();
            }
        }
        result
    }

    fn receive_data(&mut self, frame: Frame) -> Result<Option<Message>> {
        let mut partial = match self.partial.take() {
            None => self.begin(&frame)?,
            Some(partial) => {
                if frame.opcode != OpCode::Continuation {
                    return Err(Error::ProtocolViolation(format!(
                        "expected continuation frame, got {}",
                        frame.opcode
                    )));
                }
                if frame.rsv1 {
                    return Err(Error::ProtocolViolation(
                        "RSV1 set on continuation frame".into(),
                    ));
                }
                partial
            }
        };

        let fin = frame.fin;
        let data = frame.into_payload();
        partial.wire_octets += data.len();
        partial.frames += 1;

        if partial.compressed {
            let out = self.decompressor_mut()?.decompress(&data)?;
            partial.payload.extend_from_slice(&out);
        } else {
            partial.payload.extend_from_slice(&data);
            self.limits.check_message_size(partial.payload.len())?;
        }

        if !fin {
            self.partial = Some(partial);
            return Ok(None);
        }

        if partial.compressed {
            let out = self.decompressor_mut()?.end()?;
            partial.payload.extend_from_slice(&out);
        }

        self.stats
            .record(partial.payload.len(), partial.wire_octets, partial.frames);
        Message::from_payload(partial.opcode, partial.payload).map(Some)
    }

    fn begin(&mut self, frame: &Frame) -> Result<Partial> {
        if frame.opcode == OpCode::Continuation {
            return Err(Error::ProtocolViolation(
                "continuation frame without a message in progress".into(),
            ));
        }
        if frame.rsv1 {
            match self.decompressor.as_mut() {
                Some(decompressor) => decompressor.start()?,
                None => {
                    return Err(Error::ProtocolViolation(
                        "RSV1 set but no compression extension was negotiated".into(),
                    ));
                }
            }
        }
        Ok(Partial {
            opcode: frame.opcode,
            compressed: frame.rsv1,
            payload: Vec::new(),
            wire_octets: 0,
            frames: 0,
        })
    }

    fn decompressor_mut(&mut self) -> Result<&mut MessageDecompressor> {
        self.decompressor
            .as_mut()
            .ok_or_else(|| Error::State("no decompressor".into()))
    }

    /// Whether a fragmented message is being reassembled.
    #[must_use]
    pub fn in_message(&self) -> bool {
        self.partial.is_some()
    }

    /// Incoming counters.
    #[must_use]
    pub const fn stats(&self) -> &OctetCounter {
        &self.stats
    }

    /// Zero incoming counters.
    pub fn reset_stats(&mut self) {
        self.stats = OctetCounter::default();
    }
}

fn check_control(frame: &Frame) -> Result<()> {
    if frame.rsv1 {
        return Err(Error::ProtocolViolation(format!(
            "RSV1 set on {} frame",
            frame.opcode
        )));
    }
    if !frame.fin {
        return Err(Error::ProtocolViolation(format!(
            "fragmented {} frame",
            frame.opcode
        )));
    }
    if frame.payload().len() > MAX_CONTROL_FRAME_PAYLOAD {
        return Err(Error::ProtocolViolation(format!(
            "{} frame payload of {} bytes exceeds {MAX_CONTROL_FRAME_PAYLOAD}",
            frame.opcode,
            frame.payload().len()
        )));
    }
    Ok(())
}

/// Message-level view of one connection, with optional compression.
#[derive(Debug)]
pub struct Session {
    role: Role,
    writer: MessageWriter,
    reader: MessageReader,
}

impl Session {
    /// Create a session. `processor` is the result of negotiation, `None`
    /// when the connection runs uncompressed.
    #[must_use]
    pub fn new(role: Role, processor: Option<Processor>, config: &Config) -> Self {
        let (compressor, decompressor) = match processor {
            Some(processor) => {
                let (c, d) = processor.split();
                (Some(c), Some(d))
            }
            None => (None, None),
        };
        Self {
            role,
            writer: MessageWriter::new(compressor, config),
            reader: MessageReader::new(decompressor, config),
        }
    }

    /// Local role.
    #[must_use]
    pub const fn role(&self) -> Role {
        self.role
    }

    /// See [`MessageWriter::send`].
    ///
    /// # Errors
    ///
    /// See [`MessageWriter::send`].
    pub fn send(&mut self, message: &Message) -> Result<Vec<Frame>> {
        self.writer.send(message, false)
    }

    /// Send without compression even if an extension is active.
    ///
    /// # Errors
    ///
    /// See [`MessageWriter::send`].
    pub fn send_uncompressed(&mut self, message: &Message) -> Result<Vec<Frame>> {
        self.writer.send(message, true)
    }

    /// See [`MessageReader::receive`].
    ///
    /// # Errors
    ///
    /// See [`MessageReader::receive`].
    pub fn receive(&mut self, frame: Frame) -> Result<Option<Message>> {
        self.reader.receive(frame)
    }

    /// Traffic statistics for both directions.
    #[must_use]
    pub fn stats(&self) -> TrafficStats {
        TrafficStats {
            outgoing: *self.writer.stats(),
            incoming: *self.reader.stats(),
        }
    }

    /// Zero the statistics.
    pub fn reset_stats(&mut self) {
        self.writer.reset_stats();
        self.reader.reset_stats();
    }

    /// Split into writer and reader.
    #[must_use]
    pub fn split(self) -> (MessageWriter, MessageReader) {
        (self.writer, self.reader)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extensions::{DeflateOffer, DeflateOfferAccept, DeflateResponseAccept};

    fn pair(config: &Config) -> (Session, Session) {
        let offer = DeflateOffer::new();
        let accept = DeflateOfferAccept::new(&offer);
        let server = Processor::from_offer_accept(&accept.into(), config).unwrap();
        let client = Processor::from_response_accept(
            &DeflateResponseAccept::new(&accept.response()).into(),
            config,
        )
        .unwrap();
        (
            Session::new(Role::Server, Some(server), config),
            Session::new(Role::Client, Some(client), config),
        )
    }

    fn deliver(frames: Vec<Frame>, to: &mut Session) -> Option<Message> {
        let mut out = None;
        for frame in frames {
            out = to.receive(frame).unwrap();
        }
        out
    }

    #[test]
    fn test_compressed_roundtrip() {
        let (mut server, mut client) = pair(&Config::default());
        let msg = Message::text("compress me ".repeat(100));
        let frames = server.send(&msg).unwrap();
        assert_eq!(frames.len(), 1);
        assert!(frames[0].rsv1);
        assert_eq!(deliver(frames, &mut client), Some(msg));

        let stats = server.stats();
        assert_eq!(stats.outgoing.app_octets, 1200);
        assert!(stats.outgoing_compression_ratio().unwrap() < 0.1);
        assert_eq!(client.stats().incoming.app_octets, 1200);
    }

    #[test]
    fn test_fragmented_compressed_message() {
        let config = Config::default().with_fragment_size(8);
        let (mut server, mut client) = pair(&config);
        let data: Vec<u8> = (0..2000u32).map(|i| (i % 13) as u8).collect();
        let msg = Message::binary(data);
        let frames = server.send(&msg).unwrap();
        assert!(frames.len() > 1);
        assert!(frames[0].rsv1);
        assert!(frames[1..].iter().all(|f| !f.rsv1));

        let mut received = None;
        for frame in frames {
            assert!(received.is_none());
            received = client.receive(frame).unwrap();
        }
        assert_eq!(received, Some(msg));
    }

    #[test]
    fn test_do_not_compress() {
        let (mut server, mut client) = pair(&Config::default());
        let msg = Message::text("plain");
        let frames = server.send_uncompressed(&msg).unwrap();
        assert!(!frames[0].rsv1);
        assert_eq!(frames[0].payload(), b"plain");
        assert_eq!(deliver(frames, &mut client), Some(msg));

        // Compressed traffic continues to work afterwards.
        let msg = Message::text("compressed again");
        assert_eq!(deliver(server.send(&msg).unwrap(), &mut client), Some(msg));
    }

    #[test]
    fn test_rsv1_without_extension() {
        let mut session = Session::new(Role::Server, None, &Config::default());
        let err = session
            .receive(Frame::text("x").with_rsv1(true))
            .unwrap_err();
        assert!(matches!(err, Error::ProtocolViolation(_)));
        assert_eq!(err.close_code().map(|c| c.as_u16()), Some(1002));
    }

    #[test]
    fn test_rsv1_on_control_and_continuation() {
        let (_, mut client) = pair(&Config::default());
        assert!(matches!(
            client.receive(Frame::new(true, OpCode::Ping, Vec::new()).with_rsv1(true)),
            Err(Error::ProtocolViolation(_))
        ));
        assert_eq!(
            client.receive(Frame::new(true, OpCode::Pong, Vec::new())),
            Ok(None)
        );

        client.receive(Frame::new(false, OpCode::Text, "ab")).unwrap();
        assert!(matches!(
            client.receive(Frame::continuation(true, "cd").with_rsv1(true)),
            Err(Error::ProtocolViolation(_))
        ));
    }

    #[test]
    fn test_unexpected_continuation() {
        let mut session = Session::new(Role::Client, None, &Config::default());
        assert!(matches!(
            session.receive(Frame::continuation(true, "x")),
            Err(Error::ProtocolViolation(_))
        ));
    }

    #[test]
    fn test_uncompressed_session() {
        let config = Config::default();
        let mut a = Session::new(Role::Client, None, &config);
        let mut b = Session::new(Role::Server, None, &config);
        let msg = Message::binary(vec![1, 2, 3]);
        let frames = a.send(&msg).unwrap();
        assert!(!frames[0].rsv1);
        assert_eq!(deliver(frames, &mut b), Some(msg));
        assert_eq!(a.stats().outgoing_compression_ratio(), Some(1.0));
    }

    #[test]
    fn test_corrupt_payload_closes_with_1007() {
        let (_, mut client) = pair(&Config::default());
        let err = client
            .receive(Frame::binary(vec![0xff, 0xff, 0xff]).with_rsv1(true))
            .unwrap_err();
        assert_eq!(err.close_code().map(|c| c.as_u16()), Some(1007));
        assert!(!client.reader.in_message());
    }

    #[test]
    fn test_oversized_message_closes_with_1009() {
        let config = Config::default().with_max_message_size(100);
        let (mut server, _) = pair(&Config::default());
        let (_, mut small_client) = pair(&config);
        let frames = server.send(&Message::binary(vec![0u8; 1000])).unwrap();
        let err = frames
            .into_iter()
            .map(|f| small_client.receive(f))
            .find_map(Result::err)
            .unwrap();
        assert_eq!(err.close_code().map(|c| c.as_u16()), Some(1009));
    }

    #[test]
    fn test_split_session() {
        let (server, mut client) = pair(&Config::default());
        let (mut writer, _reader) = server.split();
        assert!(writer.is_compressing());
        let msg = Message::text("split");
        assert_eq!(deliver(writer.send(&msg, false).unwrap(), &mut client), Some(msg));
    }
}
