//! Raw DEFLATE streams with the RFC 7692 message boundary.
//!
//! A message ends with a sync flush whose trailing `00 00 FF FF` is removed
//! before the payload goes on the wire; the inflater puts it back.

use flate2::{Compress, Compression, Decompress, FlushCompress, FlushDecompress, Status};

use super::{Budget, CHUNK_SIZE};
use crate::error::{Error, Result};

/// Octets removed from the end of every compressed message.
pub const TRAILER: [u8; 4] = [0x00, 0x00, 0xff, 0xff];

/// zlib refuses an 8-bit window for raw deflate; 9 is the smallest it opens.
const fn zlib_window_bits(bits: u8) -> u8 {
    if bits < 9 {
        9
    } else if bits > 15 {
        15
    } else {
        bits
    }
}

/// Only an empty stored block (or part of one) may follow a final block.
fn check_after_final_block(input: &[u8]) -> Result<()> {
    match input {
        [] | [0x00] | [0x00, 0x00, 0x00, 0xff, 0xff] | [0x00, 0x00, 0xff, 0xff] => Ok(()),
        _ => Err(Error::InvalidPayload(
            "data after final deflate block".into(),
        )),
    }
}

/// Outbound raw-deflate stream.
pub struct Deflater {
    compress: Compress,
}

impl std::fmt::Debug for Deflater {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Deflater")
            .field("total_in", &self.compress.total_in())
            .field("total_out", &self.compress.total_out())
            .finish()
    }
}

impl Deflater {
    /// Open a stream at `level` (0-9) with a `window_bits` LZ77 window.
    #[must_use]
    pub fn new(level: u32, window_bits: u8) -> Self {
        Self {
            compress: Compress::new_with_window_bits(
                Compression::new(level),
                false,
                zlib_window_bits(window_bits),
            ),
        }
    }

    /// Feed message data; returns whatever output zlib released.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Internal`] if zlib fails.
    pub fn compress(&mut self, input: &[u8]) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.run(input, FlushCompress::None, &mut out)?;
        Ok(out)
    }

    /// Sync-flush and return the rest of the message without its trailer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Internal`] if zlib fails or the flush does not end
    /// with the expected trailer.
    pub fn finish(&mut self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.run(&[], FlushCompress::Sync, &mut out)?;

        // Nothing was written since the previous flush: send an empty
        // stored-block header so the peer still sees a complete block.
        if out.is_empty() {
            return Ok(vec![0x00]);
        }
        if !out.ends_with(&TRAILER) {
            return Err(Error::Internal(
                "deflate sync flush did not end with 00 00 ff ff".into(),
            ));
        }
        out.truncate(out.len() - TRAILER.len());
        Ok(out)
    }

    fn run(&mut self, mut input: &[u8], flush: FlushCompress, out: &mut Vec<u8>) -> Result<()> {
        let mut chunk = [0u8; CHUNK_SIZE];
        loop {
            let before_in = self.compress.total_in();
            let before_out = self.compress.total_out();

            let status = self
                .compress
                .compress(input, &mut chunk, flush)
                .map_err(|e| Error::Internal(format!("deflate failed: {e}")))?;

            let consumed = (self.compress.total_in() - before_in) as usize;
            let produced = (self.compress.total_out() - before_out) as usize;
            input = &input[consumed..];
            out.extend_from_slice(&chunk[..produced]);

            match status {
                Status::StreamEnd => return Ok(()),
                Status::Ok | Status::BufError => {
                    if input.is_empty() && produced < chunk.len() {
                        return Ok(());
                    }
                    if consumed == 0 && produced == 0 {
                        return Err(Error::Internal("deflate made no progress".into()));
                    }
                }
            }
        }
    }
}

/// Inbound raw-deflate stream.
pub struct Inflater {
    decompress: Decompress,
    window_bits: u8,
    ended: bool,
}

impl std::fmt::Debug for Inflater {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Inflater")
            .field("window_bits", &self.window_bits)
            .field("ended", &self.ended)
            .field("total_out", &self.decompress.total_out())
            .finish()
    }
}

impl Inflater {
    /// Open a stream able to read data compressed with a `window_bits` window.
    #[must_use]
    pub fn new(window_bits: u8) -> Self {
        let window_bits = zlib_window_bits(window_bits);
        Self {
            decompress: Decompress::new_with_window_bits(false, window_bits),
            window_bits,
            ended: false,
        }
    }

    /// Feed compressed message data; returns decompressed output so far.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPayload`] for corrupt input and
    /// [`Error::MessageTooLarge`] if `budget` is exhausted.
    pub fn decompress(&mut self, input: &[u8], budget: &mut Budget) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.run(input, budget, &mut out)?;
        Ok(out)
    }

    /// Feed the stripped trailer back in and return the final output.
    ///
    /// # Errors
    ///
    /// See [`Inflater::decompress`].
    pub fn finish(&mut self, budget: &mut Budget) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        if !self.ended {
            self.run(&TRAILER, budget, &mut out)?;
        }
        if self.ended {
            // The peer closed its deflate stream with a final block, so it
            // starts a new one with the next message.
            self.decompress = Decompress::new_with_window_bits(false, self.window_bits);
            self.ended = false;
        }
        Ok(out)
    }

    fn run(&mut self, mut input: &[u8], budget: &mut Budget, out: &mut Vec<u8>) -> Result<()> {
        if self.ended {
            return check_after_final_block(input);
        }

        let mut chunk = [0u8; CHUNK_SIZE];
        loop {
            let before_in = self.decompress.total_in();
            let before_out = self.decompress.total_out();

            let status = self
                .decompress
                .decompress(input, &mut chunk, FlushDecompress::None)
                .map_err(|e| Error::InvalidPayload(format!("inflate failed: {e}")))?;

            let consumed = (self.decompress.total_in() - before_in) as usize;
            let produced = (self.decompress.total_out() - before_out) as usize;
            input = &input[consumed..];
            budget.charge(produced)?;
            out.extend_from_slice(&chunk[..produced]);

            match status {
                Status::StreamEnd => {
                    self.ended = true;
                    return check_after_final_block(input);
                }
                Status::Ok | Status::BufError => {
                    if input.is_empty() && produced < chunk.len() {
                        return Ok(());
                    }
                    if consumed == 0 && produced == 0 {
                        return Err(Error::InvalidPayload("inflate made no progress".into()));
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deflate(deflater: &mut Deflater, data: &[u8]) -> Vec<u8> {
        let mut out = deflater.compress(data).unwrap();
        out.extend(deflater.finish().unwrap());
        out
    }

    fn inflate(inflater: &mut Inflater, data: &[u8]) -> Vec<u8> {
        let mut budget = Budget::new(usize::MAX);
        let mut out = inflater.decompress(data, &mut budget).unwrap();
        out.extend(inflater.finish(&mut budget).unwrap());
        out
    }

    #[test]
    fn test_roundtrip() {
        let mut deflater = Deflater::new(6, 15);
        let mut inflater = Inflater::new(15);
        let data = b"Hello, WebSocket compression! ".repeat(20);
        let compressed = deflate(&mut deflater, &data);
        assert!(compressed.len() < data.len());
        assert!(!compressed.ends_with(&TRAILER));
        assert_eq!(inflate(&mut inflater, &compressed), data);
    }

    #[test]
    fn test_rfc7692_hello_vector() {
        // RFC 7692 §7.2.3.1: "Hello" compressed without context takeover.
        let mut inflater = Inflater::new(15);
        let payload = [0xf2, 0x48, 0xcd, 0xc9, 0xc9, 0x07, 0x00];
        assert_eq!(inflate(&mut inflater, &payload), b"Hello");
    }

    #[test]
    fn test_rfc7692_shared_window() {
        // RFC 7692 §7.2.3.2: the second "Hello" reuses the first.
        let mut inflater = Inflater::new(15);
        assert_eq!(
            inflate(&mut inflater, &[0xf2, 0x48, 0xcd, 0xc9, 0xc9, 0x07, 0x00]),
            b"Hello"
        );
        assert_eq!(
            inflate(&mut inflater, &[0xf2, 0x00, 0x11, 0x00, 0x00]),
            b"Hello"
        );
    }

    #[test]
    fn test_rfc7692_final_block() {
        // RFC 7692 §7.2.3.3: a message ending with BFINAL set.
        let mut inflater = Inflater::new(15);
        let payload = [0xf3, 0x48, 0xcd, 0xc9, 0xc9, 0x07, 0x00, 0x00];
        assert_eq!(inflate(&mut inflater, &payload), b"Hello");
        // The next message starts a fresh stream.
        assert_eq!(inflate(&mut inflater, &payload), b"Hello");
    }

    #[test]
    fn test_empty_messages() {
        let mut deflater = Deflater::new(6, 15);
        let mut inflater = Inflater::new(15);
        for _ in 0..3 {
            let compressed = deflate(&mut deflater, b"");
            assert!(!compressed.is_empty());
            assert!(inflate(&mut inflater, &compressed).is_empty());
        }
    }

    #[test]
    fn test_context_takeover_shrinks_repeat() {
        let mut deflater = Deflater::new(6, 15);
        let data = b"the quick brown fox jumps over the lazy dog ".repeat(4);
        let first = deflate(&mut deflater, &data);
        let second = deflate(&mut deflater, &data);
        assert!(second.len() < first.len());
    }

    #[test]
    fn test_window_bits_8_opens() {
        let mut deflater = Deflater::new(6, 8);
        let mut inflater = Inflater::new(8);
        let data = vec![0u8; 1000];
        assert_eq!(inflate(&mut inflater, &deflate(&mut deflater, &data)), data);
    }

    #[test]
    fn test_corrupt_input() {
        let mut inflater = Inflater::new(15);
        let mut budget = Budget::new(usize::MAX);
        let err = inflater
            .decompress(&[0xff, 0xff, 0xff, 0xff], &mut budget)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidPayload(_)));
    }

    #[test]
    fn test_budget_enforced_mid_stream() {
        let mut deflater = Deflater::new(9, 15);
        let compressed = deflate(&mut deflater, &vec![0u8; 100_000]);

        let mut inflater = Inflater::new(15);
        let mut budget = Budget::new(1000);
        let result = inflater
            .decompress(&compressed, &mut budget)
            .and_then(|_| inflater.finish(&mut budget));
        assert!(matches!(result, Err(Error::MessageTooLarge { max: 1000, .. })));
    }

    #[test]
    fn test_large_output_spans_chunks() {
        let mut deflater = Deflater::new(1, 15);
        let mut inflater = Inflater::new(15);
        let data: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
        assert_eq!(inflate(&mut inflater, &deflate(&mut deflater, &data)), data);
    }
}
