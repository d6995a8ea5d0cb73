//! Snappy framing: one raw block per message, emitted when the message ends.

use super::Budget;
use crate::error::{Error, Result};

/// Buffers a message and compresses it as a single block.
#[derive(Debug, Default)]
pub struct SnappyEncoder {
    buffer: Vec<u8>,
}

impl SnappyEncoder {
    /// Create an encoder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffer message data. Always returns an empty vector.
    ///
    /// # Errors
    ///
    /// Never fails.
    pub fn compress(&mut self, input: &[u8]) -> Result<Vec<u8>> {
        self.buffer.extend_from_slice(input);
        Ok(Vec::new())
    }

    /// Compress the buffered message.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Internal`] if the message is too large for a block.
    pub fn finish(&mut self) -> Result<Vec<u8>> {
        let input = std::mem::take(&mut self.buffer);
        snap::raw::Encoder::new()
            .compress_vec(&input)
            .map_err(|e| Error::Internal(format!("snappy compress failed: {e}")))
    }
}

/// Longest varint length prefix of a raw snappy block.
const MAX_HEADER_LEN: usize = 5;

/// Buffers a compressed message and decodes it once complete.
///
/// The declared length is charged against the budget as soon as the block
/// header has arrived, and the buffer may never grow past what a block of
/// that length can compress to.
#[derive(Debug, Default)]
pub struct SnappyDecoder {
    buffer: Vec<u8>,
    declared: Option<usize>,
}

impl SnappyDecoder {
    /// Create a decoder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffer compressed data. Always returns an empty vector.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MessageTooLarge`] once the block header declares
    /// more than `budget` allows, and [`Error::InvalidPayload`] for a bad
    /// header or more data than the declared length can compress to.
    pub fn decompress(&mut self, input: &[u8], budget: &mut Budget) -> Result<Vec<u8>> {
        self.buffer.extend_from_slice(input);

        if self.declared.is_none() {
            let header = &self.buffer[..self.buffer.len().min(MAX_HEADER_LEN)];
            if header.iter().any(|b| b & 0x80 == 0) {
                self.charge_declared(budget)?;
            } else if header.len() == MAX_HEADER_LEN {
                return Err(Error::InvalidPayload("snappy header too long".into()));
            }
        }

        if let Some(len) = self.declared {
            let cap = snap::raw::max_compress_len(len);
            if cap != 0 && self.buffer.len() > cap {
                return Err(Error::InvalidPayload(format!(
                    "snappy block of {} bytes exceeds {cap} for {len} declared",
                    self.buffer.len()
                )));
            }
        }

        Ok(Vec::new())
    }

    /// Decode the buffered block.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPayload`] for a corrupt block and
    /// [`Error::MessageTooLarge`] if the declared length exceeds `budget`.
    pub fn finish(&mut self, budget: &mut Budget) -> Result<Vec<u8>> {
        if self.buffer.is_empty() {
            self.declared = None;
            return Ok(Vec::new());
        }
        if self.declared.is_none() {
            self.charge_declared(budget)?;
        }

        let input = std::mem::take(&mut self.buffer);
        self.declared = None;
        snap::raw::Decoder::new()
            .decompress_vec(&input)
            .map_err(|e| Error::InvalidPayload(format!("snappy decompress failed: {e}")))
    }

    fn charge_declared(&mut self, budget: &mut Budget) -> Result<()> {
        let len = snap::raw::decompress_len(&self.buffer)
            .map_err(|e| Error::InvalidPayload(format!("snappy header invalid: {e}")))?;
        budget.charge(len)?;
        self.declared = Some(len);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(data: &[u8]) -> Vec<u8> {
        let mut encoder = SnappyEncoder::new();
        let mut compressed = Vec::new();
        for part in data.chunks(7) {
            compressed.extend(encoder.compress(part).unwrap());
        }
        compressed.extend(encoder.finish().unwrap());

        let mut decoder = SnappyDecoder::new();
        let mut budget = Budget::new(usize::MAX);
        decoder.decompress(&compressed, &mut budget).unwrap();
        decoder.finish(&mut budget).unwrap()
    }

    #[test]
    fn test_roundtrip() {
        let data = b"snappy snappy snappy snappy".repeat(10);
        assert_eq!(roundtrip(&data), data);
    }

    #[test]
    fn test_empty_message() {
        assert!(roundtrip(b"").is_empty());
    }

    #[test]
    fn test_declared_length_checked_before_decoding() {
        let compressed = snap::raw::Encoder::new()
            .compress_vec(&vec![1u8; 5000])
            .unwrap();
        let mut decoder = SnappyDecoder::new();
        let mut budget = Budget::new(4000);
        assert_eq!(
            decoder.decompress(&compressed, &mut budget),
            Err(Error::MessageTooLarge {
                size: 5000,
                max: 4000
            })
        );
    }

    #[test]
    fn test_oversized_block_rejected_from_first_chunk() {
        let compressed = snap::raw::Encoder::new()
            .compress_vec(&vec![0u8; 4 * 1024 * 1024])
            .unwrap();
        let mut decoder = SnappyDecoder::new();
        let mut budget = Budget::new(1000);

        // A split header is held until it is complete.
        assert_eq!(decoder.decompress(&compressed[..1], &mut budget), Ok(Vec::new()));
        assert_eq!(
            decoder.decompress(&compressed[1..64], &mut budget),
            Err(Error::MessageTooLarge {
                size: 4 * 1024 * 1024,
                max: 1000
            })
        );
    }

    #[test]
    fn test_data_beyond_declared_length_rejected() {
        let mut compressed = snap::raw::Encoder::new().compress_vec(b"tiny").unwrap();
        let cap = snap::raw::max_compress_len(4);
        compressed.resize(cap + 1, 0);
        let mut decoder = SnappyDecoder::new();
        let mut budget = Budget::new(usize::MAX);
        assert!(matches!(
            decoder.decompress(&compressed, &mut budget),
            Err(Error::InvalidPayload(_))
        ));
    }

    #[test]
    fn test_unterminated_header_rejected() {
        let mut decoder = SnappyDecoder::new();
        let mut budget = Budget::new(usize::MAX);
        assert!(matches!(
            decoder.decompress(&[0xff; 5], &mut budget),
            Err(Error::InvalidPayload(_))
        ));
    }

    #[test]
    fn test_corrupt_block() {
        let mut decoder = SnappyDecoder::new();
        let mut budget = Budget::new(usize::MAX);
        decoder.decompress(&[0x05, 0xff], &mut budget).unwrap();
        assert!(matches!(
            decoder.finish(&mut budget),
            Err(Error::InvalidPayload(_))
        ));
    }
}
