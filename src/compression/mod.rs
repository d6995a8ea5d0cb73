//! Streaming compression adapters and the per-connection [`Processor`].
//!
//! Every adapter follows the same contract: `compress`/`decompress` may be
//! called any number of times within a message and return whatever output
//! is ready, `finish` closes the message. Decompressors charge their output
//! against a [`Budget`] so that a single message cannot exceed the
//! configured ceiling, no matter how well it compresses.

pub mod deflate;
pub mod processor;

#[cfg(feature = "bzip2")]
pub mod bzip2;

#[cfg(feature = "snappy")]
pub mod snappy;

pub use self::processor::{MessageCompressor, MessageDecompressor, Processor, ProcessorParams};

use crate::error::{Error, Result};

/// Scratch buffer size for streaming loops.
pub(crate) const CHUNK_SIZE: usize = 16 * 1024;

/// Decompressed bytes produced so far for one message, against a ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Budget {
    used: usize,
    max: usize,
}

impl Budget {
    /// A fresh budget allowing `max` bytes.
    #[must_use]
    pub const fn new(max: usize) -> Self {
        Self { used: 0, max }
    }

    /// Account for `n` more bytes of output.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MessageTooLarge`] once the total crosses the ceiling.
    pub fn charge(&mut self, n: usize) -> Result<()> {
        self.used = self.used.saturating_add(n);
        if self.used > self.max {
            Err(Error::MessageTooLarge {
                size: self.used,
                max: self.max,
            })
        } else {
            Ok(())
        }
    }

    /// Bytes charged so far.
    #[must_use]
    pub const fn used(&self) -> usize {
        self.used
    }
}

/// Outbound stream for one of the compiled-in algorithms.
#[derive(Debug)]
pub(crate) enum Compressor {
    Deflate(deflate::Deflater),
    #[cfg(feature = "bzip2")]
    Bzip2(self::bzip2::Bzip2Encoder),
    #[cfg(feature = "snappy")]
    Snappy(self::snappy::SnappyEncoder),
}

impl Compressor {
    pub(crate) fn compress(&mut self, input: &[u8]) -> Result<Vec<u8>> {
        match self {
            Compressor::Deflate(c) => c.compress(input),
            #[cfg(feature = "bzip2")]
            Compressor::Bzip2(c) => c.compress(input),
            #[cfg(feature = "snappy")]
            Compressor::Snappy(c) => c.compress(input),
        }
    }

    pub(crate) fn finish(&mut self) -> Result<Vec<u8>> {
        match self {
            Compressor::Deflate(c) => c.finish(),
            #[cfg(feature = "bzip2")]
            Compressor::Bzip2(c) => c.finish(),
            #[cfg(feature = "snappy")]
            Compressor::Snappy(c) => c.finish(),
        }
    }
}

/// Inbound stream for one of the compiled-in algorithms.
#[derive(Debug)]
pub(crate) enum Decompressor {
    Deflate(deflate::Inflater),
    #[cfg(feature = "bzip2")]
    Bzip2(self::bzip2::Bzip2Decoder),
    #[cfg(feature = "snappy")]
    Snappy(self::snappy::SnappyDecoder),
}

impl Decompressor {
    pub(crate) fn decompress(&mut self, input: &[u8], budget: &mut Budget) -> Result<Vec<u8>> {
        match self {
            Decompressor::Deflate(d) => d.decompress(input, budget),
            #[cfg(feature = "bzip2")]
            Decompressor::Bzip2(d) => d.decompress(input, budget),
            #[cfg(feature = "snappy")]
            Decompressor::Snappy(d) => d.decompress(input, budget),
        }
    }

    pub(crate) fn finish(&mut self, budget: &mut Budget) -> Result<Vec<u8>> {
        match self {
            Decompressor::Deflate(d) => d.finish(budget),
            #[cfg(feature = "bzip2")]
            Decompressor::Bzip2(d) => d.finish(),
            #[cfg(feature = "snappy")]
            Decompressor::Snappy(d) => d.finish(budget),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_budget() {
        let mut budget = Budget::new(10);
        assert!(budget.charge(6).is_ok());
        assert!(budget.charge(4).is_ok());
        assert_eq!(budget.used(), 10);
        assert_eq!(
            budget.charge(1),
            Err(Error::MessageTooLarge { size: 11, max: 10 })
        );
    }

    #[test]
    fn test_budget_saturates() {
        let mut budget = Budget::new(usize::MAX);
        assert!(budget.charge(usize::MAX).is_ok());
        assert!(budget.charge(1).is_ok());
    }
}
