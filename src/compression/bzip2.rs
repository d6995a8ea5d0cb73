//! bzip2 streams. Each message is a complete, independent bzip2 stream.

use bzip2::{Action, Compress, Compression, Decompress, Status};

use super::{Budget, CHUNK_SIZE};
use crate::error::{Error, Result};

/// Outbound bzip2 stream for one message.
pub struct Bzip2Encoder {
    compress: Compress,
}

impl std::fmt::Debug for Bzip2Encoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bzip2Encoder")
            .field("total_in", &self.compress.total_in())
            .field("total_out", &self.compress.total_out())
            .finish()
    }
}

impl Bzip2Encoder {
    /// Open a stream at block-size `level` (1-9).
    #[must_use]
    pub fn new(level: u8, work_factor: u32) -> Self {
        Self {
            compress: Compress::new(Compression::new(u32::from(level)), work_factor),
        }
    }

    /// Feed message data. bzip2 buffers whole blocks, so this usually
    /// returns nothing until [`Bzip2Encoder::finish`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Internal`] if libbzip2 fails.
    pub fn compress(&mut self, mut input: &[u8]) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        let mut chunk = [0u8; CHUNK_SIZE];

        // BZ_RUN with no input is a parameter error.
        while !input.is_empty() {
            let before_in = self.compress.total_in();
            let before_out = self.compress.total_out();

            self.compress
                .compress(input, &mut chunk, Action::Run)
                .map_err(|e| Error::Internal(format!("bzip2 compress failed: {e}")))?;

            let consumed = (self.compress.total_in() - before_in) as usize;
            let produced = (self.compress.total_out() - before_out) as usize;
            input = &input[consumed..];
            out.extend_from_slice(&chunk[..produced]);

            if consumed == 0 && produced == 0 {
                return Err(Error::Internal("bzip2 made no progress".into()));
            }
        }

        Ok(out)
    }

    /// Close the stream and return the remaining output.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Internal`] if libbzip2 fails.
    pub fn finish(&mut self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        let mut chunk = [0u8; CHUNK_SIZE];
        loop {
            let before_out = self.compress.total_out();
            let status = self
                .compress
                .compress(&[], &mut chunk, Action::Finish)
                .map_err(|e| Error::Internal(format!("bzip2 finish failed: {e}")))?;
            let produced = (self.compress.total_out() - before_out) as usize;
            out.extend_from_slice(&chunk[..produced]);

            match status {
                Status::StreamEnd => return Ok(out),
                _ if produced == 0 => {
                    return Err(Error::Internal(format!(
                        "bzip2 finish stalled with {status:?}"
                    )));
                }
                _ => {}
            }
        }
    }
}

/// Inbound bzip2 stream for one message.
pub struct Bzip2Decoder {
    decompress: Decompress,
    ended: bool,
}

impl std::fmt::Debug for Bzip2Decoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bzip2Decoder")
            .field("ended", &self.ended)
            .field("total_out", &self.decompress.total_out())
            .finish()
    }
}

impl Default for Bzip2Decoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Bzip2Decoder {
    /// Open a decoder.
    #[must_use]
    pub fn new() -> Self {
        Self {
            decompress: Decompress::new(false),
            ended: false,
        }
    }

    /// Feed compressed message data.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPayload`] for corrupt input or data after the
    /// end of the stream, [`Error::MessageTooLarge`] if `budget` is exhausted.
    pub fn decompress(&mut self, mut input: &[u8], budget: &mut Budget) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        let mut chunk = [0u8; CHUNK_SIZE];

        while !input.is_empty() {
            if self.ended {
                return Err(Error::InvalidPayload(
                    "data after end of bzip2 stream".into(),
                ));
            }

            let before_in = self.decompress.total_in();
            let before_out = self.decompress.total_out();

            let status = self
                .decompress
                .decompress(input, &mut chunk)
                .map_err(|e| Error::InvalidPayload(format!("bzip2 decompress failed: {e}")))?;

            let consumed = (self.decompress.total_in() - before_in) as usize;
            let produced = (self.decompress.total_out() - before_out) as usize;
            input = &input[consumed..];
            budget.charge(produced)?;
            out.extend_from_slice(&chunk[..produced]);

            if matches!(status, Status::StreamEnd) {
                self.ended = true;
            } else if consumed == 0 && produced == 0 {
                return Err(Error::InvalidPayload("bzip2 made no progress".into()));
            }
        }

        // Drain output still held back after the last input byte.
        while !self.ended {
            let before_out = self.decompress.total_out();
            let status = self
                .decompress
                .decompress(&[], &mut chunk)
                .map_err(|e| Error::InvalidPayload(format!("bzip2 decompress failed: {e}")))?;
            let produced = (self.decompress.total_out() - before_out) as usize;
            budget.charge(produced)?;
            out.extend_from_slice(&chunk[..produced]);

            if matches!(status, Status::StreamEnd) {
                self.ended = true;
            } else if produced < chunk.len() {
                break;
            }
        }

        Ok(out)
    }

    /// Check that the message held a complete stream.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPayload`] if the stream was truncated.
    pub fn finish(&mut self) -> Result<Vec<u8>> {
        if self.ended {
            Ok(Vec::new())
        } else {
            Err(Error::InvalidPayload("truncated bzip2 stream".into()))
        }
    }
}
