//! Configuration and limits for compression processors.

use crate::error::{Error, Result};

/// Default zlib compression level.
pub const DEFAULT_COMPRESSION_LEVEL: u32 = 6;

/// Default bzip2 work factor (libbzip2's own default).
pub const DEFAULT_BZIP2_WORK_FACTOR: u32 = 30;

/// Default outgoing fragment size (16 KB).
pub const DEFAULT_FRAGMENT_SIZE: usize = 16 * 1024;

/// Resource limits applied while decompressing inbound messages.
///
/// These limits bound the memory a single peer can make us allocate by
/// sending a highly compressible message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Limits {
    /// Maximum decompressed size of a single message in bytes.
    ///
    /// Default: 64 MB (64 * 1024 * 1024)
    pub max_message_size: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_message_size: 64 * 1024 * 1024, // 64 MB
        }
    }
}

impl Limits {
    /// Create new limits with a custom message ceiling.
    #[must_use]
    pub const fn new(max_message_size: usize) -> Self {
        Self { max_message_size }
    }

    /// Limits suitable for small embedded systems (256 KB messages).
    #[must_use]
    pub const fn embedded() -> Self {
        Self {
            max_message_size: 256 * 1024,
        }
    }

    /// No practical ceiling.
    ///
    /// Warning: Use only in trusted environments.
    #[must_use]
    pub const fn unrestricted() -> Self {
        Self {
            max_message_size: usize::MAX,
        }
    }

    /// Validate that a decompressed message size is within limits.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MessageTooLarge`] if `size` exceeds the configured maximum.
    pub const fn check_message_size(&self, size: usize) -> Result<()> {
        if size > self.max_message_size {
            Err(Error::MessageTooLarge {
                size,
                max: self.max_message_size,
            })
        } else {
            Ok(())
        }
    }
}

/// Local tuning applied to every processor instantiated by a negotiator.
///
/// Negotiated parameters (window bits, context takeover, compress level)
/// come from the handshake; everything here is a purely local choice that
/// the peer never sees.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Resource limits.
    pub limits: Limits,

    /// DEFLATE compression level (0-9).
    ///
    /// Default: 6
    pub compression_level: u32,

    /// bzip2 work factor (0-250) used for highly repetitive input.
    ///
    /// Default: 30
    pub bzip2_work_factor: u32,

    /// Largest payload the message writer puts in one frame.
    ///
    /// Default: 16 KB
    pub fragment_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            limits: Limits::default(),
            compression_level: DEFAULT_COMPRESSION_LEVEL,
            bzip2_work_factor: DEFAULT_BZIP2_WORK_FACTOR,
            fragment_size: DEFAULT_FRAGMENT_SIZE,
        }
    }
}

impl Config {
    /// Create a new configuration with default limits.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set custom limits.
    #[must_use]
    pub const fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Set the decompressed message ceiling.
    #[must_use]
    pub const fn with_max_message_size(mut self, size: usize) -> Self {
        self.limits.max_message_size = size;
        self
    }

    /// Set the outgoing fragment size (at least 1 byte per frame).
    #[must_use]
    pub fn with_fragment_size(mut self, size: usize) -> Self {
        self.fragment_size = size.max(1);
        self
    }

    /// Set the DEFLATE compression level.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if `level` is above 9.
    pub fn with_compression_level(mut self, level: u32) -> Result<Self> {
        check_compression_level(level)?;
        self.compression_level = level;
        Ok(self)
    }

    /// Set the bzip2 work factor.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if `factor` is above 250.
    pub fn with_bzip2_work_factor(mut self, factor: u32) -> Result<Self> {
        check_bzip2_work_factor(factor)?;
        self.bzip2_work_factor = factor;
        Ok(self)
    }

    /// Check fields that may have been set directly.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] for a compression level above 9 or a
    /// bzip2 work factor above 250.
    pub fn validate(&self) -> Result<()> {
        check_compression_level(self.compression_level)?;
        check_bzip2_work_factor(self.bzip2_work_factor)
    }
}

fn check_compression_level(level: u32) -> Result<()> {
    if level > 9 {
        return Err(Error::Configuration(format!(
            "compression_level must be 0-9, got {level}"
        )));
    }
    Ok(())
}

fn check_bzip2_work_factor(factor: u32) -> Result<()> {
    if factor > 250 {
        return Err(Error::Configuration(format!(
            "bzip2_work_factor must be 0-250, got {factor}"
        )));
    }
    Ok(())
}
