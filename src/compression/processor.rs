//! Per-connection compression state.
//!
//! A [`Processor`] owns one outbound and one inbound half. Each half runs a
//! two-state machine (`Idle` and `InMessage`) and creates its stream lazily
//! on the first `start` call. When the no-context-takeover flag applies to
//! that half, the stream is dropped at the end of every message so the next
//! message starts from an empty window.

use super::deflate::{Deflater, Inflater};
use super::{Budget, Compressor, Decompressor};
use crate::config::Config;
use crate::connection::{Role, StreamState};
use crate::error::{Error, Result};
use crate::extensions::{Algorithm, DeflateParams, OfferAccept, ResponseAccept};

#[cfg(feature = "bzip2")]
use crate::extensions::Bzip2Params;

/// Negotiated settings for both directions of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ProcessorParams {
    /// `permessage-deflate`.
    Deflate(DeflateParams),
    /// `permessage-bzip2`.
    #[cfg(feature = "bzip2")]
    Bzip2(Bzip2Params),
    /// `permessage-snappy`.
    Snappy,
}

impl ProcessorParams {
    /// Server-side settings from an accepted offer.
    #[must_use]
    pub fn from_offer_accept(accept: &OfferAccept) -> Self {
        match accept {
            OfferAccept::Deflate(a) => Self::Deflate(DeflateParams::from_offer_accept(a)),
            #[cfg(feature = "bzip2")]
            OfferAccept::Bzip2(a) => Self::Bzip2(Bzip2Params::from_offer_accept(a)),
            OfferAccept::Snappy(_) => Self::Snappy,
        }
    }

    /// Client-side settings from an accepted response.
    #[must_use]
    pub fn from_response_accept(accept: &ResponseAccept) -> Self {
        match accept {
            ResponseAccept::Deflate(a) => Self::Deflate(DeflateParams::from_response_accept(a)),
            #[cfg(feature = "bzip2")]
            ResponseAccept::Bzip2(a) => Self::Bzip2(Bzip2Params::from_response_accept(a)),
            ResponseAccept::Snappy(_) => Self::Snappy,
        }
    }

    /// The algorithm these settings are for.
    #[must_use]
    pub const fn algorithm(&self) -> Algorithm {
        match self {
            Self::Deflate(_) => Algorithm::Deflate,
            #[cfg(feature = "bzip2")]
            Self::Bzip2(_) => Algorithm::Bzip2,
            Self::Snappy => Algorithm::Snappy,
        }
    }

    /// Whether the stream sent by `sender` is reset after every message.
    #[must_use]
    pub const fn no_context_takeover(&self, sender: Role) -> bool {
        match self {
            Self::Deflate(p) => match sender {
                Role::Server => p.server_no_context_takeover,
                Role::Client => p.client_no_context_takeover,
            },
            // bzip2 and snappy never carry state across messages.
            #[cfg(feature = "bzip2")]
            Self::Bzip2(_) => true,
            Self::Snappy => true,
        }
    }

    /// Check fields that may have been set directly.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] for out-of-range window bits, memory
    /// level or compress level.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Deflate(p) => p.validate(),
            #[cfg(feature = "bzip2")]
            Self::Bzip2(p) => p.validate(),
            Self::Snappy => Ok(()),
        }
    }

    fn compressor(&self, sender: Role, config: &Config) -> Result<Compressor> {
        match self {
            Self::Deflate(p) => {
                let bits = match sender {
                    Role::Server => p.server_max_window_bits,
                    Role::Client => p.client_max_window_bits,
                };
                Ok(Compressor::Deflate(Deflater::new(
                    config.compression_level,
                    bits,
                )))
            }
            #[cfg(feature = "bzip2")]
            Self::Bzip2(p) => {
                let level = match sender {
                    Role::Server => p.server_max_compress_level,
                    Role::Client => p.client_max_compress_level,
                };
                Ok(Compressor::Bzip2(super::bzip2::Bzip2Encoder::new(
                    level,
                    config.bzip2_work_factor,
                )))
            }
            #[cfg(feature = "snappy")]
            Self::Snappy => Ok(Compressor::Snappy(super::snappy::SnappyEncoder::new())),
            #[allow(unreachable_patterns)]
            other => Err(Error::UnsupportedAlgorithm(other.algorithm().name().into())),
        }
    }

    fn decompressor(&self, sender: Role) -> Result<Decompressor> {
        match self {
            Self::Deflate(p) => {
                let bits = match sender {
                    Role::Server => p.server_max_window_bits,
                    Role::Client => p.client_max_window_bits,
                };
                Ok(Decompressor::Deflate(Inflater::new(bits)))
            }
            #[cfg(feature = "bzip2")]
            Self::Bzip2(_) => Ok(Decompressor::Bzip2(super::bzip2::Bzip2Decoder::new())),
            #[cfg(feature = "snappy")]
            Self::Snappy => Ok(Decompressor::Snappy(super::snappy::SnappyDecoder::new())),
            #[allow(unreachable_patterns)]
            other => Err(Error::UnsupportedAlgorithm(other.algorithm().name().into())),
        }
    }
}

/// Outbound half of a [`Processor`].
#[derive(Debug)]
pub struct MessageCompressor {
    role: Role,
    params: ProcessorParams,
    config: Config,
    stream: Option<Compressor>,
    state: StreamState,
}

impl MessageCompressor {
    fn new(role: Role, params: ProcessorParams, config: Config) -> Self {
        Self {
            role,
            params,
            config,
            stream: None,
            state: StreamState::Idle,
        }
    }

    /// Begin a message, creating the stream if there is none.
    ///
    /// # Errors
    ///
    /// Returns [`Error::State`] if a message is already in progress, or
    /// [`Error::UnsupportedAlgorithm`] if the algorithm is not compiled in.
    pub fn start(&mut self) -> Result<()> {
        self.state.begin("start_compress_message")?;
        if self.stream.is_none() {
            log::trace!("{:?} opening {} compressor", self.role, self.params.algorithm());
            match self.params.compressor(self.role, &self.config) {
                Ok(stream) => self.stream = Some(stream),
                Err(e) => {
                    self.state = StreamState::Idle;
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    /// Feed message data; returns compressed output that is ready to send.
    ///
    /// # Errors
    ///
    /// Returns [`Error::State`] outside a message, [`Error::Internal`] if the
    /// compressor fails.
    pub fn compress(&mut self, data: &[u8]) -> Result<Vec<u8>> {
        self.state.expect_in_message("compress_message_data")?;
        self.stream_mut()?.compress(data)
    }

    /// Finish the message and return the rest of its compressed payload.
    ///
    /// # Errors
    ///
    /// Returns [`Error::State`] outside a message, [`Error::Internal`] if the
    /// compressor fails.
    pub fn end(&mut self) -> Result<Vec<u8>> {
        self.state.end("end_compress_message")?;
        let result = self.stream_mut().and_then(Compressor::finish);
        if result.is_err() || self.params.no_context_takeover(self.role) {
            self.stream = None;
        }
        result
    }

    /// Compress a complete message in one call.
    ///
    /// # Errors
    ///
    /// See [`MessageCompressor::start`] and [`MessageCompressor::end`].
    pub fn compress_message(&mut self, data: &[u8]) -> Result<Vec<u8>> {
        self.start()?;
        let mut out = match self.compress(data) {
            Ok(out) => out,
            Err(e) => {
                self.abort();
                return Err(e);
            }
        };
        out.extend(self.end()?);
        log::trace!("compressed {} bytes to {}", data.len(), out.len());
        Ok(out)
    }

    /// Drop the current message and its stream.
    pub fn abort(&mut self) {
        self.stream = None;
        self.state = StreamState::Idle;
    }

    /// Whether a message is in progress.
    #[must_use]
    pub fn in_message(&self) -> bool {
        self.state.is_in_message()
    }

    /// Role this half compresses for.
    #[must_use]
    pub const fn role(&self) -> Role {
        self.role
    }

    fn stream_mut(&mut self) -> Result<&mut Compressor> {
        self.stream
            .as_mut()
            .ok_or_else(|| Error::State("compressor stream missing".into()))
    }
}

/// Inbound half of a [`Processor`].
#[derive(Debug)]
pub struct MessageDecompressor {
    role: Role,
    params: ProcessorParams,
    max_message_size: usize,
    stream: Option<Decompressor>,
    budget: Budget,
    state: StreamState,
}

impl MessageDecompressor {
    fn new(role: Role, params: ProcessorParams, config: &Config) -> Self {
        let max_message_size = config.limits.max_message_size;
        Self {
            role,
            params,
            max_message_size,
            stream: None,
            budget: Budget::new(max_message_size),
            state: StreamState::Idle,
        }
    }

    /// Begin a message, creating the stream if there is none.
    ///
    /// # Errors
    ///
    /// Returns [`Error::State`] if a message is already in progress, or
    /// [`Error::UnsupportedAlgorithm`] if the algorithm is not compiled in.
    pub fn start(&mut self) -> Result<()> {
        self.state.begin("start_decompress_message")?;
        self.budget = Budget::new(self.max_message_size);
        if self.stream.is_none() {
            log::trace!(
                "{:?} opening {} decompressor",
                self.role,
                self.params.algorithm()
            );
            match self.params.decompressor(self.role.peer()) {
                Ok(stream) => self.stream = Some(stream),
                Err(e) => {
                    self.state = StreamState::Idle;
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    /// Feed compressed data; returns decompressed output so far.
    ///
    /// # Errors
    ///
    /// Returns [`Error::State`] outside a message, [`Error::InvalidPayload`]
    /// for a corrupt stream, [`Error::MessageTooLarge`] once the message
    /// exceeds the configured ceiling.
    pub fn decompress(&mut self, data: &[u8]) -> Result<Vec<u8>> {
        self.state.expect_in_message("decompress_message_data")?;
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| Error::State("decompressor stream missing".into()))?;
        stream.decompress(data, &mut self.budget)
    }

    /// Finish the message and return any remaining output.
    ///
    /// # Errors
    ///
    /// See [`MessageDecompressor::decompress`].
    pub fn end(&mut self) -> Result<Vec<u8>> {
        self.state.end("end_decompress_message")?;
        let result = match self.stream.as_mut() {
            Some(stream) => stream.finish(&mut self.budget),
            None => Err(Error::State("decompressor stream missing".into())),
        };
        if result.is_err() || self.params.no_context_takeover(self.role.peer()) {
            self.stream = None;
        }
        result
    }

    /// Decompress a complete message in one call.
    ///
    /// # Errors
    ///
    /// See [`MessageDecompressor::decompress`].
    pub fn decompress_message(&mut self, data: &[u8]) -> Result<Vec<u8>> {
        self.start()?;
        let mut out = match self.decompress(data) {
            Ok(out) => out,
            Err(e) => {
                self.abort();
                return Err(e);
            }
        };
        out.extend(self.end()?);
        log::trace!("decompressed {} bytes to {}", data.len(), out.len());
        Ok(out)
    }

    /// Drop the current message and its stream.
    pub fn abort(&mut self) {
        self.stream = None;
        self.state = StreamState::Idle;
    }

    /// Whether a message is in progress.
    #[must_use]
    pub fn in_message(&self) -> bool {
        self.state.is_in_message()
    }

    /// Role this half decompresses for.
    #[must_use]
    pub const fn role(&self) -> Role {
        self.role
    }
}

/// Streaming compression state for one connection.
#[derive(Debug)]
pub struct Processor {
    params: ProcessorParams,
    compressor: MessageCompressor,
    decompressor: MessageDecompressor,
}

impl Processor {
    /// Create a processor for `role`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedAlgorithm`] if the algorithm is not
    /// compiled into this build, or [`Error::Configuration`] if `params` or
    /// `config` hold out-of-range values.
    pub fn new(role: Role, params: ProcessorParams, config: &Config) -> Result<Self> {
        let algorithm = params.algorithm();
        if !algorithm.is_available() {
            return Err(Error::UnsupportedAlgorithm(algorithm.name().into()));
        }
        params.validate()?;
        config.validate()?;
        log::debug!("{role:?} processor for {algorithm}: {params:?}");
        Ok(Self {
            params,
            compressor: MessageCompressor::new(role, params, config.clone()),
            decompressor: MessageDecompressor::new(role, params, config),
        })
    }

    /// Server-role processor for an accepted offer.
    ///
    /// # Errors
    ///
    /// See [`Processor::new`].
    pub fn from_offer_accept(accept: &OfferAccept, config: &Config) -> Result<Self> {
        Self::new(
            Role::Server,
            ProcessorParams::from_offer_accept(accept),
            config,
        )
    }

    /// Client-role processor for an accepted response.
    ///
    /// # Errors
    ///
    /// See [`Processor::new`].
    pub fn from_response_accept(accept: &ResponseAccept, config: &Config) -> Result<Self> {
        Self::new(
            Role::Client,
            ProcessorParams::from_response_accept(accept),
            config,
        )
    }

    /// Role this processor was built for.
    #[must_use]
    pub const fn role(&self) -> Role {
        self.compressor.role
    }

    /// Negotiated algorithm.
    #[must_use]
    pub const fn algorithm(&self) -> Algorithm {
        self.params.algorithm()
    }

    /// Negotiated settings.
    #[must_use]
    pub const fn params(&self) -> &ProcessorParams {
        &self.params
    }

    /// See [`MessageCompressor::start`].
    ///
    /// # Errors
    ///
    /// See [`MessageCompressor::start`].
    pub fn start_compress_message(&mut self) -> Result<()> {
        self.compressor.start()
    }

    /// See [`MessageCompressor::compress`].
    ///
    /// # Errors
    ///
    /// See [`MessageCompressor::compress`].
    pub fn compress_message_data(&mut self, data: &[u8]) -> Result<Vec<u8>> {
        self.compressor.compress(data)
    }

    /// See [`MessageCompressor::end`].
    ///
    /// # Errors
    ///
    /// See [`MessageCompressor::end`].
    pub fn end_compress_message(&mut self) -> Result<Vec<u8>> {
        self.compressor.end()
    }

    /// See [`MessageDecompressor::start`].
    ///
    /// # Errors
    ///
    /// See [`MessageDecompressor::start`].
    pub fn start_decompress_message(&mut self) -> Result<()> {
        self.decompressor.start()
    }

    /// See [`MessageDecompressor::decompress`].
    ///
    /// # Errors
    ///
    /// See [`MessageDecompressor::decompress`].
    pub fn decompress_message_data(&mut self, data: &[u8]) -> Result<Vec<u8>> {
        self.decompressor.decompress(data)
    }

    /// See [`MessageDecompressor::end`].
    ///
    /// # Errors
    ///
    /// See [`MessageDecompressor::end`].
    pub fn end_decompress_message(&mut self) -> Result<Vec<u8>> {
        self.decompressor.end()
    }

    /// Outbound half.
    pub fn compressor(&mut self) -> &mut MessageCompressor {
        &mut self.compressor
    }

    /// Inbound half.
    pub fn decompressor(&mut self) -> &mut MessageDecompressor {
        &mut self.decompressor
    }

    /// Split into independently owned halves, e.g. for separate send and
    /// receive tasks.
    #[must_use]
    pub fn split(self) -> (MessageCompressor, MessageDecompressor) {
        (self.compressor, self.decompressor)
    }
}
