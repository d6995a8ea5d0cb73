//! `permessage-deflate` parameter negotiation (RFC 7692 §7).
//!
//! Four immutable value objects model one round of negotiation:
//!
//! 1. [`DeflateOffer`] - what a client puts in its request header.
//! 2. [`DeflateOfferAccept`] - the server's narrowing of one offer, plus its
//!    local compressor tuning.
//! 3. [`DeflateResponse`] - the parameters the server put on the wire.
//! 4. [`DeflateResponseAccept`] - the client's acceptance of a response, plus
//!    its local compressor tuning.
//!
//! [`DeflateParams`] is the outcome a processor runs with.

use crate::error::{Error, Result};
use crate::extensions::header::{ParamMap, Segment};
use crate::extensions::params::{
    MEM_LEVELS, WINDOW_BITS, check_range, flag, int_value, nonzero, single, single_int, unknown,
};

/// Registered extension name.
pub const EXTENSION_NAME: &str = "permessage-deflate";

/// Window size used when none was negotiated.
pub const DEFAULT_WINDOW_BITS: u8 = 15;

/// zlib's default memory level.
pub const DEFAULT_MEM_LEVEL: u8 = 8;

const CLIENT_MAX_WINDOW_BITS: &str = "client_max_window_bits";
const CLIENT_NO_CONTEXT_TAKEOVER: &str = "client_no_context_takeover";
const SERVER_MAX_WINDOW_BITS: &str = "server_max_window_bits";
const SERVER_NO_CONTEXT_TAKEOVER: &str = "server_no_context_takeover";

/// A client's `permessage-deflate` offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeflateOffer {
    accept_no_context_takeover: bool,
    accept_max_window_bits: bool,
    client_max_window_bits: u8,
    request_no_context_takeover: bool,
    request_max_window_bits: u8,
}

impl Default for DeflateOffer {
    fn default() -> Self {
        Self {
            accept_no_context_takeover: true,
            accept_max_window_bits: true,
            client_max_window_bits: 0,
            request_no_context_takeover: false,
            request_max_window_bits: 0,
        }
    }
}

impl DeflateOffer {
    /// Offer with default parameters: accept both client-side restrictions,
    /// request nothing of the server.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the client lets the server demand a per-message reset of the
    /// client's compressor.
    #[must_use]
    pub const fn with_accept_no_context_takeover(mut self, value: bool) -> Self {
        self.accept_no_context_takeover = value;
        self
    }

    /// Whether the client lets the server cap the client's window.
    ///
    /// Turning this off also drops any window hint.
    #[must_use]
    pub const fn with_accept_max_window_bits(mut self, value: bool) -> Self {
        self.accept_max_window_bits = value;
        if !value {
            self.client_max_window_bits = 0;
        }
        self
    }

    /// Announce the window the client will use at most (`client_max_window_bits=N`).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] unless `bits` is 0 (no hint) or 8-15.
    pub fn with_client_max_window_bits(mut self, bits: u8) -> Result<Self> {
        check_range("client_max_window_bits", bits, WINDOW_BITS, true)?;
        self.client_max_window_bits = bits;
        if bits != 0 {
            self.accept_max_window_bits = true;
        }
        Ok(self)
    }

    /// Ask the server to reset its compressor after every message.
    #[must_use]
    pub const fn with_request_no_context_takeover(mut self, value: bool) -> Self {
        self.request_no_context_takeover = value;
        self
    }

    /// Ask the server to cap its window at `bits`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] unless `bits` is 0 (no request) or 8-15.
    pub fn with_request_max_window_bits(mut self, bits: u8) -> Result<Self> {
        check_range("request_max_window_bits", bits, WINDOW_BITS, true)?;
        self.request_max_window_bits = bits;
        Ok(self)
    }

    /// See [`DeflateOffer::with_accept_no_context_takeover`].
    #[must_use]
    pub const fn accept_no_context_takeover(&self) -> bool {
        self.accept_no_context_takeover
    }

    /// See [`DeflateOffer::with_accept_max_window_bits`].
    #[must_use]
    pub const fn accept_max_window_bits(&self) -> bool {
        self.accept_max_window_bits
    }

    /// Window hint announced by the client, 0 if none.
    #[must_use]
    pub const fn client_max_window_bits(&self) -> u8 {
        self.client_max_window_bits
    }

    /// See [`DeflateOffer::with_request_no_context_takeover`].
    #[must_use]
    pub const fn request_no_context_takeover(&self) -> bool {
        self.request_no_context_takeover
    }

    /// Requested server window, 0 if none.
    #[must_use]
    pub const fn request_max_window_bits(&self) -> u8 {
        self.request_max_window_bits
    }

    /// Parse the parameters of one offer segment.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`] for unknown or repeated parameters and for
    /// out-of-range values.
    pub fn parse(params: &ParamMap) -> Result<Self> {
        let mut offer = Self {
            accept_no_context_takeover: false,
            accept_max_window_bits: false,
            client_max_window_bits: 0,
            request_no_context_takeover: false,
            request_max_window_bits: 0,
        };

        for (name, values) in params.iter() {
            match name {
                CLIENT_MAX_WINDOW_BITS => {
                    let value = single(EXTENSION_NAME, name, values)?;
                    if value.as_str().is_some() {
                        offer.client_max_window_bits =
                            int_value(EXTENSION_NAME, name, value, WINDOW_BITS)?;
                    }
                    offer.accept_max_window_bits = true;
                }
                CLIENT_NO_CONTEXT_TAKEOVER => {
                    flag(EXTENSION_NAME, name, values)?;
                    offer.accept_no_context_takeover = true;
                }
                SERVER_MAX_WINDOW_BITS => {
                    offer.request_max_window_bits =
                        single_int(EXTENSION_NAME, name, values, WINDOW_BITS)?;
                }
                SERVER_NO_CONTEXT_TAKEOVER => {
                    flag(EXTENSION_NAME, name, values)?;
                    offer.request_no_context_takeover = true;
                }
                other => return Err(unknown(EXTENSION_NAME, other)),
            }
        }

        Ok(offer)
    }

    /// The header segment announcing this offer.
    #[must_use]
    pub fn to_header_segment(&self) -> Segment {
        let mut params = ParamMap::new();
        if self.accept_no_context_takeover {
            params.insert_flag(CLIENT_NO_CONTEXT_TAKEOVER);
        }
        if self.client_max_window_bits != 0 {
            params.insert_value(CLIENT_MAX_WINDOW_BITS, self.client_max_window_bits);
        } else if self.accept_max_window_bits {
            params.insert_flag(CLIENT_MAX_WINDOW_BITS);
        }
        if self.request_no_context_takeover {
            params.insert_flag(SERVER_NO_CONTEXT_TAKEOVER);
        }
        if self.request_max_window_bits != 0 {
            params.insert_value(SERVER_MAX_WINDOW_BITS, self.request_max_window_bits);
        }
        Segment::with_params(EXTENSION_NAME, params)
    }
}

/// A server's acceptance of a [`DeflateOffer`].
///
/// Built from the offer and narrowed with the `with_*` methods, each of which
/// checks the narrowing against what the client advertised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeflateOfferAccept {
    offer: DeflateOffer,
    request_no_context_takeover: bool,
    request_max_window_bits: u8,
    no_context_takeover: Option<bool>,
    window_bits: Option<u8>,
    mem_level: Option<u8>,
}

impl DeflateOfferAccept {
    /// Accept `offer` as is.
    #[must_use]
    pub const fn new(offer: &DeflateOffer) -> Self {
        Self {
            offer: *offer,
            request_no_context_takeover: false,
            request_max_window_bits: 0,
            no_context_takeover: None,
            window_bits: None,
            mem_level: None,
        }
    }

    /// Demand that the client reset its compressor after every message.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the client did not offer to accept this.
    pub fn with_request_no_context_takeover(mut self, value: bool) -> Result<Self> {
        if value && !self.offer.accept_no_context_takeover {
            return Err(Error::Configuration(
                "invalid value for request_no_context_takeover - feature unsupported by client"
                    .into(),
            ));
        }
        self.request_no_context_takeover = value;
        Ok(self)
    }

    /// Cap the client's window at `bits` (0 leaves it uncapped).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if `bits` is out of range, the client
    /// did not offer to accept a cap, or `bits` exceeds the client's own hint.
    pub fn with_request_max_window_bits(mut self, bits: u8) -> Result<Self> {
        check_range("request_max_window_bits", bits, WINDOW_BITS, true)?;
        if bits != 0 && !self.offer.accept_max_window_bits {
            return Err(Error::Configuration(
                "invalid value for request_max_window_bits - feature unsupported by client".into(),
            ));
        }
        if bits != 0
            && self.offer.client_max_window_bits != 0
            && bits > self.offer.client_max_window_bits
        {
            return Err(Error::Configuration(format!(
                "invalid value {bits} for request_max_window_bits - client announced at most {}",
                self.offer.client_max_window_bits
            )));
        }
        self.request_max_window_bits = bits;
        Ok(self)
    }

    /// Local choice: reset the server's compressor after every message.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] when turning it off although the
    /// client requested it.
    pub fn with_no_context_takeover(mut self, value: bool) -> Result<Self> {
        if self.offer.request_no_context_takeover && !value {
            return Err(Error::Configuration(
                "invalid value (false) for no_context_takeover - client requested feature".into(),
            ));
        }
        self.no_context_takeover = Some(value);
        Ok(self)
    }

    /// Local choice: the server compressor's window.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if out of range or larger than the
    /// window the client requested.
    pub fn with_window_bits(mut self, bits: u8) -> Result<Self> {
        check_range("window_bits", bits, WINDOW_BITS, false)?;
        if self.offer.request_max_window_bits != 0 && bits > self.offer.request_max_window_bits {
            return Err(Error::Configuration(format!(
                "invalid value {bits} for window_bits - client requested lower maximum value {}",
                self.offer.request_max_window_bits
            )));
        }
        self.window_bits = Some(bits);
        Ok(self)
    }

    /// Local choice: the server compressor's memory level.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] unless `level` is 1-9.
    pub fn with_mem_level(mut self, level: u8) -> Result<Self> {
        check_range("mem_level", level, MEM_LEVELS, false)?;
        self.mem_level = Some(level);
        Ok(self)
    }

    /// The offer this accept narrows.
    #[must_use]
    pub const fn offer(&self) -> &DeflateOffer {
        &self.offer
    }

    /// See [`DeflateOfferAccept::with_request_no_context_takeover`].
    #[must_use]
    pub const fn request_no_context_takeover(&self) -> bool {
        self.request_no_context_takeover
    }

    /// See [`DeflateOfferAccept::with_request_max_window_bits`].
    #[must_use]
    pub const fn request_max_window_bits(&self) -> u8 {
        self.request_max_window_bits
    }

    /// See [`DeflateOfferAccept::with_no_context_takeover`].
    #[must_use]
    pub const fn no_context_takeover(&self) -> Option<bool> {
        self.no_context_takeover
    }

    /// See [`DeflateOfferAccept::with_window_bits`].
    #[must_use]
    pub const fn window_bits(&self) -> Option<u8> {
        self.window_bits
    }

    /// See [`DeflateOfferAccept::with_mem_level`].
    #[must_use]
    pub const fn mem_level(&self) -> Option<u8> {
        self.mem_level
    }

    /// The response the server sends for this accept.
    #[must_use]
    pub const fn response(&self) -> DeflateResponse {
        DeflateResponse {
            server_no_context_takeover: self.offer.request_no_context_takeover,
            server_max_window_bits: self.offer.request_max_window_bits,
            client_no_context_takeover: self.request_no_context_takeover,
            client_max_window_bits: self.request_max_window_bits,
        }
    }

    /// The response header segment.
    #[must_use]
    pub fn to_header_segment(&self) -> Segment {
        self.response().to_header_segment()
    }
}

/// The `permessage-deflate` parameters a server put on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct DeflateResponse {
    server_no_context_takeover: bool,
    server_max_window_bits: u8,
    client_no_context_takeover: bool,
    client_max_window_bits: u8,
}

impl DeflateResponse {
    /// Whether the server resets its compressor every message.
    #[must_use]
    pub const fn server_no_context_takeover(&self) -> bool {
        self.server_no_context_takeover
    }

    /// The server's window, 0 if unspecified.
    #[must_use]
    pub const fn server_max_window_bits(&self) -> u8 {
        self.server_max_window_bits
    }

    /// Whether the client must reset its compressor every message.
    #[must_use]
    pub const fn client_no_context_takeover(&self) -> bool {
        self.client_no_context_takeover
    }

    /// The client's window cap, 0 if unspecified.
    #[must_use]
    pub const fn client_max_window_bits(&self) -> u8 {
        self.client_max_window_bits
    }

    /// Parse the parameters of a response segment.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`] for unknown or repeated parameters, missing
    /// values and out-of-range values.
    pub fn parse(params: &ParamMap) -> Result<Self> {
        let mut response = Self::default();

        for (name, values) in params.iter() {
            match name {
                CLIENT_MAX_WINDOW_BITS => {
                    response.client_max_window_bits =
                        single_int(EXTENSION_NAME, name, values, WINDOW_BITS)?;
                }
                CLIENT_NO_CONTEXT_TAKEOVER => {
                    flag(EXTENSION_NAME, name, values)?;
                    response.client_no_context_takeover = true;
                }
                SERVER_MAX_WINDOW_BITS => {
                    response.server_max_window_bits =
                        single_int(EXTENSION_NAME, name, values, WINDOW_BITS)?;
                }
                SERVER_NO_CONTEXT_TAKEOVER => {
                    flag(EXTENSION_NAME, name, values)?;
                    response.server_no_context_takeover = true;
                }
                other => return Err(unknown(EXTENSION_NAME, other)),
            }
        }

        Ok(response)
    }

    /// Check this response against the offer the client sent, returning the
    /// effective response.
    ///
    /// A window hint from the offer becomes the effective client window when
    /// the server did not set one.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Handshake`] if the server claimed something the offer
    /// did not permit or ignored something the offer required.
    pub fn reconcile(&self, offer: &DeflateOffer) -> Result<Self> {
        if self.client_no_context_takeover && !offer.accept_no_context_takeover {
            return Err(Error::Handshake(
                "server demands client_no_context_takeover which was not offered".into(),
            ));
        }
        if self.client_max_window_bits != 0 {
            if !offer.accept_max_window_bits {
                return Err(Error::Handshake(
                    "server sent client_max_window_bits which was not offered".into(),
                ));
            }
            if offer.client_max_window_bits != 0
                && self.client_max_window_bits > offer.client_max_window_bits
            {
                return Err(Error::Handshake(format!(
                    "server client_max_window_bits={} exceeds offered {}",
                    self.client_max_window_bits, offer.client_max_window_bits
                )));
            }
        }
        if offer.request_no_context_takeover && !self.server_no_context_takeover {
            return Err(Error::Handshake(
                "server did not confirm server_no_context_takeover".into(),
            ));
        }
        if offer.request_max_window_bits != 0
            && (self.server_max_window_bits == 0
                || self.server_max_window_bits > offer.request_max_window_bits)
        {
            return Err(Error::Handshake(format!(
                "server_max_window_bits={} does not honor requested {}",
                self.server_max_window_bits, offer.request_max_window_bits
            )));
        }

        let mut effective = *self;
        if effective.client_max_window_bits == 0 {
            effective.client_max_window_bits = offer.client_max_window_bits;
        }
        Ok(effective)
    }

    /// The header segment carrying this response.
    #[must_use]
    pub fn to_header_segment(&self) -> Segment {
        let mut params = ParamMap::new();
        if self.server_no_context_takeover {
            params.insert_flag(SERVER_NO_CONTEXT_TAKEOVER);
        }
        if self.server_max_window_bits != 0 {
            params.insert_value(SERVER_MAX_WINDOW_BITS, self.server_max_window_bits);
        }
        if self.client_no_context_takeover {
            params.insert_flag(CLIENT_NO_CONTEXT_TAKEOVER);
        }
        if self.client_max_window_bits != 0 {
            params.insert_value(CLIENT_MAX_WINDOW_BITS, self.client_max_window_bits);
        }
        Segment::with_params(EXTENSION_NAME, params)
    }
}

/// A client's acceptance of a [`DeflateResponse`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeflateResponseAccept {
    response: DeflateResponse,
    no_context_takeover: Option<bool>,
    window_bits: Option<u8>,
    mem_level: Option<u8>,
}

impl DeflateResponseAccept {
    /// Accept `response` as is.
    #[must_use]
    pub const fn new(response: &DeflateResponse) -> Self {
        Self {
            response: *response,
            no_context_takeover: None,
            window_bits: None,
            mem_level: None,
        }
    }

    /// Local choice: reset the client's compressor after every message.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] when turning it off although the
    /// server demanded it.
    pub fn with_no_context_takeover(mut self, value: bool) -> Result<Self> {
        if self.response.client_no_context_takeover && !value {
            return Err(Error::Configuration(
                "invalid value (false) for no_context_takeover - server requested feature".into(),
            ));
        }
        self.no_context_takeover = Some(value);
        Ok(self)
    }

    /// Local choice: the client compressor's window.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if out of range or larger than the
    /// window the server allowed.
    pub fn with_window_bits(mut self, bits: u8) -> Result<Self> {
        check_range("window_bits", bits, WINDOW_BITS, false)?;
        if self.response.client_max_window_bits != 0 && bits > self.response.client_max_window_bits
        {
            return Err(Error::Configuration(format!(
                "invalid value {bits} for window_bits - server requested lower maximum value {}",
                self.response.client_max_window_bits
            )));
        }
        self.window_bits = Some(bits);
        Ok(self)
    }

    /// Local choice: the client compressor's memory level.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] unless `level` is 1-9.
    pub fn with_mem_level(mut self, level: u8) -> Result<Self> {
        check_range("mem_level", level, MEM_LEVELS, false)?;
        self.mem_level = Some(level);
        Ok(self)
    }

    /// The response this accept applies to.
    #[must_use]
    pub const fn response(&self) -> &DeflateResponse {
        &self.response
    }

    /// See [`DeflateResponseAccept::with_no_context_takeover`].
    #[must_use]
    pub const fn no_context_takeover(&self) -> Option<bool> {
        self.no_context_takeover
    }

    /// See [`DeflateResponseAccept::with_window_bits`].
    #[must_use]
    pub const fn window_bits(&self) -> Option<u8> {
        self.window_bits
    }

    /// See [`DeflateResponseAccept::with_mem_level`].
    #[must_use]
    pub const fn mem_level(&self) -> Option<u8> {
        self.mem_level
    }
}

/// Settings a `permessage-deflate` processor runs with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeflateParams {
    /// Server resets its compressor (and the client its decompressor) per message.
    pub server_no_context_takeover: bool,
    /// Server's compression window.
    pub server_max_window_bits: u8,
    /// Client resets its compressor (and the server its decompressor) per message.
    pub client_no_context_takeover: bool,
    /// Client's compression window.
    pub client_max_window_bits: u8,
    /// Memory level of the local compressor. Validated but not applied:
    /// flate2 always opens zlib streams with memory level 8.
    pub mem_level: u8,
}

impl Default for DeflateParams {
    fn default() -> Self {
        Self {
            server_no_context_takeover: false,
            server_max_window_bits: DEFAULT_WINDOW_BITS,
            client_no_context_takeover: false,
            client_max_window_bits: DEFAULT_WINDOW_BITS,
            mem_level: DEFAULT_MEM_LEVEL,
        }
    }
}

impl DeflateParams {
    /// Server-side settings from an accepted offer.
    #[must_use]
    pub fn from_offer_accept(accept: &DeflateOfferAccept) -> Self {
        let offer = accept.offer();
        Self {
            server_no_context_takeover: accept
                .no_context_takeover
                .unwrap_or(offer.request_no_context_takeover),
            server_max_window_bits: accept
                .window_bits
                .or(nonzero(offer.request_max_window_bits))
                .unwrap_or(DEFAULT_WINDOW_BITS),
            client_no_context_takeover: accept.request_no_context_takeover,
            client_max_window_bits: nonzero(accept.request_max_window_bits)
                .or(nonzero(offer.client_max_window_bits))
                .unwrap_or(DEFAULT_WINDOW_BITS),
            mem_level: accept.mem_level.unwrap_or(DEFAULT_MEM_LEVEL),
        }
    }

    /// Client-side settings from an accepted response.
    #[must_use]
    pub fn from_response_accept(accept: &DeflateResponseAccept) -> Self {
        let response = accept.response();
        Self {
            server_no_context_takeover: response.server_no_context_takeover,
            server_max_window_bits: nonzero(response.server_max_window_bits)
                .unwrap_or(DEFAULT_WINDOW_BITS),
            client_no_context_takeover: accept
                .no_context_takeover
                .unwrap_or(response.client_no_context_takeover),
            client_max_window_bits: accept
                .window_bits
                .or(nonzero(response.client_max_window_bits))
                .unwrap_or(DEFAULT_WINDOW_BITS),
            mem_level: accept.mem_level.unwrap_or(DEFAULT_MEM_LEVEL),
        }
    }

    /// Check fields that may have been set directly.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] for window bits outside 8-15 or a
    /// memory level outside 1-9.
    pub fn validate(&self) -> Result<()> {
        check_range("server_max_window_bits", self.server_max_window_bits, WINDOW_BITS, false)?;
        check_range("client_max_window_bits", self.client_max_window_bits, WINDOW_BITS, false)?;
        check_range("mem_level", self.mem_level, MEM_LEVELS, false)
    }
}
