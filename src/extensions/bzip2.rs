//! `permessage-bzip2` parameter negotiation.
//!
//! Mirrors the deflate value objects with a single negotiable knob per
//! direction: the bzip2 block-size level (`*_max_compress_level`, 1-9).
//! Streams never carry context across messages.

use crate::error::{Error, Result};
use crate::extensions::header::{ParamMap, Segment};
use crate::extensions::params::{
    COMPRESS_LEVELS, check_range, flag, int_value, nonzero, single, single_int, unknown,
};

/// Registered extension name.
pub const EXTENSION_NAME: &str = "permessage-bzip2";

/// Level used when none was negotiated.
pub const DEFAULT_COMPRESS_LEVEL: u8 = 9;

const CLIENT_MAX_COMPRESS_LEVEL: &str = "client_max_compress_level";
const SERVER_MAX_COMPRESS_LEVEL: &str = "server_max_compress_level";

/// A client's `permessage-bzip2` offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Bzip2Offer {
    accept_max_compress_level: bool,
    request_max_compress_level: u8,
}

impl Default for Bzip2Offer {
    fn default() -> Self {
        Self {
            accept_max_compress_level: true,
            request_max_compress_level: 0,
        }
    }
}

impl Bzip2Offer {
    /// Offer that lets the server cap our level and requests nothing.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the server may cap the client's compress level.
    #[must_use]
    pub const fn with_accept_max_compress_level(mut self, value: bool) -> Self {
        self.accept_max_compress_level = value;
        self
    }

    /// Ask the server to compress with at most `level`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] unless `level` is 0 (no request) or 1-9.
    pub fn with_request_max_compress_level(mut self, level: u8) -> Result<Self> {
        check_range("request_max_compress_level", level, COMPRESS_LEVELS, true)?;
        self.request_max_compress_level = level;
        Ok(self)
    }

    /// See [`Bzip2Offer::with_accept_max_compress_level`].
    #[must_use]
    pub const fn accept_max_compress_level(&self) -> bool {
        self.accept_max_compress_level
    }

    /// Requested server level, 0 if none.
    #[must_use]
    pub const fn request_max_compress_level(&self) -> u8 {
        self.request_max_compress_level
    }

    /// Parse the parameters of one offer segment.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`] for unknown or repeated parameters and for
    /// out-of-range values.
    pub fn parse(params: &ParamMap) -> Result<Self> {
        let mut offer = Self {
            accept_max_compress_level: false,
            request_max_compress_level: 0,
        };

        for (name, values) in params.iter() {
            match name {
                CLIENT_MAX_COMPRESS_LEVEL => {
                    flag(EXTENSION_NAME, name, values)?;
                    offer.accept_max_compress_level = true;
                }
                SERVER_MAX_COMPRESS_LEVEL => {
                    offer.request_max_compress_level =
                        single_int(EXTENSION_NAME, name, values, COMPRESS_LEVELS)?;
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
        if self.accept_max_compress_level {
            params.insert_flag(CLIENT_MAX_COMPRESS_LEVEL);
        }
        if self.request_max_compress_level != 0 {
            params.insert_value(SERVER_MAX_COMPRESS_LEVEL, self.request_max_compress_level);
        }
        Segment::with_params(EXTENSION_NAME, params)
    }
}

/// A server's acceptance of a [`Bzip2Offer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Bzip2OfferAccept {
    offer: Bzip2Offer,
    request_max_compress_level: u8,
    compress_level: Option<u8>,
}

impl Bzip2OfferAccept {
    /// Accept `offer` as is.
    #[must_use]
    pub const fn new(offer: &Bzip2Offer) -> Self {
        Self {
            offer: *offer,
            request_max_compress_level: 0,
            compress_level: None,
        }
    }

    /// Cap the client's compress level.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if out of range or if the client did
    /// not offer to accept a cap.
    pub fn with_request_max_compress_level(mut self, level: u8) -> Result<Self> {
        check_range("request_max_compress_level", level, COMPRESS_LEVELS, true)?;
        if level != 0 && !self.offer.accept_max_compress_level {
            return Err(Error::Configuration(
                "invalid value for request_max_compress_level - feature unsupported by client"
                    .into(),
            ));
        }
        self.request_max_compress_level = level;
        Ok(self)
    }

    /// Local choice: the server compressor's level.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if out of range or above the level
    /// the client requested.
    pub fn with_compress_level(mut self, level: u8) -> Result<Self> {
        check_range("compress_level", level, COMPRESS_LEVELS, false)?;
        if self.offer.request_max_compress_level != 0
            && level > self.offer.request_max_compress_level
        {
            return Err(Error::Configuration(format!(
                "invalid value {level} for compress_level - client requested lower maximum value {}",
                self.offer.request_max_compress_level
            )));
        }
        self.compress_level = Some(level);
        Ok(self)
    }

    /// The offer this accept narrows.
    #[must_use]
    pub const fn offer(&self) -> &Bzip2Offer {
        &self.offer
    }

    /// See [`Bzip2OfferAccept::with_request_max_compress_level`].
    #[must_use]
    pub const fn request_max_compress_level(&self) -> u8 {
        self.request_max_compress_level
    }

    /// See [`Bzip2OfferAccept::with_compress_level`].
    #[must_use]
    pub const fn compress_level(&self) -> Option<u8> {
        self.compress_level
    }

    /// The response the server sends for this accept.
    #[must_use]
    pub const fn response(&self) -> Bzip2Response {
        Bzip2Response {
            server_max_compress_level: self.offer.request_max_compress_level,
            client_max_compress_level: self.request_max_compress_level,
        }
    }

    /// The response header segment.
    #[must_use]
    pub fn to_header_segment(&self) -> Segment {
        self.response().to_header_segment()
    }
}

/// The `permessage-bzip2` parameters a server put on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Bzip2Response {
    server_max_compress_level: u8,
    client_max_compress_level: u8,
}

impl Bzip2Response {
    /// The server's level, 0 if unspecified.
    #[must_use]
    pub const fn server_max_compress_level(&self) -> u8 {
        self.server_max_compress_level
    }

    /// The client's level cap, 0 if unspecified.
    #[must_use]
    pub const fn client_max_compress_level(&self) -> u8 {
        self.client_max_compress_level
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
                CLIENT_MAX_COMPRESS_LEVEL => {
                    let value = single(EXTENSION_NAME, name, values)?;
                    response.client_max_compress_level =
                        int_value(EXTENSION_NAME, name, value, COMPRESS_LEVELS)?;
                }
                SERVER_MAX_COMPRESS_LEVEL => {
                    response.server_max_compress_level =
                        single_int(EXTENSION_NAME, name, values, COMPRESS_LEVELS)?;
                }
                other => return Err(unknown(EXTENSION_NAME, other)),
            }
        }

        Ok(response)
    }

    /// Check this response against the offer the client sent.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Handshake`] if the server capped the client without
    /// permission or ignored the client's request.
    pub fn reconcile(&self, offer: &Bzip2Offer) -> Result<Self> {
        if self.client_max_compress_level != 0 && !offer.accept_max_compress_level {
            return Err(Error::Handshake(
                "server sent client_max_compress_level which was not offered".into(),
            ));
        }
        if offer.request_max_compress_level != 0
            && (self.server_max_compress_level == 0
                || self.server_max_compress_level > offer.request_max_compress_level)
        {
            return Err(Error::Handshake(format!(
                "server_max_compress_level={} does not honor requested {}",
                self.server_max_compress_level, offer.request_max_compress_level
            )));
        }
        Ok(*self)
    }

    /// The header segment carrying this response.
    #[must_use]
    pub fn to_header_segment(&self) -> Segment {
        let mut params = ParamMap::new();
        if self.server_max_compress_level != 0 {
            params.insert_value(SERVER_MAX_COMPRESS_LEVEL, self.server_max_compress_level);
        }
        if self.client_max_compress_level != 0 {
            params.insert_value(CLIENT_MAX_COMPRESS_LEVEL, self.client_max_compress_level);
        }
        Segment::with_params(EXTENSION_NAME, params)
    }
}

/// A client's acceptance of a [`Bzip2Response`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Bzip2ResponseAccept {
    response: Bzip2Response,
    compress_level: Option<u8>,
}

impl Bzip2ResponseAccept {
    /// Accept `response` as is.
    #[must_use]
    pub const fn new(response: &Bzip2Response) -> Self {
        Self {
            response: *response,
            compress_level: None,
        }
    }

    /// Local choice: the client compressor's level.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if out of range or above the cap the
    /// server set.
    pub fn with_compress_level(mut self, level: u8) -> Result<Self> {
        check_range("compress_level", level, COMPRESS_LEVELS, false)?;
        if self.response.client_max_compress_level != 0
            && level > self.response.client_max_compress_level
        {
            return Err(Error::Configuration(format!(
                "invalid value {level} for compress_level - server requested lower maximum value {}",
                self.response.client_max_compress_level
            )));
        }
        self.compress_level = Some(level);
        Ok(self)
    }

    /// The response this accept applies to.
    #[must_use]
    pub const fn response(&self) -> &Bzip2Response {
        &self.response
    }

    /// See [`Bzip2ResponseAccept::with_compress_level`].
    #[must_use]
    pub const fn compress_level(&self) -> Option<u8> {
        self.compress_level
    }
}

/// Settings a `permessage-bzip2` processor runs with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Bzip2Params {
    /// Level of the server's compressor.
    pub server_max_compress_level: u8,
    /// Level of the client's compressor.
    pub client_max_compress_level: u8,
}

impl Default for Bzip2Params {
    fn default() -> Self {
        Self {
            server_max_compress_level: DEFAULT_COMPRESS_LEVEL,
            client_max_compress_level: DEFAULT_COMPRESS_LEVEL,
        }
    }
}

impl Bzip2Params {
    /// Server-side settings from an accepted offer.
    #[must_use]
    pub fn from_offer_accept(accept: &Bzip2OfferAccept) -> Self {
        Self {
            server_max_compress_level: accept
                .compress_level
                .or(nonzero(accept.offer.request_max_compress_level))
                .unwrap_or(DEFAULT_COMPRESS_LEVEL),
            client_max_compress_level: nonzero(accept.request_max_compress_level)
                .unwrap_or(DEFAULT_COMPRESS_LEVEL),
        }
    }

    /// Client-side settings from an accepted response.
    #[must_use]
    pub fn from_response_accept(accept: &Bzip2ResponseAccept) -> Self {
        Self {
            server_max_compress_level: nonzero(accept.response.server_max_compress_level)
                .unwrap_or(DEFAULT_COMPRESS_LEVEL),
            client_max_compress_level: accept
                .compress_level
                .or(nonzero(accept.response.client_max_compress_level))
                .unwrap_or(DEFAULT_COMPRESS_LEVEL),
        }
    }

    /// Check fields that may have been set directly.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] for a level outside 1-9.
    pub fn validate(&self) -> Result<()> {
        check_range(
            "server_max_compress_level",
            self.server_max_compress_level,
            COMPRESS_LEVELS,
            false,
        )?;
        check_range(
            "client_max_compress_level",
            self.client_max_compress_level,
            COMPRESS_LEVELS,
            false,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extensions::header::parse_header;

    fn params(header: &str) -> ParamMap {
        parse_header(header).unwrap().remove(0).params
    }

    #[test]
    fn test_default_offer_header() {
        assert_eq!(
            Bzip2Offer::new().to_header_segment().to_string(),
            "permessage-bzip2; client_max_compress_level"
        );
    }

    #[test]
    fn test_offer_parse() {
        let offer =
            Bzip2Offer::parse(&params("permessage-bzip2; server_max_compress_level=4")).unwrap();
        assert!(!offer.accept_max_compress_level());
        assert_eq!(offer.request_max_compress_level(), 4);

        for bad in [
            "permessage-bzip2; server_max_compress_level=0",
            "permessage-bzip2; server_max_compress_level=10",
            "permessage-bzip2; client_max_compress_level=3",
            "permessage-bzip2; server_no_context_takeover",
        ] {
            assert!(Bzip2Offer::parse(&params(bad)).is_err(), "{bad}");
        }
    }

    #[test]
    fn test_offer_roundtrip() {
        let offer = Bzip2Offer::new().with_request_max_compress_level(5).unwrap();
        assert_eq!(
            Bzip2Offer::parse(&offer.to_header_segment().params).unwrap(),
            offer
        );
    }

    #[test]
    fn test_accept_validation() {
        let refuses_cap = Bzip2Offer::new().with_accept_max_compress_level(false);
        assert!(
            Bzip2OfferAccept::new(&refuses_cap)
                .with_request_max_compress_level(3)
                .is_err()
        );

        let capped = Bzip2Offer::new().with_request_max_compress_level(4).unwrap();
        let accept = Bzip2OfferAccept::new(&capped);
        assert!(accept.with_compress_level(5).is_err());
        assert!(accept.with_compress_level(4).is_ok());
        assert!(accept.with_compress_level(0).is_err());
    }

    #[test]
    fn test_accept_response() {
        let offer = Bzip2Offer::new().with_request_max_compress_level(4).unwrap();
        let accept = Bzip2OfferAccept::new(&offer)
            .with_request_max_compress_level(2)
            .unwrap();
        assert_eq!(
            accept.to_header_segment().to_string(),
            "permessage-bzip2; server_max_compress_level=4; client_max_compress_level=2"
        );
    }

    #[test]
    fn test_response_reconcile() {
        let offer = Bzip2Offer::new()
            .with_accept_max_compress_level(false)
            .with_request_max_compress_level(3)
            .unwrap();
        let ok = Bzip2Response::parse(&params("permessage-bzip2; server_max_compress_level=3"))
            .unwrap();
        assert!(ok.reconcile(&offer).is_ok());

        assert!(Bzip2Response::default().reconcile(&offer).is_err());

        let unsolicited = Bzip2Response::parse(&params(
            "permessage-bzip2; server_max_compress_level=2; client_max_compress_level=1",
        ))
        .unwrap();
        assert!(matches!(
            unsolicited.reconcile(&offer),
            Err(Error::Handshake(_))
        ));
    }

    #[test]
    fn test_params() {
        let offer = Bzip2Offer::new().with_request_max_compress_level(3).unwrap();
        let accept = Bzip2OfferAccept::new(&offer)
            .with_request_max_compress_level(7)
            .unwrap();
        let p = Bzip2Params::from_offer_accept(&accept);
        assert_eq!(p.server_max_compress_level, 3);
        assert_eq!(p.client_max_compress_level, 7);

        let p = Bzip2Params::from_response_accept(
            &Bzip2ResponseAccept::new(&accept.response())
                .with_compress_level(5)
                .unwrap(),
        );
        assert_eq!(p.server_max_compress_level, 3);
        assert_eq!(p.client_max_compress_level, 5);
    }
}
