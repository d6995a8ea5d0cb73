//! WebSocket compression extensions (RFC 7692).
//!
//! Each algorithm contributes four value objects (offer, offer-accept,
//! response, response-accept). The enums in this module wrap them so that
//! negotiation code can work on any registered algorithm.
//!
//! # Example
//!
//! ```rust
//! use pmce::extensions::{DeflateOffer, Offer, offer_header};
//!
//! let offers = [Offer::from(DeflateOffer::new())];
//! assert_eq!(
//!     offer_header(&offers),
//!     "permessage-deflate; client_no_context_takeover; client_max_window_bits"
//! );
//! ```

pub mod deflate;
pub mod header;
pub mod negotiate;
pub(crate) mod params;
pub mod registry;
pub mod snappy;

#[cfg(feature = "bzip2")]
pub mod bzip2;

use std::fmt;

use crate::error::{Error, Result};

pub use self::deflate::{
    DeflateOffer, DeflateOfferAccept, DeflateParams, DeflateResponse, DeflateResponseAccept,
};
pub use self::header::{ParamMap, ParamValue, Segment, parse_header, serialize};
pub use self::negotiate::{
    Negotiated, negotiate_offer_header, negotiate_offer_header_default, negotiate_offers,
    negotiate_offers_default, negotiate_response, negotiate_response_default,
    negotiate_response_header, negotiate_response_header_default,
};
pub use self::registry::{ExtensionEntry, ExtensionRegistry};
pub use self::snappy::{SnappyOffer, SnappyOfferAccept, SnappyResponse, SnappyResponseAccept};

#[cfg(feature = "bzip2")]
pub use self::bzip2::{
    Bzip2Offer, Bzip2OfferAccept, Bzip2Params, Bzip2Response, Bzip2ResponseAccept,
};

/// A per-message compression algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Algorithm {
    /// `permessage-deflate` (RFC 7692).
    Deflate,
    /// `permessage-bzip2`.
    Bzip2,
    /// `permessage-snappy`.
    Snappy,
}

impl Algorithm {
    /// Every algorithm this crate knows, in default preference order.
    pub const ALL: [Algorithm; 3] = [Algorithm::Deflate, Algorithm::Bzip2, Algorithm::Snappy];

    /// Extension token used in `Sec-WebSocket-Extensions`.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Algorithm::Deflate => deflate::EXTENSION_NAME,
            Algorithm::Bzip2 => "permessage-bzip2",
            Algorithm::Snappy => snappy::EXTENSION_NAME,
        }
    }

    /// Look up an algorithm by extension token (case-insensitive).
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|alg| alg.name().eq_ignore_ascii_case(name))
    }

    /// Whether a processor for this algorithm is compiled in.
    #[must_use]
    pub const fn is_available(&self) -> bool {
        match self {
            Algorithm::Deflate => true,
            Algorithm::Bzip2 => cfg!(feature = "bzip2"),
            Algorithm::Snappy => cfg!(feature = "snappy"),
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn unsupported(algorithm: Algorithm) -> Error {
    Error::UnsupportedAlgorithm(algorithm.name().to_string())
}

/// A client offer for any algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Offer {
    /// See [`DeflateOffer`].
    Deflate(DeflateOffer),
    /// See [`Bzip2Offer`].
    #[cfg(feature = "bzip2")]
    Bzip2(Bzip2Offer),
    /// See [`SnappyOffer`].
    Snappy(SnappyOffer),
}

impl Offer {
    /// Parse offer parameters for `algorithm`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`] for invalid parameters or
    /// [`Error::UnsupportedAlgorithm`] if the algorithm is not compiled in.
    pub fn parse(algorithm: Algorithm, params: &ParamMap) -> Result<Self> {
        match algorithm {
            Algorithm::Deflate => DeflateOffer::parse(params).map(Offer::Deflate),
            #[cfg(feature = "bzip2")]
            Algorithm::Bzip2 => Bzip2Offer::parse(params).map(Offer::Bzip2),
            Algorithm::Snappy => SnappyOffer::parse(params).map(Offer::Snappy),
            #[allow(unreachable_patterns)]
            other => Err(unsupported(other)),
        }
    }

    /// The algorithm this offer is for.
    #[must_use]
    pub const fn algorithm(&self) -> Algorithm {
        match self {
            Offer::Deflate(_) => Algorithm::Deflate,
            #[cfg(feature = "bzip2")]
            Offer::Bzip2(_) => Algorithm::Bzip2,
            Offer::Snappy(_) => Algorithm::Snappy,
        }
    }

    /// The header segment announcing this offer.
    #[must_use]
    pub fn to_header_segment(&self) -> Segment {
        match self {
            Offer::Deflate(o) => o.to_header_segment(),
            #[cfg(feature = "bzip2")]
            Offer::Bzip2(o) => o.to_header_segment(),
            Offer::Snappy(o) => o.to_header_segment(),
        }
    }
}

impl From<DeflateOffer> for Offer {
    fn from(offer: DeflateOffer) -> Self {
        Offer::Deflate(offer)
    }
}

#[cfg(feature = "bzip2")]
impl From<Bzip2Offer> for Offer {
    fn from(offer: Bzip2Offer) -> Self {
        Offer::Bzip2(offer)
    }
}

impl From<SnappyOffer> for Offer {
    fn from(offer: SnappyOffer) -> Self {
        Offer::Snappy(offer)
    }
}

/// A server's acceptance of an [`Offer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum OfferAccept {
    /// See [`DeflateOfferAccept`].
    Deflate(DeflateOfferAccept),
    /// See [`Bzip2OfferAccept`].
    #[cfg(feature = "bzip2")]
    Bzip2(Bzip2OfferAccept),
    /// See [`SnappyOfferAccept`].
    Snappy(SnappyOfferAccept),
}

impl OfferAccept {
    /// Accept `offer` with default parameters.
    #[must_use]
    pub const fn new(offer: &Offer) -> Self {
        match offer {
            Offer::Deflate(o) => OfferAccept::Deflate(DeflateOfferAccept::new(o)),
            #[cfg(feature = "bzip2")]
            Offer::Bzip2(o) => OfferAccept::Bzip2(Bzip2OfferAccept::new(o)),
            Offer::Snappy(o) => OfferAccept::Snappy(SnappyOfferAccept::new(o)),
        }
    }

    /// The algorithm this accept is for.
    #[must_use]
    pub const fn algorithm(&self) -> Algorithm {
        match self {
            OfferAccept::Deflate(_) => Algorithm::Deflate,
            #[cfg(feature = "bzip2")]
            OfferAccept::Bzip2(_) => Algorithm::Bzip2,
            OfferAccept::Snappy(_) => Algorithm::Snappy,
        }
    }

    /// The offer this accept applies to.
    #[must_use]
    pub const fn offer(&self) -> Offer {
        match self {
            OfferAccept::Deflate(a) => Offer::Deflate(*a.offer()),
            #[cfg(feature = "bzip2")]
            OfferAccept::Bzip2(a) => Offer::Bzip2(*a.offer()),
            OfferAccept::Snappy(a) => Offer::Snappy(*a.offer()),
        }
    }

    /// The response the server sends back.
    #[must_use]
    pub const fn response(&self) -> Response {
        match self {
            OfferAccept::Deflate(a) => Response::Deflate(a.response()),
            #[cfg(feature = "bzip2")]
            OfferAccept::Bzip2(a) => Response::Bzip2(a.response()),
            OfferAccept::Snappy(a) => Response::Snappy(a.response()),
        }
    }

    /// The response header segment.
    #[must_use]
    pub fn to_header_segment(&self) -> Segment {
        match self {
            OfferAccept::Deflate(a) => a.to_header_segment(),
            #[cfg(feature = "bzip2")]
            OfferAccept::Bzip2(a) => a.to_header_segment(),
            OfferAccept::Snappy(a) => a.to_header_segment(),
        }
    }
}

impl From<DeflateOfferAccept> for OfferAccept {
    fn from(accept: DeflateOfferAccept) -> Self {
        OfferAccept::Deflate(accept)
    }
}

#[cfg(feature = "bzip2")]
impl From<Bzip2OfferAccept> for OfferAccept {
    fn from(accept: Bzip2OfferAccept) -> Self {
        OfferAccept::Bzip2(accept)
    }
}

impl From<SnappyOfferAccept> for OfferAccept {
    fn from(accept: SnappyOfferAccept) -> Self {
        OfferAccept::Snappy(accept)
    }
}

/// A server response for any algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Response {
    /// See [`DeflateResponse`].
    Deflate(DeflateResponse),
    /// See [`Bzip2Response`].
    #[cfg(feature = "bzip2")]
    Bzip2(Bzip2Response),
    /// See [`SnappyResponse`].
    Snappy(SnappyResponse),
}

impl Response {
    /// Parse response parameters for `algorithm`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`] for invalid parameters or
    /// [`Error::UnsupportedAlgorithm`] if the algorithm is not compiled in.
    pub fn parse(algorithm: Algorithm, params: &ParamMap) -> Result<Self> {
        match algorithm {
            Algorithm::Deflate => DeflateResponse::parse(params).map(Response::Deflate),
            #[cfg(feature = "bzip2")]
            Algorithm::Bzip2 => Bzip2Response::parse(params).map(Response::Bzip2),
            Algorithm::Snappy => SnappyResponse::parse(params).map(Response::Snappy),
            #[allow(unreachable_patterns)]
            other => Err(unsupported(other)),
        }
    }

    /// The algorithm this response is for.
    #[must_use]
    pub const fn algorithm(&self) -> Algorithm {
        match self {
            Response::Deflate(_) => Algorithm::Deflate,
            #[cfg(feature = "bzip2")]
            Response::Bzip2(_) => Algorithm::Bzip2,
            Response::Snappy(_) => Algorithm::Snappy,
        }
    }

    /// Check this response against an offer of the same algorithm and return
    /// the effective response.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Handshake`] if the algorithms differ or the response
    /// is incompatible with the offer.
    pub fn reconcile(&self, offer: &Offer) -> Result<Self> {
        match (self, offer) {
            (Response::Deflate(r), Offer::Deflate(o)) => r.reconcile(o).map(Response::Deflate),
            #[cfg(feature = "bzip2")]
            (Response::Bzip2(r), Offer::Bzip2(o)) => r.reconcile(o).map(Response::Bzip2),
            (Response::Snappy(r), Offer::Snappy(o)) => r.reconcile(o).map(Response::Snappy),
            _ => Err(Error::Handshake(format!(
                "{} response does not match {} offer",
                self.algorithm(),
                offer.algorithm()
            ))),
        }
    }

    /// The header segment carrying this response.
    #[must_use]
    pub fn to_header_segment(&self) -> Segment {
        match self {
            Response::Deflate(r) => r.to_header_segment(),
            #[cfg(feature = "bzip2")]
            Response::Bzip2(r) => r.to_header_segment(),
            Response::Snappy(r) => r.to_header_segment(),
        }
    }
}

/// A client's acceptance of a [`Response`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ResponseAccept {
    /// See [`DeflateResponseAccept`].
    Deflate(DeflateResponseAccept),
    /// See [`Bzip2ResponseAccept`].
    #[cfg(feature = "bzip2")]
    Bzip2(Bzip2ResponseAccept),
    /// See [`SnappyResponseAccept`].
    Snappy(SnappyResponseAccept),
}

impl ResponseAccept {
    /// Accept `response` with default local parameters.
    #[must_use]
    pub const fn new(response: &Response) -> Self {
        match response {
            Response::Deflate(r) => ResponseAccept::Deflate(DeflateResponseAccept::new(r)),
            #[cfg(feature = "bzip2")]
            Response::Bzip2(r) => ResponseAccept::Bzip2(Bzip2ResponseAccept::new(r)),
            Response::Snappy(r) => ResponseAccept::Snappy(SnappyResponseAccept::new(r)),
        }
    }

    /// The algorithm this accept is for.
    #[must_use]
    pub const fn algorithm(&self) -> Algorithm {
        match self {
            ResponseAccept::Deflate(_) => Algorithm::Deflate,
            #[cfg(feature = "bzip2")]
            ResponseAccept::Bzip2(_) => Algorithm::Bzip2,
            ResponseAccept::Snappy(_) => Algorithm::Snappy,
        }
    }

    /// The response this accept applies to.
    #[must_use]
    pub const fn response(&self) -> Response {
        match self {
            ResponseAccept::Deflate(a) => Response::Deflate(*a.response()),
            #[cfg(feature = "bzip2")]
            ResponseAccept::Bzip2(a) => Response::Bzip2(*a.response()),
            ResponseAccept::Snappy(a) => Response::Snappy(*a.response()),
        }
    }
}

impl From<DeflateResponseAccept> for ResponseAccept {
    fn from(accept: DeflateResponseAccept) -> Self {
        ResponseAccept::Deflate(accept)
    }
}

#[cfg(feature = "bzip2")]
impl From<Bzip2ResponseAccept> for ResponseAccept {
    fn from(accept: Bzip2ResponseAccept) -> Self {
        ResponseAccept::Bzip2(accept)
    }
}

impl From<SnappyResponseAccept> for ResponseAccept {
    fn from(accept: SnappyResponseAccept) -> Self {
        ResponseAccept::Snappy(accept)
    }
}

/// Build the client's `Sec-WebSocket-Extensions` request value, in
/// preference order.
#[must_use]
pub fn offer_header(offers: &[Offer]) -> String {
    let segments: Vec<Segment> = offers.iter().map(Offer::to_header_segment).collect();
    serialize(&segments)
}

/// Server policy that accepts every offer with default parameters.
#[must_use]
pub fn accept_any_offer(offer: &Offer) -> Option<OfferAccept> {
    Some(OfferAccept::new(offer))
}

/// Client policy that accepts every compatible response as is.
#[must_use]
pub fn accept_any_response(response: &Response) -> Option<ResponseAccept> {
    Some(ResponseAccept::new(response))
}
