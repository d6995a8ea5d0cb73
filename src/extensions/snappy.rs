//! `permessage-snappy` negotiation. The extension carries no parameters.

use crate::error::Result;
use crate::extensions::header::{ParamMap, Segment};
use crate::extensions::params::unknown;

/// Registered extension name.
pub const EXTENSION_NAME: &str = "permessage-snappy";

fn reject_params(params: &ParamMap) -> Result<()> {
    match params.iter().next() {
        Some((name, _)) => Err(unknown(EXTENSION_NAME, name)),
        None => Ok(()),
    }
}

/// A client's `permessage-snappy` offer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct SnappyOffer;

impl SnappyOffer {
    /// Parse offer parameters; any parameter is an error.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`](crate::Error::Parse) if a parameter is present.
    pub fn parse(params: &ParamMap) -> Result<Self> {
        reject_params(params)?;
        Ok(Self)
    }

    /// The header segment announcing this offer.
    #[must_use]
    pub fn to_header_segment(&self) -> Segment {
        Segment::new(EXTENSION_NAME)
    }
}

/// A server's acceptance of a [`SnappyOffer`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct SnappyOfferAccept {
    offer: SnappyOffer,
}

impl SnappyOfferAccept {
    /// Accept `offer`.
    #[must_use]
    pub const fn new(offer: &SnappyOffer) -> Self {
        Self { offer: *offer }
    }

    /// The accepted offer.
    #[must_use]
    pub const fn offer(&self) -> &SnappyOffer {
        &self.offer
    }

    /// The response the server sends for this accept.
    #[must_use]
    pub const fn response(&self) -> SnappyResponse {
        SnappyResponse
    }

    /// The response header segment.
    #[must_use]
    pub fn to_header_segment(&self) -> Segment {
        Segment::new(EXTENSION_NAME)
    }
}

/// A server's `permessage-snappy` response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct SnappyResponse;

impl SnappyResponse {
    /// Parse response parameters; any parameter is an error.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`](crate::Error::Parse) if a parameter is present.
    pub fn parse(params: &ParamMap) -> Result<Self> {
        reject_params(params)?;
        Ok(Self)
    }

    /// Always compatible: there is nothing to disagree on.
    ///
    /// # Errors
    ///
    /// Never fails; returns `Result` for symmetry with the other algorithms.
    pub fn reconcile(&self, _offer: &SnappyOffer) -> Result<Self> {
        Ok(*self)
    }

    /// The header segment carrying this response.
    #[must_use]
    pub fn to_header_segment(&self) -> Segment {
        Segment::new(EXTENSION_NAME)
    }
}

/// A client's acceptance of a [`SnappyResponse`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct SnappyResponseAccept {
    response: SnappyResponse,
}

impl SnappyResponseAccept {
    /// Accept `response`.
    #[must_use]
    pub const fn new(response: &SnappyResponse) -> Self {
        Self {
            response: *response,
        }
    }

    /// The accepted response.
    #[must_use]
    pub const fn response(&self) -> &SnappyResponse {
        &self.response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extensions::header::parse_header;

    #[test]
    fn test_parse_rejects_params() {
        let segment = parse_header("permessage-snappy; level=3").unwrap().remove(0);
        assert!(SnappyOffer::parse(&segment.params).is_err());
        assert!(SnappyResponse::parse(&segment.params).is_err());
    }

    #[test]
    fn test_header() {
        let segment = parse_header("permessage-snappy").unwrap().remove(0);
        let offer = SnappyOffer::parse(&segment.params).unwrap();
        assert_eq!(offer.to_header_segment().to_string(), "permessage-snappy");
        assert_eq!(
            SnappyOfferAccept::new(&offer).to_header_segment().to_string(),
            "permessage-snappy"
        );
    }
}
