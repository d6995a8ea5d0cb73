//! Server and client halves of extension negotiation.
//!
//! The server walks the client's offers in wire order and settles on the
//! first one its policy accepts; offers it cannot parse are skipped. The
//! client validates the single segment the server echoed back against what
//! it offered; any disagreement aborts the handshake.

use crate::compression::Processor;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::extensions::header::{Segment, parse_header};
use crate::extensions::registry::{ExtensionEntry, ExtensionRegistry};
use crate::extensions::{Offer, OfferAccept, Response, ResponseAccept};

/// Outcome of a successful server-side negotiation.
#[derive(Debug)]
pub struct Negotiated {
    /// The response the server committed to.
    pub response: Response,
    /// The segment to put in the reply's `Sec-WebSocket-Extensions` header.
    pub header: Segment,
    /// Server-role processor for the connection.
    pub processor: Processor,
}

impl Negotiated {
    /// The reply header value.
    #[must_use]
    pub fn header_value(&self) -> String {
        self.header.to_string()
    }
}

/// Select at most one offer from `segments` and build the server processor.
///
/// Segments are visited in order. Unregistered names, unparsable parameters
/// and offers declined by `accept` are skipped. `Ok(None)` means the
/// connection proceeds without compression.
///
/// # Errors
///
/// Returns [`Error::Configuration`] if `accept` returns an accept that does
/// not belong to the offer it was given, or the processor error if the
/// chosen algorithm cannot be instantiated.
pub fn negotiate_offers<F>(
    registry: &ExtensionRegistry,
    segments: &[Segment],
    config: &Config,
    mut accept: F,
) -> Result<Option<Negotiated>>
where
    F: FnMut(&Offer) -> Option<OfferAccept>,
{
    select_offer(registry, segments, config, |_, offer| accept(offer))
}

/// [`negotiate_offers`] using each extension's registered
/// [`ExtensionEntry::accept_offer`] policy.
///
/// # Errors
///
/// See [`negotiate_offers`].
pub fn negotiate_offers_default(
    registry: &ExtensionRegistry,
    segments: &[Segment],
    config: &Config,
) -> Result<Option<Negotiated>> {
    select_offer(registry, segments, config, |entry, offer| {
        (entry.accept_offer)(offer)
    })
}

fn select_offer<F>(
    registry: &ExtensionRegistry,
    segments: &[Segment],
    config: &Config,
    mut accept: F,
) -> Result<Option<Negotiated>>
where
    F: FnMut(&ExtensionEntry, &Offer) -> Option<OfferAccept>,
{
    for segment in segments {
        let Some(entry) = registry.get(&segment.name) else {
            log::debug!("skipping unsupported extension offer {}", segment.name);
            continue;
        };

        let offer = match (entry.parse_offer)(&segment.params) {
            Ok(offer) => offer,
            Err(e) => {
                log::debug!("skipping invalid {} offer: {e}", segment.name);
                continue;
            }
        };

        let Some(chosen) = accept(entry, &offer) else {
            log::debug!("{} offer declined by accept policy", segment.name);
            continue;
        };

        if chosen.offer() != offer {
            return Err(Error::Configuration(format!(
                "accept for {} does not match the offer it was given",
                chosen.algorithm()
            )));
        }

        let processor = (entry.server_processor)(&chosen, config)?;
        let header = chosen.to_header_segment();
        log::debug!("negotiated {header}");
        return Ok(Some(Negotiated {
            response: chosen.response(),
            header,
            processor,
        }));
    }

    Ok(None)
}

/// [`negotiate_offers`] on a raw request header value.
///
/// A header that fails to parse is treated as if no extension was offered.
///
/// # Errors
///
/// See [`negotiate_offers`].
pub fn negotiate_offer_header<F>(
    registry: &ExtensionRegistry,
    header: &str,
    config: &Config,
    accept: F,
) -> Result<Option<Negotiated>>
where
    F: FnMut(&Offer) -> Option<OfferAccept>,
{
    match parse_header(header) {
        Ok(segments) => negotiate_offers(registry, &segments, config, accept),
        Err(e) => {
            log::debug!("ignoring malformed extension header: {e}");
            Ok(None)
        }
    }
}

/// [`negotiate_offers_default`] on a raw request header value.
///
/// # Errors
///
/// See [`negotiate_offers`].
pub fn negotiate_offer_header_default(
    registry: &ExtensionRegistry,
    header: &str,
    config: &Config,
) -> Result<Option<Negotiated>> {
    match parse_header(header) {
        Ok(segments) => negotiate_offers_default(registry, &segments, config),
        Err(e) => {
            log::debug!("ignoring malformed extension header: {e}");
            Ok(None)
        }
    }
}

/// Validate the server's reply against the offers we sent and build the
/// client processor.
///
/// No segment means the server declined compression (`Ok(None)`).
///
/// # Errors
///
/// Returns [`Error::Handshake`] when the reply holds more than one segment,
/// names an extension that was not offered, fails to parse, is
/// incompatible with every matching offer, or is declined by `accept`.
/// Returns [`Error::Configuration`] if `accept` returns an accept for a
/// different response.
pub fn negotiate_response<F>(
    registry: &ExtensionRegistry,
    offers: &[Offer],
    segments: &[Segment],
    config: &Config,
    mut accept: F,
) -> Result<Option<Processor>>
where
    F: FnMut(&Response) -> Option<ResponseAccept>,
{
    check_response(registry, offers, segments, config, |_, response| {
        accept(response)
    })
}

/// [`negotiate_response`] using the registered
/// [`ExtensionEntry::accept_response`] policy of the accepted extension.
///
/// # Errors
///
/// See [`negotiate_response`].
pub fn negotiate_response_default(
    registry: &ExtensionRegistry,
    offers: &[Offer],
    segments: &[Segment],
    config: &Config,
) -> Result<Option<Processor>> {
    check_response(registry, offers, segments, config, |entry, response| {
        (entry.accept_response)(response)
    })
}

fn check_response<F>(
    registry: &ExtensionRegistry,
    offers: &[Offer],
    segments: &[Segment],
    config: &Config,
    accept: F,
) -> Result<Option<Processor>>
where
    F: FnOnce(&ExtensionEntry, &Response) -> Option<ResponseAccept>,
{
    let segment = match segments {
        [] => return Ok(None),
        [segment] => segment,
        _ => {
            return Err(Error::Handshake(format!(
                "server accepted {} extensions, at most one allowed",
                segments.len()
            )));
        }
    };

    let entry = registry.get(&segment.name).ok_or_else(|| {
        Error::Handshake(format!("server accepted unknown extension {}", segment.name))
    })?;

    let mut candidates = offers
        .iter()
        .filter(|offer| offer.algorithm() == entry.algorithm)
        .peekable();
    if candidates.peek().is_none() {
        return Err(Error::Handshake(format!(
            "server accepted {} which was not offered",
            segment.name
        )));
    }

    let response = (entry.parse_response)(&segment.params)
        .map_err(|e| Error::Handshake(format!("invalid {} response: {e}", segment.name)))?;

    let mut last_err = None;
    let effective = candidates.find_map(|offer| match response.reconcile(offer) {
        Ok(effective) => Some(effective),
        Err(e) => {
            last_err = Some(e);
            None
        }
    });
    let Some(effective) = effective else {
        return Err(last_err.unwrap_or_else(|| {
            Error::Handshake(format!("{} response matches no offer", segment.name))
        }));
    };

    let Some(chosen) = accept(entry, &effective) else {
        return Err(Error::Handshake(format!(
            "{} response declined by accept policy",
            segment.name
        )));
    };
    if chosen.response() != effective {
        return Err(Error::Configuration(format!(
            "accept for {} does not match the response it was given",
            chosen.algorithm()
        )));
    }

    log::debug!("server accepted {segment}");
    (entry.client_processor)(&chosen, config).map(Some)
}

/// [`negotiate_response`] on the raw reply header value, if any.
///
/// # Errors
///
/// Returns [`Error::Handshake`] if the header fails to parse, plus
/// everything [`negotiate_response`] returns.
pub fn negotiate_response_header<F>(
    registry: &ExtensionRegistry,
    offers: &[Offer],
    header: Option<&str>,
    config: &Config,
    accept: F,
) -> Result<Option<Processor>>
where
    F: FnMut(&Response) -> Option<ResponseAccept>,
{
    let Some(header) = header else {
        return Ok(None);
    };
    let segments = parse_header(header)
        .map_err(|e| Error::Handshake(format!("malformed extension response: {e}")))?;
    negotiate_response(registry, offers, &segments, config, accept)
}

/// [`negotiate_response_default`] on the raw reply header value, if any.
///
/// # Errors
///
/// See [`negotiate_response_header`].
pub fn negotiate_response_header_default(
    registry: &ExtensionRegistry,
    offers: &[Offer],
    header: Option<&str>,
    config: &Config,
) -> Result<Option<Processor>> {
    let Some(header) = header else {
        return Ok(None);
    };
    let segments = parse_header(header)
        .map_err(|e| Error::Handshake(format!("malformed extension response: {e}")))?;
    negotiate_response_default(registry, offers, &segments, config)
}
