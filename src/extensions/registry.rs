//! Registry of negotiable compression extensions, keyed by wire name.
//!
//! A registry is a plain value; [`ExtensionRegistry::global`] holds the
//! process-wide instance populated with every algorithm compiled into this
//! build. Callers that need a different set (tests, or a server that only
//! wants deflate) build their own and pass it to the negotiator.

use std::sync::OnceLock;

use crate::compression::Processor;
use crate::config::Config;
use crate::error::Result;
use crate::extensions::header::ParamMap;
use crate::extensions::{Algorithm, Offer, OfferAccept, Response, ResponseAccept};

/// Parses the parameters of an offer segment.
pub type ParseOfferFn = fn(&ParamMap) -> Result<Offer>;
/// Parses the parameters of a response segment.
pub type ParseResponseFn = fn(&ParamMap) -> Result<Response>;
/// Default server-side narrowing of an offer.
pub type AcceptOfferFn = fn(&Offer) -> Option<OfferAccept>;
/// Default client-side acceptance of a response.
pub type AcceptResponseFn = fn(&Response) -> Option<ResponseAccept>;
/// Builds the server's processor.
pub type ServerProcessorFn = fn(&OfferAccept, &Config) -> Result<Processor>;
/// Builds the client's processor.
pub type ClientProcessorFn = fn(&ResponseAccept, &Config) -> Result<Processor>;

/// Factories for one extension.
#[derive(Debug, Clone, Copy)]
pub struct ExtensionEntry {
    /// Algorithm the factories produce values for.
    pub algorithm: Algorithm,
    /// Offer factory.
    pub parse_offer: ParseOfferFn,
    /// Response factory.
    pub parse_response: ParseResponseFn,
    /// OfferAccept factory.
    pub accept_offer: AcceptOfferFn,
    /// ResponseAccept factory.
    pub accept_response: AcceptResponseFn,
    /// Processor factory for the server role.
    pub server_processor: ServerProcessorFn,
    /// Processor factory for the client role.
    pub client_processor: ClientProcessorFn,
}

impl ExtensionEntry {
    /// The built-in factories for `algorithm`.
    #[must_use]
    pub fn for_algorithm(algorithm: Algorithm) -> Self {
        let (parse_offer, parse_response): (ParseOfferFn, ParseResponseFn) = match algorithm {
            Algorithm::Deflate => (
                |p| Offer::parse(Algorithm::Deflate, p),
                |p| Response::parse(Algorithm::Deflate, p),
            ),
            Algorithm::Bzip2 => (
                |p| Offer::parse(Algorithm::Bzip2, p),
                |p| Response::parse(Algorithm::Bzip2, p),
            ),
            Algorithm::Snappy => (
                |p| Offer::parse(Algorithm::Snappy, p),
                |p| Response::parse(Algorithm::Snappy, p),
            ),
        };

        Self {
            algorithm,
            parse_offer,
            parse_response,
            accept_offer: super::accept_any_offer,
            accept_response: super::accept_any_response,
            server_processor: Processor::from_offer_accept,
            client_processor: Processor::from_response_accept,
        }
    }
}

/// Mapping from extension name to its factories.
///
/// Iteration order is registration order.
#[derive(Debug, Clone, Default)]
pub struct ExtensionRegistry {
    entries: Vec<(String, ExtensionEntry)>,
}

static GLOBAL: OnceLock<ExtensionRegistry> = OnceLock::new();

impl ExtensionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every algorithm compiled into this build.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        for algorithm in Algorithm::ALL {
            if algorithm.is_available() {
                registry.register(algorithm);
            }
        }
        registry
    }

    /// The process-wide registry, initialised with [`Self::with_defaults`]
    /// on first use.
    pub fn global() -> &'static ExtensionRegistry {
        GLOBAL.get_or_init(Self::with_defaults)
    }

    /// Register the built-in factories of `algorithm` under its wire name.
    pub fn register(&mut self, algorithm: Algorithm) {
        self.register_extension(algorithm.name(), ExtensionEntry::for_algorithm(algorithm));
    }

    /// Register `entry` under `name`, replacing any existing entry.
    pub fn register_extension(&mut self, name: &str, entry: ExtensionEntry) {
        let name = name.to_ascii_lowercase();
        log::trace!("registering extension {name} ({})", entry.algorithm);
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => *existing = entry,
            None => self.entries.push((name, entry)),
        }
    }

    /// Remove the entry registered under `name`.
    pub fn unregister(&mut self, name: &str) -> Option<ExtensionEntry> {
        let index = self
            .entries
            .iter()
            .position(|(n, _)| n.eq_ignore_ascii_case(name))?;
        Some(self.entries.remove(index).1)
    }

    /// Look up an extension by name (case-insensitive).
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ExtensionEntry> {
        self.entries
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, entry)| entry)
    }

    /// Registered names, in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    /// Number of registered extensions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no extension is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
