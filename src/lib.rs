//! # pmce - WebSocket per-message compression extensions
//!
//! `pmce` implements the negotiation and compression core of WebSocket
//! per-message compression (RFC 7692) for `permessage-deflate`, plus the
//! non-standard `permessage-bzip2` and `permessage-snappy` variants.
//!
//! ## Features
//!
//! - **Header parsing** of `Sec-WebSocket-Extensions` values
//! - **Typed value objects** for offers, responses and their accepts
//! - **Negotiation** on both the server and the client side
//! - **Streaming processors** honouring context takeover and window size
//! - **Framing glue** for RSV1 handling, fragmentation and traffic stats
//!
//! ## Quick Start
//!
//! ```rust
//! use pmce::extensions::{
//!     DeflateOffer, ExtensionRegistry, Offer, accept_any_offer, accept_any_response,
//!     negotiate_offer_header, negotiate_response_header, offer_header,
//! };
//! use pmce::{Config, Message, Role, Session};
//!
//! let config = Config::default();
//! let registry = ExtensionRegistry::global();
//!
//! // Client builds its offer header.
//! let offers = [Offer::from(DeflateOffer::new())];
//! let request = offer_header(&offers);
//!
//! // Server picks an offer and answers.
//! let negotiated = negotiate_offer_header(registry, &request, &config, accept_any_offer)
//!     .unwrap()
//!     .unwrap();
//! let reply = negotiated.header_value();
//!
//! // Client validates the answer.
//! let client_processor =
//!     negotiate_response_header(registry, &offers, Some(&reply), &config, accept_any_response)
//!         .unwrap();
//!
//! let mut server = Session::new(Role::Server, Some(negotiated.processor), &config);
//! let mut client = Session::new(Role::Client, client_processor, &config);
//!
//! let mut received = None;
//! for frame in client.send(&Message::text("hello hello hello")).unwrap() {
//!     assert!(frame.rsv1);
//!     received = server.receive(frame).unwrap();
//! }
//! assert_eq!(received, Some(Message::text("hello hello hello")));
//! ```

pub mod compression;
pub mod config;
pub mod connection;
pub mod error;
pub mod extensions;
pub mod message;
pub mod protocol;

pub use compression::{MessageCompressor, MessageDecompressor, Processor, ProcessorParams};
pub use config::{Config, Limits};
pub use connection::{
    MessageReader, MessageWriter, OctetCounter, Role, Session, StreamState, TrafficStats,
};
pub use error::{Error, ErrorKind, Result};
pub use extensions::{Algorithm, ExtensionRegistry, Offer, OfferAccept, Response, ResponseAccept};
pub use message::{CloseCode, Message};
pub use protocol::{Frame, OpCode};

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn test_public_types_are_send() {
        assert_send::<Error>();
        assert_send::<Config>();
        assert_send::<Limits>();
        assert_send::<Message>();
        assert_send::<CloseCode>();
        assert_send::<Role>();
        assert_send::<Offer>();
        assert_send::<Processor>();
        assert_send::<Session>();
        assert_send::<ExtensionRegistry>();
    }

    #[test]
    fn test_public_types_are_sync() {
        assert_sync::<Error>();
        assert_sync::<Config>();
        assert_sync::<Limits>();
        assert_sync::<Message>();
        assert_sync::<CloseCode>();
        assert_sync::<Role>();
        assert_sync::<Offer>();
        assert_sync::<ExtensionRegistry>();
    }
}
