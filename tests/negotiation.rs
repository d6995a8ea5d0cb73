//! End-to-end negotiation and transfer tests.
//!
//! Each test drives both endpoints through the public API: the client builds
//! an offer header, the server negotiates, the client validates the reply and
//! messages flow through the resulting processors.

use pmce::extensions::{
    Algorithm, DeflateOffer, DeflateOfferAccept, ExtensionRegistry, Offer, OfferAccept,
    accept_any_offer, accept_any_response, negotiate_offer_header, negotiate_response_header,
    offer_header, parse_header,
};
use pmce::{Config, Error, ErrorKind, Message, OpCode, Processor, Role, Session};

/// Route `log` output through the test harness; `RUST_LOG=debug` shows
/// negotiation decisions.
fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn deflate_only() -> ExtensionRegistry {
    init_logging();
    let mut registry = ExtensionRegistry::new();
    registry.register(Algorithm::Deflate);
    registry
}

fn compress(processor: &mut Processor, data: &[u8]) -> Vec<u8> {
    processor.start_compress_message().unwrap();
    let mut out = processor.compress_message_data(data).unwrap();
    out.extend(processor.end_compress_message().unwrap());
    out
}

fn decompress(processor: &mut Processor, data: &[u8]) -> Vec<u8> {
    processor.start_decompress_message().unwrap();
    let mut out = processor.decompress_message_data(data).unwrap();
    out.extend(processor.end_decompress_message().unwrap());
    out
}

#[test]
fn test_server_caps_client_window() {
    let registry = deflate_only();
    let config = Config::default();
    let offers = [Offer::from(
        DeflateOffer::new().with_accept_no_context_takeover(false),
    )];
    let request = offer_header(&offers);
    assert_eq!(request, "permessage-deflate; client_max_window_bits");

    let negotiated = negotiate_offer_header(&registry, &request, &config, |offer| {
        let Offer::Deflate(offer) = offer else {
            return None;
        };
        DeflateOfferAccept::new(offer)
            .with_request_max_window_bits(10)
            .and_then(|accept| accept.with_window_bits(10))
            .ok()
            .map(OfferAccept::from)
    })
    .unwrap()
    .unwrap();
    let reply = negotiated.header_value();
    assert_eq!(reply, "permessage-deflate; client_max_window_bits=10");

    let mut client =
        negotiate_response_header(&registry, &offers, Some(&reply), &config, accept_any_response)
            .unwrap()
            .unwrap();
    let mut server = negotiated.processor;

    let message = vec![0u8; 256];
    let compressed = compress(&mut client, &message);
    assert!(compressed.len() <= 20, "{} bytes", compressed.len());
    assert_eq!(decompress(&mut server, &compressed), message);

    let compressed = compress(&mut server, &message);
    assert!(compressed.len() <= 20, "{} bytes", compressed.len());
    assert_eq!(decompress(&mut client, &compressed), message);
}

#[test]
fn test_unregistered_algorithm_is_skipped() {
    let registry = deflate_only();
    let negotiated = negotiate_offer_header(
        &registry,
        "permessage-bzip2, permessage-deflate",
        &Config::default(),
        accept_any_offer,
    )
    .unwrap()
    .unwrap();
    assert_eq!(negotiated.header_value(), "permessage-deflate");
    assert_eq!(negotiated.processor.algorithm(), Algorithm::Deflate);
    assert_eq!(negotiated.processor.role(), Role::Server);
}

#[test]
fn test_server_no_context_takeover_resets_per_message() {
    let registry = deflate_only();
    let mut negotiated = negotiate_offer_header(
        &registry,
        "permessage-deflate; server_no_context_takeover",
        &Config::default(),
        accept_any_offer,
    )
    .unwrap()
    .unwrap();
    assert_eq!(
        negotiated.header_value(),
        "permessage-deflate; server_no_context_takeover"
    );

    let message: Vec<u8> = b"The quick brown fox jumps over the lazy dog. "
        .iter()
        .copied()
        .cycle()
        .take(1024)
        .collect();
    let first = compress(&mut negotiated.processor, &message);
    let second = compress(&mut negotiated.processor, &message);
    assert_eq!(first.len(), second.len());
    assert_eq!(first, second);
}

#[test]
fn test_repeated_parameter_skips_offer() {
    let registry = deflate_only();
    let negotiated = negotiate_offer_header(
        &registry,
        "permessage-deflate; server_max_window_bits=15; server_max_window_bits=14",
        &Config::default(),
        accept_any_offer,
    )
    .unwrap();
    assert!(negotiated.is_none());

    // The connection then runs uncompressed.
    let config = Config::default();
    let mut client = Session::new(Role::Client, None, &config);
    let mut server = Session::new(Role::Server, None, &config);
    let frames = client.send(&Message::text("plain")).unwrap();
    assert!(!frames[0].rsv1);
    assert_eq!(
        server.receive(frames[0].clone()).unwrap(),
        Some(Message::text("plain"))
    );
}

#[test]
fn test_unsolicited_response_fails_handshake() {
    let registry = deflate_only();
    let err = negotiate_response_header(
        &registry,
        &[],
        Some("permessage-deflate"),
        &Config::default(),
        accept_any_response,
    )
    .unwrap_err();
    assert!(matches!(err, Error::Handshake(_)));
    assert_eq!(err.kind(), ErrorKind::Handshake);
}

#[test]
fn test_live_connection_with_context_takeover() {
    init_logging();
    let registry = ExtensionRegistry::with_defaults();
    let config = Config::default().with_fragment_size(4);
    let offers = [Offer::from(DeflateOffer::new())];

    let negotiated =
        negotiate_offer_header(&registry, &offer_header(&offers), &config, accept_any_offer)
            .unwrap()
            .unwrap();
    let response = negotiated.response;
    let Some(client_processor) = negotiate_response_header(
        &registry,
        &offers,
        Some(&negotiated.header_value()),
        &config,
        accept_any_response,
    )
    .unwrap() else {
        panic!("client rejected the negotiated extension");
    };
    assert!(!client_processor.params().no_context_takeover(Role::Client));
    assert_eq!(response.algorithm(), Algorithm::Deflate);

    let mut client = Session::new(Role::Client, Some(client_processor), &config);
    let mut server = Session::new(Role::Server, Some(negotiated.processor), &config);

    let data = b"hello".repeat(1000);
    for _ in 0..2 {
        let message = Message::binary(data.clone());
        let frames = client.send(&message).unwrap();
        assert!(frames.len() > 1);
        assert!(frames[0].rsv1);
        assert_eq!(frames[0].opcode, OpCode::Binary);
        assert!(frames[1..].iter().all(|f| !f.rsv1));
        assert!(frames[1..].iter().all(|f| f.opcode == OpCode::Continuation));

        let mut received = None;
        for frame in frames {
            received = server.receive(frame).unwrap();
        }
        assert_eq!(received, Some(message));
    }

    let stats = client.stats();
    assert_eq!(stats.outgoing.messages, 2);
    assert_eq!(stats.outgoing.app_octets, 10_000);
    assert_eq!(server.stats().incoming, stats.outgoing);
}

#[test]
fn test_offer_header_round_trips_through_parser() {
    let offers = [
        Offer::from(
            DeflateOffer::new()
                .with_request_no_context_takeover(true)
                .with_request_max_window_bits(12)
                .unwrap(),
        ),
        Offer::from(DeflateOffer::new()),
    ];
    let header = offer_header(&offers);
    let segments = parse_header(&header).unwrap();
    assert_eq!(segments.len(), 2);
    for (segment, offer) in segments.iter().zip(&offers) {
        assert_eq!(&Offer::parse(Algorithm::Deflate, &segment.params).unwrap(), offer);
    }
}

#[cfg(feature = "bzip2")]
#[test]
fn test_bzip2_fallback_when_deflate_missing() {
    init_logging();
    let mut registry = ExtensionRegistry::new();
    registry.register(Algorithm::Bzip2);
    let config = Config::default();

    let negotiated = negotiate_offer_header(
        &registry,
        "permessage-deflate, permessage-bzip2; server_max_compress_level=6",
        &config,
        accept_any_offer,
    )
    .unwrap()
    .unwrap();
    assert_eq!(
        negotiated.header_value(),
        "permessage-bzip2; server_max_compress_level=6"
    );

    let offers = [Offer::parse(
        Algorithm::Bzip2,
        &parse_header("permessage-bzip2; server_max_compress_level=6").unwrap()[0].params,
    )
    .unwrap()];
    let client = negotiate_response_header(
        &registry,
        &offers,
        Some(&negotiated.header_value()),
        &config,
        accept_any_response,
    )
    .unwrap();

    let mut server = Session::new(Role::Server, Some(negotiated.processor), &config);
    let mut client = Session::new(Role::Client, client, &config);
    let message = Message::text("bzip2 ".repeat(500));
    let mut received = None;
    for frame in server.send(&message).unwrap() {
        received = client.receive(frame).unwrap();
    }
    assert_eq!(received, Some(message));
}

#[cfg(feature = "snappy")]
#[test]
fn test_snappy_negotiation() {
    init_logging();
    let registry = ExtensionRegistry::with_defaults();
    let config = Config::default();
    let offers = [Offer::from(pmce::extensions::SnappyOffer)];

    let negotiated =
        negotiate_offer_header(&registry, &offer_header(&offers), &config, accept_any_offer)
            .unwrap()
            .unwrap();
    assert_eq!(negotiated.header_value(), "permessage-snappy");

    let client = negotiate_response_header(
        &registry,
        &offers,
        Some("permessage-snappy"),
        &config,
        accept_any_response,
    )
    .unwrap();
    let mut client = Session::new(Role::Client, client, &config);
    let mut server = Session::new(Role::Server, Some(negotiated.processor), &config);

    let message = Message::binary(vec![7u8; 4096]);
    let mut received = None;
    for frame in client.send(&message).unwrap() {
        received = server.receive(frame).unwrap();
    }
    assert_eq!(received, Some(message));
}
