//! Tests for HPACK encoding

use h2_engine::{Header, HpackDecoder, HpackEncoder};

#[test]
fn test_encode_indexed_header() {
    // Roundtrip: encode then decode, verify headers match
    let mut encoder = HpackEncoder::new();
    let mut decoder = HpackDecoder::new();

    let headers = vec![Header::new(":method", "GET")];
    let encoded = encoder.encode(&headers);
    let decoded = decoder.decode(&encoded).unwrap();

    assert_eq!(decoded.len(), 1);
    assert_eq!(decoded[0].name, ":method");
    assert_eq!(decoded[0].value, "GET");
}

#[test]
fn test_encode_literal_header() {
    let mut encoder = HpackEncoder::new();
    let mut decoder = HpackDecoder::new();

    let headers = vec![Header::new("x-custom", "value")];
    let encoded = encoder.encode(&headers);
    let decoded = decoder.decode(&encoded).unwrap();

    assert_eq!(decoded.len(), 1);
    assert_eq!(decoded[0].name, "x-custom");
    assert_eq!(decoded[0].value, "value");
}

#[test]
fn test_encode_decode_roundtrip() {
    // Mixed pseudo + regular headers, order preserved, repeats allowed
    let mut encoder = HpackEncoder::new();
    let mut decoder = HpackDecoder::new();

    let headers = vec![
        Header::new(":status", "200"),
        Header::new("content-type", "application/json"),
        Header::new("x-request-id", "abc-123-def"),
        Header::new("set-cookie", "session=xyz"),
        Header::new("set-cookie", "theme=dark"),
    ];

    let encoded = encoder.encode(&headers);
    let decoded = decoder.decode(&encoded).unwrap();

    assert_eq!(decoded, headers);
}

#[test]
fn test_encoder_state_persists_across_calls() {
    // The dynamic table carries over: a repeated literal gets smaller the
    // second time, and a fresh decoder that saw the first block decodes it.
    let mut encoder = HpackEncoder::new();
    let mut decoder = HpackDecoder::new();

    let headers = vec![Header::new("x-session-token", "0123456789abcdef")];
    let first = encoder.encode(&headers);
    let second = encoder.encode(&headers);

    assert!(second.len() < first.len());
    assert_eq!(decoder.decode(&first).unwrap(), headers);
    assert_eq!(decoder.decode(&second).unwrap(), headers);
}
