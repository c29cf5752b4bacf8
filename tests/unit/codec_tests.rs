//! Unit tests for the lossy UTF-8 chunk decoder.
//!
//! Covers:
//! - a complete chunk is emitted as-is
//! - a multi-byte character split across reads is held back, then joined
//! - undecodable bytes become U+FFFD instead of failing the stream
//! - a dangling partial sequence at EOF is flushed lossily

use bytes::BytesMut;
use tokio_util::codec::Decoder;

use exec_bridge::process::codec::LossyUtf8Codec;

#[test]
fn complete_chunk_is_emitted_unchanged() {
    let mut codec = LossyUtf8Codec::new();
    let mut buf = BytesMut::from("Age: ");

    let decoded = codec.decode(&mut buf).expect("decode");

    assert_eq!(decoded.as_deref(), Some("Age: "));
    assert!(buf.is_empty());
}

#[test]
fn empty_buffer_yields_nothing() {
    let mut codec = LossyUtf8Codec::new();
    let mut buf = BytesMut::new();

    assert_eq!(codec.decode(&mut buf).expect("decode"), None);
}

#[test]
fn split_multibyte_character_is_reassembled() {
    let mut codec = LossyUtf8Codec::new();
    let bytes = "héllo".as_bytes();
    // 'é' is two bytes; cut after its first byte.
    let mut buf = BytesMut::from(&bytes[..2]);

    let first = codec.decode(&mut buf).expect("decode first");
    assert_eq!(first.as_deref(), Some("h"));
    assert_eq!(buf.len(), 1, "lead byte must stay buffered");

    buf.extend_from_slice(&bytes[2..]);
    let second = codec.decode(&mut buf).expect("decode second");
    assert_eq!(second.as_deref(), Some("éllo"));
}

#[test]
fn lone_partial_sequence_waits_for_more_bytes() {
    let mut codec = LossyUtf8Codec::new();
    let mut buf = BytesMut::from(&"€".as_bytes()[..2]);

    assert_eq!(codec.decode(&mut buf).expect("decode"), None);
    assert_eq!(buf.len(), 2);
}

#[test]
fn invalid_bytes_are_replaced() {
    let mut codec = LossyUtf8Codec::new();
    let mut buf = BytesMut::from(&b"ok\xffdone"[..]);

    let decoded = codec.decode(&mut buf).expect("decode").expect("some text");

    assert_eq!(decoded, "ok\u{FFFD}done");
}

#[test]
fn dangling_sequence_is_flushed_at_eof() {
    let mut codec = LossyUtf8Codec::new();
    let mut buf = BytesMut::from(&b"end\xe2\x82"[..]);

    let first = codec.decode_eof(&mut buf).expect("decode_eof");
    assert_eq!(first.as_deref(), Some("end"));

    let rest = codec.decode_eof(&mut buf).expect("decode_eof").expect("tail");
    assert!(rest.contains('\u{FFFD}'));
    assert!(buf.is_empty());
    assert_eq!(codec.decode_eof(&mut buf).expect("decode_eof"), None);
}
