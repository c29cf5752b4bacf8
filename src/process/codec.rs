//! Lossy UTF-8 chunk codec for child output pipes.
//!
//! Unlike a line codec, every read is surfaced immediately: prompts are
//! usually written without a trailing newline and must not sit in a buffer
//! waiting for one.
//!
//! A multi-byte sequence split across two reads is held back until the rest
//! arrives. Bytes that can never form valid UTF-8 become U+FFFD. At EOF any
//! incomplete tail is flushed lossily.

use bytes::{Buf, BytesMut};
use tokio_util::codec::Decoder;

use crate::{AppError, Result};

/// Streaming decoder yielding one `String` per readable chunk.
#[derive(Debug, Default)]
pub struct LossyUtf8Codec;

impl LossyUtf8Codec {
    /// Create a new codec.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Decoder for LossyUtf8Codec {
    type Item = String;
    type Error = AppError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        if src.is_empty() {
            return Ok(None);
        }

        let (text, consumed) = decode_prefix(src);
        src.advance(consumed);

        if text.is_empty() {
            // Only an incomplete sequence is buffered.
            Ok(None)
        } else {
            Ok(Some(text))
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        if let Some(text) = self.decode(src)? {
            return Ok(Some(text));
        }
        if src.is_empty() {
            return Ok(None);
        }

        let tail = String::from_utf8_lossy(src).into_owned();
        src.clear();
        Ok(Some(tail))
    }
}

/// Decode as much of `buf` as is decidable now.
///
/// Returns the text and the number of bytes it consumed. Trailing bytes that
/// may still become a valid character once more input arrives are left
/// unconsumed.
fn decode_prefix(buf: &[u8]) -> (String, usize) {
    let mut out = String::with_capacity(buf.len());
    let mut pos = 0;

    while pos < buf.len() {
        match std::str::from_utf8(&buf[pos..]) {
            Ok(valid) => {
                out.push_str(valid);
                pos = buf.len();
            }
            Err(err) => {
                let valid_end = pos + err.valid_up_to();
                out.push_str(&String::from_utf8_lossy(&buf[pos..valid_end]));
                match err.error_len() {
                    Some(bad) => {
                        out.push(char::REPLACEMENT_CHARACTER);
                        pos = valid_end + bad;
                    }
                    None => {
                        pos = valid_end;
                        break;
                    }
                }
            }
        }
    }

    (out, pos)
}
