//! Streaming UTF-8 decoder for transport reads
//!
//! Reads arrive in arbitrary chunks, so a multi-byte character can be split
//! across two reads. The decoder holds back an incomplete trailing sequence
//! until the next chunk completes it:
//! ```text
//! read 1: [ 'h' 'i' 0xC3 ]   -> "hi"     (0xC3 held back)
//! read 2: [ 0xA9 '!' ]       -> "é!"
//! ```
//! Bytes that can never form a valid character are replaced with U+FFFD.

use bytes::{Buf, BytesMut};

/// Decoder state for one session
#[derive(Debug, Default)]
pub struct Utf8ChunkDecoder {
    /// Bytes not yet emitted as text
    buffer: BytesMut,
}

impl Utf8ChunkDecoder {
    /// Create a new decoder
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(1024),
        }
    }

    /// Decode a chunk, returning all text that is complete so far
    pub fn decode(&mut self, chunk: &[u8]) -> String {
        self.buffer.extend_from_slice(chunk);
        let mut out = String::with_capacity(self.buffer.len());

        loop {
            match std::str::from_utf8(&self.buffer) {
                Ok(text) => {
                    out.push_str(text);
                    self.buffer.clear();
                    break;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&self.buffer[..valid]));

                    match e.error_len() {
                        Some(bad) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            self.buffer.advance(valid + bad);
                        }
                        None => {
                            // Incomplete sequence at the end: keep it for the next read
                            self.buffer.advance(valid);
                            break;
                        }
                    }
                }
            }
        }

        out
    }

    /// Flush held-back bytes at end of stream
    pub fn finish(&mut self) -> Option<String> {
        if self.buffer.is_empty() {
            return None;
        }
        let rest = String::from_utf8_lossy(&self.buffer).into_owned();
        self.buffer.clear();
        Some(rest)
    }
}
