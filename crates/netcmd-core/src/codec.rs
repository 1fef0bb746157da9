//! Hex text <-> raw datagram bytes
//!
//! Command payloads are authored as hex text. Whitespace and the separators
//! `:`, `-` and `,` are ignored, digits are case-insensitive and must come in
//! pairs. Inbound bytes are rendered back as lowercase pairs joined by a
//! single space.

use std::fmt;
use std::ops::Deref;

use bytes::Bytes;

use crate::error::DecodeError;

/// Raw bytes of a command, exactly as they go on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Payload(Bytes);

impl Payload {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Display form used in log lines
    pub fn to_hex(&self) -> String {
        decode(&self.0)
    }
}

impl Deref for Payload {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.0
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Self(Bytes::from(bytes))
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

fn is_separator(c: char) -> bool {
    c.is_whitespace() || matches!(c, ':' | '-' | ',')
}

/// Parse hex text into a payload.
///
/// Empty (or separator-only) input yields an empty payload. The digit count
/// is checked before the alphabet, so `"zzz"` is an odd-length error.
pub fn encode(text: &str) -> Result<Payload, DecodeError> {
    let mut digits = String::with_capacity(text.len());
    // Position in `text` of every kept digit
    let mut positions = Vec::with_capacity(text.len());

    for (position, character) in text.chars().enumerate() {
        if is_separator(character) {
            continue;
        }
        // hex indexes bytes, so multi-byte characters are rejected up front
        if !character.is_ascii() {
            return Err(DecodeError::InvalidCharacter { character, position });
        }
        digits.push(character);
        positions.push(position);
    }

    hex::decode(&digits)
        .map(Payload::from)
        .map_err(|err| match err {
            hex::FromHexError::InvalidHexCharacter { c, index } => DecodeError::InvalidCharacter {
                character: c,
                position: positions.get(index).copied().unwrap_or(index),
            },
            hex::FromHexError::OddLength | hex::FromHexError::InvalidStringLength => {
                DecodeError::OddLength {
                    digits: digits.len(),
                }
            }
        })
}

/// Render bytes as `"a0 b1 c2"`.
pub fn decode(bytes: &[u8]) -> String {
    let digits = hex::encode(bytes);
    let mut out = String::with_capacity(digits.len() + bytes.len());

    for (i, pair) in digits.as_bytes().chunks(2).enumerate() {
        if i > 0 {
            out.push(' ');
        }
        out.extend(pair.iter().map(|&b| b as char));
    }

    out
}
