use std::fmt::{self, Debug, Display};
use std::str::FromStr;

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use serde::{Serialize, Serializer};
use thiserror::Error;

/// A GUID held in canonical (RFC 4122, big-endian) byte order.
///
/// GPT stores GUIDs the way the UEFI `EFI_GUID` struct lays them out in memory: the first three
/// fields (`u32`, `u16`, `u16`) little-endian, the trailing eight bytes as-is. Use
/// [`Guid::from_gpt_bytes`] and [`Guid::to_gpt_bytes`] to cross that boundary.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Guid([u8; 16]);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GuidParseError {
    #[error("GUID `{input}` must be 36 characters in 8-4-4-4-12 form")]
    InvalidLength { input: String },
    #[error("GUID `{input}` has a misplaced `-` or an invalid hex digit at position {position}")]
    InvalidCharacter { input: String, position: usize },
}

impl Guid {
    pub const ZERO: Guid = Guid([0; 16]);

    /// Wraps bytes that are already in canonical order.
    pub const fn from_bytes(bytes: [u8; 16]) -> Guid {
        Guid(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// Decodes the 16-byte mixed-endian on-disk representation.
    pub fn from_gpt_bytes(raw: &[u8; 16]) -> Guid {
        let mut canonical = [0_u8; 16];
        BigEndian::write_u32(&mut canonical[0..4], LittleEndian::read_u32(&raw[0..4]));
        BigEndian::write_u16(&mut canonical[4..6], LittleEndian::read_u16(&raw[4..6]));
        BigEndian::write_u16(&mut canonical[6..8], LittleEndian::read_u16(&raw[6..8]));
        canonical[8..16].copy_from_slice(&raw[8..16]);
        Guid(canonical)
    }

    /// Inverse of [`Guid::from_gpt_bytes`].
    pub fn to_gpt_bytes(&self) -> [u8; 16] {
        let mut raw = [0_u8; 16];
        LittleEndian::write_u32(&mut raw[0..4], BigEndian::read_u32(&self.0[0..4]));
        LittleEndian::write_u16(&mut raw[4..6], BigEndian::read_u16(&self.0[4..6]));
        LittleEndian::write_u16(&mut raw[6..8], BigEndian::read_u16(&self.0[6..8]));
        raw[8..16].copy_from_slice(&self.0[8..16]);
        raw
    }

    /// Unused partition entries carry an all-zero type GUID.
    pub fn is_zero(&self) -> bool {
        self.0 == [0; 16]
    }
}

impl Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let b = &self.0;
        write!(
            f,
            "{:02X}{:02X}{:02X}{:02X}-{:02X}{:02X}-{:02X}{:02X}-{:02X}{:02X}-{:02X}{:02X}{:02X}{:02X}{:02X}{:02X}",
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
            b[8], b[9], b[10], b[11], b[12], b[13], b[14], b[15]
        )
    }
}

impl Debug for Guid {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        Display::fmt(self, f)
    }
}

impl FromStr for Guid {
    type Err = GuidParseError;

    /// Accepts `XXXXXXXX-XXXX-XXXX-XXXX-XXXXXXXXXXXX` in either case, optionally wrapped in `{}`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s
            .strip_prefix('{')
            .and_then(|rest| rest.strip_suffix('}'))
            .unwrap_or(s);

        let chars = trimmed.as_bytes();
        if chars.len() != 36 {
            return Err(GuidParseError::InvalidLength {
                input: s.to_owned(),
            });
        }

        let invalid = |position: usize| GuidParseError::InvalidCharacter {
            input: s.to_owned(),
            position,
        };

        let mut bytes = [0_u8; 16];
        let mut nibbles = 0;
        for (position, &c) in chars.iter().enumerate() {
            if matches!(position, 8 | 13 | 18 | 23) {
                if c != b'-' {
                    return Err(invalid(position));
                }
                continue;
            }

            let value = (c as char).to_digit(16).ok_or_else(|| invalid(position))? as u8;
            bytes[nibbles / 2] |= if nibbles % 2 == 0 { value << 4 } else { value };
            nibbles += 1;
        }

        Ok(Guid(bytes))
    }
}

impl Serialize for Guid {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
