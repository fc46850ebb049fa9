// SPDX-License-Identifier: Apache-2.0

//! Character encodings of monitored files.
//!
//! Line splitting only needs to know the width of a code unit and its byte
//! order, so a newline can be found without decoding. Decoding to UTF-8
//! happens per line, after splitting.

use std::borrow::Cow;

use crate::error::{Error, Result};

/// Concrete encoding of a file's content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Utf8,
    Utf16Le,
    Utf16Be,
    Utf32Le,
    Utf32Be,
    /// Any other encoding known to `encoding_rs`. These all use single-byte
    /// line terminators.
    Other(&'static encoding_rs::Encoding),
}

/// Encoding as configured for an item: either a fixed encoding or detection
/// from the byte-order mark at the start of the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EncodingSpec {
    #[default]
    Auto,
    Fixed(Encoding),
}

const BOM_UTF8: &[u8] = &[0xEF, 0xBB, 0xBF];
const BOM_UTF16LE: &[u8] = &[0xFF, 0xFE];
const BOM_UTF16BE: &[u8] = &[0xFE, 0xFF];
const BOM_UTF32LE: &[u8] = &[0xFF, 0xFE, 0x00, 0x00];
const BOM_UTF32BE: &[u8] = &[0x00, 0x00, 0xFE, 0xFF];

/// Longest byte-order mark; the reader fetches this many bytes to detect one.
pub const MAX_BOM_LEN: usize = 4;

impl EncodingSpec {
    /// Resolve a configured encoding name. An empty name means auto-detect.
    pub fn from_name(name: &str) -> Result<Self> {
        let name = name.trim();
        if name.is_empty() {
            return Ok(EncodingSpec::Auto);
        }
        Encoding::from_name(name).map(EncodingSpec::Fixed)
    }

    /// Determine the encoding of a file from its first bytes. Returns the
    /// encoding and the length of the byte-order mark to skip, if any.
    pub fn resolve(&self, prefix: &[u8]) -> (Encoding, usize) {
        match self {
            EncodingSpec::Auto => detect_bom(prefix).unwrap_or((Encoding::Utf8, 0)),
            EncodingSpec::Fixed(encoding) => {
                let bom = encoding.bom();
                if !bom.is_empty() && prefix.starts_with(bom) {
                    (*encoding, bom.len())
                } else {
                    (*encoding, 0)
                }
            }
        }
    }
}

fn detect_bom(prefix: &[u8]) -> Option<(Encoding, usize)> {
    // UTF-32LE has to be checked before UTF-16LE, its mark is a prefix of it.
    [
        (BOM_UTF32LE, Encoding::Utf32Le),
        (BOM_UTF32BE, Encoding::Utf32Be),
        (BOM_UTF8, Encoding::Utf8),
        (BOM_UTF16LE, Encoding::Utf16Le),
        (BOM_UTF16BE, Encoding::Utf16Be),
    ]
    .into_iter()
    .find(|(bom, _)| prefix.starts_with(bom))
    .map(|(bom, encoding)| (encoding, bom.len()))
}

impl Encoding {
    /// Resolve an encoding name, case-insensitively.
    ///
    /// The UTF-16 and UTF-32 aliases used by log-monitoring agents are handled
    /// here. Anything else is looked up as a WHATWG label.
    pub fn from_name(name: &str) -> Result<Self> {
        let upper = name.trim().to_ascii_uppercase();
        let encoding = match upper.as_str() {
            "UTF-8" | "UTF8" => Encoding::Utf8,
            "UNICODE" | "UNICODELITTLE" | "UTF-16" | "UTF-16LE" | "UTF16" | "UTF16LE"
            | "UCS-2" | "UCS-2LE" => Encoding::Utf16Le,
            "UNICODEBIG" | "UNICODEFFFE" | "UTF-16BE" | "UTF16BE" | "UCS-2BE" => {
                Encoding::Utf16Be
            }
            "UTF-32" | "UTF-32LE" | "UTF32" | "UTF32LE" => Encoding::Utf32Le,
            "UTF-32BE" | "UTF32BE" => Encoding::Utf32Be,
            _ => match encoding_rs::Encoding::for_label(name.trim().as_bytes()) {
                Some(enc) if enc == encoding_rs::UTF_8 => Encoding::Utf8,
                Some(enc) if enc == encoding_rs::UTF_16LE => Encoding::Utf16Le,
                Some(enc) if enc == encoding_rs::UTF_16BE => Encoding::Utf16Be,
                Some(enc) if enc == encoding_rs::REPLACEMENT => {
                    return Err(Error::UnsupportedEncoding(name.to_string()));
                }
                Some(enc) => Encoding::Other(enc),
                None => return Err(Error::UnsupportedEncoding(name.to_string())),
            },
        };
        Ok(encoding)
    }

    /// Width in bytes of one code unit. Newlines are searched on unit
    /// boundaries only.
    pub fn unit_width(&self) -> usize {
        match self {
            Encoding::Utf16Le | Encoding::Utf16Be => 2,
            Encoding::Utf32Le | Encoding::Utf32Be => 4,
            Encoding::Utf8 | Encoding::Other(_) => 1,
        }
    }

    /// Line feed as encoded bytes.
    pub fn lf(&self) -> &'static [u8] {
        match self {
            Encoding::Utf16Le => b"\n\0",
            Encoding::Utf16Be => b"\0\n",
            Encoding::Utf32Le => b"\n\0\0\0",
            Encoding::Utf32Be => b"\0\0\0\n",
            Encoding::Utf8 | Encoding::Other(_) => b"\n",
        }
    }

    /// Carriage return as encoded bytes.
    pub fn cr(&self) -> &'static [u8] {
        match self {
            Encoding::Utf16Le => b"\r\0",
            Encoding::Utf16Be => b"\0\r",
            Encoding::Utf32Le => b"\r\0\0\0",
            Encoding::Utf32Be => b"\0\0\0\r",
            Encoding::Utf8 | Encoding::Other(_) => b"\r",
        }
    }

    /// Byte-order mark of this encoding, empty when it has none.
    pub fn bom(&self) -> &'static [u8] {
        match self {
            Encoding::Utf8 => BOM_UTF8,
            Encoding::Utf16Le => BOM_UTF16LE,
            Encoding::Utf16Be => BOM_UTF16BE,
            Encoding::Utf32Le => BOM_UTF32LE,
            Encoding::Utf32Be => BOM_UTF32BE,
            Encoding::Other(_) => &[],
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Encoding::Utf8 => "UTF-8",
            Encoding::Utf16Le => "UTF-16LE",
            Encoding::Utf16Be => "UTF-16BE",
            Encoding::Utf32Le => "UTF-32LE",
            Encoding::Utf32Be => "UTF-32BE",
            Encoding::Other(enc) => enc.name(),
        }
    }

    /// Decode bytes to UTF-8. Malformed sequences become U+FFFD; the flag is
    /// true when that happened.
    pub fn decode<'a>(&self, bytes: &'a [u8]) -> (Cow<'a, str>, bool) {
        match self {
            Encoding::Utf8 => encoding_rs::UTF_8.decode_without_bom_handling(bytes),
            Encoding::Utf16Le => encoding_rs::UTF_16LE.decode_without_bom_handling(bytes),
            Encoding::Utf16Be => encoding_rs::UTF_16BE.decode_without_bom_handling(bytes),
            Encoding::Utf32Le => decode_utf32(bytes, u32::from_le_bytes),
            Encoding::Utf32Be => decode_utf32(bytes, u32::from_be_bytes),
            Encoding::Other(enc) => enc.decode_without_bom_handling(bytes),
        }
    }
}

fn decode_utf32(bytes: &[u8], to_u32: fn([u8; 4]) -> u32) -> (Cow<'static, str>, bool) {
    let mut had_errors = false;
    let mut out = String::with_capacity(bytes.len() / 4);
    let mut chunks = bytes.chunks_exact(4);
    for chunk in &mut chunks {
        let unit = to_u32([chunk[0], chunk[1], chunk[2], chunk[3]]);
        match char::from_u32(unit) {
            Some(c) => out.push(c),
            None => {
                had_errors = true;
                out.push(char::REPLACEMENT_CHARACTER);
            }
        }
    }
    if !chunks.remainder().is_empty() {
        had_errors = true;
        out.push(char::REPLACEMENT_CHARACTER);
    }
    (Cow::Owned(out), had_errors)
}
