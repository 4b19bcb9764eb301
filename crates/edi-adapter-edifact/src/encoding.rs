//! Byte-order-mark sniffing and streaming character decoding
//!
//! An interchange either starts with a byte-order mark, which fixes the
//! charset, or with the ASCII literal `UNA`/`UNB` (possibly after leading
//! whitespace), in which case the charset is taken from the syntax
//! identifier in the UNB header.

use edi_ir::Location;
use edi_validation::{ErrorKind, ParseError};
use encoding_rs::{DecoderResult, Encoding};
use serde::Serialize;
use std::fmt;

/// Character sets an interchange can be written in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Charset {
    Ascii,
    Latin1,
    Latin2,
    Latin3,
    Latin4,
    Cyrillic,
    Arabic,
    Greek,
    Hebrew,
    Latin5,
    Utf8,
    Utf16Le,
    Utf16Be,
    Utf32Le,
    Utf32Be,
    Gb18030,
    Utf7,
    Utf1,
    UtfEbcdic,
    Scsu,
    Bocu1,
}

impl Charset {
    /// Conventional charset label
    pub fn name(self) -> &'static str {
        match self {
            Charset::Ascii => "US-ASCII",
            Charset::Latin1 => "ISO-8859-1",
            Charset::Latin2 => "ISO-8859-2",
            Charset::Latin3 => "ISO-8859-3",
            Charset::Latin4 => "ISO-8859-4",
            Charset::Cyrillic => "ISO-8859-5",
            Charset::Arabic => "ISO-8859-6",
            Charset::Greek => "ISO-8859-7",
            Charset::Hebrew => "ISO-8859-8",
            Charset::Latin5 => "ISO-8859-9",
            Charset::Utf8 => "UTF-8",
            Charset::Utf16Le => "UTF-16LE",
            Charset::Utf16Be => "UTF-16BE",
            Charset::Utf32Le => "UTF-32LE",
            Charset::Utf32Be => "UTF-32BE",
            Charset::Gb18030 => "GB18030",
            Charset::Utf7 => "UTF-7",
            Charset::Utf1 => "UTF-1",
            Charset::UtfEbcdic => "UTF-EBCDIC",
            Charset::Scsu => "SCSU",
            Charset::Bocu1 => "BOCU-1",
        }
    }

    /// Whether a decoder exists for this charset
    pub fn is_supported(self) -> bool {
        CharDecoder::new(self).is_some()
    }

    fn encoding(self) -> Option<&'static Encoding> {
        Some(match self {
            Charset::Latin2 => encoding_rs::ISO_8859_2,
            Charset::Latin3 => encoding_rs::ISO_8859_3,
            Charset::Latin4 => encoding_rs::ISO_8859_4,
            Charset::Cyrillic => encoding_rs::ISO_8859_5,
            Charset::Arabic => encoding_rs::ISO_8859_6,
            Charset::Greek => encoding_rs::ISO_8859_7,
            Charset::Hebrew => encoding_rs::ISO_8859_8,
            // the WHATWG label for ISO-8859-9
            Charset::Latin5 => encoding_rs::WINDOWS_1254,
            Charset::Utf8 => encoding_rs::UTF_8,
            Charset::Utf16Le => encoding_rs::UTF_16LE,
            Charset::Utf16Be => encoding_rs::UTF_16BE,
            Charset::Gb18030 => encoding_rs::GB18030,
            _ => return None,
        })
    }
}

impl fmt::Display for Charset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Byte-order marks, longest signature first so UTF-32LE wins over UTF-16LE
pub const BOM_TABLE: &[(&[u8], Charset)] = &[
    (&[0x00, 0x00, 0xFE, 0xFF], Charset::Utf32Be),
    (&[0xFF, 0xFE, 0x00, 0x00], Charset::Utf32Le),
    (&[0xDD, 0x73, 0x66, 0x73], Charset::UtfEbcdic),
    (&[0x84, 0x31, 0x95, 0x33], Charset::Gb18030),
    (&[0xEF, 0xBB, 0xBF], Charset::Utf8),
    (&[0x2B, 0x2F, 0x76], Charset::Utf7),
    (&[0xF7, 0x64, 0x4C], Charset::Utf1),
    (&[0x0E, 0xFE, 0xFF], Charset::Scsu),
    (&[0xFB, 0xEE, 0x28], Charset::Bocu1),
    (&[0xFE, 0xFF], Charset::Utf16Be),
    (&[0xFF, 0xFE], Charset::Utf16Le),
];

/// Number of leading bytes inspected for a byte-order mark
pub const BOM_PROBE_LEN: usize = 8;

/// Outcome of sniffing the start of a stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sniffed {
    /// Charset announced by a byte-order mark; `None` defers to the header
    pub charset: Option<Charset>,
    /// Length of the byte-order mark
    pub bom_len: usize,
    /// Byte offset where structural reading resumes
    pub resume_offset: usize,
}

/// Find a byte-order mark at the start of `prefix`
pub fn detect_bom(prefix: &[u8]) -> Option<(Charset, usize)> {
    let probe = &prefix[..prefix.len().min(BOM_PROBE_LEN)];
    BOM_TABLE
        .iter()
        .find(|(signature, _)| probe.starts_with(signature))
        .map(|(signature, charset)| (*charset, signature.len()))
}

/// Determine how the stream starting with `prefix` is encoded
///
/// # Errors
///
/// `UNKNOWN_ENCODING` when there is neither a byte-order mark nor an
/// `UNA`/`UNB` literal after leading whitespace, and `UNSUPPORTED_ENCODING`
/// for a byte-order mark without a decoder.
pub fn sniff(prefix: &[u8]) -> std::result::Result<Sniffed, ParseError> {
    if let Some((charset, bom_len)) = detect_bom(prefix) {
        if !charset.is_supported() {
            return Err(ParseError::new(ErrorKind::UnsupportedEncoding)
                .at(Location::start())
                .with_data(charset.name()));
        }
        return Ok(Sniffed {
            charset: Some(charset),
            bom_len,
            resume_offset: bom_len,
        });
    }

    let start = prefix
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(prefix.len());
    let rest = &prefix[start..];
    if rest.starts_with(b"UNA") || rest.starts_with(b"UNB") {
        return Ok(Sniffed {
            charset: None,
            bom_len: 0,
            resume_offset: start,
        });
    }

    let found: String = rest.iter().take(3).map(|&b| char::from(b)).collect();
    Err(ParseError::new(ErrorKind::UnknownEncoding)
        .at(Location::start())
        .with_data(found.escape_default().to_string()))
}

/// A byte sequence that is not valid in the decoder's charset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Malformed;

enum Inner {
    Latin1,
    Utf32 { big_endian: bool, pending: Vec<u8> },
    Rs(encoding_rs::Decoder),
}

/// Incremental decoder from bytes to text
pub struct CharDecoder {
    charset: Charset,
    inner: Inner,
}

impl fmt::Debug for CharDecoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CharDecoder")
            .field("charset", &self.charset)
            .finish_non_exhaustive()
    }
}

impl CharDecoder {
    /// Decoder for `charset`, or `None` when it cannot be decoded
    ///
    /// US-ASCII is decoded one byte per character like Latin-1; characters
    /// outside the level's repertoire are rejected by strict mode instead.
    pub fn new(charset: Charset) -> Option<Self> {
        let inner = match charset {
            Charset::Ascii | Charset::Latin1 => Inner::Latin1,
            Charset::Utf32Le => Inner::Utf32 {
                big_endian: false,
                pending: Vec::with_capacity(4),
            },
            Charset::Utf32Be => Inner::Utf32 {
                big_endian: true,
                pending: Vec::with_capacity(4),
            },
            other => Inner::Rs(other.encoding()?.new_decoder_without_bom_handling()),
        };
        Some(Self { charset, inner })
    }

    pub fn charset(&self) -> Charset {
        self.charset
    }

    /// Decode `input`, appending to `out`
    ///
    /// `last` marks the end of the stream; an incomplete trailing sequence
    /// is then malformed. Characters decoded before a malformed sequence are
    /// still appended.
    pub fn decode(
        &mut self,
        input: &[u8],
        last: bool,
        out: &mut String,
    ) -> std::result::Result<(), Malformed> {
        match &mut self.inner {
            Inner::Latin1 => {
                out.extend(input.iter().map(|&b| char::from(b)));
                Ok(())
            }
            Inner::Utf32 {
                big_endian,
                pending,
            } => {
                for &byte in input {
                    pending.push(byte);
                    if pending.len() == 4 {
                        let bytes = [pending[0], pending[1], pending[2], pending[3]];
                        pending.clear();
                        let scalar = if *big_endian {
                            u32::from_be_bytes(bytes)
                        } else {
                            u32::from_le_bytes(bytes)
                        };
                        out.push(char::from_u32(scalar).ok_or(Malformed)?);
                    }
                }
                if last && !pending.is_empty() {
                    return Err(Malformed);
                }
                Ok(())
            }
            Inner::Rs(decoder) => {
                let mut input = input;
                loop {
                    let needed = decoder
                        .max_utf8_buffer_length_without_replacement(input.len())
                        .unwrap_or(input.len() * 4 + 16);
                    out.reserve(needed);
                    let (result, read) =
                        decoder.decode_to_string_without_replacement(input, out, last);
                    input = &input[read..];
                    match result {
                        DecoderResult::InputEmpty => return Ok(()),
                        DecoderResult::OutputFull => {}
                        DecoderResult::Malformed(_, _) => return Err(Malformed),
                    }
                }
            }
        }
    }
}

/// Decode a whole byte slice, stopping silently at the first malformed
/// sequence or incomplete trailing sequence
pub fn decode_prefix(charset: Charset, bytes: &[u8]) -> String {
    let mut out = String::new();
    if let Some(mut decoder) = CharDecoder::new(charset) {
        let _ = decoder.decode(bytes, false, &mut out);
    }
    out
}
