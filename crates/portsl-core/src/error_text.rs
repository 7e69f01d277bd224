//! OS error text normalization.
//!
//! Loader messages come back in whatever encoding the process locale uses.
//! [`normalize_error_text`] rewrites them into a bounded, NUL-terminated
//! UTF-8 buffer using one of three strategies:
//!
//! - [`WideCharTranscoder`]: decode one locale character at a time and
//!   re-encode it with a three-tier UTF-8 encoder.
//! - [`CodesetTranscoder`]: stream through a locale-to-UTF-8 converter.
//! - [`RawCopy`]: truncated byte copy.
//!
//! None of them ever fails; bytes that cannot be decoded are copied through.

use crate::messages::Message;

/// Size of the buffer used for loader error text.
pub const MAX_ERR_BUF_LENGTH: usize = 512;

/// Result of decoding one multibyte character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeStep {
    /// A character and the number of input bytes it used.
    Char { ch: u32, len: usize },
    /// The leading bytes do not form a character.
    Invalid,
    /// A NUL character or end of input.
    End,
}

/// Locale-aware multibyte decoder (`mbtowc` on the host).
pub trait MultibyteDecoder {
    /// Reset any shift state.
    fn reset(&mut self);
    /// Decode the character at the start of `input`.
    fn decode(&mut self, input: &[u8]) -> DecodeStep;
}

/// Outcome of one converter call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvertStatus {
    /// All of the input was converted.
    Done,
    /// The output buffer filled up.
    OutputFull,
    /// Conversion stopped at a byte it could not convert.
    Unconvertible,
}

/// Progress made by one converter call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConvertStep {
    pub consumed: usize,
    pub written: usize,
    pub status: ConvertStatus,
}

/// Streaming codeset converter into UTF-8 (`iconv` on the host).
pub trait CodesetConverter {
    fn convert(&mut self, input: &[u8], out: &mut [u8]) -> ConvertStep;
}

/// A strategy that writes transcoded text into `out` and returns the byte
/// count. `out` never includes room for the terminator.
pub trait ErrorTranscoder {
    fn transcode(&mut self, raw: &[u8], out: &mut [u8]) -> usize;
}

/// Normalize `raw` into `out` and NUL-terminate it.
///
/// Returns the number of bytes before the terminator. An empty `out` is left
/// untouched. Absent or empty input is replaced with the catalog
/// "Unknown error" text. Input ends at its first NUL byte.
pub fn normalize_error_text(
    raw: Option<&[u8]>,
    out: &mut [u8],
    transcoder: &mut dyn ErrorTranscoder,
) -> usize {
    let Some(last) = out.len().checked_sub(1) else {
        return 0;
    };

    let raw = raw.map(until_nul).filter(|r| !r.is_empty());
    let written = match raw {
        Some(raw) => transcoder.transcode(raw, &mut out[..last]),
        None => raw_copy(Message::UnknownError.text().as_bytes(), &mut out[..last]),
    };
    out[written] = 0;
    written
}

/// [`normalize_error_text`] into a fresh buffer of `capacity` bytes.
///
/// Bytes that are not valid UTF-8 (copied-through input) are replaced with
/// U+FFFD in the returned string.
pub fn normalize_to_string(
    raw: Option<&[u8]>,
    capacity: usize,
    transcoder: &mut dyn ErrorTranscoder,
) -> String {
    let mut buf = vec![0_u8; capacity];
    let len = normalize_error_text(raw, &mut buf, transcoder);
    String::from_utf8_lossy(&buf[..len]).into_owned()
}

fn until_nul(raw: &[u8]) -> &[u8] {
    match raw.iter().position(|&b| b == 0) {
        Some(end) => &raw[..end],
        None => raw,
    }
}

fn raw_copy(raw: &[u8], out: &mut [u8]) -> usize {
    let len = raw.len().min(out.len());
    out[..len].copy_from_slice(&raw[..len]);
    len
}

/// Encode `ch` at the start of `out`: one byte below 0x80, two below 0x800,
/// three otherwise. Code points above U+FFFF keep their low 16 bits.
///
/// Returns `None` without writing when the sequence does not fit.
#[must_use]
pub fn encode_utf8_bounded(ch: u32, out: &mut [u8]) -> Option<usize> {
    if ch < 0x80 {
        *out.first_mut()? = ch as u8;
        Some(1)
    } else if ch < 0x800 {
        let dst = out.get_mut(..2)?;
        dst[0] = 0xc0 | ((ch >> 6) & 0x1f) as u8;
        dst[1] = 0x80 | (ch & 0x3f) as u8;
        Some(2)
    } else {
        let dst = out.get_mut(..3)?;
        dst[0] = 0xe0 | ((ch >> 12) & 0x0f) as u8;
        dst[1] = 0x80 | ((ch >> 6) & 0x3f) as u8;
        dst[2] = 0x80 | (ch & 0x3f) as u8;
        Some(3)
    }
}

/// Truncated byte copy.
#[derive(Debug, Default, Clone, Copy)]
pub struct RawCopy;

impl ErrorTranscoder for RawCopy {
    fn transcode(&mut self, raw: &[u8], out: &mut [u8]) -> usize {
        raw_copy(raw, out)
    }
}

/// Character-at-a-time strategy over a [`MultibyteDecoder`].
///
/// Carriage returns are dropped and newlines become spaces so the message
/// stays on one line.
#[derive(Debug, Default, Clone)]
pub struct WideCharTranscoder<D> {
    decoder: D,
}

impl<D: MultibyteDecoder> WideCharTranscoder<D> {
    pub fn new(decoder: D) -> Self {
        Self { decoder }
    }
}

impl<D: MultibyteDecoder> ErrorTranscoder for WideCharTranscoder<D> {
    fn transcode(&mut self, raw: &[u8], out: &mut [u8]) -> usize {
        self.decoder.reset();

        let mut pos = 0;
        let mut written = 0;
        while pos < raw.len() {
            let ch = match self.decoder.decode(&raw[pos..]) {
                DecodeStep::Char { ch, len } => {
                    pos += len.max(1);
                    ch
                }
                DecodeStep::Invalid => {
                    // Copied verbatim; the decoder state is unspecified now.
                    let Some(slot) = out.get_mut(written) else {
                        break;
                    };
                    *slot = raw[pos];
                    written += 1;
                    pos += 1;
                    self.decoder.reset();
                    continue;
                }
                DecodeStep::End => break,
            };

            let ch = match ch {
                0x0d => continue,
                0x0a => u32::from(b' '),
                other => other,
            };
            match encode_utf8_bounded(ch, &mut out[written..]) {
                Some(n) => written += n,
                None => break,
            }
        }
        written
    }
}

/// Converter-driven strategy. Without a converter it degrades to a raw copy.
#[derive(Debug, Default, Clone)]
pub struct CodesetTranscoder<C> {
    converter: Option<C>,
}

impl<C: CodesetConverter> CodesetTranscoder<C> {
    pub fn new(converter: Option<C>) -> Self {
        Self { converter }
    }
}

impl<C: CodesetConverter> ErrorTranscoder for CodesetTranscoder<C> {
    fn transcode(&mut self, raw: &[u8], out: &mut [u8]) -> usize {
        let Some(converter) = self.converter.as_mut() else {
            return raw_copy(raw, out);
        };

        let mut read = 0;
        let mut written = 0;
        while written < out.len() && read < raw.len() {
            let step = converter.convert(&raw[read..], &mut out[written..]);
            read += step.consumed;
            written += step.written;
            match step.status {
                ConvertStatus::Done if step.consumed == 0 => break,
                ConvertStatus::Done => {}
                ConvertStatus::OutputFull => break,
                ConvertStatus::Unconvertible => {
                    if read < raw.len() && written < out.len() {
                        out[written] = raw[read];
                        written += 1;
                        read += 1;
                    }
                }
            }
        }
        written
    }
}

/// Decoder for UTF-8 locales that needs no OS support.
#[derive(Debug, Default, Clone, Copy)]
pub struct Utf8Decoder;

impl MultibyteDecoder for Utf8Decoder {
    fn reset(&mut self) {}

    fn decode(&mut self, input: &[u8]) -> DecodeStep {
        let Some(&lead) = input.first() else {
            return DecodeStep::End;
        };
        let width = match lead {
            0x00 => return DecodeStep::End,
            0x01..=0x7f => 1,
            0xc2..=0xdf => 2,
            0xe0..=0xef => 3,
            0xf0..=0xf4 => 4,
            _ => return DecodeStep::Invalid,
        };
        let Some(seq) = input.get(..width) else {
            return DecodeStep::Invalid;
        };
        match core::str::from_utf8(seq).ok().and_then(|s| s.chars().next()) {
            Some(c) => DecodeStep::Char {
                ch: u32::from(c),
                len: width,
            },
            None => DecodeStep::Invalid,
        }
    }
}
