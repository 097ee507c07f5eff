//! Byte-stream decoding and the positional cursor the Scanner reads through.
//!
//! Per the non-goal on streaming partial input, the reader materializes the
//! entire input up front: `set_input_string`/`set_input` only stash the raw
//! bytes, and the first cursor operation (`peek`/`prefix`/`slice`/`forward`)
//! triggers a one-time BOM detection, decode, and printable-character
//! validation pass over the whole buffer.

use std::io::{BufRead, Read};
use std::marker::PhantomData;

use crate::macros::{is_break, is_printable};
use crate::{Encoding, Mark, ReaderError};

const BOM_UTF8: [u8; 3] = [0xEF, 0xBB, 0xBF];
const BOM_UTF16LE: [u8; 2] = [0xFF, 0xFE];
const BOM_UTF16BE: [u8; 2] = [0xFE, 0xFF];
const BOM_UTF32LE: [u8; 4] = [0xFF, 0xFE, 0x00, 0x00];
const BOM_UTF32BE: [u8; 4] = [0x00, 0x00, 0xFE, 0xFF];

pub(crate) struct Reader<'r> {
    raw: Vec<u8>,
    requested_encoding: Encoding,
    encoding: Encoding,
    chars: Vec<char>,
    decoded: bool,
    index: usize,
    mark: Mark,
    _marker: PhantomData<&'r ()>,
}

impl<'r> Reader<'r> {
    pub(crate) fn new() -> Self {
        Reader {
            raw: Vec::new(),
            requested_encoding: Encoding::Any,
            encoding: Encoding::Any,
            chars: Vec::new(),
            decoded: false,
            index: 0,
            mark: Mark::default(),
            _marker: PhantomData,
        }
    }

    pub(crate) fn set_input_string(&mut self, input: &'r mut &[u8]) {
        self.raw = input.to_vec();
        self.decoded = false;
    }

    pub(crate) fn set_input(&mut self, input: &'r mut dyn BufRead) {
        let mut buf = Vec::new();
        let _ = input.read_to_end(&mut buf);
        self.raw = buf;
        self.decoded = false;
    }

    pub(crate) fn set_encoding(&mut self, encoding: Encoding) {
        self.requested_encoding = encoding;
        self.decoded = false;
    }

    fn ensure_decoded(&mut self) -> Result<(), ReaderError> {
        if self.decoded {
            return Ok(());
        }
        let (encoding, bom_len) = detect_encoding(&self.raw, self.requested_encoding)?;
        log::trace!("detected input encoding {encoding:?}");
        self.encoding = encoding;
        let raw_chars = decode(&self.raw[bom_len..], encoding)?;
        self.chars = collapse_line_breaks(raw_chars);
        validate_printable(&self.chars)?;
        self.decoded = true;
        Ok(())
    }

    pub(crate) fn encoding(&mut self) -> Result<Encoding, ReaderError> {
        self.ensure_decoded()?;
        Ok(self.encoding)
    }

    /// The code point at `cursor + offset`, or `None` past the end of the
    /// input. A `None` return is a sentinel, not an error.
    pub(crate) fn peek(&mut self, offset: usize) -> Result<Option<char>, ReaderError> {
        self.ensure_decoded()?;
        Ok(self.chars.get(self.index + offset).copied())
    }

    /// Up to `len` code points starting at the cursor; shorter at EOF.
    pub(crate) fn prefix(&mut self, len: usize) -> Result<&[char], ReaderError> {
        self.ensure_decoded()?;
        let end = self.chars.len().min(self.index + len);
        Ok(&self.chars[self.index..end])
    }

    /// The code points from `cursor + start` to `cursor + end`, clamped to
    /// the end of the buffer.
    pub(crate) fn slice(&mut self, start: usize, end: usize) -> Result<&[char], ReaderError> {
        self.ensure_decoded()?;
        let s = self.chars.len().min(self.index + start);
        let e = self.chars.len().min(self.index + end);
        Ok(&self.chars[s..e])
    }

    /// Advance the cursor by `count` code points, maintaining line/column.
    pub(crate) fn forward(&mut self, count: usize) -> Result<(), ReaderError> {
        self.ensure_decoded()?;
        for _ in 0..count {
            let Some(ch) = self.chars.get(self.index).copied() else {
                break;
            };
            self.index += 1;
            self.mark.index += 1;
            if is_break(Some(ch)) {
                self.mark.line += 1;
                self.mark.column = 0;
            } else {
                self.mark.column += 1;
            }
        }
        Ok(())
    }

    pub(crate) fn mark(&self) -> Mark {
        self.mark
    }
}

fn detect_encoding(raw: &[u8], requested: Encoding) -> Result<(Encoding, usize), ReaderError> {
    if requested != Encoding::Any {
        return Ok((requested, 0));
    }
    if raw.starts_with(&BOM_UTF32LE) {
        return Ok((Encoding::Utf32Le, 4));
    }
    if raw.starts_with(&BOM_UTF32BE) {
        return Ok((Encoding::Utf32Be, 4));
    }
    if raw.starts_with(&BOM_UTF8) {
        return Ok((Encoding::Utf8, 3));
    }
    if raw.starts_with(&BOM_UTF16LE) {
        return Ok((Encoding::Utf16Le, 2));
    }
    if raw.starts_with(&BOM_UTF16BE) {
        return Ok((Encoding::Utf16Be, 2));
    }
    Ok((Encoding::Utf8, 0))
}

fn decode(bytes: &[u8], encoding: Encoding) -> Result<Vec<char>, ReaderError> {
    match encoding {
        Encoding::Utf16Le => decode_utf16(bytes, false),
        Encoding::Utf16Be => decode_utf16(bytes, true),
        Encoding::Utf32Le => decode_utf32(bytes, false),
        Encoding::Utf32Be => decode_utf32(bytes, true),
        Encoding::Utf8 | Encoding::Any => decode_utf8(bytes),
    }
}

fn decode_utf8(bytes: &[u8]) -> Result<Vec<char>, ReaderError> {
    match std::str::from_utf8(bytes) {
        Ok(s) => Ok(s.chars().collect()),
        Err(err) => {
            let offset = err.valid_up_to();
            Err(ReaderError::InvalidUtf8 {
                value: bytes.get(offset).copied().unwrap_or(0),
            })
        }
    }
}

fn decode_utf16(bytes: &[u8], big_endian: bool) -> Result<Vec<char>, ReaderError> {
    if bytes.len() % 2 != 0 {
        return Err(ReaderError::Problem {
            problem: "input ends in the middle of a UTF-16 code unit",
            offset: bytes.len(),
            value: 0,
        });
    }
    let units = bytes.chunks_exact(2).map(|pair| {
        if big_endian {
            u16::from_be_bytes([pair[0], pair[1]])
        } else {
            u16::from_le_bytes([pair[0], pair[1]])
        }
    });
    char::decode_utf16(units)
        .collect::<Result<Vec<char>, _>>()
        .map_err(|err| ReaderError::InvalidUtf16 {
            value: err.unpaired_surrogate(),
        })
}

fn decode_utf32(bytes: &[u8], big_endian: bool) -> Result<Vec<char>, ReaderError> {
    if bytes.len() % 4 != 0 {
        return Err(ReaderError::Problem {
            problem: "input length is not a multiple of 4 bytes for UTF-32",
            offset: bytes.len(),
            value: 0,
        });
    }
    let mut out = Vec::with_capacity(bytes.len() / 4);
    for (i, word) in bytes.chunks_exact(4).enumerate() {
        let value = if big_endian {
            u32::from_be_bytes([word[0], word[1], word[2], word[3]])
        } else {
            u32::from_le_bytes([word[0], word[1], word[2], word[3]])
        };
        let Some(ch) = char::from_u32(value) else {
            return Err(ReaderError::Problem {
                problem: "invalid UTF-32 code point",
                offset: i * 4,
                value: value as i32,
            });
        };
        out.push(ch);
    }
    Ok(out)
}

/// Collapses a CRLF pair into a single logical line break so that
/// [`Reader::forward`] never needs two-character lookahead: every element
/// of the decoded buffer already corresponds to exactly one terminator.
fn collapse_line_breaks(chars: Vec<char>) -> Vec<char> {
    let mut out = Vec::with_capacity(chars.len());
    let mut i = 0;
    while i < chars.len() {
        if chars[i] == '\r' && chars.get(i + 1) == Some(&'\n') {
            out.push('\n');
            i += 2;
        } else {
            out.push(chars[i]);
            i += 1;
        }
    }
    out
}

fn validate_printable(chars: &[char]) -> Result<(), ReaderError> {
    for (offset, &ch) in chars.iter().enumerate() {
        if !is_printable(ch) {
            return Err(ReaderError::Problem {
                problem: "control characters are not allowed",
                offset,
                value: ch as i32,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_utf8_bom() {
        let mut bytes: &[u8] = b"\xEF\xBB\xBFfoo";
        let mut reader = Reader::new();
        reader.set_input_string(&mut bytes);
        assert_eq!(reader.encoding().unwrap(), Encoding::Utf8);
        assert_eq!(reader.peek(0).unwrap(), Some('f'));
    }

    #[test]
    fn peek_past_end_is_none_not_error() {
        let mut bytes: &[u8] = b"a";
        let mut reader = Reader::new();
        reader.set_input_string(&mut bytes);
        reader.forward(1).unwrap();
        assert_eq!(reader.peek(0).unwrap(), None);
        assert_eq!(reader.peek(5).unwrap(), None);
    }

    #[test]
    fn forward_tracks_line_and_column() {
        let mut bytes: &[u8] = b"ab\ncd";
        let mut reader = Reader::new();
        reader.set_input_string(&mut bytes);
        reader.forward(3).unwrap();
        let mark = reader.mark();
        assert_eq!(mark.line, 1);
        assert_eq!(mark.column, 0);
    }

    #[test]
    fn rejects_control_characters() {
        let mut bytes: &[u8] = b"a\x01b";
        let mut reader = Reader::new();
        reader.set_input_string(&mut bytes);
        let err = reader.peek(0).and_then(|_| reader.prefix(10)).err();
        assert!(matches!(err, Some(ReaderError::Problem { .. })));
    }
}
