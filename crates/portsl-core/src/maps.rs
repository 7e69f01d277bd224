//! `/proc/<pid>/maps` text-table parsing.
//!
//! Each line has the form
//!
//! ```text
//! 00400000-00452000 r-xp 00000000 08:01 123456   /usr/lib/libfoo.so
//! ```
//!
//! and is parsed with the same field rules as
//! `sscanf(line, "%p-%p %4s %lx %x:%x %lu %n", ...)`. Only lines whose seven
//! numeric/text fields parse and whose path starts with `/` reach the
//! visitor; stacks, heaps, `[vdso]` and anonymous mappings are skipped.

use std::io::{self, BufRead, Read};

use crate::enumerate::LibraryRegion;
use crate::error::{ErrorSlot, PORT_ERROR_OPFAILED};
use crate::messages::Message;

/// Longest accepted path (Linux `PATH_MAX`).
pub const PATH_MAX: usize = 4096;

/// Line buffer size: a path plus room for addresses, permissions and
/// offsets, plus the terminator.
pub const MAPS_LINE_CAPACITY: usize = PATH_MAX + 101;

/// All fields of one maps line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MapsRecord<'a> {
    pub low: usize,
    pub high: usize,
    pub permissions: &'a str,
    pub offset: u64,
    pub dev_major: u32,
    pub dev_minor: u32,
    pub inode: u64,
    /// Everything after the inode and the whitespace that follows it, minus
    /// the line terminator. Empty for anonymous mappings. Raw bytes: Unix
    /// paths need not be UTF-8.
    pub path: &'a [u8],
}

impl MapsRecord<'_> {
    /// Whether the mapping is backed by a named file.
    #[must_use]
    pub fn is_file_backed(&self) -> bool {
        self.path.starts_with(b"/")
    }
}

/// Byte cursor with scanf-like field readers.
struct Scanner<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Scanner<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn skip_whitespace(&mut self) {
        while self.buf.get(self.pos).is_some_and(u8::is_ascii_whitespace) {
            self.pos += 1;
        }
    }

    fn literal(&mut self, expected: u8) -> Option<()> {
        (*self.buf.get(self.pos)? == expected).then(|| self.pos += 1)
    }

    fn digits(&mut self, radix: u32) -> Option<u64> {
        let start = self.pos;
        let mut value: u64 = 0;
        while let Some(digit) = self
            .buf
            .get(self.pos)
            .and_then(|&b| char::from(b).to_digit(radix))
        {
            value = value
                .checked_mul(u64::from(radix))?
                .checked_add(u64::from(digit))?;
            self.pos += 1;
        }
        (self.pos > start).then_some(value)
    }

    /// `%x`, `%lx` and `%p`: optional `0x` prefix, then hex digits.
    fn hex(&mut self) -> Option<u64> {
        self.skip_whitespace();
        if self.buf[self.pos..].starts_with(b"0x") || self.buf[self.pos..].starts_with(b"0X") {
            let save = self.pos;
            self.pos += 2;
            if let Some(v) = self.digits(16) {
                return Some(v);
            }
            // A lone "0" followed by 'x' is still the number zero.
            self.pos = save + 1;
            return Some(0);
        }
        self.digits(16)
    }

    /// `%lu`.
    fn decimal(&mut self) -> Option<u64> {
        self.skip_whitespace();
        self.digits(10)
    }

    /// `%4s`: up to `width` non-whitespace bytes.
    fn word(&mut self, width: usize) -> Option<&'a str> {
        self.skip_whitespace();
        let start = self.pos;
        while self.pos - start < width
            && self
                .buf
                .get(self.pos)
                .is_some_and(|b| !b.is_ascii_whitespace())
        {
            self.pos += 1;
        }
        if self.pos == start {
            return None;
        }
        std::str::from_utf8(&self.buf[start..self.pos]).ok()
    }
}

/// Parse one maps line. The line may include its `\n` terminator.
///
/// Returns `None` unless all seven fields parse.
#[must_use]
pub fn parse_maps_line(line: &[u8]) -> Option<MapsRecord<'_>> {
    let mut scan = Scanner::new(line);

    let low = scan.hex()?;
    scan.literal(b'-')?;
    let high = scan.hex()?;
    let permissions = scan.word(4)?;
    let offset = scan.hex()?;
    let dev_major = u32::try_from(scan.hex()?).ok()?;
    scan.literal(b':')?;
    let dev_minor = u32::try_from(scan.hex()?).ok()?;
    let inode = scan.decimal()?;
    scan.skip_whitespace();

    let rest = &line[scan.pos..];
    let path = rest.strip_suffix(b"\n").unwrap_or(rest);

    Some(MapsRecord {
        low: usize::try_from(low).ok()?,
        high: usize::try_from(high).ok()?,
        permissions,
        offset,
        dev_major,
        dev_minor,
        inode,
        path,
    })
}

/// One bounded line read.
#[derive(Debug, PartialEq, Eq)]
enum LineRead {
    /// A complete line, terminator included, is in the buffer.
    Complete,
    /// No terminator within the buffer; the rest of the line was discarded.
    Truncated,
    Eof,
}

/// Read one line into `line`, keeping at most `capacity - 1` bytes.
fn read_bounded_line<R: BufRead>(
    reader: &mut R,
    line: &mut Vec<u8>,
    capacity: usize,
) -> io::Result<LineRead> {
    line.clear();
    let limit = capacity.saturating_sub(1) as u64;
    let n = (&mut *reader).take(limit).read_until(b'\n', line)?;
    if n == 0 {
        return Ok(LineRead::Eof);
    }
    if line.last() == Some(&b'\n') {
        return Ok(LineRead::Complete);
    }
    if n as u64 == limit {
        reader.skip_until(b'\n')?;
    }
    Ok(LineRead::Truncated)
}

/// Stream `reader` as a maps table into `visitor`.
///
/// Returns `0` after the last line, or the first non-zero visitor result.
/// Over-long lines are reported to the tracing sink and `errors` and
/// skipped. A read error ends the walk like end of file does.
pub fn scan_maps<R: BufRead>(
    mut reader: R,
    errors: &ErrorSlot,
    visitor: &mut dyn FnMut(&LibraryRegion<'_>) -> usize,
) -> usize {
    let mut line = Vec::with_capacity(MAPS_LINE_CAPACITY);
    loop {
        match read_bounded_line(&mut reader, &mut line, MAPS_LINE_CAPACITY) {
            Ok(LineRead::Eof) => return 0,
            Ok(LineRead::Truncated) => {
                tracing::warn!(
                    prefix = %String::from_utf8_lossy(&line[..line.len().min(64)]),
                    "maps line has no terminator within {MAPS_LINE_CAPACITY} bytes"
                );
                errors.set(PORT_ERROR_OPFAILED, Message::MapsLineTruncated.text());
                continue;
            }
            Ok(LineRead::Complete) => {}
            Err(err) => {
                tracing::warn!(%err, "reading maps table failed");
                return 0;
            }
        }

        let Some(record) = parse_maps_line(&line) else {
            continue;
        };
        if !record.is_file_backed() {
            continue;
        }

        let region = LibraryRegion {
            path: record.path,
            low: record.low,
            high: record.high,
        };
        let result = visitor(&region);
        if result != 0 {
            return result;
        }
    }
}
