//! Binary Interchange File Format (BIFF8) record reader for Excel 97-2003 workbooks.
//! Records longer than 8224 bytes continue in CONTINUE records; the reader
//! presents a record and its continuations as one logical payload.

use crate::error::RustyRecordError;
use crate::helpers::bytes::to_f64;
use crate::helpers::bytes::to_u16;
use crate::helpers::bytes::to_u32;
use encoding_rs::Encoding;
use encoding_rs::WINDOWS_1252;
use thiserror::Error;

const CONTINUE: u16 = 60;

/// Errors specific to BIFF8 format parsing
#[derive(Error, Debug)]
pub enum Biff8Error {
    #[error("Fewer than {0} bytes remaining in record")]
    NoEnoughDataError(usize),
}

pub(crate) struct Biff8Reader {
    /// Encoding of compressed (8-bit) strings, taken from the CODEPAGE record
    pub(crate) encoding: Option<&'static Encoding>,
    buffer: Vec<u8>,
    /// Position of the next record header
    pointer: usize,
    /// Payload ranges of the current record and its continuations
    chunks: Vec<(usize, usize)>,
    index: usize,
    offset: usize,
}

impl Biff8Reader {
    pub(crate) fn new(data: Vec<u8>) -> Biff8Reader {
        Biff8Reader {
            encoding: None,
            buffer: data,
            pointer: 0,
            chunks: Vec::new(),
            index: 0,
            offset: 0,
        }
    }

    /// Advances to the next record and returns its type, or None at the end of the stream.
    pub(crate) fn next(&mut self) -> Result<Option<u16>, RustyRecordError> {
        if self.pointer + 4 > self.buffer.len() {
            return Ok(None);
        }
        self.index = 0;
        self.offset = 0;
        self.chunks.clear();

        let kind = self.get_u16_at(self.pointer)?;
        self.push_chunk()?;
        while self.pointer + 4 <= self.buffer.len() && self.get_u16_at(self.pointer)? == CONTINUE {
            self.push_chunk()?;
        }
        Ok(Some(kind))
    }

    fn push_chunk(&mut self) -> Result<(), RustyRecordError> {
        let size = self.get_u16_at(self.pointer + 2)? as usize;
        let lower = self.pointer + 4;
        let upper = self.buffer.len().min(lower + size);
        self.pointer = lower + size;
        self.chunks.push((lower, upper));
        Ok(())
    }

    /// Moves to an absolute stream position, e.g. a sheet's BOF offset.
    pub(crate) fn goto(&mut self, pointer: usize) {
        self.pointer = pointer;
        self.chunks.clear();
    }

    /// Reads up to `length` bytes without crossing into the next continuation.
    fn read(&mut self, length: usize) -> (&[u8], usize) {
        if let Some((lower, upper)) = self.chunks.get(self.index).copied() {
            let source = upper.min(lower + self.offset);
            let target = upper.min(source + length);
            let size = target - source;
            if target == upper {
                self.index += 1;
                self.offset = 0;
            } else {
                self.offset += size;
            }
            return (&self.buffer[source..target], size);
        }
        (&[], 0)
    }

    /// Reads exactly `length` bytes of the current chunk.
    fn read_exact(&mut self, length: usize) -> Result<&[u8], RustyRecordError> {
        let (data, size) = self.read(length);
        if size == length {
            Ok(data)
        } else {
            Err(Biff8Error::NoEnoughDataError(length))?
        }
    }

    pub(crate) fn skip(&mut self, length: usize) -> Result<(), RustyRecordError> {
        let mut remaining = length;
        while remaining > 0 {
            let (_, size) = self.read(remaining);
            if size == 0 {
                Err(Biff8Error::NoEnoughDataError(remaining))?
            }
            remaining -= size;
        }
        Ok(())
    }

    pub(crate) fn read_u8(&mut self) -> Result<u8, RustyRecordError> {
        self.read_exact(1).map(|data| data[0])
    }

    pub(crate) fn read_u16(&mut self) -> Result<u16, RustyRecordError> {
        self.read_exact(2).map(to_u16)
    }

    pub(crate) fn read_u32(&mut self) -> Result<u32, RustyRecordError> {
        self.read_exact(4).map(to_u32)
    }

    pub(crate) fn read_usize(&mut self) -> Result<usize, RustyRecordError> {
        self.read_u32().map(|value| value as usize)
    }

    pub(crate) fn read_f64(&mut self) -> Result<f64, RustyRecordError> {
        self.read_exact(8).map(to_f64)
    }

    /// Reads a u16 counted from the end of the current record payload.
    pub(crate) fn get_u16_back(&self, offset: usize) -> Result<u16, RustyRecordError> {
        let mut offset = offset;
        for (lower, upper) in self.chunks.iter().rev() {
            if *lower + offset <= *upper {
                return self.get_u16_at(*upper - offset);
            }
            offset -= *upper - *lower;
        }
        Err(Biff8Error::NoEnoughDataError(2))?
    }

    fn get_u16_at(&self, index: usize) -> Result<u16, RustyRecordError> {
        if index + 2 <= self.buffer.len() {
            Ok(to_u16(&self.buffer[index..index + 2]))
        } else {
            Err(Biff8Error::NoEnoughDataError(2))?
        }
    }

    /// Decodes an RK value: a 30-bit integer or the high 30 bits of a double,
    /// optionally divided by 100.
    pub(crate) fn read_rk_number(&mut self) -> Result<f64, RustyRecordError> {
        let raw = self.read_u32()?;
        let is_percentage = (raw & 0x01) != 0;
        let is_integer = (raw & 0x02) != 0;
        let value = if is_integer {
            ((raw as i32) >> 2) as f64
        } else {
            f64::from_bits(((raw & 0xFFFF_FFFC) as u64) << 32)
        };
        Ok(if is_percentage { value / 100.0 } else { value })
    }

    /// ShortXLUnicodeString: 1-byte character count.
    pub(crate) fn read_short_xl_unicode_string(&mut self) -> Result<String, RustyRecordError> {
        let chars = self.read_u8()? as usize;
        self.read_continued_string(chars, false)
    }

    /// XLUnicodeString: 2-byte character count.
    pub(crate) fn read_xl_unicode_string(&mut self) -> Result<String, RustyRecordError> {
        let chars = self.read_u16()? as usize;
        self.read_continued_string(chars, false)
    }

    /// XLUnicodeRichExtendedString as stored in the SST.
    pub(crate) fn read_xl_unicode_rich_extended_string(&mut self) -> Result<String, RustyRecordError> {
        let chars = self.read_u16()? as usize;
        self.read_continued_string(chars, true)
    }

    /// A string may be split across CONTINUE records; each continuation restarts
    /// with its own option flags byte.
    fn read_continued_string(&mut self, chars: usize, is_extended: bool) -> Result<String, RustyRecordError> {
        let mut content = String::new();
        let (mut read, trailing) = self.read_string_part(chars, is_extended, &mut content)?;
        while read < chars {
            let (count, _) = self.read_string_part(chars - read, false, &mut content)?;
            if count == 0 {
                Err(Biff8Error::NoEnoughDataError(chars - read))?
            }
            read += count;
        }
        self.skip(trailing)?;
        Ok(content)
    }

    /// Returns the characters read and the number of trailing rich-text/phonetic bytes.
    fn read_string_part(&mut self, chars: usize, is_extended: bool, content: &mut String) -> Result<(usize, usize), RustyRecordError> {
        let flag = self.read_u8()?;
        let is_high_byte = (flag & 0x1) != 0;
        let rich_runs = if is_extended && (flag & 0x8) != 0 { self.read_u16()? as usize } else { 0 };
        let phonetic_size = if is_extended && (flag & 0x4) != 0 { self.read_usize()? } else { 0 };
        let expected = if is_high_byte { chars * 2 } else { chars };
        let encoding = self.encoding;
        let (bytes, actual) = self.read(expected);
        if is_high_byte {
            let (decoded, _, _) = encoding_rs::UTF_16LE.decode(bytes);
            content.push_str(&decoded);
        } else if let Some(encoding) = encoding {
            let (decoded, _, _) = encoding.decode(bytes);
            content.push_str(&decoded);
        } else {
            content.extend(bytes.iter().map(|byte| *byte as char));
        }
        let read = if is_high_byte { actual / 2 } else { actual };
        Ok((read, 4 * rich_runs + phonetic_size))
    }
}

/// Maps a CODEPAGE value to the encoding of compressed strings.
/// UTF-16 code pages keep the BIFF8 default (Latin-1 low bytes).
pub(crate) fn compressed_string_encoding(code_page: u16) -> Option<&'static Encoding> {
    match code_page {
        1200 | 1201 => None,
        1252 => Some(WINDOWS_1252),
        _ => codepage::to_encoding(code_page).filter(|encoding| encoding.is_single_byte()),
    }
}

#[macro_export]
macro_rules! match_biff8_record {
    ($reader:expr => { $($arms:tt)* }) => {
        while let Some(kind) = $reader.next()? {
            match kind {
                $($arms)*
                _ => (),
            }
        }
    };
}
