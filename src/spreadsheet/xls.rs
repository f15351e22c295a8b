use crate::error::ResultOptionChain;
use crate::error::RustyRecordError;
use crate::helpers::biff8::compressed_string_encoding;
use crate::helpers::biff8::Biff8Reader;
use crate::helpers::cfb::Cfb;
use crate::match_biff8_record;
use crate::spreadsheet::cell::to_error_value;
use crate::spreadsheet::cell::Cell;
use crate::spreadsheet::cell::CellValue;
use crate::spreadsheet::cell::DateKind;
use crate::spreadsheet::excel::NumberFormats;
use crate::spreadsheet::sheet::Sheet;
use crate::spreadsheet::Spreadsheet;
use crate::spreadsheet::SpreadsheetError;
use either::Either;
use std::collections::HashMap;
use thiserror::Error;
use tracing::debug;

// BIFF8 record types
const FORMULA: u16 = 6;
const EOF: u16 = 10;
const DATE1904: u16 = 34;
const FILE_PASS: u16 = 47;
const CODE_PAGE: u16 = 66;
const BOUND_SHEET8: u16 = 133;
const MUL_RK: u16 = 189;
const MUL_BLANK: u16 = 190;
const XF: u16 = 224;
const SST: u16 = 252;
const LABEL_SST: u16 = 253;
const BLANK: u16 = 513;
const NUMBER: u16 = 515;
const LABEL: u16 = 516;
const BOOL_ERR: u16 = 517;
const STRING: u16 = 519;
const ROW: u16 = 520;
const ARRAY: u16 = 545;
const TABLE: u16 = 566;
const RK: u16 = 638;
const FORMAT: u16 = 1054;
const SHARED_FORMULA: u16 = 1212;
const BOF: u16 = 2057;

/// Sheet type of a worksheet in BOUNDSHEET8 (charts, macros and dialogs are skipped).
const WORKSHEET: u8 = 0;

/// Errors specific to XLS file parsing
#[derive(Error, Debug)]
pub enum XlsError {
    #[error("Invalid code page '{0}'")]
    CodePageError(u16),

    #[error("Invalid formula value '{0:#018x}'")]
    FormulaValueError(u64),
}

/// A cell read from its record: either a final value, or a number that
/// still needs its style to decide between number and date.
type RecordValue = Either<CellValue, (usize, f64)>;

/// Excel 97-2003 workbook: the BIFF8 `Workbook` stream of a compound file.
pub(crate) struct XlsSpreadsheet {
    reader: Biff8Reader,
    shared_strings: Vec<String>,
    number_formats: NumberFormats,
    /// (sheet name, BOF position in the stream) in workbook order
    sheets: Vec<(String, usize)>,
}

impl XlsSpreadsheet {
    /// Reads the workbook globals substream.
    /// Compound files without a workbook stream (e.g. Word documents) are unsupported.
    pub(crate) fn open(cfb: &Cfb) -> Result<XlsSpreadsheet, RustyRecordError> {
        let mut reader = cfb.read("Workbook")
            .ok_none_else(|| cfb.read("Book"))?
            .map(Biff8Reader::new)
            .ok_or_else(|| RustyRecordError::UnsupportedFormat("compound file has no workbook stream".to_owned()))?;
        let mut is_1904 = false;
        let mut shared_strings = Vec::new();
        let mut custom_formats: HashMap<u16, Option<DateKind>> = HashMap::new();
        let mut format_indexes: Vec<u16> = Vec::new();
        let mut sheets: Vec<(String, usize)> = Vec::new();
        match_biff8_record!(reader => {
            EOF => break,
            FILE_PASS => Err(RustyRecordError::PasswordProtected("workbook stream is encrypted".to_owned()))?,
            DATE1904 => is_1904 = reader.read_u16()? == 1,
            CODE_PAGE => {
                let code_page = reader.read_u16()?;
                if !matches!(code_page, 1200 | 1201) && codepage::to_encoding(code_page).is_none() {
                    Err(XlsError::CodePageError(code_page))?
                }
                reader.encoding = compressed_string_encoding(code_page);
            }
            FORMAT => {
                let id = reader.read_u16()?;
                let format = reader.read_xl_unicode_string()?;
                custom_formats.insert(id, DateKind::from_custom_format(&format));
            }
            XF => {
                reader.skip(2)?;
                format_indexes.push(reader.read_u16()?);
            }
            SST => shared_strings = load_shared_strings(&mut reader)?,
            BOUND_SHEET8 => {
                let pointer = reader.read_usize()?;
                reader.skip(1)?;
                let sheet_type = reader.read_u8()?;
                let sheet_name = reader.read_short_xl_unicode_string()?;
                if sheet_type == WORKSHEET {
                    sheets.push((sheet_name, pointer));
                }
            }
        });

        let number_formats = NumberFormats::new(format_indexes, custom_formats, is_1904);
        debug!(sheets = sheets.len(), shared_strings = shared_strings.len(), is_1904 = number_formats.is_1904(), "opened xls workbook");
        Ok(XlsSpreadsheet {
            reader,
            shared_strings,
            number_formats,
            sheets,
        })
    }
}

impl Spreadsheet for XlsSpreadsheet {
    fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(|(name, _)| name.as_str()).collect()
    }

    fn read_sheet(&mut self, position: usize) -> Result<Sheet, RustyRecordError> {
        let (sheet_name, pointer) = &self.sheets[position];
        let mut sheet = Sheet::new(sheet_name);
        self.reader.goto(*pointer);
        self.reader.next()?; // BOF of the sheet substream
        match_biff8_record!(self.reader => {
            BOF | EOF => break,
            ROW => sheet.push_row(self.reader.read_u16()? as usize),
            MUL_RK => {
                let row = self.reader.read_u16()? as usize;
                let col_lower_bound = self.reader.read_u16()? as usize;
                let col_upper_bound = self.reader.get_u16_back(2)? as usize;
                for col in col_lower_bound..=col_upper_bound {
                    let style = self.reader.read_u16()? as usize;
                    let number = self.reader.read_rk_number()?;
                    sheet.push(Cell::new(row, col, self.number_formats.to_value(style, number)));
                }
            }
            MUL_BLANK => {
                let row = self.reader.read_u16()? as usize;
                let col_lower_bound = self.reader.read_u16()? as usize;
                let col_upper_bound = self.reader.get_u16_back(2)? as usize;
                for col in col_lower_bound..=col_upper_bound {
                    sheet.push(Cell::new(row, col, CellValue::Blank));
                }
            }
            BLANK => {
                let row = self.reader.read_u16()? as usize;
                let col = self.reader.read_u16()? as usize;
                sheet.push(Cell::new(row, col, CellValue::Blank));
            }
            kind @ (BOOL_ERR | NUMBER | RK | LABEL_SST | LABEL | FORMULA) => {
                let row = self.reader.read_u16()? as usize;
                let col = self.reader.read_u16()? as usize;
                let value = match kind {
                    BOOL_ERR => read_bool_or_error_cell(&mut self.reader)?,
                    NUMBER => read_number_cell(&mut self.reader)?,
                    RK => read_rk_cell(&mut self.reader)?,
                    LABEL_SST => read_label_sst_cell(&mut self.reader, &self.shared_strings)?,
                    LABEL => read_label_cell(&mut self.reader)?,
                    _ => read_formula_cell(&mut self.reader)?,
                };
                let value = match value {
                    Either::Left(value) => value,
                    Either::Right((style, number)) => self.number_formats.to_value(style, number),
                };
                sheet.push(Cell::new(row, col, value));
            }
        });
        sheet.finish();
        Ok(sheet)
    }
}

fn load_shared_strings(reader: &mut Biff8Reader) -> Result<Vec<String>, RustyRecordError> {
    reader.skip(4)?; // total references
    let count = reader.read_usize()?;
    let mut shared_strings: Vec<String> = Vec::with_capacity(count.min(u16::MAX as usize));
    for _ in 0..count {
        shared_strings.push(reader.read_xl_unicode_rich_extended_string()?);
    }
    Ok(shared_strings)
}

fn read_bool_or_error_cell(reader: &mut Biff8Reader) -> Result<RecordValue, RustyRecordError> {
    reader.skip(2)?;
    let value = reader.read_u8()?;
    let flag = reader.read_u8()?;
    let value = if flag == 0 {
        CellValue::Boolean(value != 0)
    } else {
        CellValue::Error(to_error_value(value).to_owned())
    };
    Ok(Either::Left(value))
}

fn read_number_cell(reader: &mut Biff8Reader) -> Result<RecordValue, RustyRecordError> {
    let style = reader.read_u16()? as usize;
    let number = reader.read_f64()?;
    Ok(Either::Right((style, number)))
}

fn read_rk_cell(reader: &mut Biff8Reader) -> Result<RecordValue, RustyRecordError> {
    let style = reader.read_u16()? as usize;
    let number = reader.read_rk_number()?;
    Ok(Either::Right((style, number)))
}

fn read_label_sst_cell(reader: &mut Biff8Reader, shared_strings: &[String]) -> Result<RecordValue, RustyRecordError> {
    reader.skip(2)?;
    let index = reader.read_usize()?;
    let string = shared_strings
        .get(index)
        .ok_or(SpreadsheetError::SharedStringIndexError(index))?;
    Ok(Either::Left(CellValue::Text(string.to_owned())))
}

fn read_label_cell(reader: &mut Biff8Reader) -> Result<RecordValue, RustyRecordError> {
    reader.skip(2)?;
    let value = reader.read_xl_unicode_string()?;
    Ok(Either::Left(CellValue::Text(value)))
}

/// Reads the cached result of a FORMULA record.
/// Numeric results are stored inline; a string result follows in a STRING record,
/// possibly after the shared or array formula definition.
fn read_formula_cell(reader: &mut Biff8Reader) -> Result<RecordValue, RustyRecordError> {
    let style = reader.read_u16()? as usize;
    let formula = reader.read_f64()?.to_bits();
    let is_number = (formula & 0xFFFF_0000_0000_0000) != 0xFFFF_0000_0000_0000;
    if is_number {
        return Ok(Either::Right((style, f64::from_bits(formula))));
    }
    let value = match formula & 0xFF {
        0 => {
            let mut kind = reader.next()?;
            while matches!(kind, Some(SHARED_FORMULA | ARRAY | TABLE)) {
                kind = reader.next()?;
            }
            if kind != Some(STRING) {
                Err(XlsError::FormulaValueError(formula))?
            }
            CellValue::Formula(reader.read_xl_unicode_string()?)
        }
        1 => CellValue::Boolean((formula >> 16) & 0xFF != 0),
        2 => CellValue::Error(to_error_value(((formula >> 16) & 0xFF) as u8).to_owned()),
        3 => CellValue::Formula(String::new()),
        _ => Err(XlsError::FormulaValueError(formula))?,
    };
    Ok(Either::Left(value))
}
