//! In-memory workbook model and the xlsx / xls parsers that build it.
pub(crate) mod cell;
pub(crate) mod criteria;
pub(crate) mod excel;
pub(crate) mod reference;
pub(crate) mod sheet;
pub(crate) mod xls;
pub(crate) mod xlsx;

#[cfg(test)]
pub(crate) mod fixtures;

use crate::error::RustyRecordError;
use crate::helpers::cfb::is_compound_file;
use crate::helpers::cfb::Cfb;
use crate::spreadsheet::criteria::Criteria;
use crate::spreadsheet::sheet::Sheet;
use crate::spreadsheet::xls::XlsSpreadsheet;
use crate::spreadsheet::xlsx::XlsxSpreadsheet;
use std::io::Cursor;
use thiserror::Error;
use tracing::debug;

/// Local file header signature of a ZIP archive.
const ZIP_SIGNATURE: &[u8] = b"PK\x03\x04";

/// Errors raised while decoding a recognized workbook
#[derive(Error, Debug)]
pub enum SpreadsheetError {
    #[error("Missing package part '{0}'")]
    MissingPartError(String),

    #[error("Shared string index '{0}' out of range")]
    SharedStringIndexError(usize),

    #[error("Invalid ISO 8601 date value '{0}'")]
    DateValueError(String),

    #[error("Invalid value in cell {0}: {1}")]
    CellValueError(String, String),
}

/// A workbook container parser.
pub(crate) trait Spreadsheet {
    /// Sheet names in workbook order.
    fn sheet_names(&self) -> Vec<&str>;

    /// Parses the sheet at a position of `sheet_names`.
    fn read_sheet(&mut self, position: usize) -> Result<Sheet, RustyRecordError>;

    /// Parses the sheets accepted by the criteria, in workbook order.
    fn read_sheets(&mut self, criteria: &Criteria) -> Result<Vec<Sheet>, RustyRecordError> {
        let positions = criteria.select(self.sheet_names());
        let mut sheets = Vec::with_capacity(positions.len());
        for position in positions {
            let sheet = self.read_sheet(position)?;
            debug!(sheet = sheet.name(), rows = sheet.rows().len(), "parsed sheet");
            sheets.push(sheet);
        }
        Ok(sheets)
    }
}

/// An ordered collection of parsed sheets.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Workbook {
    sheets: Vec<Sheet>,
}

impl Workbook {
    pub fn new(sheets: Vec<Sheet>) -> Self {
        Self { sheets }
    }

    /// Detects the container from its leading bytes and parses the selected sheets.
    ///
    /// ZIP archives are read as xlsx and OLE compound files as xls. Anything else,
    /// including word-processing documents in either container, is
    /// [`RustyRecordError::UnsupportedFormat`]; encrypted workbooks are
    /// [`RustyRecordError::PasswordProtected`].
    pub fn from_bytes(bytes: &[u8], criteria: &Criteria) -> Result<Self, RustyRecordError> {
        let sheets = if bytes.starts_with(ZIP_SIGNATURE) {
            debug!(format = "xlsx", size = bytes.len(), "opening workbook");
            XlsxSpreadsheet::open(Cursor::new(bytes))?.read_sheets(criteria)?
        } else if is_compound_file(bytes) {
            let cfb = Cfb::new(bytes)?;
            if cfb.exists("EncryptedPackage") {
                Err(RustyRecordError::PasswordProtected("compound file holds an encrypted package".to_owned()))?
            }
            debug!(format = "xls", size = bytes.len(), "opening workbook");
            XlsSpreadsheet::open(&cfb)?.read_sheets(criteria)?
        } else {
            Err(RustyRecordError::UnsupportedFormat("unknown file signature".to_owned()))?
        };
        debug!(sheets = sheets.len(), "workbook loaded");
        Ok(Self { sheets })
    }

    pub fn sheets(&self) -> &[Sheet] {
        &self.sheets
    }

    pub fn sheet_count(&self) -> usize {
        self.sheets.len()
    }

    pub fn sheet_at(&self, index: usize) -> Option<&Sheet> {
        self.sheets.get(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spreadsheet::cell::CellValue;
    use crate::spreadsheet::fixtures::compound_file;
    use crate::spreadsheet::fixtures::worksheet;
    use crate::spreadsheet::fixtures::xls_stream;
    use crate::spreadsheet::fixtures::xlsx_workbook;
    use crate::spreadsheet::fixtures::zip_package;
    use crate::spreadsheet::fixtures::XlsCell;

    /// Flattens a workbook to (sheet, row, col, value) for comparisons across formats.
    fn flatten(workbook: &Workbook) -> Vec<(String, usize, usize, CellValue)> {
        workbook.sheets().iter()
            .flat_map(|sheet| sheet.rows().iter().flat_map(move |row| {
                row.cells().iter().map(move |cell| (sheet.name().to_owned(), cell.row(), cell.col(), cell.value().clone()))
            }))
            .collect()
    }

    #[test]
    fn detect_xlsx_and_xls() -> Result<(), RustyRecordError> {
        let xlsx = xlsx_workbook(&[("People", worksheet(&[&["Id", "Name"], &["1", "Alice"]]).as_str())], &[]);
        let xls = compound_file(&[("Workbook", xls_stream(&[("People", vec![
            XlsCell::Label(0, 0, "Id"),
            XlsCell::Label(0, 1, "Name"),
            XlsCell::Rk(1, 0, 1),
            XlsCell::Label(1, 1, "Alice"),
        ])]))]);

        let from_xlsx = Workbook::from_bytes(&xlsx, &Criteria::default())?;
        let from_xls = Workbook::from_bytes(&xls, &Criteria::default())?;
        assert_eq!(from_xlsx.sheet_count(), 1);
        assert_eq!(flatten(&from_xlsx), flatten(&from_xls));
        Ok(())
    }

    #[test]
    fn select_sheets_by_criteria() -> Result<(), RustyRecordError> {
        let sheet = worksheet(&[&["x"]]);
        let xlsx = xlsx_workbook(&[("Data1", sheet.as_str()), ("Notes", sheet.as_str()), ("Data2", sheet.as_str())], &[]);

        let criteria = Criteria::default().with_sheet_pattern("Data*")?;
        let workbook = Workbook::from_bytes(&xlsx, &criteria)?;
        let names: Vec<&str> = workbook.sheets().iter().map(Sheet::name).collect();
        assert_eq!(names, vec!["Data1", "Data2"]);

        let workbook = Workbook::from_bytes(&xlsx, &criteria.with_sheet_limit(1))?;
        assert_eq!(workbook.sheet_count(), 1);
        assert_eq!(workbook.sheet_at(0).map(Sheet::name), Some("Data1"));
        Ok(())
    }

    #[test]
    fn reject_other_documents() {
        let unsupported = |bytes: &[u8]| matches!(
            Workbook::from_bytes(bytes, &Criteria::default()),
            Err(RustyRecordError::UnsupportedFormat(_))
        );
        assert!(unsupported(b"plain text"));
        assert!(unsupported(&[]));
        assert!(unsupported(&compound_file(&[("WordDocument", vec![0xEC, 0xA5])])));
        assert!(unsupported(&zip_package(&[("[Content_Types].xml", "<Types/>"), ("word/document.xml", "<document/>")])));
    }

    #[test]
    fn reject_encrypted_workbooks() {
        let encrypted = compound_file(&[("EncryptionInfo", vec![4, 0, 4, 0]), ("EncryptedPackage", vec![0; 16])]);
        assert!(matches!(
            Workbook::from_bytes(&encrypted, &Criteria::default()),
            Err(RustyRecordError::PasswordProtected(_))
        ));
    }
}
