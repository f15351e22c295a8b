use crate::record::value::ConversionError;
use crate::record::value::FieldType;
use thiserror::Error;

/// Main error type for the Rusty Record crate.
/// Aggregates errors from the standard library, dependencies and internal modules.
#[derive(Error, Debug)]
pub enum RustyRecordError {
    /// The target record type declares no mapped field.
    #[error("Invalid record configuration: {0}")]
    ConfigurationError(String),

    /// A resolved cell could not be coerced into its field's type.
    #[error("Invalid conversion in cell [{row}, {col}] ({reference}) for field '{field}' of type {target}: {cause}")]
    CellConversionError {
        row: usize,
        col: usize,
        reference: String,
        field: String,
        target: FieldType,
        #[source]
        cause: ConversionError,
    },

    /// The source path is empty or the source cannot be read.
    #[error("Cannot acquire source '{name}': {message}")]
    SourceAcquisitionError { name: String, message: String },

    /// The bytes are not a recognized spreadsheet container.
    #[error("Unsupported spreadsheet format: {0}")]
    UnsupportedFormat(String),

    /// The workbook is encrypted.
    #[error("Spreadsheet is password protected: {0}")]
    PasswordProtected(String),

    // Standard library errors
    #[error("{0}")]
    IoError(#[from] std::io::Error),

    #[error("{0}")]
    ParseIntError(#[from] std::num::ParseIntError),

    #[error("{0}")]
    ParseFloatError(#[from] std::num::ParseFloatError),

    #[error("{0}")]
    PatternError(#[from] glob::PatternError),

    // Third-party library errors
    #[error("{0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("{0}")]
    XmlError(#[from] quick_xml::Error),

    #[error("{0}")]
    XmlEncodingError(#[from] quick_xml::encoding::EncodingError),

    #[error("{0}")]
    XmlAttributeError(#[from] quick_xml::events::attributes::AttrError),

    // Helper module errors
    #[error("{0}")]
    CfbHelperError(#[from] crate::helpers::cfb::CfbError),

    #[error("{0}")]
    XmlHelperError(#[from] crate::helpers::xml::XmlError),

    #[error("{0}")]
    Biff8HelperError(#[from] crate::helpers::biff8::Biff8Error),

    // Spreadsheet module errors
    #[error("{0}")]
    SpreadsheetError(#[from] crate::spreadsheet::SpreadsheetError),

    #[error("{0}")]
    XlsError(#[from] crate::spreadsheet::xls::XlsError),
}

pub(crate) trait ResultOptionChain {
    fn ok_none_else<F>(self, f: F) -> Self
    where
        F: FnOnce() -> Self;
}

impl<T, E> ResultOptionChain for Result<Option<T>, E> {
    fn ok_none_else<F>(self, f: F) -> Self
    where
        F: FnOnce() -> Self,
    {
        match self {
            Ok(None) => f(),
            _ => self,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ok_none_else_falls_back_only_on_none() {
        let primary: Result<Option<u8>, RustyRecordError> = Ok(None);
        assert_eq!(primary.ok_none_else(|| Ok(Some(2))).unwrap(), Some(2));

        let primary: Result<Option<u8>, RustyRecordError> = Ok(Some(1));
        assert_eq!(primary.ok_none_else(|| Ok(Some(2))).unwrap(), Some(1));
    }
}
