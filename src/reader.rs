use crate::error::RustyRecordError;
use crate::record::mapper::map_workbook;
use crate::record::schema::SchemaDescriptor;
use crate::record::Record;
use crate::spreadsheet::criteria::Criteria;
use crate::spreadsheet::Workbook;
use once_cell::unsync::OnceCell;
use std::fs::File;
use std::io::BufReader;
use std::io::Read;
use std::marker::PhantomData;
use std::path::Path;
use tracing::debug;

/// Reads the rows of an xlsx or xls workbook into records of type `T`.
///
/// The source is copied into memory when the reader is built; the workbook is
/// parsed on the first [`read`](ExcelReader::read) and reused afterwards.
///
/// ```no_run
/// use rusty_record::{sheet_record, ExcelReader};
///
/// sheet_record! {
///     #[derive(Debug, Default)]
///     struct Person {
///         #[column(name = "Id")]
///         id: i64,
///         #[column]
///         name: String,
///     }
/// }
///
/// let people = ExcelReader::<Person>::open("people.xlsx")?.read(false)?;
/// # Ok::<(), rusty_record::RustyRecordError>(())
/// ```
pub struct ExcelReader<T: Record> {
    name: String,
    bytes: Vec<u8>,
    criteria: Criteria,
    workbook: OnceCell<Workbook>,
    record: PhantomData<fn() -> T>,
}

impl<T: Record> ExcelReader<T> {
    /// Reads the whole file at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, RustyRecordError> {
        let path = path.as_ref();
        let name = path.display().to_string();
        if name.trim().is_empty() {
            return Err(RustyRecordError::SourceAcquisitionError { name, message: "empty path".to_owned() });
        }
        let file = File::open(path).map_err(|error| RustyRecordError::SourceAcquisitionError {
            name: name.clone(),
            message: error.to_string(),
        })?;
        Self::load(name, BufReader::new(file))
    }

    /// Reads `reader` to its end.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, RustyRecordError> {
        Self::load("<stream>".to_owned(), reader)
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, RustyRecordError> {
        Self::with_bytes("<bytes>".to_owned(), bytes)
    }

    fn load<R: Read>(name: String, mut reader: R) -> Result<Self, RustyRecordError> {
        let mut bytes = Vec::new();
        if let Err(error) = reader.read_to_end(&mut bytes) {
            Err(RustyRecordError::SourceAcquisitionError { name: name.clone(), message: error.to_string() })?
        }
        Self::with_bytes(name, bytes)
    }

    fn with_bytes(name: String, bytes: Vec<u8>) -> Result<Self, RustyRecordError> {
        if bytes.is_empty() {
            return Err(RustyRecordError::SourceAcquisitionError { name, message: "no data".to_owned() });
        }
        Ok(Self {
            name,
            bytes,
            criteria: Criteria::default(),
            workbook: OnceCell::new(),
            record: PhantomData,
        })
    }

    /// Restricts which sheets are parsed.
    pub fn with_criteria(mut self, criteria: Criteria) -> Self {
        self.criteria = criteria;
        self.workbook = OnceCell::new();
        self
    }

    /// The parsed workbook, parsing it on first use.
    pub fn workbook(&self) -> Result<&Workbook, RustyRecordError> {
        self.workbook.get_or_try_init(|| Workbook::from_bytes(&self.bytes, &self.criteria))
    }

    /// Maps every row of every selected sheet to a record.
    ///
    /// The record type is checked before the source is parsed. Row 0 of each
    /// sheet is the header and is only mapped when `include_header_row` is set.
    pub fn read(&self, include_header_row: bool) -> Result<Vec<T>, RustyRecordError> {
        let schema = SchemaDescriptor::resolve::<T>()?;
        debug!(source = self.name.as_str(), record = schema.type_name(), fields = schema.fields().len(), "reading records");
        map_workbook(self.workbook()?, &schema, include_header_row)
    }
}

/// Maps an already parsed workbook to records.
pub fn read_records<T: Record>(workbook: &Workbook, include_header_row: bool) -> Result<Vec<T>, RustyRecordError> {
    let schema = SchemaDescriptor::resolve::<T>()?;
    map_workbook(workbook, &schema, include_header_row)
}
