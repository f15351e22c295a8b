//! # Rusty Record
//!
//! Maps the rows of Excel workbooks onto plain Rust structs.
//!
//! ## Features
//!
//! - **Two formats**: Office Open XML (`.xlsx`) and BIFF8 (`.xls`) workbooks, detected
//!   from their leading bytes
//! - **Declarative mapping**: fields pick their cell by position or by header text
//!   through the [`sheet_record!`] macro, or through a hand-written [`Record`]
//! - **Typed conversion**: numbers, text, booleans and date-formatted cells convert
//!   into integers, floats, `bool`, `String`, `chrono` dates and their `Option` forms
//! - **Precise errors**: a failed conversion names the cell, the field and the target type
//! - **Sheet selection**: glob patterns and a sheet limit through [`Criteria`]
//!
//! ## Example
//!
//! ```no_run
//! use rusty_record::{sheet_record, Criteria, ExcelReader};
//!
//! sheet_record! {
//!     #[derive(Debug, Default)]
//!     pub struct Invoice {
//!         #[column(index = 0)]
//!         pub number: u32,
//!         #[column(name = "Customer")]
//!         pub customer: String,
//!         #[column]
//!         pub paid: Option<bool>,
//!     }
//! }
//!
//! let invoices = ExcelReader::<Invoice>::open("invoices.xlsx")?
//!     .with_criteria(Criteria::default().with_sheet_pattern("20*")?)
//!     .read(false)?;
//! for invoice in invoices {
//!     println!("{invoice:?}");
//! }
//! # Ok::<(), rusty_record::RustyRecordError>(())
//! ```
mod error;
mod helpers;
mod reader;
mod record;
mod spreadsheet;

pub use crate::error::RustyRecordError;
pub use crate::reader::read_records;
pub use crate::reader::ExcelReader;
pub use crate::record::schema::ColumnDeclaration;
pub use crate::record::schema::FieldDescriptor;
pub use crate::record::schema::Resolution;
pub use crate::record::schema::SchemaDescriptor;
pub use crate::record::value::coerce;
pub use crate::record::value::ConversionError;
pub use crate::record::value::FieldType;
pub use crate::record::value::FromCell;
pub use crate::record::value::ValueType;
pub use crate::record::Record;
pub use crate::spreadsheet::cell::Cell;
pub use crate::spreadsheet::cell::CellValue;
pub use crate::spreadsheet::cell::DateKind;
pub use crate::spreadsheet::cell::ExcelDateTime;
pub use crate::spreadsheet::criteria::Criteria;
pub use crate::spreadsheet::reference::index_to_reference;
pub use crate::spreadsheet::reference::reference_to_index;
pub use crate::spreadsheet::sheet::Row;
pub use crate::spreadsheet::sheet::Sheet;
pub use crate::spreadsheet::SpreadsheetError;
pub use crate::spreadsheet::Workbook;
