//! Coercion of tagged cell values into record field types.
//!
//! Numbers go through their textual form, so a number cell feeds any field whose
//! type parses from text. Date-formatted numbers are assigned directly to
//! `chrono` fields and otherwise take the same textual path. String and formula
//! cells only feed text fields; boolean cells only feed `bool` fields. Blank and
//! error cells reset the field to its default.
use crate::spreadsheet::cell::Cell;
use crate::spreadsheet::cell::CellValue;
use crate::spreadsheet::cell::ExcelDateTime;
use chrono::NaiveDate;
use chrono::NaiveDateTime;
use chrono::NaiveTime;
use std::fmt::Display;
use thiserror::Error;

/// Primitive shape of a field type.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ValueType {
    Bool,
    Integer,
    Float,
    Text,
    Date,
    DateTime,
    Time,
}

impl Display for ValueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ValueType::Bool => "boolean",
            ValueType::Integer => "integer",
            ValueType::Float => "float",
            ValueType::Text => "string",
            ValueType::Date => "date",
            ValueType::DateTime => "datetime",
            ValueType::Time => "time",
        };
        write!(f, "{name}")
    }
}

/// Declared type of a mapped field, with optional wrappers made explicit.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FieldType {
    Required(ValueType),
    Optional(ValueType),
}

impl FieldType {
    /// The underlying type once any optional wrapper is removed.
    pub const fn value_type(&self) -> ValueType {
        match self {
            FieldType::Required(value_type) | FieldType::Optional(value_type) => *value_type,
        }
    }

    pub const fn is_optional(&self) -> bool {
        matches!(self, FieldType::Optional(_))
    }
}

impl Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldType::Required(value_type) => write!(f, "{value_type}"),
            FieldType::Optional(value_type) => write!(f, "optional {value_type}"),
        }
    }
}

/// Why a single cell could not become a field value.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConversionError {
    #[error("cannot parse '{value}' as {target}")]
    Parse { value: String, target: ValueType },

    #[error("{found} value cannot be assigned to {target}")]
    Incompatible { found: &'static str, target: ValueType },

    #[error("serial number {0} is not a valid date")]
    InvalidDate(f64),

    /// Raised by a [`Record`](crate::Record) asked to assign a field it does not declare.
    #[error("no mapped field named '{0}'")]
    UnknownField(String),
}

/// A type a cell can be coerced into.
///
/// Only `from_text` is required: it is the path numbers take. The other
/// constructors reject their input unless the type overrides them.
pub trait FromCell: Sized + Default {
    const FIELD_TYPE: FieldType;

    /// Parses the textual form of a number (or of a date, for non-date types).
    fn from_text(text: &str) -> Result<Self, ConversionError>;

    /// Accepts the trimmed content of a string or formula cell.
    fn from_string(_text: &str) -> Result<Self, ConversionError> {
        Err(ConversionError::Incompatible {
            found: "string",
            target: Self::FIELD_TYPE.value_type(),
        })
    }

    fn from_bool(_value: bool) -> Result<Self, ConversionError> {
        Err(ConversionError::Incompatible {
            found: "boolean",
            target: Self::FIELD_TYPE.value_type(),
        })
    }

    /// Date-formatted numbers reach non-date types through their textual form.
    ///
    /// Text targets get the ISO rendering. Numeric and boolean targets fail with
    /// [`ConversionError::Parse`] since `2020-01-05` is not a number; the serial is
    /// not exposed to them. Date and time targets override this method.
    fn from_datetime(value: &ExcelDateTime) -> Result<Self, ConversionError> {
        let text = value.to_text().ok_or(ConversionError::InvalidDate(value.serial()))?;
        Self::from_text(&text)
    }
}

/// Converts one cell into a field value according to the cell's tag.
pub fn coerce<T: FromCell>(cell: &Cell) -> Result<T, ConversionError> {
    match cell.value() {
        CellValue::Number(number) => T::from_text(&number.to_string()),
        CellValue::DateTime(value) => T::from_datetime(value),
        CellValue::Text(text) | CellValue::Formula(text) => T::from_string(text.trim()),
        CellValue::Boolean(value) => T::from_bool(*value),
        CellValue::Blank | CellValue::Error(_) => Ok(T::default()),
    }
}

fn parse<T: std::str::FromStr>(text: &str, target: ValueType) -> Result<T, ConversionError> {
    text.parse().map_err(|_| ConversionError::Parse {
        value: text.to_owned(),
        target,
    })
}

macro_rules! from_cell_by_parsing {
    ($value_type:ident => $($ty:ty),+) => {
        $(
            impl FromCell for $ty {
                const FIELD_TYPE: FieldType = FieldType::Required(ValueType::$value_type);

                fn from_text(text: &str) -> Result<Self, ConversionError> {
                    parse(text, ValueType::$value_type)
                }
            }
        )+
    };
}

from_cell_by_parsing!(Integer => i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize);
from_cell_by_parsing!(Float => f32, f64);

impl FromCell for bool {
    const FIELD_TYPE: FieldType = FieldType::Required(ValueType::Bool);

    fn from_text(text: &str) -> Result<Self, ConversionError> {
        parse(text, ValueType::Bool)
    }

    fn from_bool(value: bool) -> Result<Self, ConversionError> {
        Ok(value)
    }
}

impl FromCell for String {
    const FIELD_TYPE: FieldType = FieldType::Required(ValueType::Text);

    fn from_text(text: &str) -> Result<Self, ConversionError> {
        Ok(text.to_owned())
    }

    fn from_string(text: &str) -> Result<Self, ConversionError> {
        Ok(text.to_owned())
    }
}

impl FromCell for NaiveDate {
    const FIELD_TYPE: FieldType = FieldType::Required(ValueType::Date);

    fn from_text(text: &str) -> Result<Self, ConversionError> {
        NaiveDate::parse_from_str(text, "%Y-%m-%d").map_err(|_| ConversionError::Parse {
            value: text.to_owned(),
            target: ValueType::Date,
        })
    }

    fn from_datetime(value: &ExcelDateTime) -> Result<Self, ConversionError> {
        value.as_datetime().map(|datetime| datetime.date()).ok_or(ConversionError::InvalidDate(value.serial()))
    }
}

impl FromCell for NaiveDateTime {
    const FIELD_TYPE: FieldType = FieldType::Required(ValueType::DateTime);

    fn from_text(text: &str) -> Result<Self, ConversionError> {
        NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f").map_err(|_| ConversionError::Parse {
            value: text.to_owned(),
            target: ValueType::DateTime,
        })
    }

    fn from_datetime(value: &ExcelDateTime) -> Result<Self, ConversionError> {
        value.as_datetime().ok_or(ConversionError::InvalidDate(value.serial()))
    }
}

impl FromCell for NaiveTime {
    const FIELD_TYPE: FieldType = FieldType::Required(ValueType::Time);

    fn from_text(text: &str) -> Result<Self, ConversionError> {
        NaiveTime::parse_from_str(text, "%H:%M:%S%.f").map_err(|_| ConversionError::Parse {
            value: text.to_owned(),
            target: ValueType::Time,
        })
    }

    fn from_datetime(value: &ExcelDateTime) -> Result<Self, ConversionError> {
        value.as_datetime().map(|datetime| datetime.time()).ok_or(ConversionError::InvalidDate(value.serial()))
    }
}

impl<T: FromCell> FromCell for Option<T> {
    const FIELD_TYPE: FieldType = FieldType::Optional(T::FIELD_TYPE.value_type());

    fn from_text(text: &str) -> Result<Self, ConversionError> {
        T::from_text(text).map(Some)
    }

    fn from_string(text: &str) -> Result<Self, ConversionError> {
        T::from_string(text).map(Some)
    }

    fn from_bool(value: bool) -> Result<Self, ConversionError> {
        T::from_bool(value).map(Some)
    }

    fn from_datetime(value: &ExcelDateTime) -> Result<Self, ConversionError> {
        T::from_datetime(value).map(Some)
    }
}
