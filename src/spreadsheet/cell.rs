use crate::spreadsheet::reference::index_to_reference;
use chrono::Duration;
use chrono::NaiveDate;
use chrono::NaiveDateTime;
use chrono::Timelike;
use std::fmt::Display;

const MILLISECONDS_PER_DAY: f64 = 86_400_000.0;

/// Which part of a date-formatted number is meaningful.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DateKind {
    Date,
    DateTime,
    Time,
}

impl DateKind {
    /// Date kind of a built-in Excel number format id, None for non-date formats.
    pub(crate) fn from_builtin_format(id: u16) -> Option<Self> {
        match id {
            22 => Some(Self::DateTime),
            14..=17 => Some(Self::Date),
            18..=21 | 45..=47 => Some(Self::Time),
            _ => None,
        }
    }

    /// Scans a custom format code for date and time tokens, skipping
    /// escaped characters, quoted literals and bracketed sections.
    pub(crate) fn from_custom_format(format: &str) -> Option<Self> {
        let mut is_escaped = false;
        let mut is_literal = false;
        let mut bracket: Option<String> = None;
        let mut is_date = false;
        let mut is_time = false;
        for character in format.chars() {
            match character {
                _ if is_escaped => is_escaped = false,
                '_' | '\\' | '*' if !is_literal => is_escaped = true,

                '"' => is_literal = !is_literal,
                _ if is_literal => (),

                '[' => bracket = Some(String::new()),
                ']' if bracket.is_some() => {
                    // Elapsed time sections such as [h] or [mm]; colors and locales are ignored
                    let section = bracket.take().unwrap_or_default();
                    if !section.is_empty() && section.chars().all(|c| matches!(c, 'h' | 'H' | 'm' | 'M' | 's' | 'S')) {
                        is_time = true;
                    }
                }
                _ if bracket.is_some() => bracket.iter_mut().for_each(|section| section.push(character)),

                'Y' | 'y' | 'D' | 'd' => is_date = true,
                'H' | 'h' | 'S' | 's' => is_time = true,
                // A section separator ends the positive-number section
                ';' => break,
                _ => (),
            }
        }
        match (is_date, is_time) {
            (true, true) => Some(Self::DateTime),
            (true, false) => Some(Self::Date),
            (false, true) => Some(Self::Time),
            (false, false) => None,
        }
    }
}

/// A date-formatted number: the serial value plus how to interpret it.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ExcelDateTime {
    serial: f64,
    is_1904: bool,
    kind: DateKind,
}

impl ExcelDateTime {
    pub fn new(serial: f64, is_1904: bool, kind: DateKind) -> Self {
        Self { serial, is_1904, kind }
    }

    /// Builds the 1900-system serial of a calendar value.
    pub fn from_datetime(value: NaiveDateTime, kind: DateKind) -> Self {
        let days = (value.date() - epoch()).num_days();
        // Serials before 1900-03-01 are shifted by the phantom 1900-02-29.
        let days = if days < 61 { days - 1 } else { days };
        let milliseconds = value.num_seconds_from_midnight() as f64 * 1000.0 + (value.nanosecond() / 1_000_000) as f64;
        Self::new(days as f64 + milliseconds / MILLISECONDS_PER_DAY, false, kind)
    }

    pub fn serial(&self) -> f64 {
        self.serial
    }

    pub fn is_1904(&self) -> bool {
        self.is_1904
    }

    pub fn kind(&self) -> DateKind {
        self.kind
    }

    /// Calendar value of the serial; None for negative or out-of-range serials.
    pub fn as_datetime(&self) -> Option<NaiveDateTime> {
        if !self.serial.is_finite() || self.serial < 0.0 {
            return None;
        }
        let mut days = self.serial.trunc() as i64;
        let mut milliseconds = (self.serial.fract() * MILLISECONDS_PER_DAY).round() as i64;
        if milliseconds >= MILLISECONDS_PER_DAY as i64 {
            days += 1;
            milliseconds = 0;
        }
        let offset = if self.is_1904 {
            1_462
        } else if days < 60 {
            1 // Lotus 1-2-3 leap year bug
        } else {
            0
        };
        epoch()
            .checked_add_signed(Duration::try_days(days + offset)?)?
            .and_hms_opt(0, 0, 0)?
            .checked_add_signed(Duration::try_milliseconds(milliseconds)?)
    }

    /// Textual form used when a date cell feeds a non-date field.
    pub fn to_text(&self) -> Option<String> {
        let value = self.as_datetime()?;
        let text = match self.kind {
            DateKind::Date => value.format("%Y-%m-%d").to_string(),
            DateKind::DateTime => value.format("%Y-%m-%d %H:%M:%S%.f").to_string(),
            DateKind::Time => value.format("%H:%M:%S%.f").to_string(),
        };
        Some(text)
    }
}

fn epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1899, 12, 30).expect("NaiveDate literal")
}

/// Human-readable Excel error literal for a BIFF error code.
pub(crate) fn to_error_value(value: u8) -> &'static str {
    match value {
        0x00 => "#NULL!",
        0x07 => "#DIV/0!",
        0x0F => "#VALUE!",
        0x17 => "#REF!",
        0x1D => "#NAME?",
        0x24 => "#NUM!",
        0x2A => "#N/A",
        0x2B => "#GETTING_DATA",
        _ => "#ERROR!",
    }
}

/// Runtime value of a cell as decided by the workbook parser.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum CellValue {
    /// Present cell without a value (e.g. formatting only)
    #[default]
    Blank,
    Number(f64),
    /// Number displayed with a date or time format
    DateTime(ExcelDateTime),
    Text(String),
    /// Cached string result of a formula
    Formula(String),
    Boolean(bool),
    /// Error literal such as `#N/A`
    Error(String),
}

impl Display for CellValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CellValue::Blank => Ok(()),
            CellValue::Number(value) => write!(f, "{value}"),
            CellValue::DateTime(value) => match value.to_text() {
                Some(text) => write!(f, "{text}"),
                None => write!(f, "{}", value.serial()),
            },
            CellValue::Text(value) | CellValue::Formula(value) | CellValue::Error(value) => write!(f, "{value}"),
            CellValue::Boolean(value) => write!(f, "{}", if *value { "TRUE" } else { "FALSE" }),
        }
    }
}

/// A physically present cell with its zero-based position.
#[derive(Clone, Debug, PartialEq)]
pub struct Cell {
    row: usize,
    col: usize,
    value: CellValue,
}

impl Cell {
    pub fn new(row: usize, col: usize, value: CellValue) -> Self {
        Self { row, col, value }
    }

    pub fn row(&self) -> usize {
        self.row
    }

    pub fn col(&self) -> usize {
        self.col
    }

    pub fn value(&self) -> &CellValue {
        &self.value
    }

    /// Excel-style reference, e.g. "B2".
    pub fn reference(&self) -> String {
        index_to_reference(self.row, self.col)
    }

    /// Numeric content; date-formatted cells yield their serial.
    pub fn as_number(&self) -> Option<f64> {
        match &self.value {
            CellValue::Number(value) => Some(*value),
            CellValue::DateTime(value) => Some(value.serial()),
            _ => None,
        }
    }

    /// String content of a text cell.
    pub fn as_str(&self) -> Option<&str> {
        match &self.value {
            CellValue::Text(value) => Some(value),
            _ => None,
        }
    }

    /// Cached string result of a formula cell.
    pub fn as_formula(&self) -> Option<&str> {
        match &self.value {
            CellValue::Formula(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match &self.value {
            CellValue::Boolean(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<NaiveDateTime> {
        match &self.value {
            CellValue::DateTime(value) => value.as_datetime(),
            _ => None,
        }
    }

    /// True for numbers displayed with a date or time format.
    pub fn is_date_formatted(&self) -> bool {
        matches!(self.value, CellValue::DateTime(_))
    }
}
