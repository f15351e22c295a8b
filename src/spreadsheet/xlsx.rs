use crate::error::RustyRecordError;
use crate::helpers::xml::push_reference;
use crate::helpers::xml::XmlNodeHelper;
use crate::helpers::xml::XmlReader;
use crate::helpers::zip::ZipHelper;
use crate::match_xml_events;
use crate::spreadsheet::cell::Cell;
use crate::spreadsheet::cell::CellValue;
use crate::spreadsheet::cell::DateKind;
use crate::spreadsheet::cell::ExcelDateTime;
use crate::spreadsheet::excel::load_relationships;
use crate::spreadsheet::excel::NumberFormats;
use crate::spreadsheet::reference::index_to_reference;
use crate::spreadsheet::reference::reference_to_index;
use crate::spreadsheet::sheet::Sheet;
use crate::spreadsheet::Spreadsheet;
use crate::spreadsheet::SpreadsheetError;
use chrono::NaiveDate;
use chrono::NaiveDateTime;
use chrono::NaiveTime;
use chrono::Timelike;
use quick_xml::events::Event;
use std::collections::HashMap;
use std::io::BufRead;
use std::io::Read;
use std::io::Seek;
use tracing::debug;
use zip::ZipArchive;

// SpreadsheetML element names, matched by local name
const TAG_CUSTOM_FORMATS: &[u8] = b"numFmts";
const TAG_CUSTOM_FORMAT: &[u8] = b"numFmt";
const TAG_FORMAT_INDEXES: &[u8] = b"cellXfs";
const TAG_FORMAT_INDEX: &[u8] = b"xf";
const TAG_SHARED_STRING_ITEM: &[u8] = b"si";
const TAG_PHONETIC_TEXT: &[u8] = b"rPh";
const TAG_TEXT: &[u8] = b"t";
const TAG_WORKBOOK_PROPERTIES: &[u8] = b"workbookPr";
const TAG_SHEET: &[u8] = b"sheet";
const TAG_ROW: &[u8] = b"row";
const TAG_CELL: &[u8] = b"c";
const TAG_INLINE_STRING: &[u8] = b"is";
const TAG_VALUE: &[u8] = b"v";

const WORKBOOK_PART: &str = "xl/workbook.xml";

/// Office Open XML workbook held in a ZIP package.
pub(crate) struct XlsxSpreadsheet<RS: Read + Seek> {
    zip: ZipArchive<RS>,
    shared_strings: Vec<String>,
    number_formats: NumberFormats,
    /// (sheet name, part path) in workbook order
    sheets: Vec<(String, String)>,
}

impl<RS: Read + Seek> XlsxSpreadsheet<RS> {
    /// Opens the package and loads workbook-level parts.
    /// Packages without a workbook part (e.g. word-processing documents) are unsupported.
    pub(crate) fn open(reader: RS) -> Result<XlsxSpreadsheet<RS>, RustyRecordError> {
        let mut zip = ZipArchive::new(reader)?;
        if !zip.contains(WORKBOOK_PART) {
            let message = if zip.contains("[Content_Types].xml") {
                "package has no workbook part"
            } else {
                "zip archive is not an Office Open XML package"
            };
            Err(RustyRecordError::UnsupportedFormat(message.to_owned()))?
        }
        let (sheets, is_1904) = load_workbook(&mut zip)?;
        let number_formats = load_number_formats(&mut zip, is_1904)?;
        let shared_strings = load_shared_strings(&mut zip)?;
        debug!(sheets = sheets.len(), shared_strings = shared_strings.len(), is_1904 = number_formats.is_1904(), "opened xlsx package");
        Ok(XlsxSpreadsheet {
            zip,
            shared_strings,
            number_formats,
            sheets,
        })
    }
}

impl<RS: Read + Seek> Spreadsheet for XlsxSpreadsheet<RS> {
    fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(|(name, _)| name.as_str()).collect()
    }

    fn read_sheet(&mut self, position: usize) -> Result<Sheet, RustyRecordError> {
        let XlsxSpreadsheet { zip, shared_strings, number_formats, sheets } = self;
        let (sheet_name, zip_path) = &sheets[position];
        let mut sheet = Sheet::new(sheet_name);
        let mut reader = zip.xml_reader(zip_path)?
            .ok_or_else(|| SpreadsheetError::MissingPartError(zip_path.to_owned()))?;

        let mut row_count = 0usize;
        let mut col_count = 0usize;
        let mut row = 0usize;
        let mut col = 0usize;
        let mut kind = String::new();
        let mut style = 0usize;
        let mut value = None::<String>;
        match_xml_events!(reader => {
            Event::Start(event) if event.local_name().as_ref() == TAG_ROW => {
                row_count = event.parse_attribute_value::<usize>("r")?
                    .filter(|number| *number > 0)
                    .map(|number| number - 1)
                    .unwrap_or(row_count);
                col_count = 0;
                sheet.push_row(row_count);
            }
            Event::End(event) if event.local_name().as_ref() == TAG_ROW => {
                row_count += 1;
            }
            Event::Start(event) if event.local_name().as_ref() == TAG_CELL => {
                (row, col) = event.get_attribute_value("r")?
                    .and_then(|reference| reference_to_index(&reference))
                    .unwrap_or((row_count, col_count));
                col_count = col + 1;
                kind = event.get_attribute_value("t")?.map(|t| t.to_string()).unwrap_or_default();
                style = event.parse_attribute_value::<usize>("s")?.unwrap_or(0);
                value = None;
            }
            Event::Start(event) if event.local_name().as_ref() == TAG_INLINE_STRING => {
                value = Some(read_string_value(&mut reader, TAG_INLINE_STRING, false)?);
            }
            Event::Start(event) if event.local_name().as_ref() == TAG_VALUE => {
                value = Some(read_string_value(&mut reader, TAG_VALUE, true)?);
            }
            Event::End(event) if event.local_name().as_ref() == TAG_CELL => {
                let cell_value = to_cell_value(shared_strings, number_formats, &kind, style, value.take())
                    .map_err(|error| SpreadsheetError::CellValueError(index_to_reference(row, col), error.to_string()))?;
                sheet.push(Cell::new(row, col, cell_value));
            }
        });
        sheet.finish();
        Ok(sheet)
    }
}

/// Decodes the raw `<v>` content according to the cell's `t` attribute.
fn to_cell_value(
    shared_strings: &[String],
    number_formats: &NumberFormats,
    kind: &str,
    style: usize,
    value: Option<String>,
) -> Result<CellValue, RustyRecordError> {
    let Some(value) = value else {
        return Ok(CellValue::Blank);
    };
    let cell_value = match kind {
        "s" => {
            let index = value.trim().parse::<usize>()?;
            let string = shared_strings.get(index).ok_or(SpreadsheetError::SharedStringIndexError(index))?;
            CellValue::Text(string.to_owned())
        }
        "inlineStr" => CellValue::Text(value),
        "str" => CellValue::Formula(value),
        "b" => CellValue::Boolean(matches!(value.trim(), "1" | "true" | "TRUE")),
        "e" => CellValue::Error(value),
        "d" => parse_iso_datetime(value.trim())
            .map(CellValue::DateTime)
            .ok_or_else(|| SpreadsheetError::DateValueError(value.to_owned()))?,
        _ if value.trim().is_empty() => CellValue::Blank,
        _ => number_formats.to_value(style, value.trim().parse::<f64>()?),
    };
    Ok(cell_value)
}

/// Parses an ISO 8601 value of a `t="d"` cell.
fn parse_iso_datetime(value: &str) -> Option<ExcelDateTime> {
    let value = value.trim_end_matches('Z');
    if let Ok(datetime) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f") {
        Some(ExcelDateTime::from_datetime(datetime, DateKind::DateTime))
    } else if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        date.and_hms_opt(0, 0, 0).map(|datetime| ExcelDateTime::from_datetime(datetime, DateKind::Date))
    } else if let Ok(time) = NaiveTime::parse_from_str(value, "%H:%M:%S%.f") {
        let seconds = time.num_seconds_from_midnight() as f64 + time.nanosecond() as f64 / 1e9;
        Some(ExcelDateTime::new(seconds / 86_400.0, false, DateKind::Time))
    } else {
        None
    }
}

/// Reads sheet names, their part paths and the date system from workbook.xml.
fn load_workbook<RS: Read + Seek>(zip: &mut ZipArchive<RS>) -> Result<(Vec<(String, String)>, bool), RustyRecordError> {
    let relationships = load_relationships(zip, "xl/_rels/workbook.xml.rels")?;
    let mut reader = zip.xml_reader(WORKBOOK_PART)?
        .ok_or_else(|| SpreadsheetError::MissingPartError(WORKBOOK_PART.to_owned()))?;
    let mut sheets: Vec<(String, String)> = Vec::new();
    let mut is_1904 = false;
    match_xml_events!(reader => {
        Event::Start(event) if event.local_name().as_ref() == TAG_SHEET => {
            // The relationship id is namespaced (r:id), matched by local name
            let name = event.get_attribute_value("name")?;
            let id = event.get_attribute_value("id")?;
            if let Some((name, id)) = name.zip(id) {
                if let Some(path) = relationships.get(&*id) {
                    sheets.push((name.to_string(), path.to_owned()));
                }
            }
        }
        Event::Start(event) if event.local_name().as_ref() == TAG_WORKBOOK_PROPERTIES => {
            is_1904 = event.get_attribute_value("date1904")?
                .map(|value| value == "1" || value == "true")
                .unwrap_or(false);
        }
    });
    Ok((sheets, is_1904))
}

/// Loads custom number formats and the number format id of every cell style.
fn load_number_formats<RS: Read + Seek>(zip: &mut ZipArchive<RS>, is_1904: bool) -> Result<NumberFormats, RustyRecordError> {
    let mut reader = match zip.xml_reader("xl/styles.xml")? {
        Some(reader) => reader,
        None => return Ok(NumberFormats::new(Vec::new(), HashMap::new(), is_1904)),
    };

    let mut custom_formats_context = false;
    let mut custom_formats = HashMap::<u16, Option<DateKind>>::new();
    let mut format_indexes_context = false;
    let mut format_indexes = Vec::<u16>::new();
    match_xml_events!(reader => {
        Event::Start(event) if event.local_name().as_ref() == TAG_CUSTOM_FORMATS => custom_formats_context = true,
        Event::End(event) if event.local_name().as_ref() == TAG_CUSTOM_FORMATS => custom_formats_context = false,
        Event::Start(event) if custom_formats_context && event.local_name().as_ref() == TAG_CUSTOM_FORMAT => {
            let id = event.parse_attribute_value::<u16>("numFmtId")?;
            let format = event.get_attribute_value("formatCode")?;
            if let Some((id, format)) = id.zip(format) {
                custom_formats.insert(id, DateKind::from_custom_format(&format));
            }
        }
        Event::Start(event) if event.local_name().as_ref() == TAG_FORMAT_INDEXES => format_indexes_context = true,
        Event::End(event) if event.local_name().as_ref() == TAG_FORMAT_INDEXES => format_indexes_context = false,
        Event::Start(event) if format_indexes_context && event.local_name().as_ref() == TAG_FORMAT_INDEX => {
            format_indexes.push(event.parse_attribute_value::<u16>("numFmtId")?.unwrap_or(0));
        }
    });
    Ok(NumberFormats::new(format_indexes, custom_formats, is_1904))
}

/// Loads the whole shared string table.
fn load_shared_strings<RS: Read + Seek>(zip: &mut ZipArchive<RS>) -> Result<Vec<String>, RustyRecordError> {
    let mut shared_strings = Vec::<String>::new();
    let mut reader = match zip.xml_reader("xl/sharedStrings.xml")? {
        Some(reader) => reader,
        None => return Ok(shared_strings),
    };
    match_xml_events!(reader => {
        Event::Start(event) if event.local_name().as_ref() == TAG_SHARED_STRING_ITEM => {
            shared_strings.push(read_string_value(&mut reader, TAG_SHARED_STRING_ITEM, false)?);
        }
    });
    Ok(shared_strings)
}

/// Collects the text up to `end_tag`, skipping phonetic runs.
/// `<v>` content is text itself; string items keep theirs in `<t>` children.
fn read_string_value<R: BufRead>(reader: &mut XmlReader<R>, end_tag: &[u8], is_text_content: bool) -> Result<String, RustyRecordError> {
    let mut is_phonetic_text = false;
    let mut is_text = is_text_content;
    let mut text = String::new();
    match_xml_events!(reader => {
        Event::End(event) if event.local_name().as_ref() == end_tag => break,
        Event::Start(event) if event.local_name().as_ref() == TAG_PHONETIC_TEXT => is_phonetic_text = true,
        Event::End(event) if event.local_name().as_ref() == TAG_PHONETIC_TEXT => is_phonetic_text = false,
        Event::Start(event) if !is_phonetic_text && event.local_name().as_ref() == TAG_TEXT => is_text = true,
        Event::End(event) if is_text && event.local_name().as_ref() == TAG_TEXT => is_text = false,
        Event::Text(event) if is_text => text.push_str(&event.xml_content()?),
        Event::CData(event) if is_text => text.push_str(&event.xml_content()?),
        Event::GeneralRef(event) if is_text => push_reference(&mut text, &event)?,
    });
    Ok(text)
}
