//! Pieces shared by the xlsx and xls parsers.
use crate::error::RustyRecordError;
use crate::helpers::xml::XmlNodeHelper;
use crate::helpers::zip::ZipHelper;
use crate::match_xml_events;
use crate::spreadsheet::cell::CellValue;
use crate::spreadsheet::cell::DateKind;
use crate::spreadsheet::cell::ExcelDateTime;
use crate::spreadsheet::SpreadsheetError;
use quick_xml::events::Event;
use std::collections::HashMap;
use std::io::Read;
use std::io::Seek;
use zip::ZipArchive;

const TAG_RELATIONSHIP: &[u8] = b"Relationship";

/// Date interpretation of every cell style (XF) of a workbook.
#[derive(Debug, Default)]
pub(crate) struct NumberFormats {
    styles: Vec<Option<DateKind>>,
    is_1904: bool,
}

impl NumberFormats {
    /// Maps each style's format id through the custom formats, then the built-in ids.
    pub(crate) fn new(format_ids: Vec<u16>, custom_formats: HashMap<u16, Option<DateKind>>, is_1904: bool) -> Self {
        let styles = format_ids
            .into_iter()
            .map(|id| custom_formats.get(&id).copied().unwrap_or_else(|| DateKind::from_builtin_format(id)))
            .collect();
        Self { styles, is_1904 }
    }

    pub(crate) fn is_1904(&self) -> bool {
        self.is_1904
    }

    /// Value of a number stored with the given style; unknown styles are plain numbers.
    pub(crate) fn to_value(&self, style: usize, number: f64) -> CellValue {
        match self.styles.get(style).copied().flatten() {
            Some(kind) => CellValue::DateTime(ExcelDateTime::new(number, self.is_1904, kind)),
            None => CellValue::Number(number),
        }
    }
}

/// Loads worksheet relationships: relationship id to part path.
pub(crate) fn load_relationships<RS: Read + Seek>(zip: &mut ZipArchive<RS>, path: &str) -> Result<HashMap<String, String>, RustyRecordError> {
    let mut reader = zip.xml_reader(path)?
        .ok_or_else(|| SpreadsheetError::MissingPartError(path.to_owned()))?;
    let mut relationships: HashMap<String, String> = HashMap::new();
    match_xml_events!(reader => {
        Event::Start(event) if event.local_name().as_ref() == TAG_RELATIONSHIP => {
            let id = event.get_attribute_value("Id")?;
            let kind = event.get_attribute_value("Type")?;
            let target = event.get_attribute_value("Target")?;
            if kind.map(|it| it.ends_with("/worksheet")).unwrap_or(true) {
                if let Some((id, target)) = id.zip(target) {
                    relationships.insert(id.to_string(), to_zip_path(&target));
                }
            }
        }
    });
    Ok(relationships)
}

/// Resolves a relationship target to a part path inside the package.
pub(crate) fn to_zip_path(path: &str) -> String {
    if let Some(path) = path.strip_prefix('/') {
        path.to_owned()
    } else if path.starts_with("xl/") {
        path.to_owned()
    } else {
        format!("xl/{path}")
    }
}
