//! ZIP archive access for Office Open XML packages.

use crate::error::RustyRecordError;
use crate::helpers::xml::XmlReader;
use std::io::BufReader;
use std::io::Read;
use std::io::Seek;
use zip::read::ZipFile;
use zip::result::ZipError;
use zip::ZipArchive;

/// Part lookup inside an OOXML package.
pub(crate) trait ZipHelper<RS: Read + Seek> {
    /// Finds a part by name, ignoring case, leading slashes and separator style.
    fn file(&'_ mut self, name: &str) -> Result<Option<ZipFile<'_, RS>>, RustyRecordError>;

    /// Opens a part as an XML event reader.
    fn xml_reader(&'_ mut self, name: &str) -> Result<Option<XmlReader<BufReader<ZipFile<'_, RS>>>>, RustyRecordError>;

    /// Returns true if the package contains the part.
    fn contains(&self, name: &str) -> bool;
}

fn normalize(name: &str) -> String {
    name.replace('\\', "/").trim_start_matches('/').to_owned()
}

impl<RS: Read + Seek> ZipHelper<RS> for ZipArchive<RS> {
    fn file(&'_ mut self, name: &str) -> Result<Option<ZipFile<'_, RS>>, RustyRecordError> {
        let pattern = normalize(name);
        let path = self
            .file_names()
            .find(|file_name| pattern.eq_ignore_ascii_case(&normalize(file_name)))
            .map(|file_name| file_name.to_owned());
        match path.map(|file_name| self.by_name(&file_name)).transpose() {
            Ok(file) => Ok(file),
            Err(ZipError::FileNotFound) => Ok(None),
            Err(error) => Err(error)?,
        }
    }

    fn xml_reader(&'_ mut self, name: &str) -> Result<Option<XmlReader<BufReader<ZipFile<'_, RS>>>>, RustyRecordError> {
        Ok(self.file(name)?.map(|file| XmlReader::new(BufReader::new(file))))
    }

    fn contains(&self, name: &str) -> bool {
        let pattern = normalize(name);
        self.file_names().any(|file_name| pattern.eq_ignore_ascii_case(&normalize(file_name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spreadsheet::fixtures::zip_package;
    use std::io::Cursor;

    #[test]
    fn find_parts_case_insensitively() -> Result<(), RustyRecordError> {
        let bytes = zip_package(&[("xl/Workbook.xml", "<workbook/>")]);
        let mut zip = ZipArchive::new(Cursor::new(bytes))?;

        assert!(zip.contains("/xl/workbook.xml"));
        assert!(zip.contains("xl\\WORKBOOK.xml"));
        assert!(!zip.contains("xl/styles.xml"));

        let mut content = String::new();
        zip.file("xl/workbook.xml")?.expect("part exists").read_to_string(&mut content)?;
        assert_eq!(content, "<workbook/>");
        assert!(zip.file("xl/styles.xml")?.is_none());
        Ok(())
    }
}
