//! In-memory workbook builders for tests.
use std::io::Cursor;
use std::io::Write;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

const FREE_SECTOR: u32 = 0xFFFF_FFFF;
const END_OF_CHAIN: u32 = 0xFFFF_FFFE;
const FAT_SECTOR: u32 = 0xFFFF_FFFD;
const SECTOR_SIZE: usize = 512;

/// Zips the given (path, content) parts.
pub(crate) fn zip_package(parts: &[(&str, &str)]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (path, content) in parts {
        writer.start_file(*path, SimpleFileOptions::default()).unwrap();
        writer.write_all(content.as_bytes()).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// Minimal xlsx package. Style 0 is General and style 1 a date (format id 14).
pub(crate) fn xlsx_workbook(sheets: &[(&str, &str)], shared_strings: &[&str]) -> Vec<u8> {
    let mut workbook = String::from(r#"<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets>"#);
    let mut relationships = String::from(r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#);
    for (index, (name, _)) in sheets.iter().enumerate() {
        workbook.push_str(&format!(r#"<sheet name="{name}" sheetId="{0}" r:id="rId{0}"/>"#, index + 1));
        relationships.push_str(&format!(
            r#"<Relationship Id="rId{0}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet{0}.xml"/>"#,
            index + 1
        ));
    }
    workbook.push_str("</sheets></workbook>");
    relationships.push_str("</Relationships>");

    let styles = r#"<styleSheet><cellXfs count="2"><xf numFmtId="0"/><xf numFmtId="14" applyNumberFormat="1"/></cellXfs></styleSheet>"#;
    let mut strings = String::from("<sst>");
    for string in shared_strings {
        strings.push_str(&format!("<si><t>{string}</t></si>"));
    }
    strings.push_str("</sst>");

    let paths: Vec<String> = (1..=sheets.len()).map(|index| format!("xl/worksheets/sheet{index}.xml")).collect();
    let mut parts = vec![
        ("[Content_Types].xml", "<Types/>"),
        ("xl/workbook.xml", workbook.as_str()),
        ("xl/_rels/workbook.xml.rels", relationships.as_str()),
        ("xl/styles.xml", styles),
        ("xl/sharedStrings.xml", strings.as_str()),
    ];
    for (path, (_, content)) in paths.iter().zip(sheets) {
        parts.push((path.as_str(), *content));
    }
    zip_package(&parts)
}

/// Worksheet XML from rows of values; numeric-looking values become number
/// cells, the rest inline strings.
pub(crate) fn worksheet(rows: &[&[&str]]) -> String {
    let mut xml = String::from("<worksheet><sheetData>");
    for (row, values) in rows.iter().enumerate() {
        xml.push_str(&format!(r#"<row r="{}">"#, row + 1));
        for (col, value) in values.iter().enumerate() {
            let reference = crate::spreadsheet::reference::index_to_reference(row, col);
            if value.parse::<f64>().is_ok() {
                xml.push_str(&format!(r#"<c r="{reference}"><v>{value}</v></c>"#));
            } else {
                xml.push_str(&format!(r#"<c r="{reference}" t="inlineStr"><is><t>{value}</t></is></c>"#));
            }
        }
        xml.push_str("</row>");
    }
    xml.push_str("</sheetData></worksheet>");
    xml
}

/// Version 3 compound file holding up to three streams.
/// Streams are padded to the mini stream cutoff so they live in regular sectors.
pub(crate) fn compound_file(streams: &[(&str, Vec<u8>)]) -> Vec<u8> {
    assert!(streams.len() <= 3, "one directory sector holds four entries");
    let mut fat = vec![FAT_SECTOR, END_OF_CHAIN];
    let mut directory = directory_entry("Root Entry", 5, END_OF_CHAIN, 0);
    let mut sectors = Vec::new();
    for (name, payload) in streams {
        let size = payload.len().max(4096);
        let count = size.div_ceil(SECTOR_SIZE);
        let start = fat.len() as u32;
        for index in 0..count {
            let next = if index + 1 == count { END_OF_CHAIN } else { start + index as u32 + 1 };
            fat.push(next);
        }
        directory.extend(directory_entry(name, 2, start, size));
        let mut data = payload.clone();
        data.resize(count * SECTOR_SIZE, 0);
        sectors.extend(data);
    }
    assert!(fat.len() <= SECTOR_SIZE / 4, "one FAT sector addresses 128 sectors");
    fat.resize(SECTOR_SIZE / 4, FREE_SECTOR);
    directory.resize(SECTOR_SIZE, 0);

    let mut header = vec![0u8; SECTOR_SIZE];
    header[..8].copy_from_slice(&[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1]);
    header[24..26].copy_from_slice(&0x003Eu16.to_le_bytes());
    header[26..28].copy_from_slice(&3u16.to_le_bytes());
    header[28..30].copy_from_slice(&0xFFFEu16.to_le_bytes());
    header[30..32].copy_from_slice(&9u16.to_le_bytes());
    header[32..34].copy_from_slice(&6u16.to_le_bytes());
    header[44..48].copy_from_slice(&1u32.to_le_bytes());
    header[48..52].copy_from_slice(&1u32.to_le_bytes());
    header[56..60].copy_from_slice(&4096u32.to_le_bytes());
    header[60..64].copy_from_slice(&END_OF_CHAIN.to_le_bytes());
    header[68..72].copy_from_slice(&END_OF_CHAIN.to_le_bytes());
    for (index, chunk) in header[76..].chunks_exact_mut(4).enumerate() {
        let sector = if index == 0 { 0 } else { FREE_SECTOR };
        chunk.copy_from_slice(&sector.to_le_bytes());
    }

    let mut data = header;
    data.extend(fat.iter().flat_map(|entry| entry.to_le_bytes()));
    data.extend(directory);
    data.extend(sectors);
    data
}

fn directory_entry(name: &str, object_type: u8, start: u32, size: usize) -> Vec<u8> {
    let mut entry = vec![0u8; 128];
    let name: Vec<u8> = name.encode_utf16().flat_map(|unit| unit.to_le_bytes()).collect();
    entry[..name.len()].copy_from_slice(&name);
    entry[64..66].copy_from_slice(&((name.len() + 2) as u16).to_le_bytes());
    entry[66] = object_type;
    entry[68..80].copy_from_slice(&[0xFF; 12]);
    entry[116..120].copy_from_slice(&start.to_le_bytes());
    entry[120..128].copy_from_slice(&(size as u64).to_le_bytes());
    entry
}

/// Cell records for [`xls_stream`]: (row, col, ...).
pub(crate) enum XlsCell<'a> {
    Label(u16, u16, &'a str),
    Rk(u16, u16, i32),
    /// Number with its style index (1 is a date style)
    Number(u16, u16, f64, u16),
    Bool(u16, u16, bool),
    Error(u16, u16, u8),
    Blank(u16, u16),
    FormulaString(u16, u16, &'a str),
    FormulaNumber(u16, u16, f64),
    /// ROW record of a row, with or without cells
    Row(u16),
}

fn record(kind: u16, payload: &[u8]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(payload.len() + 4);
    bytes.extend_from_slice(&kind.to_le_bytes());
    bytes.extend_from_slice(&(payload.len() as u16).to_le_bytes());
    bytes.extend_from_slice(payload);
    bytes
}

/// XLUnicodeString stored as UTF-16.
fn unicode_string(value: &str) -> Vec<u8> {
    let units: Vec<u16> = value.encode_utf16().collect();
    let mut bytes = (units.len() as u16).to_le_bytes().to_vec();
    bytes.push(1);
    bytes.extend(units.iter().flat_map(|unit| unit.to_le_bytes()));
    bytes
}

fn cell_header(row: u16, col: u16, style: u16) -> Vec<u8> {
    [row.to_le_bytes(), col.to_le_bytes(), style.to_le_bytes()].concat()
}

fn cell_records(cell: &XlsCell) -> Vec<u8> {
    match cell {
        XlsCell::Label(row, col, value) => record(516, &[cell_header(*row, *col, 0), unicode_string(value)].concat()),
        XlsCell::Rk(row, col, value) => {
            let rk = ((*value << 2) as u32) | 0x02;
            record(638, &[cell_header(*row, *col, 0), rk.to_le_bytes().to_vec()].concat())
        }
        XlsCell::Number(row, col, value, style) => record(515, &[cell_header(*row, *col, *style), value.to_le_bytes().to_vec()].concat()),
        XlsCell::Bool(row, col, value) => record(517, &[cell_header(*row, *col, 0), vec![*value as u8, 0]].concat()),
        XlsCell::Error(row, col, code) => record(517, &[cell_header(*row, *col, 0), vec![*code, 1]].concat()),
        XlsCell::Blank(row, col) => record(513, &cell_header(*row, *col, 0)),
        XlsCell::FormulaString(row, col, value) => {
            let result = [0, 0, 0, 0, 0, 0, 0xFF, 0xFF];
            let mut bytes = record(6, &[cell_header(*row, *col, 0), result.to_vec(), vec![0; 8]].concat());
            bytes.extend(record(519, &unicode_string(value)));
            bytes
        }
        XlsCell::Row(row) => {
            let payload = [row.to_le_bytes(), [0; 2], [0; 2], 0x00FFu16.to_le_bytes(), [0; 2], [0; 2], [0; 2], 0x0100u16.to_le_bytes()].concat();
            record(520, &payload)
        }
        XlsCell::FormulaNumber(row, col, value) => {
            record(6, &[cell_header(*row, *col, 0), value.to_le_bytes().to_vec(), vec![0; 8]].concat())
        }
    }
}

/// BIFF8 workbook stream: globals with two styles (General, date) followed by
/// one substream per sheet.
pub(crate) fn xls_stream(sheets: &[(&str, Vec<XlsCell>)]) -> Vec<u8> {
    let bof = |kind: u16| record(2057, &[0x0600u16.to_le_bytes(), kind.to_le_bytes(), [0; 2], [0; 2], [0; 2], [0; 2], [0; 2], [0; 2]].concat());
    let eof = record(10, &[]);
    let xf = |format: u16| record(224, &[0u16.to_le_bytes().to_vec(), format.to_le_bytes().to_vec(), vec![0; 16]].concat());

    let mut globals = bof(0x0005);
    globals.extend(record(66, &1200u16.to_le_bytes()));
    globals.extend(xf(0));
    globals.extend(xf(14));
    let mut pointer_offsets = Vec::new();
    for (name, _) in sheets {
        pointer_offsets.push(globals.len() + 4);
        let mut payload = vec![0u8; 6];
        payload.push(name.len() as u8);
        payload.push(0);
        payload.extend(name.bytes());
        globals.extend(record(133, &payload));
    }
    globals.extend(&eof);

    let mut stream = globals;
    for ((_, cells), offset) in sheets.iter().zip(pointer_offsets) {
        let position = stream.len() as u32;
        stream[offset..offset + 4].copy_from_slice(&position.to_le_bytes());
        stream.extend(bof(0x0010));
        for cell in cells {
            stream.extend(cell_records(cell));
        }
        stream.extend(&eof);
    }
    stream
}
