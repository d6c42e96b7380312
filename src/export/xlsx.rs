//! XLSX Writer Module
//! Serializes one table into a minimal .xlsx workbook.
//!
//! Uses direct ZIP/XML generation: an xlsx file is an OPC package of XML
//! parts, so the workbook is assembled part by part into a `ZipWriter`.
//! Text cells are written as inline strings to avoid a shared-string part.

use std::io::{Cursor, Write};

use thiserror::Error;
use zip::write::FileOptions;
use zip::ZipWriter;

use crate::data::{Cell, Table};

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Padding added to the longest rendered cell when sizing a column.
const WIDTH_PADDING: usize = 2;

/// Writes tables as single-sheet xlsx workbooks.
pub struct XlsxWriter;

impl XlsxWriter {
    /// Serialize a table into an in-memory .xlsx byte buffer.
    pub fn workbook_bytes(table: &Table) -> Result<Vec<u8>, ExportError> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = FileOptions::default();

        // 1. [Content_Types].xml
        zip.start_file("[Content_Types].xml", options)?;
        zip.write_all(Self::content_types_xml().as_bytes())?;

        // 2. _rels/.rels
        zip.start_file("_rels/.rels", options)?;
        zip.write_all(Self::rels_xml().as_bytes())?;

        // 3. xl/workbook.xml
        zip.start_file("xl/workbook.xml", options)?;
        zip.write_all(Self::workbook_xml().as_bytes())?;

        // 4. xl/_rels/workbook.xml.rels
        zip.start_file("xl/_rels/workbook.xml.rels", options)?;
        zip.write_all(Self::workbook_rels_xml().as_bytes())?;

        // 5. xl/worksheets/sheet1.xml
        zip.start_file("xl/worksheets/sheet1.xml", options)?;
        zip.write_all(Self::worksheet_xml(table).as_bytes())?;

        // 6. docProps
        zip.start_file("docProps/core.xml", options)?;
        zip.write_all(Self::core_props_xml().as_bytes())?;
        zip.start_file("docProps/app.xml", options)?;
        zip.write_all(Self::app_props_xml().as_bytes())?;

        let cursor = zip.finish()?;
        Ok(cursor.into_inner())
    }

    /// Spreadsheet cell reference for 0-based column and row indices
    /// ("A1", "AB7", ...).
    pub fn cell_ref(col: usize, row: usize) -> String {
        let mut letters = String::new();
        let mut n = col + 1;
        while n > 0 {
            let rem = (n - 1) % 26;
            letters.insert(0, (b'A' + rem as u8) as char);
            n = (n - 1) / 26;
        }
        format!("{}{}", letters, row + 1)
    }

    fn content_types_xml() -> &'static str {
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
<Default Extension="xml" ContentType="application/xml"/>
<Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>
<Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>
<Override PartName="/docProps/core.xml" ContentType="application/vnd.openxmlformats-package.core-properties+xml"/>
<Override PartName="/docProps/app.xml" ContentType="application/vnd.openxmlformats-officedocument.extended-properties+xml"/>
</Types>"#
    }

    fn rels_xml() -> &'static str {
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/>
<Relationship Id="rId2" Type="http://schemas.openxmlformats.org/package/2006/relationships/metadata/core-properties" Target="docProps/core.xml"/>
<Relationship Id="rId3" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/extended-properties" Target="docProps/app.xml"/>
</Relationships>"#
    }

    fn workbook_xml() -> &'static str {
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
<sheets><sheet name="Sheet1" sheetId="1" r:id="rId1"/></sheets>
</workbook>"#
    }

    fn workbook_rels_xml() -> &'static str {
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/>
</Relationships>"#
    }

    fn worksheet_xml(table: &Table) -> String {
        let mut xml = String::from(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
"#,
        );

        xml.push_str(&Self::cols_xml(table));
        xml.push_str("<sheetData>\n");
        for (row_idx, row) in table.rows().iter().enumerate() {
            xml.push_str(&format!(r#"<row r="{}">"#, row_idx + 1));
            for (col_idx, cell) in row.iter().enumerate() {
                if let Some(markup) = Self::cell_xml(cell, col_idx, row_idx) {
                    xml.push_str(&markup);
                }
            }
            xml.push_str("</row>\n");
        }
        xml.push_str("</sheetData>\n</worksheet>");
        xml
    }

    /// Best-effort column auto-sizing: longest rendered cell plus padding.
    fn cols_xml(table: &Table) -> String {
        if table.width() == 0 {
            return String::new();
        }
        let mut xml = String::from("<cols>");
        for col in 0..table.width() {
            let longest = table
                .rows()
                .iter()
                .map(|row| row[col].to_string().chars().count())
                .max()
                .unwrap_or(0);
            xml.push_str(&format!(
                r#"<col min="{idx}" max="{idx}" width="{width}" customWidth="1"/>"#,
                idx = col + 1,
                width = longest + WIDTH_PADDING,
            ));
        }
        xml.push_str("</cols>\n");
        xml
    }

    fn cell_xml(cell: &Cell, col: usize, row: usize) -> Option<String> {
        let r = Self::cell_ref(col, row);
        match cell {
            Cell::Empty => None,
            Cell::Int(v) => Some(format!(r#"<c r="{}"><v>{}</v></c>"#, r, v)),
            Cell::Float(v) => Some(format!(r#"<c r="{}"><v>{}</v></c>"#, r, v)),
            Cell::Text(s) => Some(format!(
                r#"<c r="{}" t="inlineStr"><is><t xml:space="preserve">{}</t></is></c>"#,
                r,
                xml_escape(s)
            )),
        }
    }

    fn core_props_xml() -> &'static str {
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<cp:coreProperties xmlns:cp="http://schemas.openxmlformats.org/package/2006/metadata/core-properties" xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:dcterms="http://purl.org/dc/terms/" xmlns:dcmitype="http://purl.org/dc/dcmitype/" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">
<dc:creator>markbook</dc:creator>
<cp:lastModifiedBy>markbook</cp:lastModifiedBy>
<cp:revision>1</cp:revision>
</cp:coreProperties>"#
    }

    fn app_props_xml() -> &'static str {
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Properties xmlns="http://schemas.openxmlformats.org/officeDocument/2006/extended-properties" xmlns:vt="http://schemas.openxmlformats.org/officeDocument/2006/docPropsVTypes">
<Application>markbook</Application>
<DocSecurity>0</DocSecurity>
<ScaleCrop>false</ScaleCrop>
<SharedDoc>false</SharedDoc>
<HyperlinksChanged>false</HyperlinksChanged>
<AppVersion>16.0000</AppVersion>
</Properties>"#
    }
}

/// Escape text for XML element content and attribute values.
pub fn xml_escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use zip::ZipArchive;

    #[test]
    fn cell_refs_use_spreadsheet_letters() {
        assert_eq!(XlsxWriter::cell_ref(0, 0), "A1");
        assert_eq!(XlsxWriter::cell_ref(2, 1), "C2");
        assert_eq!(XlsxWriter::cell_ref(25, 0), "Z1");
        assert_eq!(XlsxWriter::cell_ref(26, 6), "AA7");
        assert_eq!(XlsxWriter::cell_ref(27, 0), "AB1");
    }

    #[test]
    fn escapes_markup_characters() {
        assert_eq!(xml_escape("a<b>&\"c\""), "a&lt;b&gt;&amp;&quot;c&quot;");
    }

    #[test]
    fn workbook_contains_all_required_parts() {
        let table = Table::from_rows(vec![vec![Cell::from("Register No"), Cell::from("Name")]]);
        let bytes = XlsxWriter::workbook_bytes(&table).unwrap();

        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        for part in [
            "[Content_Types].xml",
            "_rels/.rels",
            "xl/workbook.xml",
            "xl/_rels/workbook.xml.rels",
            "xl/worksheets/sheet1.xml",
            "docProps/core.xml",
            "docProps/app.xml",
        ] {
            assert!(archive.by_name(part).is_ok(), "missing part {}", part);
        }
    }

    #[test]
    fn worksheet_renders_values_and_skips_empty_cells() {
        let table = Table::from_rows(vec![vec![
            Cell::from("28M231001"),
            Cell::Int(83),
            Cell::Empty,
            Cell::Float(12.5),
        ]]);
        let bytes = XlsxWriter::workbook_bytes(&table).unwrap();

        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        let mut sheet = String::new();
        archive
            .by_name("xl/worksheets/sheet1.xml")
            .unwrap()
            .read_to_string(&mut sheet)
            .unwrap();

        assert!(sheet.contains(r#"<c r="A1" t="inlineStr"><is><t xml:space="preserve">28M231001</t></is></c>"#));
        assert!(sheet.contains(r#"<c r="B1"><v>83</v></c>"#));
        assert!(!sheet.contains(r#"r="C1""#));
        assert!(sheet.contains(r#"<c r="D1"><v>12.5</v></c>"#));
    }

    #[test]
    fn columns_are_auto_sized() {
        let table = Table::from_rows(vec![
            vec![Cell::from("Register No")],
            vec![Cell::from("28M231001")],
        ]);
        let bytes = XlsxWriter::workbook_bytes(&table).unwrap();

        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        let mut sheet = String::new();
        archive
            .by_name("xl/worksheets/sheet1.xml")
            .unwrap()
            .read_to_string(&mut sheet)
            .unwrap();

        // "Register No" is 11 chars, plus padding
        assert!(sheet.contains(r#"<col min="1" max="1" width="13" customWidth="1"/>"#));
    }
}
