//! Table Loader Module
//! Decodes uploaded marksheet sources (xlsx or delimited text) into tables.

use std::io::{Cursor, Read, Write};
use std::path::Path;

use polars::prelude::*;
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::debug;
use ::zip::ZipArchive;

use crate::data::table::{Cell, Table};

#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("Failed to load CSV: {0}")]
    Csv(#[from] PolarsError),
    #[error("Failed to open workbook: {0}")]
    Zip(#[from] ::zip::result::ZipError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Workbook has no readable worksheet")]
    MissingWorksheet,
    #[error("Unsupported file type: {0}")]
    UnsupportedFormat(String),
}

/// Accepted marksheet source formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    /// A spreadsheet workbook; only the first sheet is read.
    Xlsx,
    /// A delimited text file with no header row.
    Csv,
}

impl SourceFormat {
    /// Infer the format from a file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_string_lossy().to_lowercase();
        match ext.as_str() {
            "xlsx" => Some(SourceFormat::Xlsx),
            "csv" | "txt" => Some(SourceFormat::Csv),
            _ => None,
        }
    }
}

/// Decodes marksheet files into the raw table shape.
///
/// No header row is assumed in either source format; every decoded row is
/// data. Rows are padded so the result is rectangular.
pub struct TableLoader;

impl TableLoader {
    /// Load a marksheet from a byte buffer in the given format.
    pub fn load_bytes(bytes: &[u8], format: SourceFormat) -> Result<Table, LoaderError> {
        match format {
            SourceFormat::Xlsx => Self::load_xlsx_bytes(bytes),
            SourceFormat::Csv => Self::load_csv_bytes(bytes),
        }
    }

    /// Load a marksheet from disk, inferring the format from the
    /// file extension.
    pub fn load_path(path: impl AsRef<Path>) -> Result<Table, LoaderError> {
        let path = path.as_ref();
        let format = SourceFormat::from_path(path)
            .ok_or_else(|| LoaderError::UnsupportedFormat(path.display().to_string()))?;
        match format {
            SourceFormat::Csv => Self::load_csv_path(&path.to_string_lossy()),
            SourceFormat::Xlsx => Self::load_xlsx_bytes(&std::fs::read(path)?),
        }
    }

    /// Load a delimited text file using Polars.
    fn load_csv_path(file_path: &str) -> Result<Table, LoaderError> {
        let df = LazyCsvReader::new(file_path)
            .with_has_header(false)
            .with_infer_schema_length(Some(10000))
            .with_ignore_errors(true)
            .finish()?
            .collect()?;
        debug!(rows = df.height(), cols = df.width(), "loaded CSV");
        Ok(Self::dataframe_to_table(&df))
    }

    /// CSV bytes go through a scoped temp file so Polars can read a path;
    /// the file is removed on drop whether decoding succeeds or fails.
    fn load_csv_bytes(bytes: &[u8]) -> Result<Table, LoaderError> {
        let mut tmp = NamedTempFile::new()?;
        tmp.write_all(bytes)?;
        tmp.flush()?;
        Self::load_csv_path(&tmp.path().to_string_lossy())
    }

    /// Convert a DataFrame into the raw table shape, cell by cell.
    fn dataframe_to_table(df: &DataFrame) -> Table {
        let columns = df.get_columns();
        let mut rows = Vec::with_capacity(df.height());
        for i in 0..df.height() {
            let mut row = Vec::with_capacity(columns.len());
            for column in columns {
                row.push(match column.get(i) {
                    Ok(AnyValue::Null) | Err(_) => Cell::Empty,
                    Ok(AnyValue::Int64(v)) => Cell::Int(v),
                    Ok(AnyValue::Int32(v)) => Cell::Int(v as i64),
                    Ok(AnyValue::UInt64(v)) => Cell::Int(v as i64),
                    Ok(AnyValue::UInt32(v)) => Cell::Int(v as i64),
                    Ok(AnyValue::Float64(v)) => Cell::Float(v),
                    Ok(AnyValue::Float32(v)) => Cell::Float(v as f64),
                    Ok(AnyValue::String(s)) => Cell::Text(s.to_string()),
                    Ok(other) => Cell::Text(other.to_string().trim_matches('"').to_string()),
                });
            }
            rows.push(row);
        }
        Table::from_rows(rows)
    }

    /// Read the first worksheet of an xlsx workbook.
    fn load_xlsx_bytes(bytes: &[u8]) -> Result<Table, LoaderError> {
        let mut archive = ZipArchive::new(Cursor::new(bytes))?;

        let shared = match Self::read_entry(&mut archive, "xl/sharedStrings.xml") {
            Some(xml) => parse_shared_strings(&xml),
            None => Vec::new(),
        };

        let sheet_path = Self::first_sheet_path(&mut archive);
        let sheet_xml = Self::read_entry(&mut archive, &sheet_path)
            .ok_or(LoaderError::MissingWorksheet)?;
        debug!(sheet = %sheet_path, "decoding worksheet");
        Ok(parse_worksheet(&sheet_xml, &shared))
    }

    /// Resolve the first sheet's part path via the workbook relationships,
    /// falling back to the conventional location.
    fn first_sheet_path(archive: &mut ZipArchive<Cursor<&[u8]>>) -> String {
        const FALLBACK: &str = "xl/worksheets/sheet1.xml";

        let Some(workbook) = Self::read_entry(archive, "xl/workbook.xml") else {
            return FALLBACK.to_string();
        };
        let Some(rels) = Self::read_entry(archive, "xl/_rels/workbook.xml.rels") else {
            return FALLBACK.to_string();
        };

        let target = tag_blocks(&workbook, "sheet")
            .first()
            .and_then(|sheet| attr_value(sheet, "r:id").map(str::to_string))
            .and_then(|rid| {
                tag_blocks(&rels, "Relationship")
                    .into_iter()
                    .find(|rel| attr_value(rel, "Id") == Some(&rid))
                    .and_then(|rel| attr_value(rel, "Target").map(str::to_string))
            });

        match target {
            Some(t) if t.starts_with('/') => t.trim_start_matches('/').to_string(),
            Some(t) => format!("xl/{}", t),
            None => FALLBACK.to_string(),
        }
    }

    fn read_entry(archive: &mut ZipArchive<Cursor<&[u8]>>, name: &str) -> Option<String> {
        let mut entry = archive.by_name(name).ok()?;
        let mut xml = String::new();
        entry.read_to_string(&mut xml).ok()?;
        Some(xml)
    }
}

/// Extract every `<name ...>...</name>` (or self-closing `<name .../>`)
/// block from the XML text, positionally.
fn tag_blocks<'a>(xml: &'a str, name: &str) -> Vec<&'a str> {
    let open = format!("<{}", name);
    let close = format!("</{}>", name);
    let mut blocks = Vec::new();
    let mut pos = 0;

    while let Some(found) = xml[pos..].find(&open) {
        let start = pos + found;
        let after = start + open.len();
        // reject prefix matches such as <sheetData for <sheet
        match xml.as_bytes().get(after) {
            Some(b) if b.is_ascii_whitespace() || *b == b'>' || *b == b'/' => {}
            _ => {
                pos = after;
                continue;
            }
        }
        let Some(head_len) = xml[start..].find('>') else {
            break;
        };
        let head_end = start + head_len;
        if xml.as_bytes()[head_end - 1] == b'/' {
            blocks.push(&xml[start..=head_end]);
            pos = head_end + 1;
        } else if let Some(close_at) = xml[head_end..].find(&close) {
            let end = head_end + close_at + close.len();
            blocks.push(&xml[start..end]);
            pos = end;
        } else {
            break;
        }
    }
    blocks
}

/// Value of an attribute within a single tag's markup.
fn attr_value<'a>(tag: &'a str, name: &str) -> Option<&'a str> {
    let pattern = format!("{}=\"", name);
    let mut pos = 0;
    while let Some(found) = tag[pos..].find(&pattern) {
        let start = pos + found;
        // attribute names must begin at a whitespace boundary
        if start > 0 && tag.as_bytes()[start - 1].is_ascii_whitespace() {
            let value_start = start + pattern.len();
            let value_len = tag[value_start..].find('"')?;
            return Some(&tag[value_start..value_start + value_len]);
        }
        pos = start + pattern.len();
    }
    None
}

/// Concatenated inner text of the `<t>` elements in a block (rich text
/// splits one string across several runs).
fn text_runs(block: &str) -> String {
    let mut text = String::new();
    for t in tag_blocks(block, "t") {
        if let Some(open_end) = t.find('>') {
            if t.ends_with("/>") {
                continue;
            }
            if let Some(close) = t.rfind("</t>") {
                if close > open_end {
                    text.push_str(&xml_unescape(&t[open_end + 1..close]));
                }
            }
        }
    }
    text
}

fn parse_shared_strings(xml: &str) -> Vec<String> {
    tag_blocks(xml, "si").into_iter().map(text_runs).collect()
}

/// Scan worksheet rows and cells into a rectangular table.
fn parse_worksheet(xml: &str, shared: &[String]) -> Table {
    let mut rows: Vec<Vec<Cell>> = Vec::new();

    for (seen, row_block) in tag_blocks(xml, "row").iter().enumerate() {
        // honor the 1-based row reference so blank rows survive
        let row_num = attr_value(row_block, "r")
            .and_then(|r| r.parse::<usize>().ok())
            .unwrap_or(seen + 1);
        while rows.len() < row_num {
            rows.push(Vec::new());
        }
        let row = &mut rows[row_num - 1];

        for (position, cell_block) in tag_blocks(row_block, "c").iter().enumerate() {
            let col = attr_value(cell_block, "r")
                .and_then(column_index)
                .unwrap_or(position);
            while row.len() <= col {
                row.push(Cell::Empty);
            }
            row[col] = parse_cell(cell_block, shared);
        }
    }

    Table::from_rows(rows)
}

fn parse_cell(block: &str, shared: &[String]) -> Cell {
    let cell_type = attr_value(block, "t").unwrap_or("n");
    match cell_type {
        "inlineStr" => Cell::Text(text_runs(block)),
        "s" => match value_text(block).and_then(|v| v.parse::<usize>().ok()) {
            Some(idx) => shared
                .get(idx)
                .map_or(Cell::Empty, |s| Cell::Text(s.clone())),
            None => Cell::Empty,
        },
        "str" => value_text(block).map_or(Cell::Empty, Cell::Text),
        _ => match value_text(block) {
            Some(v) => parse_number(&v),
            None => Cell::Empty,
        },
    }
}

/// Inner text of the cell's `<v>` element.
fn value_text(block: &str) -> Option<String> {
    let v = tag_blocks(block, "v").into_iter().next()?;
    let open_end = v.find('>')?;
    if v.ends_with("/>") {
        return None;
    }
    let close = v.rfind("</v>")?;
    Some(xml_unescape(&v[open_end + 1..close]))
}

/// Numbers that round-trip as integers load as `Int`.
fn parse_number(text: &str) -> Cell {
    if text.is_empty() {
        return Cell::Empty;
    }
    if let Ok(v) = text.parse::<i64>() {
        return Cell::Int(v);
    }
    match text.parse::<f64>() {
        Ok(v) if v.fract() == 0.0 && v.abs() < i64::MAX as f64 => Cell::Int(v as i64),
        Ok(v) => Cell::Float(v),
        Err(_) => Cell::Text(text.to_string()),
    }
}

/// 0-based column index from a cell reference ("A1" → 0, "AB7" → 27).
fn column_index(cell_ref: &str) -> Option<usize> {
    let letters: String = cell_ref
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect();
    if letters.is_empty() {
        return None;
    }
    let mut index = 0usize;
    for ch in letters.chars() {
        index = index * 26 + (ch.to_ascii_uppercase() as usize - 'A' as usize + 1);
    }
    Some(index - 1)
}

fn xml_unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        let Some(semi) = tail.find(';') else {
            out.push_str(tail);
            return out;
        };
        let entity = &tail[1..semi];
        match entity {
            "amp" => out.push('&'),
            "lt" => out.push('<'),
            "gt" => out.push('>'),
            "quot" => out.push('"'),
            "apos" => out.push('\''),
            _ => {
                let code = entity
                    .strip_prefix("#x")
                    .or_else(|| entity.strip_prefix("#X"))
                    .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                    .or_else(|| entity.strip_prefix('#').and_then(|dec| dec.parse().ok()));
                match code.and_then(char::from_u32) {
                    Some(ch) => out.push(ch),
                    None => out.push_str(&tail[..=semi]),
                }
            }
        }
        rest = &tail[semi + 1..];
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;
    use ::zip::write::FileOptions;
    use ::zip::ZipWriter;

    use crate::export::XlsxWriter;

    #[test]
    fn format_is_inferred_from_extension() {
        assert_eq!(
            SourceFormat::from_path(Path::new("marks.XLSX")),
            Some(SourceFormat::Xlsx)
        );
        assert_eq!(
            SourceFormat::from_path(Path::new("marks.csv")),
            Some(SourceFormat::Csv)
        );
        assert_eq!(
            SourceFormat::from_path(Path::new("marks.txt")),
            Some(SourceFormat::Csv)
        );
        assert_eq!(SourceFormat::from_path(Path::new("marks.pdf")), None);
        assert_eq!(SourceFormat::from_path(Path::new("marks")), None);
    }

    #[test]
    fn csv_bytes_decode_with_inferred_types() {
        let csv = b"28M231001,Student A,C01,SUB1,Subject 1,040+043,PASS\n\
                    25F231002,Student B,C01,SUB1,Subject 1,075,PASS\n";
        let table = TableLoader::load_bytes(csv, SourceFormat::Csv).unwrap();

        assert_eq!(table.height(), 2);
        assert_eq!(table.width(), 7);
        assert_eq!(table.cell(0, 0), Some(&Cell::from("28M231001")));
        // mixed "040+043"/"075" column stays text
        assert_eq!(table.cell(1, 5), Some(&Cell::from("075")));
    }

    #[test]
    fn uniform_numeric_csv_column_becomes_ints() {
        let csv = b"a,75\nb,80\n";
        let table = TableLoader::load_bytes(csv, SourceFormat::Csv).unwrap();
        assert_eq!(table.cell(0, 1), Some(&Cell::Int(75)));
        assert_eq!(table.cell(1, 1), Some(&Cell::Int(80)));
    }

    #[test]
    fn unsupported_extension_is_a_structural_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("marks.pdf");
        std::fs::write(&path, b"whatever").unwrap();
        assert!(matches!(
            TableLoader::load_path(&path),
            Err(LoaderError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn garbage_xlsx_bytes_fail_to_open() {
        assert!(TableLoader::load_bytes(b"not a zip", SourceFormat::Xlsx).is_err());
    }

    #[test]
    fn own_workbooks_round_trip() {
        let table = Table::from_rows(vec![
            vec![Cell::from("Register No"), Cell::from("Marks 1")],
            vec![Cell::from("28M231001"), Cell::from("040+043")],
            vec![Cell::from("25F231002"), Cell::Int(75)],
        ]);
        let bytes = XlsxWriter::workbook_bytes(&table).unwrap();
        let loaded = TableLoader::load_bytes(&bytes, SourceFormat::Xlsx).unwrap();
        assert_eq!(loaded, table);
    }

    #[test]
    fn shared_string_workbooks_decode() {
        let sheet = r#"<?xml version="1.0"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
<sheetData>
<row r="1"><c r="A1" t="s"><v>0</v></c><c r="C1"><v>83</v></c></row>
<row r="3"><c r="A3" t="s"><v>1</v></c></row>
</sheetData>
</worksheet>"#;
        let strings = r#"<?xml version="1.0"?>
<sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" count="2" uniqueCount="2">
<si><t>28M231001</t></si>
<si><r><t>Stu</t></r><r><t xml:space="preserve">dent &amp; Co</t></r></si>
</sst>"#;

        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = FileOptions::default();
        zip.start_file("xl/worksheets/sheet1.xml", options).unwrap();
        zip.write_all(sheet.as_bytes()).unwrap();
        zip.start_file("xl/sharedStrings.xml", options).unwrap();
        zip.write_all(strings.as_bytes()).unwrap();
        let bytes = zip.finish().unwrap().into_inner();

        let table = TableLoader::load_bytes(&bytes, SourceFormat::Xlsx).unwrap();
        assert_eq!(table.height(), 3);
        assert_eq!(table.width(), 3);
        assert_eq!(table.cell(0, 0), Some(&Cell::from("28M231001")));
        assert_eq!(table.cell(0, 1), Some(&Cell::Empty));
        assert_eq!(table.cell(0, 2), Some(&Cell::Int(83)));
        // row 2 is blank, row 3 holds the rich-text shared string
        assert_eq!(
            table.row(1).unwrap(),
            &[Cell::Empty, Cell::Empty, Cell::Empty]
        );
        assert_eq!(table.cell(2, 0), Some(&Cell::from("Student & Co")));
    }

    #[test]
    fn column_references_decode() {
        assert_eq!(column_index("A1"), Some(0));
        assert_eq!(column_index("Z9"), Some(25));
        assert_eq!(column_index("AA12"), Some(26));
        assert_eq!(column_index("AB7"), Some(27));
        assert_eq!(column_index("12"), None);
    }

    #[test]
    fn entities_unescape() {
        assert_eq!(xml_unescape("a&amp;b&lt;c&gt;"), "a&b<c>");
        assert_eq!(xml_unescape("&#65;&#x42;"), "AB");
        assert_eq!(xml_unescape("&bogus;"), "&bogus;");
    }

    #[test]
    fn tag_blocks_skip_prefixed_names() {
        let xml =
            r#"<sheetData/><sheet name="One" r:id="rId1"/><sheet name="Two" r:id="rId2"/>"#;
        let sheets = tag_blocks(xml, "sheet");
        assert_eq!(sheets.len(), 2);
        assert_eq!(attr_value(sheets[0], "r:id"), Some("rId1"));
        assert_eq!(attr_value(sheets[0], "name"), Some("One"));
    }
}
