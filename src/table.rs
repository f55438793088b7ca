// 📄 Tabular datasets - CSV / spreadsheet in, CSV out
//
// Every cell is read as text (CSV) or as the spreadsheet's own typed value
// (XLSX), never coerced to a number before normalization.

use crate::error::{ReconError, Result};
use crate::normalize::FieldValue;
use calamine::{open_workbook_auto_from_rs, Data, Reader};
use serde::Serialize;
use std::io::{Cursor, Read, Seek};
use std::path::Path;

// ============================================================================
// TABLE
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<FieldValue>>,
}

static MISSING: FieldValue = FieldValue::Missing;

impl Table {
    pub fn new(headers: Vec<String>) -> Self {
        Table {
            headers,
            rows: Vec::new(),
        }
    }

    /// Build a table from string literals. Empty strings become `Missing`.
    pub fn from_strings(headers: &[&str], rows: &[&[&str]]) -> Self {
        Table {
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: rows
                .iter()
                .map(|row| row.iter().map(|cell| FieldValue::from_text(cell)).collect())
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// 0-based index of the first header equal to `name`.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Cell at (row, column). Cells past the end of a short row are `Missing`.
    pub fn cell(&self, row: usize, column: usize) -> &FieldValue {
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .unwrap_or(&MISSING)
    }

    /// Iterate over one column, padding short rows with `Missing`.
    pub fn column_values(&self, column: usize) -> impl Iterator<Item = &FieldValue> + '_ {
        self.rows
            .iter()
            .map(move |row| row.get(column).unwrap_or(&MISSING))
    }

    /// Append a column; `values` must yield one value per row.
    pub fn push_column(&mut self, header: &str, values: Vec<FieldValue>) {
        debug_assert_eq!(values.len(), self.rows.len());
        let width = self.headers.len();
        self.headers.push(header.to_string());
        for (row, value) in self.rows.iter_mut().zip(values) {
            // Pad ragged rows so the new column lines up with its header.
            if row.len() < width {
                row.resize(width, FieldValue::Missing);
            }
            row.push(value);
        }
    }

    // ========================================================================
    // EXPORT
    // ========================================================================

    /// Serialize as UTF-8 CSV with a header row and no index column.
    pub fn to_csv_bytes(&self) -> Result<Vec<u8>> {
        let mut wtr = csv::WriterBuilder::new()
            .flexible(true)
            .from_writer(Vec::new());

        wtr.write_record(&self.headers)
            .map_err(|e| ReconError::Export(e.to_string()))?;

        for row in &self.rows {
            let record: Vec<String> = (0..self.headers.len().max(row.len()))
                .map(|i| row.get(i).map(FieldValue::to_csv_string).unwrap_or_default())
                .collect();
            wtr.write_record(&record)
                .map_err(|e| ReconError::Export(e.to_string()))?;
        }

        wtr.into_inner()
            .map_err(|e| ReconError::Export(e.to_string()))
    }

    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let bytes = self.to_csv_bytes()?;
        std::fs::write(path, bytes).map_err(|source| ReconError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

// ============================================================================
// LOADING
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Csv,
    Workbook,
}

impl SourceFormat {
    pub fn detect(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "csv" => Some(SourceFormat::Csv),
            "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => Some(SourceFormat::Workbook),
            _ => None,
        }
    }
}

/// Load a table, picking the reader from the file extension.
pub fn load_table(path: &Path) -> Result<Table> {
    match SourceFormat::detect(path) {
        Some(SourceFormat::Csv) => load_csv(path),
        Some(SourceFormat::Workbook) => load_workbook(path),
        None => Err(ReconError::UnsupportedFormat(path.to_path_buf())),
    }
}

pub fn load_csv(path: &Path) -> Result<Table> {
    let file = std::fs::File::open(path).map_err(|source| ReconError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    read_csv(file).map_err(|source| ReconError::Csv {
        path: path.to_path_buf(),
        source,
    })
}

/// Parse CSV from any reader. Every cell stays text.
pub fn read_csv<R: std::io::Read>(reader: R) -> std::result::Result<Table, csv::Error> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let headers = rdr.headers()?.iter().map(|h| h.to_string()).collect();
    let mut table = Table::new(headers);

    for result in rdr.records() {
        let record = result?;
        table.rows.push(record.iter().map(FieldValue::from_text).collect());
    }

    Ok(table)
}

/// Load the first worksheet of a spreadsheet; row 1 holds the headers.
pub fn load_workbook(path: &Path) -> Result<Table> {
    let bytes = std::fs::read(path).map_err(|source| ReconError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    read_workbook(Cursor::new(bytes.as_slice()), path)
}

/// Parse a spreadsheet already in memory. `path` only labels errors.
pub fn read_workbook<RS: Read + Seek + Clone>(reader: RS, path: &Path) -> Result<Table> {
    let workbook_err = |message: String| ReconError::Workbook {
        path: path.to_path_buf(),
        message,
    };

    let mut workbook = open_workbook_auto_from_rs(reader).map_err(|e| workbook_err(e.to_string()))?;
    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| workbook_err("workbook has no sheets".to_string()))?;
    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| workbook_err(e.to_string()))?;

    let mut rows = range.rows();
    let headers = match rows.next() {
        Some(header_row) => header_row.iter().map(header_text).collect(),
        None => Vec::new(),
    };

    let mut table = Table::new(headers);
    for row in rows {
        table.rows.push(row.iter().map(cell_value).collect());
    }

    log::debug!(
        "loaded sheet '{}' from {}: {} rows",
        sheet_name,
        path.display(),
        table.len()
    );
    Ok(table)
}

fn header_text(cell: &Data) -> String {
    cell_value(cell).to_csv_string()
}

/// Map a spreadsheet cell onto the nullable field type.
///
/// Spreadsheets store every number as a float; whole values are read back
/// as integers so `712345678` and `200` export the way they were typed.
fn cell_value(cell: &Data) -> FieldValue {
    match cell {
        Data::Empty | Data::Error(_) => FieldValue::Missing,
        Data::String(s) => FieldValue::from_text(s),
        Data::Int(i) => FieldValue::Integer(*i),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => FieldValue::Integer(*f as i64),
        Data::Float(f) => FieldValue::Number(*f),
        Data::Bool(b) => FieldValue::Text(if *b { "True" } else { "False" }.to_string()),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(naive) => FieldValue::Text(naive.format("%Y-%m-%d %H:%M:%S").to_string()),
            None => FieldValue::Number(dt.as_f64()),
        },
        Data::DateTimeIso(s) | Data::DurationIso(s) => FieldValue::from_text(s),
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_read_csv_keeps_text_and_marks_empty_missing() {
        let data = "name,mobile,amount\nAlice,0712345678,100\nBob,,\n";
        let table = read_csv(data.as_bytes()).unwrap();

        assert_eq!(table.headers, vec!["name", "mobile", "amount"]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.cell(0, 1), &FieldValue::Text("0712345678".to_string()));
        assert_eq!(table.cell(1, 1), &FieldValue::Missing);
        assert_eq!(table.cell(1, 2), &FieldValue::Missing);
    }

    #[test]
    fn test_short_rows_read_as_missing() {
        let data = "a,b,c\n1\n";
        let table = read_csv(data.as_bytes()).unwrap();
        assert_eq!(table.cell(0, 0), &FieldValue::Text("1".to_string()));
        assert_eq!(table.cell(0, 2), &FieldValue::Missing);
        assert_eq!(table.cell(5, 0), &FieldValue::Missing);
        assert_eq!(table.column_values(2).count(), 1);
    }

    #[test]
    fn test_column_index_first_match_wins() {
        let table = Table::from_strings(&["x", "mobile", "mobile"], &[]);
        assert_eq!(table.column_index("mobile"), Some(1));
        assert_eq!(table.column_index("Mobile"), None);
    }

    #[test]
    fn test_push_column_pads_ragged_rows() {
        let mut table = Table::from_strings(&["a", "b"], &[&["1"], &["2", "3"]]);
        table.push_column("c", vec![FieldValue::Integer(1), FieldValue::Integer(2)]);

        assert_eq!(table.headers, vec!["a", "b", "c"]);
        assert_eq!(table.rows[0].len(), 3);
        assert_eq!(table.cell(0, 2), &FieldValue::Integer(1));
        assert_eq!(table.cell(1, 2), &FieldValue::Integer(2));
    }

    #[test]
    fn test_to_csv_bytes_has_header_and_no_index() {
        let mut table = Table::from_strings(&["mobile", "note"], &[&["+255712345678", "a, b"]]);
        table.push_column("count", vec![FieldValue::Integer(2)]);
        table.push_column("repaid", vec![FieldValue::Number(150.0)]);

        let csv = String::from_utf8(table.to_csv_bytes().unwrap()).unwrap();
        assert_eq!(
            csv,
            "mobile,note,count,repaid\n+255712345678,\"a, b\",2,150.0\n"
        );
    }

    #[test]
    fn test_load_table_rejects_unknown_extension() {
        let err = load_table(Path::new("data.json")).unwrap_err();
        assert!(matches!(err, ReconError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_load_csv_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("writeoffs.csv");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "id,mobile").unwrap();
        writeln!(file, "1,+255 712 345 678").unwrap();
        drop(file);

        let table = load_table(&path).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.column_index("mobile"), Some(1));
    }

    #[test]
    fn test_load_csv_missing_file_is_io_error() {
        let err = load_csv(Path::new("/definitely/not/here.csv")).unwrap_err();
        assert!(matches!(err, ReconError::Io { .. }));
    }

    #[test]
    fn test_whole_spreadsheet_numbers_export_as_typed() {
        let mut table = Table::new(vec!["mobile".to_string(), "Total Writtenoff Derived".to_string()]);
        table.rows.push(vec![
            cell_value(&Data::Float(712345678.0)),
            cell_value(&Data::Float(200.0)),
        ]);
        table.push_column("Repayment Phone Matches", vec![FieldValue::Integer(0)]);
        table.push_column("amount repayed", vec![FieldValue::Number(0.0)]);

        let csv = String::from_utf8(table.to_csv_bytes().unwrap()).unwrap();
        assert_eq!(
            csv,
            "mobile,Total Writtenoff Derived,Repayment Phone Matches,amount repayed\n\
             712345678,200,0,0.0\n"
        );
    }

    #[test]
    fn test_cell_value_mapping() {
        assert_eq!(cell_value(&Data::Float(255712345678.0)), FieldValue::Integer(255712345678));
        assert_eq!(cell_value(&Data::Float(-3.0)), FieldValue::Integer(-3));
        assert_eq!(cell_value(&Data::Float(12.5)), FieldValue::Number(12.5));
        assert_eq!(cell_value(&Data::Float(1e20)), FieldValue::Number(1e20));
        assert_eq!(cell_value(&Data::Int(42)), FieldValue::Integer(42));
        assert_eq!(cell_value(&Data::String("0712 345 678".to_string())), FieldValue::Text("0712 345 678".to_string()));
        assert_eq!(cell_value(&Data::String(String::new())), FieldValue::Missing);
        assert_eq!(cell_value(&Data::Empty), FieldValue::Missing);
        assert_eq!(cell_value(&Data::Error(calamine::CellErrorType::NA)), FieldValue::Missing);
        assert_eq!(cell_value(&Data::Error(calamine::CellErrorType::Div0)), FieldValue::Missing);
        assert_eq!(cell_value(&Data::Bool(true)), FieldValue::Text("True".to_string()));
        assert_eq!(cell_value(&Data::Bool(false)), FieldValue::Text("False".to_string()));
        assert_eq!(
            cell_value(&Data::DateTimeIso("2024-03-01T10:00:00".to_string())),
            FieldValue::Text("2024-03-01T10:00:00".to_string())
        );
    }

    #[test]
    fn test_cell_value_renders_dates_as_text() {
        // 45352.5 is 2024-03-01 12:00 in the 1900 date system.
        let dt = calamine::ExcelDateTime::new(
            45352.5,
            calamine::ExcelDateTimeType::DateTime,
            false,
        );
        assert_eq!(
            cell_value(&Data::DateTime(dt)),
            FieldValue::Text("2024-03-01 12:00:00".to_string())
        );
    }

    const SHEET_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
<sheetData>
<row r="1"><c r="A1" t="inlineStr"><is><t>id</t></is></c><c r="B1" t="inlineStr"><is><t>mobile</t></is></c><c r="C1" t="inlineStr"><is><t>Total Writtenoff Derived</t></is></c></row>
<row r="2"><c r="A2"><v>7</v></c><c r="B2"><v>255712345678</v></c><c r="C2"><v>200.5</v></c></row>
<row r="3"><c r="A3" t="inlineStr"><is><t>8</t></is></c><c r="B3" t="inlineStr"><is><t>+255 712 000 111</t></is></c><c r="C3" t="b"><v>1</v></c></row>
<row r="4"><c r="A4"><v>9</v></c><c r="B4" t="e"><v>#N/A</v></c><c r="C4"><v>200</v></c></row>
</sheetData>
</worksheet>"#;

    /// Smallest xlsx package calamine accepts: workbook, its rels, one sheet.
    pub(crate) fn xlsx_bytes() -> Vec<u8> {
        let files = [
            (
                "xl/workbook.xml",
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
<sheets><sheet name="writeoffs" sheetId="1" r:id="rId1"/></sheets>
</workbook>"#,
            ),
            (
                "xl/_rels/workbook.xml.rels",
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/>
</Relationships>"#,
            ),
            ("xl/worksheets/sheet1.xml", SHEET_XML),
        ];

        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Stored);
        for (name, contents) in files {
            zip.start_file(name, options).unwrap();
            zip.write_all(contents.as_bytes()).unwrap();
        }
        zip.finish().unwrap().into_inner()
    }

    #[test]
    fn test_load_workbook_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("writeoffs.xlsx");
        std::fs::write(&path, xlsx_bytes()).unwrap();

        let table = load_table(&path).unwrap();
        assert_eq!(table.headers, vec!["id", "mobile", "Total Writtenoff Derived"]);
        assert_eq!(table.len(), 3);
        assert_eq!(table.cell(0, 0), &FieldValue::Integer(7));
        assert_eq!(table.cell(0, 1), &FieldValue::Integer(255712345678));
        assert_eq!(table.cell(0, 2), &FieldValue::Number(200.5));
        assert_eq!(table.cell(1, 1), &FieldValue::Text("+255 712 000 111".to_string()));
        assert_eq!(table.cell(1, 2), &FieldValue::Text("True".to_string()));
        assert_eq!(table.cell(2, 1), &FieldValue::Missing);

        let csv = String::from_utf8(table.to_csv_bytes().unwrap()).unwrap();
        assert_eq!(
            csv,
            "id,mobile,Total Writtenoff Derived\n\
             7,255712345678,200.5\n\
             8,+255 712 000 111,True\n\
             9,,200\n"
        );
    }

    #[test]
    fn test_read_workbook_from_memory() {
        let bytes = xlsx_bytes();
        let table = read_workbook(Cursor::new(bytes.as_slice()), Path::new("writeoffs.xlsx")).unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.column_index("mobile"), Some(1));
    }

    #[test]
    fn test_corrupt_workbook_is_workbook_error() {
        let err = read_workbook(Cursor::new(&b"not a spreadsheet"[..]), Path::new("bad.xlsx")).unwrap_err();
        assert!(matches!(err, ReconError::Workbook { .. }));
    }

    #[test]
    fn test_detect_format() {
        assert_eq!(SourceFormat::detect(Path::new("a.CSV")), Some(SourceFormat::Csv));
        assert_eq!(SourceFormat::detect(Path::new("Repayments.xlsx")), Some(SourceFormat::Workbook));
        assert_eq!(SourceFormat::detect(Path::new("noext")), None);
    }
}
