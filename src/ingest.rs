//! Funnel spreadsheet ingestion.
//!
//! Reads a GA4 path-exploration export (xlsx/xls/ods or CSV), finds the row
//! whose first cell is the `단계` header and turns every following row into a
//! [`PathRow`].

use std::collections::BTreeMap;
use std::io::Cursor;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;

use calamine::{Data, Ods, Reader, Xls, Xlsx};
use tracing::{debug, info, warn};

use crate::analytics::funnel::PathRow;
use crate::{Error, Result};

/// First cell of the header row.
pub const HEADER_MARKER: &str = "단계";

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const OLE_MAGIC: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0];
const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// A single spreadsheet cell, independent of the container format.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
}

impl Cell {
    /// Cell as display text; whole numbers drop the fraction.
    pub fn text(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Text(s) => s.trim().to_string(),
            Cell::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => format!("{}", *n as i64),
            Cell::Number(n) => n.to_string(),
        }
    }

    /// Numeric value, accepting `1,234` and `45.6%` text.
    pub fn number(&self) -> Option<f64> {
        let value = match self {
            Cell::Empty => return None,
            Cell::Number(n) => *n,
            Cell::Text(s) => {
                let cleaned: String = s.trim().chars().filter(|c| *c != ',').collect();
                match cleaned.strip_suffix('%') {
                    Some(pct) => pct.trim().parse::<f64>().ok()? / 100.0,
                    None => cleaned.parse::<f64>().ok()?,
                }
            }
        };
        value.is_finite().then_some(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SheetFormat {
    /// xlsx/xlsm/ods (zip) or legacy xls (OLE).
    Workbook,
    Csv,
}

pub fn detect_format(bytes: &[u8]) -> SheetFormat {
    if bytes.starts_with(ZIP_MAGIC) || bytes.starts_with(OLE_MAGIC) {
        SheetFormat::Workbook
    } else {
        SheetFormat::Csv
    }
}

/// Read a spreadsheet file from disk and parse it.
pub async fn read_spreadsheet(path: &Path) -> Result<Vec<PathRow>> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| Error::SpreadsheetRead(format!("{}: {}", path.display(), e)))?;
    let rows = parse_spreadsheet(&bytes)?;
    info!(file = %path.display(), rows = rows.len(), "Funnel spreadsheet parsed");
    Ok(rows)
}

/// Parse raw file bytes; identical bytes give identical rows.
pub fn parse_spreadsheet(bytes: &[u8]) -> Result<Vec<PathRow>> {
    let cells = match detect_format(bytes) {
        SheetFormat::Workbook => workbook_cells(bytes)?,
        SheetFormat::Csv => csv_cells(bytes)?,
    };
    parse_rows(&cells)
}

/// Funnel columns read per row; anything to the right is ignored.
const FUNNEL_COLUMNS: usize = 6;
/// Excel's own sheet limits.
const MAX_ROWS: u32 = 1_048_576;
const MAX_COLUMNS: u32 = 16_384;
/// Cells scanned before a workbook is rejected as too large.
const MAX_CELLS: usize = 2_000_000;

fn workbook_cells(bytes: &[u8]) -> Result<Vec<Vec<Cell>>> {
    // calamine indexes and multiplies untrusted values; a malformed
    // workbook must come back as an error, not a panic.
    panic::catch_unwind(AssertUnwindSafe(|| read_workbook(bytes))).unwrap_or_else(|_| {
        warn!("Workbook reader panicked on malformed input");
        Err(Error::SpreadsheetRead("workbook is malformed".to_string()))
    })
}

fn read_workbook(bytes: &[u8]) -> Result<Vec<Vec<Cell>>> {
    if bytes.starts_with(OLE_MAGIC) {
        let mut xls = Xls::new(Cursor::new(bytes.to_vec())).map_err(calamine::Error::from)?;
        return first_range_cells(&mut xls);
    }
    match Xlsx::new(Cursor::new(bytes.to_vec())) {
        Ok(mut xlsx) => xlsx_cells(&mut xlsx),
        Err(xlsx_err) => match Ods::new(Cursor::new(bytes.to_vec())) {
            Ok(mut ods) => first_range_cells(&mut ods),
            Err(_) => Err(calamine::Error::from(xlsx_err).into()),
        },
    }
}

/// Stream the first xlsx sheet cell by cell; no dense range is built.
fn xlsx_cells(xlsx: &mut Xlsx<Cursor<Vec<u8>>>) -> Result<Vec<Vec<Cell>>> {
    let sheet = first_sheet(xlsx.sheet_names())?;
    let mut reader = xlsx
        .worksheet_cells_reader(&sheet)
        .map_err(calamine::Error::from)?;

    let mut grid = SparseGrid::default();
    while let Some(cell) = reader.next_cell().map_err(calamine::Error::from)? {
        let (row, col) = cell.get_position();
        grid.insert(row, col, || cell_from_data(&Data::from(cell.get_value().clone())))?;
    }
    Ok(grid.into_rows())
}

/// xls/ods: calamine only offers the whole range.
fn first_range_cells<R: Reader<Cursor<Vec<u8>>>>(workbook: &mut R) -> Result<Vec<Vec<Cell>>>
where
    calamine::Error: From<R::Error>,
{
    let sheet = first_sheet(workbook.sheet_names())?;
    let range = workbook
        .worksheet_range(&sheet)
        .map_err(calamine::Error::from)?;
    let (row_offset, col_offset) = range.start().unwrap_or((0, 0));

    let mut grid = SparseGrid::default();
    for (r, row) in range.rows().enumerate() {
        for (c, data) in row.iter().enumerate().take(FUNNEL_COLUMNS) {
            let row_idx = row_offset.saturating_add(r as u32);
            let col_idx = col_offset.saturating_add(c as u32);
            grid.insert(row_idx, col_idx, || cell_from_data(data))?;
        }
    }
    Ok(grid.into_rows())
}

fn first_sheet(names: Vec<String>) -> Result<String> {
    names
        .into_iter()
        .next()
        .ok_or_else(|| Error::SpreadsheetRead("workbook has no sheets".to_string()))
}

/// Rows keyed by sheet row, holding only the funnel columns.
#[derive(Default)]
struct SparseGrid {
    rows: BTreeMap<u32, Vec<Cell>>,
    scanned: usize,
}

impl SparseGrid {
    fn insert(&mut self, row: u32, col: u32, cell: impl FnOnce() -> Cell) -> Result<()> {
        self.scanned += 1;
        if self.scanned > MAX_CELLS {
            return Err(Error::SpreadsheetRead(format!(
                "sheet has more than {} cells",
                MAX_CELLS
            )));
        }
        if row >= MAX_ROWS || col >= MAX_COLUMNS {
            return Err(Error::SpreadsheetRead(format!(
                "cell position out of range (row {}, column {})",
                u64::from(row) + 1,
                u64::from(col) + 1
            )));
        }

        let col = col as usize;
        if col >= FUNNEL_COLUMNS {
            return Ok(());
        }
        let cell = cell();
        if cell == Cell::Empty {
            return Ok(());
        }
        self.rows
            .entry(row)
            .or_insert_with(|| vec![Cell::Empty; FUNNEL_COLUMNS])[col] = cell;
        Ok(())
    }

    fn into_rows(self) -> Vec<Vec<Cell>> {
        self.rows.into_values().collect()
    }
}

fn cell_from_data(data: &Data) -> Cell {
    match data {
        Data::Empty | Data::Error(_) => Cell::Empty,
        Data::Int(i) => Cell::Number(*i as f64),
        Data::Float(f) => Cell::Number(*f),
        Data::String(s) => Cell::Text(s.clone()),
        other => Cell::Text(other.to_string()),
    }
}

fn csv_cells(bytes: &[u8]) -> Result<Vec<Vec<Cell>>> {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(bytes);

    let mut rows = Vec::new();
    for record in reader.byte_records() {
        let record = record?;
        rows.push(
            record
                .iter()
                .map(|field| {
                    let text = String::from_utf8_lossy(field);
                    if text.trim().is_empty() {
                        Cell::Empty
                    } else {
                        Cell::Text(text.into_owned())
                    }
                })
                .collect(),
        );
    }
    Ok(rows)
}

/// Turn a cell grid into funnel rows.
///
/// Columns after the header: step, source, active users, completion rate,
/// exits, bounce rate. Rows without a step or with a non-numeric (or
/// negative) active-user count are skipped.
pub fn parse_rows(rows: &[Vec<Cell>]) -> Result<Vec<PathRow>> {
    let header = rows
        .iter()
        .position(|row| row.first().map(Cell::text).as_deref() == Some(HEADER_MARKER))
        .ok_or_else(|| {
            Error::SpreadsheetFormat(format!(
                "'{}' 헤더를 찾을 수 없습니다. GA4 경로 탐색 내보내기 파일인지 확인해 주세요.",
                HEADER_MARKER
            ))
        })?;

    let mut parsed = Vec::new();
    let mut skipped = 0usize;

    for row in &rows[header + 1..] {
        match parse_row(row) {
            Some(path_row) => parsed.push(path_row),
            None => skipped += 1,
        }
    }

    debug!(header_row = header, rows = parsed.len(), skipped, "Parsed funnel rows");
    Ok(parsed)
}

fn parse_row(row: &[Cell]) -> Option<PathRow> {
    let cell = |i: usize| row.get(i).unwrap_or(&Cell::Empty);

    let step = cell(0).text();
    if step.is_empty() {
        return None;
    }
    let active_users = cell(2).number().filter(|n| *n >= 0.0)?.round() as u64;

    Some(PathRow {
        step,
        source: cell(1).text(),
        active_users,
        completion_rate: cell(3).number().unwrap_or(0.0),
        exits: cell(4).number().map(|n| n.max(0.0).round() as u64).unwrap_or(0),
        bounce_rate: cell(5).number().unwrap_or(0.0),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Cell {
        Cell::Text(s.to_string())
    }

    const SAMPLE_CSV: &str = "\
# ----------------------------------------
# 경로 탐색 분석
# ----------------------------------------
단계,세션 소스,활성 사용자,완료율,이탈수,이탈률
1. 세션 시작,google,\"1,200\",0.8,240,0.2
1. 세션 시작,naver,300,75%,75,25%
2. 질문,google,960,0.5,480,0.5
,google,10,0.1,1,0.1
3. 답변,direct,n/a,0.1,1,0.1
";

    #[test]
    fn parses_csv_after_header_marker() {
        let rows = parse_spreadsheet(SAMPLE_CSV.as_bytes()).unwrap();

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].step, "1. 세션 시작");
        assert_eq!(rows[0].source, "google");
        assert_eq!(rows[0].active_users, 1200);
        assert_eq!(rows[0].exits, 240);
        assert_eq!(rows[1].completion_rate, 0.75);
        assert_eq!(rows[1].bounce_rate, 0.25);
        assert_eq!(rows[2].step, "2. 질문");
    }

    #[test]
    fn strips_utf8_bom() {
        let mut bytes = UTF8_BOM.to_vec();
        bytes.extend_from_slice("단계,s,a\nA,X,3\n".as_bytes());
        let rows = parse_spreadsheet(&bytes).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].active_users, 3);
    }

    #[test]
    fn missing_header_is_format_error() {
        let err = parse_spreadsheet(b"step,source,users\nA,X,1\n").unwrap_err();
        assert!(matches!(err, Error::SpreadsheetFormat(_)));
        assert!(err.user_message().contains(HEADER_MARKER));
    }

    #[test]
    fn empty_input_is_format_error() {
        assert!(matches!(
            parse_spreadsheet(b"").unwrap_err(),
            Error::SpreadsheetFormat(_)
        ));
    }

    #[test]
    fn broken_workbook_is_read_error() {
        let mut bytes = ZIP_MAGIC.to_vec();
        bytes.extend_from_slice(&[0u8; 64]);
        let err = parse_spreadsheet(&bytes).unwrap_err();
        assert!(matches!(err, Error::SpreadsheetRead(_)));
    }

    #[test]
    fn arbitrary_bytes_never_panic() {
        let inputs: Vec<Vec<u8>> = vec![
            vec![0xff, 0xfe, 0x00, 0x41],
            (0u8..=255).collect(),
            OLE_MAGIC.to_vec(),
            b"\"unterminated,quote\n\xe2\x28\xa1".to_vec(),
            "단계\n".as_bytes().to_vec(),
        ];
        for input in inputs {
            let _ = parse_spreadsheet(&input);
        }
    }

    #[test]
    fn parse_is_deterministic() {
        let a = parse_spreadsheet(SAMPLE_CSV.as_bytes()).unwrap();
        let b = parse_spreadsheet(SAMPLE_CSV.as_bytes()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn header_marker_is_trimmed_and_numbers_coerced() {
        let grid = vec![
            vec![text("  단계 "), text("source")],
            vec![Cell::Number(1.0), text("x"), Cell::Number(4.6), Cell::Number(0.3)],
            vec![text("B"), Cell::Empty, Cell::Number(-1.0)],
            vec![text("C"), text("y"), Cell::Number(2.0)],
        ];
        let rows = parse_rows(&grid).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].step, "1");
        assert_eq!(rows[0].active_users, 5);
        assert_eq!(rows[0].completion_rate, 0.3);
        assert_eq!(rows[1].step, "C");
        assert_eq!(rows[1].exits, 0);
        assert_eq!(rows[1].bounce_rate, 0.0);
    }

    #[test]
    fn cell_number_rejects_non_finite_and_text() {
        assert_eq!(Cell::Number(f64::NAN).number(), None);
        assert_eq!(text("abc").number(), None);
        assert_eq!(text(" 12.5% ").number(), Some(0.125));
        assert_eq!(Cell::Empty.number(), None);
    }

    #[test]
    fn detect_format_by_magic() {
        assert_eq!(detect_format(b"PK\x03\x04rest"), SheetFormat::Workbook);
        assert_eq!(detect_format(&[0xD0, 0xCF, 0x11, 0xE0, 0]), SheetFormat::Workbook);
        assert_eq!(detect_format(b"a,b,c"), SheetFormat::Csv);
    }

    fn xlsx(sheet: &str, shared_strings: Option<&str>) -> Vec<u8> {
        use std::io::Write;
        use zip::write::SimpleFileOptions;

        let mut parts = vec![
            (
                "[Content_Types].xml",
                r#"<?xml version="1.0" encoding="UTF-8"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/></Types>"#.to_string(),
            ),
            (
                "xl/workbook.xml",
                r#"<?xml version="1.0" encoding="UTF-8"?><workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets><sheet name="경로 탐색" sheetId="1" r:id="rId1"/></sheets></workbook>"#.to_string(),
            ),
            (
                "xl/_rels/workbook.xml.rels",
                r#"<?xml version="1.0" encoding="UTF-8"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/></Relationships>"#.to_string(),
            ),
            (
                "xl/worksheets/sheet1.xml",
                format!(
                    r#"<?xml version="1.0" encoding="UTF-8"?><worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">{}</worksheet>"#,
                    sheet
                ),
            ),
        ];
        if let Some(strings) = shared_strings {
            parts.push((
                "xl/sharedStrings.xml",
                format!(
                    r#"<?xml version="1.0" encoding="UTF-8"?><sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">{}</sst>"#,
                    strings
                ),
            ));
        }

        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options =
            SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
        for (name, body) in parts {
            zip.start_file(name, options).unwrap();
            zip.write_all(body.as_bytes()).unwrap();
        }
        zip.finish().unwrap().into_inner()
    }

    fn inline(cell: &str, value: &str) -> String {
        format!(r#"<c r="{}" t="inlineStr"><is><t>{}</t></is></c>"#, cell, value)
    }

    fn num(cell: &str, value: f64) -> String {
        format!(r#"<c r="{}"><v>{}</v></c>"#, cell, value)
    }

    fn row_xml(r: u32, cells: &[String]) -> String {
        format!(r#"<row r="{}">{}</row>"#, r, cells.concat())
    }

    fn funnel_header(r: u32) -> String {
        let cols = ["단계", "세션 소스", "활성 사용자", "완료율", "이탈수", "이탈률"];
        let cells: Vec<String> = cols
            .iter()
            .zip(["A", "B", "C", "D", "E", "F"])
            .map(|(name, col)| inline(&format!("{}{}", col, r), name))
            .collect();
        row_xml(r, &cells)
    }

    #[test]
    fn parses_xlsx_workbook() {
        let sheet = format!(
            "<dimension ref=\"A1:H6\"/><sheetData>{}{}{}{}{}</sheetData>",
            row_xml(1, &[inline("A1", "# 경로 탐색 분석")]),
            funnel_header(3),
            row_xml(
                4,
                &[
                    inline("A4", "1. 세션 시작"),
                    inline("B4", "google"),
                    inline("C4", "1,234"),
                    num("D4", 0.8),
                    num("E4", 240.0),
                    inline("F4", "45%"),
                    num("H4", 99.0),
                ],
            ),
            row_xml(
                5,
                &[inline("A5", "2. 질문"), inline("B5", "naver"), inline("C5", "n/a")],
            ),
            row_xml(
                6,
                &[inline("A6", "2. 질문"), inline("B6", "google"), num("C6", 960.0)],
            ),
        );
        let rows = parse_spreadsheet(&xlsx(&sheet, None)).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].step, "1. 세션 시작");
        assert_eq!(rows[0].source, "google");
        assert_eq!(rows[0].active_users, 1234);
        assert_eq!(rows[0].completion_rate, 0.8);
        assert_eq!(rows[0].exits, 240);
        assert_eq!(rows[0].bounce_rate, 0.45);
        assert_eq!(rows[1].source, "google");
        assert_eq!(rows[1].active_users, 960);
    }

    #[test]
    fn xlsx_shared_strings_resolve() {
        let sheet = format!(
            "<sheetData>{}{}</sheetData>",
            row_xml(1, &[r#"<c r="A1" t="s"><v>0</v></c>"#.to_string()]),
            row_xml(
                2,
                &[
                    r#"<c r="A2" t="s"><v>1</v></c>"#.to_string(),
                    inline("B2", "direct"),
                    num("C2", 5.0),
                ],
            ),
        );
        let rows = parse_spreadsheet(&xlsx(&sheet, Some("<si><t>단계</t></si><si><t>3. 답변</t></si>")))
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].step, "3. 답변");
        assert_eq!(rows[0].active_users, 5);
    }

    #[test]
    fn xlsx_shared_string_out_of_range_is_read_error() {
        let sheet = format!(
            "<sheetData>{}</sheetData>",
            row_xml(1, &[r#"<c r="A1" t="s"><v>7</v></c>"#.to_string()]),
        );
        let err = parse_spreadsheet(&xlsx(&sheet, Some("<si><t>단계</t></si>")))
            .unwrap_err();
        assert!(matches!(err, Error::SpreadsheetRead(_)));
    }

    #[test]
    fn xlsx_oversized_cell_reference_is_read_error() {
        let sheet = format!(
            "<sheetData>{}</sheetData>",
            row_xml(1, &[inline("AAAAAAAAAAAAAAAAAAAA1", "단계")]),
        );
        let err = parse_spreadsheet(&xlsx(&sheet, None)).unwrap_err();
        assert!(matches!(err, Error::SpreadsheetRead(_)));
    }

    #[test]
    fn xlsx_far_corner_cell_does_not_allocate_dense_range() {
        let sheet = format!(
            "<dimension ref=\"A1:XFD1048576\"/><sheetData>{}{}{}</sheetData>",
            funnel_header(1),
            row_xml(2, &[inline("A2", "1. 세션 시작"), inline("B2", "google"), num("C2", 3.0)]),
            row_xml(1048576, &[num("XFD1048576", 1.0)]),
        );
        let rows = parse_spreadsheet(&xlsx(&sheet, None)).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].active_users, 3);
    }

    #[test]
    fn sparse_grid_rejects_positions_past_sheet_limits() {
        let mut grid = SparseGrid::default();
        assert!(grid.insert(0, 0, || text("단계")).is_ok());
        assert!(grid.insert(3, 40, || text("ignored")).is_ok());
        assert!(matches!(
            grid.insert(MAX_ROWS, 0, || Cell::Empty),
            Err(Error::SpreadsheetRead(_))
        ));
        assert!(matches!(
            grid.insert(0, MAX_COLUMNS, || Cell::Empty),
            Err(Error::SpreadsheetRead(_))
        ));
        assert_eq!(grid.into_rows().len(), 1);
    }

    #[tokio::test]
    async fn read_spreadsheet_reports_missing_file() {
        let err = read_spreadsheet(Path::new("/nonexistent/funnel.xlsx"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::SpreadsheetRead(_)));
    }

    #[tokio::test]
    async fn read_spreadsheet_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("funnel.csv");
        std::fs::write(&path, SAMPLE_CSV).unwrap();

        let rows = read_spreadsheet(&path).await.unwrap();
        assert_eq!(rows.len(), 3);
    }
}
