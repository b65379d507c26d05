use std::io::Cursor;
use std::path::Path;

use calamine::{open_workbook_auto_from_rs, Reader};

use super::IngestError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpreadsheetFormat {
    Workbook,
    Csv,
}

impl SpreadsheetFormat {
    pub fn from_filename(filename: &str) -> Result<Self, IngestError> {
        let extension = Path::new(filename)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        match extension.as_str() {
            "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => Ok(SpreadsheetFormat::Workbook),
            "csv" => Ok(SpreadsheetFormat::Csv),
            _ => Err(IngestError::UnsupportedFormat(filename.to_string())),
        }
    }
}

/// Cells of the first worksheet as strings, positioned from A1 so that column
/// and row indexes match the sheet even when leading rows or columns are blank.
pub fn read_rows(bytes: &[u8], filename: &str) -> Result<Vec<Vec<String>>, IngestError> {
    match SpreadsheetFormat::from_filename(filename)? {
        SpreadsheetFormat::Workbook => read_workbook(bytes),
        SpreadsheetFormat::Csv => read_csv(bytes),
    }
}

fn read_workbook(bytes: &[u8]) -> Result<Vec<Vec<String>>, IngestError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or(IngestError::EmptyWorkbook)??;

    let Some((first_row, first_col)) = range.start() else {
        return Ok(Vec::new());
    };

    let mut rows: Vec<Vec<String>> = (0..first_row).map(|_| Vec::new()).collect();
    for row in range.rows() {
        let mut cells: Vec<String> = (0..first_col).map(|_| String::new()).collect();
        cells.extend(row.iter().map(|cell| cell.to_string()));
        rows.push(cells);
    }
    Ok(rows)
}

fn read_csv(bytes: &[u8]) -> Result<Vec<Vec<String>>, IngestError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(detect_delimiter(bytes))
        .from_reader(bytes);

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(str::to_string).collect());
    }
    Ok(rows)
}

/// Spreadsheet tools in pt-BR locales export with `;`.
fn detect_delimiter(bytes: &[u8]) -> u8 {
    let first_line = bytes.split(|b| *b == b'\n').next().unwrap_or_default();
    let semicolons = first_line.iter().filter(|b| **b == b';').count();
    let commas = first_line.iter().filter(|b| **b == b',').count();
    if semicolons > commas {
        b';'
    } else {
        b','
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_format_from_extension() {
        assert_eq!(
            SpreadsheetFormat::from_filename("lote.XLSX").unwrap(),
            SpreadsheetFormat::Workbook
        );
        assert_eq!(
            SpreadsheetFormat::from_filename("planilha.xls").unwrap(),
            SpreadsheetFormat::Workbook
        );
        assert_eq!(
            SpreadsheetFormat::from_filename("lote.csv").unwrap(),
            SpreadsheetFormat::Csv
        );
        assert!(matches!(
            SpreadsheetFormat::from_filename("lote.pdf"),
            Err(IngestError::UnsupportedFormat(_))
        ));
        assert!(SpreadsheetFormat::from_filename("sem_extensao").is_err());
    }

    #[test]
    fn reads_ragged_csv_rows() {
        let data = "Formulário,,,\nLote,L001\nMaria Silva,,,,,,CFC Alfa\n";
        let rows = read_rows(data.as_bytes(), "lote.csv").unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1], vec!["Lote", "L001"]);
        assert_eq!(rows[2][6], "CFC Alfa");
    }

    #[test]
    fn reads_semicolon_separated_csv() {
        let data = "Nome;B;C;D;E;F;CFC\nJoão Pereira;;;;;;CFC Beta\n";
        let rows = read_rows(data.as_bytes(), "lote.csv").unwrap();
        assert_eq!(rows[1][0], "João Pereira");
        assert_eq!(rows[1][6], "CFC Beta");
    }

    #[test]
    fn blank_leading_csv_row_keeps_its_place() {
        let data = ",,,\nLote,L022\nMaria Silva,,,,,,CFC Alfa\n";
        let rows = read_rows(data.as_bytes(), "lote.csv").unwrap();
        assert_eq!(rows.len(), 3);
        assert!(rows[0].iter().all(String::is_empty));
        assert_eq!(crate::ingest::suggested_numero(&rows).as_deref(), Some("L022"));
    }

    #[test]
    fn garbage_workbook_is_an_error() {
        let err = read_rows(b"not a workbook", "lote.xlsx").unwrap_err();
        assert!(matches!(err, IngestError::Workbook(_)));
    }
}
