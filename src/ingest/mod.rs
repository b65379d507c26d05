//! Turns an uploaded spreadsheet into lote items.
//!
//! Rows are read as raw cells. Column A holds the document holder's name and
//! column G the CFC the holder is enrolled with. Header and footer rows are
//! recognised heuristically and skipped; there is no schema validation.

mod reader;

use std::collections::BTreeSet;

use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::LoteTipo;
use crate::store::lotes::NewLoteItem;
use crate::utils::text::collate_names;

pub use reader::{read_rows, SpreadsheetFormat};

pub const NAME_COLUMN: usize = 0;
pub const CFC_COLUMN: usize = 6;
pub const MIN_NAME_CHARS: usize = 5;
pub const CFC_PREFIX: &str = "CFC";

/// Lower-cased fragments that only appear in form headings and signature lines.
const NOISE_MARKERS: [&str; 5] = ["formulário", "operador", "data", "ciretran", "estado"];

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("unsupported spreadsheet format: {0}")]
    UnsupportedFormat(String),
    #[error("workbook has no worksheets")]
    EmptyWorkbook,
    #[error("failed to read workbook: {0}")]
    Workbook(#[from] calamine::Error),
    #[error("failed to read csv: {0}")]
    Csv(#[from] csv::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedItem {
    pub nome: String,
    pub cfc: Option<String>,
    pub tipo: LoteTipo,
    pub numero_documento: String,
}

impl From<ParsedItem> for NewLoteItem {
    fn from(item: ParsedItem) -> Self {
        Self {
            nome: item.nome,
            cfc: item.cfc,
            numero_documento: item.numero_documento,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestSummary {
    pub total: usize,
    pub cfc_items: usize,
    pub particular_items: usize,
    /// Distinct CFC names, sorted.
    pub cfcs: Vec<String>,
}

pub fn extract_items(rows: &[Vec<String>], tipo: LoteTipo) -> Vec<ParsedItem> {
    extract_items_with_rng(rows, tipo, &mut rand::thread_rng())
}

pub fn extract_items_with_rng<R: Rng>(
    rows: &[Vec<String>],
    tipo: LoteTipo,
    rng: &mut R,
) -> Vec<ParsedItem> {
    let mut items: Vec<ParsedItem> = rows
        .iter()
        .filter_map(|row| {
            let nome = cell(row, NAME_COLUMN);
            if is_noise_row(nome) {
                return None;
            }
            Some(ParsedItem {
                nome: nome.to_string(),
                cfc: accept_cfc(cell(row, CFC_COLUMN)),
                tipo,
                numero_documento: document_number(tipo, rng),
            })
        })
        .collect();

    items.sort_by(|a, b| collate_names(&a.nome, &b.nome));
    items
}

/// Value of cell B2, which the intake form uses for the lote number.
pub fn suggested_numero(rows: &[Vec<String>]) -> Option<String> {
    let value = rows.get(1).map(|row| cell(row, 1))?;
    (!value.is_empty()).then(|| value.to_string())
}

pub fn summarize(items: &[ParsedItem]) -> IngestSummary {
    let cfcs: BTreeSet<&str> = items.iter().filter_map(|item| item.cfc.as_deref()).collect();
    let cfc_items = items.iter().filter(|item| item.cfc.is_some()).count();
    IngestSummary {
        total: items.len(),
        cfc_items,
        particular_items: items.len() - cfc_items,
        cfcs: cfcs.into_iter().map(str::to_string).collect(),
    }
}

/// Type code followed by six random digits. Not checked for uniqueness.
pub fn document_number<R: Rng>(tipo: LoteTipo, rng: &mut R) -> String {
    format!("{}{:06}", tipo.as_str(), rng.gen_range(0..1_000_000u32))
}

fn cell(row: &[String], index: usize) -> &str {
    row.get(index).map(|value| value.trim()).unwrap_or("")
}

fn is_noise_row(nome: &str) -> bool {
    if nome.is_empty() || nome.chars().count() < MIN_NAME_CHARS {
        return true;
    }
    let lower = nome.to_lowercase();
    NOISE_MARKERS.iter().any(|marker| lower.contains(marker))
}

fn accept_cfc(raw: &str) -> Option<String> {
    raw.to_uppercase()
        .starts_with(CFC_PREFIX)
        .then(|| raw.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn row(nome: &str, cfc: &str) -> Vec<String> {
        let mut cells = vec![nome.to_string()];
        cells.extend(std::iter::repeat(String::new()).take(CFC_COLUMN - 1));
        cells.push(cfc.to_string());
        cells
    }

    #[test]
    fn drops_header_and_short_name_rows() {
        let rows = vec![
            row("Operador", "CFC"),
            row("Maria Silva", "CFC Alfa"),
            row("Jo", ""),
        ];
        let items = extract_items(&rows, LoteTipo::Cnh);

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].nome, "Maria Silva");
        assert_eq!(items[0].cfc.as_deref(), Some("CFC Alfa"));
    }

    #[test]
    fn drops_rows_with_form_markers_in_any_case() {
        let rows = vec![
            row("FORMULÁRIO DE ENTREGA", ""),
            row("Data de emissão: 01/02/2024", ""),
            row("CIRETRAN Centro", ""),
            row("Estado de São Paulo", ""),
            row("", "CFC Alfa"),
            row("Pedro Alves", ""),
        ];
        let items = extract_items(&rows, LoteTipo::Cnh);
        let names: Vec<&str> = items.iter().map(|i| i.nome.as_str()).collect();
        assert_eq!(names, vec!["Pedro Alves"]);
    }

    #[test]
    fn only_cfc_prefixed_tags_are_kept() {
        let rows = vec![
            row("Ana Souza", "cfc beta"),
            row("Bruno Lima", "Particular"),
            row("Carla Dias", "  CFC Gama  "),
            row("Davi Rocha", "AUTO ESCOLA CFC"),
        ];
        let items = extract_items(&rows, LoteTipo::Cnh);
        let cfcs: Vec<Option<&str>> = items.iter().map(|i| i.cfc.as_deref()).collect();
        assert_eq!(cfcs, vec![Some("cfc beta"), None, Some("CFC Gama"), None]);
    }

    #[test]
    fn short_rows_are_unaffiliated() {
        let rows = vec![vec!["Helena Prado".to_string()]];
        let items = extract_items(&rows, LoteTipo::Pid);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].cfc, None);
        assert_eq!(items[0].tipo, LoteTipo::Pid);
    }

    #[test]
    fn items_are_sorted_by_name() {
        let rows = vec![
            row("Zuleica Ramos", ""),
            row("Érico Matos", ""),
            row("Eduarda Luz", ""),
            row("Amanda Reis", ""),
        ];
        let items = extract_items(&rows, LoteTipo::Cnh);
        let names: Vec<&str> = items.iter().map(|i| i.nome.as_str()).collect();
        assert_eq!(
            names,
            vec!["Amanda Reis", "Eduarda Luz", "Érico Matos", "Zuleica Ramos"]
        );
    }

    #[test]
    fn document_numbers_use_type_code_and_six_digits() {
        let mut rng = StdRng::seed_from_u64(7);
        for tipo in [LoteTipo::Cnh, LoteTipo::Pid] {
            for _ in 0..50 {
                let numero = document_number(tipo, &mut rng);
                let digits = numero.strip_prefix(tipo.as_str()).unwrap();
                assert_eq!(digits.len(), 6);
                assert!(digits.chars().all(|c| c.is_ascii_digit()));
            }
        }
    }

    #[test]
    fn empty_or_header_only_sheet_yields_no_items() {
        assert!(extract_items(&[], LoteTipo::Cnh).is_empty());
        let rows = vec![row("Nome", "CFC"), row("Operador responsável", "")];
        assert!(extract_items(&rows, LoteTipo::Cnh).is_empty());
    }

    #[test]
    fn suggests_numero_from_b2() {
        let rows = vec![
            vec!["Formulário".to_string()],
            vec!["Lote".to_string(), " l015-2024 ".to_string()],
        ];
        assert_eq!(suggested_numero(&rows).as_deref(), Some("l015-2024"));
        assert_eq!(suggested_numero(&rows[..1]), None);
    }

    #[test]
    fn b2_is_an_absolute_cell_even_below_a_blank_first_row() {
        let rows = vec![Vec::new(), vec!["Lote".to_string(), "L020".to_string()]];
        assert_eq!(suggested_numero(&rows).as_deref(), Some("L020"));

        // A number in row 1 is not shifted up into B2.
        let rows = vec![vec!["Lote".to_string(), "L021".to_string()], Vec::new()];
        assert_eq!(suggested_numero(&rows), None);
    }

    #[test]
    fn summary_counts_cfc_and_particular_items() {
        let rows = vec![
            row("Ana Souza", "CFC Alfa"),
            row("Bruno Lima", ""),
            row("Carla Dias", "CFC Alfa"),
            row("Davi Rocha", "CFC Beta"),
        ];
        let summary = summarize(&extract_items(&rows, LoteTipo::Cnh));
        assert_eq!(summary.total, 4);
        assert_eq!(summary.cfc_items, 3);
        assert_eq!(summary.particular_items, 1);
        assert_eq!(summary.cfcs, vec!["CFC Alfa", "CFC Beta"]);
    }
}
