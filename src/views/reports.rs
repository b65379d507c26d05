use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::Serialize;

use crate::domain::{Lote, LoteStatus, LoteTipo};
use crate::views::{inferred_cfc, scope_lotes, CfcFilter, Viewer};

#[derive(Debug, Clone)]
pub struct ReportFilter {
    pub tipo: LoteTipo,
    pub search: String,
    pub cfc: CfcFilter,
    /// Matches the creator or the last updater.
    pub operador: Option<String>,
    pub status: Option<LoteStatus>,
    /// Calendar day of creation (UTC).
    pub data: Option<NaiveDate>,
}

impl ReportFilter {
    pub fn for_tipo(tipo: LoteTipo) -> Self {
        Self {
            tipo,
            search: String::new(),
            cfc: CfcFilter::All,
            operador: None,
            status: None,
            data: None,
        }
    }
}

/// Lotes of one type visible to the viewer, narrowed by every active filter.
/// The CFC filter falls back to the inferred tag for unaffiliated items,
/// linking names against the full `lotes` history.
pub fn report_lotes(viewer: &Viewer, lotes: &[Lote], filter: &ReportFilter) -> Vec<Lote> {
    let of_tipo: Vec<Lote> = lotes
        .iter()
        .filter(|lote| lote.tipo == filter.tipo)
        .cloned()
        .collect();
    let search = filter.search.trim().to_lowercase();

    scope_lotes(viewer, &of_tipo)
        .into_iter()
        .filter(|lote| {
            search.is_empty()
                || lote.numero.to_lowercase().contains(&search)
                || lote
                    .items
                    .iter()
                    .any(|item| item.nome.to_lowercase().contains(&search))
        })
        .filter(|lote| {
            filter.cfc == CfcFilter::All
                || lote
                    .items
                    .iter()
                    .any(|item| filter.cfc.accepts(inferred_cfc(item, lotes).as_deref()))
        })
        .filter(|lote| match filter.operador.as_deref() {
            Some(operador) => {
                lote.criado_por == operador || lote.atualizado_por.as_deref() == Some(operador)
            }
            None => true,
        })
        .filter(|lote| filter.status.map_or(true, |status| lote.status == status))
        .filter(|lote| filter.data.map_or(true, |day| lote.criado_em.date() == day))
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportOptions {
    pub cfcs: Vec<String>,
    pub operadores: Vec<String>,
}

/// Sorted, deduplicated dropdown values across every lote.
pub fn report_options(lotes: &[Lote]) -> ReportOptions {
    let cfcs: BTreeSet<&str> = lotes
        .iter()
        .flat_map(|lote| lote.items.iter())
        .filter_map(|item| item.cfc.as_deref())
        .collect();

    let mut operadores: BTreeSet<&str> = BTreeSet::new();
    for lote in lotes {
        operadores.insert(&lote.criado_por);
        if let Some(updater) = lote.atualizado_por.as_deref() {
            operadores.insert(updater);
        }
    }
    operadores.remove("");

    ReportOptions {
        cfcs: cfcs.into_iter().map(str::to_string).collect(),
        operadores: operadores.into_iter().map(str::to_string).collect(),
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusCounts {
    pub total: usize,
    pub pendente: usize,
    pub em_separacao: usize,
    pub recebido: usize,
}

impl StatusCounts {
    pub fn of(lotes: &[Lote]) -> Self {
        lotes.iter().fold(Self::default(), |mut counts, lote| {
            counts.total += 1;
            match lote.status {
                LoteStatus::Pendente => counts.pendente += 1,
                LoteStatus::EmSeparacao => counts.em_separacao += 1,
                LoteStatus::Recebido => counts.recebido += 1,
            }
            counts
        })
    }
}
