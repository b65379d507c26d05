use std::collections::BTreeSet;

use serde::Serialize;

use crate::domain::{Lote, LoteItem, LoteStatus};
use crate::views::{scope_lotes, CfcFilter, Viewer};

/// Lotes offered for separation. CFC viewers get every lote holding one of
/// their items; everyone else gets the ones not yet received.
pub fn separation_queue(viewer: &Viewer, lotes: &[Lote]) -> Vec<Lote> {
    let scoped = scope_lotes(viewer, lotes);
    if viewer.is_cfc_scoped() {
        return scoped;
    }
    scoped
        .into_iter()
        .filter(|lote| matches!(lote.status, LoteStatus::Pendente | LoteStatus::EmSeparacao))
        .collect()
}

#[derive(Debug, Clone, Default)]
pub struct ItemFilter {
    pub search: String,
    pub cfc: CfcFilter,
}

/// A non-empty search matching the lote number keeps every item of the lote.
pub fn filter_items<'a>(lote: &'a Lote, filter: &ItemFilter) -> Vec<&'a LoteItem> {
    let search = filter.search.trim().to_lowercase();
    let numero_matches = !search.is_empty() && lote.numero.to_lowercase().contains(&search);

    lote.items
        .iter()
        .filter(|item| {
            search.is_empty()
                || numero_matches
                || item.nome.to_lowercase().contains(&search)
                || item.numero_documento.to_lowercase().contains(&search)
        })
        .filter(|item| filter.cfc.accepts(item.cfc.as_deref()))
        .collect()
}

/// Distinct tags present in one lote, for the CFC dropdown.
pub fn lote_cfcs(lote: &Lote) -> Vec<String> {
    lote.items
        .iter()
        .filter_map(|item| item.cfc.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeparationSummary {
    pub total: usize,
    pub cfc_items: usize,
    pub particular_items: usize,
}

impl SeparationSummary {
    pub fn of(lote: &Lote) -> Self {
        let cfc_items = lote.items.iter().filter(|item| item.cfc.is_some()).count();
        Self {
            total: lote.items.len(),
            cfc_items,
            particular_items: lote.items.len() - cfc_items,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeparationStep {
    Start,
    Finish,
}

impl SeparationStep {
    pub fn target_status(self) -> LoteStatus {
        match self {
            SeparationStep::Start => LoteStatus::EmSeparacao,
            SeparationStep::Finish => LoteStatus::Recebido,
        }
    }
}
