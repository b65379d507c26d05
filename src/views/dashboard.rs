use serde::Deserialize;

use crate::domain::{Lote, LoteStatus, LoteTipo};
use crate::views::{scope_lotes, Viewer};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DashboardFilter {
    #[serde(default)]
    pub search: String,
    pub status: Option<LoteStatus>,
    pub tipo: Option<LoteTipo>,
}

impl DashboardFilter {
    /// Search matches the lote number or any item name the caller can see.
    pub fn matches(&self, lote: &Lote) -> bool {
        let search = self.search.trim().to_lowercase();
        let search_ok = search.is_empty()
            || lote.numero.to_lowercase().contains(&search)
            || lote
                .items
                .iter()
                .any(|item| item.nome.to_lowercase().contains(&search));

        search_ok
            && self.status.map_or(true, |status| lote.status == status)
            && self.tipo.map_or(true, |tipo| lote.tipo == tipo)
    }
}

pub fn dashboard_lotes(viewer: &Viewer, lotes: &[Lote], filter: &DashboardFilter) -> Vec<Lote> {
    scope_lotes(viewer, lotes)
        .into_iter()
        .filter(|lote| filter.matches(lote))
        .collect()
}
