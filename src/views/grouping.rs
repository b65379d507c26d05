use std::fmt;

use crate::domain::{Lote, LoteItem};

/// Label of the bucket holding unaffiliated items.
pub const PARTICULAR: &str = "Particular";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CfcGroup {
    Cfc(String),
    Particular,
}

impl CfcGroup {
    pub fn of(cfc: Option<&str>) -> Self {
        match cfc {
            Some(name) => CfcGroup::Cfc(name.to_string()),
            None => CfcGroup::Particular,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            CfcGroup::Cfc(name) => name,
            CfcGroup::Particular => PARTICULAR,
        }
    }
}

impl fmt::Display for CfcGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Selection in the CFC dropdowns: everything, only unaffiliated items, or
/// one named CFC (exact match).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CfcFilter {
    #[default]
    All,
    Particular,
    Named(String),
}

impl CfcFilter {
    pub fn parse(value: &str) -> Self {
        let value = value.trim();
        if value.is_empty() || value.eq_ignore_ascii_case("all") {
            CfcFilter::All
        } else if value.eq_ignore_ascii_case("particular") {
            CfcFilter::Particular
        } else {
            CfcFilter::Named(value.to_string())
        }
    }

    pub fn accepts(&self, cfc: Option<&str>) -> bool {
        match self {
            CfcFilter::All => true,
            CfcFilter::Particular => cfc.is_none(),
            CfcFilter::Named(name) => cfc == Some(name.as_str()),
        }
    }
}

/// Buckets items by their stored tag, keeping the order in which each bucket
/// first appears.
pub fn group_by_cfc<'a, I>(items: I) -> Vec<(CfcGroup, Vec<&'a LoteItem>)>
where
    I: IntoIterator<Item = &'a LoteItem>,
{
    let mut groups: Vec<(CfcGroup, Vec<&'a LoteItem>)> = Vec::new();
    for item in items {
        let key = CfcGroup::of(item.cfc.as_deref());
        match groups.iter_mut().find(|(group, _)| *group == key) {
            Some((_, members)) => members.push(item),
            None => groups.push((key, vec![item])),
        }
    }
    groups
}

/// Most frequent tag among historical items whose name contains `nome`
/// (case-insensitive). On a tie the tag seen first later in the history wins.
pub fn link_name_to_cfc(nome: &str, history: &[Lote]) -> Option<String> {
    let needle = nome.to_lowercase();
    let mut counts: Vec<(&str, usize)> = Vec::new();

    let tagged = history
        .iter()
        .flat_map(|lote| lote.items.iter())
        .filter_map(|item| item.cfc.as_deref().map(|cfc| (item, cfc)));
    for (item, cfc) in tagged {
        if !item.nome.to_lowercase().contains(&needle) {
            continue;
        }
        match counts.iter_mut().find(|(seen, _)| *seen == cfc) {
            Some((_, count)) => *count += 1,
            None => counts.push((cfc, 1)),
        }
    }

    counts
        .into_iter()
        .max_by_key(|(_, count)| *count)
        .map(|(cfc, _)| cfc.to_string())
}

/// Stored tag, or the linked one for unaffiliated items. Display only.
pub fn inferred_cfc(item: &LoteItem, history: &[Lote]) -> Option<String> {
    item.cfc
        .clone()
        .or_else(|| link_name_to_cfc(&item.nome, history))
}
