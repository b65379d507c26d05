//! Derived, read-only projections of the lote list.
//!
//! Nothing here touches the store. All functions take the already-fetched
//! list and return filtered copies; status changes go through the API.

pub mod dashboard;
pub mod grouping;
pub mod reports;
pub mod separation;

use crate::auth::AuthenticatedUser;
use crate::domain::{Lote, LoteItem, Role};
use crate::utils::text::normalize_cfc;

pub use grouping::{
    group_by_cfc, inferred_cfc, link_name_to_cfc, CfcFilter, CfcGroup, PARTICULAR,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Viewer {
    pub role: Role,
    pub cfc_name: Option<String>,
}

impl Viewer {
    pub fn new(role: Role, cfc_name: Option<&str>) -> Self {
        Self {
            role,
            cfc_name: cfc_name.map(str::to_string),
        }
    }

    pub fn is_cfc_scoped(&self) -> bool {
        self.role == Role::Cfc
    }

    /// Unaffiliated items are never visible to a CFC-scoped viewer.
    pub fn can_see(&self, item: &LoteItem) -> bool {
        if !self.is_cfc_scoped() {
            return true;
        }
        match item.cfc.as_deref() {
            Some(cfc) => normalize_cfc(Some(cfc)) == normalize_cfc(self.cfc_name.as_deref()),
            None => false,
        }
    }
}

impl From<&AuthenticatedUser> for Viewer {
    fn from(user: &AuthenticatedUser) -> Self {
        Viewer::new(user.role, user.cfc_name.as_deref())
    }
}

/// Restricts each lote to the items the viewer may see. CFC-scoped viewers
/// lose lotes that end up empty; other roles get the list back untouched.
pub fn scope_lotes(viewer: &Viewer, lotes: &[Lote]) -> Vec<Lote> {
    if !viewer.is_cfc_scoped() {
        return lotes.to_vec();
    }

    lotes
        .iter()
        .filter_map(|lote| {
            let items: Vec<LoteItem> = lote
                .items
                .iter()
                .filter(|item| viewer.can_see(item))
                .cloned()
                .collect();
            (!items.is_empty()).then(|| Lote {
                items,
                ..lote.clone()
            })
        })
        .collect()
}


#[cfg(test)]
mod tests {
    use super::fixtures::{item, lote};
    use super::*;
    use crate::domain::LoteStatus;

    #[test]
    fn cfc_viewer_sees_only_matching_items() {
        let lotes = vec![lote(
            1,
            "L001",
            LoteStatus::Pendente,
            vec![item(1, "Maria Silva", Some("ORG A")), item(2, "Pedro Alves", None)],
        )];
        let viewer = Viewer::new(Role::Cfc, Some("org a"));

        let scoped = scope_lotes(&viewer, &lotes);
        assert_eq!(scoped.len(), 1);
        assert_eq!(scoped[0].items.len(), 1);
        assert_eq!(scoped[0].items[0].id, 1);
    }

    #[test]
    fn matching_ignores_case_and_accents() {
        let viewer = Viewer::new(Role::Cfc, Some("org a"));
        assert!(viewer.can_see(&item(1, "Maria Silva", Some("ÓRG A"))));
        assert!(viewer.can_see(&item(2, "Maria Silva", Some("  Org A "))));
        assert!(!viewer.can_see(&item(3, "Maria Silva", Some("ORG B"))));
    }

    #[test]
    fn cfc_viewer_without_name_sees_nothing() {
        let lotes = vec![lote(
            1,
            "L001",
            LoteStatus::Pendente,
            vec![item(1, "Pedro Alves", None), item(2, "Ana Souza", Some("CFC Alfa"))],
        )];
        let viewer = Viewer::new(Role::Cfc, None);
        assert!(scope_lotes(&viewer, &lotes).is_empty());
    }

    #[test]
    fn other_roles_see_everything() {
        let lotes = vec![
            lote(1, "L001", LoteStatus::Pendente, vec![item(1, "Pedro Alves", None)]),
            lote(2, "L002", LoteStatus::Recebido, vec![]),
        ];
        for role in [Role::Admin, Role::Interno, Role::Operador] {
            assert_eq!(scope_lotes(&Viewer::new(role, None), &lotes), lotes);
        }
    }
}
