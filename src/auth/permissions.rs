use crate::domain::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    ViewSelf,
    ChangeOwnPassword,
    ListLotes,
    DownloadPdf,
    CreateLote,
    ImportLote,
    UpdateLoteStatus,
    DeleteLote,
    ManageUsers,
}

const EVERYONE: &[Role] = &Role::ALL;
const INTAKE: &[Role] = &[Role::Admin, Role::Operador];
const OPERATORS: &[Role] = &[Role::Operador];
const ADMINS: &[Role] = &[Role::Admin];

/// Status transitions belong to operators alone; admins create and delete
/// lotes but do not move them through separation.
const PERMISSIONS: &[(Action, &[Role])] = &[
    (Action::ViewSelf, EVERYONE),
    (Action::ChangeOwnPassword, EVERYONE),
    (Action::ListLotes, EVERYONE),
    (Action::DownloadPdf, EVERYONE),
    (Action::CreateLote, INTAKE),
    (Action::ImportLote, INTAKE),
    (Action::UpdateLoteStatus, OPERATORS),
    (Action::DeleteLote, ADMINS),
    (Action::ManageUsers, ADMINS),
];

pub fn allowed_roles(action: Action) -> &'static [Role] {
    PERMISSIONS
        .iter()
        .find(|(candidate, _)| *candidate == action)
        .map(|(_, roles)| *roles)
        .unwrap_or(&[])
}

pub fn is_allowed(role: Role, action: Action) -> bool {
    allowed_roles(action).contains(&role)
}
