//! Authorization decisions.
//!
//! The engine resolves a caller's effective permission set as the role's
//! grant, intersected with an optional scope restriction (API keys only),
//! and answers allow/deny. Denials carry no information about which other
//! permissions exist.

use std::collections::BTreeSet;

use super::{Permission, Role, RoleTable};

/// What a caller is allowed to do: a role, plus an optional narrowing set of
/// scopes. Access tokens carry no scopes; API keys usually do.
#[derive(Debug, Clone)]
pub struct AccessContext {
    pub role: Role,
    pub scopes: Option<BTreeSet<Permission>>,
}

impl AccessContext {
    #[must_use]
    pub fn for_role(role: Role) -> Self {
        Self { role, scopes: None }
    }

    #[must_use]
    pub fn scoped(role: Role, scopes: BTreeSet<Permission>) -> Self {
        Self {
            role,
            scopes: Some(scopes),
        }
    }
}

/// The caller's effective permission set under `table`.
#[must_use]
pub fn effective_permissions(table: &RoleTable, context: &AccessContext) -> BTreeSet<Permission> {
    let granted = table.permissions(context.role);
    match &context.scopes {
        Some(scopes) => granted.intersection(scopes).copied().collect(),
        None => granted,
    }
}

/// Allow/deny for a single required permission.
#[must_use]
pub fn authorize(table: &RoleTable, context: &AccessContext, required: Permission) -> bool {
    if !table.allows(context.role, required) {
        return false;
    }
    match &context.scopes {
        Some(scopes) => scopes.contains(&required),
        None => true,
    }
}

/// Logical OR over multiple acceptable permissions.
#[must_use]
pub fn authorize_any(table: &RoleTable, context: &AccessContext, required: &[Permission]) -> bool {
    required
        .iter()
        .any(|&permission| authorize(table, context, permission))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_grant_authorizes_without_scopes() {
        let table = RoleTable::reference();
        let context = AccessContext::for_role(Role::User);
        assert!(authorize(&table, &context, Permission::AgentCreate));
        assert!(!authorize(&table, &context, Permission::RoleAssign));
    }

    #[test]
    fn scopes_narrow_but_never_widen() {
        let table = RoleTable::reference();
        // Role grants agent:create; scope restricts to agent:read only.
        let context = AccessContext::scoped(Role::User, [Permission::AgentRead].into());
        assert!(authorize(&table, &context, Permission::AgentRead));
        assert!(!authorize(&table, &context, Permission::AgentCreate));

        // A scope outside the role grant is dead weight.
        let context = AccessContext::scoped(Role::Guest, [Permission::AgentDelete].into());
        assert!(!authorize(&table, &context, Permission::AgentDelete));
    }

    #[test]
    fn effective_permissions_is_the_intersection() {
        let table = RoleTable::reference();
        let context = AccessContext::scoped(
            Role::Developer,
            [Permission::AgentRead, Permission::RoleAssign].into(),
        );
        let effective = effective_permissions(&table, &context);
        // role:assign is not granted to developer, so only agent:read survives.
        assert_eq!(effective, [Permission::AgentRead].into());
    }

    #[test]
    fn authorize_any_is_a_logical_or() {
        let table = RoleTable::reference();
        let context = AccessContext::for_role(Role::Guest);
        assert!(authorize_any(
            &table,
            &context,
            &[Permission::AgentDelete, Permission::AgentRead]
        ));
        assert!(!authorize_any(
            &table,
            &context,
            &[Permission::AgentDelete, Permission::AgentUpdate]
        ));
        assert!(!authorize_any(&table, &context, &[]));
    }
}
