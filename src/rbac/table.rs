//! Role → permission-set table and the registry that holds the active one.
//!
//! The table is injected configuration, not a singleton. Reloads build a new
//! immutable table and swap the `Arc` atomically so readers never observe a
//! partially-updated mapping.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, RwLock};

use super::{Permission, Role};

#[derive(Debug, Clone)]
pub struct RoleTable {
    grants: HashMap<Role, BTreeSet<Permission>>,
}

impl RoleTable {
    /// The reference table shipped with the service.
    ///
    /// `admin` is a superset of every other role. `service_account` sits
    /// outside the human-role hierarchy and only carries agent permissions.
    #[must_use]
    pub fn reference() -> Self {
        let mut grants: HashMap<Role, BTreeSet<Permission>> = HashMap::new();

        grants.insert(Role::Admin, Permission::ALL.into_iter().collect());
        grants.insert(
            Role::Developer,
            [
                Permission::AgentCreate,
                Permission::AgentRead,
                Permission::AgentUpdate,
                Permission::AgentDelete,
                Permission::UserRead,
                Permission::ApikeyCreate,
                Permission::ApikeyRead,
                Permission::ApikeyRevoke,
                Permission::SessionRead,
                Permission::SessionRevoke,
            ]
            .into_iter()
            .collect(),
        );
        grants.insert(
            Role::User,
            [
                Permission::AgentCreate,
                Permission::AgentRead,
                Permission::ApikeyCreate,
                Permission::ApikeyRead,
                Permission::ApikeyRevoke,
                Permission::SessionRead,
                Permission::SessionRevoke,
            ]
            .into_iter()
            .collect(),
        );
        grants.insert(Role::Guest, [Permission::AgentRead].into_iter().collect());
        grants.insert(
            Role::ServiceAccount,
            [
                Permission::AgentCreate,
                Permission::AgentRead,
                Permission::AgentUpdate,
                Permission::AgentDelete,
            ]
            .into_iter()
            .collect(),
        );

        Self { grants }
    }

    /// Build a table from explicit grants. Roles absent from `grants` resolve
    /// to the empty set.
    #[must_use]
    pub fn from_grants(grants: HashMap<Role, BTreeSet<Permission>>) -> Self {
        Self { grants }
    }

    #[must_use]
    pub fn permissions(&self, role: Role) -> BTreeSet<Permission> {
        self.grants.get(&role).cloned().unwrap_or_default()
    }

    #[must_use]
    pub fn allows(&self, role: Role, permission: Permission) -> bool {
        self.grants
            .get(&role)
            .is_some_and(|set| set.contains(&permission))
    }
}

/// Holder for the active table. `load` clones an `Arc`, so a concurrent
/// `replace` never tears an in-progress authorization decision.
#[derive(Debug)]
pub struct RoleRegistry {
    table: RwLock<Arc<RoleTable>>,
}

impl RoleRegistry {
    #[must_use]
    pub fn new(table: RoleTable) -> Self {
        Self {
            table: RwLock::new(Arc::new(table)),
        }
    }

    #[must_use]
    pub fn load(&self) -> Arc<RoleTable> {
        match self.table.read() {
            Ok(guard) => Arc::clone(&guard),
            // A poisoned lock still holds a valid table.
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    pub fn replace(&self, table: RoleTable) {
        let next = Arc::new(table);
        match self.table.write() {
            Ok(mut guard) => *guard = next,
            Err(poisoned) => *poisoned.into_inner() = next,
        }
    }
}

impl Default for RoleRegistry {
    fn default() -> Self {
        Self::new(RoleTable::reference())
    }
}
