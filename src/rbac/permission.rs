//! Closed permission catalog.
//!
//! Permissions are a validated enumeration rendered as `category:action`
//! strings, not free-form text. Every permission an endpoint can require
//! exists here, so a typo is a compile error rather than a silent deny.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
pub enum Permission {
    #[serde(rename = "agent:create")]
    AgentCreate,
    #[serde(rename = "agent:read")]
    AgentRead,
    #[serde(rename = "agent:update")]
    AgentUpdate,
    #[serde(rename = "agent:delete")]
    AgentDelete,
    #[serde(rename = "user:read")]
    UserRead,
    #[serde(rename = "user:update")]
    UserUpdate,
    #[serde(rename = "user:delete")]
    UserDelete,
    #[serde(rename = "apikey:create")]
    ApikeyCreate,
    #[serde(rename = "apikey:read")]
    ApikeyRead,
    #[serde(rename = "apikey:revoke")]
    ApikeyRevoke,
    #[serde(rename = "session:read")]
    SessionRead,
    #[serde(rename = "session:revoke")]
    SessionRevoke,
    #[serde(rename = "role:read")]
    RoleRead,
    #[serde(rename = "role:assign")]
    RoleAssign,
}

impl Permission {
    pub const ALL: [Permission; 14] = [
        Permission::AgentCreate,
        Permission::AgentRead,
        Permission::AgentUpdate,
        Permission::AgentDelete,
        Permission::UserRead,
        Permission::UserUpdate,
        Permission::UserDelete,
        Permission::ApikeyCreate,
        Permission::ApikeyRead,
        Permission::ApikeyRevoke,
        Permission::SessionRead,
        Permission::SessionRevoke,
        Permission::RoleRead,
        Permission::RoleAssign,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Permission::AgentCreate => "agent:create",
            Permission::AgentRead => "agent:read",
            Permission::AgentUpdate => "agent:update",
            Permission::AgentDelete => "agent:delete",
            Permission::UserRead => "user:read",
            Permission::UserUpdate => "user:update",
            Permission::UserDelete => "user:delete",
            Permission::ApikeyCreate => "apikey:create",
            Permission::ApikeyRead => "apikey:read",
            Permission::ApikeyRevoke => "apikey:revoke",
            Permission::SessionRead => "session:read",
            Permission::SessionRevoke => "session:revoke",
            Permission::RoleRead => "role:read",
            Permission::RoleAssign => "role:assign",
        }
    }

    /// The `category` half of `category:action`.
    #[must_use]
    pub fn category(self) -> &'static str {
        self.as_str()
            .split_once(':')
            .map_or("", |(category, _)| category)
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Permission {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Permission::ALL
            .into_iter()
            .find(|permission| permission.as_str() == s)
            .ok_or_else(|| format!("unknown permission: {s}"))
    }
}
