//! Roles, the permission catalog, and the authorization engine.

pub mod engine;
pub mod permission;
pub mod role;
pub mod table;

pub use engine::{authorize, authorize_any, effective_permissions, AccessContext};
pub use permission::Permission;
pub use role::Role;
pub use table::{RoleRegistry, RoleTable};
