//! The service layer: policy, password hashing, the error taxonomy, and the
//! `AuthService` facade that ties the store, token issuer, role registry,
//! and abuse guard together.

pub mod error;
pub mod password;
pub mod policy;
pub mod service;

pub use error::AuthError;
pub use policy::AuthPolicy;
pub use service::{AuthService, RegisterInput, TokenPair};
