//! # Keyward (Token Lifecycle & Role-Based Authorization)
//!
//! `keyward` is an authentication authority built around two credential
//! families with deliberately different lifetimes:
//!
//! - **Access tokens** are short-lived signed JWTs verified offline
//!   (signature + expiry only, no store access). Claims are fixed at mint
//!   time; a role change never rewrites tokens that are already in flight.
//! - **Refresh tokens** are opaque, store-backed secrets organized into
//!   rotation *chains*. Every refresh supersedes the presented record and
//!   issues a child; presenting an already-superseded record is treated as a
//!   theft signal and revokes the entire chain.
//!
//! ## Authorization
//!
//! Each user holds exactly one role (`admin`, `developer`, `user`, `guest`,
//! `service_account`). Roles map to a closed catalog of `category:action`
//! permissions. API keys may narrow their owner's grant: the effective
//! permission set of a key is always the intersection of its scopes and the
//! owner's *current* role permissions.
//!
//! ## Abuse resistance
//!
//! Failed logins feed a per-user lockout counter; rate limiting is an
//! independent fixed-window counter per (caller, endpoint class). Both are
//! composable and neither leaks account existence beyond what a failed login
//! probe already would.

pub mod abuse;
pub mod api;
pub mod auth;
pub mod cli;
pub mod rbac;
pub mod store;
pub mod token;
