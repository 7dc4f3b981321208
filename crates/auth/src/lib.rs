//! `jobmesh-auth`: pure authorization boundary.
//!
//! Credentials are verified upstream; this crate only interprets the trusted
//! identity assertion (`userId`, `userRole`, company membership) and answers
//! role/ownership questions. No IO, no HTTP.

pub mod actor;
pub mod authorize;
pub mod permissions;
pub mod roles;

pub use actor::Actor;
pub use authorize::{
    AuthzError, ensure_company_permission, ensure_poster_or_company_admin, ensure_role,
};
pub use permissions::CompanyPermission;
pub use roles::Role;
