use thiserror::Error;

use jobmesh_core::{CompanyId, DomainError, UserId};

use crate::{Actor, CompanyPermission, Role};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("role '{actual}' may not {action}")]
    RoleNotAllowed { actual: Role, action: &'static str },

    #[error("not a member of company {0}")]
    NotAMember(CompanyId),

    #[error("missing company permission '{0}'")]
    MissingPermission(CompanyPermission),

    #[error("only the poster or a company admin may {0}")]
    NotOwner(&'static str),
}

impl From<AuthzError> for DomainError {
    fn from(value: AuthzError) -> Self {
        DomainError::permission_denied(value.to_string())
    }
}

/// Require the actor's platform role to be one of `allowed`.
pub fn ensure_role(actor: &Actor, allowed: &[Role], action: &'static str) -> Result<(), AuthzError> {
    if allowed.contains(&actor.role()) {
        Ok(())
    } else {
        Err(AuthzError::RoleNotAllowed {
            actual: actor.role(),
            action,
        })
    }
}

/// Require membership in `company` with `permission`.
pub fn ensure_company_permission(
    actor: &Actor,
    company: CompanyId,
    permission: CompanyPermission,
) -> Result<(), AuthzError> {
    if !actor.is_member_of(company) {
        return Err(AuthzError::NotAMember(company));
    }
    if actor.permissions().contains(&permission) {
        Ok(())
    } else {
        Err(AuthzError::MissingPermission(permission))
    }
}

/// Poster (as recruiter) or an `admin_company` of the owning company.
pub fn ensure_poster_or_company_admin(
    actor: &Actor,
    posted_by: UserId,
    company: CompanyId,
    action: &'static str,
) -> Result<(), AuthzError> {
    match actor.role() {
        Role::Recruiter if actor.user_id() == posted_by => Ok(()),
        Role::AdminCompany if actor.is_member_of(company) => Ok(()),
        _ => Err(AuthzError::NotOwner(action)),
    }
}
