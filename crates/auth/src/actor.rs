use jobmesh_core::{CompanyId, UserId};

use crate::permissions::CompanyPermission;
use crate::roles::Role;

/// The trusted identity assertion for one request or command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    user_id: UserId,
    role: Role,
    company_id: Option<CompanyId>,
    permissions: Vec<CompanyPermission>,
}

impl Actor {
    pub fn new(user_id: UserId, role: Role) -> Self {
        Self {
            user_id,
            role,
            company_id: None,
            permissions: Vec::new(),
        }
    }

    /// Attach company membership; permissions default from the role.
    pub fn with_company(mut self, company_id: CompanyId) -> Self {
        self.company_id = Some(company_id);
        self.permissions = self.role.default_company_permissions();
        self
    }

    pub fn with_permissions(mut self, permissions: Vec<CompanyPermission>) -> Self {
        self.permissions = permissions;
        self
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn company_id(&self) -> Option<CompanyId> {
        self.company_id
    }

    pub fn permissions(&self) -> &[CompanyPermission] {
        &self.permissions
    }

    pub fn is_member_of(&self, company_id: CompanyId) -> bool {
        self.company_id == Some(company_id)
    }
}
