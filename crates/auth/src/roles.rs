use core::str::FromStr;

use serde::{Deserialize, Serialize};

use jobmesh_core::DomainError;

use crate::permissions::CompanyPermission;

/// Platform role carried by the identity assertion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Applicant,
    Recruiter,
    HrManager,
    AdminCompany,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Applicant => "applicant",
            Role::Recruiter => "recruiter",
            Role::HrManager => "hr_manager",
            Role::AdminCompany => "admin_company",
            Role::Admin => "admin",
        }
    }

    /// Company permissions a member with this role holds when none are assigned.
    pub fn default_company_permissions(&self) -> Vec<CompanyPermission> {
        match self {
            Role::AdminCompany => CompanyPermission::ALL.to_vec(),
            Role::Recruiter | Role::HrManager => CompanyPermission::MEMBER_DEFAULTS.to_vec(),
            Role::Applicant | Role::Admin => Vec::new(),
        }
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "applicant" => Ok(Role::Applicant),
            "recruiter" => Ok(Role::Recruiter),
            "hr_manager" => Ok(Role::HrManager),
            "admin_company" => Ok(Role::AdminCompany),
            "admin" => Ok(Role::Admin),
            other => Err(DomainError::validation(format!("unknown role: {other}"))),
        }
    }
}
