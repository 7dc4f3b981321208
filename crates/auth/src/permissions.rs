use serde::{Deserialize, Serialize};

/// Permission held by a company member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompanyPermission {
    CreateJobs,
    EditJobs,
    DeleteJobs,
    ViewApplications,
    ManageApplications,
    ManageCompany,
    ManageMembers,
    ViewAnalytics,
}

impl CompanyPermission {
    pub const ALL: [CompanyPermission; 8] = [
        CompanyPermission::CreateJobs,
        CompanyPermission::EditJobs,
        CompanyPermission::DeleteJobs,
        CompanyPermission::ViewApplications,
        CompanyPermission::ManageApplications,
        CompanyPermission::ManageCompany,
        CompanyPermission::ManageMembers,
        CompanyPermission::ViewAnalytics,
    ];

    pub const MEMBER_DEFAULTS: [CompanyPermission; 5] = [
        CompanyPermission::CreateJobs,
        CompanyPermission::EditJobs,
        CompanyPermission::DeleteJobs,
        CompanyPermission::ViewApplications,
        CompanyPermission::ManageApplications,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CompanyPermission::CreateJobs => "create_jobs",
            CompanyPermission::EditJobs => "edit_jobs",
            CompanyPermission::DeleteJobs => "delete_jobs",
            CompanyPermission::ViewApplications => "view_applications",
            CompanyPermission::ManageApplications => "manage_applications",
            CompanyPermission::ManageCompany => "manage_company",
            CompanyPermission::ManageMembers => "manage_members",
            CompanyPermission::ViewAnalytics => "view_analytics",
        }
    }
}

impl core::fmt::Display for CompanyPermission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}
