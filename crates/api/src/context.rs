//! Identity assertion carried by gateway headers.
//!
//! Credentials are verified upstream; the node trusts these headers.

use axum::http::HeaderMap;

use jobmesh_auth::{Actor, Role};
use jobmesh_core::{CompanyId, UserId};

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";
pub const COMPANY_ID_HEADER: &str = "x-company-id";

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Build the request's [`Actor`]. Returns a human-readable reason on failure.
pub fn actor_from_headers(headers: &HeaderMap) -> Result<Actor, String> {
    let user_id: UserId = header(headers, USER_ID_HEADER)
        .ok_or_else(|| format!("missing {USER_ID_HEADER} header"))?
        .parse()
        .map_err(|_| format!("invalid {USER_ID_HEADER} header"))?;
    let role: Role = header(headers, USER_ROLE_HEADER)
        .ok_or_else(|| format!("missing {USER_ROLE_HEADER} header"))?
        .parse()
        .map_err(|_| format!("invalid {USER_ROLE_HEADER} header"))?;

    let actor = Actor::new(user_id, role);
    match header(headers, COMPANY_ID_HEADER) {
        Some(raw) => {
            let company: CompanyId = raw
                .parse()
                .map_err(|_| format!("invalid {COMPANY_ID_HEADER} header"))?;
            Ok(actor.with_company(company))
        }
        None => Ok(actor),
    }
}
