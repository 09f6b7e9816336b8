//! Caller identity extraction.
//!
//! Authentication happens upstream; the gateway forwards the verified
//! identity in `x-user-id`, `x-org-id`, and `x-role` headers. This
//! module turns those headers into an [`AuthContext`] and rejects
//! requests where any of them is missing or malformed.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::HeaderMap;

use vigil_core::{OrgId, UserId};
use vigil_policy::{AuthContext, Role};

use crate::error::ApiError;

/// Header carrying the authenticated user id.
pub const USER_ID_HEADER: &str = "x-user-id";
/// Header carrying the user's organization id.
pub const ORG_ID_HEADER: &str = "x-org-id";
/// Header carrying the user's role.
pub const ROLE_HEADER: &str = "x-role";

/// Extractor wrapping the caller's [`AuthContext`].
#[derive(Debug, Clone, Copy)]
pub struct Caller(pub AuthContext);

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Result<&'a str, ApiError> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| ApiError::Unauthenticated(format!("missing {name} header")))
}

/// Builds an [`AuthContext`] from the identity headers.
///
/// # Errors
///
/// Returns [`ApiError::Unauthenticated`] when a header is missing or
/// does not parse.
pub fn context_from_headers(headers: &HeaderMap) -> Result<AuthContext, ApiError> {
    let user_id = UserId::parse(header(headers, USER_ID_HEADER)?)
        .map_err(|_| ApiError::Unauthenticated(format!("invalid {USER_ID_HEADER} header")))?;
    let org_id = OrgId::parse(header(headers, ORG_ID_HEADER)?)
        .map_err(|_| ApiError::Unauthenticated(format!("invalid {ORG_ID_HEADER} header")))?;
    let role = Role::parse(header(headers, ROLE_HEADER)?)
        .ok_or_else(|| ApiError::Unauthenticated(format!("invalid {ROLE_HEADER} header")))?;

    Ok(AuthContext::new(user_id, org_id, role))
}

impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        context_from_headers(&parts.headers).map(Caller)
    }
}
