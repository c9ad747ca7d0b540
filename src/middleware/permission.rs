use axum::{
    async_trait,
    extract::{FromRequestParts, Path},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use tower_cookies::Cookies;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::Membership,
    services::Actor,
    state::AppState,
    store::AuditStore,
    utils::verify_token,
};

const AUTH_COOKIE: &str = "auth_token";

/// The signed-in user's membership in the organization named by the route.
///
/// Extracting this authenticates the request and resolves the tenant. A user
/// without an active membership gets the same 404 as an unknown organization.
#[derive(Debug, Clone)]
pub struct CurrentMember {
    pub membership: Membership,
}

impl CurrentMember {
    pub fn actor(&self) -> Actor {
        Actor {
            organization_id: self.membership.organization_id,
            user_id: self.membership.user_id,
        }
    }

    pub fn require(&self, permission: &str) -> AppResult<Actor> {
        if !self.membership.has_permission(permission) {
            log::warn!(
                "User {} lacks {} in organization {}",
                self.membership.user_id, permission, self.membership.organization_id
            );
            return Err(AppError::Forbidden(format!("Missing permission: {}", permission)));
        }
        Ok(self.actor())
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentMember {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = match bearer_token(&parts.headers) {
            Some(token) => Some(token),
            None => Cookies::from_request_parts(parts, state)
                .await
                .ok()
                .and_then(|cookies| cookies.get(AUTH_COOKIE).map(|c| c.value().to_string())),
        }
        .ok_or(AppError::Unauthorized)?;

        let user_id = verify_token(&token, &state.config.jwt_secret)
            .map_err(|e| {
                log::debug!("Rejected session token: {}", e);
                AppError::Unauthorized
            })?
            .user_id()
            .ok_or(AppError::Unauthorized)?;

        let Path(organization_id) = Path::<Uuid>::from_request_parts(parts, state)
            .await
            .map_err(|_| AppError::NotFound("Organization not found".to_string()))?;

        let membership = state
            .audits
            .store()
            .find_membership(organization_id, user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Organization not found".to_string()))?;

        Ok(Self { membership })
    }
}
