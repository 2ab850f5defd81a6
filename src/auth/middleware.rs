//! Authentication Middleware
//!
//! Axum middleware for token validation and the admin role gate.

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use chrono::Utc;

use crate::auth::jwt::expired_token_allowed;
use crate::auth::models::CurrentUser;
use crate::database::models::{FromRow, Role, User};
use crate::error::ApiError;
use crate::server::AppState;

pub struct AuthMiddleware;

impl AuthMiddleware {
    /// Validate the presented token and inject the resolved identity.
    ///
    /// Order of checks: signature/structure, then expiry (overridden for the
    /// refresh/logout routes), then a single query confirming the user exists
    /// AND the literal token string is still in that user's active list.
    /// The list membership check is what makes revocation instant: a token
    /// removed on logout fails here long before its nominal expiry.
    pub async fn validate_token(
        State(state): State<AppState>,
        mut req: Request,
        next: Next,
    ) -> Result<Response, ApiError> {
        let token = bearer_token(&req).ok_or(ApiError::MalformedToken)?;
        let claims = state.tokens.decode(&token)?;

        if claims.is_expired(Utc::now()) && !expired_token_allowed(req.uri().path()) {
            tracing::debug!("expired token on {}", req.uri().path());
            return Err(ApiError::TokenExpired);
        }

        let client = state.db.pool().get().await?;
        let row = client
            .query_opt(
                "SELECT * FROM users WHERE id = $1 AND $2 = ANY(tokens)",
                &[&claims.sub, &token],
            )
            .await?
            .ok_or(ApiError::UserOrTokenNotFound)?;
        let user = User::from_row(&row)?;

        req.extensions_mut().insert(CurrentUser { user, token });
        Ok(next.run(req).await)
    }

    /// Admin role gate. Applied after `validate_token`, never before.
    pub async fn require_admin(req: Request, next: Next) -> Result<Response, ApiError> {
        let current = req
            .extensions()
            .get::<CurrentUser>()
            .ok_or(ApiError::Forbidden)?;
        if current.user.role != Role::Admin {
            tracing::debug!("admin route denied for {}", current.user.account);
            return Err(ApiError::Forbidden);
        }
        Ok(next.run(req).await)
    }
}

fn bearer_token(req: &Request) -> Option<String> {
    req.headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token.to_string())
}
