//! API error taxonomy and its HTTP mapping.
//!
//! Every handler returns `Result<_, ApiError>`; the `IntoResponse` impl is
//! the single place where errors become status codes and the standard
//! `{ success, message }` envelope. Internal detail from `Unexpected` is
//! logged server-side and never leaks into the response body.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, Request};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;
use tokio_postgres::error::SqlState;

#[derive(Debug, Error)]
pub enum ApiError {
    /// A named input field failed validation.
    #[error("invalid {0}")]
    Validation(&'static str),

    /// The named resource does not exist.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// A unique column collided on insert.
    #[error("{0} already exists")]
    Duplicate(&'static str),

    /// Missing bearer token, or one that fails structural/signature checks.
    #[error("invalid token")]
    MalformedToken,

    /// A structurally valid token past its expiry, on a route that does not
    /// accept expired tokens.
    #[error("token expired")]
    TokenExpired,

    /// The token verified but its user is gone or no longer lists it.
    #[error("user or token not found")]
    UserOrTokenNotFound,

    /// Login credentials resolved a user but the password did not match.
    #[error("invalid password")]
    InvalidPassword,

    /// Authenticated, but not an admin.
    #[error("forbidden")]
    Forbidden,

    /// Checkout attempted with nothing in the cart.
    #[error("cart is empty")]
    EmptyCart,

    /// Checkout attempted while the cart holds a delisted or vanished product.
    #[error("cart contains unavailable products")]
    DelistedInCart,

    /// Image upload refused: wrong type, empty, oversize, or provider said no.
    #[error("image upload rejected")]
    UploadRejected,

    /// Anything the client cannot act on. Detail stays in the server log.
    #[error("internal server error")]
    Unexpected(#[from] anyhow::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_)
            | Self::EmptyCart
            | Self::DelistedInCart
            | Self::UploadRejected => StatusCode::BAD_REQUEST,
            Self::MalformedToken
            | Self::TokenExpired
            | Self::UserOrTokenNotFound
            | Self::InvalidPassword => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Duplicate(_) => StatusCode::CONFLICT,
            Self::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let Self::Unexpected(ref e) = self {
            tracing::error!("unexpected error: {e:#}");
        }
        let body = json!({ "success": false, "message": self.to_string() });
        (self.status(), Json(body)).into_response()
    }
}

impl From<tokio_postgres::Error> for ApiError {
    fn from(e: tokio_postgres::Error) -> Self {
        Self::Unexpected(anyhow::Error::new(e).context("database query failed"))
    }
}

impl From<deadpool_postgres::PoolError> for ApiError {
    fn from(e: deadpool_postgres::PoolError) -> Self {
        Self::Unexpected(anyhow::Error::new(e).context("connection pool unavailable"))
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(e: serde_json::Error) -> Self {
        Self::Unexpected(anyhow::Error::new(e).context("stored document undecodable"))
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        Self::Unexpected(anyhow::Error::new(e).context("upstream request failed"))
    }
}

/// Map a unique-constraint violation to the duplicate it names; anything
/// else passes through as a database error.
pub fn duplicate_key(e: tokio_postgres::Error) -> ApiError {
    if let Some(db_error) = e.as_db_error() {
        if db_error.code() == &SqlState::UNIQUE_VIOLATION {
            return match db_error.constraint() {
                Some("users_account_key") => ApiError::Duplicate("account"),
                Some("users_email_key") => ApiError::Duplicate("email"),
                _ => ApiError::Duplicate("record"),
            };
        }
    }
    e.into()
}

/// JSON body extractor whose rejection uses the standard envelope instead of
/// axum's plain-text default.
pub struct AppJson<T>(pub T);

impl<S, T> FromRequest<S> for AppJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(_) => Err(ApiError::Validation("json body")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_faults_are_400() {
        assert_eq!(ApiError::Validation("name").status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::EmptyCart.status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::DelistedInCart.status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::UploadRejected.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn auth_faults_are_401_and_403() {
        assert_eq!(ApiError::MalformedToken.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::TokenExpired.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            ApiError::UserOrTokenNotFound.status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(ApiError::InvalidPassword.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::Forbidden.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn lookup_and_conflict_faults() {
        assert_eq!(ApiError::NotFound("user").status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::Duplicate("email").status(), StatusCode::CONFLICT);
    }

    #[test]
    fn unexpected_is_500_with_generic_message() {
        let e = ApiError::Unexpected(anyhow::anyhow!("connection refused"));
        assert_eq!(e.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(e.to_string(), "internal server error");
    }

    #[test]
    fn messages_name_the_offending_field() {
        assert_eq!(ApiError::Validation("price").to_string(), "invalid price");
        assert_eq!(ApiError::NotFound("product").to_string(), "product not found");
        assert_eq!(
            ApiError::Duplicate("account").to_string(),
            "account already exists"
        );
    }
}
