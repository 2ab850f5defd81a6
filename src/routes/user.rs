//! User routes: registration, login, profile, token rotation, and the cart.
//!
//! Token-list and cart mutations always re-read the row under `FOR UPDATE`
//! inside a short transaction; the in-memory `TokenList`/`Cart` ops then
//! enforce the cap and quantity invariants before the single-row write.

use argon2::password_hash::rand_core::OsRng;
use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{delete, get, patch, post};
use axum::{Extension, Json, Router, middleware};
use serde::Deserialize;
use serde_json::{Value, json};
use std::collections::HashMap;
use uuid::Uuid;

use crate::auth::middleware::AuthMiddleware;
use crate::auth::models::CurrentUser;
use crate::database::models::{Cart, FromRow, Product, TokenList, User};
use crate::error::{ApiError, AppJson, duplicate_key};
use crate::server::AppState;

const ACCOUNT_MIN: usize = 4;
const ACCOUNT_MAX: usize = 20;
const PASSWORD_MIN: usize = 4;
const PASSWORD_MAX: usize = 20;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub account: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    /// Account name or email address
    pub account: String,
    pub password: String,
}

/// Relative quantity change for one product, never an absolute target.
#[derive(Debug, Deserialize)]
pub struct CartDeltaRequest {
    pub product: String,
    pub quantity: i32,
}

pub async fn register(
    State(state): State<AppState>,
    AppJson(payload): AppJson<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let account = payload.account.trim().to_string();
    validate_account(&account)?;
    let email = payload.email.trim().to_lowercase();
    validate_email(&email)?;
    validate_password(&payload.password)?;

    let password_hash = hash_password(payload.password).await?;

    // Uniqueness is left to the database constraints; a concurrent duplicate
    // registration loses here instead of slipping past a pre-check.
    let client = state.db.pool().get().await?;
    client
        .execute(
            "INSERT INTO users (id, account, email, password_hash) VALUES ($1, $2, $3, $4)",
            &[&Uuid::new_v4(), &account, &email, &password_hash],
        )
        .await
        .map_err(duplicate_key)?;

    tracing::info!("registered account {account}");
    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "message": "account created" })),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    AppJson(payload): AppJson<LoginRequest>,
) -> Result<Json<Value>, ApiError> {
    let account = payload.account.trim().to_string();

    let mut client = state.db.pool().get().await?;
    let row = client
        .query_opt(
            "SELECT * FROM users WHERE account = $1 OR email = $1",
            &[&account],
        )
        .await?
        .ok_or(ApiError::NotFound("user"))?;
    let user = User::from_row(&row)?;

    verify_password(user.password_hash.clone(), payload.password).await?;

    let token = state.tokens.create_token(user.id)?;

    let tx = client.transaction().await?;
    let row = tx
        .query_one("SELECT tokens FROM users WHERE id = $1 FOR UPDATE", &[&user.id])
        .await?;
    let mut tokens = TokenList::from(row.try_get::<_, Vec<String>>("tokens")?);
    tokens.push(token.clone());
    tx.execute(
        "UPDATE users SET tokens = $2, updated_at = NOW() WHERE id = $1",
        &[&user.id, &tokens.as_slice()],
    )
    .await?;
    tx.commit().await?;

    Ok(Json(json!({
        "success": true,
        "message": "login successful",
        "user": {
            "account": user.account,
            "role": user.role,
            "cartTotal": user.cart.total(),
            "token": token,
        },
    })))
}

pub async fn profile(Extension(current): Extension<CurrentUser>) -> Json<Value> {
    Json(json!({
        "success": true,
        "message": "",
        "user": {
            "account": current.user.account,
            "role": current.user.role,
            "cartTotal": current.user.cart.total(),
        },
    }))
}

/// Rotate the presented token for a fresh one, in place in the list.
pub async fn refresh(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> Result<Json<Value>, ApiError> {
    let fresh = state.tokens.create_token(current.user.id)?;

    let mut client = state.db.pool().get().await?;
    let tx = client.transaction().await?;
    let row = tx
        .query_one(
            "SELECT tokens FROM users WHERE id = $1 FOR UPDATE",
            &[&current.user.id],
        )
        .await?;
    let mut tokens = TokenList::from(row.try_get::<_, Vec<String>>("tokens")?);
    if !tokens.replace(&current.token, fresh.clone()) {
        // Evicted between validation and now; nothing is written.
        return Err(ApiError::NotFound("token"));
    }
    tx.execute(
        "UPDATE users SET tokens = $2, updated_at = NOW() WHERE id = $1",
        &[&current.user.id, &tokens.as_slice()],
    )
    .await?;
    tx.commit().await?;

    Ok(Json(json!({ "success": true, "message": "", "token": fresh })))
}

/// Drop the presented token from the active list. Idempotent.
pub async fn logout(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> Result<Json<Value>, ApiError> {
    let client = state.db.pool().get().await?;
    client
        .execute(
            "UPDATE users SET tokens = array_remove(tokens, $2), updated_at = NOW() WHERE id = $1",
            &[&current.user.id, &current.token],
        )
        .await?;

    Ok(Json(json!({ "success": true, "message": "" })))
}

/// Read the cart with every line resolved to the current product record, so
/// the display always reflects current price/availability.
pub async fn get_cart(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> Result<Json<Value>, ApiError> {
    let client = state.db.pool().get().await?;
    let row = client
        .query_one("SELECT cart FROM users WHERE id = $1", &[&current.user.id])
        .await?;
    let cart: Cart = serde_json::from_value(row.try_get("cart")?)?;

    let ids: Vec<Uuid> = cart.lines().iter().map(|line| line.product).collect();
    let mut products: HashMap<Uuid, Product> = HashMap::new();
    if !ids.is_empty() {
        let rows = client
            .query("SELECT * FROM products WHERE id = ANY($1)", &[&ids])
            .await?;
        for row in &rows {
            let product = Product::from_row(row)?;
            products.insert(product.id, product);
        }
    }

    let result = cart_lines_json(&cart, &products);
    Ok(Json(json!({ "success": true, "message": "", "result": result })))
}

/// Merge a quantity delta into the cart and return the new cart total.
pub async fn update_cart(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    AppJson(payload): AppJson<CartDeltaRequest>,
) -> Result<Json<Value>, ApiError> {
    let product_id = Uuid::parse_str(payload.product.trim())
        .map_err(|_| ApiError::Validation("product id"))?;

    let mut client = state.db.pool().get().await?;
    client
        .query_opt("SELECT 1 FROM products WHERE id = $1", &[&product_id])
        .await?
        .ok_or(ApiError::NotFound("product"))?;

    // Merge against the freshest cart under a row lock so two concurrent
    // deltas for the same user compose instead of racing.
    let tx = client.transaction().await?;
    let row = tx
        .query_one(
            "SELECT cart FROM users WHERE id = $1 FOR UPDATE",
            &[&current.user.id],
        )
        .await?;
    let mut cart: Cart = serde_json::from_value(row.try_get("cart")?)?;
    let total = cart.apply_delta(product_id, payload.quantity);
    tx.execute(
        "UPDATE users SET cart = $2, updated_at = NOW() WHERE id = $1",
        &[&current.user.id, &serde_json::to_value(&cart)?],
    )
    .await?;
    tx.commit().await?;

    Ok(Json(json!({ "success": true, "message": "", "result": total })))
}

/// A line keeps its slot even when its product row has vanished: the product
/// field is null then, and the quantity still counts toward the cart total.
fn cart_lines_json(cart: &Cart, products: &HashMap<Uuid, Product>) -> Vec<Value> {
    cart.lines()
        .iter()
        .map(|line| {
            json!({
                "product": products.get(&line.product),
                "quantity": line.quantity,
            })
        })
        .collect()
}

pub fn create_user_routes(state: AppState) -> Router<AppState> {
    let protected = Router::new()
        .route("/user/profile", get(profile))
        .route("/user/refresh", patch(refresh))
        .route("/user/logout", delete(logout))
        .route("/user/cart", get(get_cart).patch(update_cart))
        .layer(middleware::from_fn_with_state(
            state,
            AuthMiddleware::validate_token,
        ));

    Router::new()
        .route("/user", post(register))
        .route("/user/login", post(login))
        .merge(protected)
}

fn validate_account(account: &str) -> Result<(), ApiError> {
    let len = account.chars().count();
    if len < ACCOUNT_MIN || len > ACCOUNT_MAX {
        return Err(ApiError::Validation("account"));
    }
    if !account.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(ApiError::Validation("account"));
    }
    Ok(())
}

fn validate_email(email: &str) -> Result<(), ApiError> {
    let structurally_valid = email.split_once('@').is_some_and(|(local, domain)| {
        !local.is_empty()
            && domain.contains('.')
            && !domain.starts_with('.')
            && !domain.ends_with('.')
    }) && !email.contains(' ');
    if structurally_valid {
        Ok(())
    } else {
        Err(ApiError::Validation("email"))
    }
}

/// Length check runs against the plaintext, before hashing.
fn validate_password(password: &str) -> Result<(), ApiError> {
    let len = password.chars().count();
    if len < PASSWORD_MIN || len > PASSWORD_MAX {
        return Err(ApiError::Validation("password"));
    }
    Ok(())
}

/// Argon2 is CPU-bound; keep it off the async workers.
async fn hash_password(password: String) -> Result<String, ApiError> {
    tokio::task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| anyhow::anyhow!("password hashing failed: {e}"))
    })
    .await
    .map_err(|e| ApiError::Unexpected(e.into()))?
    .map_err(ApiError::Unexpected)
}

async fn verify_password(stored_hash: String, password: String) -> Result<(), ApiError> {
    let matches = tokio::task::spawn_blocking(move || {
        let parsed = PasswordHash::new(&stored_hash)
            .map_err(|e| anyhow::anyhow!("stored password hash unreadable: {e}"))?;
        Ok::<_, anyhow::Error>(
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok(),
        )
    })
    .await
    .map_err(|e| ApiError::Unexpected(e.into()))?
    .map_err(ApiError::Unexpected)?;

    if matches {
        Ok(())
    } else {
        Err(ApiError::InvalidPassword)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn account_must_be_alphanumeric_4_to_20() {
        assert!(validate_account("abcd").is_ok());
        assert!(validate_account("user1234567890123456").is_ok());
        assert!(validate_account("abc").is_err());
        assert!(validate_account("user12345678901234567").is_err());
        assert!(validate_account("user name").is_err());
        assert!(validate_account("user!").is_err());
    }

    #[test]
    fn email_must_be_structurally_valid() {
        assert!(validate_email("a@b.co").is_ok());
        assert!(validate_email("user.name@example.org").is_ok());
        assert!(validate_email("no-at-sign").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email("user@nodot").is_err());
        assert!(validate_email("user@.com").is_err());
        assert!(validate_email("user@example.com ").is_err());
    }

    #[test]
    fn password_length_checked_before_hashing() {
        assert!(validate_password("abcd").is_ok());
        assert!(validate_password("abc").is_err());
        assert!(validate_password(&"x".repeat(21)).is_err());
    }

    #[test]
    fn vanished_product_keeps_its_cart_line() {
        let present = Uuid::new_v4();
        let gone = Uuid::new_v4();
        let mut cart = Cart::default();
        cart.apply_delta(present, 1);
        cart.apply_delta(gone, 2);

        let now = chrono::Utc::now();
        let mut products = HashMap::new();
        products.insert(
            present,
            Product {
                id: present,
                name: "Rice 5kg".to_string(),
                price: 120,
                stock: 10,
                description: None,
                sell: true,
                image: "https://img.example/rice".to_string(),
                created_at: now,
                updated_at: now,
            },
        );

        let lines = cart_lines_json(&cart, &products);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["product"]["name"], "Rice 5kg");
        assert!(lines[1]["product"].is_null());
        assert_eq!(lines[1]["quantity"], 2);
    }

    #[tokio::test]
    async fn password_hash_roundtrip() {
        let hash = hash_password("hunter22".to_string()).await.unwrap();
        assert_ne!(hash, "hunter22");
        assert!(verify_password(hash.clone(), "hunter22".to_string()).await.is_ok());
        assert!(matches!(
            verify_password(hash, "wrong".to_string()).await,
            Err(ApiError::InvalidPassword)
        ));
    }
}
