//! Product catalog routes.
//!
//! Public listing shows sellable products only; creation, edits, and the
//! full listing are admin-gated. Create/update accept a multipart form whose
//! `image` part goes through the external image store.

use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, patch, post};
use axum::{Json, Router, middleware};
use serde_json::{Value, json};
use std::collections::HashMap;
use uuid::Uuid;

use crate::auth::middleware::AuthMiddleware;
use crate::database::models::{FromRow, Product};
use crate::error::ApiError;
use crate::server::AppState;
use crate::services::upload::collect_form;

const NAME_MAX: usize = 100;
const DESCRIPTION_MAX: usize = 500;

/// Validated create payload pulled from multipart text fields.
#[derive(Debug)]
struct ProductInput {
    name: String,
    price: i32,
    stock: i32,
    description: Option<String>,
    sell: bool,
}

impl ProductInput {
    fn from_fields(fields: &HashMap<String, String>) -> Result<Self, ApiError> {
        Ok(Self {
            name: parse_name(fields.get("name").map(String::as_str).unwrap_or_default())?,
            price: parse_price(fields.get("price").ok_or(ApiError::Validation("price"))?)?,
            stock: parse_stock(fields.get("stock").ok_or(ApiError::Validation("stock"))?)?,
            description: parse_description(fields.get("description"))?,
            sell: match fields.get("sell") {
                Some(raw) => parse_sell(raw)?,
                None => true,
            },
        })
    }
}

/// Update payload; absent fields keep their stored values.
#[derive(Debug, Default)]
struct ProductPatch {
    name: Option<String>,
    price: Option<i32>,
    stock: Option<i32>,
    description: Option<String>,
    sell: Option<bool>,
}

impl ProductPatch {
    fn from_fields(fields: &HashMap<String, String>) -> Result<Self, ApiError> {
        Ok(Self {
            name: fields.get("name").map(|raw| parse_name(raw)).transpose()?,
            price: fields.get("price").map(|raw| parse_price(raw)).transpose()?,
            stock: fields.get("stock").map(|raw| parse_stock(raw)).transpose()?,
            description: parse_description(fields.get("description"))?,
            sell: fields.get("sell").map(|raw| parse_sell(raw)).transpose()?,
        })
    }
}

/// Sellable products only; the public storefront view.
pub async fn get_sellable(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let client = state.db.pool().get().await?;
    let rows = client
        .query(
            "SELECT * FROM products WHERE sell = TRUE ORDER BY created_at DESC",
            &[],
        )
        .await?;
    Ok(Json(json!({ "success": true, "message": "", "result": rows_to_products(&rows)? })))
}

/// Every product, delisted included. Admin only.
pub async fn get_all(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let client = state.db.pool().get().await?;
    let rows = client
        .query("SELECT * FROM products ORDER BY created_at DESC", &[])
        .await?;
    Ok(Json(json!({ "success": true, "message": "", "result": rows_to_products(&rows)? })))
}

pub async fn get_one(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let id = parse_id(&id)?;
    let client = state.db.pool().get().await?;
    let row = client
        .query_opt("SELECT * FROM products WHERE id = $1", &[&id])
        .await?
        .ok_or(ApiError::NotFound("product"))?;
    let product = Product::from_row(&row)?;
    Ok(Json(json!({ "success": true, "message": "", "result": product })))
}

pub async fn create(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let (fields, image) = collect_form(multipart).await?;
    let input = ProductInput::from_fields(&fields)?;
    let image = image.ok_or(ApiError::Validation("image"))?;
    let image_url = state.images.upload(&image).await?;

    let client = state.db.pool().get().await?;
    let row = client
        .query_one(
            "INSERT INTO products (id, name, price, stock, description, sell, image) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING *",
            &[
                &Uuid::new_v4(),
                &input.name,
                &input.price,
                &input.stock,
                &input.description,
                &input.sell,
                &image_url,
            ],
        )
        .await?;
    let product = Product::from_row(&row)?;

    tracing::info!("product {} created", product.id);
    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "message": "product created", "result": product })),
    ))
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    multipart: Multipart,
) -> Result<Json<Value>, ApiError> {
    let id = parse_id(&id)?;
    let (fields, image) = collect_form(multipart).await?;
    let patch = ProductPatch::from_fields(&fields)?;
    // No image in the form keeps the stored one.
    let image_url = match image {
        Some(image) => Some(state.images.upload(&image).await?),
        None => None,
    };

    let client = state.db.pool().get().await?;
    let row = client
        .query_opt(
            "UPDATE products SET \
             name = COALESCE($2, name), \
             price = COALESCE($3, price), \
             stock = COALESCE($4, stock), \
             description = COALESCE($5, description), \
             sell = COALESCE($6, sell), \
             image = COALESCE($7, image), \
             updated_at = NOW() \
             WHERE id = $1 RETURNING *",
            &[
                &id,
                &patch.name,
                &patch.price,
                &patch.stock,
                &patch.description,
                &patch.sell,
                &image_url,
            ],
        )
        .await?
        .ok_or(ApiError::NotFound("product"))?;
    let product = Product::from_row(&row)?;

    Ok(Json(json!({ "success": true, "message": "product updated", "result": product })))
}

pub fn create_product_routes(state: AppState) -> Router<AppState> {
    let admin = Router::new()
        .route("/product/all", get(get_all))
        .route("/product", post(create))
        .route("/product/{id}", patch(update))
        .layer(middleware::from_fn(AuthMiddleware::require_admin))
        .layer(middleware::from_fn_with_state(
            state,
            AuthMiddleware::validate_token,
        ));

    Router::new()
        .route("/product", get(get_sellable))
        .route("/product/{id}", get(get_one))
        .merge(admin)
}

fn rows_to_products(rows: &[tokio_postgres::Row]) -> Result<Vec<Product>, ApiError> {
    let mut products = Vec::with_capacity(rows.len());
    for row in rows {
        products.push(Product::from_row(row)?);
    }
    Ok(products)
}

fn parse_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw.trim()).map_err(|_| ApiError::Validation("product id"))
}

fn parse_name(raw: &str) -> Result<String, ApiError> {
    let name = raw.trim();
    let len = name.chars().count();
    if len == 0 || len > NAME_MAX {
        return Err(ApiError::Validation("name"));
    }
    Ok(name.to_string())
}

fn parse_price(raw: &str) -> Result<i32, ApiError> {
    match raw.trim().parse::<i32>() {
        Ok(price) if price >= 0 => Ok(price),
        _ => Err(ApiError::Validation("price")),
    }
}

fn parse_stock(raw: &str) -> Result<i32, ApiError> {
    match raw.trim().parse::<i32>() {
        Ok(stock) if stock >= 0 => Ok(stock),
        _ => Err(ApiError::Validation("stock")),
    }
}

fn parse_description(raw: Option<&String>) -> Result<Option<String>, ApiError> {
    match raw {
        None => Ok(None),
        Some(raw) => {
            let description = raw.trim();
            if description.chars().count() > DESCRIPTION_MAX {
                return Err(ApiError::Validation("description"));
            }
            if description.is_empty() {
                Ok(None)
            } else {
                Ok(Some(description.to_string()))
            }
        }
    }
}

fn parse_sell(raw: &str) -> Result<bool, ApiError> {
    raw.trim()
        .parse::<bool>()
        .map_err(|_| ApiError::Validation("sell"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn create_input_requires_name_price_stock() {
        let input = ProductInput::from_fields(&fields(&[
            ("name", "Rice 5kg"),
            ("price", "120"),
            ("stock", "10"),
        ]))
        .unwrap();
        assert_eq!(input.name, "Rice 5kg");
        assert!(input.sell);
        assert!(input.description.is_none());

        assert!(ProductInput::from_fields(&fields(&[("price", "120"), ("stock", "1")])).is_err());
        assert!(ProductInput::from_fields(&fields(&[("name", "x"), ("stock", "1")])).is_err());
    }

    #[test]
    fn price_and_stock_must_be_non_negative_integers() {
        assert!(parse_price("-1").is_err());
        assert!(parse_price("12.5").is_err());
        assert!(parse_price("0").is_ok());
        assert!(parse_stock("-3").is_err());
        assert!(parse_stock("7").is_ok());
    }

    #[test]
    fn name_and_description_length_limits() {
        assert!(parse_name(&"x".repeat(NAME_MAX)).is_ok());
        assert!(parse_name(&"x".repeat(NAME_MAX + 1)).is_err());
        assert!(parse_name("  ").is_err());
        let long = "d".repeat(DESCRIPTION_MAX + 1);
        assert!(parse_description(Some(&long)).is_err());
    }

    #[test]
    fn patch_keeps_absent_fields_unset() {
        let patch = ProductPatch::from_fields(&fields(&[("price", "99")])).unwrap();
        assert_eq!(patch.price, Some(99));
        assert!(patch.name.is_none());
        assert!(patch.sell.is_none());
    }

    #[test]
    fn malformed_id_is_a_validation_error() {
        assert!(matches!(
            parse_id("not-a-uuid"),
            Err(ApiError::Validation("product id"))
        ));
    }
}
