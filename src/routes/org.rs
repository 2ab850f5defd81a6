//! Organization directory routes.
//!
//! Same shape as the product catalog: public listing of visible orgs,
//! admin-gated creation/edits, multipart forms with a logo image.

use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, patch, post};
use axum::{Json, Router, middleware};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::str::FromStr;
use uuid::Uuid;

use crate::auth::middleware::AuthMiddleware;
use crate::database::models::{FromRow, Org, Region};
use crate::error::ApiError;
use crate::server::AppState;
use crate::services::upload::collect_form;

const NAME_MAX: usize = 100;
const ADDRESS_MAX: usize = 100;
const DESCRIPTION_MAX: usize = 500;

#[derive(Debug)]
struct OrgInput {
    name: String,
    category: Region,
    address: String,
    phone: String,
    description: Option<String>,
    sell: bool,
}

impl OrgInput {
    fn from_fields(fields: &HashMap<String, String>) -> Result<Self, ApiError> {
        Ok(Self {
            name: parse_name(fields.get("name").map(String::as_str).unwrap_or_default())?,
            category: parse_category(
                fields
                    .get("category")
                    .ok_or(ApiError::Validation("category"))?,
            )?,
            address: parse_address(
                fields
                    .get("address")
                    .map(String::as_str)
                    .unwrap_or_default(),
            )?,
            phone: parse_phone(fields.get("phone").map(String::as_str).unwrap_or_default())?,
            description: parse_description(fields.get("description"))?,
            sell: match fields.get("sell") {
                Some(raw) => parse_sell(raw)?,
                None => true,
            },
        })
    }
}

#[derive(Debug, Default)]
struct OrgPatch {
    name: Option<String>,
    category: Option<Region>,
    address: Option<String>,
    phone: Option<String>,
    description: Option<String>,
    sell: Option<bool>,
}

impl OrgPatch {
    fn from_fields(fields: &HashMap<String, String>) -> Result<Self, ApiError> {
        Ok(Self {
            name: fields.get("name").map(|raw| parse_name(raw)).transpose()?,
            category: fields
                .get("category")
                .map(|raw| parse_category(raw))
                .transpose()?,
            address: fields
                .get("address")
                .map(|raw| parse_address(raw))
                .transpose()?,
            phone: fields.get("phone").map(|raw| parse_phone(raw)).transpose()?,
            description: parse_description(fields.get("description"))?,
            sell: fields.get("sell").map(|raw| parse_sell(raw)).transpose()?,
        })
    }
}

/// Visible organizations only; the public directory view.
pub async fn get_visible(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let client = state.db.pool().get().await?;
    let rows = client
        .query(
            "SELECT * FROM orgs WHERE sell = TRUE ORDER BY created_at DESC",
            &[],
        )
        .await?;
    Ok(Json(json!({ "success": true, "message": "", "result": rows_to_orgs(&rows)? })))
}

/// Every organization, hidden included. Admin only.
pub async fn get_all(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let client = state.db.pool().get().await?;
    let rows = client
        .query("SELECT * FROM orgs ORDER BY created_at DESC", &[])
        .await?;
    Ok(Json(json!({ "success": true, "message": "", "result": rows_to_orgs(&rows)? })))
}

pub async fn get_one(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let id = parse_id(&id)?;
    let client = state.db.pool().get().await?;
    let row = client
        .query_opt("SELECT * FROM orgs WHERE id = $1", &[&id])
        .await?
        .ok_or(ApiError::NotFound("org"))?;
    let org = Org::from_row(&row)?;
    Ok(Json(json!({ "success": true, "message": "", "result": org })))
}

pub async fn create(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let (fields, image) = collect_form(multipart).await?;
    let input = OrgInput::from_fields(&fields)?;
    let image = image.ok_or(ApiError::Validation("image"))?;
    let image_url = state.images.upload(&image).await?;

    let client = state.db.pool().get().await?;
    let row = client
        .query_one(
            "INSERT INTO orgs (id, name, category, address, phone, description, sell, image) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING *",
            &[
                &Uuid::new_v4(),
                &input.name,
                &input.category.as_str(),
                &input.address,
                &input.phone,
                &input.description,
                &input.sell,
                &image_url,
            ],
        )
        .await?;
    let org = Org::from_row(&row)?;

    tracing::info!("org {} created", org.id);
    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "message": "org created", "result": org })),
    ))
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    multipart: Multipart,
) -> Result<Json<Value>, ApiError> {
    let id = parse_id(&id)?;
    let (fields, image) = collect_form(multipart).await?;
    let patch = OrgPatch::from_fields(&fields)?;
    let image_url = match image {
        Some(image) => Some(state.images.upload(&image).await?),
        None => None,
    };

    let client = state.db.pool().get().await?;
    let row = client
        .query_opt(
            "UPDATE orgs SET \
             name = COALESCE($2, name), \
             category = COALESCE($3, category), \
             address = COALESCE($4, address), \
             phone = COALESCE($5, phone), \
             description = COALESCE($6, description), \
             sell = COALESCE($7, sell), \
             image = COALESCE($8, image), \
             updated_at = NOW() \
             WHERE id = $1 RETURNING *",
            &[
                &id,
                &patch.name,
                &patch.category.map(|c| c.as_str()),
                &patch.address,
                &patch.phone,
                &patch.description,
                &patch.sell,
                &image_url,
            ],
        )
        .await?
        .ok_or(ApiError::NotFound("org"))?;
    let org = Org::from_row(&row)?;

    Ok(Json(json!({ "success": true, "message": "org updated", "result": org })))
}

pub fn create_org_routes(state: AppState) -> Router<AppState> {
    let admin = Router::new()
        .route("/org/all", get(get_all))
        .route("/org", post(create))
        .route("/org/{id}", patch(update))
        .layer(middleware::from_fn(AuthMiddleware::require_admin))
        .layer(middleware::from_fn_with_state(
            state,
            AuthMiddleware::validate_token,
        ));

    Router::new()
        .route("/org", get(get_visible))
        .route("/org/{id}", get(get_one))
        .merge(admin)
}

fn rows_to_orgs(rows: &[tokio_postgres::Row]) -> Result<Vec<Org>, ApiError> {
    let mut orgs = Vec::with_capacity(rows.len());
    for row in rows {
        orgs.push(Org::from_row(row)?);
    }
    Ok(orgs)
}

fn parse_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw.trim()).map_err(|_| ApiError::Validation("org id"))
}

fn parse_name(raw: &str) -> Result<String, ApiError> {
    let name = raw.trim();
    let len = name.chars().count();
    if len == 0 || len > NAME_MAX {
        return Err(ApiError::Validation("name"));
    }
    Ok(name.to_string())
}

fn parse_category(raw: &str) -> Result<Region, ApiError> {
    Region::from_str(raw.trim()).map_err(|_| ApiError::Validation("category"))
}

fn parse_address(raw: &str) -> Result<String, ApiError> {
    let address = raw.trim();
    let len = address.chars().count();
    if len == 0 || len > ADDRESS_MAX {
        return Err(ApiError::Validation("address"));
    }
    Ok(address.to_string())
}

fn parse_phone(raw: &str) -> Result<String, ApiError> {
    let phone = raw.trim();
    if phone.is_empty() {
        return Err(ApiError::Validation("phone"));
    }
    Ok(phone.to_string())
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
    fn create_input_requires_core_fields() {
        let input = OrgInput::from_fields(&fields(&[
            ("name", "Food Bank"),
            ("category", "north"),
            ("address", "12 Main St"),
            ("phone", "02-1234567"),
        ]))
        .unwrap();
        assert_eq!(input.category, Region::North);
        assert!(input.sell);

        assert!(
            OrgInput::from_fields(&fields(&[
                ("name", "Food Bank"),
                ("address", "12 Main St"),
                ("phone", "02-1234567"),
            ]))
            .is_err()
        );
    }

    #[test]
    fn category_must_be_a_known_region() {
        assert!(parse_category("central").is_ok());
        assert!(parse_category("SOUTH").is_err());
        assert!(parse_category("west").is_err());
    }

    #[test]
    fn phone_must_not_be_blank() {
        assert!(parse_phone("  ").is_err());
        assert_eq!(parse_phone(" 02-1234567 ").unwrap(), "02-1234567");
    }

    #[test]
    fn patch_accepts_partial_updates() {
        let patch = OrgPatch::from_fields(&fields(&[("category", "south")])).unwrap();
        assert_eq!(patch.category, Some(Region::South));
        assert!(patch.name.is_none());
    }
}
