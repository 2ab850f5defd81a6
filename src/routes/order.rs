//! Order routes: checkout plus own/admin order listings.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Extension, Json, Router, middleware};
use serde_json::{Value, json};
use std::collections::HashMap;
use uuid::Uuid;

use crate::auth::middleware::AuthMiddleware;
use crate::auth::models::CurrentUser;
use crate::database::models::{Cart, FromRow, Order, Product};
use crate::error::ApiError;
use crate::server::AppState;

/// Materialize the cart into an immutable order and clear the cart, in one
/// transaction: readers never observe the order without the cleared cart or
/// vice versa.
pub async fn create(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> Result<impl IntoResponse, ApiError> {
    let mut client = state.db.pool().get().await?;
    let tx = client.transaction().await?;

    let row = tx
        .query_one(
            "SELECT cart FROM users WHERE id = $1 FOR UPDATE",
            &[&current.user.id],
        )
        .await?;
    let cart: Cart = serde_json::from_value(row.try_get("cart")?)?;
    if cart.is_empty() {
        return Err(ApiError::EmptyCart);
    }

    // Sellability is re-verified here, not trusted from cart state: a product
    // can be delisted between entering the cart and checkout.
    let ids: Vec<Uuid> = cart.lines().iter().map(|line| line.product).collect();
    let rows = tx
        .query("SELECT id, sell FROM products WHERE id = ANY($1)", &[&ids])
        .await?;
    let mut sellable: HashMap<Uuid, bool> = HashMap::new();
    for row in &rows {
        sellable.insert(row.try_get("id")?, row.try_get("sell")?);
    }
    let has_delisted = cart
        .lines()
        .iter()
        .any(|line| !sellable.get(&line.product).copied().unwrap_or(false));
    if has_delisted {
        // Early return drops the transaction; the cart stays untouched.
        return Err(ApiError::DelistedInCart);
    }

    let order_id = Uuid::new_v4();
    tx.execute(
        "INSERT INTO orders (id, user_id, cart) VALUES ($1, $2, $3)",
        &[&order_id, &current.user.id, &serde_json::to_value(&cart)?],
    )
    .await?;
    tx.execute(
        "UPDATE users SET cart = '[]'::jsonb, updated_at = NOW() WHERE id = $1",
        &[&current.user.id],
    )
    .await?;
    tx.commit().await?;

    tracing::info!("order {order_id} created for {}", current.user.account);
    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "message": "order created", "result": order_id })),
    ))
}

/// The requesting user's orders, newest first, lines populated with product
/// details.
pub async fn get_my(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> Result<Json<Value>, ApiError> {
    let client = state.db.pool().get().await?;
    let rows = client
        .query(
            "SELECT * FROM orders WHERE user_id = $1 ORDER BY created_at DESC",
            &[&current.user.id],
        )
        .await?;

    let mut orders = Vec::with_capacity(rows.len());
    for row in &rows {
        orders.push(Order::from_row(row)?);
    }
    let products = load_products(&client, &orders).await?;

    let result: Vec<Value> = orders
        .iter()
        .map(|order| order_json(order, None, &products))
        .collect();
    Ok(Json(json!({ "success": true, "message": "", "result": result })))
}

/// Every order in the system with the owning account name. Admin only.
pub async fn get_all(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let client = state.db.pool().get().await?;
    let rows = client
        .query(
            "SELECT o.*, u.account FROM orders o \
             JOIN users u ON u.id = o.user_id \
             ORDER BY o.created_at DESC",
            &[],
        )
        .await?;

    let mut orders = Vec::with_capacity(rows.len());
    let mut accounts = Vec::with_capacity(rows.len());
    for row in &rows {
        orders.push(Order::from_row(row)?);
        accounts.push(row.try_get::<_, String>("account")?);
    }
    let products = load_products(&client, &orders).await?;

    let result: Vec<Value> = orders
        .iter()
        .zip(&accounts)
        .map(|(order, account)| order_json(order, Some(account), &products))
        .collect();
    Ok(Json(json!({ "success": true, "message": "", "result": result })))
}

async fn load_products(
    client: &deadpool_postgres::Client,
    orders: &[Order],
) -> Result<HashMap<Uuid, Product>, ApiError> {
    let ids: Vec<Uuid> = orders
        .iter()
        .flat_map(|order| order.cart.lines().iter().map(|line| line.product))
        .collect();
    let mut products = HashMap::new();
    if ids.is_empty() {
        return Ok(products);
    }
    let rows = client
        .query("SELECT * FROM products WHERE id = ANY($1)", &[&ids])
        .await?;
    for row in &rows {
        let product = Product::from_row(row)?;
        products.insert(product.id, product);
    }
    Ok(products)
}

fn order_json(order: &Order, account: Option<&str>, products: &HashMap<Uuid, Product>) -> Value {
    let cart: Vec<Value> = order
        .cart
        .lines()
        .iter()
        .map(|line| {
            json!({
                "product": products.get(&line.product),
                "quantity": line.quantity,
            })
        })
        .collect();

    let mut value = json!({
        "id": order.id,
        "cart": cart,
        "createdAt": order.created_at,
    });
    if let Some(account) = account {
        value["user"] = json!({ "account": account });
    }
    value
}

pub fn create_order_routes(state: AppState) -> Router<AppState> {
    let admin = Router::new()
        .route("/order/all", get(get_all))
        .layer(middleware::from_fn(AuthMiddleware::require_admin));

    Router::new()
        .route("/order", post(create))
        .route("/order/my", get(get_my))
        .merge(admin)
        .layer(middleware::from_fn_with_state(
            state,
            AuthMiddleware::validate_token,
        ))
}
