// Database Models
//
// Row structs for every entity plus the pure domain pieces that guard the
// user-document invariants: the bounded token list and the cart merge logic.
// Lists are only ever mutated through `TokenList` / `Cart` so the cap and the
// quantity floor cannot be bypassed by raw array edits.

use anyhow::{Result, anyhow};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tokio_postgres::Row;
use uuid::Uuid;

/// Maximum concurrently valid sessions per user.
pub const TOKEN_CAP: usize = 3;

/// Trait for converting from a tokio-postgres Row
pub trait FromRow {
    fn from_row(row: &Row) -> Result<Self>
    where
        Self: Sized;
}

// ============================================================================
// USER & AUTH
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
        }
    }
}

impl FromStr for Role {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "user" => Ok(Self::User),
            "admin" => Ok(Self::Admin),
            other => Err(anyhow!("unknown role: {other}")),
        }
    }
}

/// Active session tokens for one user, oldest first.
///
/// Bounded at [`TOKEN_CAP`]: pushing a fourth token evicts exactly the oldest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenList(Vec<String>);

impl TokenList {
    /// Append a freshly issued token, evicting from the front until the cap
    /// holds.
    pub fn push(&mut self, token: String) {
        self.0.push(token);
        while self.0.len() > TOKEN_CAP {
            self.0.remove(0);
        }
    }

    /// Swap `old` for `new` in place, preserving its position in the list.
    /// Returns false when `old` is no longer present (already evicted).
    pub fn replace(&mut self, old: &str, new: String) -> bool {
        match self.0.iter().position(|t| t == old) {
            Some(i) => {
                self.0[i] = new;
                true
            }
            None => false,
        }
    }

    /// Remove `token` if present. Idempotent.
    pub fn remove(&mut self, token: &str) {
        self.0.retain(|t| t != token);
    }

    pub fn contains(&self, token: &str) -> bool {
        self.0.iter().any(|t| t == token)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

impl From<Vec<String>> for TokenList {
    fn from(tokens: Vec<String>) -> Self {
        Self(tokens)
    }
}

// ============================================================================
// CART
// ============================================================================

/// One (product, quantity) pair inside a user's cart. Quantity is always ≥ 1;
/// a line dropping below 1 is removed, never stored at 0.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub product: Uuid,
    pub quantity: i32,
}

/// A user's embedded cart. Persisted as the JSONB `cart` column on the users
/// row, so every mutation is a single-row write.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cart(Vec<CartLine>);

impl Cart {
    pub fn lines(&self) -> &[CartLine] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Sum of line quantities. Derived on read, never persisted.
    pub fn total(&self) -> i64 {
        self.0.iter().map(|line| i64::from(line.quantity)).sum()
    }

    /// Merge a relative quantity change for `product` and return the new cart
    /// total.
    ///
    /// Existing line: quantity += delta (saturating, so extreme deltas pin at
    /// the i32 bounds instead of wrapping), line deleted when the result drops
    /// below 1. Missing line: appended for a positive delta, otherwise a
    /// no-op (removing what is not there is not an error).
    pub fn apply_delta(&mut self, product: Uuid, delta: i32) -> i64 {
        match self.0.iter().position(|line| line.product == product) {
            Some(i) => {
                let quantity = self.0[i].quantity.saturating_add(delta);
                if quantity < 1 {
                    self.0.remove(i);
                } else {
                    self.0[i].quantity = quantity;
                }
            }
            None if delta > 0 => self.0.push(CartLine {
                product,
                quantity: delta,
            }),
            None => {}
        }
        self.total()
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }
}

// ============================================================================
// ROW STRUCTS
// ============================================================================

/// A user row. Tokens and cart live inline so the row is the unit of mutation.
#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub account: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub tokens: TokenList,
    pub cart: Cart,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FromRow for User {
    fn from_row(row: &Row) -> Result<Self> {
        let role: String = row.try_get("role")?;
        let cart: serde_json::Value = row.try_get("cart")?;
        Ok(Self {
            id: row.try_get("id")?,
            account: row.try_get("account")?,
            email: row.try_get("email")?,
            password_hash: row.try_get("password_hash")?,
            role: role.parse()?,
            tokens: TokenList::from(row.try_get::<_, Vec<String>>("tokens")?),
            cart: serde_json::from_value(cart)?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub price: i32,
    pub stock: i32,
    pub description: Option<String>,
    pub sell: bool,
    pub image: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FromRow for Product {
    fn from_row(row: &Row) -> Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            price: row.try_get("price")?,
            stock: row.try_get("stock")?,
            description: row.try_get("description")?,
            sell: row.try_get("sell")?,
            image: row.try_get("image")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

/// Region an organization operates in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Region {
    North,
    Central,
    South,
}

impl Region {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::North => "north",
            Self::Central => "central",
            Self::South => "south",
        }
    }
}

impl FromStr for Region {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "north" => Ok(Self::North),
            "central" => Ok(Self::Central),
            "south" => Ok(Self::South),
            other => Err(anyhow!("unknown region: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Org {
    pub id: Uuid,
    pub name: String,
    pub category: Region,
    pub address: String,
    pub phone: String,
    pub description: Option<String>,
    pub sell: bool,
    pub image: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FromRow for Org {
    fn from_row(row: &Row) -> Result<Self> {
        let category: String = row.try_get("category")?;
        Ok(Self {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            category: category.parse()?,
            address: row.try_get("address")?,
            phone: row.try_get("phone")?,
            description: row.try_get("description")?,
            sell: row.try_get("sell")?,
            image: row.try_get("image")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

/// Immutable checkout snapshot. `cart` is a deep copy of the user's lines at
/// creation time; it never tracks later cart changes.
#[derive(Debug, Clone)]
pub struct Order {
    pub id: Uuid,
    pub user_id: Uuid,
    pub cart: Cart,
    pub created_at: DateTime<Utc>,
}

impl FromRow for Order {
    fn from_row(row: &Row) -> Result<Self> {
        let cart: serde_json::Value = row.try_get("cart")?;
        Ok(Self {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            cart: serde_json::from_value(cart)?,
            created_at: row.try_get("created_at")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token_list(tokens: &[&str]) -> TokenList {
        TokenList::from(tokens.iter().map(|t| t.to_string()).collect::<Vec<_>>())
    }

    #[test]
    fn token_push_caps_at_three_evicting_oldest() {
        let mut tokens = TokenList::default();
        for t in ["a", "b", "c", "d"] {
            tokens.push(t.to_string());
        }
        assert_eq!(tokens.len(), TOKEN_CAP);
        assert!(!tokens.contains("a"));
        assert_eq!(tokens.as_slice(), ["b", "c", "d"]);
    }

    #[test]
    fn token_replace_preserves_position() {
        let mut tokens = token_list(&["a", "b", "c"]);
        assert!(tokens.replace("b", "x".to_string()));
        assert_eq!(tokens.as_slice(), ["a", "x", "c"]);
    }

    #[test]
    fn token_replace_fails_when_already_evicted() {
        let mut tokens = token_list(&["b", "c"]);
        assert!(!tokens.replace("a", "x".to_string()));
        assert_eq!(tokens.as_slice(), ["b", "c"]);
    }

    #[test]
    fn token_remove_is_idempotent() {
        let mut tokens = token_list(&["a", "b"]);
        tokens.remove("a");
        tokens.remove("a");
        assert_eq!(tokens.as_slice(), ["b"]);
    }

    #[test]
    fn delta_merges_and_floors_at_removal() {
        // +2 then -5 for the same product leaves no line, never a negative one.
        let product = Uuid::new_v4();
        let mut cart = Cart::default();
        assert_eq!(cart.apply_delta(product, 2), 2);
        assert_eq!(cart.apply_delta(product, -5), 0);
        assert!(cart.is_empty());
    }

    #[test]
    fn delta_decrements_then_removes() {
        let product = Uuid::new_v4();
        let mut cart = Cart::default();
        cart.apply_delta(product, 2);
        assert_eq!(cart.apply_delta(product, -1), 1);
        assert_eq!(cart.lines()[0].quantity, 1);
        assert_eq!(cart.apply_delta(product, -1), 0);
        assert!(cart.is_empty());
    }

    #[test]
    fn delta_saturates_at_the_quantity_bounds() {
        let product = Uuid::new_v4();
        let mut cart = Cart::default();
        cart.apply_delta(product, i32::MAX);
        // A further increment pins at the bound rather than wrapping negative
        // and deleting the line.
        assert_eq!(cart.apply_delta(product, 1), i64::from(i32::MAX));
        assert_eq!(cart.lines()[0].quantity, i32::MAX);
    }

    #[test]
    fn negative_delta_for_missing_line_is_a_noop() {
        let mut cart = Cart::default();
        assert_eq!(cart.apply_delta(Uuid::new_v4(), -3), 0);
        assert!(cart.is_empty());
    }

    #[test]
    fn delta_keeps_one_line_per_product() {
        let p1 = Uuid::new_v4();
        let p2 = Uuid::new_v4();
        let mut cart = Cart::default();
        cart.apply_delta(p1, 1);
        cart.apply_delta(p2, 2);
        cart.apply_delta(p1, 3);
        assert_eq!(cart.lines().len(), 2);
        assert_eq!(cart.total(), 6);
    }

    #[test]
    fn cart_round_trips_through_json() {
        let mut cart = Cart::default();
        cart.apply_delta(Uuid::new_v4(), 2);
        let value = serde_json::to_value(&cart).unwrap();
        assert!(value.is_array());
        let back: Cart = serde_json::from_value(value).unwrap();
        assert_eq!(back, cart);
    }

    #[test]
    fn role_parses_from_column_text() {
        assert_eq!("user".parse::<Role>().unwrap(), Role::User);
        assert_eq!("admin".parse::<Role>().unwrap(), Role::Admin);
        assert!("root".parse::<Role>().is_err());
    }
}
