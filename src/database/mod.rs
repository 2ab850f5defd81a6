//! # Database Module
//!
//! PostgreSQL integration: connection pooling, embedded migrations, and the
//! row/domain models for users, products, orgs, and orders.

pub mod connection;
pub mod migrations;
pub mod models;

pub use connection::{DatabaseConfig, DatabaseConnection};
pub use models::*;
