//! # Authentication Module
//!
//! Token issuance, validation, and the middleware guarding protected routes.

pub mod jwt;
pub mod middleware;
pub mod models;
