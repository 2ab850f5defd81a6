//! # Services Module
//!
//! External collaborators consumed via narrow contracts.

pub mod upload;
