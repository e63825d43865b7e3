//! Shared utilities and common types for the Clubhouse backend.
//!
//! This crate provides functionality used by every other crate:
//! - JWT access/refresh tokens carrying tenant and role claims
//! - Password hashing with Argon2id
//! - Page/size pagination
//! - Hashing and token helpers
//! - Reusable field validators

pub mod crypto;
pub mod jwt;
pub mod pagination;
pub mod password;
pub mod validation;
