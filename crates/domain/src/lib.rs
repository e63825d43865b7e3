//! Domain layer for the Clubhouse backend.
//!
//! This crate contains:
//! - Domain models with their status enums and state transitions
//! - Request/response DTOs with validation rules
//! - Business rules that do not need the database (dunning schedule, risk buckets, fees)
//! - Audit log builder

pub mod error;
pub mod models;
pub mod services;

pub use error::DomainError;
