//! HTTP route handlers.

pub mod attendance;
pub mod audit_logs;
pub mod auth;
pub mod bookings;
pub mod churn;
pub mod class_packs;
pub mod classes;
pub mod compliance;
pub mod contracts;
pub mod dunning;
pub mod equipment;
pub mod forecasting;
pub mod health;
pub mod invoices;
pub mod kiosk;
pub mod locations;
pub mod members;
pub mod platform;
pub mod plans;
pub mod sessions;
pub mod subscriptions;
pub mod tenant_contracts;
pub mod tenants;
pub mod users;
pub mod wearables;
pub mod zatca;
