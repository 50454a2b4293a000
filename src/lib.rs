//! # Tenancy Engine Library
//!
//! Core functionality for multi-tenant schema provisioning: slug
//! sanitization, per-tenant schema DDL, a bounded per-schema client pool,
//! and the provisioning orchestrator, plus the control-plane registry and
//! service configuration.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod pool;
pub mod provisioner;
pub mod repositories;
pub mod schema;
pub mod slug;
pub mod telemetry;
pub use migration;
