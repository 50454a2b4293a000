//! # Repository Layer
//!
//! Store implementations for the tenant registry. The provisioner depends
//! only on the [`TenantStore`] trait, so a SQL table and an in-memory map
//! are interchangeable backings.

pub mod memory;
pub mod tenant;

pub use memory::InMemoryTenantStore;
pub use tenant::{NewTenantRecord, TenantRepository, TenantStore};
