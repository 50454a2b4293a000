//! Tenant entity model
//!
//! SeaORM entity for the tenants registry table. Each row maps one slug to
//! its derived schema name and tracks the provisioning lifecycle status.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use serde::{Deserialize, Serialize};

use crate::error::TenantError;

/// Provisioning lifecycle status.
///
/// A tenant is addressable for data operations only when `Active`.
/// `Migrating` is advisory: batch migration callers may set it, but the
/// provisioner's own state machine never does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "lowercase")]
pub enum TenantStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "active")]
    Active,
    #[sea_orm(string_value = "suspended")]
    Suspended,
    #[sea_orm(string_value = "migrating")]
    Migrating,
}

impl TenantStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Suspended => "suspended",
            Self::Migrating => "migrating",
        }
    }
}

/// Tenant registry entry.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "tenants")]
pub struct Model {
    /// Unique identifier for the tenant (primary key)
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// User-facing identifier, stored verbatim, immutable after creation
    #[sea_orm(unique)]
    pub slug: String,

    /// Human-readable display name
    pub name: String,

    /// Derived schema namespace, globally unique, immutable
    #[sea_orm(unique)]
    pub schema_name: String,

    /// Provisioning lifecycle status
    pub status: TenantStatus,

    /// Timestamp when the tenant was created
    pub created_at: DateTimeWithTimeZone,

    /// Timestamp of the last status transition
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Fails unless the tenant is addressable for data operations.
    pub fn require_active(&self) -> Result<(), TenantError> {
        match self.status {
            TenantStatus::Active => Ok(()),
            TenantStatus::Pending => Err(TenantError::Pending { tenant_id: self.id }),
            TenantStatus::Suspended => Err(TenantError::Suspended { tenant_id: self.id }),
            TenantStatus::Migrating => Err(TenantError::Migrating { tenant_id: self.id }),
        }
    }
}
