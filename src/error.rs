//! # Error Handling
//!
//! Unified error taxonomy for the tenancy engine. Every error carries a
//! stable machine-readable code (via [`code`] accessors) so callers can
//! branch on failures without string-matching display output, plus the
//! tenant id / schema name and underlying cause where one exists.
//!
//! [`code`]: ProvisionError::code

use thiserror::Error;
use uuid::Uuid;

/// Raised when a raw slug fails validation before any side effect occurs.
#[derive(Debug, Clone, Error)]
#[error("invalid slug {slug:?}: {reason}")]
pub struct InvalidSlugError {
    pub slug: String,
    pub reason: String,
}

impl InvalidSlugError {
    pub fn new<S: Into<String>, R: Into<String>>(slug: S, reason: R) -> Self {
        Self {
            slug: slug.into(),
            reason: reason.into(),
        }
    }

    pub fn code(&self) -> &'static str {
        "INVALID_SLUG"
    }
}

/// Repository-layer errors for tenant record operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[source] sea_orm::DbErr),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("validation error: {0}")]
    Validation(String),
    #[error("conflict: {0}")]
    Conflict(String),
}

impl StoreError {
    pub fn database_error(err: sea_orm::DbErr) -> Self {
        Self::Database(err)
    }

    pub fn validation_error<S: Into<String>>(message: S) -> Self {
        Self::Validation(message.into())
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Database(_) => "STORE_DATABASE_ERROR",
            Self::NotFound(_) => "STORE_NOT_FOUND",
            Self::Validation(_) => "STORE_VALIDATION_FAILED",
            Self::Conflict(_) => "STORE_CONFLICT",
        }
    }
}

/// Raised when an operation requires a tenant in a state it is not in.
#[derive(Debug, Error)]
pub enum TenantError {
    #[error("tenant {tenant_id} not found")]
    NotFound { tenant_id: Uuid },
    #[error("tenant {tenant_id} is suspended")]
    Suspended { tenant_id: Uuid },
    #[error("tenant {tenant_id} is still pending provisioning")]
    Pending { tenant_id: Uuid },
    #[error("tenant {tenant_id} is migrating")]
    Migrating { tenant_id: Uuid },
    #[error("tenant id is missing")]
    IdMissing,
}

impl TenantError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "TENANT_NOT_FOUND",
            Self::Suspended { .. } => "TENANT_SUSPENDED",
            Self::Pending { .. } => "TENANT_PENDING",
            Self::Migrating { .. } => "TENANT_MIGRATING",
            Self::IdMissing => "TENANT_ID_MISSING",
        }
    }
}

/// Namespace-level DDL failures surfaced by the schema manager.
///
/// Deleting an absent schema is deliberately *not* an error (the manager's
/// delete is idempotent); these variants cover real DDL failures only.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("failed to create schema {schema_name}: {source}")]
    CreateFailed {
        schema_name: String,
        #[source]
        source: sea_orm::DbErr,
    },
    #[error("failed to delete schema {schema_name}: {source}")]
    DeleteFailed {
        schema_name: String,
        #[source]
        source: sea_orm::DbErr,
    },
    #[error("failed to migrate schema {schema_name}: {source}")]
    MigrateFailed {
        schema_name: String,
        #[source]
        source: sea_orm::DbErr,
    },
    #[error("schema {schema_name} not found")]
    NotFound { schema_name: String },
    #[error("schema {schema_name} already exists")]
    AlreadyExists { schema_name: String },
    #[error("failed to list schemas: {source}")]
    ListFailed {
        #[source]
        source: sea_orm::DbErr,
    },
}

impl SchemaError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::CreateFailed { .. } => "SCHEMA_CREATE_FAILED",
            Self::DeleteFailed { .. } => "SCHEMA_DELETE_FAILED",
            Self::MigrateFailed { .. } => "SCHEMA_MIGRATE_FAILED",
            Self::NotFound { .. } => "SCHEMA_NOT_FOUND",
            Self::AlreadyExists { .. } => "SCHEMA_ALREADY_EXISTS",
            Self::ListFailed { .. } => "SCHEMA_LIST_FAILED",
        }
    }

    /// The schema the failure applies to, when one is known.
    pub fn schema_name(&self) -> Option<&str> {
        match self {
            Self::CreateFailed { schema_name, .. }
            | Self::DeleteFailed { schema_name, .. }
            | Self::MigrateFailed { schema_name, .. }
            | Self::NotFound { schema_name }
            | Self::AlreadyExists { schema_name } => Some(schema_name),
            Self::ListFailed { .. } => None,
        }
    }
}

/// A single failed disconnect recorded while draining the pool.
#[derive(Debug, Clone)]
pub struct DisconnectFailure {
    pub schema_name: String,
    pub message: String,
}

/// Client pool failures.
#[derive(Debug, Error)]
pub enum PoolError {
    /// Only raised in the optional hard-limit mode; the default pool evicts
    /// instead of rejecting.
    #[error("client pool exhausted ({max_clients} clients in use)")]
    Exhausted { max_clients: usize },
    #[error("failed to create client for schema {schema_name}: {source}")]
    ClientCreateFailed {
        schema_name: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("{} client(s) failed to disconnect", failures.len())]
    DisconnectFailed { failures: Vec<DisconnectFailure> },
}

impl PoolError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Exhausted { .. } => "POOL_EXHAUSTED",
            Self::ClientCreateFailed { .. } => "POOL_CLIENT_CREATE_FAILED",
            Self::DisconnectFailed { .. } => "POOL_CLIENT_DISCONNECT_FAILED",
        }
    }
}

/// Provisioning failures. One coherent error per attempt: mid-pipeline DDL
/// failures are re-raised through these variants after the compensating
/// record delete has been attempted.
#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error(transparent)]
    InvalidSlug(#[from] InvalidSlugError),
    #[error("tenant name must not be empty")]
    EmptyName,
    #[error("a tenant with slug {slug:?} already exists")]
    SlugTaken { slug: String },
    #[error("failed to persist tenant record: {source}")]
    Store {
        #[source]
        source: StoreError,
    },
    #[error("schema creation failed for {schema_name}: {source}")]
    SchemaCreate {
        schema_name: String,
        #[source]
        source: SchemaError,
    },
    #[error("schema migration failed for {schema_name}: {source}")]
    SchemaMigrate {
        schema_name: String,
        #[source]
        source: SchemaError,
    },
}

impl ProvisionError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidSlug(err) => err.code(),
            Self::EmptyName | Self::SlugTaken { .. } | Self::Store { .. } => "PROVISION_FAILED",
            Self::SchemaCreate { .. } => "SCHEMA_CREATE_FAILED",
            Self::SchemaMigrate { .. } => "SCHEMA_MIGRATE_FAILED",
        }
    }
}

/// Deprovisioning failures.
///
/// Schema deletion failures never appear here; an orphaned schema is a
/// recoverable operational cost, so those are logged and swallowed by the
/// provisioner. A tenant record that cannot be removed is not.
#[derive(Debug, Error)]
pub enum DeprovisionError {
    #[error(transparent)]
    Tenant(#[from] TenantError),
    #[error("failed to remove tenant record {tenant_id}: {source}")]
    Store {
        tenant_id: Uuid,
        #[source]
        source: StoreError,
    },
}

impl DeprovisionError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Tenant(err) => err.code(),
            Self::Store { .. } => "DEPROVISION_FAILED",
        }
    }
}
