//! # Tenant Provisioner
//!
//! Orchestrates the tenant lifecycle across the registry store and the
//! schema manager: provision a new tenant end to end, tear one down, and
//! roll outstanding migrations across the whole fleet.
//!
//! The provisioner is deliberately storage-agnostic: it holds trait objects
//! for both collaborators, so a SQL-backed registry and a real Postgres
//! schema manager can be swapped for in-memory fakes without touching the
//! orchestration logic.
//!
//! Consistency model: provisioning steps are strictly sequential within one
//! call, and a DDL failure triggers a best-effort compensating delete of the
//! pending record so no half-provisioned tenant is left `active`. There is
//! no cross-call mutual exclusion for the same slug; the registry's unique
//! constraint is the authoritative arbiter when two callers race.

use std::sync::Arc;

use metrics::counter;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::error::{DeprovisionError, ProvisionError, StoreError, TenantError};
use crate::models::tenant::{Model as TenantModel, TenantStatus};
use crate::repositories::{NewTenantRecord, TenantStore};
use crate::schema::{SchemaMigrated, SchemaOps};
use crate::slug;

/// Input to [`TenantProvisioner::provision`].
#[derive(Debug, Clone)]
pub struct NewTenant {
    pub slug: String,
    pub name: String,
}

/// Result of a successful provision: the active tenant record plus what the
/// DDL steps actually did.
#[derive(Debug, Clone)]
pub struct ProvisionReceipt {
    pub tenant: TenantModel,
    /// `false` when the schema already existed before this call.
    pub schema_created: bool,
    pub migrations_applied: u32,
}

/// Lifecycle orchestrator over a tenant store and a schema manager.
pub struct TenantProvisioner {
    store: Arc<dyn TenantStore>,
    schemas: Arc<dyn SchemaOps>,
    prefix: String,
}

impl TenantProvisioner {
    pub fn new(store: Arc<dyn TenantStore>, schemas: Arc<dyn SchemaOps>) -> Self {
        Self::with_prefix(store, schemas, slug::DEFAULT_SCHEMA_PREFIX)
    }

    /// The prefix must match the one the schema manager derives names with.
    pub fn with_prefix<S: Into<String>>(
        store: Arc<dyn TenantStore>,
        schemas: Arc<dyn SchemaOps>,
        prefix: S,
    ) -> Self {
        Self {
            store,
            schemas,
            prefix: prefix.into(),
        }
    }

    /// Provisions a tenant end to end: validate, register as `pending`,
    /// create and migrate the schema, then mark `active`.
    ///
    /// Fails atomically from the caller's perspective: if any step after the
    /// record insert fails, the pending record (and any schema already
    /// created) is removed best-effort before the original error is
    /// returned.
    #[instrument(skip(self, request), fields(slug = %request.slug))]
    pub async fn provision(&self, request: NewTenant) -> Result<ProvisionReceipt, ProvisionError> {
        counter!("tenancy_provision_total").increment(1);

        let receipt = self.provision_inner(request).await;
        if receipt.is_err() {
            counter!("tenancy_provision_failures_total").increment(1);
        }
        receipt
    }

    async fn provision_inner(
        &self,
        request: NewTenant,
    ) -> Result<ProvisionReceipt, ProvisionError> {
        slug::validate_slug(&request.slug)?;

        let name = request.name.trim();
        if name.is_empty() {
            return Err(ProvisionError::EmptyName);
        }

        // Best-effort early rejection; the registry's unique constraint is
        // what actually decides a race.
        let existing = self
            .store
            .find_by_slug(&request.slug)
            .await
            .map_err(|source| ProvisionError::Store { source })?;
        if existing.is_some() {
            return Err(ProvisionError::SlugTaken {
                slug: request.slug,
            });
        }

        let schema_name = slug::schema_name_with_prefix(&request.slug, &self.prefix);

        let tenant = self
            .store
            .insert(NewTenantRecord {
                slug: request.slug.clone(),
                name: name.to_string(),
                schema_name: schema_name.clone(),
                status: TenantStatus::Pending,
            })
            .await
            .map_err(|source| match source {
                StoreError::Conflict(_) => ProvisionError::SlugTaken {
                    slug: request.slug.clone(),
                },
                source => ProvisionError::Store { source },
            })?;

        info!(tenant_id = %tenant.id, schema_name = %schema_name, "Registered pending tenant");

        let created = match self.schemas.create_schema(&request.slug).await {
            Ok(created) => created,
            Err(source) => {
                self.rollback(&tenant, false).await;
                return Err(ProvisionError::SchemaCreate {
                    schema_name,
                    source,
                });
            }
        };

        let migrated = match self.schemas.migrate_schema(&created.schema_name).await {
            Ok(migrated) => migrated,
            Err(source) => {
                self.rollback(&tenant, created.created).await;
                return Err(ProvisionError::SchemaMigrate {
                    schema_name: created.schema_name,
                    source,
                });
            }
        };

        let tenant = match self
            .store
            .update_status(tenant.id, TenantStatus::Active)
            .await
        {
            Ok(tenant) => tenant,
            Err(source) => {
                self.rollback(&tenant, created.created).await;
                return Err(ProvisionError::Store { source });
            }
        };

        info!(
            tenant_id = %tenant.id,
            schema_name = %tenant.schema_name,
            schema_created = created.created,
            migrations_applied = migrated.migrations_applied,
            "Provisioned tenant"
        );

        Ok(ProvisionReceipt {
            tenant,
            schema_created: created.created,
            migrations_applied: migrated.migrations_applied,
        })
    }

    /// Best-effort compensation after a failed provision. Secondary failures
    /// are logged and never surfaced; the caller reports the original cause.
    ///
    /// Stricter than deprovision, which tolerates an orphaned schema: a
    /// schema this attempt created is dropped too, otherwise a retried
    /// provision would find the half-migrated namespace already present and
    /// report `schema_created: false` for a schema no one finished setting
    /// up.
    async fn rollback(&self, tenant: &TenantModel, drop_schema: bool) {
        if drop_schema {
            if let Err(err) = self.schemas.delete_schema(&tenant.schema_name).await {
                warn!(
                    tenant_id = %tenant.id,
                    schema_name = %tenant.schema_name,
                    error = %err,
                    "Rollback failed to drop schema; manual cleanup may be needed"
                );
            }
        }

        if let Err(err) = self.store.delete(tenant.id).await {
            warn!(
                tenant_id = %tenant.id,
                error = %err,
                "Rollback failed to remove pending tenant record"
            );
        }
    }

    /// Tears a tenant down: mark `suspended`, drop the schema, remove the
    /// record.
    ///
    /// The suspend happens before the drop so readers never observe an
    /// `active` tenant whose schema is gone. A failed schema drop is logged
    /// and swallowed; an orphaned schema is recoverable by hand, while a
    /// stale registry record would keep the slug occupied forever.
    #[instrument(skip(self))]
    pub async fn deprovision(&self, tenant_id: Uuid) -> Result<(), DeprovisionError> {
        let tenant = self
            .store
            .find_by_id(tenant_id)
            .await
            .map_err(|source| DeprovisionError::Store { tenant_id, source })?
            .ok_or(TenantError::NotFound { tenant_id })?;

        self.store
            .update_status(tenant.id, TenantStatus::Suspended)
            .await
            .map_err(|source| DeprovisionError::Store { tenant_id, source })?;

        if let Err(err) = self.schemas.delete_schema(&tenant.schema_name).await {
            warn!(
                tenant_id = %tenant.id,
                schema_name = %tenant.schema_name,
                error = %err,
                "Schema drop failed during deprovision; continuing with record removal"
            );
        }

        self.store
            .delete(tenant.id)
            .await
            .map_err(|source| DeprovisionError::Store { tenant_id, source })?;

        info!(tenant_id = %tenant.id, slug = %tenant.slug, "Deprovisioned tenant");
        Ok(())
    }

    /// Applies outstanding migration units to every `active` tenant.
    ///
    /// Non-active tenants are skipped, and a failure for one tenant is
    /// logged and excluded without aborting the batch; the returned list
    /// holds the successes only.
    #[instrument(skip(self))]
    pub async fn migrate_all(&self) -> Result<Vec<SchemaMigrated>, StoreError> {
        let tenants = self.store.list_all().await?;

        let mut migrated = Vec::new();
        for tenant in tenants {
            if tenant.status != TenantStatus::Active {
                continue;
            }

            match self.schemas.migrate_schema(&tenant.schema_name).await {
                Ok(outcome) => migrated.push(outcome),
                Err(err) => {
                    warn!(
                        tenant_id = %tenant.id,
                        schema_name = %tenant.schema_name,
                        error = %err,
                        "Migration failed for tenant; continuing with the rest"
                    );
                }
            }
        }

        info!(migrated = migrated.len(), "Fleet migration pass complete");
        Ok(migrated)
    }
}
