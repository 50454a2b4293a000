//! In-memory tenant store.
//!
//! A `HashMap`-backed [`TenantStore`] with the same uniqueness semantics as
//! the SQL repository, including the slug uniqueness constraint that guards
//! concurrent provisioning. Used by tests and by embedders that do not need
//! a persistent registry.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::tenant::{Model as TenantModel, TenantStatus};
use crate::repositories::tenant::{NewTenantRecord, TenantStore};

#[derive(Default)]
pub struct InMemoryTenantStore {
    tenants: RwLock<HashMap<Uuid, TenantModel>>,
}

impl InMemoryTenantStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TenantStore for InMemoryTenantStore {
    async fn find_by_slug(&self, slug: &str) -> Result<Option<TenantModel>, StoreError> {
        let tenants = self.tenants.read().await;
        Ok(tenants.values().find(|t| t.slug == slug).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<TenantModel>, StoreError> {
        let tenants = self.tenants.read().await;
        Ok(tenants.get(&id).cloned())
    }

    async fn insert(&self, record: NewTenantRecord) -> Result<TenantModel, StoreError> {
        let mut tenants = self.tenants.write().await;

        if tenants.values().any(|t| t.slug == record.slug) {
            return Err(StoreError::Conflict(format!(
                "tenant with slug {:?} already exists",
                record.slug
            )));
        }
        if tenants.values().any(|t| t.schema_name == record.schema_name) {
            return Err(StoreError::Conflict(format!(
                "schema name {:?} already taken",
                record.schema_name
            )));
        }

        let now = Utc::now();
        let tenant = TenantModel {
            id: Uuid::new_v4(),
            slug: record.slug,
            name: record.name,
            schema_name: record.schema_name,
            status: record.status,
            created_at: now.into(),
            updated_at: now.into(),
        };

        tenants.insert(tenant.id, tenant.clone());
        Ok(tenant)
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: TenantStatus,
    ) -> Result<TenantModel, StoreError> {
        let mut tenants = self.tenants.write().await;
        let tenant = tenants
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("tenant {id} not found")))?;

        tenant.status = status;
        tenant.updated_at = Utc::now().into();
        Ok(tenant.clone())
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        let mut tenants = self.tenants.write().await;
        tenants
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(format!("tenant {id} not found")))
    }

    async fn list_all(&self) -> Result<Vec<TenantModel>, StoreError> {
        let tenants = self.tenants.read().await;
        Ok(tenants.values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_record(slug: &str) -> NewTenantRecord {
        NewTenantRecord {
            slug: slug.to_string(),
            name: slug.to_string(),
            schema_name: crate::slug::schema_name(slug),
            status: TenantStatus::Pending,
        }
    }

    #[tokio::test]
    async fn enforces_slug_uniqueness() {
        let store = InMemoryTenantStore::new();
        store.insert(new_record("acme")).await.expect("insert");

        let err = store.insert(new_record("acme")).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn enforces_schema_name_uniqueness() {
        let store = InMemoryTenantStore::new();
        // "acme.io" and "acmeio" sanitize to the same schema name.
        store.insert(new_record("acmeio")).await.expect("insert");

        let err = store.insert(new_record("acme.io")).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn status_updates_are_visible_to_readers() {
        let store = InMemoryTenantStore::new();
        let created = store.insert(new_record("acme")).await.expect("insert");

        store
            .update_status(created.id, TenantStatus::Suspended)
            .await
            .expect("update");

        let found = store
            .find_by_id(created.id)
            .await
            .expect("find")
            .expect("present");
        assert_eq!(found.status, TenantStatus::Suspended);
    }
}
