//! Shared fakes for the integration suites: a recording schema manager and
//! a recording wrapper around the in-memory tenant store, both writing into
//! one ordered event log so tests can assert cross-collaborator ordering.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tenancy::error::{SchemaError, StoreError};
use tenancy::models::tenant::{Model as TenantModel, TenantStatus};
use tenancy::repositories::{InMemoryTenantStore, NewTenantRecord, TenantStore};
use tenancy::schema::{SchemaCreated, SchemaMigrated, SchemaOps};
use tenancy::slug;
use uuid::Uuid;

pub type EventLog = Arc<Mutex<Vec<String>>>;

pub fn new_log() -> EventLog {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn events(log: &EventLog) -> Vec<String> {
    log.lock().unwrap().clone()
}

fn ddl_error(message: &str) -> sea_orm::DbErr {
    sea_orm::DbErr::Custom(message.to_string())
}

/// In-memory [`SchemaOps`] that tracks which schemas exist, logs every call,
/// and can be told to fail individual operations.
pub struct RecordingSchemas {
    log: EventLog,
    existing: Mutex<HashSet<String>>,
    pub fail_create: bool,
    pub fail_migrate: bool,
    pub fail_delete: bool,
}

impl RecordingSchemas {
    pub fn new(log: EventLog) -> Self {
        Self {
            log,
            existing: Mutex::new(HashSet::new()),
            fail_create: false,
            fail_migrate: false,
            fail_delete: false,
        }
    }

    pub fn schema_present(&self, schema_name: &str) -> bool {
        self.existing.lock().unwrap().contains(schema_name)
    }
}

#[async_trait]
impl SchemaOps for RecordingSchemas {
    async fn create_schema(&self, slug: &str) -> Result<SchemaCreated, SchemaError> {
        let schema_name = slug::schema_name(slug);
        if self.fail_create {
            return Err(SchemaError::CreateFailed {
                schema_name,
                source: ddl_error("simulated create failure"),
            });
        }

        let created = self.existing.lock().unwrap().insert(schema_name.clone());
        self.log
            .lock()
            .unwrap()
            .push(format!("schema.create {schema_name}"));
        Ok(SchemaCreated {
            schema_name,
            created,
        })
    }

    async fn migrate_schema(&self, schema_name: &str) -> Result<SchemaMigrated, SchemaError> {
        if self.fail_migrate {
            return Err(SchemaError::MigrateFailed {
                schema_name: schema_name.to_string(),
                source: ddl_error("simulated migrate failure"),
            });
        }

        self.log
            .lock()
            .unwrap()
            .push(format!("schema.migrate {schema_name}"));
        Ok(SchemaMigrated {
            schema_name: schema_name.to_string(),
            migrations_applied: 3,
        })
    }

    async fn delete_schema(&self, schema_name: &str) -> Result<(), SchemaError> {
        if self.fail_delete {
            return Err(SchemaError::DeleteFailed {
                schema_name: schema_name.to_string(),
                source: ddl_error("simulated delete failure"),
            });
        }

        self.existing.lock().unwrap().remove(schema_name);
        self.log
            .lock()
            .unwrap()
            .push(format!("schema.delete {schema_name}"));
        Ok(())
    }

    async fn schema_exists(&self, schema_name: &str) -> Result<bool, SchemaError> {
        Ok(self.schema_present(schema_name))
    }

    async fn list_schemas(&self) -> Result<Vec<String>, SchemaError> {
        let mut names: Vec<String> = self.existing.lock().unwrap().iter().cloned().collect();
        names.sort();
        Ok(names)
    }
}

/// [`TenantStore`] wrapper that logs status transitions and deletes into the
/// shared event log.
pub struct RecordingStore {
    inner: InMemoryTenantStore,
    log: EventLog,
}

impl RecordingStore {
    pub fn new(log: EventLog) -> Self {
        Self {
            inner: InMemoryTenantStore::new(),
            log,
        }
    }
}

#[async_trait]
impl TenantStore for RecordingStore {
    async fn find_by_slug(&self, slug: &str) -> Result<Option<TenantModel>, StoreError> {
        self.inner.find_by_slug(slug).await
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<TenantModel>, StoreError> {
        self.inner.find_by_id(id).await
    }

    async fn insert(&self, record: NewTenantRecord) -> Result<TenantModel, StoreError> {
        let slug = record.slug.clone();
        let tenant = self.inner.insert(record).await?;
        self.log.lock().unwrap().push(format!("store.insert {slug}"));
        Ok(tenant)
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: TenantStatus,
    ) -> Result<TenantModel, StoreError> {
        let tenant = self.inner.update_status(id, status).await?;
        self.log.lock().unwrap().push(format!(
            "store.update_status {} {}",
            tenant.slug,
            status.as_str()
        ));
        Ok(tenant)
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        let slug = self
            .inner
            .find_by_id(id)
            .await?
            .map(|t| t.slug)
            .unwrap_or_else(|| id.to_string());
        self.inner.delete(id).await?;
        self.log.lock().unwrap().push(format!("store.delete {slug}"));
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<TenantModel>, StoreError> {
        self.inner.list_all().await
    }
}
