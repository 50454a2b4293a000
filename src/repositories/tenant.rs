//! # Tenant Repository
//!
//! SeaORM-backed implementation of the tenant registry store, plus the
//! [`TenantStore`] trait the provisioner is written against.

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, DatabaseConnection, EntityTrait, IntoActiveModel, ModelTrait, Set,
};
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::tenant::{
    ActiveModel as TenantActiveModel, Column as TenantColumn, Entity as Tenant,
    Model as TenantModel, TenantStatus,
};

/// Data for inserting a new tenant record. The store assigns the id and
/// timestamps.
#[derive(Debug, Clone)]
pub struct NewTenantRecord {
    pub slug: String,
    pub name: String,
    pub schema_name: String,
    pub status: TenantStatus,
}

/// CRUD surface over tenant records consumed by the provisioner.
#[async_trait]
pub trait TenantStore: Send + Sync {
    async fn find_by_slug(&self, slug: &str) -> Result<Option<TenantModel>, StoreError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<TenantModel>, StoreError>;
    async fn insert(&self, record: NewTenantRecord) -> Result<TenantModel, StoreError>;
    async fn update_status(
        &self,
        id: Uuid,
        status: TenantStatus,
    ) -> Result<TenantModel, StoreError>;
    async fn delete(&self, id: Uuid) -> Result<(), StoreError>;
    async fn list_all(&self) -> Result<Vec<TenantModel>, StoreError>;
}

/// Repository for tenant records in the control-plane database.
#[derive(Clone)]
pub struct TenantRepository {
    db: DatabaseConnection,
}

impl TenantRepository {
    /// Create a new repository over the given connection pool.
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    fn map_insert_error(err: sea_orm::DbErr, slug: &str) -> StoreError {
        if is_unique_violation(&err) {
            StoreError::Conflict(format!("tenant with slug {slug:?} already exists"))
        } else {
            StoreError::database_error(err)
        }
    }
}

#[async_trait]
impl TenantStore for TenantRepository {
    async fn find_by_slug(&self, slug: &str) -> Result<Option<TenantModel>, StoreError> {
        use sea_orm::{ColumnTrait, QueryFilter};

        Tenant::find()
            .filter(TenantColumn::Slug.eq(slug))
            .one(&self.db)
            .await
            .map_err(StoreError::database_error)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<TenantModel>, StoreError> {
        Tenant::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(StoreError::database_error)
    }

    async fn insert(&self, record: NewTenantRecord) -> Result<TenantModel, StoreError> {
        let now = Utc::now();
        let slug = record.slug.clone();

        let tenant = TenantActiveModel {
            id: Set(Uuid::new_v4()),
            slug: Set(record.slug),
            name: Set(record.name),
            schema_name: Set(record.schema_name),
            status: Set(record.status),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        };

        tenant
            .insert(&self.db)
            .await
            .map_err(|err| Self::map_insert_error(err, &slug))
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: TenantStatus,
    ) -> Result<TenantModel, StoreError> {
        let tenant = self
            .find_by_id(id)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("tenant {id} not found")))?;

        let mut active = tenant.into_active_model();
        active.status = Set(status);
        active.updated_at = Set(Utc::now().into());

        active
            .update(&self.db)
            .await
            .map_err(StoreError::database_error)
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        let tenant = self
            .find_by_id(id)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("tenant {id} not found")))?;

        tenant
            .delete(&self.db)
            .await
            .map_err(StoreError::database_error)?;

        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<TenantModel>, StoreError> {
        Tenant::find()
            .all(&self.db)
            .await
            .map_err(StoreError::database_error)
    }
}

fn is_unique_violation(error: &sea_orm::DbErr) -> bool {
    use sea_orm::RuntimeErr;

    const PG_UNIQUE: &str = "23505";
    const SQLITE_DUPLICATE_CODES: &[&str] = &["1555", "2067"];

    let runtime_err = match error {
        sea_orm::DbErr::Query(RuntimeErr::SqlxError(sqlx_err))
        | sea_orm::DbErr::Exec(RuntimeErr::SqlxError(sqlx_err)) => sqlx_err,
        _ => return false,
    };

    let Some(db_error) = runtime_err.as_database_error() else {
        return false;
    };

    if db_error.is_unique_violation() {
        return true;
    }

    db_error.code().is_some_and(|code| {
        let code = code.as_ref();
        code == PG_UNIQUE || SQLITE_DUPLICATE_CODES.contains(&code)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use migration::{Migrator, MigratorTrait};
    use sea_orm::Database;

    async fn setup_test_db() -> DatabaseConnection {
        let db = Database::connect("sqlite::memory:")
            .await
            .expect("create in-memory db");
        Migrator::up(&db, None).await.expect("apply migrations");
        db
    }

    fn new_record(slug: &str) -> NewTenantRecord {
        NewTenantRecord {
            slug: slug.to_string(),
            name: format!("{slug} display name"),
            schema_name: crate::slug::schema_name(slug),
            status: TenantStatus::Pending,
        }
    }

    #[tokio::test]
    async fn insert_and_find_round_trip() {
        let repo = TenantRepository::new(setup_test_db().await);

        let created = repo.insert(new_record("acme")).await.expect("insert");
        assert_eq!(created.slug, "acme");
        assert_eq!(created.schema_name, "tenant_acme");
        assert_eq!(created.status, TenantStatus::Pending);

        let by_slug = repo.find_by_slug("acme").await.expect("find by slug");
        assert_eq!(by_slug.as_ref().map(|t| t.id), Some(created.id));

        let by_id = repo.find_by_id(created.id).await.expect("find by id");
        assert!(by_id.is_some());

        let missing = repo.find_by_slug("nope").await.expect("find missing");
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn duplicate_slug_maps_to_conflict() {
        let repo = TenantRepository::new(setup_test_db().await);

        repo.insert(new_record("acme")).await.expect("first insert");
        let err = repo.insert(new_record("acme")).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn update_status_touches_updated_at() {
        let repo = TenantRepository::new(setup_test_db().await);
        let created = repo.insert(new_record("acme")).await.expect("insert");

        let updated = repo
            .update_status(created.id, TenantStatus::Active)
            .await
            .expect("update status");
        assert_eq!(updated.status, TenantStatus::Active);
        assert!(updated.updated_at >= created.updated_at);

        let err = repo
            .update_status(Uuid::new_v4(), TenantStatus::Active)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn delete_removes_record() {
        let repo = TenantRepository::new(setup_test_db().await);
        let created = repo.insert(new_record("acme")).await.expect("insert");

        repo.delete(created.id).await.expect("delete");
        assert!(repo.find_by_id(created.id).await.expect("find").is_none());

        let err = repo.delete(created.id).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn list_all_returns_every_record() {
        let repo = TenantRepository::new(setup_test_db().await);
        repo.insert(new_record("acme")).await.expect("insert");
        repo.insert(new_record("globex")).await.expect("insert");

        let all = repo.list_all().await.expect("list");
        assert_eq!(all.len(), 2);
    }
}
