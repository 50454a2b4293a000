//! # Schema Manager
//!
//! Stateless façade over namespace-level DDL: create, migrate, delete, and
//! inspect per-tenant schemas. Holds no state of its own; every operation
//! goes straight to the target database.
//!
//! Schema names are either derived through the sanitizer or checked against
//! its output alphabet before interpolation, so no caller-supplied string
//! ever reaches DDL unvetted.

mod migrations;

use async_trait::async_trait;
use sea_orm::{ConnectionTrait, DatabaseConnection, Statement};
use tracing::{debug, info};

use crate::error::SchemaError;
use crate::slug;

pub use migrations::{MigrationUnit, TENANT_MIGRATIONS};

/// Name of the per-schema ledger table tracking applied migration units.
const MIGRATIONS_TABLE: &str = "_migrations";

/// Outcome of a schema creation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaCreated {
    pub schema_name: String,
    /// `false` when the schema already existed (idempotent success).
    pub created: bool,
}

/// Outcome of applying outstanding migration units to one schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaMigrated {
    pub schema_name: String,
    pub migrations_applied: u32,
}

/// Namespace-level DDL operations, as a trait so orchestration code can be
/// exercised against a recording fake.
#[async_trait]
pub trait SchemaOps: Send + Sync {
    /// Derives the schema name for `slug` and creates the schema if absent.
    async fn create_schema(&self, slug: &str) -> Result<SchemaCreated, SchemaError>;

    /// Applies any outstanding migration units to the given schema.
    async fn migrate_schema(&self, schema_name: &str) -> Result<SchemaMigrated, SchemaError>;

    /// Destroys the schema and everything in it. Deleting a non-existent
    /// schema is not an error.
    async fn delete_schema(&self, schema_name: &str) -> Result<(), SchemaError>;

    async fn schema_exists(&self, schema_name: &str) -> Result<bool, SchemaError>;

    /// Snapshot of tenant schemas present at call time.
    async fn list_schemas(&self) -> Result<Vec<String>, SchemaError>;
}

/// SeaORM-backed schema manager for Postgres namespaces.
#[derive(Clone)]
pub struct SchemaManager {
    db: DatabaseConnection,
    prefix: String,
}

impl SchemaManager {
    /// Create a manager using the default `tenant_` prefix.
    pub fn new(db: DatabaseConnection) -> Self {
        Self::with_prefix(db, slug::DEFAULT_SCHEMA_PREFIX)
    }

    /// Create a manager deriving schema names with the given prefix.
    pub fn with_prefix<S: Into<String>>(db: DatabaseConnection, prefix: S) -> Self {
        Self {
            db,
            prefix: prefix.into(),
        }
    }

    /// Rejects any schema name that could not have come out of the
    /// sanitizer. Such a name cannot exist in our namespace, so operations
    /// on it uniformly report the schema as not found.
    fn ensure_safe_name(&self, schema_name: &str) -> Result<(), SchemaError> {
        let well_formed = !schema_name.is_empty()
            && !schema_name.starts_with(|c: char| c.is_ascii_digit())
            && schema_name
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');

        if well_formed && schema_name.starts_with(&self.prefix) {
            Ok(())
        } else {
            Err(SchemaError::NotFound {
                schema_name: schema_name.to_string(),
            })
        }
    }

    async fn execute(&self, sql: String) -> Result<(), sea_orm::DbErr> {
        let stmt = Statement::from_string(self.db.get_database_backend(), sql);
        self.db.execute(stmt).await.map(|_| ())
    }

    async fn applied_units(&self, schema_name: &str) -> Result<Vec<String>, sea_orm::DbErr> {
        let stmt = Statement::from_string(
            self.db.get_database_backend(),
            format!(r#"SELECT name FROM "{schema_name}"."{MIGRATIONS_TABLE}""#),
        );

        let rows = self.db.query_all(stmt).await?;
        rows.iter().map(|row| row.try_get("", "name")).collect()
    }
}

#[async_trait]
impl SchemaOps for SchemaManager {
    async fn create_schema(&self, slug: &str) -> Result<SchemaCreated, SchemaError> {
        let schema_name = slug::schema_name_with_prefix(slug, &self.prefix);

        let existed = self.schema_exists(&schema_name).await?;
        if existed {
            debug!(schema_name = %schema_name, "Schema already exists; create is a no-op");
            return Ok(SchemaCreated {
                schema_name,
                created: false,
            });
        }

        self.execute(format!(r#"CREATE SCHEMA IF NOT EXISTS "{schema_name}""#))
            .await
            .map_err(|source| SchemaError::CreateFailed {
                schema_name: schema_name.clone(),
                source,
            })?;

        info!(schema_name = %schema_name, "Created tenant schema");
        Ok(SchemaCreated {
            schema_name,
            created: true,
        })
    }

    async fn migrate_schema(&self, schema_name: &str) -> Result<SchemaMigrated, SchemaError> {
        self.ensure_safe_name(schema_name)?;

        let map_err = |source| SchemaError::MigrateFailed {
            schema_name: schema_name.to_string(),
            source,
        };

        // Ledger table first so a fresh schema starts from an empty set.
        self.execute(format!(
            r#"CREATE TABLE IF NOT EXISTS "{schema_name}"."{MIGRATIONS_TABLE}" (
                name TEXT PRIMARY KEY,
                applied_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )"#
        ))
        .await
        .map_err(map_err)?;

        let applied = self.applied_units(schema_name).await.map_err(map_err)?;

        let mut migrations_applied = 0u32;
        for unit in TENANT_MIGRATIONS {
            if applied.iter().any(|name| name == unit.name) {
                continue;
            }

            self.execute(unit.sql.replace("{schema}", schema_name))
                .await
                .map_err(map_err)?;

            let stmt = Statement::from_sql_and_values(
                self.db.get_database_backend(),
                format!(r#"INSERT INTO "{schema_name}"."{MIGRATIONS_TABLE}" (name) VALUES ($1)"#),
                [unit.name.into()],
            );
            self.db.execute(stmt).await.map_err(map_err)?;

            debug!(schema_name = %schema_name, unit = unit.name, "Applied migration unit");
            migrations_applied += 1;
        }

        if migrations_applied > 0 {
            info!(
                schema_name = %schema_name,
                migrations_applied, "Migrated tenant schema"
            );
        }

        Ok(SchemaMigrated {
            schema_name: schema_name.to_string(),
            migrations_applied,
        })
    }

    async fn delete_schema(&self, schema_name: &str) -> Result<(), SchemaError> {
        // An unsafe name cannot exist, and deleting an absent schema is a
        // no-op, so the guard failure is swallowed here.
        if self.ensure_safe_name(schema_name).is_err() {
            return Ok(());
        }

        self.execute(format!(r#"DROP SCHEMA IF EXISTS "{schema_name}" CASCADE"#))
            .await
            .map_err(|source| SchemaError::DeleteFailed {
                schema_name: schema_name.to_string(),
                source,
            })?;

        info!(schema_name = %schema_name, "Deleted tenant schema");
        Ok(())
    }

    async fn schema_exists(&self, schema_name: &str) -> Result<bool, SchemaError> {
        if self.ensure_safe_name(schema_name).is_err() {
            return Ok(false);
        }

        let stmt = Statement::from_sql_and_values(
            self.db.get_database_backend(),
            "SELECT schema_name FROM information_schema.schemata WHERE schema_name = $1",
            [schema_name.into()],
        );

        let row = self
            .db
            .query_one(stmt)
            .await
            .map_err(|source| SchemaError::ListFailed { source })?;

        Ok(row.is_some())
    }

    async fn list_schemas(&self) -> Result<Vec<String>, SchemaError> {
        let stmt = Statement::from_sql_and_values(
            self.db.get_database_backend(),
            "SELECT schema_name FROM information_schema.schemata \
             WHERE schema_name LIKE $1 ORDER BY schema_name",
            [format!("{}%", self.prefix.replace('_', "\\_")).into()],
        );

        let rows = self
            .db
            .query_all(stmt)
            .await
            .map_err(|source| SchemaError::ListFailed { source })?;

        rows.iter()
            .map(|row| {
                row.try_get("", "schema_name")
                    .map_err(|source| SchemaError::ListFailed { source })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::Database;

    async fn manager() -> SchemaManager {
        let db = Database::connect("sqlite::memory:")
            .await
            .expect("create in-memory db");
        SchemaManager::new(db)
    }

    #[tokio::test]
    async fn unsafe_names_are_treated_as_absent() {
        let mgr = manager().await;

        // None of these can exist in the tenant namespace.
        for name in [
            "",
            "public",
            "tenant_Acme",
            "tenant_a;b",
            "tenant_a\"b",
            "1tenant_a",
            "other_acme",
        ] {
            assert!(
                !mgr.schema_exists(name).await.expect("exists check"),
                "{name:?} should be reported absent"
            );
            assert!(
                mgr.delete_schema(name).await.is_ok(),
                "{name:?} delete should be a no-op"
            );
        }
    }

    #[tokio::test]
    async fn migrate_rejects_unsafe_name_before_any_ddl() {
        let mgr = manager().await;
        let err = mgr.migrate_schema("tenant_a;b").await.unwrap_err();
        assert_eq!(err.code(), "SCHEMA_NOT_FOUND");
    }

    #[test]
    fn migration_units_have_unique_names_and_schema_placeholders() {
        let mut seen = std::collections::HashSet::new();
        for unit in TENANT_MIGRATIONS {
            assert!(seen.insert(unit.name), "duplicate unit name {}", unit.name);
            assert!(
                unit.sql.contains("{schema}"),
                "unit {} is not schema-qualified",
                unit.name
            );
        }
    }
}
