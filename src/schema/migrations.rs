//! Per-tenant migration units.
//!
//! Each unit is one idempotent, schema-qualified DDL statement; `{schema}`
//! is replaced with the sanitized schema name before execution. Units are
//! applied in order and recorded in the per-schema `_migrations` ledger, so
//! re-running migration on an up-to-date schema applies nothing.
//!
//! Append new units at the end; never reorder or rename shipped ones.

/// One named migration step for a tenant schema.
#[derive(Debug, Clone, Copy)]
pub struct MigrationUnit {
    pub name: &'static str,
    pub sql: &'static str,
}

/// The ordered list of migration units every tenant schema receives.
pub const TENANT_MIGRATIONS: &[MigrationUnit] = &[
    MigrationUnit {
        name: "0001_create_users",
        sql: r#"CREATE TABLE IF NOT EXISTS "{schema}".users (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            email VARCHAR(255) UNIQUE NOT NULL,
            display_name VARCHAR(255) NOT NULL,
            is_active BOOLEAN NOT NULL DEFAULT TRUE,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )"#,
    },
    MigrationUnit {
        name: "0002_create_api_keys",
        sql: r#"CREATE TABLE IF NOT EXISTS "{schema}".api_keys (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            user_id UUID NOT NULL REFERENCES "{schema}".users(id) ON DELETE CASCADE,
            key_hash TEXT UNIQUE NOT NULL,
            label VARCHAR(128),
            expires_at TIMESTAMPTZ,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )"#,
    },
    MigrationUnit {
        name: "0003_create_audit_events",
        sql: r#"CREATE TABLE IF NOT EXISTS "{schema}".audit_events (
            id BIGINT GENERATED ALWAYS AS IDENTITY PRIMARY KEY,
            actor_id UUID REFERENCES "{schema}".users(id) ON DELETE SET NULL,
            action VARCHAR(128) NOT NULL,
            payload JSONB,
            recorded_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )"#,
    },
    MigrationUnit {
        name: "0004_index_audit_events_recorded_at",
        sql: r#"CREATE INDEX IF NOT EXISTS audit_events_recorded_idx
            ON "{schema}".audit_events (recorded_at DESC)"#,
    },
];
