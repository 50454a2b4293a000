//! Slug handling for tenant schema names.
//!
//! A slug is the short, user-facing tenant identifier; the derived schema
//! name is the only identifier ever interpolated into DDL, so the sanitizer
//! here is the single defense against namespace injection (quotes,
//! semicolons, path separators, null bytes). Nothing else in the crate may
//! build a schema name by hand.

use crate::error::InvalidSlugError;

/// Default prefix applied to every derived schema name.
pub const DEFAULT_SCHEMA_PREFIX: &str = "tenant_";

/// Maximum accepted length for a raw slug.
pub const MAX_SLUG_LENGTH: usize = 50;

/// Derives the schema name for `slug` using the default `tenant_` prefix.
pub fn schema_name(slug: &str) -> String {
    schema_name_with_prefix(slug, DEFAULT_SCHEMA_PREFIX)
}

/// Derives a deterministic, DDL-safe schema name from an arbitrary slug.
///
/// The input is lowercased, hyphens become underscores, and every other
/// character outside `[a-z0-9_]` is dropped (not replaced). A leading digit
/// gets an underscore prepended since namespace identifiers may not start
/// with one. This is a total function: any input, including the empty
/// string, maps to some valid schema name.
///
/// Distinct slugs can collide after sanitization ("a.b" and "ab" both map to
/// `tenant_ab`); callers that need uniqueness must verify the derived name
/// against the registry before trusting it.
pub fn schema_name_with_prefix(slug: &str, prefix: &str) -> String {
    let mut sanitized = String::with_capacity(slug.len());

    for ch in slug.chars() {
        match ch {
            'a'..='z' | '0'..='9' | '_' => sanitized.push(ch),
            'A'..='Z' => sanitized.push(ch.to_ascii_lowercase()),
            '-' => sanitized.push('_'),
            _ => {}
        }
    }

    if sanitized.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        sanitized.insert(0, '_');
    }

    format!("{prefix}{sanitized}")
}

/// Validates a raw slug before it is stored or used to derive a schema name.
///
/// The raw slug is persisted verbatim; only the derived schema name is
/// sanitized. Validation is therefore stricter than sanitization: inputs
/// that would be silently rewritten are rejected up front.
pub fn validate_slug(slug: &str) -> Result<(), InvalidSlugError> {
    if slug.is_empty() {
        return Err(InvalidSlugError::new(slug, "slug must not be empty"));
    }

    if slug.len() > MAX_SLUG_LENGTH {
        return Err(InvalidSlugError::new(
            slug,
            format!("slug must not exceed {MAX_SLUG_LENGTH} characters"),
        ));
    }

    if !slug
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(InvalidSlugError::new(
            slug,
            "slug may only contain letters, digits, hyphens, and underscores",
        ));
    }

    Ok(())
}
