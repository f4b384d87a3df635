use std::fmt;

use serde::Serialize;

use super::error::TenantError;

/// Default prefix for every company database on the server.
pub const DEFAULT_DATABASE_PREFIX: &str = "logos_ai";

/// Postgres truncates identifiers longer than NAMEDATALEN - 1 bytes.
const MAX_IDENTIFIER_LEN: usize = 63;

/// Map a human-supplied company name to its canonical key.
///
/// Lowercases, replaces every character outside `[a-z0-9]` with `_`, collapses
/// runs of `_` and trims them from both ends. Distinct names that normalize to
/// the same key ("Acme Corp!" and "acme_corp") are the same tenant.
pub fn canonicalize(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars().flat_map(char::to_lowercase) {
        let c = if c.is_ascii_lowercase() || c.is_ascii_digit() { c } else { '_' };
        if c == '_' && (out.is_empty() || out.ends_with('_')) {
            continue;
        }
        out.push(c);
    }
    while out.ends_with('_') {
        out.pop();
    }
    out
}

/// Canonical tenant key, guaranteed non-empty and within the length policy.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct TenantKey(String);

impl TenantKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

/// Physical database name, `<prefix>_<key>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct TenantDatabaseName(String);

impl TenantDatabaseName {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantDatabaseName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

/// Naming policy shared by the provisioner, the registry and the guard.
#[derive(Debug, Clone)]
pub struct TenantNaming {
    prefix: String,
    min_len: usize,
    max_len: usize,
}

impl Default for TenantNaming {
    fn default() -> Self {
        Self::new(DEFAULT_DATABASE_PREFIX, 2, 50)
    }
}

impl TenantNaming {
    pub fn new(prefix: impl Into<String>, min_len: usize, max_len: usize) -> Self {
        Self {
            prefix: prefix.into(),
            min_len,
            max_len,
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Canonicalize and validate a raw company name (or an existing key).
    pub fn key(&self, raw: &str) -> Result<TenantKey, TenantError> {
        let key = canonicalize(raw);
        let invalid = |reason: String| TenantError::InvalidTenantName {
            name: raw.to_string(),
            reason,
        };

        if key.is_empty() {
            return Err(invalid("name contains no letters or digits".to_string()));
        }
        if key.len() < self.min_len || key.len() > self.max_len {
            return Err(invalid(format!(
                "canonical name must be between {} and {} characters",
                self.min_len, self.max_len
            )));
        }
        if self.prefix.len() + 1 + key.len() > MAX_IDENTIFIER_LEN {
            return Err(invalid("database name would exceed 63 characters".to_string()));
        }

        Ok(TenantKey(key))
    }

    pub fn database_name(&self, key: &TenantKey) -> TenantDatabaseName {
        TenantDatabaseName(format!("{}_{}", self.prefix, key.0))
    }

    /// Pattern for `pg_database.datname LIKE $1 ESCAPE '\'`. The prefix is
    /// escaped so `_` in it is matched literally.
    pub fn like_pattern(&self) -> String {
        let mut pattern = String::with_capacity(self.prefix.len() + 4);
        for c in self.prefix.chars() {
            if matches!(c, '_' | '%' | '\\') {
                pattern.push('\\');
            }
            pattern.push(c);
        }
        pattern.push_str("\\_%");
        pattern
    }

    /// Recover the tenant key from a catalog database name, if it is one of ours.
    pub fn key_from_database(&self, database: &str) -> Option<TenantKey> {
        let rest = database.strip_prefix(&self.prefix)?.strip_prefix('_')?;
        if rest.is_empty() || canonicalize(rest) != rest {
            return None;
        }
        Some(TenantKey(rest.to_string()))
    }
}
