use std::sync::Arc;
use std::time::Duration;

use sha2::{Digest, Sha256};

use tandem_shared::errors::AppResult;
use tandem_shared::types::auth::Claims;

use crate::cache::Cache;

/// Namespaces revocation entries so a session token and a reset token with the same
/// text never collide.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevocationPurpose {
    Session,
    Reset,
}

impl RevocationPurpose {
    pub fn prefix(&self) -> &'static str {
        match self {
            RevocationPurpose::Session => "session",
            RevocationPurpose::Reset => "reset",
        }
    }
}

const MARKER: &str = "1";

/// TTL blacklist of tokens that must stop working before they expire.
///
/// Entries are keyed by the SHA-256 of the raw token, so the cache never holds a
/// usable credential.
#[derive(Clone)]
pub struct RevocationCache {
    cache: Arc<dyn Cache>,
    ceiling: Duration,
    fail_closed: bool,
}

impl RevocationCache {
    pub fn new(cache: Arc<dyn Cache>, ceiling: Duration, fail_closed: bool) -> Self {
        Self { cache, ceiling, fail_closed }
    }

    pub fn key(purpose: RevocationPurpose, raw: &str) -> String {
        let digest = Sha256::digest(raw.as_bytes());
        format!("{}:{}", purpose.prefix(), hex::encode(digest))
    }

    /// Idempotent. Empty tokens and zero TTLs are ignored.
    pub async fn blacklist(&self, purpose: RevocationPurpose, raw: &str, ttl: Duration) -> AppResult<()> {
        if raw.is_empty() || ttl.is_zero() {
            return Ok(());
        }
        let ttl = ttl.min(self.ceiling);
        self.cache.set(&Self::key(purpose, raw), MARKER, ttl).await?;
        metrics::counter!("identity_tokens_revoked_total", "purpose" => purpose.prefix()).increment(1);
        Ok(())
    }

    /// Cache failures resolve to "not revoked" unless configured to fail closed.
    pub async fn is_blacklisted(&self, purpose: RevocationPurpose, raw: &str) -> bool {
        if raw.is_empty() {
            return false;
        }
        match self.cache.get(&Self::key(purpose, raw)).await {
            Ok(entry) => entry.is_some(),
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    purpose = purpose.prefix(),
                    fail_closed = self.fail_closed,
                    "revocation lookup failed"
                );
                self.fail_closed
            }
        }
    }

    /// Blacklists a verified session token for the rest of its validity.
    pub async fn revoke_token(&self, raw: &str, claims: &Claims) -> AppResult<()> {
        let remaining = claims.remaining_secs(chrono::Utc::now().timestamp());
        self.blacklist(RevocationPurpose::Session, raw, Duration::from_secs(remaining)).await
    }

    /// Revokes a session token only if nobody else has. Exactly one of any number of
    /// concurrent callers gets `true`.
    pub async fn claim_token(&self, raw: &str, claims: &Claims) -> AppResult<bool> {
        if raw.is_empty() {
            return Ok(false);
        }
        let remaining = claims.remaining_secs(chrono::Utc::now().timestamp()).max(1);
        let ttl = Duration::from_secs(remaining).min(self.ceiling);
        let purpose = RevocationPurpose::Session;
        let claimed = self.cache.set_if_absent(&Self::key(purpose, raw), MARKER, ttl).await?;
        if claimed {
            metrics::counter!("identity_tokens_revoked_total", "purpose" => purpose.prefix()).increment(1);
        }
        Ok(claimed)
    }
}
