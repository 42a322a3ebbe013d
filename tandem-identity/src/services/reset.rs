use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use uuid::Uuid;

use tandem_shared::errors::{AppError, AppResult, ErrorCode};

use super::credentials;
use super::normalize;
use super::revocation::{RevocationCache, RevocationPurpose};
use crate::models::NewPasswordResetToken;
use crate::notify::{password_reset_email, Notifier};
use crate::store::AccountStore;

pub const RESET_TOKEN_BYTES: usize = 32;

fn invalid_token() -> AppError {
    AppError::new(ErrorCode::ResetTokenInvalid, "invalid or expired reset token")
}

/// Single-use password reset tokens.
///
/// A token is consumed together with the password change by one conditional store
/// write, then recorded in the revocation cache so a replay is refused even before the
/// store is consulted.
#[derive(Clone)]
pub struct PasswordResetFlow {
    accounts: Arc<dyn AccountStore>,
    notifier: Arc<dyn Notifier>,
    revocations: RevocationCache,
    ttl: chrono::Duration,
    link_base: String,
}

impl PasswordResetFlow {
    pub fn new(
        accounts: Arc<dyn AccountStore>,
        notifier: Arc<dyn Notifier>,
        revocations: RevocationCache,
        ttl_secs: i64,
        link_base: &str,
    ) -> Self {
        Self {
            accounts,
            notifier,
            revocations,
            ttl: chrono::Duration::seconds(ttl_secs),
            link_base: link_base.trim_end_matches('?').to_string(),
        }
    }

    /// `Ok(None)` when the email is unknown, so callers can answer identically.
    pub async fn request_reset(&self, email: &str) -> AppResult<Option<String>> {
        let email = match normalize::email(email) {
            Ok(email) => email,
            Err(_) => return Ok(None),
        };

        let Some(account) = self.accounts.find_by_email(&email).await? else {
            tracing::debug!("password reset requested for unknown email");
            return Ok(None);
        };

        let token = credentials::random_token(RESET_TOKEN_BYTES);
        let now = Utc::now();
        self.accounts
            .insert_reset_token(NewPasswordResetToken {
                id: Uuid::new_v4(),
                account_id: account.id,
                token: token.clone(),
                expires_at: now + self.ttl,
                created_at: now,
            })
            .await?;

        let link = format!("{}?token={token}", self.link_base);
        let (subject, html) = password_reset_email(&link, self.ttl.num_minutes());
        if let Err(e) = self.notifier.send(&account.email, &subject, &html).await {
            tracing::error!(error = %e, user_id = %account.id, "failed to send reset email");
            return Err(AppError::new(ErrorCode::DeliveryFailed, "could not deliver reset email"));
        }

        tracing::info!(user_id = %account.id, "password reset requested");
        Ok(Some(token))
    }

    /// Spends the token on `password_hash` and returns the account it belongs to. The
    /// token stays usable if the store write fails.
    pub async fn validate_and_consume(&self, token: &str, password_hash: &str) -> AppResult<Uuid> {
        let token = token.trim();
        if token.is_empty() {
            return Err(invalid_token());
        }
        if self.revocations.is_blacklisted(RevocationPurpose::Reset, token).await {
            return Err(invalid_token());
        }

        let now = Utc::now();
        let row = self
            .accounts
            .find_reset_token(token, now)
            .await?
            .ok_or_else(invalid_token)?;

        if !self.accounts.reset_password_with_token(row.id, password_hash, now).await? {
            tracing::warn!(user_id = %row.account_id, "reset token consumed concurrently");
            return Err(invalid_token());
        }

        let remaining = (row.expires_at - now).num_seconds().max(0) as u64;
        if let Err(e) = self
            .revocations
            .blacklist(RevocationPurpose::Reset, token, Duration::from_secs(remaining))
            .await
        {
            tracing::warn!(error = %e, "could not record consumed reset token");
        }

        Ok(row.account_id)
    }

    /// Hashes before touching the token, so a rejected password leaves it usable.
    pub async fn reset_password(&self, token: &str, new_password: &str) -> AppResult<Uuid> {
        credentials::validate_strength(new_password)?;
        let hash = credentials::hash_password(new_password)?;
        let account_id = self.validate_and_consume(token, &hash).await?;
        tracing::info!(user_id = %account_id, "password reset");
        Ok(account_id)
    }
}
