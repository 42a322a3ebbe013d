//! Durable record storage.
//!
//! Writes to versioned resources are conditional: they succeed only when the stored
//! version still equals the one the caller read, and bump it by one. A lost race
//! surfaces as `StaleWrite` and changes nothing.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use tandem_shared::errors::{AppError, AppResult, ErrorCode};

use crate::models::{
    Account, MatchPreferences, NewAccount, NewPasswordResetToken, PasswordResetToken, Profile,
    UserSettings, Versioned,
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[axum::async_trait]
pub trait AccountStore: Send + Sync {
    /// Fails with `EmailAlreadyExists` or `ExternalIdTaken` on a uniqueness clash.
    async fn create_account(&self, account: NewAccount) -> AppResult<Account>;
    async fn get_account(&self, id: Uuid) -> AppResult<Option<Account>>;
    async fn find_by_email(&self, email: &str) -> AppResult<Option<Account>>;
    async fn find_by_external_id(&self, external_id: &str) -> AppResult<Option<Account>>;
    async fn set_password_hash(&self, id: Uuid, password_hash: &str) -> AppResult<()>;
    async fn bind_external_id(&self, id: Uuid, external_id: &str) -> AppResult<()>;
    /// Returns the new version.
    async fn save_profile(&self, id: Uuid, profile: &Profile, expected_version: i64) -> AppResult<i64>;

    async fn insert_reset_token(&self, token: NewPasswordResetToken) -> AppResult<()>;
    /// Most recently created row with this token that is unused and unexpired at `now`.
    async fn find_reset_token(&self, token: &str, now: DateTime<Utc>) -> AppResult<Option<PasswordResetToken>>;
    /// Marks the token used and stores the new hash for its account as one unit. `false`
    /// means the token was already used or expired, and nothing changed.
    async fn reset_password_with_token(&self, token_id: Uuid, password_hash: &str, now: DateTime<Utc>) -> AppResult<bool>;

    async fn ping(&self) -> AppResult<()> {
        Ok(())
    }
}

#[axum::async_trait]
pub trait ResourceStore: Send + Sync {
    /// Defaults at version 0 when no row exists.
    async fn get_settings(&self, account_id: Uuid) -> AppResult<Versioned<UserSettings>>;
    async fn save_settings(&self, account_id: Uuid, settings: &UserSettings, expected_version: i64) -> AppResult<i64>;
    async fn get_match_prefs(&self, account_id: Uuid) -> AppResult<Versioned<MatchPreferences>>;
    async fn save_match_prefs(&self, account_id: Uuid, prefs: &MatchPreferences, expected_version: i64) -> AppResult<i64>;
    /// Sorted ascending.
    async fn get_interests(&self, account_id: Uuid) -> AppResult<Vec<i32>>;
    /// Deletes every interest and inserts `interest_ids` as one unit.
    async fn replace_interests(&self, account_id: Uuid, interest_ids: &[i32]) -> AppResult<()>;
}

pub(crate) fn stale_write(resource: &str) -> AppError {
    AppError::new(
        ErrorCode::StaleWrite,
        format!("{resource} was modified concurrently, reload and retry"),
    )
}
