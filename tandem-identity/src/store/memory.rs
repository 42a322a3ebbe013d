use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use tandem_shared::errors::{AppError, AppResult, ErrorCode};

use super::{stale_write, AccountStore, ResourceStore};
use crate::models::{
    Account, MatchPreferences, NewAccount, NewPasswordResetToken, PasswordResetToken, Profile,
    UserSettings, Versioned,
};

#[derive(Default)]
struct State {
    accounts: HashMap<Uuid, Account>,
    reset_tokens: Vec<PasswordResetToken>,
    settings: HashMap<Uuid, Versioned<UserSettings>>,
    match_prefs: HashMap<Uuid, Versioned<MatchPreferences>>,
    interests: HashMap<Uuid, Vec<i32>>,
}

impl State {
    fn account_mut(&mut self, id: Uuid) -> AppResult<&mut Account> {
        self.accounts
            .get_mut(&id)
            .ok_or_else(|| AppError::new(ErrorCode::ProfileNotFound, "account not found"))
    }
}

/// In-process store with the same conflict and versioning rules as Postgres.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn check_version(current: i64, expected: i64, resource: &str) -> AppResult<()> {
    if current != expected {
        return Err(stale_write(resource));
    }
    Ok(())
}

#[axum::async_trait]
impl AccountStore for MemoryStore {
    async fn create_account(&self, account: NewAccount) -> AppResult<Account> {
        let mut state = self.state.lock().await;

        if state.accounts.values().any(|a| a.email == account.email) {
            return Err(AppError::new(ErrorCode::EmailAlreadyExists, "email already registered"));
        }
        if let Some(external_id) = &account.external_id {
            if state.accounts.values().any(|a| a.external_id.as_ref() == Some(external_id)) {
                return Err(AppError::new(ErrorCode::ExternalIdTaken, "external identity already linked"));
            }
        }

        let now = Utc::now();
        let created = Account {
            id: Uuid::new_v4(),
            email: account.email,
            password_hash: account.password_hash,
            external_id: account.external_id,
            role: account.role,
            profile: account.profile,
            version: 1,
            created_at: now,
            updated_at: now,
        };
        state.accounts.insert(created.id, created.clone());
        Ok(created)
    }

    async fn get_account(&self, id: Uuid) -> AppResult<Option<Account>> {
        Ok(self.state.lock().await.accounts.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Option<Account>> {
        let state = self.state.lock().await;
        Ok(state.accounts.values().find(|a| a.email == email).cloned())
    }

    async fn find_by_external_id(&self, external_id: &str) -> AppResult<Option<Account>> {
        let state = self.state.lock().await;
        Ok(state
            .accounts
            .values()
            .find(|a| a.external_id.as_deref() == Some(external_id))
            .cloned())
    }

    async fn set_password_hash(&self, id: Uuid, password_hash: &str) -> AppResult<()> {
        let mut state = self.state.lock().await;
        let account = state.account_mut(id)?;
        account.password_hash = Some(password_hash.to_string());
        account.updated_at = Utc::now();
        Ok(())
    }

    async fn bind_external_id(&self, id: Uuid, external_id: &str) -> AppResult<()> {
        let mut state = self.state.lock().await;
        if state
            .accounts
            .values()
            .any(|a| a.id != id && a.external_id.as_deref() == Some(external_id))
        {
            return Err(AppError::new(ErrorCode::ExternalIdTaken, "external identity already linked"));
        }
        let account = state.account_mut(id)?;
        account.external_id = Some(external_id.to_string());
        account.updated_at = Utc::now();
        Ok(())
    }

    async fn save_profile(&self, id: Uuid, profile: &Profile, expected_version: i64) -> AppResult<i64> {
        let mut state = self.state.lock().await;
        let account = state.account_mut(id)?;
        check_version(account.version, expected_version, "profile")?;
        account.profile = profile.clone();
        account.version += 1;
        account.updated_at = Utc::now();
        Ok(account.version)
    }

    async fn insert_reset_token(&self, token: NewPasswordResetToken) -> AppResult<()> {
        self.state.lock().await.reset_tokens.push(PasswordResetToken {
            id: token.id,
            account_id: token.account_id,
            token: token.token,
            expires_at: token.expires_at,
            used_at: None,
            created_at: token.created_at,
        });
        Ok(())
    }

    async fn find_reset_token(&self, token: &str, now: DateTime<Utc>) -> AppResult<Option<PasswordResetToken>> {
        let state = self.state.lock().await;
        Ok(state
            .reset_tokens
            .iter()
            .filter(|row| row.token == token && row.is_usable(now))
            .max_by_key(|row| row.created_at)
            .cloned())
    }

    async fn reset_password_with_token(&self, token_id: Uuid, password_hash: &str, now: DateTime<Utc>) -> AppResult<bool> {
        let mut state = self.state.lock().await;
        let Some(index) = state.reset_tokens.iter().position(|row| row.id == token_id && row.is_usable(now)) else {
            return Ok(false);
        };
        let account_id = state.reset_tokens[index].account_id;
        let account = state.account_mut(account_id)?;
        account.password_hash = Some(password_hash.to_string());
        account.updated_at = now;
        state.reset_tokens[index].used_at = Some(now);
        Ok(true)
    }
}

#[axum::async_trait]
impl ResourceStore for MemoryStore {
    async fn get_settings(&self, account_id: Uuid) -> AppResult<Versioned<UserSettings>> {
        let state = self.state.lock().await;
        Ok(state.settings.get(&account_id).cloned().unwrap_or_else(Versioned::absent))
    }

    async fn save_settings(&self, account_id: Uuid, settings: &UserSettings, expected_version: i64) -> AppResult<i64> {
        let mut state = self.state.lock().await;
        let current = state.settings.get(&account_id).map(|s| s.version).unwrap_or(0);
        check_version(current, expected_version, "settings")?;
        let version = current + 1;
        state.settings.insert(
            account_id,
            Versioned { value: *settings, version, updated_at: Some(Utc::now()) },
        );
        Ok(version)
    }

    async fn get_match_prefs(&self, account_id: Uuid) -> AppResult<Versioned<MatchPreferences>> {
        let state = self.state.lock().await;
        Ok(state.match_prefs.get(&account_id).cloned().unwrap_or_else(Versioned::absent))
    }

    async fn save_match_prefs(&self, account_id: Uuid, prefs: &MatchPreferences, expected_version: i64) -> AppResult<i64> {
        let mut state = self.state.lock().await;
        let current = state.match_prefs.get(&account_id).map(|p| p.version).unwrap_or(0);
        check_version(current, expected_version, "match preferences")?;
        let version = current + 1;
        state.match_prefs.insert(
            account_id,
            Versioned { value: prefs.clone(), version, updated_at: Some(Utc::now()) },
        );
        Ok(version)
    }

    async fn get_interests(&self, account_id: Uuid) -> AppResult<Vec<i32>> {
        let state = self.state.lock().await;
        let mut ids = state.interests.get(&account_id).cloned().unwrap_or_default();
        ids.sort_unstable();
        Ok(ids)
    }

    async fn replace_interests(&self, account_id: Uuid, interest_ids: &[i32]) -> AppResult<()> {
        self.state.lock().await.interests.insert(account_id, interest_ids.to_vec());
        Ok(())
    }
}
