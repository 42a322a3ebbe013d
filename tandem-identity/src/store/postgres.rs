use std::time::Duration;

use chrono::{DateTime, Utc};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use uuid::Uuid;

use tandem_shared::clients::db::DbPool;
use tandem_shared::clients::timeout::with_timeout;
use tandem_shared::errors::{AppError, AppResult, ErrorCode};

use super::{stale_write, AccountStore, ResourceStore};
use crate::models::{
    Account, AccountRow, MatchPreferences, MatchPreferencesRow, NewAccount, NewAccountRow, NewInterest,
    NewPasswordResetToken, PasswordResetToken, Profile, ProfileChanges, SettingsRow, UserSettings, Versioned,
};
use crate::schema::{accounts, match_preferences, password_reset_tokens, user_interests, user_settings};

/// Diesel-backed store. Every call runs on the blocking pool under a deadline.
#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
    timeout: Duration,
}

impl PgStore {
    pub fn new(pool: DbPool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }

    async fn run<T, F>(&self, what: &'static str, f: F) -> AppResult<T>
    where
        F: FnOnce(&mut PgConnection) -> AppResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        with_timeout(what, self.timeout, async move {
            tokio::task::spawn_blocking(move || {
                let mut conn = pool
                    .get()
                    .map_err(|e| AppError::unavailable(format!("database pool: {e}")))?;
                f(&mut conn)
            })
            .await
            .map_err(|e| AppError::internal(format!("{what} task failed: {e}")))?
        })
        .await
    }
}

fn map_unique(e: DieselError) -> AppError {
    if let DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info) = &e {
        return if info.constraint_name() == Some("accounts_external_id_key") {
            AppError::new(ErrorCode::ExternalIdTaken, "external identity already linked")
        } else {
            AppError::new(ErrorCode::EmailAlreadyExists, "email already registered")
        };
    }
    AppError::Database(e)
}

fn account_not_found() -> AppError {
    AppError::new(ErrorCode::ProfileNotFound, "account not found")
}

#[axum::async_trait]
impl AccountStore for PgStore {
    async fn create_account(&self, account: NewAccount) -> AppResult<Account> {
        let row = NewAccountRow::new(Uuid::new_v4(), account);
        self.run("create account", move |conn| {
            diesel::insert_into(accounts::table)
                .values(&row)
                .returning(AccountRow::as_returning())
                .get_result::<AccountRow>(conn)
                .map(Account::from)
                .map_err(map_unique)
        })
        .await
    }

    async fn get_account(&self, id: Uuid) -> AppResult<Option<Account>> {
        self.run("get account", move |conn| {
            let row = accounts::table
                .find(id)
                .select(AccountRow::as_select())
                .first(conn)
                .optional()?;
            Ok(row.map(Account::from))
        })
        .await
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Option<Account>> {
        let email = email.to_string();
        self.run("find account by email", move |conn| {
            let row = accounts::table
                .filter(accounts::email.eq(&email))
                .select(AccountRow::as_select())
                .first(conn)
                .optional()?;
            Ok(row.map(Account::from))
        })
        .await
    }

    async fn find_by_external_id(&self, external_id: &str) -> AppResult<Option<Account>> {
        let external_id = external_id.to_string();
        self.run("find account by external id", move |conn| {
            let row = accounts::table
                .filter(accounts::external_id.eq(&external_id))
                .select(AccountRow::as_select())
                .first(conn)
                .optional()?;
            Ok(row.map(Account::from))
        })
        .await
    }

    async fn set_password_hash(&self, id: Uuid, password_hash: &str) -> AppResult<()> {
        let password_hash = password_hash.to_string();
        self.run("set password hash", move |conn| {
            let updated = diesel::update(accounts::table.find(id))
                .set((
                    accounts::password_hash.eq(Some(password_hash)),
                    accounts::updated_at.eq(Utc::now()),
                ))
                .execute(conn)?;
            if updated == 0 {
                return Err(account_not_found());
            }
            Ok(())
        })
        .await
    }

    async fn bind_external_id(&self, id: Uuid, external_id: &str) -> AppResult<()> {
        let external_id = external_id.to_string();
        self.run("bind external id", move |conn| {
            let updated = diesel::update(accounts::table.find(id))
                .set((
                    accounts::external_id.eq(Some(external_id)),
                    accounts::updated_at.eq(Utc::now()),
                ))
                .execute(conn)
                .map_err(map_unique)?;
            if updated == 0 {
                return Err(account_not_found());
            }
            Ok(())
        })
        .await
    }

    async fn save_profile(&self, id: Uuid, profile: &Profile, expected_version: i64) -> AppResult<i64> {
        let changes = ProfileChanges::from(profile);
        self.run("save profile", move |conn| {
            let updated = diesel::update(
                accounts::table
                    .filter(accounts::id.eq(id))
                    .filter(accounts::version.eq(expected_version)),
            )
            .set((
                &changes,
                accounts::version.eq(expected_version + 1),
                accounts::updated_at.eq(Utc::now()),
            ))
            .execute(conn)?;
            if updated == 0 {
                return Err(stale_write("profile"));
            }
            Ok(expected_version + 1)
        })
        .await
    }

    async fn insert_reset_token(&self, token: NewPasswordResetToken) -> AppResult<()> {
        self.run("insert reset token", move |conn| {
            diesel::insert_into(password_reset_tokens::table)
                .values(&token)
                .execute(conn)?;
            Ok(())
        })
        .await
    }

    async fn find_reset_token(&self, token: &str, now: DateTime<Utc>) -> AppResult<Option<PasswordResetToken>> {
        let token = token.to_string();
        self.run("find reset token", move |conn| {
            let row = password_reset_tokens::table
                .filter(password_reset_tokens::token.eq(&token))
                .filter(password_reset_tokens::used_at.is_null())
                .filter(password_reset_tokens::expires_at.gt(now))
                .order(password_reset_tokens::created_at.desc())
                .select(PasswordResetToken::as_select())
                .first(conn)
                .optional()?;
            Ok(row)
        })
        .await
    }

    async fn reset_password_with_token(&self, token_id: Uuid, password_hash: &str, now: DateTime<Utc>) -> AppResult<bool> {
        let password_hash = password_hash.to_string();
        self.run("reset password with token", move |conn| {
            let outcome = conn.transaction::<_, DieselError, _>(|conn| {
                let account_id = diesel::update(
                    password_reset_tokens::table
                        .filter(password_reset_tokens::id.eq(token_id))
                        .filter(password_reset_tokens::used_at.is_null())
                        .filter(password_reset_tokens::expires_at.gt(now)),
                )
                .set(password_reset_tokens::used_at.eq(Some(now)))
                .returning(password_reset_tokens::account_id)
                .get_result::<Uuid>(conn)
                .optional()?;
                let Some(account_id) = account_id else {
                    return Ok(false);
                };

                let updated = diesel::update(accounts::table.find(account_id))
                    .set((
                        accounts::password_hash.eq(Some(password_hash)),
                        accounts::updated_at.eq(now),
                    ))
                    .execute(conn)?;
                if updated == 0 {
                    return Err(DieselError::RollbackTransaction);
                }
                Ok(true)
            });
            match outcome {
                Err(DieselError::RollbackTransaction) => Err(account_not_found()),
                other => Ok(other?),
            }
        })
        .await
    }

    async fn ping(&self) -> AppResult<()> {
        self.run("ping database", |conn| {
            diesel::sql_query("SELECT 1").execute(conn)?;
            Ok(())
        })
        .await
    }
}

#[axum::async_trait]
impl ResourceStore for PgStore {
    async fn get_settings(&self, account_id: Uuid) -> AppResult<Versioned<UserSettings>> {
        self.run("get settings", move |conn| {
            let row = user_settings::table
                .find(account_id)
                .select(SettingsRow::as_select())
                .first(conn)
                .optional()?;
            Ok(row.map(Versioned::from).unwrap_or_else(Versioned::absent))
        })
        .await
    }

    async fn save_settings(&self, account_id: Uuid, settings: &UserSettings, expected_version: i64) -> AppResult<i64> {
        let row = SettingsRow::new(account_id, settings, expected_version + 1, Utc::now());
        self.run("save settings", move |conn| {
            let written = if expected_version == 0 {
                diesel::insert_into(user_settings::table)
                    .values(&row)
                    .on_conflict_do_nothing()
                    .execute(conn)?
            } else {
                diesel::update(
                    user_settings::table
                        .filter(user_settings::account_id.eq(account_id))
                        .filter(user_settings::version.eq(expected_version)),
                )
                .set(&row)
                .execute(conn)?
            };
            if written == 0 {
                return Err(stale_write("settings"));
            }
            Ok(expected_version + 1)
        })
        .await
    }

    async fn get_match_prefs(&self, account_id: Uuid) -> AppResult<Versioned<MatchPreferences>> {
        self.run("get match preferences", move |conn| {
            let row = match_preferences::table
                .find(account_id)
                .select(MatchPreferencesRow::as_select())
                .first(conn)
                .optional()?;
            Ok(row.map(Versioned::from).unwrap_or_else(Versioned::absent))
        })
        .await
    }

    async fn save_match_prefs(&self, account_id: Uuid, prefs: &MatchPreferences, expected_version: i64) -> AppResult<i64> {
        let row = MatchPreferencesRow::new(account_id, prefs, expected_version + 1, Utc::now());
        self.run("save match preferences", move |conn| {
            let written = if expected_version == 0 {
                diesel::insert_into(match_preferences::table)
                    .values(&row)
                    .on_conflict_do_nothing()
                    .execute(conn)?
            } else {
                diesel::update(
                    match_preferences::table
                        .filter(match_preferences::account_id.eq(account_id))
                        .filter(match_preferences::version.eq(expected_version)),
                )
                .set(&row)
                .execute(conn)?
            };
            if written == 0 {
                return Err(stale_write("match preferences"));
            }
            Ok(expected_version + 1)
        })
        .await
    }

    async fn get_interests(&self, account_id: Uuid) -> AppResult<Vec<i32>> {
        self.run("get interests", move |conn| {
            let ids = user_interests::table
                .filter(user_interests::account_id.eq(account_id))
                .select(user_interests::interest_id)
                .order(user_interests::interest_id.asc())
                .load::<i32>(conn)?;
            Ok(ids)
        })
        .await
    }

    async fn replace_interests(&self, account_id: Uuid, interest_ids: &[i32]) -> AppResult<()> {
        let rows: Vec<NewInterest> = interest_ids
            .iter()
            .map(|&interest_id| NewInterest { account_id, interest_id })
            .collect();
        self.run("replace interests", move |conn| {
            conn.transaction::<_, DieselError, _>(|conn| {
                diesel::delete(user_interests::table.filter(user_interests::account_id.eq(account_id)))
                    .execute(conn)?;
                if !rows.is_empty() {
                    diesel::insert_into(user_interests::table)
                        .values(&rows)
                        .execute(conn)?;
                }
                Ok(())
            })?;
            Ok(())
        })
        .await
    }
}
