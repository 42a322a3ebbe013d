use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use tandem_shared::errors::{AppError, AppResult, ErrorCode};
use tandem_shared::middleware::Authenticator;
use tandem_shared::types::auth::{AuthUser, TokenPair, TokenType, UserRole};
use tandem_shared::types::HealthCheck;

use super::credentials;
use super::federation::{FederatedLinker, IdentityProvider};
use super::normalize;
use super::patch::{merge, InterestsReplace, MatchPrefsPatch, ProfilePatch, SettingsPatch};
use super::reset::PasswordResetFlow;
use super::revocation::{RevocationCache, RevocationPurpose};
use super::tokens::TokenService;
use crate::cache::Cache;
use crate::config::AppConfig;
use crate::models::{Account, MatchPreferences, NewAccount, Profile, UserSettings, Versioned};
use crate::notify::Notifier;
use crate::store::{AccountStore, ResourceStore};

const BAD_LOGIN: &str = "invalid email or password";
const BAD_TOKEN: &str = "invalid or expired token";

#[derive(Debug, Deserialize, Validate)]
pub struct SignupRequest {
    #[validate(email(message = "invalid email address"))]
    pub email: String,
    #[validate(length(min = 1, message = "password is required"))]
    pub password: String,
    #[validate(length(min = 1, max = 80, message = "display name must be 1 to 80 characters"))]
    pub display_name: String,
    pub country_code: Option<String>,
    pub native_lang: Option<String>,
    pub target_lang: Option<String>,
    pub level: Option<i16>,
    pub age: Option<i32>,
}

#[derive(Debug, Serialize)]
pub struct SignupOutcome {
    pub account: Account,
    #[serde(flatten)]
    pub tokens: TokenPair,
}

#[derive(Debug, Serialize)]
pub struct LoginOutcome {
    pub account_id: Uuid,
    pub role: UserRole,
    #[serde(flatten)]
    pub tokens: TokenPair,
}

#[derive(Debug, Serialize)]
pub struct FederatedOutcome {
    pub account_id: Uuid,
    pub role: UserRole,
    #[serde(flatten)]
    pub tokens: TokenPair,
    pub is_new_user: bool,
}

/// External collaborators the service is wired to.
pub struct Collaborators {
    pub accounts: Arc<dyn AccountStore>,
    pub resources: Arc<dyn ResourceStore>,
    pub cache: Arc<dyn Cache>,
    pub notifier: Arc<dyn Notifier>,
    pub provider: Arc<dyn IdentityProvider>,
}

pub struct IdentityService {
    accounts: Arc<dyn AccountStore>,
    resources: Arc<dyn ResourceStore>,
    cache: Arc<dyn Cache>,
    tokens: TokenService,
    revocations: RevocationCache,
    resets: PasswordResetFlow,
    federation: FederatedLinker,
}

fn count_login(outcome: &'static str) {
    metrics::counter!("identity_logins_total", "outcome" => outcome).increment(1);
}

impl IdentityService {
    pub fn new(config: &AppConfig, deps: Collaborators) -> Self {
        let tokens = TokenService::new(&config.jwt_secret, config.access_ttl_secs, config.refresh_ttl_secs);
        let revocations = RevocationCache::new(
            deps.cache.clone(),
            config.revocation_ceiling(),
            config.revocation_fail_closed,
        );
        let resets = PasswordResetFlow::new(
            deps.accounts.clone(),
            deps.notifier,
            revocations.clone(),
            config.reset_token_ttl_secs,
            &config.reset_link_base,
        );
        let federation = FederatedLinker::new(deps.provider, deps.accounts.clone());

        Self {
            accounts: deps.accounts,
            resources: deps.resources,
            cache: deps.cache,
            tokens,
            revocations,
            resets,
            federation,
        }
    }

    // --- Sessions ---

    pub async fn signup(&self, req: SignupRequest) -> AppResult<SignupOutcome> {
        let email = normalize::email(&req.email)?;
        credentials::validate_strength(&req.password)?;

        let seed = ProfilePatch {
            display_name: Some(req.display_name),
            country_code: req.country_code,
            native_lang: req.native_lang,
            target_lang: req.target_lang,
            level: req.level,
            age: req.age,
            ..ProfilePatch::default()
        };
        let profile = merge(&Profile::default(), seed)?.value;

        let password_hash = credentials::hash_password(&req.password)?;
        let account = self
            .accounts
            .create_account(NewAccount {
                email,
                password_hash: Some(password_hash),
                external_id: None,
                role: UserRole::User,
                profile,
            })
            .await?;

        let tokens = self.tokens.issue_pair(account.id, account.role)?;
        tracing::info!(user_id = %account.id, "account created");
        Ok(SignupOutcome { account, tokens })
    }

    /// Unknown emails and wrong passwords are indistinguishable to the caller.
    pub async fn login(&self, email: &str, password: &str) -> AppResult<LoginOutcome> {
        let email = email.trim().to_lowercase();
        let account = self.accounts.find_by_email(&email).await?;

        let verified = match &account {
            Some(Account { password_hash: Some(hash), .. }) => credentials::verify_password(hash, password),
            _ => {
                credentials::verify_dummy(password);
                false
            }
        };

        let account = match account {
            Some(account) if verified => account,
            _ => {
                count_login("failure");
                tracing::debug!("login rejected");
                return Err(AppError::new(ErrorCode::InvalidCredentials, BAD_LOGIN));
            }
        };

        let tokens = self.tokens.issue_pair(account.id, account.role)?;
        count_login("success");
        tracing::info!(user_id = %account.id, "user logged in");
        Ok(LoginOutcome { account_id: account.id, role: account.role, tokens })
    }

    /// Rotates: the presented refresh token is claimed in the revocation cache before the
    /// new pair is returned, so a token can be exchanged at most once.
    pub async fn refresh(&self, refresh_token: &str) -> AppResult<LoginOutcome> {
        let claims = self.tokens.verify(refresh_token, TokenType::Refresh)?;

        let account = self
            .accounts
            .get_account(claims.sub)
            .await?
            .ok_or_else(|| AppError::unauthorized(BAD_TOKEN))?;

        if !self.revocations.claim_token(refresh_token, &claims).await? {
            tracing::warn!(user_id = %claims.sub, "revoked refresh token presented");
            return Err(AppError::unauthorized(BAD_TOKEN));
        }

        let tokens = self.tokens.issue_pair(account.id, account.role)?;
        tracing::info!(user_id = %account.id, "session refreshed");
        Ok(LoginOutcome { account_id: account.id, role: account.role, tokens })
    }

    /// Revokes whichever of the tokens verify. Never fails.
    pub async fn logout(&self, access_token: Option<&str>, refresh_token: Option<&str>) {
        let presented = [(access_token, TokenType::Access), (refresh_token, TokenType::Refresh)];
        for (token, typ) in presented {
            let Some(token) = token else { continue };
            let Ok(claims) = self.tokens.verify(token, typ) else { continue };
            match self.revocations.revoke_token(token, &claims).await {
                Ok(()) => tracing::info!(user_id = %claims.sub, token_type = %typ, "token revoked"),
                Err(e) => tracing::warn!(error = %e, token_type = %typ, "could not revoke token on logout"),
            }
        }
    }

    pub async fn change_password(&self, account_id: Uuid, old_password: &str, new_password: &str) -> AppResult<()> {
        let account = self.load_account(account_id).await?;
        let verified = match account.password_hash.as_deref() {
            Some(hash) => credentials::verify_password(hash, old_password),
            None => false,
        };
        if !verified {
            return Err(AppError::new(ErrorCode::InvalidCredentials, "current password is incorrect"));
        }

        credentials::validate_strength(new_password)?;
        let hash = credentials::hash_password(new_password)?;
        self.accounts.set_password_hash(account_id, &hash).await?;
        tracing::info!(user_id = %account_id, "password changed");
        Ok(())
    }

    pub async fn request_password_reset(&self, email: &str) -> AppResult<Option<String>> {
        self.resets.request_reset(email).await
    }

    /// Checks the new password before the token is spent, so a typo does not burn it.
    pub async fn confirm_password_reset(&self, token: &str, new_password: &str, repeat_password: &str) -> AppResult<()> {
        if new_password != repeat_password {
            return Err(normalize::field_error("repeat_password", "passwords do not match"));
        }
        self.resets.reset_password(token, new_password).await?;
        Ok(())
    }

    pub async fn federated_login(&self, code: &str) -> AppResult<FederatedOutcome> {
        let identity = self.federation.exchange_code(code).await?;
        let (account, is_new_user) = self.federation.link_or_create(identity).await?;

        let tokens = self.tokens.issue_pair(account.id, account.role)?;
        count_login("federated");
        tracing::info!(user_id = %account.id, is_new = is_new_user, "federated login");
        Ok(FederatedOutcome { account_id: account.id, role: account.role, tokens, is_new_user })
    }

    // --- Resources ---

    async fn load_account(&self, account_id: Uuid) -> AppResult<Account> {
        self.accounts
            .get_account(account_id)
            .await?
            .ok_or_else(|| AppError::new(ErrorCode::ProfileNotFound, "account not found"))
    }

    pub async fn get_profile(&self, account_id: Uuid) -> AppResult<Account> {
        self.load_account(account_id).await
    }

    pub async fn patch_profile(&self, account_id: Uuid, patch: ProfilePatch) -> AppResult<Account> {
        let mut account = self.load_account(account_id).await?;
        let merged = merge(&account.profile, patch)?;
        if merged.is_noop() {
            return Ok(account);
        }

        account.version = self.accounts.save_profile(account_id, &merged.value, account.version).await?;
        account.profile = merged.value;
        tracing::debug!(user_id = %account_id, changed = ?merged.changed, "profile updated");
        Ok(account)
    }

    pub async fn get_settings(&self, account_id: Uuid) -> AppResult<Versioned<UserSettings>> {
        self.resources.get_settings(account_id).await
    }

    pub async fn patch_settings(&self, account_id: Uuid, patch: SettingsPatch) -> AppResult<Versioned<UserSettings>> {
        let current = self.resources.get_settings(account_id).await?;
        let merged = merge(&current.value, patch)?;
        if merged.is_noop() {
            return Ok(current);
        }

        let version = self.resources.save_settings(account_id, &merged.value, current.version).await?;
        tracing::debug!(user_id = %account_id, changed = ?merged.changed, "settings updated");
        Ok(Versioned { value: merged.value, version, updated_at: Some(chrono::Utc::now()) })
    }

    pub async fn get_match_prefs(&self, account_id: Uuid) -> AppResult<Versioned<MatchPreferences>> {
        self.resources.get_match_prefs(account_id).await
    }

    pub async fn patch_match_prefs(
        &self,
        account_id: Uuid,
        patch: MatchPrefsPatch,
    ) -> AppResult<Versioned<MatchPreferences>> {
        let current = self.resources.get_match_prefs(account_id).await?;
        let merged = merge(&current.value, patch)?;
        if merged.is_noop() {
            return Ok(current);
        }

        let version = self.resources.save_match_prefs(account_id, &merged.value, current.version).await?;
        tracing::debug!(user_id = %account_id, changed = ?merged.changed, "match preferences updated");
        Ok(Versioned { value: merged.value, version, updated_at: Some(chrono::Utc::now()) })
    }

    pub async fn get_interests(&self, account_id: Uuid) -> AppResult<Vec<i32>> {
        self.resources.get_interests(account_id).await
    }

    pub async fn replace_interests(&self, account_id: Uuid, req: InterestsReplace) -> AppResult<Vec<i32>> {
        let current = self.resources.get_interests(account_id).await?;
        let merged = merge(&current, req)?;
        if !merged.is_noop() {
            self.resources.replace_interests(account_id, &merged.value).await?;
            tracing::debug!(user_id = %account_id, count = merged.value.len(), "interests replaced");
        }
        Ok(merged.value)
    }

    // --- Health ---

    pub async fn dependency_checks(&self) -> Vec<HealthCheck> {
        let store = match self.accounts.ping().await {
            Ok(()) => HealthCheck::healthy("store"),
            Err(e) => HealthCheck::unhealthy("store", e.to_string()),
        };
        let cache = match self.cache.ping().await {
            Ok(()) => HealthCheck::healthy("cache"),
            Err(e) => HealthCheck::unhealthy("cache", e.to_string()),
        };
        vec![store, cache]
    }
}

#[axum::async_trait]
impl Authenticator for IdentityService {
    async fn authenticate(&self, token: &str) -> AppResult<AuthUser> {
        let claims = self.tokens.verify(token, TokenType::Access)?;
        if self.revocations.is_blacklisted(RevocationPurpose::Session, token).await {
            tracing::debug!(user_id = %claims.sub, "revoked access token presented");
            return Err(AppError::unauthorized(BAD_TOKEN));
        }
        Ok(AuthUser {
            id: claims.sub,
            role: claims.role.unwrap_or_default(),
            token: token.to_string(),
        })
    }
}
