use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use tandem_shared::errors::{AppError, AppResult, ErrorCode};
use tandem_shared::types::auth::UserRole;

use super::normalize;
use crate::models::{Account, NewAccount, Profile};
use crate::store::AccountStore;

/// Identity asserted by an external provider after a code exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalIdentity {
    pub external_id: String,
    pub email: String,
    pub display_name: Option<String>,
}

#[axum::async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Any provider-side failure maps to `OAuthError`.
    async fn exchange_code(&self, code: &str) -> AppResult<ExternalIdentity>;
}

fn oauth_error(message: impl Into<String>) -> AppError {
    AppError::new(ErrorCode::OAuthError, message)
}

#[derive(Debug, Deserialize)]
struct GoogleTokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct GoogleUserInfo {
    #[serde(alias = "id")]
    sub: String,
    email: String,
    name: Option<String>,
}

pub struct GoogleProvider {
    client: reqwest::Client,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    token_url: String,
    userinfo_url: String,
}

impl GoogleProvider {
    pub fn new(
        client_id: &str,
        client_secret: &str,
        redirect_uri: &str,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: reqwest::Client::builder().timeout(timeout).build()?,
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            redirect_uri: redirect_uri.to_string(),
            token_url: "https://oauth2.googleapis.com/token".to_string(),
            userinfo_url: "https://www.googleapis.com/oauth2/v3/userinfo".to_string(),
        })
    }
}

#[axum::async_trait]
impl IdentityProvider for GoogleProvider {
    async fn exchange_code(&self, code: &str) -> AppResult<ExternalIdentity> {
        if self.client_id.is_empty() {
            return Err(oauth_error("google login is not configured"));
        }

        let token_response = self
            .client
            .post(&self.token_url)
            .form(&[
                ("code", code),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await
            .map_err(|e| oauth_error(format!("google token exchange failed: {e}")))?;

        if !token_response.status().is_success() {
            let status = token_response.status();
            tracing::warn!(status = %status, "google token endpoint rejected the code");
            return Err(oauth_error(format!("google token error ({status})")));
        }

        let google_token: GoogleTokenResponse = token_response
            .json()
            .await
            .map_err(|e| oauth_error(format!("invalid token response: {e}")))?;

        let userinfo_response = self
            .client
            .get(&self.userinfo_url)
            .bearer_auth(&google_token.access_token)
            .send()
            .await
            .map_err(|e| oauth_error(format!("google userinfo failed: {e}")))?;

        if !userinfo_response.status().is_success() {
            return Err(oauth_error(format!("google userinfo error ({})", userinfo_response.status())));
        }

        let user: GoogleUserInfo = userinfo_response
            .json()
            .await
            .map_err(|e| oauth_error(format!("invalid userinfo response: {e}")))?;

        Ok(ExternalIdentity {
            external_id: user.sub,
            email: user.email,
            display_name: user.name,
        })
    }
}

/// Reconciles external identities with local accounts.
#[derive(Clone)]
pub struct FederatedLinker {
    provider: Arc<dyn IdentityProvider>,
    accounts: Arc<dyn AccountStore>,
}

impl FederatedLinker {
    pub fn new(provider: Arc<dyn IdentityProvider>, accounts: Arc<dyn AccountStore>) -> Self {
        Self { provider, accounts }
    }

    pub async fn exchange_code(&self, code: &str) -> AppResult<ExternalIdentity> {
        let code = code.trim();
        if code.is_empty() {
            return Err(oauth_error("authorization code is required"));
        }
        self.provider.exchange_code(code).await
    }

    /// Returns the matched or created account and whether it is new.
    ///
    /// Matching order: external id, then email. An email match adopts the external id
    /// unless it is already bound to a different one, in which case the existing
    /// binding wins. A uniqueness clash on create means a concurrent login got there
    /// first, so the lookup runs once more.
    pub async fn link_or_create(&self, identity: ExternalIdentity) -> AppResult<(Account, bool)> {
        if let Some(account) = self.accounts.find_by_external_id(&identity.external_id).await? {
            return Ok((account, false));
        }

        let email = normalize::email(&identity.email)
            .map_err(|_| oauth_error("provider returned an unusable email"))?;

        if let Some(account) = self.match_email(&email, &identity.external_id).await? {
            return Ok((account, false));
        }

        let display_name = identity
            .display_name
            .as_deref()
            .and_then(|name| normalize::display_name(name).ok())
            .unwrap_or_else(|| fallback_display_name(&email));

        let created = self
            .accounts
            .create_account(NewAccount {
                email: email.clone(),
                password_hash: None,
                external_id: Some(identity.external_id.clone()),
                role: UserRole::User,
                profile: Profile { display_name, ..Profile::default() },
            })
            .await;

        match created {
            Ok(account) => {
                tracing::info!(user_id = %account.id, "account created from external identity");
                Ok((account, true))
            }
            Err(e) if matches!(e.code(), ErrorCode::EmailAlreadyExists | ErrorCode::ExternalIdTaken) => {
                tracing::info!(error = %e, "account created concurrently, matching again");
                if let Some(account) = self.accounts.find_by_external_id(&identity.external_id).await? {
                    return Ok((account, false));
                }
                match self.match_email(&email, &identity.external_id).await? {
                    Some(account) => Ok((account, false)),
                    None => Err(e),
                }
            }
            Err(e) => Err(e),
        }
    }

    async fn match_email(&self, email: &str, external_id: &str) -> AppResult<Option<Account>> {
        let Some(mut account) = self.accounts.find_by_email(email).await? else {
            return Ok(None);
        };
        match account.external_id.as_deref() {
            None => {
                self.accounts.bind_external_id(account.id, external_id).await?;
                account.external_id = Some(external_id.to_string());
                tracing::info!(user_id = %account.id, "external identity linked to existing account");
            }
            Some(bound) if bound != external_id => {
                tracing::warn!(user_id = %account.id, "email matched an account bound to another external identity");
            }
            Some(_) => {}
        }
        Ok(Some(account))
    }
}

/// Local part of the address, cut to the display name limit.
fn fallback_display_name(email: &str) -> String {
    let local = email.split('@').next().unwrap_or_default();
    let name: String = local.chars().take(normalize::DISPLAY_NAME_MAX).collect();
    if name.is_empty() {
        "user".to_string()
    } else {
        name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    struct StaticProvider(AppResult<ExternalIdentity>);

    #[axum::async_trait]
    impl IdentityProvider for StaticProvider {
        async fn exchange_code(&self, _code: &str) -> AppResult<ExternalIdentity> {
            match &self.0 {
                Ok(identity) => Ok(identity.clone()),
                Err(_) => Err(oauth_error("denied")),
            }
        }
    }

    fn identity(external_id: &str, email: &str, name: Option<&str>) -> ExternalIdentity {
        ExternalIdentity {
            external_id: external_id.into(),
            email: email.into(),
            display_name: name.map(str::to_string),
        }
    }

    fn linker(store: Arc<MemoryStore>) -> FederatedLinker {
        let provider = StaticProvider(Ok(identity("g-1", "ana@test.dev", None)));
        FederatedLinker::new(Arc::new(provider), store)
    }

    async fn seed(store: &MemoryStore, email: &str, role: UserRole, external_id: Option<&str>) -> Account {
        store
            .create_account(NewAccount {
                email: email.into(),
                password_hash: Some("hash".into()),
                external_id: external_id.map(str::to_string),
                role,
                profile: Profile { display_name: "Seed".into(), ..Profile::default() },
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn creates_passwordless_account_with_fallback_name() {
        let store = Arc::new(MemoryStore::new());
        let (account, is_new) = linker(store)
            .link_or_create(identity("g-9", "New.User@Test.dev", Some("   ")))
            .await
            .unwrap();
        assert!(is_new);
        assert_eq!(account.email, "new.user@test.dev");
        assert_eq!(account.profile.display_name, "new.user");
        assert!(!account.has_password());
    }

    #[tokio::test]
    async fn existing_email_keeps_id_and_role() {
        let store = Arc::new(MemoryStore::new());
        let existing = seed(&store, "ana@test.dev", UserRole::Admin, None).await;

        let (account, is_new) = linker(store.clone())
            .link_or_create(identity("g-1", "ANA@test.dev", Some("Ana G")))
            .await
            .unwrap();
        assert!(!is_new);
        assert_eq!(account.id, existing.id);
        assert_eq!(account.role, UserRole::Admin);

        let again = linker(store).link_or_create(identity("g-1", "other@test.dev", None)).await.unwrap();
        assert_eq!(again.0.id, existing.id);
    }

    #[tokio::test]
    async fn different_binding_is_kept() {
        let store = Arc::new(MemoryStore::new());
        let existing = seed(&store, "ana@test.dev", UserRole::User, Some("g-old")).await;

        let (account, is_new) = linker(store.clone())
            .link_or_create(identity("g-new", "ana@test.dev", None))
            .await
            .unwrap();
        assert!(!is_new);
        assert_eq!(account.external_id.as_deref(), Some("g-old"));
        assert!(store.find_by_external_id("g-new").await.unwrap().is_none());
        assert_eq!(account.id, existing.id);
    }

    #[tokio::test]
    async fn provider_failure_and_blank_code_are_oauth_errors() {
        let store = Arc::new(MemoryStore::new());
        let failing = FederatedLinker::new(Arc::new(StaticProvider(Err(oauth_error("x")))), store.clone());
        assert_eq!(failing.exchange_code("code").await.unwrap_err().code(), ErrorCode::OAuthError);
        assert_eq!(linker(store).exchange_code("  ").await.unwrap_err().code(), ErrorCode::OAuthError);
    }

    #[test]
    fn fallback_name_uses_local_part() {
        assert_eq!(fallback_display_name("bob@x.io"), "bob");
        assert_eq!(fallback_display_name("@x.io"), "user");
    }
}
