use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use uuid::Uuid;

use tandem_shared::errors::AppError;
use tandem_shared::types::auth::{Claims, TokenPair, TokenType, UserRole};

const INVALID_TOKEN: &str = "invalid or expired token";

/// Issues and verifies HS256 session tokens.
#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    access_ttl: i64,
    refresh_ttl: i64,
}

impl TokenService {
    pub fn new(secret: &str, access_ttl: i64, refresh_ttl: i64) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_exp = true;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            access_ttl,
            refresh_ttl,
        }
    }

    pub fn access_ttl(&self) -> i64 {
        self.access_ttl
    }

    pub fn issue_access(&self, account_id: Uuid, role: UserRole) -> Result<String, AppError> {
        let claims = Claims::access(account_id, role, now(), self.access_ttl);
        self.sign(&claims)
    }

    /// Returns the token and its `jti`.
    pub fn issue_refresh(&self, account_id: Uuid) -> Result<(String, Uuid), AppError> {
        let token_id = Uuid::new_v4();
        let claims = Claims::refresh(account_id, token_id, now(), self.refresh_ttl);
        Ok((self.sign(&claims)?, token_id))
    }

    pub fn issue_pair(&self, account_id: Uuid, role: UserRole) -> Result<TokenPair, AppError> {
        let access_token = self.issue_access(account_id, role)?;
        let (refresh_token, _) = self.issue_refresh(account_id)?;
        Ok(TokenPair::new(access_token, refresh_token, self.access_ttl))
    }

    /// Every failure maps to the same error; the cause only reaches the debug log.
    pub fn verify(&self, token: &str, expected: TokenType) -> Result<Claims, AppError> {
        let claims = decode::<Claims>(token, &self.decoding, &self.validation)
            .map_err(|e| {
                tracing::debug!(error = %e, expected = %expected, "token rejected");
                AppError::unauthorized(INVALID_TOKEN)
            })?
            .claims;

        let shape_ok = match expected {
            TokenType::Access => claims.role.is_some() && claims.jti.is_none(),
            TokenType::Refresh => claims.jti.is_some(),
        };

        if claims.typ != expected || !shape_ok {
            tracing::debug!(expected = %expected, actual = %claims.typ, "token type mismatch");
            return Err(AppError::unauthorized(INVALID_TOKEN));
        }

        Ok(claims)
    }

    fn sign(&self, claims: &Claims) -> Result<String, AppError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(|e| AppError::internal(format!("JWT encoding failed: {e}")))
    }
}

pub(crate) fn now() -> i64 {
    chrono::Utc::now().timestamp()
}
