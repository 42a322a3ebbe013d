use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    User,
    Admin,
}

impl Default for UserRole {
    fn default() -> Self {
        UserRole::User
    }
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::User => "user",
            UserRole::Admin => "admin",
        }
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" => Ok(UserRole::User),
            "admin" => Ok(UserRole::Admin),
            _ => Err(format!("unknown role: {s}")),
        }
    }
}

/// Which endpoint family a session token is good for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

impl std::fmt::Display for TokenType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenType::Access => write!(f, "access"),
            TokenType::Refresh => write!(f, "refresh"),
        }
    }
}

/// Session token claims.
///
/// Access tokens carry `role` and no `jti`; refresh tokens carry a `jti` and no role
/// (the role is re-read from the account when a refresh token is redeemed).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<UserRole>,
    pub typ: TokenType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<Uuid>,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn access(user_id: Uuid, role: UserRole, issued_at: i64, ttl_secs: i64) -> Self {
        Self {
            sub: user_id,
            role: Some(role),
            typ: TokenType::Access,
            jti: None,
            iat: issued_at,
            exp: issued_at + ttl_secs,
        }
    }

    pub fn refresh(user_id: Uuid, token_id: Uuid, issued_at: i64, ttl_secs: i64) -> Self {
        Self {
            sub: user_id,
            role: None,
            typ: TokenType::Refresh,
            jti: Some(token_id),
            iat: issued_at,
            exp: issued_at + ttl_secs,
        }
    }

    /// Seconds of validity left at `now`, zero once expired.
    pub fn remaining_secs(&self, now: i64) -> u64 {
        (self.exp - now).max(0) as u64
    }
}

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub role: UserRole,
    /// The raw bearer token, kept so logout can revoke it.
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

impl TokenPair {
    pub fn new(access_token: String, refresh_token: String, expires_in: i64) -> Self {
        Self {
            access_token,
            refresh_token,
            token_type: "Bearer".to_string(),
            expires_in,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_parses_case_insensitively() {
        assert_eq!("Admin".parse::<UserRole>().unwrap(), UserRole::Admin);
        assert_eq!("user".parse::<UserRole>().unwrap(), UserRole::User);
        assert!("moderator".parse::<UserRole>().is_err());
    }

    #[test]
    fn refresh_claims_omit_role() {
        let claims = Claims::refresh(Uuid::new_v4(), Uuid::new_v4(), 1_000, 60);
        let json = serde_json::to_value(&claims).unwrap();
        assert!(json.get("role").is_none());
        assert_eq!(json["typ"], "refresh");
        assert_eq!(claims.exp, 1_060);
    }

    #[test]
    fn remaining_secs_saturates_at_zero() {
        let claims = Claims::access(Uuid::new_v4(), UserRole::User, 1_000, 60);
        assert_eq!(claims.remaining_secs(1_010), 50);
        assert_eq!(claims.remaining_secs(5_000), 0);
    }
}
