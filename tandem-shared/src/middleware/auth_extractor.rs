use std::sync::Arc;

use axum::extract::{FromRef, FromRequestParts};
use axum::http::request::Parts;
use axum::http::HeaderMap;

use crate::errors::{AppError, ErrorCode};
use crate::types::auth::AuthUser;

/// Turns a raw bearer token into an authenticated user.
///
/// The signing secret and the revocation list belong to the service that issues
/// tokens, so extractors reach them through this trait instead of the environment.
#[axum::async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(&self, token: &str) -> Result<AuthUser, AppError>;
}

pub type SharedAuthenticator = Arc<dyn Authenticator>;

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    SharedAuthenticator: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = extract_bearer_token(&parts.headers)?;
        let authenticator = SharedAuthenticator::from_ref(state);
        authenticator.authenticate(&token).await
    }
}

/// Pulls the token out of an `Authorization: Bearer <token>` header.
pub fn extract_bearer_token(headers: &HeaderMap) -> Result<String, AppError> {
    let auth_header = headers
        .get("Authorization")
        .ok_or_else(|| AppError::new(ErrorCode::Unauthorized, "missing authorization header"))?
        .to_str()
        .map_err(|_| AppError::new(ErrorCode::Unauthorized, "invalid authorization header"))?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or_else(|| AppError::new(ErrorCode::Unauthorized, "authorization header must use Bearer scheme"))?
        .trim();

    if token.is_empty() {
        return Err(AppError::new(ErrorCode::Unauthorized, "invalid bearer token"));
    }

    Ok(token.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderValue, Request};
    use uuid::Uuid;

    use crate::types::auth::UserRole;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("Authorization", HeaderValue::from_str(value).unwrap());
        headers
    }

    struct FixedAuthenticator {
        role: UserRole,
    }

    #[axum::async_trait]
    impl Authenticator for FixedAuthenticator {
        async fn authenticate(&self, token: &str) -> Result<AuthUser, AppError> {
            if token != "good" {
                return Err(AppError::unauthorized("invalid or expired token"));
            }
            Ok(AuthUser { id: Uuid::nil(), role: self.role, token: token.to_string() })
        }
    }

    #[derive(Clone)]
    struct TestState(SharedAuthenticator);

    impl FromRef<TestState> for SharedAuthenticator {
        fn from_ref(state: &TestState) -> Self {
            state.0.clone()
        }
    }

    fn parts(auth: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/");
        if let Some(value) = auth {
            builder = builder.header("Authorization", value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn extracts_token() {
        assert_eq!(extract_bearer_token(&headers("Bearer abc.def")).unwrap(), "abc.def");
    }

    #[test]
    fn rejects_other_schemes_and_blank_tokens() {
        assert!(extract_bearer_token(&headers("Basic abc")).is_err());
        assert!(extract_bearer_token(&headers("Bearer    ")).is_err());
        assert!(extract_bearer_token(&HeaderMap::new()).is_err());
    }

    #[tokio::test]
    async fn extractor_delegates_to_authenticator() {
        let state = TestState(Arc::new(FixedAuthenticator { role: UserRole::User }));

        let user = AuthUser::from_request_parts(&mut parts(Some("Bearer good")), &state).await.unwrap();
        assert_eq!(user.token, "good");

        let err = AuthUser::from_request_parts(&mut parts(Some("Bearer bad")), &state).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::Unauthorized);

        let err = AuthUser::from_request_parts(&mut parts(None), &state).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::Unauthorized);
    }
}
