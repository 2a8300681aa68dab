use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};
use tracing::warn;
use uuid::Uuid;

use super::jwt::{JwtKeys, TokenError};
use crate::error::AppError;

/// Authenticated caller, taken from a verified token.
///
/// Accepts `Authorization: Bearer <token>` as well as a bare token.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser(pub Uuid);

/// Strip an optional `Bearer ` prefix; `None` if nothing is left.
pub(crate) fn token_from_header(value: &str) -> Option<&str> {
    let value = value.trim();
    let token = value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))
        .unwrap_or(value)
        .trim();
    (!token.is_empty()).then_some(token)
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .ok_or_else(|| AppError::Unauthenticated("no authorization header".into()))?;

        let token = header
            .to_str()
            .ok()
            .and_then(token_from_header)
            .ok_or_else(|| AppError::Unauthenticated("no token provided".into()))?;

        let keys = JwtKeys::from_ref(state);
        match keys.verify(token) {
            Ok(claims) => Ok(AuthUser(claims.sub)),
            Err(e @ TokenError::MissingSecret) => Err(e.into()),
            Err(e) => {
                warn!(reason = %e, "rejected token");
                Err(e.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::AppState;
    use axum::http::{Request, StatusCode};

    async fn extract(state: &AppState, auth: Option<&str>) -> Result<AuthUser, AppError> {
        let mut builder = Request::builder().uri("/");
        if let Some(value) = auth {
            builder = builder.header(AUTHORIZATION, value);
        }
        let (mut parts, _) = builder.body(()).unwrap().into_parts();
        AuthUser::from_request_parts(&mut parts, state).await
    }

    #[test]
    fn header_forms() {
        assert_eq!(token_from_header("Bearer abc"), Some("abc"));
        assert_eq!(token_from_header("bearer abc"), Some("abc"));
        assert_eq!(token_from_header("abc"), Some("abc"));
        assert_eq!(token_from_header("Bearer "), None);
        assert_eq!(token_from_header("   "), None);
    }

    #[tokio::test]
    async fn accepts_bearer_and_bare_tokens() {
        let state = AppState::fake();
        let user_id = Uuid::new_v4();
        let token = JwtKeys::from_ref(&state).issue(user_id).unwrap();

        let AuthUser(id) = extract(&state, Some(&format!("Bearer {token}"))).await.unwrap();
        assert_eq!(id, user_id);
        let AuthUser(id) = extract(&state, Some(&token)).await.unwrap();
        assert_eq!(id, user_id);
    }

    #[tokio::test]
    async fn missing_header_is_unauthenticated() {
        let state = AppState::fake();
        let err = extract(&state, None).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(err.to_string(), "no authorization header");
    }

    #[tokio::test]
    async fn bad_signature_is_invalid_token() {
        let state = AppState::fake();
        let err = extract(&state, Some("Bearer eyJhbGciOiJIUzI1NiJ9.e30.bad"))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(err.to_string(), "invalid token");
    }

    #[tokio::test]
    async fn expired_token_is_reported_as_expired() {
        let state = AppState::fake();
        let keys = JwtKeys::from_ref(&state);
        let issued = time::OffsetDateTime::now_utc() - time::Duration::days(30);
        let token = keys.issue_at(Uuid::new_v4(), issued).unwrap();
        let err = extract(&state, Some(&token)).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(err.to_string(), "token expired");
    }

    #[tokio::test]
    async fn missing_secret_is_a_configuration_fault() {
        let mut state = AppState::fake();
        let mut config = (*state.config).clone();
        config.jwt.secret = None;
        state.config = std::sync::Arc::new(config);

        let err = extract(&state, Some("Bearer whatever")).await.unwrap_err();
        assert!(matches!(err, AppError::Configuration));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
