use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Json, Response},
};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::AppState;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
    #[serde(default)]
    pub username: Option<String>,
}

/// The verified caller, inserted into request extensions by
/// [`require_bearer_auth`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity {
    pub user_id: Uuid,
    pub username: String,
}

impl TryFrom<Claims> for CallerIdentity {
    type Error = Error;

    fn try_from(claims: Claims) -> Result<Self> {
        let user_id = Uuid::parse_str(&claims.sub)
            .map_err(|_| Error::Invalid("token subject is not a user id".to_string()))?;
        Ok(Self {
            user_id,
            username: claims.username.unwrap_or_else(|| claims.sub.clone()),
        })
    }
}

/// Signs an HS256 token for `user_id`. Issuing tokens is out of scope for
/// the service itself; this exists for local runs and tests.
pub fn issue_token(secret: &str, user_id: Uuid, username: &str, ttl_secs: i64) -> Result<String> {
    let exp = (chrono::Utc::now().timestamp() + ttl_secs).max(0) as usize;
    let claims = Claims {
        sub: user_id.to_string(),
        exp,
        username: Some(username.to_string()),
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| Error::Internal(format!("failed to sign token: {}", e)))
}

pub fn verify_token(secret: &str, token: &str) -> Result<CallerIdentity> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|_| Error::Invalid("invalid token".to_string()))?;
    CallerIdentity::try_from(data.claims)
}

fn unauthorized(code: &str) -> Response {
    (StatusCode::UNAUTHORIZED, Json(json!({ "error": code }))).into_response()
}

/// Browsers cannot set headers on a WebSocket upgrade, so the live channel
/// may pass the token as `?access_token=`. No other route accepts it.
fn query_token(req: &Request) -> Option<String> {
    if !req.uri().path().ends_with("/live") {
        return None;
    }
    req.uri().query().and_then(|q| {
        q.split('&')
            .filter_map(|pair| pair.split_once('='))
            .find(|(k, _)| *k == "access_token")
            .map(|(_, v)| v.to_string())
    })
}

pub async fn require_bearer_auth(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let token = match req.headers().get(axum::http::header::AUTHORIZATION) {
        Some(auth_header) => {
            let Ok(auth_str) = auth_header.to_str() else {
                return unauthorized("bad_authorization");
            };
            let Some(token) = auth_str.strip_prefix("Bearer ") else {
                return unauthorized("unsupported_scheme");
            };
            token.to_string()
        }
        None => match query_token(&req) {
            Some(token) => token,
            None => return unauthorized("missing_authorization"),
        },
    };

    match verify_token(&state.config.jwt_secret, &token) {
        Ok(identity) => {
            req.extensions_mut().insert(identity);
            next.run(req).await
        }
        Err(e) => {
            tracing::debug!(error = %e, "rejected bearer token");
            unauthorized("invalid_token")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_tokens_verify() {
        let user_id = Uuid::new_v4();
        let token = issue_token("secret", user_id, "alice", 60).unwrap();
        let identity = verify_token("secret", &token).unwrap();
        assert_eq!(identity.user_id, user_id);
        assert_eq!(identity.username, "alice");
    }

    #[test]
    fn wrong_secret_or_expired_token_is_rejected() {
        let token = issue_token("secret", Uuid::new_v4(), "alice", 60).unwrap();
        assert!(verify_token("other", &token).is_err());

        let expired = issue_token("secret", Uuid::new_v4(), "alice", -3600).unwrap();
        assert!(verify_token("secret", &expired).is_err());
    }

    #[test]
    fn query_token_is_only_read_on_the_live_channel() {
        let request = |uri: &str| {
            axum::http::Request::builder()
                .uri(uri)
                .body(axum::body::Body::empty())
                .unwrap()
        };
        let live = Uuid::new_v4();
        assert_eq!(
            query_token(&request(&format!("/api/quizzes/{}/live?access_token=abc", live))),
            Some("abc".to_string())
        );
        assert_eq!(query_token(&request("/api/quizzes?access_token=abc")), None);
        assert_eq!(
            query_token(&request(&format!("/api/quizzes/{}?access_token=abc", live))),
            None
        );
    }

    #[test]
    fn non_uuid_subject_is_rejected() {
        let claims = Claims {
            sub: "42".into(),
            exp: usize::MAX,
            username: None,
        };
        assert!(CallerIdentity::try_from(claims).is_err());
    }
}
