use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rocket::http::{CookieJar, Status};
use rocket::outcome::Outcome::{Failure, Success};
use rocket::request::{self, FromRequest, Request};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::util::date_time_as_unix_seconds;
use crate::config::Config;
use crate::resp::problem::Problem;

pub static AUTH_COOKIE_NAME: &str = "session_token";

/// Claims of a session token issued by the auth service.
///
/// The token carries identity only. Deliberately no role claim: roles are
/// derived from the account collections on every request, so revoking a
/// staff record takes effect immediately instead of on token expiry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionToken {
    #[serde(with = "date_time_as_unix_seconds")]
    iat: DateTime<Utc>,
    #[serde(with = "date_time_as_unix_seconds")]
    exp: DateTime<Utc>,
    /// Auth account id of the caller.
    #[serde(rename = "sub")]
    pub user: Uuid,
}

impl SessionToken {
    pub fn new(user: Uuid) -> SessionToken {
        let now = Utc::now();
        SessionToken {
            iat: now,
            exp: now + Duration::weeks(1),
            user,
        }
    }

    /// Signs the claims the way the auth service does. Production tokens
    /// come from the auth service; this is for tests and local tooling.
    pub fn encode_jwt(
        &self,
        secret: impl AsRef<[u8]>,
    ) -> Result<String, jsonwebtoken::errors::Error> {
        let header = Header::new(Algorithm::HS256);
        let key = EncodingKey::from_secret(secret.as_ref());

        encode(&header, &self, &key)
    }
}

pub fn auth_problem(detail: impl ToString) -> Problem {
    Problem::new_untyped(Status::Unauthorized, "Unable to authorize user.")
        .detail(detail)
}

fn bearer_token<'r>(request: &'r Request<'_>) -> Option<&'r str> {
    request
        .headers()
        .get_one("Authorization")
        .and_then(|value| value.strip_prefix("Bearer "))
}

/// The mobile app sends the token as a bearer header; the web console keeps
/// it in a cookie.
fn extract_token(request: &Request<'_>, cookies: &CookieJar) -> Option<String> {
    match bearer_token(request) {
        Some(token) => Some(token.to_owned()),
        None => cookies
            .get(AUTH_COOKIE_NAME)
            .map(|cookie| cookie.value().to_owned()),
    }
}

pub fn decode_claims(token: &str, secret: impl AsRef<[u8]>) -> Result<SessionToken, Problem> {
    decode::<SessionToken>(
        token,
        &DecodingKey::from_secret(secret.as_ref()),
        &Validation::new(Algorithm::HS256),
    )
    .map(|data| data.claims)
    .map_err(Problem::from)
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for SessionToken {
    type Error = Problem;

    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        let config: &Config = match req.rocket().state() {
            Some(config) => config,
            None => {
                return Failure((
                    Status::InternalServerError,
                    Problem::new_untyped(Status::InternalServerError, "Server misconfigured."),
                ));
            }
        };

        tracing::trace!("extracting session token from request");
        let token = match extract_token(req, req.cookies()) {
            Some(token) => token,
            None => {
                return Failure((
                    Status::Unauthorized,
                    auth_problem("No session token provided."),
                ));
            }
        };

        match decode_claims(&token, &config.session_jwt_secret) {
            Ok(claims) => {
                tracing::debug!("decoded session token for account: {}", claims.user);
                Success(claims)
            }
            Err(e) => {
                tracing::debug!("unable to decode session token");
                Failure((Status::Unauthorized, e))
            }
        }
    }
}

pub mod doc {
    use utoipa::openapi::security::*;

    #[derive(Clone, Copy)]
    pub struct JWTAuth;

    impl From<JWTAuth> for SecurityScheme {
        fn from(_: JWTAuth) -> SecurityScheme {
            let mut http = Http::new(HttpAuthScheme::Bearer);
            http.bearer_format = Some("JWT".to_string());
            http.scheme = HttpAuthScheme::Bearer;
            SecurityScheme::Http(http)
        }
    }

    impl utoipa::Modify for JWTAuth {
        fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
            let c = openapi.components.as_mut().unwrap();
            c.add_security_scheme("jwt", *self)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::SubsecRound;

    static TEST_SECRET: &[u8] = b"test-only-session-secret";

    #[test]
    fn session_tokens_roundtrip() {
        let mut now = Utc::now();
        now = now.round_subsecs(0);

        let user = Uuid::new_v4();
        let token = SessionToken {
            iat: now,
            exp: now + Duration::weeks(1),
            user,
        };

        let encoded = token
            .encode_jwt(TEST_SECRET)
            .expect("encoding should work for example");

        let decoded = decode_claims(&encoded, TEST_SECRET).expect("token should decode");

        assert_eq!(now, decoded.iat);
        assert_eq!(now + Duration::weeks(1), decoded.exp);
        assert_eq!(user, decoded.user);
    }

    #[test]
    fn tampered_tokens_are_rejected() {
        let token = SessionToken::new(Uuid::new_v4());
        let encoded = token.encode_jwt(TEST_SECRET).unwrap();

        assert!(decode_claims(&encoded, b"some-other-secret").is_err());
    }
}
