use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    async_trait,
    body::Body,
    extract::{FromRequestParts, State},
    http::{request::Parts, Request, StatusCode},
    middleware::Next,
    response::Response,
    Json,
};
use axum_extra::extract::{
    cookie::{Cookie, SameSite},
    CookieJar, WithRejection,
};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::error::ApiError;
use crate::config::AuthConfig;
use crate::db::{
    create_user, find_user_by_email, find_user_by_id, LoginRequest, RegisterRequest, StoreError,
    User, UserEnvelope, UserResponse,
};
use crate::validation::{
    normalize_email, validate_email, validate_password, validate_required, FieldErrors,
    MAX_NAME_LEN,
};
use crate::AppState;

/// Name of the session cookie
pub const SESSION_COOKIE: &str = "token";

/// Hash a password using Argon2
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2.hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// Verify a password against a hash
pub fn verify_password(password: &str, hash: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

/// Claims carried by a session token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// User id
    pub sub: String,
    pub email: String,
    pub iat: i64,
    pub exp: i64,
}

/// Signs and verifies session tokens (HS256). Stateless: a token is valid
/// until it expires, there is no server-side revocation.
pub struct SessionKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: chrono::Duration,
    cookie_max_age: time::Duration,
    cookie_secure: bool,
}

impl SessionKeys {
    pub fn new(config: &AuthConfig) -> Self {
        let secret = config.jwt_secret.as_bytes();
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
            ttl: chrono::Duration::hours(config.token_ttl_hours),
            cookie_max_age: time::Duration::hours(config.cookie_max_age_hours),
            cookie_secure: config.cookie_secure,
        }
    }

    /// Issue a token for the user, valid for the configured window
    pub fn issue(&self, user_id: &str, email: &str) -> Result<String, jsonwebtoken::errors::Error> {
        let now = chrono::Utc::now();
        let claims = SessionClaims {
            sub: user_id.to_string(),
            email: email.to_string(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };
        self.sign(&claims)
    }

    pub fn sign(&self, claims: &SessionClaims) -> Result<String, jsonwebtoken::errors::Error> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
    }

    /// Check signature and expiry
    pub fn verify(&self, token: &str) -> Result<SessionClaims, jsonwebtoken::errors::Error> {
        decode::<SessionClaims>(token, &self.decoding, &self.validation).map(|data| data.claims)
    }

    /// HttpOnly cookie carrying the token
    pub fn session_cookie(&self, token: String) -> Cookie<'static> {
        let same_site = if self.cookie_secure {
            SameSite::None
        } else {
            SameSite::Lax
        };
        Cookie::build((SESSION_COOKIE, token))
            .path("/")
            .http_only(true)
            .secure(self.cookie_secure)
            .same_site(same_site)
            .max_age(self.cookie_max_age)
            .build()
    }
}

/// Identity attached to a request by [`auth_middleware`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub id: String,
    pub email: String,
}

impl From<SessionClaims> for AuthUser {
    fn from(claims: SessionClaims) -> Self {
        Self {
            id: claims.sub,
            email: claims.email,
        }
    }
}

/// Gate for protected routes: no cookie is `NO_TOKEN`, a bad or expired
/// token is `INVALID_TOKEN`. Handlers behind it never run unauthenticated.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let token = jar
        .get(SESSION_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| {
            tracing::debug!(path = %request.uri().path(), "No session cookie");
            ApiError::no_token()
        })?;

    let claims = state.sessions.verify(&token).map_err(|e| {
        tracing::debug!(error = %e, "Session token rejected");
        ApiError::invalid_token()
    })?;

    request.extensions_mut().insert(AuthUser::from(claims));
    Ok(next.run(request).await)
}

/// Extractor for the identity set by [`auth_middleware`]
#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or_else(ApiError::no_token)
    }
}

fn validate_register(name: &str, email: &str, password: &str) -> Result<(), ApiError> {
    let mut errors = FieldErrors::new();
    errors.check("name", validate_required(name, "Name", MAX_NAME_LEN));
    errors.check("email", validate_email(email));
    errors.check("password", validate_password(password));
    errors.finish()?;
    Ok(())
}

fn issue_cookie(state: &AppState, jar: CookieJar, user: &User) -> Result<CookieJar, ApiError> {
    let token = state.sessions.issue(&user.id, &user.email).map_err(|e| {
        tracing::error!(error = %e, "Failed to sign session token");
        ApiError::internal("Failed to create session")
    })?;
    Ok(jar.add(state.sessions.session_cookie(token)))
}

/// POST /api/auth/register
pub async fn register(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    WithRejection(Json(request), _): WithRejection<Json<RegisterRequest>, ApiError>,
) -> Result<(StatusCode, CookieJar, Json<UserEnvelope>), ApiError> {
    let name = request.name.trim().to_string();
    let email = normalize_email(&request.email);
    validate_register(&name, &email, &request.password)?;

    let password_hash = hash_password(&request.password).map_err(|e| {
        tracing::error!(error = %e, "Failed to hash password");
        ApiError::internal("Failed to create user")
    })?;

    let user = create_user(&state.db, &name, &email, &password_hash)
        .await
        .map_err(|e| match e {
            StoreError::DuplicateEmail => {
                ApiError::duplicate_email("User already exists with this email")
            }
            other => other.into(),
        })?;

    tracing::info!(user_id = %user.id, "User registered");

    let jar = if state.config.auth.login_on_register {
        issue_cookie(&state, jar, &user)?
    } else {
        jar
    };

    Ok((
        StatusCode::CREATED,
        jar,
        Json(UserEnvelope {
            user: UserResponse::from(user),
        }),
    ))
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    WithRejection(Json(request), _): WithRejection<Json<LoginRequest>, ApiError>,
) -> Result<(CookieJar, Json<UserEnvelope>), ApiError> {
    let email = normalize_email(&request.email);

    let user = find_user_by_email(&state.db, &email)
        .await?
        .ok_or_else(ApiError::invalid_credentials)?;

    if !verify_password(&request.password, &user.password_hash) {
        tracing::info!(user_id = %user.id, "Login failed: wrong password");
        return Err(ApiError::invalid_credentials());
    }

    let jar = issue_cookie(&state, jar, &user)?;
    tracing::info!(user_id = %user.id, "User logged in");

    Ok((
        jar,
        Json(UserEnvelope {
            user: UserResponse::from(user),
        }),
    ))
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// POST /api/auth/logout
///
/// Only clears the cookie; an already issued token stays valid until expiry.
pub async fn logout(jar: CookieJar) -> (CookieJar, Json<MessageResponse>) {
    let jar = jar.remove(Cookie::build(SESSION_COOKIE).path("/"));
    (
        jar,
        Json(MessageResponse {
            message: "Logout successful".to_string(),
        }),
    )
}

/// GET /api/auth/me
pub async fn me(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<UserEnvelope>, ApiError> {
    let user = find_user_by_id(&state.db, &auth.id)
        .await?
        .ok_or_else(ApiError::invalid_token)?;

    Ok(Json(UserEnvelope {
        user: UserResponse::from(user),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys() -> SessionKeys {
        SessionKeys::new(&AuthConfig {
            jwt_secret: "0123456789abcdef0123456789abcdef".to_string(),
            ..AuthConfig::default()
        })
    }

    #[test]
    fn test_password_round_trip() {
        let hash = hash_password("Test@1234").unwrap();
        assert_ne!(hash, "Test@1234");
        assert!(verify_password("Test@1234", &hash));
        assert!(!verify_password("wrong-password", &hash));
        assert!(!verify_password("Test@1234", "not-a-hash"));
    }

    #[test]
    fn test_token_issue_and_verify() {
        let keys = keys();
        let token = keys.issue("user-1", "a@example.com").unwrap();
        let claims = keys.verify(&token).unwrap();
        assert_eq!(claims.sub, "user-1");
        assert_eq!(claims.email, "a@example.com");
        assert_eq!(claims.exp - claims.iat, 24 * 3600);
    }

    #[test]
    fn test_expired_token_rejected() {
        let keys = keys();
        let now = chrono::Utc::now().timestamp();
        let token = keys
            .sign(&SessionClaims {
                sub: "user-1".to_string(),
                email: "a@example.com".to_string(),
                iat: now - 7200,
                exp: now - 3600,
            })
            .unwrap();
        assert!(keys.verify(&token).is_err());
    }

    #[test]
    fn test_foreign_signature_rejected() {
        let other = SessionKeys::new(&AuthConfig {
            jwt_secret: "ffffffffffffffffffffffffffffffff".to_string(),
            ..AuthConfig::default()
        });
        let token = other.issue("user-1", "a@example.com").unwrap();
        assert!(keys().verify(&token).is_err());
        assert!(keys().verify("garbage").is_err());
    }

    #[test]
    fn test_session_cookie_attributes() {
        let cookie = keys().session_cookie("abc".to_string());
        assert_eq!(cookie.name(), SESSION_COOKIE);
        assert_eq!(cookie.value(), "abc");
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        assert_eq!(cookie.max_age(), Some(time::Duration::hours(24)));

        let secure = SessionKeys::new(&AuthConfig {
            jwt_secret: "0123456789abcdef0123456789abcdef".to_string(),
            cookie_secure: true,
            ..AuthConfig::default()
        })
        .session_cookie("abc".to_string());
        assert_eq!(secure.secure(), Some(true));
        assert_eq!(secure.same_site(), Some(SameSite::None));
    }
}
