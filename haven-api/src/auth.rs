//! Session tokens, role checks and password hashing

use std::time::Duration;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::Config;
use crate::{AppError, AppResult, AppState};

const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Manager,
    Resident,
}

/// JWT Claims structure
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,        // Resident id, or "manager"
    pub exp: usize,         // Expiration time (Unix timestamp)
    pub iat: Option<usize>, // Issued at (Unix timestamp)
    pub role: Role,
}

impl Claims {
    pub fn is_manager(&self) -> bool {
        self.role == Role::Manager
    }
}

/// JWT signing and verification settings
#[derive(Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub algorithm: Algorithm,
    pub ttl: Duration,
}

impl JwtConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            secret: config.jwt_secret.clone(),
            algorithm: Algorithm::HS256,
            ttl: config.session_ttl,
        }
    }

    /// Create from explicit secret (for testing)
    pub fn new(secret: String, algorithm: Algorithm) -> Self {
        Self {
            secret,
            algorithm,
            ttl: Duration::from_secs(12 * 60 * 60),
        }
    }

    /// Sign a session token for `sub`
    pub fn issue(&self, sub: &str, role: Role) -> AppResult<String> {
        let now = chrono::Utc::now();
        let expires = chrono::Duration::from_std(self.ttl)
            .ok()
            .and_then(|ttl| now.checked_add_signed(ttl))
            .ok_or_else(|| {
                AppError::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("Session TTL {:?} is out of range", self.ttl),
                )
            })?;
        let claims = Claims {
            sub: sub.to_string(),
            exp: expires.timestamp() as usize,
            iat: Some(now.timestamp() as usize),
            role,
        };
        encode(
            &Header::new(self.algorithm),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| AppError::new(StatusCode::INTERNAL_SERVER_ERROR, format!("Failed to sign token: {}", e)))
    }
}

/// Validated session claims, inserted into request extensions by [`jwt_middleware`]
#[derive(Clone, Debug)]
pub struct AuthClaims(pub Claims);

fn bearer_token(headers: &HeaderMap) -> Result<&str, &'static str> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or("Missing Authorization header")?;
    let value = value
        .to_str()
        .map_err(|_| "Invalid Authorization header")?;
    value
        .strip_prefix("Bearer ")
        .ok_or("Authorization header must use Bearer scheme")
}

/// Rejects requests without a valid session token; attaches [`AuthClaims`] otherwise
pub async fn jwt_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let claims = match bearer_token(request.headers()) {
        Ok(token) => verify_jwt(token, &state.jwt_config),
        Err(reason) => {
            debug!(path = %request.uri().path(), "Rejecting request: {}", reason);
            return (StatusCode::UNAUTHORIZED, reason).into_response();
        }
    };

    match claims {
        Ok(claims) => {
            debug!(sub = %claims.sub, role = ?claims.role, "Session accepted");
            request.extensions_mut().insert(AuthClaims(claims));
            next.run(request).await
        }
        Err(e) => {
            warn!("Session token rejected: {}", e);
            (StatusCode::UNAUTHORIZED, format!("Invalid token: {}", e)).into_response()
        }
    }
}

fn verify_jwt(token: &str, config: &JwtConfig) -> Result<Claims, jsonwebtoken::errors::Error> {
    let mut validation = Validation::new(config.algorithm);
    validation.validate_exp = true;
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
}

pub fn require_manager(claims: &Claims) -> AppResult<()> {
    if claims.is_manager() {
        Ok(())
    } else {
        Err(AppError::forbidden("Manager access required"))
    }
}

/// Managers may act on any resident; residents only on themselves
pub fn require_self_or_manager(claims: &Claims, resident_id: &str) -> AppResult<()> {
    if claims.is_manager() || claims.sub == resident_id {
        Ok(())
    } else {
        Err(AppError::forbidden("Residents may only access their own record"))
    }
}

/// Check a new password and its confirmation
pub fn validate_new_password(password: &str, confirmation: &str) -> AppResult<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::bad_request(format!(
            "Password must be at least {} characters.",
            MIN_PASSWORD_LEN
        )));
    }
    if password != confirmation {
        return Err(AppError::bad_request("Passwords do not match."));
    }
    Ok(())
}

/// Argon2id hash in PHC string form, with a fresh random salt
pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| {
            AppError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to hash password: {}", e),
            )
        })
}

/// False for a wrong password and for anything that is not a PHC hash
pub fn verify_password(stored: &str, candidate: &str) -> bool {
    match PasswordHash::new(stored) {
        Ok(parsed) => Argon2::default()
            .verify_password(candidate.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            warn!("Stored password hash could not be parsed: {}", e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(secret: &str) -> JwtConfig {
        JwtConfig::new(secret.to_string(), Algorithm::HS256)
    }

    #[test]
    fn test_issued_token_verifies() {
        let config = config("test-secret");
        let token = config.issue("c-123", Role::Resident).unwrap();

        let claims = verify_jwt(&token, &config).unwrap();
        assert_eq!(claims.sub, "c-123");
        assert_eq!(claims.role, Role::Resident);
        assert!(!claims.is_manager());
    }

    #[test]
    fn test_token_from_other_secret_is_rejected() {
        let token = config("test-secret").issue("manager", Role::Manager).unwrap();
        assert!(verify_jwt(&token, &config("wrong-secret")).is_err());
    }

    #[test]
    fn test_token_past_expiry_is_rejected() {
        let config = config("test-secret");
        let claims = Claims {
            sub: "c-9".to_string(),
            exp: (chrono::Utc::now() - chrono::Duration::minutes(5)).timestamp() as usize,
            iat: None,
            role: Role::Resident,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"test-secret"),
        )
        .unwrap();

        assert!(verify_jwt(&token, &config).is_err());
    }

    #[test]
    fn test_bearer_token_requires_scheme() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), Err("Missing Authorization header"));

        headers.insert(header::AUTHORIZATION, "Basic abc".parse().unwrap());
        assert!(bearer_token(&headers).is_err());

        headers.insert(header::AUTHORIZATION, "Bearer abc.def".parse().unwrap());
        assert_eq!(bearer_token(&headers), Ok("abc.def"));
    }

    #[test]
    fn test_password_hash_round_trip() {
        let stored = hash_password("sober-2024").unwrap();
        assert!(stored.starts_with("$argon2"));
        assert!(verify_password(&stored, "sober-2024"));
        assert!(!verify_password(&stored, "Sober-2024"));
        assert!(!verify_password("not-a-hash", "sober-2024"));
    }

    #[test]
    fn test_hashes_are_salted() {
        assert_ne!(
            hash_password("password").unwrap(),
            hash_password("password").unwrap()
        );
    }

    #[test]
    fn test_unsalted_digest_is_not_accepted_as_a_hash() {
        let sha_style = "0f3c9a$5e884898da28047151d0e56f8dc6292773603d0d6aabbdd62a11ef721d1542d8";
        assert!(!verify_password(sha_style, "password"));
    }

    #[test]
    fn test_out_of_range_session_ttl_is_an_error() {
        let mut config = config("test-secret");
        config.ttl = Duration::from_secs(u64::MAX);

        let err = config.issue("manager", Role::Manager).unwrap_err();
        assert_eq!(err.status_code, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_new_password_rules() {
        assert!(validate_new_password("abcdef", "abcdef").is_ok());
        assert_eq!(
            validate_new_password("abc", "abc").unwrap_err().message,
            "Password must be at least 6 characters."
        );
        assert_eq!(
            validate_new_password("abcdef", "abcdeg").unwrap_err().message,
            "Passwords do not match."
        );
    }

    #[test]
    fn test_role_checks() {
        let resident = Claims {
            sub: "c-1".to_string(),
            exp: 9999999999,
            iat: None,
            role: Role::Resident,
        };
        assert!(require_manager(&resident).is_err());
        assert!(require_self_or_manager(&resident, "c-1").is_ok());
        assert_eq!(
            require_self_or_manager(&resident, "c-2").unwrap_err().status_code,
            StatusCode::FORBIDDEN
        );
    }
}
