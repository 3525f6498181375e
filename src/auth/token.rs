use crate::{config::Config, error::AppError};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rand::{distributions::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Length of opaque refresh and verification tokens.
pub const OPAQUE_TOKEN_LENGTH: usize = 64;

const ACCESS_TOKEN_KIND: &str = "access";
const OAUTH_STATE_KIND: &str = "oauth_state";
const OAUTH_STATE_TTL_MINUTES: i64 = 10;

/// Claims encoded within a signed token.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// The user's id. Zero for tokens not bound to a user, such as OAuth state.
    pub sub: i32,
    /// Expiration timestamp (seconds since epoch).
    pub exp: i64,
    /// Issued-at timestamp (seconds since epoch).
    pub iat: i64,
    /// Purpose of the token; an OAuth state token is not an access token.
    pub typ: String,
    /// Random nonce, only set on OAuth state tokens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
}

/// Access and refresh token handed to a client after a successful sign-in.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    /// Access-token lifetime in seconds.
    pub expires_in: i64,
}

/// Signing keys and lifetimes used by the token issuer.
///
/// Shared with handlers and the auth middleware through `web::Data`.
#[derive(Clone)]
pub struct TokenKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenKeys {
    pub fn new(secret: &str, access_ttl: Duration, refresh_ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            access_ttl,
            refresh_ttl,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            &config.jwt_secret,
            Duration::minutes(config.access_token_ttl_minutes),
            Duration::days(config.refresh_token_ttl_days),
        )
    }

    pub fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    /// Signs an access token for `user_id`. Returns the token and its lifetime in seconds.
    pub fn generate_access_token(&self, user_id: i32) -> Result<(String, i64), AppError> {
        let token = self.sign(user_id, ACCESS_TOKEN_KIND, self.access_ttl, None)?;
        Ok((token, self.access_ttl.num_seconds()))
    }

    /// Verifies an access token's signature, expiry and purpose.
    pub fn verify_access_token(&self, token: &str) -> Result<Claims, AppError> {
        self.verify(token, ACCESS_TOKEN_KIND)
    }

    /// Signs the `state` parameter for an OAuth redirect.
    pub fn generate_oauth_state(&self) -> Result<String, AppError> {
        let nonce = uuid::Uuid::new_v4().to_string();
        self.sign(
            0,
            OAUTH_STATE_KIND,
            Duration::minutes(OAUTH_STATE_TTL_MINUTES),
            Some(nonce),
        )
    }

    pub fn verify_oauth_state(&self, state: &str) -> Result<(), AppError> {
        self.verify(state, OAUTH_STATE_KIND)
            .map(|_| ())
            .map_err(|_| AppError::Unauthorized("Invalid or expired OAuth state".into()))
    }

    /// Builds the pair for a freshly persisted refresh token.
    pub fn token_pair(&self, user_id: i32, refresh_token: String) -> Result<TokenPair, AppError> {
        let (access_token, expires_in) = self.generate_access_token(user_id)?;
        Ok(TokenPair {
            access_token,
            refresh_token,
            token_type: "Bearer".to_string(),
            expires_in,
        })
    }

    fn sign(
        &self,
        user_id: i32,
        kind: &str,
        ttl: Duration,
        nonce: Option<String>,
    ) -> Result<String, AppError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id,
            exp: (now + ttl).timestamp(),
            iat: now.timestamp(),
            typ: kind.to_string(),
            nonce,
        };

        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| AppError::InternalServerError(format!("Failed to generate token: {}", e)))
    }

    fn verify(&self, token: &str, kind: &str) -> Result<Claims, AppError> {
        let mut validation = Validation::default();
        validation.leeway = 0;

        let claims = decode::<Claims>(token, &self.decoding, &validation)?.claims;
        if claims.typ != kind {
            return Err(AppError::Unauthorized("Invalid token: wrong token type".into()));
        }
        Ok(claims)
    }
}

/// Random token for refresh and verification flows.
pub fn generate_opaque_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(OPAQUE_TOKEN_LENGTH)
        .map(char::from)
        .collect()
}

/// Hex SHA-256 digest under which a refresh token is stored.
pub fn hash_opaque_token(token: &str) -> String {
    format!("{:x}", Sha256::digest(token.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys() -> TokenKeys {
        TokenKeys::new("test_secret", Duration::minutes(15), Duration::days(7))
    }

    #[test]
    fn test_access_token_generation_and_verification() {
        let keys = keys();
        let (token, expires_in) = keys.generate_access_token(42).unwrap();

        assert_eq!(expires_in, 15 * 60);
        let claims = keys.verify_access_token(&token).unwrap();
        assert_eq!(claims.sub, 42);
        assert_eq!(claims.typ, "access");
    }

    #[test]
    fn test_token_expiration() {
        let keys = TokenKeys::new("test_secret", Duration::minutes(-5), Duration::days(7));
        let (expired, _) = keys.generate_access_token(2).unwrap();

        match keys.verify_access_token(&expired) {
            Err(AppError::Unauthorized(msg)) => assert!(msg.contains("ExpiredSignature")),
            other => panic!("expired token accepted: {:?}", other),
        }
    }

    #[test]
    fn test_invalid_token_signature() {
        let other = TokenKeys::new("a_completely_different_secret", Duration::minutes(15), Duration::days(7));
        let (token, _) = other.generate_access_token(1).unwrap();

        assert!(matches!(
            keys().verify_access_token(&token),
            Err(AppError::Unauthorized(_))
        ));
        assert!(keys().verify_access_token("not-a-jwt").is_err());
    }

    #[test]
    fn test_oauth_state_is_not_an_access_token() {
        let keys = keys();
        let state = keys.generate_oauth_state().unwrap();

        assert!(keys.verify_oauth_state(&state).is_ok());
        assert!(keys.verify_access_token(&state).is_err());

        let (access, _) = keys.generate_access_token(1).unwrap();
        assert!(keys.verify_oauth_state(&access).is_err());
    }

    #[test]
    fn test_opaque_tokens() {
        let a = generate_opaque_token();
        let b = generate_opaque_token();

        assert_eq!(a.len(), OPAQUE_TOKEN_LENGTH);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(a, b);

        let digest = hash_opaque_token(&a);
        assert_eq!(digest.len(), 64);
        assert_eq!(digest, hash_opaque_token(&a));
        assert_ne!(digest, hash_opaque_token(&b));
    }

    #[test]
    fn test_token_pair_shape() {
        let pair = keys().token_pair(9, "opaque".into()).unwrap();
        let json = serde_json::to_value(&pair).unwrap();

        assert_eq!(json["tokenType"], "Bearer");
        assert_eq!(json["refreshToken"], "opaque");
        assert_eq!(json["expiresIn"], 900);
    }
}
