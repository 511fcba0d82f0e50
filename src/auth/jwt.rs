//! JWT token generation and validation
//! Access and refresh tokens are signed with separate HS256 keys; password reset
//! tokens share the access key but carry only the user id.

use crate::{
    config::{SecurityConfig, MAX_TOKEN_TTL_SECS},
    models::user::{Role, User},
};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use secrecy::{ExposeSecret, Secret};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Token codec failures
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("token signing failed: {0}")]
    Signing(String),

    #[error("invalid token signature")]
    InvalidSignature,

    #[error("token has expired")]
    Expired,

    #[error("malformed token: {0}")]
    Malformed(String),
}

/// Which signing key a session token belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    Refresh,
}

/// Claims of access and refresh tokens
///
/// Field names follow the tokens already in circulation (`Email`, `UserID`, ...).
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct SessionClaims {
    #[serde(rename = "Email")]
    pub email: String,

    #[serde(rename = "FirstName")]
    pub first_name: String,

    #[serde(rename = "LastName")]
    pub last_name: String,

    #[serde(rename = "Role")]
    pub role: Role,

    #[serde(rename = "UserID")]
    pub user_id: String,

    /// Issuer
    pub iss: String,

    /// Issued at
    pub iat: i64,

    /// Expiration
    pub exp: i64,

    /// JWT ID, keeps two pairs minted in the same second distinct
    #[serde(default)]
    pub jti: String,
}

/// Claims of password reset tokens
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ResetClaims {
    #[serde(rename = "UserID")]
    pub user_id: String,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
    #[serde(default)]
    pub jti: String,
}

/// Claims that carry an expiry, checked explicitly on every verification
pub trait Expiring {
    fn expires_at(&self) -> i64;
}

impl Expiring for SessionClaims {
    fn expires_at(&self) -> i64 {
        self.exp
    }
}

impl Expiring for ResetClaims {
    fn expires_at(&self) -> i64 {
        self.exp
    }
}

/// Token pair response
#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: u64, // seconds until access token expires
}

/// Immutable signing configuration injected into [`JwtService`]
#[derive(Debug, Clone)]
pub struct TokenSettings {
    pub access_secret: Secret<String>,
    pub refresh_secret: Secret<String>,
    pub access_issuer: String,
    pub refresh_issuer: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    pub reset_ttl: Duration,
}

fn ttl_from_secs(secs: u64) -> Duration {
    Duration::seconds(secs.min(MAX_TOKEN_TTL_SECS) as i64)
}

impl TokenSettings {
    pub fn from_security(config: &SecurityConfig) -> Self {
        Self {
            access_secret: config.access_token_secret.clone(),
            refresh_secret: config.refresh_token_secret.clone(),
            access_issuer: config.access_token_issuer.clone(),
            refresh_issuer: config.refresh_token_issuer.clone(),
            access_ttl: ttl_from_secs(config.access_token_exp_secs),
            refresh_ttl: ttl_from_secs(config.refresh_token_exp_secs),
            reset_ttl: ttl_from_secs(config.reset_token_exp_secs),
        }
    }
}

fn expiry(now: DateTime<Utc>, ttl: Duration) -> Result<i64, TokenError> {
    now.checked_add_signed(ttl)
        .map(|exp| exp.timestamp())
        .ok_or_else(|| TokenError::Signing(format!("token lifetime of {}s is out of range", ttl.num_seconds())))
}

struct SigningKey {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl SigningKey {
    /// `None` when no key material was configured
    fn from_secret(secret: &Secret<String>) -> Option<Self> {
        let secret = secret.expose_secret();
        if secret.is_empty() {
            return None;
        }
        Some(Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        })
    }
}

/// JWT service
pub struct JwtService {
    access_key: Option<SigningKey>,
    refresh_key: Option<SigningKey>,
    access_issuer: String,
    refresh_issuer: String,
    access_ttl: Duration,
    refresh_ttl: Duration,
    reset_ttl: Duration,
}

impl JwtService {
    pub fn new(settings: TokenSettings) -> Self {
        Self {
            access_key: SigningKey::from_secret(&settings.access_secret),
            refresh_key: SigningKey::from_secret(&settings.refresh_secret),
            access_issuer: settings.access_issuer,
            refresh_issuer: settings.refresh_issuer,
            access_ttl: settings.access_ttl,
            refresh_ttl: settings.refresh_ttl,
            reset_ttl: settings.reset_ttl,
        }
    }

    /// Create JWT service from config
    pub fn from_config(config: &SecurityConfig) -> Self {
        Self::new(TokenSettings::from_security(config))
    }

    /// How long a password reset token stays valid
    pub fn reset_ttl(&self) -> Duration {
        self.reset_ttl
    }

    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    pub fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    fn key(&self, kind: TokenKind) -> Result<&SigningKey, TokenError> {
        let key = match kind {
            TokenKind::Access => self.access_key.as_ref(),
            TokenKind::Refresh => self.refresh_key.as_ref(),
        };
        key.ok_or_else(|| TokenError::Signing(format!("{:?} signing key is not configured", kind)))
    }

    fn sign<C: Serialize>(&self, claims: &C, kind: TokenKind) -> Result<String, TokenError> {
        let key = self.key(kind)?;
        encode(&Header::new(Algorithm::HS256), claims, &key.encoding).map_err(|e| {
            tracing::error!(?kind, "Failed to encode token: {:?}", e);
            TokenError::Signing(e.to_string())
        })
    }

    fn session_claims(
        &self,
        user: &User,
        issuer: &str,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<SessionClaims, TokenError> {
        Ok(SessionClaims {
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            role: user.role,
            user_id: user.user_id.clone(),
            iss: issuer.to_string(),
            iat: now.timestamp(),
            exp: expiry(now, ttl)?,
            jti: Uuid::new_v4().to_string(),
        })
    }

    /// Mint an independently signed access + refresh pair for `user`
    pub fn issue_session_pair(&self, user: &User, now: DateTime<Utc>) -> Result<TokenPair, TokenError> {
        let access_claims = self.session_claims(user, &self.access_issuer, now, self.access_ttl)?;
        let access_token = self.sign(&access_claims, TokenKind::Access)?;

        let refresh_claims = self.session_claims(user, &self.refresh_issuer, now, self.refresh_ttl)?;
        let refresh_token = self.sign(&refresh_claims, TokenKind::Refresh)?;

        Ok(TokenPair {
            access_token,
            refresh_token,
            expires_in: self.access_ttl.num_seconds().max(0) as u64,
        })
    }

    /// Mint a short-lived password reset token
    pub fn issue_reset_token(&self, user_id: &str, now: DateTime<Utc>) -> Result<String, TokenError> {
        let claims = ResetClaims {
            user_id: user_id.to_string(),
            iss: self.access_issuer.clone(),
            iat: now.timestamp(),
            exp: expiry(now, self.reset_ttl)?,
            jti: Uuid::new_v4().to_string(),
        };
        self.sign(&claims, TokenKind::Access)
    }

    /// Validate signature with the key for `kind`, then check expiry against `now`
    ///
    /// There is no leeway: a token is expired at the exact second of `exp`.
    pub fn verify<C>(&self, token: &str, kind: TokenKind, now: DateTime<Utc>) -> Result<C, TokenError>
    where
        C: DeserializeOwned + Expiring,
    {
        let key = self.key(kind)?;

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_exp = false;

        let claims = decode::<C>(token, &key.decoding, &validation)
            .map_err(|e| {
                tracing::debug!(?kind, "Token validation failed: {:?}", e);
                match e.kind() {
                    ErrorKind::InvalidSignature
                    | ErrorKind::InvalidAlgorithm
                    | ErrorKind::InvalidAlgorithmName => TokenError::InvalidSignature,
                    ErrorKind::ExpiredSignature => TokenError::Expired,
                    _ => TokenError::Malformed(e.to_string()),
                }
            })?
            .claims;

        if claims.expires_at() <= now.timestamp() {
            return Err(TokenError::Expired);
        }

        Ok(claims)
    }

    /// Validate an access or refresh token
    pub fn verify_session(
        &self,
        token: &str,
        kind: TokenKind,
        now: DateTime<Utc>,
    ) -> Result<SessionClaims, TokenError> {
        self.verify::<SessionClaims>(token, kind, now)
    }
}
