//! Signed token service (HS256).
//!
//! Two token shapes share one claim set: standard tokens (`exp = now +
//! JWT_EXPIRE_MINUTES`) and temp-registration tokens, which are clamped to
//! 15 minutes and additionally bind the enrollment (`agent_id`,
//! `agent_type`, `used_key_hash`).

use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use arcp_domain::error::{Error, Result};

use crate::permissions::Role;

/// `iss` pinned on every token this service mints or accepts.
pub const ISSUER: &str = "arcp";

/// Ceiling for temp-registration token lifetime, seconds.
pub const TEMP_TOKEN_MAX_SECS: i64 = 15 * 60;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    pub sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    pub role: Role,
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default)]
    pub temp_registration: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_type: Option<String>,
    /// `sha256(agent_key)` consumed by this enrollment; temp tokens only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub used_key_hash: Option<String>,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
}

/// What a caller asks to be minted; the service owns `iat`/`exp`/`iss`.
#[derive(Debug, Clone, Default)]
pub struct MintClaims {
    pub sub: String,
    pub agent_id: Option<String>,
    pub role: Option<Role>,
    pub scopes: Vec<String>,
    pub temp_registration: bool,
    pub agent_type: Option<String>,
    pub used_key_hash: Option<String>,
    /// Override of the configured TTL, in minutes.
    pub expire_minutes: Option<u64>,
}

pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    expire_minutes: u64,
}

impl TokenService {
    pub fn new(secret: &str, expire_minutes: u64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            expire_minutes,
        }
    }

    /// Mint a signed token; returns `(token, expires_in_secs)`.
    pub fn mint(&self, claims: MintClaims) -> Result<(String, u64)> {
        let now = Utc::now().timestamp();
        let minutes = claims.expire_minutes.unwrap_or(self.expire_minutes);
        let mut ttl = (minutes * 60) as i64;
        if claims.temp_registration {
            ttl = ttl.min(TEMP_TOKEN_MAX_SECS);
        }
        if ttl <= 0 {
            return Err(Error::TokenValidation("non-positive token TTL".into()));
        }

        let payload = TokenClaims {
            sub: claims.sub,
            agent_id: claims.agent_id,
            role: claims.role.unwrap_or(Role::Public),
            scopes: claims.scopes,
            temp_registration: claims.temp_registration,
            agent_type: claims.agent_type,
            used_key_hash: claims.used_key_hash,
            iat: now,
            exp: now + ttl,
            iss: ISSUER.into(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &payload, &self.encoding)
            .map_err(|e| Error::TokenValidation(format!("encode: {e}")))?;
        Ok((token, ttl as u64))
    }

    /// Returns the claims iff the signature is valid, the token is not
    /// expired, and the issuer matches.
    pub fn validate(&self, token: &str) -> Result<TokenClaims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[ISSUER]);
        validation.leeway = 0;
        decode::<TokenClaims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| Error::TokenValidation(e.to_string()))
    }

    /// Re-mint a valid, unexpired token with a fresh lifetime. Temp tokens
    /// keep their clamp and enrollment binding.
    pub fn refresh(&self, token: &str) -> Result<(String, u64)> {
        let claims = self.validate(token)?;
        self.mint(MintClaims {
            sub: claims.sub,
            agent_id: claims.agent_id,
            role: Some(claims.role),
            scopes: claims.scopes,
            temp_registration: claims.temp_registration,
            agent_type: claims.agent_type,
            used_key_hash: claims.used_key_hash,
            expire_minutes: None,
        })
    }

    /// Short token derivative bound into the session key. Not a secret on
    /// its own; never sent to clients.
    pub fn token_ref(token: &str) -> String {
        let digest = Sha256::digest(token.as_bytes());
        hex::encode(&digest[..8])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> TokenService {
        TokenService::new("0123456789abcdef0123456789abcdef", 60)
    }

    fn admin_claims() -> MintClaims {
        MintClaims {
            sub: "admin".into(),
            role: Some(Role::Admin),
            scopes: vec!["admin".into()],
            ..MintClaims::default()
        }
    }

    #[test]
    fn mint_and_validate_round_trip() {
        let svc = service();
        let (token, expires_in) = svc.mint(admin_claims()).unwrap();
        assert_eq!(expires_in, 3600);

        let claims = svc.validate(&token).unwrap();
        assert_eq!(claims.sub, "admin");
        assert_eq!(claims.role, Role::Admin);
        assert_eq!(claims.iss, ISSUER);
        assert!(!claims.temp_registration);
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn temp_token_is_clamped_to_fifteen_minutes() {
        let svc = service();
        let (_, expires_in) = svc
            .mint(MintClaims {
                sub: "agent:x".into(),
                agent_id: Some("x".into()),
                role: Some(Role::Agent),
                temp_registration: true,
                agent_type: Some("testing".into()),
                used_key_hash: Some("abc".into()),
                expire_minutes: Some(120),
                ..MintClaims::default()
            })
            .unwrap();
        assert!(expires_in <= TEMP_TOKEN_MAX_SECS as u64);
    }

    #[test]
    fn wrong_secret_rejected() {
        let (token, _) = service().mint(admin_claims()).unwrap();
        let other = TokenService::new("another-secret-another-secret!!!", 60);
        assert!(matches!(
            other.validate(&token),
            Err(Error::TokenValidation(_))
        ));
    }

    #[test]
    fn expired_token_rejected() {
        let svc = service();
        // Encode an already-expired payload with the same key.
        let now = Utc::now().timestamp();
        let payload = TokenClaims {
            sub: "admin".into(),
            agent_id: None,
            role: Role::Admin,
            scopes: vec![],
            temp_registration: false,
            agent_type: None,
            used_key_hash: None,
            iat: now - 120,
            exp: now - 60,
            iss: ISSUER.into(),
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &payload,
            &EncodingKey::from_secret(b"0123456789abcdef0123456789abcdef"),
        )
        .unwrap();
        assert!(svc.validate(&token).is_err());
    }

    #[test]
    fn foreign_issuer_rejected() {
        let svc = service();
        let now = Utc::now().timestamp();
        let payload = TokenClaims {
            sub: "admin".into(),
            agent_id: None,
            role: Role::Admin,
            scopes: vec![],
            temp_registration: false,
            agent_type: None,
            used_key_hash: None,
            iat: now,
            exp: now + 600,
            iss: "someone-else".into(),
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &payload,
            &EncodingKey::from_secret(b"0123456789abcdef0123456789abcdef"),
        )
        .unwrap();
        assert!(svc.validate(&token).is_err());
    }

    #[test]
    fn refresh_keeps_identity() {
        let svc = service();
        let (token, _) = svc.mint(admin_claims()).unwrap();
        let (refreshed, expires_in) = svc.refresh(&token).unwrap();
        assert_eq!(expires_in, 3600);
        let claims = svc.validate(&refreshed).unwrap();
        assert_eq!(claims.sub, "admin");
        assert_eq!(claims.role, Role::Admin);
    }

    #[test]
    fn token_ref_is_short_and_stable() {
        let r1 = TokenService::token_ref("token-a");
        let r2 = TokenService::token_ref("token-a");
        let r3 = TokenService::token_ref("token-b");
        assert_eq!(r1, r2);
        assert_ne!(r1, r3);
        assert_eq!(r1.len(), 16);
    }
}
