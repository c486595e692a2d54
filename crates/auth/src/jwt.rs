//! JWT access/refresh token issuance and verification.
//!
//! HS256 only — the signing secret is a shared symmetric key, so a service
//! that verifies tokens must hold the same secret that issued them. The
//! algorithm is pinned explicitly on both encode and decode so a forged
//! token can't downgrade to `alg: none`.

use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use konsul_domain::model::{AccessClaims, RefreshClaims};

use crate::error::AuthError;

pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    access_ttl: chrono::Duration,
    refresh_ttl: chrono::Duration,
}

/// An issued token pair, as returned from login/refresh endpoints.
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
}

impl JwtService {
    pub fn new(secret: &[u8], issuer: impl Into<String>, access_ttl_secs: i64, refresh_ttl_secs: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            issuer: issuer.into(),
            access_ttl: chrono::Duration::seconds(access_ttl_secs),
            refresh_ttl: chrono::Duration::seconds(refresh_ttl_secs),
        }
    }

    pub fn issue(
        &self,
        subject: &str,
        username: &str,
        roles: Vec<String>,
        policies: Vec<String>,
    ) -> Result<TokenPair, AuthError> {
        let now = Utc::now();
        let access = AccessClaims {
            sub: subject.into(),
            username: username.into(),
            roles,
            policies,
            iss: self.issuer.clone(),
            iat: now.timestamp(),
            nbf: now.timestamp(),
            exp: (now + self.access_ttl).timestamp(),
        };
        let refresh = RefreshClaims {
            sub: subject.into(),
            exp: (now + self.refresh_ttl).timestamp(),
        };

        let header = Header::new(Algorithm::HS256);
        let access_token = jsonwebtoken::encode(&header, &access, &self.encoding_key)
            .map_err(|e| AuthError::TokenInvalid(e.to_string()))?;
        let refresh_token = jsonwebtoken::encode(&header, &refresh, &self.encoding_key)
            .map_err(|e| AuthError::TokenInvalid(e.to_string()))?;

        Ok(TokenPair {
            access_token,
            refresh_token,
            expires_in: self.access_ttl.num_seconds(),
        })
    }

    pub fn verify_access(&self, token: &str) -> Result<AccessClaims, AuthError> {
        if token.is_empty() {
            return Err(AuthError::TokenMissing);
        }
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.issuer]);
        let data = jsonwebtoken::decode::<AccessClaims>(token, &self.decoding_key, &validation)
            .map_err(map_jwt_error)?;
        Ok(data.claims)
    }

    pub fn verify_refresh(&self, token: &str) -> Result<RefreshClaims, AuthError> {
        if token.is_empty() {
            return Err(AuthError::TokenMissing);
        }
        let mut validation = Validation::new(Algorithm::HS256);
        validation.required_spec_claims.clear();
        validation.validate_exp = true;
        let data = jsonwebtoken::decode::<RefreshClaims>(token, &self.decoding_key, &validation)
            .map_err(map_jwt_error)?;
        Ok(data.claims)
    }

    /// Verify a refresh token and mint a fresh access/refresh pair for the
    /// same subject. Roles/policies must be re-supplied by the caller,
    /// since the refresh token deliberately doesn't carry them.
    pub fn refresh(
        &self,
        refresh_token: &str,
        username: &str,
        roles: Vec<String>,
        policies: Vec<String>,
    ) -> Result<TokenPair, AuthError> {
        let claims = self.verify_refresh(refresh_token)?;
        self.issue(&claims.sub, username, roles, policies)
    }
}

fn map_jwt_error(e: jsonwebtoken::errors::Error) -> AuthError {
    use jsonwebtoken::errors::ErrorKind;
    match e.kind() {
        ErrorKind::ExpiredSignature => AuthError::TokenExpired,
        _ => AuthError::TokenInvalid(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> JwtService {
        JwtService::new(b"test-secret-key-thats-long-enough", "konsul", 900, 604_800)
    }

    #[test]
    fn issue_then_verify_access_roundtrips() {
        let jwt = service();
        let pair = jwt
            .issue("user-1", "alice", vec!["admin".into()], vec!["default".into()])
            .unwrap();
        let claims = jwt.verify_access(&pair.access_token).unwrap();
        assert_eq!(claims.sub, "user-1");
        assert_eq!(claims.roles, vec!["admin".to_string()]);
    }

    #[test]
    fn empty_token_is_missing_not_invalid() {
        let jwt = service();
        assert!(matches!(jwt.verify_access(""), Err(AuthError::TokenMissing)));
    }

    #[test]
    fn expired_access_token_is_rejected() {
        let jwt = JwtService::new(b"test-secret-key-thats-long-enough", "konsul", -1, 604_800);
        let pair = jwt.issue("user-1", "alice", vec![], vec![]).unwrap();
        assert!(matches!(
            jwt.verify_access(&pair.access_token),
            Err(AuthError::TokenExpired)
        ));
    }

    #[test]
    fn refresh_mints_a_new_pair_for_the_same_subject() {
        let jwt = service();
        let pair = jwt.issue("user-1", "alice", vec![], vec![]).unwrap();
        let refreshed = jwt
            .refresh(&pair.refresh_token, "alice", vec!["viewer".into()], vec![])
            .unwrap();
        let claims = jwt.verify_access(&refreshed.access_token).unwrap();
        assert_eq!(claims.sub, "user-1");
        assert_eq!(claims.roles, vec!["viewer".to_string()]);
    }
}
