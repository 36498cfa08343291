use chrono::{DateTime, TimeZone, Utc};
use jsonwebtoken::{decode, decode_header, Algorithm, Validation};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

use super::jwks::{JwksClient, JwksError};
use super::revocation::RevocationList;

/// Identity carried by a validated access token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenIdentity {
    pub subject: String,
    pub issued_at: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("Malformed token: {0}")]
    Malformed(String),

    #[error("Unsupported algorithm: {0:?}. Only RS256 is allowed")]
    UnsupportedAlgorithm(Algorithm),

    #[error(transparent)]
    Keys(#[from] JwksError),

    #[error("Invalid token: {0}")]
    Invalid(String),

    #[error("Session was signed out")]
    Revoked,
}

#[derive(Debug, Deserialize)]
struct Claims {
    sub: String,
    iat: i64,
    #[serde(default)]
    kind: Option<String>,
}

/// Verifies bearer tokens issued by the identity provider.
pub struct JwtValidator {
    jwks_client: Arc<JwksClient>,
    revocations: Arc<RevocationList>,
    issuer: String,
    audience: String,
    leeway: u64,
}

impl JwtValidator {
    pub fn new(
        jwks_client: Arc<JwksClient>,
        revocations: Arc<RevocationList>,
        issuer: String,
        audience: String,
        leeway: Duration,
    ) -> Self {
        Self {
            jwks_client,
            revocations,
            issuer,
            audience,
            leeway: leeway.as_secs(),
        }
    }

    pub async fn validate_token(&self, token: &str) -> Result<TokenIdentity, TokenError> {
        let header = decode_header(token).map_err(|e| TokenError::Malformed(e.to_string()))?;
        if header.alg != Algorithm::RS256 {
            return Err(TokenError::UnsupportedAlgorithm(header.alg));
        }
        let kid = header
            .kid
            .ok_or_else(|| TokenError::Malformed("missing kid in header".to_string()))?;

        let decoding_key = self.jwks_client.get_key(&kid).await?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.audience]);
        validation.leeway = self.leeway;
        validation.validate_nbf = true;

        let claims = decode::<Claims>(token, &decoding_key, &validation)
            .map_err(|e| TokenError::Invalid(e.to_string()))?
            .claims;

        let identity = identity_from_claims(claims)?;
        if self
            .revocations
            .is_revoked(&identity.subject, identity.issued_at)
            .await
        {
            return Err(TokenError::Revoked);
        }

        Ok(identity)
    }
}

fn identity_from_claims(claims: Claims) -> Result<TokenIdentity, TokenError> {
    // Providers that set `kind` also issue ID tokens with the same keys.
    if let Some(kind) = &claims.kind {
        if kind != "AccessToken" {
            return Err(TokenError::Invalid(format!("not an access token: {}", kind)));
        }
    }
    if claims.sub.is_empty() {
        return Err(TokenError::Invalid("empty subject".to_string()));
    }
    let issued_at = Utc
        .timestamp_opt(claims.iat, 0)
        .single()
        .ok_or_else(|| TokenError::Invalid(format!("bad iat: {}", claims.iat)))?;

    Ok(TokenIdentity {
        subject: claims.sub,
        issued_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(value: serde_json::Value) -> Claims {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_access_token_claims_become_identity() {
        let identity =
            identity_from_claims(claims(serde_json::json!({"sub": "u1", "iat": 1_700_000_000})))
                .unwrap();
        assert_eq!(identity.subject, "u1");
        assert_eq!(identity.issued_at.timestamp(), 1_700_000_000);
    }

    #[test]
    fn test_id_tokens_are_rejected() {
        let result = identity_from_claims(claims(
            serde_json::json!({"sub": "u1", "iat": 1_700_000_000, "kind": "IdToken"}),
        ));
        assert!(matches!(result, Err(TokenError::Invalid(_))));
    }

    #[test]
    fn test_empty_subject_is_rejected() {
        let result =
            identity_from_claims(claims(serde_json::json!({"sub": "", "iat": 1_700_000_000})));
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_garbage_token_is_malformed() {
        let validator = JwtValidator::new(
            Arc::new(JwksClient::new("http://127.0.0.1:9", Duration::from_secs(60))),
            Arc::new(RevocationList::new()),
            "http://127.0.0.1:9".to_string(),
            "console".to_string(),
            Duration::from_secs(60),
        );
        let result = validator.validate_token("not-a-jwt").await;
        assert!(matches!(result, Err(TokenError::Malformed(_))));
    }
}
