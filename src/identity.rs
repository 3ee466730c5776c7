//! Token verification for the external identity provider.
//!
//! Authentication itself happens outside this service. Callers present an
//! Ed25519-signed JWT issued by the identity provider; this module only
//! verifies the signature and extracts the caller's opaque user id plus the
//! profile claims used for provisioning.

use jwt_simple::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::config::IdentityConfig;

/// Profile claims embedded by the identity provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileClaims {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub picture: Option<String>,
}

/// Resolved caller identity, inserted into request extensions by the
/// identity middleware.
#[derive(Debug, Clone)]
pub struct Caller {
    pub user_id: Uuid,
    pub email: Option<String>,
    pub name: Option<String>,
    pub picture: Option<String>,
}

#[derive(Clone)]
pub struct IdentityVerifier {
    public_key: Arc<Ed25519PublicKey>,
    issuer: Option<String>,
    audience: Option<String>,
}

impl IdentityVerifier {
    pub fn from_config(config: &IdentityConfig) -> Self {
        use base64::Engine;

        let key_bytes = base64::engine::general_purpose::STANDARD
            .decode(&config.public_key_b64)
            .expect("IDENTITY_PUBLIC_KEY must be valid base64");

        let public_key = Ed25519PublicKey::from_bytes(&key_bytes)
            .expect("IDENTITY_PUBLIC_KEY must be a valid Ed25519 public key");

        Self {
            public_key: Arc::new(public_key),
            issuer: config.issuer.clone(),
            audience: config.audience.clone(),
        }
    }

    pub fn from_public_key(public_key: Ed25519PublicKey) -> Self {
        Self {
            public_key: Arc::new(public_key),
            issuer: None,
            audience: None,
        }
    }

    /// Verifies the token signature and standard claims, then parses the
    /// subject as the caller's user id.
    pub fn verify(&self, token: &str) -> Result<Caller, jwt_simple::Error> {
        let mut options = VerificationOptions::default();
        if let Some(issuer) = &self.issuer {
            options.allowed_issuers = Some(HashSet::from_strings(&[issuer]));
        }
        if let Some(audience) = &self.audience {
            options.allowed_audiences = Some(HashSet::from_strings(&[audience]));
        }

        let claims = self
            .public_key
            .verify_token::<ProfileClaims>(token, Some(options))?;

        let subject = claims
            .subject
            .ok_or_else(|| jwt_simple::Error::msg("token has no subject"))?;
        let user_id = Uuid::parse_str(&subject)
            .map_err(|_| jwt_simple::Error::msg("token subject is not a user id"))?;

        Ok(Caller {
            user_id,
            email: claims.custom.email,
            name: claims.custom.name,
            picture: claims.custom.picture,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issue(key_pair: &Ed25519KeyPair, user_id: Uuid, email: Option<&str>) -> String {
        let custom = ProfileClaims {
            email: email.map(str::to_string),
            name: Some("Test User".to_string()),
            picture: None,
        };
        let claims =
            Claims::with_custom_claims(custom, Duration::from_hours(1)).with_subject(user_id);
        key_pair.sign(claims).unwrap()
    }

    #[test]
    fn verifies_token_and_extracts_caller() {
        let key_pair = Ed25519KeyPair::generate();
        let verifier = IdentityVerifier::from_public_key(key_pair.public_key());
        let user_id = Uuid::new_v4();

        let token = issue(&key_pair, user_id, Some("user@example.com"));
        let caller = verifier.verify(&token).unwrap();

        assert_eq!(caller.user_id, user_id);
        assert_eq!(caller.email.as_deref(), Some("user@example.com"));
        assert_eq!(caller.name.as_deref(), Some("Test User"));
    }

    #[test]
    fn rejects_token_signed_with_wrong_key() {
        let key_pair = Ed25519KeyPair::generate();
        let other = Ed25519KeyPair::generate();
        let verifier = IdentityVerifier::from_public_key(other.public_key());

        let token = issue(&key_pair, Uuid::new_v4(), None);
        assert!(verifier.verify(&token).is_err());
    }

    #[test]
    fn rejects_garbage_token() {
        let key_pair = Ed25519KeyPair::generate();
        let verifier = IdentityVerifier::from_public_key(key_pair.public_key());
        assert!(verifier.verify("not-a-token").is_err());
    }

    #[test]
    fn rejects_non_uuid_subject() {
        let key_pair = Ed25519KeyPair::generate();
        let verifier = IdentityVerifier::from_public_key(key_pair.public_key());

        let custom = ProfileClaims {
            email: None,
            name: None,
            picture: None,
        };
        let claims =
            Claims::with_custom_claims(custom, Duration::from_hours(1)).with_subject("not-a-uuid");
        let token = key_pair.sign(claims).unwrap();

        assert!(verifier.verify(&token).is_err());
    }
}
