//! # JWT Authentication
//!
//! Resolves the database role for a request from an optional bearer token.

use std::collections::HashSet;

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde_json::Value;

use super::errors::{AuthError, AuthResult};

/// Who is making the request
#[derive(Debug, Clone, PartialEq)]
pub struct AuthContext {
    pub role: String,
    pub claims: Option<Value>,
    /// A valid token was presented
    pub authenticated: bool,
}

impl AuthContext {
    pub fn anonymous(role: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            claims: None,
            authenticated: false,
        }
    }

    /// Claims as JSON text, `{}` when anonymous
    pub fn claims_json(&self) -> String {
        self.claims
            .as_ref()
            .map(Value::to_string)
            .unwrap_or_else(|| "{}".to_string())
    }
}

#[derive(Clone)]
pub struct JwtAuthenticator {
    decoding_key: Option<DecodingKey>,
    audience: Option<String>,
    role_claim_path: Vec<String>,
    anon_role: String,
}

impl JwtAuthenticator {
    /// Without a secret every request is anonymous.
    ///
    /// `role_claim_key` may be a dotted path such as `app.role`.
    pub fn new(
        secret: Option<&str>,
        audience: Option<String>,
        role_claim_key: &str,
        anon_role: impl Into<String>,
    ) -> Self {
        Self {
            decoding_key: secret.map(|s| DecodingKey::from_secret(s.as_bytes())),
            audience,
            role_claim_path: role_claim_key
                .split('.')
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect(),
            anon_role: anon_role.into(),
        }
    }

    pub fn anon_role(&self) -> &str {
        &self.anon_role
    }

    /// Authenticate from lower-cased request headers
    pub fn authenticate(&self, headers: &[(String, String)]) -> AuthResult<AuthContext> {
        let header = headers
            .iter()
            .find(|(k, _)| k == "authorization")
            .map(|(_, v)| v.trim());
        let Some(header) = header.filter(|h| !h.is_empty()) else {
            return Ok(AuthContext::anonymous(&self.anon_role));
        };
        let token = match header.split_once(' ') {
            Some((scheme, token)) if scheme.eq_ignore_ascii_case("bearer") => token.trim(),
            _ => return Err(AuthError::MalformedHeader),
        };
        self.validate_token(token)
    }

    /// Verify `token` and derive the role from its claims
    pub fn validate_token(&self, token: &str) -> AuthResult<AuthContext> {
        let Some(key) = &self.decoding_key else {
            return Err(AuthError::InvalidToken("no JWT secret configured".to_string()));
        };

        let mut validation = Validation::new(Algorithm::HS256);
        validation.required_spec_claims = HashSet::new();
        match &self.audience {
            Some(aud) => validation.set_audience(&[aud]),
            None => validation.validate_aud = false,
        }

        let data = decode::<Value>(token, key, &validation).map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            _ => AuthError::InvalidToken(e.to_string()),
        })?;
        let claims = data.claims;

        let role = self
            .role_claim_path
            .iter()
            .try_fold(&claims, |v, key| v.get(key))
            .and_then(Value::as_str)
            .map(String::from)
            .unwrap_or_else(|| self.anon_role.clone());

        Ok(AuthContext {
            role,
            claims: Some(claims),
            authenticated: true,
        })
    }
}

impl std::fmt::Debug for JwtAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtAuthenticator")
            .field("has_secret", &self.decoding_key.is_some())
            .field("audience", &self.audience)
            .field("role_claim_path", &self.role_claim_path)
            .field("anon_role", &self.anon_role)
            .finish()
    }
}
