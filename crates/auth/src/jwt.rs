use crate::error::{AuthError, Result};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

/// Claims of an identity-provider access token
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Claims {
    pub sub: String,                  // Identity subject
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub role: Option<String>,         // Global role claim
    #[serde(default)]
    pub org_role: Option<String>,     // Org-scoped role claim
    #[serde(default)]
    pub org_name: Option<String>,     // Used to name the org on first sign-in
    pub exp: i64,
    #[serde(default)]
    pub iat: Option<i64>,
    #[serde(default)]
    pub iss: Option<String>,
}

impl Claims {
    /// True when either role claim grants admin
    pub fn claims_admin(&self) -> bool {
        [self.role.as_deref(), self.org_role.as_deref()]
            .into_iter()
            .flatten()
            .any(|r| r.eq_ignore_ascii_case("admin"))
    }
}

/// Verifies bearer tokens issued by the identity provider (HS256)
pub struct JwtService {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtService {
    pub fn new(secret: &str) -> Self {
        Self::with_claims(secret, None, None)
    }

    /// Verifier that also checks `iss` / `aud` when given
    pub fn with_claims(secret: &str, issuer: Option<&str>, audience: Option<&str>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 30;
        match issuer {
            Some(iss) => validation.set_issuer(&[iss]),
            None => validation.iss = None,
        }
        match audience {
            Some(aud) => validation.set_audience(&[aud]),
            None => validation.validate_aud = false,
        }

        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// Reads `AUTH_JWT_SECRET` (required), `AUTH_JWT_ISSUER`, `AUTH_JWT_AUDIENCE`
    pub fn from_env() -> Result<Self> {
        let secret = std::env::var("AUTH_JWT_SECRET")
            .map_err(|_| AuthError::ConfigurationError("AUTH_JWT_SECRET must be set".to_string()))?;
        if secret.len() < 32 {
            return Err(AuthError::ConfigurationError(
                "AUTH_JWT_SECRET must be at least 32 bytes".to_string(),
            ));
        }

        let issuer = std::env::var("AUTH_JWT_ISSUER").ok();
        let audience = std::env::var("AUTH_JWT_AUDIENCE").ok();

        Ok(Self::with_claims(
            &secret,
            issuer.as_deref(),
            audience.as_deref(),
        ))
    }

    /// Validate signature, expiry and configured claims
    pub fn verify(&self, token: &str) -> Result<Claims> {
        let token_data = decode::<Claims>(token, &self.decoding_key, &self.validation)?;

        if token_data.claims.sub.trim().is_empty() {
            return Err(AuthError::InvalidToken("Token has no subject".to_string()));
        }

        Ok(token_data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::json;

    const SECRET: &str = "test-secret-key-min-32-characters-long";

    fn token(claims: serde_json::Value) -> String {
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap()
    }

    fn exp_in(minutes: i64) -> i64 {
        (Utc::now() + Duration::minutes(minutes)).timestamp()
    }

    #[test]
    fn test_verify_valid_token() {
        let jwt = JwtService::new(SECRET);
        let claims = jwt
            .verify(&token(json!({
                "sub": "user_1",
                "email": "ada@example.com",
                "org_role": "admin",
                "exp": exp_in(10),
            })))
            .expect("Failed to verify token");

        assert_eq!(claims.sub, "user_1");
        assert_eq!(claims.email.as_deref(), Some("ada@example.com"));
        assert!(claims.claims_admin());
    }

    #[test]
    fn test_expired_token() {
        let jwt = JwtService::new(SECRET);
        let result = jwt.verify(&token(json!({ "sub": "user_1", "exp": exp_in(-10) })));
        assert!(matches!(result, Err(AuthError::TokenExpired)));
    }

    #[test]
    fn test_wrong_secret() {
        let jwt = JwtService::new("another-secret-key-min-32-characters-long");
        let result = jwt.verify(&token(json!({ "sub": "user_1", "exp": exp_in(10) })));
        assert!(matches!(result, Err(AuthError::InvalidToken(_))));
    }

    #[test]
    fn test_issuer_and_audience_are_checked() {
        let jwt = JwtService::with_claims(SECRET, Some("https://id.example.com"), Some("coachdesk"));

        let good = token(json!({
            "sub": "user_1",
            "iss": "https://id.example.com",
            "aud": "coachdesk",
            "exp": exp_in(10),
        }));
        assert!(jwt.verify(&good).is_ok());

        let wrong_aud = token(json!({
            "sub": "user_1",
            "iss": "https://id.example.com",
            "aud": "someone-else",
            "exp": exp_in(10),
        }));
        assert!(jwt.verify(&wrong_aud).is_err());
    }

    #[test]
    fn test_empty_subject_rejected() {
        let jwt = JwtService::new(SECRET);
        let result = jwt.verify(&token(json!({ "sub": " ", "exp": exp_in(10) })));
        assert!(matches!(result, Err(AuthError::InvalidToken(_))));
    }

    #[test]
    fn test_member_role_claims() {
        let jwt = JwtService::new(SECRET);
        let claims = jwt
            .verify(&token(json!({ "sub": "user_2", "role": "member", "exp": exp_in(10) })))
            .unwrap();
        assert!(!claims.claims_admin());
    }
}
