//! Google ID-token verification for "Sign in with Google".
//!
//! Tokens are RS256 JWTs. The signing key is looked up by `kid` in Google's
//! published JWKS, which is fetched per verification.

use jsonwebtoken::{decode, decode_header, jwk::JwkSet, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use thiserror::Error;

use crate::Config;

const GOOGLE_ISSUERS: [&str; 2] = ["accounts.google.com", "https://accounts.google.com"];
const MAX_USERNAME_BASE: usize = 25;

// ---

/// Claims read from a verified Google ID token.
#[derive(Debug, Clone, Deserialize)]
pub struct GoogleIdentity {
    pub email: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Error)]
pub enum GoogleError {
    #[error("Google sign-in is not configured")]
    NotConfigured,

    #[error("Invalid Google token: {0}")]
    InvalidToken(String),

    #[error("Failed to fetch Google signing keys: {0}")]
    Keys(#[from] reqwest::Error),
}

#[derive(Debug, Clone)]
pub struct GoogleVerifier {
    client: reqwest::Client,
    client_id: Option<String>,
    certs_url: String,
}

impl GoogleVerifier {
    pub fn from_config(cfg: &Config) -> Self {
        // ---
        GoogleVerifier {
            client: reqwest::Client::new(),
            client_id: cfg.google_client_id.clone(),
            certs_url: cfg.google_certs_url.clone(),
        }
    }

    pub async fn verify(&self, token: &str) -> Result<GoogleIdentity, GoogleError> {
        // ---
        let client_id = self.client_id.as_deref().ok_or(GoogleError::NotConfigured)?;

        let header =
            decode_header(token).map_err(|e| GoogleError::InvalidToken(e.to_string()))?;
        let kid = header
            .kid
            .ok_or_else(|| GoogleError::InvalidToken("missing kid".to_string()))?;

        tracing::debug!("Fetching Google signing keys from {}", self.certs_url);
        let keys: JwkSet = self
            .client
            .get(&self.certs_url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let jwk = keys
            .find(&kid)
            .ok_or_else(|| GoogleError::InvalidToken(format!("unknown kid {}", kid)))?;
        let key =
            DecodingKey::from_jwk(jwk).map_err(|e| GoogleError::InvalidToken(e.to_string()))?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[client_id]);
        validation.set_issuer(&GOOGLE_ISSUERS);

        let data = decode::<GoogleIdentity>(token, &key, &validation)
            .map_err(|e| GoogleError::InvalidToken(e.to_string()))?;
        Ok(data.claims)
    }
}

/// Username stem derived from a display name: spaces become underscores,
/// lower-cased, at most 25 characters, `user` when empty.
pub fn username_base(name: Option<&str>) -> String {
    // ---
    let base: String = name
        .unwrap_or_default()
        .trim()
        .replace(' ', "_")
        .to_lowercase()
        .chars()
        .take(MAX_USERNAME_BASE)
        .collect();
    if base.is_empty() {
        "user".to_string()
    } else {
        base
    }
}

/// `base`, then `base1`, `base2`, ... for collision resolution.
pub fn candidate_usernames(base: &str) -> impl Iterator<Item = String> + '_ {
    std::iter::once(base.to_string()).chain((1u32..).map(move |n| format!("{}{}", base, n)))
}
