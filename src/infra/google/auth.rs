// Service-account authentication for the Google APIs.
//
// Credentials come from a service-account JSON key, supplied via either:
//   - `GOOGLE_SERVICE_ACCOUNT_KEY` - path to the key file
//   - `GOOGLE_SERVICE_ACCOUNT_JSON` - the JSON content directly (for deployment)
//
// The service account must be granted read access to the Drive folders
// being sourced (share each folder with the account's email address).

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::core::source::SourceError;

/// Scopes needed to list Drive metadata and read document bodies.
const SCOPES: &str = "https://www.googleapis.com/auth/documents.readonly \
                      https://www.googleapis.com/auth/drive.metadata.readonly";

/// Refresh the token this long before it actually expires.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// Service account credentials from the JSON key file.
#[derive(Debug, Clone, Deserialize)]
struct ServiceAccountCredentials {
    /// The service account email (used as issuer in the JWT).
    client_email: String,

    /// The private key in PEM format.
    private_key: String,

    /// Where to exchange the JWT for an access token.
    token_uri: String,
}

/// JWT claims for Google OAuth2.
#[derive(Debug, Serialize)]
struct JwtClaims {
    iss: String,
    scope: String,
    aud: String,
    iat: u64,
    exp: u64,
}

/// Response from Google's token endpoint.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

/// Cached access token with expiration.
#[derive(Debug)]
struct CachedToken {
    token: String,
    expires_at: SystemTime,
}

impl CachedToken {
    fn is_fresh(&self, now: SystemTime) -> bool {
        self.expires_at > now + EXPIRY_MARGIN
    }
}

/// Authenticator that exchanges a service-account JWT for bearer tokens
/// and caches them until shortly before expiry.
#[derive(Debug)]
pub struct ServiceAccountAuth {
    credentials: ServiceAccountCredentials,
    client: Client,
    cached_token: Arc<RwLock<Option<CachedToken>>>,
}

impl ServiceAccountAuth {
    /// Creates a new authenticator from a JSON key file path.
    pub async fn from_file(path: &str) -> Result<Self, SourceError> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|err| SourceError::Auth(format!("Failed to read key file {path}: {err}")))?;
        Self::from_json(&content)
    }

    /// Creates a new authenticator from JSON content.
    pub fn from_json(json: &str) -> Result<Self, SourceError> {
        let credentials: ServiceAccountCredentials = serde_json::from_str(json)
            .map_err(|err| SourceError::Auth(format!("Invalid service account key: {err}")))?;
        Ok(Self {
            credentials,
            client: Client::new(),
            cached_token: Arc::new(RwLock::new(None)),
        })
    }

    /// Creates from environment variables.
    pub async fn from_env() -> Result<Self, SourceError> {
        if let Ok(path) = std::env::var("GOOGLE_SERVICE_ACCOUNT_KEY") {
            return Self::from_file(&path).await;
        }

        if let Ok(json) = std::env::var("GOOGLE_SERVICE_ACCOUNT_JSON") {
            return Self::from_json(&json);
        }

        Err(SourceError::Auth(
            "Neither GOOGLE_SERVICE_ACCOUNT_KEY nor GOOGLE_SERVICE_ACCOUNT_JSON is set".to_string(),
        ))
    }

    /// Gets a valid access token, refreshing if necessary.
    pub async fn get_access_token(&self) -> Result<String, SourceError> {
        {
            let cached = self.cached_token.read().await;
            if let Some(token) = cached.as_ref() {
                if token.is_fresh(SystemTime::now()) {
                    return Ok(token.token.clone());
                }
            }
        }

        let (token, expires_in) = self.fetch_new_token().await?;

        {
            let mut cached = self.cached_token.write().await;
            *cached = Some(CachedToken {
                token: token.clone(),
                expires_at: SystemTime::now() + Duration::from_secs(expires_in),
            });
        }

        Ok(token)
    }

    /// Fetches a new access token from Google.
    async fn fetch_new_token(&self) -> Result<(String, u64), SourceError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|err| SourceError::Auth(err.to_string()))?
            .as_secs();

        let claims = JwtClaims {
            iss: self.credentials.client_email.clone(),
            scope: SCOPES.to_string(),
            aud: self.credentials.token_uri.clone(),
            iat: now,
            exp: now + 3600,
        };

        let header = Header::new(Algorithm::RS256);
        let key = EncodingKey::from_rsa_pem(self.credentials.private_key.as_bytes())
            .map_err(|err| SourceError::Auth(format!("Invalid private key: {err}")))?;
        let jwt = encode(&header, &claims, &key)
            .map_err(|err| SourceError::Auth(format!("Failed to sign JWT: {err}")))?;

        tracing::debug!("Exchanging service-account JWT for an access token");

        let response = self
            .client
            .post(&self.credentials.token_uri)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", jwt.as_str()),
            ])
            .send()
            .await
            .map_err(|err| SourceError::Auth(err.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response
                .text()
                .await
                .map_err(|err| SourceError::Auth(err.to_string()))?;
            return Err(SourceError::Auth(format!(
                "Token exchange failed ({status}): {text}"
            )));
        }

        let token_response: TokenResponse = response
            .json()
            .await
            .map_err(|err| SourceError::Auth(err.to_string()))?;
        Ok((token_response.access_token, token_response.expires_in))
    }
}
