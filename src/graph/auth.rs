//! Graph Authentication
//!
//! Handles bearer token acquisition using either a pre-acquired access token
//! or the OAuth2 client-credentials grant, with expiry-aware caching.

use super::error::AuthError;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Default scopes for Graph API access
pub const DEFAULT_SCOPES: &[&str] = &["https://graph.microsoft.com/.default"];

/// Default Microsoft identity platform authority
pub const DEFAULT_AUTHORITY: &str = "https://login.microsoftonline.com";

/// Token expiry buffer - refresh tokens this much before they actually expire
/// This prevents using tokens that are about to expire during a request
const TOKEN_EXPIRY_BUFFER: Duration = Duration::from_secs(60);

/// Default token TTL if we can't determine expiry (conservative: 30 minutes)
const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(30 * 60);

/// An acquired bearer token
#[derive(Clone)]
pub struct AccessToken {
    pub secret: String,
    pub expires_in: Option<Duration>,
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("secret", &"<redacted>")
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

/// Source of bearer tokens
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn token(&self, scopes: &[&str]) -> Result<AccessToken, AuthError>;
}

/// A token acquired out of band, e.g. `az account get-access-token`
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

#[async_trait]
impl TokenProvider for StaticToken {
    async fn token(&self, _scopes: &[&str]) -> Result<AccessToken, AuthError> {
        Ok(AccessToken {
            secret: self.0.clone(),
            expires_in: None,
        })
    }
}

/// Client-credentials grant against the Microsoft identity platform
pub struct ClientSecretCredential {
    http: Client,
    authority: String,
    tenant_id: String,
    client_id: String,
    client_secret: String,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

impl ClientSecretCredential {
    /// `http` carries the timeout and user agent token requests are sent with
    pub fn new(
        http: Client,
        authority: impl Into<String>,
        tenant_id: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            http,
            authority: authority.into(),
            tenant_id: tenant_id.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }

    fn token_url(&self) -> String {
        format!(
            "{}/{}/oauth2/v2.0/token",
            self.authority.trim_end_matches('/'),
            urlencoding::encode(&self.tenant_id)
        )
    }
}

#[async_trait]
impl TokenProvider for ClientSecretCredential {
    async fn token(&self, scopes: &[&str]) -> Result<AccessToken, AuthError> {
        let url = self.token_url();
        tracing::debug!("POST {}", url);

        let scope = scopes.join(" ");
        let response = self
            .http
            .post(&url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("scope", scope.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            tracing::error!(
                "Token request failed: {} - {}",
                status,
                super::http::sanitize_for_log(&body)
            );
            return Err(AuthError::Rejected { status, body });
        }

        let token: TokenResponse = serde_json::from_str(&body)?;
        Ok(AccessToken {
            secret: token.access_token,
            expires_in: token.expires_in.map(Duration::from_secs),
        })
    }
}

/// Graph credentials holder with token caching
#[derive(Clone)]
pub struct GraphCredentials {
    provider: Arc<dyn TokenProvider>,
    token_cache: Arc<RwLock<Option<CachedToken>>>,
}

#[derive(Clone)]
struct CachedToken {
    token: String,
    /// When this token expires (with buffer applied)
    expires_at: Instant,
}

impl CachedToken {
    fn is_valid(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

impl GraphCredentials {
    pub fn new(provider: Arc<dyn TokenProvider>) -> Self {
        Self {
            provider,
            token_cache: Arc::new(RwLock::new(None)),
        }
    }

    /// Credentials for a fixed bearer token
    pub fn from_token(token: impl Into<String>) -> Self {
        Self::new(Arc::new(StaticToken::new(token)))
    }

    /// Resolve credentials from the environment
    ///
    /// `AZURE_CLIENT_ID` + `AZURE_CLIENT_SECRET` select the client-credentials
    /// grant; otherwise `GRAPH_ACCESS_TOKEN` is used as a static token.
    pub fn from_env(
        authority: &str,
        tenant_id: &str,
        client_id: Option<&str>,
        http: Client,
    ) -> Result<Self, AuthError> {
        let client_id = client_id
            .map(str::to_string)
            .or_else(|| std::env::var("AZURE_CLIENT_ID").ok());
        let client_secret = std::env::var("AZURE_CLIENT_SECRET").ok();

        if let (Some(client_id), Some(client_secret)) = (client_id, client_secret) {
            if tenant_id.is_empty() {
                return Err(AuthError::MissingCredentials(
                    "a tenant ID is required for the client-credentials grant".to_string(),
                ));
            }
            tracing::info!("Using client-credentials grant for client {}", client_id);
            return Ok(Self::new(Arc::new(ClientSecretCredential::new(
                http,
                authority,
                tenant_id,
                client_id,
                client_secret,
            ))));
        }

        if let Ok(token) = std::env::var("GRAPH_ACCESS_TOKEN") {
            if !token.trim().is_empty() {
                tracing::info!("Using access token from GRAPH_ACCESS_TOKEN");
                return Ok(Self::from_token(token.trim()));
            }
        }

        Err(AuthError::MissingCredentials(
            "set AZURE_CLIENT_ID and AZURE_CLIENT_SECRET, or GRAPH_ACCESS_TOKEN".to_string(),
        ))
    }

    /// Get an access token for API calls
    /// Security: Checks token expiry before returning cached token
    pub async fn get_token(&self) -> Result<String, AuthError> {
        {
            let cache = self.token_cache.read().await;
            if let Some(cached) = cache.as_ref() {
                if cached.is_valid() {
                    return Ok(cached.token.clone());
                }
                tracing::debug!("Cached token expired, fetching new token");
            }
        }

        let token = self.provider.token(DEFAULT_SCOPES).await?;

        let ttl = token.expires_in.unwrap_or(DEFAULT_TOKEN_TTL);
        let expires_at = Instant::now() + ttl.saturating_sub(TOKEN_EXPIRY_BUFFER);

        {
            let mut cache = self.token_cache.write().await;
            *cache = Some(CachedToken {
                token: token.secret.clone(),
                expires_at,
            });
        }

        tracing::debug!(
            "New token cached, expires in ~{} minutes",
            ttl.saturating_sub(TOKEN_EXPIRY_BUFFER).as_secs() / 60
        );

        Ok(token.secret)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct CountingProvider {
        calls: AtomicUsize,
        expires_in: Option<Duration>,
    }

    #[async_trait]
    impl TokenProvider for CountingProvider {
        async fn token(&self, scopes: &[&str]) -> Result<AccessToken, AuthError> {
            assert_eq!(scopes, DEFAULT_SCOPES);
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(AccessToken {
                secret: format!("token-{}", n),
                expires_in: self.expires_in,
            })
        }
    }

    #[tokio::test]
    async fn test_token_is_cached() {
        let provider = Arc::new(CountingProvider {
            calls: AtomicUsize::new(0),
            expires_in: Some(Duration::from_secs(3600)),
        });
        let credentials = GraphCredentials::new(provider.clone());

        assert_eq!(credentials.get_token().await.unwrap(), "token-1");
        assert_eq!(credentials.get_token().await.unwrap(), "token-1");
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_short_lived_token_is_not_reused() {
        // Expiry inside the buffer window means the token is stale immediately
        let provider = Arc::new(CountingProvider {
            calls: AtomicUsize::new(0),
            expires_in: Some(Duration::from_secs(30)),
        });
        let credentials = GraphCredentials::new(provider.clone());

        credentials.get_token().await.unwrap();
        assert_eq!(credentials.get_token().await.unwrap(), "token-2");
    }

    #[tokio::test]
    async fn test_client_secret_grant() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/contoso/oauth2/v2.0/token"))
            .and(body_string_contains("grant_type=client_credentials"))
            .and(body_string_contains("client_id=client"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "token_type": "Bearer",
                "expires_in": 3599,
                "access_token": "issued-token"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let credential =
            ClientSecretCredential::new(Client::new(), server.uri(), "contoso", "client", "secret");
        let token = credential.token(DEFAULT_SCOPES).await.unwrap();

        assert_eq!(token.secret, "issued-token");
        assert_eq!(token.expires_in, Some(Duration::from_secs(3599)));
    }

    #[tokio::test]
    async fn test_token_request_honours_client_timeout() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/contoso/oauth2/v2.0/token"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"access_token": "late"}))
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let http = Client::builder()
            .timeout(Duration::from_millis(100))
            .build()
            .unwrap();
        let credential =
            ClientSecretCredential::new(http, server.uri(), "contoso", "client", "secret");

        match credential.token(DEFAULT_SCOPES).await {
            Err(AuthError::Request(e)) => assert!(e.is_timeout()),
            other => panic!("expected a timeout, got {:?}", other),
        }
    }

    #[test]
    fn test_token_url() {
        let credential = ClientSecretCredential::new(
            Client::new(),
            "https://login.microsoftonline.com/",
            "contoso.onmicrosoft.com",
            "client",
            "secret",
        );
        assert_eq!(
            credential.token_url(),
            "https://login.microsoftonline.com/contoso.onmicrosoft.com/oauth2/v2.0/token"
        );
    }

    #[test]
    fn test_debug_redacts_secret() {
        let token = AccessToken {
            secret: "super-secret".to_string(),
            expires_in: None,
        };
        assert!(!format!("{:?}", token).contains("super-secret"));
    }
}
