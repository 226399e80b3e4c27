//! OAuth2 social login for Google and Naver providers
//!
//! The authorize step hands the client a provider URL and stashes the CSRF
//! state plus PKCE verifier in Redis; the callback step exchanges the code,
//! fetches the provider profile, and leaves account matching to the routes.

use anyhow::Result;
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, PkceCodeChallenge,
    PkceCodeVerifier, RedirectUrl, Scope, TokenResponse, TokenUrl, basic::BasicClient,
};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Seconds an authorize-step session stays valid in Redis
pub const OAUTH_SESSION_TTL: u64 = 600;

/// OAuth2 provider types
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum OAuthProvider {
    Google,
    Naver,
}

impl OAuthProvider {
    /// Provider key used in routes and Redis keys
    pub fn as_str(&self) -> &'static str {
        match self {
            OAuthProvider::Google => "google",
            OAuthProvider::Naver => "naver",
        }
    }

    /// The `login_type` value stamped on accounts from this provider
    pub fn login_type(&self) -> &'static str {
        match self {
            OAuthProvider::Google => "Google",
            OAuthProvider::Naver => "Naver",
        }
    }

    /// Parse a provider from its route segment
    pub fn from_path(segment: &str) -> Option<Self> {
        match segment {
            "google" => Some(OAuthProvider::Google),
            "naver" => Some(OAuthProvider::Naver),
            _ => None,
        }
    }
}

/// OAuth2 configuration for a provider
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_url: String,
    pub auth_url: String,
    pub token_url: String,
}

/// OAuth2 client wrapper
#[derive(Clone)]
pub struct OAuthClient {
    provider: OAuthProvider,
    client: BasicClient,
}

impl OAuthClient {
    /// Build the client for `provider` from environment variables, or `None`
    /// when the provider is not configured
    ///
    /// # Environment Variables (per provider, `GOOGLE_` / `NAVER_` prefix)
    /// - `*_OAUTH_CLIENT_ID`, `*_OAUTH_CLIENT_SECRET`, `*_OAUTH_REDIRECT_URL`
    pub fn from_env(provider: OAuthProvider) -> Result<Option<Self>> {
        let (prefix, auth_url, token_url) = match provider {
            OAuthProvider::Google => (
                "GOOGLE",
                "https://accounts.google.com/o/oauth2/v2/auth",
                "https://oauth2.googleapis.com/token",
            ),
            OAuthProvider::Naver => (
                "NAVER",
                "https://nid.naver.com/oauth2.0/authorize",
                "https://nid.naver.com/oauth2.0/token",
            ),
        };

        let Ok(client_id) = std::env::var(format!("{prefix}_OAUTH_CLIENT_ID")) else {
            return Ok(None);
        };
        let client_secret = std::env::var(format!("{prefix}_OAUTH_CLIENT_SECRET"))
            .map_err(|_| anyhow::anyhow!("{prefix}_OAUTH_CLIENT_SECRET not set"))?;
        let redirect_url = std::env::var(format!("{prefix}_OAUTH_REDIRECT_URL"))
            .map_err(|_| anyhow::anyhow!("{prefix}_OAUTH_REDIRECT_URL not set"))?;

        let config = OAuthConfig {
            client_id,
            client_secret,
            redirect_url,
            auth_url: auth_url.to_string(),
            token_url: token_url.to_string(),
        };

        Ok(Some(Self::new(provider, config)?))
    }

    /// Create a client from explicit configuration
    pub fn new(provider: OAuthProvider, config: OAuthConfig) -> Result<Self> {
        let client = BasicClient::new(
            ClientId::new(config.client_id.clone()),
            Some(ClientSecret::new(config.client_secret.clone())),
            AuthUrl::new(config.auth_url.clone())?,
            Some(TokenUrl::new(config.token_url.clone())?),
        )
        .set_redirect_uri(RedirectUrl::new(config.redirect_url.clone())?);

        Ok(Self { provider, client })
    }

    /// Get the provider
    pub fn provider(&self) -> OAuthProvider {
        self.provider
    }

    /// Generate an authorization URL with PKCE
    pub fn generate_auth_url(&self) -> (String, CsrfToken, PkceCodeVerifier) {
        let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();

        let mut request = self
            .client
            .authorize_url(CsrfToken::new_random)
            .set_pkce_challenge(pkce_challenge);

        if self.provider == OAuthProvider::Google {
            for scope in ["openid", "email", "profile"] {
                request = request.add_scope(Scope::new(scope.to_string()));
            }
        }

        let (auth_url, csrf_token) = request.url();
        (auth_url.to_string(), csrf_token, pkce_verifier)
    }

    /// Exchange an authorization code for an access token
    pub async fn exchange_code(
        &self,
        code: String,
        pkce_verifier: PkceCodeVerifier,
    ) -> Result<String> {
        info!(provider = self.provider.as_str(), "exchanging authorization code");

        let token_response = self
            .client
            .exchange_code(AuthorizationCode::new(code))
            .set_pkce_verifier(pkce_verifier)
            .request_async(oauth2::reqwest::async_http_client)
            .await
            .map_err(|e| anyhow::anyhow!("code exchange failed: {e}"))?;

        Ok(token_response.access_token().secret().clone())
    }

    /// Fetch the provider profile behind an access token
    pub async fn get_user_profile(&self, access_token: &str) -> Result<OAuthUserProfile> {
        match self.provider {
            OAuthProvider::Google => self.get_google_user_profile(access_token).await,
            OAuthProvider::Naver => self.get_naver_user_profile(access_token).await,
        }
    }

    async fn get_google_user_profile(&self, access_token: &str) -> Result<OAuthUserProfile> {
        let client = reqwest::Client::new();
        let response = client
            .get("https://www.googleapis.com/oauth2/v2/userinfo")
            .bearer_auth(access_token)
            .send()
            .await?;

        if !response.status().is_success() {
            anyhow::bail!("failed to get Google user profile: {}", response.status());
        }

        let google_user: GoogleUser = response.json().await?;
        Ok(OAuthUserProfile {
            id: google_user.id,
            email: google_user.email,
            name: Some(format!(
                "{} {}",
                google_user.given_name, google_user.family_name
            )),
            provider: OAuthProvider::Google,
        })
    }

    async fn get_naver_user_profile(&self, access_token: &str) -> Result<OAuthUserProfile> {
        let client = reqwest::Client::new();
        let response = client
            .get("https://openapi.naver.com/v1/nid/me")
            .bearer_auth(access_token)
            .send()
            .await?;

        if !response.status().is_success() {
            anyhow::bail!("failed to get Naver user profile: {}", response.status());
        }

        let envelope: NaverEnvelope = response.json().await?;
        Ok(OAuthUserProfile {
            id: envelope.response.id,
            email: envelope.response.email,
            name: envelope.response.name,
            provider: OAuthProvider::Naver,
        })
    }
}

/// Google user profile response
#[derive(Debug, Deserialize)]
struct GoogleUser {
    id: String,
    email: String,
    given_name: String,
    family_name: String,
}

/// Naver profile envelope (`resultcode`/`message` wrapper around the profile)
#[derive(Debug, Deserialize)]
struct NaverEnvelope {
    response: NaverUser,
}

#[derive(Debug, Deserialize)]
struct NaverUser {
    id: String,
    email: String,
    name: Option<String>,
}

/// Normalized profile information from any provider
#[derive(Debug, Clone)]
pub struct OAuthUserProfile {
    pub id: String,
    pub email: String,
    pub name: Option<String>,
    pub provider: OAuthProvider,
}

/// OAuth session data stored in Redis between authorize and callback
#[derive(Debug, Serialize, Deserialize)]
pub struct OAuthSession {
    pub csrf_token: String,
    pub pkce_verifier: String,
    pub provider: OAuthProvider,
}

/// Per-provider clients resolved at startup
#[derive(Clone, Default)]
pub struct OAuthRegistry {
    google: Option<OAuthClient>,
    naver: Option<OAuthClient>,
}

impl OAuthRegistry {
    /// Build every configured provider client from the environment
    pub fn from_env() -> Result<Self> {
        let google = OAuthClient::from_env(OAuthProvider::Google)?;
        let naver = OAuthClient::from_env(OAuthProvider::Naver)?;

        for client in [&google, &naver].into_iter().flatten() {
            info!(provider = client.provider().as_str(), "social login configured");
        }

        Ok(Self { google, naver })
    }

    /// Client for `provider`, when configured
    pub fn client(&self, provider: OAuthProvider) -> Option<&OAuthClient> {
        match provider {
            OAuthProvider::Google => self.google.as_ref(),
            OAuthProvider::Naver => self.naver.as_ref(),
        }
    }
}
