use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use serde_json::Value;

use crate::config::OAuthConfig;
use crate::spotify::truncate_body;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("identity provider returned {status}: {body}")]
    UpstreamAuth { status: u16, body: String },
    #[error("malformed identity provider response: {0}")]
    MalformedResponse(String),
    #[error("identity provider request failed: {0}")]
    Http(#[from] reqwest::Error),
}

#[derive(Debug, Clone)]
pub struct TokenResponse {
    pub access_token: String,
}

#[derive(Debug, Clone)]
pub struct Profile {
    pub principal_id: String,
    pub display_name: Option<String>,
}

/// Builds the provider's authorization endpoint URL with `response_type=code`.
pub fn authorization_url(
    accounts_url: &str,
    client_id: &str,
    redirect_uri: &str,
    scopes: &[String],
) -> String {
    format!(
        "{}/authorize?client_id={}&response_type=code&redirect_uri={}&scope={}",
        accounts_url.trim_end_matches('/'),
        urlencoding::encode(client_id),
        urlencoding::encode(redirect_uri),
        urlencoding::encode(&scopes.join(" "))
    )
}

/// Authorization-code flow against the identity provider.
pub struct AuthClient {
    config: OAuthConfig,
    client: reqwest::Client,
}

impl AuthClient {
    pub fn new(config: OAuthConfig, client: reqwest::Client) -> Self {
        Self { config, client }
    }

    pub fn authorization_url(&self) -> String {
        authorization_url(
            &self.config.accounts_url,
            &self.config.client_id,
            &self.config.redirect_uri,
            &self.config.scopes,
        )
    }

    /// Trades a single-use authorization code for an access token. Never retried.
    pub async fn exchange_code(&self, code: &str) -> Result<TokenResponse, AuthError> {
        let auth = BASE64_STANDARD.encode(format!(
            "{}:{}",
            self.config.client_id, self.config.client_secret
        ));
        let url = format!(
            "{}/api/token",
            self.config.accounts_url.trim_end_matches('/')
        );

        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.config.redirect_uri.as_str()),
        ];

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Basic {}", auth))
            .form(&params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(AuthError::UpstreamAuth {
                status: status.as_u16(),
                body: truncate_body(text),
            });
        }

        let json: Value = response
            .json()
            .await
            .map_err(|e| AuthError::MalformedResponse(format!("token body: {}", e)))?;

        let access_token = json
            .get("access_token")
            .and_then(|t| t.as_str())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AuthError::MalformedResponse("missing access_token".into()))?;

        Ok(TokenResponse {
            access_token: access_token.to_string(),
        })
    }

    pub async fn fetch_profile(&self, access_token: &str) -> Result<Profile, AuthError> {
        let url = format!("{}/v1/me", self.config.api_url.trim_end_matches('/'));

        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {}", access_token))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(AuthError::UpstreamAuth {
                status: status.as_u16(),
                body: truncate_body(text),
            });
        }

        let json: Value = response
            .json()
            .await
            .map_err(|e| AuthError::MalformedResponse(format!("profile body: {}", e)))?;

        let principal_id = json
            .get("id")
            .and_then(|i| i.as_str())
            .filter(|i| !i.is_empty())
            .ok_or_else(|| AuthError::MalformedResponse("missing id".into()))?;

        Ok(Profile {
            principal_id: principal_id.to_string(),
            display_name: json
                .get("display_name")
                .and_then(|n| n.as_str())
                .map(|n| n.to_string()),
        })
    }
}
