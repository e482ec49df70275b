use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Upstream error bodies are cut to this many bytes before being carried around.
const MAX_ERROR_BODY_SIZE: usize = 1000;

pub const DEFAULT_LIMIT: u32 = 50;

#[derive(Debug, thiserror::Error)]
pub enum DataError {
    #[error("{status} - {body}")]
    Upstream { status: u16, body: String },
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeRange {
    ShortTerm,
    #[default]
    MediumTerm,
    LongTerm,
}

impl TimeRange {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeRange::ShortTerm => "short_term",
            TimeRange::MediumTerm => "medium_term",
            TimeRange::LongTerm => "long_term",
        }
    }
}

pub(crate) fn truncate_body(mut text: String) -> String {
    if text.len() > MAX_ERROR_BODY_SIZE {
        let mut cut = MAX_ERROR_BODY_SIZE;
        while !text.is_char_boundary(cut) {
            cut -= 1;
        }
        text.truncate(cut);
    }
    text
}

/// Bearer-authenticated reads against the Web API. The payloads are passed
/// through untouched.
#[derive(Clone)]
pub struct SpotifyClient {
    api_url: String,
    client: reqwest::Client,
}

impl SpotifyClient {
    pub fn new(api_url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            api_url: api_url.into().trim_end_matches('/').to_string(),
            client,
        }
    }

    pub async fn authorized_get(
        &self,
        path: &str,
        access_token: &str,
        query: &[(&str, String)],
    ) -> Result<Value, DataError> {
        let url = format!("{}{}", self.api_url, path);

        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {}", access_token))
            .query(query)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            tracing::debug!(path, status = status.as_u16(), "data request rejected");
            return Err(DataError::Upstream {
                status: status.as_u16(),
                body: truncate_body(text),
            });
        }

        Ok(response.json().await?)
    }

    pub async fn top_artists(
        &self,
        access_token: &str,
        time_range: TimeRange,
        limit: u32,
    ) -> Result<Value, DataError> {
        self.authorized_get(
            "/v1/me/top/artists",
            access_token,
            &[
                ("time_range", time_range.as_str().to_string()),
                ("limit", limit.to_string()),
            ],
        )
        .await
    }

    pub async fn top_tracks(
        &self,
        access_token: &str,
        time_range: TimeRange,
        limit: u32,
    ) -> Result<Value, DataError> {
        self.authorized_get(
            "/v1/me/top/tracks",
            access_token,
            &[
                ("time_range", time_range.as_str().to_string()),
                ("limit", limit.to_string()),
            ],
        )
        .await
    }

    pub async fn playlists(&self, access_token: &str, limit: u32) -> Result<Value, DataError> {
        self.authorized_get(
            "/v1/me/playlists",
            access_token,
            &[("limit", limit.to_string())],
        )
        .await
    }
}
