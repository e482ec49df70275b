use std::ops::RangeInclusive;
use std::time::Duration;

const DEFAULT_ACCOUNTS_URL: &str = "https://accounts.spotify.com";
const DEFAULT_API_URL: &str = "https://api.spotify.com";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Upper bound for `SESSION_TTL_DAYS`, roughly ten years.
pub const MAX_SESSION_TTL_DAYS: i64 = 3650;

pub const SCOPES: &[&str] = &[
    "user-read-private",
    "user-read-email",
    "user-top-read",
    "user-library-read",
    "playlist-read-private",
    "playlist-read-collaborative",
    "user-follow-read",
];

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set in .env file")]
    Missing(&'static str),
    #[error("{name} has an invalid value: {value}")]
    Invalid { name: &'static str, value: String },
}

/// Credentials and endpoints for the identity provider.
#[derive(Clone)]
pub struct OAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
    pub accounts_url: String,
    pub api_url: String,
}

impl std::fmt::Debug for OAuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("redirect_uri", &self.redirect_uri)
            .field("accounts_url", &self.accounts_url)
            .field("api_url", &self.api_url)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub enum StorageConfig {
    Gcs {
        bucket: String,
        endpoint: Option<String>,
        access_token: Option<String>,
    },
    Local {
        root: String,
    },
}

#[derive(Debug, Clone)]
pub struct CookieConfig {
    pub secure: bool,
    pub ttl_days: i64,
}

impl CookieConfig {
    /// Server-side session lifetime, matching the cookie's Max-Age.
    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_days.max(0) as u64 * 24 * 60 * 60)
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub oauth: OAuthConfig,
    pub storage: StorageConfig,
    pub cookie: CookieConfig,
    pub bind_addr: String,
    pub port: u16,
    pub http_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let client_id = required(&["SPOTIFY_CLIENT_ID", "REACT_APP_SPOTIFY_CLIENT_ID"])?;
        let client_secret = required(&["SPOTIFY_CLIENT_SECRET"])?;
        let redirect_uri = required(&["SPOTIFY_REDIRECT_URI", "REACT_APP_REDIRECT_URI"])?;

        let oauth = OAuthConfig {
            client_id,
            client_secret,
            redirect_uri,
            scopes: SCOPES.iter().map(|s| s.to_string()).collect(),
            accounts_url: optional("SPOTIFY_ACCOUNTS_URL")
                .unwrap_or_else(|| DEFAULT_ACCOUNTS_URL.to_string()),
            api_url: optional("SPOTIFY_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string()),
        };

        let storage = match optional("GCS_BUCKET_NAME") {
            Some(bucket) => StorageConfig::Gcs {
                bucket,
                endpoint: optional("STORAGE_EMULATOR_HOST"),
                access_token: optional("GCS_ACCESS_TOKEN"),
            },
            None => StorageConfig::Local {
                root: optional("DATA_DIR").unwrap_or_else(|| "fetched_data".to_string()),
            },
        };

        let cookie = CookieConfig {
            secure: parsed("COOKIE_SECURE", true)?,
            ttl_days: bounded("SESSION_TTL_DAYS", 30, 1..=MAX_SESSION_TTL_DAYS)?,
        };

        Ok(Self {
            oauth,
            storage,
            cookie,
            bind_addr: optional("BIND_ADDR").unwrap_or_else(|| "127.0.0.1".to_string()),
            port: parsed("PORT", 8000)?,
            http_timeout: Duration::from_secs(parsed("HTTP_TIMEOUT_SECS", 15)?),
        })
    }
}

/// Shared client for every upstream call. A timed-out request fails like any
/// other transport error.
pub fn http_client(timeout: Duration) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .connect_timeout(CONNECT_TIMEOUT.min(timeout))
        .build()
}

fn optional(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn required(names: &[&'static str]) -> Result<String, ConfigError> {
    names
        .iter()
        .find_map(|name| optional(name))
        .ok_or(ConfigError::Missing(names[0]))
}

fn parsed<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match optional(name) {
        Some(value) => value
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::Invalid { name, value }),
        None => Ok(default),
    }
}

fn bounded(
    name: &'static str,
    default: i64,
    range: RangeInclusive<i64>,
) -> Result<i64, ConfigError> {
    let value = parsed(name, default)?;
    if range.contains(&value) {
        Ok(value)
    } else {
        Err(ConfigError::Invalid {
            name,
            value: value.to_string(),
        })
    }
}
