use std::time::Duration;

use reqwest::StatusCode;
use reqwest::header::ACCEPT;
use reqwest::redirect::Policy;

/// Identifies as a Clash client; some providers only serve YAML to those.
pub const USER_AGENT: &str = "Clash.Meta/1.18.1 Proxygen/0.1.0";

const ACCEPT_TYPES: &str = "application/x-yaml, text/yaml, text/plain";
const TIMEOUT: Duration = Duration::from_secs(30);
const MAX_REDIRECTS: usize = 10;

/// Subscription header carrying usage figures.
pub const USERINFO_HEADER: &str = "subscription-userinfo";

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(#[source] reqwest::Error),

    #[error("upstream returned {status} for {url}")]
    Status { status: StatusCode, url: String },
}

/// Body and usage header of a subscription download.
#[derive(Debug, Clone)]
pub struct Fetched {
    pub body: String,
    pub userinfo: Option<String>,
}

/// Downloads subscription documents from providers.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: reqwest::Client,
}

impl Fetcher {
    /// Providers commonly serve self-signed or mismatched certificates, so
    /// certificate errors are not fatal.
    pub fn new() -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(TIMEOUT)
            .redirect(Policy::limited(MAX_REDIRECTS))
            .danger_accept_invalid_certs(true)
            .build()?;
        Ok(Self { client })
    }

    pub async fn fetch(&self, url: &str) -> Result<Fetched, FetchError> {
        let response = self
            .client
            .get(url)
            .header(ACCEPT, ACCEPT_TYPES)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(url, error = %e, "network error fetching profile");
                FetchError::Network(e)
            })?;

        let status = response.status();
        if status.is_client_error() || status.is_server_error() {
            tracing::error!(url, %status, "upstream rejected profile request");
            return Err(FetchError::Status {
                status,
                url: url.to_owned(),
            });
        }

        let userinfo = response
            .headers()
            .get(USERINFO_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);

        let body = response.text().await.map_err(|e| {
            tracing::error!(url, error = %e, "failed to read profile body");
            FetchError::Network(e)
        })?;

        tracing::debug!(url, bytes = body.len(), userinfo = ?userinfo, "profile downloaded");
        Ok(Fetched { body, userinfo })
    }
}
