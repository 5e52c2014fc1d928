use crate::errors::FeedError;
use anyhow::Context;
use helpers::general::InputValueError;
use serde::Deserialize;
use std::future::Future;
use tracing::debug;

const USER_AGENT: &str = concat!("racefeed/", env!("CARGO_PKG_VERSION"));

/// * `base_url` - Upstream racing endpoint
/// * `proxy_url` - Optional same-origin relay that forwards to the upstream endpoint
/// * `method` - Upstream method returning the next races to go
/// * `max_retries` - Attempts of a retrying fetch before giving up
/// * `retry_delay_ms` - (ms) Base delay of the exponential backoff between attempts
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ApiPars {
    pub base_url: String,
    pub proxy_url: Option<String>,
    pub method: String,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
}

impl Default for ApiPars {
    fn default() -> Self {
        ApiPars {
            base_url: "https://api.neds.com.au/rest/v1/racing/".to_owned(),
            proxy_url: None,
            method: "nextraces".to_owned(),
            max_retries: 3,
            retry_delay_ms: 1000,
        }
    }
}

/// RaceSource is the transport seam of the feed: it returns the raw response body for a request of
/// count races. Implementations must not interpret the body.
pub trait RaceSource {
    fn fetch_body(&self, count: u32) -> impl Future<Output = Result<String, FeedError>> + Send;
}

#[derive(Debug, Clone)]
enum Route {
    Upstream { url: String, method: String },
    Relay { url: String },
}

/// HttpRaceSource requests races over HTTP, either from the upstream API directly or through the
/// relay. Both routes serve the same response shape. No request timeout is set on top of the
/// transport's own.
#[derive(Debug, Clone)]
pub struct HttpRaceSource {
    client: reqwest::Client,
    route: Route,
}

impl HttpRaceSource {
    /// new selects the route and builds the HTTP client. Requesting the relay without a configured
    /// proxy_url is a configuration error.
    pub fn new(api_pars: &ApiPars, use_proxy: bool) -> anyhow::Result<HttpRaceSource> {
        let route = match (&api_pars.proxy_url, use_proxy) {
            (Some(proxy_url), true) => Route::Relay {
                url: proxy_url.to_owned(),
            },
            (None, true) => {
                return Err(InputValueError)
                    .context("use_proxy is set, but no proxy_url is configured!")
            }
            (_, false) => Route::Upstream {
                url: api_pars.base_url.to_owned(),
                method: api_pars.method.to_owned(),
            },
        };

        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to build the HTTP client!")?;

        Ok(HttpRaceSource { client, route })
    }
}

impl RaceSource for HttpRaceSource {
    async fn fetch_body(&self, count: u32) -> Result<String, FeedError> {
        let count_str = count.to_string();
        let request = match &self.route {
            Route::Upstream { url, method } => self
                .client
                .get(url)
                .query(&[("method", method.as_str()), ("count", count_str.as_str())]),
            Route::Relay { url } => self.client.get(url).query(&[("count", count_str.as_str())]),
        };

        let response = request
            .header("Content-Type", "application/json")
            .send()
            .await?
            .error_for_status()?;

        debug!(status = %response.status(), count, "race response received");

        Ok(response.text().await?)
    }
}
