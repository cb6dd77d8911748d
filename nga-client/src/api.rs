use crate::extract::PayloadFormat;
use ngawatch_core::{CoreError, NgaApiError, NgaSettings};
use reqwest::header::{ACCEPT, COOKIE};
use reqwest::{Client, StatusCode};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use url::Url;

const SEARCH_PATH: &str = "/thread.php";
/// `__output=11` asks NGA for the JSON rendering of a listing.
const JSON_OUTPUT_PARAM: (&str, &str) = ("__output", "11");
const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

#[derive(Debug)]
pub struct NgaClient {
    http_client: Client,
    base_url: Url,
    cookie: String,
    format: PayloadFormat,
    timeout: Duration,
}

impl NgaClient {
    pub fn new(settings: &NgaSettings) -> Result<Self, CoreError> {
        let base_url = Url::parse(&settings.base_url).map_err(|e| NgaApiError::InvalidUrl {
            details: format!("{}: {}", settings.base_url, e),
        })?;
        let timeout = Duration::from_secs(settings.request_timeout);

        let http_client = Client::builder()
            .user_agent(&settings.user_agent)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            http_client,
            base_url,
            cookie: settings.cookie.clone(),
            format: if settings.legacy_html {
                PayloadFormat::LegacyHtml
            } else {
                PayloadFormat::Json
            },
            timeout,
        })
    }

    pub fn format(&self) -> PayloadFormat {
        self.format
    }

    /// Search-by-author listing for `uid`: threads started and replies made.
    pub fn search_url(&self, uid: &str) -> Result<Url, NgaApiError> {
        let mut url = self
            .base_url
            .join(SEARCH_PATH)
            .map_err(|e| NgaApiError::InvalidUrl {
                details: e.to_string(),
            })?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("authorid", uid.trim());
            query.append_pair("searchpost", "1");
            if self.format == PayloadFormat::Json {
                query.append_pair(JSON_OUTPUT_PARAM.0, JSON_OUTPUT_PARAM.1);
            }
        }
        Ok(url)
    }

    /// Fetches the raw listing body for `uid`. Any non-2xx status is an error;
    /// the body is returned untouched for the extractor.
    pub async fn fetch_author_posts(&self, uid: &str) -> Result<String, CoreError> {
        let url = self.search_url(uid)?;
        let start_time = Instant::now();

        let mut request_builder = self.http_client.get(url.clone());
        if !self.cookie.is_empty() {
            request_builder = request_builder.header(COOKIE, &self.cookie);
        }
        if self.format == PayloadFormat::Json {
            request_builder = request_builder.header(ACCEPT, "application/json, text/plain, */*");
        }

        info!(uid = %uid, "Fetching NGA listing");
        let response = request_builder
            .send()
            .await
            .map_err(|e| self.transport_error(uid, e))?;

        let status = response.status();
        if !status.is_success() {
            error!(uid = %uid, "Listing request failed with status: {}", status);
            return Err(match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => NgaApiError::Forbidden {
                    uid: uid.to_string(),
                    status_code: status.as_u16(),
                },
                StatusCode::TOO_MANY_REQUESTS => {
                    let retry_after = response
                        .headers()
                        .get("retry-after")
                        .and_then(|value| value.to_str().ok())
                        .and_then(|value| value.trim().parse::<u64>().ok())
                        .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
                    warn!("Rate limited, retry after {} seconds", retry_after);
                    NgaApiError::RateLimitExceeded { retry_after }
                }
                _ => NgaApiError::ServerError {
                    status_code: status.as_u16(),
                },
            }
            .into());
        }

        let body = response
            .text()
            .await
            .map_err(|e| self.transport_error(uid, e))?;
        debug!(
            uid = %uid,
            "Listing fetched: {} bytes in {:?}",
            body.len(),
            start_time.elapsed()
        );
        Ok(body)
    }

    fn transport_error(&self, uid: &str, e: reqwest::Error) -> CoreError {
        if e.is_timeout() {
            warn!(uid = %uid, "Listing request timed out after {:?}", self.timeout);
            CoreError::NgaApi(NgaApiError::RequestTimeout)
        } else {
            error!(uid = %uid, "Network error fetching listing: {}", e);
            CoreError::Network(e)
        }
    }
}
