use async_trait::async_trait;
use ngawatch_core::{NotifyError, PushService};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

pub const SERVERCHAN_BASE_URL: &str = "https://sctapi.ftqq.com";

/// Where rendered notifications go. Delivery is best effort: callers log the
/// result and never retry.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// False when no usable credential is configured; `send` is then never called.
    fn is_enabled(&self) -> bool;

    async fn send(&self, title: &str, body: &str) -> Result<(), NotifyError>;
}

#[derive(Debug, Deserialize)]
struct ServerChanResponse {
    code: i64,
    #[serde(default)]
    message: String,
}

/// ServerChan (Server酱) WeChat push.
#[derive(Debug)]
pub struct ServerChanSink {
    http_client: Client,
    base_url: String,
    sendkey: Option<String>,
}

impl ServerChanSink {
    pub fn new(push: &PushService) -> Result<Self, reqwest::Error> {
        Self::with_base_url(push, SERVERCHAN_BASE_URL)
    }

    pub fn with_base_url(push: &PushService, base_url: &str) -> Result<Self, reqwest::Error> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(push.timeout))
            .build()?;
        let sendkey = push.sendkey().map(str::to_string);
        if sendkey.is_none() {
            info!("No ServerChan send key configured; notifications will only be logged");
        }

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            sendkey,
        })
    }
}

#[async_trait]
impl NotificationSink for ServerChanSink {
    fn is_enabled(&self) -> bool {
        self.sendkey.is_some()
    }

    async fn send(&self, title: &str, body: &str) -> Result<(), NotifyError> {
        let Some(sendkey) = self.sendkey.as_deref() else {
            debug!("Push disabled, skipping: {}", title);
            return Ok(());
        };

        let url = format!("{}/{}.send", self.base_url, sendkey);
        let response = self
            .http_client
            .post(&url)
            .form(&[("title", title), ("desp", body)])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    NotifyError::RequestTimeout
                } else {
                    NotifyError::RequestFailed {
                        reason: e.to_string(),
                    }
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Rejected {
                status_code: status.as_u16(),
            });
        }

        // A 200 can still carry an application error code.
        let text = response.text().await.unwrap_or_default();
        if let Ok(parsed) = serde_json::from_str::<ServerChanResponse>(&text) {
            if parsed.code != 0 {
                return Err(NotifyError::ServiceError {
                    code: parsed.code,
                    message: parsed.message,
                });
            }
        }
        Ok(())
    }
}
