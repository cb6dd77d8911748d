use async_trait::async_trait;
use nga_client::{NgaClient, PayloadFormat};
use ngawatch_core::{CoreError, MonitoredSubject};

/// Fetches the raw listing body for one subject.
#[async_trait]
pub trait PostSource: Send + Sync {
    fn format(&self) -> PayloadFormat;

    async fn fetch(&self, subject: &MonitoredSubject) -> Result<String, CoreError>;
}

#[async_trait]
impl PostSource for NgaClient {
    fn format(&self) -> PayloadFormat {
        NgaClient::format(self)
    }

    async fn fetch(&self, subject: &MonitoredSubject) -> Result<String, CoreError> {
        self.fetch_author_posts(&subject.external_id).await
    }
}
