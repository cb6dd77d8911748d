use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("NGA API error: {0}")]
    NgaApi(#[from] NgaApiError),

    #[error("History store error: {0}")]
    History(#[from] HistoryError),

    #[error("Notification error: {0}")]
    Notify(#[from] NotifyError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

#[derive(Error, Debug, Clone)]
pub enum NgaApiError {
    #[error("Access forbidden for uid {uid} (status {status_code}); the cookie may be stale")]
    Forbidden { uid: String, status_code: u16 },

    #[error("Rate limit exceeded. Retry after {retry_after} seconds")]
    RateLimitExceeded { retry_after: u64 },

    #[error("Request timeout")]
    RequestTimeout,

    #[error("Server error: {status_code}")]
    ServerError { status_code: u16 },

    #[error("Invalid request URL: {details}")]
    InvalidUrl { details: String },

    /// The body could not be read as structured data at all, typically an
    /// HTML error page served in place of the JSON listing.
    #[error("Unparseable payload for uid {uid}: {reason}")]
    UnparseablePayload { uid: String, reason: String },
}

#[derive(Error, Debug)]
pub enum HistoryError {
    #[error("Failed to read history log {path}: {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to append {identity} to history log {path}: {source}")]
    AppendFailed {
        identity: String,
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("History log unavailable: {reason}")]
    Unavailable { reason: String },
}

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Push service rejected the message with status {status_code}")]
    Rejected { status_code: u16 },

    #[error("Push service returned error code {code}: {message}")]
    ServiceError { code: i64, message: String },

    #[error("Push request failed: {reason}")]
    RequestFailed { reason: String },

    #[error("Push request timed out")]
    RequestTimeout,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },

    #[error("Invalid configuration format: {details}")]
    InvalidFormat { details: String },

    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid value for {field}: {value}")]
    InvalidValue { field: String, value: String },

    #[error("Configuration validation failed: {reason}")]
    ValidationFailed { reason: String },

    #[error("Permission denied accessing config: {path}")]
    PermissionDenied { path: String },

    #[error("Configuration parsing error: {0}")]
    Parse(#[from] toml::de::Error),
}
