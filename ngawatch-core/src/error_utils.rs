use crate::error::*;
use std::time::Duration;
use tracing::{error, info, warn};

pub trait ErrorExt {
    fn log_error(&self) -> &Self;
    fn log_warn(&self) -> &Self;
    fn is_retryable(&self) -> bool;
    fn retry_after(&self) -> Option<Duration>;
    fn user_friendly_message(&self) -> String;
    fn error_code(&self) -> String;
}

impl ErrorExt for CoreError {
    fn log_error(&self) -> &Self {
        error!("CoreError: {}", self);
        match self {
            CoreError::NgaApi(e) => {
                error!("NGA API error details: {:?}", e);
            }
            CoreError::History(e) => {
                error!("History store error details: {:?}", e);
            }
            CoreError::Notify(e) => {
                error!("Notification error details: {:?}", e);
            }
            CoreError::Config(e) => {
                error!("Configuration error details: {:?}", e);
            }
            CoreError::Network(e) => {
                error!("Network error details: {:?}", e);
            }
        }
        self
    }

    fn log_warn(&self) -> &Self {
        warn!("CoreError (warning): {}", self);
        self
    }

    fn is_retryable(&self) -> bool {
        match self {
            CoreError::NgaApi(e) => e.is_retryable(),
            CoreError::History(e) => e.is_retryable(),
            CoreError::Notify(e) => e.is_retryable(),
            CoreError::Network(_) => true,
            CoreError::Config(_) => false,
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            CoreError::NgaApi(NgaApiError::RateLimitExceeded { retry_after }) => {
                Some(Duration::from_secs(*retry_after))
            }
            _ => None,
        }
    }

    fn user_friendly_message(&self) -> String {
        match self {
            CoreError::NgaApi(e) => e.user_friendly_message(),
            CoreError::History(e) => e.user_friendly_message(),
            CoreError::Notify(e) => e.user_friendly_message(),
            CoreError::Config(e) => e.user_friendly_message(),
            CoreError::Network(_) => {
                "Network connection error. Please check your internet connection.".to_string()
            }
        }
    }

    fn error_code(&self) -> String {
        match self {
            CoreError::NgaApi(_) => "NGA_API".to_string(),
            CoreError::History(_) => "HISTORY".to_string(),
            CoreError::Notify(_) => "NOTIFY".to_string(),
            CoreError::Config(_) => "CONFIG".to_string(),
            CoreError::Network(_) => "NETWORK".to_string(),
        }
    }
}

impl ErrorExt for NgaApiError {
    fn log_error(&self) -> &Self {
        error!("NgaApiError: {}", self);
        self
    }

    fn log_warn(&self) -> &Self {
        warn!("NgaApiError (warning): {}", self);
        self
    }

    fn is_retryable(&self) -> bool {
        match self {
            NgaApiError::RateLimitExceeded { .. } => true,
            NgaApiError::RequestTimeout => true,
            NgaApiError::ServerError { status_code } => *status_code >= 500,
            NgaApiError::UnparseablePayload { .. } => true,
            _ => false,
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            NgaApiError::RateLimitExceeded { retry_after } => {
                Some(Duration::from_secs(*retry_after))
            }
            _ => None,
        }
    }

    fn user_friendly_message(&self) -> String {
        match self {
            NgaApiError::Forbidden { .. } => {
                "NGA refused the request. Please refresh the cookie in the configuration."
                    .to_string()
            }
            NgaApiError::RateLimitExceeded { retry_after } => format!(
                "Too many requests to NGA. Waiting {} seconds before the next user.",
                retry_after
            ),
            NgaApiError::RequestTimeout => {
                "Request to NGA timed out. It will be retried next round.".to_string()
            }
            NgaApiError::UnparseablePayload { .. } => {
                "NGA returned a page that could not be read. It will be retried next round."
                    .to_string()
            }
            _ => "NGA API error occurred. It will be retried next round.".to_string(),
        }
    }

    fn error_code(&self) -> String {
        match self {
            NgaApiError::Forbidden { .. } => "NGA_FORBIDDEN".to_string(),
            NgaApiError::RateLimitExceeded { .. } => "NGA_RATE_LIMIT".to_string(),
            NgaApiError::RequestTimeout => "NGA_TIMEOUT".to_string(),
            NgaApiError::ServerError { .. } => "NGA_SERVER_ERROR".to_string(),
            NgaApiError::InvalidUrl { .. } => "NGA_INVALID_URL".to_string(),
            NgaApiError::UnparseablePayload { .. } => "NGA_UNPARSEABLE_PAYLOAD".to_string(),
        }
    }
}

impl ErrorExt for HistoryError {
    fn log_error(&self) -> &Self {
        error!("HistoryError: {}", self);
        self
    }

    fn log_warn(&self) -> &Self {
        warn!("HistoryError (warning): {}", self);
        self
    }

    fn is_retryable(&self) -> bool {
        false
    }

    fn retry_after(&self) -> Option<Duration> {
        None
    }

    fn user_friendly_message(&self) -> String {
        match self {
            HistoryError::ReadFailed { path, .. } => {
                format!("Could not read the history file '{}'.", path)
            }
            HistoryError::AppendFailed { path, .. } => format!(
                "Could not write to the history file '{}'. Posts may be notified again after a restart.",
                path
            ),
            HistoryError::Unavailable { .. } => "History storage is unavailable.".to_string(),
        }
    }

    fn error_code(&self) -> String {
        match self {
            HistoryError::ReadFailed { .. } => "HISTORY_READ_FAILED".to_string(),
            HistoryError::AppendFailed { .. } => "HISTORY_APPEND_FAILED".to_string(),
            HistoryError::Unavailable { .. } => "HISTORY_UNAVAILABLE".to_string(),
        }
    }
}

impl ErrorExt for NotifyError {
    fn log_error(&self) -> &Self {
        error!("NotifyError: {}", self);
        self
    }

    fn log_warn(&self) -> &Self {
        warn!("NotifyError (warning): {}", self);
        self
    }

    // Delivery is fire-and-forget; nothing is ever retried.
    fn is_retryable(&self) -> bool {
        false
    }

    fn retry_after(&self) -> Option<Duration> {
        None
    }

    fn user_friendly_message(&self) -> String {
        match self {
            NotifyError::Rejected { status_code } => {
                format!("The push service rejected the message (HTTP {}).", status_code)
            }
            NotifyError::ServiceError { message, .. } => {
                format!("The push service reported an error: {}", message)
            }
            NotifyError::RequestTimeout => "The push service did not answer in time.".to_string(),
            NotifyError::RequestFailed { .. } => {
                "Could not reach the push service. Please check your connection.".to_string()
            }
        }
    }

    fn error_code(&self) -> String {
        match self {
            NotifyError::Rejected { .. } => "NOTIFY_REJECTED".to_string(),
            NotifyError::ServiceError { .. } => "NOTIFY_SERVICE_ERROR".to_string(),
            NotifyError::RequestFailed { .. } => "NOTIFY_REQUEST_FAILED".to_string(),
            NotifyError::RequestTimeout => "NOTIFY_TIMEOUT".to_string(),
        }
    }
}

impl ErrorExt for ConfigError {
    fn log_error(&self) -> &Self {
        error!("ConfigError: {}", self);
        self
    }

    fn log_warn(&self) -> &Self {
        warn!("ConfigError (warning): {}", self);
        self
    }

    fn is_retryable(&self) -> bool {
        false
    }

    fn retry_after(&self) -> Option<Duration> {
        None
    }

    fn user_friendly_message(&self) -> String {
        match self {
            ConfigError::FileNotFound { path } => {
                format!("Configuration file '{}' not found. Please check the path.", path)
            }
            ConfigError::InvalidFormat { .. } | ConfigError::Parse(_) => {
                "Configuration file format is invalid. Please check its syntax.".to_string()
            }
            ConfigError::MissingField { field } => {
                format!("Required configuration field '{}' is missing.", field)
            }
            ConfigError::InvalidValue { field, .. } => {
                format!("Invalid value for configuration field '{}'.", field)
            }
            ConfigError::PermissionDenied { .. } => {
                "Permission denied accessing configuration. Please check file permissions."
                    .to_string()
            }
            ConfigError::ValidationFailed { reason } => {
                format!("Configuration is not usable: {}", reason)
            }
        }
    }

    fn error_code(&self) -> String {
        match self {
            ConfigError::FileNotFound { .. } => "CONFIG_FILE_NOT_FOUND".to_string(),
            ConfigError::InvalidFormat { .. } => "CONFIG_INVALID_FORMAT".to_string(),
            ConfigError::MissingField { .. } => "CONFIG_MISSING_FIELD".to_string(),
            ConfigError::InvalidValue { .. } => "CONFIG_INVALID_VALUE".to_string(),
            ConfigError::ValidationFailed { .. } => "CONFIG_VALIDATION_FAILED".to_string(),
            ConfigError::PermissionDenied { .. } => "CONFIG_PERMISSION_DENIED".to_string(),
            ConfigError::Parse(_) => "CONFIG_PARSE_ERROR".to_string(),
        }
    }
}

/// Logs an error together with its code and a message fit for the operator.
#[derive(Debug, Default, Clone, Copy)]
pub struct ErrorReporter;

impl ErrorReporter {
    pub fn new() -> Self {
        Self
    }

    pub fn report_error(&self, error: &CoreError) {
        error.log_error();
        info!("Error code: {}", error.error_code());
        info!("User message: {}", error.user_friendly_message());
    }

    /// For failures the program carries on from, such as one user's poll.
    pub fn report_warning(&self, error: &CoreError) {
        error.log_warn();
        if error.is_retryable() {
            info!("Error code {} is transient", error.error_code());
        } else {
            info!("Error code {}: {}", error.error_code(), error.user_friendly_message());
        }
    }
}
