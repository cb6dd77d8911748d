use crate::error::ConfigError;
use crate::types::MonitoredSubject;
use serde::de::{Deserializer, MapAccess, Visitor};
use serde::Deserialize;
use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_BASE_URL: &str = "https://bbs.nga.cn";

/// Send keys shipped in the sample configuration; treated as "not configured".
const PLACEHOLDER_SENDKEY_PREFIXES: &[&str] = &["SCT_替换", "SCT_REPLACE", "SCT_YOUR"];

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub monitor_settings: MonitorSettings,
    #[serde(deserialize_with = "deserialize_subjects")]
    pub target_users: Vec<MonitoredSubject>,
    pub nga_settings: NgaSettings,
    pub push_service: PushService,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MonitorSettings {
    pub history_file: PathBuf,
    /// Seconds between full rounds.
    pub check_interval: u64,
    #[serde(default = "default_subject_delay")]
    pub subject_delay: u64,
    #[serde(default = "default_subject_delay_jitter")]
    pub subject_delay_jitter: u64,
    #[serde(default)]
    pub diagnostics_dir: Option<PathBuf>,
    #[serde(default)]
    pub history_write_failure: WriteFailurePolicy,
}

/// What to do with a new post whose identity could not be appended to the
/// history log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteFailurePolicy {
    /// Push it anyway; a restart may push it a second time.
    #[default]
    NotifyAnyway,
    /// Withhold the push; the post is still considered seen for this process.
    SkipNotification,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NgaSettings {
    pub user_agent: String,
    pub cookie: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,
    #[serde(default)]
    pub legacy_html: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PushService {
    pub serverchan_sendkey: String,
    #[serde(default = "default_push_timeout")]
    pub timeout: u64,
}

fn default_subject_delay() -> u64 {
    3
}

fn default_subject_delay_jitter() -> u64 {
    2
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_request_timeout() -> u64 {
    15
}

fn default_push_timeout() -> u64 {
    10
}

impl AppConfig {
    /// Reads and validates the configuration file. `.toml` files are parsed
    /// as TOML, everything else as JSON.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let shown = path.display().to_string();
        let raw = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => ConfigError::FileNotFound {
                path: shown.clone(),
            },
            ErrorKind::PermissionDenied => ConfigError::PermissionDenied {
                path: shown.clone(),
            },
            _ => ConfigError::InvalidFormat {
                details: format!("{}: {}", shown, e),
            },
        })?;

        let is_toml = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("toml"))
            .unwrap_or(false);

        debug!("Parsing configuration {} as {}", shown, if is_toml { "TOML" } else { "JSON" });
        if is_toml {
            Self::from_toml_str(&raw)
        } else {
            Self::from_json_str(&raw)
        }
    }

    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw).map_err(|e| ConfigError::InvalidFormat {
            details: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.monitor_settings.history_file.as_os_str().is_empty() {
            return Err(ConfigError::MissingField {
                field: "monitor_settings.history_file".to_string(),
            });
        }
        if self.monitor_settings.check_interval == 0 {
            return Err(ConfigError::InvalidValue {
                field: "monitor_settings.check_interval".to_string(),
                value: "0".to_string(),
            });
        }
        if self.nga_settings.user_agent.trim().is_empty() {
            return Err(ConfigError::MissingField {
                field: "nga_settings.user_agent".to_string(),
            });
        }
        if self.nga_settings.request_timeout == 0 {
            return Err(ConfigError::InvalidValue {
                field: "nga_settings.request_timeout".to_string(),
                value: "0".to_string(),
            });
        }
        let base = self.nga_settings.base_url.as_str();
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(ConfigError::InvalidValue {
                field: "nga_settings.base_url".to_string(),
                value: base.to_string(),
            });
        }
        if self.target_users.is_empty() {
            return Err(ConfigError::ValidationFailed {
                reason: "target_users must name at least one user".to_string(),
            });
        }
        for (i, subject) in self.target_users.iter().enumerate() {
            if subject.external_id.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "target_users".to_string(),
                    value: format!("empty uid for '{}'", subject.display_name),
                });
            }
            if self.target_users[..i]
                .iter()
                .any(|earlier| earlier.external_id == subject.external_id)
            {
                return Err(ConfigError::ValidationFailed {
                    reason: format!("uid {} is listed twice in target_users", subject.external_id),
                });
            }
        }
        Ok(())
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.monitor_settings.check_interval)
    }
}

impl PushService {
    /// The send key, or `None` when it is empty or still the sample placeholder.
    pub fn sendkey(&self) -> Option<&str> {
        let key = self.serverchan_sendkey.trim();
        if key.is_empty()
            || PLACEHOLDER_SENDKEY_PREFIXES
                .iter()
                .any(|prefix| key.starts_with(prefix))
        {
            None
        } else {
            Some(key)
        }
    }
}

/// Keeps `target_users` in file order, which is the polling order.
fn deserialize_subjects<'de, D>(deserializer: D) -> Result<Vec<MonitoredSubject>, D::Error>
where
    D: Deserializer<'de>,
{
    struct SubjectsVisitor;

    impl<'de> Visitor<'de> for SubjectsVisitor {
        type Value = Vec<MonitoredSubject>;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a mapping of user id to display name")
        }

        fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
        where
            A: MapAccess<'de>,
        {
            let mut subjects = Vec::with_capacity(map.size_hint().unwrap_or(0));
            while let Some((uid, name)) = map.next_entry::<String, String>()? {
                subjects.push(MonitoredSubject::new(uid.trim(), name));
            }
            Ok(subjects)
        }
    }

    deserializer.deserialize_map(SubjectsVisitor)
}
