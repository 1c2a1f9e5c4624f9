//! Installer configuration.
//!
//! Configuration is read from an INI file (`config.ini` in the platform
//! config directory by default). Every key is optional; anything absent
//! keeps its default value.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use ini::Ini;
use uuid::Uuid;

use crate::transport::RetryPolicy;

/// Environment variable that switches the installer into update mode.
pub const UPDATE_MODE_ENV: &str = "NETINSTALL_UPDATE_MODE";

/// Default transport connect/read timeout.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default resolver timeout. Resolution must never stall the front-end.
pub const DEFAULT_RESOLVE_TIMEOUT_SECS: u64 = 10;

/// Default number of retries on 5xx responses.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default initial backoff between retries.
pub const DEFAULT_BACKOFF_MS: u64 = 500;

/// Placeholder substituted with the version tag in the asset URL template.
pub const VERSION_PLACEHOLDER: &str = "{version}";

/// Executable suffix of release assets for the current platform.
pub fn default_platform_suffix() -> &'static str {
    if cfg!(target_os = "windows") {
        ".exe"
    } else if cfg!(target_os = "macos") {
        ".dmg"
    } else {
        ".AppImage"
    }
}

/// Errors raised while loading configuration.
#[derive(Debug)]
pub enum ConfigError {
    /// The INI file could not be read or parsed.
    Load { path: PathBuf, reason: String },
    /// A key holds a value of the wrong shape.
    InvalidValue {
        section: &'static str,
        key: &'static str,
        value: String,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Load { path, reason } => {
                write!(f, "failed to load config {}: {}", path.display(), reason)
            }
            Self::InvalidValue {
                section,
                key,
                value,
            } => write!(f, "invalid value for [{}] {}: {:?}", section, key, value),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Where the installer looks for the setup executable.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceConfig {
    /// Version-info endpoint returning `{ appVer, status }`.
    pub version_url: String,
    /// Direct asset URL, with `{version}` placeholders.
    pub asset_url_template: String,
    /// Release listing API base; `/latest` is appended.
    pub releases_api: String,
    /// Authenticated secondary mirror. When set it is the only fallback and
    /// the release listing is never consulted; `None` falls back to the
    /// listing instead.
    pub mirror_url: Option<String>,
    /// Download-count endpoint. `None` disables the ping.
    pub telemetry_url: Option<String>,
    /// Asset name suffix to pick from the release listing.
    pub platform_suffix: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            version_url: "https://api.ascendara.app".to_string(),
            asset_url_template:
                "https://github.com/tagoWorks/ascendara/releases/download/{version}/Ascendara.Setup.{version}.exe"
                    .to_string(),
            releases_api: "https://api.github.com/repos/ascendara/Ascendara/releases".to_string(),
            mirror_url: Some("https://lfs.ascendara.app/download".to_string()),
            telemetry_url: None,
            platform_suffix: default_platform_suffix().to_string(),
        }
    }
}

/// Credentials for the authenticated mirror.
#[derive(Clone, PartialEq)]
pub struct AuthConfig {
    pub client_id: Uuid,
    pub secret: Vec<u8>,
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("client_id", &self.client_id)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Configuration for an installer run.
#[derive(Debug, Clone)]
pub struct InstallerConfig {
    /// Remote sources.
    pub sources: SourceConfig,

    /// Mirror credentials. Without them mirror requests go out unsigned.
    pub auth: Option<AuthConfig>,

    /// Directory the setup executable is downloaded into.
    pub download_dir: PathBuf,

    /// File name of the downloaded setup executable.
    pub file_name: String,

    /// Transport connect/read timeout.
    pub timeout: Duration,

    /// Resolver request timeout.
    pub resolve_timeout: Duration,

    /// Retries on 5xx responses (attempts = retries + 1).
    pub max_retries: u32,

    /// Initial backoff delay; doubles with every retry.
    pub backoff: Duration,

    /// Update mode appends `?update=1` to mirror and telemetry requests.
    pub update_mode: bool,
}

impl Default for InstallerConfig {
    fn default() -> Self {
        let file_name = if cfg!(target_os = "windows") {
            "AscendaraInstaller.exe"
        } else {
            "AscendaraInstaller"
        };
        Self {
            sources: SourceConfig::default(),
            auth: None,
            download_dir: std::env::temp_dir(),
            file_name: file_name.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            resolve_timeout: Duration::from_secs(DEFAULT_RESOLVE_TIMEOUT_SECS),
            max_retries: DEFAULT_MAX_RETRIES,
            backoff: Duration::from_millis(DEFAULT_BACKOFF_MS),
            update_mode: false,
        }
    }
}

impl InstallerConfig {
    /// Default location of the configuration file.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("netinstall").join("config.ini"))
    }

    /// Load configuration from an INI file.
    ///
    /// A missing file yields the defaults. The update-mode environment
    /// variable is applied last.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let config = if path.exists() {
            let ini = Ini::load_from_file(path).map_err(|e| ConfigError::Load {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
            Self::from_ini(&ini)?
        } else {
            Self::default()
        };
        Ok(config.with_env_overrides())
    }

    /// Parse configuration from INI text.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_str(text).map_err(|e| ConfigError::Load {
            path: PathBuf::from("<string>"),
            reason: e.to_string(),
        })?;
        Self::from_ini(&ini)
    }

    fn from_ini(ini: &Ini) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let get = |section: &str, key: &str| -> Option<String> {
            ini.section(Some(section))
                .and_then(|props| props.get(key))
                .map(|v| v.trim().to_string())
        };

        if let Some(v) = get("sources", "version_url") {
            config.sources.version_url = v;
        }
        if let Some(v) = get("sources", "asset_url_template") {
            config.sources.asset_url_template = v;
        }
        if let Some(v) = get("sources", "releases_api") {
            config.sources.releases_api = v;
        }
        if let Some(v) = get("sources", "mirror_url") {
            config.sources.mirror_url = non_empty(v);
        }
        if let Some(v) = get("sources", "telemetry_url") {
            config.sources.telemetry_url = non_empty(v);
        }
        if let Some(v) = get("sources", "platform_suffix") {
            config.sources.platform_suffix = v;
        }

        let client_id = get("auth", "client_id");
        let secret = get("auth", "secret");
        if let (Some(id), Some(secret)) = (client_id, secret) {
            let client_id = Uuid::parse_str(&id).map_err(|_| ConfigError::InvalidValue {
                section: "auth",
                key: "client_id",
                value: id.clone(),
            })?;
            config.auth = Some(AuthConfig {
                client_id,
                secret: secret.into_bytes(),
            });
        }

        if let Some(v) = get("download", "directory") {
            config.download_dir = PathBuf::from(v);
        }
        if let Some(v) = get("download", "file_name") {
            config.file_name = v;
        }
        if let Some(v) = get("download", "timeout_secs") {
            config.timeout = Duration::from_secs(parse_number("download", "timeout_secs", v)?);
        }
        if let Some(v) = get("download", "resolve_timeout_secs") {
            let secs: u64 = parse_number("download", "resolve_timeout_secs", v)?;
            config.resolve_timeout = Duration::from_secs(secs.min(DEFAULT_RESOLVE_TIMEOUT_SECS));
        }
        if let Some(v) = get("download", "max_retries") {
            config.max_retries = parse_number("download", "max_retries", v)?;
        }
        if let Some(v) = get("download", "backoff_ms") {
            config.backoff = Duration::from_millis(parse_number("download", "backoff_ms", v)?);
        }
        if let Some(v) = get("general", "update_mode") {
            config.update_mode = parse_bool("general", "update_mode", v)?;
        }

        Ok(config)
    }

    /// Apply environment overrides.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(value) = std::env::var(UPDATE_MODE_ENV) {
            if let Ok(flag) = parse_bool("general", "update_mode", value) {
                self.update_mode = flag;
            }
        }
        self
    }

    /// Set the remote sources.
    pub fn with_sources(mut self, sources: SourceConfig) -> Self {
        self.sources = sources;
        self
    }

    /// Set mirror credentials.
    pub fn with_auth(mut self, client_id: Uuid, secret: impl Into<Vec<u8>>) -> Self {
        self.auth = Some(AuthConfig {
            client_id,
            secret: secret.into(),
        });
        self
    }

    /// Set the download directory.
    pub fn with_download_dir(mut self, dir: PathBuf) -> Self {
        self.download_dir = dir;
        self
    }

    /// Set the transport timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set retry count and initial backoff.
    pub fn with_retries(mut self, max_retries: u32, backoff: Duration) -> Self {
        self.max_retries = max_retries;
        self.backoff = backoff;
        self
    }

    /// Enable or disable update mode.
    pub fn with_update_mode(mut self, update_mode: bool) -> Self {
        self.update_mode = update_mode;
        self
    }

    /// Full path of the downloaded setup executable.
    pub fn destination(&self) -> PathBuf {
        self.download_dir.join(&self.file_name)
    }

    /// Retry policy for the transport.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::exponential(self.max_retries.saturating_add(1), self.backoff)
    }
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

fn parse_number<T: FromStr>(
    section: &'static str,
    key: &'static str,
    value: String,
) -> Result<T, ConfigError> {
    value
        .parse::<T>()
        .map_err(|_| ConfigError::InvalidValue {
            section,
            key,
            value,
        })
}

fn parse_bool(section: &'static str, key: &'static str, value: String) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            section,
            key,
            value,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = InstallerConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.resolve_timeout, Duration::from_secs(10));
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.backoff, Duration::from_millis(500));
        assert!(!config.update_mode);
        assert!(config.auth.is_none());
        assert!(config.sources.mirror_url.is_some());
    }

    #[test]
    fn test_parse_full_file() {
        let text = r#"
[sources]
version_url = http://localhost:1/version
asset_url_template = http://localhost:1/dl/{version}/Setup.{version}.exe
releases_api = http://localhost:1/releases
mirror_url =
telemetry_url = http://localhost:1/count
platform_suffix = .exe

[auth]
client_id = 6f1c2a64-2b9e-4d7a-9d58-2a4d1c3e7f10
secret = hunter2

[download]
directory = /var/tmp/setup
file_name = Setup.exe
timeout_secs = 45
resolve_timeout_secs = 5
max_retries = 2
backoff_ms = 250

[general]
update_mode = yes
"#;
        let config = InstallerConfig::parse(text).unwrap();
        assert_eq!(config.sources.version_url, "http://localhost:1/version");
        assert_eq!(config.sources.mirror_url, None);
        assert_eq!(
            config.sources.telemetry_url.as_deref(),
            Some("http://localhost:1/count")
        );
        let auth = config.auth.as_ref().unwrap();
        assert_eq!(auth.secret, b"hunter2".to_vec());
        assert_eq!(config.destination(), PathBuf::from("/var/tmp/setup/Setup.exe"));
        assert_eq!(config.timeout, Duration::from_secs(45));
        assert_eq!(config.resolve_timeout, Duration::from_secs(5));
        assert_eq!(config.max_retries, 2);
        assert_eq!(config.backoff, Duration::from_millis(250));
        assert!(config.update_mode);
    }

    #[test]
    fn test_resolve_timeout_is_capped() {
        let config = InstallerConfig::parse("[download]\nresolve_timeout_secs = 60\n").unwrap();
        assert_eq!(config.resolve_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_max_retries_out_of_range_is_rejected() {
        let err = InstallerConfig::parse("[download]\nmax_retries = 4294967296\n").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                key: "max_retries",
                ..
            }
        ));
    }

    #[test]
    fn test_max_retries_at_limit_does_not_overflow() {
        let config = InstallerConfig::parse("[download]\nmax_retries = 4294967295\n").unwrap();
        assert_eq!(config.max_retries, u32::MAX);
        assert_eq!(config.retry_policy().max_attempts(), u32::MAX);
    }

    #[test]
    fn test_invalid_client_id() {
        let err = InstallerConfig::parse("[auth]\nclient_id = nope\nsecret = s\n").unwrap_err();
        assert!(err.to_string().contains("client_id"));
    }

    #[test]
    fn test_invalid_number() {
        let err = InstallerConfig::parse("[download]\nmax_retries = many\n").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                key: "max_retries",
                ..
            }
        ));
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = InstallerConfig::load(&dir.path().join("absent.ini")).unwrap();
        assert_eq!(config.max_retries, DEFAULT_MAX_RETRIES);
    }

    #[test]
    fn test_builder_pattern() {
        let config = InstallerConfig::default()
            .with_download_dir(PathBuf::from("/opt/dl"))
            .with_retries(1, Duration::from_millis(10))
            .with_update_mode(true)
            .with_auth(Uuid::nil(), "hunter2");

        assert_eq!(config.download_dir, PathBuf::from("/opt/dl"));
        assert_eq!(config.retry_policy().max_attempts(), 2);
        assert!(config.update_mode);
        assert!(!format!("{:?}", config.auth).contains("hunter2"));
    }
}
