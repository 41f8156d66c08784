//! Configuration types for playlist-dl

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Download behavior configuration (directories, concurrency, output format)
///
/// Used as a flattened sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Directory receiving finished files, one subdirectory per playlist (default: "./downloads")
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Staging directory for raw fetched audio (default: "./temp")
    #[serde(default = "default_temp_dir")]
    pub temp_dir: PathBuf,

    /// Number of items processed concurrently (default: 5, must be >= 1)
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Cookies file passed through to the retrieval tool for private playlists
    #[serde(default)]
    pub cookies_file: Option<PathBuf>,

    /// Target MP3 bitrate in kbps (default: 320)
    #[serde(default = "default_bitrate_kbps")]
    pub bitrate_kbps: u32,

    /// How to name outputs of items whose sanitized names collide
    #[serde(default)]
    pub collision_policy: CollisionPolicy,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            temp_dir: default_temp_dir(),
            concurrency: default_concurrency(),
            cookies_file: None,
            bitrate_kbps: default_bitrate_kbps(),
            collision_policy: CollisionPolicy::default(),
        }
    }
}

/// External tool paths and process limits
///
/// Used as a flattened sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Path to the yt-dlp executable (auto-detected if None)
    #[serde(default)]
    pub yt_dlp_path: Option<PathBuf>,

    /// Path to the ffmpeg executable (auto-detected if None)
    #[serde(default)]
    pub ffmpeg_path: Option<PathBuf>,

    /// Whether to search PATH for external binaries if explicit paths not set (default: true)
    #[serde(default = "default_true")]
    pub search_path: bool,

    /// Timeout for fetching a single item (default: 600 seconds)
    #[serde(default = "default_fetch_timeout", with = "duration_serde")]
    pub fetch_timeout: Duration,

    /// Timeout for transcoding a single item (default: 600 seconds)
    #[serde(default = "default_transcode_timeout", with = "duration_serde")]
    pub transcode_timeout: Duration,

    /// Timeout for retrieving playlist metadata (default: 60 seconds)
    #[serde(default = "default_playlist_timeout", with = "duration_serde")]
    pub playlist_timeout: Duration,

    /// Bytes of stdout/stderr retained per stream from external tools (default: 1 MiB)
    #[serde(default = "default_max_output_bytes")]
    pub max_output_bytes: usize,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            yt_dlp_path: None,
            ffmpeg_path: None,
            search_path: true,
            fetch_timeout: default_fetch_timeout(),
            transcode_timeout: default_transcode_timeout(),
            playlist_timeout: default_playlist_timeout(),
            max_output_bytes: default_max_output_bytes(),
        }
    }
}

/// Retry configuration for network failures during fetch
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total fetch attempts per item, including the first (default: 4)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry (default: 1 second)
    #[serde(default = "default_initial_delay", with = "duration_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between retries (default: 30 seconds)
    #[serde(default = "default_max_delay", with = "duration_serde")]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: true)
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: true,
        }
    }
}

/// Connectivity monitor configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConnectivityConfig {
    /// Endpoint probed for reachability
    #[serde(default = "default_probe_url")]
    pub probe_url: String,

    /// Timeout of a single probe (default: 3 seconds)
    #[serde(default = "default_probe_timeout", with = "duration_serde")]
    pub probe_timeout: Duration,

    /// Delay between failed probes while offline (default: 5 seconds)
    #[serde(default = "default_poll_interval", with = "duration_serde")]
    pub poll_interval: Duration,

    /// Give up waiting for connectivity after this long (default: wait forever)
    #[serde(default, with = "optional_duration_serde")]
    pub offline_timeout: Option<Duration>,
}

impl Default for ConnectivityConfig {
    fn default() -> Self {
        Self {
            probe_url: default_probe_url(),
            probe_timeout: default_probe_timeout(),
            poll_interval: default_poll_interval(),
            offline_timeout: None,
        }
    }
}

/// Post-run processing (tagging and archiving)
///
/// Used as a flattened sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PostProcessConfig {
    /// Write ID3 tags to finished files (default: true)
    #[serde(default = "default_true")]
    pub write_metadata: bool,

    /// Zip the output directory after the run (default: true)
    #[serde(default = "default_true")]
    pub create_archive: bool,

    /// Timeout for downloading cover art (default: 15 seconds)
    #[serde(default = "default_cover_timeout", with = "duration_serde")]
    pub cover_timeout: Duration,
}

impl Default for PostProcessConfig {
    fn default() -> Self {
        Self {
            write_metadata: true,
            create_archive: true,
            cover_timeout: default_cover_timeout(),
        }
    }
}

/// Main configuration for PlaylistDownloader
///
/// Fields are organized into logical sub-configs:
/// - [`download`](DownloadConfig) - directories, concurrency, output naming
/// - [`tools`](ToolsConfig) - external binary paths and process limits
/// - [`retry`](RetryConfig) - fetch retry budget and backoff
/// - [`connectivity`](ConnectivityConfig) - reachability probe
/// - [`post_process`](PostProcessConfig) - tagging and archiving
///
/// `download`, `tools` and `post_process` are flattened, so a TOML file keeps
/// their keys at the top level; `retry` and `connectivity` are tables.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Download behavior settings
    #[serde(flatten)]
    pub download: DownloadConfig,

    /// External tool settings
    #[serde(flatten)]
    pub tools: ToolsConfig,

    /// Fetch retry settings
    #[serde(default)]
    pub retry: RetryConfig,

    /// Connectivity monitor settings
    #[serde(default)]
    pub connectivity: ConnectivityConfig,

    /// Tagging and archiving settings
    #[serde(flatten)]
    pub post_process: PostProcessConfig,
}

impl Config {
    /// Parse a configuration from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| Error::Config {
            message: format!("invalid TOML configuration: {}", e),
            key: None,
        })
    }

    /// Load a configuration from a TOML file
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| Error::Config {
            message: format!("failed to read config file '{}': {}", path.display(), e),
            key: None,
        })?;
        Self::from_toml_str(&text)
    }

    /// Check settings that cannot be expressed in the type system
    pub fn validate(&self) -> Result<()> {
        if self.download.concurrency == 0 {
            return Err(Error::config("concurrency", "must be at least 1"));
        }
        if self.download.bitrate_kbps == 0 {
            return Err(Error::config("bitrate_kbps", "must be greater than 0"));
        }
        if self.retry.max_attempts == 0 {
            return Err(Error::config("retry.max_attempts", "must be at least 1"));
        }
        if self.retry.backoff_multiplier < 1.0 {
            return Err(Error::config(
                "retry.backoff_multiplier",
                "must be at least 1.0",
            ));
        }
        if self.tools.max_output_bytes == 0 {
            return Err(Error::config("max_output_bytes", "must be greater than 0"));
        }
        url::Url::parse(&self.connectivity.probe_url).map_err(|e| {
            Error::config(
                "connectivity.probe_url",
                format!("'{}' is not a valid URL: {}", self.connectivity.probe_url, e),
            )
        })?;
        Ok(())
    }
}

/// How to name outputs of items whose sanitized `artist - title` collide
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollisionPolicy {
    /// Later colliding items get their item id appended (default)
    #[default]
    AppendId,
    /// Colliding items write the same path; the last to finish wins
    Overwrite,
}

// Default value functions
fn default_output_dir() -> PathBuf {
    PathBuf::from("downloads")
}

fn default_temp_dir() -> PathBuf {
    PathBuf::from("temp")
}

fn default_concurrency() -> usize {
    5
}

fn default_bitrate_kbps() -> u32 {
    320
}

fn default_true() -> bool {
    true
}

fn default_fetch_timeout() -> Duration {
    Duration::from_secs(600)
}

fn default_transcode_timeout() -> Duration {
    Duration::from_secs(600)
}

fn default_playlist_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_max_output_bytes() -> usize {
    1024 * 1024
}

fn default_max_attempts() -> u32 {
    4
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(30)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_probe_url() -> String {
    "https://www.google.com/generate_204".to_string()
}

fn default_probe_timeout() -> Duration {
    Duration::from_secs(3)
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(5)
}

fn default_cover_timeout() -> Duration {
    Duration::from_secs(15)
}

// Duration serialization helper
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

// Optional Duration serialization helper
mod optional_duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(d) => serializer.serialize_some(&d.as_secs()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = Option::<u64>::deserialize(deserializer)?;
        Ok(secs.map(Duration::from_secs))
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = Config::default();
        assert_eq!(config.download.concurrency, 5);
        assert_eq!(config.download.bitrate_kbps, 320);
        assert_eq!(config.download.collision_policy, CollisionPolicy::AppendId);
        assert_eq!(config.retry.max_attempts, 4);
        assert_eq!(config.connectivity.probe_timeout, Duration::from_secs(3));
        assert_eq!(config.connectivity.poll_interval, Duration::from_secs(5));
        assert!(config.connectivity.offline_timeout.is_none());
        assert!(config.post_process.write_metadata);
        assert!(config.post_process.create_archive);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn empty_toml_yields_defaults() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config.download.concurrency, 5);
        assert_eq!(config.download.output_dir, PathBuf::from("downloads"));
        assert_eq!(config.tools.playlist_timeout, Duration::from_secs(60));
    }

    #[test]
    fn toml_overrides_flattened_and_nested_keys() {
        let text = r#"
            output_dir = "/music"
            concurrency = 2
            collision_policy = "overwrite"
            create_archive = false
            fetch_timeout = 120

            [retry]
            max_attempts = 6
            jitter = false

            [connectivity]
            poll_interval = 1
            offline_timeout = 300
        "#;
        let config = Config::from_toml_str(text).unwrap();
        assert_eq!(config.download.output_dir, PathBuf::from("/music"));
        assert_eq!(config.download.concurrency, 2);
        assert_eq!(config.download.collision_policy, CollisionPolicy::Overwrite);
        assert!(!config.post_process.create_archive);
        assert!(config.post_process.write_metadata);
        assert_eq!(config.tools.fetch_timeout, Duration::from_secs(120));
        assert_eq!(config.retry.max_attempts, 6);
        assert!(!config.retry.jitter);
        assert_eq!(config.retry.initial_delay, Duration::from_secs(1));
        assert_eq!(config.connectivity.poll_interval, Duration::from_secs(1));
        assert_eq!(
            config.connectivity.offline_timeout,
            Some(Duration::from_secs(300))
        );
    }

    #[test]
    fn invalid_toml_is_a_config_error() {
        let err = Config::from_toml_str("concurrency = \"many\"").unwrap_err();
        assert!(matches!(err, Error::Config { key: None, .. }), "got {err:?}");
    }

    #[test]
    fn missing_config_file_is_a_config_error() {
        let err = Config::from_toml_file(Path::new("/nonexistent/playlist-dl.toml")).unwrap_err();
        match err {
            Error::Config { message, .. } => assert!(message.contains("failed to read")),
            other => panic!("expected Config error, got {other:?}"),
        }
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let mut config = Config::default();
        config.download.concurrency = 0;
        match config.validate().unwrap_err() {
            Error::Config { key, .. } => assert_eq!(key.as_deref(), Some("concurrency")),
            other => panic!("expected Config error, got {other:?}"),
        }
    }

    #[test]
    fn zero_attempts_is_rejected() {
        let mut config = Config::default();
        config.retry.max_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn bad_probe_url_is_rejected() {
        let mut config = Config::default();
        config.connectivity.probe_url = "not a url".into();
        match config.validate().unwrap_err() {
            Error::Config { key, .. } => {
                assert_eq!(key.as_deref(), Some("connectivity.probe_url"))
            }
            other => panic!("expected Config error, got {other:?}"),
        }
    }

    #[test]
    fn config_round_trips_through_json() {
        let mut config = Config::default();
        config.download.cookies_file = Some(PathBuf::from("/secrets/cookies.txt"));
        config.connectivity.offline_timeout = Some(Duration::from_secs(90));

        let json = serde_json::to_string(&config).unwrap();
        let back: Config = serde_json::from_str(&json).unwrap();

        assert_eq!(back.download.cookies_file, config.download.cookies_file);
        assert_eq!(back.connectivity.offline_timeout, Some(Duration::from_secs(90)));
        assert_eq!(back.retry.max_attempts, config.retry.max_attempts);
    }
}
