//! Configuration types for dataset-dl
//!
//! Configuration is loaded once at startup (see [`Config::from_file`]) and then shared
//! read-only for the lifetime of the process.

use crate::error::{Error, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::{fmt, net::SocketAddr, path::Path, path::PathBuf, time::Duration};

/// Main configuration for the dataset downloader
///
/// Every section has a default, so an empty JSON object (`{}`) is a valid configuration
/// that mirrors the MaxMind GeoLite2 list and both RouteViews prefix-to-AS logs into
/// `./data`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Content store location
    #[serde(default)]
    pub store: StoreConfig,

    /// Cycle-complete notifications
    #[serde(default)]
    pub notifications: NotificationConfig,

    /// Backoff policy for individual downloads
    #[serde(default)]
    pub retry: RetryConfig,

    /// Per-attempt HTTP settings
    #[serde(default)]
    pub download: DownloadConfig,

    /// Delay between cycles
    #[serde(default)]
    pub schedule: ScheduleConfig,

    /// Status API server
    #[serde(default)]
    pub api: ApiConfig,

    /// HTTP Basic Auth credentials used by sources with `basic_auth = true`
    #[serde(default)]
    pub credentials: Option<BasicAuth>,

    /// Datasets to mirror, processed in order
    #[serde(default = "default_sources")]
    pub sources: Vec<SourceConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            notifications: NotificationConfig::default(),
            retry: RetryConfig::default(),
            download: DownloadConfig::default(),
            schedule: ScheduleConfig::default(),
            api: ApiConfig::default(),
            credentials: None,
            sources: default_sources(),
        }
    }
}

impl Config {
    /// Read a JSON configuration file and validate it
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| Error::Config {
            message: format!("cannot read {}: {}", path.display(), e),
            key: None,
        })?;
        let config: Config = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Check every URL and pattern up front so that a bad configuration fails at startup
    /// instead of on the first cycle.
    pub fn validate(&self) -> Result<()> {
        if self.retry.min_wait > self.retry.max_wait {
            tracing::warn!(
                min_wait = ?self.retry.min_wait,
                max_wait = ?self.retry.max_wait,
                "retry.min_wait exceeds retry.max_wait, downloads will be attempted once"
            );
        }

        if let Some(topic) = &self.notifications.topic_url {
            check_url(topic, "notifications.topic_url")?;
        }

        let mut names = std::collections::HashSet::new();
        for (idx, source) in self.sources.iter().enumerate() {
            let key = format!("sources[{idx}]");
            if !names.insert(source.name()) {
                return Err(Error::config(
                    format!("duplicate source name {:?}", source.name()),
                    format!("{key}.name"),
                ));
            }
            match source {
                SourceConfig::SequencedLog {
                    log_url,
                    url_pattern,
                    dedup_pattern,
                    ..
                } => {
                    check_url(log_url, &format!("{key}.log_url"))?;
                    let re = compile_pattern(url_pattern, &format!("{key}.url_pattern"))?;
                    if re.captures_len() < 3 {
                        return Err(Error::config(
                            "url_pattern needs two capture groups",
                            format!("{key}.url_pattern"),
                        ));
                    }
                    compile_pattern(dedup_pattern, &format!("{key}.dedup_pattern"))?;
                }
                SourceConfig::FixedFiles {
                    dedup_pattern,
                    basic_auth,
                    files,
                    ..
                } => {
                    compile_pattern(dedup_pattern, &format!("{key}.dedup_pattern"))?;
                    if *basic_auth && self.credentials.is_none() {
                        tracing::warn!(
                            source = %source.name(),
                            "source requires basic auth but no credentials are configured"
                        );
                    }
                    for (fidx, file) in files.iter().enumerate() {
                        check_url(&file.url, &format!("{key}.files[{fidx}].url"))?;
                        if file.filename.is_empty() {
                            return Err(Error::config(
                                "filename must not be empty",
                                format!("{key}.files[{fidx}].filename"),
                            ));
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

/// Compile a configured pattern, mapping failures to a configuration error
pub(crate) fn compile_pattern(pattern: &str, key: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| Error::config(format!("invalid pattern: {e}"), key))
}

fn check_url(raw: &str, key: &str) -> Result<()> {
    url::Url::parse(raw)
        .map(|_| ())
        .map_err(|e| Error::config(format!("invalid URL {raw:?}: {e}"), key))
}

/// Where artifacts are written
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Root directory of the filesystem store (default: "./data")
    #[serde(default = "default_store_root")]
    pub root: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            root: default_store_root(),
        }
    }
}

/// Notification topic configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// Topic endpoint that accepts published messages (None = notifications disabled)
    #[serde(default)]
    pub topic_url: Option<String>,

    /// Optional authentication header value
    #[serde(default)]
    pub auth_header: Option<String>,

    /// Timeout for publish requests (default: 30 seconds)
    #[serde(default = "default_publish_timeout", with = "duration_serde")]
    pub timeout: Duration,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            topic_url: None,
            auth_header: None,
            timeout: default_publish_timeout(),
        }
    }
}

/// Retry behavior for transient download failures
///
/// The wait starts at `min_wait` and doubles after each transient failure. Retrying
/// stops once the wait that would be slept next is greater than `max_wait`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Wait after the first failure (default: 1 minute)
    #[serde(default = "default_min_wait", with = "duration_serde")]
    pub min_wait: Duration,

    /// Largest wait still followed by another attempt (default: 8 minutes)
    #[serde(default = "default_max_wait", with = "duration_serde")]
    pub max_wait: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            min_wait: default_min_wait(),
            max_wait: default_max_wait(),
        }
    }
}

/// Per-download HTTP settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Budget for one fetch+store+dedup attempt (default: 30 minutes)
    #[serde(default = "default_download_timeout", with = "duration_serde")]
    pub timeout: Duration,

    /// User-Agent sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            timeout: default_download_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

/// Delay between cycles
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Average delay between the end of one cycle and the start of the next (default: 8 hours)
    #[serde(default = "default_interval", with = "duration_serde")]
    pub interval: Duration,

    /// Width of the uniform jitter window centered on `interval` (default: 4 hours)
    #[serde(default = "default_deviation", with = "duration_serde")]
    pub deviation: Duration,

    /// Run independent sources concurrently within a cycle (default: false)
    #[serde(default)]
    pub parallel_sources: bool,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            interval: default_interval(),
            deviation: default_deviation(),
            parallel_sources: false,
        }
    }
}

/// Status API configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Serve `/health` and `/status` (default: false)
    #[serde(default)]
    pub enabled: bool,

    /// Address to bind to (default: 127.0.0.1:8080)
    #[serde(default = "default_bind_address")]
    pub bind_address: SocketAddr,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bind_address: default_bind_address(),
        }
    }
}

/// HTTP Basic Auth credentials
#[derive(Clone, Serialize, Deserialize)]
pub struct BasicAuth {
    /// User (MaxMind account ID)
    pub user: String,
    /// Secret (MaxMind license key)
    pub password: String,
}

impl fmt::Debug for BasicAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicAuth")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// A dataset to mirror
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceConfig {
    /// Files announced through a sequenced creation log (`seqnum timestamp path` lines)
    SequencedLog {
        /// Source name, used in logs and status
        name: String,
        /// URL of the creation log; file paths in it are relative to its directory
        log_url: String,
        /// Store prefix for this dataset (e.g. "RouteViewIPv4")
        path_prefix: String,
        /// Two-group pattern splitting each file URL around the inserted timestamp
        #[serde(default = "default_log_url_pattern")]
        url_pattern: String,
        /// Pattern whose first group is the dedup scope of a stored name
        #[serde(default = "default_log_dedup_pattern")]
        dedup_pattern: String,
        /// Stable "latest" path updated with every new artifact
        #[serde(default)]
        canonical_alias: Option<String>,
    },
    /// A fixed list of files re-fetched on every cycle
    FixedFiles {
        /// Source name, used in logs and status
        name: String,
        /// Store prefix; the cycle date path (`%Y/%m/%d/`) is appended to it
        path_prefix: String,
        /// Pattern whose first group is the dedup scope of a stored name
        #[serde(default = "default_fixed_dedup_pattern")]
        dedup_pattern: String,
        /// Send the configured credentials with every request
        #[serde(default)]
        basic_auth: bool,
        /// Files to fetch
        files: Vec<FixedFile>,
    },
}

impl SourceConfig {
    /// The configured source name
    pub fn name(&self) -> &str {
        match self {
            SourceConfig::SequencedLog { name, .. } | SourceConfig::FixedFiles { name, .. } => name,
        }
    }
}

/// One file of a [`SourceConfig::FixedFiles`] source
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FixedFile {
    /// Download URL
    pub url: String,
    /// Name the artifact is stored under (after the timestamp prefix)
    pub filename: String,
    /// Stable "latest" path updated with every new artifact
    #[serde(default)]
    pub canonical_alias: Option<String>,
}

// Default value functions
fn default_store_root() -> PathBuf {
    PathBuf::from("data")
}

fn default_publish_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_min_wait() -> Duration {
    Duration::from_secs(60)
}

fn default_max_wait() -> Duration {
    Duration::from_secs(8 * 60)
}

fn default_download_timeout() -> Duration {
    Duration::from_secs(30 * 60)
}

fn default_user_agent() -> String {
    format!("dataset-dl/{}", env!("CARGO_PKG_VERSION"))
}

fn default_interval() -> Duration {
    Duration::from_secs(8 * 60 * 60)
}

fn default_deviation() -> Duration {
    Duration::from_secs(4 * 60 * 60)
}

fn default_bind_address() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8080))
}

fn default_log_url_pattern() -> String {
    r".*(/\d{4}/\d{2}/)(.*)".to_string()
}

fn default_log_dedup_pattern() -> String {
    "(.*/).*".to_string()
}

fn default_fixed_dedup_pattern() -> String {
    "(.*/).*/.*".to_string()
}

fn default_sources() -> Vec<SourceConfig> {
    const MAXMIND: &str = "https://download.maxmind.com/geoip/databases";
    let maxmind_file = |edition: &str, suffix: &str, current: bool| FixedFile {
        url: format!("{MAXMIND}/{edition}/download?suffix={suffix}"),
        filename: format!("{edition}.{suffix}"),
        canonical_alias: current.then(|| format!("Maxmind/current/{edition}.{suffix}")),
    };

    vec![
        SourceConfig::FixedFiles {
            name: "maxmind".to_string(),
            path_prefix: "Maxmind/".to_string(),
            dedup_pattern: default_fixed_dedup_pattern(),
            basic_auth: true,
            files: vec![
                maxmind_file("GeoLite2-ASN", "tar.gz", false),
                maxmind_file("GeoLite2-ASN-CSV", "zip", false),
                maxmind_file("GeoLite2-City", "tar.gz", true),
                maxmind_file("GeoLite2-City-CSV", "zip", false),
                maxmind_file("GeoLite2-Country", "tar.gz", false),
                maxmind_file("GeoLite2-Country-CSV", "zip", false),
            ],
        },
        SourceConfig::SequencedLog {
            name: "routeviews-ipv4".to_string(),
            log_url: "http://data.caida.org/datasets/routing/routeviews-prefix2as/pfx2as-creation.log"
                .to_string(),
            path_prefix: "RouteViewIPv4".to_string(),
            url_pattern: default_log_url_pattern(),
            dedup_pattern: default_log_dedup_pattern(),
            canonical_alias: Some("RouteViewIPv4/current/routeviews.pfx2as.gz".to_string()),
        },
        SourceConfig::SequencedLog {
            name: "routeviews-ipv6".to_string(),
            log_url:
                "http://data.caida.org/datasets/routing/routeviews6-prefix2as/pfx2as-creation.log"
                    .to_string(),
            path_prefix: "RouteViewIPv6".to_string(),
            url_pattern: default_log_url_pattern(),
            dedup_pattern: default_log_dedup_pattern(),
            canonical_alias: Some("RouteViewIPv6/current/routeviews.pfx2as.gz".to_string()),
        },
    ]
}

// Duration serialization helper (seconds)
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
