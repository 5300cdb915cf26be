//! Common fixtures for dataset-dl integration tests

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use dataset_dl::config::{BasicAuth, FixedFile, RetryConfig};
use dataset_dl::{Config, CycleRunner, Downloader, FsStore, NotificationSink, SourceConfig};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const LOG_PATH: &str = "/rv/pfx2as-creation.log";

/// Generation log listing `(seqnum, relative path)` records
pub fn log_body(entries: &[(i64, &str)]) -> String {
    let mut body = String::from("# seqnum\ttimestamp\tpath\n");
    for (seq, rel) in entries {
        body.push_str(&format!("{seq}\t1497000000\t{rel}\n"));
    }
    body
}

/// Serve `body` for GET `at`
pub async fn serve(server: &MockServer, at: &str, body: impl Into<String>) {
    Mock::given(method("GET"))
        .and(path(at))
        .respond_with(ResponseTemplate::new(200).set_body_string(body.into()))
        .mount(server)
        .await;
}

/// One sequenced-log source and one fixed-file source, both pointed at `server`
pub fn config_for(server: &MockServer, root: &Path) -> Config {
    let mut config = Config {
        retry: RetryConfig {
            min_wait: Duration::ZERO,
            max_wait: Duration::ZERO,
        },
        credentials: Some(BasicAuth {
            user: "42".to_string(),
            password: "license".to_string(),
        }),
        sources: vec![
            SourceConfig::SequencedLog {
                name: "routeviews-ipv4".to_string(),
                log_url: format!("{}{LOG_PATH}", server.uri()),
                path_prefix: "RouteViewIPv4".to_string(),
                url_pattern: r".*(/\d{4}/\d{2}/)(.*)".to_string(),
                dedup_pattern: "(.*/).*".to_string(),
                canonical_alias: Some("RouteViewIPv4/current/routeviews.pfx2as.gz".to_string()),
            },
            SourceConfig::FixedFiles {
                name: "maxmind".to_string(),
                path_prefix: "Maxmind/".to_string(),
                dedup_pattern: "(.*/).*/.*".to_string(),
                basic_auth: true,
                files: vec![FixedFile {
                    url: format!("{}/geoip/databases/GeoLite2-City/download", server.uri()),
                    filename: "GeoLite2-City.tar.gz".to_string(),
                    canonical_alias: Some("Maxmind/current/GeoLite2-City.tar.gz".to_string()),
                }],
            },
        ],
        ..Config::default()
    };
    config.store.root = root.to_path_buf();
    config
}

/// Runner writing into a filesystem store at `config.store.root`
pub fn runner_for(config: Config, sink: Arc<dyn NotificationSink>) -> CycleRunner {
    let store = Arc::new(FsStore::new(&config.store.root));
    let downloader = Downloader::new(reqwest::Client::new(), store);
    CycleRunner::new(Arc::new(config), downloader, sink).unwrap()
}

/// Relative paths of every regular file under `dir`
pub fn files_under(root: &Path, dir: &str) -> Vec<String> {
    let base = root.join(dir);
    if !base.exists() {
        return Vec::new();
    }
    let mut names: Vec<String> = walkdir::WalkDir::new(&base)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| {
            e.path()
                .strip_prefix(root)
                .unwrap()
                .to_string_lossy()
                .replace('\\', "/")
        })
        .collect();
    names.sort();
    names
}
