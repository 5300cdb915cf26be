use clap::Parser;
use dataset_dl::{
    Config, CycleRunner, Downloader, FsStore, HttpTopicSink, NoopSink, NotificationSink, Result,
    Scheduler, config::BasicAuth,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Periodically mirror GeoIP and routing-table datasets into a deduplicated store
#[derive(Parser, Debug)]
#[command(name = "dataset-dl")]
#[command(version, about, long_about = None)]
struct Args {
    /// JSON configuration file (defaults apply when omitted)
    #[arg(long, env = "DATASET_DL_CONFIG")]
    config: Option<PathBuf>,

    /// Root directory of the content store
    #[arg(long, env = "DATASET_DL_STORE_ROOT")]
    store_root: Option<PathBuf>,

    /// HTTP endpoint that receives cycle-completion notifications
    #[arg(long, env = "DATASET_DL_TOPIC_URL")]
    topic_url: Option<String>,

    /// MaxMind account ID used for Basic Auth
    #[arg(long, env = "MAXMIND_ACCOUNT_ID")]
    maxmind_account_id: Option<String>,

    /// MaxMind license key used for Basic Auth
    #[arg(long, env = "MAXMIND_LICENSE_KEY", hide_env_values = true)]
    maxmind_license_key: Option<String>,

    /// Run a single cycle and exit; the exit code is 1 unless every source succeeded
    #[arg(long)]
    once: bool,

    /// Serve the status API
    #[arg(long)]
    api: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    match run(args).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %e, "fatal error");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<ExitCode> {
    let config = Arc::new(load_config(&args)?);
    tracing::info!(
        store = %config.store.root.display(),
        sources = config.sources.len(),
        "configuration loaded"
    );

    let store = Arc::new(FsStore::new(&config.store.root));
    let downloader = Downloader::with_user_agent(&config.download.user_agent, store)?;

    let sink: Arc<dyn NotificationSink> =
        match HttpTopicSink::from_config(downloader.client().clone(), &config.notifications) {
            Some(sink) => Arc::new(sink),
            None => {
                tracing::info!("no notification topic configured");
                Arc::new(NoopSink)
            }
        };

    let mut runner = CycleRunner::new(config.clone(), downloader, sink)?;
    let cancel = CancellationToken::new();
    tokio::spawn(dataset_dl::shutdown_on_signal(cancel.clone()));

    if args.once {
        let report = runner.run_cycle(&cancel).await;
        cancel.cancel();
        return Ok(if report.is_success() {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        });
    }

    let scheduler = Scheduler::new(runner, config.schedule.clone());

    let api = config.api.enabled.then(|| {
        let status = scheduler.status();
        let bind_address = config.api.bind_address;
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if let Err(e) = dataset_dl::api::start_api_server(bind_address, status, cancel).await {
                tracing::error!(error = %e, "API server failed");
            }
        })
    });

    scheduler.run(cancel.clone()).await;
    cancel.cancel();

    if let Some(handle) = api {
        handle.await.ok();
    }
    Ok(ExitCode::SUCCESS)
}

fn load_config(args: &Args) -> Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };

    if let Some(root) = &args.store_root {
        config.store.root = root.clone();
    }
    if let Some(topic) = &args.topic_url {
        config.notifications.topic_url = Some(topic.clone());
    }
    if let (Some(user), Some(password)) = (&args.maxmind_account_id, &args.maxmind_license_key) {
        config.credentials = Some(BasicAuth {
            user: user.clone(),
            password: password.clone(),
        });
    }
    if args.api {
        config.api.enabled = true;
    }

    config.validate()?;
    Ok(config)
}
