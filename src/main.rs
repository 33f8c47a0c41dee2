use anyhow::{Context, Result};
use clap::{Arg, ArgAction, Command};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use course_duration::report::render_summary;
use course_duration::{Config, DurationService, PageFactory, SnapshotPageFactory};

#[tokio::main]
async fn main() -> Result<()> {
    let matches = Command::new("Course Duration")
        .version(env!("CARGO_PKG_VERSION"))
        .author("TigreRoll")
        .about("Total playable duration of a video course folder page")
        .arg(
            Arg::new("url")
                .value_name("URL")
                .help("Course folder URL")
                .required(true),
        )
        .arg(
            Arg::new("runs")
                .short('r')
                .long("runs")
                .value_name("NUM")
                .help("Independent extraction runs to vote over")
                .value_parser(clap::value_parser!(usize)),
        )
        .arg(
            Arg::new("html")
                .long("html")
                .value_name("FILE")
                .help("Saved HTML frame(s) to read instead of a live browser; each click advances one frame")
                .num_args(1..)
                .action(ArgAction::Append),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file (TOML)"),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .help("Print the result as JSON")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable verbose logging")
                .action(ArgAction::SetTrue),
        )
        .get_matches();

    let url = matches
        .get_one::<String>("url")
        .cloned()
        .context("URL is required")?;
    let json = matches.get_flag("json");
    let verbose = matches.get_flag("verbose");

    let mut config = match matches.get_one::<String>("config") {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path))?
            .with_env_overrides(),
        None => Config::load().context("Failed to load configuration")?,
    };

    if let Some(runs) = matches.get_one::<usize>("runs") {
        config.consensus.runs = *runs;
    }

    // Initialize logging
    let default_filter = if verbose {
        "course_duration=debug,warn".to_string()
    } else {
        format!("course_duration={},warn", config.logging.level)
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    info!("🚀 Course Duration starting...");
    debug!("{}", config.summary());

    let html_files: Vec<PathBuf> = matches
        .get_many::<String>("html")
        .map(|files| files.map(PathBuf::from).collect())
        .unwrap_or_default();

    let outcome = if html_files.is_empty() {
        run_with_browser(config, &url).await
    } else {
        let factory = snapshot_factory(&html_files).await?;
        let service = DurationService::new(config, factory)?;
        service.compute_duration(&url).await.map_err(anyhow::Error::from)
    };

    match outcome {
        Ok(consensus) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&consensus)?);
            } else {
                println!("{}", render_summary(&consensus));
            }
            Ok(())
        }
        Err(e) => {
            error!("❌ {:#}", e);
            if json {
                let kind = e
                    .downcast_ref::<course_duration::DurationError>()
                    .map(|err| err.kind())
                    .unwrap_or("Internal");
                println!(
                    "{}",
                    serde_json::json!({ "error": format!("{:#}", e), "kind": kind })
                );
            }
            Err(e)
        }
    }
}

async fn snapshot_factory(files: &[PathBuf]) -> Result<Arc<dyn PageFactory>> {
    let mut frames = Vec::with_capacity(files.len());
    for file in files {
        let html = tokio::fs::read_to_string(file)
            .await
            .with_context(|| format!("Failed to read {}", file.display()))?;
        frames.push(html);
    }
    info!("📄 Reading {} saved frame(s)", frames.len());
    Ok(Arc::new(SnapshotPageFactory::new(frames)))
}

#[cfg(feature = "browser")]
async fn run_with_browser(
    config: Config,
    url: &str,
) -> Result<course_duration::ConsensusResult> {
    use course_duration::ChromiumPageFactory;

    let factory = Arc::new(
        ChromiumPageFactory::launch(&config.browser)
            .await
            .context("Failed to launch browser")?,
    );
    let service = DurationService::new(config, factory.clone())?;
    let outcome = service.compute_duration(url).await;
    drop(service);

    if let Ok(factory) = Arc::try_unwrap(factory) {
        factory.shutdown().await;
    }
    Ok(outcome?)
}

#[cfg(not(feature = "browser"))]
async fn run_with_browser(
    _config: Config,
    _url: &str,
) -> Result<course_duration::ConsensusResult> {
    anyhow::bail!("built without the `browser` feature; pass --html FILE to read saved pages")
}
