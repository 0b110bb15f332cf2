use anyhow::Context;
use canarywatch_status::config::{parse_page_url, DEFAULT_PAGE_URL};
use canarywatch_status::{run, ClientConfig, ConfigLayer};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod console;

use console::{ConsoleDisplay, TerminalNotifier};

#[derive(Debug, Default, PartialEq, Eq)]
struct CliArgs {
    config: Option<PathBuf>,
    page: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let cli = parse_args(&args)?;

    let page = parse_page_url(cli.page.as_deref().unwrap_or(DEFAULT_PAGE_URL))?;
    let mut layers = Vec::new();
    if let Some(path) = &cli.config {
        let layer = ConfigLayer::load(path)
            .with_context(|| format!("loading config from {}", path.display()))?;
        layers.push(layer);
    }
    layers.push(ConfigLayer::from_env());
    layers.push(ConfigLayer::from_query(&page));

    let config = ClientConfig::resolve(&page, &layers)?;
    info!(
        "Canarywatch client v{} for page {}",
        env!("CARGO_PKG_VERSION"),
        page
    );

    let session = run(
        config,
        ConsoleDisplay::new(std::io::stdout()),
        TerminalNotifier,
        async {
            let _ = tokio::signal::ctrl_c().await;
        },
    )
    .await;

    let conn = session.connection().stats();
    let stats = session.stats();
    info!(
        "Stopped: {} attempts, {} connects, {} disconnects, {} messages ({} dropped), {} notifications",
        conn.attempts,
        conn.connects,
        conn.disconnects,
        stats.messages,
        stats.dropped,
        session.notifications().raised()
    );
    Ok(())
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn parse_args(args: &[String]) -> anyhow::Result<CliArgs> {
    let mut cli = CliArgs::default();
    let mut args_iter = args.iter();
    while let Some(arg) = args_iter.next() {
        match arg.as_str() {
            "--config" => {
                let path = args_iter
                    .next()
                    .context("--config was provided without a path")?;
                cli.config = Some(PathBuf::from(path));
            }
            "--page" => {
                let page = args_iter
                    .next()
                    .context("--page was provided without a URL")?;
                cli.page = Some(page.clone());
            }
            other => anyhow::bail!("unrecognized argument {:?}", other),
        }
    }
    Ok(cli)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_args() {
        let cli = parse_args(&args(&[
            "--page",
            "https://dash.local/?filter=prod",
            "--config",
            "client.toml",
        ]))
        .unwrap();
        assert_eq!(cli.page.as_deref(), Some("https://dash.local/?filter=prod"));
        assert_eq!(cli.config, Some(PathBuf::from("client.toml")));

        assert_eq!(parse_args(&[]).unwrap(), CliArgs::default());
    }

    #[test]
    fn test_parse_args_rejects_missing_values() {
        assert!(parse_args(&args(&["--config"])).is_err());
        assert!(parse_args(&args(&["--page"])).is_err());
        assert!(parse_args(&args(&["--verbose"])).is_err());
    }
}
