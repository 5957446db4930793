use anyhow::Result;
use is_terminal::IsTerminal;
use soacrab::cli::Args;
use soacrab::dns::{fqdn, NetworkExchange};
use soacrab::{ReportOptions, ResolverConfig, ZoneChecker};
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse_args();
    tracing_init(args.debug);

    match run(&args).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn tracing_init(debug: bool) {
    let default_filter = if debug { "soacrab=debug" } else { "soacrab=warn" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(std::io::stderr().is_terminal()),
        )
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .init();
}

/// Check the zone and print the report. Returns whether every address of every name server
/// answered authoritatively.
async fn run(args: &Args) -> Result<bool> {
    let config = Arc::new(args.to_config());
    tracing::debug!("running with {config:?}");
    let resolvers = ResolverConfig::try_from_file(&args.resolv_conf).map_err(|err| {
        anyhow::anyhow!("Cannot initialize the local resolver: {err}")
    })?;
    tracing::debug!("local resolvers: {:?}", resolvers.servers);

    let zone = fqdn(&args.zone)?;
    let exchange = Arc::new(NetworkExchange::new(config.timeout));
    let checker = ZoneChecker::new(config.clone(), resolvers, exchange);

    let name_servers = checker
        .name_servers(&zone, &mut std::io::stderr())
        .await?;
    let report = checker.check(&zone, &name_servers).await?;

    let options = ReportOptions {
        quiet: config.quiet,
        show_timings: config.show_timings,
        nsid: config.nsid,
        json: config.json,
        families: config.families,
    };
    Ok(report.summarize(
        &mut std::io::stdout().lock(),
        &mut std::io::stderr().lock(),
        options,
    )?)
}
