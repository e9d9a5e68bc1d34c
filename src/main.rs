mod aggregate;
mod batch;
mod cli;
mod config;
mod markdown;
mod model;
mod query;
mod report;
mod retrieval;
mod synonyms;

pub const USER_AGENT: &str = concat!(
    "litspy/",
    env!("CARGO_PKG_VERSION"),
    " (literature co-occurrence search)"
);

use std::fs;
use std::time::Duration;

use clap::Parser;
use reqwest::Client;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use config::Endpoints;
use query::QueryBuilder;
use retrieval::{Dispatcher, EuropePmcClient};
use synonyms::{HttpLookup, OlsClient, SynonymResolver, UniprotClient};

/// TCP connection establishment timeout.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = cli::Args::parse();

    let directive = if args.verbose {
        "litspy=debug"
    } else {
        "litspy=info"
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(directive.parse()?),
        )
        .init();

    let config = args.config(Endpoints::from_env()?);
    config.validate()?;
    let advanced = args.advanced();
    let builder = QueryBuilder::new(&advanced)?;
    if !advanced.is_empty() {
        debug!(clause = ?advanced.to_clause(), "advanced constraints applied to every search");
    }
    let units = args.units()?;

    let http = Client::builder().connect_timeout(CONNECT_TIMEOUT).build()?;
    let lookup = HttpLookup::new(
        UniprotClient::new(http.clone(), &config.endpoints.uniprot),
        OlsClient::new(http.clone(), &config.endpoints.ols),
    );
    let resolver = SynonymResolver::new(lookup, config.lookup_timeout);
    let search = EuropePmcClient::new(http, &config.endpoints.europepmc, config.request_timeout);

    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling outstanding searches");
            let _ = cancel_tx.send(true);
        }
    });
    let dispatcher = Dispatcher::new(&search, config.retrieval, cancel_rx);

    info!(
        rows = units.len(),
        workers = config.retrieval.workers,
        "starting litspy"
    );
    let report = batch::run(units, &resolver, &builder, &dispatcher, config.batch)
        .await
        .inspect_err(|e| error!("batch aborted: {e}"))?;

    let rendered = if args.json {
        report::format_json(&report)?
    } else {
        report::format_report(&report, config.hits_shown)
    };
    match &args.output {
        Some(path) => {
            fs::write(path, &rendered)?;
            info!(path = %path.display(), "report written");
        }
        None => println!("{rendered}"),
    }

    let failed = report.failed_expressions();
    if failed > 0 {
        warn!(failed, "some searches failed; see the report for details");
    }
    info!(cached_terms = resolver.cached_len(), "done");
    Ok(())
}
