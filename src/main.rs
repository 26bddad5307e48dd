mod aggregate;
mod config;
mod crawl;
mod db;
mod error;
mod extract;
mod form_state;
mod logging;
mod models;
mod sink;
mod transport;

use std::process::ExitCode;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use aggregate::AggregationTable;
use config::{Cli, Command, Config, SinkConfig};
use crawl::Crawler;
use db::Database;
use logging::init_logging;
use sink::{ConsoleSink, JsonSink, SinkChain};
use transport::HttpTransport;

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file if it exists
    dotenvy::dotenv().ok();

    let cli = Cli::parse_args();

    let result = match cli.command {
        Command::Crawl { config, sinks } => run_crawl(config, sinks).await,
        Command::Inspect { config } => run_inspect(config).await,
    };

    match result {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run_crawl(config: Config, sink_config: SinkConfig) -> Result<()> {
    init_logging(config.verbose, &config.log_file);

    config.validate()?;
    sink_config.validate()?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        url = %config.url,
        term_limit = config.term_limit,
        log_file = %config.log_file.display(),
        "Starting course offering crawl"
    );

    let sinks = build_sinks(&sink_config).await?;
    if sinks.is_empty() {
        warn!("No sink configured, crawled courses will only be counted");
    }

    let transport = HttpTransport::new(&config.user_agent, config.timeout())?;
    let crawler = Crawler::new(&transport, config.url.clone(), config.term_limit);

    let mut table = AggregationTable::new();
    let report = crawler
        .run_crawl(&mut table)
        .await
        .context("Could not read the course offering landing page")?;

    if !report.is_complete() {
        warn!(
            pairs_failed = report.pairs_failed(),
            rows_skipped = report.rows_skipped,
            "Crawl finished with gaps, see the log for skipped pairs and rows"
        );
    }

    let mut failed_sinks = 0;
    for (name, result) in sinks.store_all(&table, &report).await {
        match result {
            Ok(_) => info!(sink = %name, "Courses stored"),
            Err(e) => {
                failed_sinks += 1;
                warn!(sink = %name, error = %format!("{:#}", e), "Storing courses failed");
            }
        }
    }

    if failed_sinks > 0 {
        anyhow::bail!("{} of {} sinks failed", failed_sinks, sinks.len());
    }

    Ok(())
}

async fn run_inspect(config: Config) -> Result<()> {
    init_logging(config.verbose, &config.log_file);
    config.validate()?;

    let transport = HttpTransport::new(&config.user_agent, config.timeout())?;
    let crawler = Crawler::new(&transport, config.url.clone(), config.term_limit);
    let state = crawler
        .load_form_state()
        .await
        .context("Could not read the course offering landing page")?;

    println!("Terms ({}): {}", state.terms.len(), state.terms.join(", "));
    println!(
        "Departments ({}): {}",
        state.departments.len(),
        state.departments.join(", ")
    );
    println!("Requests per crawl: {}", state.pair_count());
    Ok(())
}

async fn build_sinks(config: &SinkConfig) -> Result<SinkChain> {
    let mut sinks = SinkChain::new();

    if config.print {
        sinks.add(ConsoleSink::new());
        debug!(sink = "console", "Added console sink");
    }

    if let Some(ref path) = config.output {
        sinks.add(JsonSink::new(path.clone()));
        debug!(sink = "json", path = %path.display(), "Added JSON sink");
    }

    if let Some(ref db_url) = config.database_url {
        let auth_token = config
            .database_auth_token
            .as_ref()
            .context("DATABASE_AUTH_TOKEN is required when using DATABASE_URL")?;
        info!(db_url = %db_url, "Using Turso remote database");
        sinks.add(Database::open_turso(db_url, auth_token).await?);
    } else if let Some(ref path) = config.db {
        info!(db_path = %path.display(), "Using local SQLite database");
        let db = Database::open(path).await?;
        debug!(sink = "database", db_type = db.db_type(), "Added database sink");
        sinks.add(db);
    }

    info!(
        total_sinks = sinks.len(),
        remote_db = config.uses_turso(),
        "Sink chain built"
    );
    Ok(sinks)
}
