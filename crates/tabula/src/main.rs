//! Tabula
//!
//! Command-line front end for the table-backed DNS resolver: validates
//! configuration, prepares the records table, and answers one-off queries.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use console::style;
use serde::Serialize;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use tabula_config::Config;
use tabula_metrics::tracing_setup::{init_tracing, LogConfig};
use tabula_metrics::{metrics, QueryTimer};
use tabula_proto::{Name, QueryType, Record};
use tabula_resolver::{Outcome, Query, ResolveError, Resolver};
use tabula_store::SqlRecordStore;
use tracing::{debug, Level};

/// Tabula - authoritative DNS answers from a records table
#[derive(Parser, Debug)]
#[command(name = "tabula")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, global = true, value_name = "LEVEL")]
    log_level: Option<String>,

    /// Quiet mode (minimal output)
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Validate configuration file
    Validate {
        /// Show detailed validation output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Create the records table if it does not exist
    Schema,

    /// List the zones found in the records table
    Zones,

    /// Resolve a single query
    Query {
        /// Query name
        name: String,

        /// Query type
        #[arg(default_value = "A")]
        qtype: String,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Find the configuration file in standard locations
fn find_config_file(explicit_path: Option<PathBuf>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return Some(path);
    }

    [
        PathBuf::from("./tabula.yaml"),
        PathBuf::from("./tabula.yml"),
        PathBuf::from("/etc/tabula/tabula.yaml"),
    ]
    .into_iter()
    .find(|path| path.exists())
}

/// Parse log level from string
fn parse_log_level(level: &str) -> Level {
    match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" | "warning" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

/// Initialize logging/tracing subsystem
fn init_logging(config: &Config, cli_level: Option<&str>, quiet: bool) -> Result<()> {
    let mut log_config = LogConfig::parse(&config.logging.level, &config.logging.format)
        .context("Invalid logging configuration")?;
    if quiet {
        log_config.level = Level::ERROR;
    } else if let Some(level) = cli_level {
        log_config.level = parse_log_level(level);
    }

    init_tracing(&log_config).context("Failed to install tracing subscriber")
}

fn load_config(path: Option<PathBuf>, quiet: bool) -> Result<Config> {
    match find_config_file(path) {
        Some(path) => Config::from_file(&path)
            .with_context(|| format!("Failed to load configuration from {}", path.display())),
        None => {
            if !quiet {
                eprintln!(
                    "{}",
                    style("No configuration file found, using defaults").yellow()
                );
            }
            Ok(Config::default())
        }
    }
}

/// Validate configuration file
fn validate_config(path: Option<PathBuf>, verbose: bool) -> Result<()> {
    let config_path = find_config_file(path).context("No configuration file found")?;

    println!("Validating configuration: {}", config_path.display());

    let config = Config::from_file(&config_path).with_context(|| {
        format!(
            "Failed to load configuration from {}",
            config_path.display()
        )
    })?;

    if verbose {
        println!("\n{}", style("Configuration loaded:").green().bold());
        println!("  Table: {}", config.store.table_name);
        println!(
            "  Connections: {} open, {} kept idle, {}s idle timeout, {}s lifetime",
            config.store.max_open_connections,
            config.store.min_idle_connections,
            config.store.idle_timeout_secs,
            config.store.max_lifetime_secs
        );
        println!("  Default TTL: {}s", config.resolver.default_ttl);
        println!("  Zone refresh: every {}s", config.resolver.zone_refresh_secs);
        println!("  Max CNAME chain: {}", config.resolver.max_chain_depth);
        println!("  Query timeout: {}ms", config.resolver.query_timeout_ms);
        println!("  Logging: {} ({})", config.logging.level, config.logging.format);
    }

    config
        .validate()
        .with_context(|| "Configuration validation failed")?;

    println!("{}", style("Configuration is valid!").green().bold());
    Ok(())
}

async fn connect(config: &Config) -> Result<SqlRecordStore> {
    SqlRecordStore::connect(&config.store.to_store_config())
        .await
        .context("Failed to connect to record store")
}

async fn create_schema(config: &Config) -> Result<()> {
    let store = connect(config).await?;
    store
        .create_schema()
        .await
        .context("Failed to create records table")?;
    println!(
        "{} {}",
        style("Records table ready:").green().bold(),
        store.table()
    );
    store.close().await;
    Ok(())
}

async fn list_zones(config: &Config) -> Result<()> {
    let store = connect(config).await?;
    let resolver = Resolver::new(Arc::new(store), config.resolver.to_resolver_config());
    let snapshot = resolver
        .refresh_zones()
        .await
        .context("Failed to load zones")?;

    if snapshot.zones().is_empty() {
        println!("{}", style("No zones found").yellow());
    }
    for zone in snapshot.zones().iter() {
        println!("{zone}");
    }
    Ok(())
}

/// Process-wide counters sampled after a query.
#[derive(Debug, Default, Serialize)]
struct QueryStats {
    query_time_ms: u64,
    zone_loads: u64,
    zone_load_failures: u64,
    dropped_records: u64,
}

impl QueryStats {
    fn sample(timer: &QueryTimer) -> Self {
        let metrics = metrics();
        Self {
            query_time_ms: u64::try_from(timer.elapsed().as_millis()).unwrap_or(u64::MAX),
            zone_loads: metrics.zone_refreshes_total(),
            zone_load_failures: metrics.zone_refresh_failures(),
            dropped_records: metrics.dropped_records_total(),
        }
    }
}

/// One query and its result, in a printable shape.
#[derive(Debug, Serialize)]
struct QueryReport {
    name: Name,
    qtype: String,
    status: &'static str,
    served: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    zone: Option<Name>,
    answers: Vec<Record>,
    authority: Vec<Record>,
    additional: Vec<Record>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    stats: QueryStats,
}

impl QueryReport {
    fn new(query: &Query, result: std::result::Result<Outcome, ResolveError>) -> Self {
        let mut report = Self {
            name: query.name.clone(),
            qtype: query.qtype.to_string(),
            status: "NOERROR",
            served: false,
            zone: None,
            answers: Vec::new(),
            authority: Vec::new(),
            additional: Vec::new(),
            error: None,
            stats: QueryStats::default(),
        };

        match result {
            Ok(Outcome::Served(resolution)) => {
                report.status = resolution.response_code().name();
                report.served = true;
                report.zone = Some(resolution.zone);
                report.answers = resolution.answers;
                report.authority = resolution.authority;
                report.additional = resolution.additional;
            }
            Ok(Outcome::NotServed) => {}
            Err(e) => {
                report.status = e.response_code().name();
                report.error = Some(e.to_string());
            }
        }
        report
    }

    fn print_text(&self) {
        println!(
            ";; {} {} status: {}",
            self.name,
            self.qtype,
            style(self.status).bold()
        );

        if let Some(error) = &self.error {
            println!(";; {}", style(error).red());
        } else if let Some(zone) = &self.zone {
            println!(";; zone: {zone}, flags: aa");
            self.print_sections();
        } else {
            println!(";; {}", style("not served: no known zone owns this name").yellow());
        }

        println!(
            "\n;; Query time: {} msec, zone loads: {} ok / {} failed, dropped rows: {}",
            self.stats.query_time_ms,
            self.stats.zone_loads,
            self.stats.zone_load_failures,
            self.stats.dropped_records
        );
    }

    fn print_sections(&self) {
        for (title, records) in [
            ("ANSWER", &self.answers),
            ("AUTHORITY", &self.authority),
            ("ADDITIONAL", &self.additional),
        ] {
            if records.is_empty() {
                continue;
            }
            println!("\n;; {} SECTION:", style(title).green());
            for record in records {
                println!("{record}");
            }
        }
    }
}

fn parse_query(name: &str, qtype: &str) -> Result<Query> {
    let name = Name::from_str(name).with_context(|| format!("Invalid query name {name:?}"))?;
    let qtype = QueryType::from_str(qtype).with_context(|| format!("Invalid query type {qtype:?}"))?;
    Ok(Query::new(name, qtype))
}

async fn run_query(config: &Config, name: &str, qtype: &str, json: bool) -> Result<()> {
    let query = parse_query(name, qtype)?;
    let store = connect(config).await?;
    let resolver = Resolver::new(Arc::new(store), config.resolver.to_resolver_config());

    let timer = QueryTimer::start();
    let result = resolver.resolve(&query).await;
    debug!(ok = result.is_ok(), "query finished");
    let mut report = QueryReport::new(&query, result);
    report.stats = QueryStats::sample(&timer);

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to encode result")?
        );
    } else {
        report.print_text();
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::Validate { verbose } = &cli.command {
        return validate_config(cli.config, *verbose);
    }

    let config = load_config(cli.config.clone(), cli.quiet)?;
    config.validate().context("Invalid configuration")?;
    init_logging(&config, cli.log_level.as_deref(), cli.quiet)?;

    match cli.command {
        Commands::Schema => create_schema(&config).await,
        Commands::Zones => list_zones(&config).await,
        Commands::Query { name, qtype, json } => run_query(&config, &name, &qtype, json).await,
        Commands::Validate { .. } => Ok(()),
    }
}
