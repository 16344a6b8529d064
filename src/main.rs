//! SiteLens main entry point
//!
//! This is the command-line interface for the SiteLens page analyzer.

use anyhow::Context;
use clap::{Parser, Subcommand};
use sitelens::config::load_config;
use sitelens::service::{
    Handler, HandlerChain, LoggingInterceptor, Request, Response, ServiceHandler, StreamFrame,
    TimingInterceptor,
};
use sitelens::{AnalysisOptions, AnalysisService};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

/// SiteLens: a resilient web page analyzer
///
/// SiteLens fetches a page, reports its HTML version, title, headings,
/// links and login forms, and probes its external links for reachability.
#[derive(Parser, Debug)]
#[command(name = "sitelens")]
#[command(version)]
#[command(about = "A resilient web page analyzer", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Analyze a URL now and print the finished analysis
    Analyze {
        url: String,

        /// Skip probing external links
        #[arg(long)]
        no_links: bool,

        /// Skip login form detection
        #[arg(long)]
        no_forms: bool,

        /// Skip heading counts
        #[arg(long)]
        no_headings: bool,

        /// Page fetch timeout in milliseconds
        #[arg(long, value_name = "MS", default_value_t = 30_000)]
        timeout_ms: u64,
    },

    /// Record an analysis request without running it
    Submit { url: String },

    /// Print a stored analysis
    Show { id: String },

    /// Stream the events of an analysis, one JSON frame per line
    Events {
        id: String,

        /// Keep-alive interval in seconds
        #[arg(
            long,
            default_value_t = 15,
            value_parser = clap::value_parser!(u64).range(1..=3600)
        )]
        keepalive_secs: u64,
    },

    /// Delete a stored analysis
    Delete { id: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let config = load_config(&cli.config)
        .with_context(|| format!("failed to load configuration from {}", cli.config.display()))?;

    let service = Arc::new(AnalysisService::from_config(&config)?);
    let timing = Arc::new(TimingInterceptor::new());
    let chain = HandlerChain::new(Arc::new(ServiceHandler::new(service)))
        .with(timing.clone())
        .with(Arc::new(LoggingInterceptor));

    match cli.command {
        Command::Analyze {
            url,
            no_links,
            no_forms,
            no_headings,
            timeout_ms,
        } => {
            let options = AnalysisOptions {
                include_headings: !no_headings,
                check_links: !no_links,
                detect_forms: !no_forms,
                timeout: Duration::from_millis(timeout_ms),
            };

            let started = chain
                .handle(Request::StartAnalysis { url, options })
                .await?;
            let Response::Analysis(analysis) = started else {
                anyhow::bail!("unexpected response to start_analysis");
            };

            let finished = chain
                .handle(Request::ExecuteAnalysis {
                    id: analysis.id.to_string(),
                    options,
                })
                .await?;
            print_response(&finished)?;

            let stats = timing.stats("execute_analysis");
            tracing::debug!(elapsed_ms = stats.total_ms, "Analysis run finished");
        }
        Command::Submit { url } => {
            let response = chain
                .handle(Request::StartAnalysis {
                    url,
                    options: AnalysisOptions::default(),
                })
                .await?;
            print_response(&response)?;
        }
        Command::Show { id } => {
            let response = chain.handle(Request::FetchAnalysis { id }).await?;
            print_response(&response)?;
        }
        Command::Events { id, keepalive_secs } => {
            handle_events(&chain, id, Duration::from_secs(keepalive_secs)).await?;
        }
        Command::Delete { id } => {
            let response = chain.handle(Request::DeleteAnalysis { id }).await?;
            print_response(&response)?;
        }
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("sitelens=info,warn"),
            1 => EnvFilter::new("sitelens=debug,info"),
            2 => EnvFilter::new("sitelens=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

fn print_response(response: &Response) -> anyhow::Result<()> {
    match response {
        Response::Analysis(analysis) => {
            println!("{}", serde_json::to_string_pretty(analysis)?);
        }
        Response::StreamClosed(close) => {
            tracing::debug!(?close, "Event stream closed");
        }
        Response::Deleted { id } => {
            println!("Deleted analysis {}", id);
        }
    }
    Ok(())
}

/// Prints stream frames as they arrive until the worker finishes
async fn handle_events(chain: &HandlerChain, id: String, keepalive: Duration) -> anyhow::Result<()> {
    let (tx, mut rx) = mpsc::channel::<StreamFrame>(16);

    let printer = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            match serde_json::to_string(&frame) {
                Ok(line) => println!("{}", line),
                Err(e) => tracing::error!(error = %e, "Failed to serialize frame"),
            }
        }
    });

    let response = chain
        .handle(Request::StreamAnalysis {
            id,
            sink: tx,
            keepalive,
        })
        .await;
    printer.await?;

    print_response(&response?)
}
