mod config;
mod display;
mod fetcher;
mod models;
mod normalizer;
mod pipeline;
mod render;
mod scheduler;
mod utils;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::AppConfig;
use crate::fetcher::HttpListingSource;
use crate::models::SectionKind;
use crate::pipeline::Pipeline;
use crate::scheduler::{Board, RefreshScheduler, SchedulerState};

#[derive(Parser)]
#[command(name = "listings-feed", about = "MLS listings fetch / render / refresh", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch one section and print the normalized listings as JSON
    Fetch {
        #[arg(short, long, value_enum, default_value = "active")]
        status: StatusArg,

        /// Overrides feed.fetch_limit
        #[arg(short, long)]
        limit: Option<u32>,

        /// Print the first N listings as a rendered section instead
        #[arg(short, long)]
        cap: Option<usize>,
    },

    /// Run a single fetch → render cycle and print both sections
    Once,

    /// Keep listings fresh on the configured interval until Ctrl-C.
    /// Press Enter to refresh now.
    Watch,

    /// Print the effective configuration
    Config,
}

#[derive(Clone, Copy, ValueEnum)]
enum StatusArg {
    Active,
    Sold,
}

impl From<StatusArg> for SectionKind {
    fn from(arg: StatusArg) -> Self {
        match arg {
            StatusArg::Active => SectionKind::Active,
            StatusArg::Sold => SectionKind::Sold,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "listings_feed=info,warn",
        1 => "listings_feed=debug,info",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(fmt::layer().compact().with_target(false))
        .with(EnvFilter::new(filter))
        .init();

    let config = AppConfig::load()?;

    match cli.command {
        Command::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }

        Command::Fetch { status, limit, cap } => {
            let Some(pipeline) = build_pipeline(&config)? else {
                return Ok(());
            };
            let _t = utils::Timer::start("Fetch");
            let kind = SectionKind::from(status);
            let listings = pipeline
                .fetch_section(kind, limit)
                .await
                .with_context(|| format!("Fetching {:?} listings failed", kind))?;
            info!("{:?}: {} listings", kind, listings.len());
            match cap {
                Some(cap) => {
                    let view = render::render(&listings, kind, cap);
                    println!("{}", serde_json::to_string_pretty(&view)?);
                }
                None => println!("{}", serde_json::to_string_pretty(&listings)?),
            }
        }

        Command::Once => {
            let Some(pipeline) = build_pipeline(&config)? else {
                return Ok(());
            };
            let _t = utils::Timer::start("Listings cycle");
            let report = pipeline.run().await;
            let mut board = Board::default();
            board.apply(report);
            print!("{}", board);
        }

        Command::Watch => {
            let Some(pipeline) = build_pipeline(&config)? else {
                return Ok(());
            };
            let handle = RefreshScheduler::from_config(pipeline, &config.scheduler).start();
            let mut board_rx = handle.subscribe();

            let ctrl_c = tokio::signal::ctrl_c();
            tokio::pin!(ctrl_c);

            let mut stdin = BufReader::new(tokio::io::stdin()).lines();
            let mut stdin_open = true;

            loop {
                tokio::select! {
                    _ = &mut ctrl_c => {
                        info!("Ctrl-C received, stopping");
                        break;
                    }
                    line = stdin.next_line(), if stdin_open => match line {
                        Ok(Some(_)) => {
                            if !handle.tick() {
                                warn!("Refresh request not delivered");
                            }
                        }
                        Ok(None) => stdin_open = false,
                        Err(e) => {
                            warn!("stdin closed: {}", e);
                            stdin_open = false;
                        }
                    },
                    changed = board_rx.changed() => {
                        if changed.is_err() {
                            warn!("Scheduler exited");
                            break;
                        }
                        let board = board_rx.borrow_and_update().clone();
                        if board.state == SchedulerState::Idle && board.cycles_completed > 0 {
                            print!("{}", board);
                        }
                    }
                }
            }

            handle.stop().await?;
        }
    }

    Ok(())
}

/// `None` when the feed is switched off; setup instructions are printed instead.
fn build_pipeline(config: &AppConfig) -> Result<Option<Arc<Pipeline>>> {
    if !config.feed.enabled {
        print_setup_instructions();
        return Ok(None);
    }
    let source = HttpListingSource::new(&config.feed).context("Failed to build listings source")?;
    Ok(Some(Arc::new(Pipeline::new(Arc::new(source), config))))
}

fn print_setup_instructions() {
    warn!("Listings feed not yet configured");
    println!("To enable MLS listings:");
    println!("  1. Obtain IDX / MLS API access and credentials");
    println!("  2. Set feed.endpoint in config/local.toml (or LISTINGS_FEED__ENDPOINT)");
    println!("  3. Set feed.username / feed.password if the endpoint needs them");
    println!("  4. Set feed.enabled = true (or LISTINGS_FEED__ENABLED=true)");
}
