// crates/cli/src/main.rs
//! geo-console binary.
//!
//! Thin command-line caller of the session controller: starts, resumes,
//! or re-runs an analysis against a GEO backend and renders controller
//! events as a progress bar until the single terminal event lands.

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use geo_console_client::HttpAnalysisClient;
use geo_console_session::{SessionController, SessionEvent};
use geo_console_types::{AnalysisRequest, SessionId};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::broadcast;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "geo-console", version, about = "Track GEO brand-visibility analyses")]
struct Cli {
    /// Backend origin.
    #[arg(long, env = "GEO_CONSOLE_URL", default_value = "http://localhost:8000")]
    url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start a new analysis and track it to completion.
    Run {
        #[arg(long)]
        brand: String,
        #[arg(long)]
        product: Option<String>,
        #[arg(long)]
        website: Option<String>,
        /// LLM to query (repeatable).
        #[arg(long = "llm", value_name = "NAME", default_values_t = vec!["Claude".to_string()])]
        llms: Vec<String>,
        #[arg(long, default_value_t = 10)]
        prompts: u32,
    },
    /// Re-open a previous session, resuming live tracking if it is
    /// still running.
    Watch {
        session_id: String,
        /// Display label only; liveness is always inferred.
        #[arg(long)]
        brand: Option<String>,
    },
    /// Re-run a previous session with the same prompts and LLMs.
    Reanalyze { session_id: String },
    /// List the most recent analyses.
    Recent,
    /// Print visibility history for a brand.
    History { brand: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let client = HttpAnalysisClient::new(&cli.url);

    match cli.command {
        Command::Run {
            brand,
            product,
            website,
            llms,
            prompts,
        } => {
            let mut request = AnalysisRequest::new(brand, llms).with_num_prompts(prompts);
            if let Some(product) = product {
                request = request.with_product(product);
            }
            if let Some(website) = website {
                request = request.with_website(website);
            }

            let ctrl = SessionController::new(client);
            let rx = ctrl.subscribe();
            let id = ctrl.submit(&request).await?;
            eprintln!("session {id}");
            let results = track_to_completion(rx).await?;
            print_json(&results)
        }
        Command::Watch { session_id, brand } => {
            let ctrl = SessionController::new(client);
            let rx = ctrl.subscribe();
            ctrl.select_existing(SessionId::new(session_id), brand);
            let results = track_to_completion(rx).await?;
            print_json(&results)
        }
        Command::Reanalyze { session_id } => {
            let ctrl = SessionController::new(client);
            let rx = ctrl.subscribe();
            let new_id = ctrl.reanalyze(&SessionId::new(session_id)).await?;
            eprintln!("re-analysis session {new_id}");
            let results = track_to_completion(rx).await?;
            print_json(&results)
        }
        Command::Recent => {
            let recent = client.recent_analyses().await?;
            for row in &recent.analyses {
                let when = row.timestamp.as_deref().unwrap_or("-");
                let product = row.product_name.as_deref().unwrap_or("-");
                println!("{}  {}  {}  {}", row.session_id, row.brand_name, product, when);
            }
            eprintln!("{} sessions", recent.total);
            Ok(())
        }
        Command::History { brand } => {
            let history = client.brand_history(&brand).await?;
            print_json(&history)
        }
    }
}

/// Render controller events until the terminal one arrives.
async fn track_to_completion(
    mut rx: broadcast::Receiver<SessionEvent>,
) -> Result<serde_json::Value> {
    let bar = ProgressBar::new(100);
    bar.set_style(ProgressStyle::with_template(
        "{bar:40.cyan/blue} {pos:>3}% {msg}",
    )?);

    loop {
        match rx.recv().await {
            Ok(SessionEvent::Progress { snapshot, .. }) => {
                bar.set_position(u64::from(snapshot.progress));
                bar.set_message(snapshot.current_step);
            }
            Ok(SessionEvent::Completed { results, .. }) => {
                bar.finish_with_message("complete");
                return Ok(results);
            }
            Ok(SessionEvent::Failed { reason, .. }) => {
                bar.abandon_with_message(reason.to_string());
                bail!(reason);
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "event stream lagged");
            }
            Err(broadcast::error::RecvError::Closed) => {
                bail!("controller event channel closed");
            }
        }
    }
}

fn print_json(value: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
