#![forbid(unsafe_code)]

use anyhow::Result;
use botswarm::client::WsConnector;
use botswarm::config::{Cli, RunConfig};
use botswarm::metrics::SwarmMetrics;
use botswarm::session::SessionOptions;
use botswarm::swarm::{Fleet, OutcomeReporter, SwarmController, SwarmSummary};
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};
use uuid::Uuid;

/// How long stopped sessions get to close their sockets before the process exits.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("botswarm=info")),
        )
        .init();

    let config = Cli::parse().into_config()?;
    let run_id = Uuid::new_v4();

    print_banner(&config, run_id);

    let metrics = SwarmMetrics::new();
    let reporter = Arc::new(OutcomeReporter::new());
    let controller = SwarmController::new(
        Arc::new(WsConnector::new(config.gateway_path.clone())),
        config.target.clone(),
        config.stagger,
        SessionOptions {
            behavior: config.behavior.clone(),
            metrics: metrics.clone(),
        },
        reporter.clone(),
    );

    let status_task = config.status_interval.map(|every| {
        let metrics = metrics.clone();
        tokio::spawn(async move {
            loop {
                sleep(every).await;
                println!("[status] {}", metrics.status_line());
            }
        })
    });

    // The controller runs on its own task so a fault inside it is reported, not fatal.
    let bots = config.bots;
    let fleet = match tokio::spawn(async move { controller.run(bots).await }).await {
        Ok((run, fleet)) => {
            println!("All bots created");
            info!("{} of {} bots attempted", run.completed.len(), run.requested_count);
            Some(fleet)
        }
        Err(e) => {
            eprintln!("Error creating bots: {e}");
            None
        }
    };

    if let Some(fleet) = fleet {
        hold(fleet, config.hold).await;
    }

    if let Some(task) = status_task {
        task.abort();
    }

    let summary = SwarmSummary::new(run_id, config.bots, reporter.records(), metrics.snapshot());
    if config.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        summary.print_summary();
    }

    Ok(())
}

/// Keep the fleet alive until Ctrl+C, the hold time, or every session has ended.
async fn hold(mut fleet: Fleet, hold: Option<Duration>) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Could not listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    fleet.hold_until(hold, ctrl_c).await;
    fleet.stop(SHUTDOWN_GRACE).await;
}

fn print_banner(config: &RunConfig, run_id: Uuid) {
    println!("\n=== Starting Bot Swarm ===");
    println!("Run: {run_id}");
    println!("Server: {}:{}", config.target.host, config.target.port);
    println!("Version: {}", config.target.protocol_version);
    println!("Bots: {}", config.bots);
    println!("Stagger: {}ms", config.stagger.as_millis());
    match &config.behavior {
        Some(b) => println!(
            "Behavior: move every {}ms ({}ms forward), chat every {}ms",
            b.movement_interval.as_millis(),
            b.movement_duration.as_millis(),
            b.chat_interval.as_millis(),
        ),
        None => println!("Behavior: disabled (login only)"),
    }
    if let Some(hold) = config.hold {
        println!("Hold: {}s", hold.as_secs());
    }
    println!("==========================\n");
}
