//! Live board follower — `leadflow watch`.
//!
//! Subscribes to the event feed, starts the background refresh loop, and
//! prints one line per event until Ctrl-C.

use anyhow::Result;
use chrono::Local;
use tokio::sync::broadcast::error::RecvError;
use tracing::debug;

use leadflow::board::events::BoardEvent;
use leadflow::config::LeadflowConfig;
use leadflow::refresh::RefreshHandle;
use leadflow::ui::{CHECK, CROSS};

use super::build_manager;

pub async fn cmd_watch(config: &LeadflowConfig) -> Result<()> {
    let manager = build_manager(config);
    // Subscribe before bootstrap so the initial load's events are seen.
    let mut events = manager.subscribe();
    manager.bootstrap().await;

    let interval = config.refresh_interval();
    let refresher = RefreshHandle::spawn(manager.clone(), interval);

    println!(
        "Watching pipeline at {} (refresh every {}s, Ctrl-C to stop)",
        config.base_url(),
        interval.as_secs()
    );

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                println!();
                println!("Stopping.");
                break;
            }
            event = events.recv() => {
                match event {
                    Ok(event) => print_event(&event),
                    Err(RecvError::Lagged(missed)) => {
                        debug!(missed, "event subscriber lagged");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }
    }

    refresher.shutdown().await;
    Ok(())
}

fn print_event(event: &BoardEvent) {
    let now = Local::now().format("%H:%M:%S");
    match event {
        BoardEvent::StageChanged { lead_id, from, to } => {
            println!("[{}] lead #{}: {} -> {}", now, lead_id, from, to);
        }
        BoardEvent::MoveConfirmed { lead_id, stage } => {
            println!("[{}] {}lead #{} confirmed in {}", now, CHECK, lead_id, stage);
        }
        BoardEvent::MoveFailed {
            lead_id, reason, ..
        } => {
            println!("[{}] {}move of lead #{} failed: {}", now, CROSS, lead_id, reason);
        }
        BoardEvent::StatsUpdated { stats } => {
            println!(
                "[{}] stats: {} leads, ${:.0} total, {:.1}% converted",
                now, stats.total_leads, stats.total_value, stats.conversion_rate
            );
        }
        BoardEvent::Refreshed { lead_count } => {
            println!("[{}] refreshed: {} leads", now, lead_count);
        }
        BoardEvent::LoadFailed { reason } => {
            println!("[{}] {}load failed: {}", now, CROSS, reason);
        }
        BoardEvent::CacheDegraded { reason } => {
            println!("[{}] cache degraded: {}", now, reason);
        }
    }
}
