//! Stage move command — `leadflow move <id> <stage>`.

use anyhow::{Result, anyhow};

use leadflow::board::models::{LeadId, Stage};
use leadflow::board::{MoveResolution, MoveTicket};
use leadflow::config::LeadflowConfig;
use leadflow::ui::{CHECK, CROSS};

use super::build_manager;

pub async fn cmd_move(config: &LeadflowConfig, id: i64, stage: &str) -> Result<()> {
    let target: Stage = stage.parse().map_err(|e: String| anyhow!(e))?;

    let manager = build_manager(config);
    manager.bootstrap().await;

    let ticket: Option<MoveTicket> = manager.move_lead(LeadId(id), target).await?;
    let Some(ticket) = ticket else {
        println!("Lead #{} is already in {}.", id, target);
        return Ok(());
    };

    let from = ticket.from;
    println!("Moving lead #{}: {} -> {} ...", id, from, target);
    match ticket.outcome().await {
        MoveResolution::Confirmed => {
            println!("{}Lead #{} moved to {}.", CHECK, id, target);
        }
        MoveResolution::RolledBack => {
            println!(
                "{}Server rejected the move; lead #{} stays in {}.",
                CROSS, id, from
            );
        }
        MoveResolution::Superseded => {
            println!("Move of lead #{} was superseded by a newer change.", id);
        }
    }
    Ok(())
}
