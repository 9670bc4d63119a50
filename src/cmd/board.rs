//! Board and statistics views — `leadflow show`, `leadflow stats`.

use anyhow::Result;
use chrono::{Local, Utc};

use leadflow::board::models::{Lead, Stage};
use leadflow::board::stats::StageHealth;
use leadflow::config::LeadflowConfig;
use leadflow::ui::{CHART, DANGER, WARNING, stage_style, urgency_marker};

use super::build_manager;

pub async fn cmd_show(config: &LeadflowConfig, search: Option<&str>) -> Result<()> {
    let manager = build_manager(config);
    manager.bootstrap().await;
    let today = Local::now().date_naive();

    if let Some(term) = search {
        let matches = manager.search(term).await;
        println!();
        println!("Leads matching \"{}\": {}", term, matches.len());
        println!();
        for lead in &matches {
            print_lead_line(lead, today);
        }
        println!();
        return Ok(());
    }

    let stats = manager.stats().await;
    println!();
    println!("Pipeline Board");
    println!("==============");

    for stage in Stage::ALL {
        let leads = manager.leads_in_stage(stage).await;
        let summary = stats.stage(stage);
        let style = stage_style(stage);

        println!();
        println!(
            "{} ({} leads, ${:.0})",
            style.apply_to(stage.as_str()),
            summary.count,
            summary.total_value
        );
        match manager.stage_health(stage, today).await {
            StageHealth::Good => {}
            StageHealth::Warning(message) => println!("  {}{}", WARNING, message),
            StageHealth::Danger(message) => println!("  {}{}", DANGER, message),
        }
        for lead in &leads {
            print_lead_line(lead, today);
        }
    }

    println!();
    match manager.last_sync().await {
        Some(at) => println!("Last sync: {}", at.with_timezone(&Local).format("%H:%M:%S")),
        None => println!("Last sync: never"),
    }
    println!();
    Ok(())
}

fn print_lead_line(lead: &Lead, today: chrono::NaiveDate) {
    let amount = lead
        .quoted_amount
        .map(|a| format!(" ${:.0}", a))
        .unwrap_or_default();
    let course = lead
        .course
        .as_deref()
        .map(|c| format!(" [{}]", c))
        .unwrap_or_default();
    println!(
        "  #{} {}{}{}{}",
        lead.id,
        lead.name,
        course,
        amount,
        urgency_marker(lead.urgency(today))
    );
}

pub async fn cmd_stats(config: &LeadflowConfig) -> Result<()> {
    let manager = build_manager(config);
    manager.bootstrap().await;
    let stats = manager.stats().await;

    println!();
    println!("{}Pipeline Statistics", CHART);
    println!("===================");
    println!();
    println!("  Total leads:       {}", stats.total_leads);
    println!("  Total value:       ${:.0}", stats.total_value);
    println!("  Conversion rate:   {:.1}%", stats.conversion_rate);
    println!("  Average deal size: ${:.0}", stats.average_deal_size);
    println!("  Projected revenue: ${:.2}", stats.projected_revenue);
    println!();
    println!("  By stage:");
    for stage in Stage::ALL {
        let summary = stats.stage(stage);
        println!(
            "    {:<11} {:>3}  ${:.0}",
            stage_style(stage).apply_to(stage.as_str()),
            summary.count,
            summary.total_value
        );
    }
    println!();
    if let Some(at) = manager.last_sync().await {
        println!("  Last sync: {}", at.with_timezone(&Utc).to_rfc3339());
        println!();
    }
    Ok(())
}
