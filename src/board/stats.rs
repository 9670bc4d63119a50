//! Derived pipeline numbers.
//!
//! [`PipelineStats::from_leads`] computes the full snapshot in one pass:
//! totals, conversion rate, average deal size, weighted revenue projection,
//! and the per-stage count/value slices. [`stage_health`] grades a single
//! stage's column for the board header indicators.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::models::{Lead, Stage};

/// Count and total quoted value for one stage column.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct StageSummary {
    pub count: usize,
    pub total_value: f64,
}

/// Full statistics snapshot over the current board state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineStats {
    /// Number of leads on the board.
    pub total_leads: usize,
    /// Sum of all quoted amounts; leads without a quote count as zero.
    pub total_value: f64,
    /// Converted leads as a percentage of all leads, one decimal place.
    /// Zero for an empty board.
    pub conversion_rate: f64,
    /// Mean quoted amount over leads with a positive quote, rounded to a
    /// whole number. Zero when no lead carries a positive quote.
    pub average_deal_size: f64,
    /// Sum of quoted amounts weighted by each lead's stage probability.
    pub projected_revenue: f64,
    /// Per-stage slices. All six stages are always present.
    pub stages: BTreeMap<Stage, StageSummary>,
}

impl PipelineStats {
    /// Compute statistics over a set of leads.
    pub fn from_leads<'a>(leads: impl IntoIterator<Item = &'a Lead>) -> Self {
        let mut stages: BTreeMap<Stage, StageSummary> = Stage::ALL
            .iter()
            .map(|s| (*s, StageSummary::default()))
            .collect();

        let mut total_leads = 0usize;
        let mut total_value = 0.0;
        let mut converted = 0usize;
        let mut quoted_sum = 0.0;
        let mut quoted_count = 0usize;
        let mut projected = 0.0;

        for lead in leads {
            total_leads += 1;
            let amount = lead.quoted_amount.unwrap_or(0.0);
            total_value += amount;
            projected += amount * lead.stage.weight();
            if lead.stage == Stage::Converted {
                converted += 1;
            }
            if amount > 0.0 {
                quoted_sum += amount;
                quoted_count += 1;
            }
            let slice = stages.entry(lead.stage).or_default();
            slice.count += 1;
            slice.total_value += amount;
        }

        let conversion_rate = if total_leads > 0 {
            round_to(converted as f64 / total_leads as f64 * 100.0, 1)
        } else {
            0.0
        };
        let average_deal_size = if quoted_count > 0 {
            (quoted_sum / quoted_count as f64).round()
        } else {
            0.0
        };

        Self {
            total_leads,
            total_value,
            conversion_rate,
            average_deal_size,
            projected_revenue: projected,
            stages,
        }
    }

    pub fn stage(&self, stage: Stage) -> StageSummary {
        self.stages.get(&stage).copied().unwrap_or_default()
    }
}

/// Health grade for one stage column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "message", rename_all = "lowercase")]
pub enum StageHealth {
    Good,
    Warning(String),
    Danger(String),
}

/// Grade a stage column. `leads` must be the leads currently in `stage`;
/// `today` is injected so callers control the clock.
pub fn stage_health<'a>(
    stage: Stage,
    leads: impl IntoIterator<Item = &'a Lead>,
    today: NaiveDate,
) -> StageHealth {
    let days = |lead: &Lead| lead.days_since_contact(today).unwrap_or(i64::MAX);
    match stage {
        Stage::New => {
            if leads.into_iter().count() > 10 {
                StageHealth::Warning("High volume of new leads".to_string())
            } else {
                StageHealth::Good
            }
        }
        Stage::Contacted => {
            if leads.into_iter().any(|l| days(l) > 7) {
                StageHealth::Danger("Some leads need follow-up".to_string())
            } else {
                StageHealth::Good
            }
        }
        Stage::Quoted => {
            if leads.into_iter().any(|l| days(l) > 14) {
                StageHealth::Danger("Quotes are getting stale".to_string())
            } else {
                StageHealth::Good
            }
        }
        _ => StageHealth::Good,
    }
}

fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::models::LeadId;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn lead(id: i64, stage: Stage, amount: Option<f64>) -> Lead {
        let mut l = Lead::new(LeadId(id), format!("Lead {}", id), "555-0100", stage);
        l.quoted_amount = amount;
        l
    }

    #[test]
    fn test_empty_board_yields_zeroed_stats() {
        let leads: Vec<Lead> = Vec::new();
        let stats = PipelineStats::from_leads(&leads);
        assert_eq!(stats.total_leads, 0);
        assert_eq!(stats.total_value, 0.0);
        assert_eq!(stats.conversion_rate, 0.0);
        assert_eq!(stats.average_deal_size, 0.0);
        assert_eq!(stats.projected_revenue, 0.0);
        // The six stage slices are still present.
        assert_eq!(stats.stages.len(), 6);
        assert_eq!(stats.stage(Stage::Quoted).count, 0);
    }

    #[test]
    fn test_conversion_rate_three_of_ten() {
        let leads: Vec<Lead> = (0..10)
            .map(|i| {
                let stage = if i < 3 { Stage::Converted } else { Stage::New };
                lead(i, stage, None)
            })
            .collect();
        let stats = PipelineStats::from_leads(&leads);
        assert_eq!(stats.conversion_rate, 30.0);
    }

    #[test]
    fn test_conversion_rate_rounds_to_one_decimal() {
        // 1 of 3 converted = 33.333...% -> 33.3
        let leads = vec![
            lead(1, Stage::Converted, None),
            lead(2, Stage::New, None),
            lead(3, Stage::New, None),
        ];
        let stats = PipelineStats::from_leads(&leads);
        assert_eq!(stats.conversion_rate, 33.3);
    }

    #[test]
    fn test_projected_revenue_weights_by_stage() {
        let leads = vec![lead(1, Stage::Quoted, Some(1000.0))];
        let stats = PipelineStats::from_leads(&leads);
        assert_eq!(stats.projected_revenue, 700.0);
    }

    #[test]
    fn test_projected_revenue_sums_across_stages() {
        let leads = vec![
            lead(1, Stage::New, Some(1000.0)),       // 100
            lead(2, Stage::Converted, Some(500.0)),  // 500
            lead(3, Stage::Lost, Some(9999.0)),      // 0
            lead(4, Stage::Interested, None),        // 0
        ];
        let stats = PipelineStats::from_leads(&leads);
        assert!((stats.projected_revenue - 600.0).abs() < 1e-9);
    }

    #[test]
    fn test_average_deal_size_ignores_unquoted_leads() {
        let leads = vec![
            lead(1, Stage::Quoted, Some(1000.0)),
            lead(2, Stage::Quoted, Some(2001.0)),
            lead(3, Stage::New, None),
            lead(4, Stage::New, Some(0.0)),
        ];
        let stats = PipelineStats::from_leads(&leads);
        // (1000 + 2001) / 2 = 1500.5 rounds to a whole number.
        assert_eq!(stats.average_deal_size, 1501.0);
        assert_eq!(stats.total_value, 3001.0);
    }

    #[test]
    fn test_stage_slices_carry_count_and_value() {
        let leads = vec![
            lead(1, Stage::Quoted, Some(1000.0)),
            lead(2, Stage::Quoted, Some(250.0)),
            lead(3, Stage::New, Some(80.0)),
        ];
        let stats = PipelineStats::from_leads(&leads);
        assert_eq!(stats.stage(Stage::Quoted).count, 2);
        assert_eq!(stats.stage(Stage::Quoted).total_value, 1250.0);
        assert_eq!(stats.stage(Stage::New).count, 1);
        assert_eq!(stats.stage(Stage::Lost).count, 0);
    }

    #[test]
    fn test_stage_health_flags_new_lead_volume() {
        let leads: Vec<Lead> = (0..11).map(|i| lead(i, Stage::New, None)).collect();
        let health = stage_health(Stage::New, &leads, day(2025, 3, 20));
        assert_eq!(
            health,
            StageHealth::Warning("High volume of new leads".to_string())
        );
        // Ten or fewer is fine.
        let health = stage_health(Stage::New, &leads[..10], day(2025, 3, 20));
        assert_eq!(health, StageHealth::Good);
    }

    #[test]
    fn test_stage_health_flags_stale_contacted_leads() {
        let today = day(2025, 3, 20);
        let fresh = lead(1, Stage::Contacted, None)
            .with_last_contact(today - chrono::Duration::days(3));
        let stale = lead(2, Stage::Contacted, None)
            .with_last_contact(today - chrono::Duration::days(8));
        assert_eq!(
            stage_health(Stage::Contacted, [&fresh], today),
            StageHealth::Good
        );
        assert_eq!(
            stage_health(Stage::Contacted, [&fresh, &stale], today),
            StageHealth::Danger("Some leads need follow-up".to_string())
        );
    }

    #[test]
    fn test_stage_health_flags_stale_quotes_after_two_weeks() {
        let today = day(2025, 3, 20);
        let aging = lead(1, Stage::Quoted, Some(1000.0))
            .with_last_contact(today - chrono::Duration::days(10));
        assert_eq!(stage_health(Stage::Quoted, [&aging], today), StageHealth::Good);
        let stale = lead(2, Stage::Quoted, Some(1000.0))
            .with_last_contact(today - chrono::Duration::days(15));
        assert_eq!(
            stage_health(Stage::Quoted, [&stale], today),
            StageHealth::Danger("Quotes are getting stale".to_string())
        );
    }

    #[test]
    fn test_stage_health_ignores_terminal_stages() {
        let today = day(2025, 3, 20);
        let ancient = lead(1, Stage::Lost, None).with_last_contact(day(2020, 1, 1));
        assert_eq!(stage_health(Stage::Lost, [&ancient], today), StageHealth::Good);
    }

    #[test]
    fn test_stats_survive_json_roundtrip() {
        let leads = vec![lead(1, Stage::Quoted, Some(1000.0))];
        let stats = PipelineStats::from_leads(&leads);
        let json = serde_json::to_string(&stats).unwrap();
        let back: PipelineStats = serde_json::from_str(&json).unwrap();
        assert_eq!(back, stats);
    }
}
