//! Change notifications for view layers.
//!
//! Every externally visible state change is announced as a [`BoardEvent`] on
//! a `tokio::sync::broadcast` channel. Views subscribe and repaint; nothing
//! in the board waits for them. Events are serde-tagged so a subscriber can
//! forward them over a wire untouched.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use super::models::{LeadId, Stage};
use super::stats::PipelineStats;

/// Event channel capacity. A subscriber that lags further than this starts
/// losing the oldest events (standard broadcast semantics).
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum BoardEvent {
    /// A lead changed stage. Fired for the optimistic application, for the
    /// rollback snap-back, and for local updates that move a lead.
    StageChanged {
        lead_id: LeadId,
        from: Stage,
        to: Stage,
    },
    /// The server accepted a stage move.
    MoveConfirmed { lead_id: LeadId, stage: Stage },
    /// The server rejected a stage move; the board has already snapped the
    /// lead back to `from`.
    MoveFailed {
        lead_id: LeadId,
        from: Stage,
        to: Stage,
        reason: String,
    },
    /// Derived statistics changed; carries the full snapshot.
    StatsUpdated { stats: PipelineStats },
    /// A background refresh replaced the collection.
    Refreshed { lead_count: usize },
    /// The initial load failed and the board is empty.
    LoadFailed { reason: String },
    /// A persistence cache read or write failed; the board keeps operating
    /// in memory.
    CacheDegraded { reason: String },
}

/// Broadcast an event to all subscribers. Returns silently when nobody is
/// listening.
pub fn publish(tx: &broadcast::Sender<BoardEvent>, event: BoardEvent) {
    let _ = tx.send(event); // Ignore error if no subscribers
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::models::Lead;

    #[test]
    fn test_stage_changed_serialization() {
        let event = BoardEvent::StageChanged {
            lead_id: LeadId(5),
            from: Stage::New,
            to: Stage::Contacted,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"StageChanged\""));
        assert!(json.contains("\"lead_id\":5"));
        assert!(json.contains("\"from\":\"New\""));
        assert!(json.contains("\"to\":\"Contacted\""));
    }

    #[test]
    fn test_move_failed_carries_reason() {
        let event = BoardEvent::MoveFailed {
            lead_id: LeadId(1),
            from: Stage::New,
            to: Stage::Quoted,
            reason: "Invalid status".to_string(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"MoveFailed\""));
        assert!(json.contains("\"Invalid status\""));
    }

    #[test]
    fn test_stats_updated_carries_snapshot() {
        let leads = vec![Lead::new(LeadId(1), "Asha", "555-0100", Stage::Converted)];
        let event = BoardEvent::StatsUpdated {
            stats: PipelineStats::from_leads(&leads),
        };
        let json = serde_json::to_string(&event).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["type"], "StatsUpdated");
        assert_eq!(parsed["data"]["stats"]["total_leads"], 1);
        assert_eq!(parsed["data"]["stats"]["conversion_rate"], 100.0);
    }

    #[test]
    fn test_event_roundtrip_deserialization() {
        let event = BoardEvent::StageChanged {
            lead_id: LeadId(10),
            from: Stage::Quoted,
            to: Stage::Converted,
        };
        let json = serde_json::to_string(&event).unwrap();
        let back: BoardEvent = serde_json::from_str(&json).unwrap();
        match back {
            BoardEvent::StageChanged { lead_id, from, to } => {
                assert_eq!(lead_id, LeadId(10));
                assert_eq!(from, Stage::Quoted);
                assert_eq!(to, Stage::Converted);
            }
            _ => panic!("Expected StageChanged variant"),
        }
    }

    #[tokio::test]
    async fn test_publish_delivers_to_all_subscribers() {
        let (tx, _) = broadcast::channel(16);
        let mut rx1 = tx.subscribe();
        let mut rx2 = tx.subscribe();

        publish(
            &tx,
            BoardEvent::Refreshed { lead_count: 3 },
        );

        for rx in [&mut rx1, &mut rx2] {
            match rx.recv().await.unwrap() {
                BoardEvent::Refreshed { lead_count } => assert_eq!(lead_count, 3),
                other => panic!("Expected Refreshed, got {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_does_not_panic() {
        let (tx, _) = broadcast::channel(16);
        publish(
            &tx,
            BoardEvent::LoadFailed {
                reason: "connection refused".to_string(),
            },
        );
    }
}
