//! Async orchestration over the pipeline board.
//!
//! `BoardManager` owns the in-memory [`PipelineBoard`] together with the lead
//! data source, the persistence cache, and the event feed. It implements the
//! optimistic move protocol: the board changes immediately, a spawned task
//! asks the server to confirm, and a rejection snaps the lead back.
//!
//! Every issued move carries a generation token, and the manager remembers
//! only the *latest* token per lead. A server response whose token is no
//! longer the latest is discarded instead of applied, so a slow rollback from
//! an old move can never clobber a newer one. Rollbacks additionally
//! compare-and-set: the lead must still sit in the stage that particular move
//! put it in.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::{Mutex, broadcast};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::cache::{BoardCache, LAST_SYNC_KEY, LEADS_KEY};
use crate::errors::{BoardError, CacheError, SourceError};
use crate::source::LeadSource;

use super::events::{self, BoardEvent, EVENT_CHANNEL_CAPACITY};
use super::models::{Lead, LeadId, LeadPatch, Stage};
use super::state::PipelineBoard;
use super::stats::{PipelineStats, StageHealth};

/// How a confirmation task ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveResolution {
    /// The server accepted the move; the optimistic state stands.
    Confirmed,
    /// The server rejected the move; the lead was snapped back to the stage
    /// it came from.
    RolledBack,
    /// The response arrived too late to matter: a newer move or local change
    /// had already won, so the response was discarded.
    Superseded,
}

/// Outcome of one background refresh attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The payload differed and replaced the collection.
    Changed,
    /// The payload matched current state; nothing replaced.
    Unchanged,
    /// A move is awaiting confirmation; replacing the board now would wipe
    /// its optimistic state, so the refresh waits for the next interval.
    Deferred,
    /// The payload carried only per-stage summaries, no lead list; there is
    /// nothing to hydrate from.
    SummaryOnly,
}

/// Receipt for an issued move. The optimistic state is already applied when
/// the caller holds one of these; awaiting [`MoveTicket::outcome`] tells how
/// the server responded.
#[derive(Debug)]
pub struct MoveTicket {
    pub lead_id: LeadId,
    pub from: Stage,
    pub to: Stage,
    pub token: u64,
    handle: JoinHandle<MoveResolution>,
}

impl MoveTicket {
    /// Wait for the confirmation task to finish.
    pub async fn outcome(self) -> MoveResolution {
        match self.handle.await {
            Ok(resolution) => resolution,
            Err(e) => {
                warn!(lead_id = %self.lead_id, error = %e, "confirmation task aborted");
                MoveResolution::Superseded
            }
        }
    }
}

pub struct BoardManager {
    board: Mutex<PipelineBoard>,
    source: Arc<dyn LeadSource>,
    cache: Arc<dyn BoardCache>,
    events: broadcast::Sender<BoardEvent>,
    /// Generation counter for move tokens.
    move_seq: AtomicU64,
    /// Latest in-flight token per lead. A response may only be applied while
    /// its token is still the one recorded here.
    in_flight: Mutex<HashMap<LeadId, u64>>,
}

impl BoardManager {
    pub fn new(source: Arc<dyn LeadSource>, cache: Arc<dyn BoardCache>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            board: Mutex::new(PipelineBoard::new()),
            source,
            cache,
            events,
            move_seq: AtomicU64::new(0),
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Subscribe to the event feed. Events published before the call are not
    /// replayed.
    pub fn subscribe(&self) -> broadcast::Receiver<BoardEvent> {
        self.events.subscribe()
    }

    /// Initial load: hydrate from the persistence cache when it holds a lead
    /// collection, otherwise fetch from the source. A failed initial fetch
    /// emits `LoadFailed` and leaves the board empty.
    pub async fn bootstrap(&self) {
        if self.hydrate_from_cache().await {
            let stats = self.board.lock().await.stats();
            events::publish(&self.events, BoardEvent::StatsUpdated { stats });
            return;
        }
        match self.source.fetch_pipeline().await {
            Ok(snapshot) => {
                let stats = {
                    let mut board = self.board.lock().await;
                    if let Some(leads) = snapshot.leads {
                        board.hydrate(leads);
                        board.set_last_sync(Utc::now());
                    } else {
                        debug!("initial fetch carried no lead list");
                    }
                    board.stats()
                };
                self.persist().await;
                events::publish(&self.events, BoardEvent::StatsUpdated { stats });
            }
            Err(err) => {
                warn!(error = %err, "initial load failed; starting with an empty board");
                events::publish(
                    &self.events,
                    BoardEvent::LoadFailed {
                        reason: err.to_string(),
                    },
                );
            }
        }
    }

    /// Move a lead to `target`, optimistically.
    ///
    /// Returns `Ok(None)` when the lead is already in `target`: no version
    /// bump, no network call, no events. Otherwise the stage changes
    /// immediately, `StageChanged`/`StatsUpdated` fire, and a spawned task
    /// submits the change for server confirmation.
    pub async fn move_lead(
        self: &Arc<Self>,
        id: LeadId,
        target: Stage,
    ) -> Result<Option<MoveTicket>, BoardError> {
        // The token registers before the board lock drops; refresh checks
        // in_flight under the same lock, so it can never observe the
        // optimistic stage without the move that produced it.
        let (from, token, stats) = {
            let mut board = self.board.lock().await;
            let Some(from) = board.set_stage(id, target, Utc::now())? else {
                debug!(lead_id = %id, stage = %target, "move is a no-op");
                return Ok(None);
            };
            let token = self.move_seq.fetch_add(1, Ordering::Relaxed) + 1;
            self.in_flight.lock().await.insert(id, token);
            (from, token, board.stats())
        };
        debug!(lead_id = %id, %from, to = %target, token, "optimistic move applied");

        events::publish(
            &self.events,
            BoardEvent::StageChanged {
                lead_id: id,
                from,
                to: target,
            },
        );
        events::publish(&self.events, BoardEvent::StatsUpdated { stats });

        let manager = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let result = manager.source.submit_stage_change(id, target).await;
            manager.resolve_move(id, from, target, token, result).await
        });

        Ok(Some(MoveTicket {
            lead_id: id,
            from,
            to: target,
            token,
            handle,
        }))
    }

    /// Apply a server response to the move identified by `token`.
    async fn resolve_move(
        &self,
        id: LeadId,
        from: Stage,
        to: Stage,
        token: u64,
        result: Result<(), SourceError>,
    ) -> MoveResolution {
        {
            let mut in_flight = self.in_flight.lock().await;
            if in_flight.get(&id) != Some(&token) {
                debug!(lead_id = %id, token, "discarding superseded move response");
                return MoveResolution::Superseded;
            }
            in_flight.remove(&id);
        }

        match result {
            Ok(()) => {
                self.persist().await;
                events::publish(
                    &self.events,
                    BoardEvent::MoveConfirmed {
                        lead_id: id,
                        stage: to,
                    },
                );
                MoveResolution::Confirmed
            }
            Err(err) => {
                let reason = err.to_string();
                warn!(lead_id = %id, %reason, "stage move rejected; rolling back");
                let stats = {
                    let mut board = self.board.lock().await;
                    // Roll back only while this move's stage is still in
                    // place; a local update may have moved the lead since.
                    if board.stage_of(id) != Some(to) {
                        debug!(lead_id = %id, "stage changed since this move; discarding rollback");
                        return MoveResolution::Superseded;
                    }
                    if board.set_stage(id, from, Utc::now()).is_err() {
                        return MoveResolution::Superseded;
                    }
                    board.stats()
                };
                events::publish(
                    &self.events,
                    BoardEvent::StageChanged {
                        lead_id: id,
                        from: to,
                        to: from,
                    },
                );
                events::publish(
                    &self.events,
                    BoardEvent::MoveFailed {
                        lead_id: id,
                        from,
                        to,
                        reason,
                    },
                );
                events::publish(&self.events, BoardEvent::StatsUpdated { stats });
                self.persist().await;
                MoveResolution::RolledBack
            }
        }
    }

    /// Insert a new lead. Local-only; no server confirmation.
    pub async fn add_lead(&self, lead: Lead) -> Result<(), BoardError> {
        let stats = {
            let mut board = self.board.lock().await;
            board.add_lead(lead)?;
            board.stats()
        };
        self.persist().await;
        events::publish(&self.events, BoardEvent::StatsUpdated { stats });
        Ok(())
    }

    /// Remove a lead if present. Absent ids are a quiet no-op.
    pub async fn remove_lead(&self, id: LeadId) -> Option<Lead> {
        let (removed, stats) = {
            let mut board = self.board.lock().await;
            let removed = board.remove_lead(id);
            (removed, board.stats())
        };
        if removed.is_some() {
            self.persist().await;
            events::publish(&self.events, BoardEvent::StatsUpdated { stats });
        }
        removed
    }

    /// Merge a partial update. A patch that shifts the stage announces the
    /// transition but does not ask the server for confirmation; this path is
    /// for fields arriving from a full refresh or local edits.
    pub async fn update_lead(&self, id: LeadId, patch: &LeadPatch) -> Result<(), BoardError> {
        let (moved, stats) = {
            let mut board = self.board.lock().await;
            let moved = board.update_lead(id, patch)?;
            (moved, board.stats())
        };
        if let Some((from, to)) = moved {
            events::publish(
                &self.events,
                BoardEvent::StageChanged {
                    lead_id: id,
                    from,
                    to,
                },
            );
        }
        self.persist().await;
        events::publish(&self.events, BoardEvent::StatsUpdated { stats });
        Ok(())
    }

    /// One refresh pass against the source.
    ///
    /// While any move awaits confirmation the wholesale replace is deferred
    /// to the next interval, because hydrating would wipe the optimistic
    /// state the confirmation protocol is protecting.
    pub async fn refresh(&self) -> Result<RefreshOutcome, SourceError> {
        if !self.in_flight.lock().await.is_empty() {
            debug!("refresh deferred: a stage move is awaiting confirmation");
            return Ok(RefreshOutcome::Deferred);
        }

        let snapshot = self.source.fetch_pipeline().await?;
        let Some(mut leads) = snapshot.leads else {
            debug!("refresh returned a summary-only payload; keeping current board");
            return Ok(RefreshOutcome::SummaryOnly);
        };
        leads.sort_by_key(|l| l.id);

        let (outcome, stats, count) = {
            let mut board = self.board.lock().await;
            // Re-check after the fetch: a move issued while the request was
            // on the wire must not be stomped by the older payload.
            if !self.in_flight.lock().await.is_empty() {
                debug!("refresh deferred: a move was issued during the fetch");
                return Ok(RefreshOutcome::Deferred);
            }
            if board.snapshot() == leads {
                board.set_last_sync(Utc::now());
                (RefreshOutcome::Unchanged, None, 0)
            } else {
                let count = leads.len();
                board.hydrate(leads);
                board.set_last_sync(Utc::now());
                (RefreshOutcome::Changed, Some(board.stats()), count)
            }
        };
        self.persist().await;

        if let Some(stats) = stats {
            debug!(leads = count, "refresh replaced the collection");
            events::publish(&self.events, BoardEvent::Refreshed { lead_count: count });
            events::publish(&self.events, BoardEvent::StatsUpdated { stats });
        }
        Ok(outcome)
    }

    pub async fn stats(&self) -> PipelineStats {
        self.board.lock().await.stats()
    }

    /// Cloned leads in id order.
    pub async fn snapshot(&self) -> Vec<Lead> {
        self.board.lock().await.snapshot()
    }

    /// Cloned leads in funnel order, newest created first within a stage.
    pub async fn sorted(&self) -> Vec<Lead> {
        self.board
            .lock()
            .await
            .sorted()
            .into_iter()
            .cloned()
            .collect()
    }

    pub async fn leads_in_stage(&self, stage: Stage) -> Vec<Lead> {
        self.board
            .lock()
            .await
            .by_stage(stage)
            .into_iter()
            .cloned()
            .collect()
    }

    pub async fn search(&self, term: &str) -> Vec<Lead> {
        self.board
            .lock()
            .await
            .search(term)
            .into_iter()
            .cloned()
            .collect()
    }

    pub async fn stage_of(&self, id: LeadId) -> Option<Stage> {
        self.board.lock().await.stage_of(id)
    }

    pub async fn stage_health(&self, stage: Stage, today: NaiveDate) -> StageHealth {
        self.board.lock().await.stage_health(stage, today)
    }

    pub async fn version(&self) -> u64 {
        self.board.lock().await.version()
    }

    pub async fn last_sync(&self) -> Option<DateTime<Utc>> {
        self.board.lock().await.last_sync()
    }

    /// Number of moves still awaiting server confirmation.
    pub async fn pending_moves(&self) -> usize {
        self.in_flight.lock().await.len()
    }

    /// Try to restore the board from the persistence cache. Returns whether
    /// a lead collection was restored.
    async fn hydrate_from_cache(&self) -> bool {
        let cached = match self.cache.get(LEADS_KEY) {
            Ok(Some(json)) => json,
            Ok(None) => return false,
            Err(err) => {
                self.cache_degraded(err);
                return false;
            }
        };
        let leads: Vec<Lead> = match serde_json::from_str(&cached) {
            Ok(leads) => leads,
            Err(e) => {
                self.cache_degraded(CacheError::Corrupt {
                    key: LEADS_KEY.to_string(),
                    message: e.to_string(),
                });
                return false;
            }
        };
        let last_sync = match self.cache.get(LAST_SYNC_KEY) {
            Ok(Some(raw)) => DateTime::parse_from_rfc3339(&raw)
                .ok()
                .map(|at| at.with_timezone(&Utc)),
            Ok(None) => None,
            Err(err) => {
                self.cache_degraded(err);
                None
            }
        };
        let count = {
            let mut board = self.board.lock().await;
            board.hydrate(leads);
            if let Some(at) = last_sync {
                board.set_last_sync(at);
            }
            board.len()
        };
        debug!(leads = count, "hydrated board from cache");
        true
    }

    /// Mirror the board into the persistence cache. Failures degrade the
    /// cache, never the board.
    async fn persist(&self) {
        let (leads, last_sync) = {
            let board = self.board.lock().await;
            (board.snapshot(), board.last_sync())
        };
        let json = match serde_json::to_string(&leads) {
            Ok(json) => json,
            Err(e) => {
                warn!(error = %e, "failed to serialize leads for the cache");
                return;
            }
        };
        if let Err(err) = self.cache.set(LEADS_KEY, &json) {
            self.cache_degraded(err);
            return;
        }
        if let Some(at) = last_sync
            && let Err(err) = self.cache.set(LAST_SYNC_KEY, &at.to_rfc3339())
        {
            self.cache_degraded(err);
        }
    }

    fn cache_degraded(&self, err: CacheError) {
        warn!(error = %err, "persistence cache degraded; continuing in memory");
        events::publish(
            &self.events,
            BoardEvent::CacheDegraded {
                reason: err.to_string(),
            },
        );
    }
}
