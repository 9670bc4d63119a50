//! The in-memory pipeline board.
//!
//! `PipelineBoard` is a pure state container: a keyed collection of leads
//! plus a version counter bumped on every content mutation. It knows nothing
//! about servers, caches, or event feeds; the manager layers those on top.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};

use crate::errors::BoardError;

use super::models::{Lead, LeadId, LeadPatch, Stage};
use super::stats::{self, PipelineStats, StageHealth};

#[derive(Debug, Default)]
pub struct PipelineBoard {
    leads: HashMap<LeadId, Lead>,
    version: u64,
    last_sync: Option<DateTime<Utc>>,
}

impl PipelineBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Monotonic content version. Every mutation that changes lead data
    /// bumps it; reads and no-ops never do.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// When the board last matched the server, if ever.
    pub fn last_sync(&self) -> Option<DateTime<Utc>> {
        self.last_sync
    }

    /// Sync bookkeeping, not lead data: does not bump the version.
    pub fn set_last_sync(&mut self, at: DateTime<Utc>) {
        self.last_sync = Some(at);
    }

    /// Wholesale replacement of the collection, used on initial load and
    /// when a background refresh brings different data. Duplicate ids in
    /// the input collapse to the last occurrence.
    pub fn hydrate(&mut self, leads: Vec<Lead>) {
        self.leads = leads.into_iter().map(|l| (l.id, l)).collect();
        self.version += 1;
    }

    pub fn add_lead(&mut self, lead: Lead) -> Result<(), BoardError> {
        if self.leads.contains_key(&lead.id) {
            return Err(BoardError::DuplicateId { id: lead.id });
        }
        self.leads.insert(lead.id, lead);
        self.version += 1;
        Ok(())
    }

    /// Removing an id that is not on the board is a no-op: UI-driven
    /// removals can race a server-driven refresh that already dropped it.
    pub fn remove_lead(&mut self, id: LeadId) -> Option<Lead> {
        let removed = self.leads.remove(&id);
        if removed.is_some() {
            self.version += 1;
        }
        removed
    }

    /// Merge a partial update into an existing lead. Returns the stage
    /// transition `(from, to)` when the patch moved the lead, so the caller
    /// can announce it.
    pub fn update_lead(
        &mut self,
        id: LeadId,
        patch: &LeadPatch,
    ) -> Result<Option<(Stage, Stage)>, BoardError> {
        let lead = self
            .leads
            .get_mut(&id)
            .ok_or(BoardError::NotFound { id })?;
        let before = lead.stage;
        lead.apply_patch(patch);
        self.version += 1;
        let after = lead.stage;
        Ok((before != after).then_some((before, after)))
    }

    /// Stage-move primitive used by optimistic moves and their rollbacks.
    ///
    /// Setting the stage a lead is already in is an idempotent no-op: the
    /// version is untouched and `None` comes back. Otherwise the stage and
    /// last-updated timestamp change and the previous stage is returned.
    pub fn set_stage(
        &mut self,
        id: LeadId,
        stage: Stage,
        now: DateTime<Utc>,
    ) -> Result<Option<Stage>, BoardError> {
        let lead = self
            .leads
            .get_mut(&id)
            .ok_or(BoardError::NotFound { id })?;
        if lead.stage == stage {
            return Ok(None);
        }
        let previous = lead.stage;
        lead.stage = stage;
        lead.updated_at = Some(now);
        self.version += 1;
        Ok(Some(previous))
    }

    pub fn get(&self, id: LeadId) -> Option<&Lead> {
        self.leads.get(&id)
    }

    pub fn contains(&self, id: LeadId) -> bool {
        self.leads.contains_key(&id)
    }

    pub fn stage_of(&self, id: LeadId) -> Option<Stage> {
        self.leads.get(&id).map(|l| l.stage)
    }

    pub fn len(&self) -> usize {
        self.leads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leads.is_empty()
    }

    pub fn leads(&self) -> impl Iterator<Item = &Lead> {
        self.leads.values()
    }

    pub fn by_stage(&self, stage: Stage) -> Vec<&Lead> {
        self.leads.values().filter(|l| l.stage == stage).collect()
    }

    /// Case-insensitive substring search over name, phone, and email.
    pub fn search(&self, term: &str) -> Vec<&Lead> {
        let needle = term.to_lowercase();
        let mut hits: Vec<&Lead> = self
            .leads
            .values()
            .filter(|l| {
                l.name.to_lowercase().contains(&needle)
                    || l.phone.to_lowercase().contains(&needle)
                    || l.email
                        .as_deref()
                        .is_some_and(|e| e.to_lowercase().contains(&needle))
            })
            .collect();
        hits.sort_by_key(|l| l.id);
        hits
    }

    /// Leads in funnel-stage order, newest created first within a stage.
    /// Leads with no creation timestamp sort last within their stage.
    pub fn sorted(&self) -> Vec<&Lead> {
        let mut all: Vec<&Lead> = self.leads.values().collect();
        all.sort_by(|a, b| {
            a.stage
                .cmp(&b.stage)
                .then_with(|| b.created_at.cmp(&a.created_at))
                .then_with(|| a.id.cmp(&b.id))
        });
        all
    }

    /// Cloned leads in id order. Stable enough to serialize and compare
    /// across refreshes regardless of arrival order.
    pub fn snapshot(&self) -> Vec<Lead> {
        let mut all: Vec<Lead> = self.leads.values().cloned().collect();
        all.sort_by_key(|l| l.id);
        all
    }

    pub fn stats(&self) -> PipelineStats {
        PipelineStats::from_leads(self.leads.values())
    }

    pub fn stage_health(&self, stage: Stage, today: NaiveDate) -> StageHealth {
        stats::stage_health(stage, self.by_stage(stage), today)
    }
}
