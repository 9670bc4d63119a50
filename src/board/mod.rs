//! Pipeline board — in-memory lead state with optimistic stage moves.
//!
//! ## Overview
//!
//! The board subsystem keeps the whole sales funnel in memory: a collection
//! of leads, each in one of six fixed stages, plus the statistics derived
//! from them. Stage moves are applied optimistically — the board changes
//! first, the server confirms in the background, and a rejection rolls the
//! lead back to where it was.
//!
//! ## Module Map
//!
//! ```text
//! ┌────────────┐  move_lead()  ┌──────────────────────────────────────────┐
//! │   Caller   │ ────────────> │  manager.rs  (BoardManager, MoveTicket)  │
//! │ (CLI/view) │ <──────────── │     │ optimistic set_stage()             │
//! └────────────┘  BoardEvent   │     v                                    │
//!        ^        broadcast    │  state.rs  (PipelineBoard)               │
//!        │                     │     │                                    │
//!        │                     │     │ submit_stage_change()  (spawned)   │
//!        │                     │     v                                    │
//!        └──────────────────── │  LeadSource  ──> commit or roll back     │
//!                              └──────────────────────────────────────────┘
//! ```
//!
//! ## Supporting Modules
//!
//! | Module    | Responsibility                                          |
//! |-----------|---------------------------------------------------------|
//! | `models`  | Shared types: `Lead`, `Stage`, `Priority`, `LeadPatch`  |
//! | `state`   | `PipelineBoard` — pure, versioned lead collection       |
//! | `stats`   | Derived numbers: totals, conversion rate, stage health  |
//! | `events`  | `BoardEvent` enum + broadcast helper                    |
//! | `manager` | Async orchestration: moves, confirmation, refresh       |
//!
//! ## Typical Move Flow (lead → "Contacted")
//!
//! 1. `BoardManager::move_lead()` applies the stage optimistically and
//!    emits `StageChanged` so views repaint immediately.
//! 2. A confirmation task POSTs the change to the server. Each move holds a
//!    token; only the lead's latest in-flight token may apply its outcome,
//!    so a slow response from an older move can never clobber a newer one.
//! 3. Acceptance commits the move (`MoveConfirmed`); rejection rolls the
//!    stage back and emits `MoveFailed` with the server's reason.

pub mod events;
pub mod manager;
pub mod models;
pub mod state;
pub mod stats;

pub use events::BoardEvent;
pub use manager::{BoardManager, MoveResolution, MoveTicket, RefreshOutcome};
pub use models::{Lead, LeadId, LeadPatch, Priority, Stage, Urgency};
pub use state::PipelineBoard;
pub use stats::{PipelineStats, StageHealth, StageSummary};
