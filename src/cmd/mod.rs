//! CLI command implementations.
//!
//! Each submodule owns one or more related `Commands` variants:
//!
//! | Module      | Commands handled |
//! |-------------|------------------|
//! | `board`     | `Show`, `Stats`  |
//! | `move_lead` | `Move`           |
//! | `watch`     | `Watch`          |
//! | `config`    | `Config`         |

pub mod board;
pub mod config;
pub mod move_lead;
pub mod watch;

pub use board::{cmd_show, cmd_stats};
pub use config::cmd_config;
pub use move_lead::cmd_move;
pub use watch::cmd_watch;

use std::sync::Arc;

use leadflow::board::BoardManager;
use leadflow::cache::{BoardCache, FileCache, MemoryCache};
use leadflow::config::LeadflowConfig;
use leadflow::source::HttpLeadSource;

/// Wire a manager from the effective configuration. Cache-disabled runs get
/// an in-memory cache so nothing touches the disk.
pub(crate) fn build_manager(config: &LeadflowConfig) -> Arc<BoardManager> {
    let source = Arc::new(HttpLeadSource::new(
        config.base_url(),
        config.forgery_token(),
    ));
    let cache: Arc<dyn BoardCache> = if config.cache_enabled() {
        Arc::new(FileCache::new(config.cache_dir()))
    } else {
        Arc::new(MemoryCache::new())
    };
    Arc::new(BoardManager::new(source, cache))
}
