//! Background refresh scheduler.
//!
//! Spawns a tokio task that calls [`BoardManager::refresh`] on a fixed
//! interval. The handle can poke an immediate refresh (which resets the
//! interval so the next timed pass is a full period away) and shut the task
//! down cleanly. Dropping the handle also stops the task.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, warn};

use crate::board::BoardManager;

pub struct RefreshHandle {
    poke: mpsc::Sender<()>,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl RefreshHandle {
    /// Start the refresh loop. The first pass runs one full `interval` after
    /// spawn; callers wanting data immediately should bootstrap first.
    pub fn spawn(manager: Arc<BoardManager>, interval: Duration) -> Self {
        let (poke_tx, mut poke_rx) = mpsc::channel::<()>(1);
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            let mut ticker = time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick of a fresh interval fires immediately; swallow
            // it so the loop starts a full period out.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => {
                        debug!("refresh loop stopping");
                        break;
                    }
                    _ = ticker.tick() => {
                        run_refresh(&manager).await;
                    }
                    poked = poke_rx.recv() => {
                        if poked.is_none() {
                            break;
                        }
                        run_refresh(&manager).await;
                        ticker.reset();
                    }
                }
            }
        });

        Self {
            poke: poke_tx,
            shutdown: Some(shutdown_tx),
            task,
        }
    }

    /// Request an immediate refresh pass. A poke while one is already queued
    /// is coalesced into it.
    pub fn refresh_now(&self) {
        let _ = self.poke.try_send(());
    }

    /// Stop the loop and wait for the task to exit.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Err(e) = (&mut self.task).await {
            warn!(error = %e, "refresh task did not exit cleanly");
        }
    }
}

async fn run_refresh(manager: &Arc<BoardManager>) {
    match manager.refresh().await {
        Ok(outcome) => debug!(?outcome, "refresh pass finished"),
        Err(e) => warn!(error = %e, "refresh failed; retrying next interval"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::models::{Lead, LeadId, Stage};
    use crate::cache::MemoryCache;
    use crate::errors::SourceError;
    use crate::source::{LeadSource, PipelineSnapshot};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSource {
        fetches: AtomicUsize,
        leads: Mutex<Vec<Lead>>,
    }

    impl CountingSource {
        fn new(leads: Vec<Lead>) -> Self {
            Self {
                fetches: AtomicUsize::new(0),
                leads: Mutex::new(leads),
            }
        }

        fn fetches(&self) -> usize {
            self.fetches.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl LeadSource for CountingSource {
        async fn fetch_pipeline(&self) -> Result<PipelineSnapshot, SourceError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            Ok(PipelineSnapshot {
                leads: Some(self.leads.lock().unwrap().clone()),
                stage_summary: None,
            })
        }

        async fn submit_stage_change(
            &self,
            _id: LeadId,
            _stage: Stage,
        ) -> Result<(), SourceError> {
            Ok(())
        }
    }

    fn manager_over(source: Arc<CountingSource>) -> Arc<BoardManager> {
        Arc::new(BoardManager::new(source, Arc::new(MemoryCache::new())))
    }

    /// Let the spawned loop observe the paused clock. Needed once after
    /// spawn (to register the interval) and after every `advance`.
    async fn settle() {
        tokio::task::yield_now().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_fires_once_per_interval() {
        let source = Arc::new(CountingSource::new(vec![Lead::new(
            LeadId(1),
            "Asha",
            "555-0100",
            Stage::New,
        )]));
        let handle = RefreshHandle::spawn(manager_over(source.clone()), Duration::from_secs(30));
        settle().await;

        time::advance(Duration::from_secs(29)).await;
        settle().await;
        assert_eq!(source.fetches(), 0, "nothing before the first interval");

        time::advance(Duration::from_secs(2)).await;
        settle().await;
        assert_eq!(source.fetches(), 1);

        // Delay behavior schedules each next tick a full period out, so the
        // clock has to advance one interval at a time.
        time::advance(Duration::from_secs(30)).await;
        settle().await;
        assert_eq!(source.fetches(), 2);

        time::advance(Duration::from_secs(30)).await;
        settle().await;
        assert_eq!(source.fetches(), 3);

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_poke_refreshes_immediately_and_resets_interval() {
        let source = Arc::new(CountingSource::new(vec![]));
        let handle = RefreshHandle::spawn(manager_over(source.clone()), Duration::from_secs(30));
        settle().await;

        time::advance(Duration::from_secs(10)).await;
        settle().await;
        handle.refresh_now();
        // Let the loop service the poke.
        settle().await;
        assert_eq!(source.fetches(), 1);

        // The poke reset the timer, so the old 30s mark passes quietly.
        time::advance(Duration::from_secs(25)).await;
        settle().await;
        assert_eq!(source.fetches(), 1);

        time::advance(Duration::from_secs(6)).await;
        settle().await;
        assert_eq!(source.fetches(), 2);

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_the_loop() {
        let source = Arc::new(CountingSource::new(vec![]));
        let handle = RefreshHandle::spawn(manager_over(source.clone()), Duration::from_secs(5));
        settle().await;

        time::advance(Duration::from_secs(6)).await;
        settle().await;
        assert_eq!(source.fetches(), 1);

        handle.shutdown().await;
        time::advance(Duration::from_secs(60)).await;
        settle().await;
        assert_eq!(source.fetches(), 1, "no passes after shutdown");
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_keeps_going_after_a_failed_pass() {
        struct FlakySource {
            fetches: AtomicUsize,
        }

        #[async_trait]
        impl LeadSource for FlakySource {
            async fn fetch_pipeline(&self) -> Result<PipelineSnapshot, SourceError> {
                let n = self.fetches.fetch_add(1, Ordering::SeqCst);
                if n == 0 {
                    Err(SourceError::Rejected("connection refused".to_string()))
                } else {
                    Ok(PipelineSnapshot::default())
                }
            }

            async fn submit_stage_change(
                &self,
                _id: LeadId,
                _stage: Stage,
            ) -> Result<(), SourceError> {
                Ok(())
            }
        }

        let source = Arc::new(FlakySource {
            fetches: AtomicUsize::new(0),
        });
        let manager = Arc::new(BoardManager::new(
            source.clone(),
            Arc::new(MemoryCache::new()),
        ));
        let handle = RefreshHandle::spawn(manager, Duration::from_secs(10));
        settle().await;

        time::advance(Duration::from_secs(11)).await;
        settle().await;
        assert_eq!(source.fetches.load(Ordering::SeqCst), 1);

        // The failure did not kill the loop.
        time::advance(Duration::from_secs(10)).await;
        settle().await;
        assert_eq!(source.fetches.load(Ordering::SeqCst), 2);

        handle.shutdown().await;
    }
}
