//! Full-ingestion runs over the paginated feed.
//!
//! Each run owns a generation number. Starting a run bumps the generation, so
//! a previous run that is still awaiting a page finds itself stale when the
//! response arrives and drops it instead of appending. The generation check is
//! done while holding the snapshot write lock, which makes "check then append"
//! atomic with respect to `start_full` (lock order: store, then run tracker).

use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::feed::PageFetcher;
use super::filter::FilterModel;
use super::projector::ViewProjector;
use super::snapshot::SnapshotStore;
use super::status::StatusBoard;
use crate::error::FetchError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncState {
    Idle,
    Running,
    Completed,
    Cancelled,
    Failed,
}

/// The run currently allowed to touch the snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncRun {
    pub generation: u64,
    /// URL of the next page to fetch; `None` once the feed is exhausted.
    pub cursor: Option<String>,
    pub cancelled: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SyncOutcome {
    Completed { pages: usize, records: usize },
    Failed(FetchError),
    Cancelled,
    /// A newer run took over; nothing from this run's last page was applied.
    Superseded,
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncStatus {
    pub state: SyncState,
    pub generation: u64,
    pub last_error: Option<String>,
}

#[derive(Debug)]
struct RunTracker {
    generation: u64,
    current: Option<SyncRun>,
    state: SyncState,
    last_error: Option<FetchError>,
}

enum RunCheck {
    Current,
    Cancelled,
    Superseded,
}

pub struct SyncController {
    fetcher: Arc<dyn PageFetcher>,
    initial_url: String,
    store: Arc<RwLock<SnapshotStore>>,
    filter: Arc<RwLock<FilterModel>>,
    projector: Arc<ViewProjector>,
    status: Arc<StatusBoard>,
    run: Mutex<RunTracker>,
}

impl SyncController {
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        initial_url: impl Into<String>,
        store: Arc<RwLock<SnapshotStore>>,
        filter: Arc<RwLock<FilterModel>>,
        projector: Arc<ViewProjector>,
        status: Arc<StatusBoard>,
    ) -> Self {
        Self {
            fetcher,
            initial_url: initial_url.into(),
            store,
            filter,
            projector,
            status,
            run: Mutex::new(RunTracker {
                generation: 0,
                current: None,
                state: SyncState::Idle,
                last_error: None,
            }),
        }
    }

    pub fn state(&self) -> SyncState {
        self.run.lock().state
    }

    pub fn generation(&self) -> u64 {
        self.run.lock().generation
    }

    pub fn current_run(&self) -> Option<SyncRun> {
        self.run.lock().current.clone()
    }

    pub fn status(&self) -> SyncStatus {
        let run = self.run.lock();
        SyncStatus {
            state: run.state,
            generation: run.generation,
            last_error: run.last_error.as_ref().map(|e| e.to_string()),
        }
    }

    /// Clear the snapshot and ingest every page from the initial query.
    ///
    /// A run already in progress is marked cancelled and becomes stale.
    /// Fetch failures end the run in `Failed` and keep the pages already
    /// ingested; they are reported on the status board, not returned as `Err`.
    pub async fn start_full(&self, fly_to_on_complete: bool) -> SyncOutcome {
        let generation = {
            let mut store = self.store.write().await;
            let generation = {
                let mut run = self.run.lock();
                if let Some(previous) = run.current.as_mut() {
                    previous.cancelled = true;
                    info!("Superseding sync run {}", previous.generation);
                }
                run.generation += 1;
                run.current = Some(SyncRun {
                    generation: run.generation,
                    cursor: Some(self.initial_url.clone()),
                    cancelled: false,
                });
                run.state = SyncState::Running;
                run.last_error = None;
                run.generation
            };
            store.clear();
            self.render(&store, false).await;
            generation
        };

        info!("Sync run {} started", generation);
        self.status.info("sync started");

        let mut pages = 0usize;
        loop {
            let url = {
                let run = self.run.lock();
                match run.current.as_ref() {
                    Some(current) if current.generation == generation => current.cursor.clone(),
                    _ => None,
                }
            };
            match self.check(generation) {
                RunCheck::Current => {}
                RunCheck::Cancelled => return self.finish_cancelled(generation),
                RunCheck::Superseded => return self.superseded(generation),
            }
            let Some(url) = url else {
                break;
            };

            debug!("Run {} fetching {}", generation, url);
            let result = self.fetcher.fetch_page(&url).await;

            let page = match result {
                Ok(page) => page,
                Err(err) => {
                    return match self.check(generation) {
                        RunCheck::Current => self.finish_failed(generation, err),
                        RunCheck::Cancelled => self.finish_cancelled(generation),
                        RunCheck::Superseded => self.superseded(generation),
                    };
                }
            };

            let mut store = self.store.write().await;
            match self.check(generation) {
                RunCheck::Current => {}
                RunCheck::Cancelled => return self.finish_cancelled(generation),
                RunCheck::Superseded => return self.superseded(generation),
            }

            store.append(page.records);
            {
                let mut run = self.run.lock();
                if let Some(current) = run.current.as_mut() {
                    current.cursor = page.next;
                }
            }
            pages += 1;
            self.status
                .info(format!("page {} synced ({} stations so far)", pages, store.len()));
            self.render(&store, false).await;
        }

        let store = self.store.write().await;
        match self.check(generation) {
            RunCheck::Current => {}
            RunCheck::Cancelled => return self.finish_cancelled(generation),
            RunCheck::Superseded => return self.superseded(generation),
        }
        let records = store.len();
        if !self.release(generation, SyncState::Completed, None) {
            return self.superseded(generation);
        }
        self.status
            .info(format!("sync complete: {} stations in {} pages", records, pages));
        self.render(&store, fly_to_on_complete).await;

        SyncOutcome::Completed { pages, records }
    }

    /// Request cancellation of the running sync. The in-flight fetch still
    /// completes but its page is dropped. Returns whether a run was active.
    pub fn cancel(&self) -> bool {
        let mut run = self.run.lock();
        match run.current.as_mut() {
            Some(current) if !current.cancelled => {
                current.cancelled = true;
                info!("Cancellation requested for sync run {}", current.generation);
                true
            }
            _ => false,
        }
    }

    fn check(&self, generation: u64) -> RunCheck {
        let run = self.run.lock();
        match run.current.as_ref() {
            Some(current) if current.generation == generation => {
                if current.cancelled {
                    RunCheck::Cancelled
                } else {
                    RunCheck::Current
                }
            }
            _ => RunCheck::Superseded,
        }
    }

    /// Retire `generation` with a terminal state. Returns `false` without
    /// touching the tracker when a newer run already owns it.
    fn release(&self, generation: u64, state: SyncState, error: Option<FetchError>) -> bool {
        let mut run = self.run.lock();
        if run.current.as_ref().is_none_or(|current| current.generation != generation) {
            return false;
        }
        run.current = None;
        run.state = state;
        if error.is_some() {
            run.last_error = error;
        }
        true
    }

    fn finish_cancelled(&self, generation: u64) -> SyncOutcome {
        if !self.release(generation, SyncState::Cancelled, None) {
            return self.superseded(generation);
        }
        info!("Sync run {} cancelled", generation);
        self.status.warn("sync cancelled");
        SyncOutcome::Cancelled
    }

    fn finish_failed(&self, generation: u64, err: FetchError) -> SyncOutcome {
        if !self.release(generation, SyncState::Failed, Some(err.clone())) {
            return self.superseded(generation);
        }
        debug!("Sync run {} failed", generation);
        self.status.error(format!("sync interrupted: {}", err));
        SyncOutcome::Failed(err)
    }

    fn superseded(&self, generation: u64) -> SyncOutcome {
        debug!("Sync run {} is stale, dropping its result", generation);
        SyncOutcome::Superseded
    }

    async fn render(&self, store: &SnapshotStore, fly_to: bool) {
        let filter = self.filter.read().await;
        self.projector.render(store.all(), &filter, fly_to);
    }
}
