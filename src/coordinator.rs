use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::Result;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, TryRecvError};
use log::{debug, info, warn};

use crate::error::FetchError;
use crate::gateway::PostFetchGateway;
use crate::post::Post;
use crate::store::{FeedStore, MergeOutcome};

/// Where pages come from and how the next one is addressed.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FeedSource {
    /// Random selection; the next page excludes every id seen so far.
    #[default]
    Random,
    /// A user's posts; the next page is the number of pages merged so far.
    User {
        user_id: String,
        private_only: Option<bool>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Exhausted,
    InFlight,
    /// A zero page size can never exhaust the feed, so it never fetches.
    EmptyPage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    Started { request_id: u64 },
    Skipped(SkipReason),
}

#[derive(Debug)]
pub enum FetchEvent {
    Merged {
        request_id: u64,
        outcome: MergeOutcome,
    },
    Failed {
        request_id: u64,
        error: FetchError,
    },
}

struct PendingFetch {
    request_id: u64,
    requested: usize,
    cancel_flag: Arc<AtomicBool>,
    response_rx: Receiver<Result<Vec<Post>>>,
}

/// Runs at most one page load at a time against a [`FeedStore`].
///
/// Requests arriving while a page is outstanding are dropped rather than
/// queued. Gateway calls run on a worker thread; their results are applied
/// only when the owner polls.
pub struct FetchCoordinator {
    gateway: Arc<dyn PostFetchGateway>,
    source: FeedSource,
    next_request_id: u64,
    pending: Option<PendingFetch>,
}

impl FetchCoordinator {
    pub fn new(gateway: Arc<dyn PostFetchGateway>, source: FeedSource) -> Self {
        Self {
            gateway,
            source,
            next_request_id: 1,
            pending: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn request_more(&mut self, store: &mut FeedStore, page_size: usize) -> RequestOutcome {
        if page_size == 0 {
            warn!("page size is zero, skipping page request");
            return RequestOutcome::Skipped(SkipReason::EmptyPage);
        }
        if store.is_exhausted() {
            debug!("feed exhausted, skipping page request");
            return RequestOutcome::Skipped(SkipReason::Exhausted);
        }
        if !store.begin_fetch() {
            debug!("page request already in flight, dropping trigger");
            return RequestOutcome::Skipped(SkipReason::InFlight);
        }

        let request_id = self.next_request_id;
        self.next_request_id = self.next_request_id.wrapping_add(1);
        let cancel_flag = Arc::new(AtomicBool::new(false));
        let (response_tx, response_rx) = bounded(1);
        self.pending = Some(PendingFetch {
            request_id,
            requested: page_size,
            cancel_flag: cancel_flag.clone(),
            response_rx,
        });

        let gateway = self.gateway.clone();
        let source = self.source.clone();
        let exclude_ids = match source {
            FeedSource::Random => store.exclusion_list(),
            FeedSource::User { .. } => Vec::new(),
        };
        let page = store.pages_loaded();
        debug!(
            "requesting page {request_id} ({page_size} posts, {} excluded)",
            exclude_ids.len()
        );

        thread::spawn(move || {
            if cancel_flag.load(Ordering::SeqCst) {
                return;
            }
            let result = match &source {
                FeedSource::Random => gateway.random_posts(page_size, &exclude_ids),
                FeedSource::User {
                    user_id,
                    private_only,
                } => gateway.posts_by_user(page, page_size, user_id, *private_only),
            };
            if cancel_flag.load(Ordering::SeqCst) {
                return;
            }
            let _ = response_tx.send(result);
        });

        RequestOutcome::Started { request_id }
    }

    /// Applies a finished page if one is ready. Never blocks.
    pub fn poll(&mut self, store: &mut FeedStore) -> Option<FetchEvent> {
        let pending = self.pending.as_ref()?;
        let result = match pending.response_rx.try_recv() {
            Ok(result) => result.map_err(FetchError::Gateway),
            Err(TryRecvError::Empty) => return None,
            Err(TryRecvError::Disconnected) => Err(FetchError::Disconnected),
        };
        self.finish(store, result)
    }

    /// Blocks up to `timeout` for the outstanding page and applies it.
    pub fn wait(&mut self, store: &mut FeedStore, timeout: Duration) -> Option<FetchEvent> {
        let pending = self.pending.as_ref()?;
        let result = match pending.response_rx.recv_timeout(timeout) {
            Ok(result) => result.map_err(FetchError::Gateway),
            Err(RecvTimeoutError::Timeout) => return None,
            Err(RecvTimeoutError::Disconnected) => Err(FetchError::Disconnected),
        };
        self.finish(store, result)
    }

    /// Abandons the outstanding page. The worker finishes its call but the
    /// result is never applied.
    pub fn cancel(&mut self, store: &mut FeedStore) {
        if let Some(pending) = self.pending.take() {
            pending.cancel_flag.store(true, Ordering::SeqCst);
            debug!("cancelled page request {}", pending.request_id);
        }
        store.end_fetch();
    }

    fn finish(
        &mut self,
        store: &mut FeedStore,
        result: std::result::Result<Vec<Post>, FetchError>,
    ) -> Option<FetchEvent> {
        let pending = self.pending.take()?;
        store.end_fetch();
        let request_id = pending.request_id;
        match result {
            Ok(posts) => {
                let outcome = store.merge_append(posts, pending.requested);
                info!(
                    "page {request_id}: {} new posts, {} loaded",
                    outcome.added,
                    store.len()
                );
                if outcome.exhausted {
                    info!("feed exhausted after {} posts", store.len());
                }
                Some(FetchEvent::Merged {
                    request_id,
                    outcome,
                })
            }
            Err(error) => {
                warn!("page {request_id} failed: {error}");
                Some(FetchEvent::Failed { request_id, error })
            }
        }
    }
}

impl Drop for FetchCoordinator {
    fn drop(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.cancel_flag.store(true, Ordering::SeqCst);
        }
    }
}
