use std::sync::Arc;
use std::time::{Duration, Instant};

use log::debug;

use crate::config::FeedConfig;
use crate::coordinator::{FeedSource, FetchCoordinator, FetchEvent, RequestOutcome};
use crate::error::PlaybackError;
use crate::gateway::PostFetchGateway;
use crate::playback::{MediaPlayer, MountToken, PlaybackController, PlayerPhase};
use crate::post::Post;
use crate::store::FeedStore;
use crate::viewport::{ViewportTracker, VisibilityReport};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedEvent {
    ActiveChanged {
        previous: Option<usize>,
        current: usize,
    },
    PageLoaded {
        added: usize,
        total: usize,
    },
    FetchFailed {
        message: String,
    },
    Exhausted,
}

/// What the list shows below the last item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedFooter {
    Loading,
    EndOfFeed,
    Idle,
}

/// Everything the rendering layer needs for one position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemView<'a> {
    pub index: usize,
    pub post: &'a Post,
    pub is_active: bool,
    pub is_playing: bool,
    pub is_user_paused: bool,
    /// `None` while the position is not mounted.
    pub phase: Option<PlayerPhase>,
}

/// Wires viewport, playback and paging together for one feed screen.
///
/// All methods run on the owner's event loop. `tick` must be called
/// regularly: it applies finished page loads and fires the dwell timer.
pub struct FeedController {
    config: FeedConfig,
    store: FeedStore,
    fetcher: FetchCoordinator,
    viewport: ViewportTracker,
    playback: PlaybackController,
    mounted: bool,
}

impl FeedController {
    pub fn new(gateway: Arc<dyn PostFetchGateway>, config: FeedConfig) -> Self {
        Self::with_source(gateway, FeedSource::Random, config)
    }

    pub fn with_source(
        gateway: Arc<dyn PostFetchGateway>,
        source: FeedSource,
        config: FeedConfig,
    ) -> Self {
        let viewport = ViewportTracker::new(config.visibility_threshold, config.dwell_time);
        Self {
            fetcher: FetchCoordinator::new(gateway, source),
            store: FeedStore::new(),
            viewport,
            playback: PlaybackController::new(),
            mounted: false,
            config,
        }
    }

    pub fn config(&self) -> &FeedConfig {
        &self.config
    }

    /// Feed screen appeared: load the first page.
    pub fn mount(&mut self) -> RequestOutcome {
        self.mounted = true;
        self.fetcher
            .request_more(&mut self.store, self.config.page_size)
    }

    /// Feed screen went away. A page still loading is discarded on arrival.
    pub fn unmount(&mut self) {
        self.mounted = false;
        self.fetcher.cancel(&mut self.store);
        self.playback.clear();
        self.viewport.reset();
    }

    /// Pull-to-refresh: start over with an empty feed.
    pub fn refresh(&mut self) -> RequestOutcome {
        self.fetcher.cancel(&mut self.store);
        self.store.reset();
        self.playback.clear();
        self.viewport.reset();
        self.mount()
    }

    pub fn report_visibility(&mut self, report: VisibilityReport, now: Instant) {
        self.viewport.report(report, now);
    }

    /// Applies any finished page and fires a due dwell timer.
    pub fn tick(&mut self, now: Instant) -> Vec<FeedEvent> {
        let mut events = Vec::new();
        if let Some(event) = self.fetcher.poll(&mut self.store) {
            self.on_fetch_event(event, &mut events);
        }
        if let Some(index) = self.viewport.tick(now) {
            self.activate(index, &mut events);
        }
        events
    }

    /// Blocks up to `timeout` for the outstanding page.
    pub fn wait_for_page(&mut self, timeout: Duration) -> Vec<FeedEvent> {
        let mut events = Vec::new();
        if let Some(event) = self.fetcher.wait(&mut self.store, timeout) {
            self.on_fetch_event(event, &mut events);
        }
        events
    }

    /// When the dwell timer next needs a tick.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.viewport.next_deadline()
    }

    pub fn mount_item(&mut self, index: usize, player: Box<dyn MediaPlayer>) -> MountToken {
        self.playback.mount(index, player)
    }

    /// Must be called for every position leaving the virtualization window.
    /// Its player is released and it stops competing for the active slot.
    pub fn unmount_item(&mut self, index: usize, now: Instant) {
        self.playback.unmount(index);
        self.viewport.forget(index, now);
    }

    pub fn on_ready(&mut self, token: MountToken) -> bool {
        self.playback.on_ready(token)
    }

    pub fn on_error(&mut self, token: MountToken, message: impl Into<String>) -> bool {
        self.playback
            .on_error(token, PlaybackError::Load(message.into()))
    }

    pub fn retry(&mut self, index: usize) -> bool {
        self.playback.retry(index)
    }

    /// Tap on a position. Returns whether it plays afterwards, `None` if the
    /// tap had no effect.
    pub fn tap(&mut self, index: usize) -> Option<bool> {
        self.playback.toggle(index)
    }

    pub fn items(&self) -> &[Post] {
        self.store.items()
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn item(&self, index: usize) -> Option<ItemView<'_>> {
        let post = self.store.get(index)?;
        let state = self.playback.state(index);
        Some(ItemView {
            index,
            post,
            is_active: self.playback.active() == Some(index),
            is_playing: state.as_ref().is_some_and(|state| state.is_playing()),
            is_user_paused: state.as_ref().is_some_and(|state| state.is_user_paused),
            phase: state.map(|state| state.phase),
        })
    }

    pub fn active_index(&self) -> Option<usize> {
        self.playback.active()
    }

    pub fn playing_index(&self) -> Option<usize> {
        self.playback.playing()
    }

    pub fn footer(&self) -> FeedFooter {
        if self.store.is_fetch_in_flight() {
            FeedFooter::Loading
        } else if self.store.is_exhausted() {
            FeedFooter::EndOfFeed
        } else {
            FeedFooter::Idle
        }
    }

    pub fn store(&self) -> &FeedStore {
        &self.store
    }

    pub fn playback(&self) -> &PlaybackController {
        &self.playback
    }

    fn activate(&mut self, index: usize, events: &mut Vec<FeedEvent>) {
        let previous = self.playback.active();
        self.playback.set_active(index);
        events.push(FeedEvent::ActiveChanged {
            previous,
            current: index,
        });
        self.maybe_prefetch();
    }

    fn on_fetch_event(&mut self, event: FetchEvent, events: &mut Vec<FeedEvent>) {
        match event {
            FetchEvent::Merged { outcome, .. } => {
                events.push(FeedEvent::PageLoaded {
                    added: outcome.added,
                    total: self.store.len(),
                });
                if outcome.exhausted {
                    events.push(FeedEvent::Exhausted);
                }
                self.maybe_prefetch();
            }
            FetchEvent::Failed { error, .. } => {
                events.push(FeedEvent::FetchFailed {
                    message: error.to_string(),
                });
            }
        }
    }

    fn maybe_prefetch(&mut self) {
        if !self.mounted || self.store.is_empty() {
            return;
        }
        let Some(active) = self.playback.active() else {
            return;
        };
        let remaining = self
            .store
            .len()
            .saturating_sub(1)
            .saturating_sub(active);
        if remaining > self.config.prefetch_threshold {
            return;
        }
        debug!("{remaining} posts left after item {active}, prefetching");
        self.fetcher
            .request_more(&mut self.store, self.config.page_size);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::SkipReason;
    use crate::gateway::MockGateway;

    const WAIT: Duration = Duration::from_secs(5);

    struct SilentPlayer;

    impl MediaPlayer for SilentPlayer {
        fn play(&mut self) -> Result<(), PlaybackError> {
            Ok(())
        }
        fn pause(&mut self) -> Result<(), PlaybackError> {
            Ok(())
        }
        fn seek_to_start(&mut self) -> Result<(), PlaybackError> {
            Ok(())
        }
        fn reload(&mut self) -> Result<(), PlaybackError> {
            Ok(())
        }
        fn release(&mut self) {}
    }

    fn controller(corpus: usize) -> (FeedController, Arc<MockGateway>) {
        let gateway = Arc::new(MockGateway::with_posts(corpus));
        let controller = FeedController::new(gateway.clone(), FeedConfig::default());
        (controller, gateway)
    }

    #[test]
    fn footer_tracks_fetch_state() {
        let (mut feed, _) = controller(5);
        assert_eq!(feed.footer(), FeedFooter::Idle);
        feed.mount();
        assert_eq!(feed.footer(), FeedFooter::Loading);
        feed.wait_for_page(WAIT);
        assert_eq!(feed.footer(), FeedFooter::Idle);
    }

    #[test]
    fn item_view_reflects_playback() {
        let (mut feed, _) = controller(5);
        feed.mount();
        feed.wait_for_page(WAIT);
        let start = Instant::now();
        let token = feed.mount_item(0, Box::new(SilentPlayer));
        feed.on_ready(token);
        feed.report_visibility(VisibilityReport::new(0, 1.0), start);
        let events = feed.tick(start + feed.config().dwell_time);
        assert!(events.contains(&FeedEvent::ActiveChanged {
            previous: None,
            current: 0
        }));
        let view = feed.item(0).unwrap();
        assert!(view.is_active && view.is_playing);
        assert_eq!(view.post.id, "p1");
        let unmounted = feed.item(1).unwrap();
        assert_eq!(unmounted.phase, None);
        assert!(feed.item(5).is_none());
    }

    #[test]
    fn refresh_starts_over() {
        let (mut feed, gateway) = controller(20);
        feed.mount();
        feed.wait_for_page(WAIT);
        assert_eq!(feed.len(), 5);
        feed.refresh();
        assert!(feed.is_empty());
        feed.wait_for_page(WAIT);
        assert_eq!(feed.len(), 5);
        assert_eq!(gateway.call_count(), 2);
    }

    #[test]
    fn zero_page_size_does_not_spin() {
        let gateway = Arc::new(MockGateway::with_posts(20));
        let config = FeedConfig {
            page_size: 0,
            ..FeedConfig::default()
        };
        let mut feed = FeedController::new(gateway.clone(), config);
        assert_eq!(
            feed.mount(),
            RequestOutcome::Skipped(SkipReason::EmptyPage)
        );
        for _ in 0..5 {
            assert!(feed.wait_for_page(Duration::from_millis(10)).is_empty());
        }
        assert_eq!(gateway.call_count(), 0);
        assert_eq!(feed.footer(), FeedFooter::Idle);
    }

    #[test]
    fn unmounted_feed_discards_late_page() {
        let (mut feed, _) = controller(5);
        feed.mount();
        feed.unmount();
        assert!(feed.wait_for_page(Duration::from_millis(50)).is_empty());
        assert!(feed.is_empty());
        assert_eq!(feed.footer(), FeedFooter::Idle);
    }
}
