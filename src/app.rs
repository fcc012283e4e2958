use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use log::info;

use crate::config::{self, Config};
use crate::controller::{FeedController, FeedEvent, FeedFooter};
use crate::coordinator::FeedSource;
use crate::error::PlaybackError;
use crate::gateway::{self, MockGateway, PostFetchGateway, RemoteGateway};
use crate::playback::MediaPlayer;
use crate::remote;
use crate::viewport::VisibilityReport;

const OFFLINE_CORPUS: usize = 40;
const PAGE_WAIT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct Options {
    pub offline: bool,
    pub steps: usize,
    pub user_id: Option<String>,
    pub config_file: Option<PathBuf>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            offline: false,
            steps: 10,
            user_id: None,
            config_file: None,
        }
    }
}

/// Walks the feed without a screen: each step scrolls one item into view,
/// lets it settle and prints what would be playing.
pub fn run(options: Options) -> Result<()> {
    let cfg = config::load(config::LoadOptions {
        config_file: options.config_file.clone(),
        env_prefix: None,
    })
    .context("load config")?;
    let gateway = build_gateway(&cfg, options.offline)?;
    let source = match options.user_id.clone() {
        Some(user_id) => FeedSource::User {
            user_id,
            private_only: None,
        },
        None => FeedSource::Random,
    };

    let mut feed = FeedController::with_source(gateway, source, cfg.feed.clone());
    let stdout = io::stdout();
    let mut out = stdout.lock();

    feed.mount();
    let events = feed.wait_for_page(PAGE_WAIT);
    report_events(&mut out, &events)?;

    let mut now = Instant::now();
    for step in 0..options.steps {
        if step >= feed.len() {
            let events = feed.wait_for_page(PAGE_WAIT);
            report_events(&mut out, &events)?;
            if step >= feed.len() {
                break;
            }
        }

        let token = feed.mount_item(step, Box::new(LoggingPlayer::new(step)));
        feed.on_ready(token);
        if step > 0 {
            feed.report_visibility(VisibilityReport::new(step - 1, 0.0), now);
        }
        feed.report_visibility(VisibilityReport::new(step, 1.0), now);
        now += feed.config().dwell_time;
        let events = feed.tick(now);
        report_events(&mut out, &events)?;
        if step > 0 {
            feed.unmount_item(step - 1, now);
        }

        if let Some(view) = feed.item(step) {
            writeln!(
                out,
                "[{:>3}] {}  {} likes  {} views  {}",
                step,
                view.post.title,
                view.post.likes_label(),
                view.post.views_label(),
                if view.is_playing { "playing" } else { "paused" }
            )?;
        }
    }

    let events = feed.tick(now);
    report_events(&mut out, &events)?;
    let footer = match feed.footer() {
        FeedFooter::Loading => "loading more",
        FeedFooter::EndOfFeed => "end of feed",
        FeedFooter::Idle => "idle",
    };
    writeln!(out, "{} posts loaded, {footer}", feed.len())?;
    feed.unmount();
    Ok(())
}

fn build_gateway(cfg: &Config, offline: bool) -> Result<Arc<dyn PostFetchGateway>> {
    if offline {
        info!("offline mode, serving {OFFLINE_CORPUS} sample posts");
        return Ok(Arc::new(
            MockGateway::new(gateway::sample_posts(OFFLINE_CORPUS)).shuffled(),
        ));
    }
    if !cfg.has_remote_credentials() {
        bail!(
            "no remote configured: set remote.base_url and remote.api_key in {} or pass --offline",
            display_config_path(config::default_path().as_ref())
        );
    }
    let client = remote::Client::new(remote::ClientConfig {
        base_url: cfg.remote.base_url.clone(),
        api_key: cfg.remote.api_key.clone(),
        user_agent: cfg.remote.user_agent.clone(),
        timeout: Some(cfg.remote.timeout),
        http_client: None,
    })
    .context("create remote client")?;
    Ok(Arc::new(RemoteGateway::new(Arc::new(client))))
}

fn report_events(out: &mut impl Write, events: &[FeedEvent]) -> Result<()> {
    for event in events {
        match event {
            FeedEvent::PageLoaded { added, total } => {
                writeln!(out, "-- loaded {added} posts ({total} total)")?;
            }
            FeedEvent::Exhausted => writeln!(out, "-- no more posts")?,
            FeedEvent::FetchFailed { message } => writeln!(out, "-- load failed: {message}")?,
            FeedEvent::ActiveChanged { .. } => {}
        }
    }
    Ok(())
}

/// Config location for messages, with the home directory shown as `~`.
fn display_config_path(path: Option<&PathBuf>) -> String {
    let Some(path) = path else {
        return "the reel-feed config file".to_string();
    };
    let relative = dirs::home_dir()
        .and_then(|home| path.strip_prefix(home).ok().map(PathBuf::from));
    match relative {
        Some(rest) => format!("~/{}", rest.display()),
        None => path.display().to_string(),
    }
}

/// Stands in for a video surface; every transport call is logged.
struct LoggingPlayer {
    index: usize,
}

impl LoggingPlayer {
    fn new(index: usize) -> Self {
        Self { index }
    }
}

impl MediaPlayer for LoggingPlayer {
    fn play(&mut self) -> Result<(), PlaybackError> {
        info!("player {}: play", self.index);
        Ok(())
    }

    fn pause(&mut self) -> Result<(), PlaybackError> {
        info!("player {}: pause", self.index);
        Ok(())
    }

    fn seek_to_start(&mut self) -> Result<(), PlaybackError> {
        info!("player {}: seek to start", self.index);
        Ok(())
    }

    fn reload(&mut self) -> Result<(), PlaybackError> {
        info!("player {}: reload", self.index);
        Ok(())
    }

    fn release(&mut self) {
        info!("player {}: release", self.index);
    }
}
