/// Failure while loading a page of posts. Always recovered by the coordinator:
/// the in-flight guard is released and the feed is not marked exhausted.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("fetch page: {0:#}")]
    Gateway(anyhow::Error),
    #[error("fetch worker exited without a response")]
    Disconnected,
}

/// Failure of a single item's media player. Isolated to that item.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlaybackError {
    #[error("media failed to load: {0}")]
    Load(String),
    #[error("media failed to play: {0}")]
    Play(String),
}
