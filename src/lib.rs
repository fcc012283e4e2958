#![allow(clippy::uninlined_format_args)]

pub mod app;
pub mod config;
pub mod controller;
pub mod coordinator;
pub mod error;
pub mod gateway;
pub mod playback;
pub mod post;
pub mod remote;
pub mod store;
pub mod timer;
pub mod viewport;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use app::run;
pub use controller::{FeedController, FeedEvent, FeedFooter, ItemView};
pub use coordinator::FeedSource;
pub use gateway::{MockGateway, PostFetchGateway, RemoteGateway};
pub use playback::{MediaPlayer, PlaybackController, PlayerPhase};
pub use post::Post;
pub use viewport::{ViewportTracker, VisibilityReport};
