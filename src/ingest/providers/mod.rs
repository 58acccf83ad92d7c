pub mod http_media;
pub mod reddit_feed;

pub const USER_AGENT: &str = concat!("history-dosis/", env!("CARGO_PKG_VERSION"));
