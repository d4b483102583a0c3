//! Playlist source: turn a stream URL into an ordered list of segment URLs.
//!
//! The download controller only depends on the `PlaylistSource` trait; the
//! curl-backed `HttpPlaylistSource` is the production implementation.

mod error;
mod http;
mod parse;

pub use error::PlaylistError;
pub use http::HttpPlaylistSource;
pub use parse::{parse_playlist, title_from_url};

use serde::Serialize;

/// A resolved media playlist.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Playlist {
    /// URL the playlist was fetched from.
    pub url: String,
    /// Absolute segment URLs in playback order.
    pub segments: Vec<String>,
    /// Title hint derived from the playlist URL.
    pub title: Option<String>,
    /// Sum of `#EXTINF` durations in seconds, if any were present.
    pub duration_secs: Option<f64>,
}

/// Resolves a stream URL into a playlist.
///
/// Blocking; async callers run it inside `spawn_blocking`.
pub trait PlaylistSource: Send + Sync {
    fn resolve(&self, url: &str) -> Result<Playlist, PlaylistError>;
}

/// True if `url` parses and uses http or https.
pub fn is_supported_url(url: &str) -> bool {
    match url::Url::parse(url) {
        Ok(u) => matches!(u.scheme(), "http" | "https"),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn supported_url_schemes() {
        assert!(is_supported_url("https://cdn.example.com/live/index.m3u8"));
        assert!(is_supported_url("http://127.0.0.1:8080/a.m3u8"));
        assert!(!is_supported_url("ftp://example.com/a.m3u8"));
        assert!(!is_supported_url("not a url"));
    }
}
