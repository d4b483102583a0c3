//! Playlist resolution errors.

/// Why a playlist could not be resolved. Fatal to the download that asked for it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlaylistError {
    /// URL did not parse or is not http/https.
    #[error("invalid playlist URL: {0}")]
    InvalidUrl(String),
    /// Transport-level failure (DNS, connect, timeout, reset).
    #[error("playlist unreachable: {0}")]
    Unreachable(String),
    /// Server answered with a non-2xx status.
    #[error("playlist request returned HTTP {0}")]
    Http(u32),
    /// Body does not start with the `#EXTM3U` marker.
    #[error("invalid M3U8 file format (missing #EXTM3U header)")]
    NotAPlaylist,
    /// Playlist parsed but listed no media segments.
    #[error("no video segments found in M3U8 playlist")]
    Empty,
}
