//! Curl-backed playlist fetch.

use std::time::Duration;

use crate::config::HttpConfig;

use super::{is_supported_url, parse_playlist, Playlist, PlaylistError, PlaylistSource};

/// Fetches playlist text over HTTP(S) and parses it.
#[derive(Debug, Clone, Default)]
pub struct HttpPlaylistSource {
    http: HttpConfig,
}

impl HttpPlaylistSource {
    pub fn new(http: HttpConfig) -> Self {
        Self { http }
    }

    fn fetch_text(&self, url: &str) -> Result<String, PlaylistError> {
        let unreachable = |e: curl::Error| PlaylistError::Unreachable(e.to_string());
        let mut body: Vec<u8> = Vec::new();

        let mut easy = curl::easy::Easy::new();
        easy.url(url)
            .map_err(|_| PlaylistError::InvalidUrl(url.to_string()))?;
        easy.follow_location(true).map_err(unreachable)?;
        easy.max_redirections(10).map_err(unreachable)?;
        easy.connect_timeout(self.http.connect_timeout())
            .map_err(unreachable)?;
        easy.timeout(Duration::from_secs(60)).map_err(unreachable)?;
        easy.accept_encoding("").map_err(unreachable)?;

        let mut list = curl::easy::List::new();
        for header in [
            format!("User-Agent: {}", self.http.user_agent),
            "Accept: */*".to_string(),
            "Accept-Language: en-US,en;q=0.9".to_string(),
            "Cache-Control: no-cache".to_string(),
            "Pragma: no-cache".to_string(),
        ] {
            list.append(&header).map_err(unreachable)?;
        }
        easy.http_headers(list).map_err(unreachable)?;

        {
            let mut transfer = easy.transfer();
            transfer
                .write_function(|data| {
                    body.extend_from_slice(data);
                    Ok(data.len())
                })
                .map_err(unreachable)?;
            transfer.perform().map_err(unreachable)?;
        }

        let code = easy.response_code().map_err(unreachable)?;
        if !(200..300).contains(&code) {
            return Err(PlaylistError::Http(code));
        }
        Ok(String::from_utf8_lossy(&body).into_owned())
    }
}

impl PlaylistSource for HttpPlaylistSource {
    fn resolve(&self, url: &str) -> Result<Playlist, PlaylistError> {
        if !is_supported_url(url) {
            return Err(PlaylistError::InvalidUrl(url.to_string()));
        }
        let text = self.fetch_text(url)?;
        let playlist = parse_playlist(&text, url)?;
        tracing::debug!(url, segments = playlist.segments.len(), "playlist resolved");
        Ok(playlist)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unsupported_scheme_before_network() {
        let source = HttpPlaylistSource::default();
        let err = source.resolve("file:///etc/passwd").unwrap_err();
        assert!(matches!(err, PlaylistError::InvalidUrl(_)));
    }
}
