//! M3U8 text parsing into a `Playlist`.

use url::Url;

use super::{Playlist, PlaylistError};

const HEADER: &str = "#EXTM3U";
const EXTINF: &str = "#EXTINF:";
const ENDLIST: &str = "#EXT-X-ENDLIST";

/// Parse playlist text fetched from `base_url`.
///
/// Lines are trimmed and blank lines skipped. The first line must be the
/// `#EXTM3U` marker. Every non-tag line is a segment URI, resolved against
/// `base_url` (host-relative for `/path`, directory-relative otherwise).
/// Parsing stops at `#EXT-X-ENDLIST`.
pub fn parse_playlist(content: &str, base_url: &str) -> Result<Playlist, PlaylistError> {
    let base = Url::parse(base_url).map_err(|_| PlaylistError::InvalidUrl(base_url.to_string()))?;
    let mut lines = content.lines().map(str::trim).filter(|l| !l.is_empty());

    match lines.next() {
        Some(first) if first.starts_with(HEADER) => {}
        _ => return Err(PlaylistError::NotAPlaylist),
    }

    let mut segments = Vec::new();
    let mut total_duration = 0.0f64;
    let mut saw_duration = false;

    for line in lines {
        if let Some(rest) = line.strip_prefix(EXTINF) {
            if let Some(d) = parse_extinf_duration(rest) {
                total_duration += d;
                saw_duration = true;
            }
        } else if line.starts_with(ENDLIST) {
            break;
        } else if !line.starts_with('#') {
            let resolved = base
                .join(line)
                .map_err(|_| PlaylistError::InvalidUrl(line.to_string()))?;
            segments.push(resolved.to_string());
        }
    }

    if segments.is_empty() {
        return Err(PlaylistError::Empty);
    }

    Ok(Playlist {
        url: base_url.to_string(),
        segments,
        title: Some(title_from_url(base_url)),
        duration_secs: saw_duration.then_some(total_duration),
    })
}

/// `#EXTINF:<duration>,<title>` → duration; accepts the leading numeric part only.
fn parse_extinf_duration(rest: &str) -> Option<f64> {
    let end = rest
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(rest.len());
    rest[..end].parse::<f64>().ok()
}

/// Last path segment of `url` without its extension; `"video"` when there is none.
pub fn title_from_url(url: &str) -> String {
    let Ok(parsed) = Url::parse(url) else {
        return "video".to_string();
    };
    let Some(name) = parsed.path().split('/').filter(|s| !s.is_empty()).last() else {
        return "video".to_string();
    };
    let stem = match name.rfind('.') {
        Some(0) | None => name,
        Some(i) => &name[..i],
    };
    if stem.is_empty() {
        "video".to_string()
    } else {
        stem.to_string()
    }
}
