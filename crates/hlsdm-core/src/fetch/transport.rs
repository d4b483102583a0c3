//! Segment transport: one blocking GET of a segment body.

use crate::cancel::CancelToken;
use crate::config::HttpConfig;

use super::FetchError;

/// Retrieves raw segment bytes. Implementations must return
/// `FetchError::Cancelled` promptly once `cancel` is raised mid-transfer.
///
/// Blocking; the segment fetcher runs it inside `spawn_blocking`.
pub trait SegmentTransport: Send + Sync {
    fn fetch(&self, url: &str, cancel: &CancelToken) -> Result<Vec<u8>, FetchError>;
}

/// libcurl transport: one `Easy` handle per segment.
#[derive(Debug, Clone, Default)]
pub struct CurlTransport {
    http: HttpConfig,
}

impl CurlTransport {
    pub fn new(http: HttpConfig) -> Self {
        Self { http }
    }
}

impl SegmentTransport for CurlTransport {
    fn fetch(&self, url: &str, cancel: &CancelToken) -> Result<Vec<u8>, FetchError> {
        cancel.check().map_err(|_| FetchError::Cancelled)?;
        let mut body: Vec<u8> = Vec::new();

        let mut easy = curl::easy::Easy::new();
        easy.url(url)?;
        easy.follow_location(true)?;
        easy.connect_timeout(self.http.connect_timeout())?;
        // Abort if throughput stays below 1 KiB/s for 60s; hard cap per segment as a safety net.
        easy.low_speed_limit(1024)?;
        easy.low_speed_time(std::time::Duration::from_secs(60))?;
        easy.timeout(self.http.segment_timeout())?;
        easy.useragent(&self.http.user_agent)?;
        // Progress callbacks are how curl lets us abort mid-transfer.
        easy.progress(true)?;

        let perform_result = {
            let mut transfer = easy.transfer();
            transfer.write_function(|data| {
                body.extend_from_slice(data);
                Ok(data.len())
            })?;
            transfer.progress_function(|_, _, _, _| !cancel.is_cancelled())?;
            transfer.perform()
        };
        if let Err(e) = perform_result {
            if e.is_aborted_by_callback() || cancel.is_cancelled() {
                return Err(FetchError::Cancelled);
            }
            return Err(FetchError::Curl(e));
        }

        let code = easy.response_code()?;
        if !(200..300).contains(&code) {
            return Err(FetchError::Http(code));
        }
        Ok(body)
    }
}
