//! One-line progress rendering for downloads and queues.

use hlsdm_core::download::DownloadProgress;
use hlsdm_core::queue::QueueProgress;

pub fn format_rate(bytes_per_sec: f64) -> String {
    const KIB: f64 = 1024.0;
    const MIB: f64 = 1024.0 * 1024.0;
    if bytes_per_sec >= MIB {
        format!("{:.2} MiB/s", bytes_per_sec / MIB)
    } else if bytes_per_sec >= KIB {
        format!("{:.1} KiB/s", bytes_per_sec / KIB)
    } else {
        format!("{:.0} B/s", bytes_per_sec.max(0.0))
    }
}

/// `0` renders as `?` (unknown), otherwise `1h02m03s` / `2m05s` / `7s`.
pub fn format_eta(secs: u64) -> String {
    if secs == 0 {
        return "?".to_string();
    }
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if h > 0 {
        format!("{}h{:02}m{:02}s", h, m, s)
    } else if m > 0 {
        format!("{}m{:02}s", m, s)
    } else {
        format!("{}s", s)
    }
}

pub fn download_line(p: &DownloadProgress) -> String {
    format!(
        "  {:>3}%  {}/{} segments  {}  ETA {}  [{}]",
        p.progress,
        p.current_segment,
        p.total_segments,
        format_rate(p.download_speed),
        format_eta(p.eta),
        p.status.as_str()
    )
}

pub fn queue_line(p: &QueueProgress) -> String {
    format!(
        "  {:>3}%  {} done, {} failed, {} active of {}  {}  ETA {}  [{}]",
        p.overall_progress,
        p.completed_items,
        p.failed_items,
        p.active_items,
        p.total_items,
        format_rate(p.total_speed),
        format_eta(p.estimated_time_remaining),
        p.status
    )
}
