//! EPG (Electronic Program Guide) module
//!
//! Contains the XMLTV reader, the feed downloader and the per-source cache.

mod cache;
mod download;
mod parser;

// Re-export public types
pub use cache::{EpgCache, EpgNotice, EpgNotifier, EpgSnapshot, EPG_MAX_AGE};
pub use download::{EpgDownloader, FeedEncoding, ProgressCallback};
pub use parser::{local_offset, parse_xmltv_time, Programme, SanitizingBufReader, Service, XmlTvReader};

use chrono::DateTime;

/// Format an event time as HH:MM.
/// Event times are already shifted to local wall-clock, so no zone is applied.
pub fn format_time(ts: i64) -> String {
    match DateTime::from_timestamp(ts, 0) {
        Some(dt) => dt.naive_utc().format("%H:%M").to_string(),
        None => "--:--".to_string(),
    }
}

/// Format an event time as YYYY-MM-DD HH:MM
pub fn format_datetime(ts: i64) -> String {
    match DateTime::from_timestamp(ts, 0) {
        Some(dt) => dt.naive_utc().format("%Y-%m-%d %H:%M").to_string(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_event_times() {
        assert_eq!(format_time(13 * 3600 + 5 * 60), "13:05");
        assert_eq!(format_datetime(1_704_103_200), "2024-01-01 10:00");
        assert_eq!(format_time(i64::MAX), "--:--");
    }
}
