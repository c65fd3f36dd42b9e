//! Shared CLI presentation utilities.
//!
//! Format-only helpers; no domain decisions are made here.

pub mod progress;

pub use progress::DownloadProgress;

use indicatif::HumanBytes;

/// Human-readable byte count.
pub fn format_bytes(bytes: u64) -> String {
    HumanBytes(bytes).to_string()
}

/// Truncate `raw` to `max` characters, marking the cut with an ellipsis.
pub fn truncate_label(raw: &str, max: usize) -> String {
    if raw.chars().count() <= max {
        return raw.to_string();
    }
    let mut buf: String = raw.chars().take(max.saturating_sub(1)).collect();
    buf.push('…');
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_labels_are_kept() {
        assert_eq!(truncate_label("pool", 10), "pool");
    }

    #[test]
    fn long_labels_are_cut() {
        assert_eq!(truncate_label("abcdefghij", 5), "abcd…");
    }

    #[test]
    fn bytes_are_binary_units() {
        assert_eq!(format_bytes(1536), "1.50 KiB");
    }
}
