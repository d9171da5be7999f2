//! Byte-count and transfer-speed display.

use crate::pattern::Pattern;

/// Pattern used for every scaled size value; the trailing space separates the
/// value from its unit label.
const SIZE_PATTERN: &str = "###,###,###,###.00 ";

const KIB: u64 = 1024;

/// Whether a byte quantity is a plain size or a per-second transfer rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeKind {
    Plain,
    Speed,
}

/// Renders a byte count with an automatically chosen unit (KB through PB).
///
/// The unit switches when the count reaches 1000x the current unit's 1024-based
/// divisor, so values print with at most three integer digits before moving to
/// the next unit. Zero renders as `""` when `zero_to_empty` is set, else as
/// `"0.00"` (or `"0.00 KB/s"` for speeds).
pub fn format_size(bytes: u64, zero_to_empty: bool, kind: SizeKind) -> String {
    if bytes == 0 {
        if zero_to_empty {
            return String::new();
        }
        return match kind {
            SizeKind::Speed => "0.00 KB/s".to_string(),
            SizeKind::Plain => "0.00".to_string(),
        };
    }

    let (divisor, unit) = if bytes < 1000 * KIB {
        (KIB, "KB")
    } else if bytes < 1000 * KIB.pow(2) {
        (KIB.pow(2), "MB")
    } else if bytes < 1000 * KIB.pow(3) {
        (KIB.pow(3), "GB")
    } else if bytes < 1000 * KIB.pow(4) {
        (KIB.pow(4), "TB")
    } else {
        (KIB.pow(5), "PB")
    };

    let scaled = bytes as f64 / divisor as f64;
    let mut out = Pattern::parse(SIZE_PATTERN).format(scaled);
    out.push_str(unit);
    if kind == SizeKind::Speed {
        out.push_str("/s");
    }
    out
}
