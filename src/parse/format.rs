//! Number formatting shared by the parsers and the report.

/// fio bandwidth (KB/s) with auto-scaled unit, two decimals.
#[must_use]
pub fn format_speed_kbps(kbps: f64) -> String {
    let (value, unit) = if kbps >= 1_000_000.0 {
        (kbps / 1_000_000.0, "GB/s")
    } else if kbps >= 1_000.0 {
        (kbps / 1_000.0, "MB/s")
    } else {
        (kbps, "KB/s")
    };
    format!("{value:.2} {unit}")
}

/// fio IOPS: `12.3k` from 10 000 up, the plain integer below.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn format_iops(iops: u64) -> String {
    if iops >= 10_000 {
        format!("{:.1}k", iops as f64 / 1000.0)
    } else {
        iops.to_string()
    }
}

/// dd IOPS plus elapsed time: `5.48K IOPS, 4.67s` or `812.00 IOPS, 1.23s`.
#[must_use]
pub fn format_dd_iops(iops: f64, elapsed_secs: f64) -> String {
    if iops >= 1000.0 {
        format!("{:.2}K IOPS, {elapsed_secs:.2}s", iops / 1000.0)
    } else {
        format!("{iops:.2} IOPS, {elapsed_secs:.2}s")
    }
}

/// Number of digits after the decimal point in a numeric literal.
#[must_use]
pub fn fraction_digits(raw: &str) -> usize {
    raw.split_once('.').map_or(0, |(_, frac)| frac.len())
}
