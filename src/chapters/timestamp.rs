/// Conversions between seconds and mkvtoolnix `HH:MM:SS.mmm` timestamps

/// Parse `HH:MM:SS.mmm` into seconds
pub fn parse_timestamp(ts: &str) -> Option<f64> {
    let mut parts = ts.trim().split(':');
    let hours: u64 = parts.next()?.parse().ok()?;
    let minutes: u64 = parts.next()?.parse().ok()?;
    let seconds: f64 = parts.next()?.parse().ok()?;
    if parts.next().is_some() || !seconds.is_finite() || seconds < 0.0 {
        return None;
    }

    let whole = hours.checked_mul(3600)?.checked_add(minutes.checked_mul(60)?)?;
    Some(whole as f64 + seconds)
}

/// Format seconds as `HH:MM:SS.mmm`
pub fn format_timestamp(seconds: f64) -> String {
    let total_millis = (seconds.max(0.0) * 1000.0).round() as u64;
    let hours = total_millis / 3_600_000;
    let minutes = (total_millis % 3_600_000) / 60_000;
    let millis = total_millis % 60_000;

    format!("{:02}:{:02}:{:02}.{:03}", hours, minutes, millis / 1000, millis % 1000)
}
