pub mod account;
pub mod bluetooth;
pub mod limits;
pub mod player;
pub mod rewards;
pub mod schedule;
pub mod spotify;
pub mod status;
pub mod system;
pub mod usage;

/// Render fractional minutes as `1h 05m` or `42m`
pub fn format_minutes(minutes: f64) -> String {
    let total = minutes.max(0.0).round() as u64;
    match (total / 60, total % 60) {
        (0, m) => format!("{}m", m),
        (h, m) => format!("{}h {:02}m", h, m),
    }
}

pub fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_minutes() {
        assert_eq!(format_minutes(0.0), "0m");
        assert_eq!(format_minutes(42.4), "42m");
        assert_eq!(format_minutes(65.0), "1h 05m");
        assert_eq!(format_minutes(-3.0), "0m");
    }
}
