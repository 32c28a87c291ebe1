// Listening schedule gate
//
// Decides whether music may play at a given wall-clock time based on the
// weekday and weekend windows in `ScheduleConfig`.

use chrono::{DateTime, Datelike, Local, NaiveTime, Timelike};

use crate::error::{Error, Result};
use crate::types::{DaySchedule, ScheduleConfig, TimeWindow};

/// Result of checking if listening is allowed
#[derive(Debug, Clone, PartialEq)]
pub enum AccessResult {
    Allowed,
    /// Denied with reason and the start of the next window today, if any
    Denied { reason: String, next_window: Option<String> },
}

impl AccessResult {
    pub fn is_allowed(&self) -> bool {
        matches!(self, AccessResult::Allowed)
    }
}

/// Schedule gate over a `ScheduleConfig`
#[derive(Debug, Clone)]
pub struct ScheduleGate {
    config: ScheduleConfig,
}

impl ScheduleGate {
    pub fn new(config: ScheduleConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ScheduleConfig {
        &self.config
    }

    /// True if `now` falls inside any window for the day, boundaries inclusive.
    /// A disabled schedule always allows.
    pub fn is_within_schedule(&self, now: DateTime<Local>) -> bool {
        if !self.config.enabled {
            return true;
        }

        let time = truncate_to_minute(now);
        self.windows_for(now).values().any(|w| window_contains(w, time))
    }

    pub fn check_access(&self, now: DateTime<Local>) -> AccessResult {
        if self.is_within_schedule(now) {
            return AccessResult::Allowed;
        }

        let windows = self.windows_for(now);
        let next_window = find_next_window(truncate_to_minute(now), windows);
        let reason = format_denial_reason(windows);

        AccessResult::Denied { reason, next_window }
    }

    /// Minutes left in the window containing `now`, or None when outside every
    /// window or when the schedule is disabled.
    pub fn minutes_until_close(&self, now: DateTime<Local>) -> Option<i64> {
        if !self.config.enabled {
            return None;
        }

        let time = truncate_to_minute(now);
        self.windows_for(now)
            .values()
            .filter(|w| window_contains(w, time))
            .filter_map(|w| {
                let end = parse_time(&w.end).ok()?;
                let mut minutes = (end - time).num_minutes();
                if minutes < 0 {
                    // Overnight window, the end is tomorrow
                    minutes += 24 * 60;
                }
                Some(minutes)
            })
            .max()
    }

    /// Check if a warning should be shown, i.e. the current window closes within
    /// `warning_minutes`
    pub fn should_warn(&self, now: DateTime<Local>, warning_minutes: u32) -> bool {
        matches!(self.minutes_until_close(now), Some(m) if m <= warning_minutes as i64)
    }

    fn windows_for(&self, now: DateTime<Local>) -> &DaySchedule {
        if is_weekend(now) {
            &self.config.weekend
        } else {
            &self.config.weekday
        }
    }
}

/// Validate every window parses as HH:MM and is not empty. Windows whose end
/// precedes their start are accepted and span midnight.
pub fn validate_schedule(config: &ScheduleConfig) -> Result<()> {
    for (day, windows) in [("weekday", &config.weekday), ("weekend", &config.weekend)] {
        for (period, window) in windows {
            let start = parse_time(&window.start)?;
            let end = parse_time(&window.end)?;
            if start == end {
                return Err(Error::InvalidConfig(format!(
                    "{} window '{}' starts and ends at {}",
                    day, period, window.start
                )));
            }
        }
    }
    Ok(())
}

/// Monday..Friday are weekdays (0..=4); Saturday and Sunday are weekend.
fn is_weekend(now: DateTime<Local>) -> bool {
    now.weekday().num_days_from_monday() >= 5
}

fn window_contains(window: &TimeWindow, time: NaiveTime) -> bool {
    let (Ok(start), Ok(end)) = (parse_time(&window.start), parse_time(&window.end)) else {
        return false;
    };

    if start <= end {
        time >= start && time <= end
    } else {
        time >= start || time <= end
    }
}

fn find_next_window(time: NaiveTime, windows: &DaySchedule) -> Option<String> {
    windows
        .values()
        .filter_map(|w| parse_time(&w.start).ok())
        .filter(|start| *start > time)
        .min()
        .map(|t| format!("{:02}:{:02}", t.hour(), t.minute()))
}

fn format_denial_reason(windows: &DaySchedule) -> String {
    if windows.is_empty() {
        return "No listening windows configured for today".to_string();
    }

    let mut ranges: Vec<&TimeWindow> = windows.values().collect();
    ranges.sort_by(|a, b| a.start.cmp(&b.start));
    let ranges: Vec<String> = ranges.iter().map(|w| format!("{}-{}", w.start, w.end)).collect();
    format!("Music is only allowed during: {}", ranges.join(", "))
}

fn truncate_to_minute(now: DateTime<Local>) -> NaiveTime {
    NaiveTime::from_hms_opt(now.hour(), now.minute(), 0).unwrap_or_else(|| now.time())
}

/// Parse a time string in HH:MM format
pub fn parse_time(time_str: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(time_str, "%H:%M")
        .map_err(|_| Error::InvalidTime(time_str.to_string()))
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::{NaiveDate, TimeZone};

    use super::*;

    fn make_day(ranges: &[(&str, &str, &str)]) -> DaySchedule {
        ranges
            .iter()
            .map(|(name, start, end)| (name.to_string(), TimeWindow::new(start, end)))
            .collect()
    }

    fn enabled_gate(weekday: DaySchedule, weekend: DaySchedule) -> ScheduleGate {
        ScheduleGate::new(ScheduleConfig { enabled: true, weekday, weekend })
    }

    // Monday, Jan 19, 2026
    fn monday_at(hour: u32, minute: u32) -> DateTime<Local> {
        let naive =
            NaiveDate::from_ymd_opt(2026, 1, 19).unwrap().and_hms_opt(hour, minute, 0).unwrap();
        Local.from_local_datetime(&naive).earliest().unwrap()
    }

    // Saturday, Jan 24, 2026
    fn saturday_at(hour: u32, minute: u32) -> DateTime<Local> {
        let naive =
            NaiveDate::from_ymd_opt(2026, 1, 24).unwrap().and_hms_opt(hour, minute, 0).unwrap();
        Local.from_local_datetime(&naive).earliest().unwrap()
    }

    #[test]
    fn test_parse_time() {
        assert!(parse_time("10:00").is_ok());
        assert!(parse_time("23:59").is_ok());
        assert!(parse_time("00:00").is_ok());
        assert!(parse_time("25:00").is_err());
        assert!(parse_time("invalid").is_err());
    }

    #[test]
    fn test_disabled_schedule_always_allows() {
        let gate = ScheduleGate::new(ScheduleConfig {
            enabled: false,
            weekday: BTreeMap::new(),
            weekend: BTreeMap::new(),
        });
        assert!(gate.is_within_schedule(monday_at(3, 0)));
        assert_eq!(gate.check_access(monday_at(3, 0)), AccessResult::Allowed);
    }

    #[test]
    fn test_window_boundaries_are_inclusive() {
        let gate = enabled_gate(make_day(&[("afternoon", "15:00", "18:00")]), BTreeMap::new());

        assert!(gate.is_within_schedule(monday_at(15, 0)));
        assert!(gate.is_within_schedule(monday_at(18, 0)));
        assert!(gate.is_within_schedule(monday_at(16, 30)));
        assert!(!gate.is_within_schedule(monday_at(14, 59)));
        assert!(!gate.is_within_schedule(monday_at(18, 1)));
    }

    #[test]
    fn test_weekend_uses_weekend_windows() {
        let gate = enabled_gate(
            make_day(&[("morning", "07:00", "08:00")]),
            make_day(&[("morning", "09:00", "12:00")]),
        );

        assert!(!gate.is_within_schedule(saturday_at(7, 30)));
        assert!(gate.is_within_schedule(saturday_at(10, 0)));
        assert!(gate.is_within_schedule(monday_at(7, 30)));
        assert!(!gate.is_within_schedule(monday_at(10, 0)));
    }

    #[test]
    fn test_overnight_window_spans_midnight() {
        let gate = enabled_gate(make_day(&[("night", "22:00", "01:00")]), BTreeMap::new());

        assert!(gate.is_within_schedule(monday_at(23, 30)));
        assert!(gate.is_within_schedule(monday_at(0, 30)));
        assert!(!gate.is_within_schedule(monday_at(12, 0)));
        assert_eq!(gate.minutes_until_close(monday_at(23, 0)), Some(120));
    }

    #[test]
    fn test_denied_reports_next_window() {
        let gate = enabled_gate(
            make_day(&[("morning", "07:00", "08:00"), ("afternoon", "15:00", "18:00")]),
            BTreeMap::new(),
        );

        match gate.check_access(monday_at(10, 0)) {
            AccessResult::Denied { reason, next_window } => {
                assert!(reason.contains("07:00-08:00"), "got: {}", reason);
                assert!(reason.contains("15:00-18:00"), "got: {}", reason);
                assert_eq!(next_window, Some("15:00".to_string()));
            }
            _ => panic!("Expected listening to be denied"),
        }

        match gate.check_access(monday_at(20, 0)) {
            AccessResult::Denied { next_window, .. } => assert_eq!(next_window, None),
            _ => panic!("Expected listening to be denied"),
        }
    }

    #[test]
    fn test_empty_day_denies_when_enabled() {
        let gate = enabled_gate(BTreeMap::new(), BTreeMap::new());

        match gate.check_access(monday_at(10, 0)) {
            AccessResult::Denied { reason, .. } => {
                assert!(reason.contains("No listening windows configured"));
            }
            _ => panic!("Expected listening to be denied with empty windows"),
        }
    }

    #[test]
    fn test_warning_before_window_end() {
        let gate = enabled_gate(make_day(&[("afternoon", "15:00", "19:00")]), BTreeMap::new());

        assert!(gate.should_warn(monday_at(18, 55), 5));
        assert!(gate.should_warn(monday_at(18, 58), 5));
        assert!(!gate.should_warn(monday_at(18, 54), 5));
        assert!(!gate.should_warn(monday_at(19, 1), 5));
    }

    #[test]
    fn test_validate_schedule() {
        let mut config = ScheduleConfig::default();
        assert!(validate_schedule(&config).is_ok());

        config.weekday.insert("broken".to_string(), TimeWindow::new("7am", "08:00"));
        assert!(matches!(validate_schedule(&config), Err(Error::InvalidTime(_))));

        config.weekday.insert("broken".to_string(), TimeWindow::new("08:00", "08:00"));
        assert!(matches!(validate_schedule(&config), Err(Error::InvalidConfig(_))));

        config.weekday.insert("broken".to_string(), TimeWindow::new("22:00", "01:00"));
        assert!(validate_schedule(&config).is_ok());
    }
}
