use anyhow::{anyhow, Result};
use clap::ValueEnum;
use jukebox_common::{DaySchedule, ScheduleConfig, TimeWindow};

use super::yes_no;
use crate::client::ApiClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DayKind {
    Weekday,
    Weekend,
}

impl DayKind {
    fn windows(self, schedule: &mut ScheduleConfig) -> &mut DaySchedule {
        match self {
            DayKind::Weekday => &mut schedule.weekday,
            DayKind::Weekend => &mut schedule.weekend,
        }
    }
}

pub async fn show(client: &ApiClient) -> Result<()> {
    let schedule: ScheduleConfig = client.get("/admin/schedule").await?;
    print_schedule(&schedule);
    Ok(())
}

pub async fn set_enabled(client: &ApiClient, enabled: bool) -> Result<()> {
    let mut schedule: ScheduleConfig = client.get("/admin/schedule").await?;
    schedule.enabled = enabled;
    let schedule: ScheduleConfig = client.put("/admin/schedule", &schedule).await?;
    println!("Schedule enforcement: {}", if schedule.enabled { "on" } else { "off" });
    Ok(())
}

/// Add or replace a named window, e.g. `weekday afternoon 15:00 18:00`
pub async fn set_window(
    client: &ApiClient,
    day: DayKind,
    name: &str,
    start: &str,
    end: &str,
) -> Result<()> {
    let mut schedule: ScheduleConfig = client.get("/admin/schedule").await?;
    day.windows(&mut schedule).insert(name.to_string(), TimeWindow::new(start, end));

    let schedule: ScheduleConfig = client.put("/admin/schedule", &schedule).await?;
    println!("Saved {} window '{}' {}-{}", day_label(day), name, start, end);
    println!();
    print_schedule(&schedule);
    Ok(())
}

pub async fn remove_window(client: &ApiClient, day: DayKind, name: &str) -> Result<()> {
    let mut schedule: ScheduleConfig = client.get("/admin/schedule").await?;
    remove_named(&mut schedule, day, name)?;

    let schedule: ScheduleConfig = client.put("/admin/schedule", &schedule).await?;
    println!("Removed {} window '{}'", day_label(day), name);
    println!();
    print_schedule(&schedule);
    Ok(())
}

fn remove_named(schedule: &mut ScheduleConfig, day: DayKind, name: &str) -> Result<()> {
    day.windows(schedule)
        .remove(name)
        .map(|_| ())
        .ok_or_else(|| anyhow!("No {} window named '{}'", day_label(day), name))
}

fn day_label(day: DayKind) -> &'static str {
    match day {
        DayKind::Weekday => "weekday",
        DayKind::Weekend => "weekend",
    }
}

fn print_schedule(schedule: &ScheduleConfig) {
    println!("Schedule enforced: {}", yes_no(schedule.enabled));
    for (label, windows) in [("Weekday", &schedule.weekday), ("Weekend", &schedule.weekend)] {
        println!("\n  {}:", label);
        if windows.is_empty() {
            println!("    (no listening windows)");
        }
        for (name, window) in windows {
            println!("    {:<12} {}-{}", name, window.start, window.end);
        }
    }
}
