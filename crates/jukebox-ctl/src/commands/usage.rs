use anyhow::Result;
use jukebox_common::UsageReport;

use super::format_minutes;
use crate::client::ApiClient;

pub async fn show(client: &ApiClient) -> Result<()> {
    let report: UsageReport = client.get("/admin/usage").await?;
    print_report(&report);
    Ok(())
}

pub async fn reset(client: &ApiClient) -> Result<()> {
    let report: UsageReport = client.post("/admin/usage/reset", &serde_json::json!({})).await?;
    println!("Usage for today was reset.\n");
    print_report(&report);
    Ok(())
}

fn print_report(report: &UsageReport) {
    println!("Listening Report for {}", report.date);
    println!("==============================");
    println!();
    println!("Used today:      {}", format_minutes(report.minutes_used_today));
    match report.remaining_minutes {
        Some(minutes) => println!("Remaining:       {}", format_minutes(minutes)),
        None => println!("Remaining:       unlimited"),
    }

    let mut limit = format_minutes(report.daily_limit_minutes as f64);
    if report.extra_minutes_today > 0 {
        limit.push_str(&format!(" (+{}m reward)", report.extra_minutes_today));
    }
    println!("Daily limit:     {}", limit);

    if let Some(current) = report.current_session_minutes {
        println!("Current session: {}", format_minutes(current));
    }
    println!("Skips this hour: {}/{}", report.skips_this_hour, report.skip_limit_this_hour);
    println!("Reward points:   {:.1}", report.points);

    if !report.sessions_today.is_empty() {
        println!("\nSessions:");
        for session in &report.sessions_today {
            let end = session
                .end
                .map(|end| end.format("%H:%M").to_string())
                .unwrap_or_else(|| "now".to_string());
            let minutes = session.duration_minutes.map(format_minutes).unwrap_or_default();
            println!(
                "  {}-{}  {:>7}  {} songs, {} skips",
                session.start.format("%H:%M"),
                end,
                minutes,
                session.songs_played,
                session.skips
            );
        }
    }

    if !report.top_favorites.is_empty() {
        println!("\nFavorites:");
        for (i, favorite) in report.top_favorites.iter().enumerate() {
            println!("  {:>2}. {} ({} plays)", i + 1, favorite.title, favorite.plays);
        }
    }
}
