//! Offline data file commands
//!
//! `trackwatch status` and `trackwatch reset` work on the data file directly,
//! without connecting to Discord.

use anyhow::Result;
use chrono::{DateTime, Utc};
use trackwatch_config::TrackwatchConfig;
use trackwatch_core::TrackedActivity;

use crate::terminal_output::{self, Column, RED, YELLOW};
use crate::wiring;

pub fn status(config: &TrackwatchConfig) -> Result<()> {
    let store = wiring::open_store(config);
    let snapshot = store.snapshot();
    println!("\n📊 trackwatch data: {}\n", config.storage.data_file.display());
    if snapshot.is_empty() {
        terminal_output::note_warn("No activity tracked yet.");
        return Ok(());
    }
    print!(
        "{}",
        render_status(
            &snapshot,
            config.tracking.target_days,
            Utc::now().timestamp_millis(),
            terminal_output::supports_color(),
        )
    );
    println!("\n{} member(s) tracked.", snapshot.len());
    Ok(())
}

pub fn reset(config: &TrackwatchConfig, confirmed: bool) -> Result<()> {
    let store = wiring::open_store(config);
    if !confirmed {
        terminal_output::note_warn(&format!(
            "This deletes {} record(s) from {}. Re-run with --yes to confirm.",
            store.len(),
            config.storage.data_file.display()
        ));
        return Ok(());
    }
    let cleared = store.len();
    store.reset();
    terminal_output::note_success(&format!("Cleared {cleared} record(s)."));
    Ok(())
}

/// Table of every record, one row per member and channel.
pub fn render_status(snapshot: &[TrackedActivity], target_days: u32, now_ms: i64, color: bool) -> String {
    let columns = [
        Column::left("Community"),
        Column::left("Channel"),
        Column::left("User"),
        Column::left("Last post"),
        Column::right("Days left"),
        Column::left("Last reminder"),
    ];
    let rows: Vec<Vec<String>> = snapshot
        .iter()
        .map(|t| {
            let days_left = t.record.days_left(now_ms, target_days);
            let days = format!("{days_left:.1}");
            let days = if days_left < 0.0 {
                terminal_output::paint(&days, RED, color)
            } else if days_left <= 7.0 {
                terminal_output::paint(&days, YELLOW, color)
            } else {
                days
            };
            vec![
                t.key.community.to_string(),
                t.key.channel.to_string(),
                t.key.user.to_string(),
                format_timestamp(t.record.last_activity_at),
                days,
                t.record
                    .last_notified_threshold
                    .map(|th| th.to_string())
                    .unwrap_or_else(|| "-".to_string()),
            ]
        })
        .collect();
    terminal_output::render_table(&columns, &rows)
}

fn format_timestamp(ms: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(ms)
        .map(|d| d.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ms.to_string())
}
