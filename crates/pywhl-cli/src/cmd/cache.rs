//! Cache commands

use anyhow::{Context, Result};
use crossterm::style::Stylize;
use pywhl_core::cache::{CacheStore, CleanPolicy, CleanReport};
use std::time::Duration;

use crate::settings::{Overrides, Settings};
use crate::ui::list::cache_table;
use crate::ui::theme::format_size;

const SECS_PER_DAY: u64 = 24 * 60 * 60;

fn store() -> Result<CacheStore> {
    Ok(Settings::load(&Overrides::default())?.cache())
}

/// List cached wheels, newest first
pub fn list() -> Result<()> {
    let cache = store()?;
    let entries = cache.list().context("Failed to read cache")?;

    if entries.is_empty() {
        println!("{}", "Cache is empty".dark_grey());
        return Ok(());
    }

    println!("{}", cache_table(&entries));
    let total: u64 = entries.iter().map(|e| e.size).sum();
    println!();
    println!(
        "{}",
        format!("{} wheel(s), {}", entries.len(), format_size(total)).dark_grey()
    );
    Ok(())
}

pub fn info() -> Result<()> {
    let cache = store()?;
    let entries = cache.list().context("Failed to read cache")?;
    let total: u64 = entries.iter().map(|e| e.size).sum();
    let lw = 12;

    println!();
    println!("  {:<lw$}{}", "location", cache.dir().display());
    println!("  {:<lw$}{}", "wheels", entries.len());
    println!("  {:<lw$}{}", "size", format_size(total));
    // Newest first, so the ends of the list are the extremes.
    if let (Some(newest), Some(oldest)) = (entries.first(), entries.last()) {
        println!("  {:<lw$}{}", "newest", newest.modified.format("%Y-%m-%d %H:%M"));
        println!("  {:<lw$}{}", "oldest", oldest.modified.format("%Y-%m-%d %H:%M"));
    }
    Ok(())
}

pub fn clean(all: bool, older_than_days: Option<u64>) -> Result<()> {
    let cache = store()?;
    let policy = clean_policy(all, older_than_days);
    let report = cache.clean(policy).context("Failed to clean cache")?;
    println!("{} {}", "✓".green(), clean_message(&report).green());
    Ok(())
}

/// `--all` wins; otherwise the age cutoff, defaulting to everything.
pub fn clean_policy(all: bool, older_than_days: Option<u64>) -> CleanPolicy {
    match older_than_days {
        Some(days) if !all => CleanPolicy::OlderThan(Duration::from_secs(days.saturating_mul(SECS_PER_DAY))),
        _ => CleanPolicy::All,
    }
}

pub fn clean_message(report: &CleanReport) -> String {
    let mut msg = format!(
        "Removed {} of {} cached file(s), freed {}",
        report.removed,
        report.total,
        format_size(report.freed_bytes)
    );
    if report.partials > 0 {
        msg.push_str(&format!(" ({} partial download(s) swept)", report.partials));
    }
    msg
}
