//! Resolve command

use anyhow::{Context, Result};
use crossterm::style::Stylize;
use pywhl_core::index::MetadataSource;
use pywhl_core::resolver::{Conflict, DependencyResolver, ResolutionResult, ResolutionState};
use pywhl_schema::{PackageName, Version};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::settings::{Overrides, Settings};
use crate::ui::tree::{render_conflicts, render_tree};

/// JSON shape printed by `resolve --json`.
#[derive(Debug, Serialize)]
pub struct ResolveReport<'a> {
    pub root: &'a PackageName,
    pub state: ResolutionState,
    pub resolved: &'a BTreeMap<PackageName, Version>,
    pub conflicts: &'a [Conflict],
}

impl<'a> From<&'a ResolutionResult> for ResolveReport<'a> {
    fn from(result: &'a ResolutionResult) -> Self {
        Self {
            root: &result.root,
            state: result.state(),
            resolved: &result.resolved,
            conflicts: &result.conflicts,
        }
    }
}

pub async fn resolve(spec: &str, overrides: &Overrides, json: bool) -> Result<()> {
    let settings = Settings::load(overrides)?;
    let source = settings.source()?;
    let result = resolve_with(spec, &settings, &source).await?;

    if json {
        let report = ResolveReport::from(&result);
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!();
    for line in render_tree(&result) {
        println!("  {line}");
    }
    println!();

    if result.is_success() {
        println!(
            "{} {}",
            "✓".green(),
            format!("{} package(s) resolved", result.resolved.len()).green()
        );
    } else {
        println!(
            "{} {}",
            "⚠".yellow(),
            format!("{} conflict(s)", result.conflicts.len()).yellow()
        );
        for line in render_conflicts(&result.conflicts) {
            println!("  {line}");
        }
    }
    Ok(())
}

pub async fn resolve_with(
    spec: &str,
    settings: &Settings,
    source: &dyn MetadataSource,
) -> Result<ResolutionResult> {
    DependencyResolver::new(source, settings.resolve_options(true))
        .resolve_spec(spec)
        .await
        .with_context(|| format!("Failed to resolve {spec}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pywhl_core::config::Config;
    use pywhl_core::index::MemoryIndex;

    fn settings() -> Settings {
        let overrides = Overrides {
            python: Some("3.11".to_string()),
            platform: Some("win_amd64".to_string()),
            ..Default::default()
        };
        Settings::from_config(Config::default(), &overrides).unwrap()
    }

    #[tokio::test]
    async fn test_json_report_lists_conflicts() {
        let mut index = MemoryIndex::new();
        index
            .add_release("app", "1.0.0", &["dep>=2.0.0", "ok"], &[])
            .add_versions("dep", &["1.0.0"])
            .add_release("ok", "0.3.0", &[], &[]);

        let result = resolve_with("app", &settings(), &index).await.unwrap();
        let value = serde_json::to_value(ResolveReport::from(&result)).unwrap();

        assert_eq!(value["root"], "app");
        assert_eq!(value["state"], "conflicted");
        assert_eq!(value["resolved"]["ok"], "0.3.0");
        assert!(value["resolved"].get("dep").is_none());
        assert_eq!(value["conflicts"][0]["package"], "dep");
        assert_eq!(value["conflicts"][0]["constraints"][0]["constraint"], ">=2.0.0");
        assert_eq!(value["conflicts"][0]["constraints"][0]["source"], "app");
    }

    #[tokio::test]
    async fn test_markers_follow_target() {
        let mut index = MemoryIndex::new();
        index
            .add_release(
                "app",
                "1.0.0",
                &["pywin32>=300.0.0 ; sys_platform == \"win32\"", "uvloop ; sys_platform != \"win32\""],
                &[],
            )
            .add_versions("pywin32", &["306.0.0"])
            .add_versions("uvloop", &["0.19.0"]);

        let result = resolve_with("app", &settings(), &index).await.unwrap();
        assert!(result.resolved.contains_key("pywin32"));
        assert!(!result.resolved.contains_key("uvloop"));
    }
}
