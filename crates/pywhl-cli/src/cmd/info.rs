//! Info command

use anyhow::{Context, Result};
use crossterm::style::Stylize;
use pywhl_core::index::MetadataSource;
use pywhl_schema::{PackageMetadata, PackageName, Version};

use crate::settings::{Overrides, Settings};
use crate::ui::theme::format_size;

/// Versions shown before the list is cut short.
const VERSION_LIMIT: usize = 20;

/// Show what the index knows about a package
pub async fn info(package: &str, versions: bool, overrides: &Overrides) -> Result<()> {
    let settings = Settings::load(overrides)?;
    let source = settings.source()?;
    let name = PackageName::new(package);
    let meta = fetch(&source, &name).await?;

    println!();
    println!(
        "  {} {}",
        meta.name.as_str().white().bold(),
        meta.latest_version.as_str().dark_grey()
    );
    for line in render_info(&meta, versions) {
        println!("  {line}");
    }
    Ok(())
}

async fn fetch(source: &dyn MetadataSource, name: &PackageName) -> Result<PackageMetadata> {
    source
        .package_metadata(name, None)
        .await
        .with_context(|| format!("Failed to look up '{name}'"))
}

/// Body lines under the name header.
pub fn render_info(meta: &PackageMetadata, versions: bool) -> Vec<String> {
    let lw = 12;
    let mut lines = Vec::new();

    if let Some(summary) = meta.summary.as_deref().filter(|s| !s.is_empty()) {
        lines.push(summary.to_string());
    }
    lines.push(String::new());

    if !meta.requires.is_empty() {
        lines.push(format!("{:<lw$}{}", "requires", meta.requires.join(", ")));
    }

    let files = meta.artifacts(&meta.latest_version);
    let wheels = files.iter().filter(|f| f.is_wheel()).count();
    lines.push(format!("{:<lw$}{} ({wheels} wheel(s))", "files", files.len()));
    for file in files.iter().filter(|f| f.is_wheel()) {
        let size = file.size.map(format_size).unwrap_or_default();
        lines.push(format!("{:<lw$}{} {size}", "", file.filename));
    }

    if versions {
        let sorted = sorted_versions(&meta.available_versions);
        lines.push(String::new());
        lines.push(format!("{:<lw$}{}", "versions", sorted.len()));
        for version in sorted.iter().take(VERSION_LIMIT) {
            lines.push(format!("{:<lw$}{version}", ""));
        }
        if sorted.len() > VERSION_LIMIT {
            lines.push(format!("{:<lw$}... and {} more", "", sorted.len() - VERSION_LIMIT));
        }
    }
    lines
}

/// Newest first. Versions that do not parse keep index order, after the rest.
fn sorted_versions(raw: &[String]) -> Vec<&str> {
    let (mut parsed, unparsed): (Vec<_>, Vec<_>) = raw
        .iter()
        .map(|v| (Version::parse_release(v).ok(), v.as_str()))
        .partition(|(v, _)| v.is_some());
    parsed.sort_by(|a, b| b.0.cmp(&a.0));
    parsed
        .into_iter()
        .chain(unparsed)
        .map(|(_, text)| text)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pywhl_core::index::MemoryIndex;
    use pywhl_schema::ArtifactDescriptor;

    #[test]
    fn test_sorted_versions() {
        let raw: Vec<String> = ["1.0.0", "2024.1", "2.0.0", "1.10.0"]
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(sorted_versions(&raw), vec!["2.0.0", "1.10.0", "1.0.0", "2024.1"]);
    }

    #[tokio::test]
    async fn test_render_from_index() {
        let mut wheel = ArtifactDescriptor::new("six-1.16.0-py2.py3-none-any.whl", "https://files.example/six.whl");
        wheel.size = Some(11053);
        let mut index = MemoryIndex::new();
        index
            .add_release("six", "1.15.0", &[], &[])
            .add_release(
                "six",
                "1.16.0",
                &["typing-extensions>=4.0.0"],
                &[wheel, ArtifactDescriptor::new("six-1.16.0.tar.gz", "https://files.example/six.tar.gz")],
            )
            .set_summary("six", "Python 2 and 3 compatibility utilities");

        let meta = fetch(&index, &PackageName::new("six")).await.unwrap();
        let lines = render_info(&meta, true);

        assert_eq!(lines[0], "Python 2 and 3 compatibility utilities");
        assert!(lines.iter().any(|l| l.contains("typing-extensions>=4.0.0")));
        assert!(lines.iter().any(|l| l.contains("2 (1 wheel(s))")));
        assert!(lines.iter().any(|l| l.contains("six-1.16.0-py2.py3-none-any.whl 10.8 KB")));
        let v16 = lines.iter().position(|l| l.trim() == "1.16.0").unwrap();
        let v15 = lines.iter().position(|l| l.trim() == "1.15.0").unwrap();
        assert!(v16 < v15);
    }

    #[tokio::test]
    async fn test_unknown_package() {
        let err = fetch(&MemoryIndex::new(), &PackageName::new("ghost")).await.unwrap_err();
        assert!(format!("{err:#}").contains("ghost"));
    }
}
