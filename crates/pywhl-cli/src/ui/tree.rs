//! Dependency tree and conflict rendering for `download` and `resolve`.

use pywhl_core::resolver::{Conflict, ResolutionResult};
use pywhl_schema::PackageName;
use std::collections::HashSet;

/// Tree lines for `result`, root first. A package already expanded
/// elsewhere is shown once more with `(*)` and not expanded again.
pub fn render_tree(result: &ResolutionResult) -> Vec<String> {
    let mut lines = vec![label(result, &result.root)];
    let mut expanded = HashSet::new();
    expanded.insert(result.root.clone());
    let mut ancestors = vec![&result.root];
    walk(result, &result.root, "", &mut ancestors, &mut expanded, &mut lines);
    lines
}

fn walk<'a>(
    result: &'a ResolutionResult,
    name: &'a PackageName,
    prefix: &str,
    ancestors: &mut Vec<&'a PackageName>,
    expanded: &mut HashSet<PackageName>,
    lines: &mut Vec<String>,
) {
    let children: Vec<&PackageName> = result
        .children(name)
        .into_iter()
        .filter(|c| !ancestors.contains(c))
        .collect();

    for (i, child) in children.iter().enumerate() {
        let last = i + 1 == children.len();
        let branch = if last { "└── " } else { "├── " };
        let first_visit = expanded.insert((*child).clone());
        let marker = if first_visit { "" } else { " (*)" };
        lines.push(format!("{prefix}{branch}{}{marker}", label(result, child)));

        if first_visit {
            let nested = format!("{prefix}{}", if last { "    " } else { "│   " });
            ancestors.push(child);
            walk(result, child, &nested, ancestors, expanded, lines);
            ancestors.pop();
        }
    }
}

fn label(result: &ResolutionResult, name: &PackageName) -> String {
    match result.resolved.get(name) {
        Some(version) => format!("{name} {version}"),
        None => format!("{name} (unresolved)"),
    }
}

/// One line per conflicting constraint, grouped under the package.
pub fn render_conflicts(conflicts: &[Conflict]) -> Vec<String> {
    let mut lines = Vec::new();
    for conflict in conflicts {
        lines.push(conflict.package.to_string());
        if let Some(error) = &conflict.error {
            lines.push(format!("  {error}"));
        }
        for c in &conflict.constraints {
            lines.push(format!("  {} required by {}", c.constraint, c.source));
        }
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use pywhl_core::index::MemoryIndex;
    use pywhl_core::resolver::{DependencyResolver, ResolveOptions};
    use pywhl_schema::{MarkerEnvironment, PythonVersion, TargetPlatform};

    async fn resolve(index: &MemoryIndex, spec: &str) -> ResolutionResult {
        let options = ResolveOptions {
            max_depth: 10,
            environment: MarkerEnvironment::for_target(
                PythonVersion::new(3, 11),
                &TargetPlatform::new("manylinux_2_17_x86_64"),
            ),
            follow_dependencies: true,
        };
        DependencyResolver::new(index, options).resolve_spec(spec).await.unwrap()
    }

    #[tokio::test]
    async fn test_tree_shape() {
        let mut index = MemoryIndex::new();
        index
            .add_release("app", "1.0.0", &["left", "right"], &[])
            .add_release("left", "1.0.0", &["shared"], &[])
            .add_release("right", "2.0.0", &["shared"], &[])
            .add_release("shared", "3.0.0", &[], &[]);

        let lines = render_tree(&resolve(&index, "app").await);
        assert_eq!(
            lines,
            vec![
                "app 1.0.0",
                "├── left 1.0.0",
                "│   └── shared 3.0.0",
                "└── right 2.0.0",
                "    └── shared 3.0.0 (*)",
            ]
        );
    }

    #[tokio::test]
    async fn test_conflicts_listed_with_sources() {
        let mut index = MemoryIndex::new();
        index
            .add_release("app", "1.0.0", &["a", "b"], &[])
            .add_release("a", "1.0.0", &["dep>=2.0.0"], &[])
            .add_release("b", "1.0.0", &["dep<2.0.0"], &[])
            .add_versions("dep", &["1.0.0", "2.0.0"]);

        let result = resolve(&index, "app").await;
        let lines = render_conflicts(&result.conflicts);
        assert_eq!(lines[0], "dep");
        assert!(lines.contains(&"  >=2.0.0 required by a".to_string()));
        assert!(lines.contains(&"  <2.0.0 required by b".to_string()));

        let tree = render_tree(&result);
        assert!(tree.iter().any(|l| l.contains("dep (unresolved)")));
    }
}
