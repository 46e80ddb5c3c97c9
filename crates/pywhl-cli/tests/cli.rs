//! Integration tests for the pywhl CLI binary.

use std::path::PathBuf;
use std::process::Command;
use tempfile::TempDir;

/// Runs the binary against a throwaway pywhl home.
struct TestContext {
    temp_dir: TempDir,
    home: PathBuf,
}

impl TestContext {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let home = temp_dir.path().join(".pywhl");
        std::fs::create_dir_all(&home).expect("failed to create pywhl home");
        Self { temp_dir, home }
    }

    fn cache_dir(&self) -> PathBuf {
        self.home.join("cache")
    }

    fn pywhl(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_pywhl"));
        cmd.env("HOME", self.temp_dir.path());
        cmd.env("PYWHL_HOME", &self.home);
        cmd.env_remove("PYWHL_INDEX_URL");
        cmd.current_dir(self.temp_dir.path());
        cmd
    }
}

#[test]
fn test_help_command() {
    let ctx = TestContext::new();
    let output = ctx.pywhl().arg("--help").output().expect("failed to run pywhl");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Usage:"));
    assert!(stdout.contains("download"));
}

#[test]
fn test_version_command() {
    let ctx = TestContext::new();
    let output = ctx.pywhl().arg("--version").output().expect("failed to run pywhl");
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("pywhl"));
}

#[test]
fn test_cache_list_empty() {
    let ctx = TestContext::new();
    let output = ctx.pywhl().args(["cache", "list"]).output().expect("failed to run pywhl");
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("Cache is empty"));
}

#[test]
fn test_cache_list_and_clean() {
    let ctx = TestContext::new();
    std::fs::create_dir_all(ctx.cache_dir()).unwrap();
    std::fs::write(
        ctx.cache_dir().join("0123456789abcdef-six-1.16.0-py2.py3-none-any.whl"),
        b"wheel",
    )
    .unwrap();
    std::fs::write(ctx.cache_dir().join("0123456789abcdef-x.whl.part"), b"half").unwrap();

    let output = ctx.pywhl().args(["cache", "list"]).output().expect("failed to run pywhl");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("six-1.16.0-py2.py3-none-any.whl"));
    assert!(!stdout.contains(".part"));

    let output = ctx
        .pywhl()
        .args(["cache", "clean", "--all"])
        .output()
        .expect("failed to run pywhl");
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("Removed 1 of 1"));
    assert_eq!(std::fs::read_dir(ctx.cache_dir()).unwrap().count(), 0);
}

#[test]
fn test_cache_clean_requires_policy() {
    let ctx = TestContext::new();
    let output = ctx.pywhl().args(["cache", "clean"]).output().expect("failed to run pywhl");
    assert!(!output.status.success());
}

#[test]
fn test_config_cache_dir_is_honored() {
    let ctx = TestContext::new();
    let custom = ctx.temp_dir.path().join("elsewhere");
    std::fs::write(
        ctx.home.join("config.toml"),
        format!("[defaults]\ncache_dir = \"{}\"\n", custom.display()),
    )
    .unwrap();

    let output = ctx.pywhl().args(["cache", "info"]).output().expect("failed to run pywhl");
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("elsewhere"));
}

#[test]
fn test_invalid_spec_fails() {
    let ctx = TestContext::new();
    let output = ctx
        .pywhl()
        .args(["download", "pkg==not.a.version", "--index-url", "http://127.0.0.1:9/pypi", "-q"])
        .output()
        .expect("failed to run pywhl");
    assert!(!output.status.success());
}

#[test]
fn test_failed_requirements_report_error_result() {
    let ctx = TestContext::new();
    let file = ctx.temp_dir.path().join("requirements.txt");
    std::fs::write(&file, "# nothing usable\nbroken >=nope\n").unwrap();

    let output = ctx
        .pywhl()
        .args(["download", "-r"])
        .arg(&file)
        .args(["-p", "3.11", "-t", "manylinux_2_17_x86_64", "--index-url", "http://127.0.0.1:9/pypi"])
        .output()
        .expect("failed to run pywhl");
    assert!(!output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    let result = stdout
        .lines()
        .find_map(|line| line.strip_prefix("RESULT "))
        .expect("no RESULT line");
    let result: serde_json::Value = serde_json::from_str(result).unwrap();
    assert_eq!(result["status"], "error");
    assert_eq!(result["failed"], 1);
    assert_eq!(result["count"], 0);
}

fn six_json(base: &str) -> String {
    format!(
        r#"{{
            "info": {{"name": "six", "version": "1.16.0", "requires_dist": null}},
            "releases": {{
                "1.16.0": [
                    {{"filename": "six-1.16.0.tar.gz", "url": "{base}/files/six-1.16.0.tar.gz"}},
                    {{"filename": "six-1.16.0-py2.py3-none-any.whl", "url": "{base}/files/six-1.16.0-py2.py3-none-any.whl", "size": 11}}
                ]
            }}
        }}"#
    )
}

#[test]
fn test_download_then_reuse_cache() {
    let mut server = mockito::Server::new();
    let base = server.url();
    let _meta = server
        .mock("GET", "/pypi/six/json")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(six_json(&base))
        .create();
    let wheel = server
        .mock("GET", "/files/six-1.16.0-py2.py3-none-any.whl")
        .with_status(200)
        .with_body("wheel-bytes")
        .expect(1)
        .create();

    let ctx = TestContext::new();
    let index_url = format!("{base}/pypi");
    let run = |out: &str| {
        ctx.pywhl()
            .args(["download", "six", "-q", "-p", "3.11", "-t", "manylinux_2_17_x86_64"])
            .args(["--index-url", &index_url, "-o", out])
            .output()
            .expect("failed to run pywhl")
    };

    let first = run("first");
    assert!(first.status.success(), "{}", String::from_utf8_lossy(&first.stderr));
    let file = ctx.temp_dir.path().join("first/six-1.16.0-py2.py3-none-any.whl");
    assert_eq!(std::fs::read(&file).unwrap(), b"wheel-bytes");

    // Served from the cache: the file endpoint is hit only once overall.
    let second = run("second");
    assert!(second.status.success());
    assert!(ctx.temp_dir.path().join("second/six-1.16.0-py2.py3-none-any.whl").exists());
    wheel.assert();
}

#[test]
fn test_download_unknown_package_fails() {
    let mut server = mockito::Server::new();
    let _missing = server.mock("GET", "/pypi/ghost/json").with_status(404).create();

    let ctx = TestContext::new();
    let output = ctx
        .pywhl()
        .args(["download", "ghost", "-q", "--index-url", &format!("{}/pypi", server.url())])
        .output()
        .expect("failed to run pywhl");
    assert!(!output.status.success());
}
