//! Local Python interpreter detection
//!
//! Used when the target version is `auto`: the first of `python3` and
//! `python` found on `PATH` decides, and 3.9 is assumed when neither runs.

use pywhl_schema::PythonVersion;
use regex::Regex;
use std::process::Command;

const CANDIDATES: [&str; 2] = ["python3", "python"];

/// Version of the first interpreter on `PATH`, if any answers `--version`.
pub fn detect() -> Option<PythonVersion> {
    for candidate in CANDIDATES {
        let Ok(path) = which::which(candidate) else {
            continue;
        };
        let Ok(output) = Command::new(&path).arg("--version").output() else {
            tracing::debug!(interpreter = %path.display(), "failed to run");
            continue;
        };
        // Python 2 prints its version on stderr.
        let text = format!(
            "{}{}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
        if let Some(version) = parse_version_output(&text) {
            tracing::debug!(interpreter = %path.display(), %version, "detected python");
            return Some(version);
        }
    }
    None
}

/// [`detect`], falling back to the default target.
pub fn detect_or_default() -> PythonVersion {
    detect().unwrap_or_else(|| {
        let fallback = PythonVersion::default();
        tracing::info!(%fallback, "no python interpreter found, assuming default");
        fallback
    })
}

/// Parse `Python 3.11.4` into `3.11`; the micro part is dropped because
/// wheel tags never carry it.
pub fn parse_version_output(text: &str) -> Option<PythonVersion> {
    let re = Regex::new(r"Python (\d+)\.(\d+)").ok()?;
    let caps = re.captures(text)?;
    let major = caps.get(1)?.as_str().parse().ok()?;
    let minor = caps.get(2)?.as_str().parse().ok()?;
    Some(PythonVersion::new(major, minor))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_version_output() {
        assert_eq!(parse_version_output("Python 3.11.4\n"), Some(PythonVersion::new(3, 11)));
        assert_eq!(parse_version_output("Python 3.13.0rc1"), Some(PythonVersion::new(3, 13)));
        assert_eq!(parse_version_output("Python 2.7.18"), Some(PythonVersion::new(2, 7)));
        assert_eq!(parse_version_output("command not found"), None);
        assert_eq!(parse_version_output(""), None);
    }

    #[test]
    fn test_detect_or_default_always_answers() {
        let version = detect_or_default();
        assert!(version.major >= 2);
    }
}
