use dirs::home_dir;
use std::path::PathBuf;

/// Environment variable overriding the pywhl home directory.
pub const HOME_ENV: &str = "PYWHL_HOME";

/// Returns the pywhl home directory, or None if the user's home cannot be resolved.
pub fn try_pywhl_home() -> Option<PathBuf> {
    if let Ok(val) = std::env::var(HOME_ENV) {
        if !val.is_empty() {
            return Some(PathBuf::from(val));
        }
    }
    home_dir().map(|h| h.join(".pywhl"))
}

/// Returns the pywhl home directory (`~/.pywhl`), falling back to a
/// `.pywhl` directory under the working directory when no home exists.
pub fn pywhl_home() -> PathBuf {
    try_pywhl_home().unwrap_or_else(|| PathBuf::from(".pywhl"))
}

/// Artifact cache: ~/.pywhl/cache
pub fn cache_path() -> PathBuf {
    pywhl_home().join("cache")
}

/// Configuration file: ~/.pywhl/config.toml
pub fn config_path() -> PathBuf {
    pywhl_home().join("config.toml")
}

/// Extract the filename from a URL, ignoring any query or fragment.
pub fn filename_from_url(url: &str) -> &str {
    let path = url.split(['?', '#']).next().unwrap_or("");
    path.rsplit('/').next().unwrap_or("")
}
