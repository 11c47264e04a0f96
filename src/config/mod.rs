//! Configuration loading.
//!
//! An explicit `--config` path wins; otherwise `config.toml` under the
//! user config directory is used when present, and compiled-in defaults
//! apply when nothing is found.

mod schema;

pub use schema::{
    AgentConfig, AutomationConfig, CaptureConfig, Config, ProviderConfig, SelectorConfig,
};

use anyhow::Context;
use std::path::{Path, PathBuf};

pub fn load(explicit: Option<&Path>) -> anyhow::Result<Config> {
    if let Some(path) = explicit {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        return toml::from_str(&raw)
            .with_context(|| format!("parsing config file {}", path.display()));
    }

    if let Some(path) = default_config_path() {
        if path.exists() {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("reading config file {}", path.display()))?;
            return toml::from_str(&raw)
                .with_context(|| format!("parsing config file {}", path.display()));
        }
    }

    Ok(Config::default())
}

fn default_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "linkclaw")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn explicit_path_is_required_to_exist() {
        let err = load(Some(Path::new("/nonexistent/linkclaw.toml"))).unwrap_err();
        assert!(err.to_string().contains("reading config file"));
    }

    #[test]
    fn explicit_path_parses() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[agent]\nmax_iterations = 2").unwrap();
        let config = load(Some(file.path())).unwrap();
        assert_eq!(config.agent.max_iterations, 2);
    }

    #[test]
    fn malformed_toml_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "agent = nonsense").unwrap();
        let err = load(Some(file.path())).unwrap_err();
        assert!(err.to_string().contains("parsing config file"));
    }
}
