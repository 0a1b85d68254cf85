use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use url::Url;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("invalid configuration: {reason}")]
    Invalid { reason: String },
}

fn default_server_url() -> Url {
    Url::parse("https://koji.fedoraproject.org/kojihub").expect("default server URL is valid")
}

fn default_lookaside_url() -> Url {
    Url::parse("https://pkgs.fedoraproject.org/repo/pkgs").expect("default lookaside URL is valid")
}

fn default_tracking_remote() -> String {
    "origin".into()
}

fn default_vcs() -> String {
    "git".into()
}

/// Project-level configuration, `granary.toml` in the project root (or the
/// file `GRANARY_CONFIG` points at).
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default = "default_server_url")]
    pub server_url: Url,

    #[serde(default = "default_lookaside_url")]
    pub lookaside_url: Url,

    /// Client certificate for `sslLogin`; password-less `login` when unset.
    #[serde(default)]
    pub certificate: Option<PathBuf>,

    #[serde(default = "default_tracking_remote")]
    pub tracking_remote: String,

    /// Which VCS drives the project; only `git` is implemented today.
    #[serde(default = "default_vcs")]
    pub vcs: String,

    pub package: PackageConfig,
}

/// What the spec-file parser would normally provide.
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PackageConfig {
    pub name: String,
    pub version: String,
    pub release: String,
    #[serde(default)]
    pub scm_url: Option<String>,
}

impl Config {
    pub fn load(path: &Path) -> Result<Config, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
            path: path.display().to_string(),
            source: e,
        })?;
        let config: Config = toml::from_str(&contents)?;
        if config.package.name.is_empty() {
            return Err(ConfigError::Invalid {
                reason: "package.name must not be empty".into(),
            });
        }
        Ok(config)
    }

    /// `GRANARY_CONFIG` wins; otherwise `granary.toml` next to the project.
    pub fn locate(project_root: &Path) -> Result<Config, ConfigError> {
        match std::env::var("GRANARY_CONFIG") {
            Ok(path) => Config::load(Path::new(&path)),
            Err(_) => Config::load(&project_root.join("granary.toml")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [package]
            name = "pkg"
            version = "1.0"
            release = "1%{?dist}"
            "#,
        )
        .unwrap();
        assert_eq!(config.tracking_remote, "origin");
        assert!(config.certificate.is_none());
        assert_eq!(config.server_url.as_str(), "https://koji.fedoraproject.org/kojihub");
    }

    #[test]
    fn test_unknown_fields_are_rejected() {
        let result: Result<Config, _> = toml::from_str(
            r#"
            server = "typo"
            [package]
            name = "pkg"
            version = "1.0"
            release = "1"
            "#,
        );
        assert!(result.is_err());
    }
}
