//! Configuration management for pagesmith
//!
//! Configuration is loaded with the following priority (highest to lowest):
//! 1. CLI flags
//! 2. Environment variables (PAGESMITH_*)
//! 3. Config file (./pagesmith.toml, then ~/.config/pagesmith/config.toml)
//! 4. Default values

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::deploy::{DeployOptions, DEFAULT_BRANCH, DEFAULT_MESSAGE, DEFAULT_ORIGIN};
use crate::git::Author;
use crate::{Error, Result};

/// Name of the project-local config file
pub const PROJECT_CONFIG_FILE: &str = "pagesmith.toml";

/// Deployment target configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DeployConfig {
    /// Repository to publish to
    pub remote_url: Option<String>,

    /// Name the remote is registered under
    pub origin: String,

    /// Branch receiving the artifacts
    pub branch: String,

    /// Working copy kept between runs
    pub cache_dir: Option<PathBuf>,

    /// Push after committing
    pub push: bool,

    /// Commit message template, `[timestamp]` is substituted
    pub message: String,

    /// Stage files matched by ignore rules too
    pub force: bool,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            remote_url: None,
            origin: DEFAULT_ORIGIN.to_string(),
            branch: DEFAULT_BRANCH.to_string(),
            cache_dir: None,
            push: true,
            message: DEFAULT_MESSAGE.to_string(),
            force: false,
        }
    }
}

/// Commit identity configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthorConfig {
    pub name: Option<String>,
    pub email: Option<String>,
}

impl AuthorConfig {
    /// Both halves are required for an override
    pub fn to_author(&self) -> Option<Author> {
        match (&self.name, &self.email) {
            (Some(name), Some(email)) => Some(Author {
                name: name.clone(),
                email: email.clone(),
            }),
            _ => None,
        }
    }
}

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Deployment target
    pub deploy: DeployConfig,

    /// Commit identity
    pub author: AuthorConfig,
}

/// Values given on the command line, applied last
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub remote_url: Option<String>,
    pub origin: Option<String>,
    pub branch: Option<String>,
    pub cache_dir: Option<PathBuf>,
    pub no_push: bool,
    pub message: Option<String>,
    pub force: bool,
}

impl Config {
    /// Load configuration from the first config file found
    ///
    /// Returns default config if no file exists
    pub fn load() -> Result<Self> {
        match Self::find_config_file() {
            Some(path) => Self::load_from_file(&path),
            None => Ok(Self::default()),
        }
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(Error::Io)?;
        toml::from_str(&contents).map_err(|e| {
            Error::Config(format!("Failed to parse {}: {}", path.display(), e))
        })
    }

    /// First existing config file: project-local, then user-wide
    pub fn find_config_file() -> Option<PathBuf> {
        let local = PathBuf::from(PROJECT_CONFIG_FILE);
        if local.exists() {
            return Some(local);
        }

        Self::default_config_path().filter(|path| path.exists())
    }

    /// Get the default config file path
    ///
    /// Returns `~/.config/pagesmith/config.toml` on Unix
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("pagesmith").join("config.toml"))
    }

    /// Apply environment variable overrides
    ///
    /// Supported variables:
    /// - PAGESMITH_REMOTE_URL, PAGESMITH_ORIGIN, PAGESMITH_BRANCH
    /// - PAGESMITH_CACHE_DIR, PAGESMITH_MESSAGE
    /// - PAGESMITH_PUSH: `false`/`0`/`no` disables pushing
    /// - PAGESMITH_AUTHOR_NAME, PAGESMITH_AUTHOR_EMAIL
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    fn with_overrides_from(mut self, var: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(url) = var("PAGESMITH_REMOTE_URL") {
            self.deploy.remote_url = Some(url);
        }

        if let Some(origin) = var("PAGESMITH_ORIGIN") {
            self.deploy.origin = origin;
        }

        if let Some(branch) = var("PAGESMITH_BRANCH") {
            self.deploy.branch = branch;
        }

        if let Some(dir) = var("PAGESMITH_CACHE_DIR") {
            self.deploy.cache_dir = Some(PathBuf::from(dir));
        }

        if let Some(message) = var("PAGESMITH_MESSAGE") {
            self.deploy.message = message;
        }

        if let Some(push) = var("PAGESMITH_PUSH") {
            self.deploy.push = !matches!(
                push.trim().to_ascii_lowercase().as_str(),
                "0" | "false" | "no" | "off"
            );
        }

        if let Some(name) = var("PAGESMITH_AUTHOR_NAME") {
            self.author.name = Some(name);
        }

        if let Some(email) = var("PAGESMITH_AUTHOR_EMAIL") {
            self.author.email = Some(email);
        }

        self
    }

    /// Apply CLI flag overrides
    pub fn with_cli_overrides(mut self, cli: CliOverrides) -> Self {
        if let Some(url) = cli.remote_url {
            self.deploy.remote_url = Some(url);
        }

        if let Some(origin) = cli.origin {
            self.deploy.origin = origin;
        }

        if let Some(branch) = cli.branch {
            self.deploy.branch = branch;
        }

        if let Some(dir) = cli.cache_dir {
            self.deploy.cache_dir = Some(dir);
        }

        if let Some(message) = cli.message {
            self.deploy.message = message;
        }

        if cli.no_push {
            self.deploy.push = false;
        }

        if cli.force {
            self.deploy.force = true;
        }

        self
    }

    /// Load configuration with all overrides applied
    ///
    /// Priority: CLI > env > config file > defaults
    pub fn load_with_overrides(config_path: Option<&Path>, cli: CliOverrides) -> Result<Self> {
        let base = match config_path {
            Some(path) => Self::load_from_file(path)?,
            None => Self::load()?,
        };

        Ok(base.with_env_overrides().with_cli_overrides(cli))
    }

    /// Turn the merged configuration into deployment options
    ///
    /// Fails when no remote URL was configured anywhere.
    pub fn to_options(&self) -> Result<DeployOptions> {
        let remote_url = self.deploy.remote_url.clone().ok_or_else(|| {
            Error::Config(
                "No remote URL configured. Pass --remote, set PAGESMITH_REMOTE_URL or deploy.remote_url"
                    .to_string(),
            )
        })?;

        if self.deploy.branch.trim().is_empty() {
            return Err(Error::Config("Branch name cannot be empty".to_string()));
        }

        if self.deploy.origin.trim().is_empty() {
            return Err(Error::Config("Remote name cannot be empty".to_string()));
        }

        Ok(DeployOptions {
            remote_url,
            origin: self.deploy.origin.clone(),
            branch: self.deploy.branch.clone(),
            cache_dir: self.deploy.cache_dir.clone(),
            push: self.deploy.push,
            message: self.deploy.message.clone(),
            force: self.deploy.force,
            author: self.author.to_author(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.deploy.origin, "origin");
        assert_eq!(config.deploy.branch, "gh-pages");
        assert!(config.deploy.push);
        assert!(config.deploy.remote_url.is_none());
        assert!(config.author.to_author().is_none());
    }

    #[test]
    fn test_cli_overrides() {
        let config = Config::default().with_cli_overrides(CliOverrides {
            remote_url: Some("owner/site".to_string()),
            branch: Some("pages".to_string()),
            no_push: true,
            ..Default::default()
        });

        assert_eq!(config.deploy.remote_url.as_deref(), Some("owner/site"));
        assert_eq!(config.deploy.branch, "pages");
        assert_eq!(config.deploy.origin, "origin");
        assert!(!config.deploy.push);
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("PAGESMITH_BRANCH", "docs"),
            ("PAGESMITH_PUSH", "false"),
            ("PAGESMITH_AUTHOR_NAME", "Bot"),
            ("PAGESMITH_AUTHOR_EMAIL", "bot@example.com"),
        ]
        .into_iter()
        .collect();

        let config =
            Config::default().with_overrides_from(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.deploy.branch, "docs");
        assert!(!config.deploy.push);
        assert_eq!(config.author.to_author().unwrap().name, "Bot");
    }

    #[test]
    fn test_cli_beats_env() {
        let config = Config::default()
            .with_overrides_from(|key| (key == "PAGESMITH_BRANCH").then(|| "env".to_string()))
            .with_cli_overrides(CliOverrides {
                branch: Some("cli".to_string()),
                ..Default::default()
            });

        assert_eq!(config.deploy.branch, "cli");
    }

    #[test]
    fn test_parse_toml() {
        let toml = r#"
[deploy]
remote_url = "git@github.com:owner/site.git"
branch = "pages"
cache_dir = "/var/cache/site"
push = false

[author]
name = "Pages Bot"
email = "bot@example.com"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        let options = config.to_options().unwrap();

        assert_eq!(options.remote_url, "git@github.com:owner/site.git");
        assert_eq!(options.branch, "pages");
        assert_eq!(options.origin, "origin");
        assert_eq!(options.cache_dir, Some(PathBuf::from("/var/cache/site")));
        assert!(!options.push);
        assert_eq!(options.author.unwrap().email, "bot@example.com");
    }

    #[test]
    fn test_partial_toml() {
        let toml = r#"
[deploy]
message = "Publish [timestamp]"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.deploy.message, "Publish [timestamp]");
        assert_eq!(config.deploy.branch, "gh-pages");
        assert!(config.deploy.push);
    }

    #[test]
    fn test_missing_remote_is_config_error() {
        let err = Config::default().to_options().unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
