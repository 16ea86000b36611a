//! Configuration loading and validation.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Path fragment inserted before each view-name segment when no override
/// is configured.
pub const DEFAULT_VIEW_PREFIX: &str = "/view/";

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub jenkins: JenkinsConfig,
    #[serde(default)]
    pub report: ReportConfig,
}

#[derive(Debug, Default, Deserialize)]
pub struct JenkinsConfig {
    /// Base URL of the Jenkins instance, e.g. "https://jenkins.example.com".
    #[serde(default)]
    pub url: Option<String>,
    /// Path inserted before each view-name segment. Plain setups keep the
    /// default "/view/"; deeply nested dashboards sometimes need more.
    #[serde(default)]
    pub view_prefix: Option<String>,
    /// Username for HTTP basic auth.
    #[serde(default)]
    pub username: Option<String>,
    /// API token used as the basic-auth password.
    #[serde(default)]
    pub api_token: Option<String>,
    /// Skip TLS certificate verification.
    #[serde(default)]
    pub insecure: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReportConfig {
    /// Only include jobs whose name starts with this prefix.
    #[serde(default)]
    pub job_prefix: Option<String>,
    /// Directory for generated report files; the system temp directory
    /// when unset.
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Load `path` if it exists, otherwise start from defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> Result<()> {
        let url = self.jenkins.url.as_deref().unwrap_or("");
        if url.is_empty() {
            bail!("No Jenkins URL configured. Set url under [jenkins] or pass --url.");
        }
        if !url.starts_with("http://") && !url.starts_with("https://") {
            bail!("Jenkins URL must start with http:// or https:// (got '{url}')");
        }
        Ok(())
    }

    /// Jenkins base URL without a trailing slash.
    pub fn base_url(&self) -> String {
        let url = self.jenkins.url.as_deref().unwrap_or("");
        url.trim_end_matches('/').to_string()
    }

    /// View prefix normalized to exactly one leading and one trailing slash.
    pub fn view_prefix(&self) -> String {
        let prefix = self
            .jenkins
            .view_prefix
            .as_deref()
            .unwrap_or(DEFAULT_VIEW_PREFIX);
        let trimmed = prefix.trim_matches('/');
        if trimmed.is_empty() {
            "/".to_string()
        } else {
            format!("/{trimmed}/")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_load_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
[jenkins]
url = "https://jenkins.example.com/"
username = "ci-bot"
api_token = "t0ken"
insecure = true

[report]
job_prefix = "team-"
output_dir = "/tmp/reports"
"#,
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(
            config.jenkins.url.as_deref(),
            Some("https://jenkins.example.com/")
        );
        assert_eq!(config.jenkins.username.as_deref(), Some("ci-bot"));
        assert_eq!(config.jenkins.api_token.as_deref(), Some("t0ken"));
        assert!(config.jenkins.insecure);
        assert_eq!(config.report.job_prefix.as_deref(), Some("team-"));
        assert_eq!(
            config.report.output_dir.as_deref(),
            Some(Path::new("/tmp/reports"))
        );
    }

    #[test]
    fn test_missing_sections_fall_back_to_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert!(config.jenkins.url.is_none());
        assert!(!config.jenkins.insecure);
        assert!(config.report.job_prefix.is_none());
    }

    #[test]
    fn test_load_or_default_without_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_or_default(&dir.path().join("absent.toml")).unwrap();
        assert!(config.jenkins.url.is_none());
    }

    #[test]
    fn test_validate_requires_url() {
        let config = Config::default();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_scheme() {
        let config = Config {
            jenkins: JenkinsConfig {
                url: Some("jenkins.example.com".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_base_url_drops_trailing_slash() {
        let config = Config {
            jenkins: JenkinsConfig {
                url: Some("https://jenkins.example.com/".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        assert_eq!(config.base_url(), "https://jenkins.example.com");
    }

    #[test]
    fn test_view_prefix_is_normalized() {
        let mut config = Config::default();
        assert_eq!(config.view_prefix(), "/view/");

        config.jenkins.view_prefix = Some("view".to_string());
        assert_eq!(config.view_prefix(), "/view/");

        config.jenkins.view_prefix = Some("/view/Nested/view/".to_string());
        assert_eq!(config.view_prefix(), "/view/Nested/view/");

        config.jenkins.view_prefix = Some("".to_string());
        assert_eq!(config.view_prefix(), "/");
    }
}
