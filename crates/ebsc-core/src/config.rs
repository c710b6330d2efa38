use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_BACKUP_ROOT: &str = "./backup";
pub const DEFAULT_WORK_DIR: &str = ".";
pub const DEFAULT_TOOL: &str = "ebsc";
pub const DEFAULT_REGION: &str = "us-east-1";

/// Optional settings file; anything left out falls back to the built-in defaults.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub backup: Backup,
    #[serde(default)]
    pub aws: Aws,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Backup {
    pub root: Option<String>,
    pub work_dir: Option<String>,
    pub tool: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Aws {
    pub region: Option<String>,
    pub profile: Option<String>,
    pub endpoint: Option<String>,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticCredentials {
    pub access_key: String,
    pub secret_key: String,
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = fs::read_to_string(&path)
            .with_context(|| format!("failed to read config: {}", path.as_ref().display()))?;
        let cfg = toml::from_str(&contents)
            .with_context(|| format!("failed to parse config: {}", path.as_ref().display()))?;
        Ok(cfg)
    }

    pub fn backup_root(&self) -> PathBuf {
        PathBuf::from(self.backup.root.as_deref().unwrap_or(DEFAULT_BACKUP_ROOT))
    }

    pub fn work_dir(&self) -> PathBuf {
        PathBuf::from(self.backup.work_dir.as_deref().unwrap_or(DEFAULT_WORK_DIR))
    }

    pub fn tool(&self) -> &str {
        self.backup.tool.as_deref().unwrap_or(DEFAULT_TOOL)
    }

    pub fn region(&self) -> &str {
        self.aws.region.as_deref().unwrap_or(DEFAULT_REGION)
    }
}

impl Aws {
    pub fn static_credentials(&self) -> Result<Option<StaticCredentials>> {
        match (&self.access_key, &self.secret_key) {
            (Some(access_key), Some(secret_key)) => Ok(Some(StaticCredentials {
                access_key: access_key.clone(),
                secret_key: secret_key.clone(),
            })),
            (None, None) => Ok(None),
            _ => Err(anyhow!("aws.access_key and aws.secret_key must be set together")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_sections_use_defaults() {
        let cfg: Config = toml::from_str("").unwrap();
        assert_eq!(cfg.backup_root(), PathBuf::from("./backup"));
        assert_eq!(cfg.work_dir(), PathBuf::from("."));
        assert_eq!(cfg.tool(), "ebsc");
        assert_eq!(cfg.region(), "us-east-1");
        assert_eq!(cfg.aws.static_credentials().unwrap(), None);
    }

    #[test]
    fn loads_file_values() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("ebsc.toml");
        fs::write(
            &path,
            r#"
[backup]
root = "/srv/backup"
tool = "nightly"

[aws]
region = "eu-west-1"
access_key = "AKIA"
secret_key = "secret"
"#,
        )
        .unwrap();

        let cfg = Config::load(&path).unwrap();
        assert_eq!(cfg.backup_root(), PathBuf::from("/srv/backup"));
        assert_eq!(cfg.tool(), "nightly");
        assert_eq!(cfg.region(), "eu-west-1");
        assert_eq!(
            cfg.aws.static_credentials().unwrap(),
            Some(StaticCredentials {
                access_key: "AKIA".to_string(),
                secret_key: "secret".to_string(),
            })
        );
    }

    #[test]
    fn half_configured_credentials_are_rejected() {
        let cfg: Config = toml::from_str("[aws]\naccess_key = \"AKIA\"\n").unwrap();
        assert!(cfg.aws.static_credentials().is_err());
    }

    #[test]
    fn unreadable_config_names_the_path() {
        let err = Config::load("/nonexistent/ebsc.toml").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/ebsc.toml"));
    }
}
