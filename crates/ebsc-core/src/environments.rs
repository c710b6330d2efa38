use crate::error::BackupError;
use crate::remote::{EnvironmentCatalog, EnvironmentRef};
use anyhow::{Context, Result};
use std::fmt;
use tracing::info;

/// Deployment tier used to pick environments by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Dev,
    Qa,
    Prod,
}

impl Tier {
    pub fn as_str(self) -> &'static str {
        match self {
            Tier::Dev => "dev",
            Tier::Qa => "qa",
            Tier::Prod => "prod",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub async fn discover(catalog: &dyn EnvironmentCatalog) -> Result<Vec<EnvironmentRef>> {
    let environments = catalog
        .list_environments()
        .await
        .context("failed to list environments")?;
    if environments.is_empty() {
        return Err(BackupError::NoEnvironments.into());
    }
    info!(count = environments.len(), "discovered environments");
    Ok(environments)
}

/// Keeps environments whose name contains `filter`, in discovery order.
pub fn filter(
    environments: &[EnvironmentRef],
    filter: &str,
) -> Result<Vec<EnvironmentRef>, BackupError> {
    let matches: Vec<EnvironmentRef> = environments
        .iter()
        .filter(|env| env.environment_name.contains(filter))
        .cloned()
        .collect();
    if matches.is_empty() {
        return Err(BackupError::NoMatches {
            filter: filter.to_string(),
        });
    }
    Ok(matches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::FakeCatalog;

    fn envs(names: &[&str]) -> Vec<EnvironmentRef> {
        names
            .iter()
            .enumerate()
            .map(|(i, name)| EnvironmentRef::new("app1", *name, format!("e-{i}")))
            .collect()
    }

    #[test]
    fn filter_matches_substrings_and_keeps_order() {
        let all = envs(&["api-development", "api-qa", "web-dev", "web-prod"]);
        let matched: Vec<String> = filter(&all, Tier::Dev.as_str())
            .unwrap()
            .into_iter()
            .map(|env| env.environment_name)
            .collect();
        assert_eq!(matched, vec!["api-development", "web-dev"]);
    }

    #[test]
    fn filter_without_matches_is_an_error() {
        let all = envs(&["api-qa", "web-prod"]);
        assert_eq!(
            filter(&all, "dev"),
            Err(BackupError::NoMatches {
                filter: "dev".to_string()
            })
        );
        assert_eq!(
            filter(&[], "dev"),
            Err(BackupError::NoMatches {
                filter: "dev".to_string()
            })
        );
    }

    #[tokio::test]
    async fn discover_rejects_empty_listing() {
        let catalog = FakeCatalog::new(Vec::new());
        let err = discover(&catalog).await.unwrap_err();
        assert_eq!(
            err.downcast_ref::<BackupError>(),
            Some(&BackupError::NoEnvironments)
        );
    }

    #[tokio::test]
    async fn discover_returns_platform_order() {
        let catalog = FakeCatalog::new(envs(&["b-dev", "a-dev"]));
        let found = discover(&catalog).await.unwrap();
        assert_eq!(found[0].environment_name, "b-dev");
        assert_eq!(found[1].environment_name, "a-dev");
    }
}
