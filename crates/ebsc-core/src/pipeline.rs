use crate::artifact::FetchedArtifact;
use crate::error::BackupError;
use crate::remote::{
    EnvironmentCatalog, EnvironmentRef, ObjectBody, ObjectStore, TemplateRef, TemplateRequest,
};
use crate::run::{template_key, template_name};
use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::io::ErrorKind;
use std::path::Path;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, info, warn};

/// Saves an environment's configuration on the platform and pulls the result down.
pub struct SnapshotPipeline<'a> {
    catalog: &'a dyn EnvironmentCatalog,
    store: &'a dyn ObjectStore,
    tool: String,
    region: String,
}

impl<'a> SnapshotPipeline<'a> {
    pub fn new(
        catalog: &'a dyn EnvironmentCatalog,
        store: &'a dyn ObjectStore,
        tool: impl Into<String>,
        region: impl Into<String>,
    ) -> Self {
        Self {
            catalog,
            store,
            tool: tool.into(),
            region: region.into(),
        }
    }

    pub fn bucket_filter(&self) -> String {
        format!("elasticbeanstalk-{}", self.region)
    }

    pub async fn snapshot(&self, env: &EnvironmentRef) -> Result<TemplateRef> {
        let request = TemplateRequest {
            application_name: env.application_name.clone(),
            environment_id: env.environment_id.clone(),
            template_name: template_name(&self.tool, &env.environment_name),
            description: format!("created by {}", self.tool),
        };
        let template = self
            .catalog
            .create_configuration_template(&request)
            .await
            .with_context(|| {
                format!(
                    "failed to save configuration of {} as {}",
                    env.environment_name, request.template_name
                )
            })?;
        info!(
            environment = %env.environment_name,
            template = %template.template_name,
            "saved configuration template"
        );
        Ok(template)
    }

    /// Picks the platform's storage bucket for the configured region; the last listed match wins.
    pub async fn resolve_bucket(&self) -> Result<String> {
        let filter = self.bucket_filter();
        let buckets = self
            .store
            .list_buckets()
            .await
            .context("failed to list buckets")?;
        let matched = buckets.into_iter().filter(|name| name.contains(&filter)).last();
        let bucket = matched.ok_or(BackupError::BucketNotFound { filter })?;
        debug!(bucket = %bucket, "resolved configuration bucket");
        Ok(bucket)
    }

    /// Downloads the saved configuration to `<dest_dir>/<environment_name>`.
    ///
    /// The body lands in a hidden `.partial` file first and replaces the destination only once
    /// it was read completely, so a failed download never leaves a truncated artifact behind.
    pub async fn fetch(
        &self,
        application_name: &str,
        environment_name: &str,
        dest_dir: &Path,
    ) -> Result<FetchedArtifact> {
        let bucket = self.resolve_bucket().await?;
        let key = template_key(&self.tool, application_name, environment_name);
        let body = self.store.get_object(&bucket, &key).await?;

        let path = dest_dir.join(environment_name);
        let partial = dest_dir.join(format!(".{environment_name}.partial"));
        let (bytes, sha256) = match stream_to_file(body, &partial).await {
            Ok(written) => written,
            Err(err) => {
                remove_partial(&partial).await;
                return Err(err.context(format!("failed to download s3://{bucket}/{key}")));
            }
        };
        if let Err(err) = tokio::fs::rename(&partial, &path).await {
            remove_partial(&partial).await;
            return Err(err).with_context(|| {
                format!("failed to move download into place: {}", path.display())
            });
        }

        info!(
            environment = %environment_name,
            path = %path.display(),
            bytes,
            "fetched configuration"
        );
        Ok(FetchedArtifact {
            path,
            bytes,
            sha256,
        })
    }

    /// Snapshot followed by fetch for one environment.
    pub async fn backup(&self, env: &EnvironmentRef, dest_dir: &Path) -> Result<FetchedArtifact> {
        let template = self.snapshot(env).await?;
        self.fetch(&template.application_name, &env.environment_name, dest_dir)
            .await
    }
}

/// Copies the body into `path`, returning the byte count and SHA-256 of what was written.
async fn stream_to_file(mut body: ObjectBody, path: &Path) -> Result<(u64, String)> {
    let mut file = tokio::fs::File::create(path)
        .await
        .with_context(|| format!("failed to create download file: {}", path.display()))?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; 8192];
    let mut bytes = 0u64;
    loop {
        let read = body
            .read(&mut buf)
            .await
            .context("failed to read object body")?;
        if read == 0 {
            break;
        }
        hasher.update(&buf[..read]);
        file.write_all(&buf[..read])
            .await
            .with_context(|| format!("failed to write downloaded file: {}", path.display()))?;
        bytes += read as u64;
    }
    file.flush()
        .await
        .with_context(|| format!("failed to flush downloaded file: {}", path.display()))?;
    file.sync_all()
        .await
        .with_context(|| format!("failed to sync downloaded file: {}", path.display()))?;
    Ok((bytes, format!("{:x}", hasher.finalize())))
}

async fn remove_partial(path: &Path) {
    if let Err(err) = tokio::fs::remove_file(path).await {
        if err.kind() != ErrorKind::NotFound {
            warn!(path = %path.display(), error = %err, "failed to remove partial download");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::{FakeCatalog, FakeObjectStore};
    use std::sync::Arc;
    use tempfile::tempdir;

    const BUCKET: &str = "elasticbeanstalk-us-east-1-123456789012";
    const KEY: &str = "resources/templates/App1/ebsc-env1-dev";

    fn env() -> EnvironmentRef {
        EnvironmentRef::new("App1", "env1-dev", "e-1")
    }

    #[tokio::test]
    async fn snapshot_requests_tool_named_template() {
        let store = Arc::new(FakeObjectStore::new([BUCKET]));
        let catalog = FakeCatalog::new(vec![env()]).publishing_to(store.clone(), BUCKET);
        let pipeline = SnapshotPipeline::new(&catalog, &*store, "ebsc", "us-east-1");

        let template = pipeline.snapshot(&env()).await.unwrap();
        assert_eq!(template.template_name, "ebsc-env1-dev");

        let created = catalog.created_templates();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].environment_id, "e-1");
        assert_eq!(created[0].description, "created by ebsc");
    }

    #[tokio::test]
    async fn duplicate_template_is_surfaced() {
        let store = Arc::new(FakeObjectStore::new([BUCKET]));
        let catalog = FakeCatalog::new(vec![env()]).publishing_to(store.clone(), BUCKET);
        let pipeline = SnapshotPipeline::new(&catalog, &*store, "ebsc", "us-east-1");

        pipeline.snapshot(&env()).await.unwrap();
        let err = pipeline.snapshot(&env()).await.unwrap_err();
        assert!(format!("{err:#}").contains("already exists"));
    }

    #[tokio::test]
    async fn backup_writes_saved_configuration_to_directory() {
        let tmp = tempdir().unwrap();
        let store = Arc::new(FakeObjectStore::new(["unrelated", BUCKET]));
        let catalog = FakeCatalog::new(vec![env()]).publishing_to(store.clone(), BUCKET);
        let pipeline = SnapshotPipeline::new(&catalog, &*store, "ebsc", "us-east-1");

        let artifact = pipeline.backup(&env(), tmp.path()).await.unwrap();
        assert_eq!(artifact.path, tmp.path().join("env1-dev"));

        let expected = store.object(BUCKET, KEY).unwrap();
        assert_eq!(std::fs::read(&artifact.path).unwrap(), expected);
        assert_eq!(artifact.bytes, expected.len() as u64);
        assert_eq!(artifact.sha256, format!("{:x}", Sha256::digest(&expected)));
        assert!(!tmp.path().join(".env1-dev.partial").exists());
    }

    #[tokio::test]
    async fn fetch_overwrites_existing_file() {
        let tmp = tempdir().unwrap();
        std::fs::write(tmp.path().join("env1-dev"), vec![b'x'; 4096]).unwrap();
        let store = FakeObjectStore::new([BUCKET]);
        store.put_object(BUCKET, KEY, "short").unwrap();
        let catalog = FakeCatalog::new(vec![env()]);
        let pipeline = SnapshotPipeline::new(&catalog, &store, "ebsc", "us-east-1");

        pipeline.fetch("App1", "env1-dev", tmp.path()).await.unwrap();
        assert_eq!(std::fs::read(tmp.path().join("env1-dev")).unwrap(), b"short");
    }

    #[tokio::test]
    async fn interrupted_fetch_keeps_previous_artifact() {
        let tmp = tempdir().unwrap();
        std::fs::write(tmp.path().join("env1-dev"), b"previous run").unwrap();
        let store = FakeObjectStore::new([BUCKET]).failing_body_for(KEY);
        store.put_object(BUCKET, KEY, "new configuration").unwrap();
        let catalog = FakeCatalog::new(vec![env()]);
        let pipeline = SnapshotPipeline::new(&catalog, &store, "ebsc", "us-east-1");

        let err = pipeline.fetch("App1", "env1-dev", tmp.path()).await.unwrap_err();
        assert!(format!("{err:#}").contains("failed to read object body"));
        assert_eq!(
            std::fs::read(tmp.path().join("env1-dev")).unwrap(),
            b"previous run"
        );
        assert!(!tmp.path().join(".env1-dev.partial").exists());
    }

    #[tokio::test]
    async fn interrupted_fetch_leaves_no_file() {
        let tmp = tempdir().unwrap();
        let store = FakeObjectStore::new([BUCKET]).failing_body_for(KEY);
        store.put_object(BUCKET, KEY, "new configuration").unwrap();
        let catalog = FakeCatalog::new(vec![env()]);
        let pipeline = SnapshotPipeline::new(&catalog, &store, "ebsc", "us-east-1");

        pipeline.fetch("App1", "env1-dev", tmp.path()).await.unwrap_err();
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn fetch_without_region_bucket_is_not_found() {
        let tmp = tempdir().unwrap();
        let store = FakeObjectStore::new(["elasticbeanstalk-eu-west-1-123456789012"]);
        let catalog = FakeCatalog::new(vec![env()]);
        let pipeline = SnapshotPipeline::new(&catalog, &store, "ebsc", "us-east-1");

        let err = pipeline.fetch("App1", "env1-dev", tmp.path()).await.unwrap_err();
        assert_eq!(
            err.downcast_ref::<BackupError>(),
            Some(&BackupError::BucketNotFound {
                filter: "elasticbeanstalk-us-east-1".to_string()
            })
        );
        assert!(!tmp.path().join("env1-dev").exists());
    }

    #[tokio::test]
    async fn fetch_of_missing_key_is_not_found() {
        let tmp = tempdir().unwrap();
        let store = FakeObjectStore::new([BUCKET]);
        let catalog = FakeCatalog::new(vec![env()]);
        let pipeline = SnapshotPipeline::new(&catalog, &store, "ebsc", "us-east-1");

        let err = pipeline.fetch("App1", "env1-dev", tmp.path()).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<BackupError>(),
            Some(BackupError::ObjectNotFound { .. })
        ));
    }
}
