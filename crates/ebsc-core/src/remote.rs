//! Capabilities the backup run needs from the platform and its object storage.
//!
//! `ebsc-aws` provides the network-backed implementations; [`crate::fake`] provides
//! deterministic in-memory ones.

use anyhow::Result;
use async_trait::async_trait;
use std::pin::Pin;
use tokio::io::AsyncRead;

/// A deployed environment selected for backup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentRef {
    pub application_name: String,
    pub environment_name: String,
    pub environment_id: String,
}

impl EnvironmentRef {
    pub fn new(
        application_name: impl Into<String>,
        environment_name: impl Into<String>,
        environment_id: impl Into<String>,
    ) -> Self {
        Self {
            application_name: application_name.into(),
            environment_name: environment_name.into(),
            environment_id: environment_id.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateRequest {
    pub application_name: String,
    pub environment_id: String,
    pub template_name: String,
    pub description: String,
}

/// Server-side saved configuration created for one environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateRef {
    pub application_name: String,
    pub template_name: String,
}

#[async_trait]
pub trait EnvironmentCatalog: Send + Sync {
    /// Every live environment, in the order the platform reports them.
    async fn list_environments(&self) -> Result<Vec<EnvironmentRef>>;

    async fn create_configuration_template(&self, request: &TemplateRequest) -> Result<TemplateRef>;
}

pub type ObjectBody = Pin<Box<dyn AsyncRead + Send>>;

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn list_buckets(&self) -> Result<Vec<String>>;

    /// Opens the object body for streaming. A missing key is reported as
    /// [`crate::BackupError::ObjectNotFound`].
    async fn get_object(&self, bucket: &str, key: &str) -> Result<ObjectBody>;
}
