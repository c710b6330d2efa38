//! Deterministic in-memory stand-ins for the platform and its storage.
//!
//! Creating a template on a [`FakeCatalog`] that publishes to a [`FakeObjectStore`] writes the
//! saved configuration at the key the real platform uses, so a run against the fakes goes
//! through the same snapshot-then-fetch sequence as a live one.

use crate::error::BackupError;
use crate::remote::{
    EnvironmentCatalog, EnvironmentRef, ObjectBody, ObjectStore, TemplateRef, TemplateRequest,
};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::io::{self, Cursor};
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, ReadBuf};

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>> {
    mutex.lock().map_err(|_| anyhow!("fake state lock poisoned"))
}

#[derive(Default)]
pub struct FakeObjectStore {
    buckets: Vec<String>,
    objects: Mutex<BTreeMap<(String, String), Vec<u8>>>,
    broken_bodies: HashSet<String>,
}

impl FakeObjectStore {
    pub fn new<I, S>(buckets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            buckets: buckets.into_iter().map(Into::into).collect(),
            objects: Mutex::new(BTreeMap::new()),
            broken_bodies: HashSet::new(),
        }
    }

    /// Reading the body of `key` yields the first half of the object, then a connection error.
    pub fn failing_body_for(mut self, key: impl Into<String>) -> Self {
        self.broken_bodies.insert(key.into());
        self
    }

    pub fn put_object(&self, bucket: &str, key: &str, body: impl Into<Vec<u8>>) -> Result<()> {
        if !self.buckets.iter().any(|b| b == bucket) {
            return Err(anyhow!("bucket does not exist: {bucket}"));
        }
        lock(&self.objects)?.insert((bucket.to_string(), key.to_string()), body.into());
        Ok(())
    }

    pub fn object(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        lock(&self.objects)
            .ok()?
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }
}

#[async_trait]
impl ObjectStore for FakeObjectStore {
    async fn list_buckets(&self) -> Result<Vec<String>> {
        Ok(self.buckets.clone())
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<ObjectBody> {
        if !self.buckets.iter().any(|b| b == bucket) {
            return Err(anyhow!("bucket does not exist: {bucket:?}"));
        }
        let body = lock(&self.objects)?
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
            .ok_or_else(|| BackupError::ObjectNotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            })?;
        if self.broken_bodies.contains(key) {
            let half = body.len() / 2;
            return Ok(Box::pin(TruncatedBody {
                remaining: body[..half].to_vec(),
            }));
        }
        Ok(Box::pin(Cursor::new(body)))
    }
}

struct TruncatedBody {
    remaining: Vec<u8>,
}

impl AsyncRead for TruncatedBody {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        if self.remaining.is_empty() {
            return Poll::Ready(Err(io::Error::new(
                io::ErrorKind::ConnectionReset,
                "connection reset while reading object body",
            )));
        }
        let n = self.remaining.len().min(buf.remaining());
        buf.put_slice(&self.remaining[..n]);
        self.remaining.drain(..n);
        Poll::Ready(Ok(()))
    }
}

pub struct FakeCatalog {
    environments: Vec<EnvironmentRef>,
    publish: Option<(Arc<FakeObjectStore>, String)>,
    failing: HashSet<String>,
    templates: Mutex<Vec<TemplateRequest>>,
}

impl FakeCatalog {
    pub fn new(environments: Vec<EnvironmentRef>) -> Self {
        Self {
            environments,
            publish: None,
            failing: HashSet::new(),
            templates: Mutex::new(Vec::new()),
        }
    }

    /// Saved configurations are written to `bucket` in `store` when a template is created.
    pub fn publishing_to(mut self, store: Arc<FakeObjectStore>, bucket: impl Into<String>) -> Self {
        self.publish = Some((store, bucket.into()));
        self
    }

    /// Template creation for this environment id fails as if the environment was gone.
    pub fn failing_for(mut self, environment_id: impl Into<String>) -> Self {
        self.failing.insert(environment_id.into());
        self
    }

    pub fn created_templates(&self) -> Vec<TemplateRequest> {
        lock(&self.templates).map(|t| t.clone()).unwrap_or_default()
    }

    pub fn saved_configuration(request: &TemplateRequest) -> String {
        format!(
            "ApplicationName: {}\nEnvironmentId: {}\nTemplateName: {}\nDescription: {}\n",
            request.application_name,
            request.environment_id,
            request.template_name,
            request.description
        )
    }
}

#[async_trait]
impl EnvironmentCatalog for FakeCatalog {
    async fn list_environments(&self) -> Result<Vec<EnvironmentRef>> {
        Ok(self.environments.clone())
    }

    async fn create_configuration_template(
        &self,
        request: &TemplateRequest,
    ) -> Result<TemplateRef> {
        if self.failing.contains(&request.environment_id)
            || !self
                .environments
                .iter()
                .any(|env| env.environment_id == request.environment_id)
        {
            return Err(anyhow!("no environment with id {}", request.environment_id));
        }

        let mut templates = lock(&self.templates)?;
        if templates.iter().any(|t| {
            t.application_name == request.application_name
                && t.template_name == request.template_name
        }) {
            return Err(anyhow!(
                "configuration template {} already exists for {}",
                request.template_name,
                request.application_name
            ));
        }

        if let Some((store, bucket)) = &self.publish {
            let key = format!(
                "resources/templates/{}/{}",
                request.application_name, request.template_name
            );
            store.put_object(bucket, &key, Self::saved_configuration(request))?;
        }
        templates.push(request.clone());

        Ok(TemplateRef {
            application_name: request.application_name.clone(),
            template_name: request.template_name.clone(),
        })
    }
}
