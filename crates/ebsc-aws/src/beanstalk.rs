use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_elasticbeanstalk::Client;
use ebsc_core::remote::{EnvironmentCatalog, EnvironmentRef, TemplateRef, TemplateRequest};
use tracing::warn;

#[derive(Debug, Clone)]
pub struct BeanstalkCatalog {
    client: Client,
}

impl BeanstalkCatalog {
    pub fn new(sdk_config: &SdkConfig) -> Self {
        Self {
            client: Client::new(sdk_config),
        }
    }
}

#[async_trait]
impl EnvironmentCatalog for BeanstalkCatalog {
    async fn list_environments(&self) -> Result<Vec<EnvironmentRef>> {
        let mut environments = Vec::new();
        let mut next_token: Option<String> = None;
        loop {
            let output = self
                .client
                .describe_environments()
                .include_deleted(false)
                .set_next_token(next_token.take())
                .send()
                .await
                .context("failed to describe environments")?;

            for env in output.environments() {
                match (env.application_name(), env.environment_name(), env.environment_id()) {
                    (Some(application), Some(name), Some(id)) => {
                        environments.push(EnvironmentRef::new(application, name, id));
                    }
                    _ => warn!(?env, "skipping environment without name or id"),
                }
            }

            match output.next_token() {
                Some(token) if !token.is_empty() => next_token = Some(token.to_string()),
                _ => break,
            }
        }
        Ok(environments)
    }

    async fn create_configuration_template(
        &self,
        request: &TemplateRequest,
    ) -> Result<TemplateRef> {
        let output = self
            .client
            .create_configuration_template()
            .application_name(&request.application_name)
            .environment_id(&request.environment_id)
            .template_name(&request.template_name)
            .description(&request.description)
            .send()
            .await
            .with_context(|| {
                format!(
                    "failed to create configuration template {}",
                    request.template_name
                )
            })?;

        Ok(TemplateRef {
            application_name: output
                .application_name()
                .unwrap_or(request.application_name.as_str())
                .to_string(),
            template_name: output
                .template_name()
                .unwrap_or(request.template_name.as_str())
                .to_string(),
        })
    }
}
