//! AWS-backed implementations of the backup capabilities: Elastic Beanstalk for environments
//! and saved configurations, S3 for retrieving them.

pub mod beanstalk;
pub mod s3;

use aws_config::{BehaviorVersion, SdkConfig};
use aws_credential_types::provider::SharedCredentialsProvider;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::Region;
use ebsc_core::config::StaticCredentials;

pub use beanstalk::BeanstalkCatalog;
pub use s3::S3Store;

#[derive(Debug, Clone)]
pub struct AwsSettings {
    pub region: String,
    pub profile: Option<String>,
    pub endpoint: Option<String>,
    pub credentials: Option<StaticCredentials>,
}

/// Both remote capabilities, built from one shared SDK configuration.
#[derive(Debug, Clone)]
pub struct AwsPlatform {
    pub catalog: BeanstalkCatalog,
    pub store: S3Store,
}

impl AwsPlatform {
    pub async fn connect(settings: &AwsSettings) -> Self {
        let sdk_config = load_sdk_config(settings).await;
        Self {
            catalog: BeanstalkCatalog::new(&sdk_config),
            store: S3Store::new(&sdk_config, settings.endpoint.is_some()),
        }
    }
}

pub async fn load_sdk_config(settings: &AwsSettings) -> SdkConfig {
    let mut loader = aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new(settings.region.clone()));
    if let Some(profile) = &settings.profile {
        loader = loader.profile_name(profile);
    }
    if let Some(endpoint) = &settings.endpoint {
        loader = loader.endpoint_url(endpoint);
    }
    if let Some(creds) = &settings.credentials {
        let creds = Credentials::new(
            creds.access_key.clone(),
            creds.secret_key.clone(),
            None,
            None,
            "ebsc",
        );
        loader = loader.credentials_provider(SharedCredentialsProvider::new(creds));
    }
    loader.load().await
}
