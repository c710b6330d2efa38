use crate::error::BackupError;
use anyhow::{Context, Result};
use time::format_description::FormatItem;
use time::macros::format_description;
use time::OffsetDateTime;

const TIMESTAMP_FORMAT: &[FormatItem<'static>] =
    format_description!("[year][month][day][hour][minute][second]");

pub const TIMESTAMP_LEN: usize = 14;
pub const ARCHIVE_EXTENSION: &str = "tar.gz";

/// The single timestamp every name produced during one invocation is derived from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunContext {
    timestamp: String,
}

impl RunContext {
    /// Reads the clock once. Call this exactly once per run and hand the value around.
    pub fn now() -> Result<Self> {
        Self::at(OffsetDateTime::now_utc())
    }

    pub fn at(when: OffsetDateTime) -> Result<Self> {
        let timestamp = when
            .format(TIMESTAMP_FORMAT)
            .context("failed to format run timestamp")?;
        Ok(Self { timestamp })
    }

    pub fn from_timestamp(timestamp: &str) -> Result<Self, BackupError> {
        if timestamp.len() != TIMESTAMP_LEN || !timestamp.chars().all(|c| c.is_ascii_digit()) {
            return Err(BackupError::InvalidTimestamp(timestamp.to_string()));
        }
        Ok(Self {
            timestamp: timestamp.to_string(),
        })
    }

    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    pub fn directory_name(&self, prefix: &str) -> String {
        directory_name(prefix, &self.timestamp)
    }

    pub fn archive_name(&self) -> String {
        format!("backup-{}.{ARCHIVE_EXTENSION}", self.timestamp)
    }

    pub fn report_name(&self) -> String {
        format!("backup-{}.tsv", self.timestamp)
    }
}

pub fn directory_name(prefix: &str, timestamp: &str) -> String {
    format!("{prefix}-backup-{timestamp}")
}

pub fn template_name(tool: &str, environment_name: &str) -> String {
    format!("{tool}-{environment_name}")
}

/// Where the platform stores a saved configuration inside its storage bucket.
pub fn template_key(tool: &str, application_name: &str, environment_name: &str) -> String {
    format!(
        "resources/templates/{application_name}/{}",
        template_name(tool, environment_name)
    )
}
