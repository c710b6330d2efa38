//! Backup of Elastic Beanstalk environment configurations.
//!
//! A run discovers the environments whose name matches a tier, saves each one's
//! configuration as a template on the platform, downloads the saved template into a
//! per-application directory under the backup root, and finally packs the backup root
//! into a single `backup-<timestamp>.tar.gz`.

pub mod artifact;
pub mod config;
pub mod dirs;
pub mod environments;
pub mod error;
pub mod fake;
pub mod orchestrator;
pub mod pipeline;
pub mod remote;
pub mod report;
pub mod run;

pub use error::BackupError;
pub use orchestrator::{run_backup, BackupSettings, FailurePolicy, RunEvent, RunOutcome};
pub use remote::{EnvironmentCatalog, EnvironmentRef, ObjectStore};
pub use run::RunContext;
