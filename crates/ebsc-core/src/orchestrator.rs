use crate::artifact::FetchedArtifact;
use crate::dirs::DirectoryManager;
use crate::environments::{discover, filter};
use crate::error::BackupError;
use crate::pipeline::SnapshotPipeline;
use crate::remote::{EnvironmentCatalog, EnvironmentRef, ObjectStore};
use crate::report::{BackupStatus, EnvironmentRecord, RunReport};
use crate::run::RunContext;
use anyhow::Result;
use std::path::PathBuf;
use tracing::{info, warn};

/// What to do when one environment cannot be backed up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Stop the run at the first failure; no archive is produced.
    #[default]
    FailFast,
    /// Record the failure, back up the remaining environments, archive, then fail the run.
    ContinueOnError,
}

#[derive(Debug, Clone)]
pub struct BackupSettings {
    pub root: PathBuf,
    pub work_dir: PathBuf,
    pub tool: String,
    pub region: String,
    pub filter: String,
    pub policy: FailurePolicy,
}

/// Progress notifications for whoever drives the run.
#[derive(Debug)]
pub enum RunEvent<'a> {
    Started(&'a EnvironmentRef),
    Finished(&'a EnvironmentRef, &'a FetchedArtifact),
    Failed(&'a EnvironmentRef, &'a anyhow::Error),
}

#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub archive: PathBuf,
    pub report: PathBuf,
    pub records: Vec<EnvironmentRecord>,
}

/// Runs one backup: discovery and filtering, then snapshot and fetch for every match in
/// discovery order, then a single archive of the backup root.
pub async fn run_backup(
    run: &RunContext,
    settings: &BackupSettings,
    catalog: &dyn EnvironmentCatalog,
    store: &dyn ObjectStore,
    mut on_event: impl FnMut(RunEvent<'_>),
) -> Result<RunOutcome> {
    if settings.region.is_empty() {
        return Err(BackupError::InvalidRegion.into());
    }

    let environments = discover(catalog).await?;
    let matches = filter(&environments, &settings.filter)?;
    info!(
        filter = %settings.filter,
        matched = matches.len(),
        timestamp = run.timestamp(),
        "starting backup run"
    );

    let mut dirs = DirectoryManager::new(&settings.root, &settings.work_dir, run);
    let pipeline = SnapshotPipeline::new(
        catalog,
        store,
        settings.tool.as_str(),
        settings.region.as_str(),
    );
    let report = RunReport::new(settings.work_dir.join(run.report_name()));

    let mut records = Vec::with_capacity(matches.len());
    let mut failed = 0;
    for env in &matches {
        on_event(RunEvent::Started(env));
        let result = match dirs.resolve(&env.application_name) {
            Ok(dir) => pipeline.backup(env, &dir.path).await,
            Err(err) => Err(err),
        };

        match result {
            Ok(artifact) => {
                on_event(RunEvent::Finished(env, &artifact));
                records.push(succeeded(run, env, &artifact));
            }
            Err(err) => {
                on_event(RunEvent::Failed(env, &err));
                records.push(failed_record(run, env, &err));
                failed += 1;
                match settings.policy {
                    FailurePolicy::FailFast => {
                        write_report_after_failure(&report, &records);
                        return Err(err);
                    }
                    FailurePolicy::ContinueOnError => {
                        warn!(
                            environment = %env.environment_name,
                            error = %format!("{err:#}"),
                            "backup failed, continuing"
                        );
                    }
                }
            }
        }
    }

    let archive = match dirs.archive() {
        Ok(path) => path,
        Err(err) => {
            write_report_after_failure(&report, &records);
            return Err(err);
        }
    };
    report.write_records(&records)?;

    if failed > 0 {
        return Err(BackupError::EnvironmentsFailed {
            failed,
            total: matches.len(),
        }
        .into());
    }

    Ok(RunOutcome {
        archive,
        report: report.path().to_path_buf(),
        records,
    })
}

fn write_report_after_failure(report: &RunReport, records: &[EnvironmentRecord]) {
    if let Err(err) = report.write_records(records) {
        warn!(
            path = %report.path().display(),
            error = %format!("{err:#}"),
            "failed to write run report"
        );
    }
}

fn succeeded(
    run: &RunContext,
    env: &EnvironmentRef,
    artifact: &FetchedArtifact,
) -> EnvironmentRecord {
    EnvironmentRecord {
        ts: run.timestamp().to_string(),
        application: env.application_name.clone(),
        environment: env.environment_name.clone(),
        environment_id: env.environment_id.clone(),
        status: BackupStatus::Succeeded,
        bytes: artifact.bytes,
        sha256: artifact.sha256.clone(),
        local_path: artifact.path.to_string_lossy().to_string(),
        error: String::new(),
    }
}

fn failed_record(
    run: &RunContext,
    env: &EnvironmentRef,
    err: &anyhow::Error,
) -> EnvironmentRecord {
    EnvironmentRecord {
        ts: run.timestamp().to_string(),
        application: env.application_name.clone(),
        environment: env.environment_name.clone(),
        environment_id: env.environment_id.clone(),
        status: BackupStatus::Failed,
        bytes: 0,
        sha256: String::new(),
        local_path: String::new(),
        error: format!("{err:#}"),
    }
}
