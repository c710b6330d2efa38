use anyhow::Result;
use clap::{Parser, ValueEnum};
use ebsc_aws::{AwsPlatform, AwsSettings};
use ebsc_core::config::Config;
use ebsc_core::environments::Tier;
use ebsc_core::{run_backup, BackupSettings, FailurePolicy, RunContext, RunEvent};
use std::path::PathBuf;
use std::process;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "ebsc",
    version,
    about = "Back up Elastic Beanstalk environment configurations"
)]
struct Cli {
    /// Environment tier to back up; matched as a substring of environment names
    #[arg(long, value_enum, default_value = "dev")]
    env: TierArg,
    /// AWS region of the environments [default: us-east-1]
    #[arg(long)]
    region: Option<String>,
    /// Optional TOML settings file
    #[arg(long)]
    config: Option<PathBuf>,
    /// Directory receiving the per-application backups [default: ./backup]
    #[arg(long)]
    backup_root: Option<PathBuf>,
    /// Keep backing up the remaining environments when one fails
    #[arg(long)]
    keep_going: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum TierArg {
    Dev,
    Qa,
    Prod,
}

impl From<TierArg> for Tier {
    fn from(arg: TierArg) -> Self {
        match arg {
            TierArg::Dev => Tier::Dev,
            TierArg::Qa => Tier::Qa,
            TierArg::Prod => Tier::Prod,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) if err.use_stderr() => {
            let _ = err.print();
            process::exit(1);
        }
        Err(err) => err.exit(),
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cfg = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    let region = cli.region.clone().unwrap_or_else(|| cfg.region().to_string());
    if region.is_empty() {
        eprintln!("invalid region");
        process::exit(1);
    }

    backup(&cli, &cfg, region).await
}

async fn backup(cli: &Cli, cfg: &Config, region: String) -> Result<()> {
    let credentials = cfg.aws.static_credentials()?;
    let tier = Tier::from(cli.env);

    println!("starting backup");
    let run = RunContext::now()?;

    let platform = AwsPlatform::connect(&AwsSettings {
        region: region.clone(),
        profile: cfg.aws.profile.clone(),
        endpoint: cfg.aws.endpoint.clone(),
        credentials,
    })
    .await;

    let settings = BackupSettings {
        root: cli.backup_root.clone().unwrap_or_else(|| cfg.backup_root()),
        work_dir: cfg.work_dir(),
        tool: cfg.tool().to_string(),
        region,
        filter: tier.as_str().to_string(),
        policy: if cli.keep_going {
            FailurePolicy::ContinueOnError
        } else {
            FailurePolicy::FailFast
        },
    };

    debug!(?settings, timestamp = run.timestamp(), "resolved backup settings");
    let policy = settings.policy;
    let outcome = run_backup(
        &run,
        &settings,
        &platform.catalog,
        &platform.store,
        |event| print_progress(&event, policy),
    )
    .await?;

    println!("backup has been completed");
    println!("archive: {}", outcome.archive.display());
    println!("report: {}", outcome.report.display());
    Ok(())
}

fn print_progress(event: &RunEvent<'_>, policy: FailurePolicy) {
    let Some(line) = progress_line(event, policy) else {
        return;
    };
    match event {
        RunEvent::Failed(..) => eprintln!("{line}"),
        _ => println!("{line}"),
    }
}

/// Fail-fast errors are printed once, by `main`.
fn progress_line(event: &RunEvent<'_>, policy: FailurePolicy) -> Option<String> {
    match event {
        RunEvent::Started(env) => Some(format!("creating a backup for {:?}", env.environment_name)),
        RunEvent::Finished(env, _) => Some(format!(
            "backup has been created for {:?}",
            env.environment_name
        )),
        RunEvent::Failed(env, err) => match policy {
            FailurePolicy::ContinueOnError => Some(format!(
                "backup failed for {:?}: {err:#}",
                env.environment_name
            )),
            FailurePolicy::FailFast => None,
        },
    }
}
