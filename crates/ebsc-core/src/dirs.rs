use crate::run::{RunContext, TIMESTAMP_LEN};
use anyhow::{anyhow, Context, Result};
use flate2::write::GzEncoder;
use flate2::Compression;
use std::collections::HashMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tar::Builder;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Per-application directory holding every artifact of that application for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupDirectory {
    pub application_key: String,
    pub path: PathBuf,
}

pub fn application_key(application_name: &str) -> String {
    application_name.to_lowercase()
}

/// Owns the backup root for the duration of a run.
///
/// Directories are allocated lazily: the first environment of an application creates
/// `<key>-backup-<timestamp>`, later environments of the same application get the same path
/// back. The filesystem stays the source of truth for directories left by earlier runs.
pub struct DirectoryManager {
    root: PathBuf,
    work_dir: PathBuf,
    run: RunContext,
    resolved: HashMap<String, PathBuf>,
}

impl DirectoryManager {
    pub fn new(root: impl AsRef<Path>, work_dir: impl AsRef<Path>, run: &RunContext) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            work_dir: work_dir.as_ref().to_path_buf(),
            run: run.clone(),
            resolved: HashMap::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn archive_path(&self) -> PathBuf {
        self.work_dir.join(self.run.archive_name())
    }

    /// Looks for an existing `<key>-backup-<timestamp>` directory under the root, creating
    /// the root itself when it is missing. The newest match wins when there are several.
    pub fn exists(&self, application_key: &str) -> Result<Option<PathBuf>> {
        if !self.root.exists() {
            ensure_dir(&self.root)?;
            return Ok(None);
        }

        let prefix = format!("{}-backup-", application_key.to_lowercase());
        let entries = fs::read_dir(&self.root)
            .with_context(|| format!("failed to list backup root: {}", self.root.display()))?;

        let mut newest: Option<String> = None;
        for entry in entries {
            let entry = entry
                .with_context(|| format!("failed to list backup root: {}", self.root.display()))?;
            let file_type = entry
                .file_type()
                .with_context(|| format!("failed to inspect {}", entry.path().display()))?;
            if !file_type.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if !is_backup_directory_name(&name, &prefix) {
                continue;
            }
            if newest.as_ref().map_or(true, |current| name > *current) {
                newest = Some(name);
            }
        }

        Ok(newest.map(|name| self.root.join(name)))
    }

    pub fn create(&self, application_key: &str) -> Result<PathBuf> {
        let path = self
            .root
            .join(self.run.directory_name(&application_key.to_lowercase()));
        ensure_dir(&path)?;
        Ok(path)
    }

    /// Returns the directory for `application_name`, reusing one resolved earlier in this
    /// run, then one found on disk, and creating it only when neither exists.
    pub fn resolve(&mut self, application_name: &str) -> Result<BackupDirectory> {
        let key = application_key(application_name);
        if let Some(path) = self.resolved.get(&key) {
            debug!(application = %key, path = %path.display(), "reusing directory from this run");
            return Ok(BackupDirectory {
                application_key: key,
                path: path.clone(),
            });
        }

        let path = match self.exists(&key)? {
            Some(path) => {
                debug!(application = %key, path = %path.display(), "reusing existing directory");
                path
            }
            None => {
                let path = self.create(&key)?;
                info!(application = %key, path = %path.display(), "created backup directory");
                path
            }
        };

        self.resolved.insert(key.clone(), path.clone());
        Ok(BackupDirectory {
            application_key: key,
            path,
        })
    }

    /// Packs every file under the backup root into `backup-<timestamp>.tar.gz` in the work
    /// directory. The archive only appears under its final name once it is complete.
    pub fn archive(&self) -> Result<PathBuf> {
        let archive_path = self.archive_path();
        let partial_path = self
            .work_dir
            .join(format!("{}.partial", self.run.archive_name()));

        match write_archive(&self.root, &partial_path) {
            Ok(entries) => {
                fs::rename(&partial_path, &archive_path).with_context(|| {
                    format!("failed to move archive into place: {}", archive_path.display())
                })?;
                info!(archive = %archive_path.display(), entries, "archived backup root");
                Ok(archive_path)
            }
            Err(err) => {
                cleanup_partial_archive(&partial_path);
                Err(err)
            }
        }
    }
}

fn is_backup_directory_name(name: &str, prefix: &str) -> bool {
    name.strip_prefix(prefix).map_or(false, |stamp| {
        stamp.len() == TIMESTAMP_LEN && stamp.chars().all(|c| c.is_ascii_digit())
    })
}

fn write_archive(root: &Path, dest: &Path) -> Result<usize> {
    if !root.is_dir() {
        return Err(anyhow!("backup root not found: {}", root.display()));
    }
    let top = root
        .file_name()
        .map(PathBuf::from)
        .ok_or_else(|| anyhow!("backup root has no directory name: {}", root.display()))?;

    let file = File::create(dest)
        .with_context(|| format!("failed to create archive: {}", dest.display()))?;
    let mut builder = Builder::new(GzEncoder::new(file, Compression::default()));

    let mut entries = 0;
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.with_context(|| format!("failed to walk {}", root.display()))?;
        if entry.file_type().is_dir() {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(root)
            .with_context(|| format!("{} is outside the backup root", entry.path().display()))?;
        let name = top.join(relative);
        let mut source = File::open(entry.path())
            .with_context(|| format!("failed to open {}", entry.path().display()))?;
        builder
            .append_file(&name, &mut source)
            .with_context(|| format!("failed to add {} to archive", name.display()))?;
        debug!(entry = %name.display(), "archived file");
        entries += 1;
    }

    let encoder = builder.into_inner().context("failed to finalize tar stream")?;
    let file = encoder.finish().context("failed to finish gzip stream")?;
    file.sync_all()
        .with_context(|| format!("failed to sync archive: {}", dest.display()))?;
    Ok(entries)
}

fn cleanup_partial_archive(path: &Path) {
    if path.exists() {
        if let Err(err) = fs::remove_file(path) {
            warn!(path = %path.display(), error = %err, "failed to remove partial archive");
        }
    }
}

pub fn ensure_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path)
        .with_context(|| format!("failed to create directory: {}", path.display()))
}
