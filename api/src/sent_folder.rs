use std::{
    io,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::fs;

use crate::batch::OutcomeRecord;

#[derive(Debug, Error)]
pub enum MoveError {
    #[error("source file {0} does not exist")]
    SourceMissing(PathBuf),
    #[error("unable to create sent folder {path}: {source}")]
    CreateDir { path: PathBuf, source: io::Error },
    #[error("unable to check whether {path} is taken: {source}")]
    Inspect { path: PathBuf, source: io::Error },
    #[error("unable to copy {from} to {to}: {source}")]
    Copy {
        from: PathBuf,
        to: PathBuf,
        source: io::Error,
    },
}

/// File system steps of a move. The copy always lands before the original is
/// removed.
#[async_trait]
pub trait FileMover {
    async fn exists(&self, path: &Path) -> io::Result<bool>;
    async fn copy(&self, from: &Path, to: &Path) -> io::Result<()>;
    async fn remove(&self, path: &Path) -> io::Result<()>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFs;

#[async_trait]
impl FileMover for LocalFs {
    async fn exists(&self, path: &Path) -> io::Result<bool> {
        fs::try_exists(path).await
    }

    async fn copy(&self, from: &Path, to: &Path) -> io::Result<()> {
        fs::copy(from, to).await.map(|_| ())
    }

    async fn remove(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(path).await
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SentFile {
    pub path: PathBuf,
    /// `false` when the copy landed but the original could not be deleted.
    pub source_removed: bool,
}

fn sent_file_name(path: &Path, now: DateTime<Utc>, attempt: u32) -> String {
    let stem = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = path
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default();
    let timestamp = now.format("%Y-%m-%dT%H-%M-%S-%3fZ");
    if attempt == 0 {
        format!("{}_sent_{}{}", stem, timestamp, ext)
    } else {
        format!("{}_sent_{}-{}{}", stem, timestamp, attempt, ext)
    }
}

/// Archives `path` into `sent_dir` by copying it under a timestamped name and
/// then deleting the original. The two may live on different mounts, so this
/// is not a rename.
pub async fn move_to_sent(
    path: &Path,
    sent_dir: &Path,
    now: DateTime<Utc>,
) -> Result<SentFile, MoveError> {
    move_to_sent_with(&LocalFs, path, sent_dir, now).await
}

#[tracing::instrument(level = "debug", skip(mover, now))]
pub async fn move_to_sent_with<M>(
    mover: &M,
    path: &Path,
    sent_dir: &Path,
    now: DateTime<Utc>,
) -> Result<SentFile, MoveError>
where
    M: FileMover + Sync,
{
    if !fs::metadata(path)
        .await
        .map(|meta| meta.is_file())
        .unwrap_or(false)
    {
        return Err(MoveError::SourceMissing(path.to_path_buf()));
    }

    fs::create_dir_all(sent_dir)
        .await
        .map_err(|source| MoveError::CreateDir {
            path: sent_dir.to_path_buf(),
            source,
        })?;

    let mut attempt = 0;
    let destination = loop {
        let candidate = sent_dir.join(sent_file_name(path, now, attempt));
        let taken = mover
            .exists(&candidate)
            .await
            .map_err(|source| MoveError::Inspect {
                path: candidate.clone(),
                source,
            })?;
        if !taken {
            break candidate;
        }
        attempt += 1;
    };

    mover
        .copy(path, &destination)
        .await
        .map_err(|source| MoveError::Copy {
            from: path.to_path_buf(),
            to: destination.clone(),
            source,
        })?;

    let source_removed = match mover.remove(path).await {
        Ok(()) => true,
        Err(err) => {
            tracing::warn!(
                message = "could not delete original after copying it to the sent folder",
                path = %path.display(),
                error = %err
            );
            false
        }
    };

    tracing::info!(
        message = "moved to sent folder",
        from = %path.display(),
        to = %destination.display()
    );
    Ok(SentFile {
        path: destination,
        source_removed,
    })
}

/// Archives the source file of every successful record. Runs after the whole
/// batch has finished; failures are logged and the remaining files still move.
pub async fn archive_successes(records: &[OutcomeRecord], sent_dir: &Path) -> Vec<SentFile> {
    let now = Utc::now();
    let mut archived = Vec::new();
    for record in records.iter().filter(|record| record.is_success()) {
        let source = match record.source_item.source_file() {
            Some(source) => source,
            None => continue,
        };
        match move_to_sent(source, sent_dir, now).await {
            Ok(sent) => archived.push(sent),
            Err(err) => {
                tracing::error!(
                    message = "unable to move file to sent folder",
                    identifier = %record.identifier,
                    error = %err
                )
            }
        }
    }
    archived
}
