use std::{io, path::PathBuf};

use thiserror::Error;

/// Why a single work item could not be processed.
#[derive(Debug, Error)]
pub enum HandlerError<E>
where
    E: std::error::Error + 'static,
{
    #[error(transparent)]
    Provider(E),
    #[error("unable to read template {path}: {source}")]
    ReadTemplate { path: PathBuf, source: io::Error },
    #[error("{handler} cannot process {identifier}")]
    Unsupported {
        handler: &'static str,
        identifier: String,
    },
}
