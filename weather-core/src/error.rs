use std::{io, path::PathBuf, time::Duration};

use thiserror::Error;

use crate::model::RecordId;

/// Failure of a single upstream call.
///
/// Every variant is converted into a `bad_request` payload by the fetch
/// orchestrator; none of them reach the caller of the pipeline.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request to weather service timed out after {0:?}")]
    Timeout(Duration),

    #[error("request to weather service failed: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("no fixture recorded for '{0}'")]
    MissingFixture(String),

    #[error("failed to access fixture {}: {source}", path.display())]
    Fixture {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl ClientError {
    pub(crate) fn from_reqwest(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            ClientError::Timeout(timeout)
        } else {
            ClientError::Transport(err)
        }
    }
}

/// Hard failure of the persistence collaborator. Not recoverable by the core.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("location {0} not found")]
    NotFound(RecordId),

    #[error("failed to access location store {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("location store {} is corrupt: {source}", path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Field-level validation problem, surfaced to the user.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Input can't be blank")]
    BlankInput,

    #[error("You entered an invalid Address for the Weather Service")]
    InvalidAddress,

    #[error("Not a Json string")]
    NotJson,
}

/// Errors returned by [`crate::WeatherService`].
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
