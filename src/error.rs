//! Error kinds surfaced by identity resolution, state queries and draining.

use std::{path::PathBuf, time::Duration};

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, thiserror::Error)]
pub enum EcsError {
    /// An ECS API call failed. Never retried.
    #[error("{operation} failed: {source}")]
    Transport {
        operation: &'static str,
        #[source]
        source: BoxError,
    },

    /// The cluster has no container instance matching the request.
    #[error("no container instances found for {instance} in cluster {cluster}")]
    NotFound { cluster: String, instance: String },

    #[error("container instance arn {arn} has no instance id segment")]
    MalformedArn { arn: String },

    /// ECS accepted the request but reported a failure for the instance.
    #[error("could not set {instance} to DRAINING: {reason}")]
    UpdateRejected { instance: String, reason: String },

    /// ECS answered with a value this crate cannot use.
    #[error("{operation} returned an invalid response: {detail}")]
    InvalidResponse {
        operation: &'static str,
        detail: String,
    },

    /// Zero, or too large to schedule a tick with.
    #[error("check interval must be greater than zero and fit on the clock")]
    InvalidPollInterval,

    /// The identity was resolved but the cache file could not be written.
    #[error("failed to write identity cache {}: {source}", .path.display())]
    CacheWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Tasks were still running when the wait timed out.
    #[error("timeout reached after {}s waiting for tasks to drain ({remaining} still running)", .waited.as_secs())]
    Timeout { waited: Duration, remaining: u32 },
}

impl EcsError {
    pub fn transport<E>(operation: &'static str, source: E) -> Self
    where
        E: Into<BoxError>,
    {
        EcsError::Transport {
            operation,
            source: source.into(),
        }
    }

    /// Timeouts are soft: callers usually report them and carry on.
    pub fn is_timeout(&self) -> bool {
        matches!(self, EcsError::Timeout { .. })
    }
}
