//! Transports to the canonical store.
//!
//! Both transports expose the same four calls through [`RemoteAdapter`];
//! the engine is written against [`Remote`] and never branches on which one
//! is active.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::config::RemoteConfig;
use crate::models::{EntityKind, Record, RecordId};

#[cfg(test)]
pub(crate) mod memory;
mod rest;
mod sql;

pub use rest::RestRemote;
pub use sql::SqlRemote;

/// Failure of a single remote call
#[derive(Debug, Error)]
pub enum RemoteError {
    /// Could not reach the remote at all (DNS, refused, TLS, auth)
    #[error("Remote unreachable: {0}")]
    Unreachable(String),

    #[error("Remote call timed out after {0:?}")]
    Timeout(Duration),

    /// The remote refused this particular request
    #[error("Remote rejected request: {message} ({status})")]
    Rejected { status: u16, message: String },

    #[error("Remote server error: {message} ({status})")]
    Server { status: u16, message: String },

    #[error("Remote database error: {0}")]
    Database(String),

    /// The response could not be understood
    #[error("Invalid remote payload: {0}")]
    Protocol(String),
}

impl RemoteError {
    /// Whether the failure says the remote is unreachable rather than that it
    /// refused this request
    pub const fn is_connectivity(&self) -> bool {
        matches!(self, Self::Unreachable(_) | Self::Timeout(_))
    }
}

pub type RemoteResult<T> = Result<T, RemoteError>;

/// The four calls every transport to the canonical store provides
pub trait RemoteAdapter: Send + Sync {
    /// `false` on any connectivity failure; never errors
    fn health_check(&self) -> impl Future<Output = bool> + Send;

    /// Every row of one kind
    fn pull_all(&self, kind: EntityKind) -> impl Future<Output = RemoteResult<Vec<Record>>> + Send;

    /// Create or replace a row; a stale row must not overwrite a newer one
    fn upsert(&self, record: &Record) -> impl Future<Output = RemoteResult<()>> + Send;

    /// Remove a row; deleting a row that does not exist succeeds
    fn delete(&self, kind: EntityKind, id: &RecordId) -> impl Future<Output = RemoteResult<()>> + Send;
}

impl<R: RemoteAdapter> RemoteAdapter for Arc<R> {
    fn health_check(&self) -> impl Future<Output = bool> + Send {
        (**self).health_check()
    }

    fn pull_all(&self, kind: EntityKind) -> impl Future<Output = RemoteResult<Vec<Record>>> + Send {
        (**self).pull_all(kind)
    }

    fn upsert(&self, record: &Record) -> impl Future<Output = RemoteResult<()>> + Send {
        (**self).upsert(record)
    }

    fn delete(&self, kind: EntityKind, id: &RecordId) -> impl Future<Output = RemoteResult<()>> + Send {
        (**self).delete(kind, id)
    }
}

/// Whichever transport is configured
pub enum Remote {
    Sql(SqlRemote),
    Rest(RestRemote),
}

impl Remote {
    /// Build the transport named by `config`. Nothing is contacted yet.
    pub fn from_config(config: &RemoteConfig, call_timeout: Duration) -> RemoteResult<Self> {
        match config {
            RemoteConfig::Sql { url, auth_token } => {
                Ok(Self::Sql(SqlRemote::new(url.clone(), auth_token.clone())))
            }
            RemoteConfig::Rest { base_url } => {
                Ok(Self::Rest(RestRemote::new(base_url.clone(), call_timeout)?))
            }
        }
    }
}

impl RemoteAdapter for Remote {
    async fn health_check(&self) -> bool {
        match self {
            Self::Sql(remote) => remote.health_check().await,
            Self::Rest(remote) => remote.health_check().await,
        }
    }

    async fn pull_all(&self, kind: EntityKind) -> RemoteResult<Vec<Record>> {
        match self {
            Self::Sql(remote) => remote.pull_all(kind).await,
            Self::Rest(remote) => remote.pull_all(kind).await,
        }
    }

    async fn upsert(&self, record: &Record) -> RemoteResult<()> {
        match self {
            Self::Sql(remote) => remote.upsert(record).await,
            Self::Rest(remote) => remote.upsert(record).await,
        }
    }

    async fn delete(&self, kind: EntityKind, id: &RecordId) -> RemoteResult<()> {
        match self {
            Self::Sql(remote) => remote.delete(kind, id).await,
            Self::Rest(remote) => remote.delete(kind, id).await,
        }
    }
}
