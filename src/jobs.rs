//! Background job handoff.
//!
//! The deep scan runs outside the synchronous session path, on whatever
//! executor the embedding application provides. This module defines the
//! narrow contract: a descriptor naming the session, target, and progress
//! channel, and a queue that accepts it and returns an opaque job id. The
//! core never inspects job status beyond that id.
//!
//! [`InlineJobQueue`] is the in-process implementation used by the CLI
//! and tests: it spawns the worker on the tokio runtime.

use crate::types::{ScanTarget, SessionId};
use async_trait::async_trait;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

/// Everything a worker needs to run the deep scan for a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobDescriptor {
    /// The session this job finalizes; the worker drives its remaining
    /// stage transitions.
    pub session_id: SessionId,
    pub target: ScanTarget,
    /// Progress events from the worker go to this channel.
    pub channel: String,
}

/// Opaque handle to a submitted background job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Submission failure from the job queue collaborator.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct SubmissionError(pub String);

/// External asynchronous executor for deep-scan jobs.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Hand a job descriptor to the executor.
    async fn submit(&self, descriptor: JobDescriptor) -> Result<JobId, SubmissionError>;
}

/// The worker body an [`InlineJobQueue`] runs for each submitted job.
pub type JobRunner = Arc<dyn Fn(JobDescriptor) -> BoxFuture<'static, ()> + Send + Sync>;

/// Job queue that executes workers as tokio tasks in this process.
pub struct InlineJobQueue {
    runner: JobRunner,
}

impl InlineJobQueue {
    pub fn new(runner: JobRunner) -> Self {
        Self { runner }
    }
}

#[async_trait]
impl JobQueue for InlineJobQueue {
    async fn submit(&self, descriptor: JobDescriptor) -> Result<JobId, SubmissionError> {
        let job_id = JobId::new();
        info!(%job_id, target = %descriptor.target, "spawning inline deep-scan worker");
        tokio::spawn((self.runner)(descriptor));
        Ok(job_id)
    }
}
