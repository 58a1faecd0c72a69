use std::sync::atomic::{AtomicU64, Ordering};

use crate::executors::{Executor, ExecutorFuture};
use crate::models::{EngineType, Job, RunOutput, ShardIndex};

/// Accepts any job and reports success with empty output.
#[derive(Debug, Default)]
pub struct NoopExecutor {
    runs: AtomicU64,
}

impl NoopExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `run` calls this instance has served.
    pub fn runs(&self) -> u64 {
        self.runs.load(Ordering::Relaxed)
    }
}

impl Executor for NoopExecutor {
    fn engine(&self) -> EngineType {
        EngineType::Noop
    }

    fn is_installed(&self) -> ExecutorFuture<'_, bool> {
        Box::pin(async { Ok(true) })
    }

    fn run<'a>(&'a self, job: &'a Job, shard: ShardIndex) -> ExecutorFuture<'a, RunOutput> {
        Box::pin(async move {
            self.runs.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(job_id = %job.id, shard = shard.0, "noop run");
            Ok(RunOutput::default())
        })
    }
}
