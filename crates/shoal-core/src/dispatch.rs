use std::sync::Arc;

use tokio::task::JoinSet;

use crate::models::{CoreError, CoreErrorKind, CoreResult, EngineType, Job, RunOutput, ShardIndex};
use crate::registry::CapabilityRegistry;

/// Routes job shards to the executor registered for the job's engine.
#[derive(Clone, Debug)]
pub struct ShardDispatcher {
    registry: Arc<CapabilityRegistry>,
}

impl ShardDispatcher {
    pub fn new(registry: Arc<CapabilityRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &CapabilityRegistry {
        &self.registry
    }

    pub fn supports(&self, engine: EngineType) -> bool {
        self.registry.contains(engine)
    }

    pub async fn run_shard(&self, job: &Job, shard: ShardIndex) -> CoreResult<RunOutput> {
        let engine = job.engine();
        let executor = self.registry.lookup(engine).ok_or_else(|| {
            CoreError::new(
                CoreErrorKind::UnsupportedEngine,
                format!("no executor is registered for engine '{engine}'"),
            )
            .engine(engine)
            .job(&job.id)
        })?;

        tracing::debug!(job_id = %job.id, shard = shard.0, engine = %engine, "dispatching shard");
        let result = executor.run(job, shard).await;
        if let Err(error) = &result {
            tracing::error!(
                job_id = %job.id,
                shard = shard.0,
                engine = %engine,
                kind = ?error.kind,
                message = %error.message,
                "shard run failed"
            );
        }
        result
    }

    /// Runs each shard on its own task. Results come back in shard order.
    pub async fn run_shards(
        &self,
        job: Arc<Job>,
        shards: impl IntoIterator<Item = ShardIndex>,
    ) -> CoreResult<Vec<(ShardIndex, CoreResult<RunOutput>)>> {
        let mut tasks = JoinSet::new();
        for shard in shards {
            let dispatcher = self.clone();
            let job = job.clone();
            tasks.spawn(async move { (shard, dispatcher.run_shard(&job, shard).await) });
        }

        let mut results = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            let outcome = joined.map_err(|error| {
                CoreError::new(
                    CoreErrorKind::Internal,
                    format!("shard task failed to complete: {error}"),
                )
                .job(&job.id)
            })?;
            results.push(outcome);
        }
        results.sort_by_key(|(shard, _)| *shard);
        Ok(results)
    }
}
