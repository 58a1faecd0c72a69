use crate::executors::{Executor, ExecutorFuture, delegates_installed};
use crate::models::{CoreError, CoreErrorKind, CoreResult, EngineType, Job, RunOutput, ShardIndex};
use crate::registry::ExecutorLookup;

struct SupportedLanguage {
    language: &'static str,
    version: &'static str,
    engine: EngineType,
}

const SUPPORTED_LANGUAGES: &[SupportedLanguage] = &[SupportedLanguage {
    language: "python",
    version: "3.10",
    engine: EngineType::PythonWasm,
}];

/// Picks the engine that runs a language job and hands the job over to it.
pub struct LanguageExecutor {
    executors: ExecutorLookup,
}

impl LanguageExecutor {
    pub fn new(executors: ExecutorLookup) -> CoreResult<Self> {
        Ok(Self { executors })
    }

    /// Engine for a `(language, version)` pair, if any is supported.
    pub fn engine_for(language: &str, version: &str) -> Option<EngineType> {
        SUPPORTED_LANGUAGES
            .iter()
            .find(|supported| supported.language == language && supported.version == version)
            .map(|supported| supported.engine)
    }

    async fn run_shard(&self, job: &Job, shard: ShardIndex) -> CoreResult<RunOutput> {
        let spec = &job.spec.language;
        if !spec.deterministic {
            return Err(CoreError::new(
                CoreErrorKind::InvalidInput,
                "only deterministic language jobs are supported",
            )
            .engine(EngineType::Language)
            .job(&job.id));
        }

        let engine = Self::engine_for(&spec.language, &spec.language_version).ok_or_else(|| {
            CoreError::new(
                CoreErrorKind::UnsupportedEngine,
                format!(
                    "no engine supports language '{}' version '{}'",
                    spec.language, spec.language_version
                ),
            )
            .engine(EngineType::Language)
            .job(&job.id)
        })?;

        let delegate = self
            .executors
            .resolve(engine, EngineType::Language)
            .map_err(|error| error.job(&job.id))?;

        let mut delegated = job.clone();
        delegated.spec.engine = engine;

        tracing::debug!(
            job_id = %job.id,
            shard = shard.0,
            language = %spec.language,
            delegate = %engine,
            "delegating language job"
        );
        delegate.run(&delegated, shard).await
    }
}

impl Executor for LanguageExecutor {
    fn engine(&self) -> EngineType {
        EngineType::Language
    }

    fn is_installed(&self) -> ExecutorFuture<'_, bool> {
        Box::pin(delegates_installed(&self.executors, EngineType::Language))
    }

    fn run<'a>(&'a self, job: &'a Job, shard: ShardIndex) -> ExecutorFuture<'a, RunOutput> {
        Box::pin(self.run_shard(job, shard))
    }
}
