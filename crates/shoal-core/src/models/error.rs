use crate::models::{EngineType, StorageSourceType};

pub type CoreResult<T> = Result<T, CoreError>;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum CoreErrorKind {
    /// Unreachable backend, bad network address or other start-up misconfiguration.
    Configuration,
    /// No executor is registered for the engine a job asked for.
    UnsupportedEngine,
    /// A meta-executor could not find its delegate at dispatch time.
    Delegation,
    InvalidInput,
    ProcessFailure,
    StorageFailure,
    Timeout,
    Internal,
}

#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
#[error("{kind:?}: {message}")]
pub struct CoreError {
    pub engine: Option<EngineType>,
    pub storage: Option<StorageSourceType>,
    pub job: Option<String>,
    pub kind: CoreErrorKind,
    pub message: String,
}

impl CoreError {
    pub fn new(kind: CoreErrorKind, message: impl Into<String>) -> Self {
        Self {
            engine: None,
            storage: None,
            job: None,
            kind,
            message: message.into(),
        }
    }

    pub fn engine(mut self, engine: EngineType) -> Self {
        self.engine = Some(engine);
        self
    }

    pub fn storage(mut self, storage: StorageSourceType) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn job(mut self, job_id: impl Into<String>) -> Self {
        self.job = Some(job_id.into());
        self
    }

    /// Fills in context the error does not carry yet, keeping whatever the
    /// origin already attached.
    pub fn attribute(self, engine: EngineType, job_id: &str) -> Self {
        Self {
            engine: self.engine.or(Some(engine)),
            job: self.job.or_else(|| Some(job_id.to_string())),
            ..self
        }
    }
}
