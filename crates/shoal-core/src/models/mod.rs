pub mod engine;
pub mod error;
pub mod job;
pub mod storage;
pub mod verifier;

pub use engine::EngineType;
pub use error::{CoreError, CoreErrorKind, CoreResult};
pub use job::{
    DockerSpec, Job, JobDeal, JobNodeState, JobShardState, JobSpec, LanguageSpec, ResourceSpec,
    RunOutput, ShardIndex, ShardStateType,
};
pub use storage::{StorageSourceType, StorageSpec};
pub use verifier::VerifierType;
