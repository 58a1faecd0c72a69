use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::models::{EngineType, StorageSpec, VerifierType};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShardIndex(pub u32);

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", default)]
pub struct DockerSpec {
    pub image: String,
    pub entrypoint: Vec<String>,
    pub env: Vec<String>,
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", default)]
pub struct LanguageSpec {
    pub language: String,
    pub language_version: String,
    pub deterministic: bool,
    pub command: String,
    pub program_path: String,
    pub requirements_path: String,
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", default)]
pub struct ResourceSpec {
    pub cpu: String,
    pub memory: String,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct JobSpec {
    pub engine: EngineType,
    #[serde(default)]
    pub verifier: VerifierType,
    #[serde(default)]
    pub docker: DockerSpec,
    #[serde(default)]
    pub language: LanguageSpec,
    #[serde(default)]
    pub resources: ResourceSpec,
    #[serde(default)]
    pub inputs: Vec<StorageSpec>,
    #[serde(default)]
    pub contexts: Vec<StorageSpec>,
    #[serde(default)]
    pub outputs: Vec<StorageSpec>,
    #[serde(default)]
    pub annotations: Vec<String>,
}

impl JobSpec {
    pub fn new(engine: EngineType) -> Self {
        Self {
            engine,
            verifier: VerifierType::default(),
            docker: DockerSpec::default(),
            language: LanguageSpec::default(),
            resources: ResourceSpec::default(),
            inputs: Vec::new(),
            contexts: Vec::new(),
            outputs: Vec::new(),
            annotations: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", default)]
pub struct JobDeal {
    pub concurrency: u32,
    pub assigned_nodes: Vec<String>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShardStateType {
    Enqueued,
    Running,
    Completed,
    Error,
    Cancelled,
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", default)]
pub struct RunOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub results_dir: Option<PathBuf>,
}

impl RunOutput {
    pub fn is_empty(&self) -> bool {
        self.stdout.is_empty()
            && self.stderr.is_empty()
            && self.exit_code == 0
            && self.results_dir.is_none()
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct JobShardState {
    pub state: ShardStateType,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub run_output: Option<RunOutput>,
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", default)]
pub struct JobNodeState {
    pub shards: BTreeMap<ShardIndex, JobShardState>,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Job {
    pub id: String,
    #[serde(default)]
    pub owner: String,
    pub spec: JobSpec,
    #[serde(default)]
    pub deal: JobDeal,
    #[serde(default)]
    pub state: BTreeMap<String, JobNodeState>,
    #[serde(with = "unix_seconds", default = "SystemTime::now")]
    pub created_at: SystemTime,
}

impl Job {
    pub fn new(id: impl Into<String>, spec: JobSpec) -> Self {
        Self {
            id: id.into(),
            owner: String::new(),
            spec,
            deal: JobDeal::default(),
            state: BTreeMap::new(),
            created_at: SystemTime::now(),
        }
    }

    pub fn engine(&self) -> EngineType {
        self.spec.engine
    }
}

mod unix_seconds {
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &SystemTime, serializer: S) -> Result<S::Ok, S::Error> {
        let seconds = value
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs())
            .unwrap_or(0);
        serializer.serialize_u64(seconds)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<SystemTime, D::Error> {
        let seconds = u64::deserialize(deserializer)?;
        Ok(UNIX_EPOCH + Duration::from_secs(seconds))
    }
}
