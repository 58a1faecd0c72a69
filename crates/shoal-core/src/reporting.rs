use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Serialize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::catalog;
use crate::models::{CoreError, CoreErrorKind, CoreResult, Job, JobDeal, JobNodeState, StorageSpec};

/// Arguments of a `describe` call, as parsed by the CLI.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct DescribeRequest {
    pub job_id: String,
    pub job_file: PathBuf,
}

impl DescribeRequest {
    pub fn new(job_id: impl Into<String>, job_file: impl Into<PathBuf>) -> Self {
        Self {
            job_id: job_id.into(),
            job_file: job_file.into(),
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct JobDescription {
    pub id: String,
    pub owner: String,
    pub spec: JobSpecDescription,
    pub deal: JobDeal,
    pub state: BTreeMap<String, JobNodeState>,
    pub start_time: String,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct JobSpecDescription {
    pub engine: &'static str,
    pub verifier: &'static str,
    pub vm: JobVmDescription,
    pub deployment: JobDealDescription,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct JobVmDescription {
    pub image: String,
    pub entrypoint: Vec<String>,
    pub env: Vec<String>,
    pub cpu: String,
    pub memory: String,
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
    pub annotations: Vec<String>,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct JobDealDescription {
    pub concurrency: u32,
    pub assigned_nodes: Vec<String>,
}

pub fn load_job(path: &Path) -> CoreResult<Job> {
    let raw = std::fs::read_to_string(path).map_err(|error| {
        CoreError::new(
            CoreErrorKind::InvalidInput,
            format!("failed to read job file '{}': {error}", path.display()),
        )
    })?;
    serde_json::from_str(&raw).map_err(|error| {
        CoreError::new(
            CoreErrorKind::InvalidInput,
            format!("job file '{}' is not a valid job document: {error}", path.display()),
        )
    })
}

pub fn describe_job(request: DescribeRequest) -> CoreResult<JobDescription> {
    if request.job_id.trim().is_empty() {
        return Err(CoreError::new(
            CoreErrorKind::InvalidInput,
            "please submit an id with the --id flag",
        ));
    }

    let job = load_job(&request.job_file)?;
    if job.id != request.job_id {
        return Err(CoreError::new(
            CoreErrorKind::InvalidInput,
            format!(
                "job file '{}' holds job '{}', not '{}'",
                request.job_file.display(),
                job.id,
                request.job_id
            ),
        )
        .job(request.job_id));
    }

    describe(&job)
}

pub fn describe(job: &Job) -> CoreResult<JobDescription> {
    let spec = &job.spec;
    let start_time = OffsetDateTime::from(job.created_at)
        .format(&Rfc3339)
        .map_err(|error| {
            CoreError::new(
                CoreErrorKind::Internal,
                format!("failed to format job start time: {error}"),
            )
            .job(&job.id)
        })?;

    Ok(JobDescription {
        id: job.id.clone(),
        owner: job.owner.clone(),
        spec: JobSpecDescription {
            engine: catalog::engine_name(spec.engine),
            verifier: catalog::verifier_name(spec.verifier),
            vm: JobVmDescription {
                image: spec.docker.image.clone(),
                entrypoint: spec.docker.entrypoint.clone(),
                env: spec.docker.env.clone(),
                cpu: spec.resources.cpu.clone(),
                memory: spec.resources.memory.clone(),
                inputs: spec.inputs.iter().map(describe_storage).collect(),
                outputs: spec.outputs.iter().map(describe_storage).collect(),
                annotations: spec.annotations.clone(),
            },
            deployment: JobDealDescription {
                concurrency: job.deal.concurrency,
                assigned_nodes: job.deal.assigned_nodes.clone(),
            },
        },
        deal: job.deal.clone(),
        state: job.state.clone(),
        start_time,
    })
}

fn describe_storage(spec: &StorageSpec) -> String {
    let source = catalog::storage_name(spec.engine);
    if spec.cid.is_empty() {
        format!("{source} {}", spec.path)
    } else {
        format!("{source} {} -> {}", spec.cid, spec.path)
    }
}
