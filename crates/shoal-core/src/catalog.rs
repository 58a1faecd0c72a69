use crate::models::{CoreError, CoreErrorKind, CoreResult, EngineType, StorageSourceType, VerifierType};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct EngineDescriptor {
    pub id: EngineType,
    pub display_name: &'static str,
    /// Engines this one hands jobs to; empty for engines that run jobs themselves.
    pub delegates: &'static [EngineType],
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct StorageDescriptor {
    pub id: StorageSourceType,
    pub display_name: &'static str,
    /// Never wired into a node's storage providers: job submitters must not
    /// be able to reach it.
    pub policy_excluded: bool,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct VerifierDescriptor {
    pub id: VerifierType,
    pub display_name: &'static str,
}

const ALL_ENGINES: [EngineDescriptor; 4] = [
    EngineDescriptor {
        id: EngineType::Noop,
        display_name: "Noop",
        delegates: &[],
    },
    EngineDescriptor {
        id: EngineType::Docker,
        display_name: "Docker",
        delegates: &[],
    },
    EngineDescriptor {
        id: EngineType::Language,
        display_name: "Language",
        delegates: &[EngineType::PythonWasm],
    },
    EngineDescriptor {
        id: EngineType::PythonWasm,
        display_name: "PythonWasm",
        delegates: &[EngineType::Docker],
    },
];

const ALL_STORAGE_SOURCES: [StorageDescriptor; 3] = [
    StorageDescriptor {
        id: StorageSourceType::IpfsFuseDocker,
        display_name: "IPFS (FUSE mount)",
        policy_excluded: true,
    },
    StorageDescriptor {
        id: StorageSourceType::IpfsApiCopy,
        display_name: "IPFS (API copy)",
        policy_excluded: false,
    },
    StorageDescriptor {
        id: StorageSourceType::IpfsDefault,
        display_name: "IPFS",
        policy_excluded: false,
    },
];

const ALL_VERIFIERS: [VerifierDescriptor; 2] = [
    VerifierDescriptor {
        id: VerifierType::Noop,
        display_name: "Noop",
    },
    VerifierDescriptor {
        id: VerifierType::Deterministic,
        display_name: "Deterministic",
    },
];

pub fn engines() -> &'static [EngineDescriptor] {
    &ALL_ENGINES
}

pub fn engine(id: EngineType) -> Option<&'static EngineDescriptor> {
    ALL_ENGINES.iter().find(|descriptor| descriptor.id == id)
}

/// Engines `id` delegates to. Its executor is only usable when all of them are.
pub fn delegates(id: EngineType) -> &'static [EngineType] {
    match engine(id) {
        Some(descriptor) => descriptor.delegates,
        None => &[],
    }
}

pub fn storage_sources() -> &'static [StorageDescriptor] {
    &ALL_STORAGE_SOURCES
}

pub fn storage_source(id: StorageSourceType) -> Option<&'static StorageDescriptor> {
    ALL_STORAGE_SOURCES
        .iter()
        .find(|descriptor| descriptor.id == id)
}

pub fn verifiers() -> &'static [VerifierDescriptor] {
    &ALL_VERIFIERS
}

pub fn verifier(id: VerifierType) -> Option<&'static VerifierDescriptor> {
    ALL_VERIFIERS.iter().find(|descriptor| descriptor.id == id)
}

pub fn engine_name(id: EngineType) -> &'static str {
    engine(id).map_or(id.as_str(), |descriptor| descriptor.display_name)
}

pub fn storage_name(id: StorageSourceType) -> &'static str {
    storage_source(id).map_or(id.as_str(), |descriptor| descriptor.display_name)
}

pub fn verifier_name(id: VerifierType) -> &'static str {
    verifier(id).map_or(id.as_str(), |descriptor| descriptor.display_name)
}

pub fn engine_name_for_code(code: u16) -> CoreResult<&'static str> {
    EngineType::from_code(code)
        .map(engine_name)
        .ok_or_else(|| unmapped("engine", code))
}

pub fn storage_name_for_code(code: u16) -> CoreResult<&'static str> {
    StorageSourceType::from_code(code)
        .map(storage_name)
        .ok_or_else(|| unmapped("storage source", code))
}

pub fn verifier_name_for_code(code: u16) -> CoreResult<&'static str> {
    VerifierType::from_code(code)
        .map(verifier_name)
        .ok_or_else(|| unmapped("verifier", code))
}

fn unmapped(table: &str, code: u16) -> CoreError {
    CoreError::new(
        CoreErrorKind::InvalidInput,
        format!("no {table} is registered for code {code}"),
    )
}
