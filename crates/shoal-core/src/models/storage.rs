use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::models::{CoreError, CoreErrorKind};

#[derive(
    Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum StorageSourceType {
    IpfsFuseDocker,
    IpfsApiCopy,
    IpfsDefault,
}

impl StorageSourceType {
    pub const ALL: [Self; 3] = [Self::IpfsFuseDocker, Self::IpfsApiCopy, Self::IpfsDefault];

    pub const fn code(self) -> u16 {
        match self {
            Self::IpfsFuseDocker => 1,
            Self::IpfsApiCopy => 2,
            Self::IpfsDefault => 3,
        }
    }

    pub fn from_code(code: u16) -> Option<Self> {
        Self::ALL.into_iter().find(|source| source.code() == code)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::IpfsFuseDocker => "ipfs-fuse-docker",
            Self::IpfsApiCopy => "ipfs-api-copy",
            Self::IpfsDefault => "ipfs-default",
        }
    }
}

impl Display for StorageSourceType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StorageSourceType {
    type Err = CoreError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|source| source.as_str() == value)
            .ok_or_else(|| {
                CoreError::new(
                    CoreErrorKind::InvalidInput,
                    format!("unknown storage source type '{value}'"),
                )
            })
    }
}

/// A reference to content a job reads or writes, plus where it appears
/// inside the job's filesystem.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct StorageSpec {
    pub engine: StorageSourceType,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub cid: String,
    pub path: String,
}

impl StorageSpec {
    pub fn new(engine: StorageSourceType, cid: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            engine,
            name: String::new(),
            cid: cid.into(),
            path: path.into(),
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}
