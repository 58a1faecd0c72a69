use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::models::{CoreError, CoreErrorKind};

#[derive(
    Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum EngineType {
    Noop,
    Docker,
    Language,
    PythonWasm,
}

impl EngineType {
    pub const ALL: [Self; 4] = [Self::Noop, Self::Docker, Self::Language, Self::PythonWasm];

    pub const COUNT: usize = Self::ALL.len();

    /// Slot position inside the executor arena. Dense, zero based.
    pub const fn index(self) -> usize {
        match self {
            Self::Noop => 0,
            Self::Docker => 1,
            Self::Language => 2,
            Self::PythonWasm => 3,
        }
    }

    /// Stable wire code. Zero is reserved for "unknown engine".
    pub const fn code(self) -> u16 {
        match self {
            Self::Noop => 1,
            Self::Docker => 2,
            Self::Language => 3,
            Self::PythonWasm => 4,
        }
    }

    pub fn from_code(code: u16) -> Option<Self> {
        Self::ALL.into_iter().find(|engine| engine.code() == code)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Noop => "noop",
            Self::Docker => "docker",
            Self::Language => "language",
            Self::PythonWasm => "python-wasm",
        }
    }
}

impl Display for EngineType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EngineType {
    type Err = CoreError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|engine| engine.as_str() == value)
            .ok_or_else(|| {
                CoreError::new(
                    CoreErrorKind::UnsupportedEngine,
                    format!("unknown engine type '{value}'"),
                )
            })
    }
}
