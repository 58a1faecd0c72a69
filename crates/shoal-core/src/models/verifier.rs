use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

#[derive(
    Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum VerifierType {
    #[default]
    Noop,
    Deterministic,
}

impl VerifierType {
    pub const ALL: [Self; 2] = [Self::Noop, Self::Deterministic];

    pub const fn code(self) -> u16 {
        match self {
            Self::Noop => 1,
            Self::Deterministic => 2,
        }
    }

    pub fn from_code(code: u16) -> Option<Self> {
        Self::ALL.into_iter().find(|verifier| verifier.code() == code)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Noop => "noop",
            Self::Deterministic => "deterministic",
        }
    }
}

impl Display for VerifierType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
