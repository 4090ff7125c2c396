//! Deployment environment.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Where a load runs. Anything but production gets suffixed dataset and
/// object names and verbose delete diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    #[default]
    Production,
    Test,
}

impl Environment {
    #[must_use]
    pub fn is_production(self) -> bool {
        self == Self::Production
    }

    /// `name` unchanged in production, `name_<env>` elsewhere.
    #[must_use]
    pub fn apply(self, name: &str) -> String {
        if self.is_production() {
            name.to_string()
        } else {
            format!("{name}_{self}")
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Production => "production",
            Self::Test => "test",
        };
        f.write_str(s)
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Ok(Self::Production),
            "test" => Ok(Self::Test),
            other => Err(format!(
                "unknown environment '{other}', expected 'production' or 'test'"
            )),
        }
    }
}
