//! External platforms the relay talks to.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// One of the two SaaS systems on either side of the relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// Document-signing platform
    Docuseal,
    /// Workflow-automation platform
    N8n,
}

impl Platform {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Platform::Docuseal => "docuseal",
            Platform::N8n => "n8n",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown platform '{0}'")]
pub struct UnknownPlatform(pub String);

impl FromStr for Platform {
    type Err = UnknownPlatform;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "docuseal" => Ok(Platform::Docuseal),
            "n8n" => Ok(Platform::N8n),
            other => Err(UnknownPlatform(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_round_trips_through_path_segment() {
        for platform in [Platform::Docuseal, Platform::N8n] {
            assert_eq!(platform.as_str().parse::<Platform>(), Ok(platform));
        }
        assert!("slack".parse::<Platform>().is_err());
    }
}
