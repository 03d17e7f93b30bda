use anyhow::{anyhow, Result};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Ranch {
    Redhat,
    Public,
}

impl Ranch {
    pub fn parse(value: &str) -> Result<Self> {
        match value.trim() {
            "redhat" => Ok(Self::Redhat),
            "public" => Ok(Self::Public),
            other => Err(anyhow!(
                "invalid ranch `{other}` (expected redhat or public)"
            )),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Redhat => "redhat",
            Self::Public => "public",
        }
    }
}

impl Default for Ranch {
    fn default() -> Self {
        Self::Public
    }
}

// Hide compose regexes in the listing and also the deprecated
// architecture-suffixed entries.
pub fn filter_composes(names: Vec<String>) -> Vec<String> {
    names
        .into_iter()
        .filter(|name| {
            !name.contains('\\')
                && !name.contains('+')
                && !name.contains('*')
                && !name.contains("aarch64")
        })
        .collect()
}
