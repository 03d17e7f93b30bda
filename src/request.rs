use std::collections::BTreeMap;

use anyhow::{anyhow, Result};
use serde::Serialize;

pub const DEFAULT_GIT_REF: &str = "main";
pub const DEFAULT_METADATA_ROOT_DIR: &str = ".";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Architecture {
    X86_64,
    Aarch64,
    Ppc64le,
    S390x,
}

impl Architecture {
    pub fn parse(value: &str) -> Result<Self> {
        match value.trim() {
            "x86_64" => Ok(Self::X86_64),
            "aarch64" => Ok(Self::Aarch64),
            "ppc64le" => Ok(Self::Ppc64le),
            "s390x" => Ok(Self::S390x),
            other => Err(anyhow!(
                "invalid architecture `{other}` (expected x86_64, aarch64, ppc64le or s390x)"
            )),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::X86_64 => "x86_64",
            Self::Aarch64 => "aarch64",
            Self::Ppc64le => "ppc64le",
            Self::S390x => "s390x",
        }
    }
}

impl Default for Architecture {
    fn default() -> Self {
        Self::X86_64
    }
}

#[derive(Debug, Clone)]
pub struct SubmitParams {
    pub url: String,
    pub compose: String,
    pub git_ref: String,
    pub metadata_root_dir: String,
    pub arch: Architecture,
    pub plan_name: Option<String>,
    pub test_name: Option<String>,
    pub context: BTreeMap<String, String>,
    pub environment: BTreeMap<String, String>,
}

impl SubmitParams {
    pub fn new(url: impl Into<String>, compose: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            compose: compose.into(),
            git_ref: DEFAULT_GIT_REF.to_owned(),
            metadata_root_dir: DEFAULT_METADATA_ROOT_DIR.to_owned(),
            arch: Architecture::default(),
            plan_name: None,
            test_name: None,
            context: BTreeMap::new(),
            environment: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmitPayload {
    pub test: TestSection,
    pub environments: Vec<EnvironmentSection>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestSection {
    pub tmt: TmtTestSection,
}

// test_name/name stay in the payload as explicit nulls when unset; Testing
// Farm treats null the same as "unselected".
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TmtTestSection {
    pub url: String,
    #[serde(rename = "ref")]
    pub git_ref: String,
    pub path: String,
    pub test_name: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnvironmentSection {
    pub arch: Architecture,
    pub os: OsSection,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tmt: Option<TmtEnvironmentSection>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OsSection {
    pub compose: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TmtEnvironmentSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment: Option<BTreeMap<String, String>>,
}

pub fn build_payload(params: &SubmitParams) -> SubmitPayload {
    let tmt = if params.context.is_empty() && params.environment.is_empty() {
        None
    } else {
        Some(TmtEnvironmentSection {
            context: (!params.context.is_empty()).then(|| params.context.clone()),
            environment: (!params.environment.is_empty()).then(|| params.environment.clone()),
        })
    };

    SubmitPayload {
        test: TestSection {
            tmt: TmtTestSection {
                url: params.url.clone(),
                git_ref: params.git_ref.clone(),
                path: params.metadata_root_dir.clone(),
                test_name: params.test_name.clone(),
                name: params.plan_name.clone(),
            },
        },
        environments: vec![EnvironmentSection {
            arch: params.arch,
            os: OsSection {
                compose: params.compose.clone(),
            },
            tmt,
        }],
    }
}
