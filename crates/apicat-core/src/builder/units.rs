//! Input records produced by the extraction and crawling stages.
//!
//! One unit describes either a framework's or a package's indexed surface, or
//! one usage measurement.  Units arrive as JSON documents tagged by `type`.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::{
    ApiKind, Experimental, Fingerprint, Obsoletion, PlatformSupportEntry, PreviewRequirement,
};

/// Any unit file.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UnitFile {
    Framework(IndexUnit),
    Package(IndexUnit),
    Usage(UsageUnit),
}

/// Where the assemblies of an [`IndexUnit`] ship.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UnitSource {
    Package { package: String, version: String },
    Framework { framework: String },
}

/// Indexed record set of one framework or package.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IndexUnit {
    #[serde(flatten)]
    pub source: UnitSource,
    #[serde(default)]
    pub platforms: Vec<String>,
    #[serde(default)]
    pub assemblies: Vec<AssemblyRecord>,
    #[serde(default)]
    pub apis: Vec<ApiRecord>,
    #[serde(default)]
    pub declarations: Vec<DeclarationRecord>,
    #[serde(default)]
    pub obsoletions: Vec<ObsoletionRecord>,
    #[serde(default)]
    pub platform_support: Vec<PlatformSupportRecord>,
    #[serde(default)]
    pub preview_requirements: Vec<PreviewRequirementRecord>,
    #[serde(default)]
    pub experimentals: Vec<ExperimentalRecord>,
    #[serde(default)]
    pub extensions: Vec<ExtensionRecord>,
}

impl IndexUnit {
    pub fn for_framework(name: &str) -> Self {
        Self::empty(UnitSource::Framework {
            framework: name.to_string(),
        })
    }

    pub fn for_package(name: &str, version: &str) -> Self {
        Self::empty(UnitSource::Package {
            package: name.to_string(),
            version: version.to_string(),
        })
    }

    fn empty(source: UnitSource) -> Self {
        Self {
            source,
            platforms: Vec::new(),
            assemblies: Vec::new(),
            apis: Vec::new(),
            declarations: Vec::new(),
            obsoletions: Vec::new(),
            platform_support: Vec::new(),
            preview_requirements: Vec::new(),
            experimentals: Vec::new(),
            extensions: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AssemblyRecord {
    pub fingerprint: Fingerprint,
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub public_key_token: String,
    /// Target framework folders; only meaningful in package units.
    #[serde(default)]
    pub frameworks: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApiRecord {
    pub fingerprint: Fingerprint,
    pub kind: ApiKind,
    #[serde(default)]
    pub parent: Option<Fingerprint>,
    pub name: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeclarationRecord {
    pub assembly: Fingerprint,
    pub api: Fingerprint,
    pub syntax: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ObsoletionRecord {
    pub api: Fingerprint,
    pub assembly: Fingerprint,
    #[serde(flatten)]
    pub obsoletion: Obsoletion,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PlatformSupportRecord {
    #[serde(default)]
    pub api: Option<Fingerprint>,
    pub assembly: Fingerprint,
    pub platforms: Vec<PlatformSupportEntry>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PreviewRequirementRecord {
    #[serde(default)]
    pub api: Option<Fingerprint>,
    pub assembly: Fingerprint,
    #[serde(flatten)]
    pub requirement: PreviewRequirement,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExperimentalRecord {
    #[serde(default)]
    pub api: Option<Fingerprint>,
    pub assembly: Fingerprint,
    #[serde(flatten)]
    pub experimental: Experimental,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExtensionRecord {
    pub fingerprint: Fingerprint,
    pub extended_type: Fingerprint,
    pub method: Fingerprint,
}

/// One dated usage measurement.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UsageUnit {
    pub name: String,
    pub date: NaiveDate,
    #[serde(default)]
    pub usages: Vec<UsageRecord>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UsageRecord {
    pub api: Fingerprint,
    pub percentage: f32,
}
