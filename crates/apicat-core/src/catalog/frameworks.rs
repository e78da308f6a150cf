//! Target framework folder names.
//!
//! Package assets live in folders named after the framework they target
//! (`net6.0`, `netstandard2.0`, `net462`, ...).  To decide which folder a
//! given framework would consume, folders are parsed into a family, a version
//! and an optional platform, then compared with the usual compatibility and
//! "nearest" rules.  Portable profiles are recognised only so that they can
//! be excluded.

use std::cmp::Ordering;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

static NET_FRAMEWORK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^net(\d)(\d)(\d)?$").unwrap());
static NET_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^net(\d+)\.(\d+)(?:-([a-z]+)(\d+(?:\.\d+)*)?)?$").unwrap()
});
static NETCOREAPP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^netcoreapp(\d+)\.(\d+)$").unwrap());
static NETSTANDARD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^netstandard(\d+)\.(\d+)$").unwrap());
static UAP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^uap(\d+)(?:\.(\d+))?(?:\.(\d+))?").unwrap());
static NETCORE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^netcore(\d)(\d)(\d)?$").unwrap());

/// (major, minor, patch)
pub type FrameworkVersion = (u32, u32, u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FrameworkFamily {
    NetFramework,
    /// .NET Core and .NET 5+.
    NetCoreApp,
    NetStandard,
    Uap,
    /// Windows Store (`netcore45`, `netcore50`).
    NetCore,
    Portable,
    Other,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TargetFramework {
    pub folder: String,
    pub family: FrameworkFamily,
    pub version: FrameworkVersion,
    pub platform: Option<String>,
    pub platform_version: FrameworkVersion,
}

fn number(captures: &regex::Captures<'_>, group: usize) -> u32 {
    captures
        .get(group)
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(0)
}

fn dotted_version(text: &str) -> FrameworkVersion {
    let mut parts = text.split('.').map(|p| p.parse::<u32>().unwrap_or(0));
    (
        parts.next().unwrap_or(0),
        parts.next().unwrap_or(0),
        parts.next().unwrap_or(0),
    )
}

impl TargetFramework {
    pub fn parse(folder: &str) -> TargetFramework {
        let folder = folder.trim().to_ascii_lowercase();
        let mut framework = TargetFramework {
            folder: folder.clone(),
            family: FrameworkFamily::Other,
            version: (0, 0, 0),
            platform: None,
            platform_version: (0, 0, 0),
        };

        if folder.starts_with("portable") {
            framework.family = FrameworkFamily::Portable;
        } else if let Some(c) = NET_FRAMEWORK_RE.captures(&folder) {
            framework.family = FrameworkFamily::NetFramework;
            framework.version = (number(&c, 1), number(&c, 2), number(&c, 3));
        } else if let Some(c) = NET_RE.captures(&folder) {
            let major = number(&c, 1);
            if major >= 5 {
                framework.family = FrameworkFamily::NetCoreApp;
                framework.version = (major, number(&c, 2), 0);
                framework.platform = c.get(3).map(|m| m.as_str().to_string());
                framework.platform_version = c
                    .get(4)
                    .map_or((0, 0, 0), |m| dotted_version(m.as_str()));
            }
        } else if let Some(c) = NETCOREAPP_RE.captures(&folder) {
            framework.family = FrameworkFamily::NetCoreApp;
            framework.version = (number(&c, 1), number(&c, 2), 0);
        } else if let Some(c) = NETSTANDARD_RE.captures(&folder) {
            framework.family = FrameworkFamily::NetStandard;
            framework.version = (number(&c, 1), number(&c, 2), 0);
        } else if let Some(c) = UAP_RE.captures(&folder) {
            framework.family = FrameworkFamily::Uap;
            framework.version = (number(&c, 1), number(&c, 2), number(&c, 3));
        } else if let Some(c) = NETCORE_RE.captures(&folder) {
            framework.family = FrameworkFamily::NetCore;
            framework.version = (number(&c, 1), number(&c, 2), number(&c, 3));
        }
        framework
    }

    pub fn is_portable(&self) -> bool {
        self.family == FrameworkFamily::Portable
    }

    /// Highest .NET Standard version this framework implements.
    pub fn netstandard_support(&self) -> Option<FrameworkVersion> {
        let v = self.version;
        match self.family {
            FrameworkFamily::NetStandard => Some(v),
            FrameworkFamily::NetCoreApp if v >= (3, 0, 0) => Some((2, 1, 0)),
            FrameworkFamily::NetCoreApp if v >= (2, 0, 0) => Some((2, 0, 0)),
            FrameworkFamily::NetCoreApp => Some((1, 6, 0)),
            FrameworkFamily::NetFramework if v >= (4, 6, 1) => Some((2, 0, 0)),
            FrameworkFamily::NetFramework if v >= (4, 6, 0) => Some((1, 3, 0)),
            FrameworkFamily::NetFramework if v >= (4, 5, 1) => Some((1, 2, 0)),
            FrameworkFamily::NetFramework if v >= (4, 5, 0) => Some((1, 1, 0)),
            FrameworkFamily::Uap if v >= (10, 0, 0) => Some((1, 4, 0)),
            FrameworkFamily::NetCore if v >= (5, 0, 0) => Some((1, 4, 0)),
            FrameworkFamily::NetCore if v >= (4, 5, 1) => Some((1, 2, 0)),
            FrameworkFamily::NetCore if v >= (4, 5, 0) => Some((1, 1, 0)),
            _ => None,
        }
    }

    /// Whether a project targeting `self` can consume assets built for `asset`.
    pub fn is_compatible_with(&self, asset: &TargetFramework) -> bool {
        if self.is_portable() || asset.is_portable() {
            return false;
        }
        if self.family == FrameworkFamily::Other || asset.family == FrameworkFamily::Other {
            return self.folder == asset.folder;
        }
        if self.family == asset.family {
            if asset.version > self.version {
                return false;
            }
            return match &asset.platform {
                None => true,
                Some(platform) => {
                    self.platform.as_ref() == Some(platform)
                        && asset.platform_version <= self.platform_version
                }
            };
        }
        asset.family == FrameworkFamily::NetStandard
            && self
                .netstandard_support()
                .is_some_and(|supported| asset.version <= supported)
    }

    /// Index of the compatible folder in `candidates` a project targeting
    /// `self` would pick, if any.
    ///
    /// Same-family folders beat .NET Standard ones, which beat anything else;
    /// then an exact platform match wins; then the highest version.  Ties keep
    /// the earliest candidate.
    pub fn nearest(&self, candidates: &[TargetFramework]) -> Option<usize> {
        let mut best: Option<(usize, (u8, bool, FrameworkVersion, FrameworkVersion))> = None;
        for (index, candidate) in candidates.iter().enumerate() {
            if !self.is_compatible_with(candidate) {
                continue;
            }
            let key = (
                self.tier(candidate),
                candidate.platform.is_some() && candidate.platform == self.platform,
                candidate.version,
                candidate.platform_version,
            );
            let better = match &best {
                None => true,
                Some((_, best_key)) => key.cmp(best_key) == Ordering::Greater,
            };
            if better {
                best = Some((index, key));
            }
        }
        best.map(|(index, _)| index)
    }

    fn tier(&self, candidate: &TargetFramework) -> u8 {
        if candidate.family == self.family {
            2
        } else if candidate.family == FrameworkFamily::NetStandard {
            1
        } else {
            0
        }
    }
}

impl fmt::Display for TargetFramework {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.folder)
    }
}
