//! Shared typed models used across the builder, the writer and the reader.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

use crate::errors::CatalogError;

// ---------------------------------------------------------------------------
// Fingerprint
// ---------------------------------------------------------------------------

/// Content-derived 128-bit identity of an API, assembly, package or
/// extension link.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Fingerprint(pub [u8; 16]);

impl Fingerprint {
    pub const LEN: usize = 16;

    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Derive a fingerprint from text: the first 16 bytes of its SHA-256.
    pub fn of(text: &str) -> Self {
        let digest = Sha256::digest(text.as_bytes());
        let mut bytes = [0u8; 16];
        bytes.copy_from_slice(&digest[..16]);
        Self(bytes)
    }

    /// Fingerprint of a package identity.
    pub fn of_package(name: &str, version: &str) -> Self {
        Self::of(&format!("{name}/{version}"))
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in &self.0 {
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({self})")
    }
}

impl FromStr for Fingerprint {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex: Vec<u8> = s
            .trim()
            .trim_start_matches('{')
            .trim_end_matches('}')
            .bytes()
            .filter(|b| *b != b'-')
            .collect();
        if hex.len() != 32 {
            return Err(CatalogError::InvalidFingerprint(s.to_string()));
        }
        let mut bytes = [0u8; 16];
        for (i, pair) in hex.chunks(2).enumerate() {
            let hi = hex_value(pair[0]);
            let lo = hex_value(pair[1]);
            match (hi, lo) {
                (Some(hi), Some(lo)) => bytes[i] = (hi << 4) | lo,
                _ => return Err(CatalogError::InvalidFingerprint(s.to_string())),
            }
        }
        Ok(Self(bytes))
    }
}

fn hex_value(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

impl Serialize for Fingerprint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Fingerprint {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// ApiKind
// ---------------------------------------------------------------------------

/// Kind of an API; the discriminant is the byte stored on disk.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum ApiKind {
    Namespace = 0,
    Interface = 1,
    Delegate = 2,
    Enum = 3,
    Struct = 4,
    Class = 5,
    Constant = 6,
    EnumItem = 7,
    Field = 8,
    Constructor = 9,
    Destructor = 10,
    Property = 11,
    PropertyGetter = 12,
    PropertySetter = 13,
    Method = 14,
    Operator = 15,
    Event = 16,
    EventAdder = 17,
    EventRemover = 18,
    EventRaiser = 19,
}

impl ApiKind {
    pub fn is_type(self) -> bool {
        matches!(
            self,
            ApiKind::Interface | ApiKind::Delegate | ApiKind::Enum | ApiKind::Struct | ApiKind::Class
        )
    }

    pub fn is_member(self) -> bool {
        (self as u8) >= ApiKind::Constant as u8
    }

    pub fn is_accessor(self) -> bool {
        matches!(
            self,
            ApiKind::PropertyGetter
                | ApiKind::PropertySetter
                | ApiKind::EventAdder
                | ApiKind::EventRemover
                | ApiKind::EventRaiser
        )
    }

    /// Decode a stored discriminant; the reader trusts the writer here.
    pub(crate) fn from_stored(value: u8) -> Self {
        ApiKind::try_from(value).unwrap_or(ApiKind::Namespace)
    }
}

impl TryFrom<u8> for ApiKind {
    type Error = CatalogError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        let kind = match value {
            0 => ApiKind::Namespace,
            1 => ApiKind::Interface,
            2 => ApiKind::Delegate,
            3 => ApiKind::Enum,
            4 => ApiKind::Struct,
            5 => ApiKind::Class,
            6 => ApiKind::Constant,
            7 => ApiKind::EnumItem,
            8 => ApiKind::Field,
            9 => ApiKind::Constructor,
            10 => ApiKind::Destructor,
            11 => ApiKind::Property,
            12 => ApiKind::PropertyGetter,
            13 => ApiKind::PropertySetter,
            14 => ApiKind::Method,
            15 => ApiKind::Operator,
            16 => ApiKind::Event,
            17 => ApiKind::EventAdder,
            18 => ApiKind::EventRemover,
            19 => ApiKind::EventRaiser,
            other => return Err(CatalogError::Format(format!("unknown API kind {other}"))),
        };
        Ok(kind)
    }
}

// ---------------------------------------------------------------------------
// Markup tokens
// ---------------------------------------------------------------------------

/// Kind of a declaration syntax token; the discriminant is stored on disk.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MarkupTokenKind {
    Whitespace = 0,
    LiteralNumber = 1,
    LiteralString = 2,
    Punctuation = 3,
    Keyword = 4,
    TypeReference = 5,
    Reference = 6,
}

impl MarkupTokenKind {
    pub(crate) fn from_stored(value: u8) -> Self {
        match value {
            0 => MarkupTokenKind::Whitespace,
            1 => MarkupTokenKind::LiteralNumber,
            2 => MarkupTokenKind::LiteralString,
            4 => MarkupTokenKind::Keyword,
            5 => MarkupTokenKind::TypeReference,
            6 => MarkupTokenKind::Reference,
            _ => MarkupTokenKind::Punctuation,
        }
    }
}

// ---------------------------------------------------------------------------
// Annotation values (builder side)
// ---------------------------------------------------------------------------

/// `[Obsolete]`-style annotation on a declaration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Obsoletion {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub is_error: bool,
    #[serde(default)]
    pub diagnostic_id: Option<String>,
    #[serde(default)]
    pub url_format: Option<String>,
}

/// One platform entry of a platform-support annotation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformSupportEntry {
    pub platform: String,
    pub is_supported: bool,
}

/// Preview-feature requirement on an assembly or declaration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewRequirement {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub url: Option<String>,
}

/// Experimental flag on an assembly or declaration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Experimental {
    pub diagnostic_id: String,
    #[serde(default)]
    pub url_format: Option<String>,
}

// ---------------------------------------------------------------------------
// Dates
// ---------------------------------------------------------------------------

/// Days since 0001-01-01 (day 0).
pub fn day_number(date: NaiveDate) -> i32 {
    use chrono::Datelike;
    date.num_days_from_ce() - 1
}

pub fn date_from_day_number(day: i32) -> Option<NaiveDate> {
    NaiveDate::from_num_days_from_ce_opt(day.checked_add(1)?)
}

/// Expand a `{0}` placeholder in a diagnostic URL format.
pub fn format_diagnostic_url(url_format: &str, diagnostic_id: Option<&str>) -> String {
    url_format.replace("{0}", diagnostic_id.unwrap_or_default())
}
