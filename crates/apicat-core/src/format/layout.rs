//! Container constants, table order and row field offsets.
//!
//! All integers are little-endian.  References between rows are 4-byte byte
//! offsets into the target table; `NIL` marks an absent reference.

pub const MAGIC: &[u8; 8] = b"APICATFB";
pub const FORMAT_VERSION: i32 = 1;
pub const NIL: i32 = -1;

/// Tables in on-disk order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TableId {
    Strings,
    Blobs,
    Platforms,
    Frameworks,
    Packages,
    Assemblies,
    UsageSources,
    Apis,
    RootApis,
    ExtensionMethods,
    Obsoletions,
    PlatformSupport,
    PreviewRequirements,
    Experimentals,
}

impl TableId {
    pub const COUNT: usize = 14;

    pub const ALL: [TableId; TableId::COUNT] = [
        TableId::Strings,
        TableId::Blobs,
        TableId::Platforms,
        TableId::Frameworks,
        TableId::Packages,
        TableId::Assemblies,
        TableId::UsageSources,
        TableId::Apis,
        TableId::RootApis,
        TableId::ExtensionMethods,
        TableId::Obsoletions,
        TableId::PlatformSupport,
        TableId::PreviewRequirements,
        TableId::Experimentals,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            TableId::Strings => "strings",
            TableId::Blobs => "blobs",
            TableId::Platforms => "platforms",
            TableId::Frameworks => "frameworks",
            TableId::Packages => "packages",
            TableId::Assemblies => "assemblies",
            TableId::UsageSources => "usage_sources",
            TableId::Apis => "apis",
            TableId::RootApis => "root_apis",
            TableId::ExtensionMethods => "extension_methods",
            TableId::Obsoletions => "obsoletions",
            TableId::PlatformSupport => "platform_support",
            TableId::PreviewRequirements => "preview_requirements",
            TableId::Experimentals => "experimentals",
        }
    }
}

pub const OFFSET_SIZE: usize = 4;
pub const FINGERPRINT_SIZE: usize = 16;

pub mod platform_row {
    pub const NAME: usize = 0;
    pub const SIZE: usize = 4;
}

pub mod framework_row {
    pub const NAME: usize = 0;
    pub const ASSEMBLIES: usize = 4;
}

pub mod package_row {
    pub const FINGERPRINT: usize = 0;
    pub const NAME: usize = 16;
    pub const VERSION: usize = 20;
    /// count, then (framework, assembly) pairs
    pub const ASSEMBLIES: usize = 24;
    pub const ENTRY_SIZE: usize = 8;
}

pub mod assembly_row {
    pub const FINGERPRINT: usize = 0;
    pub const NAME: usize = 16;
    pub const PUBLIC_KEY_TOKEN: usize = 20;
    pub const VERSION: usize = 24;
    /// count, root APIs; count, frameworks; count, (package, framework) pairs
    pub const ROOT_APIS: usize = 28;
    pub const PACKAGE_ENTRY_SIZE: usize = 8;
}

pub mod usage_source_row {
    pub const NAME: usize = 0;
    pub const DAY_NUMBER: usize = 4;
    pub const SIZE: usize = 8;
}

pub mod api_row {
    pub const FINGERPRINT: usize = 0;
    pub const KIND: usize = 16;
    pub const PARENT: usize = 17;
    pub const NAME: usize = 21;
    /// count, children; count, (assembly, syntax) pairs; count, (source, percentage) pairs
    pub const CHILDREN: usize = 25;
    pub const DECLARATION_SIZE: usize = 8;
    pub const USAGE_SIZE: usize = 8;
}

pub mod extension_row {
    pub const FINGERPRINT: usize = 0;
    pub const EXTENDED_TYPE: usize = 16;
    pub const METHOD: usize = 20;
    pub const SIZE: usize = 24;
}

/// Leading key shared by every annotation table.
pub mod annotation_row {
    pub const API: usize = 0;
    pub const ASSEMBLY: usize = 4;
}

pub mod obsoletion_row {
    pub const MESSAGE: usize = 8;
    pub const IS_ERROR: usize = 12;
    pub const DIAGNOSTIC_ID: usize = 13;
    pub const URL_FORMAT: usize = 17;
    pub const SIZE: usize = 21;
}

pub mod platform_support_row {
    pub const PLATFORMS: usize = 8;
    pub const SIZE: usize = 12;
    /// Blob entry: platform name, supported flag.
    pub const ENTRY_SIZE: usize = 5;
}

pub mod preview_requirement_row {
    pub const MESSAGE: usize = 8;
    pub const URL: usize = 12;
    pub const SIZE: usize = 16;
}

pub mod experimental_row {
    pub const DIAGNOSTIC_ID: usize = 8;
    pub const URL_FORMAT: usize = 12;
    pub const SIZE: usize = 16;
}

/// Syntax blob token: kind, text, reference.
pub mod syntax_token {
    pub const KIND: usize = 0;
    pub const TEXT: usize = 1;
    pub const REFERENCE: usize = 5;
    pub const SIZE: usize = 9;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_order_is_dense() {
        for (i, table) in TableId::ALL.iter().enumerate() {
            assert_eq!(table.index(), i);
        }
        assert_eq!(TableId::ALL.len(), TableId::COUNT);
    }

    #[test]
    fn test_api_name_offset() {
        assert_eq!(api_row::NAME, FINGERPRINT_SIZE + 1 + OFFSET_SIZE);
    }
}
