//! Entity handles over a loaded [`Catalog`].
//!
//! Each handle is a catalog reference plus a row offset.  Two handles are
//! equal when they point into the same catalog at the same offset.  All
//! accessors are offset arithmetic against the catalog buffer; collections
//! are lazy iterators that can be restarted by calling the accessor again.

use std::fmt;
use std::hash::{Hash, Hasher};

use chrono::NaiveDate;

use super::{api_declarations_position, api_usages_position, Catalog};
use super::{assembly_frameworks_position, assembly_packages_position};
use crate::builder::markup::{Markup, MarkupToken};
use crate::format::layout::{
    api_row, assembly_row, experimental_row, extension_row, framework_row,
    obsoletion_row, package_row, platform_row, platform_support_row, preview_requirement_row,
    syntax_token, usage_source_row, TableId, OFFSET_SIZE,
};
use crate::models::{
    date_from_day_number, format_diagnostic_url, ApiKind, Fingerprint, MarkupTokenKind,
    PlatformSupportEntry,
};

macro_rules! handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy)]
        pub struct $name<'a> {
            catalog: &'a Catalog,
            offset: u32,
        }

        impl<'a> $name<'a> {
            pub(crate) fn new(catalog: &'a Catalog, offset: u32) -> Self {
                Self { catalog, offset }
            }

            pub fn catalog(&self) -> &'a Catalog {
                self.catalog
            }

            /// Row offset; unique per entity within one catalog.
            pub fn offset(&self) -> u32 {
                self.offset
            }

            fn at(&self, field: usize) -> usize {
                self.offset as usize + field
            }
        }

        impl PartialEq for $name<'_> {
            fn eq(&self, other: &Self) -> bool {
                std::ptr::eq(self.catalog, other.catalog) && self.offset == other.offset
            }
        }

        impl Eq for $name<'_> {}

        impl Hash for $name<'_> {
            fn hash<H: Hasher>(&self, state: &mut H) {
                (self.catalog as *const Catalog).hash(state);
                self.offset.hash(state);
            }
        }

        impl fmt::Debug for $name<'_> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "@{}"), self.offset)
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Platforms, frameworks, packages
// ---------------------------------------------------------------------------

handle!(PlatformModel);

impl<'a> PlatformModel<'a> {
    pub fn name(&self) -> &'a str {
        self.catalog.string_at(TableId::Platforms, self.at(platform_row::NAME))
    }
}

handle!(FrameworkModel);

impl<'a> FrameworkModel<'a> {
    pub fn name(&self) -> &'a str {
        self.catalog.string_at(TableId::Frameworks, self.at(framework_row::NAME))
    }

    /// Assemblies shipped in-box.
    pub fn assemblies(&self) -> impl ExactSizeIterator<Item = AssemblyModel<'a>> + Clone + 'a {
        let catalog = self.catalog;
        let start = self.at(framework_row::ASSEMBLIES);
        let count = catalog.count_at(TableId::Frameworks, start);
        (0..count).map(move |i| {
            let position = start + OFFSET_SIZE + i * OFFSET_SIZE;
            AssemblyModel::new(catalog, catalog.offset_at(TableId::Frameworks, position))
        })
    }
}

handle!(PackageModel);

impl<'a> PackageModel<'a> {
    pub fn fingerprint(&self) -> Fingerprint {
        self.catalog
            .fingerprint_at(TableId::Packages, self.at(package_row::FINGERPRINT))
    }

    pub fn name(&self) -> &'a str {
        self.catalog.string_at(TableId::Packages, self.at(package_row::NAME))
    }

    pub fn version(&self) -> &'a str {
        self.catalog.string_at(TableId::Packages, self.at(package_row::VERSION))
    }

    /// (target framework folder, assembly) pairs.
    pub fn assemblies(
        &self,
    ) -> impl ExactSizeIterator<Item = (FrameworkModel<'a>, AssemblyModel<'a>)> + Clone + 'a {
        let catalog = self.catalog;
        let start = self.at(package_row::ASSEMBLIES);
        let count = catalog.count_at(TableId::Packages, start);
        (0..count).map(move |i| {
            let position = start + OFFSET_SIZE + i * package_row::ENTRY_SIZE;
            (
                FrameworkModel::new(catalog, catalog.offset_at(TableId::Packages, position)),
                AssemblyModel::new(catalog, catalog.offset_at(TableId::Packages, position + 4)),
            )
        })
    }
}

// ---------------------------------------------------------------------------
// Assemblies
// ---------------------------------------------------------------------------

handle!(AssemblyModel);

impl<'a> AssemblyModel<'a> {
    pub fn fingerprint(&self) -> Fingerprint {
        self.catalog
            .fingerprint_at(TableId::Assemblies, self.at(assembly_row::FINGERPRINT))
    }

    pub fn name(&self) -> &'a str {
        self.catalog.string_at(TableId::Assemblies, self.at(assembly_row::NAME))
    }

    pub fn public_key_token(&self) -> &'a str {
        self.catalog
            .string_at(TableId::Assemblies, self.at(assembly_row::PUBLIC_KEY_TOKEN))
    }

    pub fn version(&self) -> &'a str {
        self.catalog.string_at(TableId::Assemblies, self.at(assembly_row::VERSION))
    }

    pub fn root_apis(&self) -> impl ExactSizeIterator<Item = ApiModel<'a>> + Clone + 'a {
        let catalog = self.catalog;
        let start = self.at(assembly_row::ROOT_APIS);
        let count = catalog.count_at(TableId::Assemblies, start);
        (0..count).map(move |i| {
            let position = start + OFFSET_SIZE + i * OFFSET_SIZE;
            ApiModel::new(catalog, catalog.offset_at(TableId::Assemblies, position))
        })
    }

    pub fn frameworks(&self) -> impl ExactSizeIterator<Item = FrameworkModel<'a>> + Clone + 'a {
        let catalog = self.catalog;
        let start = assembly_frameworks_position(catalog, self.offset as usize);
        let count = catalog.count_at(TableId::Assemblies, start);
        (0..count).map(move |i| {
            let position = start + OFFSET_SIZE + i * OFFSET_SIZE;
            FrameworkModel::new(catalog, catalog.offset_at(TableId::Assemblies, position))
        })
    }

    /// (package, target framework folder) pairs.
    pub fn packages(
        &self,
    ) -> impl ExactSizeIterator<Item = (PackageModel<'a>, FrameworkModel<'a>)> + Clone + 'a {
        let catalog = self.catalog;
        let start = assembly_packages_position(catalog, self.offset as usize);
        let count = catalog.count_at(TableId::Assemblies, start);
        (0..count).map(move |i| {
            let position = start + OFFSET_SIZE + i * assembly_row::PACKAGE_ENTRY_SIZE;
            (
                PackageModel::new(catalog, catalog.offset_at(TableId::Assemblies, position)),
                FrameworkModel::new(catalog, catalog.offset_at(TableId::Assemblies, position + 4)),
            )
        })
    }

    /// Assembly-level platform support.
    pub fn platform_support(&self) -> Option<PlatformSupportModel<'a>> {
        lookup_platform_support(self.catalog, None, self.offset)
    }

    /// Assembly-level preview requirement.
    pub fn preview_requirement(&self) -> Option<PreviewRequirementModel<'a>> {
        lookup_preview_requirement(self.catalog, None, self.offset)
    }

    /// Assembly-level experimental flag.
    pub fn experimental(&self) -> Option<ExperimentalModel<'a>> {
        lookup_experimental(self.catalog, None, self.offset)
    }
}

// ---------------------------------------------------------------------------
// Usage sources
// ---------------------------------------------------------------------------

handle!(UsageSourceModel);

impl<'a> UsageSourceModel<'a> {
    pub fn name(&self) -> &'a str {
        self.catalog
            .string_at(TableId::UsageSources, self.at(usage_source_row::NAME))
    }

    pub fn day_number(&self) -> i32 {
        self.catalog
            .i32_at(TableId::UsageSources, self.at(usage_source_row::DAY_NUMBER))
    }

    pub fn date(&self) -> Option<NaiveDate> {
        date_from_day_number(self.day_number())
    }
}

// ---------------------------------------------------------------------------
// APIs
// ---------------------------------------------------------------------------

handle!(ApiModel);

impl<'a> ApiModel<'a> {
    pub fn fingerprint(&self) -> Fingerprint {
        self.catalog
            .fingerprint_at(TableId::Apis, self.at(api_row::FINGERPRINT))
    }

    pub fn kind(&self) -> ApiKind {
        ApiKind::from_stored(self.catalog.u8_at(TableId::Apis, self.at(api_row::KIND)))
    }

    pub fn name(&self) -> &'a str {
        self.catalog.string_at(TableId::Apis, self.at(api_row::NAME))
    }

    pub fn parent(&self) -> Option<ApiModel<'a>> {
        self.catalog
            .optional_offset_at(TableId::Apis, self.at(api_row::PARENT))
            .map(|offset| ApiModel::new(self.catalog, offset))
    }

    /// Parent, grandparent and so on up to the root.
    pub fn ancestors(&self) -> impl Iterator<Item = ApiModel<'a>> + Clone + 'a {
        std::iter::successors(self.parent(), |api| api.parent())
    }

    pub fn children(&self) -> impl ExactSizeIterator<Item = ApiModel<'a>> + Clone + 'a {
        let catalog = self.catalog;
        let start = self.at(api_row::CHILDREN);
        let count = catalog.count_at(TableId::Apis, start);
        (0..count).map(move |i| {
            let position = start + OFFSET_SIZE + i * OFFSET_SIZE;
            ApiModel::new(catalog, catalog.offset_at(TableId::Apis, position))
        })
    }

    /// All APIs below this one, depth-first.
    pub fn descendants(&self) -> Descendants<'a> {
        let mut stack: Vec<ApiModel<'a>> = self.children().collect();
        stack.reverse();
        Descendants { stack }
    }

    pub fn declarations(
        &self,
    ) -> impl ExactSizeIterator<Item = ApiDeclarationModel<'a>> + Clone + 'a {
        let api = *self;
        let start = api_declarations_position(self.catalog, self.offset as usize);
        let count = self.catalog.count_at(TableId::Apis, start);
        (0..count).map(move |i| ApiDeclarationModel {
            api,
            position: (start + OFFSET_SIZE + i * api_row::DECLARATION_SIZE) as u32,
        })
    }

    /// Declaration in `assembly`, if any.
    pub fn declaration_in(&self, assembly: AssemblyModel<'a>) -> Option<ApiDeclarationModel<'a>> {
        self.declarations().find(|d| d.assembly() == assembly)
    }

    pub fn usages(&self) -> impl ExactSizeIterator<Item = ApiUsageModel<'a>> + Clone + 'a {
        let api = *self;
        let start = api_usages_position(self.catalog, self.offset as usize);
        let count = self.catalog.count_at(TableId::Apis, start);
        (0..count).map(move |i| ApiUsageModel {
            api,
            position: (start + OFFSET_SIZE + i * api_row::USAGE_SIZE) as u32,
        })
    }

    /// Dotted name from the root namespace down to this API.
    pub fn full_name(&self) -> String {
        let mut names: Vec<&str> = self.ancestors().map(|a| a.name()).collect();
        names.reverse();
        names.push(self.name());
        names.join(".")
    }

    /// Extension methods whose extended type is this API.
    pub fn extension_methods(
        &self,
    ) -> impl ExactSizeIterator<Item = ExtensionMethodModel<'a>> + Clone + 'a {
        let catalog = self.catalog;
        let rows = super::annotations::extension_rows(
            catalog.table(TableId::ExtensionMethods),
            self.offset as i32,
        );
        rows.map(move |i| ExtensionMethodModel::new(catalog, (i * extension_row::SIZE) as u32))
    }

    pub fn is_extension_method(&self) -> bool {
        self.catalog.is_extension_method_at(self.offset)
    }
}

/// Depth-first walk below an API.
#[derive(Clone, Debug)]
pub struct Descendants<'a> {
    stack: Vec<ApiModel<'a>>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = ApiModel<'a>;

    fn next(&mut self) -> Option<ApiModel<'a>> {
        let api = self.stack.pop()?;
        let mark = self.stack.len();
        self.stack.extend(api.children());
        self.stack[mark..].reverse();
        Some(api)
    }
}

// ---------------------------------------------------------------------------
// Declarations and usages
// ---------------------------------------------------------------------------

/// One (API, assembly) declaration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ApiDeclarationModel<'a> {
    api: ApiModel<'a>,
    position: u32,
}

impl<'a> ApiDeclarationModel<'a> {
    pub fn api(&self) -> ApiModel<'a> {
        self.api
    }

    pub fn assembly(&self) -> AssemblyModel<'a> {
        let catalog = self.api.catalog;
        AssemblyModel::new(catalog, catalog.offset_at(TableId::Apis, self.position as usize))
    }

    fn syntax_offset(&self) -> usize {
        self.api
            .catalog
            .offset_at(TableId::Apis, self.position as usize + 4) as usize
    }

    pub fn tokens(&self) -> impl ExactSizeIterator<Item = SyntaxTokenModel<'a>> + Clone + 'a {
        let catalog = self.api.catalog;
        let start = self.syntax_offset();
        let count = catalog.count_at(TableId::Blobs, start);
        (0..count).map(move |i| SyntaxTokenModel {
            catalog,
            position: (start + OFFSET_SIZE + i * syntax_token::SIZE) as u32,
        })
    }

    /// Token stream with references resolved back to fingerprints.
    pub fn markup(&self) -> Markup {
        let tokens = self
            .tokens()
            .map(|token| MarkupToken {
                kind: token.kind(),
                text: token.text().to_string(),
                reference: token.reference().map(|api| api.fingerprint()),
            })
            .collect();
        Markup { tokens }
    }

    pub fn syntax_text(&self) -> String {
        self.tokens().map(|token| token.text()).collect()
    }

    pub fn obsoletion(&self) -> Option<ObsoletionModel<'a>> {
        let catalog = self.api.catalog;
        catalog
            .find_annotation(
                TableId::Obsoletions,
                obsoletion_row::SIZE,
                Some(self.api.offset),
                self.assembly().offset,
            )
            .map(|offset| ObsoletionModel::new(catalog, offset))
    }

    /// Platform support of this declaration, falling back to the assembly's.
    pub fn platform_support(&self) -> Option<PlatformSupportModel<'a>> {
        let assembly = self.assembly();
        lookup_platform_support(self.api.catalog, Some(self.api.offset), assembly.offset)
            .or_else(|| assembly.platform_support())
    }

    /// Preview requirement of this declaration, falling back to the assembly's.
    pub fn preview_requirement(&self) -> Option<PreviewRequirementModel<'a>> {
        let assembly = self.assembly();
        lookup_preview_requirement(self.api.catalog, Some(self.api.offset), assembly.offset)
            .or_else(|| assembly.preview_requirement())
    }

    /// Experimental flag of this declaration, falling back to the assembly's.
    pub fn experimental(&self) -> Option<ExperimentalModel<'a>> {
        let assembly = self.assembly();
        lookup_experimental(self.api.catalog, Some(self.api.offset), assembly.offset)
            .or_else(|| assembly.experimental())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ApiUsageModel<'a> {
    api: ApiModel<'a>,
    position: u32,
}

impl<'a> ApiUsageModel<'a> {
    pub fn api(&self) -> ApiModel<'a> {
        self.api
    }

    pub fn usage_source(&self) -> UsageSourceModel<'a> {
        let catalog = self.api.catalog;
        UsageSourceModel::new(catalog, catalog.offset_at(TableId::Apis, self.position as usize))
    }

    pub fn percentage(&self) -> f32 {
        self.api
            .catalog
            .f32_at(TableId::Apis, self.position as usize + 4)
    }
}

/// One token of a stored syntax blob.
#[derive(Clone, Copy)]
pub struct SyntaxTokenModel<'a> {
    catalog: &'a Catalog,
    position: u32,
}

impl<'a> SyntaxTokenModel<'a> {
    fn at(&self, field: usize) -> usize {
        self.position as usize + field
    }

    pub fn kind(&self) -> MarkupTokenKind {
        MarkupTokenKind::from_stored(self.catalog.u8_at(TableId::Blobs, self.at(syntax_token::KIND)))
    }

    pub fn text(&self) -> &'a str {
        self.catalog.string_at(TableId::Blobs, self.at(syntax_token::TEXT))
    }

    pub fn reference(&self) -> Option<ApiModel<'a>> {
        self.catalog
            .optional_offset_at(TableId::Blobs, self.at(syntax_token::REFERENCE))
            .map(|offset| ApiModel::new(self.catalog, offset))
    }
}

impl fmt::Debug for SyntaxTokenModel<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyntaxTokenModel")
            .field("kind", &self.kind())
            .field("text", &self.text())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Extension methods
// ---------------------------------------------------------------------------

handle!(ExtensionMethodModel);

impl<'a> ExtensionMethodModel<'a> {
    pub fn fingerprint(&self) -> Fingerprint {
        self.catalog
            .fingerprint_at(TableId::ExtensionMethods, self.at(extension_row::FINGERPRINT))
    }

    pub fn extended_type(&self) -> ApiModel<'a> {
        let offset = self
            .catalog
            .offset_at(TableId::ExtensionMethods, self.at(extension_row::EXTENDED_TYPE));
        ApiModel::new(self.catalog, offset)
    }

    pub fn method(&self) -> ApiModel<'a> {
        let offset = self
            .catalog
            .offset_at(TableId::ExtensionMethods, self.at(extension_row::METHOD));
        ApiModel::new(self.catalog, offset)
    }
}

// ---------------------------------------------------------------------------
// Annotations
// ---------------------------------------------------------------------------

handle!(ObsoletionModel);

impl<'a> ObsoletionModel<'a> {
    pub fn message(&self) -> &'a str {
        self.catalog
            .string_at(TableId::Obsoletions, self.at(obsoletion_row::MESSAGE))
    }

    pub fn is_error(&self) -> bool {
        self.catalog
            .u8_at(TableId::Obsoletions, self.at(obsoletion_row::IS_ERROR))
            != 0
    }

    pub fn diagnostic_id(&self) -> Option<&'a str> {
        self.catalog
            .optional_string_at(TableId::Obsoletions, self.at(obsoletion_row::DIAGNOSTIC_ID))
    }

    pub fn url_format(&self) -> Option<&'a str> {
        self.catalog
            .optional_string_at(TableId::Obsoletions, self.at(obsoletion_row::URL_FORMAT))
    }

    pub fn url(&self) -> Option<String> {
        self.url_format()
            .map(|format| format_diagnostic_url(format, self.diagnostic_id()))
    }
}

handle!(PlatformSupportModel);

impl<'a> PlatformSupportModel<'a> {
    /// (platform name, supported) pairs.
    pub fn entries(&self) -> impl ExactSizeIterator<Item = (&'a str, bool)> + Clone + 'a {
        let catalog = self.catalog;
        let start = catalog.offset_at(
            TableId::PlatformSupport,
            self.at(platform_support_row::PLATFORMS),
        ) as usize;
        let count = catalog.count_at(TableId::Blobs, start);
        (0..count).map(move |i| {
            let position = start + OFFSET_SIZE + i * platform_support_row::ENTRY_SIZE;
            (
                catalog.string_at(TableId::Blobs, position),
                catalog.u8_at(TableId::Blobs, position + OFFSET_SIZE) != 0,
            )
        })
    }

    pub fn is_supported(&self, platform: &str) -> Option<bool> {
        self.entries()
            .find(|(name, _)| name.eq_ignore_ascii_case(platform))
            .map(|(_, supported)| supported)
    }

    pub fn to_entries(&self) -> Vec<PlatformSupportEntry> {
        self.entries()
            .map(|(platform, is_supported)| PlatformSupportEntry {
                platform: platform.to_string(),
                is_supported,
            })
            .collect()
    }
}

handle!(PreviewRequirementModel);

impl<'a> PreviewRequirementModel<'a> {
    pub fn message(&self) -> &'a str {
        self.catalog.string_at(
            TableId::PreviewRequirements,
            self.at(preview_requirement_row::MESSAGE),
        )
    }

    pub fn url(&self) -> Option<&'a str> {
        self.catalog.optional_string_at(
            TableId::PreviewRequirements,
            self.at(preview_requirement_row::URL),
        )
    }
}

handle!(ExperimentalModel);

impl<'a> ExperimentalModel<'a> {
    pub fn diagnostic_id(&self) -> &'a str {
        self.catalog
            .string_at(TableId::Experimentals, self.at(experimental_row::DIAGNOSTIC_ID))
    }

    pub fn url_format(&self) -> Option<&'a str> {
        self.catalog
            .optional_string_at(TableId::Experimentals, self.at(experimental_row::URL_FORMAT))
    }

    pub fn url(&self) -> Option<String> {
        self.url_format()
            .map(|format| format_diagnostic_url(format, Some(self.diagnostic_id())))
    }
}

fn lookup_platform_support(
    catalog: &Catalog,
    api: Option<u32>,
    assembly: u32,
) -> Option<PlatformSupportModel<'_>> {
    catalog
        .find_annotation(TableId::PlatformSupport, platform_support_row::SIZE, api, assembly)
        .map(|offset| PlatformSupportModel::new(catalog, offset))
}

fn lookup_preview_requirement(
    catalog: &Catalog,
    api: Option<u32>,
    assembly: u32,
) -> Option<PreviewRequirementModel<'_>> {
    catalog
        .find_annotation(
            TableId::PreviewRequirements,
            preview_requirement_row::SIZE,
            api,
            assembly,
        )
        .map(|offset| PreviewRequirementModel::new(catalog, offset))
}

fn lookup_experimental(
    catalog: &Catalog,
    api: Option<u32>,
    assembly: u32,
) -> Option<ExperimentalModel<'_>> {
    catalog
        .find_annotation(TableId::Experimentals, experimental_row::SIZE, api, assembly)
        .map(|offset| ExperimentalModel::new(catalog, offset))
}
