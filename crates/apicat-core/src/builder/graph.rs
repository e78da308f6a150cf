//! Deduplicated in-memory graph of everything discovered during ingestion.
//!
//! Every entity lives in an insertion-ordered map keyed by its identity.  The
//! map position is the entity's discovery-order handle; the writer uses it as
//! the placeholder value for rows whose byte offset is not known yet.  Nothing
//! here is ever removed, so handles stay valid for the whole build session.
//!
//! All `define_*` operations are idempotent on identity (first definition
//! wins) and tolerate missing dependencies: a reference to an unknown entity
//! is logged and the call becomes a no-op.

use std::collections::HashSet;

use chrono::NaiveDate;
use indexmap::{IndexMap, IndexSet};
use tracing::{debug, warn};

use crate::errors::{CatalogError, CatalogResult};
use crate::models::{
    ApiKind, Experimental, Fingerprint, Obsoletion, PlatformSupportEntry, PreviewRequirement,
};

/// Discovery-order handle of an entity inside its map.
pub type Handle = usize;

/// Annotation key: `None` for the API means "applies to the whole assembly".
pub type AnnotationKey = (Option<Handle>, Handle);

// ---------------------------------------------------------------------------
// Entities
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct IntermediateFramework {
    pub name: String,
    pub assemblies: IndexSet<Handle>,
}

#[derive(Debug, Clone)]
pub struct IntermediatePackage {
    pub fingerprint: Fingerprint,
    pub name: String,
    pub version: String,
    /// (framework, assembly) pairs.
    pub assemblies: IndexSet<(Handle, Handle)>,
}

#[derive(Debug, Clone)]
pub struct IntermediateAssembly {
    pub fingerprint: Fingerprint,
    pub name: String,
    pub version: String,
    pub public_key_token: String,
    pub root_apis: IndexSet<Handle>,
    pub frameworks: IndexSet<Handle>,
    /// (package, framework) pairs.
    pub packages: IndexSet<(Handle, Handle)>,
}

#[derive(Debug, Clone)]
pub struct IntermediateDeclaration {
    pub syntax: String,
}

#[derive(Debug, Clone)]
pub struct IntermediateApi {
    pub fingerprint: Fingerprint,
    pub kind: ApiKind,
    pub parent: Option<Handle>,
    pub name: String,
    pub children: Vec<Handle>,
    /// Keyed by assembly handle.
    pub declarations: IndexMap<Handle, IntermediateDeclaration>,
    /// Keyed by usage-source handle.
    pub usages: IndexMap<Handle, f32>,
}

#[derive(Debug, Clone)]
pub struct IntermediateUsageSource {
    pub name: String,
    pub date: NaiveDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntermediateExtension {
    pub fingerprint: Fingerprint,
    pub extended_type: Handle,
    pub method: Handle,
}

#[derive(Debug, Clone, Copy)]
struct PendingExtension {
    extended_type: Fingerprint,
    method: Fingerprint,
}

// ---------------------------------------------------------------------------
// IntermediateGraph
// ---------------------------------------------------------------------------

/// Mutable, append-only graph owned by one build session.
#[derive(Debug, Default)]
pub struct IntermediateGraph {
    pub(crate) platforms: IndexSet<String>,
    pub(crate) frameworks: IndexMap<String, IntermediateFramework>,
    pub(crate) packages: IndexMap<Fingerprint, IntermediatePackage>,
    pub(crate) assemblies: IndexMap<Fingerprint, IntermediateAssembly>,
    pub(crate) apis: IndexMap<Fingerprint, IntermediateApi>,
    pub(crate) usage_sources: IndexMap<String, IntermediateUsageSource>,
    pub(crate) obsoletions: IndexMap<AnnotationKey, Obsoletion>,
    pub(crate) platform_support: IndexMap<AnnotationKey, Vec<PlatformSupportEntry>>,
    pub(crate) preview_requirements: IndexMap<AnnotationKey, PreviewRequirement>,
    pub(crate) experimentals: IndexMap<AnnotationKey, Experimental>,
    pending_extensions: IndexMap<Fingerprint, PendingExtension>,
    pub(crate) extensions: Vec<IntermediateExtension>,
    resolved_extensions: HashSet<Fingerprint>,
}

impl IntermediateGraph {
    pub fn new() -> Self {
        Self::default()
    }

    // -----------------------------------------------------------------------
    // Platforms, frameworks, packages
    // -----------------------------------------------------------------------

    pub fn define_platform(&mut self, name: &str) -> Handle {
        match self.platforms.get_index_of(name) {
            Some(index) => index,
            None => self.platforms.insert_full(name.to_string()).0,
        }
    }

    pub fn define_framework(&mut self, name: &str) -> Handle {
        if let Some(index) = self.frameworks.get_index_of(name) {
            return index;
        }
        let framework = IntermediateFramework {
            name: name.to_string(),
            assemblies: IndexSet::new(),
        };
        self.frameworks.insert_full(name.to_string(), framework).0
    }

    pub fn define_package(&mut self, name: &str, version: &str) -> Handle {
        let fingerprint = Fingerprint::of_package(name, version);
        if let Some(index) = self.packages.get_index_of(&fingerprint) {
            return index;
        }
        let package = IntermediatePackage {
            fingerprint,
            name: name.to_string(),
            version: version.to_string(),
            assemblies: IndexSet::new(),
        };
        self.packages.insert_full(fingerprint, package).0
    }

    // -----------------------------------------------------------------------
    // Assemblies
    // -----------------------------------------------------------------------

    /// Define an assembly.  Returns its handle and whether it was new.
    pub fn define_assembly(
        &mut self,
        fingerprint: Fingerprint,
        name: &str,
        version: &str,
        public_key_token: &str,
    ) -> (Handle, bool) {
        if let Some(index) = self.assemblies.get_index_of(&fingerprint) {
            return (index, false);
        }
        let assembly = IntermediateAssembly {
            fingerprint,
            name: name.to_string(),
            version: version.to_string(),
            public_key_token: public_key_token.to_string(),
            root_apis: IndexSet::new(),
            frameworks: IndexSet::new(),
            packages: IndexSet::new(),
        };
        (self.assemblies.insert_full(fingerprint, assembly).0, true)
    }

    /// Record that `framework` ships `assembly` in-box.
    pub fn add_framework_assembly(&mut self, framework: &str, assembly: &Fingerprint) -> bool {
        let Some(assembly_index) = self.assemblies.get_index_of(assembly) else {
            warn!(framework, %assembly, "framework references unknown assembly");
            return false;
        };
        let framework_index = self.define_framework(framework);
        self.frameworks[framework_index]
            .assemblies
            .insert(assembly_index);
        self.assemblies[assembly_index]
            .frameworks
            .insert(framework_index);
        true
    }

    /// Record that `package` contributes `assembly` for target `framework`.
    pub fn add_package_assembly(
        &mut self,
        package: &Fingerprint,
        framework: &str,
        assembly: &Fingerprint,
    ) -> bool {
        let Some(package_index) = self.packages.get_index_of(package) else {
            warn!(%package, "package assembly references unknown package");
            return false;
        };
        let Some(assembly_index) = self.assemblies.get_index_of(assembly) else {
            warn!(%package, %assembly, "package references unknown assembly");
            return false;
        };
        let framework_index = self.define_framework(framework);
        self.packages[package_index]
            .assemblies
            .insert((framework_index, assembly_index));
        self.assemblies[assembly_index]
            .packages
            .insert((package_index, framework_index));
        true
    }

    // -----------------------------------------------------------------------
    // APIs and declarations
    // -----------------------------------------------------------------------

    /// Define an API.  The parent must already be known; otherwise the call
    /// is logged and ignored.  Re-defining a known fingerprint returns the
    /// existing handle untouched.
    pub fn define_api(
        &mut self,
        fingerprint: Fingerprint,
        kind: ApiKind,
        parent: Option<Fingerprint>,
        name: &str,
    ) -> Option<Handle> {
        if let Some(index) = self.apis.get_index_of(&fingerprint) {
            return Some(index);
        }
        let parent_index = match parent {
            Some(parent_fp) => match self.apis.get_index_of(&parent_fp) {
                Some(index) => Some(index),
                None => {
                    warn!(api = %fingerprint, parent = %parent_fp, name, "API parent is unknown");
                    return None;
                }
            },
            None => None,
        };
        let api = IntermediateApi {
            fingerprint,
            kind,
            parent: parent_index,
            name: name.to_string(),
            children: Vec::new(),
            declarations: IndexMap::new(),
            usages: IndexMap::new(),
        };
        let index = self.apis.insert_full(fingerprint, api).0;
        if let Some(parent_index) = parent_index {
            self.apis[parent_index].children.push(index);
        }
        Some(index)
    }

    /// Record that `assembly` declares `api` with the given syntax.
    ///
    /// Missing API or assembly is logged and skipped.  A second declaration
    /// for the same pair is an error.
    pub fn define_declaration(
        &mut self,
        api: &Fingerprint,
        assembly: &Fingerprint,
        syntax: &str,
    ) -> CatalogResult<bool> {
        let Some(api_index) = self.apis.get_index_of(api) else {
            warn!(%api, %assembly, "declaration references unknown API");
            return Ok(false);
        };
        let Some(assembly_index) = self.assemblies.get_index_of(assembly) else {
            warn!(%api, %assembly, "declaration references unknown assembly");
            return Ok(false);
        };
        let entry = &mut self.apis[api_index];
        if entry.declarations.contains_key(&assembly_index) {
            return Err(CatalogError::DuplicateDeclaration {
                api: api.to_string(),
                assembly: assembly.to_string(),
            });
        }
        entry.declarations.insert(
            assembly_index,
            IntermediateDeclaration {
                syntax: syntax.to_string(),
            },
        );
        if entry.parent.is_none() {
            self.assemblies[assembly_index].root_apis.insert(api_index);
        }
        Ok(true)
    }

    // -----------------------------------------------------------------------
    // Usage
    // -----------------------------------------------------------------------

    pub fn define_usage_source(&mut self, name: &str, date: NaiveDate) -> Handle {
        if let Some(index) = self.usage_sources.get_index_of(name) {
            return index;
        }
        let source = IntermediateUsageSource {
            name: name.to_string(),
            date,
        };
        self.usage_sources.insert_full(name.to_string(), source).0
    }

    pub fn define_usage(&mut self, source: &str, api: &Fingerprint, percentage: f32) -> bool {
        let Some(source_index) = self.usage_sources.get_index_of(source) else {
            warn!(source, "usage references unknown usage source");
            return false;
        };
        let Some(api_index) = self.apis.get_index_of(api) else {
            debug!(source, %api, "usage references unknown API");
            return false;
        };
        let usages = &mut self.apis[api_index].usages;
        if usages.contains_key(&source_index) {
            return false;
        }
        usages.insert(source_index, percentage);
        true
    }

    // -----------------------------------------------------------------------
    // Annotations
    // -----------------------------------------------------------------------

    fn annotation_key(
        &self,
        api: Option<&Fingerprint>,
        assembly: &Fingerprint,
        annotation: &'static str,
    ) -> Option<AnnotationKey> {
        let Some(assembly_index) = self.assemblies.get_index_of(assembly) else {
            warn!(annotation, %assembly, "annotation references unknown assembly");
            return None;
        };
        let api_index = match api {
            Some(api) => match self.apis.get_index_of(api) {
                Some(index) => Some(index),
                None => {
                    warn!(annotation, %api, %assembly, "annotation references unknown API");
                    return None;
                }
            },
            None => None,
        };
        Some((api_index, assembly_index))
    }

    pub fn define_obsoletion(
        &mut self,
        api: &Fingerprint,
        assembly: &Fingerprint,
        obsoletion: Obsoletion,
    ) -> bool {
        let Some(key) = self.annotation_key(Some(api), assembly, "obsoletion") else {
            return false;
        };
        insert_first(&mut self.obsoletions, key, obsoletion)
    }

    pub fn define_platform_support(
        &mut self,
        api: Option<&Fingerprint>,
        assembly: &Fingerprint,
        entries: Vec<PlatformSupportEntry>,
    ) -> bool {
        let Some(key) = self.annotation_key(api, assembly, "platform_support") else {
            return false;
        };
        for entry in &entries {
            self.define_platform(&entry.platform);
        }
        insert_first(&mut self.platform_support, key, entries)
    }

    pub fn define_preview_requirement(
        &mut self,
        api: Option<&Fingerprint>,
        assembly: &Fingerprint,
        requirement: PreviewRequirement,
    ) -> bool {
        let Some(key) = self.annotation_key(api, assembly, "preview_requirement") else {
            return false;
        };
        insert_first(&mut self.preview_requirements, key, requirement)
    }

    pub fn define_experimental(
        &mut self,
        api: Option<&Fingerprint>,
        assembly: &Fingerprint,
        experimental: Experimental,
    ) -> bool {
        let Some(key) = self.annotation_key(api, assembly, "experimental") else {
            return false;
        };
        insert_first(&mut self.experimentals, key, experimental)
    }

    // -----------------------------------------------------------------------
    // Extension methods
    // -----------------------------------------------------------------------

    /// Record an extension-method link.  Resolution is deferred to
    /// [`resolve_extensions`](Self::resolve_extensions) because either API
    /// may be defined later.
    pub fn define_extension(
        &mut self,
        fingerprint: Fingerprint,
        extended_type: Fingerprint,
        method: Fingerprint,
    ) -> bool {
        if self.pending_extensions.contains_key(&fingerprint)
            || self.resolved_extensions.contains(&fingerprint)
        {
            return false;
        }
        self.pending_extensions.insert(
            fingerprint,
            PendingExtension {
                extended_type,
                method,
            },
        );
        true
    }

    /// Resolve pending extension links to API handles.  Links whose type or
    /// method is unknown are logged and dropped.  Returns the number resolved.
    pub fn resolve_extensions(&mut self) -> usize {
        let pending = std::mem::take(&mut self.pending_extensions);
        let mut resolved = 0;
        for (fingerprint, link) in pending {
            let extended_type = self.apis.get_index_of(&link.extended_type);
            let method = self.apis.get_index_of(&link.method);
            match (extended_type, method) {
                (Some(extended_type), Some(method)) => {
                    self.resolved_extensions.insert(fingerprint);
                    self.extensions.push(IntermediateExtension {
                        fingerprint,
                        extended_type,
                        method,
                    });
                    resolved += 1;
                }
                _ => warn!(
                    extension = %fingerprint,
                    extended_type = %link.extended_type,
                    method = %link.method,
                    "dropping unresolvable extension method link"
                ),
            }
        }
        resolved
    }

    pub fn pending_extension_count(&self) -> usize {
        self.pending_extensions.len()
    }

    // -----------------------------------------------------------------------
    // Read access
    // -----------------------------------------------------------------------

    pub fn contains_api(&self, fingerprint: &Fingerprint) -> bool {
        self.apis.contains_key(fingerprint)
    }

    pub fn contains_assembly(&self, fingerprint: &Fingerprint) -> bool {
        self.assemblies.contains_key(fingerprint)
    }

    pub fn api(&self, fingerprint: &Fingerprint) -> Option<&IntermediateApi> {
        self.apis.get(fingerprint)
    }

    pub fn assembly(&self, fingerprint: &Fingerprint) -> Option<&IntermediateAssembly> {
        self.assemblies.get(fingerprint)
    }

    pub fn api_count(&self) -> usize {
        self.apis.len()
    }

    pub fn assembly_count(&self) -> usize {
        self.assemblies.len()
    }

    pub fn framework_count(&self) -> usize {
        self.frameworks.len()
    }

    pub fn package_count(&self) -> usize {
        self.packages.len()
    }

    pub fn platform_count(&self) -> usize {
        self.platforms.len()
    }

    pub fn usage_source_count(&self) -> usize {
        self.usage_sources.len()
    }

    pub fn extensions(&self) -> &[IntermediateExtension] {
        &self.extensions
    }

    /// Parentless APIs in discovery order.
    pub fn root_apis(&self) -> impl Iterator<Item = Handle> + '_ {
        self.apis
            .values()
            .enumerate()
            .filter(|(_, api)| api.parent.is_none())
            .map(|(index, _)| index)
    }
}

fn insert_first<V>(map: &mut IndexMap<AnnotationKey, V>, key: AnnotationKey, value: V) -> bool {
    if map.contains_key(&key) {
        return false;
    }
    map.insert(key, value);
    true
}
