//! Serializes an [`IntermediateGraph`] into the catalog container.
//!
//! Rows are written in dependency order (platforms, frameworks, packages,
//! assemblies, usage sources, then APIs depth-first).  Wherever a row points
//! at an entity that has not been written yet, a placeholder holding the
//! entity's discovery-order handle is written instead; once every entity of
//! the target kind has an offset, the placeholders are patched in place.
//! The finished tables are deflate-compressed behind a small header.

use std::collections::HashMap;
use std::io::Write;
use std::time::Instant;

use byteorder::{LittleEndian, WriteBytesExt};
use flate2::write::DeflateEncoder;
use indexmap::IndexMap;
use tracing::{debug, info};

use crate::builder::graph::{AnnotationKey, Handle, IntermediateApi, IntermediateGraph};
use crate::builder::markup::Markup;
use crate::config::WriterOptions;
use crate::errors::{CatalogError, CatalogResult};
use crate::format::heap::{BlobHeap, StringHeap, TableBuilder};
use crate::format::layout::{TableId, FORMAT_VERSION, MAGIC, NIL};
use crate::models::day_number;

/// What one write produced.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WriteSummary {
    pub table_sizes: [usize; TableId::COUNT],
    pub placeholders_patched: usize,
    pub syntax_blobs_written: usize,
    pub syntax_blobs_reused: usize,
    pub extensions_written: usize,
}

impl WriteSummary {
    pub fn table_size(&self, table: TableId) -> usize {
        self.table_sizes[table.index()]
    }

    pub fn total_size(&self) -> usize {
        self.table_sizes.iter().sum()
    }
}

/// Uncompressed tables in on-disk order.
#[derive(Debug)]
pub struct SerializedTables {
    pub tables: Vec<Vec<u8>>,
    pub summary: WriteSummary,
}

#[derive(Clone, Debug, Default)]
pub struct CatalogWriter {
    options: WriterOptions,
}

impl CatalogWriter {
    pub fn new(options: WriterOptions) -> Self {
        Self { options }
    }

    /// Resolve deferred extension links, serialize and emit the container.
    pub fn write<W: Write>(
        &self,
        graph: &mut IntermediateGraph,
        out: W,
    ) -> CatalogResult<WriteSummary> {
        let started = Instant::now();
        let resolved = graph.resolve_extensions();
        debug!(resolved, "resolved extension links");

        let serialized = serialize(graph)?;
        emit(&serialized.tables, out, &self.options)?;

        info!(
            apis = graph.api_count(),
            assemblies = graph.assembly_count(),
            bytes = serialized.summary.total_size(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "catalog written"
        );
        Ok(serialized.summary)
    }
}

/// Linearize the graph into uncompressed tables.
pub fn serialize(graph: &IntermediateGraph) -> CatalogResult<SerializedTables> {
    TableSet::new(graph).serialize()
}

/// Write the header and the compressed tables.
pub fn emit<W: Write>(tables: &[Vec<u8>], mut out: W, options: &WriterOptions) -> CatalogResult<()> {
    out.write_all(MAGIC)?;
    out.write_i32::<LittleEndian>(FORMAT_VERSION)?;
    out.write_i32::<LittleEndian>(tables.len() as i32)?;
    for (table, bytes) in TableId::ALL.iter().zip(tables) {
        let size = i32::try_from(bytes.len()).map_err(|_| CatalogError::TableOverflow {
            table: table.name(),
            size: bytes.len(),
        })?;
        out.write_i32::<LittleEndian>(size)?;
    }

    let mut encoder = DeflateEncoder::new(out, options.compression());
    for bytes in tables {
        encoder.write_all(bytes)?;
    }
    encoder.finish()?.flush()?;
    Ok(())
}

// ---------------------------------------------------------------------------
// TableSet
// ---------------------------------------------------------------------------

struct TableSet<'g> {
    graph: &'g IntermediateGraph,
    strings: StringHeap,
    blobs: BlobHeap,
    platforms: TableBuilder,
    frameworks: TableBuilder,
    packages: TableBuilder,
    assemblies: TableBuilder,
    usage_sources: TableBuilder,
    apis: TableBuilder,
    root_apis: TableBuilder,
    extensions: TableBuilder,
    obsoletions: TableBuilder,
    platform_support: TableBuilder,
    preview_requirements: TableBuilder,
    experimentals: TableBuilder,
    framework_offsets: Vec<u32>,
    package_offsets: Vec<u32>,
    assembly_offsets: Vec<u32>,
    usage_source_offsets: Vec<u32>,
    api_offsets: Vec<Option<u32>>,
    syntax_offsets: HashMap<&'g str, u32>,
    summary: WriteSummary,
}

impl<'g> TableSet<'g> {
    fn new(graph: &'g IntermediateGraph) -> Self {
        Self {
            graph,
            strings: StringHeap::new(),
            blobs: BlobHeap::new(),
            platforms: TableBuilder::new(TableId::Platforms.name()),
            frameworks: TableBuilder::new(TableId::Frameworks.name()),
            packages: TableBuilder::new(TableId::Packages.name()),
            assemblies: TableBuilder::new(TableId::Assemblies.name()),
            usage_sources: TableBuilder::new(TableId::UsageSources.name()),
            apis: TableBuilder::new(TableId::Apis.name()),
            root_apis: TableBuilder::new(TableId::RootApis.name()),
            extensions: TableBuilder::new(TableId::ExtensionMethods.name()),
            obsoletions: TableBuilder::new(TableId::Obsoletions.name()),
            platform_support: TableBuilder::new(TableId::PlatformSupport.name()),
            preview_requirements: TableBuilder::new(TableId::PreviewRequirements.name()),
            experimentals: TableBuilder::new(TableId::Experimentals.name()),
            framework_offsets: Vec::with_capacity(graph.frameworks.len()),
            package_offsets: Vec::with_capacity(graph.packages.len()),
            assembly_offsets: Vec::with_capacity(graph.assemblies.len()),
            usage_source_offsets: Vec::with_capacity(graph.usage_sources.len()),
            api_offsets: vec![None; graph.apis.len()],
            syntax_offsets: HashMap::new(),
            summary: WriteSummary::default(),
        }
    }

    fn serialize(mut self) -> CatalogResult<SerializedTables> {
        self.write_platforms()?;
        self.write_frameworks()?;
        self.write_packages()?;
        self.write_assemblies()?;
        self.patch_assembly_references()?;
        self.write_usage_sources()?;
        self.write_apis()?;
        self.patch_api_references()?;
        self.write_root_apis()?;
        self.write_extensions()?;
        self.write_obsoletions()?;
        self.write_platform_support()?;
        self.write_preview_requirements()?;
        self.write_experimentals()?;
        self.finish()
    }

    // -----------------------------------------------------------------------
    // Entity tables
    // -----------------------------------------------------------------------

    fn write_platforms(&mut self) -> CatalogResult<()> {
        for name in &self.graph.platforms {
            let name = self.strings.intern(name)?;
            self.platforms.write_offset(name);
        }
        Ok(())
    }

    fn write_frameworks(&mut self) -> CatalogResult<()> {
        for framework in self.graph.frameworks.values() {
            self.framework_offsets.push(self.frameworks.offset()?);
            let name = self.strings.intern(&framework.name)?;
            self.frameworks.write_offset(name);
            self.frameworks.write_count(framework.assemblies.len())?;
            for &assembly in &framework.assemblies {
                self.frameworks.write_placeholder(assembly);
            }
        }
        Ok(())
    }

    fn write_packages(&mut self) -> CatalogResult<()> {
        for package in self.graph.packages.values() {
            self.package_offsets.push(self.packages.offset()?);
            let name = self.strings.intern(&package.name)?;
            let version = self.strings.intern(&package.version)?;
            self.packages.write_fingerprint(&package.fingerprint);
            self.packages.write_offset(name);
            self.packages.write_offset(version);
            self.packages.write_count(package.assemblies.len())?;
            for &(framework, assembly) in &package.assemblies {
                self.packages.write_offset(self.framework_offsets[framework]);
                self.packages.write_placeholder(assembly);
            }
        }
        Ok(())
    }

    fn write_assemblies(&mut self) -> CatalogResult<()> {
        for assembly in self.graph.assemblies.values() {
            self.assembly_offsets.push(self.assemblies.offset()?);
            let name = self.strings.intern(&assembly.name)?;
            let public_key_token = self.strings.intern(&assembly.public_key_token)?;
            let version = self.strings.intern(&assembly.version)?;
            let table = &mut self.assemblies;
            table.write_fingerprint(&assembly.fingerprint);
            table.write_offset(name);
            table.write_offset(public_key_token);
            table.write_offset(version);
            table.write_count(assembly.root_apis.len())?;
            for &api in &assembly.root_apis {
                table.write_placeholder(api);
            }
            table.write_count(assembly.frameworks.len())?;
            for &framework in &assembly.frameworks {
                table.write_offset(self.framework_offsets[framework]);
            }
            table.write_count(assembly.packages.len())?;
            for &(package, framework) in &assembly.packages {
                table.write_offset(self.package_offsets[package]);
                table.write_offset(self.framework_offsets[framework]);
            }
        }
        Ok(())
    }

    fn patch_assembly_references(&mut self) -> CatalogResult<()> {
        let offsets = &self.assembly_offsets;
        let resolve = |handle: usize| offsets.get(handle).copied();
        let patched = self.frameworks.patch(resolve)? + self.packages.patch(resolve)?;
        debug!(patched, "patched assembly references");
        self.summary.placeholders_patched += patched;
        Ok(())
    }

    fn write_usage_sources(&mut self) -> CatalogResult<()> {
        for source in self.graph.usage_sources.values() {
            self.usage_source_offsets.push(self.usage_sources.offset()?);
            let name = self.strings.intern(&source.name)?;
            self.usage_sources.write_offset(name);
            self.usage_sources.write_i32(day_number(source.date));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // APIs
    // -----------------------------------------------------------------------

    /// Depth-first, so every parent precedes its children.
    fn write_apis(&mut self) -> CatalogResult<()> {
        let graph = self.graph;
        let mut stack: Vec<Handle> = graph.root_apis().collect();
        stack.reverse();
        while let Some(handle) = stack.pop() {
            let api = &graph.apis[handle];
            self.write_api(handle, api)?;
            stack.extend(api.children.iter().rev().copied());
        }
        Ok(())
    }

    fn write_api(&mut self, handle: Handle, api: &'g IntermediateApi) -> CatalogResult<()> {
        let offset = self.apis.offset()?;
        self.api_offsets[handle] = Some(offset);

        let name = self.strings.intern(&api.name)?;
        let mut declarations = Vec::with_capacity(api.declarations.len());
        for (&assembly, declaration) in &api.declarations {
            let syntax = self.syntax_blob(&declaration.syntax)?;
            declarations.push((self.assembly_offsets[assembly], syntax));
        }

        let table = &mut self.apis;
        table.write_fingerprint(&api.fingerprint);
        table.write_u8(api.kind as u8);
        match api.parent {
            Some(parent) => match self.api_offsets[parent] {
                Some(parent_offset) => table.write_offset(parent_offset),
                None => table.write_placeholder(parent),
            },
            None => table.write_i32(NIL),
        }
        table.write_offset(name);

        table.write_count(api.children.len())?;
        for &child in &api.children {
            table.write_placeholder(child);
        }

        table.write_count(declarations.len())?;
        for (assembly, syntax) in declarations {
            table.write_offset(assembly);
            table.write_offset(syntax);
        }

        table.write_count(api.usages.len())?;
        for (&source, &percentage) in &api.usages {
            table.write_offset(self.usage_source_offsets[source]);
            table.write_f32(percentage);
        }
        Ok(())
    }

    /// Blob offset for declaration syntax, written on first use.
    ///
    /// API references inside the token stream are placeholders; they are
    /// patched with the rest of the API references.
    fn syntax_blob(&mut self, text: &'g str) -> CatalogResult<u32> {
        if let Some(&offset) = self.syntax_offsets.get(text) {
            self.summary.syntax_blobs_reused += 1;
            return Ok(offset);
        }

        let markup = Markup::parse(text);
        let mut blob = TableBuilder::new(TableId::Blobs.name());
        let mut references = Vec::new();
        blob.write_count(markup.tokens.len())?;
        for token in &markup.tokens {
            let text = self.strings.intern(&token.text)?;
            blob.write_u8(token.kind as u8);
            blob.write_offset(text);
            let target = token
                .reference
                .and_then(|fp| self.graph.apis.get_index_of(&fp));
            match target {
                Some(handle) => {
                    references.push(blob.len());
                    blob.write_i32(handle as i32);
                }
                None => blob.write_i32(NIL),
            }
        }

        let (offset, is_new) = self
            .blobs
            .add_with_placeholders(blob.as_bytes(), &references)?;
        if is_new {
            self.summary.syntax_blobs_written += 1;
        } else {
            self.summary.syntax_blobs_reused += 1;
        }
        self.syntax_offsets.insert(text, offset);
        Ok(offset)
    }

    fn patch_api_references(&mut self) -> CatalogResult<()> {
        let offsets = &self.api_offsets;
        let resolve = |handle: usize| offsets.get(handle).copied().flatten();
        let patched = self.apis.patch(resolve)?
            + self.assemblies.patch(resolve)?
            + self.blobs.patch(resolve)?;
        debug!(patched, "patched API references");
        self.summary.placeholders_patched += patched;
        Ok(())
    }

    fn api_offset(&self, handle: Handle) -> CatalogResult<u32> {
        self.api_offsets[handle].ok_or_else(|| {
            CatalogError::Format(format!("API handle {handle} was never written"))
        })
    }

    fn write_root_apis(&mut self) -> CatalogResult<()> {
        let roots: Vec<Handle> = self.graph.root_apis().collect();
        self.root_apis.write_count(roots.len())?;
        for handle in roots {
            let offset = self.api_offset(handle)?;
            self.root_apis.write_offset(offset);
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Sorted side tables
    // -----------------------------------------------------------------------

    fn write_extensions(&mut self) -> CatalogResult<()> {
        let mut rows = Vec::with_capacity(self.graph.extensions.len());
        for extension in &self.graph.extensions {
            let extended_type = self.api_offset(extension.extended_type)? as i32;
            let method = self.api_offset(extension.method)? as i32;
            rows.push((extended_type, method, extension.fingerprint));
        }
        rows.sort_by_key(|(extended_type, method, _)| (*extended_type, *method));
        for (extended_type, method, fingerprint) in &rows {
            self.extensions.write_fingerprint(fingerprint);
            self.extensions.write_i32(*extended_type);
            self.extensions.write_i32(*method);
        }
        self.summary.extensions_written = rows.len();
        Ok(())
    }

    /// (api, assembly, index into `map`) sorted by the signed key pair, so
    /// assembly-level rows (api = nil) come first for each assembly order.
    fn sorted_keys<V>(
        &self,
        map: &IndexMap<AnnotationKey, V>,
    ) -> CatalogResult<Vec<(i32, i32, usize)>> {
        let mut keys = Vec::with_capacity(map.len());
        for (index, (api, assembly)) in map.keys().enumerate() {
            let api = match api {
                Some(handle) => self.api_offset(*handle)? as i32,
                None => NIL,
            };
            keys.push((api, self.assembly_offsets[*assembly] as i32, index));
        }
        keys.sort_by_key(|(api, assembly, _)| (*api, *assembly));
        Ok(keys)
    }

    fn write_obsoletions(&mut self) -> CatalogResult<()> {
        let map = &self.graph.obsoletions;
        for (api, assembly, index) in self.sorted_keys(map)? {
            let Some((_, obsoletion)) = map.get_index(index) else {
                continue;
            };
            let message = self.strings.intern(&obsoletion.message)?;
            let diagnostic_id = self
                .strings
                .intern_optional(obsoletion.diagnostic_id.as_deref())?;
            let url_format = self
                .strings
                .intern_optional(obsoletion.url_format.as_deref())?;
            let table = &mut self.obsoletions;
            table.write_i32(api);
            table.write_i32(assembly);
            table.write_offset(message);
            table.write_bool(obsoletion.is_error);
            table.write_optional_offset(diagnostic_id);
            table.write_optional_offset(url_format);
        }
        Ok(())
    }

    fn write_platform_support(&mut self) -> CatalogResult<()> {
        let map = &self.graph.platform_support;
        for (api, assembly, index) in self.sorted_keys(map)? {
            let Some((_, entries)) = map.get_index(index) else {
                continue;
            };
            let mut blob = TableBuilder::new(TableId::Blobs.name());
            blob.write_count(entries.len())?;
            for entry in entries {
                let platform = self.strings.intern(&entry.platform)?;
                blob.write_offset(platform);
                blob.write_bool(entry.is_supported);
            }
            let (platforms, _) = self.blobs.add(blob.as_bytes())?;
            let table = &mut self.platform_support;
            table.write_i32(api);
            table.write_i32(assembly);
            table.write_offset(platforms);
        }
        Ok(())
    }

    fn write_preview_requirements(&mut self) -> CatalogResult<()> {
        let map = &self.graph.preview_requirements;
        for (api, assembly, index) in self.sorted_keys(map)? {
            let Some((_, requirement)) = map.get_index(index) else {
                continue;
            };
            let message = self.strings.intern(&requirement.message)?;
            let url = self.strings.intern_optional(requirement.url.as_deref())?;
            let table = &mut self.preview_requirements;
            table.write_i32(api);
            table.write_i32(assembly);
            table.write_offset(message);
            table.write_optional_offset(url);
        }
        Ok(())
    }

    fn write_experimentals(&mut self) -> CatalogResult<()> {
        let map = &self.graph.experimentals;
        for (api, assembly, index) in self.sorted_keys(map)? {
            let Some((_, experimental)) = map.get_index(index) else {
                continue;
            };
            let diagnostic_id = self.strings.intern(&experimental.diagnostic_id)?;
            let url_format = self
                .strings
                .intern_optional(experimental.url_format.as_deref())?;
            let table = &mut self.experimentals;
            table.write_i32(api);
            table.write_i32(assembly);
            table.write_offset(diagnostic_id);
            table.write_optional_offset(url_format);
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Finish
    // -----------------------------------------------------------------------

    fn finish(self) -> CatalogResult<SerializedTables> {
        let mut summary = self.summary;
        let tables = vec![
            self.strings.into_bytes(),
            self.blobs.into_bytes(),
            self.platforms.into_bytes(),
            self.frameworks.into_bytes(),
            self.packages.into_bytes(),
            self.assemblies.into_bytes(),
            self.usage_sources.into_bytes(),
            self.apis.into_bytes(),
            self.root_apis.into_bytes(),
            self.extensions.into_bytes(),
            self.obsoletions.into_bytes(),
            self.platform_support.into_bytes(),
            self.preview_requirements.into_bytes(),
            self.experimentals.into_bytes(),
        ];
        for (size, bytes) in summary.table_sizes.iter_mut().zip(&tables) {
            *size = bytes.len();
        }
        Ok(SerializedTables { tables, summary })
    }
}
