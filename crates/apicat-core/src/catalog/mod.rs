//! Catalog Reader.
//!
//! [`Catalog::load`] validates the header, inflates the table stream into one
//! buffer and records each table's byte range.  Nothing else is parsed up
//! front: every entity handle is a (catalog, offset) pair and every property
//! is read straight out of the buffer on demand.  The loaded buffer is never
//! mutated, so a `Catalog` can be shared across threads freely.

pub mod annotations;
pub mod availability;
pub mod entities;
pub mod frameworks;
pub mod ordering;
pub mod stats;

use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufReader, Read};
use std::ops::Range;
use std::path::Path;
use std::sync::OnceLock;
use std::time::Instant;

use byteorder::{ByteOrder, LittleEndian, ReadBytesExt};
use flate2::read::DeflateDecoder;
use tracing::{debug, info, warn};

use crate::config::MAX_LOAD_RESERVATION;
use crate::errors::{CatalogError, CatalogResult};
use crate::format::layout::{
    api_row, assembly_row, extension_row, framework_row, package_row, platform_row,
    usage_source_row, TableId, FINGERPRINT_SIZE, FORMAT_VERSION, MAGIC, NIL, OFFSET_SIZE,
};
use crate::models::Fingerprint;

pub use availability::{ApiAvailability, ApiFrameworkAvailability};
pub use entities::{
    ApiDeclarationModel, ApiModel, ApiUsageModel, AssemblyModel, ExperimentalModel,
    ExtensionMethodModel, FrameworkModel, ObsoletionModel, PackageModel, PlatformModel,
    PlatformSupportModel, PreviewRequirementModel, SyntaxTokenModel, UsageSourceModel,
};
pub use frameworks::TargetFramework;
pub use stats::CatalogStatistics;

/// A loaded, immutable catalog.
pub struct Catalog {
    buffer: Vec<u8>,
    ranges: Vec<Range<usize>>,
    api_index: OnceLock<HashMap<Fingerprint, u32>>,
    assembly_index: OnceLock<HashMap<Fingerprint, u32>>,
    extension_method_index: OnceLock<HashSet<u32>>,
}

impl std::fmt::Debug for Catalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Catalog")
            .field("bytes", &self.buffer.len())
            .finish_non_exhaustive()
    }
}

impl Catalog {
    // -----------------------------------------------------------------------
    // Loading
    // -----------------------------------------------------------------------

    /// Read a catalog from any byte stream.
    pub fn load<R: Read>(mut reader: R) -> CatalogResult<Catalog> {
        let started = Instant::now();

        let mut magic = [0u8; 8];
        reader.read_exact(&mut magic)?;
        if &magic != MAGIC {
            return Err(CatalogError::Format(
                "not a catalog file (bad magic)".to_string(),
            ));
        }

        let version = reader.read_i32::<LittleEndian>()?;
        if version != FORMAT_VERSION {
            return Err(CatalogError::UnsupportedVersion {
                found: version,
                expected: FORMAT_VERSION,
            });
        }

        let count = reader.read_i32::<LittleEndian>()?;
        if count != TableId::COUNT as i32 {
            return Err(CatalogError::Format(format!(
                "expected {} tables, found {count}",
                TableId::COUNT
            )));
        }

        let mut ranges = Vec::with_capacity(TableId::COUNT);
        let mut total = 0usize;
        for table in TableId::ALL {
            let size = reader.read_i32::<LittleEndian>()?;
            let size = usize::try_from(size).map_err(|_| {
                CatalogError::Format(format!("table {} has negative size {size}", table.name()))
            })?;
            let end = total.checked_add(size).ok_or_else(|| {
                CatalogError::Format("declared table sizes overflow".to_string())
            })?;
            ranges.push(total..end);
            total = end;
        }

        // Bounded reservation; inflate at most one byte past the declared size.
        let mut buffer = Vec::new();
        buffer
            .try_reserve(total.min(MAX_LOAD_RESERVATION))
            .map_err(|err| CatalogError::Format(format!("cannot reserve {total} bytes: {err}")))?;
        DeflateDecoder::new(reader)
            .take(total as u64 + 1)
            .read_to_end(&mut buffer)?;
        if buffer.len() != total {
            return Err(CatalogError::Format(format!(
                "decompressed {} bytes, header declares {total}",
                buffer.len()
            )));
        }

        info!(
            bytes = total,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "catalog loaded"
        );
        Ok(Catalog {
            buffer,
            ranges,
            api_index: OnceLock::new(),
            assembly_index: OnceLock::new(),
            extension_method_index: OnceLock::new(),
        })
    }

    pub fn open(path: &Path) -> CatalogResult<Catalog> {
        debug!(path = %path.display(), "opening catalog");
        let file = File::open(path)?;
        Catalog::load(BufReader::new(file))
    }

    pub fn from_bytes(bytes: &[u8]) -> CatalogResult<Catalog> {
        Catalog::load(bytes)
    }

    // -----------------------------------------------------------------------
    // Entry points
    // -----------------------------------------------------------------------

    pub fn table_size(&self, table: TableId) -> usize {
        self.ranges[table.index()].len()
    }

    pub fn platforms(&self) -> impl ExactSizeIterator<Item = PlatformModel<'_>> + Clone + '_ {
        let count = self.table_size(TableId::Platforms) / platform_row::SIZE;
        (0..count).map(move |i| PlatformModel::new(self, (i * platform_row::SIZE) as u32))
    }

    pub fn frameworks(&self) -> impl Iterator<Item = FrameworkModel<'_>> + Clone + '_ {
        self.rows(TableId::Frameworks, framework_row_size)
            .map(move |offset| FrameworkModel::new(self, offset))
    }

    pub fn packages(&self) -> impl Iterator<Item = PackageModel<'_>> + Clone + '_ {
        self.rows(TableId::Packages, package_row_size)
            .map(move |offset| PackageModel::new(self, offset))
    }

    pub fn assemblies(&self) -> impl Iterator<Item = AssemblyModel<'_>> + Clone + '_ {
        self.rows(TableId::Assemblies, assembly_row_size)
            .map(move |offset| AssemblyModel::new(self, offset))
    }

    pub fn usage_sources(&self) -> impl ExactSizeIterator<Item = UsageSourceModel<'_>> + Clone + '_ {
        let count = self.table_size(TableId::UsageSources) / usage_source_row::SIZE;
        (0..count).map(move |i| UsageSourceModel::new(self, (i * usage_source_row::SIZE) as u32))
    }

    pub fn root_apis(&self) -> impl ExactSizeIterator<Item = ApiModel<'_>> + Clone + '_ {
        let count = if self.table_size(TableId::RootApis) == 0 {
            0
        } else {
            self.count_at(TableId::RootApis, 0)
        };
        (0..count).map(move |i| {
            let offset = self.offset_at(TableId::RootApis, OFFSET_SIZE + i * OFFSET_SIZE);
            ApiModel::new(self, offset)
        })
    }

    /// Every API in storage order (parents before children).
    pub fn all_apis(&self) -> impl Iterator<Item = ApiModel<'_>> + Clone + '_ {
        self.rows(TableId::Apis, api_row_size)
            .map(move |offset| ApiModel::new(self, offset))
    }

    pub fn extension_methods(
        &self,
    ) -> impl ExactSizeIterator<Item = ExtensionMethodModel<'_>> + Clone + '_ {
        let count = self.table_size(TableId::ExtensionMethods) / extension_row::SIZE;
        (0..count).map(move |i| ExtensionMethodModel::new(self, (i * extension_row::SIZE) as u32))
    }

    /// Look an API up by fingerprint.  The index is built on first use.
    pub fn api_by_fingerprint(&self, fingerprint: &Fingerprint) -> Option<ApiModel<'_>> {
        let index = self.api_index.get_or_init(|| {
            let index: HashMap<_, _> = self
                .all_apis()
                .map(|api| (api.fingerprint(), api.offset()))
                .collect();
            debug!(apis = index.len(), "built API fingerprint index");
            index
        });
        index
            .get(fingerprint)
            .map(|&offset| ApiModel::new(self, offset))
    }

    pub fn assembly_by_fingerprint(&self, fingerprint: &Fingerprint) -> Option<AssemblyModel<'_>> {
        let index = self.assembly_index.get_or_init(|| {
            self.assemblies()
                .map(|assembly| (assembly.fingerprint(), assembly.offset()))
                .collect()
        });
        index
            .get(fingerprint)
            .map(|&offset| AssemblyModel::new(self, offset))
    }

    pub fn package_by_fingerprint(&self, fingerprint: &Fingerprint) -> Option<PackageModel<'_>> {
        self.packages().find(|p| &p.fingerprint() == fingerprint)
    }

    pub fn framework_by_name(&self, name: &str) -> Option<FrameworkModel<'_>> {
        self.frameworks().find(|f| f.name() == name)
    }

    /// Whether the API at `offset` is the method of any extension link.
    pub(crate) fn is_extension_method_at(&self, offset: u32) -> bool {
        self.extension_method_index
            .get_or_init(|| {
                self.extension_methods()
                    .map(|extension| extension.method().offset())
                    .collect()
            })
            .contains(&offset)
    }

    pub fn statistics(&self) -> CatalogStatistics {
        CatalogStatistics::compute(self)
    }

    // -----------------------------------------------------------------------
    // Raw reads
    // -----------------------------------------------------------------------

    pub(crate) fn table(&self, table: TableId) -> &[u8] {
        &self.buffer[self.ranges[table.index()].clone()]
    }

    pub(crate) fn i32_at(&self, table: TableId, position: usize) -> i32 {
        LittleEndian::read_i32(&self.table(table)[position..position + 4])
    }

    pub(crate) fn u8_at(&self, table: TableId, position: usize) -> u8 {
        self.table(table)[position]
    }

    pub(crate) fn f32_at(&self, table: TableId, position: usize) -> f32 {
        LittleEndian::read_f32(&self.table(table)[position..position + 4])
    }

    pub(crate) fn count_at(&self, table: TableId, position: usize) -> usize {
        self.i32_at(table, position).max(0) as usize
    }

    pub(crate) fn offset_at(&self, table: TableId, position: usize) -> u32 {
        self.i32_at(table, position) as u32
    }

    pub(crate) fn optional_offset_at(&self, table: TableId, position: usize) -> Option<u32> {
        match self.i32_at(table, position) {
            NIL => None,
            offset => Some(offset as u32),
        }
    }

    pub(crate) fn fingerprint_at(&self, table: TableId, position: usize) -> Fingerprint {
        let mut bytes = [0u8; FINGERPRINT_SIZE];
        bytes.copy_from_slice(&self.table(table)[position..position + FINGERPRINT_SIZE]);
        Fingerprint::from_bytes(bytes)
    }

    /// String-heap entry at `offset`.
    pub(crate) fn string(&self, offset: u32) -> &str {
        let heap = self.table(TableId::Strings);
        let start = offset as usize;
        let len = LittleEndian::read_i32(&heap[start..start + 4]).max(0) as usize;
        match std::str::from_utf8(&heap[start + 4..start + 4 + len]) {
            Ok(value) => value,
            Err(err) => {
                warn!(offset, error = %err, "string heap entry is not valid UTF-8");
                ""
            }
        }
    }

    /// String referenced from `table` at `position`.
    pub(crate) fn string_at(&self, table: TableId, position: usize) -> &str {
        self.string(self.offset_at(table, position))
    }

    pub(crate) fn optional_string_at(&self, table: TableId, position: usize) -> Option<&str> {
        self.optional_offset_at(table, position)
            .map(|offset| self.string(offset))
    }

    fn rows(&self, table: TableId, row_size: fn(&Catalog, usize) -> usize) -> RowOffsets<'_> {
        RowOffsets {
            catalog: self,
            table,
            position: 0,
            end: self.table_size(table),
            row_size,
        }
    }
}

// ---------------------------------------------------------------------------
// Variable-size row walking
// ---------------------------------------------------------------------------

/// Offsets of consecutive variable-size rows in one table.
#[derive(Clone)]
struct RowOffsets<'a> {
    catalog: &'a Catalog,
    table: TableId,
    position: usize,
    end: usize,
    row_size: fn(&Catalog, usize) -> usize,
}

impl Iterator for RowOffsets<'_> {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        if self.position >= self.end {
            return None;
        }
        let offset = self.position;
        self.position += (self.row_size)(self.catalog, offset);
        Some(offset as u32)
    }
}

fn framework_row_size(catalog: &Catalog, offset: usize) -> usize {
    let count = catalog.count_at(TableId::Frameworks, offset + framework_row::ASSEMBLIES);
    framework_row::ASSEMBLIES + OFFSET_SIZE + count * OFFSET_SIZE
}

fn package_row_size(catalog: &Catalog, offset: usize) -> usize {
    let count = catalog.count_at(TableId::Packages, offset + package_row::ASSEMBLIES);
    package_row::ASSEMBLIES + OFFSET_SIZE + count * package_row::ENTRY_SIZE
}

pub(crate) fn assembly_frameworks_position(catalog: &Catalog, offset: usize) -> usize {
    let position = offset + assembly_row::ROOT_APIS;
    position + OFFSET_SIZE + catalog.count_at(TableId::Assemblies, position) * OFFSET_SIZE
}

pub(crate) fn assembly_packages_position(catalog: &Catalog, offset: usize) -> usize {
    let position = assembly_frameworks_position(catalog, offset);
    position + OFFSET_SIZE + catalog.count_at(TableId::Assemblies, position) * OFFSET_SIZE
}

fn assembly_row_size(catalog: &Catalog, offset: usize) -> usize {
    let position = assembly_packages_position(catalog, offset);
    let count = catalog.count_at(TableId::Assemblies, position);
    position + OFFSET_SIZE + count * assembly_row::PACKAGE_ENTRY_SIZE - offset
}

pub(crate) fn api_declarations_position(catalog: &Catalog, offset: usize) -> usize {
    let position = offset + api_row::CHILDREN;
    position + OFFSET_SIZE + catalog.count_at(TableId::Apis, position) * OFFSET_SIZE
}

pub(crate) fn api_usages_position(catalog: &Catalog, offset: usize) -> usize {
    let position = api_declarations_position(catalog, offset);
    position + OFFSET_SIZE + catalog.count_at(TableId::Apis, position) * api_row::DECLARATION_SIZE
}

fn api_row_size(catalog: &Catalog, offset: usize) -> usize {
    let position = api_usages_position(catalog, offset);
    let count = catalog.count_at(TableId::Apis, position);
    position + OFFSET_SIZE + count * api_row::USAGE_SIZE - offset
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::units::{
        ApiRecord, AssemblyRecord, DeclarationRecord, IndexUnit, UsageRecord, UsageUnit,
    };
    use crate::builder::CatalogBuilder;
    use crate::config::WriterOptions;
    use crate::format::writer::{emit, serialize, CatalogWriter};
    use crate::builder::IntermediateGraph;
    use crate::models::ApiKind;
    use chrono::NaiveDate;
    use proptest::prelude::*;

    fn fp(text: &str) -> Fingerprint {
        Fingerprint::of(text)
    }

    fn api(id: &str, kind: ApiKind, parent: Option<&str>, name: &str) -> ApiRecord {
        ApiRecord {
            fingerprint: fp(id),
            kind,
            parent: parent.map(fp),
            name: name.to_string(),
        }
    }

    fn declaration(assembly: &str, id: &str, syntax: &str) -> DeclarationRecord {
        DeclarationRecord {
            assembly: fp(assembly),
            api: fp(id),
            syntax: syntax.to_string(),
        }
    }

    /// Namespace N, type N.T (F1) and method N.T.M() (F2) in A.dll 1.0.0.0.
    fn scenario_unit() -> IndexUnit {
        let mut unit = IndexUnit::for_framework("net8.0");
        unit.assemblies.push(AssemblyRecord {
            fingerprint: fp("A.dll"),
            name: "A".to_string(),
            version: "1.0.0.0".to_string(),
            public_key_token: "b03f5f7f11d50a3a".to_string(),
            frameworks: Vec::new(),
        });
        unit.apis.push(api("F2", ApiKind::Method, Some("F1"), "M()"));
        unit.apis.push(api("N", ApiKind::Namespace, None, "N"));
        unit.apis.push(api("F1", ApiKind::Class, Some("N"), "T"));
        unit.declarations.push(declaration("A.dll", "N", "<k>namespace</k> N"));
        unit.declarations.push(declaration(
            "A.dll",
            "F1",
            "<k>public</k> <k>class</k> T",
        ));
        unit.declarations.push(declaration(
            "A.dll",
            "F2",
            &format!("<k>public</k> <t ref=\"{}\">T</t> M()", fp("F1")),
        ));
        unit
    }

    fn build(builder: CatalogBuilder) -> Vec<u8> {
        let mut out = Vec::new();
        builder.build(&mut out, &WriterOptions::default()).unwrap();
        out
    }

    #[test]
    fn test_scenario_round_trip() {
        let mut builder = CatalogBuilder::new();
        builder.index_unit(&scenario_unit()).unwrap();
        let catalog = Catalog::from_bytes(&build(builder)).unwrap();

        let roots: Vec<_> = catalog.root_apis().collect();
        assert_eq!(roots.len(), 1);
        assert_eq!(roots[0].name(), "N");

        let types: Vec<_> = roots[0].children().collect();
        assert_eq!(types.len(), 1);
        assert_eq!(types[0].name(), "T");
        assert_eq!(types[0].fingerprint(), fp("F1"));

        let members: Vec<_> = types[0].children().collect();
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].name(), "M()");
        assert_eq!(members[0].parent(), Some(types[0]));

        let declarations: Vec<_> = types[0].declarations().collect();
        assert_eq!(declarations.len(), 1);
        assert_eq!(declarations[0].assembly().name(), "A");
        assert_eq!(declarations[0].assembly().version(), "1.0.0.0");
        assert_eq!(declarations[0].syntax_text(), "public class T");
    }

    #[test]
    fn test_syntax_reference_points_at_api() {
        let mut builder = CatalogBuilder::new();
        builder.index_unit(&scenario_unit()).unwrap();
        let catalog = Catalog::from_bytes(&build(builder)).unwrap();

        let method = catalog.api_by_fingerprint(&fp("F2")).unwrap();
        let declaration = method.declarations().next().unwrap();
        let reference = declaration
            .tokens()
            .find_map(|token| token.reference())
            .unwrap();
        assert_eq!(reference.fingerprint(), fp("F1"));
        assert_eq!(reference.name(), "T");
    }

    #[test]
    fn test_round_trip_entities() {
        let mut builder = CatalogBuilder::new();
        builder.index_unit(&scenario_unit()).unwrap();
        builder.index_usages(&UsageUnit {
            name: "nuget.org".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            usages: vec![UsageRecord {
                api: fp("F1"),
                percentage: 0.5,
            }],
        });
        let catalog = Catalog::from_bytes(&build(builder)).unwrap();

        let frameworks: Vec<_> = catalog.frameworks().map(|f| f.name().to_string()).collect();
        assert_eq!(frameworks, vec!["net8.0"]);
        assert_eq!(catalog.assemblies().count(), 1);
        assert_eq!(catalog.all_apis().count(), 3);

        let source = catalog.usage_sources().next().unwrap();
        assert_eq!(source.name(), "nuget.org");
        assert_eq!(source.date(), NaiveDate::from_ymd_opt(2024, 3, 1));

        let t = catalog.api_by_fingerprint(&fp("F1")).unwrap();
        let usage = t.usages().next().unwrap();
        assert_eq!(usage.usage_source(), source);
        assert_eq!(usage.percentage(), 0.5);

        let assembly = catalog.assembly_by_fingerprint(&fp("A.dll")).unwrap();
        assert_eq!(assembly.public_key_token(), "b03f5f7f11d50a3a");
        assert_eq!(assembly.frameworks().next().unwrap().name(), "net8.0");
        assert_eq!(assembly.root_apis().next().unwrap().name(), "N");
    }

    #[test]
    fn test_iterators_restart() {
        let mut builder = CatalogBuilder::new();
        builder.index_unit(&scenario_unit()).unwrap();
        let catalog = Catalog::from_bytes(&build(builder)).unwrap();
        let apis = catalog.all_apis();
        assert_eq!(apis.clone().count(), 3);
        assert_eq!(apis.count(), 3);
        let n = catalog.root_apis().next().unwrap();
        assert_eq!(n.descendants().count(), 2);
        assert_eq!(n.descendants().count(), 2);
    }

    #[test]
    fn test_empty_catalog_loads() {
        let mut graph = IntermediateGraph::new();
        let mut out = Vec::new();
        CatalogWriter::default().write(&mut graph, &mut out).unwrap();
        let catalog = Catalog::from_bytes(&out).unwrap();
        assert_eq!(catalog.root_apis().count(), 0);
        assert_eq!(catalog.all_apis().count(), 0);
        assert!(catalog.api_by_fingerprint(&fp("missing")).is_none());
    }

    #[test]
    fn test_rejects_bad_magic() {
        let err = Catalog::from_bytes(b"NOTACATALOG-----").unwrap_err();
        assert!(matches!(err, CatalogError::Format(_)));
    }

    #[test]
    fn test_rejects_unsupported_version() {
        let graph = IntermediateGraph::new();
        let tables = serialize(&graph).unwrap();
        let mut out = Vec::new();
        emit(&tables.tables, &mut out, &WriterOptions::default()).unwrap();
        out[8..12].copy_from_slice(&7i32.to_le_bytes());
        let err = Catalog::from_bytes(&out).unwrap_err();
        assert!(matches!(
            err,
            CatalogError::UnsupportedVersion { found: 7, expected: 1 }
        ));
    }

    #[test]
    fn test_rejects_size_mismatch() {
        let graph = IntermediateGraph::new();
        let tables = serialize(&graph).unwrap();
        let mut out = Vec::new();
        emit(&tables.tables, &mut out, &WriterOptions::default()).unwrap();
        // Claim one extra byte in the string heap.
        out[16..20].copy_from_slice(&1i32.to_le_bytes());
        assert!(matches!(
            Catalog::from_bytes(&out).unwrap_err(),
            CatalogError::Format(_)
        ));
    }

    #[test]
    fn test_rejects_oversized_header() {
        let mut bytes = MAGIC.to_vec();
        bytes.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        bytes.extend_from_slice(&(TableId::COUNT as i32).to_le_bytes());
        for _ in 0..TableId::COUNT {
            bytes.extend_from_slice(&i32::MAX.to_le_bytes());
        }
        // An empty final deflate block.
        bytes.extend_from_slice(&[0x03, 0x00]);
        assert!(matches!(
            Catalog::from_bytes(&bytes).unwrap_err(),
            CatalogError::Format(_)
        ));
    }

    #[test]
    fn test_rejects_stream_longer_than_header() {
        let mut builder = CatalogBuilder::new();
        builder.index_unit(&scenario_unit()).unwrap();
        let mut out = build(builder);
        let strings = LittleEndian::read_i32(&out[16..20]);
        assert!(strings > 0);
        out[16..20].copy_from_slice(&(strings - 1).to_le_bytes());
        assert!(matches!(
            Catalog::from_bytes(&out).unwrap_err(),
            CatalogError::Format(_)
        ));
    }

    #[test]
    fn test_invalid_utf8_string_reads_empty() {
        let mut graph = IntermediateGraph::new();
        graph.define_api(fp("N"), ApiKind::Namespace, None, "N");
        let mut tables = serialize(&graph).unwrap().tables;
        let strings = &mut tables[TableId::Strings.index()];
        let at = strings
            .windows(5)
            .position(|window| window == [1, 0, 0, 0, b'N'])
            .unwrap();
        strings[at + 4] = 0xFF;
        let mut out = Vec::new();
        emit(&tables, &mut out, &WriterOptions::default()).unwrap();

        let catalog = Catalog::from_bytes(&out).unwrap();
        let root = catalog.root_apis().next().unwrap();
        assert_eq!(root.name(), "");
        assert_eq!(root.fingerprint(), fp("N"));
    }

    #[test]
    fn test_package_round_trip() {
        let mut builder = CatalogBuilder::new();
        let mut framework = IndexUnit::for_framework("net6.0");
        framework.assemblies.push(AssemblyRecord {
            fingerprint: fp("A.dll"),
            name: "A".to_string(),
            version: "6.0.0.0".to_string(),
            public_key_token: String::new(),
            frameworks: Vec::new(),
        });
        builder.index_unit(&framework).unwrap();

        let mut package = IndexUnit::for_package("P", "2.0.0");
        package.assemblies.push(AssemblyRecord {
            fingerprint: fp("B.dll"),
            name: "B".to_string(),
            version: "2.0.0.0".to_string(),
            public_key_token: String::new(),
            frameworks: vec!["netstandard2.0".to_string(), "net6.0".to_string()],
        });
        builder.index_unit(&package).unwrap();
        let catalog = Catalog::from_bytes(&build(builder)).unwrap();

        let package_fp = Fingerprint::of_package("P", "2.0.0");
        let p = catalog.package_by_fingerprint(&package_fp).unwrap();
        assert_eq!(p.name(), "P");
        assert_eq!(p.version(), "2.0.0");
        assert_eq!(p.fingerprint(), package_fp);
        let pairs: Vec<_> = p
            .assemblies()
            .map(|(folder, assembly)| (folder.name(), assembly.name()))
            .collect();
        assert_eq!(pairs, vec![("netstandard2.0", "B"), ("net6.0", "B")]);
        assert!(catalog
            .package_by_fingerprint(&Fingerprint::of_package("P", "1.0.0"))
            .is_none());

        let b = catalog.assembly_by_fingerprint(&fp("B.dll")).unwrap();
        let packages: Vec<_> = b
            .packages()
            .map(|(package, folder)| (package.name(), folder.name()))
            .collect();
        assert_eq!(packages, vec![("P", "netstandard2.0"), ("P", "net6.0")]);
        assert_eq!(b.frameworks().count(), 0);

        let frameworks: Vec<_> = catalog.frameworks().map(|f| f.name()).collect();
        assert_eq!(frameworks, vec!["net6.0", "netstandard2.0"]);
        let net6 = catalog.framework_by_name("net6.0").unwrap();
        let in_box: Vec<_> = net6.assemblies().map(|a| a.name()).collect();
        assert_eq!(in_box, vec!["A"]);
        let netstandard = catalog.framework_by_name("netstandard2.0").unwrap();
        assert_eq!(netstandard.assemblies().count(), 0);
        assert!(catalog.framework_by_name("net7.0").is_none());
    }

    #[test]
    fn test_open_from_file() {
        let mut builder = CatalogBuilder::new();
        builder.index_unit(&scenario_unit()).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("apicatalog.dat");
        std::fs::write(&path, build(builder)).unwrap();
        let catalog = Catalog::open(&path).unwrap();
        assert_eq!(catalog.all_apis().count(), 3);
    }

    const FOLDERS: [&str; 3] = ["netstandard2.0", "net6.0", "net8.0"];

    fn api_fp(index: usize) -> Fingerprint {
        fp(&format!("api{index}"))
    }

    fn assembly_fp(index: usize) -> Fingerprint {
        fp(&format!("assembly{index}"))
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_write_then_load_preserves_graph(
            apis in prop::collection::vec(
                (any::<u16>(), 0u8..20, any::<u8>(), prop::option::of(0.0f32..1.0)),
                1..20,
            ),
            assembly_count in 1usize..4,
            in_box in any::<u8>(),
            packages in prop::collection::vec(
                prop::collection::vec((0usize..FOLDERS.len(), 0usize..4), 0..5),
                0..3,
            ),
        ) {
            let mask = (1u8 << assembly_count) - 1;
            let parents: Vec<Option<usize>> = apis
                .iter()
                .enumerate()
                .map(|(i, &(seed, ..))| {
                    if i == 0 || seed % 4 == 0 {
                        None
                    } else {
                        Some(seed as usize % i)
                    }
                })
                .collect();

            let mut graph = IntermediateGraph::new();
            for j in 0..assembly_count {
                graph.define_assembly(assembly_fp(j), &format!("Assembly{j}"), "1.0.0.0", "");
                if in_box & (1 << j) != 0 {
                    graph.add_framework_assembly("net8.0", &assembly_fp(j));
                }
            }

            let mut expected_packages = Vec::new();
            for (p, entries) in packages.iter().enumerate() {
                let name = format!("Package{p}");
                graph.define_package(&name, "1.0.0");
                let package_fp = Fingerprint::of_package(&name, "1.0.0");
                let mut pairs: Vec<(&str, Fingerprint)> = Vec::new();
                for &(folder, assembly) in entries {
                    let assembly = assembly_fp(assembly % assembly_count);
                    graph.add_package_assembly(&package_fp, FOLDERS[folder], &assembly);
                    if !pairs.contains(&(FOLDERS[folder], assembly)) {
                        pairs.push((FOLDERS[folder], assembly));
                    }
                }
                expected_packages.push((name, package_fp, pairs));
            }

            graph.define_usage_source("crawl", NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
            for (i, &(_, kind, declared, usage)) in apis.iter().enumerate() {
                let kind = ApiKind::from_stored(kind);
                graph.define_api(api_fp(i), kind, parents[i].map(api_fp), &format!("Api{i}"));
                for j in 0..assembly_count {
                    if declared & mask & (1 << j) != 0 {
                        let syntax = format!("<k>public</k> Api{i}");
                        graph.define_declaration(&api_fp(i), &assembly_fp(j), &syntax).unwrap();
                    }
                }
                if let Some(percentage) = usage {
                    graph.define_usage("crawl", &api_fp(i), percentage);
                }
            }

            let mut out = Vec::new();
            CatalogWriter::default().write(&mut graph, &mut out).unwrap();
            let catalog = Catalog::from_bytes(&out).unwrap();

            prop_assert_eq!(catalog.all_apis().count(), apis.len());
            let roots: Vec<_> = catalog.root_apis().map(|api| api.fingerprint()).collect();
            let expected_roots: Vec<_> = (0..apis.len())
                .filter(|&i| parents[i].is_none())
                .map(api_fp)
                .collect();
            prop_assert_eq!(roots, expected_roots);

            for (i, &(_, kind, declared, usage)) in apis.iter().enumerate() {
                let api = catalog.api_by_fingerprint(&api_fp(i)).unwrap();
                prop_assert_eq!(api.name(), format!("Api{i}"));
                prop_assert_eq!(api.kind(), ApiKind::from_stored(kind));
                prop_assert_eq!(api.parent().map(|p| p.fingerprint()), parents[i].map(api_fp));

                let children: Vec<_> = api.children().map(|c| c.fingerprint()).collect();
                let expected: Vec<_> = (0..apis.len())
                    .filter(|&c| parents[c] == Some(i))
                    .map(api_fp)
                    .collect();
                prop_assert_eq!(children, expected);

                let declarations: Vec<_> = api
                    .declarations()
                    .map(|d| (d.assembly().fingerprint(), d.syntax_text()))
                    .collect();
                let expected: Vec<_> = (0..assembly_count)
                    .filter(|&j| declared & mask & (1 << j) != 0)
                    .map(|j| (assembly_fp(j), format!("public Api{i}")))
                    .collect();
                prop_assert_eq!(declarations, expected);

                let usages: Vec<_> = api.usages().map(|u| u.percentage()).collect();
                prop_assert_eq!(usages, usage.into_iter().collect::<Vec<_>>());
            }

            for j in 0..assembly_count {
                let assembly = catalog.assembly_by_fingerprint(&assembly_fp(j)).unwrap();
                let roots: Vec<_> = assembly.root_apis().map(|api| api.fingerprint()).collect();
                let expected: Vec<_> = (0..apis.len())
                    .filter(|&i| parents[i].is_none() && apis[i].2 & mask & (1 << j) != 0)
                    .map(api_fp)
                    .collect();
                prop_assert_eq!(roots, expected);

                let packages: Vec<_> = assembly
                    .packages()
                    .map(|(package, folder)| (package.fingerprint(), folder.name()))
                    .collect();
                let this_assembly = assembly_fp(j);
                let expected: Vec<_> = expected_packages
                    .iter()
                    .flat_map(move |(_, package_fp, pairs)| {
                        pairs
                            .iter()
                            .filter(move |(_, a)| *a == this_assembly)
                            .map(move |(folder, _)| (*package_fp, *folder))
                    })
                    .collect();
                prop_assert_eq!(packages, expected);
            }

            let in_box_expected: Vec<_> = (0..assembly_count)
                .filter(|&j| in_box & (1 << j) != 0)
                .map(assembly_fp)
                .collect();
            match catalog.framework_by_name("net8.0") {
                Some(framework) => {
                    let in_box: Vec<_> = framework.assemblies().map(|a| a.fingerprint()).collect();
                    prop_assert_eq!(in_box, in_box_expected);
                }
                None => {
                    prop_assert!(in_box_expected.is_empty());
                }
            }

            prop_assert_eq!(catalog.packages().count(), expected_packages.len());
            for (name, package_fp, pairs) in &expected_packages {
                let package = catalog.package_by_fingerprint(package_fp).unwrap();
                prop_assert_eq!(package.name(), name.as_str());
                prop_assert_eq!(package.version(), "1.0.0");
                let actual: Vec<_> = package
                    .assemblies()
                    .map(|(folder, assembly)| (folder.name(), assembly.fingerprint()))
                    .collect();
                prop_assert_eq!(&actual, pairs);
            }
        }
    }
}
