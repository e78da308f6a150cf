//! Unit ingestion: feeds producer records into the intermediate graph.

use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;

use rayon::prelude::*;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::builder::graph::IntermediateGraph;
use crate::builder::units::{ApiRecord, IndexUnit, UnitFile, UnitSource, UsageUnit};
use crate::config::{IngestOptions, WriterOptions, UNIT_FILE_EXTENSION};
use crate::errors::{CatalogError, CatalogResult};
use crate::format::writer::{CatalogWriter, WriteSummary};
use crate::models::Fingerprint;

/// Counters describing what one build session ingested and dropped.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IndexReport {
    pub units: usize,
    pub usage_units: usize,
    pub files_failed: usize,
    pub apis_defined: usize,
    pub apis_dropped: usize,
    pub declarations_defined: usize,
    pub declarations_skipped: usize,
    pub annotations_defined: usize,
    pub annotations_dropped: usize,
    pub usages_defined: usize,
    pub usages_dropped: usize,
}

/// Owns the intermediate graph for one build session.
#[derive(Debug, Default)]
pub struct CatalogBuilder {
    graph: IntermediateGraph,
    report: IndexReport,
}

impl CatalogBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn graph(&self) -> &IntermediateGraph {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut IntermediateGraph {
        &mut self.graph
    }

    pub fn report(&self) -> &IndexReport {
        &self.report
    }

    pub fn into_graph(self) -> IntermediateGraph {
        self.graph
    }

    pub fn index_file(&mut self, file: &UnitFile) -> CatalogResult<()> {
        match file {
            UnitFile::Framework(unit) | UnitFile::Package(unit) => self.index_unit(unit),
            UnitFile::Usage(unit) => {
                self.index_usages(unit);
                Ok(())
            }
        }
    }

    /// Ingest one framework or package unit.
    ///
    /// Unknown references are logged and dropped.  The only error is a
    /// duplicate declaration inside a newly defined assembly.
    pub fn index_unit(&mut self, unit: &IndexUnit) -> CatalogResult<()> {
        self.report.units += 1;
        let graph = &mut self.graph;

        for platform in &unit.platforms {
            graph.define_platform(platform);
        }

        let package = match &unit.source {
            UnitSource::Framework { framework } => {
                graph.define_framework(framework);
                None
            }
            UnitSource::Package { package, version } => {
                graph.define_package(package, version);
                Some(Fingerprint::of_package(package, version))
            }
        };

        let mut new_assemblies: HashSet<Fingerprint> = HashSet::new();
        for assembly in &unit.assemblies {
            let (_, is_new) = graph.define_assembly(
                assembly.fingerprint,
                &assembly.name,
                &assembly.version,
                &assembly.public_key_token,
            );
            if is_new {
                new_assemblies.insert(assembly.fingerprint);
            }
            match (&unit.source, package) {
                (UnitSource::Framework { framework }, _) => {
                    graph.add_framework_assembly(framework, &assembly.fingerprint);
                }
                (UnitSource::Package { package: name, .. }, Some(package_fp)) => {
                    if assembly.frameworks.is_empty() {
                        warn!(package = %name, assembly = %assembly.name, "package assembly has no target framework");
                    }
                    for folder in &assembly.frameworks {
                        graph.add_package_assembly(&package_fp, folder, &assembly.fingerprint);
                    }
                }
                (UnitSource::Package { .. }, None) => {}
            }
        }

        let (defined, dropped) = define_apis(graph, &unit.apis);
        self.report.apis_defined += defined;
        self.report.apis_dropped += dropped;

        for declaration in &unit.declarations {
            if graph.contains_assembly(&declaration.assembly)
                && !new_assemblies.contains(&declaration.assembly)
            {
                self.report.declarations_skipped += 1;
                continue;
            }
            if graph.define_declaration(&declaration.api, &declaration.assembly, &declaration.syntax)? {
                self.report.declarations_defined += 1;
            } else {
                self.report.declarations_skipped += 1;
            }
        }

        let mut annotations = Vec::new();
        for record in &unit.obsoletions {
            annotations.push(graph.define_obsoletion(
                &record.api,
                &record.assembly,
                record.obsoletion.clone(),
            ));
        }
        for record in &unit.platform_support {
            annotations.push(graph.define_platform_support(
                record.api.as_ref(),
                &record.assembly,
                record.platforms.clone(),
            ));
        }
        for record in &unit.preview_requirements {
            annotations.push(graph.define_preview_requirement(
                record.api.as_ref(),
                &record.assembly,
                record.requirement.clone(),
            ));
        }
        for record in &unit.experimentals {
            annotations.push(graph.define_experimental(
                record.api.as_ref(),
                &record.assembly,
                record.experimental.clone(),
            ));
        }
        for record in &unit.extensions {
            annotations.push(graph.define_extension(
                record.fingerprint,
                record.extended_type,
                record.method,
            ));
        }
        let accepted = annotations.iter().filter(|a| **a).count();
        self.report.annotations_defined += accepted;
        self.report.annotations_dropped += annotations.len() - accepted;

        Ok(())
    }

    /// Ingest one usage measurement.
    pub fn index_usages(&mut self, unit: &UsageUnit) {
        self.report.usage_units += 1;
        self.graph.define_usage_source(&unit.name, unit.date);
        for usage in &unit.usages {
            if self
                .graph
                .define_usage(&unit.name, &usage.api, usage.percentage)
            {
                self.report.usages_defined += 1;
            } else {
                self.report.usages_dropped += 1;
            }
        }
    }

    /// Ingest every unit file under `root`.
    ///
    /// Files are parsed in parallel but ingested in path order so discovery
    /// order, and with it the catalog layout, is deterministic.
    pub fn index_directory(&mut self, root: &Path, options: &IngestOptions) -> CatalogResult<()> {
        let started = Instant::now();
        let paths = scan_unit_files(root);
        info!(root = %root.display(), files = paths.len(), "indexing unit files");

        for (path, parsed) in parse_unit_files(&paths, options.workers) {
            match parsed {
                Ok(file) => self.index_file(&file)?,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping unreadable unit file");
                    self.report.files_failed += 1;
                }
            }
        }

        info!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            apis = self.graph.api_count(),
            assemblies = self.graph.assembly_count(),
            "indexing finished"
        );
        Ok(())
    }

    /// Resolve deferred links and serialize the graph.
    pub fn build<W: Write>(mut self, out: W, options: &WriterOptions) -> CatalogResult<WriteSummary> {
        CatalogWriter::new(options.clone()).write(&mut self.graph, out)
    }
}

/// Define APIs tolerating parent-after-child order inside one unit.
///
/// Records whose parent is not yet known are retried until a pass makes no
/// progress; whatever is left has a parent that never appears.
fn define_apis(graph: &mut IntermediateGraph, apis: &[ApiRecord]) -> (usize, usize) {
    let mut pending: Vec<&ApiRecord> = apis.iter().collect();
    let mut defined = 0;
    loop {
        let before = pending.len();
        pending.retain(|api| {
            let ready = api.parent.map_or(true, |parent| graph.contains_api(&parent));
            if ready && graph
                .define_api(api.fingerprint, api.kind, api.parent, &api.name)
                .is_some()
            {
                defined += 1;
            }
            !ready
        });
        if pending.is_empty() || pending.len() == before {
            break;
        }
    }
    for api in &pending {
        // define_api logs the missing parent
        graph.define_api(api.fingerprint, api.kind, api.parent, &api.name);
    }
    (defined, pending.len())
}

// ---------------------------------------------------------------------------
// Unit files
// ---------------------------------------------------------------------------

/// List unit files below `root`, sorted by path.
pub fn scan_unit_files(root: &Path) -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(error = %e, "cannot read directory entry");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| {
            path.extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case(UNIT_FILE_EXTENSION))
        })
        .collect();
    paths.sort();
    paths
}

pub fn read_unit_file(path: &Path) -> CatalogResult<UnitFile> {
    let text = std::fs::read_to_string(path)?;
    serde_json::from_str(&text).map_err(|e| {
        debug!(path = %path.display(), error = %e, "unit file does not parse");
        CatalogError::Unit(format!("{}: {e}", path.display()))
    })
}

/// Parse unit files on a worker pool, preserving input order.
pub fn parse_unit_files(
    paths: &[PathBuf],
    workers: usize,
) -> Vec<(PathBuf, CatalogResult<UnitFile>)> {
    if paths.is_empty() {
        return vec![];
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers.max(1))
        .build();

    let parse = |path: &PathBuf| (path.clone(), read_unit_file(path));
    match pool {
        Ok(pool) => pool.install(|| paths.par_iter().map(parse).collect()),
        Err(_) => {
            // Fallback to sequential
            paths.iter().map(parse).collect()
        }
    }
}
