//! Criterion benchmarks for apicat-core.
//!
//! ## Benchmark groups
//!
//! 1. **heaps**: FNV-1 hashing and blob-heap deduplication.
//! 2. **markup**: Declaration syntax parsing.
//! 3. **write**: Serializing synthetic graphs of increasing size.
//! 4. **load**: Loading (inflating) the written catalogs.
//! 5. **read**: Tree traversal, fingerprint lookup, annotation lookup and
//!    availability on a loaded catalog.
//!
//! ## Running
//!
//! ```sh
//! cargo bench --manifest-path crates/apicat-core/Cargo.toml
//! # Run only the read group:
//! cargo bench --manifest-path crates/apicat-core/Cargo.toml -- read
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use apicat_core::builder::markup::Markup;
use apicat_core::format::heap::{fnv1, BlobHeap};
use apicat_core::format::writer::serialize;
use apicat_core::models::Obsoletion;
use apicat_core::{ApiKind, Catalog, CatalogWriter, Fingerprint, IntermediateGraph};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// A graph with `types` classes of ten methods each, spread over ten
/// namespaces in one in-box assembly.  Every third method is obsolete.
fn synthetic_graph(types: usize) -> IntermediateGraph {
    let mut graph = IntermediateGraph::new();
    let assembly = Fingerprint::of("System.Runtime.dll");
    graph.define_assembly(assembly, "System.Runtime", "8.0.0.0", "b03f5f7f11d50a3a");
    graph.add_framework_assembly("net8.0", &assembly);

    for ns in 0..10 {
        let ns_fp = Fingerprint::of(&format!("ns{ns}"));
        graph.define_api(ns_fp, ApiKind::Namespace, None, &format!("System.Bench{ns}"));
        graph
            .define_declaration(&ns_fp, &assembly, &format!("<k>namespace</k> System.Bench{ns}"))
            .unwrap();
    }

    for t in 0..types {
        let ns_fp = Fingerprint::of(&format!("ns{}", t % 10));
        let type_fp = Fingerprint::of(&format!("type{t}"));
        graph.define_api(type_fp, ApiKind::Class, Some(ns_fp), &format!("Type{t}"));
        graph
            .define_declaration(
                &type_fp,
                &assembly,
                &format!("<k>public</k> <k>class</k> Type{t}"),
            )
            .unwrap();

        for m in 0..10 {
            let method_fp = Fingerprint::of(&format!("type{t}.m{m}"));
            graph.define_api(method_fp, ApiKind::Method, Some(type_fp), &format!("M{m}(Int32)"));
            let syntax = format!(
                "<k>public</k> <t ref=\"{type_fp}\">Type{t}</t> M{m}(<k>int</k> value)"
            );
            graph
                .define_declaration(&method_fp, &assembly, &syntax)
                .unwrap();
            if m % 3 == 0 {
                graph.define_obsoletion(
                    &method_fp,
                    &assembly,
                    Obsoletion {
                        message: "Use the overload taking a span.".to_string(),
                        is_error: false,
                        diagnostic_id: Some("SYSLIB0042".to_string()),
                        url_format: None,
                    },
                );
            }
        }
    }
    graph
}

fn write_catalog(types: usize) -> Vec<u8> {
    let mut graph = synthetic_graph(types);
    let mut out = Vec::new();
    CatalogWriter::default().write(&mut graph, &mut out).unwrap();
    out
}

// ---------------------------------------------------------------------------
// Benchmark: Heaps
// ---------------------------------------------------------------------------

fn bench_heaps(c: &mut Criterion) {
    let mut group = c.benchmark_group("heaps");

    let blob = vec![0xA5u8; 256];
    group.bench_function("fnv1_256_bytes", |b| {
        b.iter(|| fnv1(black_box(&blob)));
    });

    group.bench_function("blob_heap_dedup_1000", |b| {
        let blobs: Vec<Vec<u8>> = (0..100u32).map(|i| i.to_le_bytes().repeat(8)).collect();
        b.iter(|| {
            let mut heap = BlobHeap::new();
            for i in 0..1000 {
                heap.add(&blobs[i % blobs.len()]).unwrap();
            }
            black_box(heap.len());
        });
    });

    group.finish();
}

// ---------------------------------------------------------------------------
// Benchmark: Markup
// ---------------------------------------------------------------------------

fn bench_markup(c: &mut Criterion) {
    let syntax = format!(
        "<k>public</k> <k>static</k> <t ref=\"{}\">IEnumerable</t>&lt;TResult&gt; \
         Select&lt;TSource, TResult&gt;(<k>this</k> IEnumerable&lt;TSource&gt; source)",
        Fingerprint::of("IEnumerable")
    );
    c.bench_function("markup_parse_select", |b| {
        b.iter(|| Markup::parse(black_box(&syntax)));
    });
}

// ---------------------------------------------------------------------------
// Benchmark: Write and load
// ---------------------------------------------------------------------------

fn bench_write(c: &mut Criterion) {
    let mut group = c.benchmark_group("write");
    group.sample_size(20);

    for types in [100usize, 1_000] {
        let graph = synthetic_graph(types);
        group.bench_with_input(BenchmarkId::new("serialize", types), &graph, |b, graph| {
            b.iter(|| serialize(black_box(graph)).unwrap());
        });
    }

    group.finish();
}

fn bench_load(c: &mut Criterion) {
    let mut group = c.benchmark_group("load");
    group.sample_size(20);

    for types in [100usize, 1_000] {
        let bytes = write_catalog(types);
        group.bench_with_input(BenchmarkId::new("from_bytes", types), &bytes, |b, bytes| {
            b.iter(|| Catalog::from_bytes(black_box(bytes)).unwrap());
        });
    }

    group.finish();
}

// ---------------------------------------------------------------------------
// Benchmark: Read-side queries
// ---------------------------------------------------------------------------

fn bench_read(c: &mut Criterion) {
    let mut group = c.benchmark_group("read");
    let catalog = Catalog::from_bytes(&write_catalog(1_000)).unwrap();

    group.bench_function("walk_all_descendants", |b| {
        b.iter(|| {
            let count: usize = catalog.root_apis().map(|root| root.descendants().count()).sum();
            black_box(count);
        });
    });

    let target = Fingerprint::of("type500.m3");
    // Build the lazy index outside the measurement.
    catalog.api_by_fingerprint(&target);
    group.bench_function("api_by_fingerprint", |b| {
        b.iter(|| catalog.api_by_fingerprint(black_box(&target)).unwrap());
    });

    let api = catalog.api_by_fingerprint(&target).unwrap();
    group.bench_function("obsoletion_lookup", |b| {
        b.iter(|| {
            let declaration = api.declarations().next().unwrap();
            black_box(declaration.obsoletion())
        });
    });

    group.bench_function("availability", |b| {
        b.iter(|| black_box(api.availability()));
    });

    group.finish();
}

// ---------------------------------------------------------------------------
// Register all benchmark groups
// ---------------------------------------------------------------------------

criterion_group!(
    benches,
    bench_heaps,
    bench_markup,
    bench_write,
    bench_load,
    bench_read,
);
criterion_main!(benches);
