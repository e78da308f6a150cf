//! Everything that happens before a catalog file exists: unit ingestion and
//! the intermediate graph it fills.

pub mod graph;
pub mod ingest;
pub mod markup;
pub mod units;

pub use graph::IntermediateGraph;
pub use ingest::{CatalogBuilder, IndexReport};
pub use markup::{Markup, MarkupToken};
