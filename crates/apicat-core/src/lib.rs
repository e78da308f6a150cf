//! apicat core library: a compact binary catalog of a platform's public API
//! surface.
//!
//! The crate has two halves.  [`builder`] ingests independently produced
//! unit records into a deduplicated [`IntermediateGraph`]; [`format`]
//! serializes that graph into an offset-addressed, deflate-compressed
//! container.  [`catalog`] loads such a container and answers traversal
//! queries with plain offset arithmetic over one immutable buffer.
//!
//! With the `python` feature the read side is also compiled as a Python
//! extension module (`_apicat_core`).

pub mod builder;
pub mod catalog;
pub mod config;
pub mod errors;
pub mod format;
pub mod models;

#[cfg(feature = "python")]
mod python;

pub use builder::{CatalogBuilder, IntermediateGraph};
pub use catalog::Catalog;
pub use config::{IngestOptions, WriterOptions};
pub use errors::{CatalogError, CatalogResult};
pub use format::{CatalogWriter, WriteSummary};
pub use models::{ApiKind, Fingerprint};

// ---------------------------------------------------------------------------
// Top-level Python module: _apicat_core
// ---------------------------------------------------------------------------

#[cfg(feature = "python")]
#[pyo3::pymodule]
fn _apicat_core(m: &pyo3::Bound<'_, pyo3::types::PyModule>) -> pyo3::PyResult<()> {
    python::register(m)
}
