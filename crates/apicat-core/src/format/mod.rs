//! Binary catalog container: layout constants, heaps and the writer.

pub mod heap;
pub mod layout;
pub mod writer;

pub use layout::{TableId, FORMAT_VERSION, MAGIC};
pub use writer::{CatalogWriter, WriteSummary};
