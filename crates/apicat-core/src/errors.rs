//! Error types for the apicat core library.

/// Top-level error enum for catalog building and loading.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Format error: {0}")]
    Format(String),

    #[error("Unsupported catalog format version {found} (expected {expected})")]
    UnsupportedVersion { found: i32, expected: i32 },

    #[error("Table {table} exceeds the 32-bit offset space ({size} bytes)")]
    TableOverflow { table: &'static str, size: usize },

    #[error("Duplicate declaration of API {api} in assembly {assembly}")]
    DuplicateDeclaration { api: String, assembly: String },

    #[error("Invalid fingerprint: {0}")]
    InvalidFingerprint(String),

    #[error("Unit error: {0}")]
    Unit(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(feature = "python")]
impl From<CatalogError> for pyo3::PyErr {
    fn from(err: CatalogError) -> pyo3::PyErr {
        use pyo3::exceptions::{PyIOError, PyRuntimeError, PyValueError};

        match &err {
            CatalogError::Format(_) | CatalogError::UnsupportedVersion { .. } => {
                PyValueError::new_err(err.to_string())
            }
            CatalogError::TableOverflow { .. } | CatalogError::DuplicateDeclaration { .. } => {
                PyRuntimeError::new_err(err.to_string())
            }
            CatalogError::InvalidFingerprint(_) | CatalogError::Unit(_) => {
                PyValueError::new_err(err.to_string())
            }
            CatalogError::Io(_) => PyIOError::new_err(err.to_string()),
            CatalogError::Json(_) => PyValueError::new_err(err.to_string()),
        }
    }
}

pub type CatalogResult<T> = Result<T, CatalogError>;
